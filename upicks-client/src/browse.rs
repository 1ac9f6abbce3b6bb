use std::future::Future;
use uuid::Uuid;

use upicks_shared::aggregate::{self, RatingRow};
use upicks_shared::models::{CampusRating, ProfessorRating, RatingTag};
use upicks_shared::types::{
    Paginated, RatingKind, RatingListParams, RatingSort, RatingSummary, SubmitCampusRating,
};

use crate::error::{ClientError, ClientResult};
use crate::remote::RatingsRemote;
use crate::storage::{rated_campus_key, LocalStore};

const FETCH_PAGE_SIZE: u64 = 100;

#[derive(Debug, thiserror::Error)]
pub enum BrowseError {
    #[error("this device has already rated this campus")]
    AlreadyRated,

    #[error(transparent)]
    Remote(#[from] ClientError),
}

/// Every rating of one target with the numbers its page displays.
#[derive(Debug, Clone)]
pub struct Overview<R> {
    pub ratings: Vec<R>,
    pub tags: Vec<RatingTag>,
    pub summary: RatingSummary,
}

pub struct RatingBrowser<R, S> {
    remote: R,
    store: S,
}

impl<R: RatingsRemote, S: LocalStore> RatingBrowser<R, S> {
    pub fn new(remote: R, store: S) -> Self {
        Self { remote, store }
    }

    pub async fn professor_overview(&self, professor_id: Uuid, sort: RatingSort) -> ClientResult<Overview<ProfessorRating>> {
        let (ratings, tags) = tokio::join!(
            all_pages(sort, |params| async move {
                self.remote.professor_ratings(professor_id, &params).await
            }),
            self.remote.tags(RatingKind::Professor, professor_id),
        );
        Ok(overview(ratings?, tags?))
    }

    pub async fn campus_overview(&self, campus_id: Uuid, sort: RatingSort) -> ClientResult<Overview<CampusRating>> {
        let (ratings, tags) = tokio::join!(
            all_pages(sort, |params| async move {
                self.remote.campus_ratings(campus_id, &params).await
            }),
            self.remote.tags(RatingKind::Campus, campus_id),
        );
        Ok(overview(ratings?, tags?))
    }

    /// Whether this device may still rate `campus_id` without signing in.
    pub fn can_rate_anonymously(&self, campus_id: Uuid) -> bool {
        !self.store.contains(&rated_campus_key(campus_id))
    }

    /// Submit a campus rating. Anonymous viewers get one rating per campus
    /// per device, remembered in the local store once the service accepts it.
    pub async fn submit_campus_rating(
        &self,
        campus_id: Uuid,
        request: &SubmitCampusRating,
        signed_in: bool,
    ) -> Result<CampusRating, BrowseError> {
        if !signed_in && !self.can_rate_anonymously(campus_id) {
            return Err(BrowseError::AlreadyRated);
        }

        let rating = self.remote.submit_campus_rating(campus_id, request).await?;

        if !signed_in {
            let key = rated_campus_key(campus_id);
            if let Err(e) = self.store.set(&key, "true") {
                tracing::warn!(key = %key, error = %e, "could not remember anonymous campus rating");
            }
        }
        Ok(rating)
    }
}

async fn all_pages<T, F, Fut>(sort: RatingSort, fetch: F) -> ClientResult<Vec<T>>
where
    F: Fn(RatingListParams) -> Fut,
    Fut: Future<Output = ClientResult<Paginated<T>>>,
{
    let mut rows = Vec::new();
    let mut page = 1;
    loop {
        let batch = fetch(RatingListParams {
            sort,
            page,
            per_page: FETCH_PAGE_SIZE,
        })
        .await?;
        let last = batch.items.is_empty() || page >= batch.total_pages;
        rows.extend(batch.items);
        if last {
            return Ok(rows);
        }
        page += 1;
    }
}

fn overview<R: RatingRow>(ratings: Vec<R>, tags: Vec<RatingTag>) -> Overview<R> {
    let summary = aggregate::summarize(&ratings, tags.iter().map(|t| t.tag.as_str()));
    Overview {
        ratings,
        tags,
        summary,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chrono::{Duration, Utc};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use upicks_shared::types::PaginationParams;

    use crate::storage::MemoryStore;

    #[derive(Default)]
    struct FakeRatings {
        professor: Vec<ProfessorRating>,
        tags: Vec<RatingTag>,
        pages_fetched: AtomicUsize,
        submissions: AtomicUsize,
    }

    #[async_trait]
    impl RatingsRemote for FakeRatings {
        async fn professor_ratings(
            &self,
            _professor_id: Uuid,
            params: &RatingListParams,
        ) -> ClientResult<Paginated<ProfessorRating>> {
            self.pages_fetched.fetch_add(1, Ordering::SeqCst);
            let mut rows = self.professor.clone();
            aggregate::sort_ratings(&mut rows, params.sort);
            Ok(params.pagination().slice(&rows))
        }

        async fn campus_ratings(&self, _campus_id: Uuid, params: &RatingListParams) -> ClientResult<Paginated<CampusRating>> {
            Ok(Paginated::new(Vec::new(), 0, &params.pagination()))
        }

        async fn tags(&self, _kind: RatingKind, _target_id: Uuid) -> ClientResult<Vec<RatingTag>> {
            Ok(self.tags.clone())
        }

        async fn submit_campus_rating(&self, campus_id: Uuid, request: &SubmitCampusRating) -> ClientResult<CampusRating> {
            self.submissions.fetch_add(1, Ordering::SeqCst);
            Ok(CampusRating {
                id: Uuid::new_v4(),
                campus_id,
                user_id: None,
                overall: request.overall,
                facilities: request.facilities,
                safety: request.safety,
                location: request.location,
                opportunities: request.opportunities,
                internet: request.internet,
                food: request.food,
                clubs: request.clubs,
                review: request.review.clone(),
                helpful_count: 0,
                is_anonymous: request.is_anonymous,
                created_at: Utc::now(),
            })
        }
    }

    fn professor_rating(overall: i16, minutes_ago: i64) -> ProfessorRating {
        ProfessorRating {
            id: Uuid::new_v4(),
            professor_id: Uuid::nil(),
            user_id: None,
            course_id: None,
            overall,
            difficulty: 3,
            clarity: 4,
            helpfulness: 5,
            would_take_again: Some(overall >= 3),
            review: Some(format!("review {minutes_ago}")),
            helpful_count: 0,
            is_anonymous: false,
            created_at: Utc::now() - Duration::minutes(minutes_ago),
        }
    }

    fn tag(name: &str) -> RatingTag {
        RatingTag {
            id: Uuid::new_v4(),
            rating_kind: RatingKind::Professor,
            rating_id: Uuid::nil(),
            tag: name.to_string(),
            created_at: Utc::now(),
        }
    }

    fn campus_request() -> SubmitCampusRating {
        SubmitCampusRating {
            overall: 4,
            facilities: 3,
            safety: 4,
            location: 5,
            opportunities: 4,
            internet: 2,
            food: 4,
            clubs: 5,
            review: None,
            tags: Vec::new(),
            is_anonymous: true,
        }
    }

    #[tokio::test]
    async fn overview_walks_every_page() {
        let remote = FakeRatings {
            professor: (0..250).map(|i| professor_rating(if i % 2 == 0 { 5 } else { 3 }, i)).collect(),
            tags: vec![tag("tough grader"), tag("caring"), tag("caring")],
            ..FakeRatings::default()
        };
        let browser = RatingBrowser::new(remote, MemoryStore::new());

        let overview = browser.professor_overview(Uuid::nil(), RatingSort::Newest).await.unwrap();

        assert_eq!(overview.ratings.len(), 250);
        assert_eq!(browser.remote.pages_fetched.load(Ordering::SeqCst), 3);
        assert_eq!(overview.summary.count, 250);
        assert_eq!(overview.summary.average("overall"), 4.0);
        assert_eq!(overview.summary.top_tags[0].tag, "caring");
        assert_eq!(overview.summary.recent_review.as_deref(), Some("review 0"));
    }

    #[tokio::test]
    async fn empty_target_has_zero_averages() {
        let browser = RatingBrowser::new(FakeRatings::default(), MemoryStore::new());
        let overview = browser.campus_overview(Uuid::nil(), RatingSort::Newest).await.unwrap();
        assert!(overview.ratings.is_empty());
        assert_eq!(overview.summary.average("overall"), 0.0);
        assert!(overview.summary.recent_review.is_none());
    }

    #[tokio::test]
    async fn anonymous_campus_rating_is_once_per_device() {
        let browser = RatingBrowser::new(FakeRatings::default(), MemoryStore::new());
        let campus = Uuid::new_v4();

        browser.submit_campus_rating(campus, &campus_request(), false).await.unwrap();
        assert!(!browser.can_rate_anonymously(campus));

        let err = browser.submit_campus_rating(campus, &campus_request(), false).await.unwrap_err();
        assert!(matches!(err, BrowseError::AlreadyRated));
        assert_eq!(browser.remote.submissions.load(Ordering::SeqCst), 1);

        browser.submit_campus_rating(campus, &campus_request(), true).await.unwrap();
        assert_eq!(browser.remote.submissions.load(Ordering::SeqCst), 2);
        assert!(browser.can_rate_anonymously(Uuid::new_v4()));
    }

    #[test]
    fn fetch_page_size_fits_the_service_cap() {
        assert_eq!(PaginationParams::new(1, FETCH_PAGE_SIZE).limit(), FETCH_PAGE_SIZE);
    }
}
