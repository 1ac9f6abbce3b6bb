//! Reduction of fetched rating rows into what a professor or campus page
//! shows: per-dimension averages, the most frequent tags and the latest
//! review. Everything here is a pure function of its inputs.

use chrono::{DateTime, Utc};
use std::collections::HashMap;

use crate::models::{CampusRating, ProfessorRating};
use crate::types::{DimensionAverage, RatingSort, RatingSummary, TagCount};

pub const TOP_TAGS: usize = 5;

/// A rating row the aggregator can reduce.
pub trait RatingRow {
    /// Scored dimensions, in display order. The first one is the overall score.
    const DIMENSIONS: &'static [&'static str];

    fn score(&self, dimension: &str) -> Option<i16>;
    fn review(&self) -> Option<&str>;
    fn created_at(&self) -> DateTime<Utc>;
    fn helpful_count(&self) -> i32;

    fn would_take_again(&self) -> Option<bool> {
        None
    }

    fn overall(&self) -> i16 {
        Self::DIMENSIONS
            .first()
            .and_then(|d| self.score(d))
            .unwrap_or(0)
    }
}

/// `sum / count` over one dimension, `0` for no rows. A missing score adds
/// nothing to the sum but still counts as a row.
pub fn average<R: RatingRow>(rows: &[R], dimension: &str) -> f64 {
    if rows.is_empty() {
        return 0.0;
    }
    let sum: i64 = rows
        .iter()
        .map(|r| i64::from(r.score(dimension).unwrap_or(0)))
        .sum();
    sum as f64 / rows.len() as f64
}

/// The five most frequent tags. Ties keep the order in which tags were
/// first seen.
pub fn top_tags<'a>(tags: impl IntoIterator<Item = &'a str>) -> Vec<TagCount> {
    let mut counts: Vec<TagCount> = Vec::new();
    let mut index: HashMap<&'a str, usize> = HashMap::new();

    for tag in tags {
        match index.get(tag) {
            Some(&i) => counts[i].count += 1,
            None => {
                index.insert(tag, counts.len());
                counts.push(TagCount {
                    tag: tag.to_string(),
                    count: 1,
                });
            }
        }
    }

    // stable: equal counts stay in first-seen order
    counts.sort_by(|a, b| b.count.cmp(&a.count));
    counts.truncate(TOP_TAGS);
    counts
}

/// Review text of the newest row. Among rows created at the same instant
/// the earliest in the input wins.
pub fn most_recent_review<R: RatingRow>(rows: &[R]) -> Option<String> {
    let newest = rows.iter().fold(None::<&R>, |best, row| match best {
        Some(b) if b.created_at() >= row.created_at() => Some(b),
        _ => Some(row),
    })?;
    newest.review().map(str::to_string)
}

/// Share of "yes" among rows that answered, as a percentage.
pub fn would_take_again_percent<R: RatingRow>(rows: &[R]) -> Option<f64> {
    let answers: Vec<bool> = rows.iter().filter_map(|r| r.would_take_again()).collect();
    if answers.is_empty() {
        return None;
    }
    let yes = answers.iter().filter(|a| **a).count();
    Some(yes as f64 * 100.0 / answers.len() as f64)
}

pub fn summarize<'a, R: RatingRow>(
    rows: &[R],
    tags: impl IntoIterator<Item = &'a str>,
) -> RatingSummary {
    RatingSummary {
        count: rows.len(),
        averages: R::DIMENSIONS
            .iter()
            .map(|d| DimensionAverage {
                dimension: d.to_string(),
                average: average(rows, d),
            })
            .collect(),
        would_take_again_percent: would_take_again_percent(rows),
        top_tags: top_tags(tags),
        recent_review: most_recent_review(rows),
    }
}

/// Stable in-place ordering for rating lists.
pub fn sort_ratings<R: RatingRow>(rows: &mut [R], sort: RatingSort) {
    match sort {
        RatingSort::Newest => rows.sort_by(|a, b| b.created_at().cmp(&a.created_at())),
        RatingSort::Oldest => rows.sort_by_key(|r| r.created_at()),
        RatingSort::MostHelpful => rows.sort_by(|a, b| b.helpful_count().cmp(&a.helpful_count())),
        RatingSort::Highest => rows.sort_by(|a, b| b.overall().cmp(&a.overall())),
        RatingSort::Lowest => rows.sort_by_key(|r| r.overall()),
    }
}

impl RatingRow for ProfessorRating {
    const DIMENSIONS: &'static [&'static str] = &["overall", "difficulty", "clarity", "helpfulness"];

    fn score(&self, dimension: &str) -> Option<i16> {
        match dimension {
            "overall" => Some(self.overall),
            "difficulty" => Some(self.difficulty),
            "clarity" => Some(self.clarity),
            "helpfulness" => Some(self.helpfulness),
            _ => None,
        }
    }

    fn review(&self) -> Option<&str> {
        self.review.as_deref()
    }

    fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    fn helpful_count(&self) -> i32 {
        self.helpful_count
    }

    fn would_take_again(&self) -> Option<bool> {
        self.would_take_again
    }
}

impl RatingRow for CampusRating {
    const DIMENSIONS: &'static [&'static str] = &[
        "overall",
        "facilities",
        "safety",
        "location",
        "opportunities",
        "internet",
        "food",
        "clubs",
    ];

    fn score(&self, dimension: &str) -> Option<i16> {
        match dimension {
            "overall" => Some(self.overall),
            "facilities" => Some(self.facilities),
            "safety" => Some(self.safety),
            "location" => Some(self.location),
            "opportunities" => Some(self.opportunities),
            "internet" => Some(self.internet),
            "food" => Some(self.food),
            "clubs" => Some(self.clubs),
            _ => None,
        }
    }

    fn review(&self) -> Option<&str> {
        self.review.as_deref()
    }

    fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    fn helpful_count(&self) -> i32 {
        self.helpful_count
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};
    use uuid::Uuid;

    /// Loosely-filled row: any dimension may be missing.
    struct Row {
        overall: Option<i16>,
        review: Option<&'static str>,
        minutes: i64,
        helpful: i32,
    }

    impl RatingRow for Row {
        const DIMENSIONS: &'static [&'static str] = &["overall"];

        fn score(&self, dimension: &str) -> Option<i16> {
            (dimension == "overall").then_some(self.overall).flatten()
        }

        fn review(&self) -> Option<&str> {
            self.review
        }

        fn created_at(&self) -> DateTime<Utc> {
            Utc.with_ymd_and_hms(2024, 8, 1, 0, 0, 0).unwrap() + Duration::minutes(self.minutes)
        }

        fn helpful_count(&self) -> i32 {
            self.helpful
        }
    }

    fn row(overall: Option<i16>, minutes: i64) -> Row {
        Row { overall, review: None, minutes, helpful: 0 }
    }

    #[test]
    fn average_of_two_rows() {
        let rows = vec![row(Some(4), 0), row(Some(2), 1)];
        assert_eq!(average(&rows, "overall"), 3.0);
    }

    #[test]
    fn average_of_nothing_is_zero() {
        let rows: Vec<Row> = vec![];
        assert_eq!(average(&rows, "overall"), 0.0);

        let summary = summarize(&rows, std::iter::empty());
        assert_eq!(summary.count, 0);
        assert_eq!(summary.average("overall"), 0.0);
        assert!(summary.top_tags.is_empty());
        assert_eq!(summary.recent_review, None);
        assert_eq!(summary.would_take_again_percent, None);
    }

    #[test]
    fn missing_score_counts_as_zero() {
        let rows = vec![row(Some(5), 0), row(None, 1)];
        assert_eq!(average(&rows, "overall"), 2.5);
    }

    #[test]
    fn average_is_sum_over_count() {
        let scores = [1, 5, 3, 4, 4, 2, 5];
        let rows: Vec<Row> = scores.iter().map(|s| row(Some(*s), 0)).collect();
        let sum: i16 = scores.iter().sum();
        assert_eq!(average(&rows, "overall"), f64::from(sum) / scores.len() as f64);
    }

    #[test]
    fn top_tags_by_frequency() {
        let tags = ["clear", "clear", "strict"];
        let top = top_tags(tags.iter().copied());
        let names: Vec<&str> = top.iter().map(|t| t.tag.as_str()).collect();
        assert_eq!(names, vec!["clear", "strict"]);
        assert_eq!(top[0].count, 2);
    }

    #[test]
    fn top_tags_ties_keep_first_seen_order_and_cap_at_five() {
        let tags = ["b", "a", "c", "d", "e", "f", "a", "f"];
        let names: Vec<String> = top_tags(tags.iter().copied()).into_iter().map(|t| t.tag).collect();
        assert_eq!(names, vec!["a", "f", "b", "c", "d"]);
    }

    #[test]
    fn most_recent_review_uses_newest_row() {
        let rows = vec![
            Row { overall: Some(3), review: Some("old"), minutes: 0, helpful: 0 },
            Row { overall: Some(3), review: Some("newest"), minutes: 30, helpful: 0 },
            Row { overall: Some(3), review: Some("middle"), minutes: 10, helpful: 0 },
        ];
        assert_eq!(most_recent_review(&rows).as_deref(), Some("newest"));
    }

    #[test]
    fn most_recent_review_without_text() {
        let rows = vec![
            Row { overall: Some(3), review: Some("older"), minutes: 0, helpful: 0 },
            Row { overall: Some(3), review: None, minutes: 5, helpful: 0 },
        ];
        assert_eq!(most_recent_review(&rows), None);
    }

    #[test]
    fn sort_orders() {
        let mut rows = vec![
            Row { overall: Some(2), review: Some("a"), minutes: 0, helpful: 5 },
            Row { overall: Some(5), review: Some("b"), minutes: 20, helpful: 1 },
            Row { overall: Some(4), review: Some("c"), minutes: 10, helpful: 9 },
        ];
        let order = |rows: &[Row]| rows.iter().map(|r| r.review.unwrap()).collect::<String>();

        sort_ratings(&mut rows, RatingSort::Newest);
        assert_eq!(order(&rows), "bca");
        sort_ratings(&mut rows, RatingSort::MostHelpful);
        assert_eq!(order(&rows), "cab");
        sort_ratings(&mut rows, RatingSort::Lowest);
        assert_eq!(order(&rows), "acb");
        sort_ratings(&mut rows, RatingSort::Highest);
        assert_eq!(order(&rows), "bca");
        sort_ratings(&mut rows, RatingSort::Oldest);
        assert_eq!(order(&rows), "acb");
    }

    #[test]
    fn professor_summary_covers_every_dimension() {
        let base = ProfessorRating {
            id: Uuid::new_v4(),
            professor_id: Uuid::new_v4(),
            user_id: None,
            course_id: None,
            overall: 5,
            difficulty: 2,
            clarity: 4,
            helpfulness: 5,
            would_take_again: Some(true),
            review: Some("Explains proofs slowly and clearly.".into()),
            helpful_count: 3,
            is_anonymous: true,
            created_at: Utc::now(),
        };
        let second = ProfessorRating {
            id: Uuid::new_v4(),
            overall: 3,
            difficulty: 4,
            would_take_again: Some(false),
            review: None,
            created_at: base.created_at - Duration::days(1),
            ..base.clone()
        };

        let summary = summarize(&[base, second], ["clear", "tough grader", "clear"]);
        assert_eq!(summary.count, 2);
        assert_eq!(summary.average("overall"), 4.0);
        assert_eq!(summary.average("difficulty"), 3.0);
        assert_eq!(summary.averages.len(), ProfessorRating::DIMENSIONS.len());
        assert_eq!(summary.would_take_again_percent, Some(50.0));
        assert_eq!(summary.top_tags[0].tag, "clear");
        assert_eq!(summary.recent_review.as_deref(), Some("Explains proofs slowly and clearly."));
    }
}
