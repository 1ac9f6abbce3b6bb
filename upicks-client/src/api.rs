use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use std::time::Duration;
use uuid::Uuid;

use upicks_shared::models::{
    Campus, CampusRating, Course, Department, ModerationAction, Professor, ProfessorRating,
    Profile, RatingTag, Report, ReplyView,
};
use upicks_shared::types::{
    AddReplyRequest, ApiErrorResponse, ApiResponse, BatchResult, ChangeRoleRequest,
    CreateReportRequest, Deleted, HelpfulCount, HelpfulDelta, IdsRequest, ModerationStats,
    Paginated, PaginationParams, PendingEntry, ProfessorSearchParams, QueueKind, QueueParams,
    RatingKind, RatingListParams, RatingSummary, ReportFilterParams, ReportStatus,
    ReviewReportRequest, SubmitCampusRating, SubmitCourseRequest, SubmitDepartmentRequest,
    SubmitProfessorRating, SubmitProfessorRequest, UpdateProfileRequest, UserFilterParams,
    UserRole, VoteRef,
};
use upicks_shared::ErrorCode;

use crate::config::ClientConfig;
use crate::error::{ClientError, ClientResult};
use crate::remote::{ModerationRemote, RatingsRemote, ReplyRemote, VoteRemote};

/// Typed access to the ratings and moderation services.
///
/// Every call returns the `data` of the success envelope, or the error
/// envelope decoded into [`ClientError::Api`] with its structured code.
#[derive(Clone)]
pub struct ApiClient {
    http: Client,
    ratings_url: String,
    moderation_url: String,
    token: Option<String>,
}

impl ApiClient {
    pub fn new(config: &ClientConfig) -> ClientResult<Self> {
        let http = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self {
            http,
            ratings_url: config.ratings_url.trim_end_matches('/').to_string(),
            moderation_url: config.moderation_url.trim_end_matches('/').to_string(),
            token: config.access_token.clone(),
        })
    }

    /// Attach the bearer token issued by the auth provider.
    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    pub fn is_signed_in(&self) -> bool {
        self.token.is_some()
    }

    fn ratings(&self, path: &str) -> String {
        format!("{}{path}", self.ratings_url)
    }

    fn moderation(&self, path: &str) -> String {
        format!("{}{path}", self.moderation_url)
    }

    async fn send<T: DeserializeOwned>(&self, request: RequestBuilder) -> ClientResult<T> {
        let request = match &self.token {
            Some(token) => request.bearer_auth(token),
            None => request,
        };
        let response = request.send().await?;
        let status = response.status();
        let body = response.text().await?;
        decode_envelope(status, &body)
    }

    // --- Profile ---

    pub async fn me(&self) -> ClientResult<Profile> {
        self.send(self.http.get(self.ratings("/me"))).await
    }

    pub async fn update_profile(&self, changes: &UpdateProfileRequest) -> ClientResult<Profile> {
        self.send(self.http.patch(self.ratings("/me")).json(changes)).await
    }

    pub async fn list_my_votes(&self) -> ClientResult<Vec<VoteRef>> {
        self.send(self.http.get(self.ratings("/me/votes"))).await
    }

    // --- Catalog ---

    pub async fn campuses(&self) -> ClientResult<Vec<Campus>> {
        self.send(self.http.get(self.ratings("/campuses"))).await
    }

    pub async fn campus(&self, id: Uuid) -> ClientResult<Campus> {
        self.send(self.http.get(self.ratings(&format!("/campuses/{id}")))).await
    }

    pub async fn departments(&self, campus_id: Uuid) -> ClientResult<Vec<Department>> {
        self.send(self.http.get(self.ratings(&format!("/campuses/{campus_id}/departments"))))
            .await
    }

    pub async fn courses(&self, department_id: Uuid) -> ClientResult<Vec<Course>> {
        self.send(self.http.get(self.ratings(&format!("/departments/{department_id}/courses"))))
            .await
    }

    pub async fn search_professors(&self, params: &ProfessorSearchParams) -> ClientResult<Paginated<Professor>> {
        self.send(self.http.get(self.ratings("/professors")).query(params)).await
    }

    pub async fn professor(&self, id: Uuid) -> ClientResult<Professor> {
        self.send(self.http.get(self.ratings(&format!("/professors/{id}")))).await
    }

    pub async fn submit_professor(&self, request: &SubmitProfessorRequest) -> ClientResult<Professor> {
        self.send(self.http.post(self.ratings("/professors")).json(request)).await
    }

    pub async fn submit_department(&self, request: &SubmitDepartmentRequest) -> ClientResult<Department> {
        self.send(self.http.post(self.ratings("/departments")).json(request)).await
    }

    pub async fn submit_course(&self, request: &SubmitCourseRequest) -> ClientResult<Course> {
        self.send(self.http.post(self.ratings("/courses")).json(request)).await
    }

    // --- Ratings ---

    pub async fn list_professor_ratings(
        &self,
        professor_id: Uuid,
        params: &RatingListParams,
    ) -> ClientResult<Paginated<ProfessorRating>> {
        let url = self.ratings(&format!("/professors/{professor_id}/ratings"));
        self.send(self.http.get(url).query(params)).await
    }

    pub async fn list_campus_ratings(
        &self,
        campus_id: Uuid,
        params: &RatingListParams,
    ) -> ClientResult<Paginated<CampusRating>> {
        let url = self.ratings(&format!("/campuses/{campus_id}/ratings"));
        self.send(self.http.get(url).query(params)).await
    }

    pub async fn submit_professor_rating(
        &self,
        professor_id: Uuid,
        request: &SubmitProfessorRating,
    ) -> ClientResult<ProfessorRating> {
        let url = self.ratings(&format!("/professors/{professor_id}/ratings"));
        self.send(self.http.post(url).json(request)).await
    }

    pub async fn post_campus_rating(
        &self,
        campus_id: Uuid,
        request: &SubmitCampusRating,
    ) -> ClientResult<CampusRating> {
        let url = self.ratings(&format!("/campuses/{campus_id}/ratings"));
        self.send(self.http.post(url).json(request)).await
    }

    pub async fn list_tags(&self, kind: RatingKind, target_id: Uuid) -> ClientResult<Vec<RatingTag>> {
        let url = self.ratings(&format!("/{}/{target_id}/tags", kind.collection()));
        self.send(self.http.get(url)).await
    }

    /// Server-side aggregate, served from the summary cache when warm.
    pub async fn summary(&self, kind: RatingKind, target_id: Uuid) -> ClientResult<RatingSummary> {
        let url = self.ratings(&format!("/{}/{target_id}/summary", kind.collection()));
        self.send(self.http.get(url)).await
    }

    // --- Helpful votes ---

    fn vote_url(&self, vote: VoteRef, leaf: &str) -> String {
        self.ratings(&format!("/ratings/{}/{}/{leaf}", vote.rating_kind, vote.rating_id))
    }

    pub async fn add_vote(&self, vote: VoteRef) -> ClientResult<VoteRef> {
        self.send(self.http.post(self.vote_url(vote, "votes"))).await
    }

    pub async fn remove_vote(&self, vote: VoteRef) -> ClientResult<VoteRef> {
        self.send(self.http.delete(self.vote_url(vote, "votes"))).await
    }

    pub async fn helpful(&self, vote: VoteRef, delta: i32) -> ClientResult<HelpfulCount> {
        self.send(self.http.post(self.vote_url(vote, "helpful")).json(&HelpfulDelta { delta }))
            .await
    }

    // --- Replies ---

    pub async fn replies(&self, kind: RatingKind, rating_id: Uuid) -> ClientResult<Vec<ReplyView>> {
        let url = self.ratings(&format!("/ratings/{kind}/{rating_id}/replies"));
        self.send(self.http.get(url)).await
    }

    pub async fn post_reply(
        &self,
        kind: RatingKind,
        rating_id: Uuid,
        request: &AddReplyRequest,
    ) -> ClientResult<ReplyView> {
        let url = self.ratings(&format!("/ratings/{kind}/{rating_id}/replies"));
        self.send(self.http.post(url).json(request)).await
    }

    pub async fn remove_reply(&self, reply_id: Uuid) -> ClientResult<Deleted> {
        self.send(self.http.delete(self.ratings(&format!("/replies/{reply_id}")))).await
    }

    // --- Moderation ---

    pub async fn create_report(&self, request: &CreateReportRequest) -> ClientResult<Report> {
        self.send(self.http.post(self.moderation("/reports")).json(request)).await
    }

    pub async fn queue(&self, queue: QueueKind, params: &QueueParams) -> ClientResult<Paginated<PendingEntry>> {
        let url = self.moderation(&format!("/admin/queues/{queue}"));
        self.send(self.http.get(url).query(params)).await
    }

    pub async fn approve_entries(&self, queue: QueueKind, ids: &[Uuid]) -> ClientResult<BatchResult> {
        let url = self.moderation(&format!("/admin/queues/{queue}/approve"));
        self.send(self.http.post(url).json(&IdsRequest { ids: ids.to_vec() })).await
    }

    pub async fn reject_entries(&self, queue: QueueKind, ids: &[Uuid]) -> ClientResult<BatchResult> {
        let url = self.moderation(&format!("/admin/queues/{queue}/reject"));
        self.send(self.http.post(url).json(&IdsRequest { ids: ids.to_vec() })).await
    }

    pub async fn approve_entry(&self, queue: QueueKind, id: Uuid) -> ClientResult<BatchResult> {
        let url = self.moderation(&format!("/admin/queues/{queue}/{id}/approve"));
        self.send(self.http.put(url)).await
    }

    pub async fn reject_entry(&self, queue: QueueKind, id: Uuid) -> ClientResult<BatchResult> {
        let url = self.moderation(&format!("/admin/queues/{queue}/{id}"));
        self.send(self.http.delete(url)).await
    }

    pub async fn reports(&self, params: &ReportFilterParams) -> ClientResult<Paginated<Report>> {
        self.send(self.http.get(self.moderation("/admin/reports")).query(params)).await
    }

    pub async fn review_report(&self, report_id: Uuid, status: ReportStatus) -> ClientResult<Report> {
        let url = self.moderation(&format!("/admin/reports/{report_id}"));
        self.send(self.http.put(url).json(&ReviewReportRequest { status })).await
    }

    pub async fn take_down_rating(&self, kind: RatingKind, rating_id: Uuid) -> ClientResult<Deleted> {
        let url = self.moderation(&format!("/admin/ratings/{kind}/{rating_id}"));
        self.send(self.http.delete(url)).await
    }

    pub async fn take_down_reply(&self, reply_id: Uuid) -> ClientResult<Deleted> {
        let url = self.moderation(&format!("/admin/replies/{reply_id}"));
        self.send(self.http.delete(url)).await
    }

    pub async fn users(&self, params: &UserFilterParams) -> ClientResult<Paginated<Profile>> {
        self.send(self.http.get(self.moderation("/admin/users")).query(params)).await
    }

    pub async fn set_role(&self, user_id: Uuid, role: UserRole) -> ClientResult<Profile> {
        let url = self.moderation(&format!("/admin/users/{user_id}/role"));
        self.send(self.http.put(url).json(&ChangeRoleRequest { role })).await
    }

    pub async fn moderation_stats(&self) -> ClientResult<ModerationStats> {
        self.send(self.http.get(self.moderation("/admin/stats"))).await
    }

    pub async fn audit_log(&self, params: &PaginationParams) -> ClientResult<Paginated<ModerationAction>> {
        self.send(self.http.get(self.moderation("/admin/audit-log")).query(params)).await
    }
}

/// Unwrap a service response body.
pub(crate) fn decode_envelope<T: DeserializeOwned>(status: StatusCode, body: &str) -> ClientResult<T> {
    if status.is_success() {
        return serde_json::from_str::<ApiResponse<T>>(body)
            .map(|envelope| envelope.data)
            .map_err(|e| ClientError::Decode(format!("{status}: {e}")));
    }

    match serde_json::from_str::<ApiErrorResponse>(body) {
        Ok(envelope) => Err(ClientError::Api {
            status: status.as_u16(),
            code: ErrorCode::from_code(&envelope.error.code),
            message: envelope.error.message,
        }),
        Err(_) => Err(ClientError::Decode(format!("{status} with unreadable body"))),
    }
}

// --- Remote seams ---

#[async_trait]
impl VoteRemote for ApiClient {
    async fn my_votes(&self) -> ClientResult<Vec<VoteRef>> {
        self.list_my_votes().await
    }

    async fn insert_vote(&self, vote: VoteRef) -> ClientResult<()> {
        self.add_vote(vote).await.map(|_| ())
    }

    async fn delete_vote(&self, vote: VoteRef) -> ClientResult<()> {
        self.remove_vote(vote).await.map(|_| ())
    }

    async fn change_helpful(&self, vote: VoteRef, delta: i32) -> ClientResult<HelpfulCount> {
        self.helpful(vote, delta).await
    }
}

#[async_trait]
impl ReplyRemote for ApiClient {
    async fn list_replies(&self, kind: RatingKind, rating_id: Uuid) -> ClientResult<Vec<ReplyView>> {
        self.replies(kind, rating_id).await
    }

    async fn add_reply(
        &self,
        kind: RatingKind,
        rating_id: Uuid,
        request: &AddReplyRequest,
    ) -> ClientResult<ReplyView> {
        self.post_reply(kind, rating_id, request).await
    }

    async fn delete_reply(&self, reply_id: Uuid) -> ClientResult<()> {
        self.remove_reply(reply_id).await.map(|_| ())
    }
}

#[async_trait]
impl RatingsRemote for ApiClient {
    async fn professor_ratings(
        &self,
        professor_id: Uuid,
        params: &RatingListParams,
    ) -> ClientResult<Paginated<ProfessorRating>> {
        self.list_professor_ratings(professor_id, params).await
    }

    async fn campus_ratings(
        &self,
        campus_id: Uuid,
        params: &RatingListParams,
    ) -> ClientResult<Paginated<CampusRating>> {
        self.list_campus_ratings(campus_id, params).await
    }

    async fn tags(&self, kind: RatingKind, target_id: Uuid) -> ClientResult<Vec<RatingTag>> {
        self.list_tags(kind, target_id).await
    }

    async fn submit_campus_rating(
        &self,
        campus_id: Uuid,
        request: &SubmitCampusRating,
    ) -> ClientResult<CampusRating> {
        self.post_campus_rating(campus_id, request).await
    }
}

#[async_trait]
impl ModerationRemote for ApiClient {
    async fn list_queue(&self, queue: QueueKind, params: &QueueParams) -> ClientResult<Paginated<PendingEntry>> {
        self.queue(queue, params).await
    }

    async fn approve_batch(&self, queue: QueueKind, ids: &[Uuid]) -> ClientResult<BatchResult> {
        self.approve_entries(queue, ids).await
    }

    async fn reject_batch(&self, queue: QueueKind, ids: &[Uuid]) -> ClientResult<BatchResult> {
        self.reject_entries(queue, ids).await
    }

    async fn approve_one(&self, queue: QueueKind, id: Uuid) -> ClientResult<BatchResult> {
        self.approve_entry(queue, id).await
    }

    async fn reject_one(&self, queue: QueueKind, id: Uuid) -> ClientResult<BatchResult> {
        self.reject_entry(queue, id).await
    }

    async fn change_role(&self, user_id: Uuid, role: UserRole) -> ClientResult<Profile> {
        self.set_role(user_id, role).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn success_envelope_yields_data() {
        let body = r#"{"success":true,"data":{"rating_id":"00000000-0000-0000-0000-000000000000","helpful_count":4}}"#;
        let count: HelpfulCount = decode_envelope(StatusCode::OK, body).unwrap();
        assert_eq!(count.helpful_count, 4);
    }

    #[test]
    fn error_envelope_carries_structured_code() {
        let body = r#"{"success":false,"error":{"code":"E3002","message":"This rating already has 3 replies, the maximum allowed"}}"#;
        let err = decode_envelope::<ReplyView>(StatusCode::CONFLICT, body).unwrap_err();
        assert!(err.is(ErrorCode::ReplyQuotaExceeded));
        assert!(err.to_string().contains("3 replies"));
        match err {
            ClientError::Api { status, .. } => assert_eq!(status, 409),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn unknown_code_is_kept_as_api_error() {
        let body = r#"{"success":false,"error":{"code":"E9999","message":"new failure"}}"#;
        let err = decode_envelope::<Deleted>(StatusCode::BAD_REQUEST, body).unwrap_err();
        assert!(matches!(err, ClientError::Api { code: None, .. }));
    }

    #[test]
    fn unreadable_bodies_are_decode_errors() {
        let err = decode_envelope::<Deleted>(StatusCode::BAD_GATEWAY, "<html>bad gateway</html>").unwrap_err();
        assert!(matches!(err, ClientError::Decode(_)));

        let err = decode_envelope::<Deleted>(StatusCode::OK, r#"{"success":true}"#).unwrap_err();
        assert!(matches!(err, ClientError::Decode(_)));
    }

    #[test]
    fn base_urls_lose_trailing_slash() {
        let config = ClientConfig {
            ratings_url: "http://ratings.local/".into(),
            ..ClientConfig::default()
        };
        let client = ApiClient::new(&config).unwrap();
        assert_eq!(client.ratings("/me"), "http://ratings.local/me");
        assert!(!client.is_signed_in());
        assert!(client.with_token("abc").is_signed_in());
    }
}
