//! Seams between the client flows and the services. `ApiClient` implements
//! every trait; tests substitute in-memory fakes.

use async_trait::async_trait;
use uuid::Uuid;

use upicks_shared::models::{CampusRating, ProfessorRating, Profile, RatingTag, ReplyView};
use upicks_shared::types::{
    AddReplyRequest, BatchResult, HelpfulCount, Paginated, PendingEntry, QueueKind, QueueParams,
    RatingKind, RatingListParams, SubmitCampusRating, UserRole, VoteRef,
};

use crate::error::ClientResult;

#[async_trait]
pub trait VoteRemote: Send + Sync {
    async fn my_votes(&self) -> ClientResult<Vec<VoteRef>>;
    async fn insert_vote(&self, vote: VoteRef) -> ClientResult<()>;
    async fn delete_vote(&self, vote: VoteRef) -> ClientResult<()>;
    /// The helpful-counter procedure; `delta` is `1` or `-1`.
    async fn change_helpful(&self, vote: VoteRef, delta: i32) -> ClientResult<HelpfulCount>;
}

#[async_trait]
pub trait ReplyRemote: Send + Sync {
    async fn list_replies(&self, kind: RatingKind, rating_id: Uuid) -> ClientResult<Vec<ReplyView>>;
    async fn add_reply(
        &self,
        kind: RatingKind,
        rating_id: Uuid,
        request: &AddReplyRequest,
    ) -> ClientResult<ReplyView>;
    async fn delete_reply(&self, reply_id: Uuid) -> ClientResult<()>;
}

#[async_trait]
pub trait RatingsRemote: Send + Sync {
    async fn professor_ratings(
        &self,
        professor_id: Uuid,
        params: &RatingListParams,
    ) -> ClientResult<Paginated<ProfessorRating>>;
    async fn campus_ratings(
        &self,
        campus_id: Uuid,
        params: &RatingListParams,
    ) -> ClientResult<Paginated<CampusRating>>;
    async fn tags(&self, kind: RatingKind, target_id: Uuid) -> ClientResult<Vec<RatingTag>>;
    async fn submit_campus_rating(
        &self,
        campus_id: Uuid,
        request: &SubmitCampusRating,
    ) -> ClientResult<CampusRating>;
}

#[async_trait]
pub trait ModerationRemote: Send + Sync {
    async fn list_queue(&self, queue: QueueKind, params: &QueueParams) -> ClientResult<Paginated<PendingEntry>>;
    async fn approve_batch(&self, queue: QueueKind, ids: &[Uuid]) -> ClientResult<BatchResult>;
    async fn reject_batch(&self, queue: QueueKind, ids: &[Uuid]) -> ClientResult<BatchResult>;
    async fn approve_one(&self, queue: QueueKind, id: Uuid) -> ClientResult<BatchResult>;
    async fn reject_one(&self, queue: QueueKind, id: Uuid) -> ClientResult<BatchResult>;
    async fn change_role(&self, user_id: Uuid, role: UserRole) -> ClientResult<Profile>;
}
