use uuid::Uuid;

use upicks_shared::models::ReplyView;
use upicks_shared::types::{normalize_reply_content, AddReplyRequest, RatingKind};
use upicks_shared::ErrorCode;

use crate::error::ClientError;
use crate::remote::ReplyRemote;

#[derive(Debug, thiserror::Error)]
pub enum ReplyError {
    /// Rejected locally; no request was sent.
    #[error("{0}")]
    Invalid(String),

    /// The service's own message, which names the quota.
    #[error("{0}")]
    QuotaExceeded(String),

    #[error("{0}")]
    DeleteWindowExpired(String),

    #[error("only the author can delete this reply")]
    NotAuthor,

    #[error(transparent)]
    Remote(ClientError),
}

impl From<ClientError> for ReplyError {
    fn from(err: ClientError) -> Self {
        match (err.code(), &err) {
            (Some(ErrorCode::ReplyQuotaExceeded), ClientError::Api { message, .. }) => {
                ReplyError::QuotaExceeded(message.clone())
            }
            (Some(ErrorCode::ReplyDeleteWindowExpired), ClientError::Api { message, .. }) => {
                ReplyError::DeleteWindowExpired(message.clone())
            }
            (Some(ErrorCode::NotReplyAuthor), _) => ReplyError::NotAuthor,
            _ => ReplyError::Remote(err),
        }
    }
}

/// Replies under one rating, as last fetched plus local additions.
pub struct ReplyThread<R> {
    remote: R,
    kind: RatingKind,
    rating_id: Uuid,
    replies: Vec<ReplyView>,
}

impl<R: ReplyRemote> ReplyThread<R> {
    pub fn new(remote: R, kind: RatingKind, rating_id: Uuid) -> Self {
        Self {
            remote,
            kind,
            rating_id,
            replies: Vec::new(),
        }
    }

    pub fn replies(&self) -> &[ReplyView] {
        &self.replies
    }

    pub async fn load(&mut self) -> Result<&[ReplyView], ReplyError> {
        self.replies = self.remote.list_replies(self.kind, self.rating_id).await?;
        Ok(&self.replies)
    }

    /// Post a reply. Content is trimmed and must be 1 to 500 characters;
    /// anything else fails before a request is made.
    pub async fn add_reply(&mut self, content: &str, anonymous: bool) -> Result<&ReplyView, ReplyError> {
        let content = normalize_reply_content(content).map_err(ReplyError::Invalid)?;
        let request = AddReplyRequest {
            content,
            is_anonymous: anonymous,
        };

        let reply = self
            .remote
            .add_reply(self.kind, self.rating_id, &request)
            .await
            .inspect_err(|e| tracing::warn!(rating_id = %self.rating_id, error = %e, "reply rejected"))?;

        self.replies.push(reply);
        Ok(&self.replies[self.replies.len() - 1])
    }

    pub async fn delete_reply(&mut self, reply_id: Uuid) -> Result<(), ReplyError> {
        self.remote.delete_reply(reply_id).await?;
        self.replies.retain(|r| r.id != reply_id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chrono::Utc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    use crate::error::ClientResult;

    const QUOTA_MESSAGE: &str = "This rating already has 3 replies, the maximum allowed";

    /// Enforces the per-rating quota the way the ratings service does.
    #[derive(Default)]
    struct FakeReplies {
        stored: Mutex<Vec<ReplyView>>,
        requests: AtomicUsize,
    }

    #[async_trait]
    impl ReplyRemote for FakeReplies {
        async fn list_replies(&self, _kind: RatingKind, _rating_id: Uuid) -> ClientResult<Vec<ReplyView>> {
            Ok(self.stored.lock().unwrap().clone())
        }

        async fn add_reply(
            &self,
            kind: RatingKind,
            rating_id: Uuid,
            request: &AddReplyRequest,
        ) -> ClientResult<ReplyView> {
            self.requests.fetch_add(1, Ordering::SeqCst);
            let mut stored = self.stored.lock().unwrap();
            if stored.len() >= 3 {
                return Err(ClientError::Api {
                    status: 409,
                    code: Some(ErrorCode::ReplyQuotaExceeded),
                    message: QUOTA_MESSAGE.into(),
                });
            }
            let reply = ReplyView {
                id: Uuid::new_v4(),
                rating_kind: kind,
                rating_id,
                author_id: None,
                content: request.content.clone(),
                is_anonymous: request.is_anonymous,
                created_at: Utc::now(),
            };
            stored.push(reply.clone());
            Ok(reply)
        }

        async fn delete_reply(&self, reply_id: Uuid) -> ClientResult<()> {
            self.requests.fetch_add(1, Ordering::SeqCst);
            let mut stored = self.stored.lock().unwrap();
            let before = stored.len();
            stored.retain(|r| r.id != reply_id);
            if stored.len() == before {
                return Err(ClientError::Api {
                    status: 403,
                    code: Some(ErrorCode::ReplyDeleteWindowExpired),
                    message: "replies can only be deleted within 24 hours of posting".into(),
                });
            }
            Ok(())
        }
    }

    fn thread() -> ReplyThread<FakeReplies> {
        ReplyThread::new(FakeReplies::default(), RatingKind::Campus, Uuid::new_v4())
    }

    #[tokio::test]
    async fn too_long_reply_never_reaches_the_service() {
        let mut thread = thread();
        let err = thread.add_reply(&"a".repeat(501), false).await.unwrap_err();
        assert!(matches!(err, ReplyError::Invalid(_)));

        let err = thread.add_reply("   \n ", false).await.unwrap_err();
        assert!(matches!(err, ReplyError::Invalid(_)));

        assert_eq!(thread.remote.requests.load(Ordering::SeqCst), 0);
        assert!(thread.replies().is_empty());
    }

    #[tokio::test]
    async fn content_is_trimmed_and_appended() {
        let mut thread = thread();
        let reply = thread.add_reply("  same experience here  ", true).await.unwrap();
        assert_eq!(reply.content, "same experience here");
        assert!(reply.is_anonymous);
        assert_eq!(thread.replies().len(), 1);
    }

    #[tokio::test]
    async fn quota_error_keeps_service_message() {
        let mut thread = thread();
        for n in 0..3 {
            thread.add_reply(&format!("reply {n}"), false).await.unwrap();
        }

        let err = thread.add_reply("one more", false).await.unwrap_err();
        match err {
            ReplyError::QuotaExceeded(message) => {
                assert_eq!(message, QUOTA_MESSAGE);
                assert!(message.contains("3 replies"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(thread.replies().len(), 3);
    }

    #[tokio::test]
    async fn delete_removes_locally_and_maps_window_error() {
        let mut thread = thread();
        let id = thread.add_reply("typo, reposting", false).await.unwrap().id;

        thread.delete_reply(id).await.unwrap();
        assert!(thread.replies().is_empty());

        let err = thread.delete_reply(id).await.unwrap_err();
        assert!(matches!(err, ReplyError::DeleteWindowExpired(_)));
    }

    #[tokio::test]
    async fn load_replaces_local_list() {
        let mut thread = thread();
        thread.add_reply("first", false).await.unwrap();
        thread.remote.stored.lock().unwrap().clear();
        assert!(thread.load().await.unwrap().is_empty());
    }

    #[test]
    fn unrelated_codes_stay_remote() {
        let err = ReplyError::from(ClientError::Api {
            status: 404,
            code: Some(ErrorCode::RatingNotFound),
            message: "rating not found".into(),
        });
        assert!(matches!(err, ReplyError::Remote(_)));
        assert!(matches!(
            ReplyError::from(ClientError::Api { status: 403, code: Some(ErrorCode::NotReplyAuthor), message: String::new() }),
            ReplyError::NotAuthor
        ));
    }
}
