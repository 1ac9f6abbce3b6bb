use std::collections::HashSet;
use uuid::Uuid;

use upicks_shared::models::Profile;
use upicks_shared::types::{BatchResult, PendingEntry, QueueKind, QueueParams, UserRole};

use crate::error::ClientError;
use crate::remote::ModerationRemote;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfirmAction {
    Reject,
    ChangeRole(UserRole),
}

/// Prompt shown before a destructive moderator action.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Confirmation {
    pub action: ConfirmAction,
    pub count: usize,
    pub message: String,
}

#[derive(Debug, thiserror::Error)]
pub enum ModerationError {
    #[error("nothing selected")]
    NothingSelected,

    #[error(transparent)]
    Remote(#[from] ClientError),
}

/// Moderator view of one verification queue: the fetched page, the rows the
/// moderator ticked, and the search and page controls.
pub struct ModerationWorkflow<R> {
    remote: R,
    queue: QueueKind,
    entries: Vec<PendingEntry>,
    selection: HashSet<Uuid>,
    filter: String,
    page: u64,
    per_page: u64,
    total: u64,
    total_pages: u64,
}

impl<R: ModerationRemote> ModerationWorkflow<R> {
    pub fn new(remote: R, queue: QueueKind) -> Self {
        Self {
            remote,
            queue,
            entries: Vec::new(),
            selection: HashSet::new(),
            filter: String::new(),
            page: 1,
            per_page: 20,
            total: 0,
            total_pages: 0,
        }
    }

    pub fn queue(&self) -> QueueKind {
        self.queue
    }

    pub fn entries(&self) -> &[PendingEntry] {
        &self.entries
    }

    pub fn selection(&self) -> &HashSet<Uuid> {
        &self.selection
    }

    pub fn page(&self) -> u64 {
        self.page
    }

    pub fn total(&self) -> u64 {
        self.total
    }

    pub fn total_pages(&self) -> u64 {
        self.total_pages
    }

    // --- Fetching ---

    pub async fn refresh(&mut self) -> Result<&[PendingEntry], ModerationError> {
        let params = QueueParams {
            q: Some(self.filter.clone()).filter(|q| !q.trim().is_empty()),
            page: self.page,
            per_page: self.per_page,
        };
        let page = self.remote.list_queue(self.queue, &params).await?;

        self.total = page.total;
        self.total_pages = page.total_pages;
        self.entries = page.items;
        let visible: HashSet<Uuid> = self.entries.iter().map(|e| e.id).collect();
        self.selection.retain(|id| visible.contains(id));
        Ok(&self.entries)
    }

    /// Change the search text and go back to the first page.
    pub async fn set_filter(&mut self, filter: &str) -> Result<&[PendingEntry], ModerationError> {
        self.filter = filter.trim().to_string();
        self.page = 1;
        self.refresh().await
    }

    pub async fn set_page(&mut self, page: u64) -> Result<&[PendingEntry], ModerationError> {
        self.page = page.max(1);
        self.refresh().await
    }

    // --- Selection ---

    pub fn toggle_selected(&mut self, id: Uuid) -> bool {
        if !self.selection.remove(&id) {
            self.selection.insert(id);
            return true;
        }
        false
    }

    pub fn select_all(&mut self) {
        self.selection = self.entries.iter().map(|e| e.id).collect();
    }

    pub fn clear_selection(&mut self) {
        self.selection.clear();
    }

    // --- Actions ---

    pub async fn approve_all(&mut self, ids: &[Uuid]) -> Result<BatchResult, ModerationError> {
        if ids.is_empty() {
            return Err(ModerationError::NothingSelected);
        }
        let result = self.remote.approve_batch(self.queue, ids).await?;
        self.drop_entries(ids, result.affected);
        tracing::info!(queue = %self.queue, requested = result.requested, affected = result.affected, "approved");
        Ok(result)
    }

    /// Reject `ids` once `confirm` agrees. A declined prompt returns
    /// `Ok(None)` without contacting the service.
    pub async fn reject_all<F>(&mut self, ids: &[Uuid], confirm: F) -> Result<Option<BatchResult>, ModerationError>
    where
        F: FnOnce(&Confirmation) -> bool,
    {
        if ids.is_empty() {
            return Err(ModerationError::NothingSelected);
        }
        let prompt = Confirmation {
            action: ConfirmAction::Reject,
            count: ids.len(),
            message: format!(
                "Reject {} pending {}? They will be deleted.",
                ids.len(),
                self.queue
            ),
        };
        if !confirm(&prompt) {
            return Ok(None);
        }

        let result = self.remote.reject_batch(self.queue, ids).await?;
        self.drop_entries(ids, result.affected);
        tracing::info!(queue = %self.queue, requested = result.requested, affected = result.affected, "rejected");
        Ok(Some(result))
    }

    pub async fn approve_selected(&mut self) -> Result<BatchResult, ModerationError> {
        let ids: Vec<Uuid> = self.selection.iter().copied().collect();
        self.approve_all(&ids).await
    }

    pub async fn reject_selected<F>(&mut self, confirm: F) -> Result<Option<BatchResult>, ModerationError>
    where
        F: FnOnce(&Confirmation) -> bool,
    {
        let ids: Vec<Uuid> = self.selection.iter().copied().collect();
        self.reject_all(&ids, confirm).await
    }

    pub async fn approve_one(&mut self, id: Uuid) -> Result<BatchResult, ModerationError> {
        let result = self.remote.approve_one(self.queue, id).await?;
        self.drop_entries(&[id], result.affected);
        Ok(result)
    }

    pub async fn reject_one<F>(&mut self, id: Uuid, confirm: F) -> Result<Option<BatchResult>, ModerationError>
    where
        F: FnOnce(&Confirmation) -> bool,
    {
        let label = self
            .entries
            .iter()
            .find(|e| e.id == id)
            .map(|e| e.label.clone())
            .unwrap_or_else(|| id.to_string());
        let prompt = Confirmation {
            action: ConfirmAction::Reject,
            count: 1,
            message: format!("Reject \"{label}\"? It will be deleted."),
        };
        if !confirm(&prompt) {
            return Ok(None);
        }

        let result = self.remote.reject_one(self.queue, id).await?;
        self.drop_entries(&[id], result.affected);
        Ok(Some(result))
    }

    pub async fn change_role<F>(
        &self,
        user_id: Uuid,
        role: UserRole,
        confirm: F,
    ) -> Result<Option<Profile>, ModerationError>
    where
        F: FnOnce(&Confirmation) -> bool,
    {
        let verb = match role {
            UserRole::Moderator => "Promote",
            UserRole::User => "Demote",
        };
        let prompt = Confirmation {
            action: ConfirmAction::ChangeRole(role),
            count: 1,
            message: format!("{verb} this user to {role}?"),
        };
        if !confirm(&prompt) {
            return Ok(None);
        }
        Ok(Some(self.remote.change_role(user_id, role).await?))
    }

    /// `affected` is what the service actually removed, which can be fewer
    /// than `ids` when another moderator got there first.
    fn drop_entries(&mut self, ids: &[Uuid], affected: usize) {
        let gone: HashSet<&Uuid> = ids.iter().collect();
        self.entries.retain(|e| !gone.contains(&e.id));
        self.total = self.total.saturating_sub(affected as u64);
        self.selection.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chrono::Utc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use upicks_shared::types::Paginated;
    use upicks_shared::ErrorCode;

    use crate::error::ClientResult;

    struct FakeQueue {
        pending: Mutex<Vec<PendingEntry>>,
        calls: AtomicUsize,
    }

    impl FakeQueue {
        fn with(labels: &[&str]) -> Self {
            let pending = labels
                .iter()
                .map(|label| PendingEntry {
                    id: Uuid::new_v4(),
                    queue: QueueKind::Professors,
                    label: label.to_string(),
                    detail: Some("UP Diliman".into()),
                    submitted_by: None,
                    created_at: Utc::now(),
                })
                .collect();
            Self {
                pending: Mutex::new(pending),
                calls: AtomicUsize::new(0),
            }
        }

        fn remove(&self, ids: &[Uuid]) -> BatchResult {
            let mut pending = self.pending.lock().unwrap();
            let before = pending.len();
            pending.retain(|e| !ids.contains(&e.id));
            BatchResult {
                requested: ids.len(),
                affected: before - pending.len(),
            }
        }
    }

    #[async_trait]
    impl ModerationRemote for FakeQueue {
        async fn list_queue(&self, _queue: QueueKind, params: &QueueParams) -> ClientResult<Paginated<PendingEntry>> {
            let pending = self.pending.lock().unwrap();
            let matching: Vec<PendingEntry> = pending
                .iter()
                .filter(|e| params.q.as_deref().map_or(true, |q| e.matches(q)))
                .cloned()
                .collect();
            Ok(params.pagination().slice(&matching))
        }

        async fn approve_batch(&self, _queue: QueueKind, ids: &[Uuid]) -> ClientResult<BatchResult> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.remove(ids))
        }

        async fn reject_batch(&self, _queue: QueueKind, ids: &[Uuid]) -> ClientResult<BatchResult> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.remove(ids))
        }

        async fn approve_one(&self, _queue: QueueKind, id: Uuid) -> ClientResult<BatchResult> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.remove(&[id]))
        }

        async fn reject_one(&self, _queue: QueueKind, id: Uuid) -> ClientResult<BatchResult> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.remove(&[id]))
        }

        async fn change_role(&self, _user_id: Uuid, _role: UserRole) -> ClientResult<Profile> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Err(ClientError::Api {
                status: 403,
                code: Some(ErrorCode::CannotChangeOwnRole),
                message: "you cannot change your own role".into(),
            })
        }
    }

    async fn loaded(labels: &[&str]) -> ModerationWorkflow<FakeQueue> {
        let mut workflow = ModerationWorkflow::new(FakeQueue::with(labels), QueueKind::Professors);
        workflow.refresh().await.unwrap();
        workflow
    }

    #[tokio::test]
    async fn batch_reject_leaves_the_complement() {
        let mut workflow = loaded(&["Ana Reyes", "Ben Cruz", "Carla Santos", "Dino Lim"]).await;
        let all: Vec<Uuid> = workflow.entries().iter().map(|e| e.id).collect();
        let rejected = vec![all[0], all[2]];
        for id in &rejected {
            workflow.toggle_selected(*id);
        }

        let result = workflow.reject_selected(|_| true).await.unwrap().unwrap();
        assert_eq!(result.affected, 2);

        let remaining: Vec<Uuid> = workflow.entries().iter().map(|e| e.id).collect();
        assert_eq!(remaining, vec![all[1], all[3]]);
        assert!(workflow.selection().is_empty());
        assert_eq!(workflow.total(), 2);

        workflow.refresh().await.unwrap();
        let requeried: Vec<Uuid> = workflow.entries().iter().map(|e| e.id).collect();
        assert_eq!(requeried, vec![all[1], all[3]]);
        assert_eq!(workflow.total(), 2);
    }

    #[tokio::test]
    async fn total_drops_by_rows_the_service_removed() {
        let mut workflow = loaded(&["Ana Reyes", "Ben Cruz", "Carla Santos"]).await;
        let all: Vec<Uuid> = workflow.entries().iter().map(|e| e.id).collect();
        // someone else already approved Ana
        workflow.remote.remove(&[all[0]]);

        let result = workflow.approve_all(&[all[0], all[1]]).await.unwrap();
        assert_eq!(result, BatchResult { requested: 2, affected: 1 });
        assert_eq!(workflow.entries().len(), 1);
        assert_eq!(workflow.total(), 2);

        workflow.refresh().await.unwrap();
        assert_eq!(workflow.total(), 1);
    }

    #[tokio::test]
    async fn declined_confirmation_sends_nothing() {
        let mut workflow = loaded(&["Ana Reyes", "Ben Cruz"]).await;
        workflow.select_all();

        let mut seen = None;
        let outcome = workflow
            .reject_selected(|prompt| {
                seen = Some(prompt.clone());
                false
            })
            .await
            .unwrap();

        assert!(outcome.is_none());
        assert_eq!(workflow.remote.calls.load(Ordering::SeqCst), 0);
        assert_eq!(workflow.entries().len(), 2);
        assert_eq!(workflow.selection().len(), 2);
        let prompt = seen.unwrap();
        assert_eq!(prompt.action, ConfirmAction::Reject);
        assert_eq!(prompt.count, 2);
    }

    #[tokio::test]
    async fn approve_all_removes_rows() {
        let mut workflow = loaded(&["Ana Reyes", "Ben Cruz", "Carla Santos"]).await;
        let first = workflow.entries()[0].id;
        let result = workflow.approve_all(&[first]).await.unwrap();
        assert_eq!(result, BatchResult { requested: 1, affected: 1 });
        assert!(workflow.entries().iter().all(|e| e.id != first));

        assert!(matches!(workflow.approve_all(&[]).await, Err(ModerationError::NothingSelected)));
    }

    #[tokio::test]
    async fn single_row_actions() {
        let mut workflow = loaded(&["Ana Reyes", "Ben Cruz"]).await;
        let ids: Vec<Uuid> = workflow.entries().iter().map(|e| e.id).collect();

        workflow.approve_one(ids[0]).await.unwrap();
        let mut message = String::new();
        workflow
            .reject_one(ids[1], |prompt| {
                message = prompt.message.clone();
                true
            })
            .await
            .unwrap();

        assert!(message.contains("Ben Cruz"));
        assert!(workflow.entries().is_empty());
    }

    #[tokio::test]
    async fn filter_resets_page_and_prunes_selection() {
        let mut workflow = loaded(&["Ana Reyes", "Ben Cruz", "Carla Santos"]).await;
        workflow.select_all();
        workflow.set_page(2).await.unwrap();
        assert!(workflow.selection().is_empty());

        let entries = workflow.set_filter("  cruz ").await.unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].label, "Ben Cruz");
        assert_eq!(workflow.page(), 1);
    }

    #[tokio::test]
    async fn role_change_needs_confirmation_and_surfaces_code() {
        let workflow = loaded(&[]).await;
        let me = Uuid::new_v4();

        assert!(workflow.change_role(me, UserRole::Moderator, |_| false).await.unwrap().is_none());
        assert_eq!(workflow.remote.calls.load(Ordering::SeqCst), 0);

        let err = workflow.change_role(me, UserRole::Moderator, |_| true).await.unwrap_err();
        assert!(matches!(err, ModerationError::Remote(ref e) if e.is(ErrorCode::CannotChangeOwnRole)));
    }
}
