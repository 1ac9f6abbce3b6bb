//! Optimistic "helpful" votes.
//!
//! A toggle updates the displayed counter and the viewer's vote membership
//! at once, then confirms with the service. If any remote step fails both
//! local changes are rolled back. There is no retry and no queue: a failed
//! toggle is logged and handed back to the caller.
//!
//! Signed-in viewers own a vote row, so a toggle writes (or deletes) that
//! row and then runs the counter procedure. Anonymous viewers only move the
//! counter; whether this device already voted lives in the [`LocalStore`]
//! under `upvoted_review_<id>`.

use std::collections::{HashMap, HashSet};
use tokio::sync::Mutex;

use upicks_shared::types::VoteRef;

use crate::error::ClientError;
use crate::remote::VoteRemote;
use crate::storage::{upvoted_review_key, LocalStore};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Viewer {
    SignedIn,
    Anonymous,
}

#[derive(Debug, thiserror::Error)]
pub enum VoteError {
    #[error("a vote on this rating is already being saved")]
    InFlight,

    #[error(transparent)]
    Remote(ClientError),

    #[error(transparent)]
    Store(ClientError),
}

#[derive(Debug, Default)]
struct VoteState {
    voted: HashSet<VoteRef>,
    counts: HashMap<VoteRef, i32>,
    in_flight: HashSet<VoteRef>,
}

pub struct VoteSynchronizer<R, S> {
    remote: R,
    store: S,
    state: Mutex<VoteState>,
}

impl<R: VoteRemote, S: LocalStore> VoteSynchronizer<R, S> {
    pub fn new(remote: R, store: S) -> Self {
        Self {
            remote,
            store,
            state: Mutex::new(VoteState::default()),
        }
    }

    /// Replace the signed-in viewer's vote set with what the service holds.
    pub async fn load_votes(&self) -> Result<usize, VoteError> {
        let votes = self.remote.my_votes().await.map_err(VoteError::Remote)?;
        let mut state = self.state.lock().await;
        state.voted = votes.into_iter().collect();
        Ok(state.voted.len())
    }

    /// Seed the displayed counter of a rating from a fetched row.
    pub async fn track(&self, rating: VoteRef, helpful_count: i32) {
        self.state.lock().await.counts.insert(rating, helpful_count.max(0));
    }

    pub async fn count(&self, rating: VoteRef) -> i32 {
        self.state.lock().await.counts.get(&rating).copied().unwrap_or(0)
    }

    pub async fn has_voted(&self, rating: VoteRef, viewer: Viewer) -> bool {
        match viewer {
            Viewer::SignedIn => self.state.lock().await.voted.contains(&rating),
            Viewer::Anonymous => self.store.contains(&upvoted_review_key(rating.rating_id)),
        }
    }

    /// Flip the viewer's vote on `rating` and return the counter delta that
    /// was applied (`1` or `-1`).
    pub async fn toggle_vote(&self, rating: VoteRef, viewer: Viewer) -> Result<i32, VoteError> {
        let store_key = upvoted_review_key(rating.rating_id);

        // optimistic update, under the lock
        let (removing, previous_count) = {
            let mut state = self.state.lock().await;
            if state.in_flight.contains(&rating) {
                return Err(VoteError::InFlight);
            }

            let removing = match viewer {
                Viewer::SignedIn => state.voted.contains(&rating),
                Viewer::Anonymous => self.store.contains(&store_key),
            };

            match viewer {
                Viewer::SignedIn if removing => {
                    state.voted.remove(&rating);
                }
                Viewer::SignedIn => {
                    state.voted.insert(rating);
                }
                Viewer::Anonymous if removing => {
                    self.store.remove(&store_key).map_err(VoteError::Store)?;
                }
                Viewer::Anonymous => {
                    self.store.set(&store_key, "true").map_err(VoteError::Store)?;
                }
            }

            let counter = state.counts.entry(rating).or_insert(0);
            let previous_count = *counter;
            *counter = if removing { (*counter - 1).max(0) } else { *counter + 1 };
            state.in_flight.insert(rating);
            (removing, previous_count)
        };

        let delta = if removing { -1 } else { 1 };
        let outcome = self.confirm(rating, viewer, removing, delta).await;

        let mut state = self.state.lock().await;
        state.in_flight.remove(&rating);
        match outcome {
            Ok(server_count) => {
                state.counts.insert(rating, server_count.max(0));
                Ok(delta)
            }
            Err(e) => {
                tracing::warn!(
                    rating_id = %rating.rating_id,
                    kind = %rating.rating_kind,
                    error = %e,
                    "helpful vote failed, reverting"
                );
                state.counts.insert(rating, previous_count);
                match viewer {
                    Viewer::SignedIn if removing => {
                        state.voted.insert(rating);
                    }
                    Viewer::SignedIn => {
                        state.voted.remove(&rating);
                    }
                    Viewer::Anonymous => {
                        let reverted = if removing {
                            self.store.set(&store_key, "true")
                        } else {
                            self.store.remove(&store_key)
                        };
                        if let Err(store_err) = reverted {
                            tracing::warn!(key = %store_key, error = %store_err, "could not revert local vote marker");
                        }
                    }
                }
                Err(VoteError::Remote(e))
            }
        }
    }

    async fn confirm(&self, rating: VoteRef, viewer: Viewer, removing: bool, delta: i32) -> Result<i32, ClientError> {
        if viewer == Viewer::SignedIn {
            if removing {
                self.remote.delete_vote(rating).await?;
            } else {
                self.remote.insert_vote(rating).await?;
            }
        }
        let count = self.remote.change_helpful(rating, delta).await?;
        Ok(count.helpful_count)
    }
}
