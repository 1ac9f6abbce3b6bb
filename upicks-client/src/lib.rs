//! Client side of UPicks: a typed API client for the ratings and moderation
//! services plus the stateful flows built on it.

pub mod api;
pub mod browse;
pub mod config;
pub mod error;
pub mod moderation;
pub mod remote;
pub mod replies;
pub mod storage;
pub mod votes;

pub use api::ApiClient;
pub use browse::{BrowseError, Overview, RatingBrowser};
pub use config::ClientConfig;
pub use error::{ClientError, ClientResult};
pub use moderation::{ConfirmAction, Confirmation, ModerationError, ModerationWorkflow};
pub use remote::{ModerationRemote, RatingsRemote, ReplyRemote, VoteRemote};
pub use replies::{ReplyError, ReplyThread};
pub use storage::{open_store, FileStore, LocalStore, MemoryStore};
pub use votes::{Viewer, VoteError, VoteSynchronizer};
