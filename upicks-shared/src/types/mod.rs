pub mod api;
pub mod auth;
pub mod moderation;
pub mod pagination;
pub mod rating;

pub use api::*;
pub use auth::*;
pub use moderation::*;
pub use pagination::*;
pub use rating::*;
