pub mod admin_routes;
pub mod health;
pub mod queue_routes;
pub mod user_routes;
