pub mod profile_service;
pub mod rating_service;
