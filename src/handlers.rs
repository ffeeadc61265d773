pub mod auth;
pub mod email_templates;
pub mod google_auth;
pub mod health;
pub mod models;
pub mod posts;
pub mod sheets;
pub mod users;
