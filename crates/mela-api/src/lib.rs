pub mod admin;
pub mod auth;
pub mod chat;
pub mod checkins;
pub mod error;
pub mod events;
pub mod likes;
pub mod middleware;
pub mod rides;
pub mod users;

#[cfg(test)]
pub(crate) mod test_support;

use std::sync::Arc;

use mela_db::Database;
use mela_gateway::dispatcher::Dispatcher;

pub type AppState = Arc<AppStateInner>;

pub struct AppStateInner {
    pub db: Arc<Database>,
    pub dispatcher: Dispatcher,
    pub jwt_secret: String,
    /// Shared secret for the admin portal's `x-admin-token` header.
    pub admin_token: String,
    /// Base URL of the AI auto-reply service; None disables auto-replies.
    pub ai_service_url: Option<String>,
    pub http: reqwest::Client,
}
