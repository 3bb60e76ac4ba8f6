pub mod dto;
pub mod handlers;
pub mod services;
pub mod uploads;

use crate::state::AppState;
use axum::Router;

/// Back-office routes; every handler requires an admin session.
pub fn router() -> Router<AppState> {
    Router::new().merge(handlers::admin_routes())
}
