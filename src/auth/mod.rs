use crate::state::AppState;
use axum::Router;

pub mod dto;
pub mod extractors;
pub mod google;
pub mod handlers;
pub mod policy;
pub mod repo;
pub mod repo_types;
pub mod services;

pub fn router() -> Router<AppState> {
    Router::new().merge(handlers::auth_routes())
}
