use axum::{extract::State, routing::get, Json, Router};
use time::OffsetDateTime;
use tracing::instrument;

use super::{dto::SettingsView, repo};
use crate::{error::AppResult, state::AppState};

pub fn read_routes() -> Router<AppState> {
    Router::new().route("/settings", get(get_settings))
}

#[instrument(skip(state))]
pub async fn get_settings(State(state): State<AppState>) -> AppResult<Json<SettingsView>> {
    let settings = repo::get(&state.db).await?;
    let is_open = settings.is_accepting_orders(OffsetDateTime::now_utc());
    Ok(Json(SettingsView { settings, is_open }))
}
