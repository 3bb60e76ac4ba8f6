use axum::{
    extract::State,
    http::StatusCode,
    routing::get,
    Json, Router,
};
use tracing::instrument;

use super::{
    dto::{OrderView, PlaceOrderRequest},
    services,
};
use crate::{
    auth::extractors::AuthUser,
    error::{AppResult, JsonBody},
    state::AppState,
};

pub fn user_routes() -> Router<AppState> {
    Router::new().route("/orders", get(list_my_orders).post(create_order))
}

#[instrument(skip_all, fields(user_id = %user.id))]
pub async fn create_order(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    JsonBody(body): JsonBody<PlaceOrderRequest>,
) -> AppResult<(StatusCode, Json<OrderView>)> {
    let view = services::place_order(&state.db, user.id, body).await?;
    Ok((StatusCode::CREATED, Json(view)))
}

#[instrument(skip_all, fields(user_id = %user.id))]
pub async fn list_my_orders(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
) -> AppResult<Json<Vec<OrderView>>> {
    Ok(Json(services::list_user_orders(&state.db, user.id).await?))
}
