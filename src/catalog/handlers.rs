use axum::{
    extract::{Path, Query, State},
    routing::get,
    Json, Router,
};
use tracing::instrument;
use uuid::Uuid;

use super::{
    dto::{ProductFilter, ProductView},
    repo,
    repo_types::Category,
};
use crate::{
    error::{AppError, AppResult},
    state::AppState,
};

pub fn read_routes() -> Router<AppState> {
    Router::new()
        .route("/categories", get(list_categories))
        .route("/products", get(list_products))
        .route("/products/:id", get(get_product))
}

#[instrument(skip(state))]
pub async fn list_categories(State(state): State<AppState>) -> AppResult<Json<Vec<Category>>> {
    Ok(Json(repo::list_categories(&state.db).await?))
}

#[instrument(skip(state))]
pub async fn list_products(
    State(state): State<AppState>,
    Query(filter): Query<ProductFilter>,
) -> AppResult<Json<Vec<ProductView>>> {
    let rows = repo::list_active_products(&state.db, filter.category_slug()).await?;
    Ok(Json(rows.into_iter().map(ProductView::from).collect()))
}

#[instrument(skip(state))]
pub async fn get_product(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<ProductView>> {
    let row = repo::find_active_product(&state.db, id)
        .await?
        .ok_or(AppError::NotFound("Product"))?;
    Ok(Json(row.into()))
}
