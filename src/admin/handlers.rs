use axum::{
    extract::{DefaultBodyLimit, Multipart, Path, Query, State},
    http::StatusCode,
    routing::{delete, get, post, put},
    Json, Router,
};
use time::OffsetDateTime;
use tracing::{info, instrument};
use uuid::Uuid;

use super::{
    dto::{
        AdminFlagUpdate, CategoryDeleted, CreateCategoryRequest, CreateProductRequest,
        DeleteProductQuery, StockUpdate, UpdateProductRequest, UploadResponse,
    },
    services,
    uploads::{self, MAX_UPLOAD_BYTES},
};
use crate::{
    auth::{dto::PublicUser, extractors::AdminUser, repo_types::User},
    catalog::{
        dto::ProductView,
        repo as catalog_repo,
        repo_types::{Category, Product},
    },
    error::{AppError, AppResult, FieldError, JsonBody},
    orders::{
        dto::{AdminOrderView, OrderView, PickupMessageUpdate, StatusUpdate},
        model::OrderStatus,
        repo as orders_repo,
        repo_types::{Order, OrderStats},
        services as orders_services,
    },
    settings::{
        dto::{SettingsPatch, SettingsView},
        repo as settings_repo,
    },
    state::AppState,
};

pub fn admin_routes() -> Router<AppState> {
    Router::new()
        .route("/admin/products", get(list_products).post(create_product))
        .route(
            "/admin/products/:id",
            put(update_product).delete(delete_product),
        )
        .route("/admin/products/:id/stock", put(update_stock))
        .route("/admin/categories", get(list_categories).post(create_category))
        .route("/admin/categories/:id", delete(delete_category))
        .route("/admin/orders", get(list_orders))
        .route("/admin/orders/:id/status", put(update_order_status))
        .route("/admin/orders/:id/pickup-message", put(update_pickup_message))
        .route("/admin/settings", put(update_settings))
        .route("/admin/users/:id/admin", put(set_admin_flag))
        .route("/admin/stats", get(stats))
        .merge(upload_routes())
}

fn upload_routes() -> Router<AppState> {
    Router::new()
        .route("/admin/uploads", post(upload_image))
        .route("/admin/uploads/:name", delete(delete_upload))
        // room for the multipart envelope around a maximum-size image
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES + 64 * 1024))
}

// ---- products ----

#[instrument(skip_all)]
pub async fn list_products(
    State(state): State<AppState>,
    _admin: AdminUser,
) -> AppResult<Json<Vec<ProductView>>> {
    let rows = catalog_repo::list_all_products(&state.db).await?;
    Ok(Json(rows.into_iter().map(ProductView::from).collect()))
}

#[instrument(skip_all, fields(admin_id = %admin.id))]
pub async fn create_product(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    JsonBody(body): JsonBody<CreateProductRequest>,
) -> AppResult<(StatusCode, Json<Product>)> {
    let new = body.into_new_product().map_err(AppError::Validation)?;
    let product = services::create_product(&state.db, new).await?;
    Ok((StatusCode::CREATED, Json(product)))
}

#[instrument(skip_all, fields(admin_id = %admin.id, product_id = %id))]
pub async fn update_product(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    Path(id): Path<Uuid>,
    JsonBody(body): JsonBody<UpdateProductRequest>,
) -> AppResult<Json<Product>> {
    let changes = body.into_changes().map_err(AppError::Validation)?;
    Ok(Json(services::update_product(&state.db, id, changes).await?))
}

#[instrument(skip_all, fields(admin_id = %admin.id, product_id = %id))]
pub async fn delete_product(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    Path(id): Path<Uuid>,
    Query(q): Query<DeleteProductQuery>,
) -> AppResult<StatusCode> {
    services::delete_product(&state.db, id, q.permanent).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[instrument(skip_all, fields(admin_id = %admin.id, product_id = %id))]
pub async fn update_stock(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    Path(id): Path<Uuid>,
    JsonBody(body): JsonBody<StockUpdate>,
) -> AppResult<Json<Product>> {
    body.validate().map_err(AppError::Validation)?;
    let product = catalog_repo::set_stock(&state.db, id, body.stock)
        .await?
        .ok_or(AppError::NotFound("Product"))?;
    info!(stock = product.stock, "stock updated");
    Ok(Json(product))
}

// ---- categories ----

#[instrument(skip_all)]
pub async fn list_categories(
    State(state): State<AppState>,
    _admin: AdminUser,
) -> AppResult<Json<Vec<Category>>> {
    Ok(Json(catalog_repo::list_categories(&state.db).await?))
}

#[instrument(skip_all, fields(admin_id = %admin.id))]
pub async fn create_category(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    JsonBody(body): JsonBody<CreateCategoryRequest>,
) -> AppResult<(StatusCode, Json<Category>)> {
    let new = body.validate().map_err(AppError::Validation)?;
    let category = services::create_category(&state.db, new).await?;
    Ok((StatusCode::CREATED, Json(category)))
}

#[instrument(skip_all, fields(admin_id = %admin.id, category_id = %id))]
pub async fn delete_category(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<CategoryDeleted>> {
    Ok(Json(services::delete_category(&state.db, id).await?))
}

// ---- orders ----

#[instrument(skip_all)]
pub async fn list_orders(
    State(state): State<AppState>,
    _admin: AdminUser,
) -> AppResult<Json<Vec<AdminOrderView>>> {
    Ok(Json(orders_services::list_all_orders(&state.db).await?))
}

#[instrument(skip_all, fields(admin_id = %admin.id, order_id = %id))]
pub async fn update_order_status(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    Path(id): Path<Uuid>,
    JsonBody(body): JsonBody<StatusUpdate>,
) -> AppResult<Json<OrderView>> {
    let next: OrderStatus = body.status.trim().parse().map_err(|_| {
        AppError::Validation(vec![FieldError::new(
            "status",
            "must be one of placed, confirmed, preparing, ready, delivered, cancelled",
        )])
    })?;
    Ok(Json(orders_services::change_status(&state.db, id, next).await?))
}

#[instrument(skip_all, fields(admin_id = %admin.id, order_id = %id))]
pub async fn update_pickup_message(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    Path(id): Path<Uuid>,
    JsonBody(body): JsonBody<PickupMessageUpdate>,
) -> AppResult<Json<Order>> {
    Ok(Json(
        orders_services::set_pickup_message(&state.db, id, body.message).await?,
    ))
}

// ---- settings, users, stats ----

#[instrument(skip_all, fields(admin_id = %admin.id))]
pub async fn update_settings(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    JsonBody(mut patch): JsonBody<SettingsPatch>,
) -> AppResult<Json<SettingsView>> {
    patch.validate().map_err(AppError::Validation)?;
    let settings = settings_repo::update(&state.db, &patch).await?;
    let is_open = settings.is_accepting_orders(OffsetDateTime::now_utc());
    info!(accepting = settings.accepting_orders, is_open, "settings updated");
    Ok(Json(SettingsView { settings, is_open }))
}

#[instrument(skip_all, fields(admin_id = %admin.id, target_id = %id))]
pub async fn set_admin_flag(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    Path(id): Path<Uuid>,
    JsonBody(body): JsonBody<AdminFlagUpdate>,
) -> AppResult<Json<PublicUser>> {
    if id == admin.id && !body.is_admin {
        return Err(AppError::Rejected(
            "You cannot remove your own admin access".into(),
        ));
    }
    let user = User::set_admin(&state.db, id, body.is_admin)
        .await?
        .ok_or(AppError::NotFound("User"))?;
    info!(is_admin = user.is_admin, "admin flag changed");
    Ok(Json(user.into()))
}

#[instrument(skip_all)]
pub async fn stats(State(state): State<AppState>, _admin: AdminUser) -> AppResult<Json<OrderStats>> {
    Ok(Json(orders_repo::stats(&state.db).await?))
}

// ---- uploads ----

#[instrument(skip_all, fields(admin_id = %admin.id))]
pub async fn upload_image(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    mut mp: Multipart,
) -> AppResult<(StatusCode, Json<UploadResponse>)> {
    let item = uploads::read_file_field(&mut mp).await?;
    let out = uploads::store_image(state.storage.as_ref(), item).await?;
    Ok((StatusCode::CREATED, Json(out)))
}

#[instrument(skip_all, fields(admin_id = %admin.id))]
pub async fn delete_upload(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    Path(name): Path<String>,
) -> AppResult<StatusCode> {
    uploads::remove_image(state.storage.as_ref(), &name).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{body::Body, http::header, http::Request};
    use tower::ServiceExt;

    async fn status_of(req: Request<Body>) -> StatusCode {
        let app = admin_routes().with_state(AppState::fake());
        app.oneshot(req).await.unwrap().status()
    }

    #[tokio::test]
    async fn admin_reads_require_a_session() {
        for path in ["/admin/products", "/admin/categories", "/admin/orders", "/admin/stats"] {
            let status = status_of(Request::get(path).body(Body::empty()).unwrap()).await;
            assert_eq!(status, StatusCode::UNAUTHORIZED, "{path}");
        }
    }

    #[tokio::test]
    async fn admin_writes_require_a_session() {
        let id = Uuid::new_v4();
        let writes = [
            ("POST", "/admin/products".to_string()),
            ("PUT", format!("/admin/products/{id}")),
            ("PUT", format!("/admin/products/{id}/stock")),
            ("PUT", format!("/admin/orders/{id}/status")),
            ("PUT", "/admin/settings".to_string()),
            ("PUT", format!("/admin/users/{id}/admin")),
        ];
        for (method, path) in writes {
            let req = Request::builder()
                .method(method)
                .uri(&path)
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from("{}"))
                .unwrap();
            assert_eq!(status_of(req).await, StatusCode::UNAUTHORIZED, "{method} {path}");
        }
    }

    #[tokio::test]
    async fn deletes_require_a_session() {
        let id = Uuid::new_v4();
        for path in [
            format!("/admin/products/{id}?permanent=true"),
            format!("/admin/categories/{id}"),
            format!("/admin/uploads/{id}.png"),
        ] {
            let req = Request::delete(&path).body(Body::empty()).unwrap();
            assert_eq!(status_of(req).await, StatusCode::UNAUTHORIZED, "{path}");
        }
    }
}
