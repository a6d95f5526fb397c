use axum::{
    Json, Router,
    extract::{Path, Query, State},
    routing::{get, patch, post, put},
};
use uuid::Uuid;

use crate::{
    dto::{
        orders::{MarkPaidRequest, OrderList, OrderWithItems, UpdateOrderStatusRequest},
        shipping::ShippingLabelRequest,
        stats::Dashboard,
    },
    error::AppResult,
    middleware::auth::AuthUser,
    models::{ShippingLabel, SiteSettings},
    response::ApiResponse,
    routes::{
        categories, debts, operators,
        params::{DateRange, OrderListQuery},
        products, reviews, storefront,
    },
    services::{admin_service, settings_service, shipping_service, stats_service},
    state::AppState,
};

/// Back-office API. Every handler below requires an operator token carrying
/// the matching permission.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/orders", get(list_all_orders))
        .route("/orders/{id}", get(get_order_admin))
        .route("/orders/{id}/status", patch(update_order_status))
        .route("/orders/{id}/mark-paid", post(mark_paid))
        .route(
            "/orders/{id}/shipping-label",
            get(get_shipping_label).post(create_shipping_label),
        )
        .route("/settings", put(update_settings))
        .route("/stats", get(dashboard))
        .nest("/products", products::admin_router())
        .nest("/debts", debts::admin_router())
        .nest("/reviews", reviews::admin_router())
        .nest("/operators", operators::admin_router())
        .merge(categories::admin_router())
        .merge(storefront::admin_router())
}

#[utoipa::path(
    get,
    path = "/api/admin/orders",
    params(OrderListQuery),
    responses(
        (status = 200, description = "List all orders", body = ApiResponse<OrderList>),
        (status = 403, description = "Missing orders permission")
    ),
    security(("bearer_auth" = [])),
    tag = "Admin"
)]
pub async fn list_all_orders(
    State(state): State<AppState>,
    user: AuthUser,
    Query(query): Query<OrderListQuery>,
) -> AppResult<Json<ApiResponse<OrderList>>> {
    let resp = admin_service::list_all_orders(&state, &user, query).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    get,
    path = "/api/admin/orders/{id}",
    params(("id" = Uuid, Path, description = "Order ID")),
    responses(
        (status = 200, description = "Order detail", body = ApiResponse<OrderWithItems>),
        (status = 404, description = "Order not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Admin"
)]
pub async fn get_order_admin(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<OrderWithItems>>> {
    let resp = admin_service::get_order_admin(&state, &user, id).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    patch,
    path = "/api/admin/orders/{id}/status",
    params(("id" = Uuid, Path, description = "Order ID")),
    request_body = UpdateOrderStatusRequest,
    responses(
        (status = 200, description = "Order status updated", body = ApiResponse<OrderWithItems>),
        (status = 409, description = "Transition not allowed")
    ),
    security(("bearer_auth" = [])),
    tag = "Admin"
)]
pub async fn update_order_status(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateOrderStatusRequest>,
) -> AppResult<Json<ApiResponse<OrderWithItems>>> {
    let resp = admin_service::update_order_status(&state, &user, id, payload).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    post,
    path = "/api/admin/orders/{id}/mark-paid",
    params(("id" = Uuid, Path, description = "Order ID")),
    request_body = MarkPaidRequest,
    responses(
        (status = 200, description = "Payment registered manually", body = ApiResponse<OrderWithItems>),
        (status = 409, description = "Order already paid or cancelled")
    ),
    security(("bearer_auth" = [])),
    tag = "Admin"
)]
pub async fn mark_paid(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<MarkPaidRequest>,
) -> AppResult<Json<ApiResponse<OrderWithItems>>> {
    let resp = admin_service::mark_paid(&state, &user, id, payload).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    get,
    path = "/api/admin/orders/{id}/shipping-label",
    params(("id" = Uuid, Path, description = "Order ID")),
    responses(
        (status = 200, description = "Shipping label with printable lines", body = ApiResponse<ShippingLabel>),
        (status = 404, description = "No label for this order")
    ),
    security(("bearer_auth" = [])),
    tag = "Admin"
)]
pub async fn get_shipping_label(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<ShippingLabel>>> {
    let resp = shipping_service::get_label(&state, &user, id).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    post,
    path = "/api/admin/orders/{id}/shipping-label",
    params(("id" = Uuid, Path, description = "Order ID")),
    request_body = ShippingLabelRequest,
    responses(
        (status = 200, description = "Create or replace the shipping label", body = ApiResponse<ShippingLabel>),
        (status = 409, description = "Order is not shipped by delivery")
    ),
    security(("bearer_auth" = [])),
    tag = "Admin"
)]
pub async fn create_shipping_label(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<ShippingLabelRequest>,
) -> AppResult<Json<ApiResponse<ShippingLabel>>> {
    let resp = shipping_service::create_label(&state, &user, id, payload).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    put,
    path = "/api/admin/settings",
    request_body = SiteSettings,
    responses(
        (status = 200, description = "Store settings saved", body = ApiResponse<SiteSettings>),
        (status = 400, description = "Invalid settings")
    ),
    security(("bearer_auth" = [])),
    tag = "Admin"
)]
pub async fn update_settings(
    State(state): State<AppState>,
    user: AuthUser,
    Json(payload): Json<SiteSettings>,
) -> AppResult<Json<ApiResponse<SiteSettings>>> {
    let resp = settings_service::update_settings(&state, &user, payload).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    get,
    path = "/api/admin/stats",
    params(DateRange),
    responses(
        (status = 200, description = "Sales and back-office dashboard", body = ApiResponse<Dashboard>),
        (status = 400, description = "Invalid date range")
    ),
    security(("bearer_auth" = [])),
    tag = "Admin"
)]
pub async fn dashboard(
    State(state): State<AppState>,
    user: AuthUser,
    Query(range): Query<DateRange>,
) -> AppResult<Json<ApiResponse<Dashboard>>> {
    let resp = stats_service::dashboard(&state, &user, range).await?;
    Ok(Json(resp))
}
