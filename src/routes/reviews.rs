use axum::{
    Json, Router,
    extract::{Path, Query, State},
    routing::{delete, get, post},
};
use uuid::Uuid;

use crate::{
    dto::reviews::ReviewList,
    error::AppResult,
    middleware::auth::AuthUser,
    models::Review,
    response::ApiResponse,
    routes::params::ReviewListQuery,
    services::review_service,
    state::AppState,
};

// Public review endpoints live under /products/{id}/reviews.
pub fn admin_router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_reviews))
        .route("/{id}", delete(delete_review))
        .route("/{id}/approve", post(approve_review))
}

#[utoipa::path(
    get,
    path = "/api/admin/reviews",
    params(ReviewListQuery),
    responses(
        (status = 200, description = "Reviews for moderation", body = ApiResponse<ReviewList>)
    ),
    security(("bearer_auth" = [])),
    tag = "Reviews"
)]
pub async fn list_reviews(
    State(state): State<AppState>,
    user: AuthUser,
    Query(query): Query<ReviewListQuery>,
) -> AppResult<Json<ApiResponse<ReviewList>>> {
    Ok(Json(
        review_service::admin_list_reviews(&state, &user, query).await?,
    ))
}

#[utoipa::path(
    post,
    path = "/api/admin/reviews/{id}/approve",
    params(("id" = Uuid, Path, description = "Review ID")),
    responses(
        (status = 200, description = "Review published", body = ApiResponse<Review>),
        (status = 404, description = "Review not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Reviews"
)]
pub async fn approve_review(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<Review>>> {
    Ok(Json(review_service::approve_review(&state, &user, id).await?))
}

#[utoipa::path(
    delete,
    path = "/api/admin/reviews/{id}",
    params(("id" = Uuid, Path, description = "Review ID")),
    responses(
        (status = 200, description = "Review removed", body = ApiResponse<serde_json::Value>),
        (status = 404, description = "Review not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Reviews"
)]
pub async fn delete_review(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<serde_json::Value>>> {
    Ok(Json(review_service::delete_review(&state, &user, id).await?))
}
