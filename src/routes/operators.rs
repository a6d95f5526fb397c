use axum::{
    Json, Router,
    extract::{Path, State},
    routing::{get, post, put},
};
use uuid::Uuid;

use crate::{
    dto::{
        auth::{LoginRequest, LoginResponse},
        operators::{CreateOperatorRequest, OperatorList, UpdateOperatorRequest},
    },
    error::AppResult,
    middleware::auth::AuthUser,
    models::Operator,
    response::ApiResponse,
    services::operator_service,
    state::AppState,
};

pub fn router() -> Router<AppState> {
    Router::new().route("/login", post(login))
}

pub fn admin_router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_operators).post(create_operator))
        .route("/{id}", put(update_operator).delete(delete_operator))
}

#[utoipa::path(
    post,
    path = "/api/operators/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Login operator", body = ApiResponse<LoginResponse>),
        (status = 400, description = "Invalid credentials or inactive operator")
    ),
    tag = "Operators"
)]
pub async fn login(
    State(state): State<AppState>,
    Json(payload): Json<LoginRequest>,
) -> AppResult<Json<ApiResponse<LoginResponse>>> {
    Ok(Json(operator_service::login_operator(&state, payload).await?))
}

#[utoipa::path(
    get,
    path = "/api/admin/operators",
    responses(
        (status = 200, description = "List operators", body = ApiResponse<OperatorList>),
        (status = 403, description = "Missing operators permission")
    ),
    security(("bearer_auth" = [])),
    tag = "Operators"
)]
pub async fn list_operators(
    State(state): State<AppState>,
    user: AuthUser,
) -> AppResult<Json<ApiResponse<OperatorList>>> {
    Ok(Json(operator_service::list_operators(&state, &user).await?))
}

#[utoipa::path(
    post,
    path = "/api/admin/operators",
    request_body = CreateOperatorRequest,
    responses(
        (status = 200, description = "Create operator", body = ApiResponse<Operator>),
        (status = 409, description = "Email already taken")
    ),
    security(("bearer_auth" = [])),
    tag = "Operators"
)]
pub async fn create_operator(
    State(state): State<AppState>,
    user: AuthUser,
    Json(payload): Json<CreateOperatorRequest>,
) -> AppResult<Json<ApiResponse<Operator>>> {
    Ok(Json(
        operator_service::create_operator(&state, &user, payload).await?,
    ))
}

#[utoipa::path(
    put,
    path = "/api/admin/operators/{id}",
    params(("id" = Uuid, Path, description = "Operator ID")),
    request_body = UpdateOperatorRequest,
    responses(
        (status = 200, description = "Update operator", body = ApiResponse<Operator>),
        (status = 404, description = "Operator not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Operators"
)]
pub async fn update_operator(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateOperatorRequest>,
) -> AppResult<Json<ApiResponse<Operator>>> {
    Ok(Json(
        operator_service::update_operator(&state, &user, id, payload).await?,
    ))
}

#[utoipa::path(
    delete,
    path = "/api/admin/operators/{id}",
    params(("id" = Uuid, Path, description = "Operator ID")),
    responses(
        (status = 200, description = "Delete operator", body = ApiResponse<serde_json::Value>),
        (status = 409, description = "Cannot delete yourself or the last owner")
    ),
    security(("bearer_auth" = [])),
    tag = "Operators"
)]
pub async fn delete_operator(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<serde_json::Value>>> {
    Ok(Json(operator_service::delete_operator(&state, &user, id).await?))
}
