use axum::{
    Json, Router,
    extract::{Path, Query, State},
    routing::{delete, get, post},
};
use uuid::Uuid;

use crate::{
    dto::debts::{
        ChargeRequest, CreateDebtRequest, DebtDetail, DebtList, PaymentRequest, UpdateDebtRequest,
    },
    error::AppResult,
    middleware::auth::AuthUser,
    models::Debt,
    response::ApiResponse,
    routes::params::DebtListQuery,
    services::debt_service,
    state::AppState,
};

pub fn admin_router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_debts).post(create_debt))
        .route("/{id}", get(get_debt).put(update_debt).delete(delete_debt))
        .route("/{id}/charges", post(add_charge))
        .route("/{id}/payments", post(add_payment))
        .route("/{id}/transactions/last", delete(delete_last_transaction))
}

#[utoipa::path(
    get,
    path = "/api/admin/debts",
    params(DebtListQuery),
    responses(
        (status = 200, description = "Customer accounts with balance and installment status", body = ApiResponse<DebtList>)
    ),
    security(("bearer_auth" = [])),
    tag = "Debts"
)]
pub async fn list_debts(
    State(state): State<AppState>,
    user: AuthUser,
    Query(query): Query<DebtListQuery>,
) -> AppResult<Json<ApiResponse<DebtList>>> {
    Ok(Json(debt_service::list_debts(&state, &user, query).await?))
}

#[utoipa::path(
    post,
    path = "/api/admin/debts",
    request_body = CreateDebtRequest,
    responses(
        (status = 200, description = "Open customer account", body = ApiResponse<Debt>)
    ),
    security(("bearer_auth" = [])),
    tag = "Debts"
)]
pub async fn create_debt(
    State(state): State<AppState>,
    user: AuthUser,
    Json(payload): Json<CreateDebtRequest>,
) -> AppResult<Json<ApiResponse<Debt>>> {
    Ok(Json(debt_service::create_debt(&state, &user, payload).await?))
}

#[utoipa::path(
    get,
    path = "/api/admin/debts/{id}",
    params(("id" = Uuid, Path, description = "Debt ID")),
    responses(
        (status = 200, description = "Account with its transactions", body = ApiResponse<DebtDetail>),
        (status = 404, description = "Debt not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Debts"
)]
pub async fn get_debt(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<DebtDetail>>> {
    Ok(Json(debt_service::get_debt(&state, &user, id).await?))
}

#[utoipa::path(
    put,
    path = "/api/admin/debts/{id}",
    params(("id" = Uuid, Path, description = "Debt ID")),
    request_body = UpdateDebtRequest,
    responses(
        (status = 200, description = "Update customer contact data", body = ApiResponse<Debt>),
        (status = 404, description = "Debt not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Debts"
)]
pub async fn update_debt(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateDebtRequest>,
) -> AppResult<Json<ApiResponse<Debt>>> {
    Ok(Json(
        debt_service::update_debt(&state, &user, id, payload).await?,
    ))
}

#[utoipa::path(
    delete,
    path = "/api/admin/debts/{id}",
    params(("id" = Uuid, Path, description = "Debt ID")),
    responses(
        (status = 200, description = "Delete settled account", body = ApiResponse<serde_json::Value>),
        (status = 409, description = "Account still has a balance")
    ),
    security(("bearer_auth" = [])),
    tag = "Debts"
)]
pub async fn delete_debt(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<serde_json::Value>>> {
    Ok(Json(debt_service::delete_debt(&state, &user, id).await?))
}

#[utoipa::path(
    post,
    path = "/api/admin/debts/{id}/charges",
    params(("id" = Uuid, Path, description = "Debt ID")),
    request_body = ChargeRequest,
    responses(
        (status = 200, description = "Charge recorded with its installment schedule", body = ApiResponse<DebtDetail>),
        (status = 400, description = "Invalid amount or installments")
    ),
    security(("bearer_auth" = [])),
    tag = "Debts"
)]
pub async fn add_charge(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<ChargeRequest>,
) -> AppResult<Json<ApiResponse<DebtDetail>>> {
    Ok(Json(debt_service::add_charge(&state, &user, id, payload).await?))
}

#[utoipa::path(
    post,
    path = "/api/admin/debts/{id}/payments",
    params(("id" = Uuid, Path, description = "Debt ID")),
    request_body = PaymentRequest,
    responses(
        (status = 200, description = "Payment recorded", body = ApiResponse<DebtDetail>),
        (status = 400, description = "Payment exceeds the balance")
    ),
    security(("bearer_auth" = [])),
    tag = "Debts"
)]
pub async fn add_payment(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<PaymentRequest>,
) -> AppResult<Json<ApiResponse<DebtDetail>>> {
    Ok(Json(
        debt_service::add_payment(&state, &user, id, payload).await?,
    ))
}

#[utoipa::path(
    delete,
    path = "/api/admin/debts/{id}/transactions/last",
    params(("id" = Uuid, Path, description = "Debt ID")),
    responses(
        (status = 200, description = "Last transaction reverted", body = ApiResponse<DebtDetail>),
        (status = 400, description = "No transactions to revert")
    ),
    security(("bearer_auth" = [])),
    tag = "Debts"
)]
pub async fn delete_last_transaction(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<DebtDetail>>> {
    Ok(Json(
        debt_service::delete_last_transaction(&state, &user, id).await?,
    ))
}
