use axum::{Json, Router, extract::State, routing::post};

use crate::{
    dto::payments::{PaymentNotification, WebhookAck},
    error::AppResult,
    response::ApiResponse,
    services::payment_service,
    state::AppState,
};

pub fn router() -> Router<AppState> {
    Router::new().route("/webhook", post(webhook))
}

/// Payment processor callback. Unknown or unapproved payments are acknowledged
/// with `handled: false` so the processor stops retrying.
#[utoipa::path(
    post,
    path = "/api/payments/webhook",
    request_body = PaymentNotification,
    responses(
        (status = 200, description = "Notification acknowledged", body = ApiResponse<WebhookAck>),
        (status = 502, description = "Payment processor unavailable")
    ),
    tag = "Payments"
)]
pub async fn webhook(
    State(state): State<AppState>,
    Json(notification): Json<PaymentNotification>,
) -> AppResult<Json<ApiResponse<WebhookAck>>> {
    Ok(Json(payment_service::handle_webhook(&state, notification).await?))
}
