use sea_orm::TransactionTrait;
use uuid::Uuid;

use crate::{
    audit,
    dto::payments::{PaymentNotification, WebhookAck},
    error::{AppError, AppResult},
    response::ApiResponse,
    services::order_service::mark_order_paid,
    state::AppState,
};

/// Payment id from a notification; the processor sends it as a string or a number.
pub fn payment_id(notification: &PaymentNotification) -> Option<String> {
    if notification.kind.as_deref() != Some("payment") {
        return None;
    }
    match &notification.data.as_ref()?.id {
        serde_json::Value::String(id) if !id.is_empty() => Some(id.clone()),
        serde_json::Value::Number(id) => Some(id.to_string()),
        _ => None,
    }
}

pub async fn handle_webhook(
    state: &AppState,
    notification: PaymentNotification,
) -> AppResult<ApiResponse<WebhookAck>> {
    let ignored = || ApiResponse::success("Ignored", WebhookAck { handled: false }, None);

    let Some(payment_id) = payment_id(&notification) else {
        tracing::debug!(kind = ?notification.kind, "payment notification ignored");
        return Ok(ignored());
    };
    let Some(gateway) = state.payments.as_ref() else {
        tracing::warn!(payment_id = %payment_id, "payment notification received but payments are not configured");
        return Ok(ignored());
    };

    let payment = gateway
        .get_payment(&payment_id)
        .await
        .map_err(|err| AppError::Upstream(err.to_string()))?;

    if !payment.is_approved() {
        tracing::info!(payment_id = %payment_id, status = %payment.status, "payment not approved yet");
        return Ok(ignored());
    }
    let Some(order_id) = payment
        .external_reference
        .as_deref()
        .and_then(|r| Uuid::parse_str(r).ok())
    else {
        tracing::warn!(payment_id = %payment_id, "approved payment without an order reference");
        return Ok(ignored());
    };

    let txn = state.orm.begin().await?;
    let (order, changed) = match mark_order_paid(&txn, order_id, None, Some(payment_id.clone())).await {
        Ok(result) => result,
        Err(AppError::NotFound) => {
            tracing::warn!(payment_id = %payment_id, %order_id, "payment references an unknown order");
            return Ok(ignored());
        }
        Err(AppError::Conflict(reason)) => {
            tracing::warn!(payment_id = %payment_id, %order_id, reason = %reason, "payment for an order that cannot be paid");
            return Ok(ignored());
        }
        Err(err) => return Err(err),
    };
    txn.commit().await?;

    if changed {
        tracing::info!(payment_id = %payment_id, order_id = %order.id, "order paid");
        audit::record(
            &state.orm,
            None,
            "order_paid",
            "orders",
            serde_json::json!({ "order_id": order.id, "payment_id": payment_id }),
        )
        .await;
    }

    Ok(ApiResponse::success("OK", WebhookAck { handled: true }, None))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn notification(body: serde_json::Value) -> PaymentNotification {
        serde_json::from_value(body).unwrap()
    }

    #[test]
    fn reads_numeric_and_string_ids() {
        let n = notification(serde_json::json!({ "type": "payment", "data": { "id": 12345 } }));
        assert_eq!(payment_id(&n).as_deref(), Some("12345"));

        let n = notification(serde_json::json!({ "type": "payment", "data": { "id": "987" } }));
        assert_eq!(payment_id(&n).as_deref(), Some("987"));
    }

    #[test]
    fn ignores_other_topics_and_missing_data() {
        let n = notification(serde_json::json!({ "topic": "merchant_order", "data": { "id": 1 } }));
        assert_eq!(payment_id(&n), None);

        let n = notification(serde_json::json!({ "type": "payment" }));
        assert_eq!(payment_id(&n), None);
    }
}
