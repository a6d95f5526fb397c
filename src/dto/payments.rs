use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Notification body posted by the payment processor.
#[derive(Debug, Deserialize, ToSchema)]
pub struct PaymentNotification {
    #[serde(rename = "type", alias = "topic")]
    pub kind: Option<String>,
    pub data: Option<PaymentNotificationData>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct PaymentNotificationData {
    pub id: serde_json::Value,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct WebhookAck {
    pub handled: bool,
}
