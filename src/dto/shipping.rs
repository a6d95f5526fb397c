use serde::Deserialize;
use utoipa::ToSchema;

#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct ShippingLabelRequest {
    pub carrier: Option<String>,
    /// Generated from the order number when omitted.
    pub tracking_number: Option<String>,
    pub packages: Option<i32>,
}
