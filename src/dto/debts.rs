use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::{
    installments::DebtStatus,
    models::{Debt, DebtTransaction},
};

#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateDebtRequest {
    pub customer_name: String,
    pub phone: Option<String>,
    pub notes: Option<String>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdateDebtRequest {
    pub customer_name: Option<String>,
    pub phone: Option<String>,
    pub notes: Option<String>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct ChargeRequest {
    pub amount: i64,
    pub description: Option<String>,
    /// Defaults to a single installment.
    pub installments: Option<u32>,
    /// Defaults to one month after today.
    pub first_due_date: Option<NaiveDate>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct PaymentRequest {
    pub amount: i64,
    pub description: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct DebtSummary {
    pub debt: Debt,
    pub status: DebtStatus,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct DebtDetail {
    pub debt: Debt,
    pub status: DebtStatus,
    pub transactions: Vec<DebtTransaction>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct DebtList {
    pub items: Vec<DebtSummary>,
}
