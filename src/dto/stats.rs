use serde::Serialize;
use utoipa::ToSchema;
use uuid::Uuid;

#[derive(Debug, Serialize, ToSchema, sqlx::FromRow)]
pub struct StatusCount {
    pub status: String,
    pub count: i64,
}

#[derive(Debug, Serialize, ToSchema, sqlx::FromRow)]
pub struct TopProduct {
    pub product_id: Option<Uuid>,
    pub product_name: String,
    pub units: i64,
    pub revenue: i64,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct Dashboard {
    pub revenue: i64,
    pub revenue_label: String,
    pub paid_orders: i64,
    pub average_ticket: i64,
    pub orders_by_status: Vec<StatusCount>,
    pub top_products: Vec<TopProduct>,
    pub low_stock_products: i64,
    pub outstanding_debt: i64,
    pub overdue_debt_accounts: i64,
    pub pending_reviews: i64,
}
