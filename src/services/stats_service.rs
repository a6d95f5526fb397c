use std::collections::HashMap;

use chrono::{DateTime, Days, NaiveDate, Utc};
use sea_orm::{ColumnTrait, EntityTrait, QueryFilter, QueryOrder};
use uuid::Uuid;

use crate::{
    db::to_postgres,
    dto::stats::{Dashboard, StatusCount, TopProduct},
    entity::{
        debt_transactions::{Column as TxCol, Entity as DebtTransactions, Model as TxModel},
        debts::{Column as DebtCol, Entity as Debts},
    },
    error::{AppError, AppResult},
    middleware::auth::{AuthUser, ensure_permission},
    models::{PaymentStatus, Permission, ReviewStatus},
    money::format_price,
    response::ApiResponse,
    routes::params::DateRange,
    services::debt_service::status_for,
    state::AppState,
};

const TOP_PRODUCTS: i64 = 10;

/// Half-open `[from, to)` window; `to` is inclusive as a calendar day.
pub fn range_bounds(range: &DateRange, today: NaiveDate) -> AppResult<(DateTime<Utc>, DateTime<Utc>)> {
    let from = match range.from {
        Some(from) => from,
        None => NaiveDate::from_ymd_opt(2000, 1, 1).unwrap_or(today),
    };
    let to = range.to.unwrap_or(today);
    if from > to {
        return Err(AppError::BadRequest("from must not be after to".into()));
    }
    let end = to
        .checked_add_days(Days::new(1))
        .ok_or_else(|| AppError::BadRequest("date out of range".into()))?;
    Ok((
        from.and_time(chrono::NaiveTime::MIN).and_utc(),
        end.and_time(chrono::NaiveTime::MIN).and_utc(),
    ))
}

pub fn average_ticket(revenue: i64, orders: i64) -> i64 {
    if orders == 0 {
        return 0;
    }
    (revenue as f64 / orders as f64).round() as i64
}

async fn overdue_accounts(state: &AppState, today: NaiveDate) -> AppResult<i64> {
    let debt_ids: Vec<Uuid> = Debts::find()
        .filter(DebtCol::Balance.gt(0))
        .all(&state.orm)
        .await?
        .into_iter()
        .map(|d| d.id)
        .collect();
    if debt_ids.is_empty() {
        return Ok(0);
    }

    let mut by_debt: HashMap<Uuid, Vec<TxModel>> = HashMap::new();
    for tx in DebtTransactions::find()
        .filter(TxCol::DebtId.is_in(debt_ids))
        .order_by_asc(TxCol::CreatedAt)
        .all(&state.orm)
        .await?
    {
        by_debt.entry(tx.debt_id).or_default().push(tx);
    }

    Ok(by_debt
        .values()
        .filter(|txs| status_for(txs, today).is_overdue)
        .count() as i64)
}

pub async fn dashboard(
    state: &AppState,
    user: &AuthUser,
    range: DateRange,
) -> AppResult<ApiResponse<Dashboard>> {
    ensure_permission(user, Permission::Stats)?;
    let today = Utc::now().date_naive();
    let (from, to) = range_bounds(&range, today)?;

    let (revenue, paid_orders): (i64, i64) = sqlx::query_as(&to_postgres(
        "SELECT COALESCE(SUM(total_amount), 0)::bigint, COUNT(*) \
         FROM orders WHERE payment_status = ? AND created_at >= ? AND created_at < ?",
    ))
    .bind(PaymentStatus::Paid.as_str())
    .bind(from)
    .bind(to)
    .fetch_one(&state.pool)
    .await?;

    let orders_by_status = sqlx::query_as::<_, StatusCount>(&to_postgres(
        "SELECT status, COUNT(*) AS count FROM orders \
         WHERE created_at >= ? AND created_at < ? GROUP BY status ORDER BY status",
    ))
    .bind(from)
    .bind(to)
    .fetch_all(&state.pool)
    .await?;

    let top_products = sqlx::query_as::<_, TopProduct>(&to_postgres(
        "SELECT oi.product_id, oi.product_name, \
                SUM(oi.quantity)::bigint AS units, \
                SUM(oi.quantity * oi.price)::bigint AS revenue \
         FROM order_items oi JOIN orders o ON o.id = oi.order_id \
         WHERE o.status <> 'cancelled' AND o.created_at >= ? AND o.created_at < ? \
         GROUP BY oi.product_id, oi.product_name \
         ORDER BY units DESC, revenue DESC LIMIT ?",
    ))
    .bind(from)
    .bind(to)
    .bind(TOP_PRODUCTS)
    .fetch_all(&state.pool)
    .await?;

    let (low_stock_products,): (i64,) = sqlx::query_as(&to_postgres(
        "SELECT COUNT(*) FROM products WHERE is_active AND stock <= ?",
    ))
    .bind(state.config.low_stock_threshold)
    .fetch_one(&state.pool)
    .await?;

    let (outstanding_debt,): (i64,) =
        sqlx::query_as("SELECT COALESCE(SUM(balance), 0)::bigint FROM debts")
            .fetch_one(&state.pool)
            .await?;

    let (pending_reviews,): (i64,) =
        sqlx::query_as(&to_postgres("SELECT COUNT(*) FROM reviews WHERE status = ?"))
            .bind(ReviewStatus::Pending.as_str())
            .fetch_one(&state.pool)
            .await?;

    let overdue_debt_accounts = overdue_accounts(state, today).await?;

    Ok(ApiResponse::success(
        "Dashboard",
        Dashboard {
            revenue_label: format_price(revenue),
            average_ticket: average_ticket(revenue, paid_orders),
            revenue,
            paid_orders,
            orders_by_status,
            top_products,
            low_stock_products,
            outstanding_debt,
            overdue_debt_accounts,
            pending_reviews,
        },
        None,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn range_end_includes_the_whole_day() {
        let range = DateRange {
            from: Some(date(2025, 3, 1)),
            to: Some(date(2025, 3, 31)),
        };
        let (from, to) = range_bounds(&range, date(2025, 6, 1)).unwrap();
        assert_eq!(from.date_naive(), date(2025, 3, 1));
        assert_eq!(to.date_naive(), date(2025, 4, 1));
    }

    #[test]
    fn inverted_range_is_rejected() {
        let range = DateRange {
            from: Some(date(2025, 3, 2)),
            to: Some(date(2025, 3, 1)),
        };
        assert!(range_bounds(&range, date(2025, 6, 1)).is_err());
    }

    #[test]
    fn average_ticket_rounds_and_handles_zero() {
        assert_eq!(average_ticket(0, 0), 0);
        assert_eq!(average_ticket(10_000, 3), 3_333);
        assert_eq!(average_ticket(20_000, 3), 6_667);
    }
}
