use std::collections::HashMap;

use chrono::{NaiveDate, Utc};
use sea_orm::ActiveValue::NotSet;
use sea_orm::sea_query::extension::postgres::PgExpr;
use sea_orm::sea_query::{Expr, LockType};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder,
    QuerySelect, Set, TransactionTrait,
};
use uuid::Uuid;

use crate::{
    audit,
    dto::debts::{
        ChargeRequest, CreateDebtRequest, DebtDetail, DebtList, DebtSummary, PaymentRequest,
        UpdateDebtRequest,
    },
    entity::{
        debt_transactions::{
            ActiveModel as TxActive, Column as TxCol, Entity as DebtTransactions, Model as TxModel,
        },
        debts::{ActiveModel, Column, Entity as Debts, Model as DebtModel},
    },
    error::{AppError, AppResult},
    installments::{DebtStatus, Installment, build_schedule, default_first_due, summarize},
    middleware::auth::{AuthUser, ensure_permission},
    models::{Debt, DebtTransaction, DebtTransactionKind, Permission},
    response::{ApiResponse, Meta},
    routes::params::{DebtListQuery, Pagination},
    state::AppState,
};

fn today() -> NaiveDate {
    Utc::now().date_naive()
}

/// Installment plan and payments of one account folded into its current status.
pub fn status_for(transactions: &[TxModel], today: NaiveDate) -> DebtStatus {
    let mut plan: Vec<Installment> = Vec::new();
    let mut paid = 0_i64;
    for tx in transactions {
        if tx.kind == DebtTransactionKind::Payment.as_str() {
            paid += tx.amount;
            continue;
        }
        let schedule: Vec<Installment> =
            serde_json::from_value(tx.schedule.clone()).unwrap_or_default();
        if schedule.is_empty() {
            plan.push(Installment {
                number: 1,
                due_date: tx.created_at.date_naive(),
                amount: tx.amount,
            });
        } else {
            plan.extend(schedule);
        }
    }
    summarize(plan.iter(), paid, today)
}

async fn transactions_by_debt(
    state: &AppState,
    debt_ids: &[Uuid],
) -> AppResult<HashMap<Uuid, Vec<TxModel>>> {
    let mut by_debt: HashMap<Uuid, Vec<TxModel>> = HashMap::new();
    if debt_ids.is_empty() {
        return Ok(by_debt);
    }
    let rows = DebtTransactions::find()
        .filter(TxCol::DebtId.is_in(debt_ids.iter().copied()))
        .order_by_asc(TxCol::CreatedAt)
        .all(&state.orm)
        .await?;
    for row in rows {
        by_debt.entry(row.debt_id).or_default().push(row);
    }
    Ok(by_debt)
}

fn summaries(
    debts: Vec<DebtModel>,
    mut transactions: HashMap<Uuid, Vec<TxModel>>,
    today: NaiveDate,
) -> Vec<DebtSummary> {
    debts
        .into_iter()
        .map(|debt| {
            let txs = transactions.remove(&debt.id).unwrap_or_default();
            DebtSummary {
                status: status_for(&txs, today),
                debt: Debt::from(debt),
            }
        })
        .collect()
}

pub async fn list_debts(
    state: &AppState,
    user: &AuthUser,
    query: DebtListQuery,
) -> AppResult<ApiResponse<DebtList>> {
    ensure_permission(user, Permission::Debts)?;
    let (page, limit, offset) = Pagination {
        page: query.page,
        per_page: query.per_page,
    }
    .normalize();

    let mut condition = Condition::all();
    if let Some(search) = query.q.as_ref().map(|s| s.trim()).filter(|s| !s.is_empty()) {
        let pattern = format!("%{search}%");
        condition = condition.add(
            Condition::any()
                .add(Expr::col(Column::CustomerName).ilike(pattern.clone()))
                .add(Expr::col(Column::Phone).ilike(pattern)),
        );
    }
    let overdue_only = query.overdue.unwrap_or(false);
    if query.with_balance.unwrap_or(false) || overdue_only {
        condition = condition.add(Column::Balance.gt(0));
    }

    let finder = Debts::find()
        .filter(condition)
        .order_by_desc(Column::UpdatedAt);
    let today = today();

    let (items, total) = if overdue_only {
        // Overdue is derived from the installment plans, so filter after loading.
        let debts = finder.all(&state.orm).await?;
        let ids: Vec<Uuid> = debts.iter().map(|d| d.id).collect();
        let txs = transactions_by_debt(state, &ids).await?;
        let overdue: Vec<DebtSummary> = summaries(debts, txs, today)
            .into_iter()
            .filter(|s| s.status.is_overdue)
            .collect();
        let total = overdue.len() as i64;
        let page_items = overdue
            .into_iter()
            .skip(offset as usize)
            .take(limit as usize)
            .collect();
        (page_items, total)
    } else {
        let total = finder.clone().count(&state.orm).await? as i64;
        let debts = finder
            .limit(limit as u64)
            .offset(offset as u64)
            .all(&state.orm)
            .await?;
        let ids: Vec<Uuid> = debts.iter().map(|d| d.id).collect();
        let txs = transactions_by_debt(state, &ids).await?;
        (summaries(debts, txs, today), total)
    };

    let meta = Meta::new(page, limit, total);
    Ok(ApiResponse::success("Debts", DebtList { items }, Some(meta)))
}

async fn detail(state: &AppState, debt: DebtModel) -> AppResult<DebtDetail> {
    let txs = transactions_by_debt(state, &[debt.id])
        .await?
        .remove(&debt.id)
        .unwrap_or_default();
    let status = status_for(&txs, today());
    Ok(DebtDetail {
        debt: Debt::from(debt),
        status,
        transactions: txs.into_iter().rev().map(DebtTransaction::from).collect(),
    })
}

pub async fn get_debt(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
) -> AppResult<ApiResponse<DebtDetail>> {
    ensure_permission(user, Permission::Debts)?;
    let debt = Debts::find_by_id(id)
        .one(&state.orm)
        .await?
        .ok_or(AppError::NotFound)?;
    Ok(ApiResponse::success("Debt", detail(state, debt).await?, None))
}

pub async fn create_debt(
    state: &AppState,
    user: &AuthUser,
    payload: CreateDebtRequest,
) -> AppResult<ApiResponse<Debt>> {
    ensure_permission(user, Permission::Debts)?;
    let name = payload.customer_name.trim();
    if name.is_empty() {
        return Err(AppError::BadRequest("customer_name is required".into()));
    }

    let debt = ActiveModel {
        id: Set(Uuid::new_v4()),
        customer_name: Set(name.to_string()),
        phone: Set(payload.phone.filter(|p| !p.trim().is_empty())),
        notes: Set(payload.notes),
        balance: Set(0),
        created_at: NotSet,
        updated_at: NotSet,
    }
    .insert(&state.orm)
    .await?;

    audit::record(
        &state.orm,
        Some(user.user_id),
        "debt_create",
        "debts",
        serde_json::json!({ "debt_id": debt.id }),
    )
    .await;

    Ok(ApiResponse::success("Debt created", Debt::from(debt), Some(Meta::empty())))
}

pub async fn update_debt(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
    payload: UpdateDebtRequest,
) -> AppResult<ApiResponse<Debt>> {
    ensure_permission(user, Permission::Debts)?;
    let debt = Debts::find_by_id(id)
        .one(&state.orm)
        .await?
        .ok_or(AppError::NotFound)?;

    let mut active: ActiveModel = debt.into();
    if let Some(name) = payload.customer_name {
        if name.trim().is_empty() {
            return Err(AppError::BadRequest("customer_name is required".into()));
        }
        active.customer_name = Set(name.trim().to_string());
    }
    if let Some(phone) = payload.phone {
        active.phone = Set(Some(phone).filter(|p| !p.trim().is_empty()));
    }
    if let Some(notes) = payload.notes {
        active.notes = Set(Some(notes));
    }
    active.updated_at = Set(Utc::now().into());
    let debt = active.update(&state.orm).await?;

    audit::record(
        &state.orm,
        Some(user.user_id),
        "debt_update",
        "debts",
        serde_json::json!({ "debt_id": id }),
    )
    .await;

    Ok(ApiResponse::success("Updated", Debt::from(debt), Some(Meta::empty())))
}

pub async fn delete_debt(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
) -> AppResult<ApiResponse<serde_json::Value>> {
    ensure_permission(user, Permission::Debts)?;
    let debt = Debts::find_by_id(id)
        .one(&state.orm)
        .await?
        .ok_or(AppError::NotFound)?;
    if debt.balance != 0 {
        return Err(AppError::Conflict(
            "an account with an outstanding balance cannot be deleted".into(),
        ));
    }
    Debts::delete_by_id(id).exec(&state.orm).await?;

    audit::record(
        &state.orm,
        Some(user.user_id),
        "debt_delete",
        "debts",
        serde_json::json!({ "debt_id": id, "customer_name": debt.customer_name }),
    )
    .await;

    Ok(ApiResponse::success(
        "Deleted",
        serde_json::json!({}),
        Some(Meta::empty()),
    ))
}

pub async fn add_charge(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
    payload: ChargeRequest,
) -> AppResult<ApiResponse<DebtDetail>> {
    ensure_permission(user, Permission::Debts)?;
    let installments = payload.installments.unwrap_or(1);
    let first_due = payload
        .first_due_date
        .unwrap_or_else(|| default_first_due(today()));
    let schedule = build_schedule(payload.amount, installments, first_due)?;

    let txn = state.orm.begin().await?;
    let debt = Debts::find_by_id(id)
        .lock(LockType::Update)
        .one(&txn)
        .await?
        .ok_or(AppError::NotFound)?;

    let balance = debt
        .balance
        .checked_add(payload.amount)
        .ok_or_else(|| AppError::BadRequest("amount is too large".into()))?;

    TxActive {
        id: Set(Uuid::new_v4()),
        debt_id: Set(debt.id),
        kind: Set(DebtTransactionKind::Charge.as_str().into()),
        amount: Set(payload.amount),
        description: Set(payload.description),
        installments: Set(installments as i32),
        schedule: Set(serde_json::to_value(&schedule).map_err(anyhow::Error::from)?),
        created_by: Set(Some(user.user_id)),
        created_at: NotSet,
    }
    .insert(&txn)
    .await?;

    let mut active: ActiveModel = debt.into();
    active.balance = Set(balance);
    active.updated_at = Set(Utc::now().into());
    let debt = active.update(&txn).await?;
    txn.commit().await?;

    audit::record(
        &state.orm,
        Some(user.user_id),
        "debt_charge",
        "debts",
        serde_json::json!({ "debt_id": id, "amount": payload.amount, "installments": installments }),
    )
    .await;

    Ok(ApiResponse::success(
        "Charge recorded",
        detail(state, debt).await?,
        Some(Meta::empty()),
    ))
}

pub async fn add_payment(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
    payload: PaymentRequest,
) -> AppResult<ApiResponse<DebtDetail>> {
    ensure_permission(user, Permission::Debts)?;
    if payload.amount <= 0 {
        return Err(AppError::BadRequest("amount must be greater than 0".into()));
    }

    let txn = state.orm.begin().await?;
    let debt = Debts::find_by_id(id)
        .lock(LockType::Update)
        .one(&txn)
        .await?
        .ok_or(AppError::NotFound)?;

    if payload.amount > debt.balance {
        return Err(AppError::BadRequest(format!(
            "payment exceeds the balance of {}",
            crate::money::format_price(debt.balance)
        )));
    }

    TxActive {
        id: Set(Uuid::new_v4()),
        debt_id: Set(debt.id),
        kind: Set(DebtTransactionKind::Payment.as_str().into()),
        amount: Set(payload.amount),
        description: Set(payload.description),
        installments: Set(1),
        schedule: Set(serde_json::json!([])),
        created_by: Set(Some(user.user_id)),
        created_at: NotSet,
    }
    .insert(&txn)
    .await?;

    let balance = debt.balance - payload.amount;
    let mut active: ActiveModel = debt.into();
    active.balance = Set(balance);
    active.updated_at = Set(Utc::now().into());
    let debt = active.update(&txn).await?;
    txn.commit().await?;

    audit::record(
        &state.orm,
        Some(user.user_id),
        "debt_payment",
        "debts",
        serde_json::json!({ "debt_id": id, "amount": payload.amount }),
    )
    .await;

    Ok(ApiResponse::success(
        "Payment recorded",
        detail(state, debt).await?,
        Some(Meta::empty()),
    ))
}

/// Undo the most recent movement on an account.
pub async fn delete_last_transaction(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
) -> AppResult<ApiResponse<DebtDetail>> {
    ensure_permission(user, Permission::Debts)?;
    let txn = state.orm.begin().await?;
    let debt = Debts::find_by_id(id)
        .lock(LockType::Update)
        .one(&txn)
        .await?
        .ok_or(AppError::NotFound)?;

    let last = DebtTransactions::find()
        .filter(TxCol::DebtId.eq(id))
        .order_by_desc(TxCol::CreatedAt)
        .order_by_desc(TxCol::Id)
        .one(&txn)
        .await?
        .ok_or_else(|| AppError::BadRequest("the account has no movements".into()))?;

    let balance = if last.kind == DebtTransactionKind::Payment.as_str() {
        debt.balance + last.amount
    } else {
        debt.balance - last.amount
    };
    if balance < 0 {
        return Err(AppError::Conflict(
            "removing this charge would leave a negative balance".into(),
        ));
    }

    DebtTransactions::delete_by_id(last.id).exec(&txn).await?;
    let mut active: ActiveModel = debt.into();
    active.balance = Set(balance);
    active.updated_at = Set(Utc::now().into());
    let debt = active.update(&txn).await?;
    txn.commit().await?;

    audit::record(
        &state.orm,
        Some(user.user_id),
        "debt_transaction_delete",
        "debts",
        serde_json::json!({ "debt_id": id, "kind": last.kind, "amount": last.amount }),
    )
    .await;

    Ok(ApiResponse::success(
        "Movement removed",
        detail(state, debt).await?,
        Some(Meta::empty()),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn tx(kind: DebtTransactionKind, amount: i64, schedule: &[Installment]) -> TxModel {
        TxModel {
            id: Uuid::new_v4(),
            debt_id: Uuid::nil(),
            kind: kind.as_str().into(),
            amount,
            description: None,
            installments: schedule.len().max(1) as i32,
            schedule: serde_json::to_value(schedule).unwrap(),
            created_by: None,
            created_at: Utc::now().into(),
        }
    }

    #[test]
    fn payments_cover_oldest_installments() {
        let plan = build_schedule(30_000, 3, date(2025, 1, 10)).unwrap();
        let txs = vec![
            tx(DebtTransactionKind::Charge, 30_000, &plan),
            tx(DebtTransactionKind::Payment, 12_000, &[]),
        ];
        let status = status_for(&txs, date(2025, 2, 1));
        assert_eq!(status.remaining.len(), 2);
        assert_eq!(status.next_due_date, Some(date(2025, 2, 10)));
        assert_eq!(status.next_due_amount, 8_000);
        assert!(!status.is_overdue);
    }

    #[test]
    fn unpaid_past_installment_is_overdue() {
        let plan = build_schedule(20_000, 2, date(2025, 1, 10)).unwrap();
        let txs = vec![tx(DebtTransactionKind::Charge, 20_000, &plan)];
        let status = status_for(&txs, date(2025, 1, 20));
        assert!(status.is_overdue);
        assert_eq!(status.overdue_amount, 10_000);
    }

    #[test]
    fn settled_account_has_nothing_due() {
        let plan = build_schedule(5_000, 1, date(2025, 1, 10)).unwrap();
        let txs = vec![
            tx(DebtTransactionKind::Charge, 5_000, &plan),
            tx(DebtTransactionKind::Payment, 5_000, &[]),
        ];
        let status = status_for(&txs, date(2025, 6, 1));
        assert!(status.remaining.is_empty());
        assert_eq!(status.next_due_date, None);
        assert!(!status.is_overdue);
    }
}
