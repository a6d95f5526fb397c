use chrono::Utc;
use sea_orm::ActiveValue::Set;
use sea_orm::sea_query::LockType;
use sea_orm::sea_query::extension::postgres::PgExpr;
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder,
    QuerySelect, TransactionTrait,
};
use uuid::Uuid;

use crate::{
    audit,
    dto::orders::{MarkPaidRequest, OrderList, OrderWithItems, UpdateOrderStatusRequest},
    entity::{
        orders::{ActiveModel as OrderActive, Column as OrderCol, Entity as Orders, Model as OrderModel},
        users::Entity as Users,
    },
    error::{AppError, AppResult},
    integrations::mailer::Email,
    middleware::auth::{AuthUser, ensure_permission},
    models::{Order, OrderStatus, PaymentStatus, Permission},
    response::{ApiResponse, Meta},
    routes::params::{OrderListQuery, SortOrder},
    services::order_service::{load_items, mark_order_paid, restore_stock},
    state::AppState,
};

pub async fn list_all_orders(
    state: &AppState,
    user: &AuthUser,
    query: OrderListQuery,
) -> AppResult<ApiResponse<OrderList>> {
    ensure_permission(user, Permission::Orders)?;
    let (page, limit, offset) = query.pagination().normalize();

    let mut condition = Condition::all();
    if let Some(status) = query.status {
        condition = condition.add(OrderCol::Status.eq(status.as_str()));
    }
    if let Some(search) = query.q.as_ref().map(|s| s.trim()).filter(|s| !s.is_empty()) {
        let pattern = format!("%{search}%");
        condition = condition.add(
            Condition::any()
                .add(Expr::col(OrderCol::OrderNumber).ilike(pattern.clone()))
                .add(Expr::col(OrderCol::RecipientName).ilike(pattern.clone()))
                .add(Expr::col(OrderCol::Phone).ilike(pattern)),
        );
    }
    if let Some(since) = query.updated_since {
        condition = condition.add(OrderCol::UpdatedAt.gt(since));
    }

    let mut finder = Orders::find().filter(condition);

    let sort_order = query.sort_order.unwrap_or(SortOrder::Desc);
    finder = match sort_order {
        SortOrder::Asc => finder.order_by_asc(OrderCol::CreatedAt),
        SortOrder::Desc => finder.order_by_desc(OrderCol::CreatedAt),
    };

    let total = finder.clone().count(&state.orm).await? as i64;

    let orders = finder
        .limit(limit as u64)
        .offset(offset as u64)
        .all(&state.orm)
        .await?
        .into_iter()
        .map(Order::from)
        .collect();

    let meta = Meta::new(page, limit, total);
    Ok(ApiResponse::success(
        "Ok",
        OrderList { items: orders },
        Some(meta),
    ))
}

pub async fn get_order_admin(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
) -> AppResult<ApiResponse<OrderWithItems>> {
    ensure_permission(user, Permission::Orders)?;
    let order = Orders::find_by_id(id)
        .one(&state.orm)
        .await?
        .ok_or(AppError::NotFound)?;
    let items = load_items(&state.orm, order.id).await?;

    Ok(ApiResponse::success(
        "OK",
        OrderWithItems {
            order: Order::from(order),
            items,
        },
        Some(Meta::empty()),
    ))
}

pub async fn update_order_status(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
    payload: UpdateOrderStatusRequest,
) -> AppResult<ApiResponse<OrderWithItems>> {
    ensure_permission(user, Permission::Orders)?;
    let txn = state.orm.begin().await?;

    let order = Orders::find_by_id(id)
        .lock(LockType::Update)
        .one(&txn)
        .await?
        .ok_or(AppError::NotFound)?;

    let current: OrderStatus = order
        .status
        .parse()
        .map_err(|_| AppError::Internal(anyhow::anyhow!("unknown order status {}", order.status)))?;
    let next = payload.status;
    if !current.can_transition_to(next) {
        return Err(AppError::Conflict(format!(
            "cannot move order from {current} to {next}"
        )));
    }

    let was_paid = order.payment_status == PaymentStatus::Paid.as_str();
    if next == OrderStatus::Cancelled {
        restore_stock(&txn, order.id).await?;
    }

    let now = Utc::now();
    let mut active: OrderActive = order.into();
    active.status = Set(next.as_str().into());
    match next {
        OrderStatus::Cancelled if was_paid => {
            active.payment_status = Set(PaymentStatus::Refunded.as_str().into());
        }
        OrderStatus::Paid if !was_paid => {
            active.payment_status = Set(PaymentStatus::Paid.as_str().into());
            active.paid_at = Set(Some(now.into()));
        }
        _ => {}
    }
    active.updated_at = Set(now.into());
    let order = active.update(&txn).await?;
    let items = load_items(&txn, order.id).await?;

    txn.commit().await?;

    audit::record(
        &state.orm,
        Some(user.user_id),
        "order_status_update",
        "orders",
        serde_json::json!({ "order_id": order.id, "from": current, "to": next }),
    )
    .await;

    notify_status(state, &order, next).await;

    Ok(ApiResponse::success(
        "Status updated",
        OrderWithItems {
            order: Order::from(order),
            items,
        },
        Some(Meta::empty()),
    ))
}

pub async fn mark_paid(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
    payload: MarkPaidRequest,
) -> AppResult<ApiResponse<OrderWithItems>> {
    ensure_permission(user, Permission::Orders)?;
    let txn = state.orm.begin().await?;
    let (order, changed) = mark_order_paid(&txn, id, payload.reference, None).await?;
    if !changed {
        return Err(AppError::Conflict("Order already paid".into()));
    }
    let items = load_items(&txn, order.id).await?;
    txn.commit().await?;

    audit::record(
        &state.orm,
        Some(user.user_id),
        "order_paid",
        "orders",
        serde_json::json!({ "order_id": order.id, "manual": true }),
    )
    .await;

    Ok(ApiResponse::success(
        "Payment recorded",
        OrderWithItems {
            order: Order::from(order),
            items,
        },
        Some(Meta::empty()),
    ))
}

pub fn status_email(to: &str, order: &OrderModel, status: OrderStatus, store: &str) -> Option<Email> {
    let line = match status {
        OrderStatus::Preparing => "estamos preparando tu pedido",
        OrderStatus::Shipped => "tu pedido fue despachado",
        OrderStatus::Delivered => "tu pedido fue entregado",
        OrderStatus::Cancelled => "tu pedido fue cancelado",
        OrderStatus::Pending | OrderStatus::Paid => return None,
    };
    Some(Email {
        to: to.to_string(),
        subject: format!("{store} - pedido {}", order.order_number),
        text: format!("Hola {}, {line}.\n\nPedido {}", order.recipient_name, order.order_number),
    })
}

async fn notify_status(state: &AppState, order: &OrderModel, status: OrderStatus) {
    let customer = match Users::find_by_id(order.user_id).one(&state.orm).await {
        Ok(Some(customer)) => customer,
        Ok(None) => return,
        Err(err) => {
            tracing::warn!(error = %err, order_id = %order.id, "status email skipped");
            return;
        }
    };
    let Some(email) = status_email(&customer.email, order, status, &state.config.store.name) else {
        return;
    };
    if let Err(err) = state.mailer.send(&email).await {
        tracing::warn!(error = %err, order_id = %order.id, "status email failed");
    }
}
