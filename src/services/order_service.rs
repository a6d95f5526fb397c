use std::collections::BTreeSet;

use chrono::Utc;
use sea_orm::ActiveValue::NotSet;
use sea_orm::sea_query::{Expr, LockType};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, ConnectionTrait, EntityTrait, PaginatorTrait,
    QueryFilter, QueryOrder, QuerySelect, Set, TransactionTrait,
};
use uuid::Uuid;

use crate::{
    audit,
    dto::orders::{CheckoutRequest, CheckoutResponse, OrderList, OrderWithItems, ShippingAddress},
    entity::{
        cart_items::{Column as CartCol, Entity as CartItems},
        order_items::{
            ActiveModel as OrderItemActive, Column as OrderItemCol, Entity as OrderItems,
        },
        orders::{ActiveModel as OrderActive, Column as OrderCol, Entity as Orders, Model as OrderModel},
        product_variants::{Column as VariantCol, Entity as ProductVariants},
        products::{Column as ProdCol, Entity as Products},
        users::Entity as Users,
    },
    error::{AppError, AppResult},
    integrations::{
        mailer::Email,
        mercadopago::{BackUrls, PreferenceItem, PreferencePayer, PreferenceRequest},
    },
    middleware::auth::{AuthUser, ensure_customer},
    models::{Order, OrderItem, OrderStatus, PaymentMethod, PaymentStatus},
    money::format_price,
    response::{ApiResponse, Meta},
    routes::params::{OrderListQuery, SortOrder},
    services::{product_service::sync_product_stock, settings_service::load_settings},
    state::AppState,
};

pub async fn list_orders(
    state: &AppState,
    user: &AuthUser,
    query: OrderListQuery,
) -> AppResult<ApiResponse<OrderList>> {
    ensure_customer(user)?;
    let (page, limit, offset) = query.pagination().normalize();
    let mut condition = Condition::all().add(OrderCol::UserId.eq(user.user_id));
    if let Some(status) = query.status {
        condition = condition.add(OrderCol::Status.eq(status.as_str()));
    }

    let mut finder = Orders::find().filter(condition);
    finder = match query.sort_order.unwrap_or(SortOrder::Desc) {
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

pub async fn get_order(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
) -> AppResult<ApiResponse<OrderWithItems>> {
    ensure_customer(user)?;
    let order = Orders::find()
        .filter(
            Condition::all()
                .add(OrderCol::UserId.eq(user.user_id))
                .add(OrderCol::Id.eq(id)),
        )
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

pub async fn load_items<C: ConnectionTrait>(conn: &C, order_id: Uuid) -> AppResult<Vec<OrderItem>> {
    Ok(OrderItems::find()
        .filter(OrderItemCol::OrderId.eq(order_id))
        .order_by_asc(OrderItemCol::CreatedAt)
        .all(conn)
        .await?
        .into_iter()
        .map(OrderItem::from)
        .collect())
}

fn validate_address(address: &ShippingAddress) -> AppResult<()> {
    let fields = [
        ("recipient_name", &address.recipient_name),
        ("phone", &address.phone),
        ("street", &address.street),
        ("city", &address.city),
        ("province", &address.province),
        ("postal_code", &address.postal_code),
    ];
    if let Some((name, _)) = fields.iter().find(|(_, value)| value.trim().is_empty()) {
        return Err(AppError::BadRequest(format!("{name} is required")));
    }
    Ok(())
}

pub fn build_order_number(order_id: Uuid) -> String {
    let date = Utc::now().format("%Y%m%d");
    let simple = order_id.simple().to_string().to_uppercase();
    format!("UI-{}-{}", date, &simple[..8])
}

struct ReservedLine {
    product_id: Uuid,
    variant_id: Option<Uuid>,
    product_name: String,
    size: Option<String>,
    color: Option<String>,
    quantity: i32,
    price: i64,
}

pub async fn checkout(
    state: &AppState,
    user: &AuthUser,
    payload: CheckoutRequest,
) -> AppResult<ApiResponse<CheckoutResponse>> {
    ensure_customer(user)?;
    validate_address(&payload.address)?;

    let settings = load_settings(&state.orm).await?;
    let txn = state.orm.begin().await?;

    let mut cart = CartItems::find()
        .filter(CartCol::UserId.eq(user.user_id))
        .all(&txn)
        .await?;
    if cart.is_empty() {
        return Err(AppError::BadRequest("Cart is empty".into()));
    }
    // Lock rows in a stable order so concurrent checkouts cannot deadlock.
    cart.sort_by_key(|line| (line.product_id, line.variant_id));

    let mut reserved = Vec::with_capacity(cart.len());
    let mut with_variants = BTreeSet::new();
    for line in &cart {
        if line.quantity <= 0 {
            return Err(AppError::BadRequest("Cart has invalid quantity".into()));
        }
        let product = Products::find_by_id(line.product_id)
            .lock(LockType::Update)
            .one(&txn)
            .await?
            .filter(|p| p.is_active)
            .ok_or_else(|| AppError::BadRequest("A product in the cart is no longer available".into()))?;

        let (size, color) = match line.variant_id {
            Some(variant_id) => {
                let variant = ProductVariants::find_by_id(variant_id)
                    .filter(VariantCol::ProductId.eq(product.id))
                    .lock(LockType::Update)
                    .one(&txn)
                    .await?
                    .ok_or_else(|| AppError::BadRequest("A size in the cart is no longer available".into()))?;
                if variant.stock < line.quantity {
                    return Err(AppError::BadRequest(format!(
                        "Insufficient stock for {} ({})",
                        product.name, variant.size
                    )));
                }
                ProductVariants::update_many()
                    .col_expr(VariantCol::Stock, Expr::col(VariantCol::Stock).sub(line.quantity))
                    .filter(VariantCol::Id.eq(variant_id))
                    .exec(&txn)
                    .await?;
                with_variants.insert(product.id);
                (Some(variant.size), variant.color)
            }
            None => {
                if product.stock < line.quantity {
                    return Err(AppError::BadRequest(format!(
                        "Insufficient stock for {}",
                        product.name
                    )));
                }
                Products::update_many()
                    .col_expr(ProdCol::Stock, Expr::col(ProdCol::Stock).sub(line.quantity))
                    .filter(ProdCol::Id.eq(product.id))
                    .exec(&txn)
                    .await?;
                (None, None)
            }
        };

        reserved.push(ReservedLine {
            product_id: product.id,
            variant_id: line.variant_id,
            product_name: product.name,
            size,
            color,
            quantity: line.quantity,
            price: product.price,
        });
    }
    for product_id in with_variants {
        sync_product_stock(&txn, product_id).await?;
    }

    let subtotal: i64 = reserved
        .iter()
        .map(|line| line.price * i64::from(line.quantity))
        .sum();
    let shipping_cost = settings.shipping_for(payload.shipping_method, subtotal);
    let discount_amount = settings.discount_for(payload.payment_method, subtotal);

    let order_id = Uuid::new_v4();
    let address = payload.address;
    let order = OrderActive {
        id: Set(order_id),
        user_id: Set(user.user_id),
        order_number: Set(build_order_number(order_id)),
        status: Set(OrderStatus::Pending.as_str().into()),
        payment_status: Set(PaymentStatus::Unpaid.as_str().into()),
        payment_method: Set(payload.payment_method.as_str().into()),
        shipping_method: Set(payload.shipping_method.as_str().into()),
        subtotal: Set(subtotal),
        discount_amount: Set(discount_amount),
        shipping_cost: Set(shipping_cost),
        total_amount: Set(subtotal - discount_amount + shipping_cost),
        recipient_name: Set(address.recipient_name.trim().to_string()),
        phone: Set(address.phone.trim().to_string()),
        street: Set(address.street.trim().to_string()),
        city: Set(address.city.trim().to_string()),
        province: Set(address.province.trim().to_string()),
        postal_code: Set(address.postal_code.trim().to_string()),
        notes: Set(payload.notes.filter(|n| !n.trim().is_empty())),
        payment_reference: Set(None),
        payment_id: Set(None),
        paid_at: Set(None),
        created_at: NotSet,
        updated_at: NotSet,
    }
    .insert(&txn)
    .await?;

    let mut items = Vec::with_capacity(reserved.len());
    for line in reserved {
        let item = OrderItemActive {
            id: Set(Uuid::new_v4()),
            order_id: Set(order.id),
            product_id: Set(Some(line.product_id)),
            variant_id: Set(line.variant_id),
            product_name: Set(line.product_name),
            size: Set(line.size),
            color: Set(line.color),
            quantity: Set(line.quantity),
            price: Set(line.price),
            created_at: NotSet,
        }
        .insert(&txn)
        .await?;
        items.push(OrderItem::from(item));
    }

    CartItems::delete_many()
        .filter(CartCol::UserId.eq(user.user_id))
        .exec(&txn)
        .await?;

    txn.commit().await?;

    audit::record(
        &state.orm,
        Some(user.user_id),
        "checkout",
        "orders",
        serde_json::json!({ "order_id": order.id, "total": order.total_amount }),
    )
    .await;

    let customer = Users::find_by_id(user.user_id).one(&state.orm).await?;
    let mut order = order;
    let mut payment_url = None;

    if payload.payment_method == PaymentMethod::MercadoPago {
        match (&state.payments, &customer) {
            (Some(gateway), Some(customer)) => {
                let request = preference_for(
                    &order,
                    &items,
                    PreferencePayer {
                        name: customer.name.clone(),
                        email: customer.email.clone(),
                    },
                    &state.config.public_base_url,
                );
                match gateway.create_preference(&request).await {
                    Ok(preference) => {
                        let mut active: OrderActive = order.into();
                        active.payment_reference = Set(Some(preference.id));
                        active.updated_at = Set(Utc::now().into());
                        order = active.update(&state.orm).await?;
                        payment_url = Some(preference.init_point);
                    }
                    Err(err) => {
                        tracing::warn!(error = %err, order_id = %order.id, "payment preference failed");
                    }
                }
            }
            (None, _) => {
                tracing::info!(order_id = %order.id, "online payments not configured, order left pending");
            }
            (Some(_), None) => {}
        }
    }

    if let Some(customer) = customer {
        let email = confirmation_email(&customer.email, &order, &items, &state.config.store.name);
        if let Err(err) = state.mailer.send(&email).await {
            tracing::warn!(error = %err, order_id = %order.id, "order confirmation email failed");
        }
    }

    Ok(ApiResponse::success(
        "Checkout success",
        CheckoutResponse {
            order: Order::from(order),
            items,
            payment_url,
        },
        Some(Meta::empty()),
    ))
}

pub fn preference_for(
    order: &OrderModel,
    items: &[OrderItem],
    payer: PreferencePayer,
    base_url: &str,
) -> PreferenceRequest {
    let base_url = base_url.trim_end_matches('/');
    let mut lines: Vec<PreferenceItem> = items
        .iter()
        .map(|item| PreferenceItem {
            title: item_title(item),
            quantity: item.quantity,
            unit_price: item.price,
            currency_id: "ARS",
        })
        .collect();
    if order.shipping_cost > 0 {
        lines.push(PreferenceItem {
            title: "Envío".to_string(),
            quantity: 1,
            unit_price: order.shipping_cost,
            currency_id: "ARS",
        });
    }
    let order_page = format!("{base_url}/orders/{}", order.id);
    PreferenceRequest {
        items: lines,
        payer,
        external_reference: order.id.to_string(),
        notification_url: format!("{base_url}/api/payments/webhook"),
        back_urls: BackUrls {
            success: order_page.clone(),
            failure: order_page.clone(),
            pending: order_page,
        },
        auto_return: "approved",
    }
}

fn item_title(item: &OrderItem) -> String {
    match (&item.size, &item.color) {
        (Some(size), Some(color)) => format!("{} ({size}, {color})", item.product_name),
        (Some(size), None) => format!("{} ({size})", item.product_name),
        _ => item.product_name.clone(),
    }
}

pub fn confirmation_email(to: &str, order: &OrderModel, items: &[OrderItem], store: &str) -> Email {
    let mut text = format!(
        "Gracias por tu compra en {store}.\n\nPedido {}\n\n",
        order.order_number
    );
    for item in items {
        text.push_str(&format!(
            "{} x{} - {}\n",
            item_title(item),
            item.quantity,
            format_price(item.price * i64::from(item.quantity))
        ));
    }
    text.push_str(&format!("\nSubtotal: {}\n", format_price(order.subtotal)));
    if order.discount_amount > 0 {
        text.push_str(&format!(
            "Descuento transferencia: -{}\n",
            format_price(order.discount_amount)
        ));
    }
    text.push_str(&format!("Envío: {}\n", format_price(order.shipping_cost)));
    text.push_str(&format!("Total: {}\n", format_price(order.total_amount)));

    Email {
        to: to.to_string(),
        subject: format!("{store} - pedido {}", order.order_number),
        text,
    }
}

/// Put reserved units back on the shelf for a cancelled order.
pub async fn restore_stock<C: ConnectionTrait>(conn: &C, order_id: Uuid) -> AppResult<()> {
    let items = OrderItems::find()
        .filter(OrderItemCol::OrderId.eq(order_id))
        .all(conn)
        .await?;

    let mut with_variants = BTreeSet::new();
    for item in items {
        match (item.variant_id, item.product_id) {
            (Some(variant_id), Some(product_id)) => {
                ProductVariants::update_many()
                    .col_expr(VariantCol::Stock, Expr::col(VariantCol::Stock).add(item.quantity))
                    .filter(VariantCol::Id.eq(variant_id))
                    .exec(conn)
                    .await?;
                with_variants.insert(product_id);
            }
            (None, Some(product_id)) => {
                let has_variants = ProductVariants::find()
                    .filter(VariantCol::ProductId.eq(product_id))
                    .count(conn)
                    .await?
                    > 0;
                // The size was removed since; product stock follows the remaining sizes.
                if has_variants {
                    with_variants.insert(product_id);
                    continue;
                }
                Products::update_many()
                    .col_expr(ProdCol::Stock, Expr::col(ProdCol::Stock).add(item.quantity))
                    .filter(ProdCol::Id.eq(product_id))
                    .exec(conn)
                    .await?;
            }
            // The product was deleted since; nothing to restore.
            _ => {}
        }
    }
    for product_id in with_variants {
        sync_product_stock(conn, product_id).await?;
    }
    Ok(())
}

pub async fn cancel_order(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
) -> AppResult<ApiResponse<OrderWithItems>> {
    ensure_customer(user)?;
    let txn = state.orm.begin().await?;

    let order = Orders::find()
        .filter(
            Condition::all()
                .add(OrderCol::UserId.eq(user.user_id))
                .add(OrderCol::Id.eq(id)),
        )
        .lock(LockType::Update)
        .one(&txn)
        .await?
        .ok_or(AppError::NotFound)?;

    if order.status != OrderStatus::Pending.as_str()
        || order.payment_status != PaymentStatus::Unpaid.as_str()
    {
        return Err(AppError::Conflict(
            "only pending unpaid orders can be cancelled".into(),
        ));
    }

    restore_stock(&txn, order.id).await?;

    let mut active: OrderActive = order.into();
    active.status = Set(OrderStatus::Cancelled.as_str().into());
    active.updated_at = Set(Utc::now().into());
    let order = active.update(&txn).await?;
    let items = load_items(&txn, order.id).await?;

    txn.commit().await?;

    audit::record(
        &state.orm,
        Some(user.user_id),
        "order_cancel",
        "orders",
        serde_json::json!({ "order_id": order.id }),
    )
    .await;

    Ok(ApiResponse::success(
        "Order cancelled",
        OrderWithItems {
            order: Order::from(order),
            items,
        },
        Some(Meta::empty()),
    ))
}

/// Record a payment on an order. Returns `false` when it was already paid.
pub async fn mark_order_paid<C: ConnectionTrait>(
    conn: &C,
    order_id: Uuid,
    reference: Option<String>,
    payment_id: Option<String>,
) -> AppResult<(OrderModel, bool)> {
    let order = Orders::find_by_id(order_id)
        .lock(LockType::Update)
        .one(conn)
        .await?
        .ok_or(AppError::NotFound)?;

    if order.payment_status == PaymentStatus::Paid.as_str() {
        return Ok((order, false));
    }
    if order.status == OrderStatus::Cancelled.as_str() {
        return Err(AppError::Conflict("order is cancelled".into()));
    }

    let now = Utc::now();
    let advance = order.status == OrderStatus::Pending.as_str();
    let mut active: OrderActive = order.into();
    active.payment_status = Set(PaymentStatus::Paid.as_str().into());
    if advance {
        active.status = Set(OrderStatus::Paid.as_str().into());
    }
    if reference.is_some() {
        active.payment_reference = Set(reference);
    }
    if payment_id.is_some() {
        active.payment_id = Set(payment_id);
    }
    active.paid_at = Set(Some(now.into()));
    active.updated_at = Set(now.into());
    let order = active.update(conn).await?;
    Ok((order, true))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn order_model(shipping_cost: i64) -> OrderModel {
        let now = Utc::now().into();
        OrderModel {
            id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            order_number: "UI-20250301-ABCDEF12".into(),
            status: "pending".into(),
            payment_status: "unpaid".into(),
            payment_method: "mercadopago".into(),
            shipping_method: "delivery".into(),
            subtotal: 30_000,
            discount_amount: 0,
            shipping_cost,
            total_amount: 30_000 + shipping_cost,
            recipient_name: "Ana".into(),
            phone: "1122334455".into(),
            street: "Av. Siempre Viva 742".into(),
            city: "Rosario".into(),
            province: "Santa Fe".into(),
            postal_code: "2000".into(),
            notes: None,
            payment_reference: None,
            payment_id: None,
            paid_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    fn item(order_id: Uuid) -> OrderItem {
        OrderItem {
            id: Uuid::new_v4(),
            order_id,
            product_id: Some(Uuid::new_v4()),
            variant_id: None,
            product_name: "Remera Oversize".into(),
            size: Some("M".into()),
            color: None,
            quantity: 2,
            price: 15_000,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn order_number_has_date_and_short_id() {
        let number = build_order_number(Uuid::new_v4());
        let parts: Vec<&str> = number.split('-').collect();
        assert_eq!(parts[0], "UI");
        assert_eq!(parts[1].len(), 8);
        assert_eq!(parts[2].len(), 8);
    }

    #[test]
    fn preference_adds_shipping_line_and_reference() {
        let order = order_model(5_000);
        let items = vec![item(order.id)];
        let payer = PreferencePayer {
            name: "Ana".into(),
            email: "ana@example.com".into(),
        };
        let request = preference_for(&order, &items, payer, "https://tienda.example/");
        assert_eq!(request.items.len(), 2);
        assert_eq!(request.items[0].title, "Remera Oversize (M)");
        assert_eq!(request.items[1].unit_price, 5_000);
        assert_eq!(request.external_reference, order.id.to_string());
        assert_eq!(
            request.notification_url,
            "https://tienda.example/api/payments/webhook"
        );
    }

    #[test]
    fn free_shipping_has_no_shipping_line() {
        let order = order_model(0);
        let items = vec![item(order.id)];
        let payer = PreferencePayer {
            name: "Ana".into(),
            email: "ana@example.com".into(),
        };
        assert_eq!(preference_for(&order, &items, payer, "http://x").items.len(), 1);
    }

    #[test]
    fn confirmation_lists_items_and_total() {
        let order = order_model(5_000);
        let items = vec![item(order.id)];
        let email = confirmation_email("ana@example.com", &order, &items, "Urban Indumentaria");
        assert!(email.subject.contains("UI-20250301-ABCDEF12"));
        assert!(email.text.contains("Remera Oversize (M) x2 - $30.000"));
        assert!(email.text.contains("Total: $35.000"));
    }

    #[test]
    fn blank_address_fields_are_rejected() {
        let address = ShippingAddress {
            recipient_name: "Ana".into(),
            phone: " ".into(),
            street: "Calle 1".into(),
            city: "Rosario".into(),
            province: "Santa Fe".into(),
            postal_code: "2000".into(),
        };
        assert!(matches!(
            validate_address(&address),
            Err(AppError::BadRequest(msg)) if msg == "phone is required"
        ));
    }
}
