use std::sync::Arc;

use async_trait::async_trait;
use urban_indumentaria_api::{
    config::AppConfig,
    db::{create_pool, run_migrations},
    dto::{
        auth::RegisterRequest,
        cart::AddToCartRequest,
        categories::{CategoryRequest, SubcategoryRequest, UpdateSubcategoryRequest},
        debts::{ChargeRequest, CreateDebtRequest, PaymentRequest},
        operators::{CreateOperatorRequest, UpdateOperatorRequest},
        orders::{CheckoutRequest, CheckoutResponse, ShippingAddress, UpdateOrderStatusRequest},
        payments::PaymentNotification,
        products::{CreateProductRequest, UpdateProductRequest, VariantInput},
        reviews::CreateReviewRequest,
        shipping::ShippingLabelRequest,
    },
    error::AppError,
    integrations::mercadopago::{
        PaymentError, PaymentGateway, PaymentInfo, Preference, PreferenceRequest,
    },
    middleware::auth::AuthUser,
    models::{OrderStatus, PaymentMethod, Permission, Product, ShippingMethod, SiteSettings},
    services::{
        admin_service, auth_service, cart_service, category_service, debt_service,
        operator_service, order_service, payment_service, product_service, review_service,
        settings_service, shipping_service,
    },
    state::AppState,
};
use uuid::Uuid;

// Every flow skips when no database is configured.
fn database_url() -> Option<String> {
    std::env::var("TEST_DATABASE_URL")
        .or_else(|_| std::env::var("DATABASE_URL"))
        .ok()
}

macro_rules! require_db {
    () => {
        match database_url() {
            Some(url) => url,
            None => {
                eprintln!("Skipping test: set TEST_DATABASE_URL or DATABASE_URL to run store flow tests.");
                return Ok(());
            }
        }
    };
}

async fn setup_state(database_url: &str) -> anyhow::Result<AppState> {
    let pool = create_pool(database_url, 5).await?;
    run_migrations(&pool).await?;
    Ok(AppState::new(pool, AppConfig::for_database(database_url)))
}

async fn create_owner(state: &AppState) -> anyhow::Result<AuthUser> {
    let id = Uuid::new_v4();
    sqlx::query(
        "INSERT INTO operators (id, name, email, password_hash, is_owner) VALUES ($1, $2, $3, 'x', TRUE)",
    )
    .bind(id)
    .bind("Owner")
    .bind(format!("owner-{id}@test.local"))
    .execute(&state.pool)
    .await?;
    Ok(AuthUser::operator(id, true, Vec::new()))
}

async fn create_customer(state: &AppState) -> anyhow::Result<AuthUser> {
    let resp = auth_service::register_user(
        state,
        RegisterRequest {
            name: "Cliente Test".into(),
            email: format!("cliente-{}@test.local", Uuid::new_v4()),
            phone: Some("1122334455".into()),
            password: "secreto123".into(),
        },
    )
    .await?;
    let user = resp.data.expect("registered user");
    Ok(AuthUser::customer(user.id))
}

async fn create_product(
    state: &AppState,
    owner: &AuthUser,
    sizes: &[(&str, i32)],
    category_id: Option<Uuid>,
) -> anyhow::Result<Product> {
    let product = product_service::create_product(
        state,
        owner,
        CreateProductRequest {
            name: format!("Remera Test {}", Uuid::new_v4()),
            slug: None,
            description: Some("Algodón".into()),
            category_id,
            subcategory_id: None,
            price: Some(10_000),
            original_price: None,
            discount_percent: None,
            images: Vec::new(),
            stock: 0,
            variants: sizes
                .iter()
                .map(|(size, stock)| VariantInput {
                    id: None,
                    size: size.to_string(),
                    color: None,
                    stock: *stock,
                })
                .collect(),
            is_featured: false,
            is_top: false,
            is_upcoming: false,
            on_sale: false,
            is_active: Some(true),
        },
    )
    .await?
    .data
    .expect("product");
    Ok(product)
}

fn variant_id(product: &Product, size: &str) -> Uuid {
    product
        .variants
        .iter()
        .find(|v| v.size == size)
        .expect("size")
        .id
}

fn address() -> ShippingAddress {
    ShippingAddress {
        recipient_name: "Ana Pérez".into(),
        phone: "1122334455".into(),
        street: "Av. Corrientes 1234".into(),
        city: "CABA".into(),
        province: "Buenos Aires".into(),
        postal_code: "1043".into(),
    }
}

async fn buy(
    state: &AppState,
    customer: &AuthUser,
    product: &Product,
    size: &str,
    quantity: i32,
    shipping_method: ShippingMethod,
    payment_method: PaymentMethod,
) -> anyhow::Result<CheckoutResponse> {
    cart_service::add_to_cart(
        state,
        customer,
        AddToCartRequest {
            product_id: product.id,
            variant_id: Some(variant_id(product, size)),
            quantity,
        },
    )
    .await?;
    let placed = order_service::checkout(
        state,
        customer,
        CheckoutRequest {
            address: address(),
            shipping_method,
            payment_method,
            notes: None,
        },
    )
    .await?
    .data
    .expect("checkout");
    Ok(placed)
}

async fn current_stock(state: &AppState, product_id: Uuid) -> anyhow::Result<(i32, i32)> {
    let product = product_service::get_product(state, &product_id.to_string(), true)
        .await?
        .data
        .expect("product");
    let variants = product.variants.iter().map(|v| v.stock).sum();
    Ok((product.stock, variants))
}

#[tokio::test]
async fn checkout_reserves_stock_and_cancel_restores_it() -> anyhow::Result<()> {
    let url = require_db!();
    let state = setup_state(&url).await?;
    let owner = create_owner(&state).await?;
    let customer = create_customer(&state).await?;

    let product = create_product(&state, &owner, &[("M", 3), ("L", 2)], None).await?;
    assert_eq!(product.stock, 5);
    let medium = variant_id(&product, "M");

    // Sized products need a variant.
    let err = cart_service::add_to_cart(
        &state,
        &customer,
        AddToCartRequest { product_id: product.id, variant_id: None, quantity: 1 },
    )
    .await
    .unwrap_err();
    assert!(matches!(err, AppError::BadRequest(_)));

    // More than the size has in stock.
    let err = cart_service::add_to_cart(
        &state,
        &customer,
        AddToCartRequest { product_id: product.id, variant_id: Some(medium), quantity: 4 },
    )
    .await
    .unwrap_err();
    assert!(matches!(err, AppError::BadRequest(_)));

    cart_service::add_to_cart(
        &state,
        &customer,
        AddToCartRequest { product_id: product.id, variant_id: Some(medium), quantity: 2 },
    )
    .await?;

    // Adding on top of an existing line must not wrap around.
    let err = cart_service::add_to_cart(
        &state,
        &customer,
        AddToCartRequest { product_id: product.id, variant_id: Some(medium), quantity: i32::MAX },
    )
    .await
    .unwrap_err();
    assert!(matches!(err, AppError::BadRequest(_)));

    let cart = cart_service::list_cart(&state, &customer).await?.data.expect("cart");
    assert_eq!(cart.items.len(), 1);
    assert_eq!(cart.subtotal, 20_000);

    let placed = order_service::checkout(
        &state,
        &customer,
        CheckoutRequest {
            address: address(),
            shipping_method: ShippingMethod::Pickup,
            payment_method: PaymentMethod::Cash,
            notes: None,
        },
    )
    .await?
    .data
    .expect("checkout");
    assert_eq!(placed.order.total_amount, 20_000);
    assert_eq!(placed.order.discount_amount, 0);
    assert_eq!(placed.order.status, "pending");
    assert!(placed.payment_url.is_none());
    assert_eq!(placed.items.len(), 1);
    assert_eq!(placed.items[0].size.as_deref(), Some("M"));

    let after = product_service::get_product(&state, &product.slug, false)
        .await?
        .data
        .expect("product");
    assert_eq!(after.stock, 3);

    let cart = cart_service::list_cart(&state, &customer).await?.data.expect("cart");
    assert!(cart.items.is_empty());

    // Pending orders cannot jump straight to delivered.
    let err = admin_service::update_order_status(
        &state,
        &owner,
        placed.order.id,
        UpdateOrderStatusRequest { status: OrderStatus::Delivered },
    )
    .await
    .unwrap_err();
    assert!(matches!(err, AppError::Conflict(_)));

    let cancelled = order_service::cancel_order(&state, &customer, placed.order.id)
        .await?
        .data
        .expect("cancelled order");
    assert_eq!(cancelled.order.status, "cancelled");
    assert_eq!(current_stock(&state, product.id).await?, (5, 5));

    // Customers cannot reach the back office.
    let err = admin_service::get_order_admin(&state, &customer, placed.order.id)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Forbidden));

    Ok(())
}

#[tokio::test]
async fn orders_advance_one_stage_at_a_time() -> anyhow::Result<()> {
    let url = require_db!();
    let state = setup_state(&url).await?;
    let owner = create_owner(&state).await?;
    let customer = create_customer(&state).await?;
    let product = create_product(&state, &owner, &[("S", 2)], None).await?;

    let placed = buy(&state, &customer, &product, "S", 1, ShippingMethod::Pickup, PaymentMethod::Cash).await?;
    let id = placed.order.id;

    let err = admin_service::update_order_status(
        &state,
        &owner,
        id,
        UpdateOrderStatusRequest { status: OrderStatus::Shipped },
    )
    .await
    .unwrap_err();
    assert!(matches!(err, AppError::Conflict(_)));

    for next in [OrderStatus::Paid, OrderStatus::Preparing, OrderStatus::Shipped] {
        let order = admin_service::update_order_status(
            &state,
            &owner,
            id,
            UpdateOrderStatusRequest { status: next },
        )
        .await?
        .data
        .expect("order");
        assert_eq!(order.order.status, next.as_str());
    }

    let order = admin_service::get_order_admin(&state, &owner, id)
        .await?
        .data
        .expect("order");
    assert_eq!(order.order.payment_status, "paid");

    // Shipped orders can no longer be cancelled.
    let err = admin_service::update_order_status(
        &state,
        &owner,
        id,
        UpdateOrderStatusRequest { status: OrderStatus::Cancelled },
    )
    .await
    .unwrap_err();
    assert!(matches!(err, AppError::Conflict(_)));

    Ok(())
}

#[tokio::test]
async fn cancelling_after_a_size_is_removed_keeps_stock_in_sync() -> anyhow::Result<()> {
    let url = require_db!();
    let state = setup_state(&url).await?;
    let owner = create_owner(&state).await?;
    let customer = create_customer(&state).await?;
    let product = create_product(&state, &owner, &[("M", 1), ("L", 2)], None).await?;

    let placed = buy(&state, &customer, &product, "M", 1, ShippingMethod::Pickup, PaymentMethod::Cash).await?;

    // Drop size M, keep L.
    product_service::update_product(
        &state,
        &owner,
        product.id,
        UpdateProductRequest {
            variants: Some(vec![VariantInput {
                id: Some(variant_id(&product, "L")),
                size: "L".into(),
                color: None,
                stock: 2,
            }]),
            ..Default::default()
        },
    )
    .await?;

    order_service::cancel_order(&state, &customer, placed.order.id).await?;

    let (stock, variants) = current_stock(&state, product.id).await?;
    assert_eq!(stock, variants);
    assert_eq!(stock, 2);

    Ok(())
}

#[tokio::test]
async fn transfer_discount_lowers_checkout_total() -> anyhow::Result<()> {
    let url = require_db!();
    let state = setup_state(&url).await?;
    let owner = create_owner(&state).await?;
    let customer = create_customer(&state).await?;
    let product = create_product(&state, &owner, &[("U", 5)], None).await?;

    let previous = settings_service::get_settings(&state).await?.data.expect("settings");
    settings_service::update_settings(
        &state,
        &owner,
        SiteSettings {
            transfer_discount_percent: 10,
            ..previous.clone()
        },
    )
    .await?;

    let placed = buy(&state, &customer, &product, "U", 2, ShippingMethod::Pickup, PaymentMethod::Transfer).await;
    settings_service::update_settings(&state, &owner, previous).await?;
    let placed = placed?;

    assert_eq!(placed.order.subtotal, 20_000);
    assert_eq!(placed.order.discount_amount, 2_000);
    assert_eq!(placed.order.total_amount, 18_000);

    Ok(())
}

struct ApprovedGateway {
    order_id: Uuid,
}

#[async_trait]
impl PaymentGateway for ApprovedGateway {
    async fn create_preference(&self, _request: &PreferenceRequest) -> Result<Preference, PaymentError> {
        Err(PaymentError::Status { status: 503, body: "not used".into() })
    }

    async fn get_payment(&self, payment_id: &str) -> Result<PaymentInfo, PaymentError> {
        Ok(PaymentInfo {
            id: serde_json::json!(payment_id),
            status: "approved".into(),
            external_reference: Some(self.order_id.to_string()),
            transaction_amount: None,
        })
    }
}

#[tokio::test]
async fn repeated_payment_notification_pays_once() -> anyhow::Result<()> {
    let url = require_db!();
    let state = setup_state(&url).await?;
    let owner = create_owner(&state).await?;
    let customer = create_customer(&state).await?;
    let product = create_product(&state, &owner, &[("M", 2)], None).await?;

    let placed = buy(&state, &customer, &product, "M", 1, ShippingMethod::Pickup, PaymentMethod::Cash).await?;
    let state = AppState {
        payments: Some(Arc::new(ApprovedGateway { order_id: placed.order.id })),
        ..state
    };
    let notification = || -> anyhow::Result<PaymentNotification> {
        Ok(serde_json::from_value(serde_json::json!({
            "type": "payment",
            "data": { "id": "9001" }
        }))?)
    };

    let ack = payment_service::handle_webhook(&state, notification()?).await?;
    assert!(ack.data.expect("ack").handled);
    let first = order_service::get_order(&state, &customer, placed.order.id)
        .await?
        .data
        .expect("order");
    assert_eq!(first.order.status, "paid");
    assert_eq!(first.order.payment_status, "paid");
    assert!(first.order.paid_at.is_some());

    let ack = payment_service::handle_webhook(&state, notification()?).await?;
    assert!(ack.data.expect("ack").handled);
    let second = order_service::get_order(&state, &customer, placed.order.id)
        .await?
        .data
        .expect("order");
    assert_eq!(second.order.status, "paid");
    assert_eq!(second.order.paid_at, first.order.paid_at);
    assert_eq!(second.order.updated_at, first.order.updated_at);

    Ok(())
}

#[tokio::test]
async fn operators_cannot_remove_or_promote_themselves() -> anyhow::Result<()> {
    let url = require_db!();
    let state = setup_state(&url).await?;
    let owner = create_owner(&state).await?;

    let staff = operator_service::create_operator(
        &state,
        &owner,
        CreateOperatorRequest {
            name: "Staff".into(),
            email: format!("staff-{}@test.local", Uuid::new_v4()),
            password: "staffpass1".into(),
            is_owner: false,
            permissions: vec![Permission::Operators],
        },
    )
    .await?
    .data
    .expect("operator");
    let staff_user = AuthUser::operator(staff.id, false, vec![Permission::Operators]);

    let err = operator_service::update_operator(
        &state,
        &staff_user,
        staff.id,
        UpdateOperatorRequest {
            permissions: Some(Permission::ALL.to_vec()),
            ..Default::default()
        },
    )
    .await
    .unwrap_err();
    assert!(matches!(err, AppError::Forbidden));

    let renamed = operator_service::update_operator(
        &state,
        &staff_user,
        staff.id,
        UpdateOperatorRequest {
            name: Some("Staff Renamed".into()),
            ..Default::default()
        },
    )
    .await?
    .data
    .expect("operator");
    assert_eq!(renamed.name, "Staff Renamed");
    assert_eq!(renamed.permissions, vec![Permission::Operators]);

    // Non-owners cannot touch owners.
    let err = operator_service::delete_operator(&state, &staff_user, owner.user_id)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Forbidden));

    let err = operator_service::delete_operator(&state, &owner, owner.user_id)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::BadRequest(_)));

    operator_service::delete_operator(&state, &owner, staff.id).await?;

    Ok(())
}

#[tokio::test]
async fn categories_with_products_are_kept_and_subcategories_edit() -> anyhow::Result<()> {
    let url = require_db!();
    let state = setup_state(&url).await?;
    let owner = create_owner(&state).await?;

    let category = category_service::create_category(
        &state,
        &owner,
        CategoryRequest {
            name: format!("Categoria {}", Uuid::new_v4()),
            slug: None,
            position: None,
            is_active: None,
        },
    )
    .await?
    .data
    .expect("category");
    create_product(&state, &owner, &[("M", 1)], Some(category.id)).await?;

    let err = category_service::delete_category(&state, &owner, category.id)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Conflict(_)));

    let mut created = Vec::new();
    for name in ["Remeras", "Buzos"] {
        let sub = category_service::create_subcategory(
            &state,
            &owner,
            category.id,
            SubcategoryRequest { name: name.into(), slug: None, position: None },
        )
        .await?
        .data
        .expect("subcategory");
        created.push(sub);
    }
    let buzos = &created[1];

    let err = category_service::update_subcategory(
        &state,
        &owner,
        buzos.id,
        UpdateSubcategoryRequest { slug: Some("remeras".into()), ..Default::default() },
    )
    .await
    .unwrap_err();
    assert!(matches!(err, AppError::Conflict(_)));

    let updated = category_service::update_subcategory(
        &state,
        &owner,
        buzos.id,
        UpdateSubcategoryRequest {
            name: Some("Buzos y camperas".into()),
            position: Some(2),
            ..Default::default()
        },
    )
    .await?
    .data
    .expect("subcategory");
    assert_eq!(updated.name, "Buzos y camperas");
    assert_eq!(updated.slug, "buzos");
    assert_eq!(updated.position, 2);

    Ok(())
}

#[tokio::test]
async fn customers_review_a_product_once() -> anyhow::Result<()> {
    let url = require_db!();
    let state = setup_state(&url).await?;
    let owner = create_owner(&state).await?;
    let customer = create_customer(&state).await?;
    let product = create_product(&state, &owner, &[("M", 1)], None).await?;

    let review = review_service::create_review(
        &state,
        &customer,
        product.id,
        CreateReviewRequest { rating: 5, comment: "Excelente calidad".into() },
    )
    .await?
    .data
    .expect("review");
    assert_eq!(review.rating, 5);

    let err = review_service::create_review(
        &state,
        &customer,
        product.id,
        CreateReviewRequest { rating: 3, comment: "Cambio de opinión".into() },
    )
    .await
    .unwrap_err();
    assert!(matches!(err, AppError::Conflict(_)));

    Ok(())
}

#[tokio::test]
async fn shipping_label_for_delivery_orders() -> anyhow::Result<()> {
    let url = require_db!();
    let state = setup_state(&url).await?;
    let owner = create_owner(&state).await?;
    let customer = create_customer(&state).await?;
    let product = create_product(&state, &owner, &[("M", 3)], None).await?;

    let pickup = buy(&state, &customer, &product, "M", 1, ShippingMethod::Pickup, PaymentMethod::Cash).await?;
    let err = shipping_service::create_label(&state, &owner, pickup.order.id, ShippingLabelRequest::default())
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::BadRequest(_)));

    let delivery = buy(&state, &customer, &product, "M", 1, ShippingMethod::Delivery, PaymentMethod::Cash).await?;
    let label = shipping_service::create_label(&state, &owner, delivery.order.id, ShippingLabelRequest::default())
        .await?
        .data
        .expect("label");
    assert_eq!(label.carrier, shipping_service::DEFAULT_CARRIER);
    assert_eq!(
        label.tracking_number,
        shipping_service::tracking_number_for(&delivery.order.order_number)
    );
    assert_eq!(label.packages, 1);
    assert_eq!(label.recipient_name, "Ana Pérez");
    assert!(!label.lines.is_empty());

    let relabeled = shipping_service::create_label(
        &state,
        &owner,
        delivery.order.id,
        ShippingLabelRequest { packages: Some(2), ..Default::default() },
    )
    .await?
    .data
    .expect("label");
    assert_eq!(relabeled.id, label.id);
    assert_eq!(relabeled.packages, 2);

    let fetched = shipping_service::get_label(&state, &owner, delivery.order.id)
        .await?
        .data
        .expect("label");
    assert_eq!(fetched.packages, 2);

    Ok(())
}

#[tokio::test]
async fn debt_charges_payments_and_revert() -> anyhow::Result<()> {
    let url = require_db!();
    let state = setup_state(&url).await?;
    let owner = create_owner(&state).await?;

    let debt = debt_service::create_debt(
        &state,
        &owner,
        CreateDebtRequest {
            customer_name: "Marta Gómez".into(),
            phone: None,
            notes: None,
        },
    )
    .await?
    .data
    .expect("debt");
    assert_eq!(debt.balance, 0);

    let detail = debt_service::add_charge(
        &state,
        &owner,
        debt.id,
        ChargeRequest {
            amount: 30_000,
            description: Some("Campera".into()),
            installments: Some(3),
            first_due_date: None,
        },
    )
    .await?
    .data
    .expect("detail");
    assert_eq!(detail.debt.balance, 30_000);
    assert_eq!(detail.status.remaining.len(), 3);
    assert!(!detail.status.is_overdue);

    let err = debt_service::add_payment(
        &state,
        &owner,
        debt.id,
        PaymentRequest { amount: 40_000, description: None },
    )
    .await
    .unwrap_err();
    assert!(matches!(err, AppError::BadRequest(_)));

    let detail = debt_service::add_payment(
        &state,
        &owner,
        debt.id,
        PaymentRequest { amount: 10_000, description: None },
    )
    .await?
    .data
    .expect("detail");
    assert_eq!(detail.debt.balance, 20_000);
    assert_eq!(detail.status.remaining.len(), 2);

    // An account with balance cannot be deleted.
    let err = debt_service::delete_debt(&state, &owner, debt.id).await.unwrap_err();
    assert!(matches!(err, AppError::Conflict(_)));

    let detail = debt_service::delete_last_transaction(&state, &owner, debt.id)
        .await?
        .data
        .expect("detail");
    assert_eq!(detail.debt.balance, 30_000);
    assert_eq!(detail.transactions.len(), 1);

    Ok(())
}
