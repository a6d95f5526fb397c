use std::collections::HashMap;

use chrono::Utc;
use sea_orm::sea_query::extension::postgres::PgExpr;
use sea_orm::sea_query::{Expr, LockType, NullOrdering, Order, Query};
use sea_orm::{
    ActiveModelTrait, ActiveValue::NotSet, ColumnTrait, Condition, ConnectionTrait, DbBackend,
    EntityTrait, PaginatorTrait, QueryFilter, QueryOrder, QuerySelect, Set, Statement,
    TransactionTrait,
};
use uuid::Uuid;

use crate::{
    audit,
    dto::products::{
        CreateProductRequest, ProductList, StockAdjustRequest, UpdateProductRequest, VariantInput,
    },
    entity::{
        categories::{Column as CategoryCol, Entity as Categories},
        product_variants::{
            ActiveModel as VariantActive, Column as VariantCol, Entity as ProductVariants,
            Model as VariantModel,
        },
        products::{ActiveModel, Column, Entity as Products, Model as ProductModel},
        subcategories::Entity as Subcategories,
    },
    error::{AppError, AppResult},
    middleware::auth::{AuthUser, ensure_permission},
    models::{Permission, Product},
    pricing::{PriceInput, reconcile},
    response::{ApiResponse, Meta},
    routes::params::{LowStockQuery, ProductQuery, ProductSortBy, SortOrder},
    services::slugify,
    state::AppState,
};

/// Sum of variant stock, rejecting malformed variants.
pub fn stock_from_variants(variants: &[VariantInput]) -> AppResult<i32> {
    let mut total: i32 = 0;
    for variant in variants {
        if variant.size.trim().is_empty() {
            return Err(AppError::BadRequest("variant size is required".into()));
        }
        if variant.stock < 0 {
            return Err(AppError::BadRequest("variant stock cannot be negative".into()));
        }
        total = total
            .checked_add(variant.stock)
            .ok_or_else(|| AppError::BadRequest("stock is too large".into()))?;
    }
    Ok(total)
}

/// Stock after an inventory adjustment; never negative, never wraps.
pub fn apply_delta(stock: i32, delta: i32) -> AppResult<i32> {
    let next = stock
        .checked_add(delta)
        .ok_or_else(|| AppError::BadRequest("stock is too large".into()))?;
    if next < 0 {
        return Err(AppError::BadRequest("stock cannot be negative".into()));
    }
    Ok(next)
}

pub async fn load_variants<C: ConnectionTrait>(
    conn: &C,
    product_ids: &[Uuid],
) -> AppResult<HashMap<Uuid, Vec<VariantModel>>> {
    let mut by_product: HashMap<Uuid, Vec<VariantModel>> = HashMap::new();
    if product_ids.is_empty() {
        return Ok(by_product);
    }
    let variants = ProductVariants::find()
        .filter(VariantCol::ProductId.is_in(product_ids.iter().copied()))
        .order_by_asc(VariantCol::Position)
        .all(conn)
        .await?;
    for variant in variants {
        by_product.entry(variant.product_id).or_default().push(variant);
    }
    Ok(by_product)
}

pub async fn with_variants<C: ConnectionTrait>(
    conn: &C,
    models: Vec<ProductModel>,
) -> AppResult<Vec<Product>> {
    let ids: Vec<Uuid> = models.iter().map(|m| m.id).collect();
    let mut variants = load_variants(conn, &ids).await?;
    Ok(models
        .into_iter()
        .map(|m| {
            let v = variants.remove(&m.id).unwrap_or_default();
            Product::from_entity(m, v)
        })
        .collect())
}

/// Recompute a product's stock from its variants.
pub async fn sync_product_stock<C: ConnectionTrait>(conn: &C, product_id: Uuid) -> AppResult<()> {
    conn.execute(Statement::from_sql_and_values(
        DbBackend::Postgres,
        r#"
        UPDATE products
        SET stock = (SELECT COALESCE(SUM(stock), 0) FROM product_variants WHERE product_id = $1),
            updated_at = now()
        WHERE id = $1
          AND EXISTS (SELECT 1 FROM product_variants WHERE product_id = $1)
        "#,
        [product_id.into()],
    ))
    .await?;
    Ok(())
}

async fn build_condition(state: &AppState, query: &ProductQuery) -> AppResult<Condition> {
    let mut condition = Condition::all();

    if !query.include_inactive.unwrap_or(false) {
        condition = condition.add(Column::IsActive.eq(true));
    }

    if let Some(search) = query.q.as_ref().map(|s| s.trim()).filter(|s| !s.is_empty()) {
        let pattern = format!("%{search}%");
        condition = condition.add(
            Condition::any()
                .add(Expr::col(Column::Name).ilike(pattern.clone()))
                .add(Expr::col(Column::Description).ilike(pattern)),
        );
    }

    let category_id = match (query.category_id, query.category.as_deref()) {
        (Some(id), _) => Some(id),
        (None, Some(slug)) => {
            let category = Categories::find()
                .filter(CategoryCol::Slug.eq(slug))
                .one(&state.orm)
                .await?;
            // Unknown slug matches nothing rather than everything.
            Some(category.map(|c| c.id).unwrap_or_else(Uuid::nil))
        }
        (None, None) => None,
    };
    if let Some(category_id) = category_id {
        condition = condition.add(Column::CategoryId.eq(category_id));
    }
    if let Some(subcategory_id) = query.subcategory_id {
        condition = condition.add(Column::SubcategoryId.eq(subcategory_id));
    }
    if let Some(featured) = query.featured {
        condition = condition.add(Column::IsFeatured.eq(featured));
    }
    if let Some(top) = query.top {
        condition = condition.add(Column::IsTop.eq(top));
    }
    if let Some(upcoming) = query.upcoming {
        condition = condition.add(Column::IsUpcoming.eq(upcoming));
    }
    if let Some(on_sale) = query.on_sale {
        condition = condition.add(Column::OnSale.eq(on_sale));
    }
    if let Some(min_price) = query.min_price {
        condition = condition.add(Column::Price.gte(min_price));
    }
    if let Some(max_price) = query.max_price {
        condition = condition.add(Column::Price.lte(max_price));
    }
    if let Some(size) = query.size.as_ref().filter(|s| !s.is_empty()) {
        let in_stock_with_size = Query::select()
            .column(VariantCol::ProductId)
            .from(ProductVariants)
            .and_where(VariantCol::Size.eq(size.clone()))
            .and_where(VariantCol::Stock.gt(0))
            .to_owned();
        condition = condition.add(Column::Id.in_subquery(in_stock_with_size));
    }

    Ok(condition)
}

/// Shared search used by the storefront, special filters and home sections.
pub async fn search_products(
    state: &AppState,
    query: &ProductQuery,
) -> AppResult<(Vec<Product>, i64, i64, i64)> {
    let (page, limit, offset) = query.pagination().normalize();
    let condition = build_condition(state, query).await?;

    let sort_by = query.sort_by.unwrap_or(ProductSortBy::CreatedAt);
    let order = match query.sort_order.unwrap_or(SortOrder::Desc) {
        SortOrder::Asc => Order::Asc,
        SortOrder::Desc => Order::Desc,
    };

    let mut finder = Products::find().filter(condition);
    finder = match sort_by {
        ProductSortBy::CreatedAt => finder.order_by(Column::CreatedAt, order),
        ProductSortBy::Price => finder.order_by(Column::Price, order),
        ProductSortBy::Name => finder.order_by(Column::Name, order),
        ProductSortBy::Discount => {
            finder.order_by_with_nulls(Column::DiscountPercent, order, NullOrdering::Last)
        }
    };
    finder = finder.order_by_asc(Column::Id);

    let total = finder.clone().count(&state.orm).await? as i64;
    let models = finder
        .limit(limit as u64)
        .offset(offset as u64)
        .all(&state.orm)
        .await?;
    let items = with_variants(&state.orm, models).await?;

    Ok((items, page, limit, total))
}

pub async fn list_products(
    state: &AppState,
    mut query: ProductQuery,
) -> AppResult<ApiResponse<ProductList>> {
    query.include_inactive = None;
    let (items, page, limit, total) = search_products(state, &query).await?;
    let meta = Meta::new(page, limit, total);
    Ok(ApiResponse::success("Products", ProductList { items }, Some(meta)))
}

pub async fn admin_list_products(
    state: &AppState,
    user: &AuthUser,
    query: ProductQuery,
) -> AppResult<ApiResponse<ProductList>> {
    ensure_permission(user, Permission::Products)?;
    let (items, page, limit, total) = search_products(state, &query).await?;
    let meta = Meta::new(page, limit, total);
    Ok(ApiResponse::success("Products", ProductList { items }, Some(meta)))
}

/// Look a product up by id or slug; the storefront never sees inactive ones.
pub async fn get_product(
    state: &AppState,
    id_or_slug: &str,
    include_inactive: bool,
) -> AppResult<ApiResponse<Product>> {
    let finder = match Uuid::parse_str(id_or_slug) {
        Ok(id) => Products::find_by_id(id),
        Err(_) => Products::find().filter(Column::Slug.eq(id_or_slug)),
    };
    let model = finder
        .one(&state.orm)
        .await?
        .filter(|p| include_inactive || p.is_active)
        .ok_or(AppError::NotFound)?;

    let product = with_variants(&state.orm, vec![model])
        .await?
        .pop()
        .ok_or(AppError::NotFound)?;
    Ok(ApiResponse::success("Product", product, None))
}

async fn validate_placement(
    state: &AppState,
    category_id: Option<Uuid>,
    subcategory_id: Option<Uuid>,
) -> AppResult<()> {
    if let Some(category_id) = category_id {
        Categories::find_by_id(category_id)
            .one(&state.orm)
            .await?
            .ok_or_else(|| AppError::BadRequest("category not found".into()))?;
    }
    if let Some(subcategory_id) = subcategory_id {
        let sub = Subcategories::find_by_id(subcategory_id)
            .one(&state.orm)
            .await?
            .ok_or_else(|| AppError::BadRequest("subcategory not found".into()))?;
        if Some(sub.category_id) != category_id {
            return Err(AppError::BadRequest(
                "subcategory does not belong to the category".into(),
            ));
        }
    }
    Ok(())
}

async fn ensure_slug_free(state: &AppState, slug: &str, except: Option<Uuid>) -> AppResult<()> {
    let mut finder = Products::find().filter(Column::Slug.eq(slug));
    if let Some(id) = except {
        finder = finder.filter(Column::Id.ne(id));
    }
    if finder.count(&state.orm).await? > 0 {
        return Err(AppError::Conflict(format!("slug {slug} is already used")));
    }
    Ok(())
}

fn images_json(images: &[String]) -> serde_json::Value {
    serde_json::Value::Array(
        images
            .iter()
            .map(|s| s.trim())
            .filter(|s| !s.is_empty())
            .map(|s| serde_json::Value::String(s.to_string()))
            .collect(),
    )
}

pub async fn create_product(
    state: &AppState,
    user: &AuthUser,
    payload: CreateProductRequest,
) -> AppResult<ApiResponse<Product>> {
    ensure_permission(user, Permission::Products)?;
    if payload.name.trim().is_empty() {
        return Err(AppError::BadRequest("name is required".into()));
    }

    let pricing = reconcile(PriceInput {
        price: payload.price,
        original_price: payload.original_price,
        discount_percent: payload.discount_percent,
        on_sale: payload.on_sale,
    })?;

    let stock = if payload.variants.is_empty() {
        if payload.stock < 0 {
            return Err(AppError::BadRequest("stock cannot be negative".into()));
        }
        payload.stock
    } else {
        stock_from_variants(&payload.variants)?
    };

    validate_placement(state, payload.category_id, payload.subcategory_id).await?;
    let slug = slugify(payload.slug.as_deref().unwrap_or(&payload.name));
    if slug.is_empty() {
        return Err(AppError::BadRequest("slug cannot be empty".into()));
    }
    ensure_slug_free(state, &slug, None).await?;

    let txn = state.orm.begin().await?;
    let product = ActiveModel {
        id: Set(Uuid::new_v4()),
        name: Set(payload.name.trim().to_string()),
        slug: Set(slug),
        description: Set(payload.description),
        category_id: Set(payload.category_id),
        subcategory_id: Set(payload.subcategory_id),
        price: Set(pricing.price),
        original_price: Set(pricing.original_price),
        discount_percent: Set(pricing.discount_percent),
        images: Set(images_json(&payload.images)),
        stock: Set(stock),
        is_featured: Set(payload.is_featured),
        is_top: Set(payload.is_top),
        is_upcoming: Set(payload.is_upcoming),
        on_sale: Set(pricing.on_sale),
        is_active: Set(payload.is_active.unwrap_or(true)),
        created_at: NotSet,
        updated_at: NotSet,
    }
    .insert(&txn)
    .await?;

    let mut variants = Vec::with_capacity(payload.variants.len());
    for (position, input) in payload.variants.iter().enumerate() {
        variants.push(insert_variant(&txn, product.id, input, position as i32).await?);
    }
    txn.commit().await?;

    audit::record(
        &state.orm,
        Some(user.user_id),
        "product_create",
        "products",
        serde_json::json!({ "product_id": product.id }),
    )
    .await;

    Ok(ApiResponse::success(
        "Product created",
        Product::from_entity(product, variants),
        Some(Meta::empty()),
    ))
}

async fn insert_variant<C: ConnectionTrait>(
    conn: &C,
    product_id: Uuid,
    input: &VariantInput,
    position: i32,
) -> AppResult<VariantModel> {
    let variant = VariantActive {
        id: Set(Uuid::new_v4()),
        product_id: Set(product_id),
        size: Set(input.size.trim().to_string()),
        color: Set(input.color.clone()),
        stock: Set(input.stock),
        position: Set(position),
        created_at: NotSet,
    }
    .insert(conn)
    .await?;
    Ok(variant)
}

pub async fn update_product(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
    payload: UpdateProductRequest,
) -> AppResult<ApiResponse<Product>> {
    ensure_permission(user, Permission::Products)?;
    let existing = Products::find_by_id(id)
        .one(&state.orm)
        .await?
        .ok_or(AppError::NotFound)?;

    let pricing = reconcile(PriceInput {
        price: payload.price.or(Some(existing.price)),
        original_price: payload.original_price.or(existing.original_price),
        discount_percent: payload.discount_percent,
        on_sale: payload.on_sale.unwrap_or(existing.on_sale),
    })?;

    let category_id = payload.category_id.or(existing.category_id);
    let subcategory_id = payload.subcategory_id.or(existing.subcategory_id);
    if payload.category_id.is_some() || payload.subcategory_id.is_some() {
        validate_placement(state, category_id, subcategory_id).await?;
    }

    let existing_variants = load_variants(&state.orm, &[id])
        .await?
        .remove(&id)
        .unwrap_or_default();
    let has_variants = match &payload.variants {
        Some(list) => !list.is_empty(),
        None => !existing_variants.is_empty(),
    };
    if payload.stock.is_some() && has_variants {
        return Err(AppError::BadRequest(
            "stock is derived from variants; adjust the variants instead".into(),
        ));
    }
    if let Some(list) = &payload.variants {
        stock_from_variants(list)?;
    }

    let txn = state.orm.begin().await?;
    let mut active: ActiveModel = existing.into();
    if let Some(name) = payload.name {
        active.name = Set(name.trim().to_string());
    }
    if let Some(slug) = payload.slug.as_deref() {
        let slug = slugify(slug);
        if slug.is_empty() {
            return Err(AppError::BadRequest("slug cannot be empty".into()));
        }
        ensure_slug_free(state, &slug, Some(id)).await?;
        active.slug = Set(slug);
    }
    if let Some(description) = payload.description {
        active.description = Set(Some(description));
    }
    active.category_id = Set(category_id);
    active.subcategory_id = Set(subcategory_id);
    active.price = Set(pricing.price);
    active.original_price = Set(pricing.original_price);
    active.discount_percent = Set(pricing.discount_percent);
    active.on_sale = Set(pricing.on_sale);
    if let Some(images) = payload.images {
        active.images = Set(images_json(&images));
    }
    if let Some(stock) = payload.stock {
        if stock < 0 {
            return Err(AppError::BadRequest("stock cannot be negative".into()));
        }
        active.stock = Set(stock);
    }
    if let Some(v) = payload.is_featured {
        active.is_featured = Set(v);
    }
    if let Some(v) = payload.is_top {
        active.is_top = Set(v);
    }
    if let Some(v) = payload.is_upcoming {
        active.is_upcoming = Set(v);
    }
    if let Some(v) = payload.is_active {
        active.is_active = Set(v);
    }
    active.updated_at = Set(Utc::now().into());
    active.update(&txn).await?;

    if let Some(list) = payload.variants {
        replace_variants(&txn, id, &existing_variants, &list).await?;
        sync_product_stock(&txn, id).await?;
    }
    txn.commit().await?;

    audit::record(
        &state.orm,
        Some(user.user_id),
        "product_update",
        "products",
        serde_json::json!({ "product_id": id }),
    )
    .await;

    let product = get_product(state, &id.to_string(), true).await?;
    Ok(ApiResponse::success("Updated", product.data.ok_or(AppError::NotFound)?, Some(Meta::empty())))
}

async fn replace_variants<C: ConnectionTrait>(
    conn: &C,
    product_id: Uuid,
    existing: &[VariantModel],
    inputs: &[VariantInput],
) -> AppResult<()> {
    let keep: Vec<Uuid> = inputs.iter().filter_map(|v| v.id).collect();
    for old in existing.iter().filter(|v| !keep.contains(&v.id)) {
        ProductVariants::delete_by_id(old.id).exec(conn).await?;
    }

    for (position, input) in inputs.iter().enumerate() {
        match input.id.and_then(|id| existing.iter().find(|v| v.id == id)) {
            Some(old) => {
                let mut active: VariantActive = old.clone().into();
                active.size = Set(input.size.trim().to_string());
                active.color = Set(input.color.clone());
                active.stock = Set(input.stock);
                active.position = Set(position as i32);
                active.update(conn).await?;
            }
            None => {
                insert_variant(conn, product_id, input, position as i32).await?;
            }
        }
    }
    Ok(())
}

pub async fn delete_product(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
) -> AppResult<ApiResponse<serde_json::Value>> {
    ensure_permission(user, Permission::Products)?;
    let result = Products::delete_by_id(id).exec(&state.orm).await?;

    if result.rows_affected == 0 {
        return Err(AppError::NotFound);
    }

    audit::record(
        &state.orm,
        Some(user.user_id),
        "product_delete",
        "products",
        serde_json::json!({ "product_id": id }),
    )
    .await;

    Ok(ApiResponse::success(
        "Deleted",
        serde_json::json!({}),
        Some(Meta::empty()),
    ))
}

pub async fn list_low_stock(
    state: &AppState,
    user: &AuthUser,
    query: LowStockQuery,
) -> AppResult<ApiResponse<ProductList>> {
    ensure_permission(user, Permission::Products)?;
    let threshold = query.threshold.unwrap_or(state.config.low_stock_threshold);
    let (page, limit, offset) = crate::routes::params::Pagination {
        page: query.page,
        per_page: query.per_page,
    }
    .normalize();

    let finder = Products::find()
        .filter(Column::IsActive.eq(true))
        .filter(Column::Stock.lte(threshold))
        .order_by_asc(Column::Stock)
        .order_by_desc(Column::CreatedAt);

    let total = finder.clone().count(&state.orm).await? as i64;
    let models = finder
        .limit(limit as u64)
        .offset(offset as u64)
        .all(&state.orm)
        .await?;
    let items = with_variants(&state.orm, models).await?;

    let meta = Meta::new(page, limit, total);
    Ok(ApiResponse::success("Low stock", ProductList { items }, Some(meta)))
}

pub async fn adjust_stock(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
    payload: StockAdjustRequest,
) -> AppResult<ApiResponse<Product>> {
    ensure_permission(user, Permission::Products)?;
    if payload.delta == 0 {
        return Err(AppError::BadRequest("delta must not be 0".into()));
    }

    let txn = state.orm.begin().await?;
    let product = Products::find_by_id(id)
        .lock(LockType::Update)
        .one(&txn)
        .await?
        .ok_or(AppError::NotFound)?;

    match payload.variant_id {
        Some(variant_id) => {
            let variant = ProductVariants::find_by_id(variant_id)
                .filter(VariantCol::ProductId.eq(id))
                .lock(LockType::Update)
                .one(&txn)
                .await?
                .ok_or(AppError::NotFound)?;
            let new_stock = apply_delta(variant.stock, payload.delta)?;
            let mut active: VariantActive = variant.into();
            active.stock = Set(new_stock);
            active.update(&txn).await?;
            sync_product_stock(&txn, id).await?;
        }
        None => {
            let variants = ProductVariants::find()
                .filter(VariantCol::ProductId.eq(id))
                .count(&txn)
                .await?;
            if variants > 0 {
                return Err(AppError::BadRequest(
                    "product has variants; pass variant_id".into(),
                ));
            }
            let new_stock = apply_delta(product.stock, payload.delta)?;
            let mut active: ActiveModel = product.into();
            active.stock = Set(new_stock);
            active.updated_at = Set(Utc::now().into());
            active.update(&txn).await?;
        }
    }

    txn.commit().await?;

    audit::record(
        &state.orm,
        Some(user.user_id),
        "inventory_adjust",
        "products",
        serde_json::json!({
            "product_id": id,
            "variant_id": payload.variant_id,
            "delta": payload.delta,
        }),
    )
    .await;

    let product = get_product(state, &id.to_string(), true).await?;
    Ok(ApiResponse::success(
        "Inventory updated",
        product.data.ok_or(AppError::NotFound)?,
        Some(Meta::empty()),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn variant(size: &str, stock: i32) -> VariantInput {
        VariantInput {
            id: None,
            size: size.into(),
            color: None,
            stock,
        }
    }

    #[test]
    fn stock_is_sum_of_variants() {
        let variants = vec![variant("S", 3), variant("M", 5), variant("L", 0)];
        assert_eq!(stock_from_variants(&variants).unwrap(), 8);
        assert_eq!(stock_from_variants(&[]).unwrap(), 0);
    }

    #[test]
    fn rejects_negative_or_unnamed_variants() {
        assert!(stock_from_variants(&[variant("M", -1)]).is_err());
        assert!(stock_from_variants(&[variant("  ", 2)]).is_err());
    }

    #[test]
    fn stock_adjustments_never_wrap_or_go_negative() {
        assert_eq!(apply_delta(5, -2).unwrap(), 3);
        assert!(matches!(apply_delta(2, -3), Err(AppError::BadRequest(_))));
        assert!(matches!(apply_delta(1, i32::MAX), Err(AppError::BadRequest(_))));
    }

    #[test]
    fn images_drop_blank_urls() {
        let json = images_json(&["https://cdn/a.jpg".into(), " ".into()]);
        assert_eq!(json, serde_json::json!(["https://cdn/a.jpg"]));
    }
}
