use sea_orm::{
    ActiveModelTrait, ActiveValue::NotSet, ColumnTrait, EntityTrait, QueryFilter, QueryOrder, Set,
};
use uuid::Uuid;

use crate::{
    audit,
    dto::cart::{AddToCartRequest, CartItemDto, CartList},
    entity::{
        cart_items::{ActiveModel, Column, Entity as CartItems},
        product_variants::{Column as VariantCol, Entity as ProductVariants},
        products::Entity as Products,
    },
    error::{AppError, AppResult},
    middleware::auth::{AuthUser, ensure_customer},
    models::CartItem,
    money::format_price,
    response::{ApiResponse, Meta},
    services::product_service::with_variants,
    state::AppState,
};

pub async fn list_cart(state: &AppState, user: &AuthUser) -> AppResult<ApiResponse<CartList>> {
    ensure_customer(user)?;
    let lines = CartItems::find()
        .filter(Column::UserId.eq(user.user_id))
        .order_by_desc(Column::CreatedAt)
        .all(&state.orm)
        .await?;

    let product_ids: Vec<Uuid> = lines.iter().map(|l| l.product_id).collect();
    let models = Products::find()
        .filter(crate::entity::products::Column::Id.is_in(product_ids))
        .all(&state.orm)
        .await?;
    let products = with_variants(&state.orm, models).await?;

    let mut items = Vec::with_capacity(lines.len());
    for line in lines {
        let Some(product) = products.iter().find(|p| p.id == line.product_id) else {
            continue;
        };
        let variant = line
            .variant_id
            .and_then(|vid| product.variants.iter().find(|v| v.id == vid).cloned());
        items.push(CartItemDto {
            id: line.id,
            line_total: product.price * i64::from(line.quantity),
            product: product.clone(),
            variant,
            quantity: line.quantity,
        });
    }

    let subtotal = items.iter().map(|i| i.line_total).sum();
    let data = CartList {
        items,
        subtotal,
        subtotal_label: format_price(subtotal),
    };
    Ok(ApiResponse::success("OK", data, Some(Meta::empty())))
}

/// Units available for a product or one of its variants.
async fn available_stock(
    state: &AppState,
    product_id: Uuid,
    variant_id: Option<Uuid>,
) -> AppResult<i32> {
    let product = Products::find_by_id(product_id)
        .one(&state.orm)
        .await?
        .filter(|p| p.is_active)
        .ok_or_else(|| AppError::BadRequest("product not found".to_string()))?;

    let variants = ProductVariants::find()
        .filter(VariantCol::ProductId.eq(product_id))
        .all(&state.orm)
        .await?;

    match variant_id {
        Some(variant_id) => variants
            .iter()
            .find(|v| v.id == variant_id)
            .map(|v| v.stock)
            .ok_or_else(|| AppError::BadRequest("variant does not belong to product".to_string())),
        None if !variants.is_empty() => {
            Err(AppError::BadRequest("choose a size for this product".to_string()))
        }
        None => Ok(product.stock),
    }
}

pub async fn add_to_cart(
    state: &AppState,
    user: &AuthUser,
    payload: AddToCartRequest,
) -> AppResult<ApiResponse<CartItem>> {
    ensure_customer(user)?;
    if payload.quantity <= 0 {
        return Err(AppError::BadRequest(
            "quantity must be greater than 0".to_string(),
        ));
    }

    let available = available_stock(state, payload.product_id, payload.variant_id).await?;

    let mut existing = CartItems::find()
        .filter(Column::UserId.eq(user.user_id))
        .filter(Column::ProductId.eq(payload.product_id));
    existing = match payload.variant_id {
        Some(variant_id) => existing.filter(Column::VariantId.eq(variant_id)),
        None => existing.filter(Column::VariantId.is_null()),
    };
    let existing = existing.one(&state.orm).await?;

    let quantity = existing
        .as_ref()
        .map_or(0, |item| item.quantity)
        .checked_add(payload.quantity)
        .ok_or_else(|| AppError::BadRequest("quantity is too large".to_string()))?;
    if quantity > available {
        return Err(AppError::BadRequest(format!(
            "only {available} units available"
        )));
    }

    let cart_item = match existing {
        Some(item) => {
            let mut active: ActiveModel = item.into();
            active.quantity = Set(quantity);
            active.update(&state.orm).await?
        }
        None => {
            ActiveModel {
                id: Set(Uuid::new_v4()),
                user_id: Set(user.user_id),
                product_id: Set(payload.product_id),
                variant_id: Set(payload.variant_id),
                quantity: Set(quantity),
                created_at: NotSet,
            }
            .insert(&state.orm)
            .await?
        }
    };

    audit::record(
        &state.orm,
        Some(user.user_id),
        "cart_update",
        "cart_items",
        serde_json::json!({ "product_id": payload.product_id, "quantity": quantity }),
    )
    .await;

    Ok(ApiResponse::success("OK", CartItem::from(cart_item), None))
}

pub async fn update_cart_item(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
    quantity: i32,
) -> AppResult<ApiResponse<CartItem>> {
    ensure_customer(user)?;
    if quantity <= 0 {
        return Err(AppError::BadRequest(
            "quantity must be greater than 0".to_string(),
        ));
    }

    let item = CartItems::find_by_id(id)
        .filter(Column::UserId.eq(user.user_id))
        .one(&state.orm)
        .await?
        .ok_or(AppError::NotFound)?;

    let available = available_stock(state, item.product_id, item.variant_id).await?;
    if quantity > available {
        return Err(AppError::BadRequest(format!(
            "only {available} units available"
        )));
    }

    let mut active: ActiveModel = item.into();
    active.quantity = Set(quantity);
    let item = active.update(&state.orm).await?;

    Ok(ApiResponse::success("OK", CartItem::from(item), None))
}

pub async fn remove_from_cart(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
) -> AppResult<ApiResponse<serde_json::Value>> {
    ensure_customer(user)?;
    let result = CartItems::delete_many()
        .filter(Column::Id.eq(id))
        .filter(Column::UserId.eq(user.user_id))
        .exec(&state.orm)
        .await?;

    if result.rows_affected == 0 {
        return Err(AppError::NotFound);
    }

    audit::record(
        &state.orm,
        Some(user.user_id),
        "cart_remove",
        "cart_items",
        serde_json::json!({ "cart_item_id": id }),
    )
    .await;

    Ok(ApiResponse::success(
        "Removed from cart",
        serde_json::json!({}),
        Some(Meta::empty()),
    ))
}
