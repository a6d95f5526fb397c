use chrono::Utc;
use sea_orm::{ActiveModelTrait, ActiveValue::NotSet, ColumnTrait, EntityTrait, QueryFilter, Set};
use uuid::Uuid;

use crate::{
    audit,
    config::StoreConfig,
    dto::shipping::ShippingLabelRequest,
    entity::{
        orders::{Entity as Orders, Model as OrderModel},
        shipping_labels::{ActiveModel, Column, Entity as ShippingLabels, Model as LabelModel},
    },
    error::{AppError, AppResult},
    middleware::auth::{AuthUser, ensure_permission},
    models::{OrderStatus, Permission, ShippingLabel, ShippingMethod},
    response::{ApiResponse, Meta},
    state::AppState,
};

pub const DEFAULT_CARRIER: &str = "Correo Argentino";

pub fn tracking_number_for(order_number: &str) -> String {
    let compact: String = order_number
        .chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .collect();
    format!("TN{compact}")
}

pub fn recipient_address(order: &OrderModel) -> String {
    format!(
        "{}, {} ({}), {}",
        order.street, order.city, order.postal_code, order.province
    )
}

/// Printable label, top to bottom.
pub fn label_lines(label: &LabelModel, order_number: &str) -> Vec<String> {
    vec![
        format!("REMITENTE: {}", label.sender_name),
        label.sender_address.clone(),
        format!("Tel: {}", label.sender_phone),
        String::new(),
        format!("DESTINATARIO: {}", label.recipient_name),
        label.recipient_address.clone(),
        format!("Tel: {}", label.recipient_phone),
        String::new(),
        format!("Pedido: {order_number}"),
        format!("Transporte: {}", label.carrier),
        format!("Seguimiento: {}", label.tracking_number),
        format!("Bultos: {}", label.packages),
    ]
}

fn to_label(model: LabelModel, order_number: &str) -> ShippingLabel {
    ShippingLabel {
        lines: label_lines(&model, order_number),
        order_number: order_number.to_string(),
        id: model.id,
        order_id: model.order_id,
        carrier: model.carrier,
        tracking_number: model.tracking_number,
        packages: model.packages,
        sender_name: model.sender_name,
        sender_address: model.sender_address,
        sender_phone: model.sender_phone,
        recipient_name: model.recipient_name,
        recipient_address: model.recipient_address,
        recipient_phone: model.recipient_phone,
        created_at: model.created_at.with_timezone(&Utc),
        updated_at: model.updated_at.with_timezone(&Utc),
    }
}

fn fill(
    active: &mut ActiveModel,
    order: &OrderModel,
    store: &StoreConfig,
    payload: &ShippingLabelRequest,
) -> AppResult<()> {
    let packages = payload.packages.unwrap_or(1);
    if packages < 1 {
        return Err(AppError::BadRequest("packages must be at least 1".into()));
    }
    let carrier = payload
        .carrier
        .as_deref()
        .map(str::trim)
        .filter(|c| !c.is_empty())
        .unwrap_or(DEFAULT_CARRIER);
    let tracking = payload
        .tracking_number
        .as_deref()
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| tracking_number_for(&order.order_number));

    active.carrier = Set(carrier.to_string());
    active.tracking_number = Set(tracking);
    active.packages = Set(packages);
    active.sender_name = Set(store.name.clone());
    active.sender_address = Set(store.address.clone());
    active.sender_phone = Set(store.phone.clone());
    active.recipient_name = Set(order.recipient_name.clone());
    active.recipient_address = Set(recipient_address(order));
    active.recipient_phone = Set(order.phone.clone());
    active.updated_at = Set(Utc::now().into());
    Ok(())
}

pub async fn create_label(
    state: &AppState,
    user: &AuthUser,
    order_id: Uuid,
    payload: ShippingLabelRequest,
) -> AppResult<ApiResponse<ShippingLabel>> {
    ensure_permission(user, Permission::Shipping)?;
    let order = Orders::find_by_id(order_id)
        .one(&state.orm)
        .await?
        .ok_or(AppError::NotFound)?;

    if order.shipping_method != ShippingMethod::Delivery.as_str() {
        return Err(AppError::BadRequest("pickup orders do not ship".into()));
    }
    if order.status == OrderStatus::Cancelled.as_str() {
        return Err(AppError::Conflict("order is cancelled".into()));
    }

    let existing = ShippingLabels::find()
        .filter(Column::OrderId.eq(order.id))
        .one(&state.orm)
        .await?;

    let label = match existing {
        Some(label) => {
            let mut active: ActiveModel = label.into();
            fill(&mut active, &order, &state.config.store, &payload)?;
            active.update(&state.orm).await?
        }
        None => {
            let mut active = ActiveModel {
                id: Set(Uuid::new_v4()),
                order_id: Set(order.id),
                created_at: NotSet,
                ..Default::default()
            };
            fill(&mut active, &order, &state.config.store, &payload)?;
            active.insert(&state.orm).await?
        }
    };

    audit::record(
        &state.orm,
        Some(user.user_id),
        "shipping_label",
        "shipping_labels",
        serde_json::json!({ "order_id": order.id, "tracking_number": label.tracking_number }),
    )
    .await;

    Ok(ApiResponse::success(
        "Label ready",
        to_label(label, &order.order_number),
        Some(Meta::empty()),
    ))
}

pub async fn get_label(
    state: &AppState,
    user: &AuthUser,
    order_id: Uuid,
) -> AppResult<ApiResponse<ShippingLabel>> {
    ensure_permission(user, Permission::Shipping)?;
    let order = Orders::find_by_id(order_id)
        .one(&state.orm)
        .await?
        .ok_or(AppError::NotFound)?;
    let label = ShippingLabels::find()
        .filter(Column::OrderId.eq(order.id))
        .one(&state.orm)
        .await?
        .ok_or(AppError::NotFound)?;
    Ok(ApiResponse::success(
        "Label",
        to_label(label, &order.order_number),
        None,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tracking_number_is_compact_order_number() {
        assert_eq!(tracking_number_for("UI-20250301-AB12CD34"), "TNUI20250301AB12CD34");
    }

    #[test]
    fn lines_have_sender_then_recipient() {
        let now = Utc::now().into();
        let label = LabelModel {
            id: Uuid::new_v4(),
            order_id: Uuid::new_v4(),
            carrier: DEFAULT_CARRIER.into(),
            tracking_number: "TN1".into(),
            packages: 2,
            sender_name: "Urban Indumentaria".into(),
            sender_address: "San Martín 100, Rosario".into(),
            sender_phone: "341000000".into(),
            recipient_name: "Ana".into(),
            recipient_address: "Calle 1, Rosario (2000), Santa Fe".into(),
            recipient_phone: "341111111".into(),
            created_at: now,
            updated_at: now,
        };
        let lines = label_lines(&label, "UI-1");
        assert_eq!(lines[0], "REMITENTE: Urban Indumentaria");
        assert_eq!(lines[4], "DESTINATARIO: Ana");
        assert!(lines.contains(&"Bultos: 2".to_string()));
        assert!(lines.contains(&"Pedido: UI-1".to_string()));
    }
}
