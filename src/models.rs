use std::{fmt, str::FromStr};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::{entity, installments::Installment, money::format_price};

/// Enums stored as `TEXT` columns: serde and the column share the same names.
macro_rules! text_enum {
    ($(#[$meta:meta])* $name:ident { $($variant:ident => $text:literal),+ $(,)? }) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
        pub enum $name {
            $(#[serde(rename = $text)] $variant),+
        }

        impl $name {
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            pub fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $text),+
                }
            }
        }

        impl FromStr for $name {
            type Err = String;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($text => Ok($name::$variant),)+
                    other => Err(format!("invalid {}: {other}", stringify!($name))),
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

text_enum!(OrderStatus {
    Pending => "pending",
    Paid => "paid",
    Preparing => "preparing",
    Shipped => "shipped",
    Delivered => "delivered",
    Cancelled => "cancelled",
});

text_enum!(PaymentStatus {
    Unpaid => "unpaid",
    Paid => "paid",
    Refunded => "refunded",
});

text_enum!(PaymentMethod {
    MercadoPago => "mercadopago",
    Transfer => "transfer",
    Cash => "cash",
});

text_enum!(ShippingMethod {
    Pickup => "pickup",
    Delivery => "delivery",
});

text_enum!(ReviewStatus {
    Pending => "pending",
    Approved => "approved",
});

text_enum!(DebtTransactionKind {
    Charge => "charge",
    Payment => "payment",
});

text_enum!(SectionKind {
    Featured => "featured",
    Top => "top",
    Upcoming => "upcoming",
    OnSale => "on_sale",
    Category => "category",
    Filter => "filter",
});

text_enum!(
    /// Admin panel modules an operator can be granted.
    Permission {
        Products => "products",
        Categories => "categories",
        Banners => "banners",
        Orders => "orders",
        Debts => "debts",
        Reviews => "reviews",
        Shipping => "shipping",
        Stats => "stats",
        Operators => "operators",
        Settings => "settings",
    }
);

impl OrderStatus {
    fn rank(&self) -> u8 {
        match self {
            OrderStatus::Pending => 0,
            OrderStatus::Paid => 1,
            OrderStatus::Preparing => 2,
            OrderStatus::Shipped => 3,
            OrderStatus::Delivered => 4,
            OrderStatus::Cancelled => u8::MAX,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, OrderStatus::Delivered | OrderStatus::Cancelled)
    }

    /// Orders advance one stage at a time; cancelling is allowed until they ship.
    pub fn can_transition_to(&self, next: OrderStatus) -> bool {
        if self.is_terminal() {
            return false;
        }
        match next {
            OrderStatus::Cancelled => self.rank() <= OrderStatus::Preparing.rank(),
            _ => next.rank() == self.rank() + 1,
        }
    }
}

/// Parse the permission list stored on an operator, skipping unknown names.
pub fn permissions_from_json(value: &serde_json::Value) -> Vec<Permission> {
    value
        .as_array()
        .map(|items| {
            items
                .iter()
                .filter_map(|v| v.as_str())
                .filter_map(|s| s.parse().ok())
                .collect()
        })
        .unwrap_or_default()
}

pub fn permissions_to_json(permissions: &[Permission]) -> serde_json::Value {
    serde_json::Value::Array(
        permissions
            .iter()
            .map(|p| serde_json::Value::String(p.as_str().to_string()))
            .collect(),
    )
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct User {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
    pub role: String,
    pub created_at: DateTime<Utc>,
}

impl From<entity::users::Model> for User {
    fn from(model: entity::users::Model) -> Self {
        Self {
            id: model.id,
            name: model.name,
            email: model.email,
            phone: model.phone,
            role: model.role,
            created_at: model.created_at.with_timezone(&Utc),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct Operator {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub is_owner: bool,
    pub permissions: Vec<Permission>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<entity::operators::Model> for Operator {
    fn from(model: entity::operators::Model) -> Self {
        Self {
            permissions: permissions_from_json(&model.permissions),
            id: model.id,
            name: model.name,
            email: model.email,
            is_owner: model.is_owner,
            is_active: model.is_active,
            created_at: model.created_at.with_timezone(&Utc),
            updated_at: model.updated_at.with_timezone(&Utc),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct Subcategory {
    pub id: Uuid,
    pub category_id: Uuid,
    pub name: String,
    pub slug: String,
    pub position: i32,
}

impl From<entity::subcategories::Model> for Subcategory {
    fn from(model: entity::subcategories::Model) -> Self {
        Self {
            id: model.id,
            category_id: model.category_id,
            name: model.name,
            slug: model.slug,
            position: model.position,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct Category {
    pub id: Uuid,
    pub name: String,
    pub slug: String,
    pub position: i32,
    pub is_active: bool,
    pub subcategories: Vec<Subcategory>,
}

impl Category {
    pub fn from_entity(
        model: entity::categories::Model,
        subcategories: Vec<entity::subcategories::Model>,
    ) -> Self {
        Self {
            id: model.id,
            name: model.name,
            slug: model.slug,
            position: model.position,
            is_active: model.is_active,
            subcategories: subcategories.into_iter().map(Subcategory::from).collect(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ProductVariant {
    pub id: Uuid,
    pub size: String,
    pub color: Option<String>,
    pub stock: i32,
}

impl From<entity::product_variants::Model> for ProductVariant {
    fn from(model: entity::product_variants::Model) -> Self {
        Self {
            id: model.id,
            size: model.size,
            color: model.color,
            stock: model.stock,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Product {
    pub id: Uuid,
    pub name: String,
    pub slug: String,
    pub description: Option<String>,
    pub category_id: Option<Uuid>,
    pub subcategory_id: Option<Uuid>,
    pub price: i64,
    /// `price` formatted for display, e.g. `$12.500`.
    pub price_label: String,
    pub original_price: Option<i64>,
    pub discount_percent: Option<i32>,
    pub images: Vec<String>,
    pub stock: i32,
    pub is_featured: bool,
    pub is_top: bool,
    pub is_upcoming: bool,
    pub on_sale: bool,
    pub is_active: bool,
    pub variants: Vec<ProductVariant>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Product {
    pub fn from_entity(
        model: entity::products::Model,
        variants: Vec<entity::product_variants::Model>,
    ) -> Self {
        let images = serde_json::from_value(model.images).unwrap_or_default();
        Self {
            id: model.id,
            name: model.name,
            slug: model.slug,
            description: model.description,
            category_id: model.category_id,
            subcategory_id: model.subcategory_id,
            price_label: format_price(model.price),
            price: model.price,
            original_price: model.original_price,
            discount_percent: model.discount_percent,
            images,
            stock: model.stock,
            is_featured: model.is_featured,
            is_top: model.is_top,
            is_upcoming: model.is_upcoming,
            on_sale: model.on_sale,
            is_active: model.is_active,
            variants: variants.into_iter().map(ProductVariant::from).collect(),
            created_at: model.created_at.with_timezone(&Utc),
            updated_at: model.updated_at.with_timezone(&Utc),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct CartItem {
    pub id: Uuid,
    pub product_id: Uuid,
    pub variant_id: Option<Uuid>,
    pub quantity: i32,
    pub created_at: DateTime<Utc>,
}

impl From<entity::cart_items::Model> for CartItem {
    fn from(model: entity::cart_items::Model) -> Self {
        Self {
            id: model.id,
            product_id: model.product_id,
            variant_id: model.variant_id,
            quantity: model.quantity,
            created_at: model.created_at.with_timezone(&Utc),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct Order {
    pub id: Uuid,
    pub user_id: Uuid,
    pub order_number: String,
    pub status: String,
    pub payment_status: String,
    pub payment_method: String,
    pub shipping_method: String,
    pub subtotal: i64,
    /// Taken off the subtotal for bank transfer payments.
    pub discount_amount: i64,
    pub shipping_cost: i64,
    pub total_amount: i64,
    pub total_label: String,
    pub recipient_name: String,
    pub phone: String,
    pub street: String,
    pub city: String,
    pub province: String,
    pub postal_code: String,
    pub notes: Option<String>,
    pub payment_reference: Option<String>,
    pub paid_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<entity::orders::Model> for Order {
    fn from(model: entity::orders::Model) -> Self {
        Self {
            id: model.id,
            user_id: model.user_id,
            order_number: model.order_number,
            status: model.status,
            payment_status: model.payment_status,
            payment_method: model.payment_method,
            shipping_method: model.shipping_method,
            subtotal: model.subtotal,
            discount_amount: model.discount_amount,
            shipping_cost: model.shipping_cost,
            total_label: format_price(model.total_amount),
            total_amount: model.total_amount,
            recipient_name: model.recipient_name,
            phone: model.phone,
            street: model.street,
            city: model.city,
            province: model.province,
            postal_code: model.postal_code,
            notes: model.notes,
            payment_reference: model.payment_reference,
            paid_at: model.paid_at.map(|dt| dt.with_timezone(&Utc)),
            created_at: model.created_at.with_timezone(&Utc),
            updated_at: model.updated_at.with_timezone(&Utc),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct OrderItem {
    pub id: Uuid,
    pub order_id: Uuid,
    pub product_id: Option<Uuid>,
    pub variant_id: Option<Uuid>,
    pub product_name: String,
    pub size: Option<String>,
    pub color: Option<String>,
    pub quantity: i32,
    pub price: i64,
    pub created_at: DateTime<Utc>,
}

impl From<entity::order_items::Model> for OrderItem {
    fn from(model: entity::order_items::Model) -> Self {
        Self {
            id: model.id,
            order_id: model.order_id,
            product_id: model.product_id,
            variant_id: model.variant_id,
            product_name: model.product_name,
            size: model.size,
            color: model.color,
            quantity: model.quantity,
            price: model.price,
            created_at: model.created_at.with_timezone(&Utc),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ShippingLabel {
    pub id: Uuid,
    pub order_id: Uuid,
    pub order_number: String,
    pub carrier: String,
    pub tracking_number: String,
    pub packages: i32,
    pub sender_name: String,
    pub sender_address: String,
    pub sender_phone: String,
    pub recipient_name: String,
    pub recipient_address: String,
    pub recipient_phone: String,
    /// Printable lines, top to bottom.
    pub lines: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct Debt {
    pub id: Uuid,
    pub customer_name: String,
    pub phone: Option<String>,
    pub notes: Option<String>,
    pub balance: i64,
    pub balance_label: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<entity::debts::Model> for Debt {
    fn from(model: entity::debts::Model) -> Self {
        Self {
            id: model.id,
            customer_name: model.customer_name,
            phone: model.phone,
            notes: model.notes,
            balance_label: format_price(model.balance),
            balance: model.balance,
            created_at: model.created_at.with_timezone(&Utc),
            updated_at: model.updated_at.with_timezone(&Utc),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct DebtTransaction {
    pub id: Uuid,
    pub debt_id: Uuid,
    pub kind: String,
    pub amount: i64,
    pub description: Option<String>,
    pub installments: i32,
    pub schedule: Vec<Installment>,
    pub created_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

impl From<entity::debt_transactions::Model> for DebtTransaction {
    fn from(model: entity::debt_transactions::Model) -> Self {
        Self {
            schedule: serde_json::from_value(model.schedule).unwrap_or_default(),
            id: model.id,
            debt_id: model.debt_id,
            kind: model.kind,
            amount: model.amount,
            description: model.description,
            installments: model.installments,
            created_by: model.created_by,
            created_at: model.created_at.with_timezone(&Utc),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema, sqlx::FromRow)]
pub struct Review {
    pub id: Uuid,
    pub product_id: Uuid,
    pub user_id: Uuid,
    pub author_name: String,
    pub rating: i32,
    pub comment: String,
    pub status: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct Banner {
    pub id: Uuid,
    pub title: String,
    pub image_url: String,
    pub mobile_image_url: Option<String>,
    pub link_url: Option<String>,
    pub position: i32,
    pub is_active: bool,
}

impl From<entity::banners::Model> for Banner {
    fn from(model: entity::banners::Model) -> Self {
        Self {
            id: model.id,
            title: model.title,
            image_url: model.image_url,
            mobile_image_url: model.mobile_image_url,
            link_url: model.link_url,
            position: model.position,
            is_active: model.is_active,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct HomeSection {
    pub id: Uuid,
    pub title: String,
    pub kind: String,
    pub reference: Option<String>,
    pub position: i32,
    pub max_items: i32,
    pub is_active: bool,
}

impl From<entity::home_sections::Model> for HomeSection {
    fn from(model: entity::home_sections::Model) -> Self {
        Self {
            id: model.id,
            title: model.title,
            kind: model.kind,
            reference: model.reference,
            position: model.position,
            max_items: model.max_items,
            is_active: model.is_active,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct SpecialFilter {
    pub id: Uuid,
    pub name: String,
    pub slug: String,
    pub category_id: Option<Uuid>,
    pub subcategory_id: Option<Uuid>,
    pub min_price: Option<i64>,
    pub max_price: Option<i64>,
    pub on_sale_only: bool,
    pub featured_only: bool,
    pub is_active: bool,
}

impl From<entity::special_filters::Model> for SpecialFilter {
    fn from(model: entity::special_filters::Model) -> Self {
        Self {
            id: model.id,
            name: model.name,
            slug: model.slug,
            category_id: model.category_id,
            subcategory_id: model.subcategory_id,
            min_price: model.min_price,
            max_price: model.max_price,
            on_sale_only: model.on_sale_only,
            featured_only: model.featured_only,
            is_active: model.is_active,
        }
    }
}

/// Store-wide settings edited from the admin panel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(default)]
pub struct SiteSettings {
    pub shipping_cost: i64,
    /// Orders at or above this subtotal ship free; `0` disables it.
    pub free_shipping_threshold: i64,
    pub whatsapp_number: Option<String>,
    pub contact_email: Option<String>,
    pub instagram_url: Option<String>,
    pub announcement: Option<String>,
    pub transfer_alias: Option<String>,
    pub transfer_cbu: Option<String>,
    pub transfer_discount_percent: i32,
}

impl Default for SiteSettings {
    fn default() -> Self {
        Self {
            shipping_cost: 5_000,
            free_shipping_threshold: 80_000,
            whatsapp_number: None,
            contact_email: None,
            instagram_url: None,
            announcement: None,
            transfer_alias: None,
            transfer_cbu: None,
            transfer_discount_percent: 0,
        }
    }
}

impl SiteSettings {
    pub fn shipping_for(&self, method: ShippingMethod, subtotal: i64) -> i64 {
        match method {
            ShippingMethod::Pickup => 0,
            ShippingMethod::Delivery
                if self.free_shipping_threshold > 0 && subtotal >= self.free_shipping_threshold =>
            {
                0
            }
            ShippingMethod::Delivery => self.shipping_cost,
        }
    }

    /// Amount taken off `subtotal` for the given payment method, rounded down.
    pub fn discount_for(&self, method: PaymentMethod, subtotal: i64) -> i64 {
        if method != PaymentMethod::Transfer || self.transfer_discount_percent <= 0 {
            return 0;
        }
        let off = i128::from(subtotal) * i128::from(self.transfer_discount_percent) / 100;
        i64::try_from(off).unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn order_status_advances_one_stage_at_a_time() {
        assert!(OrderStatus::Pending.can_transition_to(OrderStatus::Paid));
        assert!(OrderStatus::Paid.can_transition_to(OrderStatus::Preparing));
        assert!(OrderStatus::Preparing.can_transition_to(OrderStatus::Shipped));
        assert!(OrderStatus::Shipped.can_transition_to(OrderStatus::Delivered));
        assert!(!OrderStatus::Pending.can_transition_to(OrderStatus::Delivered));
        assert!(!OrderStatus::Paid.can_transition_to(OrderStatus::Shipped));
        assert!(!OrderStatus::Shipped.can_transition_to(OrderStatus::Paid));
        assert!(!OrderStatus::Paid.can_transition_to(OrderStatus::Paid));
        assert!(!OrderStatus::Delivered.can_transition_to(OrderStatus::Cancelled));
    }

    #[test]
    fn cancel_only_before_shipping() {
        assert!(OrderStatus::Pending.can_transition_to(OrderStatus::Cancelled));
        assert!(OrderStatus::Preparing.can_transition_to(OrderStatus::Cancelled));
        assert!(!OrderStatus::Shipped.can_transition_to(OrderStatus::Cancelled));
        assert!(!OrderStatus::Cancelled.can_transition_to(OrderStatus::Pending));
    }

    #[test]
    fn text_enums_round_trip_through_column_names() {
        for status in OrderStatus::ALL {
            assert_eq!(status.as_str().parse::<OrderStatus>(), Ok(*status));
        }
        assert_eq!("on_sale".parse::<SectionKind>(), Ok(SectionKind::OnSale));
        assert!("archived".parse::<OrderStatus>().is_err());
        assert_eq!(
            serde_json::to_value(PaymentMethod::MercadoPago).unwrap(),
            serde_json::json!("mercadopago")
        );
    }

    #[test]
    fn permissions_skip_unknown_names() {
        let json = serde_json::json!(["products", "wizardry", "orders"]);
        assert_eq!(
            permissions_from_json(&json),
            vec![Permission::Products, Permission::Orders]
        );
        assert_eq!(
            permissions_to_json(&[Permission::Debts]),
            serde_json::json!(["debts"])
        );
    }

    #[test]
    fn shipping_is_free_for_pickup_and_large_orders() {
        let settings = SiteSettings::default();
        assert_eq!(settings.shipping_for(ShippingMethod::Pickup, 1_000), 0);
        assert_eq!(settings.shipping_for(ShippingMethod::Delivery, 1_000), 5_000);
        assert_eq!(settings.shipping_for(ShippingMethod::Delivery, 80_000), 0);

        let no_threshold = SiteSettings {
            free_shipping_threshold: 0,
            ..SiteSettings::default()
        };
        assert_eq!(
            no_threshold.shipping_for(ShippingMethod::Delivery, 1_000_000),
            5_000
        );
    }

    #[test]
    fn transfer_discount_applies_only_to_transfers() {
        let settings = SiteSettings {
            transfer_discount_percent: 10,
            ..SiteSettings::default()
        };
        assert_eq!(settings.discount_for(PaymentMethod::Transfer, 20_000), 2_000);
        assert_eq!(settings.discount_for(PaymentMethod::Transfer, 999), 99);
        assert_eq!(settings.discount_for(PaymentMethod::MercadoPago, 20_000), 0);
        assert_eq!(
            SiteSettings::default().discount_for(PaymentMethod::Transfer, 20_000),
            0
        );
    }
}
