use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::models::Product;

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct VariantInput {
    /// Existing variant to update; new variants omit it.
    pub id: Option<Uuid>,
    pub size: String,
    pub color: Option<String>,
    pub stock: i32,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateProductRequest {
    pub name: String,
    pub slug: Option<String>,
    pub description: Option<String>,
    pub category_id: Option<Uuid>,
    pub subcategory_id: Option<Uuid>,
    pub price: Option<i64>,
    pub original_price: Option<i64>,
    pub discount_percent: Option<i32>,
    #[serde(default)]
    pub images: Vec<String>,
    /// Ignored when variants are given.
    #[serde(default)]
    pub stock: i32,
    #[serde(default)]
    pub variants: Vec<VariantInput>,
    #[serde(default)]
    pub is_featured: bool,
    #[serde(default)]
    pub is_top: bool,
    #[serde(default)]
    pub is_upcoming: bool,
    #[serde(default)]
    pub on_sale: bool,
    pub is_active: Option<bool>,
}

#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct UpdateProductRequest {
    pub name: Option<String>,
    pub slug: Option<String>,
    pub description: Option<String>,
    pub category_id: Option<Uuid>,
    pub subcategory_id: Option<Uuid>,
    pub price: Option<i64>,
    pub original_price: Option<i64>,
    pub discount_percent: Option<i32>,
    pub images: Option<Vec<String>>,
    pub stock: Option<i32>,
    /// Replaces the full variant list when present.
    pub variants: Option<Vec<VariantInput>>,
    pub is_featured: Option<bool>,
    pub is_top: Option<bool>,
    pub is_upcoming: Option<bool>,
    pub on_sale: Option<bool>,
    pub is_active: Option<bool>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct StockAdjustRequest {
    /// Variant to adjust; products without variants adjust their own stock.
    pub variant_id: Option<Uuid>,
    pub delta: i32,
}

#[derive(Serialize, ToSchema)]
pub struct ProductList {
    pub items: Vec<Product>,
}
