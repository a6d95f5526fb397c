use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::models::{Banner, HomeSection, SectionKind, SpecialFilter};

#[derive(Debug, Deserialize, ToSchema)]
pub struct BannerRequest {
    pub title: String,
    pub image_url: String,
    pub mobile_image_url: Option<String>,
    pub link_url: Option<String>,
    pub position: Option<i32>,
    pub is_active: Option<bool>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct BannerList {
    pub items: Vec<Banner>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct HomeSectionRequest {
    pub title: String,
    pub kind: SectionKind,
    pub reference: Option<String>,
    pub position: Option<i32>,
    pub max_items: Option<i32>,
    pub is_active: Option<bool>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct HomeSectionList {
    pub items: Vec<HomeSection>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct SpecialFilterRequest {
    pub name: String,
    pub slug: Option<String>,
    pub category_id: Option<Uuid>,
    pub subcategory_id: Option<Uuid>,
    pub min_price: Option<i64>,
    pub max_price: Option<i64>,
    #[serde(default)]
    pub on_sale_only: bool,
    #[serde(default)]
    pub featured_only: bool,
    pub is_active: Option<bool>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct SpecialFilterList {
    pub items: Vec<SpecialFilter>,
}
