use serde::Serialize;
use utoipa::ToSchema;

use crate::models::{Banner, HomeSection, Product, SiteSettings};

#[derive(Debug, Serialize, ToSchema)]
pub struct ResolvedSection {
    pub section: HomeSection,
    pub products: Vec<Product>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct HomePage {
    pub banners: Vec<Banner>,
    pub sections: Vec<ResolvedSection>,
    pub settings: SiteSettings,
}
