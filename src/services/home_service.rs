use sea_orm::{ColumnTrait, EntityTrait, QueryFilter, QueryOrder};
use uuid::Uuid;

use crate::{
    dto::{
        home::{HomePage, ResolvedSection},
        products::ProductList,
    },
    entity::{
        banners::{Column as BannerCol, Entity as Banners},
        home_sections::{Column as SectionCol, Entity as HomeSections},
        special_filters::{Column as FilterCol, Entity as SpecialFilters, Model as FilterModel},
    },
    error::{AppError, AppResult},
    models::{Banner, HomeSection, SectionKind},
    response::{ApiResponse, Meta},
    routes::params::{ProductQuery, ProductSortBy},
    services::{product_service::search_products, settings_service::load_settings},
    state::AppState,
};

/// Product query equivalent to a special filter's criteria.
pub fn filter_query(filter: &FilterModel) -> ProductQuery {
    ProductQuery {
        category_id: filter.category_id,
        subcategory_id: filter.subcategory_id,
        min_price: filter.min_price,
        max_price: filter.max_price,
        on_sale: filter.on_sale_only.then_some(true),
        featured: filter.featured_only.then_some(true),
        ..ProductQuery::default()
    }
}

/// Product query for a homepage section, or `None` when its reference is broken.
pub fn section_query(
    kind: SectionKind,
    reference: Option<&str>,
    filter: Option<&FilterModel>,
) -> Option<ProductQuery> {
    let query = match kind {
        SectionKind::Featured => ProductQuery {
            featured: Some(true),
            ..ProductQuery::default()
        },
        SectionKind::Top => ProductQuery {
            top: Some(true),
            ..ProductQuery::default()
        },
        SectionKind::Upcoming => ProductQuery {
            upcoming: Some(true),
            ..ProductQuery::default()
        },
        SectionKind::OnSale => ProductQuery {
            on_sale: Some(true),
            sort_by: Some(ProductSortBy::Discount),
            ..ProductQuery::default()
        },
        SectionKind::Category => ProductQuery {
            category_id: Some(Uuid::parse_str(reference?).ok()?),
            ..ProductQuery::default()
        },
        SectionKind::Filter => filter_query(filter?),
    };
    Some(query)
}

async fn active_filter(state: &AppState, slug: &str) -> AppResult<Option<FilterModel>> {
    Ok(SpecialFilters::find()
        .filter(FilterCol::Slug.eq(slug))
        .filter(FilterCol::IsActive.eq(true))
        .one(&state.orm)
        .await?)
}

pub async fn get_home(state: &AppState) -> AppResult<ApiResponse<HomePage>> {
    let banners = Banners::find()
        .filter(BannerCol::IsActive.eq(true))
        .order_by_asc(BannerCol::Position)
        .all(&state.orm)
        .await?
        .into_iter()
        .map(Banner::from)
        .collect();

    let sections = HomeSections::find()
        .filter(SectionCol::IsActive.eq(true))
        .order_by_asc(SectionCol::Position)
        .all(&state.orm)
        .await?;

    let mut resolved = Vec::with_capacity(sections.len());
    for section in sections {
        let Ok(kind) = section.kind.parse::<SectionKind>() else {
            tracing::warn!(section_id = %section.id, kind = %section.kind, "unknown home section kind");
            continue;
        };
        let filter = match (kind, section.reference.as_deref()) {
            (SectionKind::Filter, Some(slug)) => active_filter(state, slug).await?,
            _ => None,
        };
        let Some(mut query) = section_query(kind, section.reference.as_deref(), filter.as_ref())
        else {
            tracing::debug!(section_id = %section.id, "home section reference no longer resolves");
            continue;
        };
        query.per_page = Some(i64::from(section.max_items));
        let (products, _, _, _) = search_products(state, &query).await?;
        resolved.push(ResolvedSection {
            section: HomeSection::from(section),
            products,
        });
    }

    let settings = load_settings(&state.orm).await?;
    Ok(ApiResponse::success(
        "Home",
        HomePage {
            banners,
            sections: resolved,
            settings,
        },
        None,
    ))
}

pub async fn filter_products(
    state: &AppState,
    slug: &str,
    page: Option<i64>,
    per_page: Option<i64>,
) -> AppResult<ApiResponse<ProductList>> {
    let filter = active_filter(state, slug).await?.ok_or(AppError::NotFound)?;
    let query = ProductQuery {
        page,
        per_page,
        ..filter_query(&filter)
    };
    let (items, page, limit, total) = search_products(state, &query).await?;
    Ok(ApiResponse::success(
        "Products",
        ProductList { items },
        Some(Meta::new(page, limit, total)),
    ))
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;

    fn filter_model(on_sale_only: bool) -> FilterModel {
        FilterModel {
            id: Uuid::new_v4(),
            name: "Ofertas".into(),
            slug: "ofertas".into(),
            category_id: None,
            subcategory_id: None,
            min_price: Some(1_000),
            max_price: Some(20_000),
            on_sale_only,
            featured_only: false,
            is_active: true,
            created_at: Utc::now().into(),
        }
    }

    #[test]
    fn filter_flags_only_restrict_when_set() {
        let query = filter_query(&filter_model(true));
        assert_eq!(query.on_sale, Some(true));
        assert_eq!(query.featured, None);
        assert_eq!(query.max_price, Some(20_000));

        assert_eq!(filter_query(&filter_model(false)).on_sale, None);
    }

    #[test]
    fn category_section_needs_a_valid_id() {
        assert!(section_query(SectionKind::Category, Some("not-an-id"), None).is_none());
        let id = Uuid::new_v4().to_string();
        let query = section_query(SectionKind::Category, Some(&id), None).unwrap();
        assert_eq!(query.category_id.map(|c| c.to_string()), Some(id));
    }

    #[test]
    fn filter_section_without_filter_is_skipped() {
        assert!(section_query(SectionKind::Filter, Some("gone"), None).is_none());
        assert!(section_query(SectionKind::Top, None, None).unwrap().top.unwrap());
    }
}
