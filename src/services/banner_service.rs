//! Storefront merchandising: banners, homepage sections and special filters.

use sea_orm::{
    ActiveModelTrait, ActiveValue::NotSet, ColumnTrait, EntityTrait, PaginatorTrait, QueryFilter,
    QueryOrder, Set,
};
use uuid::Uuid;

use crate::{
    audit,
    dto::banners::{
        BannerList, BannerRequest, HomeSectionList, HomeSectionRequest, SpecialFilterList,
        SpecialFilterRequest,
    },
    entity::{
        banners::{self, Entity as Banners},
        categories::Entity as Categories,
        home_sections::{self, Entity as HomeSections},
        special_filters::{self, Entity as SpecialFilters},
    },
    error::{AppError, AppResult},
    middleware::auth::{AuthUser, ensure_permission},
    models::{Banner, HomeSection, Permission, SectionKind, SpecialFilter},
    response::{ApiResponse, Meta},
    services::slugify,
    state::AppState,
};

const MAX_SECTION_ITEMS: i32 = 24;

fn deleted() -> ApiResponse<serde_json::Value> {
    ApiResponse::success("Deleted", serde_json::json!({}), Some(Meta::empty()))
}

pub async fn list_banners(
    state: &AppState,
    include_inactive: bool,
) -> AppResult<ApiResponse<BannerList>> {
    let mut finder = Banners::find();
    if !include_inactive {
        finder = finder.filter(banners::Column::IsActive.eq(true));
    }
    let items = finder
        .order_by_asc(banners::Column::Position)
        .order_by_asc(banners::Column::CreatedAt)
        .all(&state.orm)
        .await?
        .into_iter()
        .map(Banner::from)
        .collect();
    Ok(ApiResponse::success("Banners", BannerList { items }, None))
}

fn validate_banner(payload: &BannerRequest) -> AppResult<()> {
    if payload.title.trim().is_empty() {
        return Err(AppError::BadRequest("title is required".into()));
    }
    if !payload.image_url.starts_with("http://") && !payload.image_url.starts_with("https://") {
        return Err(AppError::BadRequest("image_url must be an http(s) URL".into()));
    }
    Ok(())
}

pub async fn create_banner(
    state: &AppState,
    user: &AuthUser,
    payload: BannerRequest,
) -> AppResult<ApiResponse<Banner>> {
    ensure_permission(user, Permission::Banners)?;
    validate_banner(&payload)?;

    let banner = banners::ActiveModel {
        id: Set(Uuid::new_v4()),
        title: Set(payload.title.trim().to_string()),
        image_url: Set(payload.image_url),
        mobile_image_url: Set(payload.mobile_image_url),
        link_url: Set(payload.link_url),
        position: Set(payload.position.unwrap_or(0)),
        is_active: Set(payload.is_active.unwrap_or(true)),
        created_at: NotSet,
    }
    .insert(&state.orm)
    .await?;

    audit::record(
        &state.orm,
        Some(user.user_id),
        "banner_create",
        "banners",
        serde_json::json!({ "banner_id": banner.id }),
    )
    .await;

    Ok(ApiResponse::success("Banner created", Banner::from(banner), Some(Meta::empty())))
}

pub async fn update_banner(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
    payload: BannerRequest,
) -> AppResult<ApiResponse<Banner>> {
    ensure_permission(user, Permission::Banners)?;
    validate_banner(&payload)?;
    let banner = Banners::find_by_id(id)
        .one(&state.orm)
        .await?
        .ok_or(AppError::NotFound)?;

    let mut active: banners::ActiveModel = banner.into();
    active.title = Set(payload.title.trim().to_string());
    active.image_url = Set(payload.image_url);
    active.mobile_image_url = Set(payload.mobile_image_url);
    active.link_url = Set(payload.link_url);
    if let Some(position) = payload.position {
        active.position = Set(position);
    }
    if let Some(is_active) = payload.is_active {
        active.is_active = Set(is_active);
    }
    let banner = active.update(&state.orm).await?;

    audit::record(
        &state.orm,
        Some(user.user_id),
        "banner_update",
        "banners",
        serde_json::json!({ "banner_id": id }),
    )
    .await;

    Ok(ApiResponse::success("Updated", Banner::from(banner), Some(Meta::empty())))
}

pub async fn delete_banner(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
) -> AppResult<ApiResponse<serde_json::Value>> {
    ensure_permission(user, Permission::Banners)?;
    let result = Banners::delete_by_id(id).exec(&state.orm).await?;
    if result.rows_affected == 0 {
        return Err(AppError::NotFound);
    }
    audit::record(
        &state.orm,
        Some(user.user_id),
        "banner_delete",
        "banners",
        serde_json::json!({ "banner_id": id }),
    )
    .await;
    Ok(deleted())
}

pub async fn list_sections(
    state: &AppState,
    user: &AuthUser,
) -> AppResult<ApiResponse<HomeSectionList>> {
    ensure_permission(user, Permission::Banners)?;
    let items = HomeSections::find()
        .order_by_asc(home_sections::Column::Position)
        .all(&state.orm)
        .await?
        .into_iter()
        .map(HomeSection::from)
        .collect();
    Ok(ApiResponse::success("Sections", HomeSectionList { items }, None))
}

/// `category` sections point at a category id, `filter` sections at a filter slug.
async fn validate_section(state: &AppState, payload: &HomeSectionRequest) -> AppResult<()> {
    if payload.title.trim().is_empty() {
        return Err(AppError::BadRequest("title is required".into()));
    }
    if let Some(max_items) = payload.max_items {
        if !(1..=MAX_SECTION_ITEMS).contains(&max_items) {
            return Err(AppError::BadRequest(format!(
                "max_items must be between 1 and {MAX_SECTION_ITEMS}"
            )));
        }
    }
    let reference = payload.reference.as_deref().map(str::trim).unwrap_or("");
    match payload.kind {
        SectionKind::Category => {
            let id = Uuid::parse_str(reference)
                .map_err(|_| AppError::BadRequest("reference must be a category id".into()))?;
            Categories::find_by_id(id)
                .one(&state.orm)
                .await?
                .ok_or_else(|| AppError::BadRequest("category not found".into()))?;
        }
        SectionKind::Filter => {
            let found = SpecialFilters::find()
                .filter(special_filters::Column::Slug.eq(reference))
                .count(&state.orm)
                .await?;
            if found == 0 {
                return Err(AppError::BadRequest("special filter not found".into()));
            }
        }
        SectionKind::Featured | SectionKind::Top | SectionKind::Upcoming | SectionKind::OnSale => {}
    }
    Ok(())
}

fn section_reference(payload: &HomeSectionRequest) -> Option<String> {
    match payload.kind {
        SectionKind::Category | SectionKind::Filter => {
            payload.reference.as_ref().map(|r| r.trim().to_string())
        }
        _ => None,
    }
}

pub async fn create_section(
    state: &AppState,
    user: &AuthUser,
    payload: HomeSectionRequest,
) -> AppResult<ApiResponse<HomeSection>> {
    ensure_permission(user, Permission::Banners)?;
    validate_section(state, &payload).await?;

    let section = home_sections::ActiveModel {
        id: Set(Uuid::new_v4()),
        title: Set(payload.title.trim().to_string()),
        kind: Set(payload.kind.as_str().to_string()),
        reference: Set(section_reference(&payload)),
        position: Set(payload.position.unwrap_or(0)),
        max_items: Set(payload.max_items.unwrap_or(8)),
        is_active: Set(payload.is_active.unwrap_or(true)),
        created_at: NotSet,
    }
    .insert(&state.orm)
    .await?;

    audit::record(
        &state.orm,
        Some(user.user_id),
        "home_section_create",
        "home_sections",
        serde_json::json!({ "section_id": section.id }),
    )
    .await;

    Ok(ApiResponse::success("Section created", HomeSection::from(section), Some(Meta::empty())))
}

pub async fn update_section(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
    payload: HomeSectionRequest,
) -> AppResult<ApiResponse<HomeSection>> {
    ensure_permission(user, Permission::Banners)?;
    validate_section(state, &payload).await?;
    let section = HomeSections::find_by_id(id)
        .one(&state.orm)
        .await?
        .ok_or(AppError::NotFound)?;

    let mut active: home_sections::ActiveModel = section.into();
    active.title = Set(payload.title.trim().to_string());
    active.kind = Set(payload.kind.as_str().to_string());
    active.reference = Set(section_reference(&payload));
    if let Some(position) = payload.position {
        active.position = Set(position);
    }
    if let Some(max_items) = payload.max_items {
        active.max_items = Set(max_items);
    }
    if let Some(is_active) = payload.is_active {
        active.is_active = Set(is_active);
    }
    let section = active.update(&state.orm).await?;

    audit::record(
        &state.orm,
        Some(user.user_id),
        "home_section_update",
        "home_sections",
        serde_json::json!({ "section_id": id }),
    )
    .await;

    Ok(ApiResponse::success("Updated", HomeSection::from(section), Some(Meta::empty())))
}

pub async fn delete_section(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
) -> AppResult<ApiResponse<serde_json::Value>> {
    ensure_permission(user, Permission::Banners)?;
    let result = HomeSections::delete_by_id(id).exec(&state.orm).await?;
    if result.rows_affected == 0 {
        return Err(AppError::NotFound);
    }
    audit::record(
        &state.orm,
        Some(user.user_id),
        "home_section_delete",
        "home_sections",
        serde_json::json!({ "section_id": id }),
    )
    .await;
    Ok(deleted())
}

pub async fn list_filters(
    state: &AppState,
    include_inactive: bool,
) -> AppResult<ApiResponse<SpecialFilterList>> {
    let mut finder = SpecialFilters::find();
    if !include_inactive {
        finder = finder.filter(special_filters::Column::IsActive.eq(true));
    }
    let items = finder
        .order_by_asc(special_filters::Column::Name)
        .all(&state.orm)
        .await?
        .into_iter()
        .map(SpecialFilter::from)
        .collect();
    Ok(ApiResponse::success("Filters", SpecialFilterList { items }, None))
}

fn validate_filter(payload: &SpecialFilterRequest) -> AppResult<String> {
    if payload.name.trim().is_empty() {
        return Err(AppError::BadRequest("name is required".into()));
    }
    if let (Some(min), Some(max)) = (payload.min_price, payload.max_price) {
        if min > max {
            return Err(AppError::BadRequest("min_price is above max_price".into()));
        }
    }
    if payload.min_price.is_some_and(|p| p < 0) || payload.max_price.is_some_and(|p| p < 0) {
        return Err(AppError::BadRequest("prices cannot be negative".into()));
    }
    let slug = slugify(payload.slug.as_deref().unwrap_or(&payload.name));
    if slug.is_empty() {
        return Err(AppError::BadRequest("slug cannot be empty".into()));
    }
    Ok(slug)
}

async fn ensure_filter_slug_free(state: &AppState, slug: &str, except: Option<Uuid>) -> AppResult<()> {
    let mut finder = SpecialFilters::find().filter(special_filters::Column::Slug.eq(slug));
    if let Some(id) = except {
        finder = finder.filter(special_filters::Column::Id.ne(id));
    }
    if finder.count(&state.orm).await? > 0 {
        return Err(AppError::Conflict(format!("slug {slug} is already used")));
    }
    Ok(())
}

pub async fn create_filter(
    state: &AppState,
    user: &AuthUser,
    payload: SpecialFilterRequest,
) -> AppResult<ApiResponse<SpecialFilter>> {
    ensure_permission(user, Permission::Banners)?;
    let slug = validate_filter(&payload)?;
    ensure_filter_slug_free(state, &slug, None).await?;

    let filter = special_filters::ActiveModel {
        id: Set(Uuid::new_v4()),
        name: Set(payload.name.trim().to_string()),
        slug: Set(slug),
        category_id: Set(payload.category_id),
        subcategory_id: Set(payload.subcategory_id),
        min_price: Set(payload.min_price),
        max_price: Set(payload.max_price),
        on_sale_only: Set(payload.on_sale_only),
        featured_only: Set(payload.featured_only),
        is_active: Set(payload.is_active.unwrap_or(true)),
        created_at: NotSet,
    }
    .insert(&state.orm)
    .await?;

    audit::record(
        &state.orm,
        Some(user.user_id),
        "special_filter_create",
        "special_filters",
        serde_json::json!({ "filter_id": filter.id }),
    )
    .await;

    Ok(ApiResponse::success("Filter created", SpecialFilter::from(filter), Some(Meta::empty())))
}

pub async fn update_filter(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
    payload: SpecialFilterRequest,
) -> AppResult<ApiResponse<SpecialFilter>> {
    ensure_permission(user, Permission::Banners)?;
    let slug = validate_filter(&payload)?;
    ensure_filter_slug_free(state, &slug, Some(id)).await?;
    let filter = SpecialFilters::find_by_id(id)
        .one(&state.orm)
        .await?
        .ok_or(AppError::NotFound)?;

    let mut active: special_filters::ActiveModel = filter.into();
    active.name = Set(payload.name.trim().to_string());
    active.slug = Set(slug);
    active.category_id = Set(payload.category_id);
    active.subcategory_id = Set(payload.subcategory_id);
    active.min_price = Set(payload.min_price);
    active.max_price = Set(payload.max_price);
    active.on_sale_only = Set(payload.on_sale_only);
    active.featured_only = Set(payload.featured_only);
    if let Some(is_active) = payload.is_active {
        active.is_active = Set(is_active);
    }
    let filter = active.update(&state.orm).await?;

    audit::record(
        &state.orm,
        Some(user.user_id),
        "special_filter_update",
        "special_filters",
        serde_json::json!({ "filter_id": id }),
    )
    .await;

    Ok(ApiResponse::success("Updated", SpecialFilter::from(filter), Some(Meta::empty())))
}

pub async fn delete_filter(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
) -> AppResult<ApiResponse<serde_json::Value>> {
    ensure_permission(user, Permission::Banners)?;
    let result = SpecialFilters::delete_by_id(id).exec(&state.orm).await?;
    if result.rows_affected == 0 {
        return Err(AppError::NotFound);
    }
    audit::record(
        &state.orm,
        Some(user.user_id),
        "special_filter_delete",
        "special_filters",
        serde_json::json!({ "filter_id": id }),
    )
    .await;
    Ok(deleted())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn filter(name: &str, min: Option<i64>, max: Option<i64>) -> SpecialFilterRequest {
        SpecialFilterRequest {
            name: name.into(),
            slug: None,
            category_id: None,
            subcategory_id: None,
            min_price: min,
            max_price: max,
            on_sale_only: false,
            featured_only: false,
            is_active: None,
        }
    }

    #[test]
    fn filter_slug_comes_from_name() {
        assert_eq!(validate_filter(&filter("Menos de $20.000", None, Some(20_000))).unwrap(), "menos-de-20-000");
    }

    #[test]
    fn filter_rejects_inverted_range() {
        assert!(validate_filter(&filter("Rango", Some(10), Some(5))).is_err());
    }

    #[test]
    fn banner_needs_http_image() {
        let banner = BannerRequest {
            title: "Invierno".into(),
            image_url: "ftp://cdn/banner.jpg".into(),
            mobile_image_url: None,
            link_url: None,
            position: None,
            is_active: None,
        };
        assert!(validate_banner(&banner).is_err());
    }
}
