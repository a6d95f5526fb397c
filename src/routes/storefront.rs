use axum::{
    Json, Router,
    extract::{Path, Query, State},
    routing::{get, put},
};
use uuid::Uuid;

use crate::{
    dto::{
        banners::{
            BannerList, BannerRequest, HomeSectionList, HomeSectionRequest, SpecialFilterList,
            SpecialFilterRequest,
        },
        home::HomePage,
        products::ProductList,
    },
    error::AppResult,
    middleware::auth::{AuthUser, ensure_permission},
    models::{Banner, HomeSection, Permission, SiteSettings, SpecialFilter},
    response::ApiResponse,
    routes::params::Pagination,
    services::{banner_service, home_service, settings_service},
    state::AppState,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/home", get(home))
        .route("/banners", get(list_banners))
        .route("/filters", get(list_filters))
        .route("/filters/{slug}/products", get(filter_products))
        .route("/settings", get(get_settings))
}

pub fn admin_router() -> Router<AppState> {
    Router::new()
        .route("/banners", get(admin_list_banners).post(create_banner))
        .route("/banners/{id}", put(update_banner).delete(delete_banner))
        .route("/home-sections", get(list_sections).post(create_section))
        .route(
            "/home-sections/{id}",
            put(update_section).delete(delete_section),
        )
        .route("/filters", get(admin_list_filters).post(create_filter))
        .route("/filters/{id}", put(update_filter).delete(delete_filter))
}

#[utoipa::path(
    get,
    path = "/api/home",
    responses(
        (status = 200, description = "Banners, resolved home sections and store settings", body = ApiResponse<HomePage>)
    ),
    tag = "Storefront"
)]
pub async fn home(State(state): State<AppState>) -> AppResult<Json<ApiResponse<HomePage>>> {
    Ok(Json(home_service::get_home(&state).await?))
}

#[utoipa::path(
    get,
    path = "/api/banners",
    responses(
        (status = 200, description = "Active banners", body = ApiResponse<BannerList>)
    ),
    tag = "Storefront"
)]
pub async fn list_banners(
    State(state): State<AppState>,
) -> AppResult<Json<ApiResponse<BannerList>>> {
    Ok(Json(banner_service::list_banners(&state, false).await?))
}

#[utoipa::path(
    get,
    path = "/api/filters",
    responses(
        (status = 200, description = "Active special filters", body = ApiResponse<SpecialFilterList>)
    ),
    tag = "Storefront"
)]
pub async fn list_filters(
    State(state): State<AppState>,
) -> AppResult<Json<ApiResponse<SpecialFilterList>>> {
    Ok(Json(banner_service::list_filters(&state, false).await?))
}

#[utoipa::path(
    get,
    path = "/api/filters/{slug}/products",
    params(("slug" = String, Path, description = "Filter slug"), Pagination),
    responses(
        (status = 200, description = "Products matching the filter", body = ApiResponse<ProductList>),
        (status = 404, description = "Filter not found")
    ),
    tag = "Storefront"
)]
pub async fn filter_products(
    State(state): State<AppState>,
    Path(slug): Path<String>,
    Query(pagination): Query<Pagination>,
) -> AppResult<Json<ApiResponse<ProductList>>> {
    Ok(Json(
        home_service::filter_products(&state, &slug, pagination.page, pagination.per_page)
            .await?,
    ))
}

#[utoipa::path(
    get,
    path = "/api/settings",
    responses(
        (status = 200, description = "Public store settings", body = ApiResponse<SiteSettings>)
    ),
    tag = "Storefront"
)]
pub async fn get_settings(
    State(state): State<AppState>,
) -> AppResult<Json<ApiResponse<SiteSettings>>> {
    Ok(Json(settings_service::get_settings(&state).await?))
}

#[utoipa::path(
    get,
    path = "/api/admin/banners",
    responses(
        (status = 200, description = "All banners, inactive included", body = ApiResponse<BannerList>)
    ),
    security(("bearer_auth" = [])),
    tag = "Merchandising"
)]
pub async fn admin_list_banners(
    State(state): State<AppState>,
    user: AuthUser,
) -> AppResult<Json<ApiResponse<BannerList>>> {
    ensure_permission(&user, Permission::Banners)?;
    Ok(Json(banner_service::list_banners(&state, true).await?))
}

#[utoipa::path(
    post,
    path = "/api/admin/banners",
    request_body = BannerRequest,
    responses(
        (status = 200, description = "Create banner", body = ApiResponse<Banner>)
    ),
    security(("bearer_auth" = [])),
    tag = "Merchandising"
)]
pub async fn create_banner(
    State(state): State<AppState>,
    user: AuthUser,
    Json(payload): Json<BannerRequest>,
) -> AppResult<Json<ApiResponse<Banner>>> {
    Ok(Json(banner_service::create_banner(&state, &user, payload).await?))
}

#[utoipa::path(
    put,
    path = "/api/admin/banners/{id}",
    params(("id" = Uuid, Path, description = "Banner ID")),
    request_body = BannerRequest,
    responses(
        (status = 200, description = "Update banner", body = ApiResponse<Banner>),
        (status = 404, description = "Banner not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Merchandising"
)]
pub async fn update_banner(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<BannerRequest>,
) -> AppResult<Json<ApiResponse<Banner>>> {
    Ok(Json(
        banner_service::update_banner(&state, &user, id, payload).await?,
    ))
}

#[utoipa::path(
    delete,
    path = "/api/admin/banners/{id}",
    params(("id" = Uuid, Path, description = "Banner ID")),
    responses(
        (status = 200, description = "Delete banner", body = ApiResponse<serde_json::Value>)
    ),
    security(("bearer_auth" = [])),
    tag = "Merchandising"
)]
pub async fn delete_banner(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<serde_json::Value>>> {
    Ok(Json(banner_service::delete_banner(&state, &user, id).await?))
}

#[utoipa::path(
    get,
    path = "/api/admin/home-sections",
    responses(
        (status = 200, description = "Configured home sections", body = ApiResponse<HomeSectionList>)
    ),
    security(("bearer_auth" = [])),
    tag = "Merchandising"
)]
pub async fn list_sections(
    State(state): State<AppState>,
    user: AuthUser,
) -> AppResult<Json<ApiResponse<HomeSectionList>>> {
    Ok(Json(banner_service::list_sections(&state, &user).await?))
}

#[utoipa::path(
    post,
    path = "/api/admin/home-sections",
    request_body = HomeSectionRequest,
    responses(
        (status = 200, description = "Create home section", body = ApiResponse<HomeSection>),
        (status = 400, description = "Unknown category or filter reference")
    ),
    security(("bearer_auth" = [])),
    tag = "Merchandising"
)]
pub async fn create_section(
    State(state): State<AppState>,
    user: AuthUser,
    Json(payload): Json<HomeSectionRequest>,
) -> AppResult<Json<ApiResponse<HomeSection>>> {
    Ok(Json(
        banner_service::create_section(&state, &user, payload).await?,
    ))
}

#[utoipa::path(
    put,
    path = "/api/admin/home-sections/{id}",
    params(("id" = Uuid, Path, description = "Home section ID")),
    request_body = HomeSectionRequest,
    responses(
        (status = 200, description = "Update home section", body = ApiResponse<HomeSection>),
        (status = 404, description = "Home section not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Merchandising"
)]
pub async fn update_section(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<HomeSectionRequest>,
) -> AppResult<Json<ApiResponse<HomeSection>>> {
    Ok(Json(
        banner_service::update_section(&state, &user, id, payload).await?,
    ))
}

#[utoipa::path(
    delete,
    path = "/api/admin/home-sections/{id}",
    params(("id" = Uuid, Path, description = "Home section ID")),
    responses(
        (status = 200, description = "Delete home section", body = ApiResponse<serde_json::Value>)
    ),
    security(("bearer_auth" = [])),
    tag = "Merchandising"
)]
pub async fn delete_section(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<serde_json::Value>>> {
    Ok(Json(banner_service::delete_section(&state, &user, id).await?))
}

#[utoipa::path(
    get,
    path = "/api/admin/filters",
    responses(
        (status = 200, description = "All special filters, inactive included", body = ApiResponse<SpecialFilterList>)
    ),
    security(("bearer_auth" = [])),
    tag = "Merchandising"
)]
pub async fn admin_list_filters(
    State(state): State<AppState>,
    user: AuthUser,
) -> AppResult<Json<ApiResponse<SpecialFilterList>>> {
    ensure_permission(&user, Permission::Banners)?;
    Ok(Json(banner_service::list_filters(&state, true).await?))
}

#[utoipa::path(
    post,
    path = "/api/admin/filters",
    request_body = SpecialFilterRequest,
    responses(
        (status = 200, description = "Create special filter", body = ApiResponse<SpecialFilter>),
        (status = 409, description = "Slug already used")
    ),
    security(("bearer_auth" = [])),
    tag = "Merchandising"
)]
pub async fn create_filter(
    State(state): State<AppState>,
    user: AuthUser,
    Json(payload): Json<SpecialFilterRequest>,
) -> AppResult<Json<ApiResponse<SpecialFilter>>> {
    Ok(Json(banner_service::create_filter(&state, &user, payload).await?))
}

#[utoipa::path(
    put,
    path = "/api/admin/filters/{id}",
    params(("id" = Uuid, Path, description = "Filter ID")),
    request_body = SpecialFilterRequest,
    responses(
        (status = 200, description = "Update special filter", body = ApiResponse<SpecialFilter>),
        (status = 404, description = "Filter not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Merchandising"
)]
pub async fn update_filter(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<SpecialFilterRequest>,
) -> AppResult<Json<ApiResponse<SpecialFilter>>> {
    Ok(Json(
        banner_service::update_filter(&state, &user, id, payload).await?,
    ))
}

#[utoipa::path(
    delete,
    path = "/api/admin/filters/{id}",
    params(("id" = Uuid, Path, description = "Filter ID")),
    responses(
        (status = 200, description = "Delete special filter", body = ApiResponse<serde_json::Value>)
    ),
    security(("bearer_auth" = [])),
    tag = "Merchandising"
)]
pub async fn delete_filter(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<serde_json::Value>>> {
    Ok(Json(banner_service::delete_filter(&state, &user, id).await?))
}
