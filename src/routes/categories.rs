use axum::{
    Json, Router,
    extract::{Path, State},
    routing::{get, post, put},
};
use uuid::Uuid;

use crate::{
    dto::categories::{
        CategoryRequest, CategoryTree, SubcategoryRequest, UpdateCategoryRequest,
        UpdateSubcategoryRequest,
    },
    error::AppResult,
    middleware::auth::{AuthUser, ensure_permission},
    models::{Category, Permission, Subcategory},
    response::ApiResponse,
    services::category_service,
    state::AppState,
};

pub fn router() -> Router<AppState> {
    Router::new().route("/", get(list_categories))
}

pub fn admin_router() -> Router<AppState> {
    Router::new()
        .route("/categories", get(admin_list_categories).post(create_category))
        .route(
            "/categories/{id}",
            put(update_category).delete(delete_category),
        )
        .route("/categories/{id}/subcategories", post(create_subcategory))
        .route(
            "/subcategories/{id}",
            put(update_subcategory).delete(delete_subcategory),
        )
}

#[utoipa::path(
    get,
    path = "/api/categories",
    responses(
        (status = 200, description = "Active categories with their subcategories", body = ApiResponse<CategoryTree>)
    ),
    tag = "Categories"
)]
pub async fn list_categories(
    State(state): State<AppState>,
) -> AppResult<Json<ApiResponse<CategoryTree>>> {
    Ok(Json(category_service::list_categories(&state, false).await?))
}

#[utoipa::path(
    get,
    path = "/api/admin/categories",
    responses(
        (status = 200, description = "All categories, inactive included", body = ApiResponse<CategoryTree>)
    ),
    security(("bearer_auth" = [])),
    tag = "Categories"
)]
pub async fn admin_list_categories(
    State(state): State<AppState>,
    user: AuthUser,
) -> AppResult<Json<ApiResponse<CategoryTree>>> {
    ensure_permission(&user, Permission::Categories)?;
    Ok(Json(category_service::list_categories(&state, true).await?))
}

#[utoipa::path(
    post,
    path = "/api/admin/categories",
    request_body = CategoryRequest,
    responses(
        (status = 200, description = "Create category", body = ApiResponse<Category>),
        (status = 409, description = "Slug already used")
    ),
    security(("bearer_auth" = [])),
    tag = "Categories"
)]
pub async fn create_category(
    State(state): State<AppState>,
    user: AuthUser,
    Json(payload): Json<CategoryRequest>,
) -> AppResult<Json<ApiResponse<Category>>> {
    Ok(Json(
        category_service::create_category(&state, &user, payload).await?,
    ))
}

#[utoipa::path(
    put,
    path = "/api/admin/categories/{id}",
    params(("id" = Uuid, Path, description = "Category ID")),
    request_body = UpdateCategoryRequest,
    responses(
        (status = 200, description = "Update category", body = ApiResponse<Category>),
        (status = 404, description = "Category not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Categories"
)]
pub async fn update_category(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateCategoryRequest>,
) -> AppResult<Json<ApiResponse<Category>>> {
    Ok(Json(
        category_service::update_category(&state, &user, id, payload).await?,
    ))
}

#[utoipa::path(
    delete,
    path = "/api/admin/categories/{id}",
    params(("id" = Uuid, Path, description = "Category ID")),
    responses(
        (status = 200, description = "Delete category", body = ApiResponse<serde_json::Value>),
        (status = 409, description = "Category still has products")
    ),
    security(("bearer_auth" = [])),
    tag = "Categories"
)]
pub async fn delete_category(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<serde_json::Value>>> {
    Ok(Json(category_service::delete_category(&state, &user, id).await?))
}

#[utoipa::path(
    post,
    path = "/api/admin/categories/{id}/subcategories",
    params(("id" = Uuid, Path, description = "Category ID")),
    request_body = SubcategoryRequest,
    responses(
        (status = 200, description = "Create subcategory", body = ApiResponse<Subcategory>)
    ),
    security(("bearer_auth" = [])),
    tag = "Categories"
)]
pub async fn create_subcategory(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<SubcategoryRequest>,
) -> AppResult<Json<ApiResponse<Subcategory>>> {
    Ok(Json(
        category_service::create_subcategory(&state, &user, id, payload).await?,
    ))
}

#[utoipa::path(
    put,
    path = "/api/admin/subcategories/{id}",
    params(("id" = Uuid, Path, description = "Subcategory ID")),
    request_body = UpdateSubcategoryRequest,
    responses(
        (status = 200, description = "Update subcategory", body = ApiResponse<Subcategory>),
        (status = 409, description = "Slug already used in the category")
    ),
    security(("bearer_auth" = [])),
    tag = "Categories"
)]
pub async fn update_subcategory(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateSubcategoryRequest>,
) -> AppResult<Json<ApiResponse<Subcategory>>> {
    Ok(Json(
        category_service::update_subcategory(&state, &user, id, payload).await?,
    ))
}

#[utoipa::path(
    delete,
    path = "/api/admin/subcategories/{id}",
    params(("id" = Uuid, Path, description = "Subcategory ID")),
    responses(
        (status = 200, description = "Delete subcategory", body = ApiResponse<serde_json::Value>)
    ),
    security(("bearer_auth" = [])),
    tag = "Categories"
)]
pub async fn delete_subcategory(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<serde_json::Value>>> {
    Ok(Json(
        category_service::delete_subcategory(&state, &user, id).await?,
    ))
}
