use sea_orm::{
    ActiveModelTrait, ActiveValue::NotSet, ColumnTrait, EntityTrait, PaginatorTrait, QueryFilter,
    QueryOrder, Set,
};
use uuid::Uuid;

use crate::{
    audit,
    dto::categories::{
        CategoryRequest, CategoryTree, SubcategoryRequest, UpdateCategoryRequest,
        UpdateSubcategoryRequest,
    },
    entity::{
        categories::{ActiveModel as CategoryActive, Column as CategoryCol, Entity as Categories},
        products::{Column as ProdCol, Entity as Products},
        subcategories::{
            ActiveModel as SubcategoryActive, Column as SubcategoryCol, Entity as Subcategories,
        },
    },
    error::{AppError, AppResult},
    middleware::auth::{AuthUser, ensure_permission},
    models::{Category, Permission, Subcategory},
    response::{ApiResponse, Meta},
    services::slugify,
    state::AppState,
};

pub async fn list_categories(
    state: &AppState,
    include_inactive: bool,
) -> AppResult<ApiResponse<CategoryTree>> {
    let mut finder = Categories::find();
    if !include_inactive {
        finder = finder.filter(CategoryCol::IsActive.eq(true));
    }
    let categories = finder
        .order_by_asc(CategoryCol::Position)
        .order_by_asc(CategoryCol::Name)
        .all(&state.orm)
        .await?;

    let ids: Vec<Uuid> = categories.iter().map(|c| c.id).collect();
    let mut subcategories = Subcategories::find()
        .filter(SubcategoryCol::CategoryId.is_in(ids))
        .order_by_asc(SubcategoryCol::Position)
        .order_by_asc(SubcategoryCol::Name)
        .all(&state.orm)
        .await?;

    let items: Vec<Category> = categories
        .into_iter()
        .map(|category| {
            let (children, rest): (Vec<_>, Vec<_>) = std::mem::take(&mut subcategories)
                .into_iter()
                .partition(|s| s.category_id == category.id);
            subcategories = rest;
            Category::from_entity(category, children)
        })
        .collect();

    let total = items.len() as i64;
    Ok(ApiResponse::success(
        "Categories",
        CategoryTree { items },
        Some(Meta::new(1, total, total)),
    ))
}

pub async fn create_category(
    state: &AppState,
    user: &AuthUser,
    payload: CategoryRequest,
) -> AppResult<ApiResponse<Category>> {
    ensure_permission(user, Permission::Categories)?;
    let slug = resolve_slug(payload.slug.as_deref(), &payload.name)?;
    ensure_category_slug_free(state, &slug, None).await?;

    let category = CategoryActive {
        id: Set(Uuid::new_v4()),
        name: Set(payload.name.trim().to_string()),
        slug: Set(slug),
        position: Set(payload.position.unwrap_or(0)),
        is_active: Set(payload.is_active.unwrap_or(true)),
        created_at: NotSet,
    }
    .insert(&state.orm)
    .await?;

    audit::record(
        &state.orm,
        Some(user.user_id),
        "category_create",
        "categories",
        serde_json::json!({ "category_id": category.id }),
    )
    .await;

    Ok(ApiResponse::success(
        "Category created",
        Category::from_entity(category, Vec::new()),
        Some(Meta::empty()),
    ))
}

pub async fn update_category(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
    payload: UpdateCategoryRequest,
) -> AppResult<ApiResponse<Category>> {
    ensure_permission(user, Permission::Categories)?;
    let existing = Categories::find_by_id(id)
        .one(&state.orm)
        .await?
        .ok_or(AppError::NotFound)?;

    let mut active: CategoryActive = existing.into();
    if let Some(slug) = payload.slug.as_deref() {
        let slug = resolve_slug(Some(slug), "")?;
        ensure_category_slug_free(state, &slug, Some(id)).await?;
        active.slug = Set(slug);
    }
    if let Some(name) = payload.name {
        active.name = Set(name.trim().to_string());
    }
    if let Some(position) = payload.position {
        active.position = Set(position);
    }
    if let Some(is_active) = payload.is_active {
        active.is_active = Set(is_active);
    }
    let category = active.update(&state.orm).await?;

    let children = Subcategories::find()
        .filter(SubcategoryCol::CategoryId.eq(id))
        .order_by_asc(SubcategoryCol::Position)
        .all(&state.orm)
        .await?;

    audit::record(
        &state.orm,
        Some(user.user_id),
        "category_update",
        "categories",
        serde_json::json!({ "category_id": id }),
    )
    .await;

    Ok(ApiResponse::success(
        "Updated",
        Category::from_entity(category, children),
        Some(Meta::empty()),
    ))
}

pub async fn delete_category(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
) -> AppResult<ApiResponse<serde_json::Value>> {
    ensure_permission(user, Permission::Categories)?;
    let products = Products::find()
        .filter(ProdCol::CategoryId.eq(id))
        .count(&state.orm)
        .await?;
    if products > 0 {
        return Err(AppError::Conflict(format!(
            "category still has {products} products"
        )));
    }

    let result = Categories::delete_by_id(id).exec(&state.orm).await?;
    if result.rows_affected == 0 {
        return Err(AppError::NotFound);
    }

    audit::record(
        &state.orm,
        Some(user.user_id),
        "category_delete",
        "categories",
        serde_json::json!({ "category_id": id }),
    )
    .await;

    Ok(ApiResponse::success(
        "Deleted",
        serde_json::json!({}),
        Some(Meta::empty()),
    ))
}

pub async fn create_subcategory(
    state: &AppState,
    user: &AuthUser,
    category_id: Uuid,
    payload: SubcategoryRequest,
) -> AppResult<ApiResponse<Subcategory>> {
    ensure_permission(user, Permission::Categories)?;
    Categories::find_by_id(category_id)
        .one(&state.orm)
        .await?
        .ok_or(AppError::NotFound)?;

    let slug = resolve_slug(payload.slug.as_deref(), &payload.name)?;
    ensure_subcategory_slug_free(state, category_id, &slug, None).await?;

    let subcategory = SubcategoryActive {
        id: Set(Uuid::new_v4()),
        category_id: Set(category_id),
        name: Set(payload.name.trim().to_string()),
        slug: Set(slug),
        position: Set(payload.position.unwrap_or(0)),
        created_at: NotSet,
    }
    .insert(&state.orm)
    .await?;

    audit::record(
        &state.orm,
        Some(user.user_id),
        "subcategory_create",
        "subcategories",
        serde_json::json!({ "subcategory_id": subcategory.id, "category_id": category_id }),
    )
    .await;

    Ok(ApiResponse::success(
        "Subcategory created",
        Subcategory::from(subcategory),
        Some(Meta::empty()),
    ))
}

pub async fn update_subcategory(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
    payload: UpdateSubcategoryRequest,
) -> AppResult<ApiResponse<Subcategory>> {
    ensure_permission(user, Permission::Categories)?;
    let existing = Subcategories::find_by_id(id)
        .one(&state.orm)
        .await?
        .ok_or(AppError::NotFound)?;

    let category_id = existing.category_id;
    let mut active: SubcategoryActive = existing.into();
    if let Some(slug) = payload.slug.as_deref() {
        let slug = resolve_slug(Some(slug), "")?;
        ensure_subcategory_slug_free(state, category_id, &slug, Some(id)).await?;
        active.slug = Set(slug);
    }
    if let Some(name) = payload.name {
        if name.trim().is_empty() {
            return Err(AppError::BadRequest("name cannot be empty".into()));
        }
        active.name = Set(name.trim().to_string());
    }
    if let Some(position) = payload.position {
        active.position = Set(position);
    }
    let subcategory = active.update(&state.orm).await?;

    audit::record(
        &state.orm,
        Some(user.user_id),
        "subcategory_update",
        "subcategories",
        serde_json::json!({ "subcategory_id": id, "category_id": category_id }),
    )
    .await;

    Ok(ApiResponse::success(
        "Updated",
        Subcategory::from(subcategory),
        Some(Meta::empty()),
    ))
}

pub async fn delete_subcategory(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
) -> AppResult<ApiResponse<serde_json::Value>> {
    ensure_permission(user, Permission::Categories)?;
    let result = Subcategories::delete_by_id(id).exec(&state.orm).await?;
    if result.rows_affected == 0 {
        return Err(AppError::NotFound);
    }

    audit::record(
        &state.orm,
        Some(user.user_id),
        "subcategory_delete",
        "subcategories",
        serde_json::json!({ "subcategory_id": id }),
    )
    .await;

    Ok(ApiResponse::success(
        "Deleted",
        serde_json::json!({}),
        Some(Meta::empty()),
    ))
}

fn resolve_slug(explicit: Option<&str>, name: &str) -> AppResult<String> {
    let slug = slugify(explicit.unwrap_or(name));
    if slug.is_empty() {
        return Err(AppError::BadRequest("name or slug is required".into()));
    }
    Ok(slug)
}

async fn ensure_category_slug_free(
    state: &AppState,
    slug: &str,
    except: Option<Uuid>,
) -> AppResult<()> {
    let mut finder = Categories::find().filter(CategoryCol::Slug.eq(slug));
    if let Some(id) = except {
        finder = finder.filter(CategoryCol::Id.ne(id));
    }
    if finder.count(&state.orm).await? > 0 {
        return Err(AppError::Conflict(format!("slug {slug} is already used")));
    }
    Ok(())
}

/// Subcategory slugs are unique within their category.
async fn ensure_subcategory_slug_free(
    state: &AppState,
    category_id: Uuid,
    slug: &str,
    except: Option<Uuid>,
) -> AppResult<()> {
    let mut finder = Subcategories::find()
        .filter(SubcategoryCol::CategoryId.eq(category_id))
        .filter(SubcategoryCol::Slug.eq(slug));
    if let Some(id) = except {
        finder = finder.filter(SubcategoryCol::Id.ne(id));
    }
    if finder.count(&state.orm).await? > 0 {
        return Err(AppError::Conflict(format!("slug {slug} is already used")));
    }
    Ok(())
}
