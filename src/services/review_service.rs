use uuid::Uuid;

use crate::{
    audit,
    dto::reviews::{CreateReviewRequest, ProductReviews, ReviewList},
    error::{AppError, AppResult},
    middleware::auth::{AuthUser, ensure_customer, ensure_permission},
    models::{Permission, Review, ReviewStatus},
    response::{ApiResponse, Meta},
    routes::params::{Pagination, ReviewListQuery},
    state::AppState,
};

const REVIEW_SELECT: &str = r#"
    SELECT r.id, r.product_id, r.user_id, u.name AS author_name,
           r.rating, r.comment, r.status, r.created_at
    FROM reviews r
    JOIN users u ON u.id = r.user_id
"#;

pub fn validate_review(payload: &CreateReviewRequest) -> AppResult<()> {
    if !(1..=5).contains(&payload.rating) {
        return Err(AppError::BadRequest("rating must be between 1 and 5".into()));
    }
    if payload.comment.trim().is_empty() {
        return Err(AppError::BadRequest("comment is required".into()));
    }
    if payload.comment.chars().count() > 2000 {
        return Err(AppError::BadRequest("comment is too long".into()));
    }
    Ok(())
}

pub async fn create_review(
    state: &AppState,
    user: &AuthUser,
    product_id: Uuid,
    payload: CreateReviewRequest,
) -> AppResult<ApiResponse<Review>> {
    ensure_customer(user)?;
    validate_review(&payload)?;

    let product: Option<(Uuid,)> =
        sqlx::query_as("SELECT id FROM products WHERE id = $1 AND is_active")
            .bind(product_id)
            .fetch_optional(&state.pool)
            .await?;
    if product.is_none() {
        return Err(AppError::NotFound);
    }

    let inserted: Option<(Uuid,)> = sqlx::query_as(
        r#"
        INSERT INTO reviews (id, product_id, user_id, rating, comment, status)
        VALUES ($1, $2, $3, $4, $5, $6)
        ON CONFLICT (product_id, user_id) DO NOTHING
        RETURNING id
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(product_id)
    .bind(user.user_id)
    .bind(payload.rating)
    .bind(payload.comment.trim())
    .bind(ReviewStatus::Pending.as_str())
    .fetch_optional(&state.pool)
    .await?;

    let Some((id,)) = inserted else {
        return Err(AppError::Conflict(
            "you already reviewed this product".into(),
        ));
    };

    let review = sqlx::query_as::<_, Review>(&format!("{REVIEW_SELECT} WHERE r.id = $1"))
        .bind(id)
        .fetch_one(&state.pool)
        .await?;

    audit::record(
        &state.orm,
        Some(user.user_id),
        "review_create",
        "reviews",
        serde_json::json!({ "review_id": id, "product_id": product_id }),
    )
    .await;

    Ok(ApiResponse::success(
        "Review submitted for approval",
        review,
        Some(Meta::empty()),
    ))
}

pub async fn list_product_reviews(
    state: &AppState,
    product_id: Uuid,
    pagination: Pagination,
) -> AppResult<ApiResponse<ProductReviews>> {
    let (page, limit, offset) = pagination.normalize();
    let items = sqlx::query_as::<_, Review>(&format!(
        "{REVIEW_SELECT} WHERE r.product_id = $1 AND r.status = $2 \
         ORDER BY r.created_at DESC LIMIT $3 OFFSET $4"
    ))
    .bind(product_id)
    .bind(ReviewStatus::Approved.as_str())
    .bind(limit)
    .bind(offset)
    .fetch_all(&state.pool)
    .await?;

    let (count, average_rating): (i64, Option<f64>) = sqlx::query_as(
        r#"
        SELECT COUNT(*), AVG(rating)::float8
        FROM reviews
        WHERE product_id = $1 AND status = $2
        "#,
    )
    .bind(product_id)
    .bind(ReviewStatus::Approved.as_str())
    .fetch_one(&state.pool)
    .await?;

    let meta = Meta::new(page, limit, count);
    Ok(ApiResponse::success(
        "Reviews",
        ProductReviews {
            items,
            average_rating: average_rating.map(|avg| (avg * 10.0).round() / 10.0),
            count,
        },
        Some(meta),
    ))
}

pub async fn admin_list_reviews(
    state: &AppState,
    user: &AuthUser,
    query: ReviewListQuery,
) -> AppResult<ApiResponse<ReviewList>> {
    ensure_permission(user, Permission::Reviews)?;
    let (page, limit, offset) = Pagination {
        page: query.page,
        per_page: query.per_page,
    }
    .normalize();
    let status = query.status.map(|s| s.as_str());

    let items = sqlx::query_as::<_, Review>(&format!(
        "{REVIEW_SELECT} WHERE ($1::text IS NULL OR r.status = $1) \
         ORDER BY r.created_at DESC LIMIT $2 OFFSET $3"
    ))
    .bind(status)
    .bind(limit)
    .bind(offset)
    .fetch_all(&state.pool)
    .await?;

    let total: (i64,) =
        sqlx::query_as("SELECT COUNT(*) FROM reviews WHERE ($1::text IS NULL OR status = $1)")
            .bind(status)
            .fetch_one(&state.pool)
            .await?;

    let meta = Meta::new(page, limit, total.0);
    Ok(ApiResponse::success("Reviews", ReviewList { items }, Some(meta)))
}

pub async fn approve_review(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
) -> AppResult<ApiResponse<Review>> {
    ensure_permission(user, Permission::Reviews)?;
    let result = sqlx::query("UPDATE reviews SET status = $2, updated_at = now() WHERE id = $1")
        .bind(id)
        .bind(ReviewStatus::Approved.as_str())
        .execute(&state.pool)
        .await?;
    if result.rows_affected() == 0 {
        return Err(AppError::NotFound);
    }

    let review = sqlx::query_as::<_, Review>(&format!("{REVIEW_SELECT} WHERE r.id = $1"))
        .bind(id)
        .fetch_one(&state.pool)
        .await?;

    audit::record(
        &state.orm,
        Some(user.user_id),
        "review_approve",
        "reviews",
        serde_json::json!({ "review_id": id }),
    )
    .await;

    Ok(ApiResponse::success("Approved", review, Some(Meta::empty())))
}

pub async fn delete_review(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
) -> AppResult<ApiResponse<serde_json::Value>> {
    ensure_permission(user, Permission::Reviews)?;
    let result = sqlx::query("DELETE FROM reviews WHERE id = $1")
        .bind(id)
        .execute(&state.pool)
        .await?;
    if result.rows_affected() == 0 {
        return Err(AppError::NotFound);
    }

    audit::record(
        &state.orm,
        Some(user.user_id),
        "review_delete",
        "reviews",
        serde_json::json!({ "review_id": id }),
    )
    .await;

    Ok(ApiResponse::success(
        "Deleted",
        serde_json::json!({}),
        Some(Meta::empty()),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(rating: i32, comment: &str) -> CreateReviewRequest {
        CreateReviewRequest {
            rating,
            comment: comment.into(),
        }
    }

    #[test]
    fn rating_must_be_one_to_five() {
        assert!(validate_review(&request(0, "ok")).is_err());
        assert!(validate_review(&request(6, "ok")).is_err());
        assert!(validate_review(&request(5, "Excelente calce")).is_ok());
    }

    #[test]
    fn comment_is_required() {
        assert!(validate_review(&request(4, "   ")).is_err());
    }
}
