use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ActiveValue::NotSet, ColumnTrait, EntityTrait, PaginatorTrait, QueryFilter,
    QueryOrder, Set,
};
use uuid::Uuid;

use crate::{
    audit,
    dto::{
        auth::{LoginRequest, LoginResponse},
        operators::{CreateOperatorRequest, OperatorList, UpdateOperatorRequest},
    },
    entity::operators::{ActiveModel as OperatorActive, Column as OperatorCol, Entity as Operators},
    error::{AppError, AppResult},
    middleware::auth::{AuthUser, ensure_permission},
    models::{Operator, Permission, permissions_from_json, permissions_to_json},
    response::{ApiResponse, Meta},
    services::auth_service::{hash_password, issue_token, verify_password},
    state::AppState,
};

pub async fn login_operator(
    state: &AppState,
    payload: LoginRequest,
) -> AppResult<ApiResponse<LoginResponse>> {
    let email = payload.email.trim().to_lowercase();
    let operator = Operators::find()
        .filter(OperatorCol::Email.eq(email))
        .one(&state.orm)
        .await?;

    let operator = match operator {
        Some(o) if o.is_active => o,
        _ => return Err(AppError::BadRequest("Invalid email or password".into())),
    };

    if !verify_password(&payload.password, &operator.password_hash)? {
        return Err(AppError::BadRequest("Invalid email or password".into()));
    }

    let auth = AuthUser::operator(
        operator.id,
        operator.is_owner,
        permissions_from_json(&operator.permissions),
    );
    let resp = issue_token(&state.config, &auth)?;

    audit::record(
        &state.orm,
        Some(operator.id),
        "operator_login",
        "operators",
        serde_json::json!({ "operator_id": operator.id }),
    )
    .await;

    Ok(ApiResponse::success("Logged in", resp, Some(Meta::empty())))
}

pub async fn list_operators(
    state: &AppState,
    user: &AuthUser,
) -> AppResult<ApiResponse<OperatorList>> {
    ensure_permission(user, Permission::Operators)?;
    let items: Vec<Operator> = Operators::find()
        .order_by_asc(OperatorCol::Name)
        .all(&state.orm)
        .await?
        .into_iter()
        .map(Operator::from)
        .collect();
    let total = items.len() as i64;
    Ok(ApiResponse::success(
        "Operators",
        OperatorList { items },
        Some(Meta::new(1, total, total)),
    ))
}

pub async fn create_operator(
    state: &AppState,
    user: &AuthUser,
    payload: CreateOperatorRequest,
) -> AppResult<ApiResponse<Operator>> {
    ensure_permission(user, Permission::Operators)?;
    if payload.is_owner && !user.is_owner {
        return Err(AppError::Forbidden);
    }
    if payload.password.len() < 8 {
        return Err(AppError::BadRequest(
            "password must be at least 8 characters".into(),
        ));
    }
    let email = payload.email.trim().to_lowercase();
    let exists = Operators::find()
        .filter(OperatorCol::Email.eq(email.as_str()))
        .one(&state.orm)
        .await?;
    if exists.is_some() {
        return Err(AppError::Conflict("Email is already taken".into()));
    }

    let operator = OperatorActive {
        id: Set(Uuid::new_v4()),
        name: Set(payload.name.trim().to_string()),
        email: Set(email),
        password_hash: Set(hash_password(&payload.password)?),
        is_owner: Set(payload.is_owner),
        permissions: Set(permissions_to_json(&payload.permissions)),
        is_active: Set(true),
        created_at: NotSet,
        updated_at: NotSet,
    }
    .insert(&state.orm)
    .await?;

    audit::record(
        &state.orm,
        Some(user.user_id),
        "operator_create",
        "operators",
        serde_json::json!({ "operator_id": operator.id }),
    )
    .await;

    Ok(ApiResponse::success(
        "Operator created",
        Operator::from(operator),
        Some(Meta::empty()),
    ))
}

pub async fn update_operator(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
    payload: UpdateOperatorRequest,
) -> AppResult<ApiResponse<Operator>> {
    ensure_permission(user, Permission::Operators)?;
    let existing = Operators::find_by_id(id)
        .one(&state.orm)
        .await?
        .ok_or(AppError::NotFound)?;

    let changes_access = payload.permissions.is_some()
        || payload.is_active.is_some()
        || payload.is_owner.is_some();
    if id == user.user_id && changes_access && !user.is_owner {
        return Err(AppError::Forbidden);
    }
    let touches_owner = existing.is_owner || payload.is_owner == Some(true);
    if touches_owner && !user.is_owner {
        return Err(AppError::Forbidden);
    }
    let loses_owner = existing.is_owner
        && (payload.is_owner == Some(false) || payload.is_active == Some(false));
    if loses_owner {
        ensure_other_owner(state, id).await?;
    }

    let mut active: OperatorActive = existing.into();
    if let Some(name) = payload.name {
        active.name = Set(name.trim().to_string());
    }
    if let Some(password) = payload.password {
        if password.len() < 8 {
            return Err(AppError::BadRequest(
                "password must be at least 8 characters".into(),
            ));
        }
        active.password_hash = Set(hash_password(&password)?);
    }
    if let Some(is_owner) = payload.is_owner {
        active.is_owner = Set(is_owner);
    }
    if let Some(permissions) = payload.permissions {
        active.permissions = Set(permissions_to_json(&permissions));
    }
    if let Some(is_active) = payload.is_active {
        active.is_active = Set(is_active);
    }
    active.updated_at = Set(Utc::now().into());
    let operator = active.update(&state.orm).await?;

    audit::record(
        &state.orm,
        Some(user.user_id),
        "operator_update",
        "operators",
        serde_json::json!({ "operator_id": operator.id }),
    )
    .await;

    Ok(ApiResponse::success(
        "Operator updated",
        Operator::from(operator),
        Some(Meta::empty()),
    ))
}

pub async fn delete_operator(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
) -> AppResult<ApiResponse<serde_json::Value>> {
    ensure_permission(user, Permission::Operators)?;
    if id == user.user_id {
        return Err(AppError::BadRequest("operators cannot delete themselves".into()));
    }
    let existing = Operators::find_by_id(id)
        .one(&state.orm)
        .await?
        .ok_or(AppError::NotFound)?;
    if existing.is_owner {
        if !user.is_owner {
            return Err(AppError::Forbidden);
        }
        ensure_other_owner(state, id).await?;
    }

    Operators::delete_by_id(id).exec(&state.orm).await?;

    audit::record(
        &state.orm,
        Some(user.user_id),
        "operator_delete",
        "operators",
        serde_json::json!({ "operator_id": id }),
    )
    .await;

    Ok(ApiResponse::success(
        "Deleted",
        serde_json::json!({}),
        Some(Meta::empty()),
    ))
}

/// The panel must always keep one active owner.
async fn ensure_other_owner(state: &AppState, excluding: Uuid) -> AppResult<()> {
    let owners = Operators::find()
        .filter(OperatorCol::IsOwner.eq(true))
        .filter(OperatorCol::IsActive.eq(true))
        .filter(OperatorCol::Id.ne(excluding))
        .count(&state.orm)
        .await?;
    check_remaining_owners(owners)
}

fn check_remaining_owners(owners: u64) -> AppResult<()> {
    if owners == 0 {
        return Err(AppError::Conflict("cannot remove the last owner".into()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn last_owner_cannot_be_removed() {
        assert!(matches!(check_remaining_owners(0), Err(AppError::Conflict(_))));
        assert!(check_remaining_owners(1).is_ok());
    }
}
