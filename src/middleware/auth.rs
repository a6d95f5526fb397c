use axum::{extract::FromRequestParts, http::header};
use jsonwebtoken::{DecodingKey, Validation, decode};
use uuid::Uuid;

use crate::{dto::auth::Claims, error::AppError, models::Permission, state::AppState};

pub const ROLE_CUSTOMER: &str = "customer";
pub const ROLE_OPERATOR: &str = "operator";

#[derive(Debug, Clone)]
pub struct AuthUser {
    pub user_id: Uuid,
    pub role: String,
    pub is_owner: bool,
    pub permissions: Vec<Permission>,
}

impl AuthUser {
    pub fn customer(user_id: Uuid) -> Self {
        Self {
            user_id,
            role: ROLE_CUSTOMER.to_string(),
            is_owner: false,
            permissions: Vec::new(),
        }
    }

    pub fn operator(user_id: Uuid, is_owner: bool, permissions: Vec<Permission>) -> Self {
        Self {
            user_id,
            role: ROLE_OPERATOR.to_string(),
            is_owner,
            permissions,
        }
    }

    pub fn has_permission(&self, permission: Permission) -> bool {
        self.role == ROLE_OPERATOR && (self.is_owner || self.permissions.contains(&permission))
    }
}

pub fn ensure_role(user: &AuthUser, role: &str) -> Result<(), AppError> {
    if user.role != role {
        return Err(AppError::Forbidden);
    }
    Ok(())
}

pub fn ensure_customer(user: &AuthUser) -> Result<(), AppError> {
    ensure_role(user, ROLE_CUSTOMER)
}

pub fn ensure_permission(user: &AuthUser, permission: Permission) -> Result<(), AppError> {
    if !user.has_permission(permission) {
        return Err(AppError::Forbidden);
    }
    Ok(())
}

impl FromRequestParts<AppState> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut axum::http::request::Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let auth_header = parts
            .headers
            .get(header::AUTHORIZATION)
            .ok_or(AppError::Unauthorized)?;

        let auth_str = auth_header
            .to_str()
            .map_err(|_| AppError::BadRequest("Invalid Authorization header".into()))?;

        let token = auth_str
            .strip_prefix("Bearer ")
            .ok_or_else(|| AppError::BadRequest("Invalid Authorization scheme".into()))?
            .trim();

        let decoded = decode::<Claims>(
            token,
            &DecodingKey::from_secret(state.config.jwt_secret.as_bytes()),
            &Validation::default(),
        )
        .map_err(|_| AppError::Unauthorized)?;

        let user_id = Uuid::parse_str(&decoded.claims.sub)
            .map_err(|_| AppError::BadRequest("Invalid user id in token".into()))?;

        Ok(AuthUser {
            user_id,
            role: decoded.claims.role,
            is_owner: decoded.claims.owner,
            permissions: decoded.claims.perms,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn owner_has_every_permission() {
        let owner = AuthUser::operator(Uuid::new_v4(), true, Vec::new());
        assert!(Permission::ALL.iter().all(|p| owner.has_permission(*p)));
    }

    #[test]
    fn operator_limited_to_granted_modules() {
        let op = AuthUser::operator(Uuid::new_v4(), false, vec![Permission::Orders]);
        assert!(ensure_permission(&op, Permission::Orders).is_ok());
        assert!(matches!(
            ensure_permission(&op, Permission::Debts),
            Err(AppError::Forbidden)
        ));
    }

    #[test]
    fn customers_never_pass_permission_checks() {
        let customer = AuthUser::customer(Uuid::new_v4());
        assert!(ensure_permission(&customer, Permission::Products).is_err());
        assert!(ensure_customer(&customer).is_ok());
    }
}
