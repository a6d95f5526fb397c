use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::models::{Operator, Permission};

#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateOperatorRequest {
    pub name: String,
    pub email: String,
    pub password: String,
    #[serde(default)]
    pub is_owner: bool,
    #[serde(default)]
    pub permissions: Vec<Permission>,
}

#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct UpdateOperatorRequest {
    pub name: Option<String>,
    pub password: Option<String>,
    pub is_owner: Option<bool>,
    pub permissions: Option<Vec<Permission>>,
    pub is_active: Option<bool>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct OperatorList {
    pub items: Vec<Operator>,
}
