//! Append-only trail of back-office mutations and checkouts.

use sea_orm::{ActiveModelTrait, ActiveValue::NotSet, ConnectionTrait, Set};
use serde_json::Value;
use uuid::Uuid;

use crate::{entity::audit_logs::ActiveModel, error::AppResult};

pub async fn insert<C: ConnectionTrait>(
    conn: &C,
    actor_id: Option<Uuid>,
    action: &str,
    resource: &str,
    metadata: Value,
) -> AppResult<()> {
    ActiveModel {
        id: Set(Uuid::new_v4()),
        actor_id: Set(actor_id),
        action: Set(action.to_string()),
        resource: Set(Some(resource.to_string())),
        metadata: Set(Some(metadata)),
        created_at: NotSet,
    }
    .insert(conn)
    .await?;
    Ok(())
}

/// Failures are logged; the caller's request still succeeds.
pub async fn record<C: ConnectionTrait>(
    conn: &C,
    actor_id: Option<Uuid>,
    action: &str,
    resource: &str,
    metadata: Value,
) {
    if let Err(err) = insert(conn, actor_id, action, resource, metadata).await {
        tracing::warn!(error = %err, action, resource, "audit log failed");
    }
}
