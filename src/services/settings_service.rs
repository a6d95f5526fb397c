use chrono::Utc;
use sea_orm::{
    ConnectionTrait, EntityTrait, Set,
    sea_query::OnConflict,
};

use crate::{
    audit,
    entity::site_settings::{ActiveModel, Column, Entity as SiteSettingsTable},
    error::{AppError, AppResult},
    middleware::auth::{AuthUser, ensure_permission},
    models::{Permission, SiteSettings},
    response::{ApiResponse, Meta},
    state::AppState,
};

const SETTINGS_KEY: &str = "site";

/// Stored settings, falling back to defaults for a fresh store.
pub async fn load_settings<C: ConnectionTrait>(conn: &C) -> AppResult<SiteSettings> {
    let row = SiteSettingsTable::find_by_id(SETTINGS_KEY.to_string())
        .one(conn)
        .await?;
    Ok(match row {
        Some(row) => serde_json::from_value(row.value).unwrap_or_else(|err| {
            tracing::warn!(error = %err, "stored site settings are malformed, using defaults");
            SiteSettings::default()
        }),
        None => SiteSettings::default(),
    })
}

pub fn validate_settings(settings: &SiteSettings) -> AppResult<()> {
    if settings.shipping_cost < 0 || settings.free_shipping_threshold < 0 {
        return Err(AppError::BadRequest(
            "shipping amounts cannot be negative".into(),
        ));
    }
    if !(0..=99).contains(&settings.transfer_discount_percent) {
        return Err(AppError::BadRequest(
            "transfer discount must be between 0 and 99".into(),
        ));
    }
    Ok(())
}

pub async fn save_settings<C: ConnectionTrait>(conn: &C, settings: &SiteSettings) -> AppResult<()> {
    let value = serde_json::to_value(settings).map_err(anyhow::Error::from)?;
    let row = ActiveModel {
        key: Set(SETTINGS_KEY.to_string()),
        value: Set(value),
        updated_at: Set(Utc::now().into()),
    };
    SiteSettingsTable::insert(row)
        .on_conflict(
            OnConflict::column(Column::Key)
                .update_columns([Column::Value, Column::UpdatedAt])
                .to_owned(),
        )
        .exec(conn)
        .await?;
    Ok(())
}

pub async fn get_settings(state: &AppState) -> AppResult<ApiResponse<SiteSettings>> {
    let settings = load_settings(&state.orm).await?;
    Ok(ApiResponse::success("Settings", settings, None))
}

pub async fn update_settings(
    state: &AppState,
    user: &AuthUser,
    settings: SiteSettings,
) -> AppResult<ApiResponse<SiteSettings>> {
    ensure_permission(user, Permission::Settings)?;
    validate_settings(&settings)?;
    save_settings(&state.orm, &settings).await?;

    audit::record(
        &state.orm,
        Some(user.user_id),
        "settings_update",
        "site_settings",
        serde_json::to_value(&settings).unwrap_or_default(),
    )
    .await;

    Ok(ApiResponse::success("Settings saved", settings, Some(Meta::empty())))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        assert!(validate_settings(&SiteSettings::default()).is_ok());
    }

    #[test]
    fn rejects_negative_shipping_and_large_discounts() {
        let settings = SiteSettings {
            shipping_cost: -1,
            ..SiteSettings::default()
        };
        assert!(validate_settings(&settings).is_err());

        let settings = SiteSettings {
            transfer_discount_percent: 100,
            ..SiteSettings::default()
        };
        assert!(validate_settings(&settings).is_err());
    }

    #[test]
    fn partial_json_fills_defaults() {
        let settings: SiteSettings =
            serde_json::from_value(serde_json::json!({ "shipping_cost": 7000 })).unwrap();
        assert_eq!(settings.shipping_cost, 7000);
        assert_eq!(settings.free_shipping_threshold, 80_000);
    }
}
