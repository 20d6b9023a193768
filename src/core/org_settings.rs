//! Organization settings - invoice currency and display name.
//!
//! Settings live in a single row seeded from `retainer.toml` on first start.

use crate::{
    entities::{OrgSettings, org_settings},
    errors::Result,
};
use chrono::Utc;
use sea_orm::{QueryOrder, Set, prelude::*};
use tracing::info;

/// Currency used when the organization has not configured one.
pub const FALLBACK_CURRENCY: &str = "USD";

/// Returns the organization settings row, if one has been created.
pub async fn get_org_settings<C>(db: &C) -> Result<Option<org_settings::Model>>
where
    C: ConnectionTrait,
{
    OrgSettings::find()
        .order_by_asc(org_settings::Column::Id)
        .one(db)
        .await
        .map_err(Into::into)
}

/// The organization's configured currency, or [`FALLBACK_CURRENCY`] when unset or blank.
pub async fn default_currency<C>(db: &C) -> Result<String>
where
    C: ConnectionTrait,
{
    let currency = get_org_settings(db)
        .await?
        .and_then(|s| s.default_currency)
        .map(|c| c.trim().to_uppercase())
        .filter(|c| !c.is_empty());
    Ok(currency.unwrap_or_else(|| FALLBACK_CURRENCY.to_string()))
}

/// The organization's display name, empty when no settings exist.
pub async fn organization_name<C>(db: &C) -> Result<String>
where
    C: ConnectionTrait,
{
    Ok(get_org_settings(db)
        .await?
        .map(|s| s.organization_name)
        .unwrap_or_default())
}

/// Creates the settings row from configuration if none exists yet.
///
/// Returns `true` when a row was inserted. Existing settings are never overwritten, so
/// edits made after the first start survive restarts.
pub async fn seed_org_settings<C>(
    db: &C,
    organization_name: &str,
    default_currency: Option<&str>,
) -> Result<bool>
where
    C: ConnectionTrait,
{
    if get_org_settings(db).await?.is_some() {
        return Ok(false);
    }

    org_settings::ActiveModel {
        organization_name: Set(organization_name.to_string()),
        default_currency: Set(default_currency.map(str::to_uppercase)),
        updated_at: Set(Utc::now()),
        ..Default::default()
    }
    .insert(db)
    .await?;

    info!(organization_name, ?default_currency, "Seeded organization settings");
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::*;

    #[tokio::test]
    async fn test_default_currency_falls_back_when_unset() -> Result<()> {
        let db = setup_test_db().await?;
        assert_eq!(default_currency(&db).await?, FALLBACK_CURRENCY);

        seed_org_settings(&db, "Studio", None).await?;
        assert_eq!(default_currency(&db).await?, FALLBACK_CURRENCY);

        Ok(())
    }

    #[tokio::test]
    async fn test_seed_is_idempotent() -> Result<()> {
        let db = setup_test_db().await?;

        assert!(seed_org_settings(&db, "Studio", Some("eur")).await?);
        assert!(!seed_org_settings(&db, "Other", Some("GBP")).await?);

        assert_eq!(default_currency(&db).await?, "EUR");
        assert_eq!(organization_name(&db).await?, "Studio");
        assert_eq!(OrgSettings::find().count(&db).await?, 1);

        Ok(())
    }
}
