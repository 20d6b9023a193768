//! Billing rate resolution for retainer overage.
//!
//! Search order, first match wins:
//! 1. customer-scoped rates (no project) effective on the date, member-agnostic
//!    rates ahead of member-specific ones;
//! 2. the organization default (no member, project or customer);
//! 3. nothing.
//!
//! Among equally ranked rates the storage order (insertion order) is kept; no further
//! ranking is applied.

use crate::{
    entities::{BillingRate, billing_rate},
    errors::Result,
};
use chrono::NaiveDate;
use rust_decimal::Decimal;
use sea_orm::{QueryOrder, prelude::*};

/// Where a resolved rate came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateSource {
    Customer,
    Organization,
}

/// An hourly rate together with the currency it is denominated in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedRate {
    pub rate_id: i64,
    pub hourly_rate: Decimal,
    pub currency: String,
    pub source: RateSource,
}

impl From<(billing_rate::Model, RateSource)> for ResolvedRate {
    fn from((rate, source): (billing_rate::Model, RateSource)) -> Self {
        Self {
            rate_id: rate.id,
            hourly_rate: rate.hourly_rate,
            currency: rate.currency,
            source,
        }
    }
}

/// Rates scoped to a customer but not to any project, in insertion order.
/// Includes member-specific rates.
pub async fn find_customer_rates<C>(db: &C, customer_id: i64) -> Result<Vec<billing_rate::Model>>
where
    C: ConnectionTrait,
{
    BillingRate::find()
        .filter(billing_rate::Column::CustomerId.eq(customer_id))
        .filter(billing_rate::Column::ProjectId.is_null())
        .order_by_asc(billing_rate::Column::Id)
        .all(db)
        .await
        .map_err(Into::into)
}

/// Organization-wide default rates, in insertion order.
pub async fn find_default_rates<C>(db: &C) -> Result<Vec<billing_rate::Model>>
where
    C: ConnectionTrait,
{
    BillingRate::find()
        .filter(billing_rate::Column::MemberId.is_null())
        .filter(billing_rate::Column::ProjectId.is_null())
        .filter(billing_rate::Column::CustomerId.is_null())
        .order_by_asc(billing_rate::Column::Id)
        .all(db)
        .await
        .map_err(Into::into)
}

/// Picks the best customer-scoped rate effective on `as_of`. Member-agnostic rates
/// outrank member-specific ones; ties keep input order.
#[must_use]
pub fn pick_customer_rate(
    rates: Vec<billing_rate::Model>,
    as_of: NaiveDate,
) -> Option<billing_rate::Model> {
    rates
        .into_iter()
        .filter(|r| r.is_effective_on(as_of))
        .min_by_key(|r| r.member_id.is_some())
}

/// Resolves the hourly overage rate for a customer on a given date.
///
/// Returns `Ok(None)` when neither a customer rate nor an organization default applies.
pub async fn resolve_overage_rate<C>(
    db: &C,
    customer_id: i64,
    as_of: NaiveDate,
) -> Result<Option<ResolvedRate>>
where
    C: ConnectionTrait,
{
    let customer_rates = find_customer_rates(db, customer_id).await?;
    if let Some(rate) = pick_customer_rate(customer_rates, as_of) {
        return Ok(Some((rate, RateSource::Customer).into()));
    }

    let default_rate = find_default_rates(db)
        .await?
        .into_iter()
        .find(|r| r.is_effective_on(as_of));

    Ok(default_rate.map(|rate| (rate, RateSource::Organization).into()))
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;
    use crate::test_utils::*;
    use rust_decimal_macros::dec;

    #[tokio::test]
    async fn test_no_rates_resolves_to_none() -> Result<()> {
        let db = setup_test_db().await?;
        let customer = create_test_customer(&db, "Acme").await?;

        let rate = resolve_overage_rate(&db, customer.id, date(2026, 3, 1)).await?;
        assert!(rate.is_none());

        Ok(())
    }

    #[tokio::test]
    async fn test_falls_back_to_organization_default() -> Result<()> {
        let db = setup_test_db().await?;
        let customer = create_test_customer(&db, "Acme").await?;
        create_default_rate(&db, dec!(120.00), "USD", date(2025, 1, 1)).await?;

        let rate = resolve_overage_rate(&db, customer.id, date(2026, 3, 1))
            .await?
            .unwrap();
        assert_eq!(rate.hourly_rate, dec!(120.00));
        assert_eq!(rate.currency, "USD");
        assert_eq!(rate.source, RateSource::Organization);

        Ok(())
    }

    #[tokio::test]
    async fn test_member_agnostic_customer_rate_wins() -> Result<()> {
        let db = setup_test_db().await?;
        let customer = create_test_customer(&db, "Acme").await?;
        create_default_rate(&db, dec!(120.00), "USD", date(2025, 1, 1)).await?;
        create_rate(
            &db,
            RateScope::member_for_customer(7, customer.id),
            dec!(180.00),
            "USD",
            date(2025, 1, 1),
            None,
        )
        .await?;
        create_rate(
            &db,
            RateScope::customer(customer.id),
            dec!(150.00),
            "USD",
            date(2025, 1, 1),
            None,
        )
        .await?;

        let rate = resolve_overage_rate(&db, customer.id, date(2026, 3, 1))
            .await?
            .unwrap();
        assert_eq!(rate.hourly_rate, dec!(150.00));
        assert_eq!(rate.source, RateSource::Customer);

        Ok(())
    }

    #[tokio::test]
    async fn test_member_specific_customer_rate_beats_default() -> Result<()> {
        let db = setup_test_db().await?;
        let customer = create_test_customer(&db, "Acme").await?;
        create_default_rate(&db, dec!(120.00), "USD", date(2025, 1, 1)).await?;
        create_rate(
            &db,
            RateScope::member_for_customer(7, customer.id),
            dec!(180.00),
            "USD",
            date(2025, 1, 1),
            None,
        )
        .await?;

        let rate = resolve_overage_rate(&db, customer.id, date(2026, 3, 1))
            .await?
            .unwrap();
        assert_eq!(rate.hourly_rate, dec!(180.00));
        assert_eq!(rate.source, RateSource::Customer);

        Ok(())
    }

    #[tokio::test]
    async fn test_effective_window_is_inclusive() -> Result<()> {
        let db = setup_test_db().await?;
        let customer = create_test_customer(&db, "Acme").await?;
        create_default_rate(&db, dec!(100.00), "USD", date(2025, 1, 1)).await?;
        create_rate(
            &db,
            RateScope::customer(customer.id),
            dec!(150.00),
            "USD",
            date(2026, 1, 1),
            Some(date(2026, 1, 31)),
        )
        .await?;

        let on_last_day = resolve_overage_rate(&db, customer.id, date(2026, 1, 31))
            .await?
            .unwrap();
        assert_eq!(on_last_day.hourly_rate, dec!(150.00));

        let on_first_day = resolve_overage_rate(&db, customer.id, date(2026, 1, 1))
            .await?
            .unwrap();
        assert_eq!(on_first_day.hourly_rate, dec!(150.00));

        let after_expiry = resolve_overage_rate(&db, customer.id, date(2026, 2, 1))
            .await?
            .unwrap();
        assert_eq!(after_expiry.hourly_rate, dec!(100.00));
        assert_eq!(after_expiry.source, RateSource::Organization);

        let before_start = resolve_overage_rate(&db, customer.id, date(2025, 12, 31))
            .await?
            .unwrap();
        assert_eq!(before_start.source, RateSource::Organization);

        Ok(())
    }

    #[tokio::test]
    async fn test_project_scoped_rates_are_ignored() -> Result<()> {
        let db = setup_test_db().await?;
        let customer = create_test_customer(&db, "Acme").await?;
        create_rate(
            &db,
            RateScope {
                member_id: None,
                project_id: Some(3),
                customer_id: Some(customer.id),
            },
            dec!(200.00),
            "USD",
            date(2025, 1, 1),
            None,
        )
        .await?;

        let rate = resolve_overage_rate(&db, customer.id, date(2026, 3, 1)).await?;
        assert!(rate.is_none());

        Ok(())
    }

    #[tokio::test]
    async fn test_ties_keep_insertion_order() -> Result<()> {
        let db = setup_test_db().await?;
        let customer = create_test_customer(&db, "Acme").await?;
        let first = create_rate(
            &db,
            RateScope::customer(customer.id),
            dec!(140.00),
            "USD",
            date(2025, 1, 1),
            None,
        )
        .await?;
        create_rate(
            &db,
            RateScope::customer(customer.id),
            dec!(160.00),
            "USD",
            date(2025, 6, 1),
            None,
        )
        .await?;

        let rate = resolve_overage_rate(&db, customer.id, date(2026, 3, 1))
            .await?
            .unwrap();
        assert_eq!(rate.rate_id, first.id);

        Ok(())
    }
}
