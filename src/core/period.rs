//! Retainer period ledger - opening periods, recording consumption, freezing on close.
//!
//! Writes that change an open period are guarded by `status = 'OPEN'` in the UPDATE
//! itself, so a period closed between read and write is never modified.

use crate::{
    core::{agreement, calendar, money},
    entities::{
        PeriodStatus, RetainerPeriod, RetainerType, retainer_agreement, retainer_period,
    },
    errors::{Error, Result},
};
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use sea_orm::{QueryOrder, QuerySelect, Set, prelude::*, sea_query::Expr};

/// Figures written onto a period when it closes.
#[derive(Debug, Clone, PartialEq)]
pub struct PeriodClose {
    pub consumed_hours: Decimal,
    pub overage_hours: Decimal,
    pub rollover_hours_out: Decimal,
    pub invoice_id: i64,
    pub closed_by: i64,
    pub closed_at: DateTime<Utc>,
}

/// Opens a period for `agreement` starting on `period_start`.
///
/// Hour banks get `agreement.allocated_hours + rollover_in` hours; fixed-fee periods have
/// no allocation. Fails if the agreement already has an open period.
pub async fn open_period<C>(
    db: &C,
    agreement: &retainer_agreement::Model,
    period_start: NaiveDate,
    rollover_in: Decimal,
) -> Result<retainer_period::Model>
where
    C: ConnectionTrait,
{
    if let Some(existing) = find_open_period(db, agreement.id).await? {
        return Err(Error::invalid_state(format!(
            "agreement {} already has open period {}",
            agreement.id, existing.id
        )));
    }

    let rollover_in = money::round2(rollover_in.max(Decimal::ZERO));
    let allocated = match agreement.retainer_type {
        RetainerType::HourBank => agreement
            .allocated_hours
            .map(|base| money::round2(base + rollover_in)),
        RetainerType::FixedFee => None,
    };
    let zero = money::round2(Decimal::ZERO);
    let now = Utc::now();

    retainer_period::ActiveModel {
        agreement_id: Set(agreement.id),
        period_start: Set(period_start),
        period_end: Set(calendar::next_period_end(agreement.frequency, period_start)),
        status: Set(PeriodStatus::Open),
        allocated_hours: Set(allocated),
        base_allocated_hours: Set(agreement.allocated_hours.map(money::round2)),
        rollover_hours_in: Set(rollover_in),
        consumed_hours: Set(zero),
        overage_hours: Set(zero),
        remaining_hours: Set(money::remaining_hours(allocated, zero)),
        rollover_hours_out: Set(zero),
        invoice_id: Set(None),
        closed_at: Set(None),
        closed_by: Set(None),
        created_at: Set(now),
        updated_at: Set(now),
        ..Default::default()
    }
    .insert(db)
    .await
    .map_err(Into::into)
}

/// The agreement's open period, if any.
pub async fn find_open_period<C>(db: &C, agreement_id: i64) -> Result<Option<retainer_period::Model>>
where
    C: ConnectionTrait,
{
    RetainerPeriod::find()
        .filter(retainer_period::Column::AgreementId.eq(agreement_id))
        .filter(retainer_period::Column::Status.eq(PeriodStatus::Open))
        .one(db)
        .await
        .map_err(Into::into)
}

/// Loads the agreement's open period with an exclusive row lock (`SELECT ... FOR UPDATE`)
/// held until the surrounding transaction ends. Backends without row locks (SQLite)
/// ignore the lock clause.
pub async fn lock_open_period<C>(db: &C, agreement_id: i64) -> Result<Option<retainer_period::Model>>
where
    C: ConnectionTrait,
{
    RetainerPeriod::find()
        .filter(retainer_period::Column::AgreementId.eq(agreement_id))
        .filter(retainer_period::Column::Status.eq(PeriodStatus::Open))
        .lock_exclusive()
        .one(db)
        .await
        .map_err(Into::into)
}

/// Finds a period by ID.
pub async fn get_period<C>(db: &C, period_id: i64) -> Result<retainer_period::Model>
where
    C: ConnectionTrait,
{
    RetainerPeriod::find_by_id(period_id)
        .one(db)
        .await?
        .ok_or_else(|| Error::not_found("RetainerPeriod", period_id))
}

/// The agreement's open period. `NotFound` if the agreement does not exist or has no
/// open period.
pub async fn get_current_period<C>(db: &C, agreement_id: i64) -> Result<retainer_period::Model>
where
    C: ConnectionTrait,
{
    agreement::get_agreement(db, agreement_id).await?;
    find_open_period(db, agreement_id)
        .await?
        .ok_or_else(|| no_open_period(agreement_id))
}

/// The agreement's most recent period by start date, open or closed.
pub async fn find_latest_period<C>(
    db: &C,
    agreement_id: i64,
) -> Result<Option<retainer_period::Model>>
where
    C: ConnectionTrait,
{
    RetainerPeriod::find()
        .filter(retainer_period::Column::AgreementId.eq(agreement_id))
        .order_by_desc(retainer_period::Column::PeriodStart)
        .one(db)
        .await
        .map_err(Into::into)
}

/// All periods of an agreement, newest first.
pub async fn list_periods<C>(db: &C, agreement_id: i64) -> Result<Vec<retainer_period::Model>>
where
    C: ConnectionTrait,
{
    agreement::get_agreement(db, agreement_id).await?;
    RetainerPeriod::find()
        .filter(retainer_period::Column::AgreementId.eq(agreement_id))
        .order_by_desc(retainer_period::Column::PeriodStart)
        .all(db)
        .await
        .map_err(Into::into)
}

/// Sets a period's consumed hours, recomputing remaining hours.
///
/// Fails with `InvalidState` on a closed period.
pub async fn update_consumption<C>(
    db: &C,
    period_id: i64,
    consumed_hours: Decimal,
) -> Result<retainer_period::Model>
where
    C: ConnectionTrait,
{
    let period = get_period(db, period_id).await?;
    write_consumption(db, period, consumed_hours).await
}

pub(crate) async fn write_consumption<C>(
    db: &C,
    period: retainer_period::Model,
    consumed_hours: Decimal,
) -> Result<retainer_period::Model>
where
    C: ConnectionTrait,
{
    if period.status == PeriodStatus::Closed {
        return Err(closed_period_error(period.id));
    }

    let consumed = money::round2(consumed_hours.max(Decimal::ZERO));
    let remaining = money::remaining_hours(period.allocated_hours, consumed);
    let now = Utc::now();

    let result = RetainerPeriod::update_many()
        .col_expr(retainer_period::Column::ConsumedHours, Expr::value(consumed))
        .col_expr(retainer_period::Column::RemainingHours, Expr::value(remaining))
        .col_expr(retainer_period::Column::UpdatedAt, Expr::value(now))
        .filter(retainer_period::Column::Id.eq(period.id))
        .filter(retainer_period::Column::Status.eq(PeriodStatus::Open))
        .exec(db)
        .await?;

    if result.rows_affected == 0 {
        return Err(closed_period_error(period.id));
    }

    Ok(retainer_period::Model {
        consumed_hours: consumed,
        remaining_hours: remaining,
        updated_at: now,
        ..period
    })
}

/// Freezes an open period with its close figures.
///
/// The UPDATE only matches while the period is still open; if another close got there
/// first this fails with `ConcurrencyConflict`.
pub(crate) async fn mark_closed<C>(
    db: &C,
    period: retainer_period::Model,
    close: PeriodClose,
) -> Result<retainer_period::Model>
where
    C: ConnectionTrait,
{
    if !period.status.can_transition_to(PeriodStatus::Closed) {
        return Err(closed_period_error(period.id));
    }

    let consumed = money::round2(close.consumed_hours);
    let remaining = money::remaining_hours(period.allocated_hours, consumed);
    let overage = money::round2(close.overage_hours);
    let rollover_out = money::round2(close.rollover_hours_out);

    let result = RetainerPeriod::update_many()
        .col_expr(retainer_period::Column::Status, Expr::value(PeriodStatus::Closed))
        .col_expr(retainer_period::Column::ConsumedHours, Expr::value(consumed))
        .col_expr(retainer_period::Column::RemainingHours, Expr::value(remaining))
        .col_expr(retainer_period::Column::OverageHours, Expr::value(overage))
        .col_expr(retainer_period::Column::RolloverHoursOut, Expr::value(rollover_out))
        .col_expr(retainer_period::Column::InvoiceId, Expr::value(close.invoice_id))
        .col_expr(retainer_period::Column::ClosedBy, Expr::value(close.closed_by))
        .col_expr(retainer_period::Column::ClosedAt, Expr::value(close.closed_at))
        .col_expr(retainer_period::Column::UpdatedAt, Expr::value(close.closed_at))
        .filter(retainer_period::Column::Id.eq(period.id))
        .filter(retainer_period::Column::Status.eq(PeriodStatus::Open))
        .exec(db)
        .await?;

    if result.rows_affected != 1 {
        return Err(Error::ConcurrencyConflict {
            message: format!("period {} was closed concurrently", period.id),
        });
    }

    Ok(retainer_period::Model {
        status: PeriodStatus::Closed,
        consumed_hours: consumed,
        remaining_hours: remaining,
        overage_hours: overage,
        rollover_hours_out: rollover_out,
        invoice_id: Some(close.invoice_id),
        closed_by: Some(close.closed_by),
        closed_at: Some(close.closed_at),
        updated_at: close.closed_at,
        ..period
    })
}

pub(crate) fn no_open_period(agreement_id: i64) -> Error {
    Error::not_found("RetainerPeriod", format!("open period of agreement {agreement_id}"))
}

fn closed_period_error(period_id: i64) -> Error {
    Error::invalid_state(format!("period {period_id} is closed"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::*;
    use rust_decimal_macros::dec;

    #[tokio::test]
    async fn test_update_consumption_recomputes_remaining() -> Result<()> {
        let db = setup_test_db().await?;
        let created = create_hour_bank_agreement(&db).await?;

        let updated = update_consumption(&db, created.first_period.id, dec!(12.5)).await?;
        assert_eq!(updated.consumed_hours, dec!(12.50));
        assert_eq!(updated.remaining_hours, dec!(27.50));

        let over = update_consumption(&db, created.first_period.id, dec!(41)).await?;
        assert_eq!(over.remaining_hours, dec!(0));

        let stored = get_period(&db, created.first_period.id).await?;
        assert_eq!(stored.consumed_hours, dec!(41));
        assert_eq!(stored.remaining_hours, dec!(0));

        Ok(())
    }

    #[tokio::test]
    async fn test_update_consumption_on_fixed_fee_keeps_remaining_zero() -> Result<()> {
        let db = setup_test_db().await?;
        let customer = create_test_customer(&db, "Acme").await?;
        let created = create_test_agreement(&db, fixed_fee_request(customer.id)).await?;

        let updated = update_consumption(&db, created.first_period.id, dec!(30)).await?;
        assert_eq!(updated.consumed_hours, dec!(30));
        assert_eq!(updated.remaining_hours, dec!(0));
        assert!(updated.allocated_hours.is_none());

        Ok(())
    }

    #[tokio::test]
    async fn test_update_consumption_on_closed_period_fails() -> Result<()> {
        let db = setup_test_db().await?;
        let created = create_hour_bank_agreement(&db).await?;
        let closed = mark_closed(
            &db,
            created.first_period.clone(),
            PeriodClose {
                consumed_hours: dec!(10),
                overage_hours: dec!(0),
                rollover_hours_out: dec!(0),
                invoice_id: 1,
                closed_by: 1,
                closed_at: Utc::now(),
            },
        )
        .await?;
        assert_eq!(closed.status, PeriodStatus::Closed);

        let result = update_consumption(&db, closed.id, dec!(20)).await;
        assert!(matches!(result, Err(Error::InvalidState { .. })));

        // A stale open snapshot is rejected by the guarded write as well
        let stale = write_consumption(&db, created.first_period, dec!(20)).await;
        assert!(matches!(stale, Err(Error::InvalidState { .. })));

        let stored = get_period(&db, closed.id).await?;
        assert_eq!(stored.consumed_hours, dec!(10));

        Ok(())
    }

    #[tokio::test]
    async fn test_mark_closed_twice_is_a_conflict() -> Result<()> {
        let db = setup_test_db().await?;
        let created = create_hour_bank_agreement(&db).await?;
        let close = PeriodClose {
            consumed_hours: dec!(10),
            overage_hours: dec!(0),
            rollover_hours_out: dec!(0),
            invoice_id: 1,
            closed_by: 1,
            closed_at: Utc::now(),
        };

        mark_closed(&db, created.first_period.clone(), close.clone()).await?;
        let second = mark_closed(&db, created.first_period, close).await;
        assert!(matches!(second, Err(Error::ConcurrencyConflict { .. })));

        Ok(())
    }

    #[tokio::test]
    async fn test_only_one_open_period_per_agreement() -> Result<()> {
        let db = setup_test_db().await?;
        let created = create_hour_bank_agreement(&db).await?;

        let result = open_period(&db, &created.agreement, date(2026, 2, 1), dec!(0)).await;
        assert!(matches!(result, Err(Error::InvalidState { .. })));

        Ok(())
    }

    #[tokio::test]
    async fn test_get_current_and_list_periods() -> Result<()> {
        let db = setup_test_db().await?;
        let created = create_hour_bank_agreement(&db).await?;

        let current = get_current_period(&db, created.agreement.id).await?;
        assert_eq!(current.id, created.first_period.id);
        assert_eq!(current.period_start, date(2026, 1, 1));
        assert_eq!(current.period_end, date(2026, 2, 1));

        let periods = list_periods(&db, created.agreement.id).await?;
        assert_eq!(periods.len(), 1);

        let missing = get_current_period(&db, 999).await;
        assert!(matches!(
            missing,
            Err(Error::NotFound {
                entity: "RetainerAgreement",
                ..
            })
        ));
        assert!(matches!(
            list_periods(&db, 999).await,
            Err(Error::NotFound { .. })
        ));

        Ok(())
    }
}
