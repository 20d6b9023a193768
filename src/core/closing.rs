//! Period closing engine.
//!
//! Closing a period reconciles its consumption against the time ledger, bills the base
//! fee and any overage on a new draft invoice, freezes the period, and either opens the
//! next period (carrying rollover hours) or terminates an agreement that has reached its
//! end date. Everything happens in one transaction: a failure at any step leaves no
//! trace.
//!
//! Closes for the same agreement are serialized by [`PeriodLocks`]; the lock is taken
//! before the transaction begins and released after it commits or rolls back.

use crate::{
    core::{
        agreement, audit, billing_rate, calendar, consumption, customer, invoice, money,
        notification, org_settings,
        lock::PeriodLocks,
        period::{self, PeriodClose},
    },
    entities::{
        PeriodStatus, RetainerPeriod, RetainerStatus, RetainerType, RolloverPolicy,
        invoice as invoice_entity, invoice_line, retainer_agreement, retainer_period,
    },
    errors::{Error, ErrorKind, Result},
};
use chrono::{NaiveDate, Utc};
use rust_decimal::Decimal;
use sea_orm::{DatabaseConnection, QueryOrder, TransactionTrait, prelude::*};
use serde_json::json;
use std::fmt::Write;
use tracing::{debug, info, instrument, warn};

/// Everything produced by a successful close.
#[derive(Debug, Clone, PartialEq)]
pub struct ClosePeriodResult {
    pub closed_period: retainer_period::Model,
    pub invoice: invoice_entity::Model,
    pub invoice_lines: Vec<invoice_line::Model>,
    /// `None` when the agreement is paused or has reached its end date
    pub next_period: Option<retainer_period::Model>,
    /// The agreement as it stands after the close
    pub agreement: retainer_agreement::Model,
}

/// Hour figures for a closing period.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CloseFigures {
    pub consumed_hours: Decimal,
    pub overage_hours: Decimal,
    pub unused_hours: Decimal,
    pub rollover_hours_out: Decimal,
}

/// Hours carried into the next period under `policy`.
#[must_use]
pub fn rollover_hours(policy: RolloverPolicy, unused: Decimal, cap: Option<Decimal>) -> Decimal {
    let carried = match policy {
        RolloverPolicy::Forfeit => Decimal::ZERO,
        RolloverPolicy::CarryForward => unused,
        RolloverPolicy::CarryCapped => unused.min(cap.unwrap_or(Decimal::ZERO)),
    };
    money::round2(carried.max(Decimal::ZERO))
}

/// Computes overage, unused and rollover hours for a period given its final consumption.
///
/// Fixed-fee agreements and hour banks without an allocation never produce overage or
/// rollover.
#[must_use]
pub fn compute_close_figures(
    agreement: &retainer_agreement::Model,
    period: &retainer_period::Model,
    consumed_hours: Decimal,
) -> CloseFigures {
    let consumed_hours = money::round2(consumed_hours);
    let zero = money::round2(Decimal::ZERO);

    match (agreement.retainer_type, period.allocated_hours) {
        (RetainerType::HourBank, Some(allocated)) => {
            let unused_hours = money::positive_difference(allocated, consumed_hours);
            CloseFigures {
                consumed_hours,
                overage_hours: money::positive_difference(consumed_hours, allocated),
                unused_hours,
                rollover_hours_out: rollover_hours(
                    agreement.rollover_policy,
                    unused_hours,
                    agreement.rollover_cap_hours,
                ),
            }
        }
        _ => CloseFigures {
            consumed_hours,
            overage_hours: zero,
            unused_hours: zero,
            rollover_hours_out: zero,
        },
    }
}

/// Closes the agreement's open period as of today's date (UTC).
pub async fn close_period(
    db: &DatabaseConnection,
    locks: &PeriodLocks,
    agreement_id: i64,
    actor_id: i64,
) -> Result<ClosePeriodResult> {
    close_period_as_of(db, locks, agreement_id, actor_id, Utc::now().date_naive()).await
}

/// Closes the agreement's open period, treating `today` as the current date.
///
/// # Errors
/// * `NotFound` - the agreement or its open period does not exist
/// * `InvalidState` - the period has not ended yet, the agreement has no period fee,
///   overage exists but no billing rate applies, or the rate's currency differs from
///   the organization's
/// * `ConcurrencyConflict` - another close held the agreement's lock for too long
#[instrument(skip(db, locks))]
pub async fn close_period_as_of(
    db: &DatabaseConnection,
    locks: &PeriodLocks,
    agreement_id: i64,
    actor_id: i64,
    today: NaiveDate,
) -> Result<ClosePeriodResult> {
    let _guard = locks.acquire(agreement_id).await?;

    let txn = db.begin().await?;
    let result = close_open_period(&txn, agreement_id, actor_id, today).await?;
    txn.commit().await?;

    info!(
        agreement_id,
        period_id = result.closed_period.id,
        invoice_id = result.invoice.id,
        consumed_hours = %result.closed_period.consumed_hours,
        overage_hours = %result.closed_period.overage_hours,
        rollover_hours = %result.closed_period.rollover_hours_out,
        next_period_id = ?result.next_period.as_ref().map(|p| p.id),
        "Closed retainer period"
    );

    Ok(result)
}

#[allow(clippy::too_many_lines)]
async fn close_open_period<C>(
    db: &C,
    agreement_id: i64,
    actor_id: i64,
    today: NaiveDate,
) -> Result<ClosePeriodResult>
where
    C: ConnectionTrait,
{
    let agreement = agreement::get_agreement(db, agreement_id).await?;
    let open = period::lock_open_period(db, agreement_id)
        .await?
        .ok_or_else(|| period::no_open_period(agreement_id))?;

    if today < open.period_end {
        return Err(Error::invalid_state(format!(
            "period {} runs until {} and is not ready to close",
            open.id, open.period_end
        )));
    }
    let Some(period_fee) = agreement.period_fee else {
        return Err(Error::invalid_state(format!(
            "agreement {agreement_id} has no period fee; a fee is required to close"
        )));
    };

    // Final reconciliation, independent of whatever the aggregator last wrote
    let consumed = consumption::compute_consumed_hours(db, agreement.customer_id, &open).await?;
    let figures = compute_close_figures(&agreement, &open, consumed);
    let label = calendar::period_label(open.period_start, open.period_end);

    let overage_rate = if figures.overage_hours > Decimal::ZERO {
        let as_of = open.period_end.pred_opt().unwrap_or(open.period_end);
        let rate = billing_rate::resolve_overage_rate(db, agreement.customer_id, as_of)
            .await?
            .ok_or_else(|| {
                Error::invalid_state(format!(
                    "no billing rate configured for customer {} on {as_of}; cannot bill {} overage hours",
                    agreement.customer_id, figures.overage_hours
                ))
            })?;
        Some(rate)
    } else {
        None
    };

    let currency = org_settings::default_currency(db).await?;
    if let Some(rate) = &overage_rate {
        if !rate.currency.trim().eq_ignore_ascii_case(&currency) {
            return Err(Error::invalid_state(format!(
                "billing rate {} is in {} but the organization invoices in {currency}",
                rate.rate_id, rate.currency
            )));
        }
    }

    let customer = customer::find_customer(db, agreement.customer_id).await?;
    let organization_name = org_settings::organization_name(db).await?;
    let draft =
        invoice::create_draft_invoice(db, &customer, &organization_name, &currency, actor_id)
            .await?;

    let mut lines = vec![
        invoice::add_line(
            db,
            draft.id,
            invoice::NewInvoiceLine {
                description: format!("Retainer: {} ({label})", agreement.name),
                quantity: Decimal::ONE,
                unit_price: period_fee,
                sort_order: 0,
                retainer_period_id: Some(open.id),
            },
        )
        .await?,
    ];
    if let Some(rate) = &overage_rate {
        let allocated = open.allocated_hours.unwrap_or(Decimal::ZERO);
        lines.push(
            invoice::add_line(
                db,
                draft.id,
                invoice::NewInvoiceLine {
                    description: format!(
                        "Overage: {} hours beyond {} allocated ({label})",
                        figures.overage_hours, allocated
                    ),
                    quantity: figures.overage_hours,
                    unit_price: rate.hourly_rate,
                    sort_order: 1,
                    retainer_period_id: Some(open.id),
                },
            )
            .await?,
        );
    }
    let invoice = invoice::recalculate_totals(db, draft, &lines).await?;

    let closed = period::mark_closed(
        db,
        open,
        PeriodClose {
            consumed_hours: figures.consumed_hours,
            overage_hours: figures.overage_hours,
            rollover_hours_out: figures.rollover_hours_out,
            invoice_id: invoice.id,
            closed_by: actor_id,
            closed_at: Utc::now(),
        },
    )
    .await?;

    audit::record(
        db,
        audit::PERIOD_CLOSED,
        audit::ENTITY_PERIOD,
        closed.id,
        Some(actor_id),
        json!({
            "agreement_id": agreement.id,
            "period_start": closed.period_start,
            "period_end": closed.period_end,
            "allocated_hours": closed.allocated_hours,
            "consumed_hours": closed.consumed_hours,
            "overage_hours": closed.overage_hours,
            "rollover_hours_out": closed.rollover_hours_out,
            "invoice_id": invoice.id,
        }),
    )
    .await?;
    audit::record(
        db,
        audit::INVOICE_GENERATED,
        audit::ENTITY_INVOICE,
        invoice.id,
        Some(actor_id),
        json!({
            "agreement_id": agreement.id,
            "period_id": closed.id,
            "currency": invoice.currency,
            "total": invoice.total,
            "lines": lines.len(),
            "overage_rate": overage_rate.as_ref().map(|r| r.hourly_rate),
        }),
    )
    .await?;

    let (next_period, agreement) =
        roll_forward(db, agreement, &closed, figures.rollover_hours_out, actor_id).await?;

    let title = format!("Retainer period closed for \"{}\"", agreement.name);
    let body = format!(
        "Period {label} closed with {} hours consumed and {} overage hours. Draft invoice {} totals {} {}.",
        closed.consumed_hours, closed.overage_hours, invoice.id, invoice.total, invoice.currency
    );
    notification::notify_admins_and_owners(
        db,
        notification::RETAINER_PERIOD_CLOSED,
        &title,
        &body,
        audit::ENTITY_AGREEMENT,
        agreement.id,
    )
    .await?;

    Ok(ClosePeriodResult {
        closed_period: closed,
        invoice,
        invoice_lines: lines,
        next_period,
        agreement,
    })
}

/// Opens the period after `closed`, or terminates an agreement that has run past its
/// end date. Paused agreements get neither.
async fn roll_forward<C>(
    db: &C,
    agreement: retainer_agreement::Model,
    closed: &retainer_period::Model,
    rollover_hours: Decimal,
    actor_id: i64,
) -> Result<(Option<retainer_period::Model>, retainer_agreement::Model)>
where
    C: ConnectionTrait,
{
    if agreement.status != RetainerStatus::Active {
        debug!(
            agreement_id = agreement.id,
            status = agreement.status.as_str(),
            "Agreement not active; no next period"
        );
        return Ok((None, agreement));
    }

    let next_start = closed.period_end;
    let within_term = agreement.end_date.is_none_or(|end| next_start < end);

    if within_term {
        let next = period::open_period(db, &agreement, next_start, rollover_hours).await?;
        audit::record(
            db,
            audit::PERIOD_OPENED,
            audit::ENTITY_PERIOD,
            next.id,
            Some(actor_id),
            json!({
                "agreement_id": agreement.id,
                "period_start": next.period_start,
                "period_end": next.period_end,
                "allocated_hours": next.allocated_hours,
                "rollover_hours_in": next.rollover_hours_in,
            }),
        )
        .await?;
        return Ok((Some(next), agreement));
    }

    let details = json!({
        "reason": "end_date_reached",
        "end_date": agreement.end_date,
        "last_period_id": closed.id,
    });
    match agreement::transition(
        db,
        agreement.clone(),
        RetainerStatus::Terminated,
        Some(actor_id),
        details,
    )
    .await
    {
        Ok(terminated) => {
            let title = format!("Retainer \"{}\" has ended", terminated.name);
            let body = format!(
                "The agreement reached its end date and was terminated after the period ending {}.",
                closed.period_end.pred_opt().unwrap_or(closed.period_end)
            );
            notification::notify_admins_and_owners(
                db,
                notification::RETAINER_TERMINATED,
                &title,
                &body,
                audit::ENTITY_AGREEMENT,
                terminated.id,
            )
            .await?;
            info!(agreement_id = terminated.id, "Retainer reached its end date and was terminated");
            Ok((None, terminated))
        }
        Err(Error::InvalidState { message }) => {
            debug!(agreement_id = agreement.id, %message, "Agreement already terminated");
            let current = agreement::get_agreement(db, agreement.id).await?;
            Ok((None, current))
        }
        Err(e) => Err(e),
    }
}

/// A period the sweep could not close.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SweepFailure {
    pub agreement_id: i64,
    pub period_id: i64,
    pub kind: ErrorKind,
    pub message: String,
}

/// Outcome of one [`close_due_periods`] run.
#[derive(Debug, Clone, PartialEq)]
pub struct SweepResult {
    pub run_date: NaiveDate,
    pub closed: Vec<ClosePeriodResult>,
    pub failed: Vec<SweepFailure>,
}

/// Open periods whose end date is on or before `today`, oldest first.
pub async fn find_due_periods<C>(db: &C, today: NaiveDate) -> Result<Vec<retainer_period::Model>>
where
    C: ConnectionTrait,
{
    RetainerPeriod::find()
        .filter(retainer_period::Column::Status.eq(PeriodStatus::Open))
        .filter(retainer_period::Column::PeriodEnd.lte(today))
        .order_by_asc(retainer_period::Column::PeriodEnd)
        .order_by_asc(retainer_period::Column::Id)
        .all(db)
        .await
        .map_err(Into::into)
}

/// Closes every due period, each under its own lock and transaction.
///
/// A failing agreement is recorded and skipped. Periods opened by this run are not
/// revisited, even if they are already due; the next run picks them up.
pub async fn close_due_periods(
    db: &DatabaseConnection,
    locks: &PeriodLocks,
    today: NaiveDate,
    actor_id: i64,
) -> Result<SweepResult> {
    let due = find_due_periods(db, today).await?;
    info!(count = due.len(), %today, "Closing due retainer periods");

    let mut closed = Vec::new();
    let mut failed = Vec::new();

    for period in due {
        match close_period_as_of(db, locks, period.agreement_id, actor_id, today).await {
            Ok(result) => closed.push(result),
            Err(e) => {
                warn!(
                    agreement_id = period.agreement_id,
                    period_id = period.id,
                    error = %e,
                    "Failed to close retainer period"
                );
                failed.push(SweepFailure {
                    agreement_id: period.agreement_id,
                    period_id: period.id,
                    kind: e.kind(),
                    message: e.to_string(),
                });
            }
        }
    }

    Ok(SweepResult {
        run_date: today,
        closed,
        failed,
    })
}

/// Formats a sweep result for the log.
#[must_use]
pub fn format_sweep_summary(result: &SweepResult) -> String {
    let mut summary = format!(
        "Retainer close run for {}: {} closed, {} failed",
        result.run_date,
        result.closed.len(),
        result.failed.len()
    );

    for closed in &result.closed {
        let next = closed.next_period.as_ref().map_or_else(
            || "no next period".to_string(),
            |p| format!("next period starts {}", p.period_start),
        );
        let _ = write!(
            summary,
            "\n  closed agreement {} period {}: invoice {} for {} {}, {next}",
            closed.agreement.id,
            closed.closed_period.id,
            closed.invoice.id,
            closed.invoice.total,
            closed.invoice.currency
        );
    }
    for failure in &result.failed {
        let _ = write!(
            summary,
            "\n  failed agreement {} period {}: {}",
            failure.agreement_id, failure.period_id, failure.message
        );
    }

    summary
}
