//! Consumption aggregation for open retainer periods.
//!
//! Every signal recomputes the period's consumed hours from the time ledger instead of
//! adjusting a running counter. A missed or failed signal is therefore corrected by the
//! next one, and at the latest by the reconciliation done when the period closes.
//!
//! Failures while handling a signal are logged and discarded; they never reach the
//! transaction that produced the signal.

use crate::{
    core::{agreement, audit, customer, money, notification, period, time_ledger},
    entities::{RetainerType, retainer_agreement, retainer_period},
    errors::Result,
};
use rust_decimal::Decimal;
use sea_orm::{ConnectionTrait, TransactionTrait};
use tracing::{debug, info, instrument, warn};

/// Billable work was logged, edited or deleted on a project.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeEntryChanged {
    /// The time entry that changed
    pub entity_id: i64,
    /// The project the entry is booked against
    pub project_id: i64,
}

/// Capacity levels that raise a notification when consumption first reaches them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CapacityThreshold {
    /// 80% of the allocation used
    Approaching,
    /// 100% of the allocation used
    Exhausted,
}

impl CapacityThreshold {
    const ALL: [Self; 2] = [Self::Approaching, Self::Exhausted];

    /// Threshold as a percentage of allocated hours.
    #[must_use]
    pub fn percent(self) -> Decimal {
        match self {
            Self::Approaching => Decimal::from(80),
            Self::Exhausted => Decimal::ONE_HUNDRED,
        }
    }

    #[must_use]
    pub const fn notification_type(self) -> &'static str {
        match self {
            Self::Approaching => notification::RETAINER_APPROACHING_CAPACITY,
            Self::Exhausted => notification::RETAINER_FULLY_CONSUMED,
        }
    }
}

/// Thresholds crossed going upward from `old_percent` to `new_percent`.
///
/// A threshold counts only if `old_percent < threshold <= new_percent`, so staying above
/// a threshold or moving down never fires it again.
#[must_use]
pub fn crossed_thresholds(old_percent: Decimal, new_percent: Decimal) -> Vec<CapacityThreshold> {
    CapacityThreshold::ALL
        .into_iter()
        .filter(|t| old_percent < t.percent() && t.percent() <= new_percent)
        .collect()
}

/// Result of recomputing one period's consumption.
#[derive(Debug, Clone, PartialEq)]
pub struct ConsumptionUpdate {
    pub period: retainer_period::Model,
    pub previous_consumed_hours: Decimal,
    pub thresholds_crossed: Vec<CapacityThreshold>,
}

/// Billable hours logged for `customer_id` inside the period window.
pub async fn compute_consumed_hours<C>(
    db: &C,
    customer_id: i64,
    period: &retainer_period::Model,
) -> Result<Decimal>
where
    C: ConnectionTrait,
{
    let minutes =
        time_ledger::sum_billable_minutes(db, customer_id, period.period_start, period.period_end)
            .await?;
    Ok(money::minutes_to_hours(minutes))
}

/// Recomputes consumption for the open period reachable from `project_id`.
///
/// Follows project -> customer -> live agreement -> open period; if any link is missing
/// this returns `Ok(None)`. Errors propagate; use [`on_time_entry_changed`] for the
/// best-effort path.
pub async fn recalculate_for_project<C>(db: &C, project_id: i64) -> Result<Option<ConsumptionUpdate>>
where
    C: ConnectionTrait,
{
    let Some(customer_id) = customer::find_customer_for_project(db, project_id).await? else {
        debug!(project_id, "Project has no billing customer");
        return Ok(None);
    };
    let Some(agreement) = agreement::find_live_agreement_for_customer(db, customer_id).await?
    else {
        debug!(customer_id, "Customer has no live retainer");
        return Ok(None);
    };
    let Some(open) = period::find_open_period(db, agreement.id).await? else {
        debug!(agreement_id = agreement.id, "Retainer has no open period");
        return Ok(None);
    };

    let previous = open.consumed_hours;
    let consumed = compute_consumed_hours(db, customer_id, &open).await?;
    let updated = period::write_consumption(db, open, consumed).await?;

    let thresholds_crossed = notify_thresholds(db, &agreement, &updated, previous).await?;

    Ok(Some(ConsumptionUpdate {
        period: updated,
        previous_consumed_hours: previous,
        thresholds_crossed,
    }))
}

async fn notify_thresholds<C>(
    db: &C,
    agreement: &retainer_agreement::Model,
    period: &retainer_period::Model,
    previous_consumed: Decimal,
) -> Result<Vec<CapacityThreshold>>
where
    C: ConnectionTrait,
{
    if agreement.retainer_type != RetainerType::HourBank {
        return Ok(Vec::new());
    }
    let Some(allocated) = period.allocated_hours.filter(|h| *h > Decimal::ZERO) else {
        return Ok(Vec::new());
    };
    let (Some(old_percent), Some(new_percent)) = (
        money::percent_of(previous_consumed, allocated),
        money::percent_of(period.consumed_hours, allocated),
    ) else {
        return Ok(Vec::new());
    };

    let crossed = crossed_thresholds(old_percent, new_percent);
    let last_day = period.period_end.pred_opt().unwrap_or(period.period_end);

    for threshold in &crossed {
        let title = match threshold {
            CapacityThreshold::Approaching => {
                format!("Retainer \"{}\" is approaching capacity", agreement.name)
            }
            CapacityThreshold::Exhausted => {
                format!("Retainer \"{}\" is fully consumed", agreement.name)
            }
        };
        let body = format!(
            "{} of {} allocated hours used ({}%) in the period {} to {}",
            period.consumed_hours, allocated, new_percent, period.period_start, last_day
        );
        notification::notify_admins_and_owners(
            db,
            threshold.notification_type(),
            &title,
            &body,
            audit::ENTITY_AGREEMENT,
            agreement.id,
        )
        .await?;
        info!(
            agreement_id = agreement.id,
            period_id = period.id,
            percent = %new_percent,
            "Retainer capacity threshold crossed: {:?}",
            threshold
        );
    }

    Ok(crossed)
}

/// Handles a time entry change on a best-effort basis.
///
/// Runs inside a nested transaction (a savepoint when `db` is already a transaction).
/// Any failure rolls back only that nested work, is logged at `warn`, and yields `None`;
/// the caller's own transaction is left intact.
#[instrument(skip(db), fields(time_entry_id = event.entity_id, project_id = event.project_id))]
pub async fn on_time_entry_changed<C>(db: &C, event: TimeEntryChanged) -> Option<ConsumptionUpdate>
where
    C: ConnectionTrait + TransactionTrait,
{
    let outcome = async {
        let txn = db.begin().await?;
        let update = recalculate_for_project(&txn, event.project_id).await?;
        txn.commit().await?;
        Ok::<_, crate::errors::Error>(update)
    }
    .await;

    match outcome {
        Ok(update) => update,
        Err(e) => {
            warn!(
                time_entry_id = event.entity_id,
                project_id = event.project_id,
                error = %e,
                "Failed to update retainer consumption; next signal or period close will correct it"
            );
            None
        }
    }
}
