//! Usage reporting for the current retainer period.
//!
//! This module provides the figures and text rendering for "how much of this period has
//! been used". All functions return structured data or plain strings; nothing here writes.

use crate::{
    core::{agreement, calendar, money, period},
    entities::{retainer_agreement, retainer_period},
    errors::Result,
};
use rust_decimal::{Decimal, prelude::ToPrimitive};
use sea_orm::ConnectionTrait;

/// Usage of an agreement's open period.
#[derive(Debug, Clone, PartialEq)]
pub struct PeriodUsage {
    /// The agreement being reported on
    pub agreement: retainer_agreement::Model,
    /// Its open period
    pub period: retainer_period::Model,
    /// Inclusive date range of the period
    pub label: String,
    pub consumed_hours: Decimal,
    /// `None` for fixed-fee agreements
    pub allocated_hours: Option<Decimal>,
    pub remaining_hours: Decimal,
    /// Consumed as a percentage of allocated, when there is an allocation
    pub percent_used: Option<Decimal>,
}

/// Builds the usage report for an agreement's open period.
///
/// Reports the consumption last written by the aggregator; it does not re-read the
/// time ledger.
///
/// # Arguments
/// * `db` - Database connection
/// * `agreement_id` - ID of the agreement to report on
pub async fn period_usage<C>(db: &C, agreement_id: i64) -> Result<PeriodUsage>
where
    C: ConnectionTrait,
{
    let agreement = agreement::get_agreement(db, agreement_id).await?;
    let period = period::get_current_period(db, agreement_id).await?;

    let consumed_hours = money::round2(period.consumed_hours);
    let allocated_hours = period.allocated_hours.map(money::round2);
    let percent_used = allocated_hours.and_then(|a| money::percent_of(consumed_hours, a));

    Ok(PeriodUsage {
        label: calendar::period_label(period.period_start, period.period_end),
        consumed_hours,
        remaining_hours: money::round2(period.remaining_hours),
        allocated_hours,
        percent_used,
        agreement,
        period,
    })
}

/// Generates a progress bar string for visual representation.
///
/// Creates a text-based progress bar like: `[████████░░] 80.0%`. The bar is clamped to
/// 0-100% while the printed figure is not, so overage shows as e.g. `112.5%`.
///
/// # Arguments
/// * `percent` - Percentage used
/// * `bar_length` - Length of the progress bar in characters (default 10)
#[must_use]
pub fn format_progress_bar(percent: Decimal, bar_length: Option<usize>) -> String {
    let length = bar_length.unwrap_or(10);
    let clamped = percent.clamp(Decimal::ZERO, Decimal::ONE_HUNDRED);

    let filled = (clamped * Decimal::from(length) / Decimal::ONE_HUNDRED)
        .round_dp_with_strategy(0, money::HALF_UP)
        .to_usize()
        .unwrap_or(0)
        .min(length);
    let empty = length - filled;

    let filled_str = "█".repeat(filled);
    let empty_str = "░".repeat(empty);
    let shown = money::round(percent, 1, money::HALF_UP);

    format!("[{filled_str}{empty_str}] {shown}%")
}

/// Formats a usage report as a few lines of text.
#[must_use]
pub fn format_usage_report(usage: &PeriodUsage) -> String {
    let header = format!("{} ({})", usage.agreement.name, usage.label);
    match (usage.allocated_hours, usage.percent_used) {
        (Some(allocated), Some(percent)) => format!(
            "{header}\n{}\n{} of {} hours used, {} remaining",
            format_progress_bar(percent, None),
            usage.consumed_hours,
            allocated,
            usage.remaining_hours
        ),
        _ => format!("{header}\n{} hours logged", usage.consumed_hours),
    }
}
