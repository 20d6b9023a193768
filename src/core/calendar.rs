//! Period calendar - maps a billing frequency and start date to the period's end.
//!
//! End dates are exclusive: the end of one period is the start of the next.
//! Month-based frequencies clamp to the last day of shorter months, so a period
//! anchored on the 31st of January ends on the 28th (or 29th) of February.

use crate::entities::RetainerFrequency;
use chrono::{Days, Months, NaiveDate};

/// Returns the exclusive end of a period that starts on `start`.
///
/// Dates beyond chrono's representable range saturate to `NaiveDate::MAX`.
#[must_use]
pub fn next_period_end(frequency: RetainerFrequency, start: NaiveDate) -> NaiveDate {
    let end = match frequency {
        RetainerFrequency::Weekly => start.checked_add_days(Days::new(7)),
        RetainerFrequency::Fortnightly => start.checked_add_days(Days::new(14)),
        RetainerFrequency::Monthly => start.checked_add_months(Months::new(1)),
        RetainerFrequency::Quarterly => start.checked_add_months(Months::new(3)),
        RetainerFrequency::SemiAnnually => start.checked_add_months(Months::new(6)),
        RetainerFrequency::Annually => start.checked_add_months(Months::new(12)),
    };
    end.unwrap_or(NaiveDate::MAX)
}

/// Human-readable inclusive range for a `[start, end)` period,
/// e.g. `"2026-03-01 to 2026-03-31"`.
#[must_use]
pub fn period_label(start: NaiveDate, end_exclusive: NaiveDate) -> String {
    let last_day = end_exclusive.pred_opt().unwrap_or(end_exclusive);
    format!(
        "{} to {}",
        start.format("%Y-%m-%d"),
        last_day.format("%Y-%m-%d")
    )
}
