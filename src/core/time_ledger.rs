//! Time ledger - the authoritative billable-minutes aggregate that retainer
//! consumption is derived from.

use crate::{
    core::customer,
    entities::{TimeEntry, time_entry},
    errors::Result,
};
use chrono::NaiveDate;
use sea_orm::{QuerySelect, prelude::*, sea_query::Expr};

/// Sums billable minutes logged against any of the customer's projects with a work
/// date in `[from, to_exclusive)`.
pub async fn sum_billable_minutes<C>(
    db: &C,
    customer_id: i64,
    from: NaiveDate,
    to_exclusive: NaiveDate,
) -> Result<i64>
where
    C: ConnectionTrait,
{
    let project_ids = customer::project_ids_for_customer(db, customer_id).await?;
    if project_ids.is_empty() {
        return Ok(0);
    }

    let total: Option<Option<i64>> = TimeEntry::find()
        .select_only()
        .column_as(Expr::col(time_entry::Column::DurationMinutes).sum(), "total")
        .filter(time_entry::Column::ProjectId.is_in(project_ids))
        .filter(time_entry::Column::Billable.eq(true))
        .filter(time_entry::Column::Date.gte(from))
        .filter(time_entry::Column::Date.lt(to_exclusive))
        .into_tuple()
        .one(db)
        .await?;

    Ok(total.flatten().unwrap_or(0))
}
