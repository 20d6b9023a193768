//! Retainer agreement business logic - creation, term updates and status transitions.
//!
//! A customer may hold at most one live (active or paused) agreement. Creating an
//! agreement opens its first period in the same transaction.

use crate::{
    core::{audit, customer, money, period},
    entities::{
        RetainerAgreement, RetainerFrequency, RetainerStatus, RetainerType, RolloverPolicy,
        retainer_agreement, retainer_period,
    },
    errors::{Error, Result},
};
use chrono::{NaiveDate, Utc};
use rust_decimal::Decimal;
use sea_orm::{Iterable, QueryOrder, Set, TransactionTrait, prelude::*, sea_query::Expr};
use serde_json::json;
use tracing::info;

/// Request to create an agreement.
#[derive(Debug, Clone, PartialEq)]
pub struct NewAgreement {
    pub customer_id: i64,
    pub schedule_id: Option<i64>,
    pub retainer_type: RetainerType,
    pub frequency: RetainerFrequency,
    pub start_date: NaiveDate,
    pub terms: AgreementTerms,
}

/// The mutable terms of an agreement. Updates replace all of them at once.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct AgreementTerms {
    pub name: String,
    pub allocated_hours: Option<Decimal>,
    pub period_fee: Option<Decimal>,
    pub rollover_policy: RolloverPolicy,
    pub rollover_cap_hours: Option<Decimal>,
    pub end_date: Option<NaiveDate>,
    pub notes: Option<String>,
}

/// Filter for [`list_agreements`]; unset fields match everything.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AgreementFilter {
    pub customer_id: Option<i64>,
    pub status: Option<RetainerStatus>,
}

/// A newly created agreement together with its first period.
#[derive(Debug, Clone, PartialEq)]
pub struct CreatedAgreement {
    pub agreement: retainer_agreement::Model,
    pub first_period: retainer_period::Model,
}

fn require_positive(value: Option<Decimal>, what: &str, context: &str) -> Result<Decimal> {
    match value {
        Some(v) if v > Decimal::ZERO => Ok(v),
        Some(_) => Err(Error::invalid_state(format!(
            "{what} must be greater than zero"
        ))),
        None => Err(Error::invalid_state(format!("{what} is required {context}"))),
    }
}

/// Validates terms for an agreement of the given type and start date, returning them
/// normalised: trimmed name, amounts at scale 2, and the rollover cap dropped unless
/// the policy is `CARRY_CAPPED`.
pub fn validate_terms(
    retainer_type: RetainerType,
    start_date: NaiveDate,
    terms: AgreementTerms,
) -> Result<AgreementTerms> {
    let name = terms.name.trim().to_string();
    if name.is_empty() {
        return Err(Error::invalid_state("agreement name cannot be empty"));
    }

    let allocated_hours = match retainer_type {
        RetainerType::HourBank => Some(require_positive(
            terms.allocated_hours,
            "allocated hours",
            "for HOUR_BANK retainers",
        )?),
        RetainerType::FixedFee => match terms.allocated_hours {
            Some(hours) => Some(require_positive(Some(hours), "allocated hours", "")?),
            None => None,
        },
    };

    let period_fee = require_positive(terms.period_fee, "period fee", "for every retainer type")?;

    let rollover_cap_hours = match terms.rollover_policy {
        RolloverPolicy::CarryCapped => Some(require_positive(
            terms.rollover_cap_hours,
            "rollover cap hours",
            "for CARRY_CAPPED rollover",
        )?),
        RolloverPolicy::Forfeit | RolloverPolicy::CarryForward => None,
    };

    if let Some(end_date) = terms.end_date {
        if end_date <= start_date {
            return Err(Error::invalid_state(format!(
                "end date {end_date} must be after start date {start_date}"
            )));
        }
    }

    Ok(AgreementTerms {
        name,
        allocated_hours: allocated_hours.map(money::round2),
        period_fee: Some(money::round2(period_fee)),
        rollover_policy: terms.rollover_policy,
        rollover_cap_hours: rollover_cap_hours.map(money::round2),
        end_date: terms.end_date,
        notes: terms.notes.filter(|n| !n.trim().is_empty()),
    })
}

/// Finds an agreement by ID, failing with `NotFound` if it does not exist.
pub async fn get_agreement<C>(db: &C, agreement_id: i64) -> Result<retainer_agreement::Model>
where
    C: ConnectionTrait,
{
    RetainerAgreement::find_by_id(agreement_id)
        .one(db)
        .await?
        .ok_or_else(|| Error::not_found("RetainerAgreement", agreement_id))
}

/// The customer's active or paused agreement, if any.
pub async fn find_live_agreement_for_customer<C>(
    db: &C,
    customer_id: i64,
) -> Result<Option<retainer_agreement::Model>>
where
    C: ConnectionTrait,
{
    RetainerAgreement::find()
        .filter(retainer_agreement::Column::CustomerId.eq(customer_id))
        .filter(
            retainer_agreement::Column::Status
                .is_in(RetainerStatus::iter().filter(|s| s.is_live())),
        )
        .order_by_asc(retainer_agreement::Column::Id)
        .one(db)
        .await
        .map_err(Into::into)
}

/// Lists agreements matching `filter`, newest first.
pub async fn list_agreements<C>(
    db: &C,
    filter: AgreementFilter,
) -> Result<Vec<retainer_agreement::Model>>
where
    C: ConnectionTrait,
{
    let mut query = RetainerAgreement::find();
    if let Some(customer_id) = filter.customer_id {
        query = query.filter(retainer_agreement::Column::CustomerId.eq(customer_id));
    }
    if let Some(status) = filter.status {
        query = query.filter(retainer_agreement::Column::Status.eq(status));
    }

    query
        .order_by_desc(retainer_agreement::Column::CreatedAt)
        .order_by_desc(retainer_agreement::Column::Id)
        .all(db)
        .await
        .map_err(Into::into)
}

/// Creates an agreement and its first period.
///
/// Fails with `NotFound` for an unknown customer, `InvalidState` for prospects,
/// offboarded customers or invalid terms, and `ResourceConflict` when the customer
/// already has an active or paused agreement.
pub async fn create_agreement(
    db: &DatabaseConnection,
    request: NewAgreement,
    actor_id: i64,
) -> Result<CreatedAgreement> {
    let terms = validate_terms(request.retainer_type, request.start_date, request.terms)?;

    let txn = db.begin().await?;

    let customer = customer::find_customer(&txn, request.customer_id).await?;
    if !customer.lifecycle_status.accepts_retainer() {
        return Err(Error::invalid_state(format!(
            "customer {} is in lifecycle status {:?} and cannot take a retainer",
            customer.id, customer.lifecycle_status
        )));
    }

    if let Some(existing) = find_live_agreement_for_customer(&txn, customer.id).await? {
        return Err(Error::ResourceConflict {
            message: format!(
                "customer {} already has {} retainer agreement {}",
                customer.id,
                existing.status.as_str(),
                existing.id
            ),
        });
    }

    let now = Utc::now();
    let agreement = retainer_agreement::ActiveModel {
        customer_id: Set(customer.id),
        schedule_id: Set(request.schedule_id),
        name: Set(terms.name),
        retainer_type: Set(request.retainer_type),
        status: Set(RetainerStatus::Active),
        frequency: Set(request.frequency),
        start_date: Set(request.start_date),
        end_date: Set(terms.end_date),
        allocated_hours: Set(terms.allocated_hours),
        period_fee: Set(terms.period_fee),
        rollover_policy: Set(terms.rollover_policy),
        rollover_cap_hours: Set(terms.rollover_cap_hours),
        notes: Set(terms.notes),
        created_by: Set(actor_id),
        created_at: Set(now),
        updated_at: Set(now),
        ..Default::default()
    }
    .insert(&txn)
    .await?;

    let first_period =
        period::open_period(&txn, &agreement, agreement.start_date, Decimal::ZERO).await?;

    audit::record(
        &txn,
        audit::RETAINER_CREATED,
        audit::ENTITY_AGREEMENT,
        agreement.id,
        Some(actor_id),
        json!({
            "customer_id": agreement.customer_id,
            "type": agreement.retainer_type,
            "frequency": agreement.frequency,
            "allocated_hours": agreement.allocated_hours,
            "period_fee": agreement.period_fee,
            "first_period_id": first_period.id,
        }),
    )
    .await?;

    txn.commit().await?;

    info!(
        agreement_id = agreement.id,
        customer_id = agreement.customer_id,
        period_id = first_period.id,
        "Created retainer agreement"
    );

    Ok(CreatedAgreement {
        agreement,
        first_period,
    })
}

/// Replaces an agreement's mutable terms. Takes effect from the next period; the open
/// period keeps the allocation it was opened with.
///
/// Terminated agreements cannot be updated.
pub async fn update_agreement(
    db: &DatabaseConnection,
    agreement_id: i64,
    terms: AgreementTerms,
    actor_id: i64,
) -> Result<retainer_agreement::Model> {
    let txn = db.begin().await?;

    let agreement = get_agreement(&txn, agreement_id).await?;
    if agreement.status == RetainerStatus::Terminated {
        return Err(Error::invalid_state(format!(
            "agreement {agreement_id} is terminated and cannot be updated"
        )));
    }

    let terms = validate_terms(agreement.retainer_type, agreement.start_date, terms)?;

    let mut active: retainer_agreement::ActiveModel = agreement.into();
    active.name = Set(terms.name);
    active.allocated_hours = Set(terms.allocated_hours);
    active.period_fee = Set(terms.period_fee);
    active.rollover_policy = Set(terms.rollover_policy);
    active.rollover_cap_hours = Set(terms.rollover_cap_hours);
    active.end_date = Set(terms.end_date);
    active.notes = Set(terms.notes);
    active.updated_at = Set(Utc::now());
    let updated = active.update(&txn).await?;

    audit::record(
        &txn,
        audit::RETAINER_UPDATED,
        audit::ENTITY_AGREEMENT,
        updated.id,
        Some(actor_id),
        json!({
            "allocated_hours": updated.allocated_hours,
            "period_fee": updated.period_fee,
            "rollover_policy": updated.rollover_policy,
            "rollover_cap_hours": updated.rollover_cap_hours,
            "end_date": updated.end_date,
        }),
    )
    .await?;

    txn.commit().await?;
    info!(agreement_id, "Updated retainer agreement terms");
    Ok(updated)
}

/// Moves `agreement` to `target` if the transition table allows it.
///
/// The UPDATE is guarded by the status that was read, so a concurrent transition
/// surfaces as `InvalidState` rather than being overwritten.
pub(crate) async fn transition<C>(
    db: &C,
    agreement: retainer_agreement::Model,
    target: RetainerStatus,
    actor_id: Option<i64>,
    details: Json,
) -> Result<retainer_agreement::Model>
where
    C: ConnectionTrait,
{
    let from = agreement.status;
    if !from.can_transition_to(target) {
        return Err(illegal_transition(agreement.id, from, target));
    }

    let now = Utc::now();
    let result = RetainerAgreement::update_many()
        .col_expr(retainer_agreement::Column::Status, Expr::value(target))
        .col_expr(retainer_agreement::Column::UpdatedAt, Expr::value(now))
        .filter(retainer_agreement::Column::Id.eq(agreement.id))
        .filter(retainer_agreement::Column::Status.eq(from))
        .exec(db)
        .await?;

    if result.rows_affected == 0 {
        let current = get_agreement(db, agreement.id).await?;
        return Err(illegal_transition(agreement.id, current.status, target));
    }

    let event_type = match target {
        RetainerStatus::Active => audit::RETAINER_RESUMED,
        RetainerStatus::Paused => audit::RETAINER_PAUSED,
        RetainerStatus::Terminated => audit::RETAINER_TERMINATED,
    };
    audit::record(
        db,
        event_type,
        audit::ENTITY_AGREEMENT,
        agreement.id,
        actor_id,
        details,
    )
    .await?;

    info!(
        agreement_id = agreement.id,
        from = from.as_str(),
        to = target.as_str(),
        "Retainer agreement status changed"
    );

    Ok(retainer_agreement::Model {
        status: target,
        updated_at: now,
        ..agreement
    })
}

fn illegal_transition(agreement_id: i64, from: RetainerStatus, to: RetainerStatus) -> Error {
    Error::invalid_state(format!(
        "cannot transition agreement {agreement_id} from {} to {}",
        from.as_str(),
        to.as_str()
    ))
}

async fn transition_by_id(
    db: &DatabaseConnection,
    agreement_id: i64,
    target: RetainerStatus,
    actor_id: i64,
) -> Result<retainer_agreement::Model> {
    let txn = db.begin().await?;
    let agreement = get_agreement(&txn, agreement_id).await?;
    let updated = transition(
        &txn,
        agreement,
        target,
        Some(actor_id),
        json!({ "reason": "requested" }),
    )
    .await?;
    txn.commit().await?;
    Ok(updated)
}

/// `ACTIVE -> PAUSED`. A paused agreement keeps accruing consumption on its open
/// period but does not roll into a new period when that period closes.
pub async fn pause_agreement(
    db: &DatabaseConnection,
    agreement_id: i64,
    actor_id: i64,
) -> Result<retainer_agreement::Model> {
    transition_by_id(db, agreement_id, RetainerStatus::Paused, actor_id).await
}

/// `PAUSED -> ACTIVE`.
///
/// If the open period was closed while paused, a new period is opened where the last
/// one ended, without rollover. Fails with `InvalidState` if that start is not before
/// the agreement's end date; the agreement then stays paused.
pub async fn resume_agreement(
    db: &DatabaseConnection,
    agreement_id: i64,
    actor_id: i64,
) -> Result<retainer_agreement::Model> {
    let txn = db.begin().await?;
    let agreement = get_agreement(&txn, agreement_id).await?;

    let reopen_at = match period::find_open_period(&txn, agreement_id).await? {
        Some(_) => None,
        None => period::find_latest_period(&txn, agreement_id)
            .await?
            .map(|last| last.period_end),
    };
    if let (Some(start), Some(end_date)) = (reopen_at, agreement.end_date) {
        if start >= end_date {
            return Err(Error::invalid_state(format!(
                "agreement {agreement_id} ended on {end_date}; terminate it instead of resuming"
            )));
        }
    }

    let resumed = transition(
        &txn,
        agreement,
        RetainerStatus::Active,
        Some(actor_id),
        json!({ "reason": "requested", "reopened_from": reopen_at }),
    )
    .await?;

    if let Some(start) = reopen_at {
        let reopened = period::open_period(&txn, &resumed, start, Decimal::ZERO).await?;
        audit::record(
            &txn,
            audit::PERIOD_OPENED,
            audit::ENTITY_PERIOD,
            reopened.id,
            Some(actor_id),
            json!({
                "agreement_id": resumed.id,
                "period_start": reopened.period_start,
                "period_end": reopened.period_end,
                "allocated_hours": reopened.allocated_hours,
                "rollover_hours_in": reopened.rollover_hours_in,
            }),
        )
        .await?;
        info!(
            agreement_id,
            period_id = reopened.id,
            "Opened period for resumed retainer"
        );
    }

    txn.commit().await?;
    Ok(resumed)
}

/// `ACTIVE | PAUSED -> TERMINATED`. The open period, if any, stays open until closed.
pub async fn terminate_agreement(
    db: &DatabaseConnection,
    agreement_id: i64,
    actor_id: i64,
) -> Result<retainer_agreement::Model> {
    transition_by_id(db, agreement_id, RetainerStatus::Terminated, actor_id).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        entities::{LifecycleStatus, PeriodStatus},
        test_utils::*,
    };
    use rust_decimal_macros::dec;
    use sea_orm::{DatabaseBackend, MockDatabase};

    #[tokio::test]
    async fn test_create_agreement_validation() -> Result<()> {
        // Validation fails before any query is issued
        let db = MockDatabase::new(DatabaseBackend::Sqlite).into_connection();

        let mut missing_hours = hour_bank_request(1);
        missing_hours.terms.allocated_hours = None;
        let result = create_agreement(&db, missing_hours, 1).await;
        assert!(matches!(result, Err(Error::InvalidState { .. })));

        let mut zero_fee = hour_bank_request(1);
        zero_fee.terms.period_fee = Some(dec!(0));
        let result = create_agreement(&db, zero_fee, 1).await;
        assert!(matches!(result, Err(Error::InvalidState { .. })));

        let mut fixed_without_fee = fixed_fee_request(1);
        fixed_without_fee.terms.period_fee = None;
        let result = create_agreement(&db, fixed_without_fee, 1).await;
        assert!(matches!(result, Err(Error::InvalidState { .. })));

        let mut capped_without_cap = hour_bank_request(1);
        capped_without_cap.terms.rollover_policy = RolloverPolicy::CarryCapped;
        capped_without_cap.terms.rollover_cap_hours = None;
        let result = create_agreement(&db, capped_without_cap, 1).await;
        assert!(matches!(result, Err(Error::InvalidState { .. })));

        let mut blank_name = hour_bank_request(1);
        blank_name.terms.name = "   ".to_string();
        let result = create_agreement(&db, blank_name, 1).await;
        assert!(matches!(result, Err(Error::InvalidState { .. })));

        let mut ends_before_start = hour_bank_request(1);
        ends_before_start.terms.end_date = Some(ends_before_start.start_date);
        let result = create_agreement(&db, ends_before_start, 1).await;
        assert!(matches!(result, Err(Error::InvalidState { .. })));

        Ok(())
    }

    #[test]
    fn test_validate_terms_normalises() -> Result<()> {
        let terms = validate_terms(
            RetainerType::HourBank,
            date(2026, 1, 1),
            AgreementTerms {
                name: "  Monthly support ".to_string(),
                allocated_hours: Some(dec!(40)),
                period_fee: Some(dec!(1000)),
                rollover_policy: RolloverPolicy::CarryForward,
                rollover_cap_hours: Some(dec!(5)),
                end_date: None,
                notes: Some("  ".to_string()),
            },
        )?;

        assert_eq!(terms.name, "Monthly support");
        assert_eq!(terms.allocated_hours.map(|h| h.to_string()), Some("40.00".to_string()));
        assert_eq!(terms.rollover_cap_hours, None);
        assert_eq!(terms.notes, None);

        Ok(())
    }

    #[tokio::test]
    async fn test_create_hour_bank_opens_first_period() -> Result<()> {
        let db = setup_test_db().await?;
        let customer = create_test_customer(&db, "Acme").await?;

        let created = create_agreement(&db, hour_bank_request(customer.id), 7).await?;
        let agreement = &created.agreement;
        let first = &created.first_period;

        assert_eq!(agreement.status, RetainerStatus::Active);
        assert_eq!(agreement.created_by, 7);
        assert_eq!(first.status, PeriodStatus::Open);
        assert_eq!(first.period_start, date(2026, 1, 1));
        assert_eq!(first.period_end, date(2026, 2, 1));
        assert_eq!(first.allocated_hours, Some(dec!(40)));
        assert_eq!(first.base_allocated_hours, Some(dec!(40)));
        assert_eq!(first.remaining_hours, dec!(40));
        assert_eq!(first.rollover_hours_in, dec!(0));
        assert_eq!(first.consumed_hours, dec!(0));

        let events = audit::events_for(&db, audit::ENTITY_AGREEMENT, agreement.id).await?;
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].event_type, audit::RETAINER_CREATED);

        Ok(())
    }

    #[tokio::test]
    async fn test_create_fixed_fee_has_no_allocation() -> Result<()> {
        let db = setup_test_db().await?;
        let customer = create_test_customer(&db, "Acme").await?;

        let created = create_agreement(&db, fixed_fee_request(customer.id), 1).await?;
        assert_eq!(created.first_period.allocated_hours, None);
        assert_eq!(created.first_period.remaining_hours, dec!(0));

        Ok(())
    }

    #[tokio::test]
    async fn test_create_rejects_unknown_customer() -> Result<()> {
        let db = setup_test_db().await?;

        let result = create_agreement(&db, hour_bank_request(404), 1).await;
        assert!(matches!(
            result,
            Err(Error::NotFound {
                entity: "Customer",
                ..
            })
        ));

        Ok(())
    }

    #[tokio::test]
    async fn test_create_rejects_prospect_and_offboarded() -> Result<()> {
        let db = setup_test_db().await?;

        for status in [LifecycleStatus::Prospect, LifecycleStatus::Offboarded] {
            let customer = create_customer_with_status(&db, "Lead", status).await?;
            let result = create_agreement(&db, hour_bank_request(customer.id), 1).await;
            assert!(matches!(result, Err(Error::InvalidState { .. })));
        }

        let onboarding =
            create_customer_with_status(&db, "New", LifecycleStatus::Onboarding).await?;
        create_agreement(&db, hour_bank_request(onboarding.id), 1).await?;

        Ok(())
    }

    #[tokio::test]
    async fn test_second_live_agreement_conflicts() -> Result<()> {
        let db = setup_test_db().await?;
        let customer = create_test_customer(&db, "Acme").await?;
        let created = create_agreement(&db, hour_bank_request(customer.id), 1).await?;

        let result = create_agreement(&db, fixed_fee_request(customer.id), 1).await;
        assert!(matches!(result, Err(Error::ResourceConflict { .. })));

        // Still conflicts while paused
        pause_agreement(&db, created.agreement.id, 1).await?;
        let result = create_agreement(&db, fixed_fee_request(customer.id), 1).await;
        assert!(matches!(result, Err(Error::ResourceConflict { .. })));

        // A terminated agreement frees the customer
        terminate_agreement(&db, created.agreement.id, 1).await?;
        create_agreement(&db, fixed_fee_request(customer.id), 1).await?;

        let all = list_agreements(
            &db,
            AgreementFilter {
                customer_id: Some(customer.id),
                status: None,
            },
        )
        .await?;
        assert_eq!(all.len(), 2);

        Ok(())
    }

    #[tokio::test]
    async fn test_status_transitions() -> Result<()> {
        let db = setup_test_db().await?;
        let created = create_hour_bank_agreement(&db).await?;
        let id = created.agreement.id;

        // Cannot resume an active agreement
        let result = resume_agreement(&db, id, 1).await;
        assert!(matches!(result, Err(Error::InvalidState { .. })));

        let paused = pause_agreement(&db, id, 1).await?;
        assert_eq!(paused.status, RetainerStatus::Paused);

        let result = pause_agreement(&db, id, 1).await;
        assert!(matches!(result, Err(Error::InvalidState { .. })));

        let resumed = resume_agreement(&db, id, 1).await?;
        assert_eq!(resumed.status, RetainerStatus::Active);

        let terminated = terminate_agreement(&db, id, 1).await?;
        assert_eq!(terminated.status, RetainerStatus::Terminated);

        for result in [
            pause_agreement(&db, id, 1).await,
            resume_agreement(&db, id, 1).await,
            terminate_agreement(&db, id, 1).await,
        ] {
            assert!(matches!(result, Err(Error::InvalidState { .. })));
        }

        let stored = get_agreement(&db, id).await?;
        assert_eq!(stored.status, RetainerStatus::Terminated);

        let events = audit::events_for(&db, audit::ENTITY_AGREEMENT, id).await?;
        let types: Vec<_> = events.iter().map(|e| e.event_type.as_str()).collect();
        assert_eq!(
            types,
            vec![
                audit::RETAINER_CREATED,
                audit::RETAINER_PAUSED,
                audit::RETAINER_RESUMED,
                audit::RETAINER_TERMINATED,
            ]
        );

        Ok(())
    }

    #[tokio::test]
    async fn test_stale_transition_is_rejected() -> Result<()> {
        let db = setup_test_db().await?;
        let created = create_hour_bank_agreement(&db).await?;

        terminate_agreement(&db, created.agreement.id, 1).await?;

        // The snapshot still says ACTIVE; the guarded update must not apply
        let result = transition(
            &db,
            created.agreement,
            RetainerStatus::Paused,
            Some(1),
            json!({}),
        )
        .await;
        assert!(matches!(result, Err(Error::InvalidState { .. })));

        Ok(())
    }

    #[tokio::test]
    async fn test_update_agreement_terms() -> Result<()> {
        let db = setup_test_db().await?;
        let created = create_hour_bank_agreement(&db).await?;

        let updated = update_agreement(
            &db,
            created.agreement.id,
            AgreementTerms {
                name: "Expanded support".to_string(),
                allocated_hours: Some(dec!(60)),
                period_fee: Some(dec!(1400)),
                rollover_policy: RolloverPolicy::CarryCapped,
                rollover_cap_hours: Some(dec!(8)),
                end_date: Some(date(2026, 12, 1)),
                notes: Some("Renegotiated".to_string()),
            },
            2,
        )
        .await?;

        assert_eq!(updated.name, "Expanded support");
        assert_eq!(updated.allocated_hours, Some(dec!(60)));
        assert_eq!(updated.rollover_cap_hours, Some(dec!(8)));
        assert_eq!(updated.status, RetainerStatus::Active);

        // The open period keeps its original allocation
        let current = period::get_current_period(&db, created.agreement.id).await?;
        assert_eq!(current.allocated_hours, Some(dec!(40)));

        Ok(())
    }

    #[tokio::test]
    async fn test_update_agreement_validation() -> Result<()> {
        let db = setup_test_db().await?;
        let created = create_hour_bank_agreement(&db).await?;

        let capped_without_cap = AgreementTerms {
            rollover_policy: RolloverPolicy::CarryCapped,
            rollover_cap_hours: None,
            ..hour_bank_request(0).terms
        };
        let result = update_agreement(&db, created.agreement.id, capped_without_cap, 1).await;
        assert!(matches!(result, Err(Error::InvalidState { .. })));

        terminate_agreement(&db, created.agreement.id, 1).await?;
        let result =
            update_agreement(&db, created.agreement.id, hour_bank_request(0).terms, 1).await;
        assert!(matches!(result, Err(Error::InvalidState { .. })));

        let result = update_agreement(&db, 999, hour_bank_request(0).terms, 1).await;
        assert!(matches!(result, Err(Error::NotFound { .. })));

        Ok(())
    }

    #[tokio::test]
    async fn test_list_agreements_filters() -> Result<()> {
        let db = setup_test_db().await?;
        let acme = create_test_customer(&db, "Acme").await?;
        let globex = create_test_customer(&db, "Globex").await?;
        let first = create_agreement(&db, hour_bank_request(acme.id), 1).await?;
        create_agreement(&db, fixed_fee_request(globex.id), 1).await?;
        pause_agreement(&db, first.agreement.id, 1).await?;

        let all = list_agreements(&db, AgreementFilter::default()).await?;
        assert_eq!(all.len(), 2);

        let paused = list_agreements(
            &db,
            AgreementFilter {
                customer_id: None,
                status: Some(RetainerStatus::Paused),
            },
        )
        .await?;
        assert_eq!(paused.len(), 1);
        assert_eq!(paused[0].id, first.agreement.id);

        let globex_only = list_agreements(
            &db,
            AgreementFilter {
                customer_id: Some(globex.id),
                status: Some(RetainerStatus::Active),
            },
        )
        .await?;
        assert_eq!(globex_only.len(), 1);
        assert_eq!(globex_only[0].customer_id, globex.id);

        Ok(())
    }
}
