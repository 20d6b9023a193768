//! Shared test utilities for the retainer ledger.
//!
//! This module provides common helper functions for setting up test databases
//! and creating test entities with sensible defaults.

use crate::{
    core::agreement::{self, AgreementTerms, CreatedAgreement, NewAgreement},
    entities::{
        LifecycleStatus, RetainerFrequency, RetainerType, RolloverPolicy, billing_rate, customer,
        customer_project, time_entry,
    },
    errors::Result,
};
use chrono::{NaiveDate, Utc};
use rust_decimal::Decimal;
use sea_orm::{ActiveModelTrait, ConnectionTrait, DatabaseConnection, Set};

/// Creates an in-memory `SQLite` database with all tables initialized.
/// No organization settings are seeded, so the currency falls back to USD.
pub async fn setup_test_db() -> Result<DatabaseConnection> {
    let db = sea_orm::Database::connect("sqlite::memory:").await?;
    crate::config::database::create_tables(&db).await?;
    Ok(db)
}

/// Shorthand for a calendar date in tests.
#[allow(clippy::unwrap_used)]
pub fn date(year: i32, month: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(year, month, day).unwrap()
}

/// Creates an `ACTIVE` customer named `name` with a derived email address.
pub async fn create_test_customer<C>(db: &C, name: &str) -> Result<customer::Model>
where
    C: ConnectionTrait,
{
    create_customer_with_status(db, name, LifecycleStatus::Active).await
}

/// Creates a customer in a specific lifecycle status.
pub async fn create_customer_with_status<C>(
    db: &C,
    name: &str,
    lifecycle_status: LifecycleStatus,
) -> Result<customer::Model>
where
    C: ConnectionTrait,
{
    customer::ActiveModel {
        name: Set(name.to_string()),
        email: Set(format!(
            "billing@{}.example",
            name.to_lowercase().replace(' ', "-")
        )),
        lifecycle_status: Set(lifecycle_status),
        created_at: Set(Utc::now()),
        ..Default::default()
    }
    .insert(db)
    .await
    .map_err(Into::into)
}

/// Links a project to a billing customer.
pub async fn link_project<C>(db: &C, customer_id: i64, project_id: i64) -> Result<()>
where
    C: ConnectionTrait,
{
    customer_project::ActiveModel {
        customer_id: Set(customer_id),
        project_id: Set(project_id),
        ..Default::default()
    }
    .insert(db)
    .await?;
    Ok(())
}

/// Logs a time entry for member 1.
pub async fn log_time<C>(
    db: &C,
    project_id: i64,
    date: NaiveDate,
    duration_minutes: i32,
    billable: bool,
) -> Result<time_entry::Model>
where
    C: ConnectionTrait,
{
    time_entry::ActiveModel {
        project_id: Set(project_id),
        member_id: Set(1),
        date: Set(date),
        duration_minutes: Set(duration_minutes),
        billable: Set(billable),
        created_at: Set(Utc::now()),
        ..Default::default()
    }
    .insert(db)
    .await
    .map_err(Into::into)
}

/// Scope columns of a billing rate.
#[derive(Debug, Clone, Copy, Default)]
pub struct RateScope {
    pub member_id: Option<i64>,
    pub project_id: Option<i64>,
    pub customer_id: Option<i64>,
}

impl RateScope {
    /// Member-agnostic customer rate.
    pub const fn customer(customer_id: i64) -> Self {
        Self {
            member_id: None,
            project_id: None,
            customer_id: Some(customer_id),
        }
    }

    /// Customer rate that only applies to one member.
    pub const fn member_for_customer(member_id: i64, customer_id: i64) -> Self {
        Self {
            member_id: Some(member_id),
            project_id: None,
            customer_id: Some(customer_id),
        }
    }
}

/// Creates a billing rate with an explicit scope and effective window.
pub async fn create_rate(
    db: &DatabaseConnection,
    scope: RateScope,
    hourly_rate: Decimal,
    currency: &str,
    effective_from: NaiveDate,
    effective_to: Option<NaiveDate>,
) -> Result<billing_rate::Model> {
    billing_rate::ActiveModel {
        member_id: Set(scope.member_id),
        project_id: Set(scope.project_id),
        customer_id: Set(scope.customer_id),
        currency: Set(currency.to_string()),
        hourly_rate: Set(hourly_rate),
        effective_from: Set(effective_from),
        effective_to: Set(effective_to),
        created_at: Set(Utc::now()),
        ..Default::default()
    }
    .insert(db)
    .await
    .map_err(Into::into)
}

/// Creates an open-ended organization default rate.
pub async fn create_default_rate(
    db: &DatabaseConnection,
    hourly_rate: Decimal,
    currency: &str,
    effective_from: NaiveDate,
) -> Result<billing_rate::Model> {
    create_rate(
        db,
        RateScope::default(),
        hourly_rate,
        currency,
        effective_from,
        None,
    )
    .await
}

/// Hour-bank request with sensible defaults.
///
/// # Defaults
/// * name: "Monthly support", `MONTHLY`, starting 2026-01-01, no end date
/// * 40 allocated hours for a fee of 1000.00
/// * `CARRY_CAPPED` rollover with a 10 hour cap
pub fn hour_bank_request(customer_id: i64) -> NewAgreement {
    NewAgreement {
        customer_id,
        schedule_id: None,
        retainer_type: RetainerType::HourBank,
        frequency: RetainerFrequency::Monthly,
        start_date: date(2026, 1, 1),
        terms: AgreementTerms {
            name: "Monthly support".to_string(),
            allocated_hours: Some(Decimal::from(40)),
            period_fee: Some(Decimal::from(1000)),
            rollover_policy: RolloverPolicy::CarryCapped,
            rollover_cap_hours: Some(Decimal::from(10)),
            end_date: None,
            notes: None,
        },
    }
}

/// Fixed-fee request: "Design retainer", `MONTHLY` from 2026-01-01, fee 2500.00.
pub fn fixed_fee_request(customer_id: i64) -> NewAgreement {
    NewAgreement {
        customer_id,
        schedule_id: None,
        retainer_type: RetainerType::FixedFee,
        frequency: RetainerFrequency::Monthly,
        start_date: date(2026, 1, 1),
        terms: AgreementTerms {
            name: "Design retainer".to_string(),
            period_fee: Some(Decimal::from(2500)),
            ..AgreementTerms::default()
        },
    }
}

/// Creates an agreement from `request`, acting as member 1.
pub async fn create_test_agreement(
    db: &DatabaseConnection,
    request: NewAgreement,
) -> Result<CreatedAgreement> {
    agreement::create_agreement(db, request, 1).await
}

/// Creates customer "Acme" with the default hour-bank agreement.
pub async fn create_hour_bank_agreement(db: &DatabaseConnection) -> Result<CreatedAgreement> {
    let customer = create_test_customer(db, "Acme").await?;
    create_test_agreement(db, hour_bank_request(customer.id)).await
}
