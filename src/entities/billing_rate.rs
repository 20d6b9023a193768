//! Billing rate entity - hourly rates scoped by member, project and/or customer.
//!
//! A rate with no member, project or customer is the organization default.

use rust_decimal::Decimal;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Billing rate database model
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "billing_rates")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub member_id: Option<i64>,
    pub project_id: Option<i64>,
    pub customer_id: Option<i64>,
    /// ISO 4217 code the rate is denominated in
    pub currency: String,
    #[sea_orm(column_type = "Decimal(Some((12, 2)))")]
    pub hourly_rate: Decimal,
    pub effective_from: Date,
    /// Inclusive last day the rate applies; `None` means open-ended
    pub effective_to: Option<Date>,
    pub created_at: DateTimeUtc,
}

impl Model {
    /// Whether this rate applies on `date`.
    #[must_use]
    pub fn is_effective_on(&self, date: Date) -> bool {
        self.effective_from <= date && self.effective_to.is_none_or(|to| to >= date)
    }
}

/// `BillingRate` has no modelled relationships
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
