//! Retainer agreement entity - the standing contract for a customer's recurring retainer.
//!
//! An agreement is either an hour bank (pre-paid hours, overage billed) or a fixed fee.
//! Its status moves through a small state machine; see [`RetainerStatus::can_transition_to`].

use rust_decimal::Decimal;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Billing model of an agreement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, EnumIter, DeriveActiveEnum)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(16))")]
pub enum RetainerType {
    /// Pre-paid bank of hours; hours beyond the bank are billed as overage
    #[sea_orm(string_value = "HOUR_BANK")]
    HourBank,
    /// Flat fee per period regardless of hours worked
    #[sea_orm(string_value = "FIXED_FEE")]
    FixedFee,
}

/// Lifecycle status of an agreement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, EnumIter, DeriveActiveEnum)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(16))")]
pub enum RetainerStatus {
    #[sea_orm(string_value = "ACTIVE")]
    Active,
    #[sea_orm(string_value = "PAUSED")]
    Paused,
    #[sea_orm(string_value = "TERMINATED")]
    Terminated,
}

impl RetainerStatus {
    /// Transition table for agreement status. Any pair not listed here is illegal,
    /// including self-transitions.
    #[must_use]
    pub const fn can_transition_to(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Active, Self::Paused)
                | (Self::Paused, Self::Active)
                | (Self::Active | Self::Paused, Self::Terminated)
        )
    }

    /// Active and paused agreements count towards the one-per-customer limit.
    #[must_use]
    pub const fn is_live(self) -> bool {
        matches!(self, Self::Active | Self::Paused)
    }

    /// Upper-case name as stored in the database.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Active => "ACTIVE",
            Self::Paused => "PAUSED",
            Self::Terminated => "TERMINATED",
        }
    }
}

/// Billing cycle length.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, EnumIter, DeriveActiveEnum)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(16))")]
pub enum RetainerFrequency {
    #[sea_orm(string_value = "WEEKLY")]
    Weekly,
    #[sea_orm(string_value = "FORTNIGHTLY")]
    Fortnightly,
    #[sea_orm(string_value = "MONTHLY")]
    Monthly,
    #[sea_orm(string_value = "QUARTERLY")]
    Quarterly,
    #[sea_orm(string_value = "SEMI_ANNUALLY")]
    SemiAnnually,
    #[sea_orm(string_value = "ANNUALLY")]
    Annually,
}

/// What happens to unused hours when an hour-bank period closes.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, EnumIter, DeriveActiveEnum,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(16))")]
pub enum RolloverPolicy {
    /// Unused hours are lost
    #[default]
    #[sea_orm(string_value = "FORFEIT")]
    Forfeit,
    /// All unused hours carry into the next period
    #[sea_orm(string_value = "CARRY_FORWARD")]
    CarryForward,
    /// Unused hours carry up to `rollover_cap_hours`
    #[sea_orm(string_value = "CARRY_CAPPED")]
    CarryCapped,
}

/// Retainer agreement database model
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "retainer_agreements")]
pub struct Model {
    /// Unique identifier for the agreement
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Customer this agreement bills
    pub customer_id: i64,
    /// Optional recurring schedule this agreement was created from
    pub schedule_id: Option<i64>,
    /// Display name, used in invoice line descriptions
    pub name: String,
    pub retainer_type: RetainerType,
    pub status: RetainerStatus,
    pub frequency: RetainerFrequency,
    /// First day of the first period
    pub start_date: Date,
    /// No period may start on or after this date
    pub end_date: Option<Date>,
    /// Nominal hours per period (hour bank only)
    #[sea_orm(column_type = "Decimal(Some((12, 2)))", nullable)]
    pub allocated_hours: Option<Decimal>,
    /// Fee billed on every period close
    #[sea_orm(column_type = "Decimal(Some((12, 2)))", nullable)]
    pub period_fee: Option<Decimal>,
    pub rollover_policy: RolloverPolicy,
    /// Maximum hours carried forward under `CARRY_CAPPED`
    #[sea_orm(column_type = "Decimal(Some((12, 2)))", nullable)]
    pub rollover_cap_hours: Option<Decimal>,
    #[sea_orm(column_type = "Text", nullable)]
    pub notes: Option<String>,
    /// Member who created the agreement
    pub created_by: i64,
    pub created_at: DateTimeUtc,
    pub updated_at: DateTimeUtc,
}

/// Defines relationships between `RetainerAgreement` and other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// Each agreement belongs to one customer
    #[sea_orm(
        belongs_to = "super::customer::Entity",
        from = "Column::CustomerId",
        to = "super::customer::Column::Id"
    )]
    Customer,
    /// One agreement has many periods
    #[sea_orm(has_many = "super::retainer_period::Entity")]
    Periods,
}

impl Related<super::customer::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Customer.def()
    }
}

impl Related<super::retainer_period::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Periods.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
