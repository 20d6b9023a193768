//! Retainer period entity - one billing cycle's hour ledger under an agreement.
//!
//! `period_end` is exclusive. Overage, rollover-out, invoice and close metadata are
//! only written when the period closes; a closed period is frozen.

use rust_decimal::Decimal;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Open/closed state of a period. `Closed` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, EnumIter, DeriveActiveEnum)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(8))")]
pub enum PeriodStatus {
    #[sea_orm(string_value = "OPEN")]
    Open,
    #[sea_orm(string_value = "CLOSED")]
    Closed,
}

impl PeriodStatus {
    /// The only legal transition is `Open -> Closed`.
    #[must_use]
    pub const fn can_transition_to(self, next: Self) -> bool {
        matches!((self, next), (Self::Open, Self::Closed))
    }
}

/// Retainer period database model
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "retainer_periods")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub agreement_id: i64,
    /// Inclusive first day
    pub period_start: Date,
    /// Exclusive end; work dated on this day belongs to the next period
    pub period_end: Date,
    pub status: PeriodStatus,
    /// Hours available this period (base plus rollover in); `None` for fixed fee
    #[sea_orm(column_type = "Decimal(Some((12, 2)))", nullable)]
    pub allocated_hours: Option<Decimal>,
    /// Agreement's nominal allocation when the period opened
    #[sea_orm(column_type = "Decimal(Some((12, 2)))", nullable)]
    pub base_allocated_hours: Option<Decimal>,
    #[sea_orm(column_type = "Decimal(Some((12, 2)))")]
    pub rollover_hours_in: Decimal,
    #[sea_orm(column_type = "Decimal(Some((12, 2)))")]
    pub consumed_hours: Decimal,
    #[sea_orm(column_type = "Decimal(Some((12, 2)))")]
    pub overage_hours: Decimal,
    #[sea_orm(column_type = "Decimal(Some((12, 2)))")]
    pub remaining_hours: Decimal,
    #[sea_orm(column_type = "Decimal(Some((12, 2)))")]
    pub rollover_hours_out: Decimal,
    pub invoice_id: Option<i64>,
    pub closed_at: Option<DateTimeUtc>,
    pub closed_by: Option<i64>,
    pub created_at: DateTimeUtc,
    pub updated_at: DateTimeUtc,
}

/// Defines relationships between `RetainerPeriod` and other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// Each period belongs to one agreement
    #[sea_orm(
        belongs_to = "super::retainer_agreement::Entity",
        from = "Column::AgreementId",
        to = "super::retainer_agreement::Column::Id"
    )]
    Agreement,
}

impl Related<super::retainer_agreement::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Agreement.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
