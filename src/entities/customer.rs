//! Customer entity - the read side of the customer directory.
//!
//! Only the fields retainers need are modelled: display name, email and lifecycle status.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Where a customer sits in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, EnumIter, DeriveActiveEnum)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(16))")]
pub enum LifecycleStatus {
    #[sea_orm(string_value = "PROSPECT")]
    Prospect,
    #[sea_orm(string_value = "ONBOARDING")]
    Onboarding,
    #[sea_orm(string_value = "ACTIVE")]
    Active,
    #[sea_orm(string_value = "DORMANT")]
    Dormant,
    #[sea_orm(string_value = "OFFBOARDING")]
    Offboarding,
    #[sea_orm(string_value = "OFFBOARDED")]
    Offboarded,
}

impl LifecycleStatus {
    /// Prospects and offboarded customers cannot take on a retainer.
    #[must_use]
    pub const fn accepts_retainer(self) -> bool {
        !matches!(self, Self::Prospect | Self::Offboarded)
    }
}

/// Customer database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "customers")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub name: String,
    pub email: String,
    pub lifecycle_status: LifecycleStatus,
    pub created_at: DateTimeUtc,
}

/// Defines relationships between Customer and other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// One customer has many retainer agreements over time
    #[sea_orm(has_many = "super::retainer_agreement::Entity")]
    Agreements,
    /// Projects billed to this customer
    #[sea_orm(has_many = "super::customer_project::Entity")]
    Projects,
}

impl Related<super::retainer_agreement::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Agreements.def()
    }
}

impl Related<super::customer_project::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Projects.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
