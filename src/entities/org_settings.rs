//! Organization settings entity - a single row of org-wide configuration.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Organization settings database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "org_settings")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    /// Name printed on invoices
    pub organization_name: String,
    /// Currency invoices are raised in; unset falls back to a fixed default
    pub default_currency: Option<String>,
    pub updated_at: DateTimeUtc,
}

/// `OrgSettings` has no relationships with other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
