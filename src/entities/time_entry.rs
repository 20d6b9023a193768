//! Time entry entity - committed units of work. Retainers only read the billable
//! minutes aggregate; capturing entries happens elsewhere.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Time entry database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "time_entries")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub project_id: i64,
    /// Member who logged the work
    pub member_id: i64,
    /// Day the work was performed
    pub date: Date,
    pub duration_minutes: i32,
    pub billable: bool,
    pub created_at: DateTimeUtc,
}

/// `TimeEntry` has no modelled relationships
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
