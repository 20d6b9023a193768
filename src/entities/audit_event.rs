//! Audit event entity - append-only record of state changes.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Audit event database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "audit_events")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Dotted event name, e.g. `"retainer_period.closed"`
    pub event_type: String,
    pub entity_type: String,
    pub entity_id: i64,
    /// Member responsible, if the change was user-initiated
    pub actor_id: Option<i64>,
    /// Event-specific figures as a JSON object
    pub details: Json,
    pub occurred_at: DateTimeUtc,
}

/// `AuditEvent` has no relationships with other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
