//! Notification entity - outbox of in-app notifications awaiting delivery.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Notification database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "notifications")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Machine-readable type, e.g. `"RETAINER_PERIOD_CLOSED"`
    pub notification_type: String,
    /// Recipient group, e.g. `"ADMINS_AND_OWNERS"`
    pub audience: String,
    pub title: String,
    #[sea_orm(column_type = "Text")]
    pub body: String,
    pub entity_type: String,
    pub entity_id: i64,
    pub created_at: DateTimeUtc,
}

/// `Notification` has no relationships with other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
