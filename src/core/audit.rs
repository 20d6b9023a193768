//! Audit log writer. Events are written on the caller's connection so they commit or
//! roll back together with the change they describe.

use crate::{
    entities::{AuditEvent, audit_event},
    errors::Result,
};
use chrono::Utc;
use sea_orm::{QueryOrder, Set, prelude::*};

pub const RETAINER_CREATED: &str = "retainer.created";
pub const RETAINER_UPDATED: &str = "retainer.updated";
pub const RETAINER_PAUSED: &str = "retainer.paused";
pub const RETAINER_RESUMED: &str = "retainer.resumed";
pub const RETAINER_TERMINATED: &str = "retainer.terminated";
pub const PERIOD_CLOSED: &str = "retainer_period.closed";
pub const PERIOD_OPENED: &str = "retainer_period.opened";
pub const INVOICE_GENERATED: &str = "retainer.invoice_generated";

pub const ENTITY_AGREEMENT: &str = "RETAINER_AGREEMENT";
pub const ENTITY_PERIOD: &str = "RETAINER_PERIOD";
pub const ENTITY_INVOICE: &str = "INVOICE";

/// Appends an audit event.
pub async fn record<C>(
    db: &C,
    event_type: &str,
    entity_type: &str,
    entity_id: i64,
    actor_id: Option<i64>,
    details: Json,
) -> Result<audit_event::Model>
where
    C: ConnectionTrait,
{
    audit_event::ActiveModel {
        event_type: Set(event_type.to_string()),
        entity_type: Set(entity_type.to_string()),
        entity_id: Set(entity_id),
        actor_id: Set(actor_id),
        details: Set(details),
        occurred_at: Set(Utc::now()),
        ..Default::default()
    }
    .insert(db)
    .await
    .map_err(Into::into)
}

/// Events for one entity, oldest first.
pub async fn events_for<C>(
    db: &C,
    entity_type: &str,
    entity_id: i64,
) -> Result<Vec<audit_event::Model>>
where
    C: ConnectionTrait,
{
    AuditEvent::find()
        .filter(audit_event::Column::EntityType.eq(entity_type))
        .filter(audit_event::Column::EntityId.eq(entity_id))
        .order_by_asc(audit_event::Column::Id)
        .all(db)
        .await
        .map_err(Into::into)
}
