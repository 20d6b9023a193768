//! Notification outbox. Rows are picked up by the delivery service, which is not
//! part of this crate.

use crate::{
    entities::{Notification, notification},
    errors::Result,
};
use chrono::Utc;
use sea_orm::{QueryOrder, Set, prelude::*};

pub const RETAINER_APPROACHING_CAPACITY: &str = "RETAINER_APPROACHING_CAPACITY";
pub const RETAINER_FULLY_CONSUMED: &str = "RETAINER_FULLY_CONSUMED";
pub const RETAINER_PERIOD_CLOSED: &str = "RETAINER_PERIOD_CLOSED";
pub const RETAINER_TERMINATED: &str = "RETAINER_TERMINATED";

const ADMINS_AND_OWNERS: &str = "ADMINS_AND_OWNERS";

/// Queues a notification for every admin and owner of the organization.
pub async fn notify_admins_and_owners<C>(
    db: &C,
    notification_type: &str,
    title: &str,
    body: &str,
    entity_type: &str,
    entity_id: i64,
) -> Result<notification::Model>
where
    C: ConnectionTrait,
{
    notification::ActiveModel {
        notification_type: Set(notification_type.to_string()),
        audience: Set(ADMINS_AND_OWNERS.to_string()),
        title: Set(title.to_string()),
        body: Set(body.to_string()),
        entity_type: Set(entity_type.to_string()),
        entity_id: Set(entity_id),
        created_at: Set(Utc::now()),
        ..Default::default()
    }
    .insert(db)
    .await
    .map_err(Into::into)
}

/// Queued notifications of one type for an entity, oldest first.
pub async fn notifications_of_type<C>(
    db: &C,
    notification_type: &str,
    entity_id: i64,
) -> Result<Vec<notification::Model>>
where
    C: ConnectionTrait,
{
    Notification::find()
        .filter(notification::Column::NotificationType.eq(notification_type))
        .filter(notification::Column::EntityId.eq(entity_id))
        .order_by_asc(notification::Column::Id)
        .all(db)
        .await
        .map_err(Into::into)
}
