//! Customer directory lookups.

use crate::{
    entities::{Customer, CustomerProject, customer, customer_project},
    errors::{Error, Result},
};
use sea_orm::{QueryOrder, prelude::*};

/// Finds a customer by ID, failing with `NotFound` if it does not exist.
pub async fn find_customer<C>(db: &C, customer_id: i64) -> Result<customer::Model>
where
    C: ConnectionTrait,
{
    Customer::find_by_id(customer_id)
        .one(db)
        .await?
        .ok_or_else(|| Error::not_found("Customer", customer_id))
}

/// Resolves the customer a project is billed to.
///
/// A project is expected to belong to at most one customer; if several links exist
/// the oldest one wins.
pub async fn find_customer_for_project<C>(db: &C, project_id: i64) -> Result<Option<i64>>
where
    C: ConnectionTrait,
{
    let link = CustomerProject::find()
        .filter(customer_project::Column::ProjectId.eq(project_id))
        .order_by_asc(customer_project::Column::Id)
        .one(db)
        .await?;
    Ok(link.map(|l| l.customer_id))
}

/// Lists the IDs of every project billed to a customer.
pub async fn project_ids_for_customer<C>(db: &C, customer_id: i64) -> Result<Vec<i64>>
where
    C: ConnectionTrait,
{
    let links = CustomerProject::find()
        .filter(customer_project::Column::CustomerId.eq(customer_id))
        .order_by_asc(customer_project::Column::ProjectId)
        .all(db)
        .await?;
    Ok(links.into_iter().map(|l| l.project_id).collect())
}
