//! Database configuration module for the retainer ledger.
//!
//! This module handles database connection and table creation using `SeaORM`. Tables
//! are generated from the entity definitions with `Schema::create_table_from_entity`,
//! so the schema always matches the Rust structs without hand-written SQL.

use crate::entities::{
    AuditEvent, BillingRate, Customer, CustomerProject, Invoice, InvoiceLine, Notification,
    OrgSettings, RetainerAgreement, RetainerPeriod, TimeEntry,
};
use crate::errors::Result;
use sea_orm::{ConnectionTrait, Database, DatabaseConnection, EntityTrait, Schema};

const DEFAULT_DATABASE_URL: &str = "sqlite://data/retainers.sqlite?mode=rwc";

/// Gets the database URL from environment variable or returns default `SQLite` path.
#[must_use]
pub fn get_database_url() -> String {
    std::env::var("DATABASE_URL").unwrap_or_else(|_| DEFAULT_DATABASE_URL.to_string())
}

/// Establishes a connection using `DATABASE_URL`, falling back to a local `SQLite` file.
pub async fn create_connection() -> Result<DatabaseConnection> {
    let database_url = get_database_url();
    tracing::debug!(%database_url, "Connecting to database");
    Database::connect(&database_url).await.map_err(Into::into)
}

async fn create_table<E>(db: &DatabaseConnection, schema: &Schema, entity: E) -> Result<()>
where
    E: EntityTrait,
{
    let builder = db.get_database_backend();
    let mut statement = schema.create_table_from_entity(entity);
    statement.if_not_exists();
    db.execute(builder.build(&statement)).await?;
    Ok(())
}

/// Creates all tables that do not exist yet.
///
/// Safe to call on every start; existing tables and their data are left alone.
pub async fn create_tables(db: &DatabaseConnection) -> Result<()> {
    let schema = Schema::new(db.get_database_backend());

    create_table(db, &schema, Customer).await?;
    create_table(db, &schema, CustomerProject).await?;
    create_table(db, &schema, TimeEntry).await?;
    create_table(db, &schema, BillingRate).await?;
    create_table(db, &schema, OrgSettings).await?;
    create_table(db, &schema, RetainerAgreement).await?;
    create_table(db, &schema, RetainerPeriod).await?;
    create_table(db, &schema, Invoice).await?;
    create_table(db, &schema, InvoiceLine).await?;
    create_table(db, &schema, AuditEvent).await?;
    create_table(db, &schema, Notification).await?;

    Ok(())
}
