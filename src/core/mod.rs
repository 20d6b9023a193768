//! Core business logic - framework-agnostic retainer operations.
//!
//! Functions here take a `SeaORM` connection (or transaction) and return crate
//! [`Result`](crate::errors::Result)s; no API or delivery concerns live in this layer.

pub mod agreement;
pub mod audit;
pub mod billing_rate;
pub mod calendar;
pub mod closing;
pub mod consumption;
pub mod customer;
pub mod invoice;
pub mod lock;
pub mod money;
pub mod notification;
pub mod org_settings;
pub mod period;
pub mod report;
pub mod time_ledger;
