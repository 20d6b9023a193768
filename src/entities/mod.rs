//! Entity module - Contains all SeaORM entity definitions for the database.
//! These entities represent the database tables and their relationships.
//! Each entity has a Model struct for data and an Entity struct for operations.

pub mod audit_event;
pub mod billing_rate;
pub mod customer;
pub mod customer_project;
pub mod invoice;
pub mod invoice_line;
pub mod notification;
pub mod org_settings;
pub mod retainer_agreement;
pub mod retainer_period;
pub mod time_entry;

// Re-export specific types to avoid conflicts
pub use audit_event::{Entity as AuditEvent, Model as AuditEventModel};
pub use billing_rate::{Entity as BillingRate, Model as BillingRateModel};
pub use customer::{Entity as Customer, LifecycleStatus, Model as CustomerModel};
pub use customer_project::{Entity as CustomerProject, Model as CustomerProjectModel};
pub use invoice::{Entity as Invoice, InvoiceStatus, Model as InvoiceModel};
pub use invoice_line::{Entity as InvoiceLine, Model as InvoiceLineModel};
pub use notification::{Entity as Notification, Model as NotificationModel};
pub use org_settings::{Entity as OrgSettings, Model as OrgSettingsModel};
pub use retainer_agreement::{
    Entity as RetainerAgreement, Model as RetainerAgreementModel, RetainerFrequency,
    RetainerStatus, RetainerType, RolloverPolicy,
};
pub use retainer_period::{
    Entity as RetainerPeriod, Model as RetainerPeriodModel, PeriodStatus,
};
pub use time_entry::{Entity as TimeEntry, Model as TimeEntryModel};
