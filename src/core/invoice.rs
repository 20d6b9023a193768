//! Invoice store - draft invoice creation, lines and totals.
//!
//! Numbering, rendering and the invoice lifecycle beyond `DRAFT` are handled elsewhere.

use crate::{
    core::money,
    entities::{Invoice, InvoiceLine, InvoiceStatus, customer, invoice, invoice_line},
    errors::{Error, Result},
};
use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::{QueryOrder, Set, prelude::*};

/// A line to append to an invoice.
#[derive(Debug, Clone, PartialEq)]
pub struct NewInvoiceLine {
    pub description: String,
    pub quantity: Decimal,
    pub unit_price: Decimal,
    pub sort_order: i32,
    pub retainer_period_id: Option<i64>,
}

/// Creates an empty draft invoice, copying the customer's and organization's display
/// fields as they are right now.
pub async fn create_draft_invoice<C>(
    db: &C,
    customer: &customer::Model,
    organization_name: &str,
    currency: &str,
    created_by: i64,
) -> Result<invoice::Model>
where
    C: ConnectionTrait,
{
    let now = Utc::now();
    let zero = money::round2(Decimal::ZERO);

    invoice::ActiveModel {
        customer_id: Set(customer.id),
        customer_name: Set(customer.name.clone()),
        customer_email: Set(customer.email.clone()),
        organization_name: Set(organization_name.to_string()),
        currency: Set(currency.to_string()),
        status: Set(InvoiceStatus::Draft),
        subtotal: Set(zero),
        total: Set(zero),
        created_by: Set(created_by),
        created_at: Set(now),
        updated_at: Set(now),
        ..Default::default()
    }
    .insert(db)
    .await
    .map_err(Into::into)
}

/// Appends a line; its amount is `quantity * unit_price` at scale 2, half-up.
pub async fn add_line<C>(
    db: &C,
    invoice_id: i64,
    line: NewInvoiceLine,
) -> Result<invoice_line::Model>
where
    C: ConnectionTrait,
{
    let quantity = money::round2(line.quantity);
    let unit_price = money::round2(line.unit_price);

    invoice_line::ActiveModel {
        invoice_id: Set(invoice_id),
        description: Set(line.description),
        quantity: Set(quantity),
        unit_price: Set(unit_price),
        amount: Set(money::line_amount(quantity, unit_price)),
        sort_order: Set(line.sort_order),
        retainer_period_id: Set(line.retainer_period_id),
        created_at: Set(Utc::now()),
        ..Default::default()
    }
    .insert(db)
    .await
    .map_err(Into::into)
}

/// Sets subtotal and total to the sum of the given line amounts.
pub async fn recalculate_totals<C>(
    db: &C,
    invoice: invoice::Model,
    lines: &[invoice_line::Model],
) -> Result<invoice::Model>
where
    C: ConnectionTrait,
{
    let subtotal = money::round2(lines.iter().map(|l| l.amount).sum());

    let mut active: invoice::ActiveModel = invoice.into();
    active.subtotal = Set(subtotal);
    active.total = Set(subtotal);
    active.updated_at = Set(Utc::now());
    active.update(db).await.map_err(Into::into)
}

/// Finds an invoice by ID.
pub async fn get_invoice<C>(db: &C, invoice_id: i64) -> Result<invoice::Model>
where
    C: ConnectionTrait,
{
    Invoice::find_by_id(invoice_id)
        .one(db)
        .await?
        .ok_or_else(|| Error::not_found("Invoice", invoice_id))
}

/// Lines of an invoice in display order.
pub async fn get_invoice_lines<C>(db: &C, invoice_id: i64) -> Result<Vec<invoice_line::Model>>
where
    C: ConnectionTrait,
{
    InvoiceLine::find()
        .filter(invoice_line::Column::InvoiceId.eq(invoice_id))
        .order_by_asc(invoice_line::Column::SortOrder)
        .order_by_asc(invoice_line::Column::Id)
        .all(db)
        .await
        .map_err(Into::into)
}

/// Lines billing a given retainer period, across all invoices.
pub async fn lines_for_period<C>(db: &C, period_id: i64) -> Result<Vec<invoice_line::Model>>
where
    C: ConnectionTrait,
{
    InvoiceLine::find()
        .filter(invoice_line::Column::RetainerPeriodId.eq(period_id))
        .order_by_asc(invoice_line::Column::Id)
        .all(db)
        .await
        .map_err(Into::into)
}
