use std::sync::{Arc, Mutex};

use crate::db::Database;
use crate::error::{Error, Result};
use crate::models::{Invoice, InvoiceDetail, InvoiceLineItem, InvoicePayload, InvoiceUpdate};
use crate::utils::{normalize_date, now_rfc3339};

const NUMBER_WIDTH: usize = 4;
const DEFAULT_PREFIX: &str = "INV-";

pub async fn list_invoices(db: &Arc<Mutex<Database>>) -> Result<Vec<Invoice>> {
    let db = db.lock().map_err(|_| Error::Lock)?;
    db.list_invoices()
}

pub async fn get_invoice(db: &Arc<Mutex<Database>>, id: i64) -> Result<InvoiceDetail> {
    let db = db.lock().map_err(|_| Error::Lock)?;
    let invoice = db.get_invoice(id)?.ok_or(Error::NotFound("invoice"))?;
    let items = db.invoice_items(id)?;
    Ok(InvoiceDetail { invoice, items })
}

/// Next number under `prefix`: numeric suffix of the most recently created
/// invoice with that prefix plus one, or 1 when none exists. Computed at
/// call time, never cached.
pub async fn next_invoice_number(db: &Arc<Mutex<Database>>, prefix: &str) -> Result<String> {
    let db = db.lock().map_err(|_| Error::Lock)?;
    next_number(&db, prefix)
}

fn next_number(db: &Database, prefix: &str) -> Result<String> {
    let number = match db.last_invoice_number(prefix)? {
        Some(last) => parse_suffix(&last, prefix)? + 1,
        None => 1,
    };
    Ok(format!("{}{:0width$}", prefix, number, width = NUMBER_WIDTH))
}

fn parse_suffix(number: &str, prefix: &str) -> Result<i64> {
    number
        .strip_prefix(prefix)
        .and_then(|suffix| suffix.parse::<i64>().ok())
        .ok_or_else(|| Error::InvalidOperation(format!("malformed invoice number: {number}")))
}

/// Creates a `Pending` invoice with `total = amount + tax` and a number
/// assigned from the `invoice_prefix` setting.
pub async fn create_invoice(db: &Arc<Mutex<Database>>, payload: InvoicePayload) -> Result<Invoice> {
    let db = db.lock().map_err(|_| Error::Lock)?;
    if db.get_customer(payload.customer_id)?.is_none() {
        return Err(Error::NotFound("customer"));
    }
    if let Some(ticket_id) = payload.ticket_id {
        if db.get_ticket(ticket_id)?.is_none() {
            return Err(Error::NotFound("ticket"));
        }
    }

    let prefix = db
        .get_setting("invoice_prefix")?
        .unwrap_or_else(|| DEFAULT_PREFIX.to_string());
    let number = next_number(&db, &prefix)?;
    let total_amount = payload.amount + payload.tax_amount;
    let due_date = normalize_date(payload.due_date.clone());

    let id = db.insert_invoice(
        payload.ticket_id,
        payload.customer_id,
        &number,
        payload.amount,
        payload.tax_amount,
        total_amount,
        due_date.as_deref(),
        payload.notes.as_deref(),
        &now_rfc3339(),
    )?;
    tracing::debug!(invoice = %number, customer = payload.customer_id, "invoice created");
    db.get_invoice(id)?.ok_or(Error::NotFound("invoice"))
}

/// Merges the supplied fields over the stored invoice. When amount and/or
/// tax is supplied, the total is recomputed from the merged pair; line
/// items never feed back into it.
pub async fn update_invoice(
    db: &Arc<Mutex<Database>>,
    id: i64,
    update: InvoiceUpdate,
) -> Result<Invoice> {
    let db = db.lock().map_err(|_| Error::Lock)?;
    let mut invoice = db.get_invoice(id)?.ok_or(Error::NotFound("invoice"))?;

    let recompute = update.amount.is_some() || update.tax_amount.is_some();
    if let Some(amount) = update.amount {
        invoice.amount = amount;
    }
    if let Some(tax_amount) = update.tax_amount {
        invoice.tax_amount = tax_amount;
    }
    if recompute {
        invoice.total_amount = invoice.amount + invoice.tax_amount;
    }
    if let Some(status) = update.status {
        invoice.status = status;
    }
    if update.due_date.is_some() {
        invoice.due_date = normalize_date(update.due_date);
    }
    if update.paid_date.is_some() {
        invoice.paid_date = normalize_date(update.paid_date);
    }
    if let Some(payment_method) = update.payment_method {
        invoice.payment_method = Some(payment_method);
    }
    if let Some(notes) = update.notes {
        invoice.notes = Some(notes);
    }

    db.update_invoice(id, &invoice)?;
    db.get_invoice(id)?.ok_or(Error::NotFound("invoice"))
}

pub async fn delete_invoice(db: &Arc<Mutex<Database>>, id: i64) -> Result<()> {
    let mut db = db.lock().map_err(|_| Error::Lock)?;
    if db.delete_invoice(id)? == 0 {
        return Err(Error::NotFound("invoice"));
    }
    Ok(())
}

/// Line items are informational detail; the parent invoice's amount is
/// authoritative and untouched.
pub async fn add_line_item(
    db: &Arc<Mutex<Database>>,
    invoice_id: i64,
    description: String,
    quantity: i64,
    unit_price: f64,
) -> Result<InvoiceLineItem> {
    let db = db.lock().map_err(|_| Error::Lock)?;
    if db.get_invoice(invoice_id)?.is_none() {
        return Err(Error::NotFound("invoice"));
    }
    let total_price = quantity as f64 * unit_price;
    let id = db.insert_invoice_item(invoice_id, &description, quantity, unit_price, total_price)?;
    Ok(InvoiceLineItem {
        id,
        invoice_id,
        description,
        quantity,
        unit_price,
        total_price,
    })
}
