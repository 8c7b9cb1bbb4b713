use std::sync::{Arc, Mutex};

use crate::db::Database;
use crate::error::{Error, Result};
use crate::models::{Ticket, TicketHistoryEntry, TicketPayload, TicketUpdate};
use crate::utils::now_rfc3339;

pub async fn list_tickets(db: &Arc<Mutex<Database>>) -> Result<Vec<Ticket>> {
    let db = db.lock().map_err(|_| Error::Lock)?;
    db.list_tickets()
}

pub async fn get_ticket(db: &Arc<Mutex<Database>>, id: i64) -> Result<Ticket> {
    let db = db.lock().map_err(|_| Error::Lock)?;
    db.get_ticket(id)?.ok_or(Error::NotFound("ticket"))
}

pub async fn tickets_by_customer(
    db: &Arc<Mutex<Database>>,
    customer_id: i64,
) -> Result<Vec<Ticket>> {
    let db = db.lock().map_err(|_| Error::Lock)?;
    db.tickets_by_customer(customer_id)
}

/// Intake: the referenced customer must exist; the ticket starts `Open`
/// unless an initial status was supplied.
pub async fn create_ticket(db: &Arc<Mutex<Database>>, payload: TicketPayload) -> Result<Ticket> {
    if payload.issue_description.trim().is_empty() {
        return Err(Error::InvalidOperation(
            "issue description is required".to_string(),
        ));
    }
    if payload.device_type.trim().is_empty() {
        return Err(Error::InvalidOperation("device type is required".to_string()));
    }

    let db = db.lock().map_err(|_| Error::Lock)?;
    if db.get_customer(payload.customer_id)?.is_none() {
        return Err(Error::NotFound("customer"));
    }
    let id = db.insert_ticket(&payload, &now_rfc3339())?;
    db.get_ticket(id)?.ok_or(Error::NotFound("ticket"))
}

/// Overwrites the ticket's fields. A status change appends one history
/// entry, atomically with the row update; the first transition into
/// Completed stamps `completed_at`, which later transitions never touch.
pub async fn update_ticket(
    db: &Arc<Mutex<Database>>,
    id: i64,
    update: TicketUpdate,
) -> Result<Ticket> {
    let mut db = db.lock().map_err(|_| Error::Lock)?;
    if db.update_ticket(id, &update, &now_rfc3339())? == 0 {
        return Err(Error::NotFound("ticket"));
    }
    db.get_ticket(id)?.ok_or(Error::NotFound("ticket"))
}

pub async fn delete_ticket(db: &Arc<Mutex<Database>>, id: i64) -> Result<()> {
    let mut db = db.lock().map_err(|_| Error::Lock)?;
    if db.delete_ticket(id)? == 0 {
        return Err(Error::NotFound("ticket"));
    }
    Ok(())
}

/// Status transitions for one ticket, most recent first.
pub async fn history(db: &Arc<Mutex<Database>>, ticket_id: i64) -> Result<Vec<TicketHistoryEntry>> {
    let db = db.lock().map_err(|_| Error::Lock)?;
    db.ticket_history(ticket_id)
}
