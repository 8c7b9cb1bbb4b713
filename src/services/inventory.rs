use std::sync::{Arc, Mutex};

use crate::db::Database;
use crate::error::{Error, Result};
use crate::models::{InventoryItem, InventoryPayload};
use crate::utils::now_rfc3339;

pub async fn list_inventory(db: &Arc<Mutex<Database>>) -> Result<Vec<InventoryItem>> {
    let db = db.lock().map_err(|_| Error::Lock)?;
    db.list_inventory()
}

pub async fn get_item(db: &Arc<Mutex<Database>>, id: i64) -> Result<InventoryItem> {
    let db = db.lock().map_err(|_| Error::Lock)?;
    db.get_inventory_item(id)?
        .ok_or(Error::NotFound("inventory item"))
}

pub async fn create_item(
    db: &Arc<Mutex<Database>>,
    payload: InventoryPayload,
) -> Result<InventoryItem> {
    if payload.name.trim().is_empty() {
        return Err(Error::InvalidOperation("item name is required".to_string()));
    }
    if payload.quantity < 0 {
        return Err(Error::InvalidOperation("quantity cannot be negative".to_string()));
    }
    let db = db.lock().map_err(|_| Error::Lock)?;
    let id = db.insert_inventory_item(&payload, &now_rfc3339())?;
    db.get_inventory_item(id)?
        .ok_or(Error::NotFound("inventory item"))
}

pub async fn update_item(
    db: &Arc<Mutex<Database>>,
    id: i64,
    payload: InventoryPayload,
) -> Result<InventoryItem> {
    if payload.name.trim().is_empty() {
        return Err(Error::InvalidOperation("item name is required".to_string()));
    }
    if payload.quantity < 0 {
        return Err(Error::InvalidOperation("quantity cannot be negative".to_string()));
    }
    let db = db.lock().map_err(|_| Error::Lock)?;
    if db.update_inventory_item(id, &payload, &now_rfc3339())? == 0 {
        return Err(Error::NotFound("inventory item"));
    }
    db.get_inventory_item(id)?
        .ok_or(Error::NotFound("inventory item"))
}

pub async fn delete_item(db: &Arc<Mutex<Database>>, id: i64) -> Result<()> {
    let db = db.lock().map_err(|_| Error::Lock)?;
    if db.delete_inventory_item(id)? == 0 {
        return Err(Error::NotFound("inventory item"));
    }
    Ok(())
}

/// Applies a signed delta against the latest persisted quantity. Stock
/// never goes negative; a violating delta leaves the row untouched.
pub async fn adjust_stock(
    db: &Arc<Mutex<Database>>,
    item_id: i64,
    delta: i64,
    reason: &str,
) -> Result<InventoryItem> {
    let db = db.lock().map_err(|_| Error::Lock)?;
    let item = db
        .get_inventory_item(item_id)?
        .ok_or(Error::NotFound("inventory item"))?;

    let new_quantity = item.quantity + delta;
    if new_quantity < 0 {
        return Err(Error::InvalidOperation(format!(
            "insufficient stock: {} on hand, adjustment of {}",
            item.quantity, delta
        )));
    }

    db.set_inventory_quantity(item_id, new_quantity, &now_rfc3339())?;
    tracing::info!(
        item = %item.name,
        delta,
        reason,
        quantity = new_quantity,
        "stock adjusted"
    );
    db.get_inventory_item(item_id)?
        .ok_or(Error::NotFound("inventory item"))
}
