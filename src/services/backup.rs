use std::path::Path;
use std::sync::{Arc, Mutex};

use crate::db::Database;
use crate::error::{Error, Result};
use crate::models::Snapshot;
use crate::utils::now_rfc3339;

/// Assembles a full-state snapshot of the store.
pub async fn export_snapshot(db: &Arc<Mutex<Database>>) -> Result<Snapshot> {
    let db = db.lock().map_err(|_| Error::Lock)?;
    Ok(Snapshot {
        customers: db.list_customers()?,
        tickets: db.list_tickets()?,
        inventory: db.list_inventory()?,
        invoices: db.list_invoices()?,
        settings: db.get_settings()?,
        timestamp: now_rfc3339(),
    })
}

pub async fn backup_to_file(db: &Arc<Mutex<Database>>, path: &Path) -> Result<Snapshot> {
    let snapshot = export_snapshot(db).await?;
    let json = serde_json::to_string_pretty(&snapshot)?;
    std::fs::write(path, json)?;
    tracing::info!(path = %path.display(), "wrote backup snapshot");
    Ok(snapshot)
}

/// Replaces the store's contents with the snapshot, regenerating ids and
/// remapping foreign keys. All-or-nothing.
pub async fn restore_snapshot(db: &Arc<Mutex<Database>>, snapshot: &Snapshot) -> Result<()> {
    let mut db = db.lock().map_err(|_| Error::Lock)?;
    db.restore_snapshot(snapshot)
}

pub async fn restore_from_file(db: &Arc<Mutex<Database>>, path: &Path) -> Result<()> {
    let json = std::fs::read_to_string(path)?;
    let snapshot: Snapshot = serde_json::from_str(&json)?;
    restore_snapshot(db, &snapshot).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{
        CustomerPayload, InvoicePayload, InvoiceStatus, InvoiceUpdate, InventoryPayload, Priority,
        TicketPayload,
    };
    use crate::services::{customers, inventory, invoices, tickets};

    fn test_db() -> Arc<Mutex<Database>> {
        Arc::new(Mutex::new(Database::open_in_memory().unwrap()))
    }

    async fn seed(db: &Arc<Mutex<Database>>) {
        customers::create_customer(
            db,
            CustomerPayload {
                name: "Ana".into(),
                email: Some("ana@example.com".into()),
                ..CustomerPayload::default()
            },
        )
        .await
        .unwrap();
        let ben = customers::create_customer(
            db,
            CustomerPayload {
                name: "Ben".into(),
                ..CustomerPayload::default()
            },
        )
        .await
        .unwrap();

        let ticket = tickets::create_ticket(
            db,
            TicketPayload {
                customer_id: ben.id,
                device_type: "Tablet".into(),
                device_model: None,
                issue_description: "Charging port".into(),
                status: None,
                priority: Priority::Low,
                estimated_cost: Some(45.0),
                technician: None,
                notes: None,
            },
        )
        .await
        .unwrap();

        inventory::create_item(
            db,
            InventoryPayload {
                name: "Charging port".into(),
                category: None,
                description: None,
                sku: Some("CHG-1".into()),
                quantity: 9,
                min_quantity: 2,
                cost_price: None,
                sell_price: None,
                supplier: None,
                location: None,
            },
        )
        .await
        .unwrap();

        let invoice = invoices::create_invoice(
            db,
            InvoicePayload {
                ticket_id: Some(ticket.id),
                customer_id: ben.id,
                amount: 45.0,
                tax_amount: 3.83,
                due_date: Some("2026-09-01".into()),
                notes: None,
            },
        )
        .await
        .unwrap();
        invoices::update_invoice(
            db,
            invoice.id,
            InvoiceUpdate {
                status: Some(InvoiceStatus::Paid),
                ..InvoiceUpdate::default()
            },
        )
        .await
        .unwrap();
    }

    #[tokio::test]
    async fn roundtrip_preserves_entities_and_relationships() {
        let db = test_db();
        seed(&db).await;
        let snapshot = export_snapshot(&db).await.unwrap();

        // Restore into a fresh store; ids regenerate but relationships hold.
        let restored = test_db();
        restore_snapshot(&restored, &snapshot).await.unwrap();

        let customers = customers::list_customers(&restored).await.unwrap();
        assert_eq!(customers.len(), 2);

        let tickets = tickets::list_tickets(&restored).await.unwrap();
        assert_eq!(tickets.len(), 1);
        assert_eq!(tickets[0].customer_name.as_deref(), Some("Ben"));

        let invoices = invoices::list_invoices(&restored).await.unwrap();
        assert_eq!(invoices.len(), 1);
        assert_eq!(invoices[0].invoice_number, "INV-0001");
        assert_eq!(invoices[0].status, InvoiceStatus::Paid);
        assert_eq!(invoices[0].customer_name.as_deref(), Some("Ben"));
        assert_eq!(invoices[0].ticket_id, Some(tickets[0].id));
        assert_eq!(invoices[0].total_amount, 45.0 + 3.83);

        // Ben's paid total follows him through the restore.
        let ben = customers.iter().find(|c| c.name == "Ben").unwrap();
        assert_eq!(ben.total_spent, 45.0 + 3.83);
        assert_eq!(ben.ticket_count, 1);
    }

    #[tokio::test]
    async fn restore_replaces_existing_rows() {
        let db = test_db();
        seed(&db).await;
        let snapshot = export_snapshot(&db).await.unwrap();

        // Extra data added after the snapshot disappears on restore.
        customers::create_customer(
            &db,
            CustomerPayload {
                name: "Casper".into(),
                ..CustomerPayload::default()
            },
        )
        .await
        .unwrap();

        restore_snapshot(&db, &snapshot).await.unwrap();
        let names: Vec<String> = customers::list_customers(&db)
            .await
            .unwrap()
            .into_iter()
            .map(|c| c.name)
            .collect();
        assert_eq!(names, vec!["Ana", "Ben"]);
    }

    #[tokio::test]
    async fn dangling_reference_aborts_the_restore() {
        let db = test_db();
        seed(&db).await;
        let mut snapshot = export_snapshot(&db).await.unwrap();
        snapshot.customers.retain(|c| c.name != "Ben");

        let err = restore_snapshot(&db, &snapshot).await.unwrap_err();
        assert!(matches!(err, Error::ConstraintViolation(_)));
        // The failed restore must not leave a half-cleared store.
        assert_eq!(customers::list_customers(&db).await.unwrap().len(), 2);
        assert_eq!(tickets::list_tickets(&db).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn file_roundtrip() {
        let db = test_db();
        seed(&db).await;
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("backup.json");
        backup_to_file(&db, &path).await.unwrap();

        let restored = test_db();
        restore_from_file(&restored, &path).await.unwrap();
        assert_eq!(customers::list_customers(&restored).await.unwrap().len(), 2);
        assert_eq!(invoices::list_invoices(&restored).await.unwrap().len(), 1);
    }
}
