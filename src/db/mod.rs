use rusqlite::{params, Connection, OptionalExtension, Row};
use std::collections::{BTreeMap, HashMap};
use std::path::PathBuf;

use crate::error::{Error, Result};
use crate::models::{
    Customer, CustomerAggregates, CustomerPayload, InventoryItem, InventoryPayload, Invoice,
    InvoiceLineItem, Snapshot, Ticket, TicketHistoryEntry, TicketPayload, TicketStatus,
    TicketUpdate, TopCustomer,
};

pub struct Database {
    conn: Connection,
}

impl Database {
    pub fn new(db_path: PathBuf) -> Result<Self> {
        let conn = Connection::open(db_path)?;
        Self::bootstrap(conn)
    }

    /// Fresh in-memory database, used by tests.
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        Self::bootstrap(conn)
    }

    fn bootstrap(conn: Connection) -> Result<Self> {
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        let mut db = Database { conn };
        db.run_migrations()?;
        Ok(db)
    }

    fn run_migrations(&mut self) -> Result<()> {
        self.conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS schema_migrations (
                name TEXT PRIMARY KEY,
                applied_at TEXT NOT NULL
            );",
        )?;

        let migrations = vec![
            (
                "001_create_core_tables.sql",
                include_str!(concat!(
                    env!("CARGO_MANIFEST_DIR"),
                    "/migrations/001_create_core_tables.sql"
                )),
            ),
            (
                "002_default_settings.sql",
                include_str!(concat!(
                    env!("CARGO_MANIFEST_DIR"),
                    "/migrations/002_default_settings.sql"
                )),
            ),
        ];

        for (name, sql) in migrations {
            let applied: Option<String> = self
                .conn
                .query_row(
                    "SELECT name FROM schema_migrations WHERE name = ?1",
                    params![name],
                    |row| row.get(0),
                )
                .optional()?;

            if applied.is_none() {
                let tx = self.conn.transaction()?;
                tx.execute_batch(sql)?;
                tx.execute(
                    "INSERT INTO schema_migrations (name, applied_at) VALUES (?1, datetime('now'))",
                    params![name],
                )?;
                tx.commit()?;
                tracing::debug!(migration = name, "applied migration");
            }
        }

        Ok(())
    }

    pub fn close(self) -> Result<()> {
        self.conn.close().map_err(|(_, err)| Error::from(err))
    }

    // Customers

    pub fn list_customers(&self) -> Result<Vec<Customer>> {
        let mut stmt = self.conn.prepare(
            "SELECT c.id, c.name, c.email, c.phone, c.address, c.notes,
                    c.created_at, c.updated_at,
                    (SELECT COUNT(*) FROM tickets t WHERE t.customer_id = c.id),
                    (SELECT COALESCE(SUM(i.total_amount), 0) FROM invoices i
                      WHERE i.customer_id = c.id AND i.status = 'Paid')
             FROM customers c
             ORDER BY c.name",
        )?;

        let rows = stmt.query_map([], customer_from_row)?;
        rows.collect::<rusqlite::Result<_>>().map_err(Into::into)
    }

    pub fn get_customer(&self, id: i64) -> Result<Option<Customer>> {
        let mut stmt = self.conn.prepare(
            "SELECT c.id, c.name, c.email, c.phone, c.address, c.notes,
                    c.created_at, c.updated_at,
                    (SELECT COUNT(*) FROM tickets t WHERE t.customer_id = c.id),
                    (SELECT COALESCE(SUM(i.total_amount), 0) FROM invoices i
                      WHERE i.customer_id = c.id AND i.status = 'Paid')
             FROM customers c
             WHERE c.id = ?1",
        )?;

        stmt.query_row(params![id], customer_from_row)
            .optional()
            .map_err(Into::into)
    }

    pub fn insert_customer(&self, customer: &CustomerPayload, now: &str) -> Result<i64> {
        self.conn.execute(
            "INSERT INTO customers (name, email, phone, address, notes, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?6)",
            params![
                customer.name,
                customer.email,
                customer.phone,
                customer.address,
                customer.notes,
                now
            ],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    pub fn update_customer(&self, id: i64, customer: &CustomerPayload, now: &str) -> Result<usize> {
        self.conn
            .execute(
                "UPDATE customers SET name = ?1, email = ?2, phone = ?3, address = ?4,
                        notes = ?5, updated_at = ?6
                 WHERE id = ?7",
                params![
                    customer.name,
                    customer.email,
                    customer.phone,
                    customer.address,
                    customer.notes,
                    now,
                    id
                ],
            )
            .map_err(Into::into)
    }

    /// Deletes are blocked while any ticket still references the customer.
    pub fn delete_customer(&self, id: i64) -> Result<usize> {
        let tickets: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM tickets WHERE customer_id = ?1",
            params![id],
            |row| row.get(0),
        )?;
        if tickets > 0 {
            return Err(Error::ConstraintViolation(
                "cannot delete customer with existing tickets".to_string(),
            ));
        }
        self.conn
            .execute("DELETE FROM customers WHERE id = ?1", params![id])
            .map_err(Into::into)
    }

    pub fn customer_aggregates(&self, id: i64) -> Result<Option<CustomerAggregates>> {
        let mut stmt = self.conn.prepare(
            "SELECT (SELECT COUNT(*) FROM tickets t WHERE t.customer_id = c.id),
                    (SELECT COALESCE(SUM(i.total_amount), 0) FROM invoices i
                      WHERE i.customer_id = c.id AND i.status = 'Paid')
             FROM customers c
             WHERE c.id = ?1",
        )?;

        stmt.query_row(params![id], |row| {
            Ok(CustomerAggregates {
                ticket_count: row.get(0)?,
                total_spent: row.get(1)?,
            })
        })
        .optional()
        .map_err(Into::into)
    }

    // Tickets

    pub fn list_tickets(&self) -> Result<Vec<Ticket>> {
        let mut stmt = self.conn.prepare(
            "SELECT t.id, t.customer_id, t.device_type, t.device_model, t.issue_description,
                    t.status, t.priority, t.estimated_cost, t.actual_cost, t.technician,
                    t.notes, t.created_at, t.updated_at, t.completed_at,
                    c.name, c.email, c.phone
             FROM tickets t
             LEFT JOIN customers c ON t.customer_id = c.id
             ORDER BY t.created_at DESC",
        )?;

        let rows = stmt.query_map([], ticket_from_row)?;
        rows.collect::<rusqlite::Result<_>>().map_err(Into::into)
    }

    pub fn get_ticket(&self, id: i64) -> Result<Option<Ticket>> {
        let mut stmt = self.conn.prepare(
            "SELECT t.id, t.customer_id, t.device_type, t.device_model, t.issue_description,
                    t.status, t.priority, t.estimated_cost, t.actual_cost, t.technician,
                    t.notes, t.created_at, t.updated_at, t.completed_at,
                    c.name, c.email, c.phone
             FROM tickets t
             LEFT JOIN customers c ON t.customer_id = c.id
             WHERE t.id = ?1",
        )?;

        stmt.query_row(params![id], ticket_from_row)
            .optional()
            .map_err(Into::into)
    }

    pub fn tickets_by_customer(&self, customer_id: i64) -> Result<Vec<Ticket>> {
        let mut stmt = self.conn.prepare(
            "SELECT t.id, t.customer_id, t.device_type, t.device_model, t.issue_description,
                    t.status, t.priority, t.estimated_cost, t.actual_cost, t.technician,
                    t.notes, t.created_at, t.updated_at, t.completed_at,
                    c.name, c.email, c.phone
             FROM tickets t
             LEFT JOIN customers c ON t.customer_id = c.id
             WHERE t.customer_id = ?1
             ORDER BY t.created_at DESC",
        )?;

        let rows = stmt.query_map(params![customer_id], ticket_from_row)?;
        rows.collect::<rusqlite::Result<_>>().map_err(Into::into)
    }

    pub fn insert_ticket(&self, ticket: &TicketPayload, now: &str) -> Result<i64> {
        let status = ticket.status.unwrap_or(TicketStatus::Open);
        self.conn.execute(
            "INSERT INTO tickets
             (customer_id, device_type, device_model, issue_description, status, priority,
              estimated_cost, technician, notes, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?10)",
            params![
                ticket.customer_id,
                ticket.device_type,
                ticket.device_model,
                ticket.issue_description,
                status,
                ticket.priority,
                ticket.estimated_cost,
                ticket.technician,
                ticket.notes,
                now
            ],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    /// Row update plus history insert commit as one unit: a ticket whose
    /// status diverges from its history log must never be observable.
    /// `completed_at` is stamped on the first transition into Completed and
    /// kept as-is on every later write.
    pub fn update_ticket(&mut self, id: i64, update: &TicketUpdate, now: &str) -> Result<usize> {
        let tx = self.conn.transaction()?;

        let current: Option<(TicketStatus, Option<String>)> = tx
            .query_row(
                "SELECT status, completed_at FROM tickets WHERE id = ?1",
                params![id],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()?;

        let Some((old_status, completed_at)) = current else {
            return Ok(0);
        };

        let completed_at = if completed_at.is_none() && update.status == TicketStatus::Completed {
            Some(now.to_string())
        } else {
            completed_at
        };

        tx.execute(
            "UPDATE tickets SET
             device_type = ?1, device_model = ?2, issue_description = ?3, status = ?4,
             priority = ?5, estimated_cost = ?6, actual_cost = ?7, technician = ?8,
             notes = ?9, updated_at = ?10, completed_at = ?11
             WHERE id = ?12",
            params![
                update.device_type,
                update.device_model,
                update.issue_description,
                update.status,
                update.priority,
                update.estimated_cost,
                update.actual_cost,
                update.technician,
                update.notes,
                now,
                completed_at,
                id
            ],
        )?;

        if old_status != update.status {
            tx.execute(
                "INSERT INTO ticket_history (ticket_id, status_from, status_to, notes, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![id, old_status, update.status, "Status changed by system", now],
            )?;
            tracing::debug!(
                ticket = id,
                from = %old_status,
                to = %update.status,
                "ticket status changed"
            );
        }

        tx.commit()?;
        Ok(1)
    }

    /// Unconditional delete; history rows go with the ticket and any
    /// invoice referencing it is detached.
    pub fn delete_ticket(&mut self, id: i64) -> Result<usize> {
        let tx = self.conn.transaction()?;
        tx.execute(
            "UPDATE invoices SET ticket_id = NULL WHERE ticket_id = ?1",
            params![id],
        )?;
        tx.execute(
            "DELETE FROM ticket_history WHERE ticket_id = ?1",
            params![id],
        )?;
        let changed = tx.execute("DELETE FROM tickets WHERE id = ?1", params![id])?;
        tx.commit()?;
        Ok(changed)
    }

    pub fn ticket_history(&self, ticket_id: i64) -> Result<Vec<TicketHistoryEntry>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, ticket_id, status_from, status_to, notes, created_at
             FROM ticket_history
             WHERE ticket_id = ?1
             ORDER BY created_at DESC, id DESC",
        )?;

        let rows = stmt.query_map(params![ticket_id], |row| {
            Ok(TicketHistoryEntry {
                id: row.get(0)?,
                ticket_id: row.get(1)?,
                status_from: row.get(2)?,
                status_to: row.get(3)?,
                notes: row.get(4)?,
                created_at: row.get(5)?,
            })
        })?;
        rows.collect::<rusqlite::Result<_>>().map_err(Into::into)
    }

    // Inventory

    pub fn list_inventory(&self) -> Result<Vec<InventoryItem>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, name, category, description, sku, quantity, min_quantity,
                    cost_price, sell_price, supplier, location, created_at, updated_at
             FROM inventory
             ORDER BY name",
        )?;

        let rows = stmt.query_map([], inventory_from_row)?;
        rows.collect::<rusqlite::Result<_>>().map_err(Into::into)
    }

    pub fn get_inventory_item(&self, id: i64) -> Result<Option<InventoryItem>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, name, category, description, sku, quantity, min_quantity,
                    cost_price, sell_price, supplier, location, created_at, updated_at
             FROM inventory
             WHERE id = ?1",
        )?;

        stmt.query_row(params![id], inventory_from_row)
            .optional()
            .map_err(Into::into)
    }

    pub fn low_stock_items(&self) -> Result<Vec<InventoryItem>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, name, category, description, sku, quantity, min_quantity,
                    cost_price, sell_price, supplier, location, created_at, updated_at
             FROM inventory
             WHERE quantity <= min_quantity
             ORDER BY quantity",
        )?;

        let rows = stmt.query_map([], inventory_from_row)?;
        rows.collect::<rusqlite::Result<_>>().map_err(Into::into)
    }

    pub fn insert_inventory_item(&self, item: &InventoryPayload, now: &str) -> Result<i64> {
        self.conn.execute(
            "INSERT INTO inventory
             (name, category, description, sku, quantity, min_quantity, cost_price,
              sell_price, supplier, location, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?11)",
            params![
                item.name,
                item.category,
                item.description,
                item.sku,
                item.quantity,
                item.min_quantity,
                item.cost_price,
                item.sell_price,
                item.supplier,
                item.location,
                now
            ],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    pub fn update_inventory_item(
        &self,
        id: i64,
        item: &InventoryPayload,
        now: &str,
    ) -> Result<usize> {
        self.conn
            .execute(
                "UPDATE inventory SET
                 name = ?1, category = ?2, description = ?3, sku = ?4, quantity = ?5,
                 min_quantity = ?6, cost_price = ?7, sell_price = ?8, supplier = ?9,
                 location = ?10, updated_at = ?11
                 WHERE id = ?12",
                params![
                    item.name,
                    item.category,
                    item.description,
                    item.sku,
                    item.quantity,
                    item.min_quantity,
                    item.cost_price,
                    item.sell_price,
                    item.supplier,
                    item.location,
                    now,
                    id
                ],
            )
            .map_err(Into::into)
    }

    pub fn set_inventory_quantity(&self, id: i64, quantity: i64, now: &str) -> Result<usize> {
        self.conn
            .execute(
                "UPDATE inventory SET quantity = ?1, updated_at = ?2 WHERE id = ?3",
                params![quantity, now, id],
            )
            .map_err(Into::into)
    }

    pub fn delete_inventory_item(&self, id: i64) -> Result<usize> {
        self.conn
            .execute("DELETE FROM inventory WHERE id = ?1", params![id])
            .map_err(Into::into)
    }

    // Invoices

    pub fn list_invoices(&self) -> Result<Vec<Invoice>> {
        let mut stmt = self.conn.prepare(
            "SELECT i.id, i.ticket_id, i.customer_id, i.invoice_number, i.amount,
                    i.tax_amount, i.total_amount, i.status, i.due_date, i.paid_date,
                    i.payment_method, i.notes, i.created_at,
                    c.name, c.email, c.address
             FROM invoices i
             LEFT JOIN customers c ON i.customer_id = c.id
             ORDER BY i.created_at DESC",
        )?;

        let rows = stmt.query_map([], invoice_from_row)?;
        rows.collect::<rusqlite::Result<_>>().map_err(Into::into)
    }

    pub fn get_invoice(&self, id: i64) -> Result<Option<Invoice>> {
        let mut stmt = self.conn.prepare(
            "SELECT i.id, i.ticket_id, i.customer_id, i.invoice_number, i.amount,
                    i.tax_amount, i.total_amount, i.status, i.due_date, i.paid_date,
                    i.payment_method, i.notes, i.created_at,
                    c.name, c.email, c.address
             FROM invoices i
             LEFT JOIN customers c ON i.customer_id = c.id
             WHERE i.id = ?1",
        )?;

        stmt.query_row(params![id], invoice_from_row)
            .optional()
            .map_err(Into::into)
    }

    /// Most recently created invoice number under the given prefix, by id
    /// descending.
    pub fn last_invoice_number(&self, prefix: &str) -> Result<Option<String>> {
        let mut stmt = self.conn.prepare(
            "SELECT invoice_number FROM invoices
             WHERE substr(invoice_number, 1, length(?1)) = ?1
             ORDER BY id DESC
             LIMIT 1",
        )?;
        stmt.query_row(params![prefix], |row| row.get(0))
            .optional()
            .map_err(Into::into)
    }

    #[allow(clippy::too_many_arguments)]
    pub fn insert_invoice(
        &self,
        ticket_id: Option<i64>,
        customer_id: i64,
        invoice_number: &str,
        amount: f64,
        tax_amount: f64,
        total_amount: f64,
        due_date: Option<&str>,
        notes: Option<&str>,
        now: &str,
    ) -> Result<i64> {
        self.conn.execute(
            "INSERT INTO invoices
             (ticket_id, customer_id, invoice_number, amount, tax_amount, total_amount,
              status, due_date, notes, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, 'Pending', ?7, ?8, ?9)",
            params![
                ticket_id,
                customer_id,
                invoice_number,
                amount,
                tax_amount,
                total_amount,
                due_date,
                notes,
                now
            ],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    /// Writes back the mutable invoice columns; number, parties and
    /// creation time are fixed at creation.
    pub fn update_invoice(&self, id: i64, invoice: &Invoice) -> Result<usize> {
        self.conn
            .execute(
                "UPDATE invoices SET
                 amount = ?1, tax_amount = ?2, total_amount = ?3, status = ?4,
                 due_date = ?5, paid_date = ?6, payment_method = ?7, notes = ?8
                 WHERE id = ?9",
                params![
                    invoice.amount,
                    invoice.tax_amount,
                    invoice.total_amount,
                    invoice.status,
                    invoice.due_date,
                    invoice.paid_date,
                    invoice.payment_method,
                    invoice.notes,
                    id
                ],
            )
            .map_err(Into::into)
    }

    /// Unconditional delete; line items go with the invoice.
    pub fn delete_invoice(&mut self, id: i64) -> Result<usize> {
        let tx = self.conn.transaction()?;
        tx.execute(
            "DELETE FROM invoice_items WHERE invoice_id = ?1",
            params![id],
        )?;
        let changed = tx.execute("DELETE FROM invoices WHERE id = ?1", params![id])?;
        tx.commit()?;
        Ok(changed)
    }

    pub fn invoice_items(&self, invoice_id: i64) -> Result<Vec<InvoiceLineItem>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, invoice_id, description, quantity, unit_price, total_price
             FROM invoice_items
             WHERE invoice_id = ?1",
        )?;

        let rows = stmt.query_map(params![invoice_id], |row| {
            Ok(InvoiceLineItem {
                id: row.get(0)?,
                invoice_id: row.get(1)?,
                description: row.get(2)?,
                quantity: row.get(3)?,
                unit_price: row.get(4)?,
                total_price: row.get(5)?,
            })
        })?;
        rows.collect::<rusqlite::Result<_>>().map_err(Into::into)
    }

    pub fn insert_invoice_item(
        &self,
        invoice_id: i64,
        description: &str,
        quantity: i64,
        unit_price: f64,
        total_price: f64,
    ) -> Result<i64> {
        self.conn.execute(
            "INSERT INTO invoice_items (invoice_id, description, quantity, unit_price, total_price)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![invoice_id, description, quantity, unit_price, total_price],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    // Reporting

    pub fn total_paid_revenue(&self) -> Result<f64> {
        let total: Option<f64> = self.conn.query_row(
            "SELECT SUM(total_amount) FROM invoices WHERE status = 'Paid'",
            [],
            |row| row.get(0),
        )?;
        Ok(total.unwrap_or(0.0))
    }

    pub fn active_ticket_count(&self) -> Result<i64> {
        self.conn
            .query_row(
                "SELECT COUNT(*) FROM tickets WHERE status != 'Completed'",
                [],
                |row| row.get(0),
            )
            .map_err(Into::into)
    }

    pub fn customer_count(&self) -> Result<i64> {
        self.conn
            .query_row("SELECT COUNT(*) FROM customers", [], |row| row.get(0))
            .map_err(Into::into)
    }

    /// Completed tickets whose completion time falls in `[start, end)`.
    pub fn completed_in_range(&self, start: &str, end: &str) -> Result<i64> {
        self.conn
            .query_row(
                "SELECT COUNT(*) FROM tickets
                 WHERE status = 'Completed'
                   AND completed_at IS NOT NULL
                   AND completed_at >= ?1 AND completed_at < ?2",
                params![start, end],
                |row| row.get(0),
            )
            .map_err(Into::into)
    }

    /// Paid revenue for one `YYYY-MM` month of invoice creation.
    pub fn paid_revenue_for_month(&self, year_month: &str) -> Result<f64> {
        let total: Option<f64> = self.conn.query_row(
            "SELECT SUM(total_amount) FROM invoices
             WHERE status = 'Paid' AND substr(created_at, 1, 7) = ?1",
            params![year_month],
            |row| row.get(0),
        )?;
        Ok(total.unwrap_or(0.0))
    }

    pub fn top_customers_by_revenue(&self, limit: usize) -> Result<Vec<TopCustomer>> {
        let mut stmt = self.conn.prepare(
            "SELECT c.id, c.name, c.email,
                    (SELECT COALESCE(SUM(i.total_amount), 0) FROM invoices i
                      WHERE i.customer_id = c.id AND i.status = 'Paid') AS total_spent,
                    (SELECT COUNT(*) FROM tickets t WHERE t.customer_id = c.id)
             FROM customers c
             ORDER BY total_spent DESC, c.id ASC
             LIMIT ?1",
        )?;

        let rows = stmt.query_map(params![limit as i64], |row| {
            Ok(TopCustomer {
                id: row.get(0)?,
                name: row.get(1)?,
                email: row.get(2)?,
                total_spent: row.get(3)?,
                ticket_count: row.get(4)?,
            })
        })?;
        rows.collect::<rusqlite::Result<_>>().map_err(Into::into)
    }

    // Settings

    pub fn get_setting(&self, key: &str) -> Result<Option<String>> {
        let mut stmt = self.conn.prepare("SELECT value FROM settings WHERE key = ?1")?;
        stmt.query_row(params![key], |row| row.get(0))
            .optional()
            .map_err(Into::into)
    }

    pub fn set_setting(&self, key: &str, value: &str) -> Result<()> {
        self.conn.execute(
            "INSERT OR REPLACE INTO settings (key, value, updated_at) VALUES (?1, ?2, datetime('now'))",
            params![key, value],
        )?;
        Ok(())
    }

    pub fn get_settings(&self) -> Result<BTreeMap<String, String>> {
        let mut stmt = self.conn.prepare("SELECT key, value FROM settings ORDER BY key")?;
        let rows = stmt.query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?;
        rows.collect::<rusqlite::Result<_>>().map_err(Into::into)
    }

    // Backup

    /// Clears every data table in foreign-key order and reinserts the
    /// snapshot, regenerating ids. Foreign keys are remapped through
    /// old-id -> new-id tables so relationships survive; stored field
    /// values (timestamps, statuses, invoice numbers) are preserved.
    /// Runs as a single transaction.
    pub fn restore_snapshot(&mut self, snapshot: &Snapshot) -> Result<()> {
        let tx = self.conn.transaction()?;

        tx.execute("DELETE FROM invoice_items", [])?;
        tx.execute("DELETE FROM invoices", [])?;
        tx.execute("DELETE FROM ticket_history", [])?;
        tx.execute("DELETE FROM tickets", [])?;
        tx.execute("DELETE FROM inventory", [])?;
        tx.execute("DELETE FROM customers", [])?;

        let mut customer_ids: HashMap<i64, i64> = HashMap::new();
        for customer in &snapshot.customers {
            tx.execute(
                "INSERT INTO customers (name, email, phone, address, notes, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    customer.name,
                    customer.email,
                    customer.phone,
                    customer.address,
                    customer.notes,
                    customer.created_at,
                    customer.updated_at
                ],
            )?;
            customer_ids.insert(customer.id, tx.last_insert_rowid());
        }

        let mut ticket_ids: HashMap<i64, i64> = HashMap::new();
        for ticket in &snapshot.tickets {
            let customer_id = customer_ids.get(&ticket.customer_id).copied().ok_or_else(|| {
                Error::ConstraintViolation(format!(
                    "ticket {} references unknown customer {}",
                    ticket.id, ticket.customer_id
                ))
            })?;
            tx.execute(
                "INSERT INTO tickets
                 (customer_id, device_type, device_model, issue_description, status, priority,
                  estimated_cost, actual_cost, technician, notes, created_at, updated_at,
                  completed_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)",
                params![
                    customer_id,
                    ticket.device_type,
                    ticket.device_model,
                    ticket.issue_description,
                    ticket.status,
                    ticket.priority,
                    ticket.estimated_cost,
                    ticket.actual_cost,
                    ticket.technician,
                    ticket.notes,
                    ticket.created_at,
                    ticket.updated_at,
                    ticket.completed_at
                ],
            )?;
            ticket_ids.insert(ticket.id, tx.last_insert_rowid());
        }

        for item in &snapshot.inventory {
            tx.execute(
                "INSERT INTO inventory
                 (name, category, description, sku, quantity, min_quantity, cost_price,
                  sell_price, supplier, location, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
                params![
                    item.name,
                    item.category,
                    item.description,
                    item.sku,
                    item.quantity,
                    item.min_quantity,
                    item.cost_price,
                    item.sell_price,
                    item.supplier,
                    item.location,
                    item.created_at,
                    item.updated_at
                ],
            )?;
        }

        for invoice in &snapshot.invoices {
            let customer_id = customer_ids.get(&invoice.customer_id).copied().ok_or_else(|| {
                Error::ConstraintViolation(format!(
                    "invoice {} references unknown customer {}",
                    invoice.invoice_number, invoice.customer_id
                ))
            })?;
            let ticket_id = invoice
                .ticket_id
                .map(|tid| {
                    ticket_ids.get(&tid).copied().ok_or_else(|| {
                        Error::ConstraintViolation(format!(
                            "invoice {} references unknown ticket {}",
                            invoice.invoice_number, tid
                        ))
                    })
                })
                .transpose()?;
            tx.execute(
                "INSERT INTO invoices
                 (ticket_id, customer_id, invoice_number, amount, tax_amount, total_amount,
                  status, due_date, paid_date, payment_method, notes, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
                params![
                    ticket_id,
                    customer_id,
                    invoice.invoice_number,
                    invoice.amount,
                    invoice.tax_amount,
                    invoice.total_amount,
                    invoice.status,
                    invoice.due_date,
                    invoice.paid_date,
                    invoice.payment_method,
                    invoice.notes,
                    invoice.created_at
                ],
            )?;
        }

        for (key, value) in &snapshot.settings {
            tx.execute(
                "INSERT OR REPLACE INTO settings (key, value, updated_at) VALUES (?1, ?2, datetime('now'))",
                params![key, value],
            )?;
        }

        tx.commit()?;
        tracing::info!(
            customers = snapshot.customers.len(),
            tickets = snapshot.tickets.len(),
            inventory = snapshot.inventory.len(),
            invoices = snapshot.invoices.len(),
            "restored snapshot"
        );
        Ok(())
    }
}

fn customer_from_row(row: &Row<'_>) -> rusqlite::Result<Customer> {
    Ok(Customer {
        id: row.get(0)?,
        name: row.get(1)?,
        email: row.get(2)?,
        phone: row.get(3)?,
        address: row.get(4)?,
        notes: row.get(5)?,
        created_at: row.get(6)?,
        updated_at: row.get(7)?,
        ticket_count: row.get(8)?,
        total_spent: row.get(9)?,
    })
}

fn ticket_from_row(row: &Row<'_>) -> rusqlite::Result<Ticket> {
    Ok(Ticket {
        id: row.get(0)?,
        customer_id: row.get(1)?,
        device_type: row.get(2)?,
        device_model: row.get(3)?,
        issue_description: row.get(4)?,
        status: row.get(5)?,
        priority: row.get(6)?,
        estimated_cost: row.get(7)?,
        actual_cost: row.get(8)?,
        technician: row.get(9)?,
        notes: row.get(10)?,
        created_at: row.get(11)?,
        updated_at: row.get(12)?,
        completed_at: row.get(13)?,
        customer_name: row.get(14)?,
        customer_email: row.get(15)?,
        customer_phone: row.get(16)?,
    })
}

fn inventory_from_row(row: &Row<'_>) -> rusqlite::Result<InventoryItem> {
    Ok(InventoryItem {
        id: row.get(0)?,
        name: row.get(1)?,
        category: row.get(2)?,
        description: row.get(3)?,
        sku: row.get(4)?,
        quantity: row.get(5)?,
        min_quantity: row.get(6)?,
        cost_price: row.get(7)?,
        sell_price: row.get(8)?,
        supplier: row.get(9)?,
        location: row.get(10)?,
        created_at: row.get(11)?,
        updated_at: row.get(12)?,
    })
}

fn invoice_from_row(row: &Row<'_>) -> rusqlite::Result<Invoice> {
    Ok(Invoice {
        id: row.get(0)?,
        ticket_id: row.get(1)?,
        customer_id: row.get(2)?,
        invoice_number: row.get(3)?,
        amount: row.get(4)?,
        tax_amount: row.get(5)?,
        total_amount: row.get(6)?,
        status: row.get(7)?,
        due_date: row.get(8)?,
        paid_date: row.get(9)?,
        payment_method: row.get(10)?,
        notes: row.get(11)?,
        created_at: row.get(12)?,
        customer_name: row.get(13)?,
        customer_email: row.get(14)?,
        customer_address: row.get(15)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{CustomerPayload, TicketPayload};
    use crate::utils::now_rfc3339;

    fn payload(name: &str) -> CustomerPayload {
        CustomerPayload {
            name: name.to_string(),
            ..CustomerPayload::default()
        }
    }

    #[test]
    fn migrations_seed_default_settings() {
        let db = Database::open_in_memory().unwrap();
        assert_eq!(
            db.get_setting("invoice_prefix").unwrap().as_deref(),
            Some("INV-")
        );
        assert_eq!(db.get_setting("tax_rate").unwrap().as_deref(), Some("8.5"));
        assert!(db.get_setting("no_such_key").unwrap().is_none());
    }

    #[test]
    fn migrations_are_recorded_once() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("techrepairs.db");
        let db = Database::new(path.clone()).unwrap();
        db.set_setting("tax_rate", "10.0").unwrap();
        db.close().unwrap();

        // Reopening must not re-run the seed migration over live data.
        let db = Database::new(path).unwrap();
        assert_eq!(db.get_setting("tax_rate").unwrap().as_deref(), Some("10.0"));
    }

    #[test]
    fn delete_customer_is_blocked_by_tickets() {
        let db = Database::open_in_memory().unwrap();
        let now = now_rfc3339();
        let customer_id = db.insert_customer(&payload("Ana"), &now).unwrap();
        db.insert_ticket(
            &TicketPayload {
                customer_id,
                device_type: "Laptop".into(),
                device_model: None,
                issue_description: "No boot".into(),
                status: None,
                priority: Default::default(),
                estimated_cost: None,
                technician: None,
                notes: None,
            },
            &now,
        )
        .unwrap();

        let err = db.delete_customer(customer_id).unwrap_err();
        assert!(matches!(err, Error::ConstraintViolation(_)));
        assert!(db.get_customer(customer_id).unwrap().is_some());
    }

    #[test]
    fn delete_customer_without_tickets_succeeds() {
        let db = Database::open_in_memory().unwrap();
        let now = now_rfc3339();
        let customer_id = db.insert_customer(&payload("Ben"), &now).unwrap();
        assert_eq!(db.delete_customer(customer_id).unwrap(), 1);
        assert!(db.get_customer(customer_id).unwrap().is_none());
    }

    #[test]
    fn duplicate_sku_is_a_constraint_violation() {
        let db = Database::open_in_memory().unwrap();
        let now = now_rfc3339();
        let item = crate::models::InventoryPayload {
            name: "Screen".into(),
            category: None,
            description: None,
            sku: Some("SCR-1".into()),
            quantity: 3,
            min_quantity: 1,
            cost_price: None,
            sell_price: None,
            supplier: None,
            location: None,
        };
        db.insert_inventory_item(&item, &now).unwrap();
        let err = db.insert_inventory_item(&item, &now).unwrap_err();
        assert!(matches!(err, Error::ConstraintViolation(_)));
    }

    #[test]
    fn joined_ticket_read_carries_customer_contact() {
        let db = Database::open_in_memory().unwrap();
        let now = now_rfc3339();
        let customer_id = db
            .insert_customer(
                &CustomerPayload {
                    name: "Cara".into(),
                    email: Some("cara@example.com".into()),
                    phone: Some("555-0000".into()),
                    ..CustomerPayload::default()
                },
                &now,
            )
            .unwrap();
        let ticket_id = db
            .insert_ticket(
                &TicketPayload {
                    customer_id,
                    device_type: "Phone".into(),
                    device_model: Some("Pixel 9".into()),
                    issue_description: "Cracked screen".into(),
                    status: None,
                    priority: Default::default(),
                    estimated_cost: Some(120.0),
                    technician: None,
                    notes: None,
                },
                &now,
            )
            .unwrap();

        let ticket = db.get_ticket(ticket_id).unwrap().unwrap();
        assert_eq!(ticket.customer_name.as_deref(), Some("Cara"));
        assert_eq!(ticket.customer_email.as_deref(), Some("cara@example.com"));
        assert_eq!(ticket.customer_phone.as_deref(), Some("555-0000"));
        assert_eq!(ticket.status, TicketStatus::Open);
    }
}
