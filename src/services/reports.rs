//! Read-only derived metrics. Every value here is recomputed from the
//! current record set on each call and never written back.

use std::sync::{Arc, Mutex};

use crate::db::Database;
use crate::error::{Error, Result};
use crate::models::{CustomerAggregates, DashboardStats, InventoryItem, MonthlyRevenue, TopCustomer};
use crate::utils::{local_day_utc_bounds, month_key};

pub async fn customer_aggregates(
    db: &Arc<Mutex<Database>>,
    customer_id: i64,
) -> Result<CustomerAggregates> {
    let db = db.lock().map_err(|_| Error::Lock)?;
    db.customer_aggregates(customer_id)?
        .ok_or(Error::NotFound("customer"))
}

pub async fn dashboard_stats(db: &Arc<Mutex<Database>>) -> Result<DashboardStats> {
    let (day_start, day_end) = local_day_utc_bounds()?;
    let db = db.lock().map_err(|_| Error::Lock)?;
    Ok(DashboardStats {
        total_revenue: db.total_paid_revenue()?,
        active_tickets: db.active_ticket_count()?,
        total_customers: db.customer_count()?,
        completed_today: db.completed_in_range(&day_start, &day_end)?,
    })
}

/// Items at or below their reorder threshold, lowest quantity first.
pub async fn low_stock_items(db: &Arc<Mutex<Database>>) -> Result<Vec<InventoryItem>> {
    let db = db.lock().map_err(|_| Error::Lock)?;
    db.low_stock_items()
}

pub async fn top_customers_by_revenue(
    db: &Arc<Mutex<Database>>,
    limit: usize,
) -> Result<Vec<TopCustomer>> {
    let db = db.lock().map_err(|_| Error::Lock)?;
    db.top_customers_by_revenue(limit)
}

/// Paid revenue per calendar month of invoice creation; months without
/// paid invoices report zero.
pub async fn monthly_revenue(db: &Arc<Mutex<Database>>, year: i32) -> Result<Vec<MonthlyRevenue>> {
    let db = db.lock().map_err(|_| Error::Lock)?;
    let mut months = Vec::with_capacity(12);
    for month in 1..=12 {
        let revenue = db.paid_revenue_for_month(&month_key(year, month))?;
        months.push(MonthlyRevenue { month, revenue });
    }
    Ok(months)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Datelike, Utc};

    use crate::models::{
        CustomerPayload, InvoicePayload, InvoiceStatus, InvoiceUpdate, InventoryPayload, Priority,
        TicketPayload, TicketStatus, TicketUpdate,
    };
    use crate::services::{customers, inventory, invoices, tickets};

    fn test_db() -> Arc<Mutex<Database>> {
        Arc::new(Mutex::new(Database::open_in_memory().unwrap()))
    }

    async fn seed_customer(db: &Arc<Mutex<Database>>, name: &str) -> i64 {
        customers::create_customer(
            db,
            CustomerPayload {
                name: name.to_string(),
                ..CustomerPayload::default()
            },
        )
        .await
        .unwrap()
        .id
    }

    async fn seed_ticket(db: &Arc<Mutex<Database>>, customer_id: i64) -> i64 {
        tickets::create_ticket(
            db,
            TicketPayload {
                customer_id,
                device_type: "Phone".into(),
                device_model: None,
                issue_description: "Broken glass".into(),
                status: None,
                priority: Priority::Medium,
                estimated_cost: None,
                technician: None,
                notes: None,
            },
        )
        .await
        .unwrap()
        .id
    }

    async fn seed_paid_invoice(db: &Arc<Mutex<Database>>, customer_id: i64, amount: f64) {
        let invoice = invoices::create_invoice(
            db,
            InvoicePayload {
                ticket_id: None,
                customer_id,
                amount,
                tax_amount: 0.0,
                due_date: None,
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
    async fn aggregates_count_tickets_and_paid_invoices_only() {
        let db = test_db();
        let customer_id = seed_customer(&db, "Hana").await;
        seed_ticket(&db, customer_id).await;
        seed_ticket(&db, customer_id).await;
        seed_paid_invoice(&db, customer_id, 120.0).await;
        // Pending invoice must not count toward total_spent.
        invoices::create_invoice(
            &db,
            InvoicePayload {
                ticket_id: None,
                customer_id,
                amount: 999.0,
                tax_amount: 0.0,
                due_date: None,
                notes: None,
            },
        )
        .await
        .unwrap();

        let aggregates = customer_aggregates(&db, customer_id).await.unwrap();
        assert_eq!(aggregates.ticket_count, 2);
        assert_eq!(aggregates.total_spent, 120.0);
    }

    #[tokio::test]
    async fn dashboard_reflects_paid_revenue_and_completions() {
        let db = test_db();
        let customer_id = seed_customer(&db, "Ivan").await;
        let ticket_id = seed_ticket(&db, customer_id).await;
        seed_ticket(&db, customer_id).await;
        seed_paid_invoice(&db, customer_id, 300.0).await;

        let before = dashboard_stats(&db).await.unwrap();
        assert_eq!(before.total_revenue, 300.0);
        assert_eq!(before.active_tickets, 2);
        assert_eq!(before.total_customers, 1);
        assert_eq!(before.completed_today, 0);

        let ticket = tickets::get_ticket(&db, ticket_id).await.unwrap();
        tickets::update_ticket(
            &db,
            ticket_id,
            TicketUpdate {
                device_type: ticket.device_type,
                device_model: ticket.device_model,
                issue_description: ticket.issue_description,
                status: TicketStatus::Completed,
                priority: ticket.priority,
                estimated_cost: ticket.estimated_cost,
                actual_cost: Some(95.0),
                technician: None,
                notes: None,
            },
        )
        .await
        .unwrap();

        let after = dashboard_stats(&db).await.unwrap();
        assert_eq!(after.active_tickets, 1);
        assert_eq!(after.completed_today, 1);
    }

    #[tokio::test]
    async fn low_stock_is_ordered_by_quantity() {
        let db = test_db();
        for (name, sku, quantity, min_quantity) in [
            ("Battery", "BAT-1", 2, 5),
            ("Screen", "SCR-1", 0, 3),
            ("Cable", "CAB-1", 50, 5),
        ] {
            inventory::create_item(
                &db,
                InventoryPayload {
                    name: name.into(),
                    category: None,
                    description: None,
                    sku: Some(sku.into()),
                    quantity,
                    min_quantity,
                    cost_price: None,
                    sell_price: None,
                    supplier: None,
                    location: None,
                },
            )
            .await
            .unwrap();
        }

        let low: Vec<String> = low_stock_items(&db)
            .await
            .unwrap()
            .into_iter()
            .map(|item| item.name)
            .collect();
        assert_eq!(low, vec!["Screen", "Battery"]);
    }

    #[tokio::test]
    async fn top_customers_sort_by_spend_with_id_tiebreak() {
        let db = test_db();
        let first = seed_customer(&db, "Jo").await;
        let second = seed_customer(&db, "Kim").await;
        let third = seed_customer(&db, "Lou").await;
        seed_paid_invoice(&db, second, 500.0).await;
        seed_paid_invoice(&db, first, 200.0).await;
        seed_paid_invoice(&db, third, 200.0).await;

        let top = top_customers_by_revenue(&db, 2).await.unwrap();
        assert_eq!(top.len(), 2);
        assert_eq!(top[0].id, second);
        // Equal spend resolves by ascending id.
        assert_eq!(top[1].id, first);
    }

    #[tokio::test]
    async fn monthly_revenue_zero_fills_empty_months() {
        let db = test_db();
        let customer_id = seed_customer(&db, "Mia").await;
        seed_paid_invoice(&db, customer_id, 150.0).await;

        let now = Utc::now();
        let months = monthly_revenue(&db, now.year()).await.unwrap();
        assert_eq!(months.len(), 12);
        let current = &months[now.month() as usize - 1];
        assert_eq!(current.revenue, 150.0);
        let other_total: f64 = months
            .iter()
            .filter(|m| m.month != now.month())
            .map(|m| m.revenue)
            .sum();
        assert_eq!(other_total, 0.0);

        let empty_year = monthly_revenue(&db, now.year() - 1).await.unwrap();
        assert!(empty_year.iter().all(|m| m.revenue == 0.0));
    }
}
