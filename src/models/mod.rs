use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSqlOutput, ValueRef};
use rusqlite::ToSql;
use serde::{Deserialize, Serialize};

use crate::error::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TicketStatus {
    Open,
    #[serde(rename = "In Progress")]
    InProgress,
    #[serde(rename = "Waiting for Parts")]
    WaitingForParts,
    Completed,
}

impl TicketStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TicketStatus::Open => "Open",
            TicketStatus::InProgress => "In Progress",
            TicketStatus::WaitingForParts => "Waiting for Parts",
            TicketStatus::Completed => "Completed",
        }
    }
}

impl FromStr for TicketStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Open" => Ok(TicketStatus::Open),
            "In Progress" => Ok(TicketStatus::InProgress),
            "Waiting for Parts" => Ok(TicketStatus::WaitingForParts),
            "Completed" => Ok(TicketStatus::Completed),
            other => Err(Error::InvalidOperation(format!(
                "unknown ticket status: {other}"
            ))),
        }
    }
}

impl fmt::Display for TicketStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Priority {
    Low,
    Medium,
    High,
}

impl Priority {
    pub fn as_str(&self) -> &'static str {
        match self {
            Priority::Low => "Low",
            Priority::Medium => "Medium",
            Priority::High => "High",
        }
    }
}

impl Default for Priority {
    fn default() -> Self {
        Priority::Medium
    }
}

impl FromStr for Priority {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Low" => Ok(Priority::Low),
            "Medium" => Ok(Priority::Medium),
            "High" => Ok(Priority::High),
            other => Err(Error::InvalidOperation(format!(
                "unknown priority: {other}"
            ))),
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum InvoiceStatus {
    Pending,
    Paid,
    Overdue,
}

impl InvoiceStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            InvoiceStatus::Pending => "Pending",
            InvoiceStatus::Paid => "Paid",
            InvoiceStatus::Overdue => "Overdue",
        }
    }
}

impl FromStr for InvoiceStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Pending" => Ok(InvoiceStatus::Pending),
            "Paid" => Ok(InvoiceStatus::Paid),
            "Overdue" => Ok(InvoiceStatus::Overdue),
            other => Err(Error::InvalidOperation(format!(
                "unknown invoice status: {other}"
            ))),
        }
    }
}

impl fmt::Display for InvoiceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

macro_rules! sql_text_enum {
    ($ty:ty) => {
        impl ToSql for $ty {
            fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
                Ok(ToSqlOutput::from(self.as_str()))
            }
        }

        impl FromSql for $ty {
            fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
                value
                    .as_str()?
                    .parse()
                    .map_err(|e: Error| FromSqlError::Other(Box::new(e)))
            }
        }
    };
}

sql_text_enum!(TicketStatus);
sql_text_enum!(Priority);
sql_text_enum!(InvoiceStatus);

/// Customer row plus the derived aggregates every customer read carries.
/// `ticket_count` and `total_spent` are computed per read, never stored.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Customer {
    pub id: i64,
    pub name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub notes: Option<String>,
    pub created_at: String,
    pub updated_at: String,
    pub ticket_count: i64,
    pub total_spent: f64,
}

/// Ticket row denormalized with its customer's contact fields.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Ticket {
    pub id: i64,
    pub customer_id: i64,
    pub device_type: String,
    pub device_model: Option<String>,
    pub issue_description: String,
    pub status: TicketStatus,
    pub priority: Priority,
    pub estimated_cost: Option<f64>,
    pub actual_cost: Option<f64>,
    pub technician: Option<String>,
    pub notes: Option<String>,
    pub created_at: String,
    pub updated_at: String,
    pub completed_at: Option<String>,
    pub customer_name: Option<String>,
    pub customer_email: Option<String>,
    pub customer_phone: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TicketHistoryEntry {
    pub id: i64,
    pub ticket_id: i64,
    pub status_from: TicketStatus,
    pub status_to: TicketStatus,
    pub notes: Option<String>,
    pub created_at: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InventoryItem {
    pub id: i64,
    pub name: String,
    pub category: Option<String>,
    pub description: Option<String>,
    pub sku: Option<String>,
    pub quantity: i64,
    pub min_quantity: i64,
    pub cost_price: Option<f64>,
    pub sell_price: Option<f64>,
    pub supplier: Option<String>,
    pub location: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl InventoryItem {
    pub fn is_low_stock(&self) -> bool {
        self.quantity <= self.min_quantity
    }
}

/// Invoice row denormalized with customer contact fields from the join.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Invoice {
    pub id: i64,
    pub ticket_id: Option<i64>,
    pub customer_id: i64,
    pub invoice_number: String,
    pub amount: f64,
    pub tax_amount: f64,
    pub total_amount: f64,
    pub status: InvoiceStatus,
    pub due_date: Option<String>,
    pub paid_date: Option<String>,
    pub payment_method: Option<String>,
    pub notes: Option<String>,
    pub created_at: String,
    pub customer_name: Option<String>,
    pub customer_email: Option<String>,
    pub customer_address: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InvoiceLineItem {
    pub id: i64,
    pub invoice_id: i64,
    pub description: String,
    pub quantity: i64,
    pub unit_price: f64,
    pub total_price: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InvoiceDetail {
    pub invoice: Invoice,
    pub items: Vec<InvoiceLineItem>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CustomerAggregates {
    pub ticket_count: i64,
    pub total_spent: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DashboardStats {
    pub total_revenue: f64,
    pub active_tickets: i64,
    pub total_customers: i64,
    pub completed_today: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonthlyRevenue {
    pub month: u32,
    pub revenue: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TopCustomer {
    pub id: i64,
    pub name: String,
    pub email: Option<String>,
    pub total_spent: f64,
    pub ticket_count: i64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CustomerPayload {
    pub name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TicketPayload {
    pub customer_id: i64,
    pub device_type: String,
    pub device_model: Option<String>,
    pub issue_description: String,
    #[serde(default)]
    pub status: Option<TicketStatus>,
    #[serde(default)]
    pub priority: Priority,
    pub estimated_cost: Option<f64>,
    pub technician: Option<String>,
    pub notes: Option<String>,
}

/// Full-field overwrite applied by `update_ticket`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TicketUpdate {
    pub device_type: String,
    pub device_model: Option<String>,
    pub issue_description: String,
    pub status: TicketStatus,
    pub priority: Priority,
    pub estimated_cost: Option<f64>,
    pub actual_cost: Option<f64>,
    pub technician: Option<String>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InventoryPayload {
    pub name: String,
    pub category: Option<String>,
    pub description: Option<String>,
    pub sku: Option<String>,
    #[serde(default)]
    pub quantity: i64,
    #[serde(default = "default_min_quantity")]
    pub min_quantity: i64,
    pub cost_price: Option<f64>,
    pub sell_price: Option<f64>,
    pub supplier: Option<String>,
    pub location: Option<String>,
}

fn default_min_quantity() -> i64 {
    5
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InvoicePayload {
    pub ticket_id: Option<i64>,
    pub customer_id: i64,
    pub amount: f64,
    #[serde(default)]
    pub tax_amount: f64,
    pub due_date: Option<String>,
    pub notes: Option<String>,
}

/// Partial invoice update; `None` leaves a field unchanged. Supplying
/// amount and/or tax recomputes the total from the merged pair.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct InvoiceUpdate {
    pub amount: Option<f64>,
    pub tax_amount: Option<f64>,
    pub status: Option<InvoiceStatus>,
    pub due_date: Option<String>,
    pub paid_date: Option<String>,
    pub payment_method: Option<String>,
    pub notes: Option<String>,
}

/// Full-state export document. Line items and ticket history are cleared on
/// restore but not carried in the snapshot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Snapshot {
    pub customers: Vec<Customer>,
    pub tickets: Vec<Ticket>,
    pub inventory: Vec<InventoryItem>,
    pub invoices: Vec<Invoice>,
    pub settings: BTreeMap<String, String>,
    pub timestamp: String,
}
