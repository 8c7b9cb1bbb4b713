//! Core engine for a single-shop repair business: customers, repair
//! tickets, inventory, invoices and derived reporting over a local SQLite
//! store. The UI shell is an external caller; it invokes one operation per
//! user action and re-reads derived aggregates afterwards.

pub mod db;
pub mod error;
pub mod models;
pub mod services;
pub mod utils;

pub use error::{Error, Result};
