use std::path::PathBuf;

use anyhow::Result;

use techrepairs::services::{reports, state::AppState};

/// Headless shell: opens the store, reports its state, and exits. The
/// desktop front end drives the same operation surface.
#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let data_dir = std::env::var("TECHREPAIRS_DATA")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("data"));
    std::fs::create_dir_all(&data_dir)?;

    let state = AppState::open(data_dir.join("techrepairs.db"))?;

    let stats = reports::dashboard_stats(&state.db).await?;
    let low_stock = reports::low_stock_items(&state.db).await?;
    tracing::info!(
        total_revenue = stats.total_revenue,
        active_tickets = stats.active_tickets,
        total_customers = stats.total_customers,
        completed_today = stats.completed_today,
        low_stock_items = low_stock.len(),
        "store ready"
    );

    state.close()?;
    Ok(())
}
