//! FieldDispatch -- dispatch engine for dealership field-service jobs.
//!
//! This crate provides the core library for job ranking (base urgency
//! weights plus dealership priority rules), the in-memory dispatch queue
//! that offers ranked jobs to technicians, and the HTTP API around both.

pub mod api;
pub mod config;
pub mod queue;
pub mod ranking;
pub mod storage;

use std::sync::Arc;

use anyhow::Result;

/// Start the FieldDispatch daemon: API server, dispatch queue, and rule store.
pub async fn serve(bind: &str, db_path: &str, config: config::DispatchConfig) -> Result<()> {
    // 1. Initialize storage (rule store + dispatch audit log)
    tracing::info!(%db_path, "Initializing database");
    let pool = storage::open_pool(db_path)?;

    // 2. Domain state: the pending-offer queue and the ranking calculator
    let queue = queue::DispatchQueue::new();
    let calculator = Arc::new(ranking::RankingCalculator::new(config.ranking.clone()));

    // 3. Start API server
    let state = api::state::AppState {
        pool,
        queue,
        calculator,
    };
    let addr: std::net::SocketAddr = bind.parse()?;
    let app = api::router(state);

    tracing::info!(%addr, "FieldDispatch listening");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
