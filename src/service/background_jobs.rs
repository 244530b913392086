// service/background_jobs.rs
use std::sync::Arc;

use chrono::Utc;
use tokio::time::{interval, Duration};

use crate::AppState;

/// Every 10 minutes, settles or fails pending checkouts the client abandoned.
pub async fn start_payment_reconciliation_job(app_state: Arc<AppState>) {
    let mut interval = interval(Duration::from_secs(600));

    loop {
        interval.tick().await;

        tracing::info!("Running payment reconciliation at {}", Utc::now());

        match app_state.payment_service.reconcile_pending_payments().await {
            Ok(report) => tracing::info!(
                "Payment reconciliation done: checked {}, settled {}, failed {}, pending {}, errors {}",
                report.checked,
                report.settled,
                report.failed,
                report.still_pending,
                report.errors
            ),
            Err(e) => tracing::error!("Payment reconciliation failed: {}", e),
        }
    }
}

/// Logs pool usage and warns when it nears capacity.
pub async fn start_pool_monitor(app_state: Arc<AppState>) {
    let max_connections = app_state.env.database_max_connections;
    let mut interval = interval(Duration::from_secs(30));

    loop {
        interval.tick().await;

        let pool = &app_state.db_client.pool;
        let size = pool.size();
        let idle = pool.num_idle() as u32;
        tracing::debug!(
            "Pool status - active: {}, idle: {}, total: {}",
            size.saturating_sub(idle),
            idle,
            size
        );

        if size >= max_connections * 8 / 10 {
            tracing::warn!("Connection pool at 80% capacity, consider raising DATABASE_MAX_CONNECTIONS");
        }
    }
}
