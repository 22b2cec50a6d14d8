//!
//! # Completed-Task Sweep
//!
//! A background loop that periodically deletes every task marked complete,
//! across all owners. The interval comes from `SWEEP_INTERVAL` and the loop
//! lives for as long as the server does.

use std::time::Duration;

use sqlx::PgPool;

use crate::error::AppError;

/// Deletes all completed tasks. Returns how many rows went away.
pub async fn sweep_completed_tasks(pool: &PgPool) -> Result<u64, AppError> {
    let result = sqlx::query("DELETE FROM tasks WHERE complete = TRUE")
        .execute(pool)
        .await?;
    Ok(result.rows_affected())
}

/// Spawns the sweep loop. The first sweep runs one full interval after
/// startup, not immediately.
pub fn spawn_sweeper(pool: PgPool, interval_secs: u64) {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(Duration::from_secs(interval_secs.max(1)));
        // The first tick of a tokio interval fires immediately.
        ticker.tick().await;
        loop {
            ticker.tick().await;
            match sweep_completed_tasks(&pool).await {
                Ok(0) => {}
                Ok(removed) => log::info!("sweep removed {} completed tasks", removed),
                Err(err) => log::error!("completed-task sweep failed: {}", err),
            }
        }
    });
}
