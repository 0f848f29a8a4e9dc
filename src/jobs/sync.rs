//! Background job: sync every linked account on the UTC grid of the
//! configured interval.
//!
//! Each wake-up is computed with [`SyncService::next_run_after`], the same
//! schedule `GET /sync/status` reports as `nextSync`. A run that overruns a
//! boundary skips it; the job then waits for the following one.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::task::JoinHandle;
use tokio::time;

use crate::models::sync::SyncResult;
use crate::services::SyncService;

/// Spawn the scheduled sync task. Call this once at startup. Returns `None`
/// when the service has no schedule.
pub fn spawn(sync: Arc<SyncService>) -> Option<JoinHandle<()>> {
    sync.schedule()?;
    Some(tokio::spawn(async move {
        let mut after = Utc::now();
        while let Some(next) = sync.next_run_after(after) {
            tracing::debug!(next_run = %next, "scheduled sync waiting");
            time::sleep(delay_until(next, Utc::now())).await;
            run_once(&sync).await;
            // a timer that fires early must not run the same boundary twice
            after = Utc::now().max(next);
        }
    }))
}

/// Wall-clock wait until `next`; zero if it already passed.
fn delay_until(next: DateTime<Utc>, now: DateTime<Utc>) -> std::time::Duration {
    (next - now).to_std().unwrap_or_default()
}

async fn run_once(sync: &SyncService) {
    tracing::info!("scheduled sync starting");
    match sync.sync(None).await {
        Ok(outcomes) => {
            let failed = outcomes
                .iter()
                .filter(|o| o.status == SyncResult::Error)
                .count();
            tracing::info!(accounts = outcomes.len(), failed, "scheduled sync finished");
        }
        Err(e) => tracing::error!("scheduled sync failed: {}", e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_delay_until_future_and_past() {
        let now = Utc::now();
        assert_eq!(
            delay_until(now + Duration::seconds(90), now),
            std::time::Duration::from_secs(90)
        );
        assert_eq!(delay_until(now - Duration::seconds(5), now), std::time::Duration::ZERO);
    }
}
