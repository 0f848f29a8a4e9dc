use std::collections::BTreeMap;

use chrono::{DateTime, Duration, DurationRound, Utc};
use serde::{Deserialize, Serialize};

use super::aggregator::RateLimit;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncResult {
    Pending,
    Success,
    Error,
}

/// Persisted sync state of one aggregator account.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountSyncStatus {
    #[serde(default)]
    pub last_sync: Option<DateTime<Utc>>,
    #[serde(default)]
    pub last_sync_status: Option<SyncResult>,
    #[serde(default)]
    pub last_sync_transactions: usize,
    #[serde(default)]
    pub is_syncing: bool,
    #[serde(default)]
    pub rate_limit: Option<RateLimit>,
}

/// Sync status of every account, keyed by aggregator account id.
pub type SyncStatusRecord = BTreeMap<String, AccountSyncStatus>;

/// What happened to one account during a sync run.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncOutcome {
    pub gocardless_id: String,
    pub lunchmoney_id: i64,
    pub status: SyncResult,
    pub fetched: usize,
    pub inserted: usize,
    /// The aggregator refused the fetch because the account's daily quota
    /// is spent; nothing was synced.
    pub rate_limited: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// One row of `GET /sync/status`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncStatusView {
    pub gocardless_id: String,
    pub lunchmoney_id: i64,
    pub lunchmoney_name: String,
    #[serde(flatten)]
    pub status: AccountSyncStatus,
    /// `None` when scheduled syncing is disabled.
    pub next_sync: Option<DateTime<Utc>>,
}

/// Next run on the UTC grid of `step` (multiples of `step` since the Unix
/// epoch), strictly after `now`. A three-hour step gives 00:00, 03:00, ...
pub fn next_sync_after(now: DateTime<Utc>, step: Duration) -> DateTime<Utc> {
    match now.duration_trunc(step) {
        Ok(floor) => floor + step,
        Err(_) => now + step,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(s: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(s).unwrap().with_timezone(&Utc)
    }

    #[test]
    fn test_next_sync_rounds_up_to_three_hour_boundary() {
        let step = Duration::hours(3);
        assert_eq!(
            next_sync_after(at("2024-06-01T04:10:00Z"), step),
            at("2024-06-01T06:00:00Z")
        );
        assert_eq!(
            next_sync_after(at("2024-06-01T22:59:59Z"), step),
            at("2024-06-02T00:00:00Z")
        );
        // exactly on a boundary moves to the next one
        assert_eq!(
            next_sync_after(at("2024-06-01T09:00:00Z"), step),
            at("2024-06-01T12:00:00Z")
        );
    }

    #[test]
    fn test_next_sync_follows_other_steps() {
        assert_eq!(
            next_sync_after(at("2024-06-01T04:10:00Z"), Duration::hours(1)),
            at("2024-06-01T05:00:00Z")
        );
        assert_eq!(
            next_sync_after(at("2024-06-01T04:10:00Z"), Duration::minutes(45)),
            at("2024-06-01T04:30:00Z")
        );
    }

    #[test]
    fn test_status_wire_names() {
        let status = AccountSyncStatus {
            last_sync_status: Some(SyncResult::Success),
            last_sync_transactions: 3,
            ..Default::default()
        };
        let json = serde_json::to_value(&status).unwrap();
        assert_eq!(json["lastSyncStatus"], "success");
        assert_eq!(json["lastSyncTransactions"], 3);
        assert_eq!(json["isSyncing"], false);
    }
}
