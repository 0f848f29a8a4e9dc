//! Transaction sync: pull booked transactions for each linked aggregator
//! account and push the ones the ledger does not have yet.

use std::collections::HashSet;
use std::sync::Arc;

use chrono::{DateTime, Duration, NaiveDate, Utc};
use tokio::sync::Mutex;

use super::transform::to_ledger_transaction;
use crate::models::aggregator::RateLimit;
use crate::models::ledger::LedgerTransaction;
use crate::models::link::AccountLink;
use crate::models::sync::{next_sync_after, SyncOutcome, SyncResult, SyncStatusView};
use crate::store::{LinkStore, StoreError, SyncStatusStore};
use crate::upstream::aggregator::AggregatorError;
use crate::upstream::{AggregatorClient, LedgerClient, UpstreamError};

#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    #[error(transparent)]
    Aggregator(#[from] AggregatorError),

    #[error(transparent)]
    Ledger(#[from] UpstreamError),

    #[error("sync storage failed: {0}")]
    Storage(#[from] StoreError),
}

/// Counts from one account's successful pass.
struct AccountPass {
    fetched: usize,
    inserted: usize,
    rate_limit: RateLimit,
    rate_limited: bool,
}

pub struct SyncService {
    links: Arc<dyn LinkStore>,
    status: Arc<SyncStatusStore>,
    aggregator: AggregatorClient,
    ledger: LedgerClient,
    days_to_sync: i64,
    /// Step of the scheduled-sync grid; `None` when disabled.
    schedule: Option<Duration>,
    // one run at a time; a second trigger waits for the first
    run_lock: Mutex<()>,
}

impl SyncService {
    pub fn new(
        links: Arc<dyn LinkStore>,
        status: Arc<SyncStatusStore>,
        aggregator: AggregatorClient,
        ledger: LedgerClient,
        days_to_sync: i64,
    ) -> Self {
        Self {
            links,
            status,
            aggregator,
            ledger,
            days_to_sync,
            schedule: None,
            run_lock: Mutex::new(()),
        }
    }

    /// Run scheduled syncs on the UTC grid of `every`.
    pub fn with_schedule(mut self, every: Option<Duration>) -> Self {
        self.schedule = every;
        self
    }

    pub fn schedule(&self) -> Option<Duration> {
        self.schedule
    }

    /// When the next scheduled sync runs, as seen from `now`.
    pub fn next_run_after(&self, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        self.schedule.map(|step| next_sync_after(now, step))
    }

    /// Sync every linked account, or only the one with `account_id`.
    ///
    /// A failing account is recorded as `error` and the run moves on; only
    /// failures to read the link table or write status abort the run.
    pub async fn sync(&self, account_id: Option<&str>) -> Result<Vec<SyncOutcome>, SyncError> {
        let _guard = self.run_lock.lock().await;
        let record = self.links.read_links().await?;
        let now = Utc::now();

        let selected: Vec<&AccountLink> = record
            .links
            .iter()
            .filter(|l| account_id.map_or(true, |id| l.aggregator_account_id == id))
            .collect();

        if selected.is_empty() {
            tracing::info!(?account_id, "no linked accounts to sync");
        }

        let mut outcomes = Vec::with_capacity(selected.len());
        for link in selected {
            outcomes.push(self.sync_account(link, now).await?);
        }
        Ok(outcomes)
    }

    async fn sync_account(
        &self,
        link: &AccountLink,
        now: DateTime<Utc>,
    ) -> Result<SyncOutcome, SyncError> {
        let account_id = link.aggregator_account_id.as_str();
        tracing::info!(account_id, ledger_asset_id = link.ledger_asset_id, "syncing account");

        self.status
            .update(account_id, |s| {
                s.is_syncing = true;
                s.last_sync_status = Some(SyncResult::Pending);
            })
            .await?;

        let outcome = match self.pass(link, now).await {
            Ok(pass) => {
                self.status
                    .update(account_id, |s| {
                        s.last_sync = Some(Utc::now());
                        s.last_sync_status = Some(SyncResult::Success);
                        s.last_sync_transactions = pass.fetched;
                        s.is_syncing = false;
                        s.rate_limit = Some(pass.rate_limit.clone());
                    })
                    .await?;
                tracing::info!(
                    account_id,
                    fetched = pass.fetched,
                    inserted = pass.inserted,
                    rate_limited = pass.rate_limited,
                    "account synced"
                );
                SyncOutcome {
                    gocardless_id: account_id.to_string(),
                    lunchmoney_id: link.ledger_asset_id,
                    status: SyncResult::Success,
                    fetched: pass.fetched,
                    inserted: pass.inserted,
                    rate_limited: pass.rate_limited,
                    error: None,
                }
            }
            Err(e) => {
                tracing::error!(account_id, error = %e, "sync failed");
                self.status
                    .update(account_id, |s| {
                        s.last_sync = Some(now);
                        s.last_sync_status = Some(SyncResult::Error);
                        s.is_syncing = false;
                    })
                    .await?;
                SyncOutcome {
                    gocardless_id: account_id.to_string(),
                    lunchmoney_id: link.ledger_asset_id,
                    status: SyncResult::Error,
                    fetched: 0,
                    inserted: 0,
                    rate_limited: false,
                    error: Some(e.to_string()),
                }
            }
        };
        Ok(outcome)
    }

    async fn pass(&self, link: &AccountLink, now: DateTime<Utc>) -> Result<AccountPass, SyncError> {
        let date_from = (now - Duration::days(self.days_to_sync)).date_naive();
        let fetch = self
            .aggregator
            .get_transactions(&link.aggregator_account_id, date_from)
            .await?;

        let transactions: Vec<LedgerTransaction> = fetch
            .transactions
            .booked
            .iter()
            .filter_map(|tx| match to_ledger_transaction(tx, link.ledger_asset_id) {
                Ok(t) => Some(t),
                Err(e) => {
                    tracing::warn!(account_id = %link.aggregator_account_id, error = %e, "skipping transaction");
                    None
                }
            })
            .collect();

        let fetched = transactions.len();
        let inserted = self.push_new(link.ledger_asset_id, transactions).await?;

        Ok(AccountPass {
            fetched,
            inserted,
            rate_limit: fetch.rate_limit,
            rate_limited: fetch.rate_limited,
        })
    }

    /// Insert the transactions whose `external_id` the ledger does not know
    /// within their date window. Returns how many were inserted.
    async fn push_new(
        &self,
        asset_id: i64,
        transactions: Vec<LedgerTransaction>,
    ) -> Result<usize, SyncError> {
        let dates: Vec<NaiveDate> = transactions
            .iter()
            .filter_map(|t| NaiveDate::parse_from_str(&t.date, "%Y-%m-%d").ok())
            .collect();
        let (Some(start), Some(end)) = (dates.iter().min(), dates.iter().max()) else {
            return Ok(0);
        };

        let existing: HashSet<String> = self
            .ledger
            .list_transactions(asset_id, *start, *end)
            .await?
            .into_iter()
            .filter_map(|t| t.external_id)
            .collect();

        let fresh: Vec<LedgerTransaction> = transactions
            .into_iter()
            .filter(|t| !existing.contains(&t.external_id))
            .collect();

        if fresh.is_empty() {
            tracing::info!(asset_id, "no new transactions");
            return Ok(0);
        }

        let ids = self.ledger.insert_transactions(&fresh).await?;
        Ok(ids.len())
    }

    /// Status of every linked account, with the ledger asset name resolved.
    pub async fn status_overview(&self) -> Result<Vec<SyncStatusView>, SyncError> {
        let record = self.links.read_links().await?;
        let mut statuses = self.status.all().await?;
        let assets = self.ledger.list_assets().await?;
        let next_sync = self.next_run_after(Utc::now());

        Ok(record
            .links
            .into_iter()
            .map(|link| {
                let lunchmoney_name = assets
                    .iter()
                    .find(|a| a.id == link.ledger_asset_id)
                    .map(|a| a.label().to_string())
                    .unwrap_or_else(|| "Unknown Account".to_string());
                SyncStatusView {
                    status: statuses
                        .remove(&link.aggregator_account_id)
                        .unwrap_or_default(),
                    gocardless_id: link.aggregator_account_id,
                    lunchmoney_id: link.ledger_asset_id,
                    lunchmoney_name,
                    next_sync,
                }
            })
            .collect())
    }
}

impl std::fmt::Debug for SyncService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncService")
            .field("days_to_sync", &self.days_to_sync)
            .field("schedule", &self.schedule)
            .finish_non_exhaustive()
    }
}
