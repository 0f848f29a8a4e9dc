//! Link / unlink orchestration over a [`LinkStore`], and the asset listing
//! annotated with link state.

use std::sync::Arc;

use chrono::Utc;
use tokio::sync::Mutex;

use crate::models::ledger::LinkedAsset;
use crate::models::link::LinkRecord;
use crate::store::{LinkStore, StoreError};
use crate::upstream::{LedgerClient, UpstreamError};

#[derive(Debug, thiserror::Error)]
pub enum LinkingError {
    #[error("failed to fetch ledger assets: {0}")]
    Ledger(#[from] UpstreamError),

    #[error("link storage failed: {0}")]
    Storage(#[from] StoreError),
}

#[derive(Clone)]
pub struct LinkingService {
    store: Arc<dyn LinkStore>,
    ledger: LedgerClient,
    // load → mutate → save runs as one critical section per service
    write_lock: Arc<Mutex<()>>,
}

impl LinkingService {
    pub fn new(store: Arc<dyn LinkStore>, ledger: LedgerClient) -> Self {
        Self {
            store,
            ledger,
            write_lock: Arc::new(Mutex::new(())),
        }
    }

    pub async fn links(&self) -> Result<LinkRecord, LinkingError> {
        Ok(self.store.read_links().await?)
    }

    /// Every ledger asset, in upstream order, with the aggregator account it
    /// is linked to (or `None`).
    pub async fn list_ledger_assets_with_linkage(&self) -> Result<Vec<LinkedAsset>, LinkingError> {
        let assets = self.ledger.list_assets().await?;
        let record = self.store.read_links().await?;

        Ok(assets
            .into_iter()
            .map(|asset| LinkedAsset {
                linked_account: record.linked_account(asset.id).map(str::to_string),
                asset,
            })
            .collect())
    }

    /// Link a ledger asset to an aggregator account, releasing any previous
    /// partner of either side.
    pub async fn link_accounts(
        &self,
        ledger_asset_id: i64,
        aggregator_account_id: &str,
    ) -> Result<(), LinkingError> {
        let _guard = self.write_lock.lock().await;
        let mut record = self.store.read_links().await?;
        let previous_account = record.linked_account(ledger_asset_id).map(str::to_string);
        let previous_asset = record.linked_asset(aggregator_account_id);

        record.link(ledger_asset_id, aggregator_account_id, Utc::now());
        self.store.write_links(&record).await?;

        tracing::info!(
            ledger_asset_id,
            aggregator_account_id,
            ?previous_account,
            ?previous_asset,
            "accounts linked"
        );
        Ok(())
    }

    /// Remove the link of a ledger asset. When `aggregator_account_id` is
    /// given only that exact pair is removed. Unlinking something that is not
    /// linked is a no-op. Returns the number of links removed.
    pub async fn unlink_accounts(
        &self,
        ledger_asset_id: i64,
        aggregator_account_id: Option<&str>,
    ) -> Result<usize, LinkingError> {
        let _guard = self.write_lock.lock().await;
        let mut record = self.store.read_links().await?;
        let removed = record.unlink(ledger_asset_id, aggregator_account_id);

        if removed > 0 {
            self.store.write_links(&record).await?;
            tracing::info!(ledger_asset_id, ?aggregator_account_id, "accounts unlinked");
        } else {
            tracing::debug!(ledger_asset_id, "unlink requested for an unlinked asset");
        }
        Ok(removed)
    }
}

impl std::fmt::Debug for LinkingService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LinkingService")
            .field("ledger", &self.ledger)
            .finish_non_exhaustive()
    }
}
