//! ledgerlink: links open-banking accounts to ledger assets and keeps their
//! transactions in sync.
//!
//! The binary in `main.rs` is a thin shell over this library; integration
//! tests in `tests/` build the same [`AppState`] and router.

use std::sync::Arc;

use anyhow::Context;

pub mod api;
pub mod config;
pub mod errors;
pub mod jobs;
pub mod models;
pub mod services;
pub mod store;
pub mod upstream;

use config::Config;
use services::{LinkingService, SyncService};
use store::{FileLinkStore, LinkStore, SyncStatusStore};
use upstream::{AggregatorClient, LedgerClient, TokenManager};

/// Shared application state passed to handlers and jobs.
pub struct AppState {
    pub config: Config,
    pub aggregator: AggregatorClient,
    pub linking: LinkingService,
    pub sync: Arc<SyncService>,
    pub sync_status: Arc<SyncStatusStore>,
}

impl AppState {
    /// Wire every client and service from configuration. Fails when the
    /// aggregator credentials or the ledger token are missing.
    pub fn from_config(config: Config) -> anyhow::Result<Arc<Self>> {
        let http = upstream::http_client(config.http_timeout)?;

        let tokens = Arc::new(TokenManager::new(
            http.clone(),
            config.aggregator_base_url.clone(),
            config.aggregator_credentials()?,
        ));
        let aggregator =
            AggregatorClient::new(http.clone(), config.aggregator_base_url.clone(), tokens);
        let ledger = LedgerClient::new(http, config.ledger_base_url.clone(), config.ledger_token()?);

        let links: Arc<dyn LinkStore> = Arc::new(FileLinkStore::in_dir(config.data_dir.clone()));
        let sync_status = Arc::new(SyncStatusStore::in_dir(config.data_dir.clone()));

        let linking = LinkingService::new(links.clone(), ledger.clone());
        let schedule = config
            .sync_interval
            .map(chrono::Duration::from_std)
            .transpose()
            .context("SYNC_INTERVAL_SECS is out of range")?;
        let sync = Arc::new(
            SyncService::new(
                links,
                sync_status.clone(),
                aggregator.clone(),
                ledger,
                config.days_to_sync,
            )
            .with_schedule(schedule),
        );

        Ok(Arc::new(AppState {
            config,
            aggregator,
            linking,
            sync,
            sync_status,
        }))
    }
}

/// The HTTP application for `state`.
pub fn app(state: Arc<AppState>) -> axum::Router {
    api::router(state)
}
