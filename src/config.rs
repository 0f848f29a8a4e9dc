use std::path::PathBuf;
use std::time::Duration;

use anyhow::Context;
use zeroize::Zeroizing;

use crate::upstream::AggregatorCredentials;

pub const DEFAULT_AGGREGATOR_URL: &str = "https://bankaccountdata.gocardless.com/api/v2";
pub const DEFAULT_LEDGER_URL: &str = "https://dev.lunchmoney.app/v1";

/// The aggregator serves at most two years of transaction history.
pub const MAX_DAYS_TO_SYNC: i64 = 730;
pub const MAX_SYNC_INTERVAL_SECS: u64 = 7 * 24 * 60 * 60;

pub struct Config {
    pub port: u16,
    pub aggregator_base_url: String,
    pub aggregator_secret_id: Option<String>,
    pub aggregator_secret_key: Option<Zeroizing<String>>,
    pub ledger_base_url: String,
    pub ledger_access_token: Option<Zeroizing<String>>,
    /// Directory holding `account-links.json` and `sync-status.json`.
    pub data_dir: PathBuf,
    /// Origin of the frontend allowed by CORS, besides localhost.
    pub frontend_origin: String,
    pub http_timeout: Duration,
    /// Interval of the background sync job. `None` disables it.
    pub sync_interval: Option<Duration>,
    /// How far back each sync looks for transactions.
    pub days_to_sync: i64,
}

impl Config {
    pub fn aggregator_credentials(&self) -> anyhow::Result<AggregatorCredentials> {
        let secret_id = self
            .aggregator_secret_id
            .clone()
            .context("GOCARDLESS_SECRET_ID is not set")?;
        let secret_key = self
            .aggregator_secret_key
            .clone()
            .context("GOCARDLESS_SECRET_KEY is not set")?;
        Ok(AggregatorCredentials {
            secret_id,
            secret_key,
        })
    }

    pub fn ledger_token(&self) -> anyhow::Result<Zeroizing<String>> {
        self.ledger_access_token
            .clone()
            .context("LUNCHMONEY_ACCESS_TOKEN is not set")
    }

    /// Build from an arbitrary variable lookup; `load` passes the process
    /// environment.
    pub fn from_vars<F>(var: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| var(key).filter(|v| !v.trim().is_empty());
        let parse_or = |key: &str, default: u64| -> anyhow::Result<u64> {
            match non_empty(key) {
                Some(v) => v
                    .trim()
                    .parse()
                    .with_context(|| format!("{} must be a non-negative integer, got '{}'", key, v)),
                None => Ok(default),
            }
        };

        let port = parse_or("LEDGERLINK_PORT", 3000)?;
        let port = u16::try_from(port).context("LEDGERLINK_PORT is out of range")?;
        let sync_secs = parse_or("SYNC_INTERVAL_SECS", 3 * 60 * 60)?;
        if sync_secs > MAX_SYNC_INTERVAL_SECS {
            anyhow::bail!(
                "SYNC_INTERVAL_SECS must be at most {}, got {}",
                MAX_SYNC_INTERVAL_SECS,
                sync_secs
            );
        }
        let days_to_sync = parse_or("DAYS_TO_SYNC", 14)?;
        let days_to_sync = i64::try_from(days_to_sync)
            .ok()
            .filter(|d| *d <= MAX_DAYS_TO_SYNC)
            .with_context(|| {
                format!(
                    "DAYS_TO_SYNC must be at most {}, got {}",
                    MAX_DAYS_TO_SYNC, days_to_sync
                )
            })?;

        Ok(Config {
            port,
            aggregator_base_url: non_empty("GOCARDLESS_API_URL")
                .unwrap_or_else(|| DEFAULT_AGGREGATOR_URL.into()),
            aggregator_secret_id: non_empty("GOCARDLESS_SECRET_ID")
                .or_else(|| non_empty("VITE_SECRET_ID")),
            aggregator_secret_key: non_empty("GOCARDLESS_SECRET_KEY")
                .or_else(|| non_empty("VITE_SECRET_KEY"))
                .map(Zeroizing::new),
            ledger_base_url: non_empty("LUNCHMONEY_API_URL")
                .unwrap_or_else(|| DEFAULT_LEDGER_URL.into()),
            ledger_access_token: non_empty("LUNCHMONEY_ACCESS_TOKEN").map(Zeroizing::new),
            data_dir: non_empty("LEDGERLINK_DATA_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("data")),
            frontend_origin: non_empty("FRONTEND_ORIGIN")
                .unwrap_or_else(|| "http://localhost:5173".into()),
            http_timeout: Duration::from_secs(parse_or("HTTP_TIMEOUT_SECS", 30)?),
            sync_interval: (sync_secs > 0).then(|| Duration::from_secs(sync_secs)),
            days_to_sync,
        })
    }
}

impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("port", &self.port)
            .field("aggregator_base_url", &self.aggregator_base_url)
            .field("aggregator_secret_id", &self.aggregator_secret_id)
            .field("ledger_base_url", &self.ledger_base_url)
            .field("data_dir", &self.data_dir)
            .field("frontend_origin", &self.frontend_origin)
            .field("http_timeout", &self.http_timeout)
            .field("sync_interval", &self.sync_interval)
            .field("days_to_sync", &self.days_to_sync)
            .finish_non_exhaustive()
    }
}

pub fn load() -> anyhow::Result<Config> {
    dotenvy::dotenv().ok();
    Config::from_vars(|key| std::env::var(key).ok())
}
