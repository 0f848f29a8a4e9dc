//! Typed clients for the two upstream REST APIs and the aggregator token
//! lifecycle.

pub mod aggregator;
pub mod error;
pub mod ledger;
pub mod token;

use std::time::Duration;

use serde::de::DeserializeOwned;

pub use aggregator::AggregatorClient;
pub use error::UpstreamError;
pub use ledger::LedgerClient;
pub use token::{AggregatorCredentials, TokenError, TokenManager};

/// Build the shared HTTP client used for both upstreams.
pub fn http_client(timeout: Duration) -> anyhow::Result<reqwest::Client> {
    let client = reqwest::Client::builder()
        .use_rustls_tls()
        .pool_max_idle_per_host(8)
        .timeout(timeout)
        .connect_timeout(Duration::from_secs(5))
        .user_agent(concat!("ledgerlink/", env!("CARGO_PKG_VERSION")))
        .build()?;
    Ok(client)
}

/// Send a request and return the raw response if it is 2xx.
pub(crate) async fn send(
    service: &'static str,
    action: &str,
    req: reqwest::RequestBuilder,
) -> Result<reqwest::Response, UpstreamError> {
    let resp = req.send().await.map_err(|e| {
        tracing::warn!(service, action, error = %e, "upstream request failed");
        UpstreamError::Connectivity { service, source: e }
    })?;

    if !resp.status().is_success() {
        let err = UpstreamError::from_response(service, action, resp).await;
        tracing::warn!(service, action, error = %err, "upstream returned an error");
        return Err(err);
    }

    Ok(resp)
}

/// Send a request and decode a 2xx JSON body.
pub(crate) async fn send_json<T: DeserializeOwned>(
    service: &'static str,
    action: &str,
    req: reqwest::RequestBuilder,
) -> Result<T, UpstreamError> {
    let resp = send(service, action, req).await?;
    resp.json::<T>()
        .await
        .map_err(|e| UpstreamError::Decode { service, source: e })
}

pub(crate) fn join_url(base: &str, path: &str) -> String {
    format!("{}/{}", base.trim_end_matches('/'), path.trim_start_matches('/'))
}
