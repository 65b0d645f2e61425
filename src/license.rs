//! Wallet activation check.
//!
//! Live mode requires the operator's wallet to be activated with the
//! backend. The check is a single GET; any failure reads as "not
//! activated" so a backend outage can never unlock live trading.

use anyhow::Result;
use reqwest::Client;
use serde::Deserialize;
use tracing::warn;

#[derive(Debug, Deserialize)]
struct CheckResponse {
    #[serde(default)]
    active: bool,
}

/// GET `{backend_url}/api/check/{pubkey}` and read the `active` flag.
pub async fn is_wallet_activated(http: &Client, backend_url: &str, pubkey: &str) -> Result<bool> {
    let url = format!("{}/api/check/{}", backend_url.trim_end_matches('/'), pubkey);
    let resp = match http.get(&url).send().await {
        Ok(resp) => resp,
        Err(e) => {
            warn!(url, error = %e, "Activation backend unreachable");
            return Ok(false);
        }
    };

    if !resp.status().is_success() {
        warn!(url, status = %resp.status(), "Activation check rejected");
        return Ok(false);
    }

    let body: CheckResponse = match resp.json().await {
        Ok(body) => body,
        Err(e) => {
            warn!(url, error = %e, "Activation response malformed");
            return Ok(false);
        }
    };

    Ok(body.active)
}
