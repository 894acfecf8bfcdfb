//! HTTP client for the operational subcommands (`drain`, `replay`,
//! `dedup purge`, `config set-active`) that talk to a running
//! `broker-cli serve` process. Grounded on
//! `cli::server_client::ServerClient`: a thin wrapper with
//! `anyhow::Result`-returning methods and `.context(...)`/`bail!(...)`
//! on non-2xx responses, minus the SSE streaming this domain has no
//! use for.

use anyhow::{bail, Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use broker_config::types::TeamConfig;
use broker_core::ExecutionRecord;

pub struct ServerClient {
    base_url: String,
    http: reqwest::Client,
}

#[derive(Debug, Deserialize)]
pub struct DrainResponse {
    pub batches_flushed: usize,
}

#[derive(Debug, Deserialize)]
pub struct PurgeDedupResponse {
    pub purged: usize,
}

#[derive(Serialize)]
struct PurgeDedupBody<'a> {
    kind: &'a str,
}

impl ServerClient {
    pub fn new(base_url: &str) -> Self {
        let base_url = base_url.trim_end_matches('/').to_string();
        let http = reqwest::Client::new();
        Self { base_url, http }
    }

    pub async fn drain(&self) -> Result<DrainResponse> {
        let url = format!("{}/admin/drain", self.base_url);
        let resp = self.http.post(&url).send().await.context("server not reachable")?;
        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            bail!("server returned {}: {}", status, body);
        }
        resp.json().await.context("failed to parse drain response")
    }

    pub async fn replay(&self, from: DateTime<Utc>, to: DateTime<Utc>) -> Result<Vec<ExecutionRecord>> {
        let url = format!("{}/admin/replay", self.base_url);
        let resp = self
            .http
            .get(&url)
            .query(&[("from", from.to_rfc3339()), ("to", to.to_rfc3339())])
            .send()
            .await
            .context("server not reachable")?;
        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            bail!("server returned {}: {}", status, body);
        }
        resp.json().await.context("failed to parse replay response")
    }

    pub async fn purge_dedup(&self, kind: &str) -> Result<PurgeDedupResponse> {
        let url = format!("{}/admin/dedup/purge", self.base_url);
        let resp = self
            .http
            .post(&url)
            .json(&PurgeDedupBody { kind })
            .send()
            .await
            .context("server not reachable")?;
        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            bail!("server returned {}: {}", status, body);
        }
        resp.json().await.context("failed to parse dedup purge response")
    }

    pub async fn set_active_snapshot(&self, team_id: &str, version: u64) -> Result<TeamConfig> {
        let url = format!("{}/teams/{}/snapshots/{}/rollback", self.base_url, team_id, version);
        let resp = self.http.put(&url).send().await.context("server not reachable")?;
        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            bail!("server returned {}: {}", status, body);
        }
        resp.json().await.context("failed to parse rollback response")
    }
}
