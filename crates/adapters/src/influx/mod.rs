//! InfluxDB v2 metrics store
//!
//! Writes use line protocol against `/api/v2/write`. Aggregations are Flux
//! queries against `/api/v2/query`, answered as CSV.

mod query;
mod write;

use async_trait::async_trait;
use postsaga_domain::{Action, MetricsError, MetricsStore, Window};
use reqwest::{Client, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use std::collections::{BTreeSet, HashMap};
use std::time::Duration;
use time::OffsetDateTime;

/// Connection settings for an InfluxDB v2 server
#[derive(Debug, Clone)]
pub struct InfluxSettings {
    pub url: String,
    pub org: String,
    pub bucket: String,
}

impl Default for InfluxSettings {
    fn default() -> Self {
        Self {
            url: "http://localhost:8086".to_string(),
            org: "influx_org".to_string(),
            bucket: "bucket1".to_string(),
        }
    }
}

/// Metrics store backed by the InfluxDB v2 HTTP API
pub struct InfluxMetricsStore {
    client: Client,
    settings: InfluxSettings,
    token: SecretString,
}

impl InfluxMetricsStore {
    pub fn new(settings: InfluxSettings, token: SecretString) -> Result<Self, MetricsError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| {
                MetricsError::Unavailable(format!("Failed to build HTTP client: {}", e))
            })?;

        let settings = InfluxSettings {
            url: settings.url.trim_end_matches('/').to_string(),
            ..settings
        };

        Ok(Self {
            client,
            settings,
            token,
        })
    }

    pub fn settings(&self) -> &InfluxSettings {
        &self.settings
    }

    fn auth_header(&self) -> String {
        format!("Token {}", self.token.expose_secret())
    }

    /// Server health probe (`GET /health`)
    pub async fn health(&self) -> Result<(), MetricsError> {
        let response = self
            .client
            .get(format!("{}/health", self.settings.url))
            .send()
            .await
            .map_err(transport)?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(MetricsError::Unavailable(format!(
                "Health check returned {}: {}",
                status, body
            )));
        }
        Ok(())
    }

    async fn query(&self, flux: String) -> Result<Vec<HashMap<String, String>>, MetricsError> {
        tracing::debug!(flux = %flux, "Running Flux query");

        let response = self
            .client
            .post(format!("{}/api/v2/query", self.settings.url))
            .query(&[("org", self.settings.org.as_str())])
            .header("Authorization", self.auth_header())
            .header("Content-Type", "application/vnd.flux")
            .header("Accept", "application/csv")
            .body(flux)
            .send()
            .await
            .map_err(transport)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(status_error(status, body));
        }

        let body = response.text().await.map_err(transport)?;
        query::parse_csv(&body).map_err(|e| MetricsError::Query(e.to_string()))
    }
}

fn transport(e: reqwest::Error) -> MetricsError {
    if e.is_timeout() {
        MetricsError::Unavailable("request timed out".to_string())
    } else {
        MetricsError::Unavailable(e.to_string())
    }
}

fn status_error(status: StatusCode, body: String) -> MetricsError {
    if status.is_server_error() || status == StatusCode::TOO_MANY_REQUESTS {
        MetricsError::Unavailable(format!("InfluxDB returned {}: {}", status, body))
    } else {
        MetricsError::Rejected(format!("InfluxDB returned {}: {}", status, body))
    }
}

#[async_trait]
impl MetricsStore for InfluxMetricsStore {
    async fn record_action(
        &self,
        post_id: &str,
        user_id: &str,
        action: Action,
    ) -> Result<(), MetricsError> {
        let lines = write::action_points(post_id, user_id, action);

        let response = self
            .client
            .post(format!("{}/api/v2/write", self.settings.url))
            .query(&[
                ("org", self.settings.org.as_str()),
                ("bucket", self.settings.bucket.as_str()),
                ("precision", "ns"),
            ])
            .header("Authorization", self.auth_header())
            .header("Content-Type", "text/plain; charset=utf-8")
            .body(lines)
            .send()
            .await
            .map_err(transport)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(status_error(status, body));
        }

        tracing::debug!(post_id = %post_id, action = %action, "Metrics points written");
        Ok(())
    }

    async fn top_n_by_upvotes(
        &self,
        window: &Window,
        n: usize,
    ) -> Result<Vec<(String, i64)>, MetricsError> {
        if n == 0 {
            return Ok(Vec::new());
        }
        let rows = self
            .query(query::top_upvoted(&self.settings.bucket, window, n))
            .await?;
        let mut ranked =
            query::ranked_counts(&rows).map_err(|e| MetricsError::Query(e.to_string()))?;
        ranked.sort_by(|a, b| b.1.cmp(&a.1));
        ranked.truncate(n);
        Ok(ranked)
    }

    async fn recent_post_ids(&self, window: &Window) -> Result<BTreeSet<String>, MetricsError> {
        let rows = self
            .query(query::recent_post_ids(&self.settings.bucket, window))
            .await?;
        let ids =
            query::distinct_values(&rows).map_err(|e| MetricsError::Query(e.to_string()))?;
        Ok(ids.into_iter().collect())
    }

    async fn most_recent_activity(
        &self,
        post_id: &str,
        window: &Window,
    ) -> Result<Option<OffsetDateTime>, MetricsError> {
        let rows = self
            .query(query::last_activity(&self.settings.bucket, window, post_id))
            .await?;
        query::last_time(&rows).map_err(|e| MetricsError::Query(e.to_string()))
    }
}
