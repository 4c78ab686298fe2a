//! Builds the store adapters and the orchestrator from configuration

use anyhow::{Context, Result, bail};
use postsaga_adapters::{
    blobs::{AzureBlobStore, FsBlobStore, InMemoryBlobStore},
    metrics::{InMemoryMetricsStore, InfluxMetricsStore, InfluxSettings},
    posts::{InMemoryPostRepository, SqlitePostRepository},
};
use postsaga_domain::{BlobStore, MetricsStore, PostRepository, usecases::PostLifecycle};
use secrecy::SecretString;
use std::sync::Arc;

use crate::config::AppConfig;

/// Orchestrator over whichever backends the configuration selects
pub type Lifecycle = PostLifecycle<dyn PostRepository, dyn BlobStore, dyn MetricsStore>;

pub async fn build_lifecycle(config: &AppConfig) -> Result<Lifecycle> {
    let lifecycle_config = config.lifecycle_config()?;
    let posts = build_posts(config).await?;
    let blobs = build_blobs(config)?;
    let metrics = build_metrics(config)?;

    tracing::debug!(
        relational = %config.relational.backend,
        blob = %config.blob.backend,
        metrics = %config.metrics.backend,
        timeout_secs = config.general.call_timeout_secs,
        "Stores configured"
    );

    Ok(PostLifecycle::new(posts, blobs, metrics, lifecycle_config))
}

pub async fn build_posts(config: &AppConfig) -> Result<Arc<dyn PostRepository>> {
    match config.relational.backend.as_str() {
        "sqlite" => {
            let path = &config.relational.db_path;
            let repo = SqlitePostRepository::new(path)
                .await
                .with_context(|| format!("Failed to open SQLite database {}", path.display()))?;
            Ok(Arc::new(repo))
        }
        "memory" => Ok(Arc::new(InMemoryPostRepository::new())),
        other => bail!("Unknown relational backend: {}", other),
    }
}

pub fn build_blobs(config: &AppConfig) -> Result<Arc<dyn BlobStore>> {
    match config.blob.backend.as_str() {
        "fs" => {
            let root = &config.blob.fs.root;
            let store = FsBlobStore::new(root)
                .with_context(|| format!("Failed to open blob directory {}", root.display()))?;
            Ok(Arc::new(store))
        }
        "azure" => {
            let azure = &config.blob.azure;
            if azure.base_url.trim().is_empty() {
                bail!("blob.azure.base_url is not configured");
            }
            let sas = load_secret(&azure.sas_token_env, "Azure SAS token")?;
            let store = AzureBlobStore::new(&azure.base_url, &azure.container, sas)
                .context("Failed to initialize Azure blob store")?;
            Ok(Arc::new(store))
        }
        "memory" => Ok(Arc::new(InMemoryBlobStore::new())),
        other => bail!("Unknown blob backend: {}", other),
    }
}

pub fn build_metrics(config: &AppConfig) -> Result<Arc<dyn MetricsStore>> {
    match config.metrics.backend.as_str() {
        "influx" => Ok(Arc::new(build_influx(config)?)),
        "memory" => Ok(Arc::new(InMemoryMetricsStore::new())),
        other => bail!("Unknown metrics backend: {}", other),
    }
}

pub fn build_influx(config: &AppConfig) -> Result<InfluxMetricsStore> {
    let influx = &config.metrics.influx;
    let token = load_secret(&influx.token_env, "InfluxDB token")?;
    let settings = InfluxSettings {
        url: influx.url.clone(),
        org: influx.org.clone(),
        bucket: influx.bucket.clone(),
    };

    InfluxMetricsStore::new(settings, token).context("Failed to initialize InfluxDB client")
}

pub(crate) fn load_secret(env_var: &str, what: &str) -> Result<SecretString> {
    if env_var.trim().is_empty() {
        bail!("No env var configured for the {}", what);
    }

    let value = std::env::var(env_var)
        .with_context(|| format!("Missing env var {} for the {}", env_var, what))?;

    if value.trim().is_empty() {
        bail!("Env var {} for the {} is empty", env_var, what);
    }

    Ok(SecretString::new(value.into()))
}
