//! Configuration loading and management

use anyhow::{Context, Result};
use postsaga_domain::{Window, policy::CallPolicy, usecases::LifecycleConfig};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Top-level configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub general: GeneralConfig,

    #[serde(default)]
    pub relational: RelationalConfig,

    #[serde(default)]
    pub blob: BlobConfig,

    #[serde(default)]
    pub metrics: MetricsConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneralConfig {
    #[serde(default = "default_log_level")]
    pub log_level: String,

    #[serde(default = "default_call_timeout")]
    pub call_timeout_secs: u64,

    #[serde(default = "default_read_retries")]
    pub read_retries: u32,

    #[serde(default = "default_retry_backoff")]
    pub retry_backoff_ms: u64,

    #[serde(default = "default_window")]
    pub default_window: String,

    #[serde(default = "default_true")]
    pub fetch_attachments: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelationalConfig {
    #[serde(default = "default_relational_backend")]
    pub backend: String,

    #[serde(default = "default_db_path")]
    pub db_path: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BlobConfig {
    #[serde(default = "default_blob_backend")]
    pub backend: String,

    #[serde(default)]
    pub fs: FsBlobConfig,

    #[serde(default)]
    pub azure: AzureBlobConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FsBlobConfig {
    #[serde(default = "default_blob_root")]
    pub root: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AzureBlobConfig {
    #[serde(default)]
    pub base_url: String,

    #[serde(default = "default_azure_container")]
    pub container: String,

    #[serde(default = "default_azure_sas_env")]
    pub sas_token_env: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsConfig {
    #[serde(default = "default_metrics_backend")]
    pub backend: String,

    #[serde(default)]
    pub influx: InfluxConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InfluxConfig {
    #[serde(default = "default_influx_url")]
    pub url: String,

    #[serde(default = "default_influx_org")]
    pub org: String,

    #[serde(default = "default_influx_bucket")]
    pub bucket: String,

    #[serde(default = "default_influx_token_env")]
    pub token_env: String,
}

// Default value functions
fn default_log_level() -> String {
    "info".to_string()
}

fn default_call_timeout() -> u64 {
    10
}

fn default_read_retries() -> u32 {
    2
}

fn default_retry_backoff() -> u64 {
    200
}

fn default_window() -> String {
    "7d".to_string()
}

fn default_true() -> bool {
    true
}

fn default_relational_backend() -> String {
    "sqlite".to_string()
}

fn default_db_path() -> PathBuf {
    PathBuf::from("./postsaga.sqlite")
}

fn default_blob_backend() -> String {
    "fs".to_string()
}

fn default_blob_root() -> PathBuf {
    PathBuf::from("./blobs")
}

fn default_azure_container() -> String {
    "databasesproject".to_string()
}

fn default_azure_sas_env() -> String {
    "AZURE_STORAGE_SAS_TOKEN".to_string()
}

fn default_metrics_backend() -> String {
    "influx".to_string()
}

fn default_influx_url() -> String {
    "http://localhost:8086".to_string()
}

fn default_influx_org() -> String {
    "influx_org".to_string()
}

fn default_influx_bucket() -> String {
    "bucket1".to_string()
}

fn default_influx_token_env() -> String {
    "INFLUXDB_TOKEN".to_string()
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            call_timeout_secs: default_call_timeout(),
            read_retries: default_read_retries(),
            retry_backoff_ms: default_retry_backoff(),
            default_window: default_window(),
            fetch_attachments: default_true(),
        }
    }
}

impl Default for RelationalConfig {
    fn default() -> Self {
        Self {
            backend: default_relational_backend(),
            db_path: default_db_path(),
        }
    }
}

impl Default for BlobConfig {
    fn default() -> Self {
        Self {
            backend: default_blob_backend(),
            fs: FsBlobConfig::default(),
            azure: AzureBlobConfig::default(),
        }
    }
}

impl Default for FsBlobConfig {
    fn default() -> Self {
        Self {
            root: default_blob_root(),
        }
    }
}

impl Default for AzureBlobConfig {
    fn default() -> Self {
        Self {
            base_url: String::new(),
            container: default_azure_container(),
            sas_token_env: default_azure_sas_env(),
        }
    }
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            backend: default_metrics_backend(),
            influx: InfluxConfig::default(),
        }
    }
}

impl Default for InfluxConfig {
    fn default() -> Self {
        Self {
            url: default_influx_url(),
            org: default_influx_org(),
            bucket: default_influx_bucket(),
            token_env: default_influx_token_env(),
        }
    }
}

impl AppConfig {
    /// Load configuration from file and environment
    pub fn load(config_path: Option<&Path>) -> Result<Self> {
        let mut builder = config::Config::builder();

        // Try default config path if none specified
        let default_path = PathBuf::from("./config.toml");
        let path = config_path.unwrap_or(&default_path);

        if path.exists() {
            builder = builder.add_source(config::File::from(path));
        } else if config_path.is_some() {
            // User specified a path that doesn't exist
            anyhow::bail!("Config file not found: {}", path.display());
        }

        // Add environment variable overrides
        builder = builder.add_source(
            config::Environment::with_prefix("POSTSAGA")
                .separator("__")
                .try_parsing(true),
        );

        let config = builder.build().context("Failed to build configuration")?;

        config
            .try_deserialize()
            .context("Failed to deserialize configuration")
    }

    /// Orchestrator settings derived from `[general]`
    pub fn lifecycle_config(&self) -> Result<LifecycleConfig> {
        if self.general.call_timeout_secs == 0 {
            anyhow::bail!("general.call_timeout_secs must be positive");
        }

        Ok(LifecycleConfig {
            policy: CallPolicy {
                call_timeout: Duration::from_secs(self.general.call_timeout_secs),
                read_retries: self.general.read_retries,
                retry_backoff: Duration::from_millis(self.general.retry_backoff_ms),
            },
            fetch_attachments: self.general.fetch_attachments,
        })
    }

    /// Parse a `--window` flag, falling back to `general.default_window`
    pub fn window(&self, flag: Option<&str>) -> Result<Window> {
        let raw = flag.unwrap_or(&self.general.default_window);
        raw.parse::<Window>()
            .map_err(|e| anyhow::anyhow!(e))
            .with_context(|| format!("Invalid time window '{}'", raw))
    }

    /// Generate example configuration as TOML string
    pub fn example_toml() -> String {
        r#"# postsaga configuration

[general]
log_level = "info"
# Deadline for every single store call
call_timeout_secs = 10
# Reads are retried on timeouts and transient failures; writes never are
read_retries = 2
retry_backoff_ms = 200
default_window = "7d"
# Read each post's file when listing
fetch_attachments = true

[relational]
backend = "sqlite"  # sqlite, memory
db_path = "./postsaga.sqlite"

[blob]
backend = "fs"  # fs, azure, memory

[blob.fs]
root = "./blobs"

[blob.azure]
base_url = "https://youraccount.blob.core.windows.net"
container = "databasesproject"
sas_token_env = "AZURE_STORAGE_SAS_TOKEN"

[metrics]
backend = "influx"  # influx, memory

[metrics.influx]
url = "http://localhost:8086"
org = "influx_org"
bucket = "bucket1"
token_env = "INFLUXDB_TOKEN"
"#
        .to_string()
    }
}
