//! Doctor command - validate configuration and probe the stores

use anyhow::Result;
use postsaga_domain::BlobError;
use serde::Serialize;
use std::path::PathBuf;
use std::time::Duration;

use crate::args::DoctorArgs;
use crate::commands::wiring::{build_blobs, build_influx, build_posts};
use crate::config::AppConfig;

/// Key that is never written; reading it proves the blob backend answers
const PROBE_KEY: &str = "postsaga-doctor-probe";

#[derive(Debug, Serialize)]
struct DoctorReport {
    config: CheckResult,
    relational: CheckResult,
    blob: CheckResult,
    metrics: CheckResult,
    overall: String,
}

#[derive(Debug, Serialize)]
struct CheckResult {
    status: String,
    message: String,
    details: Option<serde_json::Value>,
}

impl CheckResult {
    fn ok(message: impl Into<String>) -> Self {
        Self {
            status: "ok".to_string(),
            message: message.into(),
            details: None,
        }
    }

    fn warn(message: impl Into<String>) -> Self {
        Self {
            status: "warn".to_string(),
            message: message.into(),
            details: None,
        }
    }

    fn error(message: impl Into<String>) -> Self {
        Self {
            status: "error".to_string(),
            message: message.into(),
            details: None,
        }
    }

    fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = Some(details);
        self
    }

    fn is_ok(&self) -> bool {
        self.status == "ok"
    }

    fn is_error(&self) -> bool {
        self.status == "error"
    }
}

pub async fn execute(args: DoctorArgs, config_path: Option<PathBuf>) -> Result<()> {
    let mut report = DoctorReport {
        config: CheckResult::error("Not checked"),
        relational: CheckResult::error("Not checked"),
        blob: CheckResult::error("Not checked"),
        metrics: CheckResult::error("Not checked"),
        overall: "error".to_string(),
    };

    // Check config
    let config = match AppConfig::load(config_path.as_deref()) {
        Ok(c) => match c.lifecycle_config().and_then(|_| c.window(None)) {
            Ok(_) => {
                report.config = CheckResult::ok("Configuration loaded successfully");
                Some(c)
            }
            Err(e) => {
                report.config = CheckResult::error(format!("Invalid configuration: {:#}", e));
                None
            }
        },
        Err(e) => {
            report.config = CheckResult::error(format!("Failed to load config: {:#}", e));
            None
        }
    };

    if let Some(ref config) = config {
        let timeout = Duration::from_secs(config.general.call_timeout_secs);
        report.relational = check_relational(config, timeout).await;
        report.blob = check_blob(config, timeout).await;
        report.metrics = check_metrics(config, timeout).await;
    }

    // Determine overall status
    let checks = [
        &report.config,
        &report.relational,
        &report.blob,
        &report.metrics,
    ];

    let has_error = checks.iter().any(|c| c.is_error());
    let all_ok = checks.iter().all(|c| c.is_ok());

    report.overall = if has_error {
        "error".to_string()
    } else if all_ok {
        "ok".to_string()
    } else {
        "warn".to_string()
    };

    // Output report
    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_report(&report);
    }

    if report.overall == "error" {
        std::process::exit(1);
    }

    Ok(())
}

async fn check_relational(config: &AppConfig, timeout: Duration) -> CheckResult {
    let repo = match build_posts(config).await {
        Ok(repo) => repo,
        Err(e) => return CheckResult::error(format!("{:#}", e)),
    };

    match tokio::time::timeout(timeout, repo.list_active_with_upvote_counts()).await {
        Ok(Ok(posts)) => {
            let check = if config.relational.backend == "memory" {
                CheckResult::warn("In-memory relational store; posts are lost on exit")
            } else {
                CheckResult::ok(format!(
                    "SQLite database {} ({} active posts)",
                    config.relational.db_path.display(),
                    posts.len()
                ))
            };
            check.with_details(serde_json::json!({
                "backend": config.relational.backend,
                "active_posts": posts.len(),
            }))
        }
        Ok(Err(e)) => CheckResult::error(format!("Query failed: {}", e)),
        Err(_) => CheckResult::error(format!("Query timed out after {:?}", timeout)),
    }
}

async fn check_blob(config: &AppConfig, timeout: Duration) -> CheckResult {
    let blobs = match build_blobs(config) {
        Ok(blobs) => blobs,
        Err(e) => return CheckResult::error(format!("{:#}", e)),
    };

    let backend = config.blob.backend.as_str();
    match tokio::time::timeout(timeout, blobs.get(PROBE_KEY)).await {
        Ok(Ok(_)) | Ok(Err(BlobError::NotFound(_))) => match backend {
            "memory" => CheckResult::warn("In-memory blob store; files are lost on exit"),
            "fs" => CheckResult::ok(format!(
                "Filesystem blob store at {}",
                config.blob.fs.root.display()
            )),
            _ => CheckResult::ok(format!(
                "Azure container {} at {}",
                config.blob.azure.container, config.blob.azure.base_url
            )),
        },
        Ok(Err(e)) => CheckResult::error(format!("Probe failed: {}", e)),
        Err(_) => CheckResult::error(format!("Probe timed out after {:?}", timeout)),
    }
}

async fn check_metrics(config: &AppConfig, timeout: Duration) -> CheckResult {
    if config.metrics.backend == "memory" {
        return CheckResult::warn("In-memory metrics store; events are lost on exit");
    }
    if config.metrics.backend != "influx" {
        return CheckResult::error(format!(
            "Unknown metrics backend: {}",
            config.metrics.backend
        ));
    }

    let influx = match build_influx(config) {
        Ok(influx) => influx,
        Err(e) => return CheckResult::error(format!("{:#}", e)),
    };

    let settings = influx.settings();
    match tokio::time::timeout(timeout, influx.health()).await {
        Ok(Ok(())) => CheckResult::ok(format!(
            "InfluxDB at {} (org {}, bucket {})",
            settings.url, settings.org, settings.bucket
        )),
        Ok(Err(e)) => CheckResult::error(format!("Health check failed: {}", e)),
        Err(_) => CheckResult::error(format!("Health check timed out after {:?}", timeout)),
    }
}

fn print_report(report: &DoctorReport) {
    println!("postsaga Doctor Report");
    println!("======================");
    println!();

    print_check("Config", &report.config);
    print_check("Relational store", &report.relational);
    print_check("Blob store", &report.blob);
    print_check("Metrics store", &report.metrics);

    println!();
    let symbol = match report.overall.as_str() {
        "ok" => "✓",
        "warn" => "⚠",
        _ => "✗",
    };
    println!("{} Overall: {}", symbol, report.overall.to_uppercase());
}

fn print_check(name: &str, result: &CheckResult) {
    let symbol = match result.status.as_str() {
        "ok" => "✓",
        "warn" => "⚠",
        _ => "✗",
    };
    println!("{} {}: {}", symbol, name, result.message);
}
