//! Write commands - create, edit, delete, upvote

use anyhow::{Context, Result, bail};
use bytes::Bytes;
use postsaga_domain::{Effect, NewPost, PostEdit, Receipt, new_post_id};
use serde::Serialize;
use std::path::{Path, PathBuf};

use crate::args::{CreateArgs, DeleteArgs, EditArgs, UpvoteArgs};
use crate::commands::wiring::build_lifecycle;
use crate::config::AppConfig;

#[derive(Debug, Serialize)]
struct ReceiptOutput {
    post_id: String,
    action: String,
    already_applied: bool,
    metrics_recorded: bool,
}

impl From<&Receipt> for ReceiptOutput {
    fn from(receipt: &Receipt) -> Self {
        Self {
            post_id: receipt.post_id.clone(),
            action: receipt.action.to_string(),
            already_applied: receipt.effect == Effect::AlreadyApplied,
            metrics_recorded: receipt.metrics_recorded,
        }
    }
}

pub async fn create(args: CreateArgs, config_path: Option<PathBuf>) -> Result<()> {
    let config = AppConfig::load(config_path.as_deref())?;
    let lifecycle = build_lifecycle(&config).await?;

    let content = if args.file_name.is_empty() {
        Bytes::new()
    } else {
        read_upload(&args.dir, &args.file_name).await?
    };

    let receipt = lifecycle
        .create_post(NewPost {
            post_id: args.post_id.unwrap_or_else(new_post_id),
            user_id: args.user_id,
            title: args.title,
            file_name: args.file_name,
            content,
        })
        .await
        .context("Create failed")?;

    report(&receipt, args.json, "Created post")
}

pub async fn edit(args: EditArgs, config_path: Option<PathBuf>) -> Result<()> {
    let config = AppConfig::load(config_path.as_deref())?;
    let lifecycle = build_lifecycle(&config).await?;

    let file_name = if args.detach {
        Some(String::new())
    } else {
        args.file_name
    };

    let content = match (&args.dir, file_name.as_deref()) {
        (Some(dir), Some(name)) if !name.is_empty() => Some(read_upload(dir, name).await?),
        (Some(_), _) => bail!("--dir needs --file-name to name the upload"),
        (None, _) => None,
    };

    let receipt = lifecycle
        .edit_post(PostEdit {
            post_id: args.post_id,
            user_id: args.user_id,
            title: args.title,
            file_name,
            content,
        })
        .await
        .context("Edit failed")?;

    report(&receipt, args.json, "Edited post")
}

pub async fn delete(args: DeleteArgs, config_path: Option<PathBuf>) -> Result<()> {
    let config = AppConfig::load(config_path.as_deref())?;
    let lifecycle = build_lifecycle(&config).await?;

    let receipt = lifecycle
        .delete_post(&args.post_id, &args.user_id)
        .await
        .context("Delete failed")?;

    report(&receipt, args.json, "Deleted post")
}

pub async fn upvote(args: UpvoteArgs, config_path: Option<PathBuf>) -> Result<()> {
    let config = AppConfig::load(config_path.as_deref())?;
    let lifecycle = build_lifecycle(&config).await?;

    let receipt = lifecycle
        .upvote_post(&args.post_id, &args.user_id)
        .await
        .context("Upvote failed")?;

    report(&receipt, args.json, "Upvoted post")
}

async fn read_upload(dir: &Path, file_name: &str) -> Result<Bytes> {
    let path = dir.join(file_name);
    let data = tokio::fs::read(&path)
        .await
        .with_context(|| format!("Failed to read file: {}", path.display()))?;
    Ok(Bytes::from(data))
}

fn report(receipt: &Receipt, json: bool, verb: &str) -> Result<()> {
    if json {
        let output = ReceiptOutput::from(receipt);
        let json = serde_json::to_string_pretty(&output).context("Failed to serialize output")?;
        println!("{}", json);
        return Ok(());
    }

    match receipt.effect {
        Effect::Applied => println!("{} {}", verb, receipt.post_id),
        Effect::AlreadyApplied => println!(
            "Nothing to do for {}: {} was already applied",
            receipt.post_id, receipt.action
        ),
    }
    if receipt.effect == Effect::Applied && !receipt.metrics_recorded {
        println!("Note: the {} event was not recorded in the metrics store", receipt.action);
    }

    Ok(())
}
