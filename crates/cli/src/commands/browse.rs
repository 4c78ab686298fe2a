//! Read commands - list, show, top

use anyhow::{Context, Result, bail};
use postsaga_domain::{Attachment, ListSource, PostView};
use serde::Serialize;
use std::path::{Path, PathBuf};
use time::format_description::well_known::Rfc3339;

use crate::args::{ListArgs, ListSourceArg, ShowArgs, TopArgs};
use crate::commands::wiring::build_lifecycle;
use crate::config::AppConfig;

#[derive(Debug, Serialize)]
struct ViewOutput {
    post_id: String,
    status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    user_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    file_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    upvotes: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    attachment: Option<AttachmentOutput>,
    #[serde(skip_serializing_if = "Option::is_none")]
    last_activity: Option<String>,
}

#[derive(Debug, Serialize)]
struct AttachmentOutput {
    state: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    size: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    sha256: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl From<&PostView> for ViewOutput {
    fn from(view: &PostView) -> Self {
        let Some(detail) = view.detail() else {
            return Self {
                post_id: view.post_id().to_string(),
                status: PostView::DELETED_LABEL.to_string(),
                user_id: None,
                title: None,
                file_name: None,
                upvotes: None,
                attachment: None,
                last_activity: None,
            };
        };

        let attachment = match &detail.attachment {
            Attachment::None => None,
            other => Some(AttachmentOutput {
                state: other.label().to_string(),
                size: other.size(),
                sha256: other.sha256_hex(),
                error: match other {
                    Attachment::Unreadable(e) => Some(e.clone()),
                    _ => None,
                },
            }),
        };

        Self {
            post_id: detail.post.post_id.clone(),
            status: detail.post.status.to_string(),
            user_id: Some(detail.post.user_id.clone()),
            title: Some(detail.post.title.clone()),
            file_name: Some(detail.post.file_name.clone()),
            upvotes: detail.upvotes,
            attachment,
            last_activity: detail.last_activity.and_then(|at| at.format(&Rfc3339).ok()),
        }
    }
}

pub async fn list(args: ListArgs, config_path: Option<PathBuf>) -> Result<()> {
    let config = AppConfig::load(config_path.as_deref())?;
    let lifecycle = build_lifecycle(&config).await?;

    let source = match args.source {
        ListSourceArg::All => {
            if args.window.is_some() {
                tracing::warn!("--window only applies to --source recent");
            }
            ListSource::Relational
        }
        ListSourceArg::Recent => ListSource::Recent(config.window(args.window.as_deref())?),
    };

    let views = lifecycle.list_posts(source).await.context("List failed")?;
    print_views(&views, args.json)
}

pub async fn top(args: TopArgs, config_path: Option<PathBuf>) -> Result<()> {
    let config = AppConfig::load(config_path.as_deref())?;
    let window = config.window(args.window.as_deref())?;
    let lifecycle = build_lifecycle(&config).await?;

    let views = lifecycle
        .top_posts(window, args.count)
        .await
        .context("Top query failed")?;
    print_views(&views, args.json)
}

pub async fn show(args: ShowArgs, config_path: Option<PathBuf>) -> Result<()> {
    let config = AppConfig::load(config_path.as_deref())?;
    let window = config.window(args.window.as_deref())?;
    let lifecycle = build_lifecycle(&config).await?;

    let view = lifecycle
        .detail_post(&args.post_id, &window)
        .await
        .context("Show failed")?;

    if let Some(path) = &args.save {
        save_attachment(&view, path).await?;
    }

    let output = ViewOutput::from(&view);
    if args.json {
        let json = serde_json::to_string_pretty(&output).context("Failed to serialize output")?;
        println!("{}", json);
        return Ok(());
    }

    println!("Post {}", output.post_id);
    println!("  Status: {}", output.status);
    if let Some(detail) = view.detail() {
        println!("  Title: {}", detail.post.title);
        println!("  Owner: {}", detail.post.user_id);
        if detail.post.has_attachment() {
            println!(
                "  File: {} ({})",
                detail.post.file_name,
                describe_attachment(&detail.attachment)
            );
        } else {
            println!("  File: none");
        }
        match &output.last_activity {
            Some(at) => println!("  Last activity: {} (within {})", at, window),
            None => println!("  Last activity: none within {}", window),
        }
    }
    if let Some(path) = &args.save {
        println!("  Saved to: {}", path.display());
    }

    Ok(())
}

async fn save_attachment(view: &PostView, path: &Path) -> Result<()> {
    let Some(detail) = view.detail() else {
        bail!("Post {} is deleted; nothing to save", view.post_id());
    };
    let Some(bytes) = detail.attachment.bytes() else {
        bail!(
            "Post {} has no readable attachment ({})",
            detail.post.post_id,
            detail.attachment.label()
        );
    };

    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            tokio::fs::create_dir_all(parent)
                .await
                .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
        }
    }
    tokio::fs::write(path, bytes)
        .await
        .with_context(|| format!("Failed to write file: {}", path.display()))?;

    Ok(())
}

fn describe_attachment(attachment: &Attachment) -> String {
    match attachment {
        Attachment::Loaded(bytes) => format!(
            "{} bytes, sha256 {}",
            bytes.len(),
            attachment.sha256_hex().unwrap_or_default()
        ),
        Attachment::Unreadable(e) => format!("unreadable: {}", e),
        other => other.label().to_string(),
    }
}

fn print_views(views: &[PostView], json: bool) -> Result<()> {
    if json {
        let output: Vec<ViewOutput> = views.iter().map(ViewOutput::from).collect();
        let json = serde_json::to_string_pretty(&output).context("Failed to serialize output")?;
        println!("{}", json);
        return Ok(());
    }

    if views.is_empty() {
        println!("No posts.");
        return Ok(());
    }

    for view in views {
        let Some(detail) = view.detail() else {
            println!("{}  {}", view.post_id(), PostView::DELETED_LABEL);
            continue;
        };

        let mut line = format!("{}  {}  by {}", detail.post.post_id, detail.post.title, detail.post.user_id);
        if let Some(upvotes) = detail.upvotes {
            line.push_str(&format!("  upvotes: {}", upvotes));
        }
        if detail.post.has_attachment() {
            line.push_str(&format!(
                "  [{}: {}]",
                detail.post.file_name,
                describe_attachment(&detail.attachment)
            ));
        }
        println!("{}", line);
    }

    Ok(())
}
