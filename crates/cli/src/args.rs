//! CLI argument definitions

use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// postsaga: manage posts across a relational store, an object store and a metrics store
#[derive(Parser, Debug)]
#[command(name = "postsaga")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Path to configuration file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, global = true)]
    pub log_level: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Create a post, upload its file and record the action
    Create(CreateArgs),

    /// List posts
    List(ListArgs),

    /// Show one post with its attachment and last activity
    Show(ShowArgs),

    /// Soft-delete a post and remove its file
    Delete(DeleteArgs),

    /// Change a post's title and attachment
    Edit(EditArgs),

    /// Upvote a post
    Upvote(UpvoteArgs),

    /// Most upvoted posts in a time window
    Top(TopArgs),

    /// Configuration management
    Config(ConfigArgs),

    /// Validate configuration and check the stores
    Doctor(DoctorArgs),
}

#[derive(Args, Debug)]
pub struct CreateArgs {
    /// Post ID (generated when omitted)
    #[arg(long)]
    pub post_id: Option<String>,

    /// Owner of the post
    #[arg(long)]
    pub user_id: String,

    #[arg(long)]
    pub title: String,

    /// Directory holding the file to attach
    #[arg(long, default_value = ".")]
    pub dir: PathBuf,

    /// File to attach; also used as the object key
    #[arg(long, default_value = "")]
    pub file_name: String,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Args, Debug)]
pub struct EditArgs {
    pub post_id: String,

    /// User performing the edit
    #[arg(long)]
    pub user_id: String,

    /// New title
    #[arg(long)]
    pub title: String,

    /// New object key. Without it the current attachment is kept.
    #[arg(long, conflicts_with = "detach")]
    pub file_name: Option<String>,

    /// Remove the attachment
    #[arg(long)]
    pub detach: bool,

    /// Directory holding new content for the attachment. Without it the
    /// current bytes are kept (and moved when the key changes).
    #[arg(long, conflicts_with = "detach")]
    pub dir: Option<PathBuf>,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Args, Debug)]
pub struct DeleteArgs {
    pub post_id: String,

    /// User performing the delete
    #[arg(long)]
    pub user_id: String,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Args, Debug)]
pub struct UpvoteArgs {
    pub post_id: String,

    /// User casting the vote
    #[arg(long)]
    pub user_id: String,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, ValueEnum)]
pub enum ListSourceArg {
    /// All active posts from the relational store
    #[default]
    All,
    /// Posts with activity in the window, from the metrics store
    Recent,
}

#[derive(Args, Debug)]
pub struct ListArgs {
    /// Which index drives the listing
    #[arg(long, value_enum, default_value_t = ListSourceArg::All)]
    pub source: ListSourceArg,

    /// Time window for --source recent (e.g. 1d, 7d, 12h)
    #[arg(long)]
    pub window: Option<String>,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Args, Debug)]
pub struct ShowArgs {
    pub post_id: String,

    /// Time window for the last-activity lookup
    #[arg(long)]
    pub window: Option<String>,

    /// Write the attachment to this path
    #[arg(long)]
    pub save: Option<PathBuf>,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Args, Debug)]
pub struct TopArgs {
    /// Number of posts to show
    #[arg(short = 'n', long, default_value_t = 1)]
    pub count: usize,

    /// Time window (e.g. 1d, 7d, 12h)
    #[arg(long)]
    pub window: Option<String>,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Args, Debug)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommands,
}

#[derive(Subcommand, Debug)]
pub enum ConfigCommands {
    /// Generate example configuration file
    Init {
        /// Path to write config file
        #[arg(long, default_value = "./config.toml")]
        path: PathBuf,

        /// Overwrite existing file
        #[arg(long)]
        force: bool,
    },
}

#[derive(Args, Debug)]
pub struct DoctorArgs {
    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}
