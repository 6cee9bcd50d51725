//! CLI argument definitions

use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// hashtag-tracker: collect daily hashtag usage and rank tagged posts by relevance
#[derive(Parser, Debug)]
#[command(name = "hashtag-tracker")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Path to configuration file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, global = true)]
    pub log_level: Option<String>,

    /// Log output format
    #[arg(long, global = true, value_enum, default_value_t = LogFormat::Text)]
    pub log_format: LogFormat,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    Text,
    Json,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Collect daily usage for scheduled hashtags into the history store
    Collect(CollectArgs),

    /// Fetch and rank recent posts for a hashtag
    Analyze(AnalyzeArgs),

    /// Show trending hashtags
    Trending(TrendingArgs),

    /// Show stored usage history for a hashtag
    History(HistoryArgs),

    /// Show the hashtags scheduled for today
    Today,

    /// Delete stored history older than a number of days
    Prune(PruneArgs),

    /// Configuration management
    Config(ConfigArgs),
}

#[derive(Args, Debug)]
pub struct CollectArgs {
    /// Collect for this date instead of today (YYYY-MM-DD)
    #[arg(long, conflicts_with_all = ["from", "to"])]
    pub date: Option<String>,

    /// First day of a range to collect (YYYY-MM-DD)
    #[arg(long, requires = "to", conflicts_with = "tag")]
    pub from: Option<String>,

    /// Last day of a range to collect (YYYY-MM-DD)
    #[arg(long, requires = "from", conflicts_with = "tag")]
    pub to: Option<String>,

    /// Collect a single hashtag (for today unless --date is given)
    #[arg(long)]
    pub tag: Option<String>,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Args, Debug)]
pub struct AnalyzeArgs {
    /// Hashtag to analyze, with or without '#'
    pub tag: String,

    /// Timeline pages to fetch (40 posts each)
    #[arg(long)]
    pub max_pages: Option<usize>,

    /// Time window: today, week, month or all
    #[arg(long)]
    pub timeframe: Option<String>,

    /// Keep only the top N posts
    #[arg(long)]
    pub limit: Option<usize>,

    /// Override the configured UTC offset, e.g. +02:00
    #[arg(long)]
    pub timezone: Option<String>,

    /// Keep only posts created on this date (YYYY-MM-DD)
    #[arg(long)]
    pub date: Option<String>,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Args, Debug)]
pub struct TrendingArgs {
    #[arg(long, default_value_t = 10)]
    pub limit: usize,

    #[arg(long, default_value_t = 0)]
    pub offset: usize,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Args, Debug)]
pub struct HistoryArgs {
    /// Hashtag to report; lists tracked hashtags when omitted
    pub tag: Option<String>,

    /// ISO week-year (default current year)
    #[arg(long)]
    pub year: Option<i32>,

    /// Show stored daily rows instead of weekly aggregates
    #[arg(long)]
    pub daily: bool,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Args, Debug)]
pub struct PruneArgs {
    /// Days of history to keep
    #[arg(long)]
    pub days: u32,
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
