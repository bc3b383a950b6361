use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "verifier")]
#[command(about = "Automated verification badges for marketplace providers")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Path to configuration file (extension optional)
    #[arg(short, long, global = true, default_value = "config/default")]
    pub config: String,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Serve the authenticated cron trigger over HTTP
    Serve,

    /// Run a single verification pass now
    Run {
        /// Provider role to evaluate (worker, company)
        #[arg(short, long)]
        role: Option<String>,

        /// Evaluate and count without writing
        #[arg(long)]
        dry_run: bool,
    },

    /// Run verification passes on a fixed interval
    Auto {
        /// Seconds between passes (defaults to the configured interval)
        #[arg(short, long)]
        interval: Option<u64>,

        /// Provider role to evaluate (worker, company)
        #[arg(short, long)]
        role: Option<String>,

        /// Evaluate and count without writing
        #[arg(long)]
        dry_run: bool,
    },

    /// Explain the verification decision for one provider
    Check {
        /// Provider id
        provider_id: String,
    },

    /// List providers with their verification stats
    List {
        /// Filter by role (worker, company)
        #[arg(short, long)]
        role: Option<String>,

        /// Filter by status (verified, unverified, all)
        #[arg(short, long, default_value = "all")]
        status: String,

        /// Output format (table, json)
        #[arg(short, long, default_value = "table")]
        format: String,
    },

    /// Show recent verification changes and passes
    History {
        /// Number of entries to show
        #[arg(short, long, default_value = "20")]
        limit: usize,

        /// Show pass summaries instead of individual changes
        #[arg(long)]
        passes: bool,

        /// Output format (table, json)
        #[arg(short, long, default_value = "table")]
        format: String,
    },

    /// Show statistics
    Stats {
        /// Output format: table or json
        #[arg(short, long, default_value = "table")]
        format: String,
    },

    /// Initialize the database
    Init {
        /// Also print the effective configuration as TOML
        #[arg(long)]
        show_config: bool,

        /// Write the default configuration to the --config path
        #[arg(long)]
        write_config: bool,
    },
}
