mod commands;

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use commands::parse_since;

#[derive(Parser)]
#[command(
    name = "podlog",
    version,
    about = "Error and API request analysis for OpenStack pod logs"
)]
struct Cli {
    /// Config file (default: ~/.podlog/podlog.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// Namespace to analyze, overrides the config file
    #[arg(short, long, global = true)]
    namespace: Option<String>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List the pods that would be analyzed
    Pods {
        /// Show API pods (request analysis) instead
        #[arg(long)]
        api: bool,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Collect and deduplicate errors from pod logs
    Errors {
        /// Lower time bound: RFC 3339 timestamp or a duration ago ("2h", "30m")
        #[arg(long, value_parser = parse_since, default_value = "1h")]
        since: DateTime<Utc>,
        /// Only collect from this service (e.g. octavia)
        #[arg(short, long)]
        service: Option<String>,
        /// Number of unique errors to print
        #[arg(long, default_value = "20")]
        top: usize,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Parse API request logs and report status and latency statistics
    Requests {
        /// Lower time bound: RFC 3339 timestamp or a duration ago ("2h", "30m")
        #[arg(long, value_parser = parse_since)]
        since: Option<DateTime<Utc>>,
        /// List failed requests
        #[arg(long)]
        errors: bool,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Analyze a saved log file without cluster access
    Scan {
        /// Log file to read
        file: PathBuf,
        /// Pod name the log came from
        #[arg(long)]
        pod: String,
        /// Service label (default: derived from the pod name)
        #[arg(short, long)]
        service: Option<String>,
        /// Lower time bound for request parsing
        #[arg(long, value_parser = parse_since)]
        since: Option<DateTime<Utc>>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Generate shell completions
    Completions {
        /// Shell: bash, zsh, fish, elvish, powershell
        shell: String,
    },
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let settings = commands::Settings {
        config: cli.config,
        namespace: cli.namespace,
    };
    let result = match cli.command {
        Commands::Pods { api, json } => commands::pods::run(&settings, api, json).await,
        Commands::Errors {
            since,
            service,
            top,
            json,
        } => commands::errors::run(&settings, since, service, top, json).await,
        Commands::Requests {
            since,
            errors,
            json,
        } => commands::requests::run(&settings, since, errors, json).await,
        Commands::Scan {
            file,
            pod,
            service,
            since,
            json,
        } => commands::scan::run(&settings, file, pod, service, since, json),
        Commands::Completions { shell } => commands::completions::run(shell),
    };

    if let Err(e) = result {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}
