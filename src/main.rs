//! promoter - promote configuration between git-backed environments
//!
//! CLI binary driving the promotion reconcilers over a directory store.

use anyhow::Result;
use clap::{Parser, Subcommand};
use gitops_promoter::config::Settings;
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod cli;

#[derive(Parser)]
#[command(name = "promoter")]
#[command(about = "Promote configuration between git-backed environments via pull requests")]
#[command(version)]
struct Cli {
    /// Directory holding environments, promotions and secrets
    #[arg(short, long, global = true, default_value = ".")]
    store: PathBuf,

    /// Settings file (defaults to the user config directory)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Reconcile every environment and promotion continuously
    Run {
        /// Reconcile everything once and exit
        #[arg(long)]
        once: bool,

        /// Only reconcile objects in this namespace
        #[arg(short, long)]
        namespace: Option<String>,
    },

    /// Reconcile one promotion now
    Promote {
        /// Promotion name
        name: String,

        /// Namespace of the promotion
        #[arg(short, long, default_value = "default")]
        namespace: String,
    },

    /// Check that an environment's repository can be cloned
    Check {
        /// Environment name
        name: String,

        /// Namespace of the environment
        #[arg(short, long, default_value = "default")]
        namespace: String,
    },

    /// Show readiness of environments and promotions
    Status {
        /// Only show this namespace
        #[arg(short, long)]
        namespace: Option<String>,
    },
}

fn load_settings(path: Option<PathBuf>) -> Result<Settings> {
    match path.or_else(Settings::default_path) {
        Some(path) => Ok(Settings::load(&path)?),
        None => Ok(Settings::default()),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "gitops_promoter=info,promoter=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    let settings = load_settings(cli.config)?;

    match cli.command {
        Commands::Run { once, namespace } => {
            cli::run_controller(&cli.store, &settings, namespace.as_deref(), once).await?;
        }
        Commands::Promote { name, namespace } => {
            cli::run_promote(&cli.store, &settings, &namespace, &name).await?;
        }
        Commands::Check { name, namespace } => {
            cli::run_check(&cli.store, &settings, &namespace, &name).await?;
        }
        Commands::Status { namespace } => {
            cli::run_status(&cli.store, namespace.as_deref()).await?;
        }
    }

    Ok(())
}
