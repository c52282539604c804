use anyhow::Result;
use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(name = "lps")]
#[command(about = "Publish zones and purses to the on-chain name registry", long_about = None)]
struct Cli {
    #[command(subcommand)]
    cmd: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compute layered config hash + print canonical JSON
    ConfigHash {
        /// Paths in merge order (base -> network -> overrides...)
        #[arg(required = true)]
        paths: Vec<String>,
    },

    /// Print the public key derived from the configured private key
    Identity {
        /// Layered config paths in merge order
        #[arg(long = "config", required = true)]
        config_paths: Vec<String>,
    },

    /// Compare every item with the ledger. Writes nothing.
    Check {
        /// Layered config paths in merge order
        #[arg(long = "config", required = true)]
        config_paths: Vec<String>,

        /// Exit non-zero unless every item is up to date
        #[arg(long, default_value_t = false)]
        strict: bool,

        /// Print the report as JSON
        #[arg(long, default_value_t = false)]
        json: bool,
    },

    /// Write missing or stale items and wait until the ledger shows them
    Push {
        /// Layered config paths in merge order
        #[arg(long = "config", required = true)]
        config_paths: Vec<String>,

        /// Exit non-zero unless every item is current or confirmed
        #[arg(long, default_value_t = false)]
        strict: bool,

        /// Print the report as JSON
        #[arg(long, default_value_t = false)]
        json: bool,

        /// Refuse to run when the config carries keys nothing reads
        #[arg(long, default_value_t = false)]
        fail_on_unused_keys: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let _ = dotenvy::from_filename(".env.local");
    init_tracing();

    let cli = Cli::parse();

    let exit_code = match cli.cmd {
        Commands::ConfigHash { paths } => commands::config_hash(&paths)?,
        Commands::Identity { config_paths } => commands::identity(&config_paths)?,
        Commands::Check {
            config_paths,
            strict,
            json,
        } => commands::check(&config_paths, strict, json).await?,
        Commands::Push {
            config_paths,
            strict,
            json,
            fail_on_unused_keys,
        } => commands::push(&config_paths, strict, json, fail_on_unused_keys).await?,
    };

    if exit_code != 0 {
        std::process::exit(exit_code);
    }
    Ok(())
}

/// Logs go to stderr so stdout stays parseable.
fn init_tracing() {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()),
        )
        .init();
}
