//! AdGuard Lite CLI
//!
//! Developer tooling for the cosmetic engine: performance budgets, catalog
//! inspection, and full page-session simulations on the in-memory DOM.

mod catalog;
mod perf_budget;
mod simulate;

use std::fs;

use clap::{Parser, Subcommand};

use agl_core::config::EngineConfig;

#[derive(Parser)]
#[command(name = "agl-cli")]
#[command(about = "AdGuard Lite cosmetic engine tools")]
struct Cli {
    /// Debug logging (RUST_LOG still wins)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Check sweep latency against the slow-sweep threshold
    PerfBudget {
        /// Content sections in the synthetic page
        #[arg(short, long, default_value_t = 200)]
        blocks: usize,

        /// Measured sweeps
        #[arg(short, long, default_value_t = 100)]
        iterations: usize,
    },

    /// Show the profile and catalog selected for a hostname
    Catalog {
        hostname: String,

        /// Override the profile's aggressiveness
        #[arg(short, long, value_enum)]
        aggressiveness: Option<catalog::Level>,

        /// Print JSON instead of text
        #[arg(long)]
        json: bool,
    },

    /// Run a page session against the reference authority
    Simulate {
        #[arg(default_value = "example.com")]
        hostname: String,

        /// Allow-list the hostname before the page loads
        #[arg(long)]
        allow: bool,

        /// Disable the extension before the page loads
        #[arg(long)]
        disabled: bool,

        /// Content sections in the synthetic page
        #[arg(short, long, default_value_t = 50)]
        blocks: usize,

        /// Engine config JSON file
        #[arg(short, long)]
        config: Option<String>,
    },
}

fn main() {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level)).init();

    let result = match cli.command {
        Commands::PerfBudget { blocks, iterations } => {
            perf_budget::run_perf_budget(perf_budget::PerfBudgetOptions { blocks, iterations })
        }
        Commands::Catalog {
            hostname,
            aggressiveness,
            json,
        } => catalog::cmd_catalog(&hostname, aggressiveness.map(Into::into), json),
        Commands::Simulate {
            hostname,
            allow,
            disabled,
            blocks,
            config,
        } => load_config(config.as_deref()).and_then(|config| {
            simulate::run_simulation(simulate::SimulateOptions {
                hostname,
                allow,
                disabled,
                blocks,
                config,
            })
            .map(|_| ())
        }),
    };

    if let Err(e) = result {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

fn load_config(path: Option<&str>) -> Result<EngineConfig, String> {
    let Some(path) = path else {
        return Ok(EngineConfig::default());
    };
    let text = fs::read_to_string(path).map_err(|e| format!("Failed to read '{}': {}", path, e))?;
    EngineConfig::from_json(&text).map_err(|e| format!("Invalid config '{}': {}", path, e))
}
