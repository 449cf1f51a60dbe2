use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

use shuffle_forecast::cli::commands;
use shuffle_forecast::config::ForecastConfig;

#[derive(Parser)]
#[command(name = "shuffle-forecast")]
#[command(about = "Forecasts the cascades a swap sets off on a 6x6 tile-matching board")]
#[command(version)]
struct Cli {
    /// Path to the configuration file; defaults apply when it does not exist
    #[arg(short, long, default_value = "config.toml")]
    config: String,

    /// Emit logs as JSON lines
    #[arg(long)]
    json_logs: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Forecast the candidate moves of a scenario, best first
    Forecast {
        /// Path to the scenario file
        #[arg(short, long)]
        scenario: PathBuf,

        /// Print the ranking as JSON
        #[arg(long)]
        json: bool,

        /// Only show the best N moves
        #[arg(short, long)]
        top: Option<usize>,

        /// Override the configured trial count
        #[arg(long)]
        trials: Option<usize>,

        /// Override the configured base seed
        #[arg(long)]
        seed: Option<u64>,
    },

    /// List the ability catalog with activation odds
    Abilities,
}

fn load_config(path: &str) -> ForecastConfig {
    let path = Path::new(path);
    if !path.exists() {
        return ForecastConfig::default();
    }
    match ForecastConfig::from_file(path) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Error loading config: {}", e);
            std::process::exit(1);
        }
    }
}

fn init_tracing(level: &str, json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    let _ = if json {
        builder.json().try_init()
    } else {
        builder.try_init()
    };
}

fn main() {
    let cli = Cli::parse();
    let mut config = load_config(&cli.config);
    init_tracing(&config.log_level, cli.json_logs);

    match cli.command {
        Commands::Forecast {
            scenario,
            json,
            top,
            trials,
            seed,
        } => {
            if let Some(n) = trials {
                config.trial_count = n;
            }
            if let Some(s) = seed {
                config.seed = s;
            }
            if let Err(e) = config.validate() {
                eprintln!("Invalid configuration: {}", e);
                std::process::exit(1);
            }
            if let Err(e) = commands::run_forecast(&config, &scenario, json, top) {
                eprintln!("Forecast error: {}", e);
                std::process::exit(1);
            }
        }

        Commands::Abilities => commands::list_abilities(),
    }
}
