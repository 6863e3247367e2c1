//! Synheart Login Sensor CLI
//!
//! Behavioral telemetry feature extraction for login sessions.

use anyhow::Context;
use clap::{Parser, Subcommand, ValueEnum};
use std::path::{Path, PathBuf};
use synheart_login_sensor::{
    beacon::Beacon,
    config::Config,
    core::{build_record, header, CaptureContext, ColumnKind, SCHEMA},
    logging,
    sink::csv::encode_row,
    transparency::PersistedStats,
    VERSION,
};

#[derive(Parser)]
#[command(name = "synheart-login")]
#[command(author = "Synheart")]
#[command(version = VERSION)]
#[command(about = "Login behavior feature extraction agent", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the beacon collection server
    #[cfg(feature = "server")]
    Serve {
        /// Port to listen on (overrides config)
        #[arg(long)]
        port: Option<u16>,

        /// CSV output file (overrides config)
        #[arg(long)]
        csv: Option<PathBuf>,

        /// SQLite store file (overrides config)
        #[arg(long)]
        store: Option<PathBuf>,

        /// Emit logs as JSON lines
        #[arg(long)]
        json_logs: bool,
    },

    /// Extract features from a saved beacon file
    Extract {
        /// Beacon JSON file
        file: PathBuf,

        /// User-Agent to attribute the beacon to
        #[arg(long, default_value = "")]
        user_agent: String,

        /// Output format
        #[arg(long, value_enum, default_value_t = OutputFormat::Json)]
        format: OutputFormat,
    },

    /// Print the output schema
    Schema,

    /// Show persisted ingest statistics
    Status,

    /// Show configuration
    Config,
}

#[derive(Clone, Copy, ValueEnum)]
enum OutputFormat {
    Json,
    Csv,
}

fn main() {
    let cli = Cli::parse();

    let result = match cli.command {
        #[cfg(feature = "server")]
        Commands::Serve {
            port,
            csv,
            store,
            json_logs,
        } => cmd_serve(port, csv, store, json_logs),
        Commands::Extract {
            file,
            user_agent,
            format,
        } => cmd_extract(&file, &user_agent, format),
        Commands::Schema => {
            cmd_schema();
            Ok(())
        }
        Commands::Status => {
            cmd_status();
            Ok(())
        }
        Commands::Config => {
            cmd_config();
            Ok(())
        }
    };

    if let Err(e) = result {
        eprintln!("Error: {e:#}");
        std::process::exit(1);
    }
}

#[cfg(feature = "server")]
fn cmd_serve(
    port: Option<u16>,
    csv: Option<PathBuf>,
    store: Option<PathBuf>,
    json_logs: bool,
) -> anyhow::Result<()> {
    use synheart_login_sensor::server::{self, ServerConfig};

    let mut config = Config::load().unwrap_or_else(|e| {
        eprintln!("Warning: Could not load config ({e}), using defaults");
        Config::default()
    });
    if let Some(port) = port {
        config.port = port;
    }
    if let Some(csv) = csv {
        config.csv_path = csv;
    }
    if let Some(store) = store {
        config.store_path = store;
    }
    config.json_logs |= json_logs;

    logging::init(config.json_logs, "info");
    config
        .ensure_directories()
        .context("Failed to create data directories")?;

    let runtime = tokio::runtime::Runtime::new().context("Failed to start async runtime")?;
    runtime.block_on(async {
        let handle = server::run(ServerConfig::from_config(&config)).await?;
        println!("Listening on http://{}", handle.addr);
        println!("Press Ctrl+C to stop.");

        tokio::signal::ctrl_c()
            .await
            .context("Failed to listen for Ctrl+C")?;
        println!("\nShutting down...");
        handle.shutdown().await;
        Ok::<_, anyhow::Error>(())
    })
}

fn cmd_extract(file: &Path, user_agent: &str, format: OutputFormat) -> anyhow::Result<()> {
    let body = std::fs::read(file).with_context(|| format!("Failed to read {file:?}"))?;
    let beacon = Beacon::from_slice(&body)?;
    let record = build_record(&beacon, &CaptureContext::now(user_agent));

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&record)?),
        OutputFormat::Csv => {
            let fields: Vec<String> = record
                .cells()
                .into_iter()
                .map(|(_, cell)| cell.to_string())
                .collect();
            print!("{}", encode_row(header()));
            print!("{}", encode_row(&fields));
        }
    }
    Ok(())
}

fn cmd_schema() {
    println!("Output schema ({} columns)", SCHEMA.len());
    println!("==========================");
    for column in SCHEMA {
        let kind = match column.kind() {
            ColumnKind::Metadata => "metadata",
            ColumnKind::Computed => "computed",
            ColumnKind::Reserved => "reserved",
        };
        println!("{:>3}  {:<28} {}", column.position(), column.name(), kind);
    }
}

fn cmd_status() {
    let config = Config::load().unwrap_or_default();

    println!("Synheart Login Sensor Status");
    println!("============================");
    println!();
    println!("Outputs:");
    println!("  CSV file: {:?}", config.csv_path);
    println!("  SQLite store: {:?}", config.store_path);
    println!();

    let stats_path = config.stats_path();
    if !stats_path.exists() {
        println!("No previous session data found.");
        return;
    }

    match PersistedStats::read(&stats_path) {
        Ok(stats) => println!("{}", stats.summary()),
        Err(e) => eprintln!("Error reading {stats_path:?}: {e}"),
    }
}

fn cmd_config() {
    let config = Config::load().unwrap_or_default();

    println!("Configuration");
    println!("=============");
    println!();
    println!("Config file: {:?}", Config::config_path());
    println!();
    println!(
        "{}",
        serde_json::to_string_pretty(&config).unwrap_or_else(|_| "Error".to_string())
    );
}
