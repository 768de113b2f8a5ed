//! Blueprints CLI - load typed CSV blueprint tables
//!
//! # Main Commands
//!
//! ```bash
//! blueprints load                        # Run one load cycle over the sample catalog
//! blueprints dump Enemies                # Load, then print one table as CSV
//! blueprints serve                       # Start HTTP server (port 3000)
//! ```
//!
//! # Tooling
//!
//! ```bash
//! blueprints validate-config config.json # Check a configuration file
//! blueprints bundle data/ out.zip        # Pack CSV files into a cloud bundle
//! ```

mod catalog;

use clap::{Parser, Subcommand};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

use blueprints::{
    write_bundle, BlueprintConfig, BlueprintReaderManager, BlueprintRegistry, CloudBundleSource,
    RemoteBundleSource, SignalBus,
};
use catalog::Catalog;

#[derive(Parser)]
#[command(name = "blueprints")]
#[command(about = "Load typed CSV blueprint tables from bundled, remote and cloud sources", long_about = None)]
struct Cli {
    /// Configuration file (JSON); defaults plus BLUEPRINT_* variables otherwise
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Directory holding on-disk resources, next to the embedded ones
    #[arg(long, global = true)]
    resource_root: Option<PathBuf>,

    /// Log filter used when RUST_LOG is not set
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run one load cycle and print its report
    Load {
        /// Print the report as JSON
        #[arg(long)]
        json: bool,
    },

    /// Run one load cycle and print a table as CSV
    Dump {
        /// Table name
        table: String,

        /// Output file (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Validate a configuration file
    ValidateConfig {
        /// Configuration JSON file
        input: PathBuf,
    },

    /// Pack a directory of blueprint files into a cloud bundle
    Bundle {
        /// Directory with blueprint files
        dir: PathBuf,

        /// Output zip archive
        output: PathBuf,

        /// Download URL to publish in the metadata
        #[arg(long, default_value = "")]
        url: String,

        /// Blueprint file extension
        #[arg(long, default_value = "csv")]
        file_type: String,
    },

    /// Start HTTP server
    Serve {
        /// Port to listen on
        #[arg(short, long, default_value = "3000")]
        port: u16,

        /// Do not run a load cycle before serving
        #[arg(long)]
        no_initial_load: bool,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    let result = match cli.command {
        Commands::Load { json } => cmd_load(cli.config.as_deref(), cli.resource_root, json).await,

        Commands::Dump { table, output } => {
            cmd_dump(cli.config.as_deref(), cli.resource_root, &table, output.as_deref()).await
        }

        Commands::ValidateConfig { input } => cmd_validate_config(&input),

        Commands::Bundle {
            dir,
            output,
            url,
            file_type,
        } => cmd_bundle(&dir, &output, &url, &file_type),

        Commands::Serve { port, no_initial_load } => {
            cmd_serve(cli.config.as_deref(), cli.resource_root, port, no_initial_load).await
        }
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

type CliResult = Result<(), Box<dyn std::error::Error>>;

fn load_config(path: Option<&Path>) -> Result<BlueprintConfig, Box<dyn std::error::Error>> {
    let config = match path {
        Some(path) => {
            let _ = dotenvy::dotenv();
            BlueprintConfig::from_file(path)?.apply_env_overrides()?
        }
        None => BlueprintConfig::from_env()?,
    };
    Ok(config)
}

fn build_manager(
    config: BlueprintConfig,
    resource_root: Option<PathBuf>,
) -> Result<(Arc<BlueprintReaderManager>, Catalog), Box<dyn std::error::Error>> {
    let mut registry = BlueprintRegistry::new();
    let catalog = Catalog::register(&mut registry)?;

    let mut resources = Catalog::embedded_resources();
    if let Some(root) = resource_root {
        resources = resources.with_root(root);
    }

    let signals = SignalBus::default();
    let cloud = CloudBundleSource::new()
        .with_signals(signals.clone())
        .with_progress(Arc::new(|downloaded: u64, total: Option<u64>| match total {
            Some(total) => tracing::debug!("bundle download {}/{} bytes", downloaded, total),
            None => tracing::debug!("bundle download {} bytes", downloaded),
        }));

    let manager = BlueprintReaderManager::builder()
        .config(config)
        .registry(registry)
        .source(resources)
        .source(RemoteBundleSource::new())
        .source(cloud)
        .signals(signals)
        .build();

    Ok((Arc::new(manager), catalog))
}

async fn cmd_load(config: Option<&Path>, resource_root: Option<PathBuf>, json: bool) -> CliResult {
    let (manager, catalog) = build_manager(load_config(config)?, resource_root)?;
    let report = manager.load_blueprints().await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    println!("Cycle {} (version {})", report.cycle_id, report.version);
    for line in catalog.summary() {
        println!("   {}", line);
    }
    for failure in &report.failed_tables {
        println!("   FAILED {}: {}", failure.name, failure.error);
    }
    for table in &report.skipped_tables {
        println!("   SKIPPED {}", table);
    }
    println!(
        "{} in {:.2}s",
        if report.is_complete() { "Complete" } else { "Partial" },
        report.total_secs
    );
    Ok(())
}

async fn cmd_dump(
    config: Option<&Path>,
    resource_root: Option<PathBuf>,
    table: &str,
    output: Option<&Path>,
) -> CliResult {
    let (manager, _catalog) = build_manager(load_config(config)?, resource_root)?;
    manager.load_blueprints().await?;

    let table = manager
        .registry()
        .get(table)
        .ok_or_else(|| format!("Unknown blueprint table: {}", table))?;
    write_output(&table.to_csv()?, output)
}

fn cmd_validate_config(input: &Path) -> CliResult {
    let config = BlueprintConfig::from_file(input)?;
    println!("Valid configuration (version {})", config.version);
    println!("   default source:  {}", config.default_source);
    println!("   fallback source: {}", config.fallback_source);
    println!("   remote example:  {}", config.remote_url("Items")?);
    println!("   cloud cache:     {}", config.cloud_cache_path()?.display());
    Ok(())
}

fn cmd_bundle(dir: &Path, output: &Path, url: &str, file_type: &str) -> CliResult {
    let metadata = write_bundle(dir, output, file_type, url)?;
    eprintln!("Bundle written to {}", output.display());
    println!("{}", serde_json::to_string_pretty(&metadata)?);
    Ok(())
}

async fn cmd_serve(
    config: Option<&Path>,
    resource_root: Option<PathBuf>,
    port: u16,
    no_initial_load: bool,
) -> CliResult {
    let (manager, _catalog) = build_manager(load_config(config)?, resource_root)?;
    if !no_initial_load {
        manager.load_blueprints().await?;
    }
    blueprints::api::start_server(port, manager).await?;
    Ok(())
}

fn write_output(content: &str, path: Option<&Path>) -> CliResult {
    match path {
        Some(p) => {
            fs::write(p, content)?;
            eprintln!("Saved to: {}", p.display());
        }
        None => print!("{}", content),
    }
    Ok(())
}
