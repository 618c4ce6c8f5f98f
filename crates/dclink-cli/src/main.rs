//! dclink CLI
//!
//! Diagnostics for peer identities and connectivity resolution

mod config;
mod scenario;

use clap::{Parser, Subcommand};
use dclink_core::{Cid, Identity, PeerRegistry, Sid};
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

use config::Config;
use scenario::Scenario;

/// dclink - hub client connectivity diagnostics
#[derive(Parser)]
#[command(name = "dclink")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,

    /// Configuration file path (defaults to the per-user config directory)
    #[arg(short, long)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Resolve TCP and UDP connectivity for a scenario file
    Resolve {
        /// Scenario file (TOML)
        #[arg(required = true)]
        scenario: PathBuf,

        /// Print the report as JSON
        #[arg(long)]
        json: bool,
    },

    /// Generate a new client id, or normalize an existing one
    Cid {
        /// Existing CID to parse
        parse: Option<String>,
    },

    /// Show the attributes the configured profile publishes
    Profile {
        /// Print the attributes as JSON
        #[arg(long)]
        json: bool,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => Config::load(path)?,
        None => Config::load_or_default()?,
    };

    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.logging.level))
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    config.validate()?;

    match cli.command {
        Commands::Resolve { scenario, json } => resolve(&scenario, json, &config)?,
        Commands::Cid { parse } => cid(parse.as_deref())?,
        Commands::Profile { json } => profile(json, &config)?,
    }

    Ok(())
}

/// Resolve a scenario and print the report
fn resolve(path: &Path, json: bool, config: &Config) -> anyhow::Result<()> {
    tracing::info!("Resolving scenario {}", path.display());

    let scenario = Scenario::load(path)?;
    let report = scenario.resolve(&config.profile)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print!("{}", report.render());
    }

    Ok(())
}

/// Print a fresh or normalized CID
fn cid(parse: Option<&str>) -> anyhow::Result<()> {
    let cid = match parse {
        Some(text) => text.parse::<Cid>()?,
        None => Cid::generate(),
    };
    println!("{cid}");
    Ok(())
}

/// Publish the profile onto a scratch identity and print it
fn profile(json: bool, config: &Config) -> anyhow::Result<()> {
    let registry = PeerRegistry::new(Cid::generate());
    let me = Identity::new(registry.local().clone(), Sid::default());
    config.profile.apply_to(&me);

    if json {
        println!("{}", serde_json::to_string_pretty(&me.info())?);
        return Ok(());
    }

    println!("Profile: {}", config.profile.nick());
    for (code, value) in me.info() {
        println!("  {code}  {value}");
    }
    println!("Connection: {}", me.connection_string());
    Ok(())
}
