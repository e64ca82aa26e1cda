mod server;

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use ff_core::{CounterConfig, Timestamp, VisitCounter};
use ff_store::{ScopeStore, Store};
use rand::SeedableRng;
use rand::rngs::SmallRng;
use rmcp::{ServiceExt, transport::stdio};

#[derive(Parser)]
#[command(name = "footfall", about = "Local visit counter CLI and MCP server")]
struct Cli {
    /// Storage scope (one client profile); overrides FOOTFALL_SCOPE
    #[arg(long, global = true)]
    scope: Option<String>,

    /// Enable verbose debug output
    #[arg(long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start MCP server on stdio transport
    Serve,

    /// Record one page load
    Visit {
        /// Evaluate at this ISO-8601 time instead of now
        #[arg(long)]
        at: Option<String>,

        /// Print the result as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show the analytics summary
    Summary {
        /// Evaluate at this ISO-8601 time instead of now
        #[arg(long)]
        at: Option<String>,

        /// Print the result as JSON
        #[arg(long)]
        json: bool,
    },

    /// Print whether the first-ever visit was today (true before any visit)
    NewToday {
        /// Evaluate at this ISO-8601 time instead of now
        #[arg(long)]
        at: Option<String>,
    },

    /// Export the visit record to a JSON file
    Export {
        /// Output file path
        path: PathBuf,
    },

    /// Import a visit record from a JSON file
    Import {
        /// Input file path
        path: PathBuf,
    },
}

fn base_dir() -> PathBuf {
    std::env::var("FOOTFALL_DATA_DIR")
        .ok()
        .map(PathBuf::from)
        .unwrap_or_else(ff_store::default_base_dir)
}

fn open_scope(cli: &Cli) -> Result<ScopeStore> {
    ScopeStore::open(cli.scope.as_deref(), Some(&base_dir())).context("failed to open scope store")
}

fn load_config() -> Result<CounterConfig> {
    ff_store::load_config(&base_dir()).context("failed to load footfall.toml")
}

fn open_counter(cli: &Cli) -> Result<VisitCounter<Store>> {
    let config = load_config()?;
    let scope = open_scope(cli)?;
    Ok(VisitCounter::with_config(scope.into_store(), config))
}

fn parse_at(at: Option<&str>) -> Result<Timestamp> {
    server::resolve_at(at).map_err(|msg| anyhow::anyhow!(msg))
}

fn init_tracing(verbose: bool) {
    use tracing_subscriber::EnvFilter;

    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::from_default_env().add_directive(tracing::Level::WARN.into())
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match &cli.command {
        Commands::Serve => cmd_serve(&cli).await,
        Commands::Visit { at, json } => cmd_visit(&cli, at.as_deref(), *json),
        Commands::Summary { at, json } => cmd_summary(&cli, at.as_deref(), *json),
        Commands::NewToday { at } => cmd_new_today(&cli, at.as_deref()),
        Commands::Export { path } => cmd_export(&cli, path),
        Commands::Import { path } => cmd_import(&cli, path),
    }
}

async fn cmd_serve(cli: &Cli) -> Result<()> {
    let config = load_config()?;
    let scope = open_scope(cli)?;
    tracing::info!("starting MCP server for scope '{}'", scope.scope_id());

    let server = server::FootfallServer::new(scope, config);
    let service = server
        .clone()
        .serve(stdio())
        .await
        .context("failed to start MCP server")?;
    service.waiting().await?;

    server.checkpoint_wal().await;
    Ok(())
}

fn cmd_visit(cli: &Cli, at: Option<&str>, json: bool) -> Result<()> {
    let now = parse_at(at)?;
    let mut counter = open_counter(cli)?;
    let mut rng = SmallRng::from_os_rng();

    let snapshot = counter
        .record_visit(now, &mut rng)
        .context("failed to record visit")?;

    if json {
        println!("{}", serde_json::to_string_pretty(&snapshot)?);
    } else {
        println!("visitor:     {}", snapshot.visitor_id);
        println!("new_session: {}", snapshot.is_new_session);
        println!("sessions:    {}", snapshot.session_count);
    }
    Ok(())
}

fn cmd_summary(cli: &Cli, at: Option<&str>, json: bool) -> Result<()> {
    let now = parse_at(at)?;
    let counter = open_counter(cli)?;
    let summary = counter.summary(now).context("failed to read summary")?;

    if json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
        return Ok(());
    }

    println!("today:       {} ({})", summary.today_visits, summary.today);
    println!("yesterday:   {} ({})", summary.yesterday_visits, summary.yesterday);
    println!("this_month:  {} ({})", summary.month_visits, summary.this_month);
    println!("last_month:  {} ({})", summary.last_month_visits, summary.last_month);
    println!("sessions:    {}", summary.total_sessions);
    println!(
        "first_seen:  {}",
        summary.first_seen.as_deref().unwrap_or("-")
    );
    println!("last_seen:   {}", summary.last_seen.as_deref().unwrap_or("-"));
    Ok(())
}

fn cmd_new_today(cli: &Cli, at: Option<&str>) -> Result<()> {
    let now = parse_at(at)?;
    let counter = open_counter(cli)?;
    let is_new = counter
        .is_new_visitor_today(now)
        .context("failed to read first visit")?;
    println!("{is_new}");
    Ok(())
}

fn cmd_export(cli: &Cli, path: &Path) -> Result<()> {
    let scope = open_scope(cli)?;
    scope
        .store()
        .export_json_file(path)
        .with_context(|| format!("failed to export to {}", path.display()))?;

    println!("exported to {}", path.display());
    Ok(())
}

fn cmd_import(cli: &Cli, path: &Path) -> Result<()> {
    let config = load_config()?;
    let scope = open_scope(cli)?;
    let record = scope
        .store()
        .import_json_file(path, &config)
        .context("failed to import JSON")?;

    println!(
        "imported from {}. visitor={}, sessions={}, days={}, months={}",
        path.display(),
        record.visitor_id.as_deref().unwrap_or("-"),
        record.visit_count.unwrap_or(0),
        record.daily_visits.len(),
        record.monthly_visits.len(),
    );
    Ok(())
}
