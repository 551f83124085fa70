//! Process entry point: load config, wire logging, serve the race API.

use clap::Parser;
use raceword::transport::AppState;
use raceword::{AppConfig, ModelRegistry, ModelSpec};

/// Overrides layered on top of `AppConfig::load_or_default` (file + env),
/// applied last so an operator starting the process by hand always wins.
#[derive(Debug, Parser)]
#[command(name = "raceword", about = "Race Orchestration Core: LLM word-puzzle benchmarking server")]
struct Cli {
    /// TOML config path, overriding the `$XDG_CONFIG_HOME/raceword/config.toml` default.
    #[arg(long, value_name = "PATH")]
    config: Option<std::path::PathBuf>,

    /// Address to bind the HTTP server to, e.g. 0.0.0.0:8787.
    #[arg(long, value_name = "ADDR")]
    bind: Option<String>,

    /// Lift the `public_max_models` cap for this run.
    #[arg(long)]
    unrestricted: bool,
}

fn main() -> anyhow::Result<()> {
    init_logging();

    let cli = Cli::parse();
    let rt = tokio::runtime::Runtime::new()?;
    rt.block_on(async_main(cli))
}

async fn async_main(cli: Cli) -> anyhow::Result<()> {
    let mut config = match &cli.config {
        Some(path) => AppConfig::load(path)?,
        None => AppConfig::load_or_default(),
    };
    if let Some(bind) = cli.bind {
        config.bind_addr = bind;
    }
    if cli.unrestricted {
        config.unrestricted_mode = true;
    }
    tracing::info!(bind_addr = %config.bind_addr, "raceword starting");

    let registry = ModelRegistry::with_models(seed_registry());
    let state = AppState::new(config, registry);

    raceword::transport::server::serve(state).await
}

/// A handful of well-known Anthropic endpoints so `race/stream`/`wordle/stream`
/// callers can pass bare ids out of the box; callers can still supply a full
/// `ModelSpec` for anything not listed here.
fn seed_registry() -> Vec<ModelSpec> {
    vec![
        ModelSpec::new("claude-haiku", "Claude Haiku", "anthropic:claude-3-haiku-20240307"),
        ModelSpec::new("claude-sonnet", "Claude Sonnet", "anthropic:claude-sonnet-4-20250514"),
        ModelSpec::new("claude-opus", "Claude Opus", "anthropic:claude-opus-4-20250514"),
    ]
}

fn init_logging() {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(true))
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("raceword=info,tower_http=info")))
        .init();
}
