#![warn(clippy::all, clippy::pedantic)]
#![allow(
    clippy::doc_markdown,
    clippy::items_after_statements,
    clippy::manual_let_else,
    clippy::map_unwrap_or,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc,
    clippy::module_name_repetitions,
    clippy::needless_pass_by_value,
    clippy::redundant_closure_for_method_calls,
    clippy::single_match_else,
    clippy::too_many_lines,
    clippy::uninlined_format_args,
    clippy::unnecessary_wraps
)]

use anyhow::{bail, Result};
use clap::{CommandFactory, Parser, Subcommand, ValueEnum};
use std::io::Write;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{fmt, EnvFilter};
use waygate::config::Config;
use waygate::connection::ConnectionMonitor;
use waygate::dispatch::Dispatcher;
use waygate::query::QueryService;
use waygate::store::MessageStore;
use waygate::{gateway, health, provider};

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
enum CompletionShell {
    #[value(name = "bash")]
    Bash,
    #[value(name = "fish")]
    Fish,
    #[value(name = "zsh")]
    Zsh,
    #[value(name = "powershell")]
    PowerShell,
    #[value(name = "elvish")]
    Elvish,
}

/// `waygate` — message event store and dispatch gateway.
#[derive(Parser, Debug)]
#[command(name = "waygate")]
#[command(version)]
#[command(about = "Bridge a messaging provider to HTTP query and send operations.", long_about = None)]
struct Cli {
    /// Override the config directory (default: ~/.waygate)
    #[arg(long, global = true)]
    config_dir: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the provider adapter and HTTP gateway
    Serve {
        /// Bind host (overrides config)
        #[arg(long)]
        host: Option<String>,
        /// Bind port (overrides config)
        #[arg(long)]
        port: Option<u16>,
    },
    /// Print the resolved configuration as TOML
    Config,
    /// Generate shell completion scripts
    Completions {
        /// Target shell
        #[arg(value_enum)]
        shell: CompletionShell,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    if let Some(ref config_dir) = cli.config_dir {
        if config_dir.trim().is_empty() {
            bail!("--config-dir cannot be empty");
        }
        std::env::set_var("WAYGATE_CONFIG_DIR", config_dir);
    }

    // Completions must remain stdout-only and should not load config or initialize logging.
    // This avoids warnings/log lines corrupting sourced completion scripts.
    if let Commands::Completions { shell } = &cli.command {
        let mut stdout = std::io::stdout().lock();
        write_shell_completion(*shell, &mut stdout)?;
        return Ok(());
    }

    // Initialize logging - respects RUST_LOG env var, defaults to INFO
    let subscriber = fmt::Subscriber::builder()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .finish();

    tracing::subscriber::set_global_default(subscriber)?;

    health::mark_process_start();
    let config = Config::load_or_init().await?;

    match cli.command {
        Commands::Completions { .. } => unreachable!(),
        Commands::Serve { host, port } => run_serve(config, host, port).await,
        Commands::Config => {
            let rendered = toml::to_string_pretty(&config)?;
            print!("{rendered}");
            Ok(())
        }
    }
}

/// Wire the core together and run until shutdown: store + monitor, the
/// supervised provider stream feeding the single-writer event router, and
/// the HTTP gateway on top.
async fn run_serve(config: Config, host: Option<String>, port: Option<u16>) -> Result<()> {
    let host = host.unwrap_or_else(|| config.gateway.host.clone());
    let port = port.unwrap_or(config.gateway.port);

    let store = Arc::new(MessageStore::new(config.store.capacity));
    let monitor = Arc::new(ConnectionMonitor::new());
    let adapter = provider::create_provider(&config.provider)?;
    tracing::info!(
        provider = adapter.name(),
        capacity = store.capacity(),
        "starting waygate"
    );

    let (events_tx, events_rx) = mpsc::channel(provider::EVENT_QUEUE_DEPTH);
    let shutdown = CancellationToken::new();
    let router = provider::spawn_event_router(
        events_rx,
        Arc::clone(&monitor),
        Arc::clone(&store),
        shutdown.clone(),
    );
    let supervisor =
        provider::spawn_supervised_provider(Arc::clone(&adapter), events_tx, Arc::clone(&monitor));

    let state = gateway::AppState {
        query: Arc::new(QueryService::new(Arc::clone(&store))),
        dispatcher: Arc::new(Dispatcher::new(Arc::clone(&monitor), adapter)),
        monitor,
        store,
    };

    gateway::run_gateway(&host, port, state).await?;

    // Gateway returned (shutdown signal): stop the ingest side too.
    shutdown.cancel();
    supervisor.abort();
    let _ = router.await;
    Ok(())
}

fn write_shell_completion<W: Write>(shell: CompletionShell, writer: &mut W) -> Result<()> {
    use clap_complete::generate;
    use clap_complete::shells;

    let mut cmd = Cli::command();
    let bin_name = cmd.get_name().to_string();

    match shell {
        CompletionShell::Bash => generate(shells::Bash, &mut cmd, bin_name.clone(), writer),
        CompletionShell::Fish => generate(shells::Fish, &mut cmd, bin_name.clone(), writer),
        CompletionShell::Zsh => generate(shells::Zsh, &mut cmd, bin_name.clone(), writer),
        CompletionShell::PowerShell => {
            generate(shells::PowerShell, &mut cmd, bin_name.clone(), writer);
        }
        CompletionShell::Elvish => generate(shells::Elvish, &mut cmd, bin_name, writer),
    }

    writer.flush()?;
    Ok(())
}
