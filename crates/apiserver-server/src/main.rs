use anyhow::Result;
use clap::Parser;
use std::path::Path;

use apiserver_server::cli::{self, Cli, Command, StartArgs};
use apiserver_server::config::ServerConfig;
use apiserver_server::lifecycle::{self, Server};
use apiserver_server::logging;
use apiserver_server::state::AppState;
use apiserver_server::worker_seed;
use apiserver_storage::WorkerStore;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        None => {
            println!("Welcome.........!!!");
            Ok(())
        }
        Some(Command::Version) => {
            println!("{}", cli::version_line());
            Ok(())
        }
        Some(Command::Start(args)) => run_server(cli.config.as_deref(), &args).await,
    }
}

async fn run_server(config_path: Option<&Path>, args: &StartArgs) -> Result<()> {
    let mut config = match config_path {
        Some(path) => ServerConfig::load(path)?,
        None => ServerConfig::default(),
    };
    args.apply(&mut config);

    let _sql_log_guard = logging::init_tracing(&config.database)?;

    tracing::info!(
        database = %config.database.redacted_url(),
        http = %config.listen_addr(),
        "apiserver v{} starting",
        env!("CARGO_PKG_VERSION")
    );

    let timezone = config.database.timezone()?;
    let store = WorkerStore::connect(
        &config.database.connection_url(),
        timezone,
        config.database.sql_logging,
    )
    .await?;
    store.ensure_schema().await?;
    worker_seed::init_default_workers(&store).await?;

    let state = AppState::new(store, config);
    if state.auth.is_bypassed() {
        tracing::warn!("Basic auth is bypassed: every request is accepted without credentials");
    }

    let server = Server::new(state);
    let listener = server.bind().await?;
    server.run(listener, lifecycle::shutdown_signal()).await
}
