use std::sync::Arc;

use clap::Parser;
use tokio::sync::Notify;

mod api;
mod cli;
mod config;
mod error;
mod handler;
mod http;
mod logger;
mod modules;
mod project;
mod server;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = cli::Cli::parse();
    let mut cfg = config::Config::load_from(&cli.config_path())?;
    cli.apply(&mut cfg);

    logger::init(&cfg)?;

    // One thread runs every connection and handler
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;

    runtime.block_on(async_main(cfg))
}

async fn async_main(cfg: config::Config) -> Result<(), Box<dyn std::error::Error>> {
    let state = Arc::new(config::AppState::new(cfg));
    let shutdown = Arc::new(Notify::new());

    server::start_signal_handler(Arc::clone(&shutdown), Arc::clone(&state.registry))?;

    // Use LocalSet for spawn_local support
    let local = tokio::task::LocalSet::new();
    local
        .run_until(async move {
            let server = server::DevServer::bind(Arc::clone(&state)).map_err(|e| {
                logger::log_error(&e.to_string());
                e
            })?;
            project::spawn_build(&state.config);
            server.run(shutdown).await;
            Ok::<(), Box<dyn std::error::Error>>(())
        })
        .await
}
