#![warn(clippy::all, clippy::pedantic)]

use std::net::SocketAddr;
use std::path::PathBuf;

use actix_web::{App, HttpServer, web};
use clap::Parser;
use tracing::{error, info};

mod error;
mod routes;

use error::AppError;
use logger::init_tracing;
use uptrack_service::{Config, Orchestrator};

#[derive(Debug, Parser)]
#[command(name = "uptrack-server", version, about = "HTTP API for the uptrack monitor")]
struct Cli {
    /// Config file (defaults to $XDG_CONFIG_HOME/uptrack/config.toml)
    #[arg(long, env = "UPTRACK_CONFIG")]
    config: Option<PathBuf>,
}

#[actix_web::main]
async fn main() -> Result<(), AppError> {
    dotenvy::dotenv().ok();
    init_tracing();

    let cli = Cli::parse();
    let config = Config::from_config(cli.config.as_ref())?;
    info!("{config}");

    let orchestrator = Orchestrator::from_config(&config.monitoring)?;
    let restored = orchestrator.restore().await?;
    info!(count = restored, "Registry ready");

    let addr: SocketAddr = format!("{}:{}", config.server.bind, config.server.port).parse()?;
    run_server(addr, orchestrator.clone()).await?;

    orchestrator.stop_monitoring();
    if let Err(e) = orchestrator.persist().await {
        error!(error = %e, "Failed to save snapshot on shutdown");
    }

    Ok(())
}

async fn run_server(addr: SocketAddr, orchestrator: Orchestrator) -> Result<(), AppError> {
    let state = web::Data::new(orchestrator);
    info!(%addr, "Listening");

    HttpServer::new(move || App::new().app_data(state.clone()).configure(routes::routes))
        .bind(addr)?
        .run()
        .await?;

    Ok(())
}
