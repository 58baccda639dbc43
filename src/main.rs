use anyhow::Result;
use clap::Parser as ClapParser;
use log::{error, info};

use soundwave::cli::Cli;
use soundwave::{AppServer, ServeOptions};

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init();
    info!("soundwave");

    let options = ServeOptions::from(Cli::parse());

    let app = AppServer::global();
    app.bus().on_log(|line| info!("{}", line));
    app.bus().on_error(|e| error!("{}", e));

    let started = app.serve(Some(options)).await?;

    tokio::signal::ctrl_c().await?;
    info!("Shutdown signal received");
    started.server.shutdown().await;

    Ok(())
}
