use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use dotenvy::dotenv;

use tracing::info;

use tunecloak::{AppConfig, ApplicationServer, Logger};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();
    let config = Arc::new(AppConfig::parse());

    // guards are kept alive to flush logs and keep the sentry connection
    let _guards = Logger::init(&config);

    info!("logger and env prepped...");

    if config.client_id.is_none() {
        info!("client id will be discovered on the first api call");
    }

    ApplicationServer::serve(config)
        .await
        .context("server failed to start")?;

    Ok(())
}
