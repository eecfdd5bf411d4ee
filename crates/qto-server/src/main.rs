//! QTO Server - Main entry point

use anyhow::Result;
use qto_common::logging::{init_logging, LogConfig};
use qto_server::{api, config::Config};
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging with configuration from environment
    let mut log_config = LogConfig::from_env()?.with_file_prefix("qto-server");
    if std::env::var("LOG_FILTER").is_err() {
        log_config = log_config.with_filter("info,qto_server=debug,tower_http=info,sqlx=warn");
    }
    init_logging(&log_config)?;

    info!("Starting QTO Server");

    let config = Config::load()?;
    info!(
        "Configuration loaded - server will bind to {}:{}",
        config.server.host, config.server.port
    );

    api::serve(config).await
}
