pub mod cli;
pub mod core;
pub mod providers;
pub mod service;

pub use cli::ui::OutputFormat;

use crate::core::Period;
use crate::core::config::AppConfig;
use crate::service::StockService;
use anyhow::Result;
use tracing::{debug, info};

pub enum AppCommand {
    Search { query: String },
    History { symbol: String, period: Period },
    Live { symbol: String },
    Nse { with_prices: bool },
}

pub async fn run_command(
    command: AppCommand,
    config_path: Option<&str>,
    format: OutputFormat,
) -> Result<()> {
    info!("stockpulse starting...");

    let config = match config_path {
        Some(path) => AppConfig::load_from_path(path)?,
        None => AppConfig::load()?,
    };
    debug!("Loaded config: {config:#?}");

    let service = StockService::from_config(&config)?;

    match command {
        AppCommand::Search { query } => cli::search::run(&service, &query, format).await,
        AppCommand::History { symbol, period } => {
            cli::history::run(&service, &symbol, period, format).await
        }
        AppCommand::Live { symbol } => cli::live::run(&service, &symbol, format).await,
        AppCommand::Nse { with_prices } => cli::nse::run(&service, with_prices, format).await,
    }
}
