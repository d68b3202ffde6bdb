use anyhow::Result;
use clap::{CommandFactory, Parser, Subcommand};
use stockpulse::OutputFormat;
use stockpulse::core::Period;
use stockpulse::core::log::init_logging;

#[derive(Parser)]
#[command(version, about)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Path to optional configuration file
    #[arg(short, long, global = true)]
    config_path: Option<String>,

    /// Print results as JSON instead of tables
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

impl From<Commands> for stockpulse::AppCommand {
    fn from(cmd: Commands) -> stockpulse::AppCommand {
        match cmd {
            Commands::Search { query } => stockpulse::AppCommand::Search { query },
            Commands::History { symbol, period } => {
                stockpulse::AppCommand::History { symbol, period }
            }
            Commands::Live { symbol } => stockpulse::AppCommand::Live { symbol },
            Commands::Nse { prices } => stockpulse::AppCommand::Nse {
                with_prices: prices,
            },
            Commands::Setup => unreachable!("Setup command should be handled separately"),
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Create default configuration
    Setup,
    /// Search popular stocks by symbol or name
    Search { query: String },
    /// Display daily price history for a symbol
    History {
        symbol: String,
        /// Range of history: 1d, 5d, 1mo, 3mo, 6mo, 1y, 2y, 5y, 10y, ytd, max
        #[arg(short, long, default_value = "1mo")]
        period: Period,
    },
    /// Display the latest quote for a symbol
    Live { symbol: String },
    /// List popular NSE stocks
    Nse {
        /// Also fetch a live quote for each stock
        #[arg(long)]
        prices: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_logging(cli.verbose);

    let format = if cli.json {
        OutputFormat::Json
    } else {
        OutputFormat::Table
    };

    let result = match cli.command {
        Some(Commands::Setup) => stockpulse::cli::setup::setup(),
        Some(cmd) => stockpulse::run_command(cmd.into(), cli.config_path.as_deref(), format).await,
        None => {
            Cli::command().print_help()?;
            Ok(())
        }
    };

    if let Err(e) = &result {
        tracing::error!(error = %e, "Application failed");
    }
    result
}
