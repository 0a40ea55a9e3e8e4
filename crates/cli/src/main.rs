mod check_command;
mod config_commands;
mod run_command;
mod subscriber_commands;

use std::path::PathBuf;

use {
    anyhow::Context,
    clap::{Parser, Subcommand},
    tracing::info,
    tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt},
    vendorwatch_config::VendorwatchConfig,
};

#[derive(Parser)]
#[command(name = "vendorwatch", about = "vendorwatch: MSEDCL vendor availability monitor")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    /// Output logs as JSON instead of human-readable.
    #[arg(long, global = true, default_value_t = false)]
    json_logs: bool,

    /// Config file (overrides discovery of ./vendorwatch.toml and ~/.config/vendorwatch/).
    #[arg(long, global = true, env = "VENDORWATCH_CONFIG")]
    config: Option<PathBuf>,

    /// Data directory for the database and screenshots.
    #[arg(long, global = true, env = "VENDORWATCH_DATA_DIR")]
    data_dir: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the bot and the monitor (default when no subcommand is provided).
    Run,
    /// Probe one Beneficiary ID and print the result. Nothing is stored or sent.
    Check {
        /// Beneficiary ID, e.g. MT4420500385456.
        id: String,
        /// Keep the screenshot instead of deleting it.
        #[arg(long)]
        keep_artifact: bool,
    },
    /// Subscriber management.
    Subscribers {
        #[command(subcommand)]
        action: subscriber_commands::SubscriberAction,
    },
    /// Configuration management.
    Config {
        #[command(subcommand)]
        action: config_commands::ConfigAction,
    },
}

fn init_telemetry(cli: &Cli) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log_level));

    let registry = tracing_subscriber::registry().with(filter);

    if cli.json_logs {
        registry
            .with(fmt::layer().json().with_target(true).with_thread_ids(false))
            .init();
    } else {
        registry
            .with(
                fmt::layer()
                    .with_target(false)
                    .with_thread_ids(false)
                    .with_ansi(true),
            )
            .init();
    }
}

/// Load the explicit config file, or discover one, then apply env overrides.
fn load_config(cli: &Cli) -> anyhow::Result<VendorwatchConfig> {
    let mut config = match cli.config {
        Some(ref path) => vendorwatch_config::load_config(path)
            .with_context(|| format!("loading {}", path.display()))?,
        None => vendorwatch_config::discover_and_load(),
    };
    vendorwatch_config::apply_env_overrides(&mut config);
    Ok(config)
}

fn data_dir(cli: &Cli) -> PathBuf {
    cli.data_dir
        .clone()
        .unwrap_or_else(vendorwatch_config::data_dir)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    init_telemetry(&cli);

    info!(version = env!("CARGO_PKG_VERSION"), "vendorwatch starting");

    match cli.command {
        None | Some(Commands::Run) => {
            let config = load_config(&cli)?;
            run_command::run(config, data_dir(&cli)).await
        },
        Some(Commands::Check {
            ref id,
            keep_artifact,
        }) => {
            let config = load_config(&cli)?;
            check_command::check(&config, &data_dir(&cli), id, keep_artifact).await
        },
        Some(Commands::Subscribers { ref action }) => {
            let config = load_config(&cli)?;
            subscriber_commands::handle_subscribers(action, &config, &data_dir(&cli)).await
        },
        Some(Commands::Config { ref action }) => {
            config_commands::handle_config(action, cli.config.as_deref())
        },
    }
}
