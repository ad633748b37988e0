mod config_commands;
mod run;

use std::path::PathBuf;

use {
    clap::{Parser, Subcommand},
    ocean_config::PluginConfig,
    tracing::info,
    tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt},
};

#[derive(Parser)]
#[command(name = "ocean", about = "ocean: DigitalOcean chat-ops plugin runtime")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Config file (defaults to ./ocean.toml, then the user config dir).
    #[arg(long, global = true, env = "OCEAN_CONFIG")]
    config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    /// Output logs as JSON instead of human-readable.
    #[arg(long, global = true, default_value_t = false)]
    json_logs: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Activate the plugin and answer `/do` commands read from stdin
    /// (default when no subcommand is provided).
    Run,
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

    // Logs go to stderr; stdout carries command responses.
    if cli.json_logs {
        registry
            .with(
                fmt::layer()
                    .json()
                    .with_target(true)
                    .with_thread_ids(false)
                    .with_writer(std::io::stderr),
            )
            .init();
    } else {
        registry
            .with(
                fmt::layer()
                    .with_target(false)
                    .with_thread_ids(false)
                    .with_ansi(true)
                    .with_writer(std::io::stderr),
            )
            .init();
    }
}

/// The explicit file when given, otherwise discovery. `OCEAN_*` overrides
/// apply either way.
fn load_config(path: Option<&PathBuf>) -> anyhow::Result<PluginConfig> {
    let mut config = match path {
        Some(path) => ocean_config::load_config(path)?,
        None => ocean_config::discover_and_load(),
    };
    ocean_config::apply_env_overrides(&mut config);
    Ok(config)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    init_telemetry(&cli);

    info!(version = env!("CARGO_PKG_VERSION"), "ocean starting");

    match cli.command {
        None | Some(Commands::Run) => {
            let config = load_config(cli.config.as_ref())?;
            let config_path = cli.config.or_else(ocean_config::find_config_file);
            run::run(config, config_path).await
        },
        Some(Commands::Config { action }) => {
            config_commands::handle_config(action, cli.config.as_deref())
        },
    }
}
