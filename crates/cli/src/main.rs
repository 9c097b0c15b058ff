use std::path::PathBuf;

use {
    clap::{Parser, Subcommand},
    taskwire_config::TaskwireConfig,
    tracing::info,
    tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt},
};

#[derive(Parser)]
#[command(name = "taskwire", about = "Taskwire: turn WhatsApp messages into tasks")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    #[arg(long, global = true, default_value_t = false)]
    json_logs: bool,

    #[arg(long, global = true)]
    bind: Option<String>,
    #[arg(long, global = true)]
    port: Option<u16>,
    #[arg(long, global = true, env = "TASKWIRE_CONFIG_DIR")]
    config_dir: Option<PathBuf>,
    /// Directory of the WhatsApp Baileys sidecar.
    #[arg(long, global = true, env = "TASKWIRE_WHATSAPP_SIDECAR_DIR")]
    sidecar_dir: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the HTTP API (default).
    Serve,
    /// Print the effective configuration as TOML.
    Config,
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

/// Config file and environment, then command-line overrides on top.
fn resolve_config(cli: &Cli) -> TaskwireConfig {
    if let Some(ref dir) = cli.config_dir {
        taskwire_config::set_config_dir(dir.clone());
    }

    let mut config = taskwire_config::discover_and_load();
    if let Some(ref bind) = cli.bind {
        config.server.bind = bind.clone();
    }
    if let Some(port) = cli.port {
        config.server.port = port;
    }
    if let Some(ref dir) = cli.sidecar_dir {
        config.whatsapp.sidecar_dir = Some(dir.clone());
    }
    config
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    init_telemetry(&cli);

    let config = resolve_config(&cli);

    match cli.command {
        None | Some(Commands::Serve) => {
            info!(version = env!("CARGO_PKG_VERSION"), "taskwire starting");
            taskwire_gateway::start_gateway(&config).await
        },
        Some(Commands::Config) => {
            print!("{}", toml::to_string_pretty(&config)?);
            Ok(())
        },
    }
}
