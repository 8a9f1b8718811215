//! Fragment piercing gateway binary.
//!
//! ```text
//! fragment-gateway --config gateway.toml [--bind 0.0.0.0:8080] [--mode development]
//! fragment-gateway --config gateway.toml check
//! ```

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tokio::net::TcpListener;

use fragment_gateway::config::{build_registry, load_config, ConfigError, GatewaySettings, Mode};
use fragment_gateway::lifecycle::{shutdown_on_signal, Shutdown};
use fragment_gateway::observability::{logging, metrics};
use fragment_gateway::GatewayServer;

#[derive(Parser)]
#[command(name = "fragment-gateway")]
#[command(about = "Gateway that pierces micro-frontend fragments into a shell application", long_about = None)]
struct Cli {
    /// Path to the TOML configuration file.
    #[arg(short, long, default_value = "gateway.toml")]
    config: PathBuf,

    /// Override the listener bind address.
    #[arg(short, long)]
    bind: Option<String>,

    /// Override the gateway mode.
    #[arg(short, long, value_enum)]
    mode: Option<Mode>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate the configuration and print the registered fragments
    Check,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let mut settings = match load_config(&cli.config) {
        Ok(settings) => settings,
        Err(e) => {
            report_config_error(&e);
            std::process::exit(2);
        }
    };
    if let Some(bind) = cli.bind {
        settings.listener.bind_address = bind;
    }
    if let Some(mode) = cli.mode {
        settings.mode = mode;
    }

    if let Some(Commands::Check) = cli.command {
        return check(&settings);
    }

    logging::init(settings.mode, &settings.observability.log_level);
    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        mode = ?settings.mode,
        "fragment-gateway starting"
    );

    let server = GatewayServer::from_settings(&settings)?;
    tracing::info!(
        bind_address = %settings.listener.bind_address,
        shell_origin = %settings.shell.origin,
        fragments = server.gateway().registry().len(),
        request_timeout_secs = settings.timeouts.request_secs,
        "Configuration loaded"
    );

    if settings.observability.metrics_enabled {
        match settings.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(_) => tracing::error!(
                metrics_address = %settings.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let listener = TcpListener::bind(&settings.listener.bind_address).await?;

    let shutdown = Shutdown::new();
    tokio::spawn(shutdown_on_signal(shutdown.clone()));
    server.run(listener, shutdown.subscribe()).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}

fn check(settings: &GatewaySettings) -> Result<(), Box<dyn std::error::Error>> {
    let registry = build_registry(settings)?;

    let fragments: Vec<serde_json::Value> = registry
        .iter()
        .map(|fragment| {
            serde_json::json!({
                "id": fragment.fragment_id,
                "endpoint": fragment.endpoint.as_str(),
                "routes": fragment
                    .route_patterns
                    .iter()
                    .map(|p| p.as_str())
                    .collect::<Vec<_>>(),
                "forward_headers": fragment
                    .forward_fragment_headers
                    .iter()
                    .map(|h| h.as_str())
                    .collect::<Vec<_>>(),
                "fallback": fragment.on_ssr_fetch_error.is_some(),
            })
        })
        .collect();

    let summary = serde_json::json!({
        "bind_address": settings.listener.bind_address,
        "shell_origin": settings.shell.origin,
        "mode": settings.mode,
        "fragments": fragments,
    });
    println!("{}", serde_json::to_string_pretty(&summary)?);
    Ok(())
}

fn report_config_error(error: &ConfigError) {
    eprintln!("Error: {error}");
    if let ConfigError::Validation(errors) = error {
        for e in errors {
            eprintln!("  - {e}");
        }
    }
}
