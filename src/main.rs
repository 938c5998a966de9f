//! `server-api` command line client.
//!
//! Runs the dispatcher with a config file and a simulated VPN state, then
//! issues one request or stays up applying config reloads.

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use clap::{Parser, Subcommand, ValueEnum};
use serde_json::Value;

use server_api::config::{load_config, ApiConfig, ConfigWatcher};
use server_api::connect_state::{ConnectState, ConnectStateController};
use server_api::lifecycle::{signals, Shutdown};
use server_api::net::NetworkDetector;
use server_api::observability::{logging, metrics};
use server_api::request::RequestType;
use server_api::{ApiRequest, JsonPayload, ServerApi};

#[derive(Parser)]
#[command(name = "server-api")]
#[command(about = "Failover-aware API client", long_about = None)]
struct Cli {
    /// TOML config file. Defaults apply when omitted.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// VPN state to simulate.
    #[arg(long, value_enum, default_value_t = StateArg::Disconnected)]
    connect_state: StateArg,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Issue a GET request and print the JSON result
    Get {
        path: String,
        /// Query parameter as key=value, repeatable
        #[arg(short, long = "query", value_parser = parse_key_val)]
        query: Vec<(String, String)>,
    },
    /// Issue a POST request with a JSON body
    Post { path: String, body: String },
    /// Print the hostname requests would go to
    Hostname,
    /// Stay running and apply config file changes until interrupted
    Watch,
}

#[derive(Clone, Copy, ValueEnum)]
enum StateArg {
    Disconnected,
    Connected,
    Connecting,
    Disconnecting,
}

impl From<StateArg> for ConnectState {
    fn from(arg: StateArg) -> Self {
        match arg {
            StateArg::Disconnected => ConnectState::Disconnected,
            StateArg::Connected => ConnectState::Connected,
            StateArg::Connecting => ConnectState::Connecting,
            StateArg::Disconnecting => ConnectState::Disconnecting,
        }
    }
}

fn parse_key_val(s: &str) -> Result<(String, String), String> {
    s.split_once('=')
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .ok_or_else(|| format!("expected key=value, got '{}'", s))
}

#[tokio::main]
async fn main() -> Result<ExitCode, Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => load_config(path)?,
        None => ApiConfig::default(),
    };

    logging::init_tracing(Some(&config.observability.log_filter));
    tracing::info!("server-api v{} starting", env!("CARGO_PKG_VERSION"));

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let shutdown = Shutdown::new();
    let connect_state = Arc::new(ConnectStateController::new(cli.connect_state.into()));
    let network = Arc::new(NetworkDetector::default());
    let (api, handle) = ServerApi::from_config(&config, connect_state, network, &shutdown)?;

    let exit = match cli.command {
        Commands::Get { path, query } => {
            let payload = query
                .into_iter()
                .fold(JsonPayload::<Value>::new("cli-get", RequestType::Get, path), |p, (k, v)| p.with_query(k, v));
            let request = api.json_request(payload);
            print_result(&request).await?
        }
        Commands::Post { path, body } => {
            let body: Value = serde_json::from_str(&body)?;
            let request = api.json_post::<Value>("cli-post", &path, body);
            print_result(&request).await?
        }
        Commands::Hostname => {
            println!("{}", api.hostname());
            ExitCode::SUCCESS
        }
        Commands::Watch => {
            watch(&api, cli.config, &config, &shutdown).await?;
            ExitCode::SUCCESS
        }
    };

    shutdown.trigger();
    handle.await?;
    tracing::info!("Shutdown complete");
    Ok(exit)
}

async fn print_result(request: &ApiRequest<JsonPayload<Value>>) -> Result<ExitCode, Box<dyn std::error::Error>> {
    let code = request.wait_finished().await;
    println!("result: {}", code);
    if let Some(output) = request.take_output() {
        println!("{}", serde_json::to_string_pretty(&output)?);
    }
    Ok(if code.is_success() { ExitCode::SUCCESS } else { ExitCode::FAILURE })
}

async fn watch(
    api: &ServerApi,
    path: Option<PathBuf>,
    config: &ApiConfig,
    shutdown: &Shutdown,
) -> Result<(), Box<dyn std::error::Error>> {
    tokio::spawn(signals::shutdown_on_signal(shutdown.clone()));
    let mut stop = shutdown.subscribe();

    let Some(path) = path else {
        tracing::info!(hostname = %api.hostname(), "No config file to watch, waiting for shutdown");
        let _ = stop.recv().await;
        return Ok(());
    };

    let (watcher, mut updates) = ConfigWatcher::new(&path, config);
    let _watcher = watcher.run()?;

    loop {
        tokio::select! {
            _ = stop.recv() => break,
            update = updates.recv() => match update {
                Some(settings) => {
                    tracing::info!(
                        ignore_ssl_errors = settings.ignore_ssl_errors,
                        automatic = settings.resolution.automatic,
                        "Applying reloaded settings"
                    );
                    api.set_ignore_ssl_errors(settings.ignore_ssl_errors);
                    api.set_api_resolution_settings(settings.resolution);
                }
                None => break,
            },
        }
    }
    Ok(())
}
