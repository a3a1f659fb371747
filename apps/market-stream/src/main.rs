//! Market Stream Binary
//!
//! Streams real-time market data to stdout, or fetches one REST path.
//!
//! # Usage
//!
//! ```bash
//! market-stream stream stocks trades AAPL MSFT
//! market-stream stream crypto quotes --all --output json
//! market-stream get /v3/reference/tickers/AAPL
//! ```
//!
//! # Environment Variables
//!
//! ## Required
//! - `MARKET_DATA_API_KEY`: API key (or `--api-key`)
//!
//! ## Optional
//! - `MARKET_DATA_WS_URL`: streaming base URL (default: `wss://socket.polygon.io`)
//! - `MARKET_DATA_REST_URL`: REST base URL (default: `https://api.polygon.io`)
//! - `MARKET_STREAM_READ_TIMEOUT_SECS`, `MARKET_STREAM_PING_INTERVAL_SECS`,
//!   `MARKET_STREAM_AUTH_TIMEOUT_SECS`: connection timings
//! - `MARKET_STREAM_RECONNECT_*`: backoff settings
//! - `MARKET_STREAM_METRICS_PORT`: Prometheus listener on localhost (default: off)
//! - `OTEL_ENABLED`: export spans over OTLP (default: false)
//! - `RUST_LOG`: log filter (default: `market_stream=info`)
//!
//! # Exit Codes
//!
//! - 0: interrupted or finished
//! - 1: runtime error (authentication, configuration, request failure)
//! - 2: usage error

use std::io::{self, Write};
use std::process::ExitCode;

use anyhow::Context;
use market_stream::cli::render::{JsonRenderer, TableRenderer};
use market_stream::cli::{Cli, Invocation, OutputFormat};
use market_stream::infrastructure::telemetry::{self, TelemetryConfig};
use market_stream::{
    ClientConfig, Fetch, RestClient, StreamClient, StreamConfig, Subscription, init_metrics,
};
use tokio::signal;
use tokio_util::sync::CancellationToken;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::try_parse_from(std::env::args_os()).unwrap_or_else(|e| e.exit());

    // Already installed is fine.
    let _ = rustls::crypto::ring::default_provider().install_default();

    load_dotenv();

    let telemetry_config = TelemetryConfig::from_env().with_verbosity(cli.global.verbose);
    let _telemetry_guard = match telemetry::init_with_config(&telemetry_config) {
        Ok(guard) => Some(guard),
        Err(e) => {
            eprintln!("warning: logging disabled: {e}");
            None
        }
    };

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let config =
        ClientConfig::from_lookup(|key| cli.flag_override(key).or_else(|| std::env::var(key).ok()))
            .context("failed to load configuration")?;

    tracing::debug!(
        ws_url = %config.ws_url,
        rest_url = %config.rest_url,
        metrics_port = config.metrics_port,
        "Configuration loaded"
    );

    if config.metrics_port != 0 {
        let addr = init_metrics(config.metrics_port).context("failed to start metrics exporter")?;
        tracing::info!(addr = %addr, "Metrics exporter listening");
    }

    match cli.invocation {
        Invocation::Stream(subscription) => {
            run_stream(&config, subscription, cli.global.output).await
        }
        Invocation::Get { path, params } => {
            run_get(&config, &path, &params, cli.global.output).await
        }
    }
}

async fn run_stream(
    config: &ClientConfig,
    subscription: Subscription,
    output: OutputFormat,
) -> anyhow::Result<()> {
    let cancel = CancellationToken::new();
    tokio::spawn(await_shutdown(cancel.clone()));

    let url = StreamConfig::endpoint(&config.ws_url, subscription.asset_class());
    let stream_config = StreamConfig::from_settings(url, config.api_key.clone(), &config.stream);
    let client = StreamClient::new(stream_config, subscription, cancel.clone());

    let result = match output {
        OutputFormat::Table => {
            let mut renderer =
                TableRenderer::new(io::stdout()).cancel_on_write_error(cancel.clone());
            client.run(&mut renderer).await
        }
        OutputFormat::Json => {
            let mut renderer = JsonRenderer::new(io::stdout()).cancel_on_write_error(cancel.clone());
            client.run(&mut renderer).await
        }
    };

    cancel.cancel();
    result.context("stream stopped")?;

    tracing::info!("Stream closed");
    Ok(())
}

async fn run_get(
    config: &ClientConfig,
    path: &str,
    params: &[(String, String)],
    output: OutputFormat,
) -> anyhow::Result<()> {
    let client = RestClient::new(config.rest_url.clone(), config.api_key.clone())
        .context("invalid REST configuration")?;

    let value = client
        .fetch_value(path, params)
        .await
        .with_context(|| format!("GET {path} failed"))?;

    let text = match output {
        OutputFormat::Table => serde_json::to_string_pretty(&value)?,
        OutputFormat::Json => value.to_string(),
    };

    let mut stdout = io::stdout().lock();
    writeln!(stdout, "{text}").context("failed to write response")?;
    Ok(())
}

/// Load .env file from current directory or any ancestor directory.
fn load_dotenv() {
    if dotenvy::dotenv().is_ok() {
        return;
    }

    if let Ok(cwd) = std::env::current_dir() {
        let mut dir = cwd.as_path();
        while let Some(parent) = dir.parent() {
            let env_path = parent.join(".env");
            if env_path.exists() {
                let _ = dotenvy::from_path(&env_path);
                return;
            }
            dir = parent;
        }
    }
}

/// Cancel on SIGINT or SIGTERM.
async fn await_shutdown(cancel: CancellationToken) {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::warn!(error = %e, "Ctrl+C handler unavailable");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::warn!(error = %e, "SIGTERM handler unavailable");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("Received Ctrl+C, shutting down");
        }
        () = terminate => {
            tracing::info!("Received SIGTERM, shutting down");
        }
        () = cancel.cancelled() => return,
    }

    cancel.cancel();
}
