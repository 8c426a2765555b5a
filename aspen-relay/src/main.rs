// Copyright 2026 The Aspen Project
// SPDX-License-Identifier: Apache-2.0

use aspen_relay::client::ChatClient;
use aspen_relay::config::{self, ClientConfig, Config, ConfigError, ServerConfig};
use aspen_relay::proxy;
use aspen_relay::relay::StreamRelay;
use aspen_relay::turn::MessageSink;
use aspen_relay::upstream::ReqwestHttpSender;
use clap::{Parser, Subcommand};
use std::io::Write;
use std::net::SocketAddr;
use std::process::ExitCode;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "aspen-relay", about = "Streaming relay for agent chat replies")]
struct Cli {
    /// Path to the aspen.yaml config file
    #[arg(long, default_value = "aspen.yaml", env = "ASPEN_CONFIG")]
    config: String,

    /// Agent backend URL; skips the config file
    #[arg(long, env = "ASPEN_UPSTREAM_URL")]
    upstream: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Serve the relay endpoint on localhost
    Serve {
        /// Port to listen on (overrides server.port)
        #[arg(long, env = "ASPEN_PORT")]
        port: Option<u16>,
    },
    /// Send one message to a running relay and print the reply as it streams
    Chat {
        message: String,

        /// Relay endpoint (overrides client.url)
        #[arg(long)]
        url: Option<String>,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .json()
        .with_target(false)
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    match &cli.command {
        Command::Serve { port } => serve(&cli, *port).await,
        Command::Chat { message, url } => chat(&cli, message, url.clone()).await,
    }
}

fn load(cli: &Cli) -> Result<Config, ConfigError> {
    match &cli.upstream {
        Some(url) => Config::for_upstream(url),
        None => config::load_config(&config::FileSource::new(&cli.config)),
    }
}

// ---------------------------------------------------------------------------
// serve
// ---------------------------------------------------------------------------

async fn serve(cli: &Cli, port: Option<u16>) -> ExitCode {
    let mut config = match load(cli) {
        Ok(c) => c,
        Err(e) => {
            tracing::error!("failed to load config: {e}");
            return ExitCode::FAILURE;
        }
    };
    if let Some(port) = port {
        config.server.port = port;
    }

    tracing::info!(
        version = %config.version,
        environment = %config.environment,
        upstream = %config.upstream.url,
        config_hash = %config.config_hash,
        source = %config.source,
        "config loaded"
    );

    let relay = StreamRelay::new(
        Arc::new(ReqwestHttpSender::default()),
        config.upstream.clone(),
    );
    let app = proxy::build_router(Arc::new(relay), &config.server);

    let addr = SocketAddr::from((proxy::BIND_HOST, config.server.port));
    let listener = match tokio::net::TcpListener::bind(addr).await {
        Ok(l) => l,
        Err(e) => {
            tracing::error!(%addr, "failed to bind: {e}");
            return ExitCode::FAILURE;
        }
    };

    tracing::info!(%addr, route = %config.server.route, "aspen relay listening");

    if let Err(e) = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
    {
        tracing::error!("server error: {e}");
        return ExitCode::FAILURE;
    }
    ExitCode::SUCCESS
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("failed to listen for shutdown signal: {e}");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutting down");
}

// ---------------------------------------------------------------------------
// chat
// ---------------------------------------------------------------------------

/// Prints each update's new suffix, so the terminal shows the growing reply.
struct StdoutSink {
    shown: usize,
}

impl StdoutSink {
    fn write(&self, text: &str) {
        let mut out = std::io::stdout().lock();
        // A closed stdout only loses the rendering.
        let _ = out.write_all(text.as_bytes());
        let _ = out.flush();
    }
}

impl MessageSink for StdoutSink {
    fn on_message(&mut self, full_text: &str) {
        if let Some(added) = full_text.get(self.shown..) {
            self.write(added);
        }
        self.shown = full_text.len();
    }

    fn on_error(&mut self, message: &str) {
        let sep = if self.shown > 0 { "\n\n" } else { "" };
        self.write(&format!("{sep}[Error: {message}]"));
    }

    fn on_finished(&mut self) {
        self.write("\n");
    }
}

async fn chat(cli: &Cli, message: &str, url: Option<String>) -> ExitCode {
    let mut client_config = match load(cli) {
        Ok(c) => c.client,
        Err(ConfigError::NotFound { .. }) => ClientConfig {
            url: ServerConfig::default().local_url(),
            timeout_ms: None,
        },
        Err(e) => {
            tracing::error!("failed to load config: {e}");
            return ExitCode::FAILURE;
        }
    };
    if let Some(url) = url {
        client_config.url = url;
    }

    let client = ChatClient::new(Arc::new(ReqwestHttpSender::default()), &client_config);
    let mut sink = StdoutSink { shown: 0 };

    match client.send(message, &mut sink).await {
        Ok(outcome) if outcome.is_success() => ExitCode::SUCCESS,
        Ok(_) => ExitCode::FAILURE,
        Err(e) => {
            eprintln!("{e}");
            ExitCode::FAILURE
        }
    }
}
