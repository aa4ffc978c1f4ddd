use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use toolloop_core::{CancellationToken, SharedLogger, TracingLogger};
use toolloop_server::{BuiltinHandler, ToolServer, WeatherSettings, DEFAULT_WEATHER_URL};

/// Serve the built-in tools over framed JSON-RPC
#[derive(Debug, Parser)]
#[command(name = "toolloop-server", version)]
struct Args {
    /// Address to bind
    #[arg(long, env = "TOOLLOOP_HOST", default_value = "127.0.0.1")]
    host: String,

    /// Port to listen on
    #[arg(long, env = "TOOLLOOP_PORT", default_value_t = 8080)]
    port: u16,

    /// Listen on a Unix socket instead of TCP
    #[arg(long, env = "TOOLLOOP_SOCKET")]
    socket: Option<PathBuf>,

    /// Weather API key
    #[arg(long, env = "OPENWEATHER_API_KEY", hide_env_values = true)]
    weather_key: Option<String>,

    /// Weather API endpoint
    #[arg(long, env = "TOOLLOOP_WEATHER_URL", default_value = DEFAULT_WEATHER_URL)]
    weather_url: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = Args::parse();
    if args.weather_key.is_none() {
        tracing::warn!("No weather API key configured; get_weather will fail");
    }

    let logger: SharedLogger = Arc::new(TracingLogger::new("toolloop::server"));
    let handler = Arc::new(BuiltinHandler::new(
        WeatherSettings {
            api_key: args.weather_key,
            base_url: args.weather_url,
        },
        logger.clone(),
    ));
    let server = Arc::new(ToolServer::new(handler, logger));

    let shutdown = CancellationToken::new();
    let trigger = shutdown.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("Shutting down");
            trigger.cancel();
        }
    });

    if let Some(path) = args.socket {
        #[cfg(unix)]
        {
            let _ = std::fs::remove_file(&path);
            let listener = tokio::net::UnixListener::bind(&path)
                .with_context(|| format!("failed to bind {}", path.display()))?;
            server.serve_unix(listener, shutdown).await?;
            let _ = std::fs::remove_file(&path);
            return Ok(());
        }
        #[cfg(not(unix))]
        anyhow::bail!("Unix sockets are not supported on this platform: {}", path.display());
    }

    let addr = format!("{}:{}", args.host, args.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {}", addr))?;
    server.serve_tcp(listener, shutdown).await?;
    Ok(())
}
