mod config;
mod error;
mod routes;
mod state;
mod storage;
mod submission;
mod translate;

#[cfg(test)]
mod testing;

use anyhow::Result;
use axum::Router;
use std::net::SocketAddr;
use std::path::Path;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use config::{Config, LoggingConfig};
use state::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    let dotenv_path = dotenvy::dotenv().ok();

    let (config, source) = load_config()?;

    // Dropping the guard stops the file writer.
    let _log_guard = init_tracing(&config.logging)?;

    if let Some(path) = dotenv_path {
        info!("Loaded environment from {}", path.display());
    }
    info!("Loaded configuration from {}", source);

    let app_state = AppState::new(config.clone())?;

    // Build application
    let app = Router::new()
        .merge(routes::create_routes(&app_state))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(app_state);

    let host: std::net::IpAddr = config
        .server
        .host
        .parse()
        .map_err(|e| anyhow::anyhow!("Invalid host {}: {}", config.server.host, e))?;
    let addr = SocketAddr::from((host, config.server.port));
    info!("Starting server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

/// Console logging, plus a plain-text file when `logging.file` is set.
fn init_tracing(logging: &LoggingConfig) -> Result<Option<WorkerGuard>> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("doc_translate_gateway=debug,tower_http=debug"));

    let (file_layer, guard) = match logging.file.as_deref() {
        Some(file) => {
            let path = Path::new(file);
            let dir = path
                .parent()
                .filter(|p| !p.as_os_str().is_empty())
                .unwrap_or_else(|| Path::new("."));
            let file_name = path
                .file_name()
                .ok_or_else(|| anyhow::anyhow!("Invalid log file path: {}", file))?;
            std::fs::create_dir_all(dir)?;

            let appender = tracing_appender::rolling::never(dir, file_name);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = fmt::layer().with_writer(writer).with_ansi(false);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer())
        .with(file_layer)
        .init();

    Ok(guard)
}

/// Config file from `CONFIG_PATH`, `conf.yaml` or `conf.json`, else the environment.
fn load_config() -> Result<(Config, String)> {
    let candidates: Vec<String> = vec![
        std::env::var("CONFIG_PATH").ok(),
        Some("conf.yaml".to_string()),
        Some("conf.json".to_string()),
    ]
    .into_iter()
    .flatten()
    .collect();

    for path in candidates {
        if !Path::new(&path).exists() {
            continue;
        }
        let config = Config::load(&path)
            .map_err(|e| anyhow::anyhow!("Failed to load config from {}: {}", path, e))?;
        return Ok((config, path));
    }

    let config = Config::from_env()?;
    Ok((config, "environment".to_string()))
}
