mod config;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use genre_classifier::{ClassificationPool, ClassificationService, GenreCnn};
use tokio::net::TcpListener;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use crate::config::{ServerConfig, CONFIG_ENV};

#[derive(Parser, Debug)]
#[command(author, version, about = "Serve media genre classification over HTTP", long_about = None)]
struct Cli {
    /// YAML configuration file; defaults apply when omitted
    #[arg(short, long, env = CONFIG_ENV)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let config = ServerConfig::load(cli.config.as_deref()).context("invalid configuration")?;
    info!(?config, "starting genre classifier");

    let model = GenreCnn::load(&config.model_path).with_context(|| {
        format!("failed to load model from {}", config.model_path.display())
    })?;
    let mut service = ClassificationService::new(Arc::new(model));
    if let Some(dir) = &config.staging_dir {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("failed to create staging dir {}", dir.display()))?;
        service = service.with_staging_dir(dir);
    }
    let pool = ClassificationPool::new(Arc::new(service), config.workers, config.queue_depth);
    info!(
        workers = config.workers,
        capacity = pool.capacity(),
        "classification pool ready"
    );

    let app = genre_services::router(pool.clone(), &config.http_options());
    let listener = TcpListener::bind(config.bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", config.bind_addr))?;
    info!(addr = %listener.local_addr()?, "listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(pool))
        .await?;
    info!("server stopped");
    Ok(())
}

async fn shutdown_signal(pool: ClassificationPool) {
    if let Err(err) = tokio::signal::ctrl_c().await {
        error!(error = %err, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("shutting down");
    pool.close();
}
