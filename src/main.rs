use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::info;
use oxidized_extract::{
    config::Config,
    extraction::{ExtractionPipeline, ProcessWorker},
    routes::create_router,
    storage::{Reaper, TransientStore},
    utils::init_logger,
    AppState,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load configuration
    let config = Config::from_env()?;
    let _log_guard = init_logger(config.logging.dir.as_deref());
    info!("Configuration loaded: {:?}", config.server);

    // Upload directory and its reaper
    let store = TransientStore::open(&config.upload.dir).await?;
    info!("Storing uploads in {:?}", store.root());
    let reaper = Reaper::new(store.clone(), config.reaper.interval(), config.reaper.max_age()).spawn();

    // Create shared state
    let worker = ProcessWorker::from_config(&config.worker);
    let pipeline = ExtractionPipeline::new(store.clone(), Arc::new(worker));
    let host: std::net::IpAddr = config.server.host.parse()?;
    let port = config.server.port;
    let state = AppState::new(config, store, pipeline);

    // Create router
    let app = create_router(state);

    // Start server
    let addr = SocketAddr::from((host, port));
    info!("Server listening on {}", addr);

    let listener = TcpListener::bind(addr).await?;
    let served = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await;

    if let Err(e) = reaper.shutdown().await {
        tracing::error!("Reaper task ended abnormally: {}", e);
    }
    served.map_err(|e| anyhow::anyhow!("Server error: {}", e))?;

    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl-C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received");
}
