mod api;
mod dispatcher;
mod middleware;
#[cfg(test)]
mod test_support;
mod transport;

use std::sync::Arc;
use std::time::Duration;

use linkhelper_scraper::Pipeline;
use tracing_subscriber::EnvFilter;

use crate::{
    api::{build_app, AppState},
    dispatcher::Dispatcher,
    transport::{ChatTransport, TelegramTransport},
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let config = linkhelper_core::load_app_config()?;
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(config.log_level.clone()))?;
    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    tracing::info!(env = %config.env, bind_addr = %config.bind_addr, "starting linkhelper server");

    let pipeline = Arc::new(Pipeline::from_config(&config.pipeline)?);
    let transport: Arc<dyn ChatTransport> = Arc::new(TelegramTransport::new(
        &config.telegram_token,
        config.telegram_pool_max_idle,
    )?);

    let (dispatcher, consumer) = Dispatcher::start(
        pipeline,
        Arc::clone(&transport),
        config.queue_capacity,
        config.workers,
    );
    let app = build_app(AppState {
        dispatcher,
        transport,
    });

    let listener = tokio::net::TcpListener::bind(config.bind_addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    consumer
        .shutdown(Duration::from_secs(config.shutdown_drain_secs))
        .await;
    tracing::info!("shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to listen for ctrl-c");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }

    tracing::info!("received shutdown signal, starting graceful shutdown");
}
