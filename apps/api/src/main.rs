use dotenvy::dotenv;
use tracing::{info, warn};

use newsletter_api::infra::{
    app::create_app,
    config::AppConfig,
    setup::{init_app_state, init_tracing},
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();

    let config = AppConfig::from_env();
    init_tracing(&config.log_file)?;

    let (app_state, pool) = init_app_state(config).await?;

    let bind_addr = app_state.config.bind_addr;

    let app = create_app(app_state);

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;

    info!("Backend listening at {}", &listener.local_addr()?);

    axum::serve(listener, app)
        .with_graceful_shutdown(wait_for_shutdown_signal())
        .await?;

    pool.close().await;
    info!("Shutdown complete");

    Ok(())
}

async fn wait_for_shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};
        match (signal(SignalKind::terminate()), signal(SignalKind::interrupt())) {
            (Ok(mut sigterm), Ok(mut sigint)) => {
                tokio::select! {
                    _ = sigterm.recv() => {}
                    _ = sigint.recv() => {}
                }
            }
            _ => {
                warn!("Could not register signal handlers, falling back to ctrl-c");
                let _ = tokio::signal::ctrl_c().await;
            }
        }
    }
    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
    info!("Shutdown signal received, draining in-flight requests");
}
