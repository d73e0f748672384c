use std::sync::Arc;

use courier_dispatch::error::AppError;
use courier_dispatch::{api, config, seed, state};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), AppError> {
    let config = config::Config::from_env()?;

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(config.log_level.clone()))
        .with_target(false)
        .compact()
        .init();

    config.pricing.validate()?;

    let app_state = state::AppState::new(config.pricing.clone(), config.event_buffer_size);
    if config.seed_demo_data {
        seed::load_demo_data(&app_state.store)?;
    }
    app_state.refresh_driver_gauge();
    let shared_state = Arc::new(app_state);

    let app = api::rest::router(shared_state.clone());

    let bind_addr = format!("0.0.0.0:{}", config.http_port);
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .map_err(|err| AppError::Internal(format!("failed to bind {bind_addr}: {err}")))?;

    tracing::info!(
        http_port = config.http_port,
        base_fare = config.pricing.base_fare,
        per_km_rate = config.pricing.per_km_rate,
        "http server started"
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|err| AppError::Internal(format!("server error: {err}")))?;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %err, "failed to listen for shutdown signal");
    }
}
