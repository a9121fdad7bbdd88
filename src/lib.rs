//! Backend for the Mokart telemetry dashboard.
//!
//! The API sits between the web frontend and a hosted Supabase project:
//! - `/sessions/*`: recording sessions and their raw sensor stream
//!   (UWB position, IMU, steering), plus trajectory and stats derived on read
//! - `/auth/*`: email/password login with automatic registration
//! - `/`, `/health`: liveness, always answered even without Supabase
//!
//! Without `SUPABASE_URL` and `SUPABASE_KEY_SECRET` the server still starts;
//! every data route then answers 500 "Supabase not configured".

use std::sync::Arc;

use tokio::net::TcpListener;
use tokio::signal;

pub mod auth;
pub mod config;
pub mod error;
pub mod logger;
pub mod models;
pub mod routes;
pub mod store;
pub mod telemetry;

pub use config::ApiConfig;
pub use error::ApiError;
pub use routes::{router, AppState};
pub use store::{DataStore, StoreError, SupabaseClient};

/// Supabase client for the configured project, if any.
pub fn connect_store(config: &ApiConfig) -> Option<SupabaseClient> {
    let Some((url, key)) = config.supabase_credentials() else {
        log::warn!("SUPABASE_URL or SUPABASE_KEY_SECRET not set, running without a database");
        return None;
    };

    match SupabaseClient::new(url, key, config.request_timeout, config.max_retries) {
        Ok(client) => {
            log::info!("Using Supabase project at {}", client.base_url());
            Some(client)
        }
        Err(e) => {
            log::error!("Failed to create Supabase client: {}", e);
            None
        }
    }
}

pub async fn start_server(config: ApiConfig) -> std::io::Result<()> {
    if config.demo_mode {
        log::warn!("Demo mode enabled: demo credentials are accepted without Supabase");
    }

    let addr = config.bind_addr;
    let store = connect_store(&config);
    let app = router(Arc::new(AppState::new(config, store)));

    let listener = TcpListener::bind(addr).await?;
    log::info!("Mokart API listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    log::info!("Server shut down");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        match signal::ctrl_c().await {
            Ok(()) => log::info!("Received Ctrl+C, shutting down"),
            Err(e) => {
                log::error!("Failed to listen for Ctrl+C: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
                log::info!("Received terminate signal, shutting down");
            }
            Err(e) => {
                log::error!("Failed to install SIGTERM handler: {}", e);
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
}
