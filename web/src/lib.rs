use log::*;
use service::AppState;
use tokio::net::TcpListener;

mod controller;
mod error;
mod params;
pub mod router;
mod ws;

pub use error::{Error, Result};

/// Serve the relay socket and ingress on the relay port and, when configured,
/// ingress alone on the API port. Returns once every listener has shut down.
pub async fn init_server(app_state: AppState) -> std::io::Result<()> {
    let relay_address = app_state.config.relay_address();
    let api_address = app_state.config.api_address();

    info!(
        "Relay listening on {relay_address}, socket at {}",
        app_state.config.socket_route()
    );
    let relay_listener = TcpListener::bind(&relay_address).await?;
    let relay_routes = router::define_routes(app_state.clone());
    let relay_server =
        axum::serve(relay_listener, relay_routes).with_graceful_shutdown(shutdown_signal());

    match api_address {
        Some(api_address) => {
            info!("Ingress API listening on {api_address}");
            let api_listener = TcpListener::bind(&api_address).await?;
            let api_routes = router::define_ingress_routes(app_state);
            let api_server =
                axum::serve(api_listener, api_routes).with_graceful_shutdown(shutdown_signal());

            tokio::try_join!(
                async { relay_server.await },
                async { api_server.await }
            )?;
        }
        None => relay_server.await?,
    }

    info!("Relay stopped");
    Ok(())
}

async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("Shutdown signal received"),
        Err(e) => error!("Failed to listen for shutdown signal: {e}"),
    }
}
