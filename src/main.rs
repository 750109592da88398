use events::HandlerRegistry;
use log::{error, info};
use relay::Router;
use service::{config::Config, logging::Logger, AppState};

#[tokio::main]
async fn main() {
    let config = Config::new();
    if let Err(e) = Logger::init_logger(&config) {
        eprintln!("Failed to start logger: {e}");
        std::process::exit(1);
    }

    info!("Starting relay_rs {}", env!("CARGO_PKG_VERSION"));

    let app_state = AppState::new(config);

    let (router, router_task) = Router::new(HandlerRegistry::new()).spawn();
    app_state.attach_router(router);

    if let Err(e) = web::init_server(app_state).await {
        error!("Failed to start server: {e}");
        std::process::exit(1);
    }

    router_task.abort();
}
