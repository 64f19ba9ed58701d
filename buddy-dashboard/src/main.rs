//! Buddy Dashboard: local host for the assistant dashboard.
//!
//! Talks to the assistant backend over HTTP and WebSocket, keeps the view
//! state for one signed-in user, and serves the dashboard UI.
//! Default: http://127.0.0.1:9110/

mod backend_client;
mod capture;
mod config;
mod dashboard;
mod identity_gate;
mod live_session;
mod loader;
#[cfg(test)]
mod mock_backend;
mod routes;
mod signaling;
mod transcript;
mod view;
mod view_model;

use backend_client::{BackendApi, BackendClient};
use config::Config;
use identity_gate::IdentityGate;
use routes::AppState;
use std::sync::Arc;
use view::ViewContext;

#[tokio::main]
async fn main() {
    dotenv::dotenv().ok();
    env_logger::init();

    let config = Config::from_env();
    if let Err(e) = config.validate() {
        log::error!("{}", e);
        return;
    }
    log::info!("Backend: {}", config.backend_url);
    log::info!("Realtime channel: {}", config.realtime_url);

    let api: Arc<dyn BackendApi> = Arc::new(BackendClient::new(&config.backend_url));
    let frames = capture::frame_source_from_config(&config.capture);

    if config.identity_gate {
        match &frames {
            Some(source) => log::info!("Identity gate enabled (camera: {})", source.name()),
            None => log::warn!("Identity gate enabled but no capture source is configured, captures will abort"),
        }
    }

    let ctx = ViewContext {
        api: api.clone(),
        realtime_url: config.realtime_url.clone(),
        signaling: config.signaling,
    };
    let gate = IdentityGate::new(api, frames);
    let state = Arc::new(AppState::new(config.clone(), ctx, gate));

    if !config.identity_gate {
        match config.startup_source() {
            Ok(source) => state.activate(source).await,
            Err(e) => {
                log::error!("{}", e);
                return;
            }
        }
    }

    let cors = tower_http::cors::CorsLayer::permissive();

    let app = axum::Router::new()
        .route("/", axum::routing::get(dashboard::dashboard))
        // Identity gate
        .route(
            "/rpc/gate/register",
            axum::routing::post(routes::gate_register),
        )
        .route("/rpc/gate/verify", axum::routing::post(routes::gate_verify))
        .route("/rpc/gate/status", axum::routing::get(routes::gate_status))
        // View session
        .route("/rpc/dashboard", axum::routing::get(routes::dashboard_data))
        .route("/rpc/transcript", axum::routing::get(routes::transcript))
        .route(
            "/rpc/session/close",
            axum::routing::post(routes::session_close),
        )
        // Service
        .route("/rpc/status", axum::routing::get(routes::status))
        .with_state(state.clone())
        .layer(cors);

    let addr = format!("127.0.0.1:{}", config.port);
    let listener = match tokio::net::TcpListener::bind(&addr).await {
        Ok(l) => l,
        Err(e) => {
            log::error!("Failed to bind {}: {}", addr, e);
            state.deactivate().await;
            return;
        }
    };
    log::info!("Buddy Dashboard listening on http://{}", addr);

    if let Err(e) = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
    {
        log::error!("Server error: {}", e);
    }

    state.deactivate().await;
    log::info!("Buddy Dashboard stopped");
}

async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => log::info!("Shutdown requested"),
        Err(e) => {
            log::error!("Failed to listen for Ctrl-C: {}", e);
            std::future::pending::<()>().await;
        }
    }
}
