use std::{net::SocketAddr, sync::Arc, time::Duration};

use {
    anyhow::Context,
    axum::{
        Router,
        extract::State,
        response::{IntoResponse, Json},
        routing::{get, patch, post},
    },
    tower_http::{
        cors::{Any, CorsLayer},
        trace::TraceLayer,
    },
    tracing::info,
};

use {
    taskwire_config::TaskwireConfig,
    taskwire_whatsapp::{QrPngRenderer, SidecarProviderFactory},
};

use crate::{state::AppState, task_routes, whatsapp_routes};

// ── Server startup ───────────────────────────────────────────────────────────

/// Build the API router (shared between production startup and tests).
pub fn build_gateway_app(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/", get(root_handler))
        .route(
            "/api/whatsapp/connect",
            get(whatsapp_routes::connection_status).post(whatsapp_routes::connect),
        )
        .route("/api/whatsapp/qr", get(whatsapp_routes::pairing_qr))
        .route("/api/whatsapp/disconnect", post(whatsapp_routes::disconnect))
        .route("/api/tasks", get(task_routes::list_tasks))
        .route(
            "/api/tasks/{id}",
            patch(task_routes::update_task).delete(task_routes::delete_task),
        )
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

/// Serve the API until a termination signal arrives, then release the
/// WhatsApp client.
pub async fn start_gateway(config: &TaskwireConfig) -> anyhow::Result<()> {
    let state = AppState::new(
        Arc::new(SidecarProviderFactory::new(config.whatsapp.clone())),
        Arc::new(QrPngRenderer::default()),
    );
    let whatsapp = Arc::clone(&state.whatsapp);
    let app = build_gateway_app(state);

    let (bind, port) = (config.server.bind.as_str(), config.server.port);
    let listener = tokio::net::TcpListener::bind((bind, port))
        .await
        .with_context(|| format!("failed to bind {bind}:{port}"))?;
    let addr: SocketAddr = listener.local_addr()?;
    info!(%addr, "taskwire listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(taskwire_common::shutdown::signal())
        .await?;

    whatsapp
        .shutdown(Duration::from_secs(config.whatsapp.shutdown_timeout_secs))
        .await;
    info!("taskwire stopped");
    Ok(())
}

// ── Handlers ─────────────────────────────────────────────────────────────────

async fn root_handler(State(state): State<AppState>) -> impl IntoResponse {
    let status = state.whatsapp.status().await;
    Json(serde_json::json!({
        "status": "ok",
        "message": "WhatsApp task extraction service is running",
        "connected": status.connected,
        "initializing": status.initializing,
    }))
}
