use axum::{Json, extract::State, response::IntoResponse};

use crate::{error::ApiError, state::AppState};

/// Start a WhatsApp client unless one is already initializing or ready.
pub async fn connect(State(state): State<AppState>) -> Result<impl IntoResponse, ApiError> {
    let outcome = state.whatsapp.connect().await?;
    Ok(Json(serde_json::json!({
        "status": outcome.status(),
        "message": outcome.message(),
    })))
}

pub async fn connection_status(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.whatsapp.status().await)
}

/// Latest pairing code and its rendered image, empty until one is issued.
pub async fn pairing_qr(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.whatsapp.pairing().await)
}

pub async fn disconnect(State(state): State<AppState>) -> impl IntoResponse {
    let was_connected = state.whatsapp.disconnect().await;
    Json(serde_json::json!({
        "success": true,
        "wasConnected": was_connected,
    }))
}
