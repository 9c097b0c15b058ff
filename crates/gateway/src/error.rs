use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};

/// Error surfaced to HTTP clients as `{"error": "..."}`.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("Task not found")]
    TaskNotFound,

    #[error(transparent)]
    WhatsApp(#[from] taskwire_whatsapp::Error),
}

impl From<taskwire_tasks::Error> for ApiError {
    fn from(err: taskwire_tasks::Error) -> Self {
        match err {
            taskwire_tasks::Error::NotFound { .. } => Self::TaskNotFound,
        }
    }
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::TaskNotFound => StatusCode::NOT_FOUND,
            Self::WhatsApp(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (
            self.status(),
            Json(serde_json::json!({ "error": self.to_string() })),
        )
            .into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_found_maps_to_404() {
        let err = ApiError::from(taskwire_tasks::Error::not_found("abc"));
        assert_eq!(err.status(), StatusCode::NOT_FOUND);
        assert_eq!(err.to_string(), "Task not found");
    }

    #[test]
    fn provider_init_maps_to_500() {
        let err = ApiError::from(taskwire_whatsapp::Error::provider_init("no browser"));
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(err.to_string().contains("no browser"));
    }
}
