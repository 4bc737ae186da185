use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

pub type Result<T> = std::result::Result<T, AppError>;

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("{message}")]
    Validation { message: String, errors: Vec<String> },

    #[error("{0}")]
    NotFound(String),

    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("Storage error: {0}")]
    Store(#[from] rusqlite::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Internal(String),
}

impl AppError {
    pub fn validation(message: impl Into<String>, errors: Vec<String>) -> Self {
        AppError::Validation {
            message: message.into(),
            errors,
        }
    }

    pub fn invalid_id(raw: &str) -> Self {
        AppError::validation(
            "Invalid connection ID",
            vec![format!("id: expected an integer, got {:?}", raw)],
        )
    }

    pub fn connection_not_found(id: i64) -> Self {
        AppError::NotFound(format!("Connection not found: {}", id))
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::Validation { .. } => StatusCode::BAD_REQUEST,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Redis(_) | AppError::Store(_) | AppError::Io(_) | AppError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = match self {
            AppError::Validation { message, errors } => json!({
                "message": message,
                "errors": errors,
            }),
            AppError::Redis(e) => {
                log::error!("Redis request failed: {}", e);
                json!({ "message": sanitize_error(&format!("Failed to fetch logs: {}", e)) })
            }
            AppError::Store(e) => {
                log::error!("Connection store failed: {}", e);
                json!({ "message": "Failed to access connection store" })
            }
            other => json!({ "message": other.to_string() }),
        };

        (status, Json(body)).into_response()
    }
}

/// Sanitize error messages to remove credentials embedded in Redis URLs
pub fn sanitize_error(error: &str) -> String {
    let mut sanitized = error.to_string();

    for scheme in ["redis://", "rediss://"] {
        let mut search_from = 0;
        while let Some(offset) = sanitized[search_from..].find(scheme) {
            let start = search_from + offset + scheme.len();
            let rest = &sanitized[start..];
            // Only the authority part can hold credentials
            let authority_end = rest
                .find(|c: char| c == '/' || c.is_whitespace())
                .unwrap_or(rest.len());
            match rest[..authority_end].rfind('@') {
                Some(at_pos) => {
                    sanitized = format!(
                        "{}[credentials]{}",
                        &sanitized[..start],
                        &sanitized[start + at_pos..]
                    );
                    search_from = start + "[credentials]".len();
                }
                None => search_from = start,
            }
        }
    }

    sanitized
}
