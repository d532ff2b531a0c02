use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CheckoutError {
    #[error("Configuration error: {0}")]
    ConfigError(String),
    #[error("{0}")]
    ValidationError(String),
    #[error("{message}")]
    GatewayError { status: Option<u16>, message: String },
    #[error("{0}")]
    NotFound(String),
    #[error("Internal error: {0}")]
    InternalError(Box<dyn std::error::Error + Send + Sync>),
    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, CheckoutError>;

#[cfg(feature = "storage-mysql")]
impl From<sqlx::Error> for CheckoutError {
    fn from(err: sqlx::Error) -> Self {
        Self::InternalError(Box::new(err))
    }
}

impl CheckoutError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::ValidationError(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    pub fn gateway(status: Option<u16>, msg: impl Into<String>) -> Self {
        Self::GatewayError {
            status,
            message: msg.into(),
        }
    }

    /// HTTP status this error is surfaced with.
    ///
    /// Gateway errors keep the processor's status when it is a client error;
    /// anything else from the gateway (5xx, transport failures) is a 502.
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::ConfigError(_) | Self::InternalError(_) | Self::SerializationError(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            Self::ValidationError(_) => StatusCode::BAD_REQUEST,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::GatewayError { status, .. } => status
                .and_then(|code| StatusCode::from_u16(code).ok())
                .filter(StatusCode::is_client_error)
                .unwrap_or(StatusCode::BAD_GATEWAY),
        }
    }

    /// Message safe to hand back to the front-end.
    ///
    /// Store and serialization failures are logged in full but only reported
    /// generically.
    pub fn public_message(&self) -> String {
        match self {
            Self::InternalError(_) | Self::SerializationError(_) => {
                "Internal server error".to_string()
            }
            other => other.to_string(),
        }
    }
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
}

impl IntoResponse for CheckoutError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!(status = status.as_u16(), error = %self, "Request failed");
        } else {
            tracing::warn!(status = status.as_u16(), error = %self, "Request rejected");
        }

        let body = Json(ErrorBody {
            error: self.public_message(),
        });
        (status, body).into_response()
    }
}
