use axum::{
    extract::multipart::MultipartError,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

use crate::error::RecognitionError;

/// Errors returned by the HTTP layer. Every body has the shape `{"status": ...}`.
#[derive(Debug, Error)]
pub enum ApiError {
    /// The multipart form had no `image` field.
    #[error("No image provided")]
    MissingImage,

    /// The multipart body could not be read. Carries the rejection status,
    /// e.g. 413 when the upload exceeds the body limit mid-stream.
    #[error("{message}")]
    Multipart { status: StatusCode, message: String },

    /// Recognition could not run. Distinct from "absent".
    #[error("Error processing image: {0}")]
    Processing(String),
}

#[derive(Serialize)]
struct StatusBody {
    status: String,
}

impl ApiError {
    pub fn multipart(context: &str, err: MultipartError) -> Self {
        Self::Multipart {
            status: err.status(),
            message: format!("{}: {}", context, err.body_text()),
        }
    }

    pub fn processing(message: impl Into<String>) -> Self {
        Self::Processing(message.into())
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::MissingImage => StatusCode::BAD_REQUEST,
            Self::Multipart { status, .. } => *status,
            Self::Processing(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<RecognitionError> for ApiError {
    fn from(err: RecognitionError) -> Self {
        Self::Processing(err.to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            log::error!("{}", self);
        } else {
            log::warn!("{}", self);
        }
        let body = StatusBody {
            status: self.to_string(),
        };
        (status, Json(body)).into_response()
    }
}
