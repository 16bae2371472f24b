use axum::{
    extract::{Multipart, State},
    Json,
};
use serde::Serialize;

use super::error::ApiError;
use super::state::AppState;
use crate::matcher::{Presence, QueryResult};

/// Body of a successful recognition.
#[derive(Debug, Serialize, PartialEq)]
pub struct RecognizeResponse {
    pub status: Presence,
    pub students: Vec<String>,
}

impl From<&QueryResult> for RecognizeResponse {
    fn from(result: &QueryResult) -> Self {
        Self {
            status: result.presence(),
            students: result.identities().into_iter().map(str::to_string).collect(),
        }
    }
}

/// POST /api/recognize
///
/// Multipart form with an `image` file field. Responds with the recognised
/// identities, `absent` when nobody matched, or a processing error.
pub async fn recognize_handler(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<RecognizeResponse>, ApiError> {
    let mut image: Option<Vec<u8>> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::multipart("Failed to parse multipart", e))?
    {
        // The first `image` field wins; later ones are skipped unread.
        if field.name() != Some("image") || image.is_some() {
            continue;
        }
        let data = field
            .bytes()
            .await
            .map_err(|e| ApiError::multipart("Failed to read image", e))?;
        image = Some(data.to_vec());
    }

    let image = image.ok_or(ApiError::MissingImage)?;
    log::info!("Received image ({} bytes)", image.len());

    let recognizer = state.recognizer.clone();
    let result = tokio::task::spawn_blocking(move || recognizer.recognize(&image))
        .await
        .map_err(|e| ApiError::processing(format!("recognition task failed: {}", e)))??;

    Ok(Json(RecognizeResponse::from(&result)))
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    /// Identities in the cached gallery, `null` before the first build or
    /// when caching is off.
    pub gallery_size: Option<usize>,
}

/// GET /health
pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        gallery_size: state.recognizer.cached_gallery_size(),
    })
}
