//! Prediction endpoints

use axum::{
    extract::{
        multipart::{Field, MultipartRejection},
        rejection::JsonRejection,
        Multipart, State,
    },
    Json,
};
use tracing::debug;

use crate::domain::Prediction;

use super::state::AppState;
use super::types::{ApiError, EncodedPredictRequest};

/// Multipart field holding the uploaded image
pub const IMAGE_FIELD: &str = "image_file";

const ACCEPTED_CONTENT_TYPES: [&str; 3] = ["image/jpeg", "image/jpg", "image/png"];

/// POST /predict
pub async fn predict(
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<Prediction>, ApiError> {
    let mut multipart =
        multipart.map_err(|e| ApiError::bad_request(format!("Expected a multipart upload: {}", e)))?;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::bad_request(format!("Invalid multipart body: {}", e)))?
    {
        if field.name() != Some(IMAGE_FIELD) {
            continue;
        }

        let content_type = field_content_type(&field);
        if !ACCEPTED_CONTENT_TYPES.contains(&content_type.as_str()) {
            return Err(ApiError::bad_request(format!(
                "Unsupported content type '{}', expected one of: jpeg, jpg, png",
                content_type
            ))
            .with_param(IMAGE_FIELD));
        }

        let image = field
            .bytes()
            .await
            .map_err(|e| ApiError::bad_request(format!("Failed to read upload: {}", e)))?;

        debug!(content_type = %content_type, size = image.len(), "Received image");

        let prediction = state.prediction.predict(&image).await?;
        return Ok(Json(prediction));
    }

    Err(ApiError::bad_request(format!("Missing '{}' field", IMAGE_FIELD)).with_param(IMAGE_FIELD))
}

/// POST /predict/encoded
pub async fn predict_encoded(
    State(state): State<AppState>,
    body: Result<Json<EncodedPredictRequest>, JsonRejection>,
) -> Result<Json<Prediction>, ApiError> {
    let Json(request) = body.map_err(|e| ApiError::bad_request(e.body_text()))?;

    let prediction = state
        .prediction
        .predict_encoded(&request.image, request.labeled)
        .await
        .map_err(|e| ApiError::from(e).with_param("image"))?;

    Ok(Json(prediction))
}

/// Declared content type, or a guess from the file name
fn field_content_type(field: &Field<'_>) -> String {
    match field.content_type() {
        Some(declared) if declared != "application/octet-stream" => declared.to_lowercase(),
        _ => field
            .file_name()
            .and_then(|name| mime_guess::from_path(name).first())
            .map(|mime| mime.essence_str().to_string())
            .unwrap_or_default(),
    }
}
