use std::sync::Arc;

use axum::Json;
use axum::extract::{Multipart, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

use formfill_core::{DecodeFailurePolicy, ExtractionResult};
use formfill_ingest::{DocumentFormat, ExtractedText, IngestError};

use crate::models::{ErrorResponse, ProcessResponse};
use crate::state::AppState;
use crate::upload;

/// `POST /process`: decode the uploaded document and fill the requested
/// fields from its text.
pub async fn process(State(state): State<Arc<AppState>>, multipart: Multipart) -> Response {
    let fields = match upload::parse_multipart(multipart).await {
        Ok(fields) => fields,
        Err(message) => {
            tracing::info!(error = %message, "rejected upload");
            return ErrorResponse::new(message).into_response_with(StatusCode::BAD_REQUEST);
        }
    };

    let filename = fields.file.filename;
    let format = match DocumentFormat::from_filename(&filename)
        .ok_or_else(|| IngestError::UnsupportedFormat(filename.clone()))
    {
        Ok(format) => format,
        Err(e) => {
            tracing::info!(filename = %filename, "unsupported file type");
            return ErrorResponse::new(e.to_string()).into_response_with(StatusCode::BAD_REQUEST);
        }
    };

    tracing::info!(
        filename = %filename,
        format = format.as_str(),
        bytes = fields.file.data.len(),
        fields = fields.field_specs.len(),
        "processing upload"
    );

    // Decoding is CPU-bound; keep it off the async workers.
    let data = fields.file.data;
    let extracted =
        match tokio::task::spawn_blocking(move || formfill_ingest::extract_format(&data, format))
            .await
        {
            Ok(extracted) => extracted,
            Err(e) => {
                tracing::error!(filename = %filename, error = %e, "decode task failed");
                return ErrorResponse::new("Failed to decode document")
                    .into_response_with(StatusCode::INTERNAL_SERVER_ERROR);
            }
        };

    let text = match (extracted, state.decode_failure_policy) {
        (ExtractedText::Text(text), _) => text,
        (ExtractedText::DecodeFailed(message), DecodeFailurePolicy::Reject) => {
            return ErrorResponse::new(message).into_response_with(StatusCode::BAD_REQUEST);
        }
        (ExtractedText::DecodeFailed(message), DecodeFailurePolicy::Degrade) => {
            tracing::warn!(filename = %filename, "continuing with decode failure as document text");
            message
        }
    };

    match state.extractor.extract_fields(&text, &fields.field_specs).await {
        ExtractionResult::Fields(values) => {
            (StatusCode::OK, Json(ProcessResponse::new(values))).into_response()
        }
        ExtractionResult::Error(message) => {
            tracing::error!(filename = %filename, error = %message, "field extraction failed");
            ErrorResponse::new(message).into_response_with(StatusCode::INTERNAL_SERVER_ERROR)
        }
    }
}
