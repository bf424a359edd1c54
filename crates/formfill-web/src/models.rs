use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use formfill_core::FieldValues;
use serde::Serialize;

#[derive(Debug, Clone, Serialize)]
pub struct ProcessResponse {
    pub success: bool,
    #[serde(rename = "formData")]
    pub form_data: FieldValues,
}

impl ProcessResponse {
    pub fn new(form_data: FieldValues) -> Self {
        Self {
            success: true,
            form_data,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ErrorResponse {
    pub success: bool,
    pub error: String,
}

impl ErrorResponse {
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            success: false,
            error: error.into(),
        }
    }

    /// Pair this body with `status`.
    pub fn into_response_with(self, status: StatusCode) -> Response {
        (status, Json(self)).into_response()
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
}
