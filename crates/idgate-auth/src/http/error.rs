//! Error responses.
//!
//! Every `AuthError` leaving a handler becomes `{"error": "<public message>"}`
//! with the status from [`AuthError::status_code`]. The detailed message is
//! only logged.

use axum::Json;
use axum::http::{HeaderValue, StatusCode, header};
use axum::response::{IntoResponse, Response};
use serde_json::json;

use crate::error::{AuthError, ErrorCategory};

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let category = self.category();

        match category {
            ErrorCategory::Infrastructure | ErrorCategory::Configuration => {
                tracing::error!(%category, error = %self, "request failed");
            }
            ErrorCategory::Federation | ErrorCategory::Security => {
                tracing::warn!(%category, error = %self, "request rejected");
            }
            ErrorCategory::Validation | ErrorCategory::Authentication => {
                tracing::debug!(%category, error = %self, "request rejected");
            }
        }

        let mut response = (status, Json(json!({ "error": self.public_message() }))).into_response();
        if status == StatusCode::UNAUTHORIZED {
            response
                .headers_mut()
                .insert(header::CACHE_CONTROL, HeaderValue::from_static("no-store"));
        }
        response
    }
}
