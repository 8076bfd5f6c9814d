//! Mapping of studio errors onto HTTP responses.

use axum::extract::rejection::JsonRejection;
use axum::extract::{FromRequest, Request};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::de::DeserializeOwned;

use crate::core::errors::StudioError;

/// Detail returned for failures whose cause stays server-side.
const OPAQUE_DETAIL: &str = "internal server error";

/// Error returned by request handlers.
#[derive(Debug)]
pub enum ApiError {
    /// Failure raised by the stores, the chat backend or the model registry.
    Studio(StudioError),
    /// Request body that is not the expected JSON.
    Body(JsonRejection),
}

/// Result alias for request handlers.
pub type ApiResult<T> = Result<T, ApiError>;

impl From<StudioError> for ApiError {
    fn from(err: StudioError) -> Self {
        Self::Studio(err)
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self::Body(rejection)
    }
}

impl ApiError {
    /// HTTP status for the wrapped error.
    #[must_use]
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Studio(StudioError::Validation(_)) => StatusCode::BAD_REQUEST,
            Self::Studio(StudioError::NotFound { .. }) => StatusCode::NOT_FOUND,
            Self::Studio(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Body(rejection) => rejection.status(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let detail = match self {
            Self::Studio(err) if err.is_client_error() => err.to_string(),
            Self::Studio(err) => {
                tracing::error!("Request failed: {err}");
                OPAQUE_DETAIL.to_string()
            }
            Self::Body(rejection) => {
                tracing::debug!("Rejected request body: {rejection}");
                rejection.body_text()
            }
        };

        (status, Json(serde_json::json!({ "detail": detail }))).into_response()
    }
}

/// JSON body extractor whose rejection uses the `{"detail": ...}` error shape.
#[derive(Debug, Clone, Copy, Default)]
pub struct ApiJson<T>(pub T);

impl<T, S> FromRequest<S> for ApiJson<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state).await?;
        Ok(Self(value))
    }
}
