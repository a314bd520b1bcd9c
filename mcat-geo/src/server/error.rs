//! Erreurs HTTP
//!
//! Corps `{error, details?}`: 404 si le fichier source est absent, 422 pour
//! les autres erreurs de validation, 500 sinon.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

use crate::error::{PipelineError, ValidationError};

#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub message: String,
    pub details: Option<String>,
}

impl ApiError {
    pub fn not_found(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::NOT_FOUND,
            message: message.into(),
            details: None,
        }
    }

    pub fn unprocessable(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::UNPROCESSABLE_ENTITY,
            message: message.into(),
            details: None,
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: message.into(),
            details: None,
        }
    }

    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<String>,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: self.message,
            details: self.details,
        };
        (self.status, Json(body)).into_response()
    }
}

impl From<PipelineError> for ApiError {
    fn from(err: PipelineError) -> Self {
        match &err {
            PipelineError::Validation(ValidationError::SourceNotFound { .. }) => {
                Self::not_found(err.to_string())
            }
            _ if err.is_validation() => Self::unprocessable(err.to_string()),
            _ => {
                let details = std::error::Error::source(&err).map(|s| s.to_string());
                let api = Self::internal(err.to_string());
                match details {
                    Some(details) => api.with_details(details),
                    None => api,
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        let not_found = ApiError::from(PipelineError::from(ValidationError::SourceNotFound {
            bucket: "b".into(),
            key: "a.g01".into(),
        }));
        assert_eq!(not_found.status, StatusCode::NOT_FOUND);

        let invalid = ApiError::from(PipelineError::from(ValidationError::MissingParameter("key")));
        assert_eq!(invalid.status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(invalid.message, "Validation failed: `key` must be provided");

        let internal = ApiError::from(PipelineError::CacheUnavailable);
        assert_eq!(internal.status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(internal.details.is_none());
    }
}
