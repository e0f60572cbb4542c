//! API Error Handling
//!
//! Unified error types and conversion for API responses.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};

use crate::repository::StoreError;
use crate::service::job::JobError;
use crate::service::runner::BuildError;

/// API error type
#[derive(Debug)]
pub enum ApiError {
    NotFound(String),
    BadRequest(String),
    Conflict(String),
    InternalError(String),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::InternalError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = match self {
            ApiError::NotFound(msg) | ApiError::BadRequest(msg) | ApiError::Conflict(msg) => msg,
            ApiError::InternalError(msg) => {
                tracing::error!("Internal error: {}", msg);
                msg
            }
        };

        (status, Json(serde_json::json!({ "error": message }))).into_response()
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        let message = err.to_string();
        match err {
            StoreError::DuplicateName(_) => ApiError::Conflict(message),
            StoreError::NotFound(_) => ApiError::NotFound(message),
            StoreError::Io { .. } | StoreError::Serialize(_) | StoreError::Csv { .. } => {
                ApiError::InternalError(message)
            }
        }
    }
}

impl From<JobError> for ApiError {
    fn from(err: JobError) -> Self {
        match err {
            JobError::InvalidName(_) => ApiError::BadRequest(err.to_string()),
            JobError::Busy(_) => ApiError::Conflict(err.to_string()),
            JobError::Store(err) => err.into(),
        }
    }
}

impl From<BuildError> for ApiError {
    fn from(err: BuildError) -> Self {
        let message = err.to_string();
        match err {
            BuildError::NotFound(_) => ApiError::NotFound(message),
            BuildError::AlreadyRunning(_) | BuildError::NotRunning(_) => {
                ApiError::Conflict(message)
            }
        }
    }
}

pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_error_status_mapping() {
        let io = StoreError::Io {
            path: PathBuf::from("data/jobs.json"),
            source: std::io::Error::other("disk full"),
        };
        let cases: Vec<(ApiError, StatusCode)> = vec![
            (StoreError::DuplicateName("a".into()).into(), StatusCode::CONFLICT),
            (StoreError::NotFound("a".into()).into(), StatusCode::NOT_FOUND),
            (io.into(), StatusCode::INTERNAL_SERVER_ERROR),
            (JobError::InvalidName("must not be empty").into(), StatusCode::BAD_REQUEST),
            (JobError::Busy("a".into()).into(), StatusCode::CONFLICT),
            (BuildError::NotFound("a".into()).into(), StatusCode::NOT_FOUND),
            (BuildError::AlreadyRunning("a".into()).into(), StatusCode::CONFLICT),
            (BuildError::NotRunning("a".into()).into(), StatusCode::CONFLICT),
        ];

        for (err, expected) in cases {
            assert_eq!(err.status(), expected, "{err:?}");
            assert_eq!(err.into_response().status(), expected);
        }
    }

    #[test]
    fn test_message_names_the_job() {
        let err: ApiError = BuildError::AlreadyRunning("Deploy-1".into()).into();
        assert!(matches!(err, ApiError::Conflict(msg) if msg == "job 'Deploy-1' is already running"));
    }
}
