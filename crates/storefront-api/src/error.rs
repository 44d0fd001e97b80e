//! HTTP error mapping.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use tracing::error;

use storefront_core::Error;

/// Error returned by every handler.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error(transparent)]
    Catalog(#[from] Error),

    #[error("{0}")]
    BadRequest(String),
}

impl ApiError {
    /// Status code for the error.
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Catalog(err) => match err {
                Error::NotFound(_) | Error::RelationNotFound { .. } => StatusCode::NOT_FOUND,
                Error::DuplicateName(_)
                | Error::AlreadyHasParent { .. }
                | Error::CycleDetected { .. }
                | Error::HasActiveChildren { .. }
                | Error::HasLiveProducts { .. }
                | Error::AlreadyInactive(_) => StatusCode::CONFLICT,
                Error::SelfReference(_) | Error::InvalidInput(_) => StatusCode::BAD_REQUEST,
                Error::Database(_)
                | Error::CacheUnavailable(_)
                | Error::Serialization(_)
                | Error::Config(_)
                | Error::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
        }
    }

    /// Machine-readable kind for the response body.
    pub fn kind(&self) -> &'static str {
        match self {
            ApiError::BadRequest(_) => "invalid_input",
            ApiError::Catalog(err) => err.kind(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!(
                subsystem = "api",
                error_kind = self.kind(),
                error = %self,
                "Request failed"
            );
        }

        let body = Json(serde_json::json!({
            "error": self.to_string(),
            "kind": self.kind(),
        }));

        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[test]
    fn test_status_mapping() {
        let id = Uuid::new_v4();
        let cases = [
            (Error::category_not_found(id), StatusCode::NOT_FOUND),
            (
                Error::RelationNotFound {
                    parent_id: id,
                    child_id: id,
                },
                StatusCode::NOT_FOUND,
            ),
            (Error::DuplicateName("x".into()), StatusCode::CONFLICT),
            (
                Error::AlreadyHasParent { child_id: id },
                StatusCode::CONFLICT,
            ),
            (
                Error::CycleDetected {
                    parent_id: id,
                    child_id: id,
                },
                StatusCode::CONFLICT,
            ),
            (
                Error::HasActiveChildren { id, count: 1 },
                StatusCode::CONFLICT,
            ),
            (Error::HasLiveProducts { id, count: 2 }, StatusCode::CONFLICT),
            (Error::AlreadyInactive(id), StatusCode::CONFLICT),
            (Error::SelfReference(id), StatusCode::BAD_REQUEST),
            (Error::InvalidInput("bad".into()), StatusCode::BAD_REQUEST),
            (Error::Internal("boom".into()), StatusCode::INTERNAL_SERVER_ERROR),
        ];
        for (err, expected) in cases {
            assert_eq!(ApiError::from(err).status(), expected);
        }
    }

    #[test]
    fn test_kind_passthrough() {
        let err = ApiError::from(Error::AlreadyInactive(Uuid::nil()));
        assert_eq!(err.kind(), "already_inactive");
        assert_eq!(ApiError::BadRequest("x".into()).kind(), "invalid_input");
    }
}
