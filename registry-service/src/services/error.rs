use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use service_core::error::AppError;
use thiserror::Error;

use crate::dtos::ErrorResponse;
use crate::models::ClientType;

/// Domain errors of the registry and the settings authorization pipeline.
///
/// Callers branch on the variant (or on [`ServiceError::kind`] once the error
/// has crossed the HTTP boundary), never on the message text.
#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("Authentication required")]
    AuthenticationRequired,

    #[error("{0}")]
    Unauthorized(String),

    #[error("{0}")]
    Forbidden(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    DuplicateId(String),

    #[error("{0}")]
    InvalidType(String),

    #[error("{0}")]
    MalformedKey(String),

    #[error("{0}")]
    UnsupportedKeyType(String),

    #[error("{0}")]
    InvalidCursor(String),

    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    Unimplemented(String),

    #[error("Transport error: {0}")]
    Transport(anyhow::Error),

    #[error("Database error: {0}")]
    Database(#[from] mongodb::error::Error),

    #[error("Internal server error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl ServiceError {
    pub fn invalid_type(value: &str) -> Self {
        ServiceError::InvalidType(format!(
            "invalid client type {value:?}; choices are {}",
            ClientType::choices()
        ))
    }

    pub fn client_not_found(id: &str) -> Self {
        ServiceError::NotFound(format!("registered client {id} not found"))
    }

    /// Stable machine-readable code for the error kind.
    pub fn kind(&self) -> &'static str {
        match self {
            ServiceError::AuthenticationRequired => "authentication_required",
            ServiceError::Unauthorized(_) => "unauthorized",
            ServiceError::Forbidden(_) => "forbidden",
            ServiceError::NotFound(_) => "not_found",
            ServiceError::DuplicateId(_) => "duplicate_id",
            ServiceError::InvalidType(_) => "invalid_type",
            ServiceError::MalformedKey(_) => "malformed_key",
            ServiceError::UnsupportedKeyType(_) => "unsupported_key_type",
            ServiceError::InvalidCursor(_) => "invalid_cursor",
            ServiceError::Validation(_) => "validation",
            ServiceError::Unimplemented(_) => "unimplemented",
            ServiceError::Transport(_) => "transport",
            ServiceError::Database(_) | ServiceError::Internal(_) => "internal",
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ServiceError::AuthenticationRequired | ServiceError::Unauthorized(_) => {
                StatusCode::UNAUTHORIZED
            }
            ServiceError::Forbidden(_) => StatusCode::FORBIDDEN,
            ServiceError::NotFound(_) => StatusCode::NOT_FOUND,
            ServiceError::DuplicateId(_) => StatusCode::CONFLICT,
            ServiceError::InvalidType(_)
            | ServiceError::MalformedKey(_)
            | ServiceError::UnsupportedKeyType(_)
            | ServiceError::InvalidCursor(_)
            | ServiceError::Validation(_) => StatusCode::BAD_REQUEST,
            ServiceError::Unimplemented(_) => StatusCode::NOT_IMPLEMENTED,
            ServiceError::Transport(_) => StatusCode::BAD_GATEWAY,
            ServiceError::Database(_) | ServiceError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Rebuilds an error from its wire form, preserving the kind.
    pub fn from_code(code: &str, message: String) -> Self {
        match code {
            "authentication_required" => ServiceError::AuthenticationRequired,
            "unauthorized" => ServiceError::Unauthorized(message),
            "forbidden" => ServiceError::Forbidden(message),
            "not_found" => ServiceError::NotFound(message),
            "duplicate_id" => ServiceError::DuplicateId(message),
            "invalid_type" => ServiceError::InvalidType(message),
            "malformed_key" => ServiceError::MalformedKey(message),
            "unsupported_key_type" => ServiceError::UnsupportedKeyType(message),
            "invalid_cursor" => ServiceError::InvalidCursor(message),
            "validation" => ServiceError::Validation(message),
            "unimplemented" => ServiceError::Unimplemented(message),
            "transport" => ServiceError::Transport(anyhow::anyhow!(message)),
            _ => ServiceError::Internal(anyhow::anyhow!(message)),
        }
    }
}

impl From<reqwest::Error> for ServiceError {
    fn from(err: reqwest::Error) -> Self {
        ServiceError::Transport(anyhow::Error::new(err))
    }
}

impl IntoResponse for ServiceError {
    fn into_response(self) -> Response {
        let status = self.status();
        let error = match &self {
            ServiceError::Database(e) => {
                tracing::error!(error = %e, "Database error");
                "Internal server error".to_string()
            }
            ServiceError::Internal(e) => {
                tracing::error!(error = %e, "Internal error");
                "Internal server error".to_string()
            }
            ServiceError::Transport(e) => {
                tracing::error!(error = %e, "Upstream error");
                self.to_string()
            }
            other => other.to_string(),
        };

        let body = ErrorResponse {
            error,
            code: self.kind().to_string(),
        };
        (status, Json(body)).into_response()
    }
}

impl From<ServiceError> for AppError {
    fn from(err: ServiceError) -> Self {
        match err {
            ServiceError::Database(e) => AppError::from(e),
            ServiceError::Internal(e) => AppError::InternalError(e),
            ServiceError::Transport(e) => AppError::BadGateway(e.to_string()),
            ServiceError::AuthenticationRequired => {
                AppError::Unauthorized(anyhow::anyhow!("Authentication required"))
            }
            ServiceError::Unauthorized(e) => AppError::Unauthorized(anyhow::anyhow!(e)),
            ServiceError::Forbidden(e) => AppError::Forbidden(anyhow::anyhow!(e)),
            ServiceError::NotFound(e) => AppError::NotFound(anyhow::anyhow!(e)),
            ServiceError::DuplicateId(e) => AppError::Conflict(anyhow::anyhow!(e)),
            ServiceError::Unimplemented(e) => AppError::InternalError(anyhow::anyhow!(e)),
            ServiceError::InvalidType(e)
            | ServiceError::MalformedKey(e)
            | ServiceError::UnsupportedKeyType(e)
            | ServiceError::InvalidCursor(e)
            | ServiceError::Validation(e) => AppError::BadRequest(anyhow::anyhow!(e)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_survives_wire_round_trip() {
        let errors = vec![
            ServiceError::AuthenticationRequired,
            ServiceError::Unauthorized("wrong user".into()),
            ServiceError::Forbidden("not an admin".into()),
            ServiceError::client_not_found("abc"),
            ServiceError::DuplicateId("abc".into()),
            ServiceError::invalid_type("UnknownType"),
            ServiceError::MalformedKey("bad pem".into()),
            ServiceError::UnsupportedKeyType("RSA-1024".into()),
            ServiceError::InvalidCursor("page 0".into()),
            ServiceError::Validation("empty id".into()),
            ServiceError::Unimplemented("orgs".into()),
        ];

        for err in errors {
            let rebuilt = ServiceError::from_code(err.kind(), err.to_string());
            assert_eq!(rebuilt.kind(), err.kind());
            assert_eq!(rebuilt.to_string(), err.to_string());
        }
    }

    #[test]
    fn test_status_mapping() {
        assert_eq!(
            ServiceError::AuthenticationRequired.status(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            ServiceError::Forbidden(String::new()).status(),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            ServiceError::DuplicateId(String::new()).status(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            ServiceError::invalid_type("x").status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ServiceError::Transport(anyhow::anyhow!("down")).status(),
            StatusCode::BAD_GATEWAY
        );
    }

    #[test]
    fn test_invalid_type_lists_choices() {
        let message = ServiceError::invalid_type("Bogus").to_string();
        assert!(message.contains("\"Bogus\""));
        assert!(message.contains("ServerType, AgentType, OtherType"));
    }

    #[test]
    fn test_unknown_code_is_internal() {
        let err = ServiceError::from_code("teapot", "short and stout".into());
        assert_eq!(err.kind(), "internal");
    }
}
