use axum::http::{StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use axum::Json;

use serde::Serialize;

pub async fn handler404(path: Uri) -> Error {
    Error::NotFound {
        message: format!("Invalid path: {}", path),
    }
}

/// Successful response envelope, `{"success": true, ...value}`.
#[derive(Debug, Clone, Serialize)]
pub struct Success<V> {
    success: bool,
    #[serde(flatten)]
    value: V,
}

impl<V: Serialize> Success<V> {
    pub fn of(value: V) -> Self {
        Self {
            success: true,
            value,
        }
    }
}

impl<V: Serialize> IntoResponse for Success<V> {
    fn into_response(self) -> Response {
        Json::into_response(Json(self))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "error")]
pub enum Error {
    InvalidDomain { message: String },
    InvalidPayload { message: String },
    Validation { message: String },
    CodeNotFound { message: String },
    CodeExpired { message: String },
    InvalidCode { message: String },
    InvalidAdminCredentials { message: String },
    MissingToken { message: String },
    MalformedToken { message: String },
    InvalidOrExpiredToken { message: String },
    Forbidden { message: String },
    NotFound { message: String },
    CurriculumNotFound { message: String },
    Conflict { message: String },
    PayloadTooLarge { message: String },
    InternalError { kind: &'static str, message: String },
    Unknown { message: String },
}

impl Error {
    pub fn status(&self) -> StatusCode {
        match self {
            Error::InvalidDomain { .. }
            | Error::InvalidPayload { .. }
            | Error::Validation { .. } => StatusCode::BAD_REQUEST,
            Error::CodeNotFound { .. }
            | Error::CodeExpired { .. }
            | Error::InvalidCode { .. }
            | Error::InvalidAdminCredentials { .. }
            | Error::MissingToken { .. }
            | Error::MalformedToken { .. }
            | Error::InvalidOrExpiredToken { .. } => StatusCode::UNAUTHORIZED,
            Error::Forbidden { .. } => StatusCode::FORBIDDEN,
            Error::NotFound { .. } | Error::CurriculumNotFound { .. } => StatusCode::NOT_FOUND,
            Error::Conflict { .. } => StatusCode::CONFLICT,
            Error::PayloadTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            Error::InternalError { .. } | Error::Unknown { .. } => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    pub fn unknown<S: Into<String>>(msg: S) -> Error {
        Error::Unknown {
            message: msg.into(),
        }
    }

    pub fn internal<S: Into<String>>(kind: &'static str, msg: S) -> Error {
        Error::InternalError {
            kind,
            message: msg.into(),
        }
    }

    pub fn invalid_payload<S: Into<String>>(msg: S) -> Error {
        Error::InvalidPayload {
            message: msg.into(),
        }
    }

    pub fn not_found<S: Into<String>>(msg: S) -> Error {
        Error::NotFound {
            message: msg.into(),
        }
    }

    pub fn forbidden<S: Into<String>>(msg: S) -> Error {
        Error::Forbidden {
            message: msg.into(),
        }
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            log::error!("Request failed: {:?}", self);
        }
        (status, Json(self)).into_response()
    }
}

impl From<std::io::Error> for Error {
    fn from(io: std::io::Error) -> Self {
        Self::InternalError {
            kind: "IOError",
            message: io.to_string(),
        }
    }
}

impl From<uuid::Error> for Error {
    fn from(id: uuid::Error) -> Self {
        Self::InvalidPayload {
            message: format!("Invalid identifier: {}", id),
        }
    }
}

impl From<sqlx::Error> for Error {
    fn from(err: sqlx::Error) -> Self {
        if let sqlx::Error::Database(db) = &err {
            // unique_violation
            if db.code().as_deref() == Some("23505") {
                return Self::Conflict {
                    message: "A record with the same key already exists!".to_string(),
                };
            }
        }
        Self::InternalError {
            kind: "DatabaseError",
            message: err.to_string(),
        }
    }
}

impl From<sqlx::migrate::MigrateError> for Error {
    fn from(err: sqlx::migrate::MigrateError) -> Self {
        Self::InternalError {
            kind: "MigrationError",
            message: err.to_string(),
        }
    }
}

impl From<pbkdf2::password_hash::Error> for Error {
    fn from(err: pbkdf2::password_hash::Error) -> Self {
        Self::InternalError {
            kind: "HashError",
            message: err.to_string(),
        }
    }
}

impl From<jsonwebtoken::errors::Error> for Error {
    fn from(err: jsonwebtoken::errors::Error) -> Self {
        Self::InternalError {
            kind: "TokenError",
            message: err.to_string(),
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Self::InternalError {
            kind: "SerializationError",
            message: err.to_string(),
        }
    }
}

impl From<anyhow::Error> for Error {
    fn from(err: anyhow::Error) -> Self {
        Self::Unknown {
            message: err.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serializes_with_kind_tag_and_message() {
        let err = Error::InvalidCode {
            message: "Invalid access code.".to_string(),
        };
        let value = serde_json::to_value(&err).unwrap();
        assert_eq!(value["error"], "InvalidCode");
        assert_eq!(value["message"], "Invalid access code.");
    }

    #[test]
    fn auth_failures_map_to_unauthorized() {
        for err in [
            Error::CodeNotFound { message: String::new() },
            Error::CodeExpired { message: String::new() },
            Error::MissingToken { message: String::new() },
            Error::InvalidOrExpiredToken { message: String::new() },
        ] {
            assert_eq!(err.status(), StatusCode::UNAUTHORIZED);
        }
        assert_eq!(Error::forbidden("no").status(), StatusCode::FORBIDDEN);
        assert_eq!(Error::not_found("no").status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn malformed_uuid_is_a_bad_request() {
        let err: Error = "not-a-uuid".parse::<uuid::Uuid>().unwrap_err().into();
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
    }
}
