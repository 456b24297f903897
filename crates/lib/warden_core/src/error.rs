//! Tagged error type shared by every layer of the authentication core.
//!
//! An [`Error`] carries an [`ErrorCode`] (what the caller is told), a chain of
//! context messages (what the logs are told), an optional HTTP status override
//! and the underlying cause. Wrapping keeps the most specific code already
//! assigned; foreign errors enter the chain as `request_failed`.

use std::fmt;

use http::StatusCode;
use thiserror::Error;

/// Boxed cause stored inside an [`Error`].
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;

/// Machine-readable error codes exposed in API responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    InvalidArgument,
    InvalidCredentials,
    InvalidForm,
    InvalidPhone,
    InvalidUserStatus,
    NotFound,
    ResourceExists,
    RequestFailed,
    RoleForbidden,
    SessionExpired,
}

impl ErrorCode {
    /// Wire representation (`error_code` field).
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorCode::InvalidArgument => "invalid_argument",
            ErrorCode::InvalidCredentials => "invalid_credentials",
            ErrorCode::InvalidForm => "invalid_form",
            ErrorCode::InvalidPhone => "invalid_phone",
            ErrorCode::InvalidUserStatus => "invalid_user_status",
            ErrorCode::NotFound => "not_found",
            ErrorCode::ResourceExists => "resource_exists",
            ErrorCode::RequestFailed => "request_failed",
            ErrorCode::RoleForbidden => "role_forbidden",
            ErrorCode::SessionExpired => "session_expired",
        }
    }

    /// Static human-readable message (`error_message` field).
    pub fn message(self) -> &'static str {
        match self {
            ErrorCode::InvalidArgument => "You have provided an invalid argument",
            ErrorCode::InvalidCredentials => "You have provided invalid credentials",
            ErrorCode::InvalidForm => "You have submitted an invalid form",
            ErrorCode::InvalidPhone => "You have provided an invalid phone number",
            ErrorCode::InvalidUserStatus => "Your account is not active",
            ErrorCode::NotFound => "The requested resource was not found",
            ErrorCode::ResourceExists => "Another resource with similar attributes already exists",
            ErrorCode::RequestFailed => "Request failed to complete. Please try again",
            ErrorCode::RoleForbidden => "You are not allowed to perform this request",
            ErrorCode::SessionExpired => "Your session has expired. Login again to proceed.",
        }
    }

    /// Default HTTP status. Codes without an explicit mapping fall to 400.
    pub fn http_status(self) -> StatusCode {
        match self {
            ErrorCode::InvalidCredentials => StatusCode::UNAUTHORIZED,
            ErrorCode::InvalidUserStatus => StatusCode::NOT_ACCEPTABLE,
            ErrorCode::RoleForbidden => StatusCode::FORBIDDEN,
            ErrorCode::SessionExpired => StatusCode::UNAUTHORIZED,
            _ => StatusCode::BAD_REQUEST,
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Application error: code + message chain + optional status override.
#[derive(Debug, Error)]
#[error("{}", .messages.join("; "))]
pub struct Error {
    code: ErrorCode,
    /// Most recent context first.
    messages: Vec<String>,
    status: Option<StatusCode>,
    notify: bool,
    #[source]
    source: Option<BoxError>,
}

impl Error {
    /// Create an error with a code and no underlying cause.
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            messages: vec![message.into()],
            status: None,
            notify: false,
            source: None,
        }
    }

    /// Wrap a foreign cause under the given code.
    pub fn with_source(
        code: ErrorCode,
        source: impl Into<BoxError>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            source: Some(source.into()),
            ..Self::new(code, message)
        }
    }

    /// Prepend a context message, keeping the code.
    pub fn context(mut self, message: impl Into<String>) -> Self {
        self.messages.insert(0, message.into());
        self
    }

    /// Assign a code. `request_failed` never replaces a more specific code.
    pub fn with_code(mut self, code: ErrorCode) -> Self {
        if code != ErrorCode::RequestFailed || self.code == ErrorCode::RequestFailed {
            self.code = code;
        }
        self
    }

    /// Override the HTTP status derived from the code.
    pub fn with_status(mut self, status: StatusCode) -> Self {
        self.status = Some(status);
        self
    }

    /// Mark the error as worth an error-level log line.
    pub fn notify(mut self) -> Self {
        self.notify = true;
        self
    }

    pub fn code(&self) -> ErrorCode {
        self.code
    }

    pub fn should_notify(&self) -> bool {
        self.notify
    }

    /// Status to respond with: the override, else the code's default.
    pub fn http_status(&self) -> StatusCode {
        self.status.unwrap_or_else(|| self.code.http_status())
    }
}

impl From<sqlx::Error> for Error {
    fn from(e: sqlx::Error) -> Self {
        match e {
            sqlx::Error::RowNotFound => Error::with_source(ErrorCode::NotFound, e, "row not found"),
            _ => Error::with_source(ErrorCode::RequestFailed, e, "database error"),
        }
    }
}

/// Context chaining on any result whose error converts into [`Error`].
pub trait ResultExt<T> {
    /// Attach a context message to the error branch.
    fn context(self, message: impl Into<String>) -> Result<T>;

    /// Attach a lazily-built context message to the error branch.
    fn with_context<F, M>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> M,
        M: Into<String>;
}

impl<T, E> ResultExt<T> for std::result::Result<T, E>
where
    E: Into<Error>,
{
    fn context(self, message: impl Into<String>) -> Result<T> {
        self.map_err(|e| e.into().context(message))
    }

    fn with_context<F, M>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> M,
        M: Into<String>,
    {
        self.map_err(|e| e.into().context(f()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_statuses_follow_code_table() {
        assert_eq!(ErrorCode::InvalidCredentials.http_status(), StatusCode::UNAUTHORIZED);
        assert_eq!(ErrorCode::InvalidUserStatus.http_status(), StatusCode::NOT_ACCEPTABLE);
        assert_eq!(ErrorCode::RoleForbidden.http_status(), StatusCode::FORBIDDEN);
        assert_eq!(ErrorCode::SessionExpired.http_status(), StatusCode::UNAUTHORIZED);
        assert_eq!(ErrorCode::NotFound.http_status(), StatusCode::BAD_REQUEST);
        assert_eq!(ErrorCode::RequestFailed.http_status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn context_keeps_specific_code() {
        let err = Error::new(ErrorCode::SessionExpired, "inactive session")
            .context("validate session")
            .context("protected route");
        assert_eq!(err.code(), ErrorCode::SessionExpired);
        assert_eq!(
            err.to_string(),
            "protected route; validate session; inactive session"
        );
    }

    #[test]
    fn request_failed_never_downgrades() {
        let err = Error::new(ErrorCode::RoleForbidden, "user mismatch")
            .with_code(ErrorCode::RequestFailed);
        assert_eq!(err.code(), ErrorCode::RoleForbidden);

        let err = Error::new(ErrorCode::RequestFailed, "lookup")
            .with_code(ErrorCode::InvalidCredentials);
        assert_eq!(err.code(), ErrorCode::InvalidCredentials);
    }

    #[test]
    fn foreign_errors_become_request_failed() {
        let io: std::result::Result<(), std::io::Error> =
            Err(std::io::Error::other("connection reset"));
        let err = io
            .map_err(|e| Error::with_source(ErrorCode::RequestFailed, e, "read"))
            .context("load session")
            .unwrap_err();
        assert_eq!(err.code(), ErrorCode::RequestFailed);
        assert!(std::error::Error::source(&err).is_some());
    }

    #[test]
    fn status_override_wins() {
        let err = Error::new(ErrorCode::RequestFailed, "timed out")
            .with_status(StatusCode::REQUEST_TIMEOUT);
        assert_eq!(err.http_status(), StatusCode::REQUEST_TIMEOUT);
    }

    #[test]
    fn row_not_found_maps_to_not_found() {
        let err: Error = sqlx::Error::RowNotFound.into();
        assert_eq!(err.code(), ErrorCode::NotFound);
    }
}
