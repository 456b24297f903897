//! Session authentication.
//!
//! Token signing, password hashing and the session authenticator that ties
//! them to the session store.

pub mod authenticator;
pub mod jwt;
pub mod password;
pub mod seed;

pub use authenticator::{DEFAULT_TOKEN_HEADER, SessionAuthenticator};
pub use jwt::TokenCodec;

use thiserror::Error;

use crate::error::{Error as AppError, ErrorCode};

/// Token transport and signing errors.
#[derive(Debug, Error)]
pub enum TokenError {
    #[error("token not provided")]
    NotProvided,

    #[error("invalid token: {0}")]
    Invalid(String),

    #[error("token encode: {0}")]
    Encode(String),

    #[error("signing key is empty")]
    MissingSigningKey,
}

impl From<TokenError> for AppError {
    fn from(e: TokenError) -> Self {
        let code = match e {
            TokenError::NotProvided | TokenError::Invalid(_) => ErrorCode::InvalidCredentials,
            TokenError::Encode(_) | TokenError::MissingSigningKey => ErrorCode::RequestFailed,
        };
        AppError::with_source(code, e, "token")
    }
}
