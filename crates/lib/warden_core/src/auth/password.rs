//! Password hashing via bcrypt.

use crate::error::{Error, ErrorCode, Result};

/// bcrypt cost factor.
const BCRYPT_COST: u32 = 10;

/// Hash a password with bcrypt (cost 10).
pub fn hash_password(password: &str) -> Result<String> {
    bcrypt::hash(password, BCRYPT_COST)
        .map_err(|e| Error::with_source(ErrorCode::RequestFailed, e, "bcrypt hash"))
}

/// Verify a password against a bcrypt hash.
pub fn verify_password(password: &str, hash: &str) -> Result<bool> {
    bcrypt::verify(password, hash)
        .map_err(|e| Error::with_source(ErrorCode::RequestFailed, e, "bcrypt verify"))
}
