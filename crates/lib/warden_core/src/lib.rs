//! # warden_core
//!
//! Session authentication core for Warden: token codec, geofence exemption,
//! session store adapter and the session authenticator.

pub mod auth;
pub mod error;
pub mod geofence;
pub mod migrate;
pub mod models;
pub mod store;

pub use error::{Error, ErrorCode, Result, ResultExt};
