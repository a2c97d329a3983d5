//! # cloudbox-core
//!
//! Core crate for the Cloudbox client. Contains the transport and credential
//! store traits, configuration schemas, typed identifiers, domain data types,
//! client events, and the unified error system.
//!
//! This crate has **no** internal dependencies on other Cloudbox crates.

pub mod config;
pub mod error;
pub mod events;
pub mod result;
pub mod traits;
pub mod types;

pub use error::{AppError, ErrorKind, TransferError};
pub use result::AppResult;
