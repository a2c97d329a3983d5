//! Core type definitions used across the Cloudbox workspace.

pub mod credential;
pub mod file;
pub mod id;
pub mod quota;
pub mod upload;

pub use credential::{Credential, RefreshGrant, SessionUser, TokenGrant, Validation};
pub use file::{FileRecord, MoveReceipt};
pub use id::*;
pub use quota::{QuotaLevel, QuotaSnapshot, format_bytes};
pub use upload::{ProgressFn, UploadBody, UploadReceipt, UploadSource};
