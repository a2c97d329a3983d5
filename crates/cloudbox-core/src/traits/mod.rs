//! Core traits defining the boundaries of the Cloudbox client.
//!
//! These traits are implemented in `cloudbox-client` and consumed by its
//! session, upload, and bulk-operation engines.

pub mod store;
pub mod transport;

pub use store::{CredentialStore, keys};
pub use transport::Transport;
