//! # cloudbox-client
//!
//! The client engine for a remote file store.
//!
//! ## Modules
//!
//! - `session`: token lifecycle (rotating access/refresh pair or idle
//!   activity session) and credential persistence
//! - `upload`: quota admission, serial upload queue, transfer telemetry
//! - `tree`: folder hierarchy built from flat path lists
//! - `selection`: selection set and concurrent bulk operations
//! - `browser`: listing snapshots, view state, single-item operations
//! - `transport`: reqwest binding of the REST API
//! - `context`: the owned object tying one session's components together

pub mod browser;
pub mod context;
pub mod events;
pub mod selection;
pub mod session;
pub mod transport;
pub mod tree;
pub mod upload;
pub mod validation;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use browser::{Browser, Listing, View};
pub use context::ClientContext;
pub use events::EventBus;
pub use selection::{BulkRunner, SelectionSet};
pub use session::{IdleSession, SessionState, SessionTokenManager, TokenSource};
pub use transport::HttpTransport;
pub use tree::{PathNode, PathTree, build_tree};
pub use upload::{AdmissionReport, UploadQueue};
