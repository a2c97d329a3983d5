//! Upload admission and the serial transfer queue.

pub mod admission;
pub mod progress;
pub mod queue;

pub use admission::{AdmissionReport, AdmittedFile, admit};
pub use progress::TransferProgress;
pub use queue::{ItemState, UploadQueue};
