//! Item selection and bulk operations.

pub mod bulk;
pub mod set;

pub use bulk::{BulkRunner, ItemOutcome};
pub use set::SelectionSet;
