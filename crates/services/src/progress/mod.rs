mod backend;
mod store;

// Public API of the progress subsystem.
pub use crate::error::ProgressError;
pub use backend::PersistenceBackend;
pub use store::{ProgressOrigin, ProgressStore};
