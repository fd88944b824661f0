#![forbid(unsafe_code)]

pub mod keys;
pub mod local;
pub mod repository;
pub mod sqlite;

pub use local::LocalProgressRepository;
pub use repository::{
    AdapterError, InMemoryRecordStore, ProgressRepository, RecordStore, Storage, StorageError,
};
