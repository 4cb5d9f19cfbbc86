#![forbid(unsafe_code)]

pub mod repository;
pub mod sqlite;

pub use repository::{
    InMemoryStorage, Storage, StorageError, TestRecord, TestRepository, TrialRecord,
    TrialRepository, UsernameRepository,
};
pub use sqlite::{SqliteInitError, SqliteStorage};
