//! SQLite-backed storage.

pub mod instance;
pub mod pool;

pub use instance::SqliteInstanceRepository;
pub use pool::DatabasePool;
