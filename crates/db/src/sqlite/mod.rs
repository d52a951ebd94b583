//! SQLite-Backend der Benutzer-Registry

pub mod benutzer;
pub mod pool;

pub use pool::SqliteDb;
