//! passierschein-db – Benutzer-Registry
//!
//! Haelt die Relation `benutzer` (Login, Passwort-Hash) hinter dem
//! [`BenutzerRepository`]-Trait. Die Auth-Schicht kennt nur den Trait,
//! die SQLite-Implementierung wird vom Server-Binary verdrahtet.

pub mod error;
pub mod models;
pub mod repository;
pub mod sqlite;

pub use error::{DbError, DbResult};
pub use models::{BenutzerRecord, NeuerBenutzer};
pub use repository::{BenutzerRepository, DatabaseConfig};
pub use sqlite::SqliteDb;
