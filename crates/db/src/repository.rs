//! Repository-Trait der Benutzer-Registry

use async_trait::async_trait;

use crate::error::DbResult;
use crate::models::{BenutzerRecord, NeuerBenutzer};

/// Konfiguration fuer die Datenbankverbindung
#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    /// Verbindungs-URL (z.B. "sqlite://passierschein.db")
    pub url: String,
    /// Maximale Anzahl gleichzeitiger Verbindungen im Pool
    pub max_verbindungen: u32,
    /// Ob WAL-Modus bei SQLite aktiviert werden soll
    pub sqlite_wal: bool,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: "sqlite://passierschein.db".into(),
            max_verbindungen: 5,
            sqlite_wal: true,
        }
    }
}

/// Repository fuer Benutzer-Datenzugriffe
///
/// `erstellen` muss die Eindeutigkeit des Logins selbst garantieren und
/// bei einem Konflikt [`DbError::Eindeutigkeit`](crate::DbError::Eindeutigkeit)
/// liefern, auch wenn zwei Registrierungen gleichzeitig laufen.
#[async_trait]
pub trait BenutzerRepository: Send + Sync {
    /// Einen neuen Benutzer anlegen
    async fn erstellen(&self, daten: NeuerBenutzer<'_>) -> DbResult<BenutzerRecord>;

    /// Einen Benutzer anhand seiner ID laden
    async fn laden(&self, id: i64) -> DbResult<Option<BenutzerRecord>>;

    /// Einen Benutzer anhand seines Logins laden
    async fn laden_nach_login(&self, login: &str) -> DbResult<Option<BenutzerRecord>>;
}
