//! Datensaetze der Benutzer-Registry

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Ein registrierter Benutzer
///
/// Nach der Registrierung unveraenderlich. `id` ist immer positiv.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BenutzerRecord {
    pub id: i64,
    pub login: String,
    /// Argon2id PHC-String, verlaesst den Server nie
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub created_at: DateTime<Utc>,
}

/// Daten zum Erstellen eines neuen Benutzers
#[derive(Debug, Clone)]
pub struct NeuerBenutzer<'a> {
    pub login: &'a str,
    pub password_hash: &'a str,
}
