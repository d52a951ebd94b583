//! REST-Handler

pub mod konto;
pub mod sitzung;
pub mod token;

use serde::{Deserialize, Serialize};

use passierschein_db::BenutzerRecord;

/// Body fuer `/register` und `/login`
#[derive(Debug, Deserialize)]
pub struct AnmeldedatenBody {
    pub login: String,
    pub password: String,
}

/// Oeffentliche Sicht auf einen Benutzer
#[derive(Debug, Serialize)]
pub struct BenutzerAntwort {
    pub id: i64,
    pub login: String,
}

impl From<BenutzerRecord> for BenutzerAntwort {
    fn from(b: BenutzerRecord) -> Self {
        Self {
            id: b.id,
            login: b.login,
        }
    }
}
