//! Fehlertypen fuer den Auth-Service

use thiserror::Error;

use crate::token::TokenArt;

/// Alle moeglichen Fehler im Auth-Service
#[derive(Debug, Error)]
pub enum AuthError {
    // --- Eingaben ---
    #[error("Ungueltige Eingabe: {0}")]
    UngueltigeEingabe(String),

    // --- Passwort ---
    #[error("Passwort-Hashing fehlgeschlagen: {0}")]
    PasswortHashing(String),

    // --- Authentifizierung ---
    #[error("Login oder Passwort falsch")]
    UngueltigeAnmeldedaten,

    // --- Tokens ---
    #[error("Token-Signatur ungueltig")]
    TokenSignaturUngueltig,

    #[error("Token abgelaufen")]
    TokenAbgelaufen,

    #[error("Token verwendet einen nicht erlaubten Algorithmus")]
    TokenAlgorithmusUnerwartet,

    #[error("Token fehlerhaft: {0}")]
    TokenUngueltig(String),

    #[error("Falsche Token-Art: erwartet {erwartet}, erhalten {erhalten}")]
    TokenArtFalsch { erwartet: TokenArt, erhalten: TokenArt },

    #[error("Token widerrufen")]
    TokenWiderrufen,

    #[error("Token konnte nicht signiert werden: {0}")]
    TokenSignieren(String),

    // --- Session ---
    #[error("Session nicht gefunden oder abgelaufen")]
    SessionUngueltig,

    #[error("Session-Speicher nicht verfuegbar: {0}")]
    SpeicherNichtVerfuegbar(String),

    // --- Benutzerverwaltung ---
    #[error("Login bereits vergeben: {0}")]
    BenutzernameVergeben(String),

    #[error("Benutzer nicht gefunden: {0}")]
    BenutzerNichtGefunden(i64),

    // --- Datenbank ---
    #[error("Datenbankfehler: {0}")]
    Datenbank(#[from] passierschein_db::DbError),

    // --- Intern ---
    #[error("Interner Fehler: {0}")]
    Intern(String),
}

/// Grobe Fehlerklassen, nach denen Aufrufer (z.B. HTTP) Statuscodes waehlen
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fehlerkategorie {
    /// Fehlerhafte Anfrage des Clients (400)
    UngueltigeAnfrage,
    /// Fehlende, ungueltige oder abgelaufene Anmeldedaten (401)
    NichtAuthentifiziert,
    /// Login bereits vergeben (409)
    Konflikt,
    /// Backing-Store nicht erreichbar oder Zeitlimit (503)
    SpeicherNichtVerfuegbar,
    /// Hashing-, Signatur- oder Datenbankfehler (500)
    Intern,
}

impl AuthError {
    pub fn intern(msg: impl Into<String>) -> Self {
        Self::Intern(msg.into())
    }

    /// Ordnet den Fehler einer [`Fehlerkategorie`] zu
    pub fn kategorie(&self) -> Fehlerkategorie {
        match self {
            Self::UngueltigeEingabe(_) => Fehlerkategorie::UngueltigeAnfrage,
            Self::UngueltigeAnmeldedaten
            | Self::TokenSignaturUngueltig
            | Self::TokenAbgelaufen
            | Self::TokenAlgorithmusUnerwartet
            | Self::TokenUngueltig(_)
            | Self::TokenArtFalsch { .. }
            | Self::TokenWiderrufen
            | Self::SessionUngueltig
            | Self::BenutzerNichtGefunden(_) => Fehlerkategorie::NichtAuthentifiziert,
            Self::BenutzernameVergeben(_) => Fehlerkategorie::Konflikt,
            Self::SpeicherNichtVerfuegbar(_) => Fehlerkategorie::SpeicherNichtVerfuegbar,
            Self::PasswortHashing(_)
            | Self::TokenSignieren(_)
            | Self::Datenbank(_)
            | Self::Intern(_) => Fehlerkategorie::Intern,
        }
    }

    /// Maschinenlesbarer Grund-Code fuer API-Antworten
    pub fn grund(&self) -> &'static str {
        match self {
            Self::UngueltigeEingabe(_) => "MalformedRequest",
            Self::UngueltigeAnmeldedaten => "InvalidCredentials",
            Self::TokenSignaturUngueltig => "InvalidSignature",
            Self::TokenAbgelaufen => "Expired",
            Self::TokenAlgorithmusUnerwartet => "UnexpectedAlgorithm",
            Self::TokenUngueltig(_) => "MalformedToken",
            Self::TokenArtFalsch { .. } => "WrongTokenKind",
            Self::TokenWiderrufen => "Revoked",
            Self::SessionUngueltig => "SessionNotFound",
            Self::BenutzerNichtGefunden(_) => "UnknownSubject",
            Self::BenutzernameVergeben(_) => "Conflict",
            Self::SpeicherNichtVerfuegbar(_) => "StoreUnavailable",
            Self::PasswortHashing(_)
            | Self::TokenSignieren(_)
            | Self::Datenbank(_)
            | Self::Intern(_) => "InternalError",
        }
    }
}

/// Result-Alias fuer den Auth-Service
pub type AuthResult<T> = Result<T, AuthError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_fehler_sind_nicht_authentifiziert() {
        for fehler in [
            AuthError::TokenSignaturUngueltig,
            AuthError::TokenAbgelaufen,
            AuthError::TokenAlgorithmusUnerwartet,
            AuthError::TokenWiderrufen,
            AuthError::SessionUngueltig,
        ] {
            assert_eq!(fehler.kategorie(), Fehlerkategorie::NichtAuthentifiziert);
        }
    }

    #[test]
    fn grund_codes_unterscheiden_ablauf_und_signatur() {
        assert_eq!(AuthError::TokenAbgelaufen.grund(), "Expired");
        assert_eq!(AuthError::TokenSignaturUngueltig.grund(), "InvalidSignature");
    }

    #[test]
    fn interne_fehler_verraten_keine_details_im_code() {
        let fehler = AuthError::PasswortHashing("argon2: Speicher erschoepft".into());
        assert_eq!(fehler.kategorie(), Fehlerkategorie::Intern);
        assert_eq!(fehler.grund(), "InternalError");
    }
}
