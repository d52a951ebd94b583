//! Laufzeit-Konfiguration der Auth-Schicht
//!
//! Wird einmal beim Start gebaut und an TokenCodec, SessionStore und
//! AuthService uebergeben. Es gibt keinen globalen Zustand.

use std::{fmt, time::Duration};

use serde::{Deserialize, Serialize};

use crate::error::{AuthError, AuthResult};

/// Lebensdauer eines Access-Tokens: 15 Minuten
pub const ACCESS_TTL: Duration = Duration::from_secs(15 * 60);

/// Lebensdauer eines Refresh-Tokens: 168 Stunden
pub const REFRESH_TTL: Duration = Duration::from_secs(168 * 60 * 60);

/// Lebensdauer einer Session: 24 Stunden
pub const SESSION_TTL: Duration = Duration::from_secs(24 * 60 * 60);

/// Zeitlimit fuer einen einzelnen Speicherzugriff
pub const SPEICHER_ZEITLIMIT: Duration = Duration::from_secs(2);

/// Obergrenze fuer alle Lebensdauern: 10 Jahre
pub const MAX_TTL: Duration = Duration::from_secs(10 * 365 * 24 * 60 * 60);

/// Unterhalb dieser Laenge wird beim Start gewarnt
pub const MIN_GEHEIMNIS_LAENGE: usize = 32;

/// Authentifizierungsverfahren des Servers
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Verfahren {
    /// Zustandslose signierte Tokens (Bearer)
    #[default]
    Token,
    /// Opake Session-ID im Cookie
    Sitzung,
}

/// Argon2id-Arbeitsfaktor
///
/// Standardwerte gemaess OWASP-Empfehlung (19 MiB, 2 Iterationen).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PasswortParameter {
    pub speicher_kib: u32,
    pub iterationen: u32,
    pub parallelitaet: u32,
}

impl Default for PasswortParameter {
    fn default() -> Self {
        Self {
            speicher_kib: 19 * 1024,
            iterationen: 2,
            parallelitaet: 1,
        }
    }
}

/// Konfiguration fuer TokenCodec, SessionStore und Passwort-Hashing
#[derive(Clone)]
pub struct AuthKonfig {
    /// HMAC-Geheimnis, muss auf allen Instanzen identisch sein
    pub jwt_geheimnis: Vec<u8>,
    pub access_ttl: Duration,
    pub refresh_ttl: Duration,
    pub session_ttl: Duration,
    pub speicher_zeitlimit: Duration,
    pub passwort: PasswortParameter,
}

impl AuthKonfig {
    /// Erstellt eine Konfiguration mit Standard-TTLs
    pub fn neu(jwt_geheimnis: impl Into<Vec<u8>>) -> Self {
        Self {
            jwt_geheimnis: jwt_geheimnis.into(),
            access_ttl: ACCESS_TTL,
            refresh_ttl: REFRESH_TTL,
            session_ttl: SESSION_TTL,
            speicher_zeitlimit: SPEICHER_ZEITLIMIT,
            passwort: PasswortParameter::default(),
        }
    }

    /// Prueft die Konfiguration fuer das gewaehlte Verfahren
    pub fn pruefen(&self, verfahren: Verfahren) -> AuthResult<()> {
        let ttls = [
            ("access_ttl", self.access_ttl),
            ("refresh_ttl", self.refresh_ttl),
            ("session_ttl", self.session_ttl),
            ("speicher_zeitlimit", self.speicher_zeitlimit),
        ];
        if let Some((name, _)) = ttls.iter().find(|(_, d)| d.is_zero()) {
            return Err(AuthError::intern(format!("{name} darf nicht 0 sein")));
        }
        if let Some((name, _)) = ttls.iter().find(|(_, d)| *d > MAX_TTL) {
            return Err(AuthError::intern(format!(
                "{name} darf hoechstens {} Sekunden betragen",
                MAX_TTL.as_secs()
            )));
        }

        if verfahren == Verfahren::Token {
            if self.jwt_geheimnis.is_empty() {
                return Err(AuthError::intern(
                    "Token-Verfahren benoetigt ein JWT-Geheimnis",
                ));
            }
            if self.jwt_geheimnis.len() < MIN_GEHEIMNIS_LAENGE {
                tracing::warn!(
                    laenge = self.jwt_geheimnis.len(),
                    empfohlen = MIN_GEHEIMNIS_LAENGE,
                    "JWT-Geheimnis ist kurz"
                );
            }
        }
        Ok(())
    }
}

impl fmt::Debug for AuthKonfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthKonfig")
            .field("jwt_geheimnis", &"<verborgen>")
            .field("access_ttl", &self.access_ttl)
            .field("refresh_ttl", &self.refresh_ttl)
            .field("session_ttl", &self.session_ttl)
            .field("speicher_zeitlimit", &self.speicher_zeitlimit)
            .field("passwort", &self.passwort)
            .finish()
    }
}
