//! Server-Konfiguration
//!
//! Wird beim Start aus einer TOML-Datei geladen. Alle Felder haben
//! sinnvolle Standardwerte, sodass der Server ohne Konfigurationsdatei
//! lauffaehig ist (im Token-Verfahren wird nur das Geheimnis benoetigt).
//! Einzelne Werte koennen per Umgebungsvariable ueberschrieben werden.

use std::{fmt, net::IpAddr, time::Duration};

use anyhow::{bail, Context};
use serde::{Deserialize, Serialize};

use passierschein_auth::{AuthKonfig, PasswortParameter, Verfahren};
use passierschein_db::DatabaseConfig;

/// Umgebungsvariable fuer das JWT-Geheimnis
pub const ENV_JWT_SECRET: &str = "PASSIERSCHEIN_JWT_SECRET";
/// Umgebungsvariable fuer die Speicher-URL
pub const ENV_SPEICHER_URL: &str = "PASSIERSCHEIN_SPEICHER_URL";
/// Umgebungsvariable fuer die Datenbank-URL
pub const ENV_DATENBANK_URL: &str = "PASSIERSCHEIN_DATENBANK_URL";

/// Speicher im Prozess (nur fuer eine einzelne Instanz)
const SPEICHER_IN_MEMORY: &str = "memory://";
/// URL-Schemata fuer einen geteilten Redis-Speicher
const SPEICHER_REDIS_SCHEMATA: [&str; 2] = ["redis://", "rediss://"];

/// Welcher Speicher aus der URL folgt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpeicherArt {
    InMemory,
    Redis,
}

/// Vollstaendige Server-Konfiguration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// HTTP-Listener
    pub server: ServerEinstellungen,
    /// Benutzer-Registry
    pub datenbank: DatenbankEinstellungen,
    /// Verfahren, Geheimnis, Lebensdauern, Cookie
    pub auth: AuthEinstellungen,
    /// Argon2id-Arbeitsfaktor
    pub passwort: PasswortParameter,
    /// Geteilter Session-/Widerrufs-Speicher
    pub speicher: SpeicherEinstellungen,
    /// Logging-Einstellungen
    pub logging: LoggingEinstellungen,
}

/// HTTP-Listener
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerEinstellungen {
    pub bind_adresse: String,
    pub port: u16,
    /// Reverse-Proxys, deren `x-forwarded-for` fuer das Rate Limiting gilt
    pub vertrauenswuerdige_proxys: Vec<IpAddr>,
}

impl Default for ServerEinstellungen {
    fn default() -> Self {
        Self {
            bind_adresse: "0.0.0.0".into(),
            port: 8080,
            vertrauenswuerdige_proxys: Vec::new(),
        }
    }
}

/// Datenbank-Einstellungen
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatenbankEinstellungen {
    /// Verbindungs-URL
    pub url: String,
    /// Maximale Verbindungspool-Groesse
    pub max_verbindungen: u32,
    /// WAL-Journal fuer SQLite
    pub sqlite_wal: bool,
}

impl Default for DatenbankEinstellungen {
    fn default() -> Self {
        Self {
            url: "sqlite://passierschein.db".into(),
            max_verbindungen: 5,
            sqlite_wal: true,
        }
    }
}

/// Auth-Einstellungen
#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthEinstellungen {
    /// "token" oder "sitzung"
    pub verfahren: Verfahren,
    /// HMAC-Geheimnis (Pflicht im Token-Verfahren)
    pub jwt_geheimnis: Option<String>,
    pub access_ttl_sekunden: u64,
    pub refresh_ttl_sekunden: u64,
    pub session_ttl_sekunden: u64,
    pub cookie_name: String,
    pub cookie_secure: bool,
    /// Limit fuer `/register` und `/login` pro Client-IP
    pub anmeldeversuche_pro_minute: u32,
}

impl Default for AuthEinstellungen {
    fn default() -> Self {
        Self {
            verfahren: Verfahren::Token,
            jwt_geheimnis: None,
            access_ttl_sekunden: 15 * 60,
            refresh_ttl_sekunden: 168 * 60 * 60,
            session_ttl_sekunden: 24 * 60 * 60,
            cookie_name: "session_id".into(),
            cookie_secure: false,
            anmeldeversuche_pro_minute: 10,
        }
    }
}

impl fmt::Debug for AuthEinstellungen {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthEinstellungen")
            .field("verfahren", &self.verfahren)
            .field(
                "jwt_geheimnis",
                &self.jwt_geheimnis.as_ref().map(|_| "<verborgen>"),
            )
            .field("access_ttl_sekunden", &self.access_ttl_sekunden)
            .field("refresh_ttl_sekunden", &self.refresh_ttl_sekunden)
            .field("session_ttl_sekunden", &self.session_ttl_sekunden)
            .field("cookie_name", &self.cookie_name)
            .field("cookie_secure", &self.cookie_secure)
            .field("anmeldeversuche_pro_minute", &self.anmeldeversuche_pro_minute)
            .finish()
    }
}

/// Speicher fuer Sessions und Widerrufsdaten
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SpeicherEinstellungen {
    /// "memory://" oder "redis://host:port/db" (auch "rediss://")
    pub url: String,
    /// Zeitlimit pro Speicherzugriff
    pub zeitlimit_ms: u64,
    /// Intervall der Hintergrund-Bereinigung
    pub bereinigung_sekunden: u64,
}

impl Default for SpeicherEinstellungen {
    fn default() -> Self {
        Self {
            url: SPEICHER_IN_MEMORY.into(),
            zeitlimit_ms: 2000,
            bereinigung_sekunden: 15 * 60,
        }
    }
}

/// Logging-Einstellungen
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingEinstellungen {
    /// Log-Level: "trace", "debug", "info", "warn", "error"
    pub level: String,
    /// Format: "json" oder "text"
    pub format: String,
}

impl Default for LoggingEinstellungen {
    fn default() -> Self {
        Self {
            level: "info".into(),
            format: "text".into(),
        }
    }
}

impl ServerConfig {
    /// Laedt die Konfiguration aus einer TOML-Datei und wendet
    /// Umgebungsvariablen an.
    /// Gibt die Standardkonfiguration zurueck wenn die Datei nicht existiert.
    pub fn laden(pfad: &str) -> anyhow::Result<Self> {
        let mut config = match std::fs::read_to_string(pfad) {
            Ok(inhalt) => toml::from_str(&inhalt)
                .map_err(|e| anyhow::anyhow!("Konfigurationsfehler in '{pfad}': {e}"))?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::warn!(
                    pfad = pfad,
                    "Konfigurationsdatei nicht gefunden, verwende Standardwerte"
                );
                Self::default()
            }
            Err(e) => {
                return Err(anyhow::anyhow!(
                    "Konfigurationsdatei '{pfad}' nicht lesbar: {e}"
                ))
            }
        };
        config.umgebung_anwenden(|name| std::env::var(name).ok());
        Ok(config)
    }

    /// Ueberschreibt Werte aus der Umgebung (`lookup` liefert den Wert zu
    /// einem Variablennamen)
    pub fn umgebung_anwenden(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(geheimnis) = lookup(ENV_JWT_SECRET).filter(|s| !s.is_empty()) {
            self.auth.jwt_geheimnis = Some(geheimnis);
        }
        if let Some(url) = lookup(ENV_SPEICHER_URL).filter(|s| !s.is_empty()) {
            self.speicher.url = url;
        }
        if let Some(url) = lookup(ENV_DATENBANK_URL).filter(|s| !s.is_empty()) {
            self.datenbank.url = url;
        }
    }

    /// Prueft die Konfiguration vor dem Start
    pub fn pruefen(&self) -> anyhow::Result<()> {
        if self.speicher_art().is_none() {
            bail!(
                "Speicher-URL '{}' wird nicht unterstuetzt ('{SPEICHER_IN_MEMORY}' oder 'redis://')",
                self.speicher.url
            );
        }
        if self.speicher.bereinigung_sekunden == 0 {
            bail!("speicher.bereinigung_sekunden darf nicht 0 sein");
        }
        self.auth_konfig()
            .pruefen(self.auth.verfahren)
            .context("Ungueltige Auth-Konfiguration")?;
        Ok(())
    }

    /// Speicher-Backend laut `speicher.url`
    pub fn speicher_art(&self) -> Option<SpeicherArt> {
        let url = self.speicher.url.as_str();
        if url == SPEICHER_IN_MEMORY {
            Some(SpeicherArt::InMemory)
        } else if SPEICHER_REDIS_SCHEMATA.iter().any(|s| url.starts_with(s)) {
            Some(SpeicherArt::Redis)
        } else {
            None
        }
    }

    /// Baut die Laufzeit-Konfiguration der Auth-Schicht
    pub fn auth_konfig(&self) -> AuthKonfig {
        let geheimnis = self.auth.jwt_geheimnis.clone().unwrap_or_default();
        AuthKonfig {
            access_ttl: Duration::from_secs(self.auth.access_ttl_sekunden),
            refresh_ttl: Duration::from_secs(self.auth.refresh_ttl_sekunden),
            session_ttl: Duration::from_secs(self.auth.session_ttl_sekunden),
            speicher_zeitlimit: Duration::from_millis(self.speicher.zeitlimit_ms),
            passwort: self.passwort,
            ..AuthKonfig::neu(geheimnis)
        }
    }

    /// Konfiguration fuer den Datenbank-Pool
    pub fn datenbank_konfig(&self) -> DatabaseConfig {
        DatabaseConfig {
            url: self.datenbank.url.clone(),
            max_verbindungen: self.datenbank.max_verbindungen,
            sqlite_wal: self.datenbank.sqlite_wal,
        }
    }

    /// Gibt die Bind-Adresse fuer den HTTP-Server zurueck
    pub fn bind_adresse(&self) -> String {
        format!("{}:{}", self.server.bind_adresse, self.server.port)
    }
}
