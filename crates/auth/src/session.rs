//! Session-Management fuer Passierschein
//!
//! Opake Session-IDs (256 Bit, URL-sicheres Base64) werden im geteilten
//! [`KvSpeicher`] unter `sitzung:<id>` abgelegt. Der Ablauf wird vom
//! Speicher durchgesetzt; eine abgelaufene Session ist von einer nie
//! existierenden nicht zu unterscheiden. Sessions werden beim Zugriff
//! nicht verlaengert.

use std::{sync::Arc, time::Duration};

use chrono::{DateTime, Utc};
use rand::RngCore;
use serde::{Deserialize, Serialize};

use crate::error::{AuthError, AuthResult};
use crate::konfig::AuthKonfig;
use crate::speicher::{mit_zeitlimit, KvSpeicher};

const SCHLUESSEL_PRAEFIX: &str = "sitzung:";

/// Laenger kann eine von uns erzeugte ID nicht sein
const MAX_TOKEN_LAENGE: usize = 128;

/// Versuche bei einer (praktisch ausgeschlossenen) Kollision
const MAX_VERSUCHE: usize = 3;

/// Eine aktive Session
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    /// Die opake Session-ID (Cookie-Wert)
    pub token: String,
    /// ID des Benutzers dem diese Session gehoert
    pub benutzer_id: i64,
    /// Zeitpunkt der Session-Erstellung
    pub erstellt_am: DateTime<Utc>,
    /// Zeitpunkt des Session-Ablaufs
    pub laeuft_ab_am: DateTime<Utc>,
}

impl Session {
    /// Gibt `true` zurueck wenn die Session noch gueltig ist
    pub fn ist_gueltig(&self) -> bool {
        Utc::now() < self.laeuft_ab_am
    }
}

/// Serialisierte Form im Speicher
#[derive(Debug, Serialize, Deserialize)]
struct SessionDaten {
    benutzer_id: i64,
    erstellt_am: DateTime<Utc>,
    laeuft_ab_am: DateTime<Utc>,
}

/// Session-Store ueber einem geteilten Key/Value-Speicher
pub struct SessionStore {
    speicher: Arc<dyn KvSpeicher>,
    ttl: Duration,
    zeitlimit: Duration,
}

impl SessionStore {
    pub fn neu(speicher: Arc<dyn KvSpeicher>, konfig: &AuthKonfig) -> Self {
        Self {
            speicher,
            ttl: konfig.session_ttl,
            zeitlimit: konfig.speicher_zeitlimit,
        }
    }

    /// Lebensdauer neuer Sessions (fuer Cookie Max-Age)
    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Erstellt eine neue Session fuer den angegebenen Benutzer
    pub async fn erstellen(&self, benutzer_id: i64) -> AuthResult<Session> {
        let jetzt = Utc::now();
        let ttl = chrono::Duration::from_std(self.ttl)
            .map_err(|e| AuthError::intern(format!("Session-TTL ungueltig: {e}")))?;

        let laeuft_ab_am = jetzt
            .checked_add_signed(ttl)
            .ok_or_else(|| AuthError::intern("Session-TTL ausserhalb des Zeitbereichs"))?;

        let daten = SessionDaten {
            benutzer_id,
            erstellt_am: jetzt,
            laeuft_ab_am,
        };
        let wert = serde_json::to_string(&daten)
            .map_err(|e| AuthError::intern(format!("Session nicht serialisierbar: {e}")))?;

        for _ in 0..MAX_VERSUCHE {
            let token = token_generieren();
            let geschrieben = mit_zeitlimit(
                self.zeitlimit,
                "session_erstellen",
                self.speicher
                    .schreiben_falls_neu(&schluessel(&token), wert.clone(), Some(self.ttl)),
            )
            .await?;

            if geschrieben {
                tracing::debug!(benutzer_id, "Neue Session erstellt");
                return Ok(Session {
                    token,
                    benutzer_id,
                    erstellt_am: daten.erstellt_am,
                    laeuft_ab_am: daten.laeuft_ab_am,
                });
            }
            tracing::warn!("Session-ID kollidiert, neuer Versuch");
        }

        Err(AuthError::intern("Keine freie Session-ID gefunden"))
    }

    /// Schlaegt eine Session nach
    ///
    /// Gibt `AuthError::SessionUngueltig` zurueck wenn die ID unbekannt,
    /// abgelaufen oder unlesbar ist.
    pub async fn nachschlagen(&self, token: &str) -> AuthResult<Session> {
        if token.is_empty() || token.len() > MAX_TOKEN_LAENGE {
            return Err(AuthError::SessionUngueltig);
        }

        let wert = mit_zeitlimit(
            self.zeitlimit,
            "session_nachschlagen",
            self.speicher.lesen(&schluessel(token)),
        )
        .await?
        .ok_or(AuthError::SessionUngueltig)?;

        let daten: SessionDaten = serde_json::from_str(&wert).map_err(|e| {
            tracing::warn!(fehler = %e, "Unlesbarer Session-Eintrag");
            AuthError::SessionUngueltig
        })?;

        let session = Session {
            token: token.to_string(),
            benutzer_id: daten.benutzer_id,
            erstellt_am: daten.erstellt_am,
            laeuft_ab_am: daten.laeuft_ab_am,
        };
        if !session.ist_gueltig() {
            return Err(AuthError::SessionUngueltig);
        }
        Ok(session)
    }

    /// Zerstoert eine Session; eine bereits fehlende Session ist kein Fehler
    pub async fn zerstoeren(&self, token: &str) -> AuthResult<()> {
        if token.is_empty() || token.len() > MAX_TOKEN_LAENGE {
            return Ok(());
        }
        mit_zeitlimit(
            self.zeitlimit,
            "session_zerstoeren",
            self.speicher.loeschen(&schluessel(token)),
        )
        .await?;
        tracing::debug!("Session zerstoert");
        Ok(())
    }
}

fn schluessel(token: &str) -> String {
    format!("{SCHLUESSEL_PRAEFIX}{token}")
}

/// Generiert eine kryptografisch sichere Session-ID (URL-sicheres Base64)
fn token_generieren() -> String {
    let mut bytes = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut bytes);
    base64::Engine::encode(&base64::engine::general_purpose::URL_SAFE_NO_PAD, bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::speicher::InMemorySpeicher;
    use async_trait::async_trait;

    fn store_mit(speicher: Arc<dyn KvSpeicher>) -> SessionStore {
        SessionStore::neu(speicher, &AuthKonfig::neu(Vec::new()))
    }

    fn store() -> SessionStore {
        store_mit(InMemorySpeicher::neu())
    }

    /// Speicher der nie antwortet
    struct HaengenderSpeicher;

    #[async_trait]
    impl KvSpeicher for HaengenderSpeicher {
        async fn lesen(&self, _schluessel: &str) -> AuthResult<Option<String>> {
            std::future::pending().await
        }
        async fn schreiben_falls_neu(
            &self,
            _schluessel: &str,
            _wert: String,
            _ttl: Option<Duration>,
        ) -> AuthResult<bool> {
            std::future::pending().await
        }
        async fn loeschen(&self, _schluessel: &str) -> AuthResult<()> {
            std::future::pending().await
        }
        async fn erhoehen(&self, _schluessel: &str) -> AuthResult<u64> {
            std::future::pending().await
        }
    }

    #[tokio::test]
    async fn session_erstellen_und_nachschlagen() {
        let store = store();
        let session = store.erstellen(17).await.expect("Session-Erstellung fehlgeschlagen");
        assert_eq!(session.benutzer_id, 17);
        assert!(session.ist_gueltig());

        let gefunden = store.nachschlagen(&session.token).await.expect("Lookup fehlgeschlagen");
        assert_eq!(gefunden.benutzer_id, 17);
        assert_eq!(gefunden.laeuft_ab_am, session.laeuft_ab_am);
    }

    #[tokio::test]
    async fn session_id_hat_256_bit() {
        let session = store().erstellen(1).await.unwrap();
        // 32 Bytes -> 43 Zeichen Base64 ohne Padding
        assert_eq!(session.token.len(), 43);
    }

    #[tokio::test]
    async fn unbekannte_session_gibt_fehler() {
        let ergebnis = store().nachschlagen("kein_gueltiger_token").await;
        assert!(matches!(ergebnis, Err(AuthError::SessionUngueltig)));

        let ergebnis = store().nachschlagen("").await;
        assert!(matches!(ergebnis, Err(AuthError::SessionUngueltig)));
    }

    #[tokio::test]
    async fn zerstoerte_session_ist_weg() {
        let store = store();
        let session = store.erstellen(2).await.unwrap();

        store.zerstoeren(&session.token).await.unwrap();
        let ergebnis = store.nachschlagen(&session.token).await;
        assert!(matches!(ergebnis, Err(AuthError::SessionUngueltig)));

        // Zweites Zerstoeren ist kein Fehler
        store.zerstoeren(&session.token).await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn session_laeuft_nach_ttl_ab() {
        let store = store();
        let session = store.erstellen(3).await.unwrap();

        tokio::time::advance(Duration::from_secs(24 * 60 * 60 - 1)).await;
        assert!(store.nachschlagen(&session.token).await.is_ok());

        tokio::time::advance(Duration::from_secs(2)).await;
        let ergebnis = store.nachschlagen(&session.token).await;
        assert!(matches!(ergebnis, Err(AuthError::SessionUngueltig)));
    }

    #[tokio::test]
    async fn session_ids_sind_eindeutig() {
        let store = store();
        let s1 = store.erstellen(4).await.unwrap();
        let s2 = store.erstellen(4).await.unwrap();
        assert_ne!(s1.token, s2.token, "Session-IDs muessen eindeutig sein");
    }

    #[tokio::test]
    async fn unlesbarer_eintrag_gilt_als_ungueltig() {
        let speicher = InMemorySpeicher::neu();
        speicher
            .schreiben_falls_neu("sitzung:kaputt", "{kein json".into(), None)
            .await
            .unwrap();
        let store = store_mit(speicher);

        let ergebnis = store.nachschlagen("kaputt").await;
        assert!(matches!(ergebnis, Err(AuthError::SessionUngueltig)));
    }

    #[tokio::test(start_paused = true)]
    async fn haengender_speicher_liefert_nicht_verfuegbar() {
        let store = store_mit(Arc::new(HaengenderSpeicher));

        let ergebnis = store.nachschlagen("irgendeine-id").await;
        assert!(matches!(ergebnis, Err(AuthError::SpeicherNichtVerfuegbar(_))));

        let ergebnis = store.erstellen(5).await;
        assert!(matches!(ergebnis, Err(AuthError::SpeicherNichtVerfuegbar(_))));
    }
}
