//! Widerruf von Refresh-Tokens
//!
//! Zwei Mechanismen im geteilten Speicher:
//! - ein Generationszaehler pro Benutzer (`widerruf:gen:<id>`); Tokens mit
//!   aelterer Generation sind widerrufen
//! - verbrauchte Token-IDs (`widerruf:jti:<jti>`), damit jeder
//!   Refresh-Token genau einmal eingeloest werden kann. Der Eintrag lebt so
//!   lange wie der Token selbst.

use std::{sync::Arc, time::Duration};

use crate::error::{AuthError, AuthResult};
use crate::konfig::AuthKonfig;
use crate::speicher::{mit_zeitlimit, KvSpeicher};

/// Untergrenze fuer die Lebensdauer eines jti-Eintrags
const MIN_JTI_TTL: Duration = Duration::from_secs(1);

pub struct Widerrufsliste {
    speicher: Arc<dyn KvSpeicher>,
    zeitlimit: Duration,
}

impl Widerrufsliste {
    pub fn neu(speicher: Arc<dyn KvSpeicher>, konfig: &AuthKonfig) -> Self {
        Self {
            speicher,
            zeitlimit: konfig.speicher_zeitlimit,
        }
    }

    /// Aktuelle Generation eines Benutzers (0 wenn nie widerrufen)
    pub async fn generation(&self, benutzer_id: i64) -> AuthResult<u64> {
        let schluessel = generation_schluessel(benutzer_id);
        let wert = mit_zeitlimit(
            self.zeitlimit,
            "generation_lesen",
            self.speicher.lesen(&schluessel),
        )
        .await?;

        match wert {
            None => Ok(0),
            Some(w) => w
                .parse()
                .map_err(|_| AuthError::intern(format!("Generation unter '{schluessel}' unlesbar"))),
        }
    }

    /// Widerruft alle bisher ausgestellten Refresh-Tokens eines Benutzers
    pub async fn alle_widerrufen(&self, benutzer_id: i64) -> AuthResult<u64> {
        let neu = mit_zeitlimit(
            self.zeitlimit,
            "generation_erhoehen",
            self.speicher.erhoehen(&generation_schluessel(benutzer_id)),
        )
        .await?;
        tracing::info!(benutzer_id, generation = neu, "Refresh-Tokens widerrufen");
        Ok(neu)
    }

    /// Markiert eine Token-ID als verbraucht
    ///
    /// Gibt `true` zurueck beim ersten Verbrauch, `false` wenn die ID
    /// bereits eingeloest wurde.
    pub async fn verbrauchen(&self, jti: &str, restlaufzeit: Duration) -> AuthResult<bool> {
        mit_zeitlimit(
            self.zeitlimit,
            "jti_verbrauchen",
            self.speicher.schreiben_falls_neu(
                &format!("widerruf:jti:{jti}"),
                "1".into(),
                Some(restlaufzeit.max(MIN_JTI_TTL)),
            ),
        )
        .await
    }
}

fn generation_schluessel(benutzer_id: i64) -> String {
    format!("widerruf:gen:{benutzer_id}")
}
