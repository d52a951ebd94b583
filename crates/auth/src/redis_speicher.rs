//! Redis-Backend fuer den geteilten Speicher
//!
//! Mehrere Server-Instanzen teilen sich Sessions und Widerrufsdaten ueber
//! denselben Redis-Server. Jede Operation ist genau ein Redis-Befehl und
//! damit atomar; Ablaufzeiten setzt Redis selbst durch.

use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use redis::{aio::ConnectionManager, AsyncCommands, RedisError};

use crate::error::{AuthError, AuthResult};
use crate::konfig::MAX_TTL;
use crate::speicher::{mit_zeitlimit, KvSpeicher};

/// Speicher in einem externen Redis
///
/// Der `ConnectionManager` verbindet sich nach Abbruechen selbst neu und
/// ist billig zu klonen; jeder Zugriff arbeitet auf einem eigenen Klon.
pub struct RedisSpeicher {
    verbindung: ConnectionManager,
}

impl RedisSpeicher {
    /// Verbindet sich mit `url` (`redis://` oder `rediss://`)
    pub async fn verbinden(url: &str, zeitlimit: Duration) -> AuthResult<Arc<Self>> {
        let client = redis::Client::open(url)
            .map_err(|e| AuthError::intern(format!("Ungueltige Redis-URL: {e}")))?;

        let verbindung = mit_zeitlimit(zeitlimit, "redis_verbinden", async {
            ConnectionManager::new(client).await.map_err(fehler_abbilden)
        })
        .await?;

        tracing::info!("Redis-Verbindung hergestellt");
        Ok(Arc::new(Self { verbindung }))
    }
}

#[async_trait]
impl KvSpeicher for RedisSpeicher {
    async fn lesen(&self, schluessel: &str) -> AuthResult<Option<String>> {
        let mut verbindung = self.verbindung.clone();
        let wert: Option<String> = verbindung.get(schluessel).await.map_err(fehler_abbilden)?;
        Ok(wert)
    }

    async fn schreiben_falls_neu(
        &self,
        schluessel: &str,
        wert: String,
        ttl: Option<Duration>,
    ) -> AuthResult<bool> {
        let mut befehl = redis::cmd("SET");
        befehl.arg(schluessel).arg(wert).arg("NX");
        // Wie im Prozess-Speicher: was nicht darstellbar ist, laeuft nie ab
        if let Some(ttl) = ttl.filter(|d| *d <= MAX_TTL) {
            let millis = u64::try_from(ttl.as_millis()).unwrap_or(u64::MAX).max(1);
            befehl.arg("PX").arg(millis);
        }

        let mut verbindung = self.verbindung.clone();
        let antwort: Option<String> = befehl
            .query_async(&mut verbindung)
            .await
            .map_err(fehler_abbilden)?;
        Ok(antwort.is_some())
    }

    async fn loeschen(&self, schluessel: &str) -> AuthResult<()> {
        let mut verbindung = self.verbindung.clone();
        let _: () = verbindung.del(schluessel).await.map_err(fehler_abbilden)?;
        Ok(())
    }

    async fn erhoehen(&self, schluessel: &str) -> AuthResult<u64> {
        let mut verbindung = self.verbindung.clone();
        let neu: u64 = verbindung
            .incr(schluessel, 1u64)
            .await
            .map_err(fehler_abbilden)?;
        Ok(neu)
    }
}

/// Verbindungsprobleme sind 503, alles andere ein interner Fehler
fn fehler_abbilden(e: RedisError) -> AuthError {
    if e.is_io_error() || e.is_connection_refusal() || e.is_connection_dropped() || e.is_timeout()
    {
        AuthError::SpeicherNichtVerfuegbar(e.to_string())
    } else {
        AuthError::intern(format!("Redis: {e}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn ungueltige_url_wird_abgelehnt() {
        let ergebnis = RedisSpeicher::verbinden("http://localhost", Duration::from_secs(1)).await;
        assert!(matches!(ergebnis, Err(AuthError::Intern(_))));
    }

    #[tokio::test]
    async fn nicht_erreichbarer_server_ist_nicht_verfuegbar() {
        let ergebnis =
            RedisSpeicher::verbinden("redis://127.0.0.1:1", Duration::from_millis(500)).await;
        assert!(matches!(ergebnis, Err(AuthError::SpeicherNichtVerfuegbar(_))));
    }
}
