//! Geteilter Key/Value-Speicher mit TTL
//!
//! Sessions und Widerrufsdaten liegen hinter dem Trait [`KvSpeicher`].
//! Jede Operation ist atomar fuer genau einen Schluessel; mehrschluesselige
//! Transaktionen werden nicht benoetigt. [`InMemorySpeicher`] haelt alles
//! im Prozess; mehrere Instanzen teilen sich einen
//! [`RedisSpeicher`](crate::redis_speicher::RedisSpeicher).

use std::{future::Future, sync::Arc, time::Duration};

use async_trait::async_trait;
use dashmap::{mapref::entry::Entry, DashMap};
use tokio::time::Instant;

use crate::error::{AuthError, AuthResult};

/// Schnittstelle zum geteilten Speicher
#[async_trait]
pub trait KvSpeicher: Send + Sync {
    /// Liest einen Wert; abgelaufene Eintraege gelten als nicht vorhanden
    async fn lesen(&self, schluessel: &str) -> AuthResult<Option<String>>;

    /// Schreibt nur, wenn der Schluessel frei (oder abgelaufen) ist.
    /// Gibt `true` zurueck wenn geschrieben wurde.
    async fn schreiben_falls_neu(
        &self,
        schluessel: &str,
        wert: String,
        ttl: Option<Duration>,
    ) -> AuthResult<bool>;

    /// Loescht einen Schluessel; ein fehlender Schluessel ist kein Fehler
    async fn loeschen(&self, schluessel: &str) -> AuthResult<()>;

    /// Erhoeht einen Zaehler atomar und gibt den neuen Wert zurueck.
    /// Fehlende Zaehler starten bei 0.
    async fn erhoehen(&self, schluessel: &str) -> AuthResult<u64>;
}

/// Fuehrt einen Speicherzugriff mit Zeitlimit aus
///
/// Ein Zeitlimit wird als [`AuthError::SpeicherNichtVerfuegbar`] gemeldet,
/// nie als fehlende Session. Es gibt keine Wiederholung.
pub(crate) async fn mit_zeitlimit<T, F>(
    zeitlimit: Duration,
    operation: &'static str,
    zugriff: F,
) -> AuthResult<T>
where
    F: Future<Output = AuthResult<T>>,
{
    match tokio::time::timeout(zeitlimit, zugriff).await {
        Ok(ergebnis) => ergebnis,
        Err(_) => {
            tracing::warn!(
                operation,
                zeitlimit_ms = zeitlimit.as_millis() as u64,
                "Speicher antwortet nicht"
            );
            Err(AuthError::SpeicherNichtVerfuegbar(format!(
                "Zeitlimit bei '{operation}' ueberschritten"
            )))
        }
    }
}

#[derive(Debug, Clone)]
struct Eintrag {
    wert: String,
    laeuft_ab: Option<Instant>,
}

impl Eintrag {
    /// Eine TTL jenseits des darstellbaren Zeitraums gilt als unbegrenzt
    fn neu(wert: String, ttl: Option<Duration>) -> Self {
        Self {
            wert,
            laeuft_ab: ttl.and_then(|d| Instant::now().checked_add(d)),
        }
    }

    fn ist_abgelaufen(&self, jetzt: Instant) -> bool {
        self.laeuft_ab.is_some_and(|ablauf| ablauf <= jetzt)
    }
}

/// In-Memory Speicher mit TTL-Unterstuetzung
///
/// Abgelaufene Eintraege werden beim Lesen verworfen; ein optionaler
/// Hintergrund-Task raeumt zusaetzlich periodisch auf.
#[derive(Debug, Default)]
pub struct InMemorySpeicher {
    eintraege: DashMap<String, Eintrag>,
}

impl InMemorySpeicher {
    /// Erstellt einen neuen leeren Speicher
    pub fn neu() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Startet den Cleanup-Task fuer einen bestehenden Speicher
    pub fn mit_bereinigung(speicher: Arc<Self>, intervall: Duration) -> Arc<Self> {
        let speicher_klon = Arc::clone(&speicher);
        tokio::spawn(async move {
            loop {
                tokio::time::sleep(intervall).await;
                let entfernt = speicher_klon.bereinigen();
                if entfernt > 0 {
                    tracing::debug!(anzahl = entfernt, "Abgelaufene Eintraege bereinigt");
                }
            }
        });
        speicher
    }

    /// Entfernt abgelaufene Eintraege und gibt deren Anzahl zurueck
    pub fn bereinigen(&self) -> usize {
        let jetzt = Instant::now();
        let vorher = self.eintraege.len();
        self.eintraege.retain(|_, e| !e.ist_abgelaufen(jetzt));
        vorher.saturating_sub(self.eintraege.len())
    }

    /// Anzahl gespeicherter Eintraege (inkl. noch nicht bereinigter)
    pub fn anzahl(&self) -> usize {
        self.eintraege.len()
    }
}

#[async_trait]
impl KvSpeicher for InMemorySpeicher {
    async fn lesen(&self, schluessel: &str) -> AuthResult<Option<String>> {
        let jetzt = Instant::now();
        if let Some(eintrag) = self.eintraege.get(schluessel) {
            if !eintrag.ist_abgelaufen(jetzt) {
                return Ok(Some(eintrag.wert.clone()));
            }
        }
        self.eintraege
            .remove_if(schluessel, |_, e| e.ist_abgelaufen(jetzt));
        Ok(None)
    }

    async fn schreiben_falls_neu(
        &self,
        schluessel: &str,
        wert: String,
        ttl: Option<Duration>,
    ) -> AuthResult<bool> {
        let jetzt = Instant::now();
        match self.eintraege.entry(schluessel.to_string()) {
            Entry::Occupied(mut belegt) => {
                if belegt.get().ist_abgelaufen(jetzt) {
                    belegt.insert(Eintrag::neu(wert, ttl));
                    Ok(true)
                } else {
                    Ok(false)
                }
            }
            Entry::Vacant(frei) => {
                frei.insert(Eintrag::neu(wert, ttl));
                Ok(true)
            }
        }
    }

    async fn loeschen(&self, schluessel: &str) -> AuthResult<()> {
        self.eintraege.remove(schluessel);
        Ok(())
    }

    async fn erhoehen(&self, schluessel: &str) -> AuthResult<u64> {
        let jetzt = Instant::now();
        let mut eintrag = self
            .eintraege
            .entry(schluessel.to_string())
            .or_insert_with(|| Eintrag::neu("0".into(), None));

        if eintrag.ist_abgelaufen(jetzt) {
            *eintrag = Eintrag::neu("0".into(), None);
        }

        let aktuell: u64 = eintrag.wert.parse().map_err(|_| {
            AuthError::intern(format!("Wert unter '{schluessel}' ist kein Zaehler"))
        })?;
        let neu = aktuell.saturating_add(1);
        eintrag.wert = neu.to_string();
        Ok(neu)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn schreiben_und_lesen() {
        let speicher = InMemorySpeicher::neu();
        assert!(speicher
            .schreiben_falls_neu("a", "1".into(), None)
            .await
            .unwrap());
        assert_eq!(speicher.lesen("a").await.unwrap().as_deref(), Some("1"));
        assert_eq!(speicher.lesen("b").await.unwrap(), None);
    }

    #[tokio::test]
    async fn vorhandener_schluessel_wird_nicht_ueberschrieben() {
        let speicher = InMemorySpeicher::neu();
        speicher.schreiben_falls_neu("k", "alt".into(), None).await.unwrap();

        let geschrieben = speicher
            .schreiben_falls_neu("k", "neu".into(), None)
            .await
            .unwrap();
        assert!(!geschrieben);
        assert_eq!(speicher.lesen("k").await.unwrap().as_deref(), Some("alt"));
    }

    #[tokio::test(start_paused = true)]
    async fn eintrag_laeuft_nach_ttl_ab() {
        let speicher = InMemorySpeicher::neu();
        speicher
            .schreiben_falls_neu("k", "v".into(), Some(Duration::from_secs(10)))
            .await
            .unwrap();

        tokio::time::advance(Duration::from_secs(9)).await;
        assert!(speicher.lesen("k").await.unwrap().is_some());

        tokio::time::advance(Duration::from_secs(2)).await;
        assert!(speicher.lesen("k").await.unwrap().is_none());
        assert_eq!(speicher.anzahl(), 0, "Lesen muss abgelaufene Eintraege verwerfen");

        // Abgelaufener Schluessel ist wieder frei
        assert!(speicher
            .schreiben_falls_neu("k", "v2".into(), None)
            .await
            .unwrap());
    }

    #[tokio::test(start_paused = true)]
    async fn bereinigen_entfernt_nur_abgelaufene() {
        let speicher = InMemorySpeicher::neu();
        speicher
            .schreiben_falls_neu("kurz", "1".into(), Some(Duration::from_secs(1)))
            .await
            .unwrap();
        speicher.schreiben_falls_neu("ewig", "1".into(), None).await.unwrap();

        tokio::time::advance(Duration::from_secs(5)).await;
        assert_eq!(speicher.bereinigen(), 1);
        assert_eq!(speicher.anzahl(), 1);
    }

    #[tokio::test]
    async fn riesige_ttl_laeuft_nicht_ueber() {
        let speicher = InMemorySpeicher::neu();
        assert!(speicher
            .schreiben_falls_neu("k", "v".into(), Some(Duration::MAX))
            .await
            .unwrap());
        assert_eq!(speicher.lesen("k").await.unwrap().as_deref(), Some("v"));
    }

    #[tokio::test]
    async fn loeschen_ist_idempotent() {
        let speicher = InMemorySpeicher::neu();
        speicher.schreiben_falls_neu("x", "1".into(), None).await.unwrap();
        speicher.loeschen("x").await.unwrap();
        speicher.loeschen("x").await.unwrap();
        assert!(speicher.lesen("x").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn zaehler_erhoehen() {
        let speicher = InMemorySpeicher::neu();
        assert_eq!(speicher.erhoehen("gen").await.unwrap(), 1);
        assert_eq!(speicher.erhoehen("gen").await.unwrap(), 2);
        assert_eq!(speicher.lesen("gen").await.unwrap().as_deref(), Some("2"));
    }

    #[tokio::test]
    async fn zaehler_auf_text_gibt_fehler() {
        let speicher = InMemorySpeicher::neu();
        speicher.schreiben_falls_neu("t", "abc".into(), None).await.unwrap();
        assert!(speicher.erhoehen("t").await.is_err());
    }

    #[tokio::test]
    async fn parallele_erhoehungen_gehen_nicht_verloren() {
        let speicher = InMemorySpeicher::neu();
        let mut handles = Vec::new();
        for _ in 0..32 {
            let s = Arc::clone(&speicher);
            handles.push(tokio::spawn(async move { s.erhoehen("z").await.unwrap() }));
        }
        for h in handles {
            h.await.unwrap();
        }
        assert_eq!(speicher.lesen("z").await.unwrap().as_deref(), Some("32"));
    }

    #[tokio::test(start_paused = true)]
    async fn zeitlimit_meldet_speicher_nicht_verfuegbar() {
        let ergebnis: AuthResult<()> = mit_zeitlimit(Duration::from_millis(50), "test", async {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok(())
        })
        .await;
        assert!(matches!(ergebnis, Err(AuthError::SpeicherNichtVerfuegbar(_))));
    }
}
