//! passierschein-server – Bibliotheks-Root
//!
//! Verdrahtet Datenbank, Speicher, Auth-Service und REST-Server und stellt
//! den oeffentlichen Einstiegspunkt fuer Integrationstests bereit.

pub mod config;

use std::{net::SocketAddr, sync::Arc, time::Duration};

use anyhow::{Context, Result};
use axum::Router;

use config::{ServerConfig, SpeicherArt};
use passierschein_auth::{AuthService, InMemorySpeicher, KvSpeicher, RedisSpeicher};
use passierschein_db::SqliteDb;
use passierschein_http::{
    router, AppState, CookieKonfig, RateLimitKonfig, RateLimiter, RestServer, RestServerKonfig,
};

/// Intervall fuer das Aufraeumen inaktiver Rate-Limit-Buckets
const RATE_LIMIT_BEREINIGUNG: Duration = Duration::from_secs(60);

/// Haelt den laufenden Server-Zustand zusammen
pub struct Server {
    pub config: ServerConfig,
}

impl Server {
    /// Erstellt einen neuen Server aus der gegebenen Konfiguration
    pub fn neu(config: ServerConfig) -> Self {
        Self { config }
    }

    /// Baut den vollstaendigen Router
    ///
    /// Reihenfolge:
    /// 1. Konfiguration pruefen (Token-Verfahren ohne Geheimnis startet nicht)
    /// 2. Datenbank oeffnen und migrieren
    /// 3. Speicher anlegen (Redis oder im Prozess mit Hintergrund-Bereinigung)
    /// 4. Auth-Service und Routen fuer das Verfahren bauen
    pub async fn app_bauen(&self) -> Result<Router> {
        self.config.pruefen()?;

        let db = SqliteDb::oeffnen(&self.config.datenbank_konfig())
            .await
            .context("Datenbank konnte nicht geoeffnet werden")?;

        let speicher = self.speicher_oeffnen().await?;

        let auth_konfig = self.config.auth_konfig();
        let dienst = Arc::new(AuthService::neu(Arc::new(db), speicher, &auth_konfig));

        let rate_limiter = RateLimiter::neu(RateLimitKonfig {
            anfragen_pro_minute_ip: self.config.auth.anmeldeversuche_pro_minute,
            vertrauenswuerdige_proxys: self.config.server.vertrauenswuerdige_proxys.clone(),
        });
        rate_limit_bereinigung_starten(Arc::clone(&rate_limiter));

        let cookie = CookieKonfig {
            name: self.config.auth.cookie_name.clone(),
            secure: self.config.auth.cookie_secure,
        };

        Ok(router(AppState::neu(
            dienst,
            self.config.auth.verfahren,
            cookie,
            rate_limiter,
        )))
    }

    async fn speicher_oeffnen(&self) -> Result<Arc<dyn KvSpeicher>> {
        let einstellungen = &self.config.speicher;
        let speicher: Arc<dyn KvSpeicher> = match self.config.speicher_art() {
            Some(SpeicherArt::Redis) => RedisSpeicher::verbinden(
                &einstellungen.url,
                Duration::from_millis(einstellungen.zeitlimit_ms),
            )
            .await
            .context("Redis-Speicher nicht erreichbar")?,
            Some(SpeicherArt::InMemory) | None => {
                tracing::warn!(
                    "In-Memory-Speicher: Sessions werden nicht zwischen Instanzen geteilt"
                );
                InMemorySpeicher::mit_bereinigung(
                    InMemorySpeicher::neu(),
                    Duration::from_secs(einstellungen.bereinigung_sekunden),
                )
            }
        };
        tracing::info!(art = ?self.config.speicher_art(), "Session-Speicher bereit");
        Ok(speicher)
    }

    /// Startet alle Subsysteme und laeuft bis zum Shutdown-Signal
    pub async fn starten(self) -> Result<()> {
        tracing::info!(
            adresse = %self.config.bind_adresse(),
            verfahren = ?self.config.auth.verfahren,
            "Server startet"
        );

        let app = self.app_bauen().await?;

        let bind_addr: SocketAddr = self
            .config
            .bind_adresse()
            .parse()
            .with_context(|| format!("Ungueltige Bind-Adresse '{}'", self.config.bind_adresse()))?;

        RestServer::neu(RestServerKonfig { bind_addr })
            .starten(app, shutdown_signal())
            .await
    }
}

fn rate_limit_bereinigung_starten(limiter: Arc<RateLimiter>) {
    tokio::spawn(async move {
        let mut intervall = tokio::time::interval(RATE_LIMIT_BEREINIGUNG);
        loop {
            intervall.tick().await;
            let entfernt = limiter.bereinigen();
            if entfernt > 0 {
                tracing::debug!(anzahl = entfernt, "Inaktive Rate-Limit-Buckets entfernt");
            }
        }
    });
}

/// Wartet auf Ctrl-C
async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(fehler = %e, "Shutdown-Signal konnte nicht abgewartet werden");
        return;
    }
    tracing::info!("Shutdown-Signal empfangen, Server wird beendet");
}
