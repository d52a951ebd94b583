//! Geteilter Axum-State

use std::sync::Arc;

use passierschein_auth::{AuthService, Verfahren};
use passierschein_db::BenutzerRepository;

use crate::rate_limit::RateLimiter;

/// Einstellungen fuer das Session-Cookie
#[derive(Debug, Clone)]
pub struct CookieKonfig {
    pub name: String,
    /// Setzt das `Secure`-Attribut (nur ueber HTTPS senden)
    pub secure: bool,
}

impl Default for CookieKonfig {
    fn default() -> Self {
        Self {
            name: "session_id".into(),
            secure: false,
        }
    }
}

/// Axum-State fuer alle Routen
pub struct AppState<U: BenutzerRepository> {
    pub dienst: Arc<AuthService<U>>,
    pub verfahren: Verfahren,
    pub cookie: Arc<CookieKonfig>,
    pub rate_limiter: Arc<RateLimiter>,
}

impl<U: BenutzerRepository> AppState<U> {
    pub fn neu(
        dienst: Arc<AuthService<U>>,
        verfahren: Verfahren,
        cookie: CookieKonfig,
        rate_limiter: Arc<RateLimiter>,
    ) -> Self {
        Self {
            dienst,
            verfahren,
            cookie: Arc::new(cookie),
            rate_limiter,
        }
    }
}

// Manuell, damit `U` selbst nicht Clone sein muss
impl<U: BenutzerRepository> Clone for AppState<U> {
    fn clone(&self) -> Self {
        Self {
            dienst: Arc::clone(&self.dienst),
            verfahren: self.verfahren,
            cookie: Arc::clone(&self.cookie),
            rate_limiter: Arc::clone(&self.rate_limiter),
        }
    }
}
