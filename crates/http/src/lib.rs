//! passierschein-http – REST-Schnittstelle
//!
//! Dieses Crate stellt bereit:
//! - Auth-Gate als Axum-Middleware (Bearer-Token oder Session-Cookie)
//! - Handler fuer Registrierung, Login, Refresh, Logout und Profil
//! - Rate Limiting fuer Anmeldeversuche pro IP
//! - Einheitliche JSON-Fehlerantworten

pub mod error;
pub mod gate;
pub mod handlers;
pub mod rate_limit;
pub mod routes;
pub mod server;
pub mod state;

pub use error::ApiFehler;
pub use gate::{Ablehnung, Authentifiziert};
pub use rate_limit::{RateLimitKonfig, RateLimiter};
pub use routes::router;
pub use server::{RestServer, RestServerKonfig};
pub use state::{AppState, CookieKonfig};
