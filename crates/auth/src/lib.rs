//! passierschein-auth – Authentifizierung und Session-Aufbau
//!
//! Dieses Crate implementiert:
//! - Passwort-Hashing mit Argon2id
//! - Signierte Access-/Refresh-Tokens (HS256) mit Art-Diskriminante
//! - Opake Sessions in einem geteilten Key/Value-Speicher mit TTL
//!   (im Prozess oder in Redis)
//! - Widerruf von Refresh-Tokens (Generationszaehler, Einmal-Verwendung)
//! - AuthService (Registrierung, Login, Refresh, Logout)

pub mod error;
pub mod konfig;
pub mod password;
pub mod redis_speicher;
pub mod service;
pub mod session;
pub mod speicher;
pub mod token;
pub mod widerruf;

// Bequeme Re-Exporte
pub use error::{AuthError, AuthResult, Fehlerkategorie};
pub use konfig::{AuthKonfig, PasswortParameter, Verfahren};
pub use password::{passwort_hashen, passwort_verifizieren};
pub use redis_speicher::RedisSpeicher;
pub use service::AuthService;
pub use session::{Session, SessionStore};
pub use speicher::{InMemorySpeicher, KvSpeicher};
pub use token::{TokenArt, TokenClaims, TokenCodec, TokenPaar};
pub use widerruf::Widerrufsliste;
