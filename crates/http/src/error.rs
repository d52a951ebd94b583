//! Fehlerantworten der REST-API
//!
//! Jede Ablehnung wird als `{"error":{"code":"<Grund>","message":"..."}}`
//! ausgeliefert. Interne Details gehen nur ins Log.

use axum::{
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use passierschein_auth::{AuthError, Fehlerkategorie};
use serde_json::json;
use thiserror::Error;

use crate::gate::Ablehnung;

/// Alle Fehler, die ein Handler oder das Auth-Gate liefern kann
#[derive(Debug, Error)]
pub enum ApiFehler {
    #[error("{0}")]
    Abgelehnt(Ablehnung),

    #[error(transparent)]
    Auth(#[from] AuthError),

    #[error("Ungueltige Anfrage: {0}")]
    UngueltigeAnfrage(String),

    #[error("Rate Limit ueberschritten: bitte warte {retry_after_secs} Sekunden")]
    RateLimit { retry_after_secs: u64 },
}

impl ApiFehler {
    /// HTTP-Statuscode fuer diesen Fehler
    pub fn http_status(&self) -> StatusCode {
        match self {
            Self::Abgelehnt(_) => StatusCode::UNAUTHORIZED,
            Self::UngueltigeAnfrage(_) => StatusCode::BAD_REQUEST,
            Self::RateLimit { .. } => StatusCode::TOO_MANY_REQUESTS,
            Self::Auth(e) => match e.kategorie() {
                Fehlerkategorie::UngueltigeAnfrage => StatusCode::BAD_REQUEST,
                Fehlerkategorie::NichtAuthentifiziert => StatusCode::UNAUTHORIZED,
                Fehlerkategorie::Konflikt => StatusCode::CONFLICT,
                Fehlerkategorie::SpeicherNichtVerfuegbar => StatusCode::SERVICE_UNAVAILABLE,
                Fehlerkategorie::Intern => StatusCode::INTERNAL_SERVER_ERROR,
            },
        }
    }

    /// Maschinenlesbarer Fehler-Code im Antwort-Body
    pub fn fehler_code(&self) -> &'static str {
        match self {
            Self::Abgelehnt(a) => a.grund(),
            Self::UngueltigeAnfrage(_) => "MalformedRequest",
            Self::RateLimit { .. } => "RateLimited",
            Self::Auth(e) => e.grund(),
        }
    }

    /// Nachricht fuer den Client; interne Fehler bleiben generisch
    fn nachricht(&self) -> String {
        match self {
            Self::Auth(e) => match e.kategorie() {
                Fehlerkategorie::Intern => "Interner Fehler".to_string(),
                Fehlerkategorie::SpeicherNichtVerfuegbar => {
                    "Dienst voruebergehend nicht verfuegbar".to_string()
                }
                _ => e.to_string(),
            },
            andere => andere.to_string(),
        }
    }
}

impl From<Ablehnung> for ApiFehler {
    fn from(ablehnung: Ablehnung) -> Self {
        Self::Abgelehnt(ablehnung)
    }
}

impl From<JsonRejection> for ApiFehler {
    fn from(rejection: JsonRejection) -> Self {
        Self::UngueltigeAnfrage(rejection.body_text())
    }
}

impl IntoResponse for ApiFehler {
    fn into_response(self) -> Response {
        let status = self.http_status();
        if status == StatusCode::INTERNAL_SERVER_ERROR {
            tracing::error!(fehler = %self, "Interner Fehler bei Anfrage");
        }

        let mut fehler = json!({
            "code": self.fehler_code(),
            "message": self.nachricht(),
        });
        if let Self::RateLimit { retry_after_secs } = self {
            fehler["retry_after_secs"] = json!(retry_after_secs);
        }

        (status, Json(json!({ "error": fehler }))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn statuscodes_nach_kategorie() {
        assert_eq!(
            ApiFehler::from(AuthError::BenutzernameVergeben("a".into())).http_status(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            ApiFehler::from(AuthError::TokenAbgelaufen).http_status(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            ApiFehler::from(AuthError::SpeicherNichtVerfuegbar("x".into())).http_status(),
            StatusCode::SERVICE_UNAVAILABLE
        );
        assert_eq!(
            ApiFehler::from(AuthError::UngueltigeEingabe("leer".into())).http_status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ApiFehler::from(Ablehnung::FehlendeAnmeldedaten).http_status(),
            StatusCode::UNAUTHORIZED
        );
    }

    #[test]
    fn interne_details_werden_nicht_ausgeliefert() {
        let fehler = ApiFehler::from(AuthError::intern("Pool erschoepft bei db.sqlite"));
        assert_eq!(fehler.fehler_code(), "InternalError");
        assert!(!fehler.nachricht().contains("db.sqlite"));
    }

    #[test]
    fn rate_limit_code() {
        let fehler = ApiFehler::RateLimit { retry_after_secs: 6 };
        assert_eq!(fehler.http_status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(fehler.fehler_code(), "RateLimited");
    }
}
