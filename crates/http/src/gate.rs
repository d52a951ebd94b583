//! Auth-Gate fuer geschuetzte Routen
//!
//! Laeuft vor jedem geschuetzten Handler. Entweder wird
//! [`Authentifiziert`] in die Request-Extensions gelegt, oder die Anfrage
//! wird abgelehnt, bevor ein Handler sie sieht.

use std::fmt;

use axum::{
    extract::{Request, State},
    http::{header, HeaderMap},
    middleware::Next,
    response::{IntoResponse, Response},
};
use passierschein_auth::{Fehlerkategorie, Verfahren};
use passierschein_db::BenutzerRepository;

use crate::error::ApiFehler;
use crate::state::AppState;

/// Ablehnungsgruende, die vor jeder Token- oder Session-Pruefung entstehen
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ablehnung {
    /// Kein Authorization-Header bzw. kein Session-Cookie
    FehlendeAnmeldedaten,
    /// Header nicht lesbar oder nicht `<Schema> <Token>`
    FehlerhafteAnmeldedaten,
    /// Schema ist nicht `Bearer`
    NichtUnterstuetztesSchema,
}

impl Ablehnung {
    pub fn grund(&self) -> &'static str {
        match self {
            Self::FehlendeAnmeldedaten => "MissingCredential",
            Self::FehlerhafteAnmeldedaten => "MalformedCredential",
            Self::NichtUnterstuetztesSchema => "UnsupportedScheme",
        }
    }
}

impl fmt::Display for Ablehnung {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Self::FehlendeAnmeldedaten => "Anmeldedaten fehlen",
            Self::FehlerhafteAnmeldedaten => "Anmeldedaten fehlerhaft",
            Self::NichtUnterstuetztesSchema => "Authentifizierungsschema nicht unterstuetzt",
        };
        f.write_str(text)
    }
}

/// Identitaet einer erfolgreich geprueften Anfrage (Request-Extension)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Authentifiziert {
    pub benutzer_id: i64,
}

/// Extrahiert den Token aus `Authorization: Bearer <token>`
///
/// Der Header muss aus genau zwei durch ein Leerzeichen getrennten Teilen
/// bestehen; das Schema wird exakt verglichen.
pub fn bearer_extrahieren(headers: &HeaderMap) -> Result<&str, Ablehnung> {
    let wert = headers
        .get(header::AUTHORIZATION)
        .ok_or(Ablehnung::FehlendeAnmeldedaten)?
        .to_str()
        .map_err(|_| Ablehnung::FehlerhafteAnmeldedaten)?;

    let mut teile = wert.split(' ');
    match (teile.next(), teile.next(), teile.next()) {
        (Some(schema), Some(token), None) if !schema.is_empty() && !token.is_empty() => {
            if schema == "Bearer" {
                Ok(token)
            } else {
                Err(Ablehnung::NichtUnterstuetztesSchema)
            }
        }
        _ => Err(Ablehnung::FehlerhafteAnmeldedaten),
    }
}

/// Sucht ein Cookie in allen `Cookie`-Headern; leere Werte zaehlen nicht
pub fn cookie_extrahieren<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(';'))
        .filter_map(|paar| paar.trim().split_once('='))
        .find(|(n, w)| *n == name && !w.is_empty())
        .map(|(_, w)| w)
}

/// Prueft die Anmeldedaten einer Anfrage je nach Verfahren
async fn identitaet_pruefen<U: BenutzerRepository>(
    state: &AppState<U>,
    headers: &HeaderMap,
) -> Result<i64, ApiFehler> {
    match state.verfahren {
        Verfahren::Token => {
            let token = bearer_extrahieren(headers)?;
            Ok(state.dienst.zugang_pruefen(token)?.sub)
        }
        Verfahren::Sitzung => {
            let session_id = cookie_extrahieren(headers, &state.cookie.name)
                .map(str::to_owned)
                .ok_or(Ablehnung::FehlendeAnmeldedaten)?;
            Ok(state.dienst.sitzung_pruefen(&session_id).await?)
        }
    }
}

/// Axum-Middleware: Auth-Gate (fail closed)
pub async fn authentifizieren<U: BenutzerRepository + 'static>(
    State(state): State<AppState<U>>,
    mut req: Request,
    next: Next,
) -> Response {
    match identitaet_pruefen(&state, req.headers()).await {
        Ok(benutzer_id) => {
            req.extensions_mut().insert(Authentifiziert { benutzer_id });
            next.run(req).await
        }
        Err(fehler) => {
            match &fehler {
                ApiFehler::Auth(e) if e.kategorie() == Fehlerkategorie::SpeicherNichtVerfuegbar => {
                    tracing::warn!(
                        fehler = %e,
                        pfad = %req.uri().path(),
                        "Auth-Gate: Speicher nicht verfuegbar"
                    );
                }
                _ => {
                    tracing::debug!(
                        grund = fehler.fehler_code(),
                        pfad = %req.uri().path(),
                        "Auth-Gate: Anfrage abgelehnt"
                    );
                }
            }
            fehler.into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn mit_auth(wert: &'static str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(header::AUTHORIZATION, HeaderValue::from_static(wert));
        headers
    }

    #[test]
    fn bearer_token_extrahieren() {
        let headers = mit_auth("Bearer abc.def.ghi");
        assert_eq!(bearer_extrahieren(&headers), Ok("abc.def.ghi"));
    }

    #[test]
    fn fehlender_header() {
        assert_eq!(
            bearer_extrahieren(&HeaderMap::new()),
            Err(Ablehnung::FehlendeAnmeldedaten)
        );
    }

    #[test]
    fn fremdes_schema() {
        assert_eq!(
            bearer_extrahieren(&mit_auth("Basic xyz")),
            Err(Ablehnung::NichtUnterstuetztesSchema)
        );
        // Schema wird exakt verglichen
        assert_eq!(
            bearer_extrahieren(&mit_auth("bearer xyz")),
            Err(Ablehnung::NichtUnterstuetztesSchema)
        );
    }

    #[test]
    fn falsche_teilanzahl_ist_fehlerhaft() {
        for wert in ["Bearer", "Bearer ", "Bearer a b", "Bearer  a", ""] {
            assert_eq!(
                bearer_extrahieren(&mit_auth(wert)),
                Err(Ablehnung::FehlerhafteAnmeldedaten),
                "Header '{wert}'"
            );
        }
    }

    #[test]
    fn nicht_utf8_header_ist_fehlerhaft() {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::AUTHORIZATION,
            HeaderValue::from_bytes(b"Bearer \xff\xfe").unwrap(),
        );
        assert_eq!(
            bearer_extrahieren(&headers),
            Err(Ablehnung::FehlerhafteAnmeldedaten)
        );
    }

    #[test]
    fn cookie_aus_mehreren_eintraegen() {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::COOKIE,
            HeaderValue::from_static("theme=dunkel; session_id=abc123; lang=de"),
        );
        assert_eq!(cookie_extrahieren(&headers, "session_id"), Some("abc123"));
        assert_eq!(cookie_extrahieren(&headers, "fehlt"), None);
    }

    #[test]
    fn leeres_cookie_zaehlt_nicht() {
        let mut headers = HeaderMap::new();
        headers.insert(header::COOKIE, HeaderValue::from_static("session_id="));
        assert_eq!(cookie_extrahieren(&headers, "session_id"), None);
    }
}
