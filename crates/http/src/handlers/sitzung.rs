//! Handler fuer das Session-Verfahren

use axum::{
    extract::{rejection::JsonRejection, State},
    http::{header, HeaderMap, HeaderValue},
    response::{IntoResponse, Json, Response},
};
use passierschein_auth::AuthError;
use passierschein_db::BenutzerRepository;
use serde_json::json;

use crate::error::ApiFehler;
use crate::gate::cookie_extrahieren;
use crate::handlers::{AnmeldedatenBody, BenutzerAntwort};
use crate::state::{AppState, CookieKonfig};

/// Baut den `Set-Cookie`-Wert fuer eine Session
pub fn cookie_setzen(konfig: &CookieKonfig, wert: &str, max_age_secs: u64) -> String {
    let mut cookie = format!(
        "{}={}; HttpOnly; SameSite=Lax; Path=/; Max-Age={}",
        konfig.name, wert, max_age_secs
    );
    if konfig.secure {
        cookie.push_str("; Secure");
    }
    cookie
}

fn set_cookie_header(cookie: String) -> Result<HeaderValue, ApiFehler> {
    HeaderValue::try_from(cookie)
        .map_err(|e| ApiFehler::Auth(AuthError::intern(format!("Cookie ungueltig: {e}"))))
}

/// POST /login
pub async fn anmelden<U: BenutzerRepository + 'static>(
    State(state): State<AppState<U>>,
    body: Result<Json<AnmeldedatenBody>, JsonRejection>,
) -> Result<Response, ApiFehler> {
    let Json(body) = body?;
    let (benutzer, session) = state
        .dienst
        .anmelden_mit_sitzung(&body.login, &body.password)
        .await?;

    let cookie = cookie_setzen(
        &state.cookie,
        &session.token,
        state.dienst.session_ttl().as_secs(),
    );
    let mut antwort = Json(BenutzerAntwort::from(benutzer)).into_response();
    antwort
        .headers_mut()
        .insert(header::SET_COOKIE, set_cookie_header(cookie)?);
    Ok(antwort)
}

/// POST /logout – zerstoert die Session (falls vorhanden) und loescht das Cookie
pub async fn abmelden<U: BenutzerRepository + 'static>(
    State(state): State<AppState<U>>,
    headers: HeaderMap,
) -> Result<Response, ApiFehler> {
    if let Some(session_id) = cookie_extrahieren(&headers, &state.cookie.name) {
        state.dienst.abmelden(session_id).await?;
    }

    let mut antwort = Json(json!({ "status": "ok" })).into_response();
    antwort.headers_mut().insert(
        header::SET_COOKIE,
        set_cookie_header(cookie_setzen(&state.cookie, "", 0))?,
    );
    Ok(antwort)
}
