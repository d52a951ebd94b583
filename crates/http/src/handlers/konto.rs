//! Handler fuer Konto-Endpunkte (beide Verfahren)

use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    Extension,
};
use passierschein_db::BenutzerRepository;
use serde_json::json;

use crate::error::ApiFehler;
use crate::gate::Authentifiziert;
use crate::handlers::{AnmeldedatenBody, BenutzerAntwort};
use crate::state::AppState;

/// POST /register
pub async fn registrieren<U: BenutzerRepository + 'static>(
    State(state): State<AppState<U>>,
    body: Result<Json<AnmeldedatenBody>, JsonRejection>,
) -> Result<Response, ApiFehler> {
    let Json(body) = body?;
    let benutzer = state.dienst.registrieren(&body.login, &body.password).await?;
    Ok((StatusCode::CREATED, Json(BenutzerAntwort::from(benutzer))).into_response())
}

/// GET /me (geschuetzt)
pub async fn ich<U: BenutzerRepository + 'static>(
    State(state): State<AppState<U>>,
    Extension(auth): Extension<Authentifiziert>,
) -> Result<Json<BenutzerAntwort>, ApiFehler> {
    let benutzer = state.dienst.benutzer_laden(auth.benutzer_id).await?;
    Ok(Json(benutzer.into()))
}

/// GET /health
pub async fn health() -> impl IntoResponse {
    (StatusCode::OK, Json(json!({ "status": "ok" })))
}
