//! Handler fuer das Token-Verfahren

use axum::{
    extract::{rejection::JsonRejection, State},
    response::Json,
    Extension,
};
use passierschein_auth::TokenPaar;
use passierschein_db::BenutzerRepository;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::error::ApiFehler;
use crate::gate::Authentifiziert;
use crate::handlers::AnmeldedatenBody;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct RefreshBody {
    pub refresh_token: String,
}

/// POST /login
pub async fn anmelden<U: BenutzerRepository + 'static>(
    State(state): State<AppState<U>>,
    body: Result<Json<AnmeldedatenBody>, JsonRejection>,
) -> Result<Json<TokenPaar>, ApiFehler> {
    let Json(body) = body?;
    let (_, paar) = state
        .dienst
        .anmelden_mit_token(&body.login, &body.password)
        .await?;
    Ok(Json(paar))
}

/// POST /refresh
pub async fn erneuern<U: BenutzerRepository + 'static>(
    State(state): State<AppState<U>>,
    body: Result<Json<RefreshBody>, JsonRejection>,
) -> Result<Json<TokenPaar>, ApiFehler> {
    let Json(body) = body?;
    let paar = state.dienst.token_erneuern(&body.refresh_token).await?;
    Ok(Json(paar))
}

/// POST /logout (geschuetzt) – widerruft alle Refresh-Tokens des Benutzers
pub async fn abmelden<U: BenutzerRepository + 'static>(
    State(state): State<AppState<U>>,
    Extension(auth): Extension<Authentifiziert>,
) -> Result<Json<Value>, ApiFehler> {
    state.dienst.alle_token_widerrufen(auth.benutzer_id).await?;
    Ok(Json(json!({ "status": "ok" })))
}
