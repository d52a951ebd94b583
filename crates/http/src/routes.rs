//! Route-Definitionen
//!
//! Welche Routen es gibt, haengt vom konfigurierten Verfahren ab:
//! `/refresh` existiert nur im Token-Verfahren, `/logout` ist dort
//! geschuetzt und im Session-Verfahren offen (idempotent).

use std::sync::Arc;

use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use passierschein_auth::Verfahren;
use passierschein_db::BenutzerRepository;

use crate::gate::authentifizieren;
use crate::handlers::{konto, sitzung, token};
use crate::rate_limit::anmeldung_drosseln;
use crate::state::AppState;

/// Erstellt den vollstaendigen Router fuer das konfigurierte Verfahren
pub fn router<U: BenutzerRepository + 'static>(state: AppState<U>) -> Router {
    let anmeldung = match state.verfahren {
        Verfahren::Token => Router::new()
            .route("/register", post(konto::registrieren::<U>))
            .route("/login", post(token::anmelden::<U>)),
        Verfahren::Sitzung => Router::new()
            .route("/register", post(konto::registrieren::<U>))
            .route("/login", post(sitzung::anmelden::<U>)),
    }
    .route_layer(middleware::from_fn_with_state(
        Arc::clone(&state.rate_limiter),
        anmeldung_drosseln,
    ));

    let (offen, geschuetzt) = match state.verfahren {
        Verfahren::Token => (
            Router::new().route("/refresh", post(token::erneuern::<U>)),
            Router::new()
                .route("/me", get(konto::ich::<U>))
                .route("/logout", post(token::abmelden::<U>)),
        ),
        Verfahren::Sitzung => (
            Router::new().route("/logout", post(sitzung::abmelden::<U>)),
            Router::new().route("/me", get(konto::ich::<U>)),
        ),
    };
    let geschuetzt = geschuetzt.route_layer(middleware::from_fn_with_state(
        state.clone(),
        authentifizieren::<U>,
    ));

    Router::new()
        .route("/health", get(konto::health))
        .merge(anmeldung)
        .merge(offen)
        .merge(geschuetzt)
        .with_state(state)
}
