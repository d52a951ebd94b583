//! Auth-Service fuer Passierschein
//!
//! Zentraler Einstiegspunkt fuer Registrierung, Login (Token oder Session),
//! Refresh, Logout und Pruefung von Anmeldenachweisen. Nutzt die
//! Benutzer-Registry, den TokenCodec und den Session-Store.

use std::sync::Arc;

use chrono::Utc;

use passierschein_db::{BenutzerRecord, BenutzerRepository, NeuerBenutzer};

use crate::{
    error::{AuthError, AuthResult},
    konfig::{AuthKonfig, PasswortParameter},
    password::{passwort_hashen, passwort_verifizieren},
    session::{Session, SessionStore},
    speicher::KvSpeicher,
    token::{TokenArt, TokenClaims, TokenCodec, TokenPaar},
    widerruf::Widerrufsliste,
};

/// Maximale Laenge eines Logins (Spaltenbreite der Registry)
const MAX_LOGIN_LAENGE: usize = 255;

/// Auth-Service – zentraler Einstiegspunkt fuer alle Authentifizierungsvorgaenge
pub struct AuthService<U: BenutzerRepository> {
    user_repo: Arc<U>,
    token_codec: TokenCodec,
    session_store: SessionStore,
    widerruf: Widerrufsliste,
    passwort_parameter: PasswortParameter,
    /// Hash fuer Scheinpruefungen bei unbekanntem Login
    dummy_hash: Option<String>,
}

impl<U: BenutzerRepository> AuthService<U> {
    /// Erstellt einen neuen AuthService
    ///
    /// Sessions und Widerrufsdaten teilen sich denselben Speicher.
    /// Der Platzhalter-Hash fuer Scheinpruefungen wird hier einmal berechnet,
    /// damit schon der erste unbekannte Login nicht langsamer ist.
    pub fn neu(user_repo: Arc<U>, speicher: Arc<dyn KvSpeicher>, konfig: &AuthKonfig) -> Self {
        let dummy_hash = match passwort_hashen("passierschein-platzhalter", &konfig.passwort) {
            Ok(hash) => Some(hash),
            Err(e) => {
                tracing::warn!(fehler = %e, "Platzhalter-Hash konnte nicht erzeugt werden");
                None
            }
        };

        Self {
            user_repo,
            token_codec: TokenCodec::neu(konfig),
            session_store: SessionStore::neu(Arc::clone(&speicher), konfig),
            widerruf: Widerrufsliste::neu(speicher, konfig),
            passwort_parameter: konfig.passwort,
            dummy_hash,
        }
    }

    /// Lebensdauer neuer Sessions
    pub fn session_ttl(&self) -> std::time::Duration {
        self.session_store.ttl()
    }

    /// Registriert einen neuen Benutzer
    pub async fn registrieren(&self, login: &str, passwort: &str) -> AuthResult<BenutzerRecord> {
        if login.is_empty() || passwort.is_empty() {
            return Err(AuthError::UngueltigeEingabe(
                "Login und Passwort duerfen nicht leer sein".into(),
            ));
        }
        if login.chars().count() > MAX_LOGIN_LAENGE {
            return Err(AuthError::UngueltigeEingabe(format!(
                "Login ist laenger als {MAX_LOGIN_LAENGE} Zeichen"
            )));
        }

        if self.user_repo.laden_nach_login(login).await?.is_some() {
            return Err(AuthError::BenutzernameVergeben(login.to_string()));
        }

        let passwort_hash = passwort_hashen(passwort, &self.passwort_parameter)?;

        // Parallele Registrierung desselben Logins faengt die Registry ab
        let benutzer = self
            .user_repo
            .erstellen(NeuerBenutzer {
                login,
                password_hash: &passwort_hash,
            })
            .await
            .map_err(|e| {
                if e.ist_eindeutigkeit() {
                    AuthError::BenutzernameVergeben(login.to_string())
                } else {
                    AuthError::Datenbank(e)
                }
            })?;

        tracing::info!(
            benutzer_id = benutzer.id,
            login = %benutzer.login,
            "Neuer Benutzer registriert"
        );

        Ok(benutzer)
    }

    /// Prueft Login und Passwort
    ///
    /// Unbekannter Login und falsches Passwort liefern denselben Fehler.
    async fn anmeldedaten_pruefen(&self, login: &str, passwort: &str) -> AuthResult<BenutzerRecord> {
        let Some(benutzer) = self.user_repo.laden_nach_login(login).await? else {
            self.scheinpruefung(passwort);
            tracing::debug!("Login fuer unbekannten Benutzer abgelehnt");
            return Err(AuthError::UngueltigeAnmeldedaten);
        };

        if !passwort_verifizieren(passwort, &benutzer.password_hash)? {
            tracing::debug!(benutzer_id = benutzer.id, "Falsches Passwort");
            return Err(AuthError::UngueltigeAnmeldedaten);
        }

        Ok(benutzer)
    }

    /// Rechnet eine Verifikation gegen einen Platzhalter-Hash, damit ein
    /// unbekannter Login nicht an der Antwortzeit erkennbar ist.
    fn scheinpruefung(&self, passwort: &str) {
        if let Some(hash) = &self.dummy_hash {
            let _ = passwort_verifizieren(passwort, hash);
        }
    }

    /// Meldet einen Benutzer an und stellt ein Token-Paar aus
    pub async fn anmelden_mit_token(
        &self,
        login: &str,
        passwort: &str,
    ) -> AuthResult<(BenutzerRecord, TokenPaar)> {
        let benutzer = self.anmeldedaten_pruefen(login, passwort).await?;
        let generation = self.widerruf.generation(benutzer.id).await?;
        let paar = self.token_codec.paar_ausstellen(benutzer.id, generation)?;

        tracing::info!(benutzer_id = benutzer.id, "Benutzer angemeldet (Token)");
        Ok((benutzer, paar))
    }

    /// Meldet einen Benutzer an und erstellt eine neue Session
    pub async fn anmelden_mit_sitzung(
        &self,
        login: &str,
        passwort: &str,
    ) -> AuthResult<(BenutzerRecord, Session)> {
        let benutzer = self.anmeldedaten_pruefen(login, passwort).await?;
        let session = self.session_store.erstellen(benutzer.id).await?;

        tracing::info!(benutzer_id = benutzer.id, "Benutzer angemeldet (Session)");
        Ok((benutzer, session))
    }

    /// Prueft einen Access-Token (zustandslos)
    pub fn zugang_pruefen(&self, access_token: &str) -> AuthResult<TokenClaims> {
        self.token_codec.pruefen(access_token, TokenArt::Access)
    }

    /// Loest einen Refresh-Token gegen ein neues Paar ein
    ///
    /// Jeder Refresh-Token ist nur einmal einloesbar. Wird ein bereits
    /// eingeloester Token erneut vorgelegt, werden alle Refresh-Tokens des
    /// Benutzers widerrufen.
    pub async fn token_erneuern(&self, refresh_token: &str) -> AuthResult<TokenPaar> {
        let claims = self.token_codec.pruefen(refresh_token, TokenArt::Refresh)?;

        let generation = self.widerruf.generation(claims.sub).await?;
        if claims.generation < generation {
            tracing::debug!(benutzer_id = claims.sub, "Refresh-Token einer alten Generation");
            return Err(AuthError::TokenWiderrufen);
        }

        let restlaufzeit = claims.restlaufzeit(Utc::now().timestamp());
        if !self.widerruf.verbrauchen(&claims.jti, restlaufzeit).await? {
            tracing::warn!(
                benutzer_id = claims.sub,
                "Refresh-Token wiederverwendet, alle Refresh-Tokens werden widerrufen"
            );
            self.widerruf.alle_widerrufen(claims.sub).await?;
            return Err(AuthError::TokenWiderrufen);
        }

        self.token_codec.paar_ausstellen(claims.sub, generation)
    }

    /// Widerruft alle Refresh-Tokens eines Benutzers (Token-Logout)
    ///
    /// Bereits ausgestellte Access-Tokens bleiben bis zu ihrem Ablauf gueltig.
    pub async fn alle_token_widerrufen(&self, benutzer_id: i64) -> AuthResult<()> {
        self.widerruf.alle_widerrufen(benutzer_id).await?;
        Ok(())
    }

    /// Schlaegt eine Session nach und gibt die Benutzer-ID zurueck
    pub async fn sitzung_pruefen(&self, session_id: &str) -> AuthResult<i64> {
        Ok(self.session_store.nachschlagen(session_id).await?.benutzer_id)
    }

    /// Meldet eine Session ab (idempotent)
    pub async fn abmelden(&self, session_id: &str) -> AuthResult<()> {
        self.session_store.zerstoeren(session_id).await?;
        tracing::debug!("Session invalidiert (Abmeldung)");
        Ok(())
    }

    /// Laedt den Benutzer zu einer authentifizierten ID
    pub async fn benutzer_laden(&self, benutzer_id: i64) -> AuthResult<BenutzerRecord> {
        self.user_repo
            .laden(benutzer_id)
            .await?
            .ok_or(AuthError::BenutzerNichtGefunden(benutzer_id))
    }
}
