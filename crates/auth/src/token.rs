//! Signierte Access- und Refresh-Tokens (HS256)
//!
//! Kompaktes Format `header.payload.signatur`. Beide Token-Arten tragen
//! eine signierte Art-Diskriminante (`kind`), damit ein Refresh-Token nicht
//! als Access-Token durchgeht und umgekehrt.
//!
//! Pruefreihenfolge: Algorithmus, Signatur, Payload-Schema, Ablauf, Art.
//! Ein abgelaufener Token mit gueltiger Signatur liefert also
//! [`AuthError::TokenAbgelaufen`], ein manipulierter immer
//! [`AuthError::TokenSignaturUngueltig`].

use std::{fmt, time::Duration};

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use chrono::Utc;
use jsonwebtoken::{
    decode, encode, errors::ErrorKind, Algorithm, DecodingKey, EncodingKey, Header, Validation,
};
use serde::{de::Error as _, Deserialize, Deserializer, Serialize};
use uuid::Uuid;

use crate::error::{AuthError, AuthResult};
use crate::konfig::AuthKonfig;

/// Der einzige akzeptierte Signaturalgorithmus
const ALGORITHMUS: Algorithm = Algorithm::HS256;

/// Art eines Tokens
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenArt {
    Access,
    Refresh,
}

impl fmt::Display for TokenArt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Access => write!(f, "access"),
            Self::Refresh => write!(f, "refresh"),
        }
    }
}

/// Payload eines Tokens
///
/// Unbekannte oder fehlende Felder fuehren beim Dekodieren zur Ablehnung.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TokenClaims {
    /// Benutzer-ID
    #[serde(deserialize_with = "subjekt_lesen")]
    pub sub: i64,
    /// Ausstellungszeitpunkt (Sekunden seit Epoche)
    pub iat: i64,
    /// Ablaufzeitpunkt (Sekunden seit Epoche)
    pub exp: i64,
    #[serde(rename = "kind")]
    pub art: TokenArt,
    /// Eindeutige Token-ID
    pub jti: String,
    /// Widerrufs-Generation des Benutzers bei Ausstellung
    #[serde(rename = "gen")]
    pub generation: u64,
}

impl TokenClaims {
    /// Verbleibende Gueltigkeit ab `jetzt` (0 wenn bereits abgelaufen)
    pub fn restlaufzeit(&self, jetzt: i64) -> Duration {
        Duration::from_secs(u64::try_from(self.exp.saturating_sub(jetzt)).unwrap_or(0))
    }
}

/// Liest die Benutzer-ID tolerant (Ganzzahl oder ganzzahliger Float)
/// und prueft den Wertebereich.
fn subjekt_lesen<'de, D>(deserializer: D) -> Result<i64, D::Error>
where
    D: Deserializer<'de>,
{
    let zahl = serde_json::Number::deserialize(deserializer)?;

    let wert = match zahl.as_i64() {
        Some(v) => Some(v),
        None => zahl.as_f64().and_then(|f| {
            let im_bereich = f.fract() == 0.0 && f >= 1.0 && f < i64::MAX as f64;
            im_bereich.then_some(f as i64)
        }),
    };

    match wert {
        Some(v) if v > 0 => Ok(v),
        _ => Err(D::Error::custom(format!(
            "Subjekt ausserhalb des Wertebereichs: {zahl}"
        ))),
    }
}

/// Ein frisch ausgestelltes Token-Paar
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenPaar {
    pub access_token: String,
    pub refresh_token: String,
}

/// Stellt Tokens aus und prueft sie
///
/// Haelt keinen veraenderlichen Zustand; die Pruefung ist rein eine
/// Funktion aus Token, Geheimnis und aktueller Uhrzeit.
pub struct TokenCodec {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validierung: Validation,
    access_ttl: Duration,
    refresh_ttl: Duration,
}

impl TokenCodec {
    pub fn neu(konfig: &AuthKonfig) -> Self {
        let mut validierung = Validation::new(ALGORITHMUS);
        validierung.leeway = 0;
        validierung.validate_exp = true;

        Self {
            encoding_key: EncodingKey::from_secret(&konfig.jwt_geheimnis),
            decoding_key: DecodingKey::from_secret(&konfig.jwt_geheimnis),
            validierung,
            access_ttl: konfig.access_ttl,
            refresh_ttl: konfig.refresh_ttl,
        }
    }

    /// Stellt ein neues Access-/Refresh-Paar fuer einen Benutzer aus
    pub fn paar_ausstellen(&self, subjekt: i64, generation: u64) -> AuthResult<TokenPaar> {
        self.paar_ausstellen_zu(subjekt, generation, Utc::now().timestamp())
    }

    pub(crate) fn paar_ausstellen_zu(
        &self,
        subjekt: i64,
        generation: u64,
        jetzt: i64,
    ) -> AuthResult<TokenPaar> {
        let access = self.claims(subjekt, generation, TokenArt::Access, jetzt);
        let refresh = self.claims(subjekt, generation, TokenArt::Refresh, jetzt);

        Ok(TokenPaar {
            access_token: self.signieren(&access)?,
            refresh_token: self.signieren(&refresh)?,
        })
    }

    fn claims(&self, subjekt: i64, generation: u64, art: TokenArt, jetzt: i64) -> TokenClaims {
        let ttl = match art {
            TokenArt::Access => self.access_ttl,
            TokenArt::Refresh => self.refresh_ttl,
        };
        let ttl_sekunden = i64::try_from(ttl.as_secs()).unwrap_or(i64::MAX);

        TokenClaims {
            sub: subjekt,
            iat: jetzt,
            exp: jetzt.saturating_add(ttl_sekunden),
            art,
            jti: Uuid::new_v4().to_string(),
            generation,
        }
    }

    fn signieren(&self, claims: &TokenClaims) -> AuthResult<String> {
        encode(&Header::new(ALGORITHMUS), claims, &self.encoding_key)
            .map_err(|e| AuthError::TokenSignieren(e.to_string()))
    }

    /// Prueft einen Token und verlangt die angegebene Art
    pub fn pruefen(&self, token: &str, erwartet: TokenArt) -> AuthResult<TokenClaims> {
        let claims = decode::<TokenClaims>(token, &self.decoding_key, &self.validierung)
            .map_err(|e| match e.kind() {
                ErrorKind::ExpiredSignature => AuthError::TokenAbgelaufen,
                ErrorKind::InvalidSignature => AuthError::TokenSignaturUngueltig,
                ErrorKind::InvalidAlgorithm | ErrorKind::InvalidAlgorithmName => {
                    AuthError::TokenAlgorithmusUnerwartet
                }
                // z.B. "none": jsonwebtoken scheitert schon am Header
                _ if header_algorithmus(token).is_some_and(|alg| alg != "HS256") => {
                    AuthError::TokenAlgorithmusUnerwartet
                }
                _ => AuthError::TokenUngueltig(e.to_string()),
            })?
            .claims;

        if claims.art != erwartet {
            return Err(AuthError::TokenArtFalsch {
                erwartet,
                erhalten: claims.art,
            });
        }

        Ok(claims)
    }
}

/// Liest das `alg`-Feld direkt aus dem Header-Segment
fn header_algorithmus(token: &str) -> Option<String> {
    let (header, _) = token.split_once('.')?;
    let bytes = URL_SAFE_NO_PAD.decode(header.trim_end_matches('=')).ok()?;
    let wert: serde_json::Value = serde_json::from_slice(&bytes).ok()?;
    wert.get("alg")?.as_str().map(str::to_string)
}
