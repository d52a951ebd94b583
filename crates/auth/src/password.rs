//! Passwort-Hashing mit Argon2id
//!
//! Der PHC-String enthaelt Algorithmus, Parameter und Salt. Die
//! Verifikation liest die Parameter aus dem Hash, ein spaeter geaenderter
//! Arbeitsfaktor macht alte Hashes also nicht ungueltig.

use argon2::{
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Algorithm, Argon2, Params, Version,
};
use rand::rngs::OsRng;

use crate::error::{AuthError, AuthResult};
use crate::konfig::PasswortParameter;

fn argon2_instanz(parameter: &PasswortParameter) -> AuthResult<Argon2<'static>> {
    let params = Params::new(
        parameter.speicher_kib,
        parameter.iterationen,
        parameter.parallelitaet,
        None, // output_len: Standard (32 Bytes)
    )
    .map_err(|e| AuthError::PasswortHashing(format!("Ungueltige Argon2-Parameter: {e}")))?;

    Ok(Argon2::new(Algorithm::Argon2id, Version::V0x13, params))
}

/// Hasht ein Passwort mit Argon2id und einem zufaelligen Salt
///
/// Gibt den PHC-String zurueck (inkl. Algorithmus, Parameter und Salt).
pub fn passwort_hashen(passwort: &str, parameter: &PasswortParameter) -> AuthResult<String> {
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = argon2_instanz(parameter)?;

    argon2
        .hash_password(passwort.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| AuthError::PasswortHashing(e.to_string()))
}

/// Verifiziert ein Passwort gegen einen gespeicherten PHC-Hash
///
/// Ein falsches Passwort ist `Ok(false)`, kein Fehler. Nur ein kaputter
/// Hash oder ein Ressourcenproblem liefert `Err`.
pub fn passwort_verifizieren(passwort: &str, hash: &str) -> AuthResult<bool> {
    let parsed_hash = PasswordHash::new(hash)
        .map_err(|e| AuthError::PasswortHashing(format!("Ungueltiges Hash-Format: {e}")))?;

    match Argon2::default().verify_password(passwort.as_bytes(), &parsed_hash) {
        Ok(()) => Ok(true),
        Err(argon2::password_hash::Error::Password) => Ok(false),
        Err(e) => Err(AuthError::PasswortHashing(e.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn schnell() -> PasswortParameter {
        PasswortParameter {
            speicher_kib: 8,
            iterationen: 1,
            parallelitaet: 1,
        }
    }

    #[test]
    fn passwort_hashen_und_verifizieren() {
        let passwort = "sicheres_passwort_123!";
        let hash = passwort_hashen(passwort, &schnell()).expect("Hashing fehlgeschlagen");

        assert!(
            hash.starts_with("$argon2id$"),
            "Hash muss mit $argon2id$ beginnen"
        );

        let korrekt = passwort_verifizieren(passwort, &hash).expect("Verifikation fehlgeschlagen");
        assert!(korrekt, "Passwort muss korrekt verifiziert werden");
    }

    #[test]
    fn falsches_passwort_wird_abgelehnt() {
        let hash = passwort_hashen("pw1", &schnell()).unwrap();
        let korrekt = passwort_verifizieren("pw2", &hash).expect("Verifikation fehlgeschlagen");
        assert!(!korrekt, "Falsches Passwort muss abgelehnt werden");
    }

    #[test]
    fn gleiche_passwoerter_unterschiedliche_hashes() {
        let hash1 = passwort_hashen("gleich", &schnell()).unwrap();
        let hash2 = passwort_hashen("gleich", &schnell()).unwrap();
        assert_ne!(hash1, hash2, "Salt muss pro Aufruf neu sein");
    }

    #[test]
    fn standard_parameter_stehen_im_hash() {
        let hash = passwort_hashen("pw", &PasswortParameter::default()).unwrap();
        assert!(hash.contains("m=19456,t=2,p=1"), "unerwarteter Hash: {hash}");
        assert!(passwort_verifizieren("pw", &hash).unwrap());
    }

    #[test]
    fn ungueltige_parameter_geben_fehler() {
        let kaputt = PasswortParameter {
            speicher_kib: 0,
            iterationen: 0,
            parallelitaet: 0,
        };
        assert!(matches!(
            passwort_hashen("pw", &kaputt),
            Err(AuthError::PasswortHashing(_))
        ));
    }

    #[test]
    fn ungueltiges_hash_format_gibt_fehler() {
        let ergebnis = passwort_verifizieren("passwort", "kein_gueltiger_hash");
        assert!(
            matches!(ergebnis, Err(AuthError::PasswortHashing(_))),
            "Kaputter Hash darf nicht als falsches Passwort durchgehen"
        );
    }
}
