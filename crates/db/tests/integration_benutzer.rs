//! Integration-Tests fuer BenutzerRepository (In-Memory SQLite)

use passierschein_db::{BenutzerRepository, DbError, NeuerBenutzer, SqliteDb};

async fn db() -> SqliteDb {
    SqliteDb::in_memory()
        .await
        .expect("In-Memory DB konnte nicht erstellt werden")
}

#[tokio::test]
async fn benutzer_erstellen_und_laden() {
    let db = db().await;

    let user = db
        .erstellen(NeuerBenutzer {
            login: "alice",
            password_hash: "hash_alice",
        })
        .await
        .expect("Benutzer erstellen fehlgeschlagen");

    assert_eq!(user.login, "alice");
    assert!(user.id > 0);

    let geladen = db
        .laden(user.id)
        .await
        .expect("laden fehlgeschlagen")
        .expect("Benutzer sollte gefunden werden");

    assert_eq!(geladen.id, user.id);
    assert_eq!(geladen.password_hash, "hash_alice");
}

#[tokio::test]
async fn benutzer_nach_login_laden() {
    let db = db().await;

    db.erstellen(NeuerBenutzer {
        login: "bob",
        password_hash: "hash_bob",
    })
    .await
    .unwrap();

    let gefunden = db
        .laden_nach_login("bob")
        .await
        .unwrap()
        .expect("Benutzer 'bob' sollte gefunden werden");
    assert_eq!(gefunden.login, "bob");

    assert!(db.laden_nach_login("carol").await.unwrap().is_none());
}

#[tokio::test]
async fn doppelter_login_ist_eindeutigkeitsfehler() {
    let db = db().await;

    db.erstellen(NeuerBenutzer {
        login: "dave",
        password_hash: "h1",
    })
    .await
    .unwrap();

    let ergebnis = db
        .erstellen(NeuerBenutzer {
            login: "dave",
            password_hash: "h2",
        })
        .await;

    assert!(matches!(ergebnis, Err(DbError::Eindeutigkeit(_))));
}

#[tokio::test]
async fn ids_sind_fortlaufend_und_verschieden() {
    let db = db().await;

    let a = db
        .erstellen(NeuerBenutzer { login: "a", password_hash: "x" })
        .await
        .unwrap();
    let b = db
        .erstellen(NeuerBenutzer { login: "b", password_hash: "x" })
        .await
        .unwrap();

    assert_ne!(a.id, b.id);
    assert!(db.laden(a.id + b.id + 100).await.unwrap().is_none());
}
