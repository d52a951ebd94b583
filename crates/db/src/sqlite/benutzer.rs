//! SQLite-Implementierung des BenutzerRepository

use async_trait::async_trait;
use chrono::Utc;

use crate::error::{DbError, DbResult};
use crate::models::{BenutzerRecord, NeuerBenutzer};
use crate::repository::BenutzerRepository;
use crate::sqlite::pool::SqliteDb;

#[async_trait]
impl BenutzerRepository for SqliteDb {
    async fn erstellen(&self, daten: NeuerBenutzer<'_>) -> DbResult<BenutzerRecord> {
        let now = Utc::now();

        let ergebnis = sqlx::query(
            "INSERT INTO benutzer (login, password_hash, created_at) VALUES (?, ?, ?)",
        )
        .bind(daten.login)
        .bind(daten.password_hash)
        .bind(now.to_rfc3339())
        .execute(&self.pool)
        .await
        .map_err(|e| {
            let fehler = DbError::Sqlx(e);
            if fehler.ist_eindeutigkeit() {
                DbError::Eindeutigkeit(format!("Login '{}' bereits vergeben", daten.login))
            } else {
                fehler
            }
        })?;

        let record = BenutzerRecord {
            id: ergebnis.last_insert_rowid(),
            login: daten.login.to_string(),
            password_hash: daten.password_hash.to_string(),
            created_at: now,
        };
        tracing::debug!(id = record.id, login = %record.login, "Benutzer angelegt");
        Ok(record)
    }

    async fn laden(&self, id: i64) -> DbResult<Option<BenutzerRecord>> {
        let row = sqlx::query(
            "SELECT id, login, password_hash, created_at FROM benutzer WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(|r| row_to_benutzer(&r)).transpose()
    }

    async fn laden_nach_login(&self, login: &str) -> DbResult<Option<BenutzerRecord>> {
        let row = sqlx::query(
            "SELECT id, login, password_hash, created_at FROM benutzer WHERE login = ?",
        )
        .bind(login)
        .fetch_optional(&self.pool)
        .await?;

        row.map(|r| row_to_benutzer(&r)).transpose()
    }
}

fn row_to_benutzer(row: &sqlx::sqlite::SqliteRow) -> DbResult<BenutzerRecord> {
    use sqlx::Row as _;

    let created_at_str: String = row.try_get("created_at")?;
    let created_at = chrono::DateTime::parse_from_rfc3339(&created_at_str)
        .map_err(|e| DbError::intern(format!("Ungueltige created_at '{created_at_str}': {e}")))?
        .with_timezone(&Utc);

    Ok(BenutzerRecord {
        id: row.try_get("id")?,
        login: row.try_get("login")?,
        password_hash: row.try_get("password_hash")?,
        created_at,
    })
}
