use cc_domain::{Error, Session};
use uuid::Uuid;

use crate::util::{opt_parse_dt, parse_dt};
use crate::Store;

impl Store {
    pub async fn insert_session(&self, id: &str, user_id: Uuid, ttl_days: i64) -> Result<Session, Error> {
        let id = id.to_string();
        let created_at = chrono::Utc::now();
        let expires_at = created_at + chrono::Duration::days(ttl_days);
        let id_clone = id.clone();
        let user_id_str = user_id.to_string();
        let created_at_str = created_at.to_rfc3339();
        let expires_at_str = expires_at.to_rfc3339();
        self.pool
            .call(move |conn| {
                conn.execute(
                    "INSERT INTO sessions (id, user_id, created_at, expires_at, revoked_at) VALUES (?1, ?2, ?3, ?4, NULL)",
                    rusqlite::params![id_clone, user_id_str, created_at_str, expires_at_str],
                )?;
                Ok(())
            })
            .await?;
        Ok(Session { id, user_id, created_at, expires_at, revoked_at: None })
    }

    pub async fn get_session(&self, id: &str) -> Result<Option<Session>, Error> {
        let id = id.to_string();
        self.pool
            .call(move |conn| {
                let mut stmt = conn.prepare(
                    "SELECT id, user_id, created_at, expires_at, revoked_at FROM sessions WHERE id = ?1",
                )?;
                let mut rows = stmt.query(rusqlite::params![id])?;
                match rows.next()? {
                    Some(row) => Ok(Some(row_to_session(row)?)),
                    None => Ok(None),
                }
            })
            .await
    }

    pub async fn revoke_session(&self, id: &str) -> Result<(), Error> {
        let id = id.to_string();
        let now = chrono::Utc::now().to_rfc3339();
        self.pool
            .call(move |conn| {
                conn.execute(
                    "UPDATE sessions SET revoked_at = ?1 WHERE id = ?2 AND revoked_at IS NULL",
                    rusqlite::params![now, id],
                )?;
                Ok(())
            })
            .await
    }
}

fn row_to_session(row: &rusqlite::Row<'_>) -> rusqlite::Result<Session> {
    let user_id_str: String = row.get(1)?;
    let created_at_str: String = row.get(2)?;
    let expires_at_str: String = row.get(3)?;
    let revoked_at_str: Option<String> = row.get(4)?;
    Ok(Session {
        id: row.get(0)?,
        user_id: Uuid::parse_str(&user_id_str).map_err(|e| rusqlite::Error::FromSqlConversionFailure(0, rusqlite::types::Type::Text, Box::new(e)))?,
        created_at: parse_dt(&created_at_str)?,
        expires_at: parse_dt(&expires_at_str)?,
        revoked_at: opt_parse_dt(revoked_at_str)?,
    })
}
