use cc_domain::{Error, Invite};
use uuid::Uuid;

use crate::util::{opt_parse_dt, parse_dt};
use crate::Store;

impl Store {
    pub async fn insert_invite(
        &self,
        email: &str,
        token: &str,
        created_by: Uuid,
        notes: Option<String>,
        ttl_days: i64,
    ) -> Result<Invite, Error> {
        let id = Uuid::new_v4();
        let email = email.to_lowercase();
        let token = token.to_string();
        let expires_at = chrono::Utc::now() + chrono::Duration::days(ttl_days);
        let id_str = id.to_string();
        let created_by_str = created_by.to_string();
        let expires_at_str = expires_at.to_rfc3339();
        let email_clone = email.clone();
        let token_clone = token.clone();
        let notes_clone = notes.clone();
        self.pool
            .call(move |conn| {
                conn.execute(
                    "INSERT INTO invites (id, email, token, created_by, notes, expires_at, accepted_at, revoked_at)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, NULL, NULL)",
                    rusqlite::params![id_str, email_clone, token_clone, created_by_str, notes_clone, expires_at_str],
                )?;
                Ok(())
            })
            .await?;
        Ok(Invite { id, email, token, created_by, notes, expires_at, accepted_at: None, revoked_at: None })
    }

    pub async fn get_invite_by_token(&self, token: &str) -> Result<Option<Invite>, Error> {
        let token = token.to_string();
        self.pool
            .call(move |conn| {
                let mut stmt = conn.prepare(
                    "SELECT id, email, token, created_by, notes, expires_at, accepted_at, revoked_at
                     FROM invites WHERE token = ?1",
                )?;
                let mut rows = stmt.query(rusqlite::params![token])?;
                match rows.next()? {
                    Some(row) => Ok(Some(row_to_invite(row)?)),
                    None => Ok(None),
                }
            })
            .await
    }

    pub async fn list_invites(&self, status_q: Option<String>, email_q: Option<String>, limit: u32, offset: u32) -> Result<Vec<Invite>, Error> {
        self.pool
            .call(move |conn| {
                let mut sql = String::from(
                    "SELECT id, email, token, created_by, notes, expires_at, accepted_at, revoked_at FROM invites WHERE 1=1",
                );
                if email_q.is_some() {
                    sql.push_str(" AND email LIKE :email_q");
                }
                match status_q.as_deref() {
                    Some("pending") => sql.push_str(" AND accepted_at IS NULL AND revoked_at IS NULL"),
                    Some("accepted") => sql.push_str(" AND accepted_at IS NOT NULL"),
                    Some("revoked") => sql.push_str(" AND revoked_at IS NOT NULL"),
                    _ => {}
                }
                sql.push_str(" ORDER BY expires_at DESC LIMIT :limit OFFSET :offset");

                let mut stmt = conn.prepare(&sql)?;
                let email_pattern = email_q.as_ref().map(|q| format!("%{q}%"));
                let mut rows = stmt.query(rusqlite::named_params! {
                    ":email_q": email_pattern,
                    ":limit": limit,
                    ":offset": offset,
                })?;
                let mut out = Vec::new();
                while let Some(row) = rows.next()? {
                    out.push(row_to_invite(row)?);
                }
                Ok(out)
            })
            .await
    }

    /// Atomically consumes an invite: rejects if it is no longer consumable,
    /// otherwise sets `accepted_at`. `BEGIN IMMEDIATE` takes the write lock
    /// before the row is touched, so the guard condition in the `UPDATE`
    /// itself (not a preceding `SELECT`) is what decides the winner of a
    /// concurrent double-accept race.
    pub async fn accept_invite(&self, id: Uuid) -> Result<bool, Error> {
        let id_str = id.to_string();
        let now_str = chrono::Utc::now().to_rfc3339();
        self.pool
            .call(move |conn| {
                let tx = conn.transaction_with_behavior(rusqlite::TransactionBehavior::Immediate)?;
                let affected = tx.execute(
                    "UPDATE invites SET accepted_at = ?1
                     WHERE id = ?2 AND accepted_at IS NULL AND revoked_at IS NULL AND expires_at > ?1",
                    rusqlite::params![now_str, id_str],
                )?;
                tx.commit()?;
                Ok(affected > 0)
            })
            .await
    }

    pub async fn revoke_invite(&self, id: Uuid) -> Result<(), Error> {
        let id_str = id.to_string();
        let now = chrono::Utc::now().to_rfc3339();
        self.pool
            .call(move |conn| {
                conn.execute(
                    "UPDATE invites SET revoked_at = ?1 WHERE id = ?2 AND revoked_at IS NULL",
                    rusqlite::params![now, id_str],
                )?;
                Ok(())
            })
            .await
    }
}

fn row_to_invite(row: &rusqlite::Row<'_>) -> rusqlite::Result<Invite> {
    let id_str: String = row.get(0)?;
    let created_by_str: String = row.get(3)?;
    let expires_at_str: String = row.get(5)?;
    let accepted_at_str: Option<String> = row.get(6)?;
    let revoked_at_str: Option<String> = row.get(7)?;
    Ok(Invite {
        id: Uuid::parse_str(&id_str).map_err(|e| rusqlite::Error::FromSqlConversionFailure(0, rusqlite::types::Type::Text, Box::new(e)))?,
        email: row.get(1)?,
        token: row.get(2)?,
        created_by: Uuid::parse_str(&created_by_str).map_err(|e| rusqlite::Error::FromSqlConversionFailure(0, rusqlite::types::Type::Text, Box::new(e)))?,
        notes: row.get(4)?,
        expires_at: parse_dt(&expires_at_str)?,
        accepted_at: opt_parse_dt(accepted_at_str)?,
        revoked_at: opt_parse_dt(revoked_at_str)?,
    })
}
