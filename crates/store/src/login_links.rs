use cc_domain::{Error, LoginLink};
use uuid::Uuid;

use crate::util::{opt_parse_dt, parse_dt};
use crate::Store;

impl Store {
    pub async fn insert_login_link(&self, email: &str, token: &str, ttl_minutes: i64) -> Result<LoginLink, Error> {
        let id = Uuid::new_v4();
        let email = email.to_lowercase();
        let token = token.to_string();
        let expires_at = chrono::Utc::now() + chrono::Duration::minutes(ttl_minutes);
        let id_str = id.to_string();
        let email_clone = email.clone();
        let token_clone = token.clone();
        let expires_at_str = expires_at.to_rfc3339();
        self.pool
            .call(move |conn| {
                conn.execute(
                    "INSERT INTO login_links (id, email, token, expires_at, consumed_at) VALUES (?1, ?2, ?3, ?4, NULL)",
                    rusqlite::params![id_str, email_clone, token_clone, expires_at_str],
                )?;
                Ok(())
            })
            .await?;
        Ok(LoginLink { id, email, token, expires_at, consumed_at: None })
    }

    pub async fn get_login_link_by_token(&self, token: &str) -> Result<Option<LoginLink>, Error> {
        let token = token.to_string();
        self.pool
            .call(move |conn| {
                let mut stmt = conn.prepare(
                    "SELECT id, email, token, expires_at, consumed_at FROM login_links WHERE token = ?1",
                )?;
                let mut rows = stmt.query(rusqlite::params![token])?;
                match rows.next()? {
                    Some(row) => Ok(Some(row_to_link(row)?)),
                    None => Ok(None),
                }
            })
            .await
    }

    /// Atomically consumes a login link, same `BEGIN IMMEDIATE` guard
    /// pattern as `accept_invite`: the `UPDATE`'s own WHERE clause decides
    /// the winner of a concurrent double-verify race.
    pub async fn consume_login_link(&self, id: Uuid) -> Result<bool, Error> {
        let id_str = id.to_string();
        let now_str = chrono::Utc::now().to_rfc3339();
        self.pool
            .call(move |conn| {
                let tx = conn.transaction_with_behavior(rusqlite::TransactionBehavior::Immediate)?;
                let affected = tx.execute(
                    "UPDATE login_links SET consumed_at = ?1
                     WHERE id = ?2 AND consumed_at IS NULL AND expires_at > ?1",
                    rusqlite::params![now_str, id_str],
                )?;
                tx.commit()?;
                Ok(affected > 0)
            })
            .await
    }
}

fn row_to_link(row: &rusqlite::Row<'_>) -> rusqlite::Result<LoginLink> {
    let id_str: String = row.get(0)?;
    let expires_at_str: String = row.get(3)?;
    let consumed_at_str: Option<String> = row.get(4)?;
    Ok(LoginLink {
        id: Uuid::parse_str(&id_str).map_err(|e| rusqlite::Error::FromSqlConversionFailure(0, rusqlite::types::Type::Text, Box::new(e)))?,
        email: row.get(1)?,
        token: row.get(2)?,
        expires_at: parse_dt(&expires_at_str)?,
        consumed_at: opt_parse_dt(consumed_at_str)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn login_link_is_single_use() {
        let store = Store::open_in_memory().await.unwrap();
        let link = store.insert_login_link("a@acme.test", "tok1", 15).await.unwrap();
        assert!(store.consume_login_link(link.id).await.unwrap());
        assert!(!store.consume_login_link(link.id).await.unwrap());
    }

    #[tokio::test]
    async fn expired_login_link_cannot_be_consumed() {
        let store = Store::open_in_memory().await.unwrap();
        let link = store.insert_login_link("a@acme.test", "tok2", -1).await.unwrap();
        assert!(!store.consume_login_link(link.id).await.unwrap());
    }
}
