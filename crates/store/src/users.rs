use cc_domain::{Error, User};
use uuid::Uuid;

use crate::util::{opt_parse_dt, parse_dt};
use crate::Store;

impl Store {
    pub async fn insert_user(&self, email: &str) -> Result<User, Error> {
        let id = Uuid::new_v4();
        let email = email.to_string();
        let created_at = chrono::Utc::now();
        let id_str = id.to_string();
        let created_at_str = created_at.to_rfc3339();
        self.pool
            .call(move |conn| {
                conn.execute(
                    "INSERT INTO users (id, email, is_admin, is_unlimited, is_disabled, created_at, last_login_at)
                     VALUES (?1, ?2, 0, 0, 0, ?3, NULL)",
                    rusqlite::params![id_str, email, created_at_str],
                )?;
                Ok(())
            })
            .await?;
        Ok(User {
            id,
            email,
            is_admin: false,
            is_unlimited: false,
            is_disabled: false,
            created_at,
            last_login_at: None,
        })
    }

    pub async fn get_user_by_email(&self, email: &str) -> Result<Option<User>, Error> {
        let email = email.to_lowercase();
        self.pool
            .call(move |conn| {
                let mut stmt = conn.prepare(
                    "SELECT id, email, is_admin, is_unlimited, is_disabled, created_at, last_login_at
                     FROM users WHERE email = ?1",
                )?;
                let mut rows = stmt.query(rusqlite::params![email])?;
                match rows.next()? {
                    Some(row) => Ok(Some(row_to_user(row)?)),
                    None => Ok(None),
                }
            })
            .await
    }

    pub async fn get_user(&self, id: Uuid) -> Result<Option<User>, Error> {
        let id_str = id.to_string();
        self.pool
            .call(move |conn| {
                let mut stmt = conn.prepare(
                    "SELECT id, email, is_admin, is_unlimited, is_disabled, created_at, last_login_at
                     FROM users WHERE id = ?1",
                )?;
                let mut rows = stmt.query(rusqlite::params![id_str])?;
                match rows.next()? {
                    Some(row) => Ok(Some(row_to_user(row)?)),
                    None => Ok(None),
                }
            })
            .await
    }

    pub async fn touch_last_login(&self, id: Uuid) -> Result<(), Error> {
        let id_str = id.to_string();
        let now = chrono::Utc::now().to_rfc3339();
        self.pool
            .call(move |conn| {
                conn.execute(
                    "UPDATE users SET last_login_at = ?1 WHERE id = ?2",
                    rusqlite::params![now, id_str],
                )?;
                Ok(())
            })
            .await
    }

    pub async fn list_users(&self, email_q: Option<String>, limit: u32, offset: u32) -> Result<Vec<User>, Error> {
        self.pool
            .call(move |conn| {
                let mut sql = String::from(
                    "SELECT id, email, is_admin, is_unlimited, is_disabled, created_at, last_login_at FROM users WHERE 1=1",
                );
                if email_q.is_some() {
                    sql.push_str(" AND email LIKE :email_q");
                }
                sql.push_str(" ORDER BY created_at DESC LIMIT :limit OFFSET :offset");

                let mut stmt = conn.prepare(&sql)?;
                let email_pattern = email_q.as_ref().map(|q| format!("%{q}%"));
                let mut rows = stmt.query(rusqlite::named_params! {
                    ":email_q": email_pattern,
                    ":limit": limit,
                    ":offset": offset,
                })?;
                let mut out = Vec::new();
                while let Some(row) = rows.next()? {
                    out.push(row_to_user(row)?);
                }
                Ok(out)
            })
            .await
    }

    pub async fn set_unlimited(&self, id: Uuid, unlimited: bool) -> Result<(), Error> {
        let id_str = id.to_string();
        self.pool
            .call(move |conn| {
                conn.execute(
                    "UPDATE users SET is_unlimited = ?1 WHERE id = ?2",
                    rusqlite::params![unlimited as i64, id_str],
                )?;
                Ok(())
            })
            .await
    }

    pub async fn record_login_event(&self, user_id: Uuid, ip_address: &str, retention_days: i64, history_limit: usize) -> Result<(), Error> {
        let user_id_str = user_id.to_string();
        let ip = ip_address.to_string();
        let id_str = Uuid::new_v4().to_string();
        let now = chrono::Utc::now();
        let now_str = now.to_rfc3339();
        let cutoff = (now - chrono::Duration::days(retention_days)).to_rfc3339();
        self.pool
            .call(move |conn| {
                conn.execute(
                    "INSERT INTO login_events (id, user_id, ip_address, created_at) VALUES (?1, ?2, ?3, ?4)",
                    rusqlite::params![id_str, user_id_str, ip, now_str],
                )?;
                conn.execute(
                    "DELETE FROM login_events WHERE user_id = ?1 AND created_at < ?2",
                    rusqlite::params![user_id_str, cutoff],
                )?;
                conn.execute(
                    "DELETE FROM login_events WHERE user_id = ?1 AND id NOT IN (
                        SELECT id FROM login_events WHERE user_id = ?1 ORDER BY created_at DESC LIMIT ?2
                    )",
                    rusqlite::params![user_id_str, history_limit as i64],
                )?;
                Ok(())
            })
            .await
    }
}

fn row_to_user(row: &rusqlite::Row<'_>) -> rusqlite::Result<User> {
    let id_str: String = row.get(0)?;
    let created_at_str: String = row.get(5)?;
    let last_login_str: Option<String> = row.get(6)?;
    Ok(User {
        id: Uuid::parse_str(&id_str).map_err(|e| rusqlite::Error::FromSqlConversionFailure(0, rusqlite::types::Type::Text, Box::new(e)))?,
        email: row.get(1)?,
        is_admin: row.get::<_, i64>(2)? != 0,
        is_unlimited: row.get::<_, i64>(3)? != 0,
        is_disabled: row.get::<_, i64>(4)? != 0,
        created_at: parse_dt(&created_at_str)?,
        last_login_at: opt_parse_dt(last_login_str)?,
    })
}
