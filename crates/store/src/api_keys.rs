use cc_domain::{ApiKey, Error};
use uuid::Uuid;

use crate::util::{opt_parse_dt, parse_dt};
use crate::Store;

impl Store {
    #[allow(clippy::too_many_arguments)]
    pub async fn insert_api_key(
        &self,
        org_id: Uuid,
        name: &str,
        prefix: &str,
        hash: &str,
        expires_at: Option<chrono::DateTime<chrono::Utc>>,
    ) -> Result<ApiKey, Error> {
        let id = Uuid::new_v4();
        let created_at = chrono::Utc::now();
        let id_str = id.to_string();
        let org_id_str = org_id.to_string();
        let name = name.to_string();
        let prefix = prefix.to_string();
        let hash = hash.to_string();
        let created_at_str = created_at.to_rfc3339();
        let expires_at_str = expires_at.map(|d| d.to_rfc3339());
        self.pool
            .call(move |conn| {
                conn.execute(
                    "INSERT INTO api_keys (id, org_id, name, prefix, hash, created_at, expires_at, revoked_at, last_used_at)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, NULL, NULL)",
                    rusqlite::params![id_str, org_id_str, name, prefix, hash, created_at_str, expires_at_str],
                )?;
                Ok(())
            })
            .await?;
        Ok(ApiKey {
            id,
            org_id,
            name,
            prefix,
            hash,
            created_at,
            expires_at,
            revoked_at: None,
            last_used_at: None,
        })
    }

    pub async fn get_api_key_by_hash(&self, hash: &str) -> Result<Option<ApiKey>, Error> {
        let hash = hash.to_string();
        self.pool
            .call(move |conn| {
                let mut stmt = conn.prepare(
                    "SELECT id, org_id, name, prefix, hash, created_at, expires_at, revoked_at, last_used_at
                     FROM api_keys WHERE hash = ?1",
                )?;
                let mut rows = stmt.query(rusqlite::params![hash])?;
                match rows.next()? {
                    Some(row) => Ok(Some(row_to_api_key(row)?)),
                    None => Ok(None),
                }
            })
            .await
    }

    pub async fn list_api_keys_for_org(&self, org_id: Uuid) -> Result<Vec<ApiKey>, Error> {
        let org_id_str = org_id.to_string();
        self.pool
            .call(move |conn| {
                let mut stmt = conn.prepare(
                    "SELECT id, org_id, name, prefix, hash, created_at, expires_at, revoked_at, last_used_at
                     FROM api_keys WHERE org_id = ?1 ORDER BY created_at DESC",
                )?;
                let mut rows = stmt.query(rusqlite::params![org_id_str])?;
                let mut out = Vec::new();
                while let Some(row) = rows.next()? {
                    out.push(row_to_api_key(row)?);
                }
                Ok(out)
            })
            .await
    }

    /// Best-effort; failures are swallowed by the caller, never on the
    /// authentication critical path.
    pub async fn touch_api_key_last_used(&self, id: Uuid) -> Result<(), Error> {
        let id_str = id.to_string();
        let now = chrono::Utc::now().to_rfc3339();
        self.pool
            .call(move |conn| {
                conn.execute(
                    "UPDATE api_keys SET last_used_at = ?1 WHERE id = ?2",
                    rusqlite::params![now, id_str],
                )?;
                Ok(())
            })
            .await
    }

    pub async fn revoke_api_key(&self, id: Uuid) -> Result<(), Error> {
        let id_str = id.to_string();
        let now = chrono::Utc::now().to_rfc3339();
        self.pool
            .call(move |conn| {
                conn.execute(
                    "UPDATE api_keys SET revoked_at = ?1 WHERE id = ?2 AND revoked_at IS NULL",
                    rusqlite::params![now, id_str],
                )?;
                Ok(())
            })
            .await
    }
}

fn row_to_api_key(row: &rusqlite::Row<'_>) -> rusqlite::Result<ApiKey> {
    let id_str: String = row.get(0)?;
    let org_id_str: String = row.get(1)?;
    let created_at_str: String = row.get(5)?;
    let expires_at_str: Option<String> = row.get(6)?;
    let revoked_at_str: Option<String> = row.get(7)?;
    let last_used_at_str: Option<String> = row.get(8)?;
    Ok(ApiKey {
        id: Uuid::parse_str(&id_str).map_err(|e| rusqlite::Error::FromSqlConversionFailure(0, rusqlite::types::Type::Text, Box::new(e)))?,
        org_id: Uuid::parse_str(&org_id_str).map_err(|e| rusqlite::Error::FromSqlConversionFailure(0, rusqlite::types::Type::Text, Box::new(e)))?,
        name: row.get(2)?,
        prefix: row.get(3)?,
        hash: row.get(4)?,
        created_at: parse_dt(&created_at_str)?,
        expires_at: opt_parse_dt(expires_at_str)?,
        revoked_at: opt_parse_dt(revoked_at_str)?,
        last_used_at: opt_parse_dt(last_used_at_str)?,
    })
}
