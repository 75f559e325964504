use cc_domain::{Error, WaitlistEntry, WaitlistStatus};
use uuid::Uuid;

use crate::util::parse_dt;
use crate::Store;

impl Store {
    pub async fn insert_waitlist_entry(
        &self,
        email: &str,
        name: Option<String>,
        company: Option<String>,
        use_case: Option<String>,
        source: Option<String>,
    ) -> Result<WaitlistEntry, Error> {
        let id = Uuid::new_v4();
        let email = email.to_lowercase();
        let created_at = chrono::Utc::now();
        let id_str = id.to_string();
        let email_clone = email.clone();
        let name_clone = name.clone();
        let company_clone = company.clone();
        let use_case_clone = use_case.clone();
        let source_clone = source.clone();
        let created_at_str = created_at.to_rfc3339();
        self.pool
            .call(move |conn| {
                conn.execute(
                    "INSERT INTO waitlist_entries (id, email, name, company, use_case, source, status, created_at)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, 'pending', ?7)",
                    rusqlite::params![id_str, email_clone, name_clone, company_clone, use_case_clone, source_clone, created_at_str],
                )?;
                Ok(())
            })
            .await?;
        Ok(WaitlistEntry { id, email, name, company, use_case, source, status: WaitlistStatus::Pending, created_at })
    }

    pub async fn get_waitlist_entry(&self, id: Uuid) -> Result<Option<WaitlistEntry>, Error> {
        let id_str = id.to_string();
        self.pool
            .call(move |conn| {
                let mut stmt = conn.prepare(
                    "SELECT id, email, name, company, use_case, source, status, created_at
                     FROM waitlist_entries WHERE id = ?1",
                )?;
                let mut rows = stmt.query(rusqlite::params![id_str])?;
                match rows.next()? {
                    Some(row) => Ok(Some(row_to_entry(row)?)),
                    None => Ok(None),
                }
            })
            .await
    }

    pub async fn list_waitlist_entries(&self, status: Option<WaitlistStatus>) -> Result<Vec<WaitlistEntry>, Error> {
        let status_str = status.map(|s| s.as_str().to_string());
        self.pool
            .call(move |conn| {
                let mut stmt = if status_str.is_some() {
                    conn.prepare("SELECT id, email, name, company, use_case, source, status, created_at FROM waitlist_entries WHERE status = ?1 ORDER BY created_at DESC")?
                } else {
                    conn.prepare("SELECT id, email, name, company, use_case, source, status, created_at FROM waitlist_entries ORDER BY created_at DESC")?
                };
                let mut rows = if let Some(s) = &status_str {
                    stmt.query(rusqlite::params![s])?
                } else {
                    stmt.query([])?
                };
                let mut out = Vec::new();
                while let Some(row) = rows.next()? {
                    out.push(row_to_entry(row)?);
                }
                Ok(out)
            })
            .await
    }

    pub async fn set_waitlist_status(&self, id: Uuid, status: WaitlistStatus) -> Result<(), Error> {
        let id_str = id.to_string();
        let status_str = status.as_str().to_string();
        self.pool
            .call(move |conn| {
                conn.execute(
                    "UPDATE waitlist_entries SET status = ?1 WHERE id = ?2",
                    rusqlite::params![status_str, id_str],
                )?;
                Ok(())
            })
            .await
    }
}

fn row_to_entry(row: &rusqlite::Row<'_>) -> rusqlite::Result<WaitlistEntry> {
    let id_str: String = row.get(0)?;
    let status_str: String = row.get(6)?;
    let created_at_str: String = row.get(7)?;
    Ok(WaitlistEntry {
        id: Uuid::parse_str(&id_str).map_err(|e| rusqlite::Error::FromSqlConversionFailure(0, rusqlite::types::Type::Text, Box::new(e)))?,
        email: row.get(1)?,
        name: row.get(2)?,
        company: row.get(3)?,
        use_case: row.get(4)?,
        source: row.get(5)?,
        status: status_str.parse().map_err(|e: cc_domain::Error| rusqlite::Error::FromSqlConversionFailure(0, rusqlite::types::Type::Text, Box::new(e)))?,
        created_at: parse_dt(&created_at_str)?,
    })
}
