use std::collections::BTreeMap;

use cc_domain::{AuditEvent, Error, GENESIS_HASH};
use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::util::parse_dt;
use crate::Store;

fn digest_event(prev_hash: &str, event_data: &BTreeMap<String, serde_json::Value>, timestamp: &str, event_type: &str) -> String {
    let canonical = serde_json::to_string(event_data).expect("BTreeMap serializes deterministically");
    let mut hasher = Sha256::new();
    hasher.update(prev_hash.as_bytes());
    hasher.update(canonical.as_bytes());
    hasher.update(timestamp.as_bytes());
    hasher.update(event_type.as_bytes());
    hex::encode(hasher.finalize())
}

pub struct AuditVerification {
    /// `(seq_of_prior_event, seq_of_broken_event)` for every chain break found, in order.
    pub breaks: Vec<(i64, i64)>,
}

impl AuditVerification {
    pub fn is_intact(&self) -> bool {
        self.breaks.is_empty()
    }
}

impl Store {
    /// Appends the next event in `project_id`'s chain. Serialized by
    /// `BEGIN IMMEDIATE` so the `prev_hash` read and the insert of the new
    /// row happen without another writer interleaving a sibling event.
    pub async fn append_audit_event(
        &self,
        project_id: Uuid,
        event_type: &str,
        actor: &str,
        event_data: BTreeMap<String, serde_json::Value>,
    ) -> Result<AuditEvent, Error> {
        let id = Uuid::new_v4();
        let project_id_str = project_id.to_string();
        let event_type = event_type.to_string();
        let actor = actor.to_string();
        let timestamp = chrono::Utc::now();
        let timestamp_str = timestamp.to_rfc3339();
        let id_str = id.to_string();
        let event_data_json = serde_json::to_string(&event_data).map_err(|e| Error::Internal(e.to_string()))?;

        self.pool
            .call(move |conn| {
                let tx = conn.transaction_with_behavior(rusqlite::TransactionBehavior::Immediate)?;
                let prev: Option<(String, i64)> = tx
                    .query_row(
                        "SELECT current_hash, seq FROM audit_events WHERE project_id = ?1 ORDER BY seq DESC LIMIT 1",
                        rusqlite::params![project_id_str],
                        |r| Ok((r.get(0)?, r.get(1)?)),
                    )
                    .ok();
                let (prev_hash, next_seq) = match prev {
                    Some((hash, seq)) => (hash, seq + 1),
                    None => (GENESIS_HASH.to_string(), 0),
                };
                let current_hash = digest_event(&prev_hash, &event_data, &timestamp_str, &event_type);
                tx.execute(
                    "INSERT INTO audit_events (id, project_id, event_type, timestamp, actor, event_data, prev_hash, current_hash, seq)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
                    rusqlite::params![id_str, project_id_str, event_type, timestamp_str, actor, event_data_json, prev_hash, current_hash, next_seq],
                )?;
                tx.commit()?;
                Ok((prev_hash, current_hash))
            })
            .await
            .map(|(prev_hash, current_hash)| AuditEvent {
                id,
                project_id,
                event_type,
                timestamp,
                actor,
                event_data,
                prev_hash,
                current_hash,
            })
    }

    pub async fn list_audit_events(&self, project_id: Uuid) -> Result<Vec<AuditEvent>, Error> {
        let project_id_str = project_id.to_string();
        self.pool
            .call(move |conn| {
                let mut stmt = conn.prepare(
                    "SELECT id, project_id, event_type, timestamp, actor, event_data, prev_hash, current_hash
                     FROM audit_events WHERE project_id = ?1 ORDER BY seq ASC",
                )?;
                let mut rows = stmt.query(rusqlite::params![project_id_str])?;
                let mut out = Vec::new();
                while let Some(row) = rows.next()? {
                    out.push(row_to_event(row)?);
                }
                Ok(out)
            })
            .await
    }

    /// Replays the chain and reports every index `i` where
    /// `event[i].prev_hash != event[i-1].current_hash`.
    pub async fn verify_audit_chain(&self, project_id: Uuid) -> Result<AuditVerification, Error> {
        let events = self.list_audit_events(project_id).await?;
        let mut breaks = Vec::new();
        let mut expected_prev = GENESIS_HASH.to_string();
        for (i, event) in events.iter().enumerate() {
            if event.prev_hash != expected_prev {
                breaks.push((i as i64 - 1, i as i64));
            }
            expected_prev = event.current_hash.clone();
        }
        Ok(AuditVerification { breaks })
    }
}

fn row_to_event(row: &rusqlite::Row<'_>) -> rusqlite::Result<AuditEvent> {
    let id_str: String = row.get(0)?;
    let project_id_str: String = row.get(1)?;
    let timestamp_str: String = row.get(3)?;
    let event_data_json: String = row.get(5)?;
    Ok(AuditEvent {
        id: Uuid::parse_str(&id_str).map_err(|e| rusqlite::Error::FromSqlConversionFailure(0, rusqlite::types::Type::Text, Box::new(e)))?,
        project_id: Uuid::parse_str(&project_id_str).map_err(|e| rusqlite::Error::FromSqlConversionFailure(0, rusqlite::types::Type::Text, Box::new(e)))?,
        event_type: row.get(2)?,
        timestamp: parse_dt(&timestamp_str)?,
        actor: row.get(4)?,
        event_data: serde_json::from_str(&event_data_json).map_err(|e| rusqlite::Error::FromSqlConversionFailure(0, rusqlite::types::Type::Text, Box::new(e)))?,
        prev_hash: row.get(6)?,
        current_hash: row.get(7)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn genesis_event_uses_zero_prev_hash() {
        let store = Store::open_in_memory().await.unwrap();
        let org = store.insert_organization("acme").await.unwrap();
        let user = store.insert_user("a@acme.test").await.unwrap();
        let project = store.insert_project(org.id, "p1").await.unwrap();
        let _ = user;
        let event = store
            .append_audit_event(project.id, "memory_created", "system", BTreeMap::new())
            .await
            .unwrap();
        assert_eq!(event.prev_hash, GENESIS_HASH);
    }

    #[tokio::test]
    async fn chain_links_and_verifies_intact() {
        let store = Store::open_in_memory().await.unwrap();
        let org = store.insert_organization("acme").await.unwrap();
        let project = store.insert_project(org.id, "p1").await.unwrap();
        for i in 0..5 {
            let mut data = BTreeMap::new();
            data.insert("i".to_string(), serde_json::json!(i));
            store.append_audit_event(project.id, "memory_created", "system", data).await.unwrap();
        }
        let verification = store.verify_audit_chain(project.id).await.unwrap();
        assert!(verification.is_intact());
    }
}
