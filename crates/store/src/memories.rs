use std::collections::BTreeMap;

use cc_domain::{Error, Memory, MemorySource, MemoryType};
use uuid::Uuid;

use crate::util::parse_dt;
use crate::Store;

pub struct MemoryInsertOutcome {
    pub memory: Memory,
    /// `false` when an existing row with the same `(project_id, content_hash)` was returned instead.
    pub inserted: bool,
}

pub struct MemoryFtsHit {
    pub memory: Memory,
    pub rank_score: f64,
}

#[allow(clippy::too_many_arguments)]
impl Store {
    pub async fn insert_memory(
        &self,
        project_id: Uuid,
        kind: MemoryType,
        source: MemorySource,
        title: Option<String>,
        content: String,
        tags: Vec<String>,
        metadata: BTreeMap<String, String>,
        content_hash: String,
        created_by: Uuid,
    ) -> Result<MemoryInsertOutcome, Error> {
        if let Some(existing) = self.get_memory_by_hash(project_id, &content_hash).await? {
            return Ok(MemoryInsertOutcome { memory: existing, inserted: false });
        }

        let id = Uuid::new_v4();
        let created_at = chrono::Utc::now();
        let id_str = id.to_string();
        let project_id_str = project_id.to_string();
        let kind_str = kind.as_str().to_string();
        let source_str = source.as_str().to_string();
        let tags_json = serde_json::to_string(&tags).map_err(|e| Error::Internal(e.to_string()))?;
        let metadata_json = serde_json::to_string(&metadata).map_err(|e| Error::Internal(e.to_string()))?;
        let created_at_str = created_at.to_rfc3339();
        let created_by_str = created_by.to_string();
        let title_clone = title.clone();
        let content_clone = content.clone();
        let hash_clone = content_hash.clone();

        let insert_result = self
            .pool
            .call(move |conn| {
                conn.execute(
                    "INSERT INTO memories (id, project_id, type, source, title, content, tags, metadata, content_hash, created_at, created_by)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
                    rusqlite::params![
                        id_str, project_id_str, kind_str, source_str, title_clone, content_clone,
                        tags_json, metadata_json, hash_clone, created_at_str, created_by_str,
                    ],
                )
            })
            .await;

        match insert_result {
            Ok(_) => Ok(MemoryInsertOutcome {
                memory: Memory {
                    id,
                    project_id,
                    kind,
                    source,
                    title,
                    content,
                    tags,
                    metadata,
                    content_hash,
                    created_at,
                    created_by,
                    rank_score: None,
                },
                inserted: true,
            }),
            // A concurrent insert may have won the unique-constraint race between
            // our lookup and our insert; return that row as an idempotent hit
            // rather than surfacing the conflict.
            Err(Error::StorageUnavailable(msg)) if msg.contains("UNIQUE constraint") => {
                let existing = self
                    .get_memory_by_hash(project_id, &content_hash)
                    .await?
                    .ok_or_else(|| Error::Internal("unique violation but row not found".into()))?;
                Ok(MemoryInsertOutcome { memory: existing, inserted: false })
            }
            Err(e) => Err(e),
        }
    }

    pub async fn get_memory_by_hash(&self, project_id: Uuid, content_hash: &str) -> Result<Option<Memory>, Error> {
        let project_id_str = project_id.to_string();
        let content_hash = content_hash.to_string();
        self.pool
            .call(move |conn| {
                let mut stmt = conn.prepare(
                    "SELECT id, project_id, type, source, title, content, tags, metadata, content_hash, created_at, created_by
                     FROM memories WHERE project_id = ?1 AND content_hash = ?2",
                )?;
                let mut rows = stmt.query(rusqlite::params![project_id_str, content_hash])?;
                match rows.next()? {
                    Some(row) => Ok(Some(row_to_memory(row)?)),
                    None => Ok(None),
                }
            })
            .await
    }

    pub async fn get_memory(&self, id: Uuid) -> Result<Option<Memory>, Error> {
        let id_str = id.to_string();
        self.pool
            .call(move |conn| {
                let mut stmt = conn.prepare(
                    "SELECT id, project_id, type, source, title, content, tags, metadata, content_hash, created_at, created_by
                     FROM memories WHERE id = ?1",
                )?;
                let mut rows = stmt.query(rusqlite::params![id_str])?;
                match rows.next()? {
                    Some(row) => Ok(Some(row_to_memory(row)?)),
                    None => Ok(None),
                }
            })
            .await
    }

    pub async fn list_memories(&self, project_id: Uuid, limit: u32, offset: u32) -> Result<Vec<Memory>, Error> {
        let project_id_str = project_id.to_string();
        self.pool
            .call(move |conn| {
                let mut stmt = conn.prepare(
                    "SELECT id, project_id, type, source, title, content, tags, metadata, content_hash, created_at, created_by
                     FROM memories WHERE project_id = ?1 ORDER BY created_at DESC LIMIT ?2 OFFSET ?3",
                )?;
                let mut rows = stmt.query(rusqlite::params![project_id_str, limit, offset])?;
                let mut out = Vec::new();
                while let Some(row) = rows.next()? {
                    out.push(row_to_memory(row)?);
                }
                Ok(out)
            })
            .await
    }

    /// Recency-ordered rows, used both for the empty-query recall path and
    /// for topping up an FTS result that came back short of `limit`.
    pub async fn list_recent_memories(&self, project_id: Uuid, limit: u32) -> Result<Vec<Memory>, Error> {
        self.list_memories(project_id, limit, 0).await
    }

    /// Runs the FTS5 MATCH query against `memories_fts`, scoped to
    /// `project_id`. Rows where SQLite's `bm25()` would score zero affinity
    /// never match in the first place, so every returned row already has a
    /// positive `rank_score`.
    pub async fn fts_search_memories(&self, project_id: Uuid, query: &str, limit: u32) -> Result<Vec<MemoryFtsHit>, Error> {
        let project_id_str = project_id.to_string();
        let query = query.to_string();
        self.pool
            .call(move |conn| {
                let mut stmt = conn.prepare(
                    "SELECT m.id, m.project_id, m.type, m.source, m.title, m.content, m.tags,
                            m.metadata, m.content_hash, m.created_at, m.created_by,
                            -bm25(memories_fts) AS rank_score
                     FROM memories_fts
                     JOIN memories m ON m.rowid = memories_fts.rowid
                     WHERE memories_fts MATCH ?1 AND m.project_id = ?2
                     ORDER BY rank_score DESC
                     LIMIT ?3",
                )?;
                let mut rows = stmt.query(rusqlite::params![query, project_id_str, limit])?;
                let mut out = Vec::new();
                while let Some(row) = rows.next()? {
                    let rank_score: f64 = row.get(11)?;
                    if rank_score <= 0.0 {
                        continue;
                    }
                    out.push(MemoryFtsHit { memory: row_to_memory(row)?, rank_score });
                }
                Ok(out)
            })
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Store;

    async fn seeded() -> (Store, Uuid, Uuid) {
        let store = Store::open_in_memory().await.unwrap();
        let org = store.insert_organization("acme").await.unwrap();
        let user = store.insert_user("a@acme.test").await.unwrap();
        let project = store.insert_project(org.id, "p1").await.unwrap();
        (store, project.id, user.id)
    }

    #[tokio::test]
    async fn duplicate_content_hash_is_idempotent() {
        let (store, project_id, user_id) = seeded().await;
        let first = store
            .insert_memory(project_id, MemoryType::Note, MemorySource::Manual, None, "same note".into(), vec![], BTreeMap::new(), "hash-a".into(), user_id)
            .await
            .unwrap();
        assert!(first.inserted);

        let second = store
            .insert_memory(project_id, MemoryType::Note, MemorySource::Manual, None, "same note".into(), vec![], BTreeMap::new(), "hash-a".into(), user_id)
            .await
            .unwrap();
        assert!(!second.inserted);
        assert_eq!(first.memory.id, second.memory.id);

        let count = store.count_memories_in_project(project_id).await.unwrap();
        assert_eq!(count, 1);
    }

    #[tokio::test]
    async fn fts_search_finds_matching_rows_only() {
        let (store, project_id, user_id) = seeded().await;
        store
            .insert_memory(project_id, MemoryType::Decision, MemorySource::Manual, None, "We use Postgres, not MySQL.".into(), vec![], BTreeMap::new(), "h1".into(), user_id)
            .await
            .unwrap();
        store
            .insert_memory(project_id, MemoryType::Note, MemorySource::Manual, None, "Coffee break.".into(), vec![], BTreeMap::new(), "h2".into(), user_id)
            .await
            .unwrap();

        let hits = store.fts_search_memories(project_id, "postgres", 10).await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].memory.kind, MemoryType::Decision);
        assert!(hits[0].rank_score > 0.0);
    }

    #[tokio::test]
    async fn list_recent_orders_by_created_at_desc() {
        let (store, project_id, user_id) = seeded().await;
        store
            .insert_memory(project_id, MemoryType::Note, MemorySource::Manual, None, "first".into(), vec![], BTreeMap::new(), "h1".into(), user_id)
            .await
            .unwrap();
        store
            .insert_memory(project_id, MemoryType::Note, MemorySource::Manual, None, "second".into(), vec![], BTreeMap::new(), "h2".into(), user_id)
            .await
            .unwrap();

        let recent = store.list_recent_memories(project_id, 10).await.unwrap();
        assert_eq!(recent.len(), 2);
        assert_eq!(recent[0].content, "second");
    }
}

fn row_to_memory(row: &rusqlite::Row<'_>) -> rusqlite::Result<Memory> {
    let id_str: String = row.get(0)?;
    let project_id_str: String = row.get(1)?;
    let kind_str: String = row.get(2)?;
    let source_str: String = row.get(3)?;
    let tags_json: String = row.get(6)?;
    let metadata_json: String = row.get(7)?;
    let created_at_str: String = row.get(9)?;
    let created_by_str: String = row.get(10)?;

    let conv_err = |e: Box<dyn std::error::Error + Send + Sync>| {
        rusqlite::Error::FromSqlConversionFailure(0, rusqlite::types::Type::Text, e)
    };

    Ok(Memory {
        id: Uuid::parse_str(&id_str).map_err(|e| conv_err(Box::new(e)))?,
        project_id: Uuid::parse_str(&project_id_str).map_err(|e| conv_err(Box::new(e)))?,
        kind: kind_str.parse().map_err(|e: cc_domain::Error| conv_err(Box::new(e)))?,
        source: source_str.parse().map_err(|e: cc_domain::Error| conv_err(Box::new(e)))?,
        title: row.get(4)?,
        content: row.get(5)?,
        tags: serde_json::from_str(&tags_json).map_err(|e| conv_err(Box::new(e)))?,
        metadata: serde_json::from_str(&metadata_json).map_err(|e| conv_err(Box::new(e)))?,
        content_hash: row.get(8)?,
        created_at: parse_dt(&created_at_str)?,
        created_by: Uuid::parse_str(&created_by_str).map_err(|e| conv_err(Box::new(e)))?,
        rank_score: None,
    })
}
