use std::collections::HashSet;
use std::sync::Arc;

use cc_domain::{Error, Memory, UsageEventType};
use cc_quota::QuotaLedger;
use cc_store::Store;
use unicode_normalization::UnicodeNormalization;
use uuid::Uuid;

const MIN_LIMIT: u32 = 1;
const MAX_LIMIT: u32 = 50;

pub struct RecallEngine {
    store: Arc<Store>,
    quota: Arc<QuotaLedger>,
}

pub struct RecallResult {
    pub items: Vec<Memory>,
}

impl RecallEngine {
    pub fn new(store: Arc<Store>, quota: Arc<QuotaLedger>) -> Self {
        Self { store, quota }
    }

    /// Implements the FTS-with-recency-fallback algorithm: an empty or
    /// whitespace query skips straight to recency order; otherwise FTS5
    /// `bm25()` hits are topped up with recency rows not already present,
    /// then stable-sorted by `(rank_score DESC NULLS LAST, created_at DESC,
    /// id ASC)` and truncated to `limit`.
    pub async fn recall(
        &self,
        caller_user_id: Uuid,
        caller_org_id: Option<Uuid>,
        is_unlimited: bool,
        project_id: Uuid,
        query: &str,
        limit: u32,
    ) -> Result<RecallResult, Error> {
        let project = self
            .store
            .get_project(project_id)
            .await?
            .ok_or_else(|| Error::NotFound("project not found".into()))?;

        if let Some(org_id) = caller_org_id {
            if org_id != project.org_id {
                return Err(Error::Forbidden("project belongs to a different organization".into()));
            }
        } else if self.store.get_membership(caller_user_id, project.org_id).await?.is_none() {
            return Err(Error::Forbidden("not a member of this organization".into()));
        }

        let limit = limit.clamp(MIN_LIMIT, MAX_LIMIT);
        let normalized_query = query.trim().nfkc().collect::<String>();

        let reservation = self.quota.reserve(caller_user_id, UsageEventType::RecallQuery, is_unlimited).await?;

        let result = self.fetch_items(project_id, &normalized_query, limit).await;

        match result {
            Ok(items) => {
                self.quota.commit(reservation);
                Ok(RecallResult { items })
            }
            Err(e) => {
                self.quota.rollback(reservation).await.ok();
                Err(e)
            }
        }
    }

    async fn fetch_items(&self, project_id: Uuid, query: &str, limit: u32) -> Result<Vec<Memory>, Error> {
        if query.is_empty() {
            return self.store.list_recent_memories(project_id, limit).await;
        }

        let hits = self.store.fts_search_memories(project_id, query, limit).await?;
        let mut seen: HashSet<Uuid> = hits.iter().map(|h| h.memory.id).collect();
        let mut items: Vec<Memory> = hits
            .into_iter()
            .map(|hit| {
                let mut memory = hit.memory;
                memory.rank_score = Some(hit.rank_score);
                memory
            })
            .collect();

        if (items.len() as u32) < limit {
            let shortfall = limit - items.len() as u32;
            // Recency rows are fetched at `limit` (not `shortfall`) since some
            // of the most-recent rows may already be present as FTS hits.
            let recent = self.store.list_recent_memories(project_id, limit).await?;
            for memory in recent {
                if items.len() as u32 >= limit {
                    break;
                }
                if seen.insert(memory.id) {
                    items.push(memory);
                }
            }
            let _ = shortfall;
        }

        items.sort_by(|a, b| {
            b.rank_score
                .partial_cmp(&a.rank_score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| b.created_at.cmp(&a.created_at))
                .then_with(|| a.id.cmp(&b.id))
        });
        items.truncate(limit as usize);
        Ok(items)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cc_domain::{MemorySource, MemoryType};
    use std::collections::BTreeMap;

    async fn harness() -> (RecallEngine, Uuid, Uuid, Uuid) {
        let store = Arc::new(Store::open_in_memory().await.unwrap());
        let org = store.insert_organization("acme").await.unwrap();
        let user = store.insert_user("a@acme.test").await.unwrap();
        let project = store.insert_project(org.id, "p1").await.unwrap();
        store.add_org_membership(user.id, org.id, cc_domain::OrgRole::Member).await.unwrap();
        let quota = Arc::new(QuotaLedger::new(store.clone(), cc_domain::Config::default().quota));
        (RecallEngine::new(store, quota), user.id, org.id, project.id)
    }

    #[tokio::test]
    async fn empty_query_returns_recency_order_with_null_rank() {
        let (engine, user_id, _org_id, project_id) = harness().await;
        engine
            .store
            .insert_memory(project_id, MemoryType::Note, MemorySource::Manual, None, "first".into(), vec![], BTreeMap::new(), "h1".into(), user_id)
            .await
            .unwrap();
        engine
            .store
            .insert_memory(project_id, MemoryType::Note, MemorySource::Manual, None, "second".into(), vec![], BTreeMap::new(), "h2".into(), user_id)
            .await
            .unwrap();

        let result = engine.recall(user_id, None, false, project_id, "   ", 10).await.unwrap();
        assert_eq!(result.items.len(), 2);
        assert_eq!(result.items[0].content, "second");
        assert!(result.items.iter().all(|m| m.rank_score.is_none()));
    }

    #[tokio::test]
    async fn matching_query_ranks_above_recency_topup() {
        let (engine, user_id, _org_id, project_id) = harness().await;
        engine
            .store
            .insert_memory(project_id, MemoryType::Decision, MemorySource::Manual, None, "We chose Postgres over MySQL.".into(), vec![], BTreeMap::new(), "h1".into(), user_id)
            .await
            .unwrap();
        engine
            .store
            .insert_memory(project_id, MemoryType::Note, MemorySource::Manual, None, "unrelated note".into(), vec![], BTreeMap::new(), "h2".into(), user_id)
            .await
            .unwrap();

        let result = engine.recall(user_id, None, false, project_id, "postgres", 10).await.unwrap();
        assert_eq!(result.items.len(), 2);
        assert!(result.items[0].content.contains("Postgres"));
        assert!(result.items[0].rank_score.is_some());
        assert!(result.items[1].rank_score.is_none());
    }

    #[tokio::test]
    async fn limit_is_clamped_to_fifty() {
        let (engine, user_id, _org_id, project_id) = harness().await;
        let result = engine.recall(user_id, None, false, project_id, "", 10_000).await.unwrap();
        assert!(result.items.is_empty());
    }

    #[tokio::test]
    async fn empty_project_returns_empty_list() {
        let (engine, user_id, _org_id, project_id) = harness().await;
        let result = engine.recall(user_id, None, false, project_id, "anything", 10).await.unwrap();
        assert!(result.items.is_empty());
    }
}
