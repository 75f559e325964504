mod canonicalize;

use std::collections::BTreeMap;
use std::sync::Arc;

use cc_domain::{Error, Memory, MemoryCard, MemorySource, MemoryType, OrgRole, RECOGNIZED_METADATA_KEYS};
use cc_jobs::JobDispatcher;
use cc_quota::QuotaLedger;
use cc_store::Store;
use uuid::Uuid;

pub use canonicalize::canonicalize_content;

const MAX_TITLE_LEN: usize = 500;
const MAX_CONTENT_LEN: usize = 10_000;
const MAX_TAG_LEN: usize = 32;
const MAX_TAGS: usize = 16;

pub struct MemoryService {
    store: Arc<Store>,
    quota: Arc<QuotaLedger>,
    jobs: Arc<JobDispatcher>,
}

pub struct CreateOutcome {
    pub memory: Memory,
    /// `true` when this exact content already existed and no new row was inserted.
    pub idempotent: bool,
}

impl MemoryService {
    pub fn new(store: Arc<Store>, quota: Arc<QuotaLedger>, jobs: Arc<JobDispatcher>) -> Self {
        Self { store, quota, jobs }
    }

    pub async fn create(
        &self,
        caller_user_id: Uuid,
        caller_org_id: Option<Uuid>,
        is_unlimited: bool,
        project_id: Uuid,
        card: MemoryCard,
    ) -> Result<CreateOutcome, Error> {
        let project = self
            .store
            .get_project(project_id)
            .await?
            .ok_or_else(|| Error::NotFound("project not found".into()))?;

        if let Some(org_id) = caller_org_id {
            if org_id != project.org_id {
                return Err(Error::Forbidden("project belongs to a different organization".into()));
            }
        } else {
            self.require_membership(caller_user_id, project.org_id).await?;
        }

        let kind: MemoryType = card.kind.parse()?;
        let source: MemorySource = card.source.parse()?;
        validate_title(card.title.as_deref())?;
        validate_content(&card.content)?;
        let tags = validate_and_normalize_tags(&card.tags)?;
        let metadata = validate_and_normalize_metadata(&card.metadata)?;

        let title = card.title.map(|t| t.trim().to_string()).filter(|t| !t.is_empty());
        let content_canon = canonicalize_content(&card.content);
        let content_hash = cc_domain_hash(&content_canon);

        let reservation = self.quota.reserve(caller_user_id, cc_domain::UsageEventType::MemoryCreated, is_unlimited).await?;

        let insert_result = self
            .store
            .insert_memory(project_id, kind, source, title, content_canon, tags, metadata, content_hash, caller_user_id)
            .await;

        let outcome = match insert_result {
            Ok(outcome) => outcome,
            Err(e) => {
                self.quota.rollback(reservation).await.ok();
                return Err(e);
            }
        };
        self.quota.commit(reservation);

        if outcome.inserted {
            let mut event_data = BTreeMap::new();
            event_data.insert("memory_id".to_string(), serde_json::json!(outcome.memory.id));
            event_data.insert("type".to_string(), serde_json::json!(outcome.memory.kind.as_str()));
            // Partial failure here is a warning, not an error: the audit
            // write is the source of truth and already landed.
            if let Err(e) = self
                .store
                .append_audit_event(project_id, "memory_created", &caller_user_id.to_string(), event_data)
                .await
            {
                tracing::warn!(error = %e, "failed to append audit event for memory_created");
            }

            self.jobs.enqueue("reindex_project", serde_json::json!({ "project_id": project_id }));
        }

        Ok(CreateOutcome { memory: outcome.memory, idempotent: !outcome.inserted })
    }

    pub async fn list(&self, project_id: Uuid, limit: u32, offset: u32) -> Result<Vec<Memory>, Error> {
        if !(1..=100).contains(&limit) {
            return Err(Error::validation("limit must be between 1 and 100"));
        }
        self.store.list_memories(project_id, limit, offset).await
    }

    async fn require_membership(&self, user_id: Uuid, org_id: Uuid) -> Result<OrgRole, Error> {
        self.store
            .get_membership(user_id, org_id)
            .await?
            .map(|m| m.role)
            .ok_or_else(|| Error::Forbidden("not a member of this organization".into()))
    }
}

fn cc_domain_hash(content: &str) -> String {
    use sha2::{Digest, Sha256};
    hex::encode(Sha256::digest(content.as_bytes()))
}

fn validate_title(title: Option<&str>) -> Result<(), Error> {
    if let Some(t) = title {
        if t.chars().count() > MAX_TITLE_LEN {
            return Err(Error::validation(format!("title must be at most {MAX_TITLE_LEN} characters")));
        }
    }
    Ok(())
}

fn validate_content(content: &str) -> Result<(), Error> {
    let len = content.chars().count();
    if len == 0 || len > MAX_CONTENT_LEN {
        return Err(Error::validation(format!("content must be 1..{MAX_CONTENT_LEN} characters")));
    }
    Ok(())
}

fn validate_and_normalize_tags(tags: &[String]) -> Result<Vec<String>, Error> {
    if tags.len() > MAX_TAGS {
        return Err(Error::validation(format!("at most {MAX_TAGS} tags allowed")));
    }
    let mut out = Vec::with_capacity(tags.len());
    for tag in tags {
        let normalized = tag.trim().to_lowercase();
        if normalized.is_empty() || normalized.chars().count() > MAX_TAG_LEN {
            return Err(Error::validation(format!("each tag must be 1..{MAX_TAG_LEN} characters")));
        }
        out.push(normalized);
    }
    Ok(out)
}

fn validate_and_normalize_metadata(metadata: &BTreeMap<String, String>) -> Result<BTreeMap<String, String>, Error> {
    let mut out = BTreeMap::new();
    for (key, value) in metadata {
        if !RECOGNIZED_METADATA_KEYS.contains(&key.as_str()) {
            return Err(Error::validation(format!("unrecognized metadata key '{key}'")));
        }
        let trimmed = value.trim();
        if !trimmed.is_empty() {
            out.insert(key.clone(), trimmed.to_string());
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    async fn harness() -> (MemoryService, Uuid, Uuid) {
        let store = Arc::new(Store::open_in_memory().await.unwrap());
        let org = store.insert_organization("acme").await.unwrap();
        let user = store.insert_user("a@acme.test").await.unwrap();
        let project = store.insert_project(org.id, "p1").await.unwrap();
        store.add_org_membership(user.id, org.id, cc_domain::OrgRole::Member).await.unwrap();

        let quota = Arc::new(QuotaLedger::new(store.clone(), cc_domain::Config::default().quota));
        let jobs = Arc::new(JobDispatcher::new(cc_domain::Config::default().jobs, store.clone(), HashMap::new()));
        (MemoryService::new(store, quota, jobs), user.id, project.id)
    }

    fn card(content: &str) -> MemoryCard {
        MemoryCard { kind: "note".into(), source: "manual".into(), title: None, content: content.into(), tags: vec![], metadata: BTreeMap::new() }
    }

    #[tokio::test]
    async fn rejects_content_over_max_length() {
        let (service, user_id, project_id) = harness().await;
        let too_long = "a".repeat(10_001);
        let err = service.create(user_id, None, false, project_id, card(&too_long)).await.unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
    }

    #[tokio::test]
    async fn accepts_content_at_exactly_max_length() {
        let (service, user_id, project_id) = harness().await;
        let exact = "a".repeat(10_000);
        let result = service.create(user_id, None, false, project_id, card(&exact)).await.unwrap();
        assert!(!result.idempotent);
    }

    #[tokio::test]
    async fn duplicate_create_is_idempotent_and_flagged() {
        let (service, user_id, project_id) = harness().await;
        let first = service.create(user_id, None, false, project_id, card("same note")).await.unwrap();
        assert!(!first.idempotent);
        let second = service.create(user_id, None, false, project_id, card("same note")).await.unwrap();
        assert!(second.idempotent);
        assert_eq!(first.memory.id, second.memory.id);
    }

    #[tokio::test]
    async fn rejects_unrecognized_metadata_key() {
        let (service, user_id, project_id) = harness().await;
        let mut c = card("hello");
        c.metadata.insert("not_recognized".into(), "x".into());
        let err = service.create(user_id, None, false, project_id, c).await.unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
    }

    #[tokio::test]
    async fn tag_at_max_length_accepted_over_max_rejected() {
        let (service, user_id, project_id) = harness().await;
        let mut ok = card("hello tags ok");
        ok.tags = vec!["a".repeat(32)];
        assert!(service.create(user_id, None, false, project_id, ok).await.is_ok());

        let mut bad = card("hello tags bad");
        bad.tags = vec!["a".repeat(33)];
        let err = service.create(user_id, None, false, project_id, bad).await.unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
    }
}
