use std::sync::Arc;

use cc_domain::{ApiKey, Error};
use cc_store::Store;
use rand::RngCore;
use sha2::{Digest, Sha256};
use uuid::Uuid;

/// The plaintext secret is returned exactly once, at creation. Only this
/// struct ever sees it; everything downstream works off the digest.
pub struct CreatedApiKey {
    pub id: Uuid,
    pub prefix: String,
    pub plaintext_secret: String,
}

pub struct ApiKeyManager {
    store: Arc<Store>,
}

impl ApiKeyManager {
    pub fn new(store: Arc<Store>) -> Self {
        Self { store }
    }

    pub async fn create(&self, org_id: Uuid, name: &str, expires_in_days: Option<i64>) -> Result<CreatedApiKey, Error> {
        if name.is_empty() || name.chars().count() > 100 {
            return Err(Error::validation("name must be 1..100 characters"));
        }

        let mut entropy = [0u8; 32];
        rand::thread_rng().fill_bytes(&mut entropy);
        let base = hex::encode(entropy);
        let prefix = format!("cc_{}", &base[..6]);
        let plaintext_secret = format!("{prefix}_{base}");
        let hash = hex::encode(Sha256::digest(plaintext_secret.as_bytes()));
        let expires_at = expires_in_days.map(|days| chrono::Utc::now() + chrono::Duration::days(days));

        let key = self.store.insert_api_key(org_id, name, &prefix, &hash, expires_at).await?;
        Ok(CreatedApiKey { id: key.id, prefix: key.prefix, plaintext_secret })
    }

    /// Metadata only — the digest and plaintext never leave the store.
    pub async fn list(&self, org_id: Uuid) -> Result<Vec<ApiKey>, Error> {
        self.store.list_api_keys_for_org(org_id).await
    }

    pub async fn revoke(&self, org_id: Uuid, id: Uuid) -> Result<(), Error> {
        let keys = self.store.list_api_keys_for_org(org_id).await?;
        if !keys.iter().any(|k| k.id == id) {
            return Err(Error::NotFound("api key not found in this organization".into()));
        }
        self.store.revoke_api_key(id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn created_key_digest_never_equals_plaintext() {
        let store = Arc::new(Store::open_in_memory().await.unwrap());
        let org = store.insert_organization("acme").await.unwrap();
        let manager = ApiKeyManager::new(store.clone());
        let created = manager.create(org.id, "ci", None).await.unwrap();

        let stored = store.get_api_key_by_hash(&hex::encode(Sha256::digest(created.plaintext_secret.as_bytes()))).await.unwrap().unwrap();
        assert_ne!(stored.hash, created.plaintext_secret);
    }

    #[tokio::test]
    async fn list_never_exposes_hash_as_plaintext() {
        let store = Arc::new(Store::open_in_memory().await.unwrap());
        let org = store.insert_organization("acme").await.unwrap();
        let manager = ApiKeyManager::new(store.clone());
        let created = manager.create(org.id, "ci", Some(30)).await.unwrap();

        let listed = manager.list(org.id).await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_ne!(listed[0].hash, created.plaintext_secret);
    }
}
