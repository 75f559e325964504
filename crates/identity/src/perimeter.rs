use std::sync::Arc;

use cc_domain::{AuthKind, Caller, Error, OrgRole};
use cc_store::Store;
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;

/// Credential extracted from the request by the gateway, in
/// mutually-exclusive preference order (API key beats session cookie).
pub enum Credential<'a> {
    ApiKey(&'a str),
    SessionCookie(&'a str),
    Anonymous,
}

/// Resolves an incoming request's credential to an authenticated [`Caller`].
/// Holds no per-request state; safe to share behind an `Arc` across handlers.
pub struct IdentityPerimeter {
    store: Arc<Store>,
    login_history_limit: usize,
    login_history_retention_days: i64,
}

impl IdentityPerimeter {
    pub fn new(store: Arc<Store>, login_history_limit: usize, login_history_retention_days: i64) -> Self {
        Self { store, login_history_limit, login_history_retention_days }
    }

    pub async fn resolve(&self, credential: Credential<'_>, ip_address: &str) -> Result<Option<Caller>, Error> {
        match credential {
            Credential::ApiKey(secret) => self.resolve_api_key(secret).await.map(Some),
            Credential::SessionCookie(token) => self.resolve_session(token, ip_address).await.map(Some),
            Credential::Anonymous => Ok(None),
        }
    }

    /// Digests the presented secret and looks it up by digest — the
    /// plaintext secret is never retained, only ever hashed on arrival.
    async fn resolve_api_key(&self, secret: &str) -> Result<Caller, Error> {
        let provided_hash = hex::encode(Sha256::digest(secret.as_bytes()));
        let key = self
            .store
            .get_api_key_by_hash(&provided_hash)
            .await?
            .ok_or_else(|| Error::AuthInvalid("unknown api key".into()))?;

        // get_api_key_by_hash already matched on the full digest; the
        // constant-time comparison here guards against a future lookup
        // path that scans candidates rather than indexing by hash.
        if !bool::from(provided_hash.as_bytes().ct_eq(key.hash.as_bytes())) {
            return Err(Error::AuthInvalid("api key mismatch".into()));
        }

        if key.revoked_at.is_some() {
            return Err(Error::AuthInvalid("api key revoked".into()));
        }
        if let Some(expires_at) = key.expires_at {
            if expires_at < chrono::Utc::now() {
                return Err(Error::AuthInvalid("api key expired".into()));
            }
        }

        let store = self.store.clone();
        let key_id = key.id;
        tokio::spawn(async move {
            if let Err(e) = store.touch_api_key_last_used(key_id).await {
                tracing::warn!(error = %e, "failed to record api key last_used_at");
            }
        });

        let user = self.org_service_user(key.org_id).await?;
        Ok(Caller {
            user,
            org_id: Some(key.org_id),
            auth_kind: AuthKind::ApiKey,
            is_admin: false,
            is_unlimited: false,
        })
    }

    async fn resolve_session(&self, token: &str, ip_address: &str) -> Result<Caller, Error> {
        let session = self
            .store
            .get_session(token)
            .await?
            .ok_or_else(|| Error::AuthInvalid("unknown session".into()))?;

        if session.revoked_at.is_some() {
            return Err(Error::AuthInvalid("session revoked".into()));
        }
        if session.expires_at < chrono::Utc::now() {
            return Err(Error::AuthInvalid("session expired".into()));
        }

        let user = self
            .store
            .get_user(session.user_id)
            .await?
            .ok_or_else(|| Error::AuthInvalid("session references a deleted user".into()))?;
        if user.is_disabled {
            return Err(Error::AuthInvalid("user is disabled".into()));
        }

        let store = self.store.clone();
        let user_id = user.id;
        tokio::spawn(async move {
            if let Err(e) = store.touch_last_login(user_id).await {
                tracing::warn!(error = %e, "failed to refresh last_login_at");
            }
        });

        let store = self.store.clone();
        let ip = ip_address.to_string();
        let retention_days = self.login_history_retention_days;
        let history_limit = self.login_history_limit;
        tokio::spawn(async move {
            if let Err(e) = store.record_login_event(user_id, &ip, retention_days, history_limit).await {
                tracing::warn!(error = %e, "failed to record login event");
            }
        });

        Ok(Caller {
            is_admin: user.is_admin,
            is_unlimited: user.is_unlimited,
            user,
            org_id: None,
            auth_kind: AuthKind::Session,
        })
    }

    /// API keys are org-scoped credentials with no individual human behind
    /// them. Requests authenticated this way are attributed to a lazily
    /// created, disabled-for-login "service user" per org so that
    /// `Memory.created_by` and audit actors still resolve to a stable id.
    async fn org_service_user(&self, org_id: uuid::Uuid) -> Result<cc_domain::User, Error> {
        let email = format!("org-{org_id}@apikeys.contextcache.internal");
        if let Some(existing) = self.store.get_user_by_email(&email).await? {
            return Ok(existing);
        }
        self.store.insert_user(&email).await
    }

    /// Verifies that `user_id` belongs to `org_id`, returning its role.
    pub async fn require_org_membership(&self, user_id: uuid::Uuid, org_id: uuid::Uuid) -> Result<OrgRole, Error> {
        self.store
            .get_membership(user_id, org_id)
            .await?
            .map(|m| m.role)
            .ok_or_else(|| Error::Forbidden("not a member of this organization".into()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn unknown_api_key_is_auth_invalid() {
        let store = Arc::new(Store::open_in_memory().await.unwrap());
        let perimeter = IdentityPerimeter::new(store, 20, 90);
        let err = perimeter.resolve_api_key("nonexistent-secret").await.unwrap_err();
        assert!(matches!(err, Error::AuthInvalid(_)));
    }

    #[tokio::test]
    async fn revoked_api_key_is_rejected() {
        let store = Arc::new(Store::open_in_memory().await.unwrap());
        let org = store.insert_organization("acme").await.unwrap();
        let secret = "cc_testsecret";
        let hash = hex::encode(Sha256::digest(secret.as_bytes()));
        let key = store.insert_api_key(org.id, "ci", "cc", &hash, None).await.unwrap();
        store.revoke_api_key(key.id).await.unwrap();

        let perimeter = IdentityPerimeter::new(store, 20, 90);
        let err = perimeter.resolve_api_key(secret).await.unwrap_err();
        assert!(matches!(err, Error::AuthInvalid(_)));
    }

    #[tokio::test]
    async fn valid_api_key_resolves_to_org_scoped_caller() {
        let store = Arc::new(Store::open_in_memory().await.unwrap());
        let org = store.insert_organization("acme").await.unwrap();
        let secret = "cc_testsecret2";
        let hash = hex::encode(Sha256::digest(secret.as_bytes()));
        store.insert_api_key(org.id, "ci", "cc", &hash, None).await.unwrap();

        let perimeter = IdentityPerimeter::new(store, 20, 90);
        let caller = perimeter.resolve_api_key(secret).await.unwrap();
        assert_eq!(caller.org_id, Some(org.id));
        assert_eq!(caller.auth_kind, AuthKind::ApiKey);
    }
}
