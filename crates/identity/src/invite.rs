use std::sync::Arc;

use cc_domain::{Error, Invite, User};
use cc_store::Store;
use rand::RngCore;
use uuid::Uuid;

pub struct InviteFlow {
    store: Arc<Store>,
    invite_ttl_days: i64,
    session_ttl_days: i64,
}

impl InviteFlow {
    pub fn new(store: Arc<Store>, invite_ttl_days: i64, session_ttl_days: i64) -> Self {
        Self { store, invite_ttl_days, session_ttl_days }
    }

    pub async fn issue(&self, created_by: Uuid, email: &str, notes: Option<String>) -> Result<Invite, Error> {
        let email = email.trim().to_lowercase();
        if email.is_empty() || !email.contains('@') {
            return Err(Error::validation("invalid email address"));
        }
        let token = generate_token();
        self.store.insert_invite(&email, &token, created_by, notes, self.invite_ttl_days).await
    }

    pub async fn list(&self, status: Option<&str>, email_q: Option<&str>, limit: u32, offset: u32) -> Result<Vec<Invite>, Error> {
        self.store
            .list_invites(status.map(str::to_string), email_q.map(str::to_string), limit, offset)
            .await
    }

    pub async fn revoke(&self, id: Uuid) -> Result<(), Error> {
        self.store.revoke_invite(id).await
    }

    /// Consumes the invite named by `token`, creating the User and Session
    /// on first success. A second concurrent call on the same token sees
    /// `accept_invite` return `false` and fails with `AuthInvalid`.
    pub async fn accept(&self, token: &str) -> Result<(User, String), Error> {
        let invite = self
            .store
            .get_invite_by_token(token)
            .await?
            .ok_or_else(|| Error::AuthInvalid("invite not found".into()))?;

        if !self.store.accept_invite(invite.id).await? {
            return Err(Error::AuthInvalid("invite is expired, revoked, or already used".into()));
        }

        let user = match self.store.get_user_by_email(&invite.email).await? {
            Some(user) => user,
            None => self.store.insert_user(&invite.email).await?,
        };

        let session_id = generate_token();
        let session = self.store.insert_session(&session_id, user.id, self.session_ttl_days).await?;
        Ok((user, session.id))
    }
}

fn generate_token() -> String {
    let mut entropy = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut entropy);
    hex::encode(entropy)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn invite_is_single_use() {
        let store = Arc::new(Store::open_in_memory().await.unwrap());
        let admin = store.insert_user("admin@acme.test").await.unwrap();
        let flow = InviteFlow::new(store.clone(), 14, 30);
        let invite = flow.issue(admin.id, "new@acme.test", None).await.unwrap();

        let (user, _session_id) = flow.accept(&invite.token).await.unwrap();
        assert_eq!(user.email, "new@acme.test");

        let second = flow.accept(&invite.token).await;
        assert!(second.is_err());
    }

    #[tokio::test]
    async fn revoked_invite_cannot_be_accepted() {
        let store = Arc::new(Store::open_in_memory().await.unwrap());
        let admin = store.insert_user("admin@acme.test").await.unwrap();
        let flow = InviteFlow::new(store.clone(), 14, 30);
        let invite = flow.issue(admin.id, "new2@acme.test", None).await.unwrap();
        flow.revoke(invite.id).await.unwrap();

        let result = flow.accept(&invite.token).await;
        assert!(result.is_err());
    }
}
