use std::sync::Arc;

use cc_domain::{Error, User};
use cc_store::Store;
use rand::RngCore;

/// Issues and redeems magic-link login tokens. No mailer is wired in this
/// core — in its absence the plaintext link is logged at `info` level.
pub struct MagicLinkFlow {
    store: Arc<Store>,
    link_ttl_minutes: i64,
    session_ttl_days: i64,
    login_history_limit: usize,
    login_history_retention_days: i64,
}

pub struct RequestedLink {
    pub debug_link: String,
}

impl MagicLinkFlow {
    pub fn new(
        store: Arc<Store>,
        link_ttl_minutes: i64,
        session_ttl_days: i64,
        login_history_limit: usize,
        login_history_retention_days: i64,
    ) -> Self {
        Self { store, link_ttl_minutes, session_ttl_days, login_history_limit, login_history_retention_days }
    }

    /// Always succeeds for any syntactically valid email, whether or not a
    /// user exists yet — `verify` creates the user on first login. This
    /// avoids leaking account existence through response timing or shape.
    pub async fn request(&self, email: &str, base_url: &str) -> Result<RequestedLink, Error> {
        let email = email.trim().to_lowercase();
        if email.is_empty() || !email.contains('@') {
            return Err(Error::validation("invalid email address"));
        }
        let token = generate_token();
        self.store.insert_login_link(&email, &token, self.link_ttl_minutes).await?;
        let debug_link = format!("{base_url}/auth/verify?token={token}");
        tracing::info!(%email, link = %debug_link, "magic link issued (no mailer configured)");
        Ok(RequestedLink { debug_link })
    }

    /// Consumes `token`, creating the user on first login, and returns a
    /// new session id. A second concurrent verify of the same token fails.
    pub async fn verify(&self, token: &str, ip_address: &str) -> Result<(User, String), Error> {
        let link = self
            .store
            .get_login_link_by_token(token)
            .await?
            .ok_or_else(|| Error::AuthInvalid("login link not found".into()))?;

        if !self.store.consume_login_link(link.id).await? {
            return Err(Error::AuthInvalid("login link is expired or already used".into()));
        }

        let user = match self.store.get_user_by_email(&link.email).await? {
            Some(user) => user,
            None => self.store.insert_user(&link.email).await?,
        };
        if user.is_disabled {
            return Err(Error::AuthInvalid("user is disabled".into()));
        }

        let session_id = generate_token();
        let session = self.store.insert_session(&session_id, user.id, self.session_ttl_days).await?;

        let store = self.store.clone();
        let user_id = user.id;
        let ip = ip_address.to_string();
        let retention_days = self.login_history_retention_days;
        let history_limit = self.login_history_limit;
        tokio::spawn(async move {
            if let Err(e) = store.record_login_event(user_id, &ip, retention_days, history_limit).await {
                tracing::warn!(error = %e, "failed to record login event");
            }
        });

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
    async fn verify_creates_user_on_first_login() {
        let store = Arc::new(Store::open_in_memory().await.unwrap());
        let flow = MagicLinkFlow::new(store.clone(), 15, 30, 20, 90);
        let requested = flow.request("new@acme.test", "http://localhost:8080").await.unwrap();
        assert!(requested.debug_link.contains("token="));

        let token = requested.debug_link.split("token=").nth(1).unwrap().to_string();
        let (user, _session_id) = flow.verify(&token, "127.0.0.1").await.unwrap();
        assert_eq!(user.email, "new@acme.test");

        let second = flow.verify(&token, "127.0.0.1").await;
        assert!(second.is_err());
    }
}
