use std::sync::Arc;

use cc_domain::{Error, QuotaConfig, UsageEventType};
use cc_store::{ReserveOutcome, Store};
use uuid::Uuid;

/// A held, atomically-incremented daily counter. `commit` is a no-op (the
/// increment is already durable); `rollback` undoes it if the caller's
/// business transaction failed.
pub struct Reservation {
    user_id: Uuid,
    day: String,
    event_type: UsageEventType,
}

/// Per-user daily caps with atomic check-and-increment, backed by
/// [`cc_store::Store`]'s `usage_days` table. Admins flagged
/// `is_unlimited` bypass every cap.
pub struct QuotaLedger {
    store: Arc<Store>,
    config: QuotaConfig,
}

impl QuotaLedger {
    pub fn new(store: Arc<Store>, config: QuotaConfig) -> Self {
        Self { store, config }
    }

    fn cap_for(&self, event_type: UsageEventType) -> u32 {
        match event_type {
            UsageEventType::MemoryCreated => self.config.memories_per_day,
            UsageEventType::RecallQuery => self.config.recalls_per_day,
            UsageEventType::ProjectCreated => self.config.projects_per_day,
        }
    }

    fn today() -> String {
        chrono::Utc::now().format("%Y-%m-%d").to_string()
    }

    pub async fn reserve(&self, user_id: Uuid, event_type: UsageEventType, unlimited: bool) -> Result<Reservation, Error> {
        let day = Self::today();
        let cap = self.cap_for(event_type);
        match self.store.reserve_usage(user_id, &day, event_type, cap, unlimited).await? {
            ReserveOutcome::Reserved { .. } => Ok(Reservation { user_id, day, event_type }),
            ReserveOutcome::Exceeded { .. } => Err(Error::QuotaExceeded { resource: event_type.as_str().to_string() }),
        }
    }

    /// No-op: the counter is already durable the moment `reserve` returns.
    /// Kept as an explicit call so handler code reads as a
    /// reserve -> commit-or-rollback pipeline, not an implicit side effect.
    pub fn commit(&self, _reservation: Reservation) {}

    pub async fn rollback(&self, reservation: Reservation) -> Result<(), Error> {
        self.store.rollback_usage(reservation.user_id, &reservation.day, reservation.event_type).await
    }

    pub async fn usage_today(&self, user_id: Uuid) -> Result<UsageSnapshot, Error> {
        let day = Self::today();
        let rows = self.store.list_usage_for_day(user_id, &day).await?;
        let mut snapshot = UsageSnapshot::default();
        for row in rows {
            match row.event_type {
                UsageEventType::MemoryCreated => snapshot.memories_created = row.count,
                UsageEventType::RecallQuery => snapshot.recall_queries = row.count,
                UsageEventType::ProjectCreated => snapshot.projects_created = row.count,
            }
        }
        snapshot.limits = self.config.clone();
        Ok(snapshot)
    }
}

#[derive(Debug, Default, serde::Serialize)]
pub struct UsageSnapshot {
    pub memories_created: u32,
    pub recall_queries: u32,
    pub projects_created: u32,
    pub limits: QuotaConfig,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(cap: u32) -> QuotaConfig {
        QuotaConfig { memories_per_day: cap, recalls_per_day: cap, projects_per_day: cap, timezone: "UTC".into() }
    }

    #[tokio::test]
    async fn reserve_succeeds_until_cap_then_exceeds() {
        let store = Arc::new(Store::open_in_memory().await.unwrap());
        let user = store.insert_user("a@acme.test").await.unwrap();
        let ledger = QuotaLedger::new(store, config(2));

        ledger.reserve(user.id, UsageEventType::MemoryCreated, false).await.unwrap();
        ledger.reserve(user.id, UsageEventType::MemoryCreated, false).await.unwrap();
        let err = ledger.reserve(user.id, UsageEventType::MemoryCreated, false).await.unwrap_err();
        assert!(matches!(err, Error::QuotaExceeded { .. }));
    }

    #[tokio::test]
    async fn rollback_restores_the_counter() {
        let store = Arc::new(Store::open_in_memory().await.unwrap());
        let user = store.insert_user("a@acme.test").await.unwrap();
        let ledger = QuotaLedger::new(store, config(1));

        let reservation = ledger.reserve(user.id, UsageEventType::MemoryCreated, false).await.unwrap();
        ledger.rollback(reservation).await.unwrap();

        // cap(1) was freed back up, so another reserve succeeds.
        ledger.reserve(user.id, UsageEventType::MemoryCreated, false).await.unwrap();
    }

    #[tokio::test]
    async fn unlimited_caller_bypasses_cap() {
        let store = Arc::new(Store::open_in_memory().await.unwrap());
        let user = store.insert_user("a@acme.test").await.unwrap();
        let ledger = QuotaLedger::new(store, config(1));

        ledger.reserve(user.id, UsageEventType::MemoryCreated, true).await.unwrap();
        ledger.reserve(user.id, UsageEventType::MemoryCreated, true).await.unwrap();
    }
}
