use cc_domain::{Error, UsageDay, UsageEventType};
use uuid::Uuid;

use crate::Store;

pub enum ReserveOutcome {
    Reserved { count: u32 },
    Exceeded { cap: u32 },
}

impl Store {
    /// Insert-if-missing, then conditionally increment `(user_id, day,
    /// event_type)` inside a `BEGIN IMMEDIATE` transaction so the cap check
    /// and the increment are atomic with respect to concurrent reservations
    /// for the same key. Unlimited callers bypass the cap entirely but still
    /// advance the counter for `/me/usage` reporting.
    pub async fn reserve_usage(
        &self,
        user_id: Uuid,
        day: &str,
        event_type: UsageEventType,
        cap: u32,
        unlimited: bool,
    ) -> Result<ReserveOutcome, Error> {
        let user_id_str = user_id.to_string();
        let day = day.to_string();
        let event_type_str = event_type.as_str().to_string();
        self.pool
            .call(move |conn| {
                let tx = conn.transaction_with_behavior(rusqlite::TransactionBehavior::Immediate)?;
                tx.execute(
                    "INSERT INTO usage_days (user_id, day, event_type, count) VALUES (?1, ?2, ?3, 0)
                     ON CONFLICT(user_id, day, event_type) DO NOTHING",
                    rusqlite::params![user_id_str, day, event_type_str],
                )?;
                let current: i64 = tx.query_row(
                    "SELECT count FROM usage_days WHERE user_id = ?1 AND day = ?2 AND event_type = ?3",
                    rusqlite::params![user_id_str, day, event_type_str],
                    |r| r.get(0),
                )?;
                let next = current + 1;
                if !unlimited && next > cap as i64 {
                    tx.commit()?;
                    return Ok(ReserveOutcome::Exceeded { cap });
                }
                tx.execute(
                    "UPDATE usage_days SET count = ?1 WHERE user_id = ?2 AND day = ?3 AND event_type = ?4",
                    rusqlite::params![next, user_id_str, day, event_type_str],
                )?;
                tx.commit()?;
                Ok(ReserveOutcome::Reserved { count: next as u32 })
            })
            .await
    }

    /// Decrements the counter after a business-transaction failure. The
    /// counter never goes negative even under a spurious double-rollback.
    pub async fn rollback_usage(&self, user_id: Uuid, day: &str, event_type: UsageEventType) -> Result<(), Error> {
        let user_id_str = user_id.to_string();
        let day = day.to_string();
        let event_type_str = event_type.as_str().to_string();
        self.pool
            .call(move |conn| {
                conn.execute(
                    "UPDATE usage_days SET count = MAX(count - 1, 0)
                     WHERE user_id = ?1 AND day = ?2 AND event_type = ?3",
                    rusqlite::params![user_id_str, day, event_type_str],
                )?;
                Ok(())
            })
            .await
    }

    pub async fn get_usage_day(&self, user_id: Uuid, day: &str, event_type: UsageEventType) -> Result<u32, Error> {
        let user_id_str = user_id.to_string();
        let day = day.to_string();
        let event_type_str = event_type.as_str().to_string();
        self.pool
            .call(move |conn| {
                let count: Option<i64> = conn
                    .query_row(
                        "SELECT count FROM usage_days WHERE user_id = ?1 AND day = ?2 AND event_type = ?3",
                        rusqlite::params![user_id_str, day, event_type_str],
                        |r| r.get(0),
                    )
                    .ok();
                Ok(count.unwrap_or(0) as u32)
            })
            .await
    }

    pub async fn list_usage_for_day(&self, user_id: Uuid, day: &str) -> Result<Vec<UsageDay>, Error> {
        let user_id_str = user_id.to_string();
        let day = day.to_string();
        self.pool
            .call(move |conn| {
                let mut stmt = conn.prepare(
                    "SELECT user_id, day, event_type, count FROM usage_days WHERE user_id = ?1 AND day = ?2",
                )?;
                let mut rows = stmt.query(rusqlite::params![user_id_str, day])?;
                let mut out = Vec::new();
                while let Some(row) = rows.next()? {
                    let event_type_str: String = row.get(2)?;
                    out.push(UsageDay {
                        user_id,
                        day: row.get(1)?,
                        event_type: event_type_str
                            .parse()
                            .map_err(|e: cc_domain::Error| rusqlite::Error::FromSqlConversionFailure(0, rusqlite::types::Type::Text, Box::new(e)))?,
                        count: row.get::<_, i64>(3)? as u32,
                    });
                }
                Ok(out)
            })
            .await
    }
}
