use cc_domain::Error;
use uuid::Uuid;

use crate::Store;

impl Store {
    /// Records a job that exhausted its retry budget. Purely diagnostic —
    /// the dispatcher does not replay from this table.
    pub async fn record_failed_job(&self, task: &str, payload: &str, attempts: u32, last_error: &str) -> Result<(), Error> {
        let id = Uuid::new_v4().to_string();
        let task = task.to_string();
        let payload = payload.to_string();
        let last_error = last_error.to_string();
        let failed_at = chrono::Utc::now().to_rfc3339();
        self.pool
            .call(move |conn| {
                conn.execute(
                    "INSERT INTO failed_jobs (id, task, payload, attempts, last_error, failed_at)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                    rusqlite::params![id, task, payload, attempts, last_error, failed_at],
                )?;
                Ok(())
            })
            .await
    }

    pub async fn count_failed_jobs(&self) -> Result<u64, Error> {
        self.pool
            .call(|conn| conn.query_row("SELECT COUNT(*) FROM failed_jobs", [], |r| r.get::<_, i64>(0)).map(|v| v as u64))
            .await
    }
}
