mod api_keys;
mod audit;
mod invites;
mod jobs;
mod login_links;
mod memories;
mod org;
mod pool;
mod schema;
mod sessions;
mod stats;
mod usage;
mod users;
mod util;
mod waitlist;

use std::path::Path;

use cc_domain::Error;
use pool::Pool;

pub use audit::AuditVerification;
pub use memories::{MemoryFtsHit, MemoryInsertOutcome};
pub use stats::AdminStats;
pub use usage::ReserveOutcome;

/// Transactional, full-text-searchable persistence layer backing the
/// whole of ContextCache. Owns every row; every other crate reaches
/// storage only through the methods exposed here.
pub struct Store {
    pool: Pool,
}

impl Store {
    pub async fn open(path: impl AsRef<Path>, pool_size: usize, busy_timeout_ms: u64, retry_backoffs_ms: &[u64]) -> Result<Self, Error> {
        let pool = Pool::open(path, pool_size, busy_timeout_ms, retry_backoffs_ms).await?;
        Ok(Self { pool })
    }

    pub async fn open_in_memory() -> Result<Self, Error> {
        let pool = Pool::open_in_memory(5000, &[100, 300]).await?;
        Ok(Self { pool })
    }
}
