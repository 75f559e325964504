use cc_domain::Error;

use crate::Store;

#[derive(Debug, serde::Serialize)]
pub struct AdminStats {
    pub users: u64,
    pub organizations: u64,
    pub projects: u64,
    pub memories: u64,
    pub failed_jobs: u64,
}

impl Store {
    pub async fn admin_stats(&self) -> Result<AdminStats, Error> {
        let users = self.pool.call(|conn| conn.query_row("SELECT COUNT(*) FROM users", [], |r| r.get::<_, i64>(0))).await? as u64;
        let organizations = self.pool.call(|conn| conn.query_row("SELECT COUNT(*) FROM organizations", [], |r| r.get::<_, i64>(0))).await? as u64;
        let projects = self.pool.call(|conn| conn.query_row("SELECT COUNT(*) FROM projects", [], |r| r.get::<_, i64>(0))).await? as u64;
        let memories = self.pool.call(|conn| conn.query_row("SELECT COUNT(*) FROM memories", [], |r| r.get::<_, i64>(0))).await? as u64;
        let failed_jobs = self.count_failed_jobs().await?;
        Ok(AdminStats { users, organizations, projects, memories, failed_jobs })
    }
}
