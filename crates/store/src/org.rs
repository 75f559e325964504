use cc_domain::{Error, OrgMembership, OrgRole, Organization, Project};
use uuid::Uuid;

use crate::util::parse_dt;
use crate::Store;

impl Store {
    pub async fn insert_organization(&self, name: &str) -> Result<Organization, Error> {
        let id = Uuid::new_v4();
        let name = name.to_string();
        let created_at = chrono::Utc::now();
        let id_str = id.to_string();
        let created_at_str = created_at.to_rfc3339();
        self.pool
            .call(move |conn| {
                conn.execute(
                    "INSERT INTO organizations (id, name, created_at) VALUES (?1, ?2, ?3)",
                    rusqlite::params![id_str, name, created_at_str],
                )?;
                Ok(())
            })
            .await?;
        Ok(Organization { id, name, created_at })
    }

    pub async fn add_org_membership(&self, user_id: Uuid, org_id: Uuid, role: OrgRole) -> Result<(), Error> {
        let user_id_str = user_id.to_string();
        let org_id_str = org_id.to_string();
        let role_str = role.as_str().to_string();
        self.pool
            .call(move |conn| {
                conn.execute(
                    "INSERT INTO org_memberships (user_id, org_id, role) VALUES (?1, ?2, ?3)
                     ON CONFLICT(user_id, org_id) DO UPDATE SET role = excluded.role",
                    rusqlite::params![user_id_str, org_id_str, role_str],
                )?;
                Ok(())
            })
            .await
    }

    pub async fn remove_org_membership(&self, user_id: Uuid, org_id: Uuid) -> Result<(), Error> {
        let user_id_str = user_id.to_string();
        let org_id_str = org_id.to_string();
        self.pool
            .call(move |conn| {
                conn.execute(
                    "DELETE FROM org_memberships WHERE user_id = ?1 AND org_id = ?2",
                    rusqlite::params![user_id_str, org_id_str],
                )?;
                Ok(())
            })
            .await
    }

    pub async fn get_membership(&self, user_id: Uuid, org_id: Uuid) -> Result<Option<OrgMembership>, Error> {
        let user_id_str = user_id.to_string();
        let org_id_str = org_id.to_string();
        self.pool
            .call(move |conn| {
                let mut stmt = conn.prepare(
                    "SELECT user_id, org_id, role FROM org_memberships WHERE user_id = ?1 AND org_id = ?2",
                )?;
                let mut rows = stmt.query(rusqlite::params![user_id_str, org_id_str])?;
                match rows.next()? {
                    Some(row) => Ok(Some(row_to_membership(row)?)),
                    None => Ok(None),
                }
            })
            .await
    }

    pub async fn list_memberships_for_user(&self, user_id: Uuid) -> Result<Vec<(Organization, OrgRole)>, Error> {
        let user_id_str = user_id.to_string();
        self.pool
            .call(move |conn| {
                let mut stmt = conn.prepare(
                    "SELECT o.id, o.name, o.created_at, m.role
                     FROM org_memberships m JOIN organizations o ON o.id = m.org_id
                     WHERE m.user_id = ?1",
                )?;
                let mut rows = stmt.query(rusqlite::params![user_id_str])?;
                let mut out = Vec::new();
                while let Some(row) = rows.next()? {
                    let id_str: String = row.get(0)?;
                    let created_at_str: String = row.get(2)?;
                    let role_str: String = row.get(3)?;
                    out.push((
                        Organization {
                            id: uuid_col(&id_str)?,
                            name: row.get(1)?,
                            created_at: parse_dt(&created_at_str)?,
                        },
                        role_from_sql(&role_str)?,
                    ));
                }
                Ok(out)
            })
            .await
    }

    pub async fn insert_project(&self, org_id: Uuid, name: &str) -> Result<Project, Error> {
        let id = Uuid::new_v4();
        let name = name.to_string();
        let created_at = chrono::Utc::now();
        let id_str = id.to_string();
        let org_id_str = org_id.to_string();
        let created_at_str = created_at.to_rfc3339();
        self.pool
            .call(move |conn| {
                conn.execute(
                    "INSERT INTO projects (id, org_id, name, created_at) VALUES (?1, ?2, ?3, ?4)",
                    rusqlite::params![id_str, org_id_str, name, created_at_str],
                )?;
                Ok(())
            })
            .await?;
        Ok(Project { id, org_id, name, created_at })
    }

    pub async fn get_project(&self, id: Uuid) -> Result<Option<Project>, Error> {
        let id_str = id.to_string();
        self.pool
            .call(move |conn| {
                let mut stmt = conn.prepare("SELECT id, org_id, name, created_at FROM projects WHERE id = ?1")?;
                let mut rows = stmt.query(rusqlite::params![id_str])?;
                match rows.next()? {
                    Some(row) => Ok(Some(row_to_project(row)?)),
                    None => Ok(None),
                }
            })
            .await
    }

    pub async fn list_projects_for_org(&self, org_id: Uuid) -> Result<Vec<Project>, Error> {
        let org_id_str = org_id.to_string();
        self.pool
            .call(move |conn| {
                let mut stmt = conn.prepare(
                    "SELECT id, org_id, name, created_at FROM projects WHERE org_id = ?1 ORDER BY created_at DESC",
                )?;
                let mut rows = stmt.query(rusqlite::params![org_id_str])?;
                let mut out = Vec::new();
                while let Some(row) = rows.next()? {
                    out.push(row_to_project(row)?);
                }
                Ok(out)
            })
            .await
    }

    pub async fn count_memories_in_project(&self, project_id: Uuid) -> Result<u64, Error> {
        let project_id_str = project_id.to_string();
        self.pool
            .call(move |conn| {
                conn.query_row(
                    "SELECT COUNT(*) FROM memories WHERE project_id = ?1",
                    rusqlite::params![project_id_str],
                    |r| r.get::<_, i64>(0),
                )
                .map(|v| v as u64)
            })
            .await
    }
}

fn uuid_col(s: &str) -> rusqlite::Result<Uuid> {
    Uuid::parse_str(s).map_err(|e| rusqlite::Error::FromSqlConversionFailure(0, rusqlite::types::Type::Text, Box::new(e)))
}

fn role_from_sql(s: &str) -> rusqlite::Result<OrgRole> {
    s.parse::<OrgRole>()
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(0, rusqlite::types::Type::Text, Box::new(e)))
}

fn row_to_membership(row: &rusqlite::Row<'_>) -> rusqlite::Result<OrgMembership> {
    let user_id_str: String = row.get(0)?;
    let org_id_str: String = row.get(1)?;
    let role_str: String = row.get(2)?;
    Ok(OrgMembership {
        user_id: uuid_col(&user_id_str)?,
        org_id: uuid_col(&org_id_str)?,
        role: role_from_sql(&role_str)?,
    })
}

fn row_to_project(row: &rusqlite::Row<'_>) -> rusqlite::Result<Project> {
    let id_str: String = row.get(0)?;
    let org_id_str: String = row.get(1)?;
    let created_at_str: String = row.get(3)?;
    Ok(Project {
        id: uuid_col(&id_str)?,
        org_id: uuid_col(&org_id_str)?,
        name: row.get(2)?,
        created_at: parse_dt(&created_at_str)?,
    })
}
