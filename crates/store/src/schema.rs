use cc_domain::Error;
use tokio_rusqlite::Connection;

/// Applies PRAGMA tuning and the full set of `CREATE TABLE IF NOT EXISTS`
/// migrations. Safe to call on every connection in the pool and on every
/// process startup — every statement is idempotent. A failure partway
/// through aborts the whole batch (rusqlite runs `execute_batch` as one
/// multi-statement exec; a broken statement surfaces immediately).
pub(crate) async fn init(conn: &Connection, busy_timeout_ms: u64) -> Result<(), Error> {
    let sql = format!(
        "
        PRAGMA journal_mode=WAL;
        PRAGMA synchronous=NORMAL;
        PRAGMA cache_size=-64000;
        PRAGMA mmap_size=268435456;
        PRAGMA temp_store=MEMORY;
        PRAGMA busy_timeout={busy_timeout_ms};
        PRAGMA foreign_keys=ON;

        CREATE TABLE IF NOT EXISTS users (
            id              TEXT PRIMARY KEY,
            email           TEXT NOT NULL UNIQUE,
            is_admin        INTEGER NOT NULL DEFAULT 0,
            is_unlimited    INTEGER NOT NULL DEFAULT 0,
            is_disabled     INTEGER NOT NULL DEFAULT 0,
            created_at      TEXT NOT NULL,
            last_login_at   TEXT
        );

        CREATE TABLE IF NOT EXISTS organizations (
            id          TEXT PRIMARY KEY,
            name        TEXT NOT NULL,
            created_at  TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS org_memberships (
            user_id     TEXT NOT NULL REFERENCES users(id),
            org_id      TEXT NOT NULL REFERENCES organizations(id),
            role        TEXT NOT NULL,
            PRIMARY KEY (user_id, org_id)
        );

        CREATE INDEX IF NOT EXISTS idx_org_memberships_org ON org_memberships(org_id);

        CREATE TABLE IF NOT EXISTS projects (
            id          TEXT PRIMARY KEY,
            org_id      TEXT NOT NULL REFERENCES organizations(id),
            name        TEXT NOT NULL,
            created_at  TEXT NOT NULL,
            UNIQUE(org_id, name)
        );

        CREATE TABLE IF NOT EXISTS memories (
            id              TEXT PRIMARY KEY,
            project_id      TEXT NOT NULL REFERENCES projects(id),
            type            TEXT NOT NULL,
            source          TEXT NOT NULL,
            title           TEXT,
            content         TEXT NOT NULL,
            tags            TEXT NOT NULL,
            metadata        TEXT NOT NULL,
            content_hash    TEXT NOT NULL,
            created_at      TEXT NOT NULL,
            created_by      TEXT NOT NULL REFERENCES users(id),
            UNIQUE(project_id, content_hash)
        );

        CREATE INDEX IF NOT EXISTS idx_memories_project_created
            ON memories(project_id, created_at DESC);

        CREATE VIRTUAL TABLE IF NOT EXISTS memories_fts USING fts5(
            title, content, content='memories', content_rowid='rowid'
        );

        CREATE TRIGGER IF NOT EXISTS memories_ai AFTER INSERT ON memories BEGIN
            INSERT INTO memories_fts(rowid, title, content)
            VALUES (new.rowid, new.title, new.content);
        END;

        CREATE TRIGGER IF NOT EXISTS memories_ad AFTER DELETE ON memories BEGIN
            INSERT INTO memories_fts(memories_fts, rowid, title, content)
            VALUES('delete', old.rowid, old.title, old.content);
        END;

        CREATE TRIGGER IF NOT EXISTS memories_au AFTER UPDATE ON memories BEGIN
            INSERT INTO memories_fts(memories_fts, rowid, title, content)
            VALUES('delete', old.rowid, old.title, old.content);
            INSERT INTO memories_fts(rowid, title, content)
            VALUES (new.rowid, new.title, new.content);
        END;

        CREATE TABLE IF NOT EXISTS api_keys (
            id              TEXT PRIMARY KEY,
            org_id          TEXT NOT NULL REFERENCES organizations(id),
            name            TEXT NOT NULL,
            prefix          TEXT NOT NULL,
            hash            TEXT NOT NULL UNIQUE,
            created_at      TEXT NOT NULL,
            expires_at      TEXT,
            revoked_at      TEXT,
            last_used_at    TEXT
        );

        CREATE INDEX IF NOT EXISTS idx_api_keys_org_revoked ON api_keys(org_id, revoked_at);

        CREATE TABLE IF NOT EXISTS sessions (
            id          TEXT PRIMARY KEY,
            user_id     TEXT NOT NULL REFERENCES users(id),
            created_at  TEXT NOT NULL,
            expires_at  TEXT NOT NULL,
            revoked_at  TEXT
        );

        CREATE INDEX IF NOT EXISTS idx_sessions_user_expires ON sessions(user_id, expires_at);

        CREATE TABLE IF NOT EXISTS login_events (
            id          TEXT PRIMARY KEY,
            user_id     TEXT NOT NULL REFERENCES users(id),
            ip_address  TEXT NOT NULL,
            created_at  TEXT NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_login_events_user_created ON login_events(user_id, created_at DESC);

        CREATE TABLE IF NOT EXISTS invites (
            id          TEXT PRIMARY KEY,
            email       TEXT NOT NULL,
            token       TEXT NOT NULL UNIQUE,
            created_by  TEXT NOT NULL REFERENCES users(id),
            notes       TEXT,
            expires_at  TEXT NOT NULL,
            accepted_at TEXT,
            revoked_at  TEXT
        );

        CREATE INDEX IF NOT EXISTS idx_invites_email ON invites(email);

        CREATE TABLE IF NOT EXISTS login_links (
            id          TEXT PRIMARY KEY,
            email       TEXT NOT NULL,
            token       TEXT NOT NULL UNIQUE,
            expires_at  TEXT NOT NULL,
            consumed_at TEXT
        );

        CREATE INDEX IF NOT EXISTS idx_login_links_email ON login_links(email);

        CREATE TABLE IF NOT EXISTS waitlist_entries (
            id          TEXT PRIMARY KEY,
            email       TEXT NOT NULL,
            name        TEXT,
            company     TEXT,
            use_case    TEXT,
            source      TEXT,
            status      TEXT NOT NULL,
            created_at  TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS usage_days (
            user_id     TEXT NOT NULL REFERENCES users(id),
            day         TEXT NOT NULL,
            event_type  TEXT NOT NULL,
            count       INTEGER NOT NULL DEFAULT 0,
            PRIMARY KEY (user_id, day, event_type)
        );

        CREATE TABLE IF NOT EXISTS audit_events (
            id              TEXT PRIMARY KEY,
            project_id      TEXT NOT NULL REFERENCES projects(id),
            event_type      TEXT NOT NULL,
            timestamp       TEXT NOT NULL,
            actor           TEXT NOT NULL,
            event_data      TEXT NOT NULL,
            prev_hash       TEXT NOT NULL,
            current_hash    TEXT NOT NULL,
            seq             INTEGER NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_audit_events_project_seq ON audit_events(project_id, seq);

        CREATE TABLE IF NOT EXISTS failed_jobs (
            id          TEXT PRIMARY KEY,
            task        TEXT NOT NULL,
            payload     TEXT NOT NULL,
            attempts    INTEGER NOT NULL,
            last_error  TEXT NOT NULL,
            failed_at   TEXT NOT NULL
        );
        "
    );

    conn.call(move |c| c.execute_batch(&sql))
        .await
        .map_err(|e| Error::StorageUnavailable(e.to_string()))
}
