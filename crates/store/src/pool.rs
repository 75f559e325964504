use std::future::Future;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use cc_domain::Error;
use tokio::sync::Semaphore;
use tokio_rusqlite::Connection;

use crate::schema;

/// Bounded pool of SQLite connections, all pointing at the same database.
///
/// SQLite has no client/server connection concept; this models a bounded
/// connection pool as N actor-backed connections (each serialized
/// internally by `tokio_rusqlite`) plus a semaphore that caps concurrent
/// in-flight operations at the pool size. Writers still serialize at the
/// SQLite file-lock level; `busy_timeout` plus our own retry-with-backoff
/// absorb the resulting `SQLITE_BUSY` contention.
pub struct Pool {
    conns: Vec<Connection>,
    next: AtomicUsize,
    semaphore: Arc<Semaphore>,
    retry_backoffs: Vec<Duration>,
}

impl Pool {
    pub async fn open(
        path: impl AsRef<Path>,
        size: usize,
        busy_timeout_ms: u64,
        retry_backoffs_ms: &[u64],
    ) -> Result<Self, Error> {
        let path = path.as_ref();
        let mut conns = Vec::with_capacity(size.max(1));
        for _ in 0..size.max(1) {
            let conn = Connection::open(path).await?;
            schema::init(&conn, busy_timeout_ms).await?;
            conns.push(conn);
        }
        Ok(Self {
            conns,
            next: AtomicUsize::new(0),
            semaphore: Arc::new(Semaphore::new(size.max(1))),
            retry_backoffs: retry_backoffs_ms.iter().map(|ms| Duration::from_millis(*ms)).collect(),
        })
    }

    /// In-memory SQLite databases are private per-connection, so a real
    /// pool would not share data; the in-memory store is always a single
    /// connection.
    pub async fn open_in_memory(busy_timeout_ms: u64, retry_backoffs_ms: &[u64]) -> Result<Self, Error> {
        let conn = Connection::open_in_memory().await?;
        schema::init(&conn, busy_timeout_ms).await?;
        Ok(Self {
            conns: vec![conn],
            next: AtomicUsize::new(0),
            semaphore: Arc::new(Semaphore::new(1)),
            retry_backoffs: retry_backoffs_ms.iter().map(|ms| Duration::from_millis(*ms)).collect(),
        })
    }

    fn next_conn(&self) -> &Connection {
        let i = self.next.fetch_add(1, Ordering::Relaxed) % self.conns.len();
        &self.conns[i]
    }

    /// Run `f` against a pooled connection, retrying transient storage
    /// errors with the configured backoff schedule before surfacing
    /// `StorageUnavailable`.
    pub async fn call<F, T>(&self, f: F) -> Result<T, Error>
    where
        F: Fn(&rusqlite::Connection) -> rusqlite::Result<T> + Send + 'static + Clone,
        T: Send + 'static,
    {
        let _permit = self
            .semaphore
            .acquire()
            .await
            .map_err(|e| Error::Internal(e.to_string()))?;

        let mut attempt = 0usize;
        loop {
            let conn = self.next_conn().clone();
            let f = f.clone();
            match conn.call(move |c| f(c).map_err(tokio_rusqlite::Error::Rusqlite)).await {
                Ok(v) => return Ok(v),
                Err(e) if attempt < self.retry_backoffs.len() && is_retryable(&e) => {
                    tokio::time::sleep(self.retry_backoffs[attempt]).await;
                    attempt += 1;
                }
                Err(e) => return Err(Error::StorageUnavailable(e.to_string())),
            }
        }
    }

    pub fn retry_backoffs(&self) -> &[Duration] {
        &self.retry_backoffs
    }
}

fn is_retryable(err: &tokio_rusqlite::Error) -> bool {
    matches!(
        err,
        tokio_rusqlite::Error::Rusqlite(rusqlite::Error::SqliteFailure(e, _))
            if e.code == rusqlite::ErrorCode::DatabaseBusy || e.code == rusqlite::ErrorCode::DatabaseLocked
    )
}
