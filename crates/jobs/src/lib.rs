mod queue;
mod worker;

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::{Duration, Instant};

use cc_domain::JobsConfig;
use cc_store::Store;
use parking_lot::Mutex;
use uuid::Uuid;

use queue::Queue;

pub type JobId = Uuid;
type JobFuture = Pin<Box<dyn Future<Output = Result<(), String>> + Send>>;
pub type JobHandler = Arc<dyn Fn(serde_json::Value) -> JobFuture + Send + Sync>;

#[derive(Clone)]
struct Job {
    id: JobId,
    task: String,
    payload: serde_json::Value,
    attempt: u32,
}

/// At-most-once, retrying in-process job dispatcher. Named tasks
/// (`reindex_project`, `compute_ranking`, `purge_old_login_events`, ...)
/// are registered with a handler closure at construction; `enqueue` never
/// blocks the caller. There is no durable external queue in this core, so
/// every enqueue goes straight to the bounded in-process worker pool.
pub struct JobDispatcher {
    queue: Arc<Queue>,
    dedup: Arc<Mutex<HashMap<String, Instant>>>,
    dedup_window: Duration,
}

impl JobDispatcher {
    pub fn new(config: JobsConfig, store: Arc<Store>, handlers: HashMap<String, JobHandler>) -> Self {
        let queue = Arc::new(Queue::new(config.queue_capacity));
        let handlers = Arc::new(handlers);
        let backoffs: Vec<Duration> = config.retry_backoffs_secs.iter().map(|s| Duration::from_secs(*s)).collect();

        for worker_id in 0..config.worker_count {
            worker::spawn(worker_id, queue.clone(), handlers.clone(), backoffs.clone(), store.clone());
        }

        Self {
            queue,
            dedup: Arc::new(Mutex::new(HashMap::new())),
            dedup_window: Duration::from_secs(config.dedup_window_secs),
        }
    }

    /// Best-effort enqueue. Duplicate `(task, payload)` pairs within the
    /// dedup window are coalesced into the earlier job id; callers must not
    /// rely on exactly-once execution.
    pub fn enqueue(&self, task: &str, payload: serde_json::Value) -> JobId {
        let dedup_key = format!("{task}:{payload}");
        let now = Instant::now();
        {
            let mut dedup = self.dedup.lock();
            dedup.retain(|_, seen_at| now.duration_since(*seen_at) < self.dedup_window);
            if dedup.contains_key(&dedup_key) {
                return Uuid::nil();
            }
            dedup.insert(dedup_key, now);
        }

        let id = Uuid::new_v4();
        let job = Job { id, task: task.to_string(), payload, attempt: 0 };
        // A full queue makes room by evicting the oldest pending job rather
        // than dropping this enqueue or blocking the caller.
        if let Some(evicted) = self.queue.push(job) {
            tracing::warn!(metric = "cc_jobs_queue_overflow", %task, evicted_task = %evicted.task, "job queue full, evicted oldest pending job");
        }
        id
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn counting_handler(counter: Arc<AtomicUsize>) -> JobHandler {
        Arc::new(move |_payload| {
            let counter = counter.clone();
            Box::pin(async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(())
            })
        })
    }

    #[tokio::test]
    async fn duplicate_enqueues_within_window_are_coalesced() {
        let store = Arc::new(Store::open_in_memory().await.unwrap());
        let counter = Arc::new(AtomicUsize::new(0));
        let mut handlers: HashMap<String, JobHandler> = HashMap::new();
        handlers.insert("noop".into(), counting_handler(counter.clone()));

        let config = JobsConfig { worker_count: 1, queue_capacity: 16, dedup_window_secs: 60, retry_backoffs_secs: vec![] };
        let dispatcher = JobDispatcher::new(config, store, handlers);

        dispatcher.enqueue("noop", serde_json::json!({"project_id": "p1"}));
        dispatcher.enqueue("noop", serde_json::json!({"project_id": "p1"}));
        tokio::time::sleep(Duration::from_millis(50)).await;

        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn full_queue_evicts_oldest_pending_job_not_the_new_one() {
        let store = Arc::new(Store::open_in_memory().await.unwrap());
        let seen = Arc::new(parking_lot::Mutex::new(Vec::new()));
        let mut handlers: HashMap<String, JobHandler> = HashMap::new();
        handlers.insert("record".into(), {
            let seen = seen.clone();
            Arc::new(move |payload| {
                let seen = seen.clone();
                Box::pin(async move {
                    seen.lock().push(payload["n"].as_i64().unwrap());
                    Ok(())
                })
            })
        });

        // Zero workers: nothing drains the queue, so every enqueue lands
        // and stays until we inspect it.
        let config = JobsConfig { worker_count: 0, queue_capacity: 2, dedup_window_secs: 0, retry_backoffs_secs: vec![] };
        let dispatcher = JobDispatcher::new(config, store, handlers);

        dispatcher.enqueue("record", serde_json::json!({"n": 1}));
        dispatcher.enqueue("record", serde_json::json!({"n": 2}));
        dispatcher.enqueue("record", serde_json::json!({"n": 3}));

        let mut remaining = Vec::new();
        while let Some(job) = dispatcher.queue.pop_immediate() {
            remaining.push(job.payload["n"].as_i64().unwrap());
        }
        assert_eq!(remaining, vec![2, 3]);
    }

    #[tokio::test]
    async fn failed_job_is_recorded_after_exhausting_retries() {
        let store = Arc::new(Store::open_in_memory().await.unwrap());
        let mut handlers: HashMap<String, JobHandler> = HashMap::new();
        handlers.insert(
            "always_fails".into(),
            Arc::new(|_payload| Box::pin(async move { Err("boom".to_string()) })),
        );

        let config = JobsConfig { worker_count: 1, queue_capacity: 16, dedup_window_secs: 60, retry_backoffs_secs: vec![0, 0] };
        let dispatcher = JobDispatcher::new(config, store.clone(), handlers);
        dispatcher.enqueue("always_fails", serde_json::json!({}));

        tokio::time::sleep(Duration::from_millis(200)).await;
        assert_eq!(store.count_failed_jobs().await.unwrap(), 1);
    }
}
