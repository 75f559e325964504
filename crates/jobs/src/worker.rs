use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use cc_store::Store;

use crate::queue::Queue;
use crate::{Job, JobHandler};

/// Spawns one worker loop that pulls jobs off the shared queue and runs
/// them against the registered handler, retrying with the configured
/// backoff schedule before giving up and recording a failure row.
pub(crate) fn spawn(
    worker_id: usize,
    queue: Arc<Queue>,
    handlers: Arc<HashMap<String, JobHandler>>,
    backoffs: Vec<Duration>,
    store: Arc<Store>,
) {
    tokio::spawn(async move {
        loop {
            let job = queue.pop().await;
            run_job(worker_id, job, &handlers, &backoffs, &store).await;
        }
    });
}

async fn run_job(worker_id: usize, mut job: Job, handlers: &HashMap<String, JobHandler>, backoffs: &[Duration], store: &Arc<Store>) {
    let handler = match handlers.get(&job.task) {
        Some(h) => h.clone(),
        None => {
            tracing::warn!(worker_id, task = %job.task, "no handler registered for job task");
            return;
        }
    };

    loop {
        match handler(job.payload.clone()).await {
            Ok(()) => return,
            Err(err) => {
                if (job.attempt as usize) < backoffs.len() {
                    tracing::warn!(worker_id, task = %job.task, attempt = job.attempt, %err, "job failed, retrying");
                    tokio::time::sleep(backoffs[job.attempt as usize]).await;
                    job.attempt += 1;
                } else {
                    tracing::error!(worker_id, task = %job.task, %err, "job exhausted retries");
                    let payload_str = job.payload.to_string();
                    if let Err(store_err) = store.record_failed_job(&job.task, &payload_str, job.attempt + 1, &err).await {
                        tracing::error!(error = %store_err, "failed to record failed job");
                    }
                    return;
                }
            }
        }
    }
}
