use std::collections::VecDeque;

use parking_lot::Mutex;
use tokio::sync::Notify;

use crate::Job;

/// FIFO queue with a fixed capacity. A full queue makes room for a new job
/// by evicting the oldest pending one rather than refusing the enqueue —
/// recent activity is worth more than activity already stale by the time
/// a worker would get to it.
pub(crate) struct Queue {
    inner: Mutex<VecDeque<Job>>,
    capacity: usize,
    notify: Notify,
}

impl Queue {
    pub(crate) fn new(capacity: usize) -> Self {
        Self { inner: Mutex::new(VecDeque::with_capacity(capacity)), capacity: capacity.max(1), notify: Notify::new() }
    }

    /// Pushes `job` onto the back of the queue, evicting and returning the
    /// oldest pending job if the queue was already at capacity.
    pub(crate) fn push(&self, job: Job) -> Option<Job> {
        let evicted = {
            let mut q = self.inner.lock();
            let evicted = if q.len() >= self.capacity { q.pop_front() } else { None };
            q.push_back(job);
            evicted
        };
        self.notify.notify_one();
        evicted
    }

    /// Removes the oldest pending job without waiting, for callers that
    /// already know whether the queue is non-empty.
    #[cfg(test)]
    pub(crate) fn pop_immediate(&self) -> Option<Job> {
        self.inner.lock().pop_front()
    }

    /// Waits for and removes the oldest pending job.
    pub(crate) async fn pop(&self) -> Job {
        loop {
            let notified = self.notify.notified();
            if let Some(job) = self.inner.lock().pop_front() {
                return job;
            }
            notified.await;
        }
    }
}
