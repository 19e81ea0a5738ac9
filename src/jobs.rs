// Durable named queues layered on the KV facade. A queue is four keys:
//
//   queue:{name}:waiting   sorted set, member = job id, score = ready-at millis
//   queue:{name}:jobs      hash, job id -> serialized job body
//   queue:{name}:active    set of claimed job ids
//   queue:{name}:failed    hash of jobs that exhausted their attempts
//   queue:{name}:counters  hash, completed/failed totals
//
// Delayed jobs are simply future-scored members of the waiting set, so
// retry scheduling and the initial enqueue share one code path.

use crate::kv::{Kv, KvResult};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::sync::Semaphore;

pub const ACHIEVEMENT_QUEUE: &str = "achievement-check";
pub const STATS_SYNC_QUEUE: &str = "stats-sync";

pub const ACHIEVEMENT_CONCURRENCY: usize = 5;
pub const STATS_SYNC_CONCURRENCY: usize = 3;

const MAX_ATTEMPTS: u32 = 3;
const BACKOFF_BASE_MS: u64 = 1000;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    pub id: String,
    pub name: String,
    pub payload: serde_json::Value,
    pub attempts: u32,
    pub max_attempts: u32,
    pub created_at: String,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct QueueCounts {
    pub waiting: usize,
    pub active: usize,
    pub completed: usize,
    pub failed: usize,
    pub delayed: usize,
}

#[derive(Clone)]
pub struct JobQueue {
    kv: Kv,
    name: String,
}

impl JobQueue {
    pub fn new(kv: Kv, name: &str) -> Self {
        JobQueue {
            kv,
            name: name.to_string(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    fn key(&self, part: &str) -> String {
        format!("queue:{}:{}", self.name, part)
    }

    pub fn enqueue(&self, payload: serde_json::Value) -> KvResult<String> {
        self.enqueue_delayed(payload, 0)
    }

    pub fn enqueue_delayed(&self, payload: serde_json::Value, delay_ms: u64) -> KvResult<String> {
        let job = Job {
            id: uuid::Uuid::new_v4().to_string(),
            name: self.name.clone(),
            payload,
            attempts: 0,
            max_attempts: MAX_ATTEMPTS,
            created_at: chrono::Utc::now().to_rfc3339(),
        };
        self.push(&job, delay_ms)?;
        Ok(job.id)
    }

    fn push(&self, job: &Job, delay_ms: u64) -> KvResult<()> {
        let body = serde_json::to_string(job).unwrap_or_default();
        self.kv.hset(&self.key("jobs"), &job.id, &body)?;
        let ready_at = now_ms() + delay_ms as f64;
        self.kv.zadd(&self.key("waiting"), &job.id, ready_at)
    }

    /// Claim the next ready job, moving it to the active set. Returns
    /// `None` when nothing is ready.
    pub fn claim(&self) -> KvResult<Option<Job>> {
        let Some((id, _)) = self.kv.zpop_ready(&self.key("waiting"), now_ms())? else {
            return Ok(None);
        };
        let Some(body) = self.kv.hget(&self.key("jobs"), &id)? else {
            // Body lost; nothing to run.
            return Ok(None);
        };
        let Ok(job) = serde_json::from_str::<Job>(&body) else {
            self.kv.hdel(&self.key("jobs"), &id)?;
            return Ok(None);
        };
        self.kv.sadd(&self.key("active"), &id)?;
        Ok(Some(job))
    }

    /// Successful jobs are removed entirely; only the counter remains.
    pub fn complete(&self, job: &Job) -> KvResult<()> {
        self.kv.srem(&self.key("active"), &job.id)?;
        self.kv.hdel(&self.key("jobs"), &job.id)?;
        self.kv.hincrby(&self.key("counters"), "completed", 1)?;
        self.kv.publish(
            &self.key("events"),
            &serde_json::json!({ "event": "completed", "jobId": job.id }).to_string(),
        );
        Ok(())
    }

    /// Reschedule with exponential backoff, or retire to the failed hash
    /// once attempts are exhausted.
    pub fn fail(&self, job: &Job, error: &str) -> KvResult<()> {
        self.kv.srem(&self.key("active"), &job.id)?;
        let mut retried = job.clone();
        retried.attempts += 1;

        if retried.attempts < retried.max_attempts {
            let delay_ms = BACKOFF_BASE_MS * 2u64.pow(retried.attempts);
            self.push(&retried, delay_ms)?;
            return Ok(());
        }

        // Retained for inspection.
        self.kv.hdel(&self.key("jobs"), &job.id)?;
        let record = serde_json::json!({
            "job": retried,
            "error": error,
            "failedAt": chrono::Utc::now().to_rfc3339(),
        });
        self.kv
            .hset(&self.key("failed"), &job.id, &record.to_string())?;
        self.kv.hincrby(&self.key("counters"), "failed", 1)?;
        self.kv.publish(
            &self.key("events"),
            &serde_json::json!({ "event": "failed", "jobId": job.id, "error": error }).to_string(),
        );
        Ok(())
    }

    pub fn counts(&self) -> KvResult<QueueCounts> {
        let delayed = self.kv.zcount_above(&self.key("waiting"), now_ms())?;
        let in_set = self.kv.zcard(&self.key("waiting"))?;
        let counters = self.kv.hgetall(&self.key("counters"))?;
        let counter = |field: &str| -> usize {
            counters
                .get(field)
                .and_then(|v| v.parse().ok())
                .unwrap_or(0)
        };
        Ok(QueueCounts {
            waiting: in_set - delayed,
            active: self.kv.scard(&self.key("active"))?,
            completed: counter("completed"),
            failed: counter("failed"),
            delayed,
        })
    }
}

fn now_ms() -> f64 {
    chrono::Utc::now().timestamp_millis() as f64
}

/// Run a worker loop against a queue: permit, claim, dispatch, repeat.
/// Concurrency is semaphore-bounded. On shutdown the loop stops claiming
/// and in-flight jobs run to completion.
pub fn spawn_worker(
    queue: JobQueue,
    concurrency: usize,
    poll_interval: Duration,
    shutdown: Arc<AtomicBool>,
    handler: Arc<dyn Fn(&Job) -> Result<(), String> + Send + Sync>,
) {
    tokio::spawn(async move {
        let semaphore = Arc::new(Semaphore::new(concurrency));
        loop {
            if shutdown.load(Ordering::Relaxed) {
                break;
            }
            let Ok(permit) = semaphore.clone().acquire_owned().await else {
                break;
            };
            match queue.claim() {
                Ok(Some(job)) => {
                    let queue = queue.clone();
                    let handler = handler.clone();
                    tokio::spawn(async move {
                        let outcome = handler(&job);
                        let result = match outcome {
                            Ok(()) => queue.complete(&job),
                            Err(e) => {
                                eprintln!(
                                    "⚠️ Job {} on queue {} failed (attempt {}): {e}",
                                    job.id,
                                    queue.name(),
                                    job.attempts + 1
                                );
                                queue.fail(&job, &e)
                            }
                        };
                        if let Err(e) = result {
                            eprintln!("⚠️ Queue {} bookkeeping error: {e}", queue.name());
                        }
                        drop(permit);
                    });
                }
                Ok(None) => {
                    drop(permit);
                    tokio::time::sleep(poll_interval).await;
                }
                Err(e) => {
                    drop(permit);
                    eprintln!("⚠️ Queue {} claim error: {e}", queue.name());
                    tokio::time::sleep(poll_interval).await;
                }
            }
        }
    });
}
