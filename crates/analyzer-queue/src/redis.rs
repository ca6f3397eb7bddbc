//! Redis-backed work queue using Lua scripts for atomicity.
//!
//! Suitable for multi-node deployments. Two keys per queue:
//!
//! - `{name}:pending` is a list; enqueue pushes on the left, dequeue pops
//!   from the right, so the right end is the head.
//! - `{name}:leases` is a sorted set of receipts scored by their
//!   visibility deadline in epoch milliseconds.

use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use redis::AsyncCommands;
use redis::aio::ConnectionManager;
use tracing::{debug, info, warn};

use analyzer_core::error::{AppError, ErrorKind};
use analyzer_core::result::AppResult;
use analyzer_core::traits::{Delivery, QueueDepth, WorkQueue};
use analyzer_core::types::JobId;

use crate::receipt;

/// Pop the head and lease it.
///
/// KEYS[1] = pending list
/// KEYS[2] = lease set
/// ARGV[1] = deadline (ms)
/// ARGV[2] = delivery token
///
/// Returns the receipt, or nil when the queue is empty.
const DEQUEUE_SCRIPT: &str = r#"
    local job_id = redis.call('RPOP', KEYS[1])
    if not job_id then
        return false
    end
    local receipt = job_id .. '|' .. ARGV[2]
    redis.call('ZADD', KEYS[2], ARGV[1], receipt)
    return receipt
"#;

/// Move a live lease's deadline. Returns 1 if the receipt was still leased.
const EXTEND_SCRIPT: &str = r#"
    if redis.call('ZSCORE', KEYS[1], ARGV[1]) then
        redis.call('ZADD', KEYS[1], 'XX', ARGV[2], ARGV[1])
        return 1
    end
    return 0
"#;

/// Drop a lease and put its job id back at the head of the pending list.
///
/// KEYS[1] = pending list
/// KEYS[2] = lease set
/// ARGV[1] = receipt
/// ARGV[2] = job id
const RELEASE_SCRIPT: &str = r#"
    if redis.call('ZREM', KEYS[2], ARGV[1]) == 1 then
        redis.call('RPUSH', KEYS[1], ARGV[2])
        return 1
    end
    return 0
"#;

/// Return every lease past its deadline to the head of the pending list,
/// oldest deadline first in line.
///
/// KEYS[1] = pending list
/// KEYS[2] = lease set
/// ARGV[1] = now (ms)
const REQUEUE_SCRIPT: &str = r#"
    local expired = redis.call('ZRANGEBYSCORE', KEYS[2], '-inf', ARGV[1])
    for i = #expired, 1, -1 do
        local receipt = expired[i]
        redis.call('ZREM', KEYS[2], receipt)
        local job_id = string.match(receipt, '^([^|]+)|')
        if job_id then
            redis.call('RPUSH', KEYS[1], job_id)
        end
    end
    return #expired
"#;

/// Work queue stored in Redis, shared by every worker process.
#[derive(Clone)]
pub struct RedisWorkQueue {
    conn: ConnectionManager,
    pending_key: String,
    leases_key: String,
}

impl std::fmt::Debug for RedisWorkQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisWorkQueue")
            .field("pending_key", &self.pending_key)
            .field("leases_key", &self.leases_key)
            .finish()
    }
}

impl RedisWorkQueue {
    /// Connect to the broker at `url` and bind to the queue called `name`.
    pub async fn connect(url: &str, name: &str) -> AppResult<Self> {
        let client = redis::Client::open(url).map_err(|e| {
            AppError::with_source(ErrorKind::Queue, "Failed to create Redis client", e)
        })?;
        let conn = client.get_connection_manager().await.map_err(|e| {
            AppError::with_source(ErrorKind::Queue, "Failed to connect to queue broker", e)
        })?;
        info!(queue = %name, "Connected to Redis work queue");
        Ok(Self::from_connection(conn, name))
    }

    /// Bind to `name` over an existing connection.
    pub fn from_connection(conn: ConnectionManager, name: &str) -> Self {
        Self {
            conn,
            pending_key: format!("{name}:pending"),
            leases_key: format!("{name}:leases"),
        }
    }
}

fn deadline_ms(visibility: Duration) -> i64 {
    let millis = i64::try_from(visibility.as_millis()).unwrap_or(i64::MAX);
    Utc::now().timestamp_millis().saturating_add(millis)
}

fn queue_err(message: &'static str) -> impl FnOnce(redis::RedisError) -> AppError {
    move |e| AppError::with_source(ErrorKind::Queue, message, e)
}

#[async_trait]
impl WorkQueue for RedisWorkQueue {
    async fn enqueue(&self, job_id: JobId) -> AppResult<()> {
        let mut conn = self.conn.clone();
        let _: i64 = conn
            .lpush(&self.pending_key, job_id.to_string())
            .await
            .map_err(queue_err("Failed to enqueue job"))?;
        debug!(job_id = %job_id, "Enqueued job");
        Ok(())
    }

    async fn dequeue(&self, visibility: Duration) -> AppResult<Option<Delivery>> {
        let mut conn = self.conn.clone();
        let token = uuid::Uuid::new_v4().simple().to_string();
        let receipt: Option<String> = redis::Script::new(DEQUEUE_SCRIPT)
            .key(&self.pending_key)
            .key(&self.leases_key)
            .arg(deadline_ms(visibility))
            .arg(token)
            .invoke_async(&mut conn)
            .await
            .map_err(queue_err("Failed to dequeue job"))?;

        match receipt {
            Some(receipt) => match receipt::parse(&receipt) {
                Ok(delivery) => Ok(Some(delivery)),
                Err(e) => {
                    // Not ours to process; drop the lease so it is not redelivered forever.
                    warn!(receipt = %receipt, error = %e, "Discarding malformed queue item");
                    let _: i64 = conn
                        .zrem(&self.leases_key, &receipt)
                        .await
                        .map_err(queue_err("Failed to discard malformed item"))?;
                    Ok(None)
                }
            },
            None => Ok(None),
        }
    }

    async fn ack(&self, delivery: &Delivery) -> AppResult<bool> {
        let mut conn = self.conn.clone();
        let removed: i64 = conn
            .zrem(&self.leases_key, &delivery.receipt)
            .await
            .map_err(queue_err("Failed to acknowledge delivery"))?;
        Ok(removed > 0)
    }

    async fn extend(&self, delivery: &Delivery, visibility: Duration) -> AppResult<bool> {
        let mut conn = self.conn.clone();
        let extended: i64 = redis::Script::new(EXTEND_SCRIPT)
            .key(&self.leases_key)
            .arg(&delivery.receipt)
            .arg(deadline_ms(visibility))
            .invoke_async(&mut conn)
            .await
            .map_err(queue_err("Failed to extend delivery"))?;
        Ok(extended == 1)
    }

    async fn release(&self, delivery: &Delivery) -> AppResult<bool> {
        let mut conn = self.conn.clone();
        let released: i64 = redis::Script::new(RELEASE_SCRIPT)
            .key(&self.pending_key)
            .key(&self.leases_key)
            .arg(&delivery.receipt)
            .arg(delivery.job_id.to_string())
            .invoke_async(&mut conn)
            .await
            .map_err(queue_err("Failed to release delivery"))?;
        Ok(released == 1)
    }

    async fn requeue_expired(&self) -> AppResult<u64> {
        let mut conn = self.conn.clone();
        let moved: u64 = redis::Script::new(REQUEUE_SCRIPT)
            .key(&self.pending_key)
            .key(&self.leases_key)
            .arg(Utc::now().timestamp_millis())
            .invoke_async(&mut conn)
            .await
            .map_err(queue_err("Failed to requeue expired deliveries"))?;
        if moved > 0 {
            info!(count = moved, "Requeued expired deliveries");
        }
        Ok(moved)
    }

    async fn depth(&self) -> AppResult<QueueDepth> {
        let mut conn = self.conn.clone();
        let pending: u64 = conn
            .llen(&self.pending_key)
            .await
            .map_err(queue_err("Failed to read queue length"))?;
        let in_flight: u64 = conn
            .zcard(&self.leases_key)
            .await
            .map_err(queue_err("Failed to read lease count"))?;
        Ok(QueueDepth { pending, in_flight })
    }

    async fn health_check(&self) -> AppResult<bool> {
        let mut conn = self.conn.clone();
        let pong: String = redis::cmd("PING")
            .query_async(&mut conn)
            .await
            .map_err(queue_err("Queue broker health check failed"))?;
        Ok(pong == "PONG")
    }
}
