//! Cross-process coordination stored in SQLite: device sync leases and job
//! watermarks.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::{params, OptionalExtension};
use timekeep_common::time::Clock;
use timekeep_core::{JobStateRepository, Lease, LeaseProvider};
use timekeep_domain::{AttendanceError, Result};
use tracing::debug;
use uuid::Uuid;

use super::codec::{epoch, instant_at, truncate};
use super::manager::DbManager;

/// Lease backend shared by every process using the same database file.
///
/// An expired row is taken over by the next acquirer; the holder's token
/// guards release so a stale holder cannot drop a newer lease.
pub struct SqliteLeaseProvider {
    db: Arc<DbManager>,
    clock: Arc<dyn Clock>,
}

impl SqliteLeaseProvider {
    pub fn new(db: Arc<DbManager>, clock: Arc<dyn Clock>) -> Self {
        Self { db, clock }
    }
}

#[async_trait]
impl LeaseProvider for SqliteLeaseProvider {
    async fn acquire(&self, key: &str, ttl: Duration) -> Result<Option<Lease>> {
        let ttl = chrono::Duration::from_std(ttl)
            .map_err(|err| AttendanceError::Config(format!("lease ttl out of range: {err}")))?;
        let now = truncate(self.clock.now());
        let lease = Lease { key: key.to_owned(), token: Uuid::new_v4().to_string(), expires_at: now + ttl };

        self.db
            .run(move |conn| {
                let acquired = conn.execute(
                    "INSERT INTO leases (key, token, expires_at) VALUES (?1, ?2, ?3)
                     ON CONFLICT(key) DO UPDATE SET
                        token = excluded.token,
                        expires_at = excluded.expires_at
                     WHERE leases.expires_at <= ?4",
                    params![lease.key, lease.token, epoch(lease.expires_at), epoch(now)],
                )?;
                if acquired == 0 {
                    debug!(key = %lease.key, "lease.held_elsewhere");
                    return Ok(None);
                }
                Ok(Some(lease))
            })
            .await
    }

    async fn release(&self, lease: &Lease) -> Result<()> {
        let lease = lease.clone();
        self.db
            .run(move |conn| {
                let released = conn.execute(
                    "DELETE FROM leases WHERE key = ?1 AND token = ?2",
                    params![lease.key, lease.token],
                )?;
                if released == 0 {
                    debug!(key = %lease.key, "lease.release_skipped");
                }
                Ok(())
            })
            .await
    }
}

pub struct SqliteJobStateRepository {
    db: Arc<DbManager>,
}

impl SqliteJobStateRepository {
    pub fn new(db: Arc<DbManager>) -> Self {
        Self { db }
    }
}

#[async_trait]
impl JobStateRepository for SqliteJobStateRepository {
    async fn watermark(&self, job: &str) -> Result<Option<DateTime<Utc>>> {
        let job = job.to_owned();
        self.db
            .run(move |conn| {
                let watermark = conn
                    .query_row("SELECT watermark FROM job_state WHERE job = ?1", params![job], |row| {
                        instant_at(row, 0)
                    })
                    .optional()?;
                Ok(watermark)
            })
            .await
    }

    async fn set_watermark(&self, job: &str, at: DateTime<Utc>) -> Result<()> {
        let job = job.to_owned();
        self.db
            .run(move |conn| {
                conn.execute(
                    "INSERT INTO job_state (job, watermark) VALUES (?1, ?2)
                     ON CONFLICT(job) DO UPDATE SET watermark = excluded.watermark",
                    params![job, epoch(at)],
                )?;
                Ok(())
            })
            .await
    }
}
