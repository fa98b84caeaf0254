//! Pull source over a MySQL replica of the vendor `checkinout` table.
//!
//! `checktime` is stored in the device's wall-clock time; subtracting the
//! configured offset gives UTC.

use async_trait::async_trait;
use chrono::{Duration, NaiveDateTime};
use sqlx::mysql::{MySqlPool, MySqlPoolOptions};
use timekeep_core::AttendanceSource;
use timekeep_domain::{AttendanceDevice, AttendanceError, DeviceConfig, PullBatch, PulledEvent, Result};
use tracing::debug;

use crate::errors::InfraError;

const MAX_CONNECTIONS: u32 = 4;

#[derive(Debug, sqlx::FromRow)]
struct CheckinoutRow {
    id: i64,
    userid: String,
    checktime: NaiveDateTime,
}

pub struct CheckinoutReplica {
    pool: MySqlPool,
    offset: Duration,
}

impl CheckinoutReplica {
    /// Lazily connecting pool; the replica may be down at startup.
    pub fn connect_lazy(config: &DeviceConfig) -> Result<Self> {
        let url = config
            .checkinout_url
            .as_deref()
            .ok_or_else(|| AttendanceError::Config("checkinout_url is not configured".into()))?;
        let pool = MySqlPoolOptions::new()
            .max_connections(MAX_CONNECTIONS)
            .acquire_timeout(std::time::Duration::from_secs(config.request_timeout_secs))
            .connect_lazy(url)
            .map_err(|err| AttendanceError::from(InfraError::from(err)))?;
        Ok(Self::with_pool(pool, config.checkinout_timezone_offset_minutes))
    }

    pub fn with_pool(pool: MySqlPool, offset_minutes: i64) -> Self {
        Self { pool, offset: Duration::minutes(offset_minutes) }
    }
}

#[async_trait]
impl AttendanceSource for CheckinoutReplica {
    async fn pull(&self, device: &AttendanceDevice, cursor: i64) -> Result<PullBatch> {
        let rows = sqlx::query_as::<_, CheckinoutRow>(
            r#"
            SELECT id, CAST(userid AS CHAR) AS userid, checktime
            FROM checkinout
            WHERE id > ? AND sn = ?
            ORDER BY id
            "#,
        )
        .bind(cursor)
        .bind(&device.serial_number)
        .fetch_all(&self.pool)
        .await
        .map_err(|err| AttendanceError::from(InfraError::from(err)))?;

        let next_cursor = rows.last().map_or(cursor, |row| row.id.max(cursor));
        let events: Vec<PulledEvent> = rows
            .into_iter()
            .map(|row| PulledEvent {
                external_id: row.id,
                bio_id: row.userid.trim().to_owned(),
                timestamp: (row.checktime - self.offset).and_utc(),
            })
            .collect();

        debug!(device = device.id, events = events.len(), next_cursor, "checkinout.pulled");
        Ok(PullBatch { events, next_cursor })
    }
}
