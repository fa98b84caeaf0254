//! SQLite storage for attendance devices, bio-id mappings and the raw
//! event cache.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Row, TransactionBehavior};
use timekeep_common::time::Clock;
use timekeep_core::{DeviceRepository, RawEventRepository};
use timekeep_domain::{
    AttendanceDevice, AttendanceError, BioUserMap, DeviceId, NewRawEvent, RawEvent, RawEventId,
    Result, SyncStatus, UserId,
};
use tracing::{debug, warn};

use super::codec::{epoch, epoch_opt, instant_at, instant_opt, label, placeholders};
use super::manager::DbManager;
use crate::errors::InfraResult;

const DEVICE_COLUMNS: &str = "id, organization_id, serial_number, ip, port, sync_method,
    last_pulled_id, failed_count, last_activity";

const RAW_EVENT_COLUMNS: &str = "id, device_id, bio_id, timestamp, status, attempts, created_at";

pub struct SqliteDeviceRepository {
    db: Arc<DbManager>,
}

impl SqliteDeviceRepository {
    pub fn new(db: Arc<DbManager>) -> Self {
        Self { db }
    }

    /// Register a device or update its connection details. The pull cursor
    /// and failure counter are left alone on update.
    pub async fn register_device(&self, device: &AttendanceDevice) -> Result<()> {
        let device = device.clone();
        self.db
            .run(move |conn| {
                conn.execute(
                    "INSERT INTO attendance_devices (
                        id, organization_id, serial_number, ip, port, sync_method,
                        last_pulled_id, failed_count, last_activity
                     ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
                     ON CONFLICT(id) DO UPDATE SET
                        organization_id = excluded.organization_id,
                        serial_number = excluded.serial_number,
                        ip = excluded.ip,
                        port = excluded.port,
                        sync_method = excluded.sync_method",
                    params![
                        device.id,
                        device.organization,
                        device.serial_number,
                        device.ip,
                        device.port,
                        device.sync_method.as_str(),
                        device.last_pulled_id,
                        device.failed_count,
                        epoch_opt(device.last_activity)
                    ],
                )?;
                Ok(())
            })
            .await
    }

    pub async fn map_bio_user(&self, mapping: &BioUserMap) -> Result<()> {
        let mapping = mapping.clone();
        self.db
            .run(move |conn| {
                conn.execute(
                    "INSERT INTO bio_user_maps (device_id, bio_id, user_id) VALUES (?1, ?2, ?3)
                     ON CONFLICT(device_id, bio_id) DO UPDATE SET user_id = excluded.user_id",
                    params![mapping.device, mapping.bio_id, mapping.user],
                )?;
                Ok(())
            })
            .await
    }
}

#[async_trait]
impl DeviceRepository for SqliteDeviceRepository {
    async fn devices(&self) -> Result<Vec<AttendanceDevice>> {
        self.db
            .run(|conn| {
                let mut stmt = conn.prepare(&format!("SELECT {DEVICE_COLUMNS} FROM attendance_devices ORDER BY id"))?;
                let rows = stmt.query_map([], map_device_row)?;
                Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
            })
            .await
    }

    async fn device(&self, id: DeviceId) -> Result<Option<AttendanceDevice>> {
        self.db
            .run(move |conn| {
                let device = conn
                    .query_row(
                        &format!("SELECT {DEVICE_COLUMNS} FROM attendance_devices WHERE id = ?1"),
                        params![id],
                        map_device_row,
                    )
                    .optional()?;
                Ok(device)
            })
            .await
    }

    async fn device_by_serial(&self, serial_number: &str) -> Result<Option<AttendanceDevice>> {
        let serial_number = serial_number.to_owned();
        self.db
            .run(move |conn| {
                let device = conn
                    .query_row(
                        &format!("SELECT {DEVICE_COLUMNS} FROM attendance_devices WHERE serial_number = ?1"),
                        params![serial_number],
                        map_device_row,
                    )
                    .optional()?;
                Ok(device)
            })
            .await
    }

    async fn bio_user_map(&self, device: DeviceId) -> Result<Vec<BioUserMap>> {
        self.db
            .run(move |conn| {
                let mut stmt = conn.prepare(
                    "SELECT device_id, bio_id, user_id FROM bio_user_maps WHERE device_id = ?1 ORDER BY bio_id",
                )?;
                let rows = stmt.query_map(params![device], |row| {
                    Ok(BioUserMap { device: row.get(0)?, bio_id: row.get(1)?, user: row.get(2)? })
                })?;
                Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
            })
            .await
    }

    async fn lookup_bio(&self, device: DeviceId, bio_id: &str) -> Result<Option<UserId>> {
        let bio_id = bio_id.to_owned();
        self.db
            .run(move |conn| {
                let user = conn
                    .query_row(
                        "SELECT user_id FROM bio_user_maps WHERE device_id = ?1 AND bio_id = ?2",
                        params![device, bio_id],
                        |row| row.get(0),
                    )
                    .optional()?;
                Ok(user)
            })
            .await
    }

    async fn update_cursor(&self, device: DeviceId, cursor: i64, at: DateTime<Utc>) -> Result<()> {
        self.db
            .run(move |conn| {
                conn.execute(
                    "UPDATE attendance_devices
                     SET last_pulled_id = ?2, failed_count = 0, last_activity = ?3
                     WHERE id = ?1",
                    params![device, cursor, epoch(at)],
                )?;
                Ok(())
            })
            .await
    }

    async fn record_failure(&self, device: DeviceId) -> Result<u32> {
        self.db
            .run(move |conn| {
                let count: Option<u32> = conn
                    .query_row(
                        "UPDATE attendance_devices SET failed_count = failed_count + 1
                         WHERE id = ?1 RETURNING failed_count",
                        params![device],
                        |row| row.get(0),
                    )
                    .optional()?;
                let count = count.ok_or_else(|| AttendanceError::NotFound(format!("device {device}")))?;
                warn!(device, failed_count = count, "device.failure_recorded");
                Ok(count)
            })
            .await
    }

    async fn reset_failures(&self, device: DeviceId) -> Result<()> {
        self.db
            .run(move |conn| {
                conn.execute("UPDATE attendance_devices SET failed_count = 0 WHERE id = ?1", params![device])?;
                Ok(())
            })
            .await
    }
}

fn map_device_row(row: &Row<'_>) -> rusqlite::Result<AttendanceDevice> {
    Ok(AttendanceDevice {
        id: row.get(0)?,
        organization: row.get(1)?,
        serial_number: row.get(2)?,
        ip: row.get(3)?,
        port: row.get(4)?,
        sync_method: label(row, 5)?,
        last_pulled_id: row.get(6)?,
        failed_count: row.get(7)?,
        last_activity: instant_opt(row, 8)?,
    })
}

/// Raw event cache. Rows are unique on `(device_id, bio_id, timestamp)` so
/// re-pulled or re-pushed punches are absorbed by `INSERT OR IGNORE`.
pub struct SqliteRawEventRepository {
    db: Arc<DbManager>,
    clock: Arc<dyn Clock>,
}

impl SqliteRawEventRepository {
    pub fn new(db: Arc<DbManager>, clock: Arc<dyn Clock>) -> Self {
        Self { db, clock }
    }

    async fn set_status(&self, ids: &[RawEventId], status: SyncStatus) -> Result<()> {
        if ids.is_empty() {
            return Ok(());
        }
        let ids = ids.to_vec();
        self.db
            .run(move |conn| {
                let sql = format!(
                    "UPDATE raw_events SET status = ?1 WHERE id IN ({})",
                    placeholders(2, ids.len())
                );
                let mut args: Vec<Value> = vec![status.as_str().to_owned().into()];
                args.extend(ids.iter().map(|id| Value::from(*id)));
                let updated = conn.execute(&sql, params_from_iter(args))?;
                debug!(status = status.as_str(), updated, "raw_events.status_changed");
                Ok(())
            })
            .await
    }
}

#[async_trait]
impl RawEventRepository for SqliteRawEventRepository {
    async fn insert_many(&self, events: &[NewRawEvent]) -> Result<usize> {
        if events.is_empty() {
            return Ok(0);
        }
        let events = events.to_vec();
        let now = epoch(self.clock.now());
        self.db
            .run(move |conn| {
                let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
                let mut inserted = 0;
                {
                    let mut stmt = tx.prepare(
                        "INSERT OR IGNORE INTO raw_events (device_id, bio_id, timestamp, created_at)
                         VALUES (?1, ?2, ?3, ?4)",
                    )?;
                    for event in &events {
                        inserted += stmt.execute(params![event.device, event.bio_id, epoch(event.timestamp), now])?;
                    }
                }
                tx.commit()?;
                Ok(inserted)
            })
            .await
    }

    async fn insert(&self, event: NewRawEvent) -> Result<Option<RawEvent>> {
        let now = epoch(self.clock.now());
        self.db
            .run(move |conn| {
                let inserted = conn.execute(
                    "INSERT OR IGNORE INTO raw_events (device_id, bio_id, timestamp, created_at)
                     VALUES (?1, ?2, ?3, ?4)",
                    params![event.device, event.bio_id, epoch(event.timestamp), now],
                )?;
                if inserted == 0 {
                    return Ok(None);
                }
                load_raw_event(conn, conn.last_insert_rowid())
            })
            .await
    }

    async fn pending(&self, device: DeviceId) -> Result<Vec<RawEvent>> {
        self.db
            .run(move |conn| {
                let mut stmt = conn.prepare(&format!(
                    "SELECT {RAW_EVENT_COLUMNS} FROM raw_events
                     WHERE device_id = ?1 AND status = ?2 ORDER BY timestamp, id"
                ))?;
                let rows = stmt.query_map(params![device, SyncStatus::Pending.as_str()], map_raw_event_row)?;
                Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
            })
            .await
    }

    async fn mark_consumed(&self, ids: &[RawEventId]) -> Result<()> {
        self.set_status(ids, SyncStatus::Consumed).await
    }

    async fn mark_failed(&self, ids: &[RawEventId]) -> Result<()> {
        self.set_status(ids, SyncStatus::Failed).await
    }

    async fn bump_attempts(&self, ids: &[RawEventId]) -> Result<Vec<RawEvent>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let ids = ids.to_vec();
        self.db
            .run(move |conn| {
                let sql = format!(
                    "UPDATE raw_events SET attempts = attempts + 1 WHERE id IN ({})
                     RETURNING {RAW_EVENT_COLUMNS}",
                    placeholders(1, ids.len())
                );
                let mut stmt = conn.prepare(&sql)?;
                let rows = stmt.query_map(params_from_iter(ids.iter()), map_raw_event_row)?;
                let mut bumped = rows.collect::<rusqlite::Result<Vec<_>>>()?;
                bumped.sort_by_key(|event| event.id);
                Ok(bumped)
            })
            .await
    }
}

fn load_raw_event(conn: &Connection, id: RawEventId) -> InfraResult<Option<RawEvent>> {
    let event = conn
        .query_row(
            &format!("SELECT {RAW_EVENT_COLUMNS} FROM raw_events WHERE id = ?1"),
            params![id],
            map_raw_event_row,
        )
        .optional()?;
    Ok(event)
}

fn map_raw_event_row(row: &Row<'_>) -> rusqlite::Result<RawEvent> {
    Ok(RawEvent {
        id: row.get(0)?,
        device: row.get(1)?,
        bio_id: row.get(2)?,
        timestamp: instant_at(row, 3)?,
        status: label(row, 4)?,
        attempts: row.get(5)?,
        created_at: instant_at(row, 6)?,
    })
}
