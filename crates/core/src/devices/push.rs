//! Push intake for devices that post their own events

use std::sync::Arc;

use sha2::{Digest, Sha256};
use timekeep_domain::{AttendanceError, DevicePush, NewRawEvent, Result};
use tracing::{debug, info, instrument, warn};

use super::ports::{DeviceRepository, RawEventRepository};
use crate::clock::{ClockOutcome, ClockRequest, ClockService};
use crate::events::{dispatch, EventSink};

#[derive(Debug, Clone, PartialEq)]
pub enum PushOutcome {
    Accepted(ClockOutcome),
    Unauthorized,
}

pub struct DevicePushHandler {
    devices: Arc<dyn DeviceRepository>,
    raw_events: Arc<dyn RawEventRepository>,
    ingestion: Arc<ClockService>,
    events: Arc<dyn EventSink>,
    api_key_digest: Option<[u8; 32]>,
}

fn digest(value: &str) -> [u8; 32] {
    Sha256::digest(value.as_bytes()).into()
}

/// Compare fixed-size digests without short-circuiting.
fn digests_match(a: &[u8; 32], b: &[u8; 32]) -> bool {
    a.iter().zip(b.iter()).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

impl DevicePushHandler {
    /// Without an `api_key` every push is unauthorized.
    pub fn new(
        devices: Arc<dyn DeviceRepository>,
        raw_events: Arc<dyn RawEventRepository>,
        ingestion: Arc<ClockService>,
        events: Arc<dyn EventSink>,
        api_key: Option<&str>,
    ) -> Self {
        Self { devices, raw_events, ingestion, events, api_key_digest: api_key.map(digest) }
    }

    fn authorized(&self, presented: Option<&str>) -> bool {
        match (&self.api_key_digest, presented) {
            (Some(expected), Some(presented)) => digests_match(expected, &digest(presented)),
            _ => false,
        }
    }

    /// Cache the pushed event and apply it right away.
    #[instrument(skip(self, api_key, payload), fields(serial_number = %payload.serial_number))]
    pub async fn accept(&self, api_key: Option<&str>, payload: DevicePush) -> Result<PushOutcome> {
        if !self.authorized(api_key) {
            warn!("device_push.unauthorized");
            return Ok(PushOutcome::Unauthorized);
        }

        let device = self.devices.device_by_serial(&payload.serial_number).await?.ok_or_else(|| {
            AttendanceError::validation("serial_number", format!("unknown device `{}`", payload.serial_number))
        })?;
        let user = self.devices.lookup_bio(device.id, &payload.bio_id).await?.ok_or_else(|| {
            AttendanceError::validation(
                "bio_id",
                format!("bio id `{}` is not mapped on device `{}`", payload.bio_id, payload.serial_number),
            )
        })?;

        let cached = self
            .raw_events
            .insert(NewRawEvent { device: device.id, bio_id: payload.bio_id.clone(), timestamp: payload.timestamp })
            .await?;
        if let (Some(latitude), Some(longitude)) = (payload.latitude, payload.longitude) {
            debug!(device = device.id, latitude, longitude, "device_push.location");
        }

        let request = ClockRequest {
            user,
            timestamp: payload.timestamp,
            method: payload.entry_method,
            entry_type: payload.entry_type,
            remark_category: payload.remark_category,
            remarks: payload.remarks,
            source_device: Some(device.id),
        };
        let outcome = self.ingestion.clock(request).await?;

        if let Some(raw) = cached {
            self.raw_events.mark_consumed(&[raw.id]).await?;
        }
        dispatch(self.events.as_ref(), &outcome.events).await;

        info!(device = device.id, user, entry = outcome.entry.id, duplicate = outcome.duplicate, "device_push.accepted");
        Ok(PushOutcome::Accepted(outcome))
    }
}
