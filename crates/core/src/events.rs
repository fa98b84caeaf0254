//! Outbound attendance events.
//!
//! Services return events instead of firing hooks; whoever holds an
//! [`EventSink`] delivers them.

use async_trait::async_trait;
use timekeep_domain::{AttendanceEvent, Result};
use tracing::{info, warn};

#[async_trait]
pub trait EventSink: Send + Sync {
    async fn publish(&self, event: &AttendanceEvent) -> Result<()>;
}

/// Deliver `events` fire-and-forget: sink failures are logged, never
/// returned.
pub async fn dispatch(sink: &dyn EventSink, events: &[AttendanceEvent]) {
    for event in events {
        if let Err(err) = sink.publish(event).await {
            warn!(event = event.name(), error = %err, "events.publish_failed");
        }
    }
}

/// Sink that only records events in the log.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingEventSink;

#[async_trait]
impl EventSink for TracingEventSink {
    async fn publish(&self, event: &AttendanceEvent) -> Result<()> {
        info!(event = event.name(), payload = ?event, "events.published");
        Ok(())
    }
}
