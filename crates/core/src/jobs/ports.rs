//! Port interface for job bookkeeping

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use timekeep_domain::Result;

/// Per-job watermarks: the start of the last fully successful run.
#[async_trait]
pub trait JobStateRepository: Send + Sync {
    async fn watermark(&self, job: &str) -> Result<Option<DateTime<Utc>>>;

    async fn set_watermark(&self, job: &str, at: DateTime<Utc>) -> Result<()>;
}
