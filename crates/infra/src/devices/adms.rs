//! Pull client for the ADMS log service running next to each device.
//!
//! The service answers `POST {scheme}://{ip}:{port}/api/logs` with a page of
//! punches and an optional absolute `next` link:
//!
//! ```json
//! {"results": [{"id": 41, "bio_user_id": "17", "punch_time": "2024-03-04T09:02:11Z"}],
//!  "next": "http://10.0.0.5:8080/api/logs?last_id=41&page=2"}
//! ```

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime, Utc};
use reqwest::{Method, StatusCode, Url};
use serde::Deserialize;
use serde_json::Value;
use timekeep_core::AttendanceSource;
use timekeep_domain::constants::ADMS_LOGS_PATH;
use timekeep_domain::{AttendanceDevice, AttendanceError, DeviceConfig, PullBatch, PulledEvent, Result};
use tracing::{debug, warn};

use crate::http::HttpClient;

const MAX_PAGES: usize = 500;
const NAIVE_FORMATS: [&str; 2] = ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S"];

#[derive(Debug, Deserialize)]
struct LogPage {
    #[serde(default)]
    results: Vec<LogRow>,
    #[serde(default)]
    next: Option<String>,
}

#[derive(Debug, Deserialize)]
struct LogRow {
    id: i64,
    bio_user_id: Value,
    punch_time: String,
}

pub struct AdmsClient {
    http: HttpClient,
    access_key_1: String,
    access_key_2: String,
}

impl AdmsClient {
    pub fn new(config: &DeviceConfig) -> Result<Self> {
        let http = HttpClient::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .max_attempts(2)
            .user_agent(concat!("timekeep/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self {
            http,
            access_key_1: config.access_key_1.clone().unwrap_or_default(),
            access_key_2: config.access_key_2.clone().unwrap_or_default(),
        })
    }

    fn logs_url(&self, device: &AttendanceDevice, cursor: i64) -> Result<Url> {
        let scheme = if device.port == 443 { "https" } else { "http" };
        let base = format!("{scheme}://{}:{}{ADMS_LOGS_PATH}", device.ip, device.port);
        let cursor = cursor.to_string();
        Url::parse_with_params(
            &base,
            [
                ("last_id", cursor.as_str()),
                ("sn", device.serial_number.as_str()),
                ("access_key_1", self.access_key_1.as_str()),
                ("access_key_2", self.access_key_2.as_str()),
            ],
        )
        .map_err(|err| AttendanceError::Config(format!("invalid ADMS address for device {}: {err}", device.id)))
    }

    async fn fetch_page(&self, device: &AttendanceDevice, url: Url) -> Result<LogPage> {
        let response = self.http.send(self.http.request(Method::POST, url)).await?;
        let status = response.status();
        if status != StatusCode::OK {
            return Err(AttendanceError::TransientSync(format!(
                "ADMS service for device {} answered HTTP {}",
                device.serial_number,
                status.as_u16()
            )));
        }
        response.json::<LogPage>().await.map_err(|err| {
            AttendanceError::TransientSync(format!(
                "unreadable ADMS page from device {}: {err}",
                device.serial_number
            ))
        })
    }
}

#[async_trait]
impl AttendanceSource for AdmsClient {
    async fn pull(&self, device: &AttendanceDevice, cursor: i64) -> Result<PullBatch> {
        let mut next = Some(self.logs_url(device, cursor)?);
        let mut events = Vec::new();
        let mut pages = 0;

        while let Some(url) = next.take() {
            pages += 1;
            if pages > MAX_PAGES {
                warn!("ADMS pagination for device {} exceeded {MAX_PAGES} pages; stopping", device.serial_number);
                break;
            }
            let page = self.fetch_page(device, url).await?;
            for row in page.results {
                match to_event(&row) {
                    Some(event) => events.push(event),
                    None => warn!(
                        "Skipping ADMS row {} from device {}: unreadable punch_time {:?}",
                        row.id, device.serial_number, row.punch_time
                    ),
                }
            }
            next = match page.next.filter(|link| !link.is_empty()) {
                Some(link) => Some(Url::parse(&link).map_err(|err| {
                    AttendanceError::TransientSync(format!("invalid ADMS next link {link:?}: {err}"))
                })?),
                None => None,
            };
        }

        let next_cursor = events.iter().map(|event| event.external_id).max().unwrap_or(cursor).max(cursor);
        debug!(device = device.id, pages, events = events.len(), next_cursor, "adms.pulled");
        Ok(PullBatch { events, next_cursor })
    }
}

fn to_event(row: &LogRow) -> Option<PulledEvent> {
    let bio_id = match &row.bio_user_id {
        Value::String(id) => id.trim().to_owned(),
        other => other.to_string(),
    };
    Some(PulledEvent { external_id: row.id, bio_id, timestamp: parse_punch_time(&row.punch_time)? })
}

/// RFC 3339 stamps keep their offset; naive stamps are read as UTC.
fn parse_punch_time(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(stamp) = DateTime::parse_from_rfc3339(raw) {
        return Some(stamp.with_timezone(&Utc));
    }
    NAIVE_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(raw, format).ok())
        .map(|naive| naive.and_utc())
}
