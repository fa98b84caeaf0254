//! Device push endpoint against a real SQLite-backed context.

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use chrono::{NaiveDate, NaiveTime, TimeZone, Utc, Weekday};
use serde_json::{json, Value};
use tempfile::TempDir;
use timekeep_common::time::MockClock;
use timekeep_domain::constants::{API_KEY_HEADER, DEVICE_PUSH_ROUTE};
use timekeep_domain::{
    AssignmentTarget, AttendanceDevice, BioUserMap, Config, DateRange, ShiftAssignment,
    ShiftDefinition, SyncMethod, WorkDay, WorkTiming,
};
use timekeep_infra::{SqliteDeviceRepository, SqliteShiftRepository};
use timekeep_server::{router, AppContext};
use tower::ServiceExt;

const API_KEY: &str = "push-secret";

struct TestApp {
    router: Router,
    _dir: TempDir,
}

async fn app() -> TestApp {
    let dir = tempfile::tempdir().unwrap();
    let mut config = Config::default();
    config.database.path = dir.path().join("push.db").display().to_string();
    config.devices.api_key = Some(API_KEY.into());
    config.scheduler.enabled = false;

    let clock = Arc::new(MockClock::at(Utc.with_ymd_and_hms(2024, 5, 2, 12, 0, 0).unwrap()));
    let context = AppContext::with_clock(config, clock).unwrap();

    let from = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
    let work_days = [
        Weekday::Mon,
        Weekday::Tue,
        Weekday::Wed,
        Weekday::Thu,
        Weekday::Fri,
    ]
    .into_iter()
    .enumerate()
    .map(|(index, day)| WorkDay {
        day,
        validity: DateRange::open(from),
        timings: vec![WorkTiming {
            id: 100 + index as i64,
            start_time: NaiveTime::from_hms_opt(9, 0, 0).unwrap(),
            end_time: NaiveTime::from_hms_opt(18, 0, 0).unwrap(),
            extends: false,
            working_minutes: 540,
        }],
    })
    .collect();

    let shifts = SqliteShiftRepository::new(context.db.clone());
    shifts
        .save_shift(&ShiftDefinition {
            id: 1,
            organization: 1,
            name: "Office".into(),
            start_time_grace_secs: 600,
            end_time_grace_secs: 600,
            work_days,
        })
        .await
        .unwrap();
    shifts
        .save_assignment(&ShiftAssignment {
            id: 1,
            user: 7,
            target: AssignmentTarget::Shift(1),
            validity: DateRange::open(from),
        })
        .await
        .unwrap();

    let devices = SqliteDeviceRepository::new(context.db.clone());
    devices
        .register_device(&AttendanceDevice {
            id: 3,
            organization: Some(1),
            serial_number: "SN-3".into(),
            ip: "10.0.0.3".into(),
            port: 80,
            sync_method: SyncMethod::Push,
            last_pulled_id: 0,
            failed_count: 0,
            last_activity: None,
        })
        .await
        .unwrap();
    devices.map_bio_user(&BioUserMap { device: 3, bio_id: "42".into(), user: 7 }).await.unwrap();
    // User 8 has no shift assignment.
    devices.map_bio_user(&BioUserMap { device: 3, bio_id: "43".into(), user: 8 }).await.unwrap();

    TestApp { router: router(context.push.clone()), _dir: dir }
}

async fn post(app: &TestApp, api_key: Option<&str>, body: String) -> (StatusCode, Value) {
    let mut request = Request::post(DEVICE_PUSH_ROUTE).header("content-type", "application/json");
    if let Some(key) = api_key {
        request = request.header(API_KEY_HEADER, key);
    }

    let response = app.router.clone().oneshot(request.body(Body::from(body)).unwrap()).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let value = if bytes.is_empty() { Value::Null } else { serde_json::from_slice(&bytes).unwrap() };
    (status, value)
}

fn punch(serial: &str, bio_id: &str) -> String {
    json!({
        "serial_number": serial,
        "bio_id": bio_id,
        "timestamp": "2024-05-02T09:05:00Z",
    })
    .to_string()
}

#[tokio::test(flavor = "multi_thread")]
async fn accepted_push_returns_entry_id_once() {
    let app = app().await;

    let (status, body) = post(&app, Some(API_KEY), punch("SN-3", "42")).await;
    assert_eq!(status, StatusCode::ACCEPTED);
    assert_eq!(body["duplicate"], false);
    let entry_id = body["entry_id"].as_i64().expect("entry id");

    let (status, body) = post(&app, Some(API_KEY), punch("SN-3", "42")).await;
    assert_eq!(status, StatusCode::ACCEPTED);
    assert_eq!(body["duplicate"], true);
    assert_eq!(body["entry_id"].as_i64(), Some(entry_id));
}

#[tokio::test(flavor = "multi_thread")]
async fn missing_or_wrong_key_is_unauthorized() {
    let app = app().await;

    let (status, _) = post(&app, None, punch("SN-3", "42")).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = post(&app, Some("guess"), punch("SN-3", "42")).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = post(&app, None, "{".into()).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test(flavor = "multi_thread")]
async fn unknown_device_and_unmapped_bio_are_field_errors() {
    let app = app().await;

    let (status, body) = post(&app, Some(API_KEY), punch("SN-404", "42")).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["field"], "serial_number");

    let (status, body) = post(&app, Some(API_KEY), punch("SN-3", "99")).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["field"], "bio_id");
}

#[tokio::test(flavor = "multi_thread")]
async fn malformed_body_is_rejected() {
    let app = app().await;

    let (status, body) = post(&app, Some(API_KEY), r#"{"serial_number":"SN-3"}"#.into()).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["field"], "body");
}

#[tokio::test(flavor = "multi_thread")]
async fn punch_of_a_user_without_a_shift_is_accepted() {
    let app = app().await;

    let (status, body) = post(&app, Some(API_KEY), punch("SN-3", "43")).await;
    assert_eq!(status, StatusCode::ACCEPTED);
    assert_eq!(body["duplicate"], false);
    assert!(body["entry_id"].as_i64().is_some());
}
