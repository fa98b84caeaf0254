//! HTTP routes

pub mod device_push;

use std::sync::Arc;

use axum::routing::post;
use axum::Router;
use timekeep_core::DevicePushHandler;
use timekeep_domain::constants::DEVICE_PUSH_ROUTE;

pub fn router(push: Arc<DevicePushHandler>) -> Router {
    Router::new().route(DEVICE_PUSH_ROUTE, post(device_push::handle)).with_state(push)
}
