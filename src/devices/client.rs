use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, SecondsFormat, Utc};
use serde_json::{json, Value};

use super::models::{DeviceEnvelope, DeviceListResponse, DeviceSnapshot};
use crate::api::{ApiClient, ApiError};

const DEVICES_PATH: &str = "/api/lg-devices/";

/// Typed calls to the device simulation endpoints.
#[derive(Clone)]
pub struct DeviceClient {
    api: Arc<ApiClient>,
}

impl DeviceClient {
    pub fn new(api: Arc<ApiClient>) -> Self {
        Self { api }
    }

    pub async fn list(&self) -> Result<HashMap<String, DeviceSnapshot>, ApiError> {
        let response: DeviceListResponse = self.api.get_json(DEVICES_PATH).await?;
        Ok(response.devices)
    }

    pub async fn get(&self, name: &str) -> Result<Option<DeviceSnapshot>, ApiError> {
        let envelope: DeviceEnvelope = self
            .api
            .get_json(&format!("{DEVICES_PATH}{name}"))
            .await?;
        Ok(envelope.into_device())
    }

    /// Manual control (power/course/mode/temperature/...). The caller
    /// has already patched its local snapshot optimistically, so the
    /// response body is not consulted; only failure matters.
    pub async fn control(&self, name: &str, command: &str, value: &Value) -> Result<(), ApiError> {
        self.api
            .post_ok(
                &format!("{DEVICES_PATH}{name}/control"),
                json!({ "command": command, "value": value }),
            )
            .await
    }

    /// Start/cancel toggle. Timing is server-authoritative, so the
    /// returned snapshot is the one that counts, never an optimistic patch.
    pub async fn simulate(
        &self,
        name: &str,
        at: DateTime<Utc>,
    ) -> Result<Option<DeviceSnapshot>, ApiError> {
        let envelope: DeviceEnvelope = self
            .api
            .post_json(
                &format!("{DEVICES_PATH}{name}/simulate"),
                json!({ "startTime": at.to_rfc3339_opts(SecondsFormat::Millis, true) }),
            )
            .await?;
        Ok(envelope.into_device())
    }
}
