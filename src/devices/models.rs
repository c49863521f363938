use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Operational state reported by the device simulator. Unrecognized
/// statuses are carried as `Unknown` rather than failing the decode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeviceStatus {
    Running,
    Cleaning,
    Waiting,
    Docked,
    #[default]
    Idle,
    Completed,
    #[serde(other)]
    Unknown,
}

impl DeviceStatus {
    /// Cycle in progress; the countdown applies.
    pub fn is_operating(self) -> bool {
        matches!(self, DeviceStatus::Running | DeviceStatus::Cleaning)
    }

    pub fn label(self) -> &'static str {
        match self {
            DeviceStatus::Running => "Running",
            DeviceStatus::Cleaning => "Cleaning",
            DeviceStatus::Waiting => "Waiting",
            DeviceStatus::Docked => "Docked",
            DeviceStatus::Idle => "Idle",
            DeviceStatus::Completed => "Completed",
            DeviceStatus::Unknown => "Unknown",
        }
    }
}

/// The client's local copy of one device's server-reported state.
/// `remaining_time` is recomputed locally between syncs and is not
/// authoritative until the next server snapshot replaces it. Fields the
/// client does not model are kept in `extra` so an authoritative
/// snapshot round-trips losslessly.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceSnapshot {
    #[serde(default)]
    pub status: DeviceStatus,
    #[serde(default)]
    pub power: Option<String>,
    #[serde(rename = "type", default)]
    pub kind: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub cycle_start_timestamp: Option<DateTime<Utc>>,
    #[serde(default)]
    pub power_on_timestamp: Option<DateTime<Utc>>,
    #[serde(default)]
    pub total_time: i64,
    #[serde(default)]
    pub remaining_time: i64,
    #[serde(default)]
    pub course: Option<String>,
    #[serde(default)]
    pub courses: Option<Vec<String>>,
    #[serde(default)]
    pub mode: Option<String>,
    #[serde(default)]
    pub modes: Option<Vec<String>>,
    #[serde(default)]
    pub course_times: Option<HashMap<String, i64>>,
    #[serde(default)]
    pub temperature: Option<i64>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, Value>,
}

/// `GET /api/lg-devices/` envelope.
#[derive(Debug, Deserialize)]
pub struct DeviceListResponse {
    #[allow(dead_code)]
    #[serde(default)]
    pub status: Option<String>,
    pub devices: HashMap<String, DeviceSnapshot>,
}

/// `POST /api/lg-devices/{name}/simulate` and
/// `GET /api/lg-devices/{name}` envelope.
#[derive(Debug, Deserialize)]
pub struct DeviceEnvelope {
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub device: Option<DeviceSnapshot>,
}

impl DeviceEnvelope {
    /// The authoritative snapshot, present only on a success envelope.
    pub fn into_device(self) -> Option<DeviceSnapshot> {
        if self.status.as_deref() == Some("success") {
            self.device
        } else {
            None
        }
    }
}
