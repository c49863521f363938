use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Utc};
use serde_json::Value;

use super::models::DeviceSnapshot;

/// What one tick decided: whether any displayed value changed, and
/// which devices crossed the `>0 -> 0` edge and need a stop call. The
/// named devices are already in the stopping-set when this is returned;
/// the caller dispatches the calls and reports back via `finish_stop`.
#[derive(Debug, Default)]
pub struct TickOutcome {
    pub changed: bool,
    pub to_stop: Vec<String>,
}

/// Local mirror of server-reported device state plus the stopping-set
/// guard. Time advances through the injected `now` argument, so the
/// whole state machine runs under test without real timers.
#[derive(Debug, Default)]
pub struct Reconciler {
    snapshots: HashMap<String, DeviceSnapshot>,
    stopping: HashSet<String>,
}

impl Reconciler {
    pub fn new(snapshots: HashMap<String, DeviceSnapshot>) -> Self {
        Self {
            snapshots,
            stopping: HashSet::new(),
        }
    }

    pub fn snapshots(&self) -> &HashMap<String, DeviceSnapshot> {
        &self.snapshots
    }

    pub fn get(&self, name: &str) -> Option<&DeviceSnapshot> {
        self.snapshots.get(name)
    }

    pub fn is_stopping(&self, name: &str) -> bool {
        self.stopping.contains(name)
    }

    /// Advance every operating countdown to `now`.
    ///
    /// Remaining time is derived from the server's cycle start instant,
    /// clamped to `[0, total_time]`. A device whose displayed value
    /// crosses from `>0` to exactly 0 is marked for a one-shot stop
    /// call and inserted into the stopping-set before this returns;
    /// the membership check and the insertion happen in the same
    /// synchronous pass, which is what keeps the next tick from
    /// double-dispatching while the call is still in flight.
    pub fn tick(&mut self, now: DateTime<Utc>) -> TickOutcome {
        let mut outcome = TickOutcome::default();

        for (name, device) in &mut self.snapshots {
            if !device.status.is_operating() {
                continue;
            }
            let Some(started) = device.cycle_start_timestamp else {
                continue;
            };

            let total = device.total_time.max(0);
            let elapsed = (now - started).num_seconds();
            let remaining = (total - elapsed).clamp(0, total);

            let previous = device.remaining_time;
            if previous != remaining {
                device.remaining_time = remaining;
                outcome.changed = true;
            }

            if remaining == 0 && previous > 0 && !self.stopping.contains(name) {
                self.stopping.insert(name.clone());
                outcome.to_stop.push(name.clone());
            }
        }

        outcome
    }

    /// A stop call settled. The guard is released unconditionally; the
    /// snapshot is replaced only when the server returned one.
    pub fn finish_stop(&mut self, name: &str, authoritative: Option<DeviceSnapshot>) {
        self.stopping.remove(name);
        if let Some(device) = authoritative {
            self.snapshots.insert(name.to_string(), device);
        }
    }

    /// Server-authoritative replacement for one device (start/cancel
    /// responses).
    pub fn replace(&mut self, name: &str, device: DeviceSnapshot) {
        self.snapshots.insert(name.to_string(), device);
    }

    /// Full resync: the recovery path after a failed manual control.
    pub fn replace_all(&mut self, snapshots: HashMap<String, DeviceSnapshot>) {
        self.snapshots = snapshots;
    }

    /// Optimistic local patch for a manual control action, applied
    /// before the server call goes out. Course changes rewrite the
    /// duration bookkeeping from the course table; power toggles stamp
    /// or clear the power-on instant. Unknown commands land in the
    /// snapshot's extra fields so the display stays coherent with what
    /// was sent.
    pub fn apply_optimistic(
        &mut self,
        name: &str,
        command: &str,
        value: &Value,
        now: DateTime<Utc>,
    ) -> bool {
        let Some(device) = self.snapshots.get_mut(name) else {
            return false;
        };

        match command {
            "power" => {
                let on = value.as_str() == Some("on");
                device.power = value.as_str().map(str::to_string);
                device.power_on_timestamp = on.then_some(now);
            }
            "course" => {
                if let Some(course) = value.as_str() {
                    device.course = Some(course.to_string());
                    if let Some(time) = device
                        .course_times
                        .as_ref()
                        .and_then(|times| times.get(course))
                        .copied()
                    {
                        device.total_time = time;
                        device.remaining_time = time;
                    }
                }
            }
            "mode" => device.mode = value.as_str().map(str::to_string),
            "temperature" => device.temperature = value.as_i64(),
            other => {
                device.extra.insert(other.to_string(), value.clone());
            }
        }

        true
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use chrono::{DateTime, Duration, Utc};
    use serde_json::json;

    use super::Reconciler;
    use crate::devices::models::{DeviceSnapshot, DeviceStatus};

    fn t0() -> DateTime<Utc> {
        DateTime::parse_from_rfc3339("2025-06-01T12:00:00Z")
            .unwrap()
            .with_timezone(&Utc)
    }

    fn washer(total: i64, started_secs_ago: i64) -> DeviceSnapshot {
        let mut device: DeviceSnapshot = serde_json::from_value(json!({
            "status": "running",
            "power": "on",
            "type": "washer",
            "total_time": total,
            "remaining_time": total,
        }))
        .unwrap();
        device.cycle_start_timestamp = Some(t0() - Duration::seconds(started_secs_ago));
        device
    }

    fn single(name: &str, device: DeviceSnapshot) -> Reconciler {
        let mut map = HashMap::new();
        map.insert(name.to_string(), device);
        Reconciler::new(map)
    }

    #[test]
    fn countdown_decreases_and_never_increases() {
        let mut recon = single("Washer1", washer(600, 10));

        let mut previous = i64::MAX;
        for i in 0..5i64 {
            recon.tick(t0() + Duration::seconds(i));
            let remaining = recon.get("Washer1").unwrap().remaining_time;
            assert!(remaining <= previous, "remaining time went up");
            previous = remaining;
        }
        assert_eq!(previous, 600 - 14);
    }

    #[test]
    fn remaining_time_is_clamped_to_zero_and_total() {
        // Start instant in the future (clock skew right after a start
        // action): clamp to total, never above.
        let mut future = washer(600, 0);
        future.cycle_start_timestamp = Some(t0() + Duration::seconds(30));
        let mut recon = single("Washer1", future);
        recon.tick(t0());
        assert_eq!(recon.get("Washer1").unwrap().remaining_time, 600);

        // Long past the end: clamp to zero, never below.
        let mut recon = single("Washer1", washer(600, 4000));
        recon.tick(t0());
        assert_eq!(recon.get("Washer1").unwrap().remaining_time, 0);
    }

    #[test]
    fn unchanged_tick_reports_no_change() {
        let mut recon = single("Washer1", washer(600, 4000));
        recon.tick(t0());
        let outcome = recon.tick(t0());
        assert!(!outcome.changed);
        assert!(outcome.to_stop.is_empty());
    }

    #[test]
    fn zero_edge_fires_exactly_one_stop() {
        // total 600, started 598s ago: remaining 2.
        let mut recon = single("Washer1", washer(600, 598));

        let outcome = recon.tick(t0());
        assert_eq!(recon.get("Washer1").unwrap().remaining_time, 2);
        assert!(outcome.to_stop.is_empty());

        // Two seconds later the countdown reaches zero.
        let outcome = recon.tick(t0() + Duration::seconds(2));
        assert_eq!(recon.get("Washer1").unwrap().remaining_time, 0);
        assert_eq!(outcome.to_stop, vec!["Washer1".to_string()]);
        assert!(recon.is_stopping("Washer1"));

        // Ticks keep coming while the stop call is in flight: no
        // second dispatch.
        for i in 3..8i64 {
            let outcome = recon.tick(t0() + Duration::seconds(i));
            assert!(outcome.to_stop.is_empty());
        }

        // Settlement releases the guard whether or not the server
        // returned a snapshot.
        recon.finish_stop("Washer1", None);
        assert!(!recon.is_stopping("Washer1"));

        // Still no re-dispatch: the edge was >0 -> 0 and remaining is
        // already 0.
        let outcome = recon.tick(t0() + Duration::seconds(10));
        assert!(outcome.to_stop.is_empty());
    }

    #[test]
    fn successful_stop_applies_authoritative_snapshot() {
        let mut recon = single("Washer1", washer(600, 600));
        let outcome = recon.tick(t0());
        assert_eq!(outcome.to_stop, vec!["Washer1".to_string()]);

        let done: DeviceSnapshot = serde_json::from_value(json!({
            "status": "completed",
            "power": "off",
            "type": "washer",
            "total_time": 600,
            "remaining_time": 0,
        }))
        .unwrap();
        recon.finish_stop("Washer1", Some(done));

        let device = recon.get("Washer1").unwrap();
        assert_eq!(device.status, DeviceStatus::Completed);
        assert!(!recon.is_stopping("Washer1"));
    }

    #[test]
    fn idle_devices_are_left_alone() {
        let idle: DeviceSnapshot = serde_json::from_value(json!({
            "status": "idle",
            "power": "off",
            "type": "dryer",
            "total_time": 300,
            "remaining_time": 300,
        }))
        .unwrap();
        let mut recon = single("Dryer1", idle);

        let outcome = recon.tick(t0() + Duration::seconds(30));
        assert!(!outcome.changed);
        assert_eq!(recon.get("Dryer1").unwrap().remaining_time, 300);
    }

    #[test]
    fn operating_device_without_start_instant_is_skipped() {
        let mut device = washer(600, 100);
        device.cycle_start_timestamp = None;
        let mut recon = single("Washer1", device);

        let outcome = recon.tick(t0());
        assert!(!outcome.changed);
    }

    #[test]
    fn optimistic_course_change_rewrites_durations() {
        let device: DeviceSnapshot = serde_json::from_value(json!({
            "status": "waiting",
            "power": "on",
            "type": "washer",
            "total_time": 600,
            "remaining_time": 600,
            "course": "standard",
            "courses": ["standard", "quick"],
            "course_times": { "standard": 600, "quick": 120 },
        }))
        .unwrap();
        let mut recon = single("Washer1", device);

        assert!(recon.apply_optimistic("Washer1", "course", &json!("quick"), t0()));
        let device = recon.get("Washer1").unwrap();
        assert_eq!(device.course.as_deref(), Some("quick"));
        assert_eq!(device.total_time, 120);
        assert_eq!(device.remaining_time, 120);
    }

    #[test]
    fn optimistic_power_toggle_stamps_the_instant() {
        let mut recon = single("Washer1", washer(600, 0));

        recon.apply_optimistic("Washer1", "power", &json!("off"), t0());
        let device = recon.get("Washer1").unwrap();
        assert_eq!(device.power.as_deref(), Some("off"));
        assert!(device.power_on_timestamp.is_none());

        recon.apply_optimistic("Washer1", "power", &json!("on"), t0());
        let device = recon.get("Washer1").unwrap();
        assert_eq!(device.power_on_timestamp, Some(t0()));
    }

    #[test]
    fn unknown_device_is_not_patched() {
        let mut recon = single("Washer1", washer(600, 0));
        assert!(!recon.apply_optimistic("Nope", "power", &json!("on"), t0()));
    }

    #[test]
    fn resync_replaces_everything() {
        let mut recon = single("Washer1", washer(600, 10));
        recon.tick(t0());

        let fresh: DeviceSnapshot = serde_json::from_value(json!({
            "status": "waiting",
            "power": "off",
            "type": "washer",
            "total_time": 600,
            "remaining_time": 600,
        }))
        .unwrap();
        let mut map = HashMap::new();
        map.insert("Washer1".to_string(), fresh);
        recon.replace_all(map);

        assert_eq!(recon.get("Washer1").unwrap().status, DeviceStatus::Waiting);
    }
}
