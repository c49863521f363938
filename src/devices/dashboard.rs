use std::collections::HashMap;
use std::time::Duration;

use chrono::Utc;
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use serde_json::Value;
use tokio::sync::mpsc;

use super::client::DeviceClient;
use super::models::DeviceSnapshot;
use super::reconcile::Reconciler;
use crate::api::ApiError;
use crate::utils::format::format_clock;

/// A settled auto-stop call: the device name and, on success, the
/// server's authoritative snapshot.
type StopSettlement = (String, Option<DeviceSnapshot>);

/// Owns the reconciler and drives it against the server: the live
/// `watch` loop, manual start/cancel, and optimistic control with
/// full-resync recovery.
pub struct Dashboard {
    devices: DeviceClient,
    recon: Reconciler,
}

impl Dashboard {
    pub async fn load(devices: DeviceClient) -> Result<Self, ApiError> {
        let snapshots = devices.list().await?;
        Ok(Self {
            devices,
            recon: Reconciler::new(snapshots),
        })
    }

    pub fn reconciler(&self) -> &Reconciler {
        &self.recon
    }

    /// Manual start/cancel. Timing must be server-authoritative, so
    /// the response snapshot unconditionally replaces the local one.
    pub async fn start(&mut self, name: &str) -> Result<Option<&DeviceSnapshot>, ApiError> {
        if let Some(device) = self.devices.simulate(name, Utc::now()).await? {
            self.recon.replace(name, device);
        }
        Ok(self.recon.get(name))
    }

    /// Manual control: optimistic local patch first, then the server
    /// call. On failure the optimistic assumption is discarded by
    /// resyncing every snapshot from the server, with no fine-grained
    /// rollback. Returns false when the action was recovered that way.
    pub async fn control(
        &mut self,
        name: &str,
        command: &str,
        value: &Value,
    ) -> Result<bool, ApiError> {
        self.recon.apply_optimistic(name, command, value, Utc::now());

        match self.devices.control(name, command, value).await {
            Ok(()) => Ok(true),
            // A torn-down session cannot resync; surface it instead.
            Err(err) if err.is_fatal_auth() => Err(err),
            Err(err) => {
                tracing::warn!(device = name, error = %err, "control failed, resyncing");
                let snapshots = self.devices.list().await?;
                self.recon.replace_all(snapshots);
                Ok(false)
            }
        }
    }

    /// Live countdown loop on a one-second cadence, until Ctrl-C.
    ///
    /// Each tick body runs to completion before anything else is
    /// polled: countdown recompute, stopping-set insertion, and the
    /// render all happen synchronously, and only then are the stop
    /// calls dispatched as detached tasks. Their settlements come back
    /// over a channel and release the guard whether they succeeded or
    /// not; errors are logged and absorbed.
    pub async fn watch(mut self) -> Result<(), ApiError> {
        let mut view = WatchView::new();
        let mut ticker = tokio::time::interval(Duration::from_secs(1));
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        let (settled_tx, mut settled_rx) = mpsc::unbounded_channel::<StopSettlement>();

        view.render(&self.recon);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let outcome = self.recon.tick(Utc::now());

                    for name in outcome.to_stop {
                        tracing::info!(device = %name, "countdown finished, stopping");
                        let devices = self.devices.clone();
                        let settled_tx = settled_tx.clone();
                        tokio::spawn(async move {
                            let snapshot = match devices.simulate(&name, Utc::now()).await {
                                Ok(snapshot) => snapshot,
                                Err(err) => {
                                    tracing::warn!(device = %name, error = %err, "auto-stop failed");
                                    None
                                }
                            };
                            // The receiver may be gone if the watch
                            // ended; nothing left to update then.
                            let _ = settled_tx.send((name, snapshot));
                        });
                    }

                    view.render(&self.recon);
                }
                Some((name, snapshot)) = settled_rx.recv() => {
                    self.recon.finish_stop(&name, snapshot);
                    view.render(&self.recon);
                }
                _ = tokio::signal::ctrl_c() => {
                    tracing::debug!("watch interrupted");
                    break;
                }
            }
        }

        view.finish();
        Ok(())
    }
}

/// One progress bar per operating device, keyed by device name.
struct WatchView {
    multi: MultiProgress,
    bars: HashMap<String, ProgressBar>,
}

impl WatchView {
    fn new() -> Self {
        Self {
            multi: MultiProgress::new(),
            bars: HashMap::new(),
        }
    }

    fn render(&mut self, recon: &Reconciler) {
        for (name, device) in recon.snapshots() {
            let counting_down = device.status.is_operating() && device.total_time > 0;

            if counting_down {
                let bar = self.bars.entry(name.clone()).or_insert_with(|| {
                    let bar = self.multi.add(ProgressBar::new(device.total_time as u64));
                    bar.set_style(
                        ProgressStyle::default_bar()
                            .template("{prefix:>16} [{bar:30.cyan/blue}] {msg}")
                            .unwrap()
                            .progress_chars("#>-"),
                    );
                    bar.set_prefix(name.clone());
                    bar
                });
                let done = (device.total_time - device.remaining_time).max(0);
                bar.set_position(done as u64);
                if recon.is_stopping(name) {
                    bar.set_message("stopping...");
                } else {
                    bar.set_message(format!("{} left", format_clock(device.remaining_time)));
                }
            } else if let Some(bar) = self.bars.remove(name) {
                bar.finish_with_message(device.status.label().to_string());
            }
        }
    }

    fn finish(&mut self) {
        for bar in self.bars.values() {
            bar.abandon();
        }
        self.bars.clear();
    }
}
