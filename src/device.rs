//! Per-device context: one [`MountDevice`] per physical mount.
//!
//! The device object owns the poll coordinator (which owns the transport),
//! the preset engine, the admission guard and the last-command record, so
//! all mutable state for one mount lives behind one `&mut self`. Sharing a
//! device across tasks goes through `Arc<tokio::sync::Mutex<MountDevice>>`,
//! which serializes poll ticks against externally triggered command
//! dispatches.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::client::{ClientError, MountClient, MountResponse, DEFAULT_PORT, DEFAULT_TIMEOUT};
use crate::command::MountCommand;
use crate::coordinator::{ListenerHandle, PollCoordinator, PollData, StopListener};
use crate::guard::{CommandGuard, Denied};
use crate::presets::{PresetEngine, PresetStore, RecallError};
use crate::protocol::{MmqStatus, Preset};

/// Device vendor name, for presentation layers.
pub const MANUFACTURER: &str = "MantelMount";

/// Device model name, for presentation layers.
pub const MODEL: &str = "MM860";

/// Default status poll period. 100ms matches the vendor's Windows app.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Connection and behavior settings, fixed for the lifetime of a device
/// instance. Changing them means tearing the instance down and rebuilding.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MountConfig {
    /// Mount controller IP address or hostname.
    pub host: String,
    /// Controller UDP port.
    #[serde(default = "default_port")]
    pub port: u16,
    /// Per-call reply timeout in seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: f64,
    /// Status poll period in seconds.
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: f64,
    /// Refuse movement commands while the mount is in motion.
    #[serde(default = "default_lock_while_moving")]
    pub lock_while_moving: bool,
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

fn default_timeout_secs() -> f64 {
    DEFAULT_TIMEOUT.as_secs_f64()
}

fn default_poll_interval_secs() -> f64 {
    DEFAULT_POLL_INTERVAL.as_secs_f64()
}

fn default_lock_while_moving() -> bool {
    true
}

impl MountConfig {
    /// Config for `host` with all defaults.
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            port: default_port(),
            timeout_secs: default_timeout_secs(),
            poll_interval_secs: default_poll_interval_secs(),
            lock_while_moving: default_lock_while_moving(),
        }
    }

    /// Reply timeout as a [`Duration`]; invalid values fall back to the
    /// default.
    pub fn timeout(&self) -> Duration {
        Duration::try_from_secs_f64(self.timeout_secs).unwrap_or(DEFAULT_TIMEOUT)
    }

    /// Poll period as a [`Duration`]; invalid values fall back to the
    /// default.
    pub fn poll_interval(&self) -> Duration {
        Duration::try_from_secs_f64(self.poll_interval_secs).unwrap_or(DEFAULT_POLL_INTERVAL)
    }
}

/// Last issued command and its raw reply, kept for diagnostics only; never
/// consulted by control logic.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CommandRecord {
    pub command: String,
    pub reply: String,
}

/// Static identity of the mount, projected from the current status sample.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MountInfo {
    pub manufacturer: &'static str,
    pub model: &'static str,
    pub firmware_version: Option<i32>,
    pub configuration_url: String,
}

/// Serializable snapshot of the device state, for bug reports and support
/// dumps.
#[derive(Debug, Clone, Serialize)]
pub struct Diagnostics {
    pub config: MountConfig,
    pub ok: bool,
    pub moving: bool,
    pub status: Option<MmqStatus>,
    pub last_command: Option<CommandRecord>,
    pub learned_presets: PresetStore,
    pub pending_preset: Option<Preset>,
}

/// Errors surfaced by device-level operations.
#[derive(Error, Debug)]
pub enum MountError {
    /// Transport failure while dispatching; retried naturally by the next
    /// poll tick, never fatal.
    #[error("dispatch failed: {0}")]
    Transport(#[from] ClientError),

    /// Refused by the lock-while-moving policy. Nothing was sent.
    #[error("{0}")]
    Denied(#[from] Denied),

    /// Refused by the preset engine's busy guard. Nothing was sent.
    #[error("{0}")]
    Recall(#[from] RecallError),
}

/// One physical MM860 mount.
pub struct MountDevice {
    config: MountConfig,
    coordinator: PollCoordinator,
    presets: PresetEngine,
    guard: CommandGuard,
    last_command: Option<CommandRecord>,
}

impl MountDevice {
    pub fn new(config: MountConfig) -> Self {
        let client = MountClient::new(config.host.clone(), config.port, config.timeout());
        Self {
            coordinator: PollCoordinator::new(client),
            presets: PresetEngine::new(),
            guard: CommandGuard::new(config.lock_while_moving),
            last_command: None,
            config,
        }
    }

    pub fn config(&self) -> &MountConfig {
        &self.config
    }

    /// Run one poll tick.
    ///
    /// On the moving -> stopped edge the preset engine captures the stop
    /// position under the pending preset, using the same tick's sample.
    /// External movement-stopped listeners fire inside the tick as well.
    pub async fn poll_once(&mut self) -> Result<PollData, ClientError> {
        let tick = self.coordinator.poll_once().await?;
        if tick.stopped {
            self.presets.on_movement_stopped(tick.data.status.as_ref());
        }
        Ok(tick.data)
    }

    /// Dispatch a typed command.
    ///
    /// Admission runs first: a command denied by the lock-while-moving
    /// policy, or a recall refused by the busy guard, returns an error
    /// without touching the wire or any state. Stop and jog commands clear
    /// the pending preset before they are sent; a recall sets it.
    pub async fn send_command(&mut self, command: MountCommand) -> Result<MountResponse, MountError> {
        let moving = self.is_moving();
        self.guard.admit(command.bypasses_lock(), moving)?;

        if let MountCommand::Recall(preset) = command {
            self.presets.on_recall_issued(preset, moving)?;
        }
        if command.clears_pending() {
            self.presets.on_stop_or_jog();
        }

        self.dispatch(&command.text(), command.crlf(), true).await
    }

    /// Dispatch a raw command string; the escape hatch for tokens outside
    /// the typed vocabulary. Subject to the lock-while-moving policy.
    pub async fn send_raw(
        &mut self,
        command: &str,
        crlf: bool,
        read_reply: bool,
    ) -> Result<MountResponse, MountError> {
        self.guard.admit(false, self.is_moving())?;
        self.dispatch(command, crlf, read_reply).await
    }

    async fn dispatch(
        &mut self,
        text: &str,
        crlf: bool,
        read_reply: bool,
    ) -> Result<MountResponse, MountError> {
        let resp = self.coordinator.client().send(text, crlf, read_reply).await?;
        debug!("command {:?} replied {:?}", resp.command, resp.raw);
        self.last_command = Some(CommandRecord {
            command: resp.command.clone(),
            reply: resp.raw.clone(),
        });
        Ok(resp)
    }

    /// The most recent status sample, if the last tick parsed one.
    pub fn current_status(&self) -> Option<&MmqStatus> {
        self.coordinator.current_status()
    }

    /// Motion flag from the most recent tick.
    pub fn is_moving(&self) -> bool {
        self.coordinator.is_moving()
    }

    /// Which preset the mount is currently at (or moving toward), if known.
    pub fn current_preset(&self) -> Option<Preset> {
        self.presets
            .classify(self.coordinator.current_status(), self.coordinator.is_moving())
    }

    /// The learned preset position table.
    pub fn learned_presets(&self) -> &PresetStore {
        self.presets.store()
    }

    /// The preset a recall is currently in flight toward, if any.
    pub fn pending_preset(&self) -> Option<Preset> {
        self.presets.pending()
    }

    /// Pre-populate learned presets from previously persisted coordinates.
    pub fn restore_presets<I>(&mut self, triples: I)
    where
        I: IntoIterator<Item = (Preset, i32, i32)>,
    {
        self.presets.restore(triples);
    }

    /// Register a movement-stopped listener on the coordinator.
    pub fn subscribe_movement_stopped(&mut self, listener: StopListener) -> ListenerHandle {
        self.coordinator.subscribe_movement_stopped(listener)
    }

    /// Remove a previously registered movement-stopped listener.
    pub fn unsubscribe_movement_stopped(&mut self, handle: ListenerHandle) {
        self.coordinator.unsubscribe(handle)
    }

    /// Device identity projected from the current sample.
    pub fn mount_info(&self) -> MountInfo {
        MountInfo {
            manufacturer: MANUFACTURER,
            model: MODEL,
            firmware_version: self.current_status().map(|s| s.firmware_version),
            configuration_url: format!("http://{}:{}/", self.config.host, self.config.port),
        }
    }

    /// Last issued command and reply, if any.
    pub fn last_command(&self) -> Option<&CommandRecord> {
        self.last_command.as_ref()
    }

    /// Snapshot the device state for a support dump.
    pub fn diagnostics(&self) -> Diagnostics {
        let data = self.coordinator.data();
        Diagnostics {
            config: self.config.clone(),
            ok: data.map(|d| d.ok).unwrap_or(false),
            moving: self.is_moving(),
            status: self.current_status().cloned(),
            last_command: self.last_command.clone(),
            learned_presets: self.presets.store().clone(),
            pending_preset: self.presets.pending(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn device() -> MountDevice {
        MountDevice::new(MountConfig::new("127.0.0.1"))
    }

    fn line(left: i32, right: i32) -> String {
        format!("MMQ1,50,10,{left},{right},0,42,1,0,312,0,150,0,0,95,97")
    }

    fn make_moving(device: &mut MountDevice) {
        device.coordinator.ingest(&line(100, 100));
        device.coordinator.ingest(&line(150, 120));
        assert!(device.is_moving());
    }

    #[tokio::test]
    async fn jog_is_denied_while_moving_without_touching_the_wire() {
        let mut device = device();
        make_moving(&mut device);

        // Denial happens before dispatch; nothing is sent, so this resolves
        // immediately even with no mount listening.
        let err = device.send_command(MountCommand::JogUp).await.unwrap_err();
        assert!(matches!(err, MountError::Denied(Denied::LockedWhileMoving)));
        assert!(device.last_command().is_none());
    }

    #[tokio::test]
    async fn busy_recall_is_refused_before_dispatch() {
        let mut device = device();
        device.presets.on_recall_issued(Preset::M1, false).unwrap();
        make_moving(&mut device);

        let err = device
            .send_command(MountCommand::Recall(Preset::M2))
            .await
            .unwrap_err();
        assert!(matches!(err, MountError::Recall(RecallError::Busy { .. })));
        assert_eq!(device.pending_preset(), Some(Preset::M1));
        assert!(device.last_command().is_none());
    }

    #[test]
    fn stopping_edge_learns_the_pending_preset() {
        let mut device = device();
        device.presets.on_recall_issued(Preset::M3, false).unwrap();

        device.coordinator.ingest(&line(100, 100));
        device.coordinator.ingest(&line(150, 120));
        let tick = device.coordinator.ingest(&line(150, 120));
        // Mirror what poll_once does after the coordinator tick.
        if tick.stopped {
            device.presets.on_movement_stopped(tick.data.status.as_ref());
        }

        assert_eq!(
            device.learned_presets().get(Preset::M3),
            Some(crate::presets::PresetPosition {
                elevation: 50,
                azimuth: 10
            })
        );
        assert_eq!(device.pending_preset(), None);
        assert_eq!(device.current_preset(), Some(Preset::M3));
    }

    #[test]
    fn current_preset_reports_destination_while_moving() {
        let mut device = device();
        device.presets.on_recall_issued(Preset::M2, false).unwrap();
        make_moving(&mut device);
        assert_eq!(device.current_preset(), Some(Preset::M2));
    }

    #[test]
    fn mount_info_projects_firmware_from_the_sample() {
        let mut device = device();
        assert_eq!(device.mount_info().firmware_version, None);

        device.coordinator.ingest(&line(100, 100));
        let info = device.mount_info();
        assert_eq!(info.manufacturer, "MantelMount");
        assert_eq!(info.model, "MM860");
        assert_eq!(info.firmware_version, Some(312));
        assert_eq!(info.configuration_url, "http://127.0.0.1:81/");
    }

    #[test]
    fn diagnostics_snapshot_serializes() {
        let mut device = device();
        device.coordinator.ingest(&line(100, 100));
        device.restore_presets([(Preset::Home, 0, 0)]);

        let json = serde_json::to_value(device.diagnostics()).unwrap();
        assert_eq!(json["ok"], true);
        assert_eq!(json["moving"], false);
        assert_eq!(json["config"]["port"], 81);
        assert_eq!(json["status"]["firmware_version"], 312);
    }

    #[test]
    fn config_duration_accessors_reject_nonsense() {
        let mut config = MountConfig::new("mount");
        config.timeout_secs = -1.0;
        assert_eq!(config.timeout(), DEFAULT_TIMEOUT);
        config.poll_interval_secs = f64::NAN;
        assert_eq!(config.poll_interval(), DEFAULT_POLL_INTERVAL);
    }
}
