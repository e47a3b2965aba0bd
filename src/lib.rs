//! Driver for the MantelMount MM860 motorized TV mount.
//!
//! The MM860 is controlled over a plain-text UDP protocol: short command
//! tokens terminated with CR (or CRLF), sent to port 81 on the mount's
//! controller. The controller answers the `MMQ` status query with a single
//! comma-separated telemetry line; movement commands reply with a short echo
//! or nothing at all.
//!
//! The crate is organized around one context object per physical mount:
//!
//! - [`client`] - one-shot UDP transport with a bounded reply wait
//! - [`protocol`] - status line parsing and preset identifiers
//! - [`command`] - the typed wire command vocabulary
//! - [`coordinator`] - status polling and motion-state derivation
//! - [`presets`] - preset position learning and matching
//! - [`guard`] - the lock-while-moving admission policy
//! - [`device`] - [`MountDevice`], which ties the above together
//! - [`poller`] - background polling task for long-running hosts
//!
//! # Example
//!
//! ```no_run
//! use mantelmount::{MountCommand, MountConfig, MountDevice, Preset};
//!
//! # async fn demo() -> Result<(), mantelmount::MountError> {
//! let mut mount = MountDevice::new(MountConfig::new("192.168.1.81"));
//!
//! // One status round-trip; derives the moving flag from actuator deltas.
//! mount.poll_once().await?;
//! println!("moving: {}", mount.is_moving());
//!
//! // Drive to a stored preset. When movement stops, the stop position is
//! // learned as that preset's coordinates.
//! mount.send_command(MountCommand::Recall(Preset::M1)).await?;
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod command;
pub mod coordinator;
pub mod device;
pub mod guard;
pub mod poller;
pub mod presets;
pub mod protocol;

pub use client::{ClientError, MountClient, MountResponse, DEFAULT_PORT, DEFAULT_TIMEOUT};
pub use command::MountCommand;
pub use coordinator::{ListenerHandle, PollCoordinator, PollData, PollTick, StopListener};
pub use device::{
    CommandRecord, Diagnostics, MountConfig, MountDevice, MountError, MountInfo, MANUFACTURER,
    MODEL,
};
pub use guard::{CommandGuard, Denied};
pub use poller::MountPoller;
pub use presets::{PresetEngine, PresetPosition, PresetStore, RecallError, POSITION_TOLERANCE};
pub use protocol::{parse_mmq, MmqStatus, Preset, STATUS_QUERY};
