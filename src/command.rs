//! Typed wire command vocabulary for the MM860.
//!
//! Commands are short alphanumeric tokens. Encoding them as an enum keeps
//! the token table in one place and makes malformed tokens unrepresentable;
//! callers that genuinely need an arbitrary token go through the raw send
//! path instead.

use crate::protocol::{Preset, STATUS_QUERY};

/// A command the mount understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MountCommand {
    /// Stop all movement immediately.
    Stop,
    /// Step the mount up one jog increment.
    JogUp,
    /// Step the mount down one jog increment.
    JogDown,
    /// Swivel left one jog increment.
    JogLeft,
    /// Swivel right one jog increment.
    JogRight,
    /// Drive to a stored preset position.
    Recall(Preset),
    /// Store the current position under a preset slot on the controller.
    SavePreset(Preset),
    /// Clear a latched fault condition.
    ClearFault,
    /// Reboot the controller.
    Reboot,
    /// Request the telemetry status line.
    StatusQuery,
}

impl MountCommand {
    /// Wire token for this command.
    ///
    /// The up/right jog tokens are deliberately not in numeric order; the
    /// controller's J1/J2 assignment is swapped relative to the obvious
    /// reading, confirmed against the native app's traffic.
    pub fn text(self) -> String {
        match self {
            MountCommand::Stop => "MMJ0".to_string(),
            MountCommand::JogUp => "MMJ2".to_string(),
            MountCommand::JogRight => "MMJ1".to_string(),
            MountCommand::JogLeft => "MMJ3".to_string(),
            MountCommand::JogDown => "MMJ4".to_string(),
            MountCommand::Recall(preset) => format!("MMR{}", preset.index()),
            MountCommand::SavePreset(preset) => format!("MMS{}", preset.index()),
            MountCommand::ClearFault => "MMC".to_string(),
            MountCommand::Reboot => "MMG".to_string(),
            MountCommand::StatusQuery => STATUS_QUERY.to_string(),
        }
    }

    /// Whether the token is terminated with CRLF instead of bare CR.
    ///
    /// The native app sends CR for everything except the status query and
    /// the fault clear.
    pub fn crlf(self) -> bool {
        matches!(self, MountCommand::ClearFault | MountCommand::StatusQuery)
    }

    /// Whether this command is exempt from the lock-while-moving policy.
    ///
    /// Stop must always go through; recall is exempt per product policy but
    /// remains subject to the preset engine's busy refusal.
    pub fn bypasses_lock(self) -> bool {
        matches!(self, MountCommand::Stop | MountCommand::Recall(_))
    }

    /// Whether this command invalidates an in-flight preset destination.
    pub fn clears_pending(self) -> bool {
        matches!(
            self,
            MountCommand::Stop
                | MountCommand::JogUp
                | MountCommand::JogDown
                | MountCommand::JogLeft
                | MountCommand::JogRight
        )
    }
}
