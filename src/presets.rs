//! Preset position learning and matching.
//!
//! The controller stores preset positions internally but never reports
//! their coordinates, so the driver learns them: when a recall is issued
//! the target preset becomes *pending*, and when movement stops the live
//! `(elevation, azimuth)` is captured as that preset's position. Matching
//! the live position against the learned table then tells consumers which
//! preset the mount is currently sitting at.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::protocol::{MmqStatus, Preset};

/// Maximum per-axis difference, in device units, between the live position
/// and a learned preset still considered "at" that preset.
pub const POSITION_TOLERANCE: i32 = 3;

/// Learned coordinates of a preset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PresetPosition {
    pub elevation: i32,
    pub azimuth: i32,
}

/// Learned preset positions, in insertion order.
///
/// Iteration order is the order presets were first learned (or restored),
/// which keeps first-match classification deterministic.
#[derive(Debug, Clone, Default, Serialize)]
pub struct PresetStore {
    entries: Vec<(Preset, PresetPosition)>,
}

impl PresetStore {
    /// Insert or update a preset's position. Updating keeps the preset's
    /// original position in the iteration order.
    pub fn insert(&mut self, preset: Preset, position: PresetPosition) {
        if let Some(entry) = self.entries.iter_mut().find(|(p, _)| *p == preset) {
            entry.1 = position;
        } else {
            self.entries.push((preset, position));
        }
    }

    pub fn get(&self, preset: Preset) -> Option<PresetPosition> {
        self.entries
            .iter()
            .find(|(p, _)| *p == preset)
            .map(|(_, pos)| *pos)
    }

    pub fn iter(&self) -> impl Iterator<Item = (Preset, PresetPosition)> + '_ {
        self.entries.iter().copied()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// A recall was refused because another recall is still in flight.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecallError {
    #[error("recall to {requested} refused; mount is still moving toward {pending}")]
    Busy { requested: Preset, pending: Preset },
}

/// Tracks the pending recall target and maintains the learned store.
pub struct PresetEngine {
    store: PresetStore,
    pending: Option<Preset>,
    tolerance: i32,
}

impl PresetEngine {
    pub fn new() -> Self {
        Self::with_tolerance(POSITION_TOLERANCE)
    }

    pub fn with_tolerance(tolerance: i32) -> Self {
        Self {
            store: PresetStore::default(),
            pending: None,
            tolerance,
        }
    }

    /// The preset currently being moved toward, if any.
    pub fn pending(&self) -> Option<Preset> {
        self.pending
    }

    /// The learned position table.
    pub fn store(&self) -> &PresetStore {
        &self.store
    }

    /// Pre-populate the store from previously persisted coordinates.
    pub fn restore<I>(&mut self, triples: I)
    where
        I: IntoIterator<Item = (Preset, i32, i32)>,
    {
        let mut count = 0usize;
        for (preset, elevation, azimuth) in triples {
            self.store.insert(
                preset,
                PresetPosition {
                    elevation,
                    azimuth,
                },
            );
            count += 1;
        }
        if count > 0 {
            info!("restored {count} learned preset(s) from previous session");
        }
    }

    /// A recall command is about to be dispatched.
    ///
    /// Refused when a *different* preset is pending and the mount is still
    /// moving toward it; recording a new target mid-flight would corrupt
    /// the learned coordinate of the in-flight one. A refusal changes no
    /// state and the caller must not dispatch.
    pub fn on_recall_issued(&mut self, preset: Preset, moving: bool) -> Result<(), RecallError> {
        if let Some(pending) = self.pending {
            if moving && pending != preset {
                return Err(RecallError::Busy {
                    requested: preset,
                    pending,
                });
            }
        }
        debug!("recall issued, pending preset set to {preset}");
        self.pending = Some(preset);
        Ok(())
    }

    /// A stop or jog command is about to be dispatched; either invalidates
    /// whatever destination was implied by an earlier recall.
    pub fn on_stop_or_jog(&mut self) {
        if let Some(pending) = self.pending.take() {
            debug!("pending preset {pending} cleared by stop/jog");
        }
    }

    /// Movement has stopped: capture the live position under the pending
    /// preset, if both exist. Never stores a placeholder coordinate.
    pub fn on_movement_stopped(&mut self, status: Option<&MmqStatus>) {
        let Some(pending) = self.pending else {
            return;
        };
        let Some(status) = status else {
            warn!("movement stopped but no status sample available; not learning {pending}");
            return;
        };

        let position = PresetPosition {
            elevation: status.elevation,
            azimuth: status.azimuth,
        };
        self.store.insert(pending, position);
        info!(
            "learned position for preset {}: elevation={}, azimuth={}",
            pending, position.elevation, position.azimuth
        );
        self.pending = None;
    }

    /// Classify the live position as a preset, if any matches.
    ///
    /// While moving toward a pending preset the destination is reported
    /// optimistically. Otherwise the first learned entry within the
    /// tolerance band on both axes wins.
    pub fn classify(&self, status: Option<&MmqStatus>, moving: bool) -> Option<Preset> {
        if moving {
            if let Some(pending) = self.pending {
                return Some(pending);
            }
        }

        let status = status?;
        self.store
            .iter()
            .find(|(_, pos)| {
                (status.elevation - pos.elevation).abs() <= self.tolerance
                    && (status.azimuth - pos.azimuth).abs() <= self.tolerance
            })
            .map(|(preset, _)| preset)
    }
}

impl Default for PresetEngine {
    fn default() -> Self {
        Self::new()
    }
}
