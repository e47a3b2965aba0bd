//! Status polling and motion-state derivation.
//!
//! The MM860 reports no explicit "moving" flag, so motion is derived from
//! the actuator positions of consecutive status samples: any change in
//! either actuator between one tick and the next means the mount is in
//! motion. The interesting edge is moving -> stopped, which is when the
//! mount has arrived somewhere; registered listeners are notified exactly
//! once per transition.

use anyhow::Result;
use tracing::{debug, error};

use crate::client::{ClientError, MountClient};
use crate::protocol::{parse_mmq, MmqStatus, STATUS_QUERY};

/// Result of one poll tick, as exposed to consumers.
#[derive(Debug, Clone, Default)]
pub struct PollData {
    /// Whether the tick produced a parseable status sample.
    pub ok: bool,
    /// The sample, when `ok`.
    pub status: Option<MmqStatus>,
    /// Motion flag derived from consecutive samples. False on failed ticks
    /// and on the first sample after (re)start.
    pub moving: bool,
    /// Raw reply text, retained even when unparseable.
    pub last_raw: String,
}

/// Outcome of folding one reply into the coordinator.
#[derive(Debug, Clone)]
pub struct PollTick {
    pub data: PollData,
    /// True when this tick observed the moving -> stopped transition.
    pub stopped: bool,
}

/// Movement-stopped callback. Receives the tick that observed the stop.
///
/// A listener returning an error is logged and isolated; it cannot abort
/// the tick or starve the listeners after it.
pub type StopListener = Box<dyn FnMut(&PollData) -> Result<()> + Send>;

/// Handle for unsubscribing a movement-stopped listener.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ListenerHandle(u64);

/// Polls the mount and tracks motion state across ticks.
///
/// Owns the transport client and all mutable poll state; nothing outside
/// the coordinator writes to either.
pub struct PollCoordinator {
    client: MountClient,
    prev_left: Option<i32>,
    prev_right: Option<i32>,
    was_moving: bool,
    data: Option<PollData>,
    listeners: Vec<(ListenerHandle, StopListener)>,
    next_listener: u64,
}

impl PollCoordinator {
    pub fn new(client: MountClient) -> Self {
        Self {
            client,
            prev_left: None,
            prev_right: None,
            was_moving: false,
            data: None,
            listeners: Vec::new(),
            next_listener: 0,
        }
    }

    /// The transport client, shared with command dispatch paths.
    pub fn client(&self) -> &MountClient {
        &self.client
    }

    /// Register a movement-stopped listener. Listeners fire synchronously
    /// during the tick that observes the transition, in registration order.
    pub fn subscribe_movement_stopped(&mut self, listener: StopListener) -> ListenerHandle {
        let handle = ListenerHandle(self.next_listener);
        self.next_listener += 1;
        self.listeners.push((handle, listener));
        handle
    }

    /// Remove a previously registered listener. Unknown handles are a no-op.
    pub fn unsubscribe(&mut self, handle: ListenerHandle) {
        self.listeners.retain(|(h, _)| *h != handle);
    }

    /// Send one status query and fold the reply into the motion state.
    ///
    /// A dispatch failure is returned as-is and leaves all state untouched;
    /// the next scheduled tick retries naturally.
    pub async fn poll_once(&mut self) -> Result<PollTick, ClientError> {
        let resp = self.client.send(STATUS_QUERY, true, true).await?;
        Ok(self.ingest(&resp.raw))
    }

    /// Fold one raw reply into the motion state machine.
    ///
    /// Separated from the network round-trip so the state machine can be
    /// exercised directly.
    pub fn ingest(&mut self, raw: &str) -> PollTick {
        let Some(status) = parse_mmq(raw) else {
            debug!("unparseable status reply: {:?}", raw);
            let data = PollData {
                ok: false,
                status: None,
                moving: false,
                last_raw: raw.trim().to_string(),
            };
            self.data = Some(data.clone());
            return PollTick {
                data,
                stopped: false,
            };
        };

        let left = status.left_actuator;
        let right = status.right_actuator;

        // Motion is a position delta between consecutive samples. The first
        // sample after (re)start has nothing to diff against and reports
        // not-moving by convention.
        let moving = match (self.prev_left, self.prev_right) {
            (Some(prev_left), Some(prev_right)) => left != prev_left || right != prev_right,
            _ => false,
        };

        let stopped = self.was_moving && !moving;

        let data = PollData {
            ok: true,
            moving,
            last_raw: status.raw.clone(),
            status: Some(status),
        };

        if stopped {
            debug!(
                "movement stopped, notifying {} listener(s)",
                self.listeners.len()
            );
            for (handle, listener) in &mut self.listeners {
                if let Err(e) = listener(&data) {
                    error!("movement-stopped listener {:?} failed: {e:#}", handle);
                }
            }
        }

        self.was_moving = moving;
        self.prev_left = Some(left);
        self.prev_right = Some(right);
        self.data = Some(data.clone());

        PollTick { data, stopped }
    }

    /// The most recent tick result, if any tick has run.
    pub fn data(&self) -> Option<&PollData> {
        self.data.as_ref()
    }

    /// The most recent status sample, if the last successful tick has one.
    pub fn current_status(&self) -> Option<&MmqStatus> {
        self.data.as_ref()?.status.as_ref()
    }

    /// Motion flag from the most recent tick. False before the first tick.
    pub fn is_moving(&self) -> bool {
        self.data.as_ref().map(|d| d.moving).unwrap_or(false)
    }
}
