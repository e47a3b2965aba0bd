//! Status line parsing for the MM860.
//!
//! The mount answers the `MMQ` query with a single line of sixteen
//! comma-separated integer fields:
//!
//! ```text
//! MMQ<status>,<elevation>,<azimuth>,<left_actuator>,<right_actuator>,
//!    <last_preset>,<temperature>,<tv_state>,<last_event_source>,
//!    <firmware_version>,<lost_flag>,<tv_current>,<left_at_limit>,
//!    <right_at_limit>,<left_motor_current>,<right_motor_current>
//! ```
//!
//! Field order matches the vendor's Control4 driver. Some firmware
//! revisions echo the query before answering, producing `MMQ...MMQ<fields>`
//! in one datagram; the parser keeps only the last marker segment.
//!
//! Parsing is all-or-nothing: a short, malformed or non-integer line yields
//! no sample at all, never a partially populated one.

use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString};

/// Status query command and reply marker.
pub const STATUS_QUERY: &str = "MMQ";

/// Number of integer fields in a status line.
const FIELD_COUNT: usize = 16;

/// Parsed `MMQ` status reply.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MmqStatus {
    /// Cleaned reply text the fields were parsed from.
    pub raw: String,
    pub status: i32,
    pub elevation: i32,
    pub azimuth: i32,
    pub left_actuator: i32,
    pub right_actuator: i32,
    pub last_preset: i32,
    pub temperature: i32,
    pub tv_state: i32,
    pub last_event_source: i32,
    pub firmware_version: i32,
    pub lost_flag: i32,
    pub tv_current: i32,
    pub left_at_limit: i32,
    pub right_at_limit: i32,
    pub left_motor_current: i32,
    pub right_motor_current: i32,
}

impl MmqStatus {
    /// Left actuator at its travel limit.
    pub fn is_left_at_limit(&self) -> bool {
        self.left_at_limit == 1
    }

    /// Right actuator at its travel limit.
    pub fn is_right_at_limit(&self) -> bool {
        self.right_at_limit == 1
    }

    /// Controller has lost its position reference.
    pub fn is_lost(&self) -> bool {
        self.lost_flag == 1
    }

    /// Preset the controller last recalled, per its own bookkeeping.
    pub fn last_recalled_preset(&self) -> Preset {
        Preset::from_status_field(self.last_preset)
    }
}

/// Named target orientation the mount can recall to.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumIter,
    EnumString,
    ValueEnum,
)]
pub enum Preset {
    Home,
    M1,
    M2,
    M3,
    M4,
    M5,
    M6,
    M7,
    M8,
    M9,
}

impl Preset {
    /// Index used by the recall and save wire commands: 0 for `Home`,
    /// 1-9 for `M1`..`M9`.
    pub fn index(self) -> u8 {
        match self {
            Preset::Home => 0,
            Preset::M1 => 1,
            Preset::M2 => 2,
            Preset::M3 => 3,
            Preset::M4 => 4,
            Preset::M5 => 5,
            Preset::M6 => 6,
            Preset::M7 => 7,
            Preset::M8 => 8,
            Preset::M9 => 9,
        }
    }

    /// Inverse of [`index`](Self::index).
    pub fn from_index(index: u8) -> Option<Self> {
        match index {
            0 => Some(Preset::Home),
            1 => Some(Preset::M1),
            2 => Some(Preset::M2),
            3 => Some(Preset::M3),
            4 => Some(Preset::M4),
            5 => Some(Preset::M5),
            6 => Some(Preset::M6),
            7 => Some(Preset::M7),
            8 => Some(Preset::M8),
            9 => Some(Preset::M9),
            _ => None,
        }
    }

    /// Interpret the `last_preset` status field. Values outside 0-9 fall
    /// back to `Home`.
    pub fn from_status_field(value: i32) -> Self {
        u8::try_from(value)
            .ok()
            .and_then(Self::from_index)
            .unwrap_or(Preset::Home)
    }
}

/// Strip whitespace and a leading query echo from a raw reply.
fn clean_raw(raw: &str) -> &str {
    let s = raw.trim();
    // Some firmware echoes the query before the answer, giving
    // "MMQ...MMQ<fields>"; keep the last marker and everything after it.
    if s.matches(STATUS_QUERY).count() > 1 {
        if let Some(idx) = s.rfind(STATUS_QUERY) {
            return &s[idx..];
        }
    }
    s
}

/// Parse an `MMQ` reply line into a status sample.
///
/// Returns `None` unless the cleaned text starts with the marker and
/// carries at least sixteen comma-separated base-10 integers. Fields past
/// the sixteenth are ignored so firmware revisions that append telemetry
/// still parse.
pub fn parse_mmq(raw: &str) -> Option<MmqStatus> {
    let s = clean_raw(raw);
    let payload = s.strip_prefix(STATUS_QUERY)?;

    // Guards against leading or doubled separators.
    let fields: Vec<&str> = payload.split(',').filter(|f| !f.is_empty()).collect();
    if fields.len() < FIELD_COUNT {
        return None;
    }

    let mut vals = [0i32; FIELD_COUNT];
    for (slot, field) in vals.iter_mut().zip(fields.iter()) {
        *slot = field.trim().parse().ok()?;
    }

    Some(MmqStatus {
        raw: s.to_string(),
        status: vals[0],
        elevation: vals[1],
        azimuth: vals[2],
        left_actuator: vals[3],
        right_actuator: vals[4],
        last_preset: vals[5],
        temperature: vals[6],
        tv_state: vals[7],
        last_event_source: vals[8],
        firmware_version: vals[9],
        lost_flag: vals[10],
        tv_current: vals[11],
        left_at_limit: vals[12],
        right_at_limit: vals[13],
        left_motor_current: vals[14],
        right_motor_current: vals[15],
    })
}
