//! Split lifecycle states and the event bus that reports them.
//!
//! [`EventBus`] wraps a `tokio::sync::broadcast` channel with a bounded
//! ring-buffer of recent events so that late subscribers can catch up.

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::fmt;
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::ids::SplitId;

/// Maximum number of events retained in the ring buffer.
const MAX_RECENT_EVENTS: usize = 100;

// ---------------------------------------------------------------------------
// SplitState
// ---------------------------------------------------------------------------

/// Where a split operation currently is.
///
/// `Complete` and `Errored` are terminal until an explicit reset to `Idle`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum SplitState {
    Idle,
    Probing,
    Planning,
    /// Working on window `index` of `total`.
    Processing { index: usize, total: usize },
    Complete,
    Errored,
}

impl SplitState {
    /// Whether moving from `self` to `next` is a legal transition.
    pub fn can_transition_to(&self, next: &SplitState) -> bool {
        use SplitState::*;
        match (*self, *next) {
            (Idle, Probing) => true,
            (Probing, Planning) => true,
            (Planning, Processing { index: 0, total }) => total > 0,
            (Processing { index, total }, Processing { index: next_index, total: next_total }) => {
                next_total == total && next_index == index + 1 && next_index < total
            }
            (Processing { index, total }, Complete) => index + 1 == total,
            (Probing | Planning | Processing { .. }, Errored) => true,
            (Complete | Errored, Idle) => true,
            _ => false,
        }
    }

    /// `Complete` or `Errored`.
    pub fn is_terminal(&self) -> bool {
        matches!(self, SplitState::Complete | SplitState::Errored)
    }
}

impl fmt::Display for SplitState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Idle => write!(f, "idle"),
            Self::Probing => write!(f, "probing"),
            Self::Planning => write!(f, "planning"),
            Self::Processing { index, total } => write!(f, "processing {} of {total}", index + 1),
            Self::Complete => write!(f, "complete"),
            Self::Errored => write!(f, "errored"),
        }
    }
}

// ---------------------------------------------------------------------------
// EventPayload
// ---------------------------------------------------------------------------

/// Payload describing what happened.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EventPayload {
    StateChanged {
        split_id: SplitId,
        from: SplitState,
        to: SplitState,
    },
    Progress {
        split_id: SplitId,
        percent: u8,
    },
    SegmentCompleted {
        split_id: SplitId,
        index: usize,
        name: String,
        bytes: u64,
    },
    Failed {
        split_id: SplitId,
        error: String,
    },
}

// ---------------------------------------------------------------------------
// Event
// ---------------------------------------------------------------------------

/// A timestamped event ready for broadcast.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    /// Unique event identifier.
    pub id: Uuid,
    /// When the event occurred.
    pub timestamp: DateTime<Utc>,
    /// What happened.
    pub payload: EventPayload,
}

impl Event {
    /// Create a new event with a fresh UUID and the current timestamp.
    pub fn new(payload: EventPayload) -> Self {
        Self {
            id: Uuid::new_v4(),
            timestamp: Utc::now(),
            payload,
        }
    }
}

// ---------------------------------------------------------------------------
// EventBus
// ---------------------------------------------------------------------------

/// Broadcast channel with a bounded ring buffer of recent events.
pub struct EventBus {
    tx: broadcast::Sender<Event>,
    recent: RwLock<VecDeque<Event>>,
}

impl EventBus {
    /// Create a new event bus.
    ///
    /// `capacity` controls the broadcast channel buffer size (not the ring
    /// buffer, which is always [`MAX_RECENT_EVENTS`]).
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self {
            tx,
            recent: RwLock::new(VecDeque::with_capacity(MAX_RECENT_EVENTS)),
        }
    }

    /// Subscribe to the broadcast channel.
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.tx.subscribe()
    }

    /// Broadcast an event to all current subscribers and store it in the
    /// ring buffer.
    pub fn broadcast(&self, payload: EventPayload) {
        let event = Event::new(payload);

        {
            let mut recent = self.recent.write();
            if recent.len() >= MAX_RECENT_EVENTS {
                recent.pop_back();
            }
            recent.push_front(event.clone());
        }

        // No subscribers is fine.
        let _ = self.tx.send(event);
    }

    /// Return the `n` most recent events (newest first).
    pub fn recent_events(&self, n: usize) -> Vec<Event> {
        let recent = self.recent.read();
        recent.iter().take(n).cloned().collect()
    }

    /// Progress percentages reported for `split_id`, oldest first.
    pub fn progress_history(&self, split_id: SplitId) -> Vec<u8> {
        let recent = self.recent.read();
        recent
            .iter()
            .rev()
            .filter_map(|e| match e.payload {
                EventPayload::Progress { split_id: id, percent } if id == split_id => Some(percent),
                _ => None,
            })
            .collect()
    }

    /// States entered by `split_id`, oldest first.
    pub fn state_history(&self, split_id: SplitId) -> Vec<SplitState> {
        let recent = self.recent.read();
        recent
            .iter()
            .rev()
            .filter_map(|e| match e.payload {
                EventPayload::StateChanged { split_id: id, to, .. } if id == split_id => Some(to),
                _ => None,
            })
            .collect()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(256)
    }
}
