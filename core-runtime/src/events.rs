//! # Event Bus System
//!
//! Progress reporting for a download session using `tokio::sync::broadcast`.
//!
//! ## Overview
//!
//! The session driver emits a [`SessionEvent`] at every stage boundary and for
//! every entry it processes. Front ends subscribe to the [`EventBus`] and
//! render the events however they like; the driver never prints.
//!
//! ```text
//! ┌────────────────┐   emit   ┌──────────┐  subscribe  ┌──────────────────┐
//! │ Session Driver ├─────────>│ EventBus ├────────────>│ Progress printer │
//! └────────────────┘          └──────────┘             └──────────────────┘
//! ```
//!
//! ## Usage
//!
//! ```rust
//! use core_runtime::events::{EventBus, SessionEvent};
//!
//! # #[tokio::main]
//! # async fn main() {
//! let bus = EventBus::new(16);
//! let mut rx = bus.subscribe();
//!
//! bus.emit(SessionEvent::ListingCompleted { total: 4, skipped: 0 }).ok();
//! assert_eq!(
//!     rx.recv().await.unwrap(),
//!     SessionEvent::ListingCompleted { total: 4, skipped: 0 }
//! );
//! # }
//! ```
//!
//! ## Error Handling
//!
//! - **`RecvError::Lagged(n)`**: the subscriber fell behind by `n` events and
//!   can keep receiving.
//! - **`RecvError::Closed`**: every sender was dropped; the session is over.
//!
//! Emitting with no subscribers is not an error for the session; callers
//! ignore the `SendError`.

use serde::{Deserialize, Serialize};
use std::fmt;
use tokio::sync::broadcast;

pub use tokio::sync::broadcast::error::{RecvError, SendError};
pub use tokio::sync::broadcast::Receiver;

/// Default buffer size for the event bus channel.
pub const DEFAULT_EVENT_BUFFER_SIZE: usize = 256;

// ============================================================================
// Event Types
// ============================================================================

/// Result of processing a single entry.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum EntryOutcome {
    /// Written to `path`.
    Succeeded { path: String, bytes: u64 },
    /// Not written; counts toward the total.
    Failed { reason: String },
    /// Not attempted and not counted (sub-folders in flat mode).
    Skipped { reason: String },
}

impl EntryOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Succeeded { .. })
    }
}

/// Counters for a finished session.
///
/// `total` is always `succeeded + failed`; skipped entries are reported
/// separately and excluded.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct SessionSummary {
    pub succeeded: usize,
    pub failed: usize,
    pub skipped: usize,
    pub total: usize,
}

impl SessionSummary {
    pub fn record(&mut self, outcome: &EntryOutcome) {
        match outcome {
            EntryOutcome::Succeeded { .. } => {
                self.succeeded += 1;
                self.total += 1;
            }
            EntryOutcome::Failed { .. } => {
                self.failed += 1;
                self.total += 1;
            }
            EntryOutcome::Skipped { .. } => self.skipped += 1,
        }
    }

    pub fn all_succeeded(&self) -> bool {
        self.failed == 0
    }
}

impl fmt::Display for SessionSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.succeeded, self.total)
    }
}

/// Events emitted by the session driver.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "event")]
pub enum SessionEvent {
    /// A credential was obtained.
    Authenticated { mode: String },
    /// The folder reference resolved to an identifier.
    FolderResolved { folder_id: String },
    /// Listing finished; `total` entries will be transferred.
    ListingCompleted { total: usize, skipped: usize },
    /// An entry is about to be transferred (1-based index).
    EntryStarted {
        index: usize,
        total: usize,
        name: String,
    },
    /// A transfer attempt failed and will be retried.
    EntryRetrying {
        index: usize,
        name: String,
        attempt: u32,
        reason: String,
    },
    /// An entry reached its final outcome.
    EntryFinished {
        index: usize,
        total: usize,
        name: String,
        outcome: EntryOutcome,
    },
    /// Every entry was processed.
    Completed { summary: SessionSummary },
    /// The session stopped at a fatal error.
    Failed { stage: String, message: String },
}

impl SessionEvent {
    /// Returns a human-readable description of the event.
    pub fn description(&self) -> String {
        match self {
            Self::Authenticated { mode } => format!("Authenticated ({})", mode),
            Self::FolderResolved { folder_id } => format!("Resolved folder {}", folder_id),
            Self::ListingCompleted { total, .. } => format!("Found {} files", total),
            Self::EntryStarted { index, total, name } => {
                format!("[{}/{}] Downloading {}", index, total, name)
            }
            Self::EntryRetrying {
                name, attempt, reason, ..
            } => format!("Retrying {} after attempt {}: {}", name, attempt, reason),
            Self::EntryFinished {
                index,
                total,
                name,
                outcome,
            } => match outcome {
                EntryOutcome::Succeeded { .. } => format!("[{}/{}] Saved {}", index, total, name),
                EntryOutcome::Failed { reason } => {
                    format!("[{}/{}] Failed {}: {}", index, total, name, reason)
                }
                EntryOutcome::Skipped { reason } => format!("Skipped {}: {}", name, reason),
            },
            Self::Completed { summary } => {
                format!("Downloaded {} files successfully", summary)
            }
            Self::Failed { stage, message } => format!("Failed during {}: {}", stage, message),
        }
    }

    /// Returns true for events that end the session.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed { .. } | Self::Failed { .. })
    }
}

// ============================================================================
// Event Bus
// ============================================================================

/// Broadcast channel carrying [`SessionEvent`]s.
#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<SessionEvent>,
}

impl EventBus {
    /// Creates a new event bus with the specified buffer size.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publishes an event to all subscribers.
    ///
    /// Returns the number of subscribers that received the event, or an error
    /// if there are none.
    pub fn emit(&self, event: SessionEvent) -> Result<usize, SendError<SessionEvent>> {
        self.sender.send(event)
    }

    /// Creates a new subscriber. Past events are not replayed.
    pub fn subscribe(&self) -> Receiver<SessionEvent> {
        self.sender.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_EVENT_BUFFER_SIZE)
    }
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventBus")
            .field("subscribers", &self.subscriber_count())
            .finish()
    }
}

// ============================================================================
// Tests
// ============================================================================
