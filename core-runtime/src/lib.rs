//! # Core Runtime Module
//!
//! Runtime infrastructure shared by the download pipeline:
//! - Logging and tracing setup
//! - Session configuration
//! - Progress event bus

pub mod config;
pub mod error;
pub mod events;
pub mod logging;

pub use config::{AmbiguityPolicy, AuthMode, DownloadConfig, DownloadConfigBuilder};
pub use error::{Error, Result};
pub use events::{EntryOutcome, EventBus, SessionEvent, SessionSummary};
