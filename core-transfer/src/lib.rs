//! # Folder Transfer
//!
//! Resolves a Drive folder, lists its entries and downloads them to a local
//! directory.
//!
//! ## Components
//!
//! - [`resolver`]: folder name or id to a single folder id
//! - [`listing`]: lazy paginated enumeration of a folder
//! - [`transfer`]: per-entry download or export with retry
//! - [`session`]: the session state machine
//! - [`target`]: the local destination directory
//! - [`driver`]: runs a whole session and reports progress on the `EventBus`

pub mod driver;
pub mod error;
pub mod listing;
pub mod resolver;
pub mod session;
pub mod target;
pub mod transfer;

pub use core_runtime::config::AmbiguityPolicy;
pub use core_runtime::events::{EntryOutcome, SessionSummary};
pub use driver::{FolderChooser, ProviderFactory, SessionDriver};
pub use error::{Result, TransferError};
pub use listing::{list_entries, ListedEntry, ListingOptions};
pub use resolver::{FolderCandidate, FolderReference, FolderResolver};
pub use session::{Session, SessionState};
pub use target::LocalTarget;
pub use transfer::{sanitize_file_name, EntryKind, TransferExecutor};
