//! Download session state machine

use core_runtime::events::{EntryOutcome, SessionSummary};
use std::fmt;

use crate::error::{Result, TransferError};

/// Stage of a download session.
///
/// `Init → Authenticated → FolderResolved → Listing → Transferring → Done`,
/// with `Failed` reachable before transfers begin.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum SessionState {
    #[default]
    Init,
    Authenticated,
    FolderResolved,
    Listing,
    Transferring,
    Done,
    Failed,
}

impl SessionState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, SessionState::Done | SessionState::Failed)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SessionState::Init => "init",
            SessionState::Authenticated => "authenticated",
            SessionState::FolderResolved => "folder_resolved",
            SessionState::Listing => "listing",
            SessionState::Transferring => "transferring",
            SessionState::Done => "done",
            SessionState::Failed => "failed",
        }
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Default)]
pub struct Session {
    state: SessionState,
    summary: SessionSummary,
    error_message: Option<String>,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn summary(&self) -> SessionSummary {
        self.summary
    }

    pub fn error_message(&self) -> Option<&str> {
        self.error_message.as_deref()
    }

    /// Move to `to`, rejecting transitions the state machine does not allow.
    pub fn advance(&mut self, to: SessionState) -> Result<()> {
        self.validate_transition(to)?;
        self.state = to;
        Ok(())
    }

    /// Mark the session failed with a fatal error.
    ///
    /// # Errors
    ///
    /// Returns an error once transfers have started; per-entry failures are
    /// recorded with [`Session::record`] instead.
    pub fn fail(&mut self, message: impl Into<String>) -> Result<()> {
        self.validate_transition(SessionState::Failed)?;
        self.state = SessionState::Failed;
        self.error_message = Some(message.into());
        Ok(())
    }

    /// Count the outcome of one entry.
    pub fn record(&mut self, outcome: &EntryOutcome) -> Result<()> {
        if self.state != SessionState::Transferring {
            return Err(TransferError::InvalidStateTransition {
                from: self.state.to_string(),
                to: "record".to_string(),
            });
        }
        self.summary.record(outcome);
        Ok(())
    }

    /// Finish the session and return the final counts.
    pub fn complete(&mut self) -> Result<SessionSummary> {
        self.advance(SessionState::Done)?;
        Ok(self.summary)
    }

    fn validate_transition(&self, to: SessionState) -> Result<()> {
        use SessionState::*;

        let valid = matches!(
            (self.state, to),
            (Init, Authenticated)
                | (Authenticated, FolderResolved)
                | (FolderResolved, Listing)
                | (Listing, Transferring)
                | (Transferring, Done)
                | (Init, Failed)
                | (Authenticated, Failed)
                | (Listing, Failed)
        );

        if !valid {
            return Err(TransferError::InvalidStateTransition {
                from: self.state.to_string(),
                to: to.to_string(),
            });
        }

        Ok(())
    }
}
