//! Progress lines on stdout.

use core_runtime::events::{EntryOutcome, RecvError, SessionEvent};
use tokio::sync::broadcast::Receiver;
use tracing::debug;

/// Print session events until the session ends.
pub async fn print_events(mut events: Receiver<SessionEvent>) {
    loop {
        match events.recv().await {
            Ok(event) => {
                if let Some(line) = render(&event) {
                    println!("{}", line);
                }
                if event.is_terminal() {
                    break;
                }
            }
            Err(RecvError::Lagged(missed)) => debug!("Progress printer missed {} events", missed),
            Err(RecvError::Closed) => break,
        }
    }
}

fn render(event: &SessionEvent) -> Option<String> {
    let line = match event {
        SessionEvent::Authenticated { mode } => {
            format!("✓ Successfully authenticated with Google Drive ({})", mode)
        }
        SessionEvent::FolderResolved { folder_id } => {
            format!("📁 Downloading files from folder ID: {}", folder_id)
        }
        SessionEvent::ListingCompleted { total: 0, .. } => "No files found in the folder.".to_string(),
        SessionEvent::ListingCompleted { total, skipped } if *skipped > 0 => {
            format!("Found {} files to download ({} sub-folders skipped)", total, skipped)
        }
        SessionEvent::ListingCompleted { total, .. } => format!("Found {} files to download", total),
        SessionEvent::EntryStarted { .. } => event.description(),
        SessionEvent::EntryRetrying { .. } => format!("  ⟳ {}", event.description()),
        SessionEvent::EntryFinished { outcome, name, .. } => match outcome {
            EntryOutcome::Succeeded { path, .. } => format!("  ✓ Saved to: {}", path),
            EntryOutcome::Failed { reason } => format!("  ✗ Error downloading {}: {}", name, reason),
            EntryOutcome::Skipped { .. } => return None,
        },
        // An empty folder ends with the listing line.
        SessionEvent::Completed { summary } if summary.total == 0 => return None,
        SessionEvent::Completed { summary } => format!(
            "\n🎉 Download complete! {} files downloaded successfully.",
            summary
        ),
        // The binary reports fatal errors once, with context.
        SessionEvent::Failed { .. } => return None,
    };
    Some(line)
}

#[cfg(test)]
mod tests {
    use super::*;
    use core_runtime::events::SessionSummary;

    #[test]
    fn test_render_summary() {
        let summary = SessionSummary {
            succeeded: 3,
            failed: 1,
            skipped: 0,
            total: 4,
        };
        let line = render(&SessionEvent::Completed { summary }).unwrap();
        assert!(line.contains("3/4 files downloaded successfully"));
    }

    #[test]
    fn test_empty_folder_prints_only_the_listing_line() {
        let listed = SessionEvent::ListingCompleted {
            total: 0,
            skipped: 0,
        };
        assert_eq!(render(&listed).unwrap(), "No files found in the folder.");

        let completed = SessionEvent::Completed {
            summary: SessionSummary::default(),
        };
        assert_eq!(render(&completed), None);
    }

    #[test]
    fn test_failure_is_left_to_the_caller() {
        let failed = SessionEvent::Failed {
            stage: "authenticated".to_string(),
            message: "Folder 'Nope' not found".to_string(),
        };
        assert_eq!(render(&failed), None);
    }

    #[test]
    fn test_render_entry_lines() {
        let started = SessionEvent::EntryStarted {
            index: 2,
            total: 5,
            name: "a.txt".to_string(),
        };
        assert_eq!(render(&started).unwrap(), "[2/5] Downloading a.txt");

        let failed = SessionEvent::EntryFinished {
            index: 2,
            total: 5,
            name: "a.txt".to_string(),
            outcome: EntryOutcome::Failed {
                reason: "quota".to_string(),
            },
        };
        assert_eq!(render(&failed).unwrap(), "  ✗ Error downloading a.txt: quota");

        let skipped = SessionEvent::EntryFinished {
            index: 0,
            total: 5,
            name: "Sub".to_string(),
            outcome: EntryOutcome::Skipped {
                reason: "folder".to_string(),
            },
        };
        assert_eq!(render(&skipped), None);
    }
}
