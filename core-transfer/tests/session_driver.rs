mod common;

use async_trait::async_trait;
use bridge_desktop::TokioFileSystem;
use bridge_traits::storage::StorageProvider;
use common::{binary, document, entry, folder, FakeAuthenticator, FakeDrive};
use core_auth::AccessTokenProvider;
use core_runtime::config::{AmbiguityPolicy, AuthMode, DownloadConfig};
use core_runtime::events::{EventBus, SessionEvent};
use core_transfer::{
    FolderCandidate, FolderChooser, ProviderFactory, SessionDriver, TransferError,
};
use std::path::Path;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tokio::sync::broadcast::error::RecvError;

const FOLDER_ID: &str = "0B1cDeFgHiJkLmNoPqRsTuVwXyZ";

fn factory(drive: Arc<FakeDrive>) -> Arc<dyn ProviderFactory> {
    Arc::new(move |_credential: Arc<dyn AccessTokenProvider>| {
        let provider: Arc<dyn StorageProvider> = drive.clone();
        provider
    })
}

fn config(folder: &str, destination: &Path) -> DownloadConfig {
    DownloadConfig::builder()
        .auth_mode(AuthMode::service_account("key.json"))
        .folder(folder)
        .destination(destination)
        .retry(3, Duration::from_millis(1))
        .build()
        .unwrap()
}

fn driver(config: DownloadConfig, drive: Arc<FakeDrive>) -> SessionDriver {
    SessionDriver::new(
        config,
        FakeAuthenticator::ok(),
        factory(drive),
        Arc::new(TokioFileSystem::new()),
    )
}

fn four_file_drive() -> FakeDrive {
    FakeDrive::new()
        .with_named_folder(FOLDER_ID, "Project")
        .with_child(FOLDER_ID, binary("b1", "one.txt"), b"1")
        .with_child(FOLDER_ID, binary("b2", "two.csv"), b"2,2")
        .with_child(FOLDER_ID, binary("b3", "three.png"), &[0x89, b'P', b'N', b'G'])
        .with_child(FOLDER_ID, document("d1", "Proposal"), b"PK-docx")
}

fn drain(rx: &mut tokio::sync::broadcast::Receiver<SessionEvent>) -> Vec<SessionEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}

#[tokio::test]
async fn test_end_to_end_four_files() {
    let dir = TempDir::new().unwrap();
    let destination = dir.path().join("downloads");
    let drive = Arc::new(four_file_drive());
    let events = EventBus::new(64);
    let mut rx = events.subscribe();

    let summary = driver(config("Project", &destination), drive.clone())
        .with_event_bus(events)
        .run()
        .await
        .unwrap();

    assert_eq!(summary.to_string(), "4/4");
    assert!(summary.all_succeeded());

    let mut names: Vec<_> = std::fs::read_dir(&destination)
        .unwrap()
        .map(|e| e.unwrap().file_name().into_string().unwrap())
        .collect();
    names.sort();
    assert_eq!(names, vec!["Proposal.docx", "one.txt", "three.png", "two.csv"]);
    assert_eq!(std::fs::read(destination.join("two.csv")).unwrap(), b"2,2");

    let events = drain(&mut rx);
    assert!(matches!(events[0], SessionEvent::Authenticated { .. }));
    assert_eq!(
        events[1],
        SessionEvent::FolderResolved {
            folder_id: FOLDER_ID.to_string()
        }
    );
    assert_eq!(
        events[2],
        SessionEvent::ListingCompleted {
            total: 4,
            skipped: 0
        }
    );
    let finished = events
        .iter()
        .filter(|e| matches!(e, SessionEvent::EntryFinished { .. }))
        .count();
    assert_eq!(finished, 4);
    assert!(events.last().unwrap().is_terminal());
}

#[tokio::test]
async fn test_id_reference_skips_lookup() {
    let dir = TempDir::new().unwrap();
    let drive = Arc::new(four_file_drive());

    let summary = driver(config(FOLDER_ID, dir.path()), drive.clone())
        .run()
        .await
        .unwrap();

    assert_eq!(summary.succeeded, 4);
    assert_eq!(drive.find_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_failed_entry_does_not_stop_the_run() {
    let dir = TempDir::new().unwrap();
    let drive = Arc::new(four_file_drive().with_transient_failures("b2", 10));

    let summary = driver(config("Project", dir.path()), drive.clone())
        .run()
        .await
        .unwrap();

    assert_eq!(summary.succeeded, 3);
    assert_eq!(summary.failed, 1);
    assert_eq!(summary.to_string(), "3/4");
    assert_eq!(drive.fetches_of("b2"), 3);
    assert_eq!(drive.fetches_of("d1"), 1);
    assert!(!dir.path().join("two.csv").exists());
}

#[tokio::test]
async fn test_folders_are_skipped_in_flat_mode() {
    let dir = TempDir::new().unwrap();
    let drive = Arc::new(
        four_file_drive()
            .with_child(FOLDER_ID, folder("sub", "Archive"), b"")
            .with_child("sub", binary("b9", "old.txt"), b"old"),
    );

    let summary = driver(config("Project", dir.path()), drive)
        .run()
        .await
        .unwrap();

    assert_eq!(summary.total, 4);
    assert_eq!(summary.skipped, 1);
    assert!(!dir.path().join("Archive").exists());
}

#[tokio::test]
async fn test_recursive_mode_downloads_sub_folders() {
    let dir = TempDir::new().unwrap();
    let drive = Arc::new(
        four_file_drive()
            .with_child(FOLDER_ID, folder("sub", "Archive"), b"")
            .with_child("sub", binary("b9", "old.txt"), b"old"),
    );
    let mut config = config("Project", dir.path());
    config.recursive = true;

    let summary = driver(config, drive).run().await.unwrap();

    assert_eq!(summary.to_string(), "5/5");
    assert_eq!(
        std::fs::read(dir.path().join("Archive").join("old.txt")).unwrap(),
        b"old"
    );
}

#[tokio::test]
async fn test_unknown_folder_name_is_fatal() {
    let dir = TempDir::new().unwrap();
    let events = EventBus::new(16);
    let mut rx = events.subscribe();

    let result = driver(config("Nope", dir.path()), Arc::new(four_file_drive()))
        .with_event_bus(events)
        .run()
        .await;

    assert!(matches!(result, Err(TransferError::FolderNotFound { .. })));
    match drain(&mut rx).last() {
        Some(SessionEvent::Failed { stage, .. }) => assert_eq!(stage, "authenticated"),
        other => panic!("unexpected: {:?}", other),
    }
}

#[tokio::test]
async fn test_unknown_folder_id_fails_while_listing() {
    let dir = TempDir::new().unwrap();
    let events = EventBus::new(16);
    let mut rx = events.subscribe();

    let drive = Arc::new(four_file_drive());

    let result = driver(config("1ZzZzZzZzZzZzZzZzZzZzZzZzZzZz", dir.path()), drive.clone())
        .with_event_bus(events)
        .run()
        .await;

    assert!(matches!(result, Err(TransferError::FolderNotFound { .. })));
    // One listing attempt as an id, then one lookup as a name.
    assert_eq!(drive.find_calls.load(Ordering::SeqCst), 1);
    match drain(&mut rx).last() {
        Some(SessionEvent::Failed { stage, .. }) => assert_eq!(stage, "listing"),
        other => panic!("unexpected: {:?}", other),
    }
}

#[tokio::test]
async fn test_long_name_with_id_characters_is_found_by_name() {
    let dir = TempDir::new().unwrap();
    let name = "project_documents_archive_2023";
    let drive = Arc::new(
        FakeDrive::new()
            .with_named_folder(FOLDER_ID, name)
            .with_child(FOLDER_ID, binary("b1", "ledger.csv"), b"a,b"),
    );
    let events = EventBus::new(16);
    let mut rx = events.subscribe();

    let summary = driver(config(name, dir.path()), drive.clone())
        .with_event_bus(events)
        .run()
        .await
        .unwrap();

    assert_eq!(summary.to_string(), "1/1");
    assert_eq!(drive.find_calls.load(Ordering::SeqCst), 1);
    assert_eq!(std::fs::read(dir.path().join("ledger.csv")).unwrap(), b"a,b");
    assert!(drain(&mut rx).contains(&SessionEvent::FolderResolved {
        folder_id: FOLDER_ID.to_string()
    }));
}

#[tokio::test]
async fn test_many_unsupported_entries_do_not_overflow_the_bus() {
    let dir = TempDir::new().unwrap();
    let mut drive = FakeDrive::new().with_named_folder(FOLDER_ID, "Forms");
    for i in 0..200 {
        drive = drive.with_child(
            FOLDER_ID,
            entry(&format!("f{}", i), &format!("Survey {}", i), "application/vnd.google-apps.form"),
            b"",
        );
    }
    let events = EventBus::new(8);
    let mut rx = events.subscribe();

    let printer = tokio::spawn(async move {
        let mut finished = 0;
        let mut lagged = false;
        loop {
            match rx.recv().await {
                Ok(event) => {
                    if matches!(event, SessionEvent::EntryFinished { .. }) {
                        finished += 1;
                    }
                    if event.is_terminal() {
                        break;
                    }
                }
                Err(RecvError::Lagged(_)) => lagged = true,
                Err(RecvError::Closed) => break,
            }
        }
        (finished, lagged)
    });

    let summary = driver(config("Forms", dir.path()), Arc::new(drive))
        .with_event_bus(events)
        .run()
        .await
        .unwrap();

    assert_eq!(summary.failed, 200);
    assert_eq!(printer.await.unwrap(), (200, false));
}

#[tokio::test]
async fn test_auth_failure_is_fatal() {
    let dir = TempDir::new().unwrap();
    let drive = Arc::new(four_file_drive());

    let result = SessionDriver::new(
        config("Project", dir.path()),
        FakeAuthenticator::failing(),
        factory(drive.clone()),
        Arc::new(TokioFileSystem::new()),
    )
    .run()
    .await;

    assert!(matches!(result, Err(TransferError::Auth(_))));
    assert_eq!(drive.list_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_unusable_destination_is_fatal() {
    let dir = TempDir::new().unwrap();
    let blocker = dir.path().join("file");
    std::fs::write(&blocker, b"not a directory").unwrap();
    let authenticator = FakeAuthenticator::ok();

    let result = SessionDriver::new(
        config("Project", &blocker.join("downloads")),
        authenticator.clone(),
        factory(Arc::new(four_file_drive())),
        Arc::new(TokioFileSystem::new()),
    )
    .run()
    .await;

    assert!(matches!(result, Err(TransferError::Filesystem { .. })));
    assert_eq!(authenticator.calls.load(Ordering::SeqCst), 0);
}

struct PickSecond;

#[async_trait]
impl FolderChooser for PickSecond {
    async fn choose(&self, _name: &str, candidates: &[FolderCandidate]) -> Option<usize> {
        assert_eq!(candidates.len(), 2);
        Some(1)
    }
}

#[tokio::test]
async fn test_ambiguous_name_uses_chooser() {
    let dir = TempDir::new().unwrap();
    let drive = Arc::new(
        FakeDrive::new()
            .with_named_folder("first", "Shared")
            .with_named_folder("second", "Shared")
            .with_child("second", binary("b1", "picked.txt"), b"yes"),
    );

    let summary = driver(config("Shared", dir.path()), drive.clone())
        .with_folder_chooser(Arc::new(PickSecond))
        .run()
        .await
        .unwrap();

    assert_eq!(summary.to_string(), "1/1");
    assert!(dir.path().join("picked.txt").exists());
}

#[tokio::test]
async fn test_ambiguous_name_without_chooser() {
    let dir = TempDir::new().unwrap();
    let drive = Arc::new(
        FakeDrive::new()
            .with_named_folder("first", "Shared")
            .with_named_folder("second", "Shared"),
    );

    let result = driver(config("Shared", dir.path()), drive.clone()).run().await;
    match result {
        Err(TransferError::AmbiguousFolder { candidates, .. }) => assert_eq!(candidates.len(), 2),
        other => panic!("unexpected: {:?}", other),
    }

    let mut first_match = config("Shared", dir.path());
    first_match.ambiguity_policy = AmbiguityPolicy::FirstMatch;
    let summary = driver(first_match, drive).run().await.unwrap();
    assert_eq!(summary.total, 0);
}
