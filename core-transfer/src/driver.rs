//! # Session Driver
//!
//! Runs one download from start to finish:
//!
//! 1. Create the destination directory
//! 2. Obtain a credential for the configured `AuthMode`
//! 3. Resolve the folder reference to an id. An id-shaped reference that
//!    lists as missing is looked up once more as a name.
//! 4. List every entry, so the total is known up front
//! 5. Transfer entries one at a time
//! 6. Report the `SessionSummary`
//!
//! Failures in steps 1-4 are fatal. Failures in step 5 are recorded per
//! entry and never stop the session.

use async_trait::async_trait;
use bridge_traits::storage::{FileSystemAccess, StorageProvider};
use core_auth::{AccessTokenProvider, Authenticator};
use core_runtime::config::DownloadConfig;
use core_runtime::events::{EntryOutcome, EventBus, SessionEvent, SessionSummary};
use futures::TryStreamExt;
use std::sync::Arc;
use tracing::{debug, error, info, instrument};

use crate::error::{Result, TransferError};
use crate::listing::{list_entries, ListedEntry, ListingOptions};
use crate::resolver::{FolderCandidate, FolderReference, FolderResolver};
use crate::session::{Session, SessionState};
use crate::target::LocalTarget;
use crate::transfer::TransferExecutor;

/// Builds the storage provider once a credential is available.
pub trait ProviderFactory: Send + Sync {
    fn create(&self, credential: Arc<dyn AccessTokenProvider>) -> Arc<dyn StorageProvider>;
}

impl<F> ProviderFactory for F
where
    F: Fn(Arc<dyn AccessTokenProvider>) -> Arc<dyn StorageProvider> + Send + Sync,
{
    fn create(&self, credential: Arc<dyn AccessTokenProvider>) -> Arc<dyn StorageProvider> {
        self(credential)
    }
}

/// Picks one of several folders that share a name.
#[async_trait]
pub trait FolderChooser: Send + Sync {
    /// Index into `candidates`, or `None` to give up.
    async fn choose(&self, name: &str, candidates: &[FolderCandidate]) -> Option<usize>;
}

pub struct SessionDriver {
    config: DownloadConfig,
    authenticator: Arc<dyn Authenticator>,
    providers: Arc<dyn ProviderFactory>,
    file_system: Arc<dyn FileSystemAccess>,
    events: EventBus,
    chooser: Option<Arc<dyn FolderChooser>>,
}

impl SessionDriver {
    pub fn new(
        config: DownloadConfig,
        authenticator: Arc<dyn Authenticator>,
        providers: Arc<dyn ProviderFactory>,
        file_system: Arc<dyn FileSystemAccess>,
    ) -> Self {
        Self {
            config,
            authenticator,
            providers,
            file_system,
            events: EventBus::default(),
            chooser: None,
        }
    }

    pub fn with_event_bus(mut self, events: EventBus) -> Self {
        self.events = events;
        self
    }

    /// Ask `chooser` when a folder name is ambiguous.
    pub fn with_folder_chooser(mut self, chooser: Arc<dyn FolderChooser>) -> Self {
        self.chooser = Some(chooser);
        self
    }

    pub fn event_bus(&self) -> &EventBus {
        &self.events
    }

    /// Run the session to completion.
    ///
    /// Returns the summary once every entry has been processed, or the fatal
    /// error that stopped the session.
    #[instrument(skip(self), fields(folder = %self.config.folder))]
    pub async fn run(&self) -> Result<SessionSummary> {
        let mut session = Session::new();

        match self.drive(&mut session).await {
            Ok(summary) => {
                info!("Session finished: {} succeeded", summary);
                self.emit(SessionEvent::Completed { summary });
                Ok(summary)
            }
            Err(e) => {
                let stage = session.state();
                error!(stage = %stage, "Session failed: {}", e);
                if let Err(transition) = session.fail(e.to_string()) {
                    debug!("Could not record failure: {}", transition);
                }
                self.emit(SessionEvent::Failed {
                    stage: stage.to_string(),
                    message: e.to_string(),
                });
                Err(e)
            }
        }
    }

    async fn drive(&self, session: &mut Session) -> Result<SessionSummary> {
        let target = LocalTarget::new(&self.config.destination);
        target.prepare(self.file_system.as_ref()).await?;

        let credential = self.authenticator.authenticate(&self.config.auth_mode).await?;
        session.advance(SessionState::Authenticated)?;
        self.emit(SessionEvent::Authenticated {
            mode: self.config.auth_mode.label().to_string(),
        });

        let provider = self.providers.create(credential);

        let reference = FolderReference::parse(&self.config.folder);
        let folder_id = self.resolve(provider.clone(), &reference).await?;
        session.advance(SessionState::FolderResolved)?;
        self.emit(SessionEvent::FolderResolved {
            folder_id: folder_id.clone(),
        });

        session.advance(SessionState::Listing)?;
        let entries = match self.list_all(provider.clone(), folder_id).await {
            // Long names made of id characters parse as ids.
            Err(TransferError::FolderNotFound { .. })
                if matches!(reference, FolderReference::Id(_)) =>
            {
                let name = FolderReference::Name(reference.as_str().to_string());
                info!("No folder with id {}, looking it up by name", name);
                let folder_id = self.resolve(provider.clone(), &name).await?;
                self.emit(SessionEvent::FolderResolved {
                    folder_id: folder_id.clone(),
                });
                self.list_all(provider.clone(), folder_id).await?
            }
            listed => listed?,
        };

        let (folders, files): (Vec<_>, Vec<_>) =
            entries.into_iter().partition(|entry| entry.file.is_folder);
        let total = files.len();
        info!("Found {} files and {} folders", total, folders.len());
        self.emit(SessionEvent::ListingCompleted {
            total,
            skipped: folders.len(),
        });

        session.advance(SessionState::Transferring)?;
        for _ in &folders {
            session.record(&EntryOutcome::Skipped {
                reason: "folder".to_string(),
            })?;
        }

        let executor = TransferExecutor::new(
            provider,
            self.file_system.clone(),
            self.config.retry_policy.clone(),
        )
        .with_events(self.events.clone());

        for (position, entry) in files.iter().enumerate() {
            let index = position + 1;
            self.emit(SessionEvent::EntryStarted {
                index,
                total,
                name: entry.file.name.clone(),
            });

            let outcome = executor.transfer(entry, &target, index, total).await;
            session.record(&outcome)?;

            self.emit(SessionEvent::EntryFinished {
                index,
                total,
                name: entry.file.name.clone(),
                outcome,
            });

            // Entries that fail without I/O never suspend; let subscribers drain.
            tokio::task::yield_now().await;
        }

        session.complete()
    }

    async fn list_all(
        &self,
        provider: Arc<dyn StorageProvider>,
        folder_id: String,
    ) -> Result<Vec<ListedEntry>> {
        let options = ListingOptions {
            page_size: self.config.page_size,
            recursive: self.config.recursive,
        };
        list_entries(provider, folder_id, options).try_collect().await
    }

    async fn resolve(
        &self,
        provider: Arc<dyn StorageProvider>,
        reference: &FolderReference,
    ) -> Result<String> {
        let resolver = FolderResolver::new(provider, self.config.ambiguity_policy);

        match resolver.resolve(reference).await {
            Err(TransferError::AmbiguousFolder { name, candidates }) => {
                let Some(chooser) = &self.chooser else {
                    return Err(TransferError::AmbiguousFolder { name, candidates });
                };
                match chooser.choose(&name, &candidates).await {
                    Some(i) if i < candidates.len() => Ok(candidates[i].id.clone()),
                    _ => Err(TransferError::AmbiguousFolder { name, candidates }),
                }
            }
            other => other,
        }
    }

    fn emit(&self, event: SessionEvent) {
        if self.events.emit(event).is_err() {
            debug!("No event subscribers");
        }
    }
}
