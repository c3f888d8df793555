//! Download the contents of a Google Drive folder.
//!
//! Prompts for credentials, a folder and a destination, then copies every
//! file in the folder to disk. Google Docs, Sheets, Slides and Drawings are
//! exported to `.docx`, `.xlsx`, `.pptx` and `.png`.

mod progress;
mod prompt;

use anyhow::{Context, Result};
use bridge_desktop::{FileSecureStore, ReqwestHttpClient, TokioFileSystem};
use bridge_traits::http::HttpClient;
use bridge_traits::storage::{FileSystemAccess, SecureStore, StorageProvider};
use core_auth::{AccessTokenProvider, CredentialProvider, TokenCacheFactory};
use core_runtime::config::DownloadConfig;
use core_runtime::logging::{init_logging, LoggingConfig};
use core_transfer::SessionDriver;
use provider_google_drive::GoogleDriveConnector;
use std::path::Path;
use std::process::ExitCode;
use std::sync::Arc;
use tracing::{error, info};

fn main() -> ExitCode {
    if let Err(e) = init_logging(LoggingConfig::default()) {
        eprintln!("Failed to initialize logging: {}", e);
    }

    println!("Google Drive Folder Downloader");
    println!("{}", "=".repeat(40));

    let answers = match prompt::ask() {
        Ok(Some(answers)) => answers,
        Ok(None) => {
            println!("No folder specified. Exiting.");
            return ExitCode::SUCCESS;
        }
        Err(e) => {
            eprintln!("\n✗ Error: {:#}", e);
            return ExitCode::FAILURE;
        }
    };

    let result = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("Failed to start the async runtime")
        .and_then(|runtime| runtime.block_on(run(answers)));

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("\n✗ Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(answers: prompt::Answers) -> Result<()> {
    let config = DownloadConfig::builder()
        .auth_mode(answers.auth_mode)
        .folder(answers.folder)
        .destination(answers.destination)
        .recursive(answers.recursive)
        .build()
        .context("Invalid download settings")?;
    info!(
        auth = config.auth_mode.label(),
        destination = %config.destination.display(),
        "Starting download"
    );

    let timeouts = config.timeouts;
    let http: Arc<dyn HttpClient> = Arc::new(
        ReqwestHttpClient::with_timeout(timeouts.transfer)
            .context("Failed to create HTTP client")?,
    );
    let file_system: Arc<dyn FileSystemAccess> = Arc::new(TokioFileSystem::new());

    let token_cache: TokenCacheFactory =
        Arc::new(|path: &Path| Arc::new(FileSecureStore::new(path)) as Arc<dyn SecureStore>);
    let authenticator = CredentialProvider::new(
        http.clone(),
        file_system.clone(),
        token_cache,
        Arc::new(prompt::BrowserConsent),
    )
    .with_consent_timeout(timeouts.consent);

    let providers = move |credential: Arc<dyn AccessTokenProvider>| {
        let connector = GoogleDriveConnector::new(http.clone(), credential)
            .with_timeouts(timeouts.request, timeouts.transfer);
        Arc::new(connector) as Arc<dyn StorageProvider>
    };

    let driver = SessionDriver::new(
        config,
        Arc::new(authenticator),
        Arc::new(providers),
        file_system,
    )
    .with_folder_chooser(Arc::new(prompt::InteractiveChooser));

    let printer = tokio::spawn(progress::print_events(driver.event_bus().subscribe()));
    let result = driver.run().await;
    if let Err(e) = printer.await {
        error!("Progress printer stopped: {}", e);
    }

    result.context("Download did not complete")?;
    Ok(())
}
