//! Interactive prompts.

use anyhow::{Context, Result};
use async_trait::async_trait;
use core_auth::ConsentPrompt;
use core_runtime::config::{
    AuthMode, DEFAULT_CLIENT_SECRETS, DEFAULT_DESTINATION, DEFAULT_SERVICE_ACCOUNT_KEY,
};
use core_transfer::{FolderCandidate, FolderChooser};
use dialoguer::{Confirm, Input, Select};
use std::path::PathBuf;
use tracing::warn;

/// What the user asked for.
#[derive(Debug)]
pub struct Answers {
    pub auth_mode: AuthMode,
    pub folder: String,
    pub destination: PathBuf,
    pub recursive: bool,
}

/// Ask for everything a download needs.
///
/// Returns `None` when no folder was entered.
pub fn ask() -> Result<Option<Answers>> {
    println!("\nChoose authentication method:");
    println!("1. OAuth (browser-based)");
    println!("2. Service Account (recommended)");

    let choice: String = Input::new()
        .with_prompt("Enter choice (1 or 2)")
        .default("1".to_string())
        .validate_with(|input: &String| match input.trim() {
            "1" | "2" => Ok(()),
            _ => Err("Please enter 1 or 2"),
        })
        .interact_text()
        .context("Failed to read authentication method")?;

    let auth_mode = if choice.trim() == "2" {
        AuthMode::service_account(ask_path(
            "Path to service account JSON key file",
            DEFAULT_SERVICE_ACCOUNT_KEY,
        )?)
    } else {
        AuthMode::installed_app(ask_path(
            "Path to OAuth client secrets file",
            DEFAULT_CLIENT_SECRETS,
        )?)
    };

    let folder: String = Input::new()
        .with_prompt("Folder name or folder ID")
        .allow_empty(true)
        .interact_text()
        .context("Failed to read folder")?;
    let folder = folder.trim().to_string();
    if folder.is_empty() {
        return Ok(None);
    }

    let destination = ask_path("Local download path", DEFAULT_DESTINATION)?;

    let recursive = Confirm::new()
        .with_prompt("Include sub-folders?")
        .default(false)
        .interact()
        .context("Failed to read sub-folder choice")?;

    Ok(Some(Answers {
        auth_mode,
        folder,
        destination,
        recursive,
    }))
}

fn ask_path(prompt: &str, default: &str) -> Result<PathBuf> {
    let path: String = Input::new()
        .with_prompt(prompt)
        .default(default.to_string())
        .interact_text()
        .with_context(|| format!("Failed to read {}", prompt.to_lowercase()))?;
    Ok(PathBuf::from(path.trim()))
}

/// Lets the user pick among folders that share a name.
pub struct InteractiveChooser;

#[async_trait]
impl FolderChooser for InteractiveChooser {
    async fn choose(&self, name: &str, candidates: &[FolderCandidate]) -> Option<usize> {
        println!("Multiple folders found with name '{}':", name);
        let items: Vec<String> = candidates
            .iter()
            .map(|c| format!("{} (ID: {})", c.name, c.id))
            .collect();

        match Select::new()
            .with_prompt("Select the folder to download")
            .items(&items)
            .default(0)
            .interact_opt()
        {
            Ok(selection) => selection,
            Err(e) => {
                warn!("Folder selection failed: {}", e);
                None
            }
        }
    }
}

/// Shows the consent URL and tries to open it in a browser.
pub struct BrowserConsent;

impl ConsentPrompt for BrowserConsent {
    fn present(&self, authorization_url: &str) -> core_auth::Result<()> {
        println!("\nOpen this URL to authorize access to Google Drive:\n\n  {}\n", authorization_url);

        if let Err(e) = webbrowser::open(authorization_url) {
            warn!("Could not open a browser: {}", e);
            println!("Could not open a browser; paste the URL above into one.");
        }

        // The printed URL is enough to continue.
        Ok(())
    }
}
