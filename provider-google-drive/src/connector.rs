//! Google Drive API connector implementation
//!
//! Implements the `StorageProvider` trait for Google Drive API v3.

use async_trait::async_trait;
use bridge_traits::error::Result as BridgeResult;
use bridge_traits::http::{HttpClient, HttpMethod, HttpRequest, HttpResponse, RetryPolicy};
use bridge_traits::storage::{RemoteFile, StorageProvider};
use bytes::Bytes;
use chrono::{DateTime, Utc};
use core_auth::AccessTokenProvider;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, instrument, warn};

use crate::error::{GoogleDriveError, Result};
use crate::export::FOLDER_MIME_TYPE;
use crate::types::{DriveFile, FilesListResponse};

/// Google Drive API base URL
const DRIVE_API_BASE: &str = "https://www.googleapis.com/drive/v3";

/// Maximum results per page (Google Drive API limit)
const MAX_PAGE_SIZE: u32 = 1000;

/// Fields to request for file resources
const FILE_FIELDS: &str = "id,name,mimeType,size,modifiedTime,md5Checksum,parents";

/// Fields to request when searching folders by name
const FOLDER_FIELDS: &str = "id,name,mimeType,parents";

const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(60);
const DEFAULT_TRANSFER_TIMEOUT: Duration = Duration::from_secs(600);

/// Google Drive API connector
///
/// Implements `StorageProvider` for Google Drive API v3.
///
/// # Features
///
/// - Folder lookup by exact name across My Drive and shared drives
/// - Paginated child listing driven by opaque page tokens
/// - Binary downloads and Workspace document exports
/// - Exponential backoff for rate limiting on metadata requests
/// - Bearer tokens fetched per request, so expired credentials renew transparently
///
/// Content requests (`download`, `export`) make a single attempt; the caller
/// owns the retry policy for those.
///
/// # Example
///
/// ```ignore
/// use provider_google_drive::GoogleDriveConnector;
/// use bridge_traits::storage::StorageProvider;
///
/// let connector = GoogleDriveConnector::new(http_client, credential);
/// let (files, next_cursor) = connector.list_children("folder-id", 1000, None).await?;
/// ```
pub struct GoogleDriveConnector {
    /// HTTP client for API requests
    http_client: Arc<dyn HttpClient>,

    /// Source of OAuth 2.0 access tokens with `drive.readonly` scope
    token_provider: Arc<dyn AccessTokenProvider>,

    base_url: String,
    request_timeout: Duration,
    transfer_timeout: Duration,

    /// Retry policy for metadata and listing requests
    retry_policy: RetryPolicy,
}

impl GoogleDriveConnector {
    /// Create a new Google Drive connector
    ///
    /// # Arguments
    ///
    /// * `http_client` - HTTP client implementation
    /// * `token_provider` - Supplies a valid bearer token for each request
    pub fn new(
        http_client: Arc<dyn HttpClient>,
        token_provider: Arc<dyn AccessTokenProvider>,
    ) -> Self {
        Self {
            http_client,
            token_provider,
            base_url: DRIVE_API_BASE.to_string(),
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            transfer_timeout: DEFAULT_TRANSFER_TIMEOUT,
            retry_policy: RetryPolicy::default(),
        }
    }

    /// Point the connector at a different API root (used by tests).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    /// Timeouts for metadata requests and for content transfers.
    pub fn with_timeouts(mut self, request: Duration, transfer: Duration) -> Self {
        self.request_timeout = request;
        self.transfer_timeout = transfer;
        self
    }

    pub fn with_retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.retry_policy = policy;
        self
    }

    /// Parse RFC 3339 timestamp to Unix timestamp
    fn parse_timestamp(rfc3339: &str) -> Option<i64> {
        DateTime::parse_from_rfc3339(rfc3339)
            .ok()
            .map(|dt| dt.with_timezone(&Utc).timestamp())
    }

    /// Convert DriveFile to RemoteFile
    fn convert_file(drive_file: DriveFile) -> RemoteFile {
        RemoteFile {
            is_folder: drive_file.mime_type == FOLDER_MIME_TYPE,
            id: drive_file.id,
            name: drive_file.name,
            mime_type: drive_file.mime_type,
            size: drive_file.size.and_then(|s| s.parse().ok()),
            modified_at: drive_file
                .modified_time
                .as_deref()
                .and_then(Self::parse_timestamp),
            parent_ids: drive_file.parents,
            md5_checksum: drive_file.md5_checksum,
        }
    }

    /// Send one authenticated GET and classify a non-success status.
    async fn send(&self, url: &str, subject: &str, timeout: Duration) -> Result<HttpResponse> {
        let token = self.token_provider.access_token().await?;

        let request = HttpRequest::new(HttpMethod::Get, url)
            .bearer_token(token)
            .header("Accept", "application/json")
            .timeout(timeout);

        let response = self.http_client.execute(request).await?;
        if response.is_success() {
            debug!("API request succeeded: status={}", response.status);
            Ok(response)
        } else {
            Err(GoogleDriveError::from_response(
                response.status,
                &response.body,
                subject,
            ))
        }
    }

    /// Execute a metadata request with retry logic
    ///
    /// Retries rate limiting and transient errors with the configured backoff.
    #[instrument(skip(self), fields(url = %url))]
    async fn execute_with_retry(&self, url: &str, subject: &str) -> Result<HttpResponse> {
        let max_attempts = self.retry_policy.max_attempts.max(1);
        let mut attempt = 0;

        loop {
            attempt += 1;
            match self.send(url, subject, self.request_timeout).await {
                Ok(response) => return Ok(response),
                Err(e) if e.is_transient() && attempt < max_attempts => {
                    let backoff = self.retry_policy.delay_after(attempt);
                    warn!(
                        "API request failed (attempt {}/{}): {}, retrying in {}ms",
                        attempt,
                        max_attempts,
                        e,
                        backoff.as_millis()
                    );
                    tokio::time::sleep(backoff).await;
                }
                Err(e) => {
                    warn!("API request failed after {} attempt(s): {}", attempt, e);
                    return Err(e);
                }
            }
        }
    }

    fn parse_list(response: &HttpResponse) -> Result<FilesListResponse> {
        serde_json::from_slice(&response.body).map_err(|e| {
            GoogleDriveError::ParseError(format!("Failed to parse files list response: {}", e))
        })
    }

    async fn find_folders_impl(&self, name: &str) -> Result<Vec<RemoteFile>> {
        let query = format!(
            "name = '{}' and mimeType = '{}' and trashed = false",
            escape_query_literal(name),
            FOLDER_MIME_TYPE
        );

        let mut folders = Vec::new();
        let mut page_token: Option<String> = None;

        loop {
            let mut url = format!(
                "{}/files?q={}&pageSize={}&fields=nextPageToken,files({})\
                 &supportsAllDrives=true&includeItemsFromAllDrives=true",
                self.base_url,
                urlencoding::encode(&query),
                MAX_PAGE_SIZE,
                FOLDER_FIELDS
            );
            if let Some(token) = &page_token {
                url.push_str(&format!("&pageToken={}", urlencoding::encode(token)));
            }

            let response = self.execute_with_retry(&url, name).await?;
            let list_response = Self::parse_list(&response)?;
            folders.extend(list_response.files.into_iter().map(Self::convert_file));

            match list_response.next_page_token {
                Some(token) => page_token = Some(token),
                None => break,
            }
        }

        info!("Found {} folder(s) named {:?}", folders.len(), name);
        Ok(folders)
    }

    async fn list_children_impl(
        &self,
        folder_id: &str,
        page_size: u32,
        cursor: Option<String>,
    ) -> Result<(Vec<RemoteFile>, Option<String>)> {
        let query = format!(
            "'{}' in parents and trashed = false",
            escape_query_literal(folder_id)
        );

        let mut url = format!(
            "{}/files?q={}&pageSize={}&fields=nextPageToken,files({})\
             &supportsAllDrives=true&includeItemsFromAllDrives=true",
            self.base_url,
            urlencoding::encode(&query),
            page_size.clamp(1, MAX_PAGE_SIZE),
            FILE_FIELDS
        );
        if let Some(page_token) = cursor {
            url.push_str(&format!("&pageToken={}", urlencoding::encode(&page_token)));
        }

        let response = self.execute_with_retry(&url, folder_id).await?;
        let list_response = Self::parse_list(&response)?;

        let files: Vec<RemoteFile> = list_response
            .files
            .into_iter()
            .map(Self::convert_file)
            .collect();

        debug!("Listed {} children of {}", files.len(), folder_id);
        Ok((files, list_response.next_page_token))
    }

    async fn download_impl(&self, file_id: &str) -> Result<Bytes> {
        let url = format!(
            "{}/files/{}?alt=media&supportsAllDrives=true",
            self.base_url,
            urlencoding::encode(file_id)
        );

        let response = self.send(&url, file_id, self.transfer_timeout).await?;
        debug!("Downloaded {} bytes", response.body.len());
        Ok(response.body)
    }

    async fn export_impl(&self, file_id: &str, mime_type: &str) -> Result<Bytes> {
        let url = format!(
            "{}/files/{}/export?mimeType={}",
            self.base_url,
            urlencoding::encode(file_id),
            urlencoding::encode(mime_type)
        );

        let response = self
            .send(&url, file_id, self.transfer_timeout)
            .await
            .map_err(|e| e.into_export_error(file_id, mime_type))?;
        debug!("Exported {} bytes", response.body.len());
        Ok(response.body)
    }
}

/// Escape a value for use inside a single-quoted Drive query literal.
fn escape_query_literal(value: &str) -> String {
    value.replace('\\', "\\\\").replace('\'', "\\'")
}

#[async_trait]
impl StorageProvider for GoogleDriveConnector {
    #[instrument(skip(self))]
    async fn find_folders(&self, name: &str) -> BridgeResult<Vec<RemoteFile>> {
        Ok(self.find_folders_impl(name).await?)
    }

    #[instrument(skip(self, cursor))]
    async fn list_children(
        &self,
        folder_id: &str,
        page_size: u32,
        cursor: Option<String>,
    ) -> BridgeResult<(Vec<RemoteFile>, Option<String>)> {
        Ok(self.list_children_impl(folder_id, page_size, cursor).await?)
    }

    #[instrument(skip(self))]
    async fn download(&self, file_id: &str) -> BridgeResult<Bytes> {
        Ok(self.download_impl(file_id).await?)
    }

    #[instrument(skip(self))]
    async fn export(&self, file_id: &str, mime_type: &str) -> BridgeResult<Bytes> {
        Ok(self.export_impl(file_id, mime_type).await?)
    }
}
