//! reqwest binding of the REST API.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use futures::{Stream, StreamExt, stream};
use reqwest::header::{ACCEPT, HeaderMap, HeaderValue};
use reqwest::multipart::{Form, Part};
use reqwest::{Client, Method, RequestBuilder, Response, StatusCode, Url};
use serde::de::DeserializeOwned;
use tokio::io::AsyncWriteExt;
use tokio_util::io::ReaderStream;
use tracing::{debug, warn};

use cloudbox_core::config::ApiConfig;
use cloudbox_core::error::{AppError, ErrorKind, TransferError};
use cloudbox_core::result::AppResult;
use cloudbox_core::traits::Transport;
use cloudbox_core::types::{
    FileRecord, ItemId, MoveReceipt, ProgressFn, QuotaSnapshot, RefreshGrant, TokenGrant,
    UploadBody, UploadReceipt, UploadSource, Validation,
};

use super::wire::{ShareResponse, UploadResponse, UploadTimeoutResponse, ValidateResponse};

const CHUNK_SIZE: usize = 64 * 1024;

type ByteStream = std::pin::Pin<Box<dyn Stream<Item = std::io::Result<Bytes>> + Send>>;

/// [`Transport`] over HTTP.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: Client,
    base_url: String,
    download_timeout: Duration,
}

impl HttpTransport {
    /// Build a client for the configured service.
    pub fn new(config: &ApiConfig) -> AppResult<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));

        let client = Client::builder()
            .timeout(config.request_timeout())
            .connect_timeout(config.connect_timeout())
            .user_agent(config.user_agent.clone())
            .default_headers(headers)
            .build()
            .map_err(|e| {
                AppError::with_source(
                    ErrorKind::Configuration,
                    format!("Failed to build HTTP client: {e}"),
                    e,
                )
            })?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            download_timeout: config.download_timeout(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// `{prefix}/{id}` with the id as a single percent-encoded segment,
    /// since ids are paths and contain `/`.
    fn item_url(&self, prefix: &str, id: &ItemId) -> AppResult<Url> {
        let mut url = Url::parse(&self.url(prefix)).map_err(|e| {
            AppError::configuration(format!("Invalid base URL {}: {e}", self.base_url))
        })?;
        url.path_segments_mut()
            .map_err(|()| AppError::configuration(format!("Invalid base URL {}", self.base_url)))?
            .push(id.as_str());
        Ok(url)
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        self.client.request(method, self.url(path))
    }

    async fn send(&self, builder: RequestBuilder) -> AppResult<Response> {
        let resp = builder.send().await.map_err(map_reqwest_error)?;
        if resp.status().is_success() {
            return Ok(resp);
        }
        let status = resp.status();
        let body = resp.text().await.unwrap_or_default();
        Err(status_error(status, &body))
    }

    async fn send_json<T: DeserializeOwned>(&self, builder: RequestBuilder) -> AppResult<T> {
        let resp = self.send(builder).await?;
        resp.json::<T>().await.map_err(map_reqwest_error)
    }

    async fn send_empty(&self, builder: RequestBuilder) -> AppResult<()> {
        self.send(builder).await.map(|_| ())
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn exchange_bootstrap_token(&self, token: &str) -> AppResult<TokenGrant> {
        let req = self
            .request(Method::POST, "/auth/login")
            .query(&[("token", token)]);
        self.send_json(req).await
    }

    async fn refresh(&self, refresh_token: &str) -> AppResult<RefreshGrant> {
        let req = self
            .request(Method::POST, "/api/auth/refresh")
            .query(&[("refreshToken", refresh_token)]);
        self.send_json(req).await
    }

    async fn logout(&self, refresh_token: &str) -> AppResult<()> {
        let req = self
            .request(Method::POST, "/api/auth/logout")
            .query(&[("refreshToken", refresh_token)]);
        self.send_empty(req).await
    }

    async fn validate(&self, access_token: &str) -> AppResult<Validation> {
        let req = self
            .request(Method::GET, "/api/auth/validate")
            .query(&[("token", access_token)]);
        match self.send_json::<ValidateResponse>(req).await {
            Ok(resp) => Ok(resp.into()),
            Err(e) if e.is_authentication() => Ok(Validation::Invalid),
            Err(e) => Err(e),
        }
    }

    async fn touch(&self, token: &str) -> AppResult<()> {
        let req = self
            .request(Method::POST, "/api/auth/touch")
            .query(&[("token", token)]);
        self.send_empty(req).await
    }

    async fn quota(&self, token: &str) -> AppResult<QuotaSnapshot> {
        let req = self
            .request(Method::GET, "/api/files/quota")
            .query(&[("token", token)]);
        self.send_json(req).await
    }

    async fn list_files(&self, token: &str) -> AppResult<Vec<FileRecord>> {
        let req = self
            .request(Method::GET, "/api/files/list")
            .query(&[("token", token)]);
        self.send_json(req).await
    }

    async fn list_folders(&self, token: &str) -> AppResult<Vec<String>> {
        let req = self
            .request(Method::GET, "/api/files/folders")
            .query(&[("token", token)]);
        self.send_json(req).await
    }

    async fn list_trash(&self, token: &str) -> AppResult<Vec<FileRecord>> {
        let req = self
            .request(Method::GET, "/api/files/trash")
            .query(&[("token", token)]);
        self.send_json(req).await
    }

    async fn list_trash_folders(&self, token: &str) -> AppResult<Vec<String>> {
        let req = self
            .request(Method::GET, "/api/files/trash/folders")
            .query(&[("token", token)]);
        self.send_json(req).await
    }

    async fn upload_timeout(&self, token: &str) -> AppResult<Duration> {
        let req = self
            .request(Method::GET, "/api/files/upload-timeout")
            .query(&[("token", token)]);
        let resp: UploadTimeoutResponse = self.send_json(req).await?;
        Ok(Duration::from_millis(resp.timeout))
    }

    async fn upload(
        &self,
        token: &str,
        source: &UploadSource,
        target_path: &str,
        timeout: Duration,
        progress: ProgressFn,
    ) -> Result<UploadReceipt, TransferError> {
        let body = open_body(source)
            .await
            .map_err(|e| TransferError::Network {
                message: format!("cannot read {}: {e}", source.name),
            })?;
        let counted = count_bytes(body, progress);

        let mime = mime_guess::from_path(&source.name).first_or_octet_stream();
        let part = Part::stream_with_length(reqwest::Body::wrap_stream(counted), source.size)
            .file_name(source.name.clone())
            .mime_str(mime.essence_str())
            .map_err(|e| TransferError::Network {
                message: format!("invalid content type: {e}"),
            })?;

        let mut form = Form::new().part("file", part).text("token", token.to_string());
        if !target_path.is_empty() {
            form = form.text("path", target_path.to_string());
        }

        debug!(name = %source.name, size = source.size, target = %target_path, "Sending upload");

        let resp = self
            .request(Method::POST, "/api/files/upload")
            .timeout(timeout)
            .multipart(form)
            .send()
            .await
            .map_err(|e| transfer_error(e, timeout))?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            warn!(name = %source.name, status = status.as_u16(), "Upload rejected");
            return Err(upload_rejection(status, &body));
        }

        let text = resp.text().await.map_err(|e| transfer_error(e, timeout))?;
        if text.trim().is_empty() {
            return Ok(UploadReceipt::Stored {
                id: None,
                name: source.name.clone(),
            });
        }
        let parsed: UploadResponse =
            serde_json::from_str(&text).map_err(|e| TransferError::Server {
                status: status.as_u16(),
                message: format!("unreadable upload response: {e}"),
            })?;
        Ok(parsed.into_receipt(&source.name))
    }

    async fn download(
        &self,
        token: &str,
        id: &ItemId,
        dest: &Path,
        progress: ProgressFn,
    ) -> AppResult<u64> {
        let url = self.item_url("/api/files/download", id)?;
        let req = self
            .client
            .get(url)
            .header(ACCEPT, HeaderValue::from_static("*/*"))
            .timeout(self.download_timeout)
            .query(&[("token", token)]);
        let resp = self.send(req).await?;

        let body: ByteStream = Box::pin(
            resp.bytes_stream()
                .map(|chunk| chunk.map_err(std::io::Error::other)),
        );
        let partial = partial_path(dest);
        match write_body(count_bytes(body, progress), &partial).await {
            Ok(written) => {
                tokio::fs::rename(&partial, dest).await?;
                debug!(id = %id, dest = %dest.display(), bytes = written, "Download complete");
                Ok(written)
            }
            Err(e) => {
                if let Err(cleanup) = tokio::fs::remove_file(&partial).await {
                    debug!(error = %cleanup, "Could not remove partial download");
                }
                Err(e)
            }
        }
    }

    async fn create_folder(&self, token: &str, path: &str) -> AppResult<()> {
        let req = self
            .request(Method::POST, "/api/files/mkdir")
            .query(&[("path", path), ("token", token)]);
        self.send_empty(req).await
    }

    async fn move_file(
        &self,
        token: &str,
        id: &ItemId,
        target_folder: &str,
    ) -> AppResult<MoveReceipt> {
        let req = self.request(Method::POST, "/api/files/move").query(&[
            ("fileId", id.as_str()),
            ("targetFolder", target_folder),
            ("token", token),
        ]);
        let resp = self.send(req).await?;
        let text = resp.text().await.map_err(map_reqwest_error)?;
        if text.trim().is_empty() {
            return Ok(MoveReceipt::default());
        }
        Ok(serde_json::from_str(&text)?)
    }

    async fn rename(&self, token: &str, id: &ItemId, new_name: &str) -> AppResult<()> {
        let req = self.request(Method::POST, "/api/files/rename").query(&[
            ("id", id.as_str()),
            ("newName", new_name),
            ("token", token),
        ]);
        self.send_empty(req).await
    }

    async fn delete_file(&self, token: &str, id: &ItemId) -> AppResult<()> {
        let req = self
            .request(Method::DELETE, "/api/files/delete")
            .query(&[("id", id.as_str()), ("token", token)]);
        self.send_empty(req).await
    }

    async fn delete_folder(&self, token: &str, path: &str) -> AppResult<()> {
        let req = self
            .request(Method::DELETE, "/api/files/folder")
            .query(&[("path", path), ("token", token)]);
        self.send_empty(req).await
    }

    async fn restore(&self, token: &str, id: &ItemId) -> AppResult<()> {
        let url = self.item_url("/api/files/trash/restore", id)?;
        let req = self.client.post(url).query(&[("token", token)]);
        self.send_empty(req).await
    }

    async fn purge(&self, token: &str, id: &ItemId) -> AppResult<()> {
        let url = self.item_url("/api/files/trash", id)?;
        let req = self.client.delete(url).query(&[("token", token)]);
        self.send_empty(req).await
    }

    async fn clear_trash(&self, token: &str) -> AppResult<()> {
        let req = self
            .request(Method::DELETE, "/api/files/trash/clear")
            .query(&[("token", token)]);
        self.send_empty(req).await
    }

    async fn create_share(&self, token: &str, id: &ItemId) -> AppResult<String> {
        let url = self.item_url("/api/files/share", id)?;
        let req = self.client.post(url).query(&[("token", token)]);
        let resp: ShareResponse = self.send_json(req).await?;
        Ok(resp.share_url)
    }

    async fn delete_share(&self, token: &str, id: &ItemId) -> AppResult<()> {
        let url = self.item_url("/api/files/share", id)?;
        let req = self.client.delete(url).query(&[("token", token)]);
        self.send_empty(req).await
    }
}

/// Map a non-success status and its body text to an error.
pub(crate) fn status_error(status: StatusCode, body: &str) -> AppError {
    let message = if body.trim().is_empty() {
        status
            .canonical_reason()
            .unwrap_or("request failed")
            .to_string()
    } else {
        body.trim().to_string()
    };
    let kind = match status.as_u16() {
        401 | 403 => ErrorKind::Authentication,
        404 => ErrorKind::NotFound,
        409 => ErrorKind::Conflict,
        507 => ErrorKind::QuotaExceeded,
        // The service reports most item errors as a plain 400.
        400 => classify_message(&message),
        400..=499 => ErrorKind::Validation,
        _ => ErrorKind::Server,
    };
    AppError::new(kind, message)
}

/// Error for a non-success upload response. A 507 says the file does not
/// fit in the remaining quota.
pub(crate) fn upload_rejection(status: StatusCode, body: &str) -> TransferError {
    let body = body.trim();
    let message = if status == StatusCode::INSUFFICIENT_STORAGE {
        if body.is_empty() {
            "storage quota exceeded".to_string()
        } else {
            format!("storage quota exceeded: {body}")
        }
    } else {
        body.to_string()
    };
    TransferError::Server {
        status: status.as_u16(),
        message,
    }
}

fn classify_message(message: &str) -> ErrorKind {
    let lower = message.to_lowercase();
    if lower.contains("not found") || lower.contains("does not exist") {
        ErrorKind::NotFound
    } else if lower.contains("already") || lower.contains("exists") {
        ErrorKind::Conflict
    } else {
        ErrorKind::Validation
    }
}

pub(crate) fn map_reqwest_error(err: reqwest::Error) -> AppError {
    let kind = if err.is_timeout() {
        ErrorKind::Timeout
    } else if err.is_decode() {
        ErrorKind::Serialization
    } else if err.is_connect() || err.is_request() || err.is_body() {
        ErrorKind::Network
    } else {
        ErrorKind::Internal
    };
    AppError::with_source(kind, format!("HTTP request failed: {err}"), err)
}

fn transfer_error(err: reqwest::Error, timeout: Duration) -> TransferError {
    if err.is_timeout() {
        TransferError::Timeout { after: timeout }
    } else {
        TransferError::Network {
            message: err.to_string(),
        }
    }
}

async fn open_body(source: &UploadSource) -> std::io::Result<ByteStream> {
    match &source.body {
        UploadBody::Bytes(data) => {
            let chunks: Vec<std::io::Result<Bytes>> = (0..data.len())
                .step_by(CHUNK_SIZE)
                .map(|start| Ok(data.slice(start..(start + CHUNK_SIZE).min(data.len()))))
                .collect();
            Ok(Box::pin(stream::iter(chunks)))
        }
        UploadBody::File(path) => {
            let file = tokio::fs::File::open(path).await?;
            Ok(Box::pin(ReaderStream::with_capacity(file, CHUNK_SIZE)))
        }
    }
}

/// Sibling path the download is written to before it is renamed into place.
fn partial_path(dest: &Path) -> PathBuf {
    let mut name = dest.as_os_str().to_owned();
    name.push(".part");
    PathBuf::from(name)
}

/// Drain `body` into a new file at `path`. Stream errors are network
/// failures; write errors are local storage failures.
async fn write_body(mut body: ByteStream, path: &Path) -> AppResult<u64> {
    let mut file = tokio::fs::File::create(path).await?;
    let mut written = 0u64;
    while let Some(chunk) = body.next().await {
        let chunk = chunk.map_err(|e| AppError::network(format!("Download interrupted: {e}")))?;
        file.write_all(&chunk).await?;
        written += chunk.len() as u64;
    }
    file.flush().await?;
    file.sync_all().await?;
    Ok(written)
}

/// Report the running total of bytes pulled by the HTTP client.
fn count_bytes(body: ByteStream, progress: ProgressFn) -> ByteStream {
    let sent = Arc::new(AtomicU64::new(0));
    Box::pin(body.map(move |chunk| {
        if let Ok(bytes) = &chunk {
            let total = sent.fetch_add(bytes.len() as u64, Ordering::Relaxed) + bytes.len() as u64;
            progress(total);
        }
        chunk
    }))
}
