//! Upload payloads and receipts.

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use bytes::Bytes;
use serde::{Deserialize, Serialize};

/// Callback receiving the cumulative number of bytes sent so far.
pub type ProgressFn = Arc<dyn Fn(u64) + Send + Sync>;

/// Where the bytes of an upload come from.
#[derive(Clone)]
pub enum UploadBody {
    /// In-memory content.
    Bytes(Bytes),
    /// A local file streamed from disk.
    File(PathBuf),
}

impl fmt::Debug for UploadBody {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bytes(b) => write!(f, "Bytes({} bytes)", b.len()),
            Self::File(p) => write!(f, "File({})", p.display()),
        }
    }
}

/// An opaque file handle submitted for upload.
#[derive(Debug, Clone)]
pub struct UploadSource {
    /// File name sent to the server.
    pub name: String,
    /// Total size in bytes, used for admission and progress.
    pub size: u64,
    /// Content.
    pub body: UploadBody,
}

impl UploadSource {
    /// Upload from memory.
    pub fn from_bytes(name: impl Into<String>, data: impl Into<Bytes>) -> Self {
        let data = data.into();
        Self {
            name: name.into(),
            size: data.len() as u64,
            body: UploadBody::Bytes(data),
        }
    }

    /// Upload a local file. Reads only metadata here; content is streamed
    /// when the transfer starts.
    pub async fn from_path(path: impl Into<PathBuf>) -> std::io::Result<Self> {
        let path = path.into();
        let meta = tokio::fs::metadata(&path).await?;
        if !meta.is_file() {
            return Err(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                format!("not a regular file: {}", path.display()),
            ));
        }
        let name = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("upload")
            .to_string();
        Ok(Self {
            name,
            size: meta.len(),
            body: UploadBody::File(path),
        })
    }
}

/// Server answer to a successful upload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum UploadReceipt {
    /// Stored under the submitted name.
    Stored {
        /// Server id of the new file.
        id: Option<String>,
        /// Stored name.
        name: String,
    },
    /// A file with that name existed; the server chose another name.
    Renamed {
        /// Server id of the new file.
        id: Option<String>,
        /// Name the client submitted.
        original_name: String,
        /// Name the server stored the file under, e.g. `X (1).ext`.
        new_name: String,
    },
}

impl UploadReceipt {
    /// Name the file is stored under.
    pub fn stored_name(&self) -> &str {
        match self {
            Self::Stored { name, .. } => name,
            Self::Renamed { new_name, .. } => new_name,
        }
    }
}
