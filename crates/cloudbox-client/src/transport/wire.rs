//! Response bodies of the REST API.

use serde::Deserialize;

use cloudbox_core::types::{SessionUser, UploadReceipt, Validation};

/// `GET /api/auth/validate`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct ValidateResponse {
    #[serde(default)]
    pub ok: bool,
    #[serde(default)]
    pub user: Option<String>,
    #[serde(default)]
    pub is_admin: bool,
}

impl From<ValidateResponse> for Validation {
    fn from(resp: ValidateResponse) -> Self {
        if !resp.ok {
            return Validation::Invalid;
        }
        Validation::Valid(SessionUser {
            display_name: resp.user.unwrap_or_default(),
            is_admin: resp.is_admin,
        })
    }
}

/// `GET /api/files/upload-timeout`, in milliseconds.
#[derive(Debug, Deserialize)]
pub(crate) struct UploadTimeoutResponse {
    pub timeout: u64,
}

/// `POST /api/files/share/{id}`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct ShareResponse {
    pub share_url: String,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct StoredFile {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub filename: Option<String>,
}

/// `POST /api/files/upload`: either the stored file record, or the record
/// wrapped with rename details when the name was taken.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct UploadResponse {
    #[serde(default)]
    pub renamed: bool,
    #[serde(default)]
    pub original_name: Option<String>,
    #[serde(default)]
    pub new_name: Option<String>,
    #[serde(default)]
    pub file: Option<StoredFile>,
    #[serde(flatten)]
    pub record: StoredFile,
}

impl UploadResponse {
    pub fn into_receipt(self, submitted_name: &str) -> UploadReceipt {
        let file = self.file.unwrap_or(self.record);
        if self.renamed {
            let new_name = self
                .new_name
                .or(file.filename)
                .unwrap_or_else(|| submitted_name.to_string());
            return UploadReceipt::Renamed {
                id: file.id,
                original_name: self
                    .original_name
                    .unwrap_or_else(|| submitted_name.to_string()),
                new_name,
            };
        }
        UploadReceipt::Stored {
            id: file.id,
            name: file
                .filename
                .unwrap_or_else(|| submitted_name.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_upload_response() {
        let resp: UploadResponse =
            serde_json::from_str(r#"{"id":"docs/a.txt","filename":"a.txt","sizeBytes":3}"#)
                .unwrap();
        assert_eq!(
            resp.into_receipt("a.txt"),
            UploadReceipt::Stored {
                id: Some("docs/a.txt".into()),
                name: "a.txt".into()
            }
        );
    }

    #[test]
    fn test_renamed_upload_response() {
        let resp: UploadResponse = serde_json::from_str(
            r#"{"file":{"id":"X (1).ext","filename":"X (1).ext"},
                "renamed":true,"originalName":"X.ext","newName":"X (1).ext"}"#,
        )
        .unwrap();
        assert_eq!(
            resp.into_receipt("X.ext"),
            UploadReceipt::Renamed {
                id: Some("X (1).ext".into()),
                original_name: "X.ext".into(),
                new_name: "X (1).ext".into()
            }
        );
    }

    #[test]
    fn test_validate_response() {
        let ok: ValidateResponse =
            serde_json::from_str(r#"{"ok":true,"user":"Ann","isAdmin":true,"userId":"7"}"#)
                .unwrap();
        assert_eq!(
            Validation::from(ok),
            Validation::Valid(SessionUser {
                display_name: "Ann".into(),
                is_admin: true
            })
        );
        let not_ok: ValidateResponse = serde_json::from_str(r#"{"ok":false}"#).unwrap();
        assert_eq!(Validation::from(not_ok), Validation::Invalid);
    }
}
