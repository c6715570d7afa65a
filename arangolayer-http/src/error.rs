//! ArangoDB error bodies and their mapping onto [`DocumentStoreError`].

use serde::Deserialize;

use arangolayer_core::error::DocumentStoreError;

/// `ERROR_ARANGO_DOCUMENT_NOT_FOUND`
pub const DOCUMENT_NOT_FOUND: i64 = 1202;
/// `ERROR_ARANGO_DATA_SOURCE_NOT_FOUND`
pub const COLLECTION_NOT_FOUND: i64 = 1203;
/// `ERROR_ARANGO_DUPLICATE_NAME`
pub const DUPLICATE_NAME: i64 = 1207;

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ErrorBody {
    error_num: Option<i64>,
    error_message: Option<String>,
}

/// A non-success reply from the server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiFailure {
    pub status: u16,
    pub error_num: Option<i64>,
    pub message: String,
}

impl ApiFailure {
    /// Parses the error body of a reply. Bodies that are not ArangoDB error objects are
    /// kept verbatim as the message.
    pub fn parse(status: u16, body: &str) -> Self {
        match serde_json::from_str::<ErrorBody>(body) {
            Ok(parsed) => Self {
                status,
                error_num: parsed.error_num,
                message: parsed.error_message.unwrap_or_else(|| body.trim().to_string()),
            },
            Err(_) => Self { status, error_num: None, message: body.trim().to_string() },
        }
    }

    pub fn is_document_not_found(&self) -> bool {
        self.error_num == Some(DOCUMENT_NOT_FOUND)
    }

    /// Maps the failure onto the store error for `subject`, the collection the request
    /// was about.
    pub fn into_error(self, subject: &str) -> DocumentStoreError {
        match self.error_num {
            Some(DUPLICATE_NAME) => DocumentStoreError::CollectionAlreadyExists(subject.to_string()),
            Some(COLLECTION_NOT_FOUND) => DocumentStoreError::CollectionNotFound(subject.to_string()),
            Some(num) => DocumentStoreError::Backend(format!(
                "HTTP {}: {} (errorNum {num})",
                self.status, self.message
            )),
            None => DocumentStoreError::Backend(format!("HTTP {}: {}", self.status, self.message)),
        }
    }
}

pub(crate) fn transport(err: reqwest::Error) -> DocumentStoreError {
    DocumentStoreError::Transport(err.to_string())
}
