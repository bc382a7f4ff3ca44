//! Document models

use serde::{Deserialize, Serialize};
use validator::Validate;

/// A synced documentation file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Document {
    pub id: String,
    pub project_id: String,
    pub file_name: String,
    pub content: String,
    pub hash: String,
    pub version: i64,
    pub updated_at: String,
}

/// The part of a document the fingerprint is derived from
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct DocumentHash {
    pub file_name: String,
    pub hash: String,
}

impl DocumentHash {
    pub fn new(file_name: impl Into<String>, hash: impl Into<String>) -> Self {
        Self {
            file_name: file_name.into(),
            hash: hash.into(),
        }
    }
}

/// Document content shipped to polling clients
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncedDocument {
    pub file_name: String,
    pub content: String,
    pub hash: String,
}

impl From<Document> for SyncedDocument {
    fn from(doc: Document) -> Self {
        Self {
            file_name: doc.file_name,
            content: doc.content,
            hash: doc.hash,
        }
    }
}

/// Content fetched from the upstream repository
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteDocument {
    pub file_name: String,
    pub content: String,
}

/// Upsert document request
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct UpdateDocumentRequest {
    #[validate(length(max = 1048576, message = "must be at most 1 MiB"))]
    pub content: String,
}

/// Fingerprint answer for the hook surface
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FingerprintResponse {
    pub fingerprint: String,
    pub document_count: usize,
}

/// Full sync answer for the hook surface
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncResponse {
    pub documents: Vec<SyncedDocument>,
    pub fingerprint: String,
}
