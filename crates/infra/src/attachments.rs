//! Attachment hand-off.
//!
//! Upload and compression live behind `AttachmentStore`; the fulfillment
//! pipeline only needs a URL to record on the order header.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{PoisonError, RwLock};

use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use fieldops_core::DomainError;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AttachmentError {
    #[error("attachment upload failed: {0}")]
    Upload(String),
}

#[async_trait]
pub trait AttachmentStore: Send + Sync {
    /// Store the bytes and return the URL they can be fetched from.
    async fn store(&self, file_name: &str, bytes: Vec<u8>) -> Result<String, AttachmentError>;
}

/// An attachment sent inline with the order request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InlineAttachment {
    pub file_name: String,
    /// Standard base64.
    pub content: String,
}

impl InlineAttachment {
    pub fn decode(&self) -> Result<Vec<u8>, DomainError> {
        if self.file_name.trim().is_empty() {
            return Err(DomainError::validation("attachment file name must not be empty"));
        }
        let bytes = STANDARD
            .decode(self.content.trim())
            .map_err(|e| DomainError::validation(format!("attachment '{}' is not valid base64: {}", self.file_name, e)))?;
        if bytes.is_empty() {
            return Err(DomainError::validation(format!("attachment '{}' is empty", self.file_name)));
        }
        Ok(bytes)
    }
}

/// Keeps uploads in memory and hands out `{base_url}/{uuid}-{file_name}` URLs.
#[derive(Debug)]
pub struct InMemoryAttachmentStore {
    base_url: String,
    objects: RwLock<HashMap<String, Vec<u8>>>,
}

impl InMemoryAttachmentStore {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            objects: RwLock::new(HashMap::new()),
        }
    }

    pub fn get(&self, url: &str) -> Option<Vec<u8>> {
        self.objects
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(url)
            .cloned()
    }
}

impl Default for InMemoryAttachmentStore {
    fn default() -> Self {
        Self::new("memory://attachments")
    }
}

/// Unique, path-safe object name: `{uuid v7}-{sanitized file name}`.
fn object_name(file_name: &str) -> String {
    let safe_name = file_name
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '.' || c == '-' || c == '_' { c } else { '_' })
        .collect::<String>();
    format!("{}-{}", Uuid::now_v7(), safe_name)
}

#[async_trait]
impl AttachmentStore for InMemoryAttachmentStore {
    async fn store(&self, file_name: &str, bytes: Vec<u8>) -> Result<String, AttachmentError> {
        let url = format!("{}/{}", self.base_url, object_name(file_name));

        self.objects
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(url.clone(), bytes);
        Ok(url)
    }
}

/// Writes uploads into a directory served elsewhere under `base_url`.
///
/// Survives restarts, so it is the store to pair with Postgres.
#[derive(Debug, Clone)]
pub struct DirectoryAttachmentStore {
    dir: PathBuf,
    base_url: String,
}

impl DirectoryAttachmentStore {
    pub fn new(dir: impl Into<PathBuf>, base_url: impl Into<String>) -> Self {
        Self {
            dir: dir.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }
}

#[async_trait]
impl AttachmentStore for DirectoryAttachmentStore {
    async fn store(&self, file_name: &str, bytes: Vec<u8>) -> Result<String, AttachmentError> {
        let name = object_name(file_name);
        tokio::fs::create_dir_all(&self.dir)
            .await
            .map_err(|e| AttachmentError::Upload(format!("create {}: {}", self.dir.display(), e)))?;
        let path = self.dir.join(&name);
        tokio::fs::write(&path, bytes)
            .await
            .map_err(|e| AttachmentError::Upload(format!("write {}: {}", path.display(), e)))?;
        Ok(format!("{}/{}", self.base_url, name))
    }
}
