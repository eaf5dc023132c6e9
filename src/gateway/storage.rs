//! Object storage for document uploads.
//!
//! Officer onboarding attaches files (photo, ID proof) that must be turned
//! into URLs before the step is submitted. The wizard only sees the
//! [`ObjectStorage`] trait; [`HttpObjectStorage`] posts the file as
//! multipart to a configured upload endpoint that answers `{ "url": ... }`.

use std::path::Path;

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use secrecy::{ExposeSecret, SecretString};
use tracing::info;

use super::API_KEY_HEADER;
use crate::error::GatewayError;

/// A file held by the client, pending upload.
#[derive(Debug, Clone)]
pub struct FileAttachment {
    pub file_name: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

impl FileAttachment {
    /// Read a local file, guessing its content type from the extension.
    pub async fn from_path(path: &Path) -> std::io::Result<Self> {
        let bytes = tokio::fs::read(path).await?;
        let file_name = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("file")
            .to_string();
        Ok(Self {
            content_type: content_type_for(&file_name).to_string(),
            file_name,
            bytes,
        })
    }
}

fn content_type_for(file_name: &str) -> &'static str {
    let ext = file_name
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "pdf" => "application/pdf",
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "webp" => "image/webp",
        _ => "application/octet-stream",
    }
}

/// Uploads a file and returns its public URL.
#[async_trait]
pub trait ObjectStorage: Send + Sync {
    /// `folder` groups uploads per entity kind, e.g. `officers`.
    async fn upload(&self, folder: &str, file: FileAttachment) -> Result<String, GatewayError>;
}

/// Multipart upload to an HTTP endpoint.
pub struct HttpObjectStorage {
    client: reqwest::Client,
    upload_url: String,
    api_key: SecretString,
}

impl HttpObjectStorage {
    pub fn new(upload_url: impl Into<String>, api_key: SecretString) -> Self {
        Self {
            client: reqwest::Client::new(),
            upload_url: upload_url.into(),
            api_key,
        }
    }
}

#[async_trait]
impl ObjectStorage for HttpObjectStorage {
    async fn upload(&self, folder: &str, file: FileAttachment) -> Result<String, GatewayError> {
        let file_name = file.file_name.clone();
        let upload_err = |reason: String| GatewayError::Upload {
            file_name: file_name.clone(),
            reason,
        };

        let part = Part::bytes(file.bytes)
            .file_name(file.file_name.clone())
            .mime_str(&file.content_type)
            .map_err(|e| upload_err(e.to_string()))?;
        let form = Form::new()
            .text("folder", folder.to_string())
            .part("file", part);

        let resp = self
            .client
            .post(&self.upload_url)
            .header(API_KEY_HEADER, self.api_key.expose_secret())
            .multipart(form)
            .send()
            .await
            .map_err(|e| upload_err(e.to_string()))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(upload_err(format!("{status}: {body}")));
        }

        let body: serde_json::Value = resp.json().await.map_err(|e| upload_err(e.to_string()))?;
        let url = body
            .get("url")
            .and_then(|v| v.as_str())
            .filter(|s| !s.is_empty())
            .ok_or_else(|| upload_err("response carried no url".to_string()))?
            .to_string();

        info!(folder, file = %file_name, "Uploaded document");
        Ok(url)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn content_types() {
        assert_eq!(content_type_for("aadhar.PDF"), "application/pdf");
        assert_eq!(content_type_for("photo.jpeg"), "image/jpeg");
        assert_eq!(content_type_for("scan"), "application/octet-stream");
    }

    #[tokio::test]
    async fn attachment_from_path_reads_bytes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("photo.png");
        tokio::fs::write(&path, b"\x89PNG").await.unwrap();

        let file = FileAttachment::from_path(&path).await.unwrap();
        assert_eq!(file.file_name, "photo.png");
        assert_eq!(file.content_type, "image/png");
        assert_eq!(file.bytes, b"\x89PNG");
    }
}
