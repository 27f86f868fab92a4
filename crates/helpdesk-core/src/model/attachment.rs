//! Attachments in their two lifetimes: staged on this machine, or persisted on
//! the server.
//!
//! A [`LocalAttachment`] carries the file bytes and a preview URL. Once its
//! upload succeeds it is consumed by [`LocalAttachment::into_remote`]; there is
//! no way back.

use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

/// Per-file upload limit enforced by the server (10 MiB).
pub const MAX_ATTACHMENT_BYTES: u64 = 10 * 1024 * 1024;

const BASE36: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";

/// Client-side preview handle for a local file.
///
/// `blob:` URLs are owned by the preview registry and must be revoked;
/// `data:` URLs (inline images) own nothing.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PreviewUrl(String);

impl PreviewUrl {
    #[must_use]
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether this URL holds a registry resource that needs revoking.
    #[must_use]
    pub fn is_object_url(&self) -> bool {
        self.0.starts_with("blob:")
    }
}

/// How a staged file is rendered before upload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PreviewKind {
    Thumbnail,
    Pdf,
    Icon,
}

impl PreviewKind {
    #[must_use]
    pub fn for_mime(mime_type: &str) -> Self {
        if mime_type.starts_with("image/") {
            Self::Thumbnail
        } else if mime_type == "application/pdf" {
            Self::Pdf
        } else {
            Self::Icon
        }
    }
}

/// Where a local attachment came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AttachmentSource {
    /// Picked by the user from the filesystem.
    Picked,
    /// Extracted from an inline image in rich text.
    Embedded,
}

/// A file staged on this machine and not yet persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalAttachment {
    pub id: String,
    pub name: String,
    pub mime_type: String,
    pub size: u64,
    pub bytes: Arc<[u8]>,
    pub preview_url: PreviewUrl,
    pub preview_kind: PreviewKind,
    pub source: AttachmentSource,
}

impl LocalAttachment {
    /// Caption used when this file is uploaded without the message text.
    #[must_use]
    pub const fn placeholder_caption(&self) -> &'static str {
        match self.source {
            AttachmentSource::Picked => "Attachment",
            AttachmentSource::Embedded => "Embedded Image",
        }
    }

    /// Consume the local file once the server has persisted it.
    #[must_use]
    pub fn into_remote(self, id: i64, url: String, uploaded_at: Option<String>) -> RemoteAttachment {
        RemoteAttachment {
            id,
            url,
            name: self.name,
            mime_type: self.mime_type,
            uploaded_at,
        }
    }
}

/// A file persisted by the server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteAttachment {
    pub id: i64,
    pub url: String,
    pub name: String,
    pub mime_type: String,
    pub uploaded_at: Option<String>,
}

impl RemoteAttachment {
    /// Build from a server URL, inferring the name and type from its path.
    #[must_use]
    pub fn from_url(id: i64, url: Option<String>, uploaded_at: Option<String>) -> Self {
        let url = url.unwrap_or_default();
        Self {
            id,
            name: file_name_from_url(&url),
            mime_type: mime_from_name(&file_name_from_url(&url)).to_string(),
            url,
            uploaded_at,
        }
    }
}

/// Either side of the local -> remote transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Attachment {
    Local(LocalAttachment),
    Remote(RemoteAttachment),
}

impl Attachment {
    #[must_use]
    pub fn name(&self) -> &str {
        match self {
            Self::Local(a) => &a.name,
            Self::Remote(a) => &a.name,
        }
    }

    #[must_use]
    pub fn mime_type(&self) -> &str {
        match self {
            Self::Local(a) => &a.mime_type,
            Self::Remote(a) => &a.mime_type,
        }
    }

    /// URL to render: the preview for local files, the server URL otherwise.
    #[must_use]
    pub fn url(&self) -> &str {
        match self {
            Self::Local(a) => a.preview_url.as_str(),
            Self::Remote(a) => &a.url,
        }
    }

    #[must_use]
    pub const fn is_local(&self) -> bool {
        matches!(self, Self::Local(_))
    }

    #[must_use]
    pub fn preview_url(&self) -> Option<&PreviewUrl> {
        match self {
            Self::Local(a) => Some(&a.preview_url),
            Self::Remote(_) => None,
        }
    }
}

/// Generates client-side temporary ids (`{prefix}-{millis}-{suffix}`).
///
/// Ids handed out by one generator never repeat.
#[derive(Debug, Default)]
pub struct TempIdGenerator {
    issued: HashSet<String>,
}

impl TempIdGenerator {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn next(&mut self, prefix: &str) -> String {
        loop {
            let candidate = format!("{prefix}-{}-{}", unix_millis(), random_suffix(9));
            if self.issued.insert(candidate.clone()) {
                return candidate;
            }
        }
    }

    #[must_use]
    pub fn issued(&self) -> usize {
        self.issued.len()
    }
}

pub(crate) fn unix_millis() -> u128 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |d| d.as_millis())
}

pub(crate) fn random_suffix(len: usize) -> String {
    let mut rng = rand::thread_rng();
    (0..len)
        .map(|_| char::from(BASE36[rng.gen_range(0..BASE36.len())]))
        .collect()
}

/// Last path segment of a URL, without query string.
#[must_use]
pub fn file_name_from_url(url: &str) -> String {
    if url.is_empty() {
        return "Unknown file".to_string();
    }
    let last = url.rsplit('/').next().unwrap_or(url);
    let name = last.split(['?', '#']).next().unwrap_or(last);
    if name.is_empty() {
        "Unknown file".to_string()
    } else {
        name.to_string()
    }
}

/// MIME type inferred from a file name's extension.
#[must_use]
pub fn mime_from_name(name: &str) -> &'static str {
    let ext = name
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "gif" => "image/gif",
        "bmp" => "image/bmp",
        "webp" => "image/webp",
        "svg" => "image/svg+xml",
        "pdf" => "application/pdf",
        "doc" | "docx" => "application/msword",
        "xls" | "xlsx" => "application/vnd.ms-excel",
        "ppt" | "pptx" => "application/vnd.ms-powerpoint",
        "zip" | "rar" | "7z" => "application/zip",
        "txt" | "log" => "text/plain",
        "csv" => "text/csv",
        "json" => "application/json",
        _ => "application/octet-stream",
    }
}

/// File extension for an image MIME type (`image/png` -> `png`).
#[must_use]
pub fn extension_for_mime(mime_type: &str) -> &str {
    match mime_type {
        "image/jpeg" => "jpg",
        "image/svg+xml" => "svg",
        other => other
            .split_once('/')
            .map(|(_, sub)| sub)
            .filter(|sub| !sub.is_empty())
            .unwrap_or("png"),
    }
}
