use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::debug;

use crate::error::ErrorCode;
use crate::model::attachment::{
    AttachmentSource, LocalAttachment, MAX_ATTACHMENT_BYTES, PreviewKind, PreviewUrl,
    TempIdGenerator, mime_from_name,
};
use crate::preview::PreviewRegistry;

#[derive(Debug, thiserror::Error)]
pub enum StagingError {
    #[error("{name} is {size} bytes; each file must be less than 10MB")]
    TooLarge { name: String, size: u64 },
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("no staged attachment with id {0}")]
    NotFound(String),
}

impl StagingError {
    #[must_use]
    pub const fn code(&self) -> ErrorCode {
        match self {
            Self::TooLarge { .. } => ErrorCode::AttachmentTooLarge,
            Self::Read { .. } => ErrorCode::FileReadFailed,
            Self::NotFound(_) => ErrorCode::AttachmentNotFound,
        }
    }
}

/// Files picked for the next message, plus the preview handles and temp ids
/// that go with them.
#[derive(Debug, Default)]
pub struct StagingArea {
    files: Vec<LocalAttachment>,
    previews: PreviewRegistry,
    ids: TempIdGenerator,
}

impl StagingArea {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn files(&self) -> &[LocalAttachment] {
        &self.files
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    #[must_use]
    pub const fn previews(&self) -> &PreviewRegistry {
        &self.previews
    }

    /// Next temp id for anything created in this workspace.
    pub fn next_id(&mut self, prefix: &str) -> String {
        self.ids.next(prefix)
    }

    pub(crate) fn ids_mut(&mut self) -> &mut TempIdGenerator {
        &mut self.ids
    }

    /// Stage a file from disk. The size is checked before the file is read.
    pub fn stage_path(&mut self, path: &Path) -> Result<&LocalAttachment, StagingError> {
        let read_err = |source: std::io::Error| StagingError::Read {
            path: path.to_path_buf(),
            source,
        };
        let name = path
            .file_name()
            .map_or_else(|| path.display().to_string(), |n| n.to_string_lossy().into_owned());

        let size = std::fs::metadata(path).map_err(read_err)?.len();
        check_size(&name, size)?;
        let bytes = std::fs::read(path).map_err(read_err)?;
        self.stage_bytes(&name, bytes)
    }

    /// Stage in-memory content under `name`. The same name may be staged
    /// more than once; each copy gets its own id.
    pub fn stage_bytes(
        &mut self,
        name: &str,
        bytes: Vec<u8>,
    ) -> Result<&LocalAttachment, StagingError> {
        let size = bytes.len() as u64;
        check_size(name, size)?;

        let mime_type = mime_from_name(name).to_string();
        let attachment = LocalAttachment {
            id: self.ids.next("local"),
            name: name.to_string(),
            preview_kind: PreviewKind::for_mime(&mime_type),
            mime_type,
            size,
            bytes: Arc::from(bytes),
            preview_url: self.previews.create(),
            source: AttachmentSource::Picked,
        };
        debug!(id = %attachment.id, name, size, "staged attachment");

        self.files.push(attachment);
        let index = self.files.len() - 1;
        Ok(&self.files[index])
    }

    /// Drop a staged file and revoke its preview.
    pub fn remove(&mut self, id: &str) -> Result<LocalAttachment, StagingError> {
        let index = self
            .files
            .iter()
            .position(|f| f.id == id)
            .ok_or_else(|| StagingError::NotFound(id.to_string()))?;
        let removed = self.files.remove(index);
        self.previews.revoke(&removed.preview_url);
        debug!(id, "unstaged attachment");
        Ok(removed)
    }

    /// Hand every staged file to a send. Previews stay live until the send settles.
    pub fn take_all(&mut self) -> Vec<LocalAttachment> {
        std::mem::take(&mut self.files)
    }

    pub fn release(&mut self, url: &PreviewUrl) -> bool {
        self.previews.revoke(url)
    }

    /// Drop everything and revoke all previews.
    pub fn clear(&mut self) -> usize {
        self.files.clear();
        self.previews.revoke_all()
    }
}

fn check_size(name: &str, size: u64) -> Result<(), StagingError> {
    if size > MAX_ATTACHMENT_BYTES {
        return Err(StagingError::TooLarge {
            name: name.to_string(),
            size,
        });
    }
    Ok(())
}
