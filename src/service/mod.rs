//! Write-side operations and the queries behind each endpoint.

pub mod community;
pub mod groups;
pub mod market;
pub mod music;
pub mod notifications;
pub mod orders;
pub mod social;
pub mod users;
mod validation;

pub use validation::{parse_duration, validate_social_upload, RequestValidator, SocialUpload};

use crate::error::AppError;
use crate::extractors::UploadedFile;
use crate::media::MediaStore;
use serde::Deserialize;

const DEFAULT_LIMIT: u32 = 100;
const MAX_LIMIT: u32 = 1000;

/// `?limit=&offset=` on list endpoints. Limit defaults to 100, capped at 1000.
#[derive(Clone, Copy, Debug, Default, Deserialize)]
pub struct Page {
    pub limit: Option<u32>,
    pub offset: Option<u32>,
}

impl Page {
    pub fn limit(&self) -> i64 {
        i64::from(self.limit.unwrap_or(DEFAULT_LIMIT).min(MAX_LIMIT))
    }

    pub fn offset(&self) -> i64 {
        i64::from(self.offset.unwrap_or(0))
    }
}

/// Rejects a write on a row the viewer does not own.
pub fn ensure_owner(owner_id: i64, viewer: i64, what: &str) -> Result<(), AppError> {
    if owner_id == viewer {
        Ok(())
    } else {
        tracing::warn!(owner_id, viewer, what, "write by non-owner rejected");
        Err(AppError::Forbidden(format!("you do not own this {}", what)))
    }
}

/// `%term%` for ILIKE with the wildcard characters of `term` escaped.
pub fn like_pattern(term: &str) -> String {
    let escaped = term.replace('\\', "\\\\").replace('%', "\\%").replace('_', "\\_");
    format!("%{}%", escaped)
}

/// Uploads written ahead of the database write that references them.
///
/// Route the write's result through [`StagedUploads::settle`]; on error every file stored
/// here is removed again.
pub struct StagedUploads<'a> {
    media: &'a dyn MediaStore,
    paths: Vec<String>,
}

impl<'a> StagedUploads<'a> {
    pub fn new(media: &'a dyn MediaStore) -> Self {
        StagedUploads { media, paths: Vec::new() }
    }

    /// Stores an optional upload and returns its relative path.
    pub async fn store(&mut self, dir: &str, file: Option<&UploadedFile>) -> Result<Option<String>, AppError> {
        let Some(f) = file else {
            return Ok(None);
        };
        let path = self.media.save(dir, &f.file_name, &f.bytes).await?;
        self.paths.push(path.clone());
        Ok(Some(path))
    }

    pub fn paths(&self) -> &[String] {
        &self.paths
    }

    /// Passes `result` through, discarding the staged files first when it is an error.
    pub async fn settle<T>(self, result: Result<T, AppError>) -> Result<T, AppError> {
        if let Err(e) = &result {
            if !self.paths.is_empty() {
                tracing::debug!(files = self.paths.len(), error = %e, "write failed, discarding uploads");
                discard_uploads(self.media, self.paths.into_iter().map(Some)).await;
            }
        }
        result
    }
}

/// Removes files no row references any more. Failures are logged, not returned.
pub async fn discard_uploads(media: &dyn MediaStore, paths: impl IntoIterator<Item = Option<String>>) {
    for path in paths.into_iter().flatten() {
        if let Err(e) = media.remove(&path).await {
            tracing::warn!(path = %path, error = %e, "could not remove upload");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extractors::FormData;
    use crate::media::{dirs, LocalMediaStore};

    #[test]
    fn page_defaults_and_caps() {
        let p = Page::default();
        assert_eq!((p.limit(), p.offset()), (100, 0));
        let p = Page { limit: Some(5000), offset: Some(20) };
        assert_eq!((p.limit(), p.offset()), (1000, 20));
    }

    #[test]
    fn like_pattern_escapes_wildcards() {
        assert_eq!(like_pattern("50%_off"), "%50\\%\\_off%");
        assert_eq!(like_pattern("grace"), "%grace%");
    }

    fn staging_store() -> (LocalMediaStore, std::path::PathBuf) {
        let root = std::env::temp_dir().join(format!("advent-staged-{}", uuid::Uuid::new_v4()));
        (LocalMediaStore::new(root.clone()), root)
    }

    #[tokio::test]
    async fn failed_write_discards_staged_uploads() {
        let (store, root) = staging_store();
        let form = FormData::new().with_file("audio_file", "hymn.mp3", b"ID3".to_vec());
        let mut uploads = StagedUploads::new(&store);
        let path = uploads.store(dirs::AUDIO, form.file("audio_file")).await.unwrap().unwrap();
        let res: Result<(), AppError> = uploads.settle(Err(AppError::Conflict("slug taken".into()))).await;
        assert!(matches!(res, Err(AppError::Conflict(_))));
        assert!(matches!(store.open(&path).await, Err(AppError::NotFound(_))));
        let _ = tokio::fs::remove_dir_all(&root).await;
    }

    #[tokio::test]
    async fn successful_write_keeps_staged_uploads() {
        let (store, root) = staging_store();
        let form = FormData::new()
            .with_file("images", "front.jpg", b"jpg".to_vec())
            .with_file("images", "back.jpg", b"jpg".to_vec());
        let mut uploads = StagedUploads::new(&store);
        let mut stored = Vec::new();
        for f in form.files("images") {
            stored.extend(uploads.store(dirs::PRODUCTS, Some(f)).await.unwrap());
        }
        assert_eq!(stored.len(), 2);
        assert_eq!(uploads.paths(), stored.as_slice());
        assert_eq!(uploads.settle(Ok(7)).await.unwrap(), 7);
        for path in &stored {
            assert_eq!(store.open(path).await.unwrap(), b"jpg".to_vec());
        }
        let _ = tokio::fs::remove_dir_all(&root).await;
    }

    #[test]
    fn non_owner_is_forbidden() {
        assert!(ensure_owner(1, 1, "track").is_ok());
        assert!(matches!(ensure_owner(1, 2, "track"), Err(AppError::Forbidden(_))));
    }
}
