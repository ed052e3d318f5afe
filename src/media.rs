//! Uploaded media: storage contract, local filesystem store, and path helpers.
//!
//! Stored references are relative paths such as `audio/3f2a...-song.mp3`; the
//! presentation layer turns them into absolute URLs under [`MEDIA_URL_PREFIX`].

use crate::error::AppError;
use async_trait::async_trait;
use std::path::{Component, Path, PathBuf};
use std::pin::Pin;
use tokio::io::{AsyncRead, AsyncReadExt};

/// Public URL prefix the server mounts the media root under.
pub const MEDIA_URL_PREFIX: &str = "/media/";

/// Upload directories, one per kind of stored file.
pub mod dirs {
    pub const AVATARS: &str = "avatars";
    pub const AUDIO: &str = "audio";
    pub const COVERS: &str = "covers";
    pub const PROFILES: &str = "profiles";
    pub const SOCIAL_MEDIA: &str = "social_media";
    pub const GROUP_COVERS: &str = "group_covers";
    pub const GROUP_ATTACHMENTS: &str = "group_post_attachments";
    pub const CHURCHES: &str = "churches";
    pub const CHOIRS: &str = "choirs";
    pub const STUDIOS: &str = "studios";
    pub const PRODUCTS: &str = "products";
}

/// Readable handle on a stored file, streamed rather than buffered.
pub type MediaReader = Pin<Box<dyn AsyncRead + Send>>;

#[async_trait]
pub trait MediaStore: Send + Sync {
    /// Persists bytes under `dir` and returns the stored relative path.
    async fn save(&self, dir: &str, file_name: &str, data: &[u8]) -> Result<String, AppError>;
    /// Opens a stored file for reading.
    async fn reader(&self, path: &str) -> Result<MediaReader, AppError>;
    /// Reads a whole stored file into memory.
    async fn open(&self, path: &str) -> Result<Vec<u8>, AppError> {
        let mut reader = self.reader(path).await?;
        let mut bytes = Vec::new();
        reader.read_to_end(&mut bytes).await?;
        Ok(bytes)
    }
    /// Removes a stored file; missing files are not an error.
    async fn remove(&self, path: &str) -> Result<(), AppError>;
}

pub struct LocalMediaStore {
    root: PathBuf,
}

impl LocalMediaStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        LocalMediaStore { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn resolve(&self, path: &str) -> Result<PathBuf, AppError> {
        let rel = Path::new(path);
        if rel.components().any(|c| !matches!(c, Component::Normal(_))) {
            return Err(AppError::BadRequest(format!("invalid media path: {}", path)));
        }
        Ok(self.root.join(rel))
    }
}

#[async_trait]
impl MediaStore for LocalMediaStore {
    async fn save(&self, dir: &str, file_name: &str, data: &[u8]) -> Result<String, AppError> {
        let name = format!("{}-{}", uuid::Uuid::new_v4().simple(), sanitize_file_name(file_name));
        let rel = format!("{}/{}", dir, name);
        let target = self.resolve(&rel)?;
        if let Some(parent) = target.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&target, data).await?;
        tracing::debug!(path = %rel, bytes = data.len(), "stored upload");
        Ok(rel)
    }

    async fn reader(&self, path: &str) -> Result<MediaReader, AppError> {
        let target = self.resolve(path)?;
        match tokio::fs::File::open(&target).await {
            Ok(file) => Ok(Box::pin(file)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(AppError::NotFound(format!("media file {}", path)))
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn remove(&self, path: &str) -> Result<(), AppError> {
        let target = self.resolve(path)?;
        match tokio::fs::remove_file(&target).await {
            Err(e) if e.kind() != std::io::ErrorKind::NotFound => Err(e.into()),
            _ => Ok(()),
        }
    }
}

/// Keeps ASCII alphanumerics, dots, dashes and underscores; everything else becomes `_`.
pub fn sanitize_file_name(name: &str) -> String {
    let base = name.rsplit(['/', '\\']).next().unwrap_or(name);
    let cleaned: String = base
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') { c } else { '_' })
        .collect();
    let cleaned = cleaned.trim_start_matches('.').to_string();
    if cleaned.is_empty() {
        "upload".into()
    } else {
        cleaned
    }
}

/// Lower-case extension of a stored path or file name, without the dot.
pub fn extension(path: &str) -> Option<String> {
    Path::new(path)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
}

/// File name part of a stored path.
pub fn file_name(path: &str) -> &str {
    path.rsplit('/').next().unwrap_or(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sanitizes_names() {
        assert_eq!(sanitize_file_name("../../etc/passwd"), "passwd");
        assert_eq!(sanitize_file_name("my song (live).mp3"), "my_song__live_.mp3");
        assert_eq!(sanitize_file_name("..."), "upload");
    }

    #[test]
    fn extension_is_lowercase() {
        assert_eq!(extension("audio/abc-Track.FLAC").as_deref(), Some("flac"));
        assert_eq!(extension("noext"), None);
    }

    #[tokio::test]
    async fn local_store_round_trip() {
        let root = std::env::temp_dir().join(format!("advent-media-{}", uuid::Uuid::new_v4()));
        let store = LocalMediaStore::new(&root);
        let path = store.save(dirs::AUDIO, "song.mp3", b"ID3").await.unwrap();
        assert!(path.starts_with("audio/"));
        assert!(path.ends_with("-song.mp3"));
        assert_eq!(store.open(&path).await.unwrap(), b"ID3".to_vec());
        store.remove(&path).await.unwrap();
        assert!(matches!(store.open(&path).await, Err(AppError::NotFound(_))));
        let _ = tokio::fs::remove_dir_all(&root).await;
    }

    #[tokio::test]
    async fn rejects_escaping_paths() {
        let store = LocalMediaStore::new(std::env::temp_dir());
        assert!(matches!(store.open("../secret").await, Err(AppError::BadRequest(_))));
    }
}
