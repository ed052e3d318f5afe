//! HTTP handlers, one module per area of the API.

pub mod community;
pub mod groups;
pub mod market;
pub mod music;
pub mod notifications;
pub mod orders;
pub mod social;
pub mod users;

use crate::media::MediaReader;
use axum::{
    body::Body,
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
};
use tokio_util::io::ReaderStream;

/// Streamed file download with `Content-Disposition: attachment`, typed from the file extension.
pub(crate) fn attachment(file_name: &str, reader: MediaReader) -> Response {
    let mime = mime_guess::from_path(file_name).first_or_octet_stream();
    let disposition = format!("attachment; filename=\"{}\"", file_name.replace(['"', '\\'], "_"));
    let mut res = Body::from_stream(ReaderStream::new(reader)).into_response();
    if let Ok(v) = HeaderValue::from_str(mime.as_ref()) {
        res.headers_mut().insert(header::CONTENT_TYPE, v);
    }
    if let Ok(v) = HeaderValue::from_str(&disposition) {
        res.headers_mut().insert(header::CONTENT_DISPOSITION, v);
    }
    res
}

pub(crate) fn no_content() -> StatusCode {
    StatusCode::NO_CONTENT
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::media::{dirs, LocalMediaStore, MediaStore};
    use futures_util::StreamExt;

    #[tokio::test]
    async fn downloads_are_typed_attachments() {
        let res = attachment("grace.mp3", Box::pin(std::io::Cursor::new(vec![1u8, 2, 3])));
        assert_eq!(res.headers()[header::CONTENT_TYPE], "audio/mpeg");
        assert_eq!(res.headers()[header::CONTENT_DISPOSITION], "attachment; filename=\"grace.mp3\"");
        let body = axum::body::to_bytes(res.into_body(), usize::MAX).await.unwrap();
        assert_eq!(body.as_ref(), &[1, 2, 3]);
    }

    #[tokio::test]
    async fn stored_files_stream_in_chunks() {
        let root = std::env::temp_dir().join(format!("advent-download-{}", uuid::Uuid::new_v4()));
        let store = LocalMediaStore::new(root.clone());
        let audio = vec![7u8; 3 * 64 * 1024 + 5];
        let path = store.save(dirs::AUDIO, "psalm.flac", &audio).await.unwrap();
        let res = attachment("psalm-23.flac", store.reader(&path).await.unwrap());
        assert!(res.headers().get(header::CONTENT_LENGTH).is_none());
        let mut body = res.into_body().into_data_stream();
        let mut chunks = 0;
        let mut received = Vec::new();
        while let Some(chunk) = body.next().await {
            received.extend_from_slice(&chunk.unwrap());
            chunks += 1;
        }
        assert!(chunks > 1);
        assert_eq!(received, audio);
        let _ = tokio::fs::remove_dir_all(&root).await;
    }
}
