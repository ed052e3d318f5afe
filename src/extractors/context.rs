//! Per-request presentation context: who is looking, and from which origin.

use super::viewer::viewer_from_parts;
use crate::media::MEDIA_URL_PREFIX;
use async_trait::async_trait;
use axum::{
    extract::FromRequestParts,
    http::{header::HOST, request::Parts},
};

/// `scheme://host` of the inbound request, when a Host header is present.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RequestOrigin(pub Option<String>);

fn origin_from_parts(parts: &Parts) -> Option<String> {
    let host = parts
        .headers
        .get("X-Forwarded-Host")
        .or_else(|| parts.headers.get(HOST))
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|h| !h.is_empty())?;
    let scheme = parts
        .headers
        .get("X-Forwarded-Proto")
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|s| *s == "http" || *s == "https")
        .unwrap_or("http");
    Some(format!("{}://{}", scheme, host))
}

#[async_trait]
impl<S> FromRequestParts<S> for RequestOrigin
where
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(RequestOrigin(origin_from_parts(parts)))
    }
}

/// Everything a presenter needs besides the row itself.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ViewContext {
    pub viewer: Option<i64>,
    pub origin: Option<String>,
}

impl ViewContext {
    pub fn new(viewer: Option<i64>, origin: Option<String>) -> Self {
        ViewContext { viewer, origin }
    }

    pub fn anonymous() -> Self {
        ViewContext::default()
    }

    pub fn is_authenticated(&self) -> bool {
        self.viewer.is_some()
    }

    /// Viewer-relative boolean; always false for anonymous viewers.
    pub fn flag(&self, raw: bool) -> bool {
        self.is_authenticated() && raw
    }

    /// True when the viewer is `owner_id`.
    pub fn is_viewer(&self, owner_id: i64) -> bool {
        self.viewer == Some(owner_id)
    }

    /// Absolute URL for a stored media path; None without an origin or a file.
    pub fn media_url(&self, path: Option<&str>) -> Option<String> {
        let origin = self.origin.as_deref()?;
        let path = path.map(str::trim).filter(|p| !p.is_empty())?;
        Some(format!(
            "{}{}{}",
            origin.trim_end_matches('/'),
            MEDIA_URL_PREFIX,
            path.trim_start_matches('/')
        ))
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for ViewContext
where
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(ViewContext::new(viewer_from_parts(parts), origin_from_parts(parts)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Request;

    fn parts(headers: &[(&str, &str)]) -> Parts {
        let mut b = Request::builder().uri("/api/tracks");
        for (k, v) in headers {
            b = b.header(*k, *v);
        }
        b.body(()).unwrap().into_parts().0
    }

    #[test]
    fn origin_uses_forwarded_proto() {
        let p = parts(&[("Host", "api.example.org"), ("X-Forwarded-Proto", "https")]);
        assert_eq!(origin_from_parts(&p).as_deref(), Some("https://api.example.org"));
        assert_eq!(origin_from_parts(&parts(&[])), None);
    }

    #[test]
    fn media_url_needs_origin_and_path() {
        let ctx = ViewContext::new(None, Some("http://localhost:8000".into()));
        assert_eq!(
            ctx.media_url(Some("covers/a.png")).as_deref(),
            Some("http://localhost:8000/media/covers/a.png")
        );
        assert_eq!(ctx.media_url(None), None);
        assert_eq!(ctx.media_url(Some("")), None);
        assert_eq!(ViewContext::anonymous().media_url(Some("covers/a.png")), None);
    }

    #[test]
    fn anonymous_flags_are_false() {
        let anon = ViewContext::anonymous();
        assert!(!anon.flag(true));
        assert!(!anon.is_viewer(1));
        let signed_in = ViewContext::new(Some(1), None);
        assert!(signed_in.flag(true));
        assert!(signed_in.is_viewer(1));
        assert!(!signed_in.is_viewer(2));
    }

    #[tokio::test]
    async fn extracts_viewer_and_origin_together() {
        let mut p = parts(&[("Host", "h"), ("X-User-Id", "7")]);
        let ctx = ViewContext::from_request_parts(&mut p, &()).await.unwrap();
        assert_eq!(ctx, ViewContext::new(Some(7), Some("http://h".into())));
    }
}
