//! Extract the authenticated viewer from the request (set upstream as `X-User-Id`).

use crate::error::AppError;
use async_trait::async_trait;
use axum::{extract::FromRequestParts, http::request::Parts};

/// Header carrying the authenticated user id. Written by the authentication
/// layer in front of this service; absent for anonymous requests.
pub const VIEWER_ID_HEADER: &str = "X-User-Id";

/// Optional viewer. Missing, blank, or non-numeric header means anonymous.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Viewer(pub Option<i64>);

/// Required viewer; rejects with 401 when absent.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AuthUser(pub i64);

pub(crate) fn viewer_from_parts(parts: &Parts) -> Option<i64> {
    parts
        .headers
        .get(VIEWER_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .and_then(|s| s.parse::<i64>().ok())
        .filter(|id| *id > 0)
}

#[async_trait]
impl<S> FromRequestParts<S> for Viewer
where
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(Viewer(viewer_from_parts(parts)))
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        viewer_from_parts(parts).map(AuthUser).ok_or(AppError::Unauthorized)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Request;

    async fn viewer_for(header: Option<&str>) -> Viewer {
        let mut builder = Request::builder().uri("/");
        if let Some(h) = header {
            builder = builder.header(VIEWER_ID_HEADER, h);
        }
        let (mut parts, _) = builder.body(()).unwrap().into_parts();
        Viewer::from_request_parts(&mut parts, &()).await.unwrap()
    }

    #[tokio::test]
    async fn reads_numeric_header() {
        assert_eq!(viewer_for(Some(" 42 ")).await, Viewer(Some(42)));
    }

    #[tokio::test]
    async fn garbage_is_anonymous() {
        assert_eq!(viewer_for(None).await, Viewer(None));
        assert_eq!(viewer_for(Some("abc")).await, Viewer(None));
        assert_eq!(viewer_for(Some("-3")).await, Viewer(None));
    }

    #[tokio::test]
    async fn auth_user_requires_header() {
        let (mut parts, _) = Request::builder().uri("/").body(()).unwrap().into_parts();
        let res = AuthUser::from_request_parts(&mut parts, &()).await;
        assert!(matches!(res, Err(AppError::Unauthorized)));
    }
}
