//! Presentation layer: turns stored rows into response views.
//!
//! Every loader works on a batch of rows. Counters and viewer flags are fetched with one
//! `= ANY($1)` query per concern and joined back in memory, so a list of N rows costs a
//! fixed number of queries regardless of N. The `build` functions on each view are pure.

pub mod community;
pub mod groups;
pub mod market;
pub mod music;
pub mod social;
pub mod users;

use crate::error::AppError;
use sqlx::PgPool;
use std::collections::{HashMap, HashSet};
use std::hash::Hash;

pub use community::{ChoirView, ChurchView, LiveEventView, VideoStudioView};
pub use groups::{AttachmentView, GroupJoinRequestView, GroupMemberView, GroupPostView, GroupView};
pub use market::{
    CartItemView, CartView, OrderItemView, OrderView, ProductCategoryView, ProductImageView, ProductReviewView,
    ProductView, WishlistView,
};
pub use music::{CategoryView, CommentView, LikeView, PlaylistView, TrackView};
pub use social::{NotificationView, PostCommentView, PostLikeView, PostSaveView, SocialPostView};
pub use users::{ProfileView, UserDetailView, UserView};

/// `SELECT key, COUNT(*) ... WHERE key = ANY($1) GROUP BY key` as a map. Missing keys count zero.
pub(crate) async fn counts(pool: &PgPool, sql: &'static str, ids: &[i64]) -> Result<HashMap<i64, i64>, AppError> {
    if ids.is_empty() {
        return Ok(HashMap::new());
    }
    tracing::debug!(sql = %sql, ids = ids.len(), "query");
    let rows: Vec<(i64, i64)> = sqlx::query_as(sql).bind(ids).fetch_all(pool).await?;
    Ok(rows.into_iter().collect())
}

/// Keys among `ids` that the viewer has a row for (`$1` ids, `$2` viewer).
/// Anonymous viewers never hit, so the query is skipped.
pub(crate) async fn viewer_hits(
    pool: &PgPool,
    sql: &'static str,
    ids: &[i64],
    viewer: Option<i64>,
) -> Result<HashSet<i64>, AppError> {
    let Some(viewer) = viewer else {
        return Ok(HashSet::new());
    };
    if ids.is_empty() {
        return Ok(HashSet::new());
    }
    tracing::debug!(sql = %sql, ids = ids.len(), viewer, "query");
    let rows: Vec<(i64,)> = sqlx::query_as(sql).bind(ids).bind(viewer).fetch_all(pool).await?;
    Ok(rows.into_iter().map(|(id,)| id).collect())
}

/// Distinct ids in first-seen order.
pub(crate) fn unique_ids(ids: impl IntoIterator<Item = i64>) -> Vec<i64> {
    let mut seen = HashSet::new();
    ids.into_iter().filter(|id| seen.insert(*id)).collect()
}

/// Groups `(key, value)` pairs preserving value order per key.
pub(crate) fn group_by<K: Eq + Hash, V>(pairs: impl IntoIterator<Item = (K, V)>) -> HashMap<K, Vec<V>> {
    let mut out: HashMap<K, Vec<V>> = HashMap::new();
    for (k, v) in pairs {
        out.entry(k).or_default().push(v);
    }
    out
}

/// The single view produced from a one-row batch.
pub(crate) fn single<T>(mut views: Vec<T>, what: &str) -> Result<T, AppError> {
    views.pop().ok_or_else(|| AppError::NotFound(what.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unique_ids_keeps_first_occurrence_order() {
        assert_eq!(unique_ids([3, 1, 3, 2, 1]), vec![3, 1, 2]);
    }

    #[test]
    fn group_by_preserves_order_within_key() {
        let grouped = group_by([(1, "b"), (2, "x"), (1, "a")]);
        assert_eq!(grouped[&1], vec!["b", "a"]);
        assert_eq!(grouped[&2], vec!["x"]);
    }

    #[test]
    fn single_of_empty_is_not_found() {
        assert!(matches!(single::<u8>(vec![], "track"), Err(AppError::NotFound(_))));
        assert_eq!(single(vec![7], "track").unwrap(), 7);
    }
}
