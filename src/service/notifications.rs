//! Notification fan-out and the recipient-scoped notification queries.

use super::Page;
use crate::error::AppError;
use crate::schema::{Notification, NotificationType};
use sqlx::{PgConnection, PgPool};

/// What the notification points at.
#[derive(Clone, Copy, Debug, Default)]
pub struct Target {
    pub post_id: Option<i64>,
    pub track_id: Option<i64>,
}

pub fn message_suffix(kind: NotificationType, target: Target) -> &'static str {
    let on_track = target.track_id.is_some() && target.post_id.is_none();
    match kind {
        NotificationType::Like if on_track => " liked your track",
        NotificationType::Like => " liked your post",
        NotificationType::Comment if on_track => " commented on your track",
        NotificationType::Comment => " commented on your post",
        NotificationType::Save => " saved your post",
        NotificationType::Follow => " started following you",
    }
}

/// Records a notification from `sender` to `recipient`. Acting on your own content is silent.
pub async fn notify(
    conn: &mut PgConnection,
    recipient: i64,
    sender: i64,
    kind: NotificationType,
    target: Target,
) -> Result<(), AppError> {
    if recipient == sender {
        return Ok(());
    }
    let sql = "INSERT INTO notifications (recipient_id, sender_id, message, notification_type, post_id, track_id) \
               SELECT $1, u.id, u.username || $3, $4, $5, $6 FROM users u WHERE u.id = $2";
    tracing::debug!(sql, recipient, sender, kind = kind.as_str(), "query");
    sqlx::query(sql)
        .bind(recipient)
        .bind(sender)
        .bind(message_suffix(kind, target))
        .bind(kind.as_str())
        .bind(target.post_id)
        .bind(target.track_id)
        .execute(conn)
        .await?;
    Ok(())
}

pub async fn list(pool: &PgPool, recipient: i64, page: Page) -> Result<Vec<Notification>, AppError> {
    let rows = sqlx::query_as(
        "SELECT * FROM notifications WHERE recipient_id = $1 ORDER BY created_at DESC, id DESC LIMIT $2 OFFSET $3",
    )
    .bind(recipient)
    .bind(page.limit())
    .bind(page.offset())
    .fetch_all(pool)
    .await?;
    Ok(rows)
}

pub async fn get(pool: &PgPool, recipient: i64, id: i64) -> Result<Notification, AppError> {
    sqlx::query_as("SELECT * FROM notifications WHERE id = $1 AND recipient_id = $2")
        .bind(id)
        .bind(recipient)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("notification {}", id)))
}

pub async fn unread_count(pool: &PgPool, recipient: i64) -> Result<i64, AppError> {
    let (n,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM notifications WHERE recipient_id = $1 AND NOT read")
        .bind(recipient)
        .fetch_one(pool)
        .await?;
    Ok(n)
}

pub async fn mark_read(pool: &PgPool, recipient: i64, id: i64) -> Result<Notification, AppError> {
    sqlx::query_as("UPDATE notifications SET read = TRUE WHERE id = $1 AND recipient_id = $2 RETURNING *")
        .bind(id)
        .bind(recipient)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("notification {}", id)))
}

/// Marks everything read; returns how many rows changed.
pub async fn mark_all_read(pool: &PgPool, recipient: i64) -> Result<u64, AppError> {
    let done = sqlx::query("UPDATE notifications SET read = TRUE WHERE recipient_id = $1 AND NOT read")
        .bind(recipient)
        .execute(pool)
        .await?;
    Ok(done.rows_affected())
}

pub async fn delete(pool: &PgPool, recipient: i64, id: i64) -> Result<(), AppError> {
    let done = sqlx::query("DELETE FROM notifications WHERE id = $1 AND recipient_id = $2")
        .bind(id)
        .bind(recipient)
        .execute(pool)
        .await?;
    if done.rows_affected() == 0 {
        return Err(AppError::NotFound(format!("notification {}", id)));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_name_the_target() {
        let post = Target { post_id: Some(1), track_id: None };
        let track = Target { post_id: None, track_id: Some(1) };
        assert_eq!(message_suffix(NotificationType::Like, post), " liked your post");
        assert_eq!(message_suffix(NotificationType::Like, track), " liked your track");
        assert_eq!(message_suffix(NotificationType::Comment, track), " commented on your track");
        assert_eq!(message_suffix(NotificationType::Follow, Target::default()), " started following you");
    }
}
