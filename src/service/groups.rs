//! Groups: lifecycle, membership, join requests, and member posts.

use super::{discard_uploads, like_pattern, Page, RequestValidator, StagedUploads};
use crate::error::AppError;
use crate::extractors::FormData;
use crate::media::{self, dirs, MediaStore};
use crate::schema::{AttachmentKind, Group, GroupJoinRequest, GroupMember, GroupPost, JoinStatus};
use crate::slug::unique_slug;
use serde::{Deserialize, Serialize};
use sqlx::PgPool;

pub const GROUP_NAME_MAX: usize = 100;

#[derive(Clone, Debug, Default, Deserialize)]
pub struct GroupFilter {
    pub search: Option<String>,
}

pub async fn list(pool: &PgPool, filter: &GroupFilter, page: Page) -> Result<Vec<Group>, AppError> {
    let search = filter.search.as_deref().map(str::trim).filter(|s| !s.is_empty()).map(like_pattern);
    let rows = sqlx::query_as(
        "SELECT * FROM groups WHERE ($1::text IS NULL OR name ILIKE $1 OR description ILIKE $1) \
         ORDER BY created_at DESC, id DESC LIMIT $2 OFFSET $3",
    )
    .bind(search)
    .bind(page.limit())
    .bind(page.offset())
    .fetch_all(pool)
    .await?;
    Ok(rows)
}

pub async fn get(pool: &PgPool, slug: &str) -> Result<Group, AppError> {
    sqlx::query_as("SELECT * FROM groups WHERE slug = $1")
        .bind(slug)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("group {}", slug)))
}

/// Viewer's standing in a group.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct MembershipStatus {
    pub is_member: bool,
    pub is_admin: bool,
}

pub async fn membership(pool: &PgPool, group_id: i64, viewer: Option<i64>) -> Result<MembershipStatus, AppError> {
    let Some(viewer) = viewer else {
        return Ok(MembershipStatus::default());
    };
    let row: Option<(bool,)> = sqlx::query_as("SELECT is_admin FROM group_members WHERE group_id = $1 AND user_id = $2")
        .bind(group_id)
        .bind(viewer)
        .fetch_optional(pool)
        .await?;
    Ok(MembershipStatus {
        is_member: row.is_some(),
        is_admin: row.is_some_and(|(admin,)| admin),
    })
}

async fn ensure_admin(pool: &PgPool, group: &Group, viewer: i64) -> Result<(), AppError> {
    if membership(pool, group.id, Some(viewer)).await?.is_admin {
        return Ok(());
    }
    tracing::warn!(group_id = group.id, viewer, "non-admin group write rejected");
    Err(AppError::Forbidden("only group admins can do this".into()))
}

/// Creates a group; the creator joins as its first admin.
pub async fn create(pool: &PgPool, media: &dyn MediaStore, viewer: i64, form: &FormData) -> Result<Group, AppError> {
    let name = form.trimmed("name");
    RequestValidator::new()
        .required("name", name.as_deref())
        .max_length("name", name.as_deref(), GROUP_NAME_MAX)
        .finish()?;
    let name = name.unwrap_or_default();
    let is_private = form.bool("is_private")?.unwrap_or(false);
    let mut uploads = StagedUploads::new(media);
    let written = async {
        let cover = uploads.store(dirs::GROUP_COVERS, form.file("cover_image")).await?;
        let mut tx = pool.begin().await?;
        let slug = unique_slug(&mut *tx, "groups", &name, "group").await?;
        let group: Group = sqlx::query_as(
            "INSERT INTO groups (name, slug, description, cover_image, creator_id, is_private) \
             VALUES ($1, $2, $3, $4, $5, $6) RETURNING *",
        )
        .bind(&name)
        .bind(&slug)
        .bind(form.text("description").unwrap_or_default())
        .bind(cover)
        .bind(viewer)
        .bind(is_private)
        .fetch_one(&mut *tx)
        .await?;
        sqlx::query("INSERT INTO group_members (group_id, user_id, is_admin) VALUES ($1, $2, TRUE)")
            .bind(group.id)
            .bind(viewer)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        Ok::<_, AppError>(group)
    }
    .await;
    let group = uploads.settle(written).await?;
    tracing::info!(group_id = group.id, slug = %group.slug, creator_id = viewer, "group created");
    Ok(group)
}

pub async fn update(
    pool: &PgPool,
    media: &dyn MediaStore,
    viewer: i64,
    slug: &str,
    form: &FormData,
) -> Result<Group, AppError> {
    let current = get(pool, slug).await?;
    ensure_admin(pool, &current, viewer).await?;
    let name = form.trimmed("name");
    RequestValidator::new()
        .max_length("name", name.as_deref(), GROUP_NAME_MAX)
        .finish()?;
    let mut uploads = StagedUploads::new(media);
    let written = async {
        let cover = uploads.store(dirs::GROUP_COVERS, form.file("cover_image")).await?;
        let group: Group = sqlx::query_as(
            "UPDATE groups SET name = COALESCE($2, name), description = COALESCE($3, description), \
             is_private = COALESCE($4, is_private), cover_image = COALESCE($5, cover_image), updated_at = NOW() \
             WHERE id = $1 RETURNING *",
        )
        .bind(current.id)
        .bind(name)
        .bind(form.text("description"))
        .bind(form.bool("is_private")?)
        .bind(cover)
        .fetch_one(pool)
        .await?;
        Ok::<_, AppError>(group)
    }
    .await;
    let replaced = !uploads.paths().is_empty();
    let group = uploads.settle(written).await?;
    if replaced {
        discard_uploads(media, [current.cover_image]).await;
    }
    Ok(group)
}

/// Only the creator may delete a group.
pub async fn delete(pool: &PgPool, media: &dyn MediaStore, viewer: i64, slug: &str) -> Result<(), AppError> {
    let current = get(pool, slug).await?;
    if current.creator_id != viewer {
        tracing::warn!(group_id = current.id, viewer, "group delete by non-creator rejected");
        return Err(AppError::Forbidden("only the group creator can delete it".into()));
    }
    let files: Vec<(String,)> = sqlx::query_as(
        "SELECT a.file FROM group_post_attachments a JOIN group_posts p ON p.id = a.post_id WHERE p.group_id = $1",
    )
    .bind(current.id)
    .fetch_all(pool)
    .await?;
    sqlx::query("DELETE FROM groups WHERE id = $1").bind(current.id).execute(pool).await?;
    discard_uploads(media, files.into_iter().map(|(f,)| Some(f)).chain([current.cover_image])).await;
    tracing::info!(group_id = current.id, "group deleted");
    Ok(())
}

/// Result of a join attempt: immediate membership for public groups, a pending request otherwise.
#[derive(Clone, Debug)]
pub enum JoinOutcome {
    Joined(GroupMember),
    Requested(GroupJoinRequest),
}

pub async fn join(pool: &PgPool, viewer: i64, slug: &str, form: &FormData) -> Result<JoinOutcome, AppError> {
    let group = get(pool, slug).await?;
    if membership(pool, group.id, Some(viewer)).await?.is_member {
        return Err(AppError::Conflict("you are already a member of this group".into()));
    }
    if !group.is_private {
        let member: GroupMember =
            sqlx::query_as("INSERT INTO group_members (group_id, user_id) VALUES ($1, $2) RETURNING *")
                .bind(group.id)
                .bind(viewer)
                .fetch_one(pool)
                .await?;
        tracing::info!(group_id = group.id, user_id = viewer, "joined group");
        return Ok(JoinOutcome::Joined(member));
    }
    let request: Option<GroupJoinRequest> = sqlx::query_as(
        "INSERT INTO group_join_requests (group_id, user_id, message) VALUES ($1, $2, $3) \
         ON CONFLICT (group_id, user_id) WHERE status = 'pending' DO NOTHING RETURNING *",
    )
    .bind(group.id)
    .bind(viewer)
    .bind(form.text("message").unwrap_or_default())
    .fetch_optional(pool)
    .await?;
    let request = request.ok_or_else(|| AppError::Conflict("a join request is already pending".into()))?;
    tracing::info!(group_id = group.id, user_id = viewer, request_id = request.id, "join requested");
    Ok(JoinOutcome::Requested(request))
}

pub async fn leave(pool: &PgPool, viewer: i64, slug: &str) -> Result<(), AppError> {
    let group = get(pool, slug).await?;
    let done = sqlx::query("DELETE FROM group_members WHERE group_id = $1 AND user_id = $2")
        .bind(group.id)
        .bind(viewer)
        .execute(pool)
        .await?;
    if done.rows_affected() == 0 {
        return Err(AppError::BadRequest("you are not a member of this group".into()));
    }
    Ok(())
}

pub async fn members(pool: &PgPool, slug: &str, page: Page) -> Result<Vec<GroupMember>, AppError> {
    let group = get(pool, slug).await?;
    let rows = sqlx::query_as(
        "SELECT * FROM group_members WHERE group_id = $1 ORDER BY joined_at, id LIMIT $2 OFFSET $3",
    )
    .bind(group.id)
    .bind(page.limit())
    .bind(page.offset())
    .fetch_all(pool)
    .await?;
    Ok(rows)
}

/// Posts in a group. Private groups show their posts to members only.
pub async fn posts(pool: &PgPool, viewer: Option<i64>, slug: &str, page: Page) -> Result<Vec<GroupPost>, AppError> {
    let group = get(pool, slug).await?;
    if group.is_private && !membership(pool, group.id, viewer).await?.is_member {
        return Err(AppError::Forbidden("this group is private".into()));
    }
    let rows = sqlx::query_as(
        "SELECT * FROM group_posts WHERE group_id = $1 ORDER BY created_at DESC, id DESC LIMIT $2 OFFSET $3",
    )
    .bind(group.id)
    .bind(page.limit())
    .bind(page.offset())
    .fetch_all(pool)
    .await?;
    Ok(rows)
}

/// Members post text plus any number of `attachments` files, each typed by extension.
pub async fn create_post(
    pool: &PgPool,
    media: &dyn MediaStore,
    viewer: i64,
    slug: &str,
    form: &FormData,
) -> Result<GroupPost, AppError> {
    let group = get(pool, slug).await?;
    if !membership(pool, group.id, Some(viewer)).await?.is_member {
        return Err(AppError::Forbidden("only members can post in this group".into()));
    }
    let content = form.text("content").map(str::trim).unwrap_or_default().to_string();
    let files: Vec<_> = form.files("attachments").collect();
    if content.is_empty() && files.is_empty() {
        return Err(AppError::invalid("content", "A post needs content or at least one attachment."));
    }
    let mut uploads = StagedUploads::new(media);
    let written = async {
        let mut tx = pool.begin().await?;
        let post: GroupPost =
            sqlx::query_as("INSERT INTO group_posts (group_id, user_id, content) VALUES ($1, $2, $3) RETURNING *")
                .bind(group.id)
                .bind(viewer)
                .bind(&content)
                .fetch_one(&mut *tx)
                .await?;
        for f in &files {
            let kind = AttachmentKind::from_extension(media::extension(&f.file_name).as_deref());
            let path = uploads.store(dirs::GROUP_ATTACHMENTS, Some(*f)).await?;
            sqlx::query("INSERT INTO group_post_attachments (post_id, file, file_type) VALUES ($1, $2, $3)")
                .bind(post.id)
                .bind(path)
                .bind(kind.as_str())
                .execute(&mut *tx)
                .await?;
        }
        tx.commit().await?;
        Ok::<_, AppError>(post)
    }
    .await;
    let post = uploads.settle(written).await?;
    tracing::info!(group_id = group.id, post_id = post.id, attachments = files.len(), "group post created");
    Ok(post)
}

/// Pending requests for a group, visible to its admins.
pub async fn join_requests(pool: &PgPool, viewer: i64, slug: &str, page: Page) -> Result<Vec<GroupJoinRequest>, AppError> {
    let group = get(pool, slug).await?;
    ensure_admin(pool, &group, viewer).await?;
    let rows = sqlx::query_as(
        "SELECT * FROM group_join_requests WHERE group_id = $1 AND status = 'pending' \
         ORDER BY created_at, id LIMIT $2 OFFSET $3",
    )
    .bind(group.id)
    .bind(page.limit())
    .bind(page.offset())
    .fetch_all(pool)
    .await?;
    Ok(rows)
}

/// Approves or rejects a pending request. Approval adds the membership in the same transaction.
pub async fn decide_request(pool: &PgPool, viewer: i64, id: i64, decision: JoinStatus) -> Result<GroupJoinRequest, AppError> {
    let request: GroupJoinRequest = sqlx::query_as("SELECT * FROM group_join_requests WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("join request {}", id)))?;
    let group: Group = sqlx::query_as("SELECT * FROM groups WHERE id = $1")
        .bind(request.group_id)
        .fetch_one(pool)
        .await?;
    ensure_admin(pool, &group, viewer).await?;
    if decision == JoinStatus::Pending {
        return Err(AppError::BadRequest("a request can only be approved or rejected".into()));
    }
    let mut tx = pool.begin().await?;
    let updated: Option<GroupJoinRequest> = sqlx::query_as(
        "UPDATE group_join_requests SET status = $2 WHERE id = $1 AND status = 'pending' RETURNING *",
    )
    .bind(id)
    .bind(decision.as_str())
    .fetch_optional(&mut *tx)
    .await?;
    let updated = updated.ok_or_else(|| AppError::Conflict(format!("join request is already {}", request.status)))?;
    if decision == JoinStatus::Approved {
        sqlx::query("INSERT INTO group_members (group_id, user_id) VALUES ($1, $2) ON CONFLICT DO NOTHING")
            .bind(updated.group_id)
            .bind(updated.user_id)
            .execute(&mut *tx)
            .await?;
    }
    tx.commit().await?;
    tracing::info!(request_id = id, status = decision.as_str(), admin = viewer, "join request decided");
    Ok(updated)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn anonymous_membership_is_empty() {
        let m = MembershipStatus::default();
        assert!(!m.is_member && !m.is_admin);
        let json = serde_json::to_value(MembershipStatus { is_member: true, is_admin: false }).unwrap();
        assert_eq!(json, serde_json::json!({ "is_member": true, "is_admin": false }));
    }

    #[tokio::test]
    async fn anonymous_viewer_skips_the_lookup() {
        let pool = sqlx::postgres::PgPoolOptions::new()
            .connect_lazy("postgres://localhost/unused")
            .unwrap();
        assert_eq!(membership(&pool, 1, None).await.unwrap(), MembershipStatus::default());
    }
}
