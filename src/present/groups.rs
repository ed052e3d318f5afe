//! Group views.

use super::{counts, group_by, unique_ids, users::user_map, viewer_hits, UserView};
use crate::error::AppError;
use crate::extractors::ViewContext;
use crate::schema::{Group, GroupJoinRequest, GroupMember, GroupPost, GroupPostAttachment};
use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::PgPool;
use std::collections::HashMap;

const MEMBER_COUNT: &str = "SELECT group_id, COUNT(*) FROM group_members WHERE group_id = ANY($1) GROUP BY group_id";
const IS_MEMBER: &str = "SELECT group_id FROM group_members WHERE group_id = ANY($1) AND user_id = $2";
const IS_ADMIN: &str = "SELECT group_id FROM group_members WHERE group_id = ANY($1) AND user_id = $2 AND is_admin";

#[derive(Clone, Debug, Serialize)]
pub struct GroupView {
    pub id: i64,
    pub name: String,
    pub slug: String,
    pub description: String,
    pub cover_image: Option<String>,
    pub creator: UserView,
    pub is_private: bool,
    pub member_count: i64,
    pub is_member: bool,
    pub is_admin: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Clone, Copy, Debug, Default)]
pub struct Membership {
    pub members: i64,
    pub viewer_member: bool,
    pub viewer_admin: bool,
}

impl GroupView {
    pub fn build(ctx: &ViewContext, g: Group, creator: UserView, m: Membership) -> Self {
        GroupView {
            cover_image: ctx.media_url(g.cover_image.as_deref()),
            member_count: m.members,
            is_member: ctx.flag(m.viewer_member),
            is_admin: ctx.flag(m.viewer_admin),
            id: g.id,
            name: g.name,
            slug: g.slug,
            description: g.description,
            creator,
            is_private: g.is_private,
            created_at: g.created_at,
            updated_at: g.updated_at,
        }
    }
}

pub async fn group_views(pool: &PgPool, ctx: &ViewContext, rows: Vec<Group>) -> Result<Vec<GroupView>, AppError> {
    let ids: Vec<i64> = rows.iter().map(|g| g.id).collect();
    let creators = user_map(pool, ctx, &unique_ids(rows.iter().map(|g| g.creator_id))).await?;
    let members = counts(pool, MEMBER_COUNT, &ids).await?;
    let member_of = viewer_hits(pool, IS_MEMBER, &ids, ctx.viewer).await?;
    let admin_of = viewer_hits(pool, IS_ADMIN, &ids, ctx.viewer).await?;
    Ok(rows
        .into_iter()
        .filter_map(|g| {
            let creator = creators.get(&g.creator_id)?.clone();
            let m = Membership {
                members: members.get(&g.id).copied().unwrap_or(0),
                viewer_member: member_of.contains(&g.id),
                viewer_admin: admin_of.contains(&g.id),
            };
            Some(GroupView::build(ctx, g, creator, m))
        })
        .collect())
}

pub async fn group_view(pool: &PgPool, ctx: &ViewContext, row: Group) -> Result<GroupView, AppError> {
    super::single(group_views(pool, ctx, vec![row]).await?, "group")
}

/// Roster entry; `user` is the member's username.
#[derive(Clone, Debug, Serialize)]
pub struct GroupMemberView {
    pub id: i64,
    pub user: String,
    pub is_admin: bool,
    pub joined_at: DateTime<Utc>,
}

async fn usernames(pool: &PgPool, ids: &[i64]) -> Result<HashMap<i64, String>, AppError> {
    if ids.is_empty() {
        return Ok(HashMap::new());
    }
    let rows: Vec<(i64, String)> = sqlx::query_as("SELECT id, username FROM users WHERE id = ANY($1)")
        .bind(ids)
        .fetch_all(pool)
        .await?;
    Ok(rows.into_iter().collect())
}

pub async fn member_views(pool: &PgPool, rows: Vec<GroupMember>) -> Result<Vec<GroupMemberView>, AppError> {
    let names = usernames(pool, &unique_ids(rows.iter().map(|m| m.user_id))).await?;
    Ok(rows
        .into_iter()
        .filter_map(|m| {
            Some(GroupMemberView {
                user: names.get(&m.user_id)?.clone(),
                id: m.id,
                is_admin: m.is_admin,
                joined_at: m.joined_at,
            })
        })
        .collect())
}

/// Join request; `group` is the group's name.
#[derive(Clone, Debug, Serialize)]
pub struct GroupJoinRequestView {
    pub id: i64,
    pub user: UserView,
    pub group: String,
    pub message: String,
    pub status: String,
    pub created_at: DateTime<Utc>,
}

pub async fn join_request_views(
    pool: &PgPool,
    ctx: &ViewContext,
    rows: Vec<GroupJoinRequest>,
) -> Result<Vec<GroupJoinRequestView>, AppError> {
    let users = user_map(pool, ctx, &unique_ids(rows.iter().map(|r| r.user_id))).await?;
    let group_ids = unique_ids(rows.iter().map(|r| r.group_id));
    let names: HashMap<i64, String> = if group_ids.is_empty() {
        HashMap::new()
    } else {
        let found: Vec<(i64, String)> = sqlx::query_as("SELECT id, name FROM groups WHERE id = ANY($1)")
            .bind(&group_ids)
            .fetch_all(pool)
            .await?;
        found.into_iter().collect()
    };
    Ok(rows
        .into_iter()
        .filter_map(|r| {
            Some(GroupJoinRequestView {
                user: users.get(&r.user_id)?.clone(),
                group: names.get(&r.group_id)?.clone(),
                id: r.id,
                message: r.message,
                status: r.status,
                created_at: r.created_at,
            })
        })
        .collect())
}

pub async fn join_request_view(
    pool: &PgPool,
    ctx: &ViewContext,
    row: GroupJoinRequest,
) -> Result<GroupJoinRequestView, AppError> {
    super::single(join_request_views(pool, ctx, vec![row]).await?, "join request")
}

#[derive(Clone, Debug, Serialize)]
pub struct AttachmentView {
    pub id: i64,
    pub file: Option<String>,
    pub file_type: String,
    pub created_at: DateTime<Utc>,
}

impl AttachmentView {
    pub fn build(ctx: &ViewContext, a: GroupPostAttachment) -> Self {
        AttachmentView {
            file: ctx.media_url(Some(&a.file)),
            id: a.id,
            file_type: a.file_type,
            created_at: a.created_at,
        }
    }
}

#[derive(Clone, Debug, Serialize)]
pub struct GroupPostView {
    pub id: i64,
    pub content: String,
    pub group: i64,
    pub user: UserView,
    pub attachments: Vec<AttachmentView>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

pub async fn group_post_views(pool: &PgPool, ctx: &ViewContext, rows: Vec<GroupPost>) -> Result<Vec<GroupPostView>, AppError> {
    let ids: Vec<i64> = rows.iter().map(|p| p.id).collect();
    let users = user_map(pool, ctx, &unique_ids(rows.iter().map(|p| p.user_id))).await?;
    let mut attachments = if ids.is_empty() {
        HashMap::new()
    } else {
        let found: Vec<GroupPostAttachment> =
            sqlx::query_as("SELECT * FROM group_post_attachments WHERE post_id = ANY($1) ORDER BY id")
                .bind(&ids)
                .fetch_all(pool)
                .await?;
        group_by(found.into_iter().map(|a| (a.post_id, a)))
    };
    Ok(rows
        .into_iter()
        .filter_map(|p| {
            let user = users.get(&p.user_id)?.clone();
            let attachments = attachments
                .remove(&p.id)
                .unwrap_or_default()
                .into_iter()
                .map(|a| AttachmentView::build(ctx, a))
                .collect();
            Some(GroupPostView {
                id: p.id,
                content: p.content,
                group: p.group_id,
                user,
                attachments,
                created_at: p.created_at,
                updated_at: p.updated_at,
            })
        })
        .collect())
}

pub async fn group_post_view(pool: &PgPool, ctx: &ViewContext, row: GroupPost) -> Result<GroupPostView, AppError> {
    super::single(group_post_views(pool, ctx, vec![row]).await?, "group post")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::present::users::FollowStats;
    use crate::schema::User;

    #[test]
    fn anonymous_is_never_member_or_admin() {
        let ctx = ViewContext::anonymous();
        let creator = UserView::build(
            &ctx,
            User {
                id: 1,
                username: "founder".into(),
                email: String::new(),
                password_hash: String::new(),
                bio: String::new(),
                avatar: None,
                date_joined: Utc::now(),
            },
            None,
            FollowStats::default(),
        );
        let group = Group {
            id: 3,
            name: "Tenors".into(),
            slug: "tenors".into(),
            description: String::new(),
            cover_image: Some("group_covers/t.png".into()),
            creator_id: 1,
            is_private: true,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        let m = Membership { members: 8, viewer_member: true, viewer_admin: true };
        let view = GroupView::build(&ctx, group, creator, m);
        assert_eq!(view.member_count, 8);
        assert!(!view.is_member);
        assert!(!view.is_admin);
        assert_eq!(view.cover_image, None);
    }
}
