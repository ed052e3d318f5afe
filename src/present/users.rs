//! User and profile views.

use super::{counts, social, viewer_hits, SocialPostView};
use crate::error::AppError;
use crate::extractors::ViewContext;
use crate::schema::{Profile, SocialPost, User};
use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;
use sqlx::PgPool;
use std::collections::HashMap;

const FOLLOWERS: &str =
    "SELECT followee_id, COUNT(*) FROM user_follows WHERE followee_id = ANY($1) GROUP BY followee_id";
const FOLLOWING: &str =
    "SELECT follower_id, COUNT(*) FROM user_follows WHERE follower_id = ANY($1) GROUP BY follower_id";
const IS_FOLLOWING: &str =
    "SELECT followee_id FROM user_follows WHERE followee_id = ANY($1) AND follower_id = $2";

/// Recent posts embedded in the user detail view.
pub const DETAIL_POSTS: i64 = 5;

#[derive(Clone, Debug, Serialize)]
pub struct ProfileView {
    pub id: i64,
    pub user_id: i64,
    pub bio: Option<String>,
    pub birth_date: Option<NaiveDate>,
    pub location: Option<String>,
    pub is_public: bool,
    pub picture: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ProfileView {
    pub fn build(ctx: &ViewContext, p: Profile) -> Self {
        ProfileView {
            picture: ctx.media_url(p.picture.as_deref()),
            id: p.id,
            user_id: p.user_id,
            bio: p.bio,
            birth_date: p.birth_date,
            location: p.location,
            is_public: p.is_public,
            created_at: p.created_at,
            updated_at: p.updated_at,
        }
    }
}

/// Public shape of a user. The password hash never leaves the schema row.
#[derive(Clone, Debug, Serialize)]
pub struct UserView {
    pub id: i64,
    pub username: String,
    pub email: String,
    pub bio: String,
    pub avatar: Option<String>,
    pub profile: Option<ProfileView>,
    pub followers_count: i64,
    pub following_count: i64,
    pub is_following: bool,
    pub date_joined: DateTime<Utc>,
}

#[derive(Clone, Copy, Debug, Default)]
pub struct FollowStats {
    pub followers: i64,
    pub following: i64,
    pub viewer_follows: bool,
}

impl UserView {
    pub fn build(ctx: &ViewContext, u: User, profile: Option<Profile>, stats: FollowStats) -> Self {
        UserView {
            avatar: ctx.media_url(u.avatar.as_deref()),
            profile: profile.map(|p| ProfileView::build(ctx, p)),
            id: u.id,
            username: u.username,
            email: u.email,
            bio: u.bio,
            followers_count: stats.followers,
            following_count: stats.following,
            is_following: ctx.flag(stats.viewer_follows),
            date_joined: u.date_joined,
        }
    }
}

#[derive(Clone, Debug, Serialize)]
pub struct UserDetailView {
    #[serde(flatten)]
    pub user: UserView,
    pub social_posts: Vec<SocialPostView>,
}

pub async fn user_views(pool: &PgPool, ctx: &ViewContext, rows: Vec<User>) -> Result<Vec<UserView>, AppError> {
    let ids: Vec<i64> = rows.iter().map(|u| u.id).collect();
    let mut profiles: HashMap<i64, Profile> = if ids.is_empty() {
        HashMap::new()
    } else {
        sqlx::query_as::<_, Profile>("SELECT * FROM profiles WHERE user_id = ANY($1)")
            .bind(&ids)
            .fetch_all(pool)
            .await?
            .into_iter()
            .map(|p| (p.user_id, p))
            .collect()
    };
    let followers = counts(pool, FOLLOWERS, &ids).await?;
    let following = counts(pool, FOLLOWING, &ids).await?;
    let followed = viewer_hits(pool, IS_FOLLOWING, &ids, ctx.viewer).await?;
    Ok(rows
        .into_iter()
        .map(|u| {
            let stats = FollowStats {
                followers: followers.get(&u.id).copied().unwrap_or(0),
                following: following.get(&u.id).copied().unwrap_or(0),
                viewer_follows: followed.contains(&u.id),
            };
            let profile = profiles.remove(&u.id);
            UserView::build(ctx, u, profile, stats)
        })
        .collect())
}

/// Views for the given ids, keyed by id, for embedding into other views.
pub async fn user_map(pool: &PgPool, ctx: &ViewContext, ids: &[i64]) -> Result<HashMap<i64, UserView>, AppError> {
    if ids.is_empty() {
        return Ok(HashMap::new());
    }
    let rows: Vec<User> = sqlx::query_as("SELECT * FROM users WHERE id = ANY($1)")
        .bind(ids)
        .fetch_all(pool)
        .await?;
    Ok(user_views(pool, ctx, rows)
        .await?
        .into_iter()
        .map(|v| (v.id, v))
        .collect())
}

pub async fn user_view(pool: &PgPool, ctx: &ViewContext, row: User) -> Result<UserView, AppError> {
    super::single(user_views(pool, ctx, vec![row]).await?, "user")
}

pub async fn user_detail(pool: &PgPool, ctx: &ViewContext, row: User) -> Result<UserDetailView, AppError> {
    let posts: Vec<SocialPost> =
        sqlx::query_as("SELECT * FROM social_posts WHERE user_id = $1 ORDER BY created_at DESC, id DESC LIMIT $2")
            .bind(row.id)
            .bind(DETAIL_POSTS)
            .fetch_all(pool)
            .await?;
    let user = user_view(pool, ctx, row).await?;
    let social_posts = social::post_views(pool, ctx, posts).await?;
    Ok(UserDetailView { user, social_posts })
}

pub fn profile_views(ctx: &ViewContext, rows: Vec<Profile>) -> Vec<ProfileView> {
    rows.into_iter().map(|p| ProfileView::build(ctx, p)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user() -> User {
        User {
            id: 4,
            username: "miriam".into(),
            email: "miriam@example.org".into(),
            password_hash: "$argon2id$secret".into(),
            bio: String::new(),
            avatar: Some("avatars/m.png".into()),
            date_joined: Utc::now(),
        }
    }

    #[test]
    fn anonymous_viewer_never_follows() {
        let stats = FollowStats { followers: 3, following: 1, viewer_follows: true };
        let view = UserView::build(&ViewContext::anonymous(), user(), None, stats);
        assert!(!view.is_following);
        assert_eq!(view.followers_count, 3);
        assert_eq!(view.avatar, None);
    }

    #[test]
    fn password_hash_is_not_serialized() {
        let ctx = ViewContext::new(Some(1), Some("https://advent.test".into()));
        let view = UserView::build(&ctx, user(), None, FollowStats::default());
        let json = serde_json::to_value(&view).unwrap();
        assert!(json.get("password_hash").is_none());
        assert!(json.get("password").is_none());
        assert_eq!(json["avatar"], "https://advent.test/media/avatars/m.png");
    }

    #[test]
    fn detail_view_flattens_user_fields() {
        let ctx = ViewContext::anonymous();
        let detail = UserDetailView {
            user: UserView::build(&ctx, user(), None, FollowStats::default()),
            social_posts: vec![],
        };
        let json = serde_json::to_value(&detail).unwrap();
        assert_eq!(json["username"], "miriam");
        assert!(json["social_posts"].as_array().is_some_and(|p| p.is_empty()));
    }
}
