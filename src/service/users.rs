//! Accounts, profiles, and the follow graph.

use super::notifications::{self, Target};
use super::{discard_uploads, ensure_owner, Page, RequestValidator, StagedUploads};
use crate::error::AppError;
use crate::extractors::FormData;
use crate::media::{dirs, MediaStore};
use crate::schema::{NotificationType, Profile, User};
use argon2::password_hash::{PasswordHasher, SaltString};
use argon2::Argon2;
use chrono::NaiveDate;
use sqlx::PgPool;

pub const USERNAME_MAX: usize = 150;
pub const LOCATION_MAX: usize = 100;

/// Argon2id hash in PHC string form.
pub fn hash_password(password: &str) -> Result<String, AppError> {
    let salt = SaltString::encode_b64(uuid::Uuid::new_v4().as_bytes())
        .map_err(|e| AppError::Internal(format!("salt: {}", e)))?;
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|h| h.to_string())
        .map_err(|e| AppError::Internal(format!("password hash: {}", e)))
}

pub struct NewUser {
    pub username: String,
    pub email: String,
    pub password: String,
}

impl NewUser {
    pub fn from_form(form: &FormData) -> Result<Self, AppError> {
        let username = form.trimmed("username");
        let email = form.trimmed("email").unwrap_or_default();
        let password = form.text("password").map(str::to_string).filter(|p| !p.is_empty());
        RequestValidator::new()
            .required("username", username.as_deref())
            .max_length("username", username.as_deref(), USERNAME_MAX)
            .username("username", username.as_deref())
            .email("email", Some(&email))
            .required("password", password.as_deref())
            .min_length("password", password.as_deref(), super::validation::PASSWORD_MIN)
            .finish()?;
        Ok(NewUser {
            username: username.unwrap_or_default(),
            email,
            password: password.unwrap_or_default(),
        })
    }
}

pub async fn create(pool: &PgPool, new: NewUser) -> Result<User, AppError> {
    let taken: Option<(i64,)> = sqlx::query_as("SELECT id FROM users WHERE username = $1")
        .bind(&new.username)
        .fetch_optional(pool)
        .await?;
    if taken.is_some() {
        return Err(AppError::invalid("username", "A user with that username already exists."));
    }
    let hash = hash_password(&new.password)?;
    let user: User =
        sqlx::query_as("INSERT INTO users (username, email, password_hash) VALUES ($1, $2, $3) RETURNING *")
            .bind(&new.username)
            .bind(&new.email)
            .bind(&hash)
            .fetch_one(pool)
            .await?;
    tracing::info!(user_id = user.id, username = %user.username, "user created");
    Ok(user)
}

pub async fn list(pool: &PgPool, page: Page) -> Result<Vec<User>, AppError> {
    let rows = sqlx::query_as("SELECT * FROM users ORDER BY id LIMIT $1 OFFSET $2")
        .bind(page.limit())
        .bind(page.offset())
        .fetch_all(pool)
        .await?;
    Ok(rows)
}

pub async fn get(pool: &PgPool, id: i64) -> Result<User, AppError> {
    sqlx::query_as("SELECT * FROM users WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("user {}", id)))
}

/// Self-service update: email, bio and avatar.
pub async fn update(
    pool: &PgPool,
    media: &dyn MediaStore,
    viewer: i64,
    id: i64,
    form: &FormData,
) -> Result<User, AppError> {
    ensure_owner(id, viewer, "account")?;
    let email = form.trimmed("email");
    RequestValidator::new().email("email", email.as_deref()).finish()?;
    let bio = form.text("bio").map(str::to_string);
    let previous: Option<(Option<String>,)> = sqlx::query_as("SELECT avatar FROM users WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await?;
    let (previous_avatar,) = previous.ok_or_else(|| AppError::NotFound(format!("user {}", id)))?;
    let mut uploads = StagedUploads::new(media);
    let written = async {
        let avatar = uploads.store(dirs::AVATARS, form.file("avatar")).await?;
        let user: Option<User> = sqlx::query_as(
            "UPDATE users SET email = COALESCE($2, email), bio = COALESCE($3, bio), avatar = COALESCE($4, avatar) \
             WHERE id = $1 RETURNING *",
        )
        .bind(id)
        .bind(email)
        .bind(bio)
        .bind(avatar)
        .fetch_optional(pool)
        .await?;
        user.ok_or_else(|| AppError::NotFound(format!("user {}", id)))
    }
    .await;
    let replaced = !uploads.paths().is_empty();
    let user = uploads.settle(written).await?;
    if replaced {
        discard_uploads(media, [previous_avatar]).await;
    }
    Ok(user)
}

pub async fn delete(pool: &PgPool, viewer: i64, id: i64) -> Result<(), AppError> {
    ensure_owner(id, viewer, "account")?;
    let done = sqlx::query("DELETE FROM users WHERE id = $1").bind(id).execute(pool).await?;
    if done.rows_affected() == 0 {
        return Err(AppError::NotFound(format!("user {}", id)));
    }
    tracing::info!(user_id = id, "user deleted");
    Ok(())
}

/// Flips the follow edge from `viewer` to `target`. Returns whether the viewer now follows.
pub async fn toggle_follow(pool: &PgPool, viewer: i64, target: i64) -> Result<bool, AppError> {
    if viewer == target {
        return Err(AppError::invalid("user", "You cannot follow yourself."));
    }
    get(pool, target).await?;
    let mut tx = pool.begin().await?;
    let removed = sqlx::query("DELETE FROM user_follows WHERE follower_id = $1 AND followee_id = $2")
        .bind(viewer)
        .bind(target)
        .execute(&mut *tx)
        .await?;
    let following = removed.rows_affected() == 0;
    if following {
        sqlx::query("INSERT INTO user_follows (follower_id, followee_id) VALUES ($1, $2) ON CONFLICT DO NOTHING")
            .bind(viewer)
            .bind(target)
            .execute(&mut *tx)
            .await?;
        notifications::notify(&mut *tx, target, viewer, NotificationType::Follow, Target::default()).await?;
    }
    tx.commit().await?;
    Ok(following)
}

/// Users following `id`.
pub async fn followers(pool: &PgPool, id: i64, page: Page) -> Result<Vec<User>, AppError> {
    get(pool, id).await?;
    let rows = sqlx::query_as(
        "SELECT u.* FROM users u JOIN user_follows f ON f.follower_id = u.id \
         WHERE f.followee_id = $1 ORDER BY f.created_at DESC LIMIT $2 OFFSET $3",
    )
    .bind(id)
    .bind(page.limit())
    .bind(page.offset())
    .fetch_all(pool)
    .await?;
    Ok(rows)
}

/// Users `id` follows.
pub async fn following(pool: &PgPool, id: i64, page: Page) -> Result<Vec<User>, AppError> {
    get(pool, id).await?;
    let rows = sqlx::query_as(
        "SELECT u.* FROM users u JOIN user_follows f ON f.followee_id = u.id \
         WHERE f.follower_id = $1 ORDER BY f.created_at DESC LIMIT $2 OFFSET $3",
    )
    .bind(id)
    .bind(page.limit())
    .bind(page.offset())
    .fetch_all(pool)
    .await?;
    Ok(rows)
}

pub struct ProfileFields {
    pub bio: Option<String>,
    pub birth_date: Option<NaiveDate>,
    pub location: Option<String>,
    pub is_public: Option<bool>,
}

impl ProfileFields {
    pub fn from_form(form: &FormData) -> Result<Self, AppError> {
        let location = form.trimmed("location");
        let birth_date = form.parse::<NaiveDate>("birth_date")?;
        let is_public = form.bool("is_public")?;
        RequestValidator::new()
            .max_length("location", location.as_deref(), LOCATION_MAX)
            .finish()?;
        Ok(ProfileFields {
            bio: form.text("bio").map(str::to_string),
            birth_date,
            location,
            is_public,
        })
    }
}

/// Profiles visible to the viewer: public ones plus their own.
pub async fn list_profiles(pool: &PgPool, viewer: Option<i64>, page: Page) -> Result<Vec<Profile>, AppError> {
    let rows = sqlx::query_as(
        "SELECT * FROM profiles WHERE is_public OR user_id = $1 ORDER BY id LIMIT $2 OFFSET $3",
    )
    .bind(viewer)
    .bind(page.limit())
    .bind(page.offset())
    .fetch_all(pool)
    .await?;
    Ok(rows)
}

pub async fn get_profile(pool: &PgPool, viewer: Option<i64>, id: i64) -> Result<Profile, AppError> {
    sqlx::query_as("SELECT * FROM profiles WHERE id = $1 AND (is_public OR user_id = $2)")
        .bind(id)
        .bind(viewer)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("profile {}", id)))
}

pub async fn profile_of(pool: &PgPool, viewer: Option<i64>, user_id: i64) -> Result<Profile, AppError> {
    sqlx::query_as("SELECT * FROM profiles WHERE user_id = $1 AND (is_public OR user_id = $2)")
        .bind(user_id)
        .bind(viewer)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("profile for user {}", user_id)))
}

/// Creates the viewer's profile. Any client-supplied owner is ignored.
pub async fn create_profile(
    pool: &PgPool,
    media: &dyn MediaStore,
    viewer: i64,
    form: &FormData,
) -> Result<Profile, AppError> {
    let fields = ProfileFields::from_form(form)?;
    let exists: Option<(i64,)> = sqlx::query_as("SELECT id FROM profiles WHERE user_id = $1")
        .bind(viewer)
        .fetch_optional(pool)
        .await?;
    if exists.is_some() {
        return Err(AppError::Conflict("profile already exists for this user".into()));
    }
    let mut uploads = StagedUploads::new(media);
    let written = async {
        let picture = uploads.store(dirs::PROFILES, form.file("picture")).await?;
        let profile: Profile = sqlx::query_as(
            "INSERT INTO profiles (user_id, picture, bio, birth_date, location, is_public) \
             VALUES ($1, $2, $3, $4, $5, COALESCE($6, TRUE)) RETURNING *",
        )
        .bind(viewer)
        .bind(picture)
        .bind(fields.bio)
        .bind(fields.birth_date)
        .bind(fields.location)
        .bind(fields.is_public)
        .fetch_one(pool)
        .await?;
        Ok::<_, AppError>(profile)
    }
    .await;
    uploads.settle(written).await
}

pub async fn update_profile(
    pool: &PgPool,
    media: &dyn MediaStore,
    viewer: i64,
    id: i64,
    form: &FormData,
) -> Result<Profile, AppError> {
    let current = get_profile(pool, Some(viewer), id).await?;
    ensure_owner(current.user_id, viewer, "profile")?;
    let fields = ProfileFields::from_form(form)?;
    let mut uploads = StagedUploads::new(media);
    let written = async {
        let picture = uploads.store(dirs::PROFILES, form.file("picture")).await?;
        let profile: Profile = sqlx::query_as(
            "UPDATE profiles SET picture = COALESCE($2, picture), bio = COALESCE($3, bio), \
             birth_date = COALESCE($4, birth_date), location = COALESCE($5, location), \
             is_public = COALESCE($6, is_public), updated_at = NOW() WHERE id = $1 RETURNING *",
        )
        .bind(id)
        .bind(picture)
        .bind(fields.bio)
        .bind(fields.birth_date)
        .bind(fields.location)
        .bind(fields.is_public)
        .fetch_one(pool)
        .await?;
        Ok::<_, AppError>(profile)
    }
    .await;
    let replaced = !uploads.paths().is_empty();
    let profile = uploads.settle(written).await?;
    if replaced {
        discard_uploads(media, [current.picture]).await;
    }
    Ok(profile)
}

pub async fn delete_profile(pool: &PgPool, viewer: i64, id: i64) -> Result<(), AppError> {
    let current = get_profile(pool, Some(viewer), id).await?;
    ensure_owner(current.user_id, viewer, "profile")?;
    sqlx::query("DELETE FROM profiles WHERE id = $1").bind(id).execute(pool).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use argon2::password_hash::{PasswordHash, PasswordVerifier};

    #[test]
    fn hashes_verify_and_are_salted() {
        let a = hash_password("correct horse").unwrap();
        let b = hash_password("correct horse").unwrap();
        assert_ne!(a, b);
        let parsed = PasswordHash::new(&a).unwrap();
        assert!(Argon2::default().verify_password(b"correct horse", &parsed).is_ok());
        assert!(Argon2::default().verify_password(b"wrong", &parsed).is_err());
    }

    #[test]
    fn signup_form_reports_every_problem() {
        let form = FormData::new().with_field("email", "nope").with_field("password", "short");
        match NewUser::from_form(&form) {
            Err(AppError::Validation(e)) => {
                assert!(e.field("username").is_some());
                assert!(e.field("email").is_some());
                assert!(e.field("password").is_some());
            }
            other => panic!("expected validation error, got {:?}", other.err()),
        }
    }

    #[test]
    fn signup_form_accepts_valid_input() {
        let form = FormData::new()
            .with_field("username", " deborah ")
            .with_field("email", "deborah@example.org")
            .with_field("password", "judges-4-4");
        let new = NewUser::from_form(&form).unwrap();
        assert_eq!(new.username, "deborah");
    }

    #[test]
    fn profile_rejects_bad_birth_date() {
        let form = FormData::new().with_field("birth_date", "31/02/1990");
        assert!(matches!(ProfileFields::from_form(&form), Err(AppError::Validation(_))));
    }
}
