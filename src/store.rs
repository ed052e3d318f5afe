//! Database bootstrap: create the database if missing, then every table and index.
//! Statements are idempotent and run in dependency order on every start.

use crate::error::AppError;
use sqlx::ConnectOptions;
use sqlx::PgPool;
use std::str::FromStr;

const TABLES: &[&str] = &[
    r#"CREATE TABLE IF NOT EXISTS users (
        id BIGSERIAL PRIMARY KEY,
        username VARCHAR(150) NOT NULL UNIQUE,
        email VARCHAR(254) NOT NULL DEFAULT '',
        password_hash TEXT NOT NULL,
        bio TEXT NOT NULL DEFAULT '',
        avatar TEXT,
        date_joined TIMESTAMPTZ NOT NULL DEFAULT NOW()
    )"#,
    r#"CREATE TABLE IF NOT EXISTS user_follows (
        id BIGSERIAL PRIMARY KEY,
        follower_id BIGINT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
        followee_id BIGINT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
        created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
        UNIQUE (follower_id, followee_id),
        CHECK (follower_id <> followee_id)
    )"#,
    r#"CREATE TABLE IF NOT EXISTS profiles (
        id BIGSERIAL PRIMARY KEY,
        user_id BIGINT NOT NULL UNIQUE REFERENCES users(id) ON DELETE CASCADE,
        picture TEXT,
        bio TEXT,
        birth_date DATE,
        location VARCHAR(100),
        is_public BOOLEAN NOT NULL DEFAULT TRUE,
        created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
        updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
    )"#,
    r#"CREATE TABLE IF NOT EXISTS tracks (
        id BIGSERIAL PRIMARY KEY,
        title VARCHAR(100) NOT NULL,
        artist_id BIGINT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
        album VARCHAR(100),
        audio_file TEXT NOT NULL,
        cover_image TEXT,
        lyrics TEXT,
        slug VARCHAR(120) NOT NULL UNIQUE,
        views BIGINT NOT NULL DEFAULT 0 CHECK (views >= 0),
        downloads BIGINT NOT NULL DEFAULT 0 CHECK (downloads >= 0),
        created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
        updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
    )"#,
    r#"CREATE TABLE IF NOT EXISTS playlists (
        id BIGSERIAL PRIMARY KEY,
        name VARCHAR(100) NOT NULL,
        user_id BIGINT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
        created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
        updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
    )"#,
    r#"CREATE TABLE IF NOT EXISTS playlist_tracks (
        playlist_id BIGINT NOT NULL REFERENCES playlists(id) ON DELETE CASCADE,
        track_id BIGINT NOT NULL REFERENCES tracks(id) ON DELETE CASCADE,
        PRIMARY KEY (playlist_id, track_id)
    )"#,
    r#"CREATE TABLE IF NOT EXISTS comments (
        id BIGSERIAL PRIMARY KEY,
        content TEXT NOT NULL,
        track_id BIGINT NOT NULL REFERENCES tracks(id) ON DELETE CASCADE,
        user_id BIGINT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
        created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
        updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
    )"#,
    r#"CREATE TABLE IF NOT EXISTS likes (
        id BIGSERIAL PRIMARY KEY,
        track_id BIGINT NOT NULL REFERENCES tracks(id) ON DELETE CASCADE,
        user_id BIGINT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
        created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
        UNIQUE (track_id, user_id)
    )"#,
    r#"CREATE TABLE IF NOT EXISTS categories (
        id BIGSERIAL PRIMARY KEY,
        name VARCHAR(100) NOT NULL UNIQUE,
        created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
        updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
    )"#,
    r#"CREATE TABLE IF NOT EXISTS category_tracks (
        category_id BIGINT NOT NULL REFERENCES categories(id) ON DELETE CASCADE,
        track_id BIGINT NOT NULL REFERENCES tracks(id) ON DELETE CASCADE,
        PRIMARY KEY (category_id, track_id)
    )"#,
    r#"CREATE TABLE IF NOT EXISTS social_posts (
        id BIGSERIAL PRIMARY KEY,
        user_id BIGINT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
        content_type VARCHAR(5) NOT NULL CHECK (content_type IN ('video', 'image')),
        media_file TEXT NOT NULL,
        song_id BIGINT REFERENCES tracks(id) ON DELETE SET NULL,
        caption TEXT NOT NULL DEFAULT '',
        tags VARCHAR(200) NOT NULL DEFAULT '',
        location VARCHAR(100) NOT NULL DEFAULT '',
        duration_seconds DOUBLE PRECISION,
        created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
        updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
    )"#,
    r#"CREATE TABLE IF NOT EXISTS post_likes (
        id BIGSERIAL PRIMARY KEY,
        post_id BIGINT NOT NULL REFERENCES social_posts(id) ON DELETE CASCADE,
        user_id BIGINT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
        created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
        UNIQUE (post_id, user_id)
    )"#,
    r#"CREATE TABLE IF NOT EXISTS post_comments (
        id BIGSERIAL PRIMARY KEY,
        post_id BIGINT NOT NULL REFERENCES social_posts(id) ON DELETE CASCADE,
        user_id BIGINT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
        content TEXT NOT NULL,
        created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
    )"#,
    r#"CREATE TABLE IF NOT EXISTS post_saves (
        id BIGSERIAL PRIMARY KEY,
        post_id BIGINT NOT NULL REFERENCES social_posts(id) ON DELETE CASCADE,
        user_id BIGINT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
        created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
        UNIQUE (post_id, user_id)
    )"#,
    r#"CREATE TABLE IF NOT EXISTS notifications (
        id BIGSERIAL PRIMARY KEY,
        recipient_id BIGINT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
        sender_id BIGINT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
        message TEXT NOT NULL,
        read BOOLEAN NOT NULL DEFAULT FALSE,
        notification_type VARCHAR(50) NOT NULL,
        post_id BIGINT REFERENCES social_posts(id) ON DELETE CASCADE,
        track_id BIGINT REFERENCES tracks(id) ON DELETE CASCADE,
        created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
    )"#,
    r#"CREATE TABLE IF NOT EXISTS groups (
        id BIGSERIAL PRIMARY KEY,
        name VARCHAR(100) NOT NULL,
        slug VARCHAR(120) NOT NULL UNIQUE,
        description TEXT NOT NULL DEFAULT '',
        cover_image TEXT,
        creator_id BIGINT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
        is_private BOOLEAN NOT NULL DEFAULT FALSE,
        created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
        updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
    )"#,
    r#"CREATE TABLE IF NOT EXISTS group_members (
        id BIGSERIAL PRIMARY KEY,
        group_id BIGINT NOT NULL REFERENCES groups(id) ON DELETE CASCADE,
        user_id BIGINT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
        is_admin BOOLEAN NOT NULL DEFAULT FALSE,
        joined_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
        UNIQUE (group_id, user_id)
    )"#,
    r#"CREATE TABLE IF NOT EXISTS group_join_requests (
        id BIGSERIAL PRIMARY KEY,
        group_id BIGINT NOT NULL REFERENCES groups(id) ON DELETE CASCADE,
        user_id BIGINT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
        message TEXT NOT NULL DEFAULT '',
        status VARCHAR(10) NOT NULL DEFAULT 'pending' CHECK (status IN ('pending', 'approved', 'rejected')),
        created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
    )"#,
    r#"CREATE TABLE IF NOT EXISTS group_posts (
        id BIGSERIAL PRIMARY KEY,
        group_id BIGINT NOT NULL REFERENCES groups(id) ON DELETE CASCADE,
        user_id BIGINT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
        content TEXT NOT NULL DEFAULT '',
        created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
        updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
    )"#,
    r#"CREATE TABLE IF NOT EXISTS group_post_attachments (
        id BIGSERIAL PRIMARY KEY,
        post_id BIGINT NOT NULL REFERENCES group_posts(id) ON DELETE CASCADE,
        file TEXT NOT NULL,
        file_type VARCHAR(10) NOT NULL,
        created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
    )"#,
    r#"CREATE TABLE IF NOT EXISTS churches (
        id BIGSERIAL PRIMARY KEY,
        name VARCHAR(200) NOT NULL,
        continent VARCHAR(100) NOT NULL DEFAULT '',
        country VARCHAR(100) NOT NULL,
        county VARCHAR(100) NOT NULL DEFAULT '',
        conference VARCHAR(200) NOT NULL,
        district VARCHAR(200) NOT NULL DEFAULT '',
        location VARCHAR(200) NOT NULL DEFAULT '',
        members INTEGER NOT NULL DEFAULT 0 CHECK (members >= 0),
        pastor VARCHAR(200) NOT NULL DEFAULT '',
        contact VARCHAR(200) NOT NULL DEFAULT '',
        image TEXT,
        created_by BIGINT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
        created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
        updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
    )"#,
    r#"CREATE TABLE IF NOT EXISTS choirs (
        id BIGSERIAL PRIMARY KEY,
        name VARCHAR(200) NOT NULL,
        description TEXT NOT NULL DEFAULT '',
        location VARCHAR(200) NOT NULL DEFAULT '',
        contact_phone VARCHAR(50) NOT NULL DEFAULT '',
        contact_email VARCHAR(254) NOT NULL DEFAULT '',
        genre VARCHAR(100) NOT NULL DEFAULT '',
        youtube_link TEXT NOT NULL DEFAULT '',
        founded_date DATE,
        profile_image TEXT,
        cover_image TEXT,
        members_count INTEGER NOT NULL DEFAULT 0 CHECK (members_count >= 0),
        is_active BOOLEAN NOT NULL DEFAULT TRUE,
        created_by BIGINT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
        created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
        updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
    )"#,
    r#"CREATE TABLE IF NOT EXISTS video_studios (
        id BIGSERIAL PRIMARY KEY,
        name VARCHAR(200) NOT NULL,
        description TEXT NOT NULL DEFAULT '',
        location VARCHAR(200) NOT NULL,
        contact_phone VARCHAR(50) NOT NULL DEFAULT '',
        contact_email VARCHAR(254) NOT NULL DEFAULT '',
        website TEXT NOT NULL DEFAULT '',
        service_types TEXT[] NOT NULL DEFAULT '{}',
        logo TEXT,
        cover_image TEXT,
        is_verified BOOLEAN NOT NULL DEFAULT FALSE,
        created_by BIGINT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
        created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
        updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
    )"#,
    r#"CREATE TABLE IF NOT EXISTS live_events (
        id BIGSERIAL PRIMARY KEY,
        user_id BIGINT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
        title VARCHAR(200) NOT NULL,
        description TEXT,
        youtube_url VARCHAR(500) NOT NULL,
        thumbnail TEXT,
        is_live BOOLEAN NOT NULL DEFAULT TRUE,
        start_time TIMESTAMPTZ NOT NULL DEFAULT NOW(),
        end_time TIMESTAMPTZ,
        viewers_count BIGINT NOT NULL DEFAULT 0 CHECK (viewers_count >= 0)
    )"#,
    r#"CREATE TABLE IF NOT EXISTS product_categories (
        id BIGSERIAL PRIMARY KEY,
        name VARCHAR(100) NOT NULL UNIQUE,
        slug VARCHAR(120) NOT NULL UNIQUE,
        description TEXT NOT NULL DEFAULT '',
        created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
    )"#,
    r#"CREATE TABLE IF NOT EXISTS products (
        id BIGSERIAL PRIMARY KEY,
        seller_id BIGINT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
        category_id BIGINT REFERENCES product_categories(id) ON DELETE SET NULL,
        track_id BIGINT REFERENCES tracks(id) ON DELETE SET NULL,
        title VARCHAR(200) NOT NULL,
        slug VARCHAR(220) NOT NULL UNIQUE,
        description TEXT NOT NULL DEFAULT '',
        price NUMERIC(12, 2) NOT NULL CHECK (price >= 0),
        currency VARCHAR(3) NOT NULL DEFAULT 'USD',
        quantity INTEGER NOT NULL DEFAULT 1 CHECK (quantity >= 0),
        condition VARCHAR(12) NOT NULL DEFAULT 'NEW' CHECK (condition IN ('NEW', 'USED', 'REFURBISHED')),
        is_digital BOOLEAN NOT NULL DEFAULT FALSE,
        is_available BOOLEAN NOT NULL DEFAULT TRUE,
        views BIGINT NOT NULL DEFAULT 0 CHECK (views >= 0),
        created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
        updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
    )"#,
    r#"CREATE TABLE IF NOT EXISTS product_images (
        id BIGSERIAL PRIMARY KEY,
        product_id BIGINT NOT NULL REFERENCES products(id) ON DELETE CASCADE,
        image TEXT NOT NULL,
        is_primary BOOLEAN NOT NULL DEFAULT FALSE,
        position INTEGER NOT NULL DEFAULT 0,
        created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
    )"#,
    r#"CREATE TABLE IF NOT EXISTS carts (
        id BIGSERIAL PRIMARY KEY,
        user_id BIGINT NOT NULL UNIQUE REFERENCES users(id) ON DELETE CASCADE,
        created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
        updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
    )"#,
    r#"CREATE TABLE IF NOT EXISTS cart_items (
        id BIGSERIAL PRIMARY KEY,
        cart_id BIGINT NOT NULL REFERENCES carts(id) ON DELETE CASCADE,
        product_id BIGINT NOT NULL REFERENCES products(id) ON DELETE CASCADE,
        quantity INTEGER NOT NULL DEFAULT 1 CHECK (quantity >= 1),
        added_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
        UNIQUE (cart_id, product_id)
    )"#,
    r#"CREATE TABLE IF NOT EXISTS orders (
        id BIGSERIAL PRIMARY KEY,
        buyer_id BIGINT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
        status VARCHAR(12) NOT NULL DEFAULT 'pending'
            CHECK (status IN ('pending', 'processing', 'shipped', 'delivered', 'cancelled')),
        payment_method VARCHAR(50),
        shipping_address TEXT NOT NULL DEFAULT '',
        total_amount NUMERIC(12, 2) NOT NULL DEFAULT 0,
        ordered_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
        updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
    )"#,
    r#"CREATE TABLE IF NOT EXISTS order_items (
        id BIGSERIAL PRIMARY KEY,
        order_id BIGINT NOT NULL REFERENCES orders(id) ON DELETE CASCADE,
        product_id BIGINT REFERENCES products(id) ON DELETE SET NULL,
        seller_id BIGINT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
        product_title VARCHAR(200) NOT NULL,
        quantity INTEGER NOT NULL CHECK (quantity >= 1),
        price_at_purchase NUMERIC(12, 2) NOT NULL
    )"#,
    r#"CREATE TABLE IF NOT EXISTS product_reviews (
        id BIGSERIAL PRIMARY KEY,
        product_id BIGINT NOT NULL REFERENCES products(id) ON DELETE CASCADE,
        reviewer_id BIGINT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
        rating SMALLINT NOT NULL CHECK (rating BETWEEN 1 AND 5),
        comment TEXT NOT NULL DEFAULT '',
        created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
        UNIQUE (product_id, reviewer_id)
    )"#,
    r#"CREATE TABLE IF NOT EXISTS wishlists (
        id BIGSERIAL PRIMARY KEY,
        user_id BIGINT NOT NULL UNIQUE REFERENCES users(id) ON DELETE CASCADE,
        created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
    )"#,
    r#"CREATE TABLE IF NOT EXISTS wishlist_products (
        wishlist_id BIGINT NOT NULL REFERENCES wishlists(id) ON DELETE CASCADE,
        product_id BIGINT NOT NULL REFERENCES products(id) ON DELETE CASCADE,
        PRIMARY KEY (wishlist_id, product_id)
    )"#,
];

const INDEXES: &[&str] = &[
    "CREATE INDEX IF NOT EXISTS tracks_artist_idx ON tracks (artist_id)",
    "CREATE INDEX IF NOT EXISTS comments_track_idx ON comments (track_id)",
    "CREATE INDEX IF NOT EXISTS social_posts_user_idx ON social_posts (user_id)",
    "CREATE INDEX IF NOT EXISTS post_comments_post_idx ON post_comments (post_id)",
    "CREATE INDEX IF NOT EXISTS notifications_recipient_idx ON notifications (recipient_id, read)",
    "CREATE INDEX IF NOT EXISTS group_posts_group_idx ON group_posts (group_id)",
    "CREATE UNIQUE INDEX IF NOT EXISTS group_join_requests_pending_idx ON group_join_requests (group_id, user_id) WHERE status = 'pending'",
    "CREATE INDEX IF NOT EXISTS products_seller_idx ON products (seller_id)",
    "CREATE INDEX IF NOT EXISTS order_items_order_idx ON order_items (order_id)",
    "CREATE INDEX IF NOT EXISTS order_items_seller_idx ON order_items (seller_id)",
];

/// Create every table and index if missing.
pub async fn ensure_tables(pool: &PgPool) -> Result<(), AppError> {
    for ddl in TABLES.iter().chain(INDEXES) {
        sqlx::query(ddl).execute(pool).await?;
    }
    tracing::info!(tables = TABLES.len(), indexes = INDEXES.len(), "schema ready");
    Ok(())
}

/// Ensure the database in `database_url` exists; create it if not. Connects to the
/// default `postgres` database to run CREATE DATABASE. Call before creating the main pool.
pub async fn ensure_database_exists(database_url: &str) -> Result<(), AppError> {
    let (admin_url, db_name) = parse_db_name_from_url(database_url)?;
    if db_name.is_empty() || db_name == "postgres" {
        return Ok(());
    }
    let opts = sqlx::postgres::PgConnectOptions::from_str(&admin_url)
        .map_err(|e| AppError::BadRequest(format!("invalid DATABASE_URL: {}", e)))?;
    let mut conn: sqlx::PgConnection = opts.connect().await?;
    let exists: (bool,) = sqlx::query_as("SELECT EXISTS(SELECT 1 FROM pg_database WHERE datname = $1)")
        .bind(&db_name)
        .fetch_one(&mut conn)
        .await?;
    if !exists.0 {
        tracing::info!(database = %db_name, "creating database");
        sqlx::query(&format!("CREATE DATABASE {}", quote_ident(&db_name)))
            .execute(&mut conn)
            .await?;
    }
    Ok(())
}

fn parse_db_name_from_url(url: &str) -> Result<(String, String), AppError> {
    let path_start = url
        .rfind('/')
        .ok_or_else(|| AppError::BadRequest("DATABASE_URL: no path".into()))?
        + 1;
    let path_and_query = url.get(path_start..).unwrap_or("");
    let mut split = path_and_query.splitn(2, '?');
    let db_name = split.next().unwrap_or("").trim();
    let query = split.next().map(|q| format!("?{}", q)).unwrap_or_default();
    let base = url.get(..path_start).unwrap_or(url);
    Ok((format!("{}postgres{}", base, query), db_name.to_string()))
}

fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn admin_url_keeps_query_string() {
        let (admin, db) = parse_db_name_from_url("postgres://u:p@db:5432/advent?sslmode=disable").unwrap();
        assert_eq!(db, "advent");
        assert_eq!(admin, "postgres://u:p@db:5432/postgres?sslmode=disable");
    }

    #[test]
    fn quotes_identifiers() {
        assert_eq!(quote_ident("we\"ird"), "\"we\"\"ird\"");
    }

    #[test]
    fn every_table_statement_is_idempotent() {
        assert!(TABLES.iter().all(|t| t.starts_with("CREATE TABLE IF NOT EXISTS")));
        assert!(INDEXES.iter().all(|i| i.contains("IF NOT EXISTS")));
    }
}
