//! Marketplace catalogue: categories, products, images, reviews, and wishlists.

use super::{discard_uploads, ensure_owner, like_pattern, Page, RequestValidator, StagedUploads};
use crate::error::AppError;
use crate::extractors::{FormData, UploadedFile};
use crate::media::{dirs, MediaStore};
use crate::schema::{
    Condition, Product, ProductCategory, ProductReview, Wishlist, CATEGORY_NAME_MAX, DEFAULT_CURRENCY,
    PRODUCT_TITLE_MAX,
};
use crate::slug::unique_slug;
use rust_decimal::Decimal;
use serde::Deserialize;
use sqlx::{PgConnection, PgPool};

const PRICE_SCALE: u32 = 2;
const CURRENCY_MAX: usize = 3;
const MIN_RATING: i64 = 1;
const MAX_RATING: i64 = 5;

// Categories

pub async fn list_categories(pool: &PgPool, page: Page) -> Result<Vec<ProductCategory>, AppError> {
    let rows = sqlx::query_as("SELECT * FROM product_categories ORDER BY name LIMIT $1 OFFSET $2")
        .bind(page.limit())
        .bind(page.offset())
        .fetch_all(pool)
        .await?;
    Ok(rows)
}

pub async fn get_category(pool: &PgPool, id: i64) -> Result<ProductCategory, AppError> {
    sqlx::query_as("SELECT * FROM product_categories WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("product category {}", id)))
}

/// Trims a category name and checks it is non-empty and within the column limit.
pub fn category_name(raw: Option<&str>) -> Result<Option<String>, AppError> {
    let Some(raw) = raw else {
        return Ok(None);
    };
    let name = raw.trim();
    if name.is_empty() {
        return Err(AppError::invalid("category", "Category name cannot be empty."));
    }
    if name.chars().count() > CATEGORY_NAME_MAX {
        return Err(AppError::invalid(
            "category",
            format!("Category name cannot exceed {} characters.", CATEGORY_NAME_MAX),
        ));
    }
    Ok(Some(name.to_string()))
}

/// Inserts a category unless its name or slug is already taken; `None` means a row won the race.
async fn insert_category(
    conn: &mut PgConnection,
    name: &str,
    description: &str,
) -> Result<Option<ProductCategory>, AppError> {
    let slug = unique_slug(&mut *conn, "product_categories", name, "category").await?;
    let category = sqlx::query_as(
        "INSERT INTO product_categories (name, slug, description) VALUES ($1, $2, $3) \
         ON CONFLICT DO NOTHING RETURNING *",
    )
    .bind(name)
    .bind(slug)
    .bind(description)
    .fetch_optional(&mut *conn)
    .await?;
    Ok(category)
}

async fn category_by_name(conn: &mut PgConnection, name: &str) -> Result<Option<ProductCategory>, AppError> {
    let found = sqlx::query_as("SELECT * FROM product_categories WHERE LOWER(name) = LOWER($1)")
        .bind(name)
        .fetch_optional(&mut *conn)
        .await?;
    Ok(found)
}

pub async fn create_category(pool: &PgPool, form: &FormData) -> Result<ProductCategory, AppError> {
    let name = form.trimmed("name");
    RequestValidator::new()
        .required("name", name.as_deref())
        .max_length("name", name.as_deref(), CATEGORY_NAME_MAX)
        .finish()?;
    let name = name.unwrap_or_default();
    let mut tx = pool.begin().await?;
    if category_by_name(&mut *tx, &name).await?.is_some() {
        return Err(AppError::Conflict(format!("category '{}' already exists", name)));
    }
    let category = insert_category(&mut *tx, &name, form.text("description").unwrap_or_default())
        .await?
        .ok_or_else(|| AppError::Conflict(format!("category '{}' already exists", name)))?;
    tx.commit().await?;
    Ok(category)
}

/// Finds a category by name ignoring case, creating it when missing. A concurrent create of the
/// same name resolves to the row that was committed first.
async fn resolve_category(conn: &mut PgConnection, name: &str) -> Result<ProductCategory, AppError> {
    if let Some(found) = category_by_name(&mut *conn, name).await? {
        return Ok(found);
    }
    if let Some(created) = insert_category(&mut *conn, name, "").await? {
        tracing::info!(category_id = created.id, name = %created.name, "product category created on demand");
        return Ok(created);
    }
    category_by_name(conn, name)
        .await?
        .ok_or_else(|| AppError::Conflict(format!("category '{}' is being created concurrently, retry", name)))
}

// Products

#[derive(Clone, Debug, Default, Deserialize)]
pub struct ProductFilter {
    pub seller_id: Option<i64>,
    /// Category slug.
    pub category: Option<String>,
    pub search: Option<String>,
    pub is_digital: Option<bool>,
    pub track: Option<i64>,
}

pub async fn list_products(pool: &PgPool, filter: &ProductFilter, page: Page) -> Result<Vec<Product>, AppError> {
    let sql = "SELECT p.* FROM products p LEFT JOIN product_categories c ON c.id = p.category_id \
               WHERE ($1::bigint IS NULL OR p.seller_id = $1) AND ($2::text IS NULL OR c.slug = $2) \
               AND ($3::text IS NULL OR p.title ILIKE $3 OR p.description ILIKE $3) \
               AND ($4::boolean IS NULL OR p.is_digital = $4) AND ($5::bigint IS NULL OR p.track_id = $5) \
               ORDER BY p.created_at DESC, p.id DESC LIMIT $6 OFFSET $7";
    tracing::debug!(sql, ?filter, "query");
    let category = filter.category.as_deref().map(str::trim).filter(|s| !s.is_empty());
    let search = filter.search.as_deref().map(str::trim).filter(|s| !s.is_empty()).map(like_pattern);
    let rows = sqlx::query_as(sql)
        .bind(filter.seller_id)
        .bind(category)
        .bind(search)
        .bind(filter.is_digital)
        .bind(filter.track)
        .bind(page.limit())
        .bind(page.offset())
        .fetch_all(pool)
        .await?;
    Ok(rows)
}

pub async fn get_product(pool: &PgPool, id: i64) -> Result<Product, AppError> {
    sqlx::query_as("SELECT * FROM products WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("product {}", id)))
}

/// Looks a product up by numeric id or slug and counts the view.
pub async fn view_product(pool: &PgPool, key: &str) -> Result<Product, AppError> {
    let id = key.parse::<i64>().ok();
    sqlx::query_as(
        "UPDATE products SET views = views + 1 WHERE id = (SELECT id FROM products \
         WHERE ($1::bigint IS NOT NULL AND id = $1) OR slug = $2 ORDER BY (id = $1) DESC NULLS LAST LIMIT 1) RETURNING *",
    )
    .bind(id)
    .bind(key)
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| AppError::NotFound(format!("product {}", key)))
}

#[derive(Debug, Default)]
struct ProductFields {
    title: Option<String>,
    description: Option<String>,
    price: Option<Decimal>,
    currency: Option<String>,
    quantity: Option<i32>,
    condition: Option<Condition>,
    category: Option<String>,
    is_digital: Option<bool>,
    is_available: Option<bool>,
    track: Option<i64>,
}

impl ProductFields {
    fn from_form(form: &FormData, creating: bool) -> Result<Self, AppError> {
        let mut v = RequestValidator::new();
        let f = ProductFields {
            title: form.trimmed("title"),
            description: form.text("description").map(str::to_string),
            price: form.parse::<Decimal>("price")?,
            currency: form.trimmed("currency").map(|c| c.to_ascii_uppercase()),
            quantity: form.parse::<i32>("quantity")?,
            condition: match form.trimmed("condition") {
                Some(raw) => match raw.parse::<Condition>() {
                    Ok(c) => Some(c),
                    Err(e) => {
                        v.fail("condition", e);
                        None
                    }
                },
                None => None,
            },
            category: category_name(form.text("category"))?,
            is_digital: form.bool("is_digital")?,
            is_available: form.bool("is_available")?,
            track: form.parse::<i64>("track")?,
        };
        if creating {
            v.required("title", f.title.as_deref()).required("price", f.price);
        }
        if let Some(price) = f.price {
            if price.is_sign_negative() {
                v.fail("price", "Ensure this value is greater than or equal to 0.");
            } else if price.normalize().scale() > PRICE_SCALE {
                v.fail("price", "Ensure that there are no more than 2 decimal places.");
            }
        }
        v.max_length("title", f.title.as_deref(), PRODUCT_TITLE_MAX)
            .max_length("currency", f.currency.as_deref(), CURRENCY_MAX)
            .minimum("quantity", f.quantity.map(i64::from), 0)
            .finish()?;
        Ok(f)
    }
}

async fn ensure_track(conn: &mut PgConnection, track: Option<i64>) -> Result<(), AppError> {
    if let Some(id) = track {
        let found: Option<(i64,)> = sqlx::query_as("SELECT id FROM tracks WHERE id = $1")
            .bind(id)
            .fetch_optional(&mut *conn)
            .await?;
        if found.is_none() {
            return Err(AppError::invalid("track", format!("Invalid pk \"{}\" - object does not exist.", id)));
        }
    }
    Ok(())
}

/// Stores uploaded images and links them after the product's existing ones. The first image
/// of a product becomes its primary image.
async fn attach_images(
    conn: &mut PgConnection,
    uploads: &mut StagedUploads<'_>,
    product_id: i64,
    files: &[&UploadedFile],
) -> Result<Vec<String>, AppError> {
    if files.is_empty() {
        return Ok(Vec::new());
    }
    let (existing, next_position): (i64, i32) =
        sqlx::query_as("SELECT COUNT(*), COALESCE(MAX(position) + 1, 0) FROM product_images WHERE product_id = $1")
            .bind(product_id)
            .fetch_one(&mut *conn)
            .await?;
    let mut stored = Vec::with_capacity(files.len());
    for (i, f) in files.iter().enumerate() {
        let Some(path) = uploads.store(dirs::PRODUCTS, Some(*f)).await? else {
            continue;
        };
        let offset = i32::try_from(i).map_err(|_| AppError::BadRequest("too many images".into()))?;
        sqlx::query("INSERT INTO product_images (product_id, image, is_primary, position) VALUES ($1, $2, $3, $4)")
            .bind(product_id)
            .bind(&path)
            .bind(existing == 0 && i == 0)
            .bind(next_position + offset)
            .execute(&mut *conn)
            .await?;
        stored.push(path);
    }
    Ok(stored)
}

pub async fn create_product(pool: &PgPool, media: &dyn MediaStore, viewer: i64, form: &FormData) -> Result<Product, AppError> {
    let f = ProductFields::from_form(form, true)?;
    let title = f.title.unwrap_or_default();
    let images: Vec<&UploadedFile> = form.files("images").collect();
    let mut uploads = StagedUploads::new(media);
    let written = async {
        let mut tx = pool.begin().await?;
        ensure_track(&mut *tx, f.track).await?;
        let category_id = match f.category.as_deref() {
            Some(name) => Some(resolve_category(&mut *tx, name).await?.id),
            None => None,
        };
        let slug = unique_slug(&mut *tx, "products", &title, "product").await?;
        let product: Product = sqlx::query_as(
            "INSERT INTO products (seller_id, category_id, track_id, title, slug, description, price, currency, quantity, \
             condition, is_digital, is_available) \
             VALUES ($1, $2, $3, $4, $5, COALESCE($6, ''), $7, $8, COALESCE($9, 1), $10, COALESCE($11, FALSE), COALESCE($12, TRUE)) \
             RETURNING *",
        )
        .bind(viewer)
        .bind(category_id)
        .bind(f.track)
        .bind(&title)
        .bind(&slug)
        .bind(f.description)
        .bind(f.price.unwrap_or_default())
        .bind(f.currency.unwrap_or_else(|| DEFAULT_CURRENCY.to_string()))
        .bind(f.quantity)
        .bind(f.condition.unwrap_or(Condition::New).as_str())
        .bind(f.is_digital)
        .bind(f.is_available)
        .fetch_one(&mut *tx)
        .await?;
        let stored = attach_images(&mut *tx, &mut uploads, product.id, &images).await?;
        tx.commit().await?;
        Ok::<_, AppError>((product, stored.len()))
    }
    .await;
    let (product, image_count) = uploads.settle(written).await?;
    tracing::info!(product_id = product.id, slug = %product.slug, seller_id = viewer, images = image_count, "product listed");
    Ok(product)
}

/// Seller edit. New images are appended to the existing set.
pub async fn update_product(
    pool: &PgPool,
    media: &dyn MediaStore,
    viewer: i64,
    id: i64,
    form: &FormData,
) -> Result<Product, AppError> {
    let current = get_product(pool, id).await?;
    ensure_owner(current.seller_id, viewer, "product")?;
    let f = ProductFields::from_form(form, false)?;
    let images: Vec<&UploadedFile> = form.files("images").collect();
    let mut uploads = StagedUploads::new(media);
    let written = async {
        let mut tx = pool.begin().await?;
        ensure_track(&mut *tx, f.track).await?;
        let category_id = match f.category.as_deref() {
            Some(name) => Some(resolve_category(&mut *tx, name).await?.id),
            None => None,
        };
        let product: Product = sqlx::query_as(
            "UPDATE products SET title = COALESCE($2, title), description = COALESCE($3, description), \
             price = COALESCE($4, price), currency = COALESCE($5, currency), quantity = COALESCE($6, quantity), \
             condition = COALESCE($7, condition), category_id = COALESCE($8, category_id), \
             is_digital = COALESCE($9, is_digital), is_available = COALESCE($10, is_available), \
             track_id = COALESCE($11, track_id), updated_at = NOW() WHERE id = $1 RETURNING *",
        )
        .bind(id)
        .bind(f.title)
        .bind(f.description)
        .bind(f.price)
        .bind(f.currency)
        .bind(f.quantity)
        .bind(f.condition.map(Condition::as_str))
        .bind(category_id)
        .bind(f.is_digital)
        .bind(f.is_available)
        .bind(f.track)
        .fetch_one(&mut *tx)
        .await?;
        attach_images(&mut *tx, &mut uploads, id, &images).await?;
        tx.commit().await?;
        Ok::<_, AppError>(product)
    }
    .await;
    let product = uploads.settle(written).await?;
    Ok(product)
}

pub async fn delete_product(pool: &PgPool, media: &dyn MediaStore, viewer: i64, id: i64) -> Result<(), AppError> {
    let current = get_product(pool, id).await?;
    ensure_owner(current.seller_id, viewer, "product")?;
    let images: Vec<(String,)> = sqlx::query_as("SELECT image FROM product_images WHERE product_id = $1")
        .bind(id)
        .fetch_all(pool)
        .await?;
    sqlx::query("DELETE FROM products WHERE id = $1").bind(id).execute(pool).await?;
    discard_uploads(media, images.into_iter().map(|(p,)| Some(p))).await;
    tracing::info!(product_id = id, "product removed");
    Ok(())
}

// Reviews

pub async fn list_reviews(pool: &PgPool, product_id: i64, page: Page) -> Result<Vec<ProductReview>, AppError> {
    get_product(pool, product_id).await?;
    let rows = sqlx::query_as(
        "SELECT * FROM product_reviews WHERE product_id = $1 ORDER BY created_at DESC, id DESC LIMIT $2 OFFSET $3",
    )
    .bind(product_id)
    .bind(page.limit())
    .bind(page.offset())
    .fetch_all(pool)
    .await?;
    Ok(rows)
}

/// One review per buyer per product; sellers cannot review their own listings.
pub async fn create_review(pool: &PgPool, viewer: i64, product_id: i64, form: &FormData) -> Result<ProductReview, AppError> {
    let product = get_product(pool, product_id).await?;
    let rating = form.parse::<i16>("rating")?;
    RequestValidator::new()
        .required("rating", rating)
        .range("rating", rating.map(i64::from), MIN_RATING, MAX_RATING)
        .finish()?;
    if product.seller_id == viewer {
        tracing::warn!(product_id, viewer, "seller review of own product rejected");
        return Err(AppError::Forbidden("you cannot review your own product".into()));
    }
    let review: Option<ProductReview> = sqlx::query_as(
        "INSERT INTO product_reviews (product_id, reviewer_id, rating, comment) VALUES ($1, $2, $3, $4) \
         ON CONFLICT (product_id, reviewer_id) DO NOTHING RETURNING *",
    )
    .bind(product_id)
    .bind(viewer)
    .bind(rating)
    .bind(form.text("comment").unwrap_or_default())
    .fetch_optional(pool)
    .await?;
    review.ok_or_else(|| AppError::Conflict("you have already reviewed this product".into()))
}

// Wishlist

/// The viewer's wishlist, created on first use.
pub async fn wishlist(pool: &PgPool, viewer: i64) -> Result<Wishlist, AppError> {
    sqlx::query("INSERT INTO wishlists (user_id) VALUES ($1) ON CONFLICT (user_id) DO NOTHING")
        .bind(viewer)
        .execute(pool)
        .await?;
    let wishlist = sqlx::query_as("SELECT * FROM wishlists WHERE user_id = $1")
        .bind(viewer)
        .fetch_one(pool)
        .await?;
    Ok(wishlist)
}

/// Adds or removes `{product_id}`. Returns whether the product is now wishlisted.
pub async fn toggle_wishlist(pool: &PgPool, viewer: i64, form: &FormData) -> Result<bool, AppError> {
    let product_id = form.parse::<i64>("product_id")?;
    RequestValidator::new().required("product_id", product_id).finish()?;
    let product = get_product(pool, product_id.unwrap_or_default()).await?;
    let list = wishlist(pool, viewer).await?;
    let removed = sqlx::query("DELETE FROM wishlist_products WHERE wishlist_id = $1 AND product_id = $2")
        .bind(list.id)
        .bind(product.id)
        .execute(pool)
        .await?;
    if removed.rows_affected() > 0 {
        return Ok(false);
    }
    sqlx::query("INSERT INTO wishlist_products (wishlist_id, product_id) VALUES ($1, $2) ON CONFLICT DO NOTHING")
        .bind(list.id)
        .bind(product.id)
        .execute(pool)
        .await?;
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn category_names_are_trimmed_and_bounded() {
        assert_eq!(category_name(Some("  Hymnals ")).unwrap(), Some("Hymnals".to_string()));
        assert_eq!(category_name(None).unwrap(), None);
        assert!(category_name(Some("   ")).is_err());
        assert!(category_name(Some(&"x".repeat(101))).is_err());
    }

    #[test]
    fn new_product_needs_title_and_price() {
        let err = ProductFields::from_form(&FormData::new().with_field("title", "Hymnal"), true).unwrap_err();
        match err {
            AppError::Validation(e) => assert!(e.field("price").is_some()),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn price_rules() {
        let form = |p: &str| FormData::new().with_field("title", "Hymnal").with_field("price", p);
        assert!(ProductFields::from_form(&form("12.50"), true).is_ok());
        assert!(ProductFields::from_form(&form("-1"), true).is_err());
        assert!(ProductFields::from_form(&form("1.999"), true).is_err());
        assert!(matches!(ProductFields::from_form(&form("abc"), true), Err(AppError::Validation(_))));
    }

    #[test]
    fn currency_is_upper_cased_and_condition_checked() {
        let form = FormData::new().with_field("currency", "kes").with_field("condition", "used");
        let f = ProductFields::from_form(&form, false).unwrap();
        assert_eq!(f.currency.as_deref(), Some("KES"));
        assert_eq!(f.condition, Some(Condition::Used));
        let bad = FormData::new().with_field("condition", "mint");
        assert!(ProductFields::from_form(&bad, false).is_err());
    }
}
