//! URL slugs: derivation from titles and suffix disambiguation.

use crate::error::AppError;
use std::collections::HashSet;

/// Lowercase, drop punctuation and non-ASCII, collapse whitespace/dashes into single `-`.
/// "Amazing Grace (Live!)" -> "amazing-grace-live".
pub fn slugify(title: &str) -> String {
    let mut out = String::with_capacity(title.len());
    let mut pending_dash = false;
    for c in title.to_lowercase().chars() {
        if c.is_ascii_alphanumeric() || c == '_' {
            if pending_dash && !out.is_empty() {
                out.push('-');
            }
            pending_dash = false;
            out.push(c);
        } else if c.is_whitespace() || c == '-' {
            pending_dash = true;
        }
    }
    out.trim_matches(|c| c == '-' || c == '_').to_string()
}

/// Slug for `title`, or `fallback` when the title has no slug-able characters.
pub fn base_slug(title: &str, fallback: &str) -> String {
    let s = slugify(title);
    if s.is_empty() {
        fallback.to_string()
    } else {
        s
    }
}

/// First of `base`, `base-2`, `base-3`, ... not present in `taken`.
pub fn next_free_slug(base: &str, taken: &HashSet<String>) -> String {
    if !taken.contains(base) {
        return base.to_string();
    }
    let mut n = 2u32;
    loop {
        let candidate = format!("{}-{}", base, n);
        if !taken.contains(&candidate) {
            return candidate;
        }
        n += 1;
    }
}

/// Picks a free slug for `table` inside the caller's transaction.
/// `table` is a trusted identifier from this crate, never from input.
pub async fn unique_slug(
    conn: &mut sqlx::PgConnection,
    table: &'static str,
    title: &str,
    fallback: &str,
) -> Result<String, AppError> {
    let base = base_slug(title, fallback);
    let sql = format!("SELECT slug FROM {} WHERE slug = $1 OR slug LIKE $2", table);
    tracing::debug!(sql = %sql, base = %base, "query");
    let taken: Vec<(String,)> = sqlx::query_as(&sql)
        .bind(&base)
        .bind(format!("{}-%", base.replace('_', "\\_")))
        .fetch_all(&mut *conn)
        .await?;
    let taken: HashSet<String> = taken.into_iter().map(|(s,)| s).collect();
    Ok(next_free_slug(&base, &taken))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slugify_matches_title_transform() {
        assert_eq!(slugify("Amazing Grace (Live!)"), "amazing-grace-live");
        assert_eq!(slugify("  How  Great -- Thou Art "), "how-great-thou-art");
        assert_eq!(slugify("Café Hymn"), "caf-hymn");
        assert_eq!(slugify("snake_case_title"), "snake_case_title");
    }

    #[test]
    fn fallback_for_empty_slug() {
        assert_eq!(base_slug("!!!", "track"), "track");
        assert_eq!(base_slug("Psalm 23", "track"), "psalm-23");
    }

    #[test]
    fn disambiguates_with_numeric_suffix() {
        let mut taken = HashSet::new();
        assert_eq!(next_free_slug("psalm-23", &taken), "psalm-23");
        taken.insert("psalm-23".to_string());
        assert_eq!(next_free_slug("psalm-23", &taken), "psalm-23-2");
        taken.insert("psalm-23-2".to_string());
        taken.insert("psalm-23-4".to_string());
        assert_eq!(next_free_slug("psalm-23", &taken), "psalm-23-3");
    }
}
