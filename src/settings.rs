//! Runtime settings read from the environment (after `.env` is loaded).

use std::path::PathBuf;
use std::str::FromStr;

#[derive(Clone, Debug)]
pub struct Settings {
    pub database_url: String,
    pub bind_addr: String,
    pub db_max_connections: u32,
    pub media_root: PathBuf,
    pub max_body_bytes: usize,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            database_url: "postgres://localhost/advent".into(),
            bind_addr: "0.0.0.0:8000".into(),
            db_max_connections: 5,
            media_root: PathBuf::from("./media"),
            max_body_bytes: 50 * 1024 * 1024,
        }
    }
}

impl Settings {
    /// Loads `.env` if present, then reads each variable with its default.
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Settings::default();
        Settings {
            database_url: lookup("DATABASE_URL").unwrap_or(defaults.database_url),
            bind_addr: lookup("BIND_ADDR").unwrap_or(defaults.bind_addr),
            db_max_connections: parse_or("DB_MAX_CONNECTIONS", lookup("DB_MAX_CONNECTIONS"), defaults.db_max_connections),
            media_root: lookup("MEDIA_ROOT").map(PathBuf::from).unwrap_or(defaults.media_root),
            max_body_bytes: parse_or("MAX_BODY_BYTES", lookup("MAX_BODY_BYTES"), defaults.max_body_bytes),
        }
    }
}

fn parse_or<T: FromStr + Copy>(key: &str, raw: Option<String>, default: T) -> T {
    match raw {
        None => default,
        Some(s) => s.trim().parse().unwrap_or_else(|_| {
            tracing::warn!(key, value = %s, "invalid setting, using default");
            default
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn missing_values_fall_back_to_defaults() {
        let s = Settings::from_lookup(|_| None);
        assert_eq!(s.bind_addr, "0.0.0.0:8000");
        assert_eq!(s.db_max_connections, 5);
    }

    #[test]
    fn invalid_numbers_fall_back() {
        let env: HashMap<&str, &str> = [("DB_MAX_CONNECTIONS", "lots"), ("MEDIA_ROOT", "/srv/media")].into();
        let s = Settings::from_lookup(|k| env.get(k).map(|v| v.to_string()));
        assert_eq!(s.db_max_connections, 5);
        assert_eq!(s.media_root, PathBuf::from("/srv/media"));
    }
}
