//! Advent backend server.
//!
//! Run from repo root: `cargo run -p advent-server`
//! Settings come from the environment or a `.env` file (see `Settings::from_env`).

use advent_backend::{app, ensure_database_exists, ensure_tables, AppState, LocalMediaStore, Settings};
use axum::{extract::Request, ServiceExt};
use std::sync::Arc;
use tokio::net::TcpListener;
use tower::Layer;
use tower_http::{
    limit::RequestBodyLimitLayer, normalize_path::NormalizePathLayer, services::ServeDir, trace::TraceLayer,
};
use tracing_subscriber::EnvFilter;

const DEFAULT_LOG_FILTER: &str = "advent_backend=info,advent_server=info";

fn log_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER))
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // .env is loaded before the filter reads RUST_LOG; logging is up before settings can warn.
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt().with_env_filter(log_filter()).init();
    let settings = Settings::from_env();

    ensure_database_exists(&settings.database_url).await?;
    let pool = sqlx::postgres::PgPoolOptions::new()
        .max_connections(settings.db_max_connections)
        .connect(&settings.database_url)
        .await?;
    ensure_tables(&pool).await?;

    tokio::fs::create_dir_all(&settings.media_root).await?;
    let media_root = settings.media_root.clone();
    let state = AppState {
        pool,
        media: Arc::new(LocalMediaStore::new(media_root.clone())),
        settings: Arc::new(settings.clone()),
    };

    let router = app(state)
        .nest_service("/media", ServeDir::new(media_root))
        .layer(RequestBodyLimitLayer::new(settings.max_body_bytes))
        .layer(TraceLayer::new_for_http());
    let service = NormalizePathLayer::trim_trailing_slash().layer(router);

    let listener = TcpListener::bind(&settings.bind_addr).await?;
    tracing::info!("advent backend listening on http://{}", listener.local_addr()?);
    axum::serve(listener, ServiceExt::<Request>::into_make_service(service)).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::sync::Mutex;

    #[derive(Clone, Default)]
    struct Captured(Arc<Mutex<Vec<u8>>>);

    impl Write for Captured {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn settings_warnings_pass_the_default_filter() {
        let captured = Captured::default();
        let writer = captured.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_env_filter(EnvFilter::new(DEFAULT_LOG_FILTER))
            .with_writer(move || writer.clone())
            .with_ansi(false)
            .finish();
        let settings = tracing::subscriber::with_default(subscriber, || {
            Settings::from_lookup(|key| (key == "MAX_BODY_BYTES").then(|| "lots".to_string()))
        });
        assert_eq!(settings.max_body_bytes, Settings::default().max_body_bytes);
        let logged = String::from_utf8(captured.0.lock().unwrap().clone()).unwrap();
        assert!(logged.contains("invalid setting"), "{logged}");
        assert!(logged.contains("MAX_BODY_BYTES"), "{logged}");
    }
}
