//! Shared application state for all routes.

use crate::media::MediaStore;
use crate::settings::Settings;
use sqlx::PgPool;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    /// Where uploads are written and read back from.
    pub media: Arc<dyn MediaStore>,
    pub settings: Arc<Settings>,
}
