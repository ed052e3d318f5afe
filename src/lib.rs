//! Advent backend: media sharing, community directories and a marketplace over PostgreSQL.

pub mod error;
pub mod extractors;
pub mod handlers;
pub mod media;
pub mod present;
pub mod response;
pub mod routes;
pub mod schema;
pub mod service;
pub mod settings;
pub mod slug;
pub mod state;
pub mod store;

pub use error::AppError;
pub use media::{LocalMediaStore, MediaReader, MediaStore};
pub use response::{SuccessMany, SuccessOne};
pub use routes::{api_routes, app, common_routes};
pub use settings::Settings;
pub use state::AppState;
pub use store::{ensure_database_exists, ensure_tables};
