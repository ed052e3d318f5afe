//! Request-scoped extractors: viewer identity, origin, and upload-aware payloads.

mod context;
mod form;
mod viewer;

pub use context::{RequestOrigin, ViewContext};
pub use form::{FormData, UploadedFile};
pub use viewer::{AuthUser, Viewer, VIEWER_ID_HEADER};
