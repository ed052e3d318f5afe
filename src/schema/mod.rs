//! Persisted rows. One struct per table; column names match field names.

pub mod community;
pub mod groups;
pub mod market;
pub mod music;
pub mod social;
pub mod users;

pub use community::*;
pub use groups::*;
pub use market::*;
pub use music::*;
pub use social::*;
pub use users::*;
