//! Database pool, schema, models and retry helpers

pub mod init;
pub mod migrations;
pub mod models;
pub mod retry;

pub use init::*;
pub use migrations::*;
pub use models::*;
pub use retry::*;
