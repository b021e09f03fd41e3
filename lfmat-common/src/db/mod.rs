//! Database models and queries

pub mod candidates;
pub mod init;
pub mod models;

pub use candidates::*;
pub use init::*;
pub use models::*;
