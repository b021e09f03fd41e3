//! Utility modules for lfmat-labeler

pub mod db_retry;
pub mod write_scope;

pub use db_retry::retry_on_lock;
pub use write_scope::{begin_scope, WriteScope};
