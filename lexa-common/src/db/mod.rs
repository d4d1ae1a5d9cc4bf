//! Database bootstrap and persisted record shapes

pub mod init;
pub mod models;

pub use init::*;
pub use models::*;
