//! Database collaborator for the lockstep harness: connection setup, the
//! `account` fixture, and the per-task [`session::Session`].

pub mod accounts;
pub mod config;
pub mod error;
pub mod isolation;
pub mod pool;
pub mod result_set;
pub mod session;

pub use error::ResourceError;
pub use isolation::IsolationLevel;
pub use result_set::ResultSet;
pub use session::Session;
