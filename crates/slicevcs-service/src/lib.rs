#![warn(missing_docs)]

//! Request handler groups over the slicevcs coordinator.
//!
//! Two facades mirror the external surface: [`SliceService`] for the client
//! workflow (checkout, changesets, commits) and [`AdminService`] for the
//! operator workflow (batch merge, slice administration, conflicts, global
//! state). Both are thin: argument validation, one structured log line per
//! call, coordinator dispatch, and error-category mapping.

pub mod admin;
pub mod config;
pub mod protocol;
pub mod server;
pub mod slice;
pub mod status;

pub use admin::AdminService;
pub use config::ServerConfig;
pub use slice::SliceService;
pub use status::{ErrorCategory, ServiceError, ServiceResult};
