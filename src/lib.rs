//! MySQL Explorer Library
//!
//! Backend of a database explorer for MySQL/MariaDB: session-keyed connection
//! pools, a navigable metadata tree, ad-hoc query execution with normalized
//! results, and best-effort cancellation of running queries.

pub mod config;
pub mod db;
pub mod error;
pub mod format;
pub mod models;
pub mod notify;
pub mod service;
pub mod transport;

pub use config::Config;
pub use error::{DbError, DbResult};
pub use service::ExplorerService;
