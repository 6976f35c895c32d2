//! Request handling on top of the database layer.
//!
//! - `router`: node context classification and dispatch
//! - `explorer`: the service owning sessions and running queries

pub mod explorer;
pub mod router;

pub use explorer::ExplorerService;
pub use router::{RequestKind, RequestRouter, Routed};
