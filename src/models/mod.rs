//! Data models for the explorer backend.
//!
//! This module re-exports all model types used throughout the application.

pub mod connection;
pub mod node;
pub mod query;

// Re-export commonly used types
pub use connection::{Credentials, DEFAULT_MYSQL_PORT};
pub use node::{
    ActionKind, ColumnKey, Icon, MetadataNode, NodeAction, NodeContext, NodeKind, RoutineKind,
    Topic,
};
pub use query::{
    DEFAULT_PREVIEW_LIMIT, MAX_PREVIEW_LIMIT, ResultColumn, ResultSet, SemanticType,
};
