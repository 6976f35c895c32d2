//! Database abstraction layer.
//!
//! This module provides database access functionality:
//! - Driver seam and the sqlx MySQL backend
//! - Session pool registry
//! - Metadata catalog
//! - Query execution and cancellation
//! - Type mappings

pub mod canceller;
pub mod catalog;
pub mod driver;
pub mod executor;
pub mod mysql;
pub mod registry;
pub mod types;

pub use canceller::{QueryCanceller, RunningQuerySummary};
pub use catalog::{MetadataCatalog, StructureTarget};
pub use driver::{
    ConnectionOp, Driver, QueryOutcome, RawColumn, Record, RowSet, SessionConnection,
};
pub use executor::QueryExecutor;
pub use mysql::{MySqlDriver, MySqlSessionConnection};
pub use registry::{SessionRegistry, SessionSummary};
pub use types::{NativeType, semantic_type};
