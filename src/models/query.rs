//! Query-related data models.
//!
//! This module defines the normalized result shape handed back to the host.

use crate::error::{DbError, DbResult};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

/// Default row bound for table/view previews.
pub const DEFAULT_PREVIEW_LIMIT: u32 = 100;

/// Maximum allowed preview bound.
pub const MAX_PREVIEW_LIMIT: u32 = 10000;

/// Semantic column type exposed to the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SemanticType {
    Number,
    Text,
    Date,
    Boolean,
    Binary,
    Unknown,
}

impl std::fmt::Display for SemanticType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Number => "number",
            Self::Text => "text",
            Self::Date => "date",
            Self::Boolean => "boolean",
            Self::Binary => "binary",
            Self::Unknown => "unknown",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResultColumn {
    pub name: String,
    #[serde(rename = "type")]
    pub column_type: SemanticType,
}

impl ResultColumn {
    pub fn new(name: impl Into<String>, column_type: SemanticType) -> Self {
        Self {
            name: name.into(),
            column_type,
        }
    }
}

/// Normalized outcome of a query or introspection.
///
/// Exactly one payload shape per instance. Build `Rows` through
/// [`ResultSet::rows`] so the row-width invariant is checked.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ResultSet {
    Rows {
        columns: Vec<ResultColumn>,
        data: Vec<Vec<JsonValue>>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        query: Option<String>,
    },
    Affected {
        #[serde(rename = "recordsAffected")]
        records_affected: u64,
    },
    Structure {
        query: String,
    },
}

impl ResultSet {
    /// Build a tabular result, rejecting rows whose width differs from the column count.
    pub fn rows(
        columns: Vec<ResultColumn>,
        data: Vec<Vec<JsonValue>>,
        query: Option<String>,
    ) -> DbResult<Self> {
        if let Some((idx, row)) = data
            .iter()
            .enumerate()
            .find(|(_, row)| row.len() != columns.len())
        {
            return Err(DbError::internal(format!(
                "Row {} has {} values but the result has {} columns",
                idx,
                row.len(),
                columns.len()
            )));
        }
        Ok(Self::Rows {
            columns,
            data,
            query,
        })
    }

    /// Create a mutation acknowledgment.
    pub fn affected(records_affected: u64) -> Self {
        Self::Affected { records_affected }
    }

    /// Create a structure/DDL payload.
    pub fn structure(ddl: impl Into<String>) -> Self {
        Self::Structure { query: ddl.into() }
    }

    /// Attach the statement that produced a tabular result.
    pub fn with_query(self, text: impl Into<String>) -> Self {
        match self {
            Self::Rows { columns, data, .. } => Self::Rows {
                columns,
                data,
                query: Some(text.into()),
            },
            other => other,
        }
    }

    /// Number of data rows (zero for non-tabular results).
    pub fn row_count(&self) -> usize {
        match self {
            Self::Rows { data, .. } => data.len(),
            _ => 0,
        }
    }

    pub fn records_affected(&self) -> Option<u64> {
        match self {
            Self::Affected { records_affected } => Some(*records_affected),
            _ => None,
        }
    }

    pub fn is_rows(&self) -> bool {
        matches!(self, Self::Rows { .. })
    }

    /// Every row has exactly one value per column.
    pub fn is_well_formed(&self) -> bool {
        match self {
            Self::Rows { columns, data, .. } => data.iter().all(|row| row.len() == columns.len()),
            _ => true,
        }
    }
}
