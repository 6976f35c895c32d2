//! MySQL type mappings.
//!
//! Type conversion uses a two-phase approach:
//! 1. The column's native protocol type code is mapped to a [`SemanticType`]
//!    through one total table ([`semantic_type`]).
//! 2. MySQL-specific decoders extract the cell value according to that code.
//!
//! sqlx does not expose the raw protocol code, so [`NativeType::from_type_name`]
//! recovers it from the type name sqlx reports for a column.

use crate::models::SemanticType;
use serde_json::Value as JsonValue;

// =============================================================================
// Protocol Type Codes
// =============================================================================

/// MySQL client/server protocol column type codes.
pub mod code {
    pub const DECIMAL: u8 = 0x00;
    pub const TINY: u8 = 0x01;
    pub const SHORT: u8 = 0x02;
    pub const LONG: u8 = 0x03;
    pub const FLOAT: u8 = 0x04;
    pub const DOUBLE: u8 = 0x05;
    pub const NULL: u8 = 0x06;
    pub const TIMESTAMP: u8 = 0x07;
    pub const LONGLONG: u8 = 0x08;
    pub const INT24: u8 = 0x09;
    pub const DATE: u8 = 0x0a;
    pub const TIME: u8 = 0x0b;
    pub const DATETIME: u8 = 0x0c;
    pub const YEAR: u8 = 0x0d;
    pub const NEWDATE: u8 = 0x0e;
    pub const VARCHAR: u8 = 0x0f;
    pub const BIT: u8 = 0x10;
    pub const TIMESTAMP2: u8 = 0x11;
    pub const DATETIME2: u8 = 0x12;
    pub const TIME2: u8 = 0x13;
    pub const TYPED_ARRAY: u8 = 0x14;
    pub const VECTOR: u8 = 0xf2;
    pub const JSON: u8 = 0xf5;
    pub const NEWDECIMAL: u8 = 0xf6;
    pub const ENUM: u8 = 0xf7;
    pub const SET: u8 = 0xf8;
    pub const TINY_BLOB: u8 = 0xf9;
    pub const MEDIUM_BLOB: u8 = 0xfa;
    pub const LONG_BLOB: u8 = 0xfb;
    pub const BLOB: u8 = 0xfc;
    pub const VAR_STRING: u8 = 0xfd;
    pub const STRING: u8 = 0xfe;
    pub const GEOMETRY: u8 = 0xff;
}

/// Native column type as reported by the server.
///
/// `binary` is set when the column uses the binary charset, which is how the
/// protocol tells `BLOB` from `TEXT` and `VARBINARY` from `VARCHAR`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NativeType {
    pub code: u8,
    pub binary: bool,
}

impl NativeType {
    pub const fn new(code: u8, binary: bool) -> Self {
        Self { code, binary }
    }

    pub const fn text(code: u8) -> Self {
        Self::new(code, false)
    }

    /// Recover the protocol code from a sqlx MySQL type name.
    ///
    /// Names sqlx never reports fall through to `NULL`, which maps to `unknown`.
    pub fn from_type_name(type_name: &str) -> Self {
        let upper = type_name.trim().to_ascii_uppercase();
        let base = upper
            .split(|c: char| c == '(' || c.is_whitespace())
            .next()
            .unwrap_or_default();

        match base {
            "DECIMAL" | "NUMERIC" => Self::text(code::NEWDECIMAL),
            "BOOLEAN" | "BOOL" | "TINYINT" => Self::text(code::TINY),
            "SMALLINT" => Self::text(code::SHORT),
            "INT" | "INTEGER" => Self::text(code::LONG),
            "MEDIUMINT" => Self::text(code::INT24),
            "BIGINT" => Self::text(code::LONGLONG),
            "FLOAT" => Self::text(code::FLOAT),
            "DOUBLE" | "REAL" => Self::text(code::DOUBLE),
            "TIMESTAMP" => Self::text(code::TIMESTAMP),
            "DATE" => Self::text(code::DATE),
            "TIME" => Self::text(code::TIME),
            "DATETIME" => Self::text(code::DATETIME),
            "YEAR" => Self::text(code::YEAR),
            "BIT" => Self::text(code::BIT),
            "VARCHAR" => Self::text(code::VAR_STRING),
            "VARBINARY" => Self::new(code::VAR_STRING, true),
            "CHAR" => Self::text(code::STRING),
            "BINARY" => Self::new(code::STRING, true),
            "ENUM" => Self::text(code::ENUM),
            "SET" => Self::text(code::SET),
            "JSON" => Self::text(code::JSON),
            "TINYTEXT" => Self::text(code::TINY_BLOB),
            "TINYBLOB" => Self::new(code::TINY_BLOB, true),
            "TEXT" => Self::text(code::BLOB),
            "BLOB" => Self::new(code::BLOB, true),
            "MEDIUMTEXT" => Self::text(code::MEDIUM_BLOB),
            "MEDIUMBLOB" => Self::new(code::MEDIUM_BLOB, true),
            "LONGTEXT" => Self::text(code::LONG_BLOB),
            "LONGBLOB" => Self::new(code::LONG_BLOB, true),
            "GEOMETRY" | "POINT" | "LINESTRING" | "POLYGON" => Self::new(code::GEOMETRY, true),
            "VECTOR" => Self::new(code::VECTOR, true),
            _ => Self::text(code::NULL),
        }
    }

    pub fn semantic(self) -> SemanticType {
        semantic_type(self)
    }
}

// =============================================================================
// Type Classification
// =============================================================================

/// Map a native type to the semantic type exposed to the host.
///
/// Total over every code: anything not listed is `unknown`.
pub fn semantic_type(native: NativeType) -> SemanticType {
    use code::*;

    match native.code {
        DECIMAL | NEWDECIMAL | TINY | SHORT | LONG | INT24 | LONGLONG | FLOAT | DOUBLE | YEAR => {
            SemanticType::Number
        }
        TIMESTAMP | DATE | TIME | DATETIME | NEWDATE | TIMESTAMP2 | DATETIME2 | TIME2 => {
            SemanticType::Date
        }
        BIT => SemanticType::Boolean,
        ENUM | SET | JSON => SemanticType::Text,
        VARCHAR | VAR_STRING | STRING | TINY_BLOB | MEDIUM_BLOB | LONG_BLOB | BLOB => {
            if native.binary {
                SemanticType::Binary
            } else {
                SemanticType::Text
            }
        }
        GEOMETRY | VECTOR => SemanticType::Binary,
        _ => SemanticType::Unknown,
    }
}

// =============================================================================
// Binary Encoding
// =============================================================================

/// Encode binary cell data as a base64 JSON string.
pub fn decode_binary_value(bytes: &[u8]) -> JsonValue {
    use base64::{Engine as _, engine::general_purpose::STANDARD};

    JsonValue::String(STANDARD.encode(bytes))
}

// =============================================================================
// MySQL Decoders
// =============================================================================

pub(crate) mod mysql {
    use super::*;
    use sqlx::mysql::{MySqlRow, MySqlTypeInfo, MySqlValueRef};
    use sqlx::{Decode, Row, Type, TypeInfo};

    /// Raw DECIMAL values as strings, preserving the exact representation.
    #[derive(Debug)]
    pub struct RawDecimal(pub String);

    impl Type<sqlx::MySql> for RawDecimal {
        fn type_info() -> MySqlTypeInfo {
            <String as Type<sqlx::MySql>>::type_info()
        }

        fn compatible(ty: &MySqlTypeInfo) -> bool {
            let name = ty.name().to_ascii_lowercase();
            name.contains("decimal") || name.contains("numeric")
        }
    }

    impl<'r> Decode<'r, sqlx::MySql> for RawDecimal {
        fn decode(value: MySqlValueRef<'r>) -> Result<Self, sqlx::error::BoxDynError> {
            let s = <&str as Decode<sqlx::MySql>>::decode(value)?;
            Ok(RawDecimal(s.to_string()))
        }
    }

    /// Decode one cell according to its native type.
    pub fn decode_column(row: &MySqlRow, idx: usize, native: NativeType) -> JsonValue {
        use code::*;

        match native.code {
            DECIMAL | NEWDECIMAL => decode_decimal(row, idx),
            TINY | SHORT | LONG | INT24 | LONGLONG | YEAR => decode_integer(row, idx),
            FLOAT | DOUBLE => decode_float(row, idx),
            BIT => decode_bit(row, idx),
            DATE | NEWDATE => decode_date(row, idx),
            TIME | TIME2 => decode_time(row, idx),
            DATETIME | DATETIME2 => decode_datetime(row, idx),
            TIMESTAMP | TIMESTAMP2 => decode_timestamp(row, idx),
            JSON => decode_json(row, idx),
            _ if native.semantic() == SemanticType::Binary => decode_binary_col(row, idx),
            _ => decode_text(row, idx),
        }
    }

    fn decode_decimal(row: &MySqlRow, idx: usize) -> JsonValue {
        match row.try_get::<Option<RawDecimal>, _>(idx) {
            Ok(Some(v)) => JsonValue::String(v.0),
            Ok(None) => JsonValue::Null,
            Err(e) => {
                tracing::error!("Failed to decode DECIMAL: {:?}", e);
                JsonValue::Null
            }
        }
    }

    fn decode_integer(row: &MySqlRow, idx: usize) -> JsonValue {
        if let Ok(Some(v)) = row.try_get::<Option<i64>, _>(idx) {
            return JsonValue::Number(v.into());
        }
        if let Ok(Some(v)) = row.try_get::<Option<u64>, _>(idx) {
            return JsonValue::Number(v.into());
        }
        if let Ok(Some(v)) = row.try_get::<Option<i8>, _>(idx) {
            return JsonValue::Number(v.into());
        }
        if let Ok(Some(v)) = row.try_get::<Option<u16>, _>(idx) {
            return JsonValue::Number(v.into());
        }
        decode_text(row, idx)
    }

    fn decode_float(row: &MySqlRow, idx: usize) -> JsonValue {
        if let Ok(Some(v)) = row.try_get::<Option<f64>, _>(idx) {
            return float_value(v);
        }
        if let Ok(Some(v)) = row.try_get::<Option<f32>, _>(idx) {
            return float_value(v as f64);
        }
        JsonValue::Null
    }

    fn float_value(v: f64) -> JsonValue {
        serde_json::Number::from_f64(v)
            .map(JsonValue::Number)
            .unwrap_or_else(|| JsonValue::String(v.to_string()))
    }

    fn decode_bit(row: &MySqlRow, idx: usize) -> JsonValue {
        if let Ok(v) = row.try_get::<Option<bool>, _>(idx) {
            return v.map(JsonValue::Bool).unwrap_or(JsonValue::Null);
        }
        match row.try_get::<Option<u64>, _>(idx) {
            Ok(Some(v)) => JsonValue::Bool(v != 0),
            _ => JsonValue::Null,
        }
    }

    fn decode_date(row: &MySqlRow, idx: usize) -> JsonValue {
        match row.try_get::<Option<chrono::NaiveDate>, _>(idx) {
            Ok(Some(v)) => JsonValue::String(v.format("%Y-%m-%d").to_string()),
            Ok(None) => JsonValue::Null,
            Err(_) => decode_text(row, idx),
        }
    }

    fn decode_time(row: &MySqlRow, idx: usize) -> JsonValue {
        match row.try_get::<Option<chrono::NaiveTime>, _>(idx) {
            Ok(Some(v)) => JsonValue::String(v.format("%H:%M:%S%.f").to_string()),
            Ok(None) => JsonValue::Null,
            // Negative or >24h intervals do not fit NaiveTime.
            Err(_) => decode_text(row, idx),
        }
    }

    fn decode_datetime(row: &MySqlRow, idx: usize) -> JsonValue {
        match row.try_get::<Option<chrono::NaiveDateTime>, _>(idx) {
            Ok(Some(v)) => JsonValue::String(v.format("%Y-%m-%dT%H:%M:%S%.f").to_string()),
            Ok(None) => JsonValue::Null,
            Err(_) => decode_text(row, idx),
        }
    }

    fn decode_timestamp(row: &MySqlRow, idx: usize) -> JsonValue {
        match row.try_get::<Option<chrono::DateTime<chrono::Utc>>, _>(idx) {
            Ok(Some(v)) => JsonValue::String(v.to_rfc3339()),
            Ok(None) => JsonValue::Null,
            Err(_) => decode_datetime(row, idx),
        }
    }

    fn decode_json(row: &MySqlRow, idx: usize) -> JsonValue {
        match row.try_get::<Option<JsonValue>, _>(idx) {
            Ok(v) => v.unwrap_or(JsonValue::Null),
            Err(_) => match decode_text(row, idx) {
                JsonValue::String(s) => serde_json::from_str(&s).unwrap_or(JsonValue::String(s)),
                other => other,
            },
        }
    }

    fn decode_binary_col(row: &MySqlRow, idx: usize) -> JsonValue {
        row.try_get::<Option<Vec<u8>>, _>(idx)
            .ok()
            .flatten()
            .map(|v| decode_binary_value(&v))
            .unwrap_or(JsonValue::Null)
    }

    /// Text decode, falling back to the raw bytes of the cell.
    fn decode_text(row: &MySqlRow, idx: usize) -> JsonValue {
        match row.try_get::<Option<String>, _>(idx) {
            Ok(Some(v)) => JsonValue::String(v),
            Ok(None) => JsonValue::Null,
            Err(_) => match row.try_get_unchecked::<Option<Vec<u8>>, _>(idx) {
                Ok(Some(bytes)) => match String::from_utf8(bytes) {
                    Ok(s) => JsonValue::String(s),
                    Err(e) => decode_binary_value(e.as_bytes()),
                },
                _ => JsonValue::Null,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blob_and_text_share_code_but_differ() {
        let blob = NativeType::from_type_name("BLOB");
        let text = NativeType::from_type_name("TEXT");
        assert_eq!(blob.code, code::BLOB);
        assert_eq!(text.code, code::BLOB);
        assert_eq!(blob.semantic(), SemanticType::Binary);
        assert_eq!(text.semantic(), SemanticType::Text);
    }

    #[test]
    fn test_number_types() {
        for name in [
            "TINYINT",
            "SMALLINT UNSIGNED",
            "INT",
            "MEDIUMINT",
            "BIGINT UNSIGNED",
            "DECIMAL",
            "FLOAT",
            "DOUBLE",
            "YEAR",
            "BOOLEAN",
        ] {
            assert_eq!(
                NativeType::from_type_name(name).semantic(),
                SemanticType::Number,
                "{name}"
            );
        }
    }

    #[test]
    fn test_date_types() {
        for name in ["DATE", "TIME", "DATETIME", "TIMESTAMP"] {
            assert_eq!(
                NativeType::from_type_name(name).semantic(),
                SemanticType::Date
            );
        }
        assert_eq!(
            semantic_type(NativeType::text(code::DATETIME2)),
            SemanticType::Date
        );
    }

    #[test]
    fn test_bit_is_boolean() {
        assert_eq!(
            NativeType::from_type_name("BIT").semantic(),
            SemanticType::Boolean
        );
    }

    #[test]
    fn test_string_types_follow_charset() {
        assert_eq!(
            NativeType::from_type_name("VARCHAR").semantic(),
            SemanticType::Text
        );
        assert_eq!(
            NativeType::from_type_name("VARBINARY").semantic(),
            SemanticType::Binary
        );
        assert_eq!(
            NativeType::from_type_name("CHAR").semantic(),
            SemanticType::Text
        );
        assert_eq!(
            NativeType::from_type_name("BINARY").semantic(),
            SemanticType::Binary
        );
        assert_eq!(
            NativeType::from_type_name("JSON").semantic(),
            SemanticType::Text
        );
        assert_eq!(
            NativeType::from_type_name("ENUM").semantic(),
            SemanticType::Text
        );
    }

    #[test]
    fn test_unknown_codes() {
        assert_eq!(
            semantic_type(NativeType::text(0x42)),
            SemanticType::Unknown
        );
        assert_eq!(
            semantic_type(NativeType::text(code::NULL)),
            SemanticType::Unknown
        );
        assert_eq!(
            semantic_type(NativeType::text(code::TYPED_ARRAY)),
            SemanticType::Unknown
        );
        assert_eq!(
            NativeType::from_type_name("SOMETHING_NEW").semantic(),
            SemanticType::Unknown
        );
    }

    #[test]
    fn test_mapping_is_total() {
        for c in 0..=u8::MAX {
            // Must not panic for any code, binary or not.
            let _ = semantic_type(NativeType::new(c, false));
            let _ = semantic_type(NativeType::new(c, true));
        }
    }

    #[test]
    fn test_decode_binary_value() {
        assert_eq!(
            decode_binary_value(&[0xff, 0x00, 0x10]),
            JsonValue::String("/wAQ".into())
        );
    }
}
