//! Row materialization.
//!
//! Driver rows are converted into [`ResultRow`] maps (column name to JSON scalar,
//! in column order) using a two-phase approach:
//! 1. `ValueCategory` classifies the column's declared type
//! 2. Backend-specific decoders extract the value

use crate::models::{DatabaseType, ResultRow};
use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use serde_json::Value as JsonValue;
use sqlx::mysql::{MySqlRow, MySqlTypeInfo, MySqlValueRef};
use sqlx::postgres::{PgRow, PgTypeInfo, PgValueRef};
use sqlx::sqlite::SqliteRow;
use sqlx::{Column, Decode, Row, Type, TypeInfo, ValueRef};

// =============================================================================
// Type Classification
// =============================================================================

/// Logical category for database column types.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueCategory {
    Integer,
    Float,
    Decimal,
    Boolean,
    Text,
    Binary,
    Json,
    Temporal,
    Unknown,
}

/// Classify a database type name into a logical category.
pub fn categorize_type(type_name: &str, db: DatabaseType) -> ValueCategory {
    let lower = type_name.to_lowercase();

    // Decimal/Numeric - check first as it overlaps with "numeric" in float checks
    if lower.contains("decimal") || lower.contains("numeric") {
        // SQLite's NUMERIC is actually a float
        if db == DatabaseType::SQLite && lower == "numeric" {
            return ValueCategory::Float;
        }
        return ValueCategory::Decimal;
    }

    if lower == "bool" || lower == "boolean" {
        return ValueCategory::Boolean;
    }

    if lower.starts_with("date") || lower.starts_with("time") {
        return ValueCategory::Temporal;
    }

    if lower == "interval" {
        return ValueCategory::Unknown;
    }

    if lower.contains("int") || lower.contains("serial") || lower.contains("tiny") {
        return ValueCategory::Integer;
    }

    if lower.contains("float")
        || lower.contains("double")
        || lower == "real"
        || lower == "float4"
        || lower == "float8"
    {
        return ValueCategory::Float;
    }

    if lower == "json" || lower == "jsonb" {
        return ValueCategory::Json;
    }

    if lower.contains("blob") || lower.contains("binary") || lower == "bytea" {
        return ValueCategory::Binary;
    }

    if lower.contains("char") || lower.contains("text") {
        return ValueCategory::Text;
    }

    // enums, uuids and anything else decode as text
    ValueCategory::Unknown
}

/// Wrapper type for raw DECIMAL/NUMERIC values as strings.
/// This preserves the exact database representation.
#[derive(Debug)]
pub struct RawDecimal(pub String);

impl Type<sqlx::MySql> for RawDecimal {
    fn type_info() -> MySqlTypeInfo {
        <String as Type<sqlx::MySql>>::type_info()
    }

    fn compatible(ty: &MySqlTypeInfo) -> bool {
        let name = ty.name().to_lowercase();
        name.contains("decimal") || name.contains("numeric")
    }
}

impl<'r> Decode<'r, sqlx::MySql> for RawDecimal {
    fn decode(value: MySqlValueRef<'r>) -> Result<Self, sqlx::error::BoxDynError> {
        let s = <&str as Decode<sqlx::MySql>>::decode(value)?;
        Ok(RawDecimal(s.to_string()))
    }
}

impl Type<sqlx::Postgres> for RawDecimal {
    fn type_info() -> PgTypeInfo {
        <String as Type<sqlx::Postgres>>::type_info()
    }

    fn compatible(ty: &PgTypeInfo) -> bool {
        let name = ty.name().to_lowercase();
        name.contains("numeric") || name.contains("decimal")
    }
}

impl<'r> Decode<'r, sqlx::Postgres> for RawDecimal {
    fn decode(value: PgValueRef<'r>) -> Result<Self, sqlx::error::BoxDynError> {
        let s = <&str as Decode<sqlx::Postgres>>::decode(value)?;
        Ok(RawDecimal(s.to_string()))
    }
}

/// Binary column values are returned base64 encoded.
pub fn encode_binary_value(bytes: &[u8]) -> JsonValue {
    use base64::{Engine as _, engine::general_purpose::STANDARD};
    JsonValue::String(STANDARD.encode(bytes))
}

fn float_value(v: f64) -> JsonValue {
    serde_json::Number::from_f64(v)
        .map(JsonValue::Number)
        .unwrap_or_else(|| JsonValue::String(v.to_string()))
}

/// Insert a column into a row. Column names are unique within a row: a repeated
/// name is keyed `name#<position>` (1-based).
pub fn insert_column(row: &mut ResultRow, name: &str, idx: usize, value: JsonValue) {
    if row.contains_key(name) {
        row.insert(format!("{}#{}", name, idx + 1), value);
    } else {
        row.insert(name.to_string(), value);
    }
}

// =============================================================================
// Row Conversion Trait
// =============================================================================

/// Trait for converting driver rows to result rows.
///
/// SQL NULL becomes JSON null. A value that cannot be decoded as its column's
/// type is an error, never a silent null.
pub trait ToResultRow {
    fn to_result_row(&self) -> Result<ResultRow, sqlx::Error>;
}

macro_rules! impl_to_result_row {
    ($row:ty, $db:expr, $decoder:ident) => {
        impl ToResultRow for $row {
            fn to_result_row(&self) -> Result<ResultRow, sqlx::Error> {
                let mut out = ResultRow::new();
                for (idx, col) in self.columns().iter().enumerate() {
                    let category = categorize_type(col.type_info().name(), $db);
                    let value = $decoder::decode_column(self, idx, category)?;
                    insert_column(&mut out, col.name(), idx, value);
                }
                Ok(out)
            }
        }
    };
}

impl_to_result_row!(MySqlRow, DatabaseType::MySQL, mysql);
impl_to_result_row!(PgRow, DatabaseType::PostgreSQL, postgres);

// SQLite only declares types for table columns, and any column may hold any
// storage class. Expressions such as COUNT(*) carry no declared type, and
// declared types without a fixed storage class (DATETIME, custom names) are
// decoded by the stored value's own type.
impl ToResultRow for SqliteRow {
    fn to_result_row(&self) -> Result<ResultRow, sqlx::Error> {
        let mut out = ResultRow::new();
        for (idx, col) in self.columns().iter().enumerate() {
            let declared = if col.type_info().is_null() {
                ValueCategory::Unknown
            } else {
                categorize_type(col.type_info().name(), DatabaseType::SQLite)
            };
            let category = match declared {
                ValueCategory::Unknown | ValueCategory::Temporal => {
                    let raw = self.try_get_raw(idx)?;
                    if raw.is_null() {
                        ValueCategory::Unknown
                    } else {
                        categorize_type(raw.type_info().name(), DatabaseType::SQLite)
                    }
                }
                other => other,
            };
            let value = sqlite::decode_column(self, idx, category)?;
            insert_column(&mut out, col.name(), idx, value);
        }
        Ok(out)
    }
}

fn or_null<T>(value: Option<T>, f: impl FnOnce(T) -> JsonValue) -> JsonValue {
    value.map(f).unwrap_or(JsonValue::Null)
}

fn int_value<T: Into<serde_json::Number>>(v: T) -> JsonValue {
    JsonValue::Number(v.into())
}

fn display_value<T: ToString>(v: T) -> JsonValue {
    JsonValue::String(v.to_string())
}

// =============================================================================
// Backend-Specific Decoders
// =============================================================================
//
// Where a category spans several Rust types (integer widths, DATE vs
// DATETIME), each is tried in turn and the last mismatch is reported.

mod mysql {
    use super::*;

    pub fn decode_column(
        row: &MySqlRow,
        idx: usize,
        category: ValueCategory,
    ) -> Result<JsonValue, sqlx::Error> {
        match category {
            ValueCategory::Decimal => decode_decimal(row, idx),
            ValueCategory::Integer => decode_integer(row, idx),
            ValueCategory::Boolean => decode_boolean(row, idx),
            ValueCategory::Float => decode_float(row, idx),
            ValueCategory::Binary => decode_binary(row, idx),
            ValueCategory::Json => decode_json(row, idx),
            ValueCategory::Temporal => decode_temporal(row, idx),
            ValueCategory::Text | ValueCategory::Unknown => decode_text(row, idx),
        }
    }

    fn decode_decimal(row: &MySqlRow, idx: usize) -> Result<JsonValue, sqlx::Error> {
        let v = row.try_get::<Option<RawDecimal>, _>(idx)?;
        Ok(or_null(v, |d| JsonValue::String(d.0)))
    }

    fn decode_integer(row: &MySqlRow, idx: usize) -> Result<JsonValue, sqlx::Error> {
        if let Ok(v) = row.try_get::<Option<i8>, _>(idx) {
            return Ok(or_null(v, int_value));
        }
        if let Ok(v) = row.try_get::<Option<i16>, _>(idx) {
            return Ok(or_null(v, int_value));
        }
        if let Ok(v) = row.try_get::<Option<i32>, _>(idx) {
            return Ok(or_null(v, int_value));
        }
        if let Ok(v) = row.try_get::<Option<i64>, _>(idx) {
            return Ok(or_null(v, int_value));
        }
        // unsigned columns
        if let Ok(v) = row.try_get::<Option<u32>, _>(idx) {
            return Ok(or_null(v, int_value));
        }
        let v = row.try_get::<Option<u64>, _>(idx)?;
        Ok(or_null(v, int_value))
    }

    fn decode_boolean(row: &MySqlRow, idx: usize) -> Result<JsonValue, sqlx::Error> {
        let v = row.try_get::<Option<bool>, _>(idx)?;
        Ok(or_null(v, JsonValue::Bool))
    }

    fn decode_float(row: &MySqlRow, idx: usize) -> Result<JsonValue, sqlx::Error> {
        if let Ok(v) = row.try_get::<Option<f64>, _>(idx) {
            return Ok(or_null(v, float_value));
        }
        let v = row.try_get::<Option<f32>, _>(idx)?;
        Ok(or_null(v, |f| float_value(f as f64)))
    }

    fn decode_binary(row: &MySqlRow, idx: usize) -> Result<JsonValue, sqlx::Error> {
        let v = row.try_get::<Option<Vec<u8>>, _>(idx)?;
        Ok(or_null(v, |b| encode_binary_value(&b)))
    }

    fn decode_json(row: &MySqlRow, idx: usize) -> Result<JsonValue, sqlx::Error> {
        let v = row.try_get::<Option<JsonValue>, _>(idx)?;
        Ok(v.unwrap_or(JsonValue::Null))
    }

    fn decode_temporal(row: &MySqlRow, idx: usize) -> Result<JsonValue, sqlx::Error> {
        if let Ok(v) = row.try_get::<Option<NaiveDateTime>, _>(idx) {
            return Ok(or_null(v, display_value));
        }
        if let Ok(v) = row.try_get::<Option<NaiveDate>, _>(idx) {
            return Ok(or_null(v, display_value));
        }
        let v = row.try_get::<Option<NaiveTime>, _>(idx)?;
        Ok(or_null(v, display_value))
    }

    fn decode_text(row: &MySqlRow, idx: usize) -> Result<JsonValue, sqlx::Error> {
        let v = row.try_get::<Option<String>, _>(idx)?;
        Ok(or_null(v, JsonValue::String))
    }
}

mod postgres {
    use super::*;

    pub fn decode_column(
        row: &PgRow,
        idx: usize,
        category: ValueCategory,
    ) -> Result<JsonValue, sqlx::Error> {
        match category {
            ValueCategory::Decimal => decode_decimal(row, idx),
            ValueCategory::Integer => decode_integer(row, idx),
            ValueCategory::Boolean => decode_boolean(row, idx),
            ValueCategory::Float => decode_float(row, idx),
            ValueCategory::Binary => decode_binary(row, idx),
            ValueCategory::Json => decode_json(row, idx),
            ValueCategory::Temporal => decode_temporal(row, idx),
            ValueCategory::Text | ValueCategory::Unknown => decode_text(row, idx),
        }
    }

    fn decode_decimal(row: &PgRow, idx: usize) -> Result<JsonValue, sqlx::Error> {
        let v = row.try_get::<Option<RawDecimal>, _>(idx)?;
        Ok(or_null(v, |d| JsonValue::String(d.0)))
    }

    fn decode_integer(row: &PgRow, idx: usize) -> Result<JsonValue, sqlx::Error> {
        if let Ok(v) = row.try_get::<Option<i16>, _>(idx) {
            return Ok(or_null(v, int_value));
        }
        if let Ok(v) = row.try_get::<Option<i32>, _>(idx) {
            return Ok(or_null(v, int_value));
        }
        let v = row.try_get::<Option<i64>, _>(idx)?;
        Ok(or_null(v, int_value))
    }

    fn decode_boolean(row: &PgRow, idx: usize) -> Result<JsonValue, sqlx::Error> {
        let v = row.try_get::<Option<bool>, _>(idx)?;
        Ok(or_null(v, JsonValue::Bool))
    }

    fn decode_float(row: &PgRow, idx: usize) -> Result<JsonValue, sqlx::Error> {
        if let Ok(v) = row.try_get::<Option<f64>, _>(idx) {
            return Ok(or_null(v, float_value));
        }
        let v = row.try_get::<Option<f32>, _>(idx)?;
        Ok(or_null(v, |f| float_value(f as f64)))
    }

    fn decode_binary(row: &PgRow, idx: usize) -> Result<JsonValue, sqlx::Error> {
        let v = row.try_get::<Option<Vec<u8>>, _>(idx)?;
        Ok(or_null(v, |b| encode_binary_value(&b)))
    }

    fn decode_json(row: &PgRow, idx: usize) -> Result<JsonValue, sqlx::Error> {
        let v = row.try_get::<Option<JsonValue>, _>(idx)?;
        Ok(v.unwrap_or(JsonValue::Null))
    }

    fn decode_temporal(row: &PgRow, idx: usize) -> Result<JsonValue, sqlx::Error> {
        if let Ok(v) = row.try_get::<Option<DateTime<Utc>>, _>(idx) {
            return Ok(or_null(v, |d| JsonValue::String(d.to_rfc3339())));
        }
        if let Ok(v) = row.try_get::<Option<NaiveDateTime>, _>(idx) {
            return Ok(or_null(v, display_value));
        }
        if let Ok(v) = row.try_get::<Option<NaiveDate>, _>(idx) {
            return Ok(or_null(v, display_value));
        }
        let v = row.try_get::<Option<NaiveTime>, _>(idx)?;
        Ok(or_null(v, display_value))
    }

    fn decode_text(row: &PgRow, idx: usize) -> Result<JsonValue, sqlx::Error> {
        let v = row.try_get::<Option<String>, _>(idx)?;
        Ok(or_null(v, JsonValue::String))
    }
}

mod sqlite {
    use super::*;

    pub fn decode_column(
        row: &SqliteRow,
        idx: usize,
        category: ValueCategory,
    ) -> Result<JsonValue, sqlx::Error> {
        match category {
            ValueCategory::Integer => decode_integer(row, idx),
            ValueCategory::Boolean => decode_boolean(row, idx),
            ValueCategory::Float | ValueCategory::Decimal => decode_float(row, idx),
            ValueCategory::Binary => decode_binary(row, idx),
            ValueCategory::Json => decode_json_text(row, idx),
            ValueCategory::Temporal | ValueCategory::Text | ValueCategory::Unknown => {
                decode_text(row, idx)
            }
        }
    }

    fn decode_integer(row: &SqliteRow, idx: usize) -> Result<JsonValue, sqlx::Error> {
        let v = row.try_get::<Option<i64>, _>(idx)?;
        Ok(or_null(v, int_value))
    }

    fn decode_boolean(row: &SqliteRow, idx: usize) -> Result<JsonValue, sqlx::Error> {
        let v = row.try_get::<Option<bool>, _>(idx)?;
        Ok(or_null(v, JsonValue::Bool))
    }

    // REAL affinity columns may still hold integers
    fn decode_float(row: &SqliteRow, idx: usize) -> Result<JsonValue, sqlx::Error> {
        if let Ok(v) = row.try_get::<Option<f64>, _>(idx) {
            return Ok(or_null(v, float_value));
        }
        let v = row.try_get::<Option<i64>, _>(idx)?;
        Ok(or_null(v, |i| float_value(i as f64)))
    }

    fn decode_binary(row: &SqliteRow, idx: usize) -> Result<JsonValue, sqlx::Error> {
        let v = row.try_get::<Option<Vec<u8>>, _>(idx)?;
        Ok(or_null(v, |b| encode_binary_value(&b)))
    }

    // non-JSON text in a JSON column is returned as a plain string
    fn decode_json_text(row: &SqliteRow, idx: usize) -> Result<JsonValue, sqlx::Error> {
        let v = row.try_get::<Option<String>, _>(idx)?;
        Ok(or_null(v, |text| {
            serde_json::from_str(&text).unwrap_or(JsonValue::String(text))
        }))
    }

    fn decode_text(row: &SqliteRow, idx: usize) -> Result<JsonValue, sqlx::Error> {
        let v = row.try_get::<Option<String>, _>(idx)?;
        Ok(or_null(v, JsonValue::String))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_categorize_type_integer() {
        assert_eq!(
            categorize_type("INT", DatabaseType::MySQL),
            ValueCategory::Integer
        );
        assert_eq!(
            categorize_type("BIGINT", DatabaseType::PostgreSQL),
            ValueCategory::Integer
        );
        assert_eq!(
            categorize_type("INTEGER", DatabaseType::SQLite),
            ValueCategory::Integer
        );
    }

    #[test]
    fn test_categorize_type_boolean_before_tinyint() {
        assert_eq!(
            categorize_type("BOOLEAN", DatabaseType::MySQL),
            ValueCategory::Boolean
        );
        assert_eq!(
            categorize_type("TINYINT", DatabaseType::MySQL),
            ValueCategory::Integer
        );
    }

    #[test]
    fn test_categorize_type_temporal() {
        assert_eq!(
            categorize_type("DATETIME", DatabaseType::MySQL),
            ValueCategory::Temporal
        );
        assert_eq!(
            categorize_type("TIMESTAMPTZ", DatabaseType::PostgreSQL),
            ValueCategory::Temporal
        );
        assert_eq!(
            categorize_type("DATE", DatabaseType::SQLite),
            ValueCategory::Temporal
        );
        assert_eq!(
            categorize_type("INTERVAL", DatabaseType::PostgreSQL),
            ValueCategory::Unknown
        );
    }

    #[test]
    fn test_categorize_type_decimal() {
        assert_eq!(
            categorize_type("DECIMAL", DatabaseType::MySQL),
            ValueCategory::Decimal
        );
        // SQLite NUMERIC is a float
        assert_eq!(
            categorize_type("numeric", DatabaseType::SQLite),
            ValueCategory::Float
        );
    }

    #[test]
    fn test_categorize_type_text_and_unknown() {
        assert_eq!(
            categorize_type("VARCHAR", DatabaseType::MySQL),
            ValueCategory::Text
        );
        assert_eq!(
            categorize_type("ENUM", DatabaseType::MySQL),
            ValueCategory::Unknown
        );
        assert_eq!(
            categorize_type("UUID", DatabaseType::PostgreSQL),
            ValueCategory::Unknown
        );
    }

    #[test]
    fn test_encode_binary_value() {
        assert_eq!(
            encode_binary_value(b"hello world"),
            JsonValue::String("aGVsbG8gd29ybGQ=".to_string())
        );
        assert_eq!(encode_binary_value(&[]), JsonValue::String(String::new()));
    }

    #[test]
    fn test_duplicate_column_names_stay_unique() {
        let mut row = ResultRow::new();
        insert_column(&mut row, "id", 0, JsonValue::from(1));
        insert_column(&mut row, "name", 1, JsonValue::from("a"));
        insert_column(&mut row, "id", 2, JsonValue::from(2));

        let keys: Vec<&str> = row.keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["id", "name", "id#3"]);
        assert_eq!(row["id"], JsonValue::from(1));
    }
}
