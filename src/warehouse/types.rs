//! Result-set types and Snowflake value decoding.
//!
//! The SQL API returns every cell as a string (or null) together with a `rowType`
//! describing each column. Decoding happens in two steps:
//! 1. [`TypeCategory`] classifies the Snowflake type name.
//! 2. [`decode_cell`] turns the string into a JSON value for that category.
//!
//! Temporal values always come out as ISO-8601 strings.

use chrono::{DateTime, FixedOffset, NaiveTime, SecondsFormat};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue};

/// A row keyed by column name.
pub type Row = Map<String, JsonValue>;

/// Column metadata as reported by the SQL API (`resultSetMetaData.rowType`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnMeta {
    pub name: String,
    #[serde(rename = "type")]
    pub type_name: String,
    #[serde(default)]
    pub nullable: bool,
    #[serde(default)]
    pub scale: Option<i64>,
    #[serde(default)]
    pub precision: Option<i64>,
}

impl ColumnMeta {
    pub fn new(name: impl Into<String>, type_name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            type_name: type_name.into(),
            nullable: true,
            scale: None,
            precision: None,
        }
    }

    pub fn category(&self) -> TypeCategory {
        categorize_type(&self.type_name, self.scale)
    }
}

/// Rows returned by one statement.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ResultSet {
    pub columns: Vec<ColumnMeta>,
    pub rows: Vec<Row>,
}

impl ResultSet {
    pub fn new(columns: Vec<ColumnMeta>, rows: Vec<Row>) -> Self {
        Self { columns, rows }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Decode raw SQL API cells against the column metadata.
    pub fn from_raw(columns: Vec<ColumnMeta>, data: Vec<Vec<Option<String>>>) -> Self {
        let rows = data
            .into_iter()
            .map(|cells| decode_row(&columns, cells))
            .collect();
        Self { columns, rows }
    }

    /// Append more raw partition data.
    pub fn extend_raw(&mut self, data: Vec<Vec<Option<String>>>) {
        let columns = &self.columns;
        self.rows
            .extend(data.into_iter().map(|cells| decode_row(columns, cells)));
    }
}

fn decode_row(columns: &[ColumnMeta], cells: Vec<Option<String>>) -> Row {
    columns
        .iter()
        .zip(cells)
        .map(|(col, cell)| {
            let value = match cell {
                Some(raw) => decode_cell(col.category(), &raw),
                None => JsonValue::Null,
            };
            (col.name.clone(), value)
        })
        .collect()
}

// =============================================================================
// Type Classification
// =============================================================================

/// Logical category for Snowflake column types.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeCategory {
    Integer,
    Decimal,
    Float,
    Boolean,
    Text,
    Binary,
    Json,
    Date,
    Time,
    TimestampNtz,
    TimestampLtz,
    TimestampTz,
    Unknown,
}

/// Classify a SQL API type name. `FIXED` splits on scale.
pub fn categorize_type(type_name: &str, scale: Option<i64>) -> TypeCategory {
    match type_name.to_ascii_lowercase().as_str() {
        "fixed" | "number" | "decimal" | "numeric" => {
            if scale.unwrap_or(0) == 0 {
                TypeCategory::Integer
            } else {
                TypeCategory::Decimal
            }
        }
        "real" | "float" | "double" => TypeCategory::Float,
        "boolean" => TypeCategory::Boolean,
        "text" | "varchar" | "string" | "char" => TypeCategory::Text,
        "binary" | "varbinary" => TypeCategory::Binary,
        "variant" | "object" | "array" | "map" => TypeCategory::Json,
        "date" => TypeCategory::Date,
        "time" => TypeCategory::Time,
        "timestamp_ntz" | "timestamp" | "datetime" => TypeCategory::TimestampNtz,
        "timestamp_ltz" => TypeCategory::TimestampLtz,
        "timestamp_tz" => TypeCategory::TimestampTz,
        _ => TypeCategory::Unknown,
    }
}

// =============================================================================
// Value decoding
// =============================================================================

/// Decode one non-null cell. Values that do not parse for their category are
/// passed through as strings.
pub fn decode_cell(category: TypeCategory, raw: &str) -> JsonValue {
    let decoded = match category {
        TypeCategory::Integer => raw.parse::<i64>().ok().map(JsonValue::from),
        TypeCategory::Float => raw
            .parse::<f64>()
            .ok()
            .and_then(serde_json::Number::from_f64)
            .map(JsonValue::Number),
        TypeCategory::Boolean => match raw.to_ascii_lowercase().as_str() {
            "true" | "1" => Some(JsonValue::Bool(true)),
            "false" | "0" => Some(JsonValue::Bool(false)),
            _ => None,
        },
        TypeCategory::Json => serde_json::from_str(raw).ok(),
        TypeCategory::Date => decode_date(raw),
        TypeCategory::Time => decode_time(raw),
        TypeCategory::TimestampNtz => decode_timestamp_ntz(raw),
        TypeCategory::TimestampLtz => decode_timestamp_ltz(raw),
        TypeCategory::TimestampTz => decode_timestamp_tz(raw),
        // Decimals stay strings to keep their precision.
        TypeCategory::Decimal
        | TypeCategory::Text
        | TypeCategory::Binary
        | TypeCategory::Unknown => None,
    };
    decoded.unwrap_or_else(|| JsonValue::String(raw.to_string()))
}

/// Split `"<secs>.<fraction>"` into whole seconds and nanoseconds, normalized so
/// that nanoseconds are non-negative.
fn parse_epoch(raw: &str) -> Option<(i64, u32)> {
    let (whole, frac) = match raw.split_once('.') {
        Some((w, f)) => (w, f),
        None => (raw, ""),
    };
    let secs: i64 = whole.parse().ok()?;
    let nanos: u32 = if frac.is_empty() {
        0
    } else {
        let digits: String = frac.chars().take(9).collect();
        format!("{:0<9}", digits).parse().ok()?
    };
    if whole.starts_with('-') && nanos > 0 {
        Some((secs - 1, 1_000_000_000 - nanos))
    } else {
        Some((secs, nanos))
    }
}

fn decode_date(raw: &str) -> Option<JsonValue> {
    let days: i64 = raw.parse().ok()?;
    let date = DateTime::from_timestamp(days.checked_mul(86_400)?, 0)?.date_naive();
    Some(JsonValue::String(date.format("%Y-%m-%d").to_string()))
}

fn decode_time(raw: &str) -> Option<JsonValue> {
    let (secs, nanos) = parse_epoch(raw)?;
    let time = NaiveTime::from_num_seconds_from_midnight_opt(u32::try_from(secs).ok()?, nanos)?;
    Some(JsonValue::String(time.format("%H:%M:%S%.f").to_string()))
}

fn decode_timestamp_ntz(raw: &str) -> Option<JsonValue> {
    let (secs, nanos) = parse_epoch(raw)?;
    let ts = DateTime::from_timestamp(secs, nanos)?.naive_utc();
    Some(JsonValue::String(
        ts.format("%Y-%m-%dT%H:%M:%S%.f").to_string(),
    ))
}

fn decode_timestamp_ltz(raw: &str) -> Option<JsonValue> {
    let (secs, nanos) = parse_epoch(raw)?;
    let ts = DateTime::from_timestamp(secs, nanos)?;
    Some(JsonValue::String(
        ts.to_rfc3339_opts(SecondsFormat::AutoSi, true),
    ))
}

/// `TIMESTAMP_TZ` cells are `"<secs>.<fraction> <offset>"` where the offset is
/// minutes east of UTC plus 1440.
fn decode_timestamp_tz(raw: &str) -> Option<JsonValue> {
    let (epoch, offset) = raw.split_once(' ')?;
    let (secs, nanos) = parse_epoch(epoch)?;
    let offset_minutes: i32 = offset.trim().parse::<i32>().ok()? - 1440;
    let tz = FixedOffset::east_opt(offset_minutes * 60)?;
    let ts = DateTime::from_timestamp(secs, nanos)?.with_timezone(&tz);
    Some(JsonValue::String(
        ts.to_rfc3339_opts(SecondsFormat::AutoSi, false),
    ))
}
