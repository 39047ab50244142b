//! Scalar values and the scalar type system
//!
//! `ScalarType` is the runtime type a column resolves to; `Value` is the
//! value read from an entity column or a storage row.

use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime, NaiveTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize, Serializer};
use serde_json::Value as JsonValue;
use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};

const MICROS_PER_SECOND: i128 = 1_000_000;
const MICROS_PER_MINUTE: i128 = 60 * MICROS_PER_SECOND;
const MICROS_PER_HOUR: i128 = 60 * MICROS_PER_MINUTE;
const MICROS_PER_DAY: i128 = 24 * MICROS_PER_HOUR;

const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";
const TIME_FORMAT: &str = "%H:%M:%S";

/// Runtime scalar types a column can resolve to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ScalarType {
    Bool,
    Integer,
    Float,
    String,
    Bytes,
    Uuid,
    /// Timezone-aware timestamp
    DateTime,
    /// Timestamp without timezone
    Timestamp,
    Date,
    Time,
    Interval,
    Json,
}

impl ScalarType {
    /// Resolve a declared storage type such as `VARCHAR(255)` or
    /// `timestamp with time zone`. Returns `None` for anything unrecognized,
    /// including array types.
    pub fn from_storage_type(declared: &str) -> Option<Self> {
        let normalized = normalize_storage_type(declared);
        if normalized.ends_with("[]") {
            return None;
        }

        let scalar = match normalized.as_str() {
            "BOOL" | "BOOLEAN" => ScalarType::Bool,
            "SMALLINT" | "INT2" | "INTEGER" | "INT" | "INT4" | "BIGINT" | "INT8" | "SMALLSERIAL"
            | "SERIAL" | "SERIAL4" | "BIGSERIAL" | "SERIAL8" => ScalarType::Integer,
            "REAL" | "FLOAT4" | "FLOAT8" | "FLOAT" | "DOUBLE" | "DOUBLE PRECISION" | "NUMERIC"
            | "DECIMAL" => ScalarType::Float,
            "TEXT" | "VARCHAR" | "CHAR" | "CHARACTER" | "CHARACTER VARYING" | "CITEXT"
            | "STRING" | "NAME" => ScalarType::String,
            "BYTEA" | "BLOB" | "BINARY" | "VARBINARY" => ScalarType::Bytes,
            "UUID" => ScalarType::Uuid,
            "TIMESTAMPTZ" | "TIMESTAMP WITH TIME ZONE" => ScalarType::DateTime,
            "TIMESTAMP" | "TIMESTAMP WITHOUT TIME ZONE" | "DATETIME" => ScalarType::Timestamp,
            "DATE" => ScalarType::Date,
            "TIME" | "TIME WITHOUT TIME ZONE" | "TIMETZ" | "TIME WITH TIME ZONE" => ScalarType::Time,
            "INTERVAL" => ScalarType::Interval,
            "JSON" | "JSONB" => ScalarType::Json,
            _ => return None,
        };
        Some(scalar)
    }

    /// Canonical storage type name for this scalar
    pub fn sql_name(self) -> &'static str {
        match self {
            ScalarType::Bool => "BOOLEAN",
            ScalarType::Integer => "BIGINT",
            ScalarType::Float => "DOUBLE PRECISION",
            ScalarType::String => "TEXT",
            ScalarType::Bytes => "BYTEA",
            ScalarType::Uuid => "UUID",
            ScalarType::DateTime => "TIMESTAMPTZ",
            ScalarType::Timestamp => "TIMESTAMP",
            ScalarType::Date => "DATE",
            ScalarType::Time => "TIME",
            ScalarType::Interval => "INTERVAL",
            ScalarType::Json => "JSONB",
        }
    }
}

impl fmt::Display for ScalarType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.sql_name())
    }
}

/// Strip length/precision arguments, collapse whitespace and uppercase.
fn normalize_storage_type(declared: &str) -> String {
    let mut stripped = String::with_capacity(declared.len());
    let mut depth = 0usize;
    for ch in declared.chars() {
        match ch {
            '(' => depth += 1,
            ')' => depth = depth.saturating_sub(1),
            _ if depth == 0 => stripped.push(ch.to_ascii_uppercase()),
            _ => {}
        }
    }
    stripped.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// A scalar value read from an entity or a storage row
#[derive(Debug, Clone)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
    Bytes(Vec<u8>),
    Uuid(uuid::Uuid),
    DateTime(DateTime<Utc>),
    Timestamp(NaiveDateTime),
    Date(NaiveDate),
    Time(NaiveTime),
    Interval(Duration),
    Json(JsonValue),
}

impl Value {
    /// Check if the value is null
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// The scalar type of this value, `None` for null
    pub fn scalar_type(&self) -> Option<ScalarType> {
        let scalar = match self {
            Value::Null => return None,
            Value::Bool(_) => ScalarType::Bool,
            Value::Int(_) => ScalarType::Integer,
            Value::Float(_) => ScalarType::Float,
            Value::String(_) => ScalarType::String,
            Value::Bytes(_) => ScalarType::Bytes,
            Value::Uuid(_) => ScalarType::Uuid,
            Value::DateTime(_) => ScalarType::DateTime,
            Value::Timestamp(_) => ScalarType::Timestamp,
            Value::Date(_) => ScalarType::Date,
            Value::Time(_) => ScalarType::Time,
            Value::Interval(_) => ScalarType::Interval,
            Value::Json(_) => ScalarType::Json,
        };
        Some(scalar)
    }

    /// Normalize for a materialized record: date-times and times become
    /// second-precision text, intervals their canonical text form.
    pub fn normalized(self) -> Value {
        match self {
            Value::DateTime(dt) => Value::String(dt.to_rfc3339_opts(SecondsFormat::Secs, false)),
            Value::Timestamp(ts) => Value::String(ts.format(TIMESTAMP_FORMAT).to_string()),
            Value::Time(t) => Value::String(t.format(TIME_FORMAT).to_string()),
            Value::Interval(d) => Value::String(format_interval(&d)),
            other => other,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            _ => None,
        }
    }

    /// Convert to JSON value
    pub fn to_json(&self) -> JsonValue {
        match self {
            Value::Null => JsonValue::Null,
            Value::Bool(b) => JsonValue::Bool(*b),
            Value::Int(i) => JsonValue::Number((*i).into()),
            Value::Float(f) => serde_json::Number::from_f64(*f)
                .map(JsonValue::Number)
                .unwrap_or(JsonValue::Null),
            Value::String(s) => JsonValue::String(s.clone()),
            Value::Bytes(b) => JsonValue::Array(b.iter().map(|&x| JsonValue::Number(x.into())).collect()),
            Value::Uuid(u) => JsonValue::String(u.to_string()),
            Value::DateTime(dt) => JsonValue::String(dt.to_rfc3339_opts(SecondsFormat::Secs, false)),
            Value::Timestamp(ts) => JsonValue::String(ts.format(TIMESTAMP_FORMAT).to_string()),
            Value::Date(d) => JsonValue::String(d.to_string()),
            Value::Time(t) => JsonValue::String(t.format(TIME_FORMAT).to_string()),
            Value::Interval(d) => JsonValue::String(format_interval(d)),
            Value::Json(j) => j.clone(),
        }
    }

    /// Ordering used when sorting rows; values of different kinds sort by kind.
    pub fn sort_cmp(&self, other: &Value) -> Ordering {
        match (self, other) {
            (Value::Null, Value::Null) => Ordering::Equal,
            (Value::Bool(a), Value::Bool(b)) => a.cmp(b),
            (Value::Int(a), Value::Int(b)) => a.cmp(b),
            (Value::Float(a), Value::Float(b)) => a.total_cmp(b),
            (Value::Int(a), Value::Float(b)) => (*a as f64).total_cmp(b),
            (Value::Float(a), Value::Int(b)) => a.total_cmp(&(*b as f64)),
            (Value::String(a), Value::String(b)) => a.cmp(b),
            (Value::Bytes(a), Value::Bytes(b)) => a.cmp(b),
            (Value::Uuid(a), Value::Uuid(b)) => a.cmp(b),
            (Value::DateTime(a), Value::DateTime(b)) => a.cmp(b),
            (Value::Timestamp(a), Value::Timestamp(b)) => a.cmp(b),
            (Value::Date(a), Value::Date(b)) => a.cmp(b),
            (Value::Time(a), Value::Time(b)) => a.cmp(b),
            (Value::Interval(a), Value::Interval(b)) => a.cmp(b),
            (Value::Json(a), Value::Json(b)) => a.to_string().cmp(&b.to_string()),
            _ => self.rank().cmp(&other.rank()),
        }
    }

    fn rank(&self) -> u8 {
        match self {
            Value::Null => 0,
            Value::Bool(_) => 1,
            Value::Int(_) | Value::Float(_) => 2,
            Value::String(_) => 3,
            Value::Bytes(_) => 4,
            Value::Uuid(_) => 5,
            Value::DateTime(_) => 6,
            Value::Timestamp(_) => 7,
            Value::Date(_) => 8,
            Value::Time(_) => 9,
            Value::Interval(_) => 10,
            Value::Json(_) => 11,
        }
    }
}

// Floats compare by bit pattern so values can key a hash map.
impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => a.to_bits() == b.to_bits(),
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Bytes(a), Value::Bytes(b)) => a == b,
            (Value::Uuid(a), Value::Uuid(b)) => a == b,
            (Value::DateTime(a), Value::DateTime(b)) => a == b,
            (Value::Timestamp(a), Value::Timestamp(b)) => a == b,
            (Value::Date(a), Value::Date(b)) => a == b,
            (Value::Time(a), Value::Time(b)) => a == b,
            (Value::Interval(a), Value::Interval(b)) => a == b,
            (Value::Json(a), Value::Json(b)) => a == b,
            _ => false,
        }
    }
}

impl Eq for Value {}

impl Hash for Value {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.rank().hash(state);
        match self {
            Value::Null => {}
            Value::Bool(b) => b.hash(state),
            Value::Int(i) => i.hash(state),
            Value::Float(f) => f.to_bits().hash(state),
            Value::String(s) => s.hash(state),
            Value::Bytes(b) => b.hash(state),
            Value::Uuid(u) => u.hash(state),
            Value::DateTime(dt) => dt.hash(state),
            Value::Timestamp(ts) => ts.hash(state),
            Value::Date(d) => d.hash(state),
            Value::Time(t) => t.hash(state),
            Value::Interval(d) => d.hash(state),
            // serde_json maps are sorted, so the text form is stable
            Value::Json(j) => j.to_string().hash(state),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "NULL"),
            Value::String(s) => write!(f, "'{}'", s),
            other => write!(f, "{}", other.to_json()),
        }
    }
}

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_json().serialize(serializer)
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Bool(value)
    }
}

impl From<i32> for Value {
    fn from(value: i32) -> Self {
        Value::Int(value.into())
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Int(value)
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::Float(value)
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::String(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::String(value.to_string())
    }
}

impl From<Vec<u8>> for Value {
    fn from(value: Vec<u8>) -> Self {
        Value::Bytes(value)
    }
}

impl From<uuid::Uuid> for Value {
    fn from(value: uuid::Uuid) -> Self {
        Value::Uuid(value)
    }
}

impl From<DateTime<Utc>> for Value {
    fn from(value: DateTime<Utc>) -> Self {
        Value::DateTime(value)
    }
}

impl From<NaiveDateTime> for Value {
    fn from(value: NaiveDateTime) -> Self {
        Value::Timestamp(value)
    }
}

impl From<NaiveDate> for Value {
    fn from(value: NaiveDate) -> Self {
        Value::Date(value)
    }
}

impl From<NaiveTime> for Value {
    fn from(value: NaiveTime) -> Self {
        Value::Time(value)
    }
}

impl From<Duration> for Value {
    fn from(value: Duration) -> Self {
        Value::Interval(value)
    }
}

impl From<JsonValue> for Value {
    fn from(value: JsonValue) -> Self {
        Value::Json(value)
    }
}

impl<T> From<Option<T>> for Value
where
    T: Into<Value>,
{
    fn from(value: Option<T>) -> Self {
        match value {
            Some(v) => v.into(),
            None => Value::Null,
        }
    }
}

fn total_micros(duration: &Duration) -> i128 {
    duration.num_seconds() as i128 * MICROS_PER_SECOND + (duration.subsec_nanos() / 1_000) as i128
}

/// Format an interval as `[-]D day[s], H:MM:SS[.ffffff]`; the day part is
/// omitted when zero and days carry the sign.
pub fn format_interval(duration: &Duration) -> String {
    let micros = total_micros(duration);
    let days = micros.div_euclid(MICROS_PER_DAY);
    let rest = micros.rem_euclid(MICROS_PER_DAY);

    let hours = rest / MICROS_PER_HOUR;
    let minutes = (rest / MICROS_PER_MINUTE) % 60;
    let seconds = (rest / MICROS_PER_SECOND) % 60;
    let fraction = rest % MICROS_PER_SECOND;

    let mut out = String::new();
    if days != 0 {
        let unit = if days.abs() == 1 { "day" } else { "days" };
        out.push_str(&format!("{} {}, ", days, unit));
    }
    out.push_str(&format!("{}:{:02}:{:02}", hours, minutes, seconds));
    if fraction != 0 {
        out.push_str(&format!(".{:06}", fraction));
    }
    out
}

/// Parse the text produced by [`format_interval`].
pub fn parse_interval(text: &str) -> Option<Duration> {
    let text = text.trim();
    let (days, clock) = match text.split_once(", ") {
        Some((day_part, clock)) => {
            let mut parts = day_part.split_whitespace();
            let days: i128 = parts.next()?.parse().ok()?;
            match parts.next()? {
                "day" | "days" => {}
                _ => return None,
            }
            (days, clock)
        }
        None => (0, text),
    };

    let (whole, fraction) = match clock.split_once('.') {
        Some((whole, fraction)) if fraction.len() <= 6 && !fraction.is_empty() => {
            let padded = format!("{:0<6}", fraction);
            (whole, padded.parse::<i128>().ok()?)
        }
        Some(_) => return None,
        None => (clock, 0),
    };

    let mut fields = whole.split(':');
    let hours: i128 = fields.next()?.parse().ok()?;
    let minutes: i128 = fields.next()?.parse().ok()?;
    let seconds: i128 = fields.next()?.parse().ok()?;
    if fields.next().is_some() || minutes >= 60 || seconds >= 60 || hours < 0 {
        return None;
    }

    let micros = days * MICROS_PER_DAY
        + hours * MICROS_PER_HOUR
        + minutes * MICROS_PER_MINUTE
        + seconds * MICROS_PER_SECOND
        + fraction;
    i64::try_from(micros).ok().map(Duration::microseconds)
}

pub(crate) fn parse_datetime(text: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(text)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

pub(crate) fn parse_timestamp(text: &str) -> Option<NaiveDateTime> {
    NaiveDateTime::parse_from_str(text, "%Y-%m-%dT%H:%M:%S%.f")
        .or_else(|_| NaiveDateTime::parse_from_str(text, "%Y-%m-%d %H:%M:%S%.f"))
        .ok()
}

pub(crate) fn parse_time(text: &str) -> Option<NaiveTime> {
    NaiveTime::parse_from_str(text, "%H:%M:%S%.f").ok()
}

pub(crate) fn parse_date(text: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(text, "%Y-%m-%d").ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use std::collections::HashSet;

    #[test]
    fn test_storage_type_resolution() {
        assert_eq!(ScalarType::from_storage_type("INTEGER"), Some(ScalarType::Integer));
        assert_eq!(ScalarType::from_storage_type("varchar(255)"), Some(ScalarType::String));
        assert_eq!(ScalarType::from_storage_type("NUMERIC(10, 2)"), Some(ScalarType::Float));
        assert_eq!(
            ScalarType::from_storage_type("timestamp(3) with time zone"),
            Some(ScalarType::DateTime)
        );
        assert_eq!(ScalarType::from_storage_type("TIMESTAMP"), Some(ScalarType::Timestamp));
        assert_eq!(ScalarType::from_storage_type("  character   varying "), Some(ScalarType::String));
        assert_eq!(ScalarType::from_storage_type("jsonb"), Some(ScalarType::Json));
    }

    #[test]
    fn test_unrecognized_storage_types() {
        assert_eq!(ScalarType::from_storage_type("GEOMETRY"), None);
        assert_eq!(ScalarType::from_storage_type("INTEGER[]"), None);
        assert_eq!(ScalarType::from_storage_type(""), None);
    }

    #[test]
    fn test_datetime_normalization_truncates_to_seconds() {
        let dt = Utc.with_ymd_and_hms(2024, 3, 1, 10, 15, 30).unwrap() + Duration::milliseconds(789);
        assert_eq!(
            Value::DateTime(dt).normalized(),
            Value::String("2024-03-01T10:15:30+00:00".to_string())
        );

        let ts = NaiveDate::from_ymd_opt(2024, 3, 1)
            .unwrap()
            .and_hms_micro_opt(8, 0, 5, 120)
            .unwrap();
        assert_eq!(
            Value::Timestamp(ts).normalized(),
            Value::String("2024-03-01T08:00:05".to_string())
        );

        let t = NaiveTime::from_hms_milli_opt(23, 59, 58, 999).unwrap();
        assert_eq!(Value::Time(t).normalized(), Value::String("23:59:58".to_string()));
    }

    #[test]
    fn test_non_temporal_values_pass_through() {
        let date = NaiveDate::from_ymd_opt(2020, 1, 2).unwrap();
        assert_eq!(Value::Date(date).normalized(), Value::Date(date));
        assert_eq!(Value::Int(7).normalized(), Value::Int(7));
        assert_eq!(Value::from("x").normalized(), Value::from("x"));
    }

    #[test]
    fn test_interval_formatting() {
        assert_eq!(format_interval(&Duration::seconds(0)), "0:00:00");
        assert_eq!(format_interval(&Duration::seconds(3_723)), "1:02:03");
        assert_eq!(format_interval(&(Duration::days(1) + Duration::seconds(5))), "1 day, 0:00:05");
        assert_eq!(format_interval(&Duration::days(3)), "3 days, 0:00:00");
        assert_eq!(format_interval(&Duration::milliseconds(1_500)), "0:00:01.500000");
        assert_eq!(format_interval(&Duration::seconds(-1)), "-1 day, 23:59:59");
    }

    #[test]
    fn test_interval_parse_inverts_format() {
        for duration in [
            Duration::seconds(0),
            Duration::seconds(86_399),
            Duration::days(2) + Duration::microseconds(250),
            Duration::seconds(-90),
        ] {
            let text = format_interval(&duration);
            assert_eq!(parse_interval(&text), Some(duration), "round trip of {}", text);
        }
        assert_eq!(parse_interval("1 week, 0:00:00"), None);
        assert_eq!(parse_interval("1:75:00"), None);
    }

    #[test]
    fn test_values_usable_as_hash_keys() {
        let mut set = HashSet::new();
        set.insert(Value::Int(1));
        set.insert(Value::Int(1));
        set.insert(Value::Float(1.0));
        set.insert(Value::from("1"));
        assert_eq!(set.len(), 3);
    }

    #[test]
    fn test_sort_cmp_orders_numbers_across_kinds() {
        assert_eq!(Value::Int(2).sort_cmp(&Value::Float(2.5)), Ordering::Less);
        assert_eq!(Value::Null.sort_cmp(&Value::Int(0)), Ordering::Less);
        assert_eq!(Value::from("b").sort_cmp(&Value::from("a")), Ordering::Greater);
    }

    #[test]
    fn test_to_json() {
        assert_eq!(Value::Int(5).to_json(), serde_json::json!(5));
        assert_eq!(Value::Float(f64::NAN).to_json(), JsonValue::Null);
        assert_eq!(Value::from(Some("a")).to_json(), serde_json::json!("a"));
        assert_eq!(Value::from(None::<i64>).to_json(), JsonValue::Null);
    }
}
