//! Literal values used as column defaults, and the helpers dialects share to
//! escape them.

use std::fmt::{self, Write as _};
use std::str::FromStr;
use std::sync::Arc;

use chrono::{DateTime, FixedOffset, Local, Offset as _, SecondsFormat, Utc};

use crate::dialect::Dialect;
use crate::error::SyncError;
use crate::schema::{ColumnDescriptor, ColumnType};

/// A default computed by the dialect when DDL is rendered.
#[derive(Clone)]
pub struct Generator(Arc<dyn Fn(&dyn Dialect) -> String + Send + Sync>);

impl Generator {
    /// Wraps a rendering function.
    pub fn new<F>(render: F) -> Self
    where
        F: Fn(&dyn Dialect) -> String + Send + Sync + 'static,
    {
        Self(Arc::new(render))
    }

    /// Renders the SQL expression for a dialect.
    #[must_use]
    pub fn render(&self, dialect: &dyn Dialect) -> String {
        (self.0)(dialect)
    }
}

impl fmt::Debug for Generator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Generator(..)")
    }
}

impl PartialEq for Generator {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

/// A value that can be rendered as a SQL literal.
#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    /// SQL NULL.
    Null,
    /// Boolean.
    Bool(bool),
    /// Integer.
    Int(i64),
    /// Floating point. Non-finite values render as quoted text.
    Float(f64),
    /// String.
    Text(String),
    /// Raw bytes.
    Bytes(Vec<u8>),
    /// Point in time, rendered in the configured time zone.
    Timestamp(DateTime<Utc>),
    /// Parenthesized list of literals.
    List(Vec<Literal>),
    /// Dialect-rendered expression, emitted verbatim.
    Generated(Generator),
}

impl Literal {
    /// The dialect's current timestamp expression.
    #[must_use]
    pub fn current_timestamp() -> Self {
        Self::Generated(Generator::new(|dialect| dialect.now().to_string()))
    }

    /// Compares a declared default against the default read back from the
    /// database for `column`.
    ///
    /// Introspection reports defaults as text. A dialect that stores a
    /// constant in canonical form spells it through
    /// [`Dialect::catalog_default`]; otherwise booleans match `1`/`0` and
    /// `true`/`false` spellings, numbers match numerically, JSON matches
    /// structurally and generated expressions match case-insensitively.
    #[must_use]
    pub fn matches_live(
        &self,
        live: Option<&Self>,
        column: &ColumnDescriptor,
        dialect: &dyn Dialect,
    ) -> bool {
        match live {
            None => matches!(self, Self::Null),
            Some(Self::Text(raw)) => match dialect.catalog_default(column, self) {
                Some(expected) => expected == *raw,
                None => self.matches_text(raw, column, dialect),
            },
            Some(other) => self == other,
        }
    }

    fn matches_text(&self, raw: &str, column: &ColumnDescriptor, dialect: &dyn Dialect) -> bool {
        match self {
            Self::Null => raw.eq_ignore_ascii_case("null"),
            Self::Bool(expected) => match raw.to_ascii_lowercase().as_str() {
                "1" | "true" | "t" | "b'1'" => *expected,
                "0" | "false" | "f" | "b'0'" => !*expected,
                _ => false,
            },
            Self::Int(expected) => raw
                .parse::<i64>()
                .map(|value| value == *expected)
                .or_else(|_| raw.parse::<f64>().map(|value| value == *expected as f64))
                .unwrap_or(false),
            Self::Float(expected) => raw
                .parse::<f64>()
                .is_ok_and(|value| floats_match(value, *expected)),
            Self::Text(expected) => match column.column_type {
                ColumnType::Json => json_matches(expected, raw),
                ColumnType::Uuid => expected.eq_ignore_ascii_case(raw),
                _ => expected == raw,
            },
            Self::Bytes(expected) => {
                raw.eq_ignore_ascii_case(&hex(expected))
                    || String::from_utf8_lossy(expected) == raw
            }
            Self::Timestamp(_) => {
                let rendered = dialect.escape_literal(self, None);
                rendered.trim_matches('\'') == raw
            }
            Self::List(_) => false,
            Self::Generated(generator) => {
                let rendered = generator.render(dialect);
                rendered.eq_ignore_ascii_case(raw)
                    || rendered.eq_ignore_ascii_case(raw.trim_end_matches("()"))
            }
        }
    }
}

/// NaN matches NaN and infinities match by sign; finite values within a
/// relative 1e-6.
fn floats_match(live: f64, expected: f64) -> bool {
    if live.is_nan() || expected.is_nan() {
        return live.is_nan() && expected.is_nan();
    }
    if live.is_infinite() || expected.is_infinite() {
        return live.is_infinite()
            && expected.is_infinite()
            && live.is_sign_negative() == expected.is_sign_negative();
    }
    (live - expected).abs() <= expected.abs().max(1.0) * 1e-6
}

fn json_matches(expected: &str, raw: &str) -> bool {
    match (
        serde_json::from_str::<serde_json::Value>(expected),
        serde_json::from_str::<serde_json::Value>(raw),
    ) {
        (Ok(expected), Ok(live)) => expected == live,
        _ => expected == raw,
    }
}

impl From<bool> for Literal {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<i64> for Literal {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<i32> for Literal {
    fn from(value: i32) -> Self {
        Self::Int(i64::from(value))
    }
}

impl From<f64> for Literal {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

impl From<&str> for Literal {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for Literal {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<Vec<u8>> for Literal {
    fn from(value: Vec<u8>) -> Self {
        Self::Bytes(value)
    }
}

impl From<DateTime<Utc>> for Literal {
    fn from(value: DateTime<Utc>) -> Self {
        Self::Timestamp(value)
    }
}

impl From<serde_json::Value> for Literal {
    fn from(value: serde_json::Value) -> Self {
        use serde_json::Value;

        match value {
            Value::Null => Self::Null,
            Value::Bool(flag) => Self::Bool(flag),
            Value::Number(number) => number
                .as_i64()
                .map_or_else(|| Self::Float(number.as_f64().unwrap_or(f64::NAN)), Self::Int),
            Value::String(text) => Self::Text(text),
            Value::Array(items) => Self::List(items.into_iter().map(Self::from).collect()),
            Value::Object(map) => Self::Text(Value::Object(map).to_string()),
        }
    }
}

/// Time zone used to render timestamp literals.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TimeZone {
    /// The process's local time zone.
    #[default]
    Local,
    /// A fixed offset from UTC.
    Fixed(FixedOffset),
}

impl TimeZone {
    /// UTC.
    #[must_use]
    pub fn utc() -> Self {
        Self::Fixed(Utc.fix())
    }

    /// Converts an instant into this zone.
    #[must_use]
    pub fn localize(&self, instant: &DateTime<Utc>) -> DateTime<FixedOffset> {
        match self {
            Self::Local => instant.with_timezone(&Local).fixed_offset(),
            Self::Fixed(offset) => instant.with_timezone(offset),
        }
    }
}

impl FromStr for TimeZone {
    type Err = SyncError;

    /// Accepts `local`, `Z`, `UTC`, and offsets such as `+01:00`, `-0530` or `+02`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if trimmed.eq_ignore_ascii_case("local") {
            return Ok(Self::Local);
        }
        if trimmed.eq_ignore_ascii_case("z") || trimmed.eq_ignore_ascii_case("utc") {
            return Ok(Self::utc());
        }

        let invalid = || SyncError::InvalidTimeZone(s.to_string());
        let (sign, rest) = match trimmed.as_bytes().first() {
            Some(b'+') => (1, &trimmed[1..]),
            Some(b'-') => (-1, &trimmed[1..]),
            _ => return Err(invalid()),
        };
        let digits: String = rest.chars().filter(|c| *c != ':').collect();
        if digits.is_empty() || digits.len() > 4 || !digits.chars().all(|c| c.is_ascii_digit()) {
            return Err(invalid());
        }
        let (hours, minutes) = if digits.len() > 2 {
            digits.split_at(digits.len() - 2)
        } else {
            (digits.as_str(), "0")
        };
        let hours: i32 = hours.parse().map_err(|_| invalid())?;
        let minutes: i32 = minutes.parse().map_err(|_| invalid())?;
        if minutes >= 60 {
            return Err(invalid());
        }

        FixedOffset::east_opt(sign * (hours * 3600 + minutes * 60))
            .map(Self::Fixed)
            .ok_or_else(invalid)
    }
}

/// Lower-case hexadecimal encoding.
#[must_use]
pub fn hex(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len() * 2);
    for byte in bytes {
        let _ = write!(out, "{byte:02x}");
    }
    out
}

/// `YYYY-MM-DD HH:MM:SS` in the given zone.
#[must_use]
pub fn format_datetime(instant: &DateTime<Utc>, zone: &TimeZone) -> String {
    zone.localize(instant).format("%Y-%m-%d %H:%M:%S").to_string()
}

/// `YYYY-MM-DD` in the given zone.
#[must_use]
pub fn format_date(instant: &DateTime<Utc>, zone: &TimeZone) -> String {
    zone.localize(instant).format("%Y-%m-%d").to_string()
}

/// ISO-8601 with milliseconds; `Z` for UTC, numeric offset otherwise.
#[must_use]
pub fn format_iso8601(instant: &DateTime<Utc>, zone: &TimeZone) -> String {
    zone.localize(instant)
        .to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Text used for non-finite floats.
#[must_use]
pub fn non_finite_label(value: f64) -> &'static str {
    if value.is_nan() {
        "NaN"
    } else if value.is_sign_negative() {
        "-Infinity"
    } else {
        "Infinity"
    }
}

/// Renders a list as `(a, b, c)`, escaping each item with `escape`.
pub fn render_list<F>(items: &[Literal], mut escape: F) -> String
where
    F: FnMut(&Literal) -> String,
{
    let rendered: Vec<String> = items.iter().map(&mut escape).collect();
    format!("({})", rendered.join(", "))
}
