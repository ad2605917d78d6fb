use std::fmt;
use std::hash::{Hash, Hasher};

use chrono::{DateTime, Duration as Span, FixedOffset, SecondsFormat};

// ---------------------------------------------------------------------------
// Value
// ---------------------------------------------------------------------------

/// A runtime scalar moving through the pipeline.
///
/// `Time` is an absolute instant with its source offset preserved, so a
/// value that round-trips through the engine formats back the way it came
/// in. `Span` exists only as an expression intermediate.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    Time(DateTime<FixedOffset>),
    Span(Span),
}

impl Value {
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Bool(_) => "boolean",
            Self::Int(_) => "integer64",
            Self::Float(_) => "float64",
            Self::Text(_) => "text",
            Self::Time(_) => "timestamp",
            Self::Span(_) => "duration",
        }
    }

    /// Instant in nanoseconds since the Unix epoch.
    ///
    /// Ingress rejects timestamps outside the representable range, so the
    /// saturation below is never hit by values that entered through it.
    pub fn time_nanos(dt: &DateTime<FixedOffset>) -> i64 {
        dt.timestamp_nanos_opt().unwrap_or(i64::MIN)
    }

    /// Hash key for distinct counting. Distinct values map to distinct
    /// keys per type; floats hash by bit pattern.
    pub fn hash_key(&self) -> u64 {
        let mut hasher = std::collections::hash_map::DefaultHasher::new();
        match self {
            Self::Bool(b) => {
                0u8.hash(&mut hasher);
                b.hash(&mut hasher);
            }
            Self::Int(i) => {
                1u8.hash(&mut hasher);
                i.hash(&mut hasher);
            }
            Self::Float(f) => {
                2u8.hash(&mut hasher);
                f.to_bits().hash(&mut hasher);
            }
            Self::Text(s) => {
                3u8.hash(&mut hasher);
                s.hash(&mut hasher);
            }
            Self::Time(t) => {
                4u8.hash(&mut hasher);
                Self::time_nanos(t).hash(&mut hasher);
            }
            Self::Span(d) => {
                5u8.hash(&mut hasher);
                d.num_nanoseconds().hash(&mut hasher);
            }
        }
        hasher.finish()
    }
}

/// Egress and group-key formatting. Instants render as RFC3339 with the
/// original offset; fractional seconds appear only when non-zero.
impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool(b) => write!(f, "{b}"),
            Self::Int(i) => write!(f, "{i}"),
            Self::Float(v) => write!(f, "{v}"),
            Self::Text(s) => f.write_str(s),
            Self::Time(t) => f.write_str(&t.to_rfc3339_opts(SecondsFormat::AutoSi, true)),
            Self::Span(d) => write!(f, "{}ns", d.num_nanoseconds().unwrap_or(0)),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn float_display_drops_trailing_zero() {
        assert_eq!(Value::Float(3.0).to_string(), "3");
        assert_eq!(Value::Float(1.5).to_string(), "1.5");
    }

    #[test]
    fn time_display_preserves_offset() {
        let dt = DateTime::parse_from_rfc3339("2024-01-24T17:00:04-08:00").unwrap();
        assert_eq!(Value::Time(dt).to_string(), "2024-01-24T17:00:04-08:00");
    }

    #[test]
    fn time_display_keeps_nanos() {
        let dt = DateTime::parse_from_rfc3339("2024-01-24T17:00:04.000000123Z").unwrap();
        assert_eq!(
            Value::Time(dt).to_string(),
            "2024-01-24T17:00:04.000000123Z",
        );
    }

    #[test]
    fn hash_keys_distinguish_types_and_values() {
        let a = Value::Int(1).hash_key();
        let b = Value::Int(2).hash_key();
        let c = Value::Float(1.0).hash_key();
        assert_ne!(a, b);
        assert_ne!(a, c);
        assert_eq!(a, Value::Int(1).hash_key());
    }
}
