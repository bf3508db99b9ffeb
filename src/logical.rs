//! Logical type codecs
//!
//! A logical type refines a primitive wire type with richer host-side
//! semantics: calendar dates ride on `int`, timestamps on `long`. The
//! [`LogicalTypeRegistry`] maps (base type, logical type) pairs to codecs.
//! Unregistered pairs and unannotated schemas fall through to the identity
//! codec, so an unknown future logical type never prevents reading the
//! underlying primitive.

use std::collections::HashMap;

use chrono::{DateTime, Duration, NaiveDate};

use crate::error::LogicalTypeError;
use crate::schema::SchemaNode;
use crate::value::Value;

/// Converts between decoded host values and their primitive wire form
pub trait LogicalCodec: Send + Sync {
    /// Encode a host value into its wire representation
    fn encode(&self, value: Value) -> Result<Value, LogicalTypeError>;

    /// Decode a wire value into its host representation
    fn decode(&self, value: Value) -> Result<Value, LogicalTypeError>;
}

/// 1970-01-01, the zero point for the date and timestamp codecs
fn epoch_date() -> NaiveDate {
    DateTime::UNIX_EPOCH.date_naive()
}

/// Calendar dates as a signed day offset from the Unix epoch on `int`
#[derive(Debug, Clone, Copy)]
pub struct DateCodec;

impl LogicalCodec for DateCodec {
    fn encode(&self, value: Value) -> Result<Value, LogicalTypeError> {
        let Value::Date(date) = value else {
            return Err(LogicalTypeError::UnexpectedValue {
                codec: "date",
                expected: "date",
                found: value.kind_name(),
            });
        };
        let days = date.signed_duration_since(epoch_date()).num_days();
        let days = i32::try_from(days).map_err(|_| LogicalTypeError::DateOutOfRange(days))?;
        Ok(Value::Int(days))
    }

    fn decode(&self, value: Value) -> Result<Value, LogicalTypeError> {
        let Value::Int(days) = value else {
            return Err(LogicalTypeError::UnexpectedValue {
                codec: "date",
                expected: "int",
                found: value.kind_name(),
            });
        };
        let date = epoch_date()
            .checked_add_signed(Duration::days(i64::from(days)))
            .ok_or(LogicalTypeError::DateOutOfRange(i64::from(days)))?;
        Ok(Value::Date(date))
    }
}

/// Instants as milliseconds since the Unix epoch on `long`.
///
/// Encoding truncates sub-millisecond precision. The decode split uses
/// floor division, keeping the subsecond part non-negative, so pre-epoch
/// instants round-trip exactly.
#[derive(Debug, Clone, Copy)]
pub struct TimestampMillisCodec;

impl LogicalCodec for TimestampMillisCodec {
    fn encode(&self, value: Value) -> Result<Value, LogicalTypeError> {
        let Value::Timestamp(instant) = value else {
            return Err(LogicalTypeError::UnexpectedValue {
                codec: "timestamp-millis",
                expected: "timestamp",
                found: value.kind_name(),
            });
        };
        Ok(Value::Long(instant.timestamp_millis()))
    }

    fn decode(&self, value: Value) -> Result<Value, LogicalTypeError> {
        let Value::Long(millis) = value else {
            return Err(LogicalTypeError::UnexpectedValue {
                codec: "timestamp-millis",
                expected: "long",
                found: value.kind_name(),
            });
        };
        let (secs, sub_millis) = (millis.div_euclid(1000), millis.rem_euclid(1000));
        let instant = DateTime::from_timestamp(secs, sub_millis as u32 * 1_000_000).ok_or(
            LogicalTypeError::TimestampOutOfRange {
                value: millis,
                unit: "milliseconds",
            },
        )?;
        Ok(Value::Timestamp(instant))
    }
}

/// Instants as microseconds since the Unix epoch on `long`
#[derive(Debug, Clone, Copy)]
pub struct TimestampMicrosCodec;

impl LogicalCodec for TimestampMicrosCodec {
    fn encode(&self, value: Value) -> Result<Value, LogicalTypeError> {
        let Value::Timestamp(instant) = value else {
            return Err(LogicalTypeError::UnexpectedValue {
                codec: "timestamp-micros",
                expected: "timestamp",
                found: value.kind_name(),
            });
        };
        Ok(Value::Long(instant.timestamp_micros()))
    }

    fn decode(&self, value: Value) -> Result<Value, LogicalTypeError> {
        let Value::Long(micros) = value else {
            return Err(LogicalTypeError::UnexpectedValue {
                codec: "timestamp-micros",
                expected: "long",
                found: value.kind_name(),
            });
        };
        let (secs, sub_micros) = (micros.div_euclid(1_000_000), micros.rem_euclid(1_000_000));
        let instant = DateTime::from_timestamp(secs, sub_micros as u32 * 1_000).ok_or(
            LogicalTypeError::TimestampOutOfRange {
                value: micros,
                unit: "microseconds",
            },
        )?;
        Ok(Value::Timestamp(instant))
    }
}

/// Passes values through unchanged in both directions
#[derive(Debug, Clone, Copy)]
pub struct IdentityCodec;

impl LogicalCodec for IdentityCodec {
    fn encode(&self, value: Value) -> Result<Value, LogicalTypeError> {
        Ok(value)
    }

    fn decode(&self, value: Value) -> Result<Value, LogicalTypeError> {
        Ok(value)
    }
}

static IDENTITY: IdentityCodec = IdentityCodec;

/// Codec lookup table keyed by base type name, then logical type name.
///
/// Construction installs the built-in date and timestamp codecs; `register`
/// can add or overwrite entries before the registry is shared. Lookups
/// never fail: unknown combinations resolve to [`IdentityCodec`].
pub struct LogicalTypeRegistry {
    codecs: HashMap<String, HashMap<String, Box<dyn LogicalCodec>>>,
}

impl LogicalTypeRegistry {
    /// Registry with the built-in codecs installed
    pub fn new() -> Self {
        let mut registry = Self {
            codecs: HashMap::new(),
        };
        registry.register("int", "date", Box::new(DateCodec));
        registry.register("long", "timestamp-millis", Box::new(TimestampMillisCodec));
        registry.register("long", "timestamp-micros", Box::new(TimestampMicrosCodec));
        registry
    }

    /// Add or replace the codec for a (base type, logical type) pair
    pub fn register(
        &mut self,
        base_type: impl Into<String>,
        logical_type: impl Into<String>,
        codec: Box<dyn LogicalCodec>,
    ) {
        self.codecs
            .entry(base_type.into())
            .or_default()
            .insert(logical_type.into(), codec);
    }

    /// Codec for a schema node.
    ///
    /// Falls back to the identity codec when the node carries no logical
    /// type annotation or no codec is registered for the pair. Named
    /// references should be resolved through their document first; an
    /// unresolved reference gets the identity codec.
    pub fn lookup(&self, schema: &SchemaNode) -> &dyn LogicalCodec {
        let (base_type, logical_type) = match schema {
            SchemaNode::Primitive(p) => (p.kind().as_str(), p.logical_type()),
            SchemaNode::Fixed(f) => ("fixed", f.logical_type()),
            _ => return &IDENTITY,
        };
        logical_type
            .and_then(|logical| self.codecs.get(base_type)?.get(logical))
            .map(|codec| codec.as_ref())
            .unwrap_or(&IDENTITY)
    }
}

impl Default for LogicalTypeRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::Schema;
    use chrono::{TimeZone, Utc};

    fn date(year: i32, month: u32, day: u32) -> Value {
        Value::Date(NaiveDate::from_ymd_opt(year, month, day).unwrap())
    }

    #[test]
    fn test_date_epoch_is_day_zero() {
        assert_eq!(DateCodec.encode(date(1970, 1, 1)).unwrap(), Value::Int(0));
        assert_eq!(DateCodec.decode(Value::Int(0)).unwrap(), date(1970, 1, 1));
    }

    #[test]
    fn test_date_round_trip() {
        let day = date(2024, 5, 17);
        let wire = DateCodec.encode(day.clone()).unwrap();
        assert_eq!(DateCodec.decode(wire).unwrap(), day);
    }

    #[test]
    fn test_date_before_epoch() {
        assert_eq!(DateCodec.encode(date(1969, 12, 31)).unwrap(), Value::Int(-1));
        assert_eq!(DateCodec.decode(Value::Int(-1)).unwrap(), date(1969, 12, 31));
        assert_eq!(
            DateCodec.decode(Value::Int(-719_162)).unwrap(),
            date(1, 1, 1)
        );
    }

    #[test]
    fn test_date_rejects_wrong_kind() {
        let err = DateCodec.encode(Value::Long(3)).unwrap_err();
        match err {
            LogicalTypeError::UnexpectedValue { codec, found, .. } => {
                assert_eq!(codec, "date");
                assert_eq!(found, "long");
            }
            other => panic!("Expected UnexpectedValue, got {:?}", other),
        }
        assert!(DateCodec.decode(Value::String("1970-01-01".into())).is_err());
    }

    #[test]
    fn test_timestamp_millis_truncates() {
        let instant = Value::Timestamp(Utc.timestamp_opt(123, 456_789_000).unwrap());
        assert_eq!(
            TimestampMillisCodec.encode(instant).unwrap(),
            Value::Long(123_456)
        );
    }

    #[test]
    fn test_timestamp_millis_before_epoch_round_trips() {
        // one millisecond before the epoch
        let instant = Utc.timestamp_opt(-1, 999_000_000).unwrap();
        let wire = TimestampMillisCodec
            .encode(Value::Timestamp(instant))
            .unwrap();
        assert_eq!(wire, Value::Long(-1));
        assert_eq!(
            TimestampMillisCodec.decode(wire).unwrap(),
            Value::Timestamp(instant)
        );
    }

    #[test]
    fn test_timestamp_micros_round_trip() {
        let instant = Utc.timestamp_opt(86_400, 123_456_000).unwrap();
        let wire = TimestampMicrosCodec
            .encode(Value::Timestamp(instant))
            .unwrap();
        assert_eq!(wire, Value::Long(86_400_123_456));
        assert_eq!(
            TimestampMicrosCodec.decode(wire).unwrap(),
            Value::Timestamp(instant)
        );
    }

    #[test]
    fn test_lookup_finds_builtin_codecs() {
        let registry = LogicalTypeRegistry::new();
        let schema = Schema::parse(r#"{"type": "int", "logicalType": "date"}"#).unwrap();
        let codec = registry.lookup(schema.root());
        assert_eq!(codec.decode(Value::Int(0)).unwrap(), date(1970, 1, 1));
    }

    #[test]
    fn test_lookup_falls_back_to_identity() {
        let registry = LogicalTypeRegistry::new();

        // unknown logical type on a known base type
        let unknown =
            Schema::parse(r#"{"type": "int", "logicalType": "unknown-future-type"}"#).unwrap();
        let codec = registry.lookup(unknown.root());
        assert_eq!(codec.decode(Value::Int(42)).unwrap(), Value::Int(42));

        // no annotation at all
        let plain = Schema::parse(r#""long""#).unwrap();
        let codec = registry.lookup(plain.root());
        assert_eq!(codec.encode(Value::Long(7)).unwrap(), Value::Long(7));
    }

    #[test]
    fn test_lookup_on_annotated_fixed() {
        let registry = LogicalTypeRegistry::new();
        let schema = Schema::parse(
            r#"{"type": "fixed", "name": "Span", "size": 12, "logicalType": "duration"}"#,
        )
        .unwrap();
        let node = schema.resolve(schema.root()).unwrap();
        let codec = registry.lookup(node);
        let raw = Value::Bytes(vec![0; 12]);
        assert_eq!(codec.decode(raw.clone()).unwrap(), raw);
    }

    #[test]
    fn test_register_overrides_builtin() {
        let mut registry = LogicalTypeRegistry::new();
        registry.register("int", "date", Box::new(IdentityCodec));
        let schema = Schema::parse(r#"{"type": "int", "logicalType": "date"}"#).unwrap();
        let codec = registry.lookup(schema.root());
        assert_eq!(codec.decode(Value::Int(5)).unwrap(), Value::Int(5));
    }
}
