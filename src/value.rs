//! In-memory datum values carried across the wire boundary
//!
//! A [`Value`] is the host-side representation of a single datum. The plain
//! variants map one-to-one onto the primitive wire types; [`Value::Date`] and
//! [`Value::Timestamp`] are the rich views produced and consumed by the
//! logical-type codecs in [`crate::logical`].

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// A single datum, either in wire form or decoded logical form
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Value {
    Null,
    Boolean(bool),
    Int(i32),
    Long(i64),
    Float(f32),
    Double(f64),
    Bytes(Vec<u8>),
    String(String),
    /// Calendar date, the decoded form of an `int` with the `date` logical type
    Date(NaiveDate),
    /// Instant in UTC, the decoded form of a `long` with a timestamp logical type
    Timestamp(DateTime<Utc>),
}

impl Value {
    /// Name of this value's kind, for diagnostics
    pub fn kind_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Boolean(_) => "boolean",
            Value::Int(_) => "int",
            Value::Long(_) => "long",
            Value::Float(_) => "float",
            Value::Double(_) => "double",
            Value::Bytes(_) => "bytes",
            Value::String(_) => "string",
            Value::Date(_) => "date",
            Value::Timestamp(_) => "timestamp",
        }
    }
}
