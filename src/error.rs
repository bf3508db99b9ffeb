//! Error types for schema parsing and logical-type codecs

use thiserror::Error;

/// Result type for schema parsing operations
pub type Result<T> = std::result::Result<T, SchemaParseError>;

/// Errors raised while building a schema graph from a definition.
///
/// These surface only at parse time; once a [`Schema`](crate::Schema) exists
/// it is valid by construction and compatibility checks never error.
#[derive(Error, Debug)]
pub enum SchemaParseError {
    #[error("reference to an unknown type: {0}")]
    UnknownType(String),

    #[error("the name {0} is already in use")]
    DuplicateName(String),

    #[error("unions cannot directly contain other unions")]
    NestedUnion,

    #[error("duplicate branch in union: {0}")]
    DuplicateUnionBranch(String),

    #[error("duplicate field in record {record}: {field}")]
    DuplicateField { record: String, field: String },

    #[error("duplicate symbol in enum {name}: {symbol}")]
    DuplicateSymbol { name: String, symbol: String },

    #[error("missing {attribute} attribute in {context}")]
    MissingAttribute {
        context: &'static str,
        attribute: &'static str,
    },

    #[error("invalid schema definition: {0}")]
    Invalid(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Errors raised by logical-type codecs.
///
/// Schema incompatibility is never an error; these cover codec misuse (a
/// value of the wrong kind) and wire values outside the range the host
/// date/time types can represent.
#[derive(Error, Debug)]
pub enum LogicalTypeError {
    #[error("{codec} codec expected a {expected} value, found {found}")]
    UnexpectedValue {
        codec: &'static str,
        expected: &'static str,
        found: &'static str,
    },

    #[error("day offset {0} is outside the representable calendar range")]
    DateOutOfRange(i64),

    #[error("timestamp of {value} {unit} since epoch is outside the representable range")]
    TimestampOutOfRange { value: i64, unit: &'static str },
}
