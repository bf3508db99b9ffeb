//! Tessera Schema Engine
//!
//! Schema model and compatibility resolution for the Tessera serialization
//! format. Writers and readers evolve independently, so the central question
//! this crate answers is: can data written under one schema be read under
//! another?
//!
//! ## Features
//!
//! - **Definition Language**: JSON schema definitions with records, enums,
//!   fixeds, arrays, maps, unions, and namespace-qualified names
//! - **Cyclic Schemas**: named types are registered per document and
//!   referenced by fullname, so self-referential definitions parse and
//!   resolve without special cases
//! - **Compatibility Resolution**: recursive writer/reader matching with
//!   primitive promotion, reader-field defaults, union distribution, and
//!   enum subset rules
//! - **Cycle-Safe Memoization**: results cached under SHA256 fingerprint
//!   pairs, with an in-flight set that terminates reference cycles
//! - **Logical Types**: date and timestamp codecs layered over primitive
//!   wire types, with identity fallback for unknown annotations
//!
//! ## Architecture
//!
//! ```text
//! definition text --parse--> Schema { root node + name registry }
//!                               |
//!                     canonical JSON --SHA256--> Fingerprint
//!                               |
//!        CompatibilityChecker::can_read(writer, reader) -> bool
//!
//! LogicalTypeRegistry::lookup(node) -> codec.encode/decode(Value)
//! ```

pub mod compatibility;
pub mod error;
pub mod fingerprint;
pub mod logical;
pub mod schema;
pub mod value;

pub use compatibility::{match_wire_types, CompatibilityChecker};
pub use error::{LogicalTypeError, Result, SchemaParseError};
pub use fingerprint::Fingerprint;
pub use logical::{
    DateCodec, IdentityCodec, LogicalCodec, LogicalTypeRegistry, TimestampMicrosCodec,
    TimestampMillisCodec,
};
pub use schema::{
    EnumSchema, Field, FixedSchema, Names, PrimitiveKind, PrimitiveSchema, RecordSchema, Schema,
    SchemaName, SchemaNode, UnionSchema,
};
pub use value::Value;
