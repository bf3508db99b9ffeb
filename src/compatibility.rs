//! Schema compatibility resolution
//!
//! Decides whether data written under one schema can be read under another.
//! The walk is recursive over both schema graphs, memoized under fingerprint
//! pair keys, and cycle-safe: a pair that is already being resolved is
//! assumed compatible, which terminates reference cycles.

use std::collections::{HashMap, HashSet};
use std::sync::{Mutex, PoisonError};

use tracing::{debug, trace};

use crate::fingerprint::Fingerprint;
use crate::schema::{PrimitiveKind, RecordSchema, Schema, SchemaNode};

/// Cache key for one (writer, reader) comparison
type PairKey = (Fingerprint, Fingerprint);

/// Decide whether two schemas are interpretable as the same wire type,
/// before any recursion into children.
///
/// Identical primitive kinds match, as do writer kinds the reader can
/// promote: `int` to `long`, `float`, or `double`; `long` to `float` or
/// `double`; `float` to `double`; `string` and `bytes` interchangeably.
/// Records and enums match on equal fullname, fixeds on equal fullname and
/// size. Arrays match arrays and maps match maps without looking at their
/// children. A union on either side passes unconditionally: distributing
/// over branches is the checker's job, not the predicate's.
///
/// Named references must be resolved through their document before the
/// call; an unresolved reference never matches.
pub fn match_wire_types(writer: &SchemaNode, reader: &SchemaNode) -> bool {
    if matches!(writer, SchemaNode::Union(_)) || matches!(reader, SchemaNode::Union(_)) {
        return true;
    }
    match (writer, reader) {
        (SchemaNode::Primitive(w), SchemaNode::Primitive(r)) => {
            w.kind() == r.kind() || promotes(w.kind(), r.kind())
        }
        (SchemaNode::Record(w), SchemaNode::Record(r)) => w.fullname() == r.fullname(),
        (SchemaNode::Enum(w), SchemaNode::Enum(r)) => w.fullname() == r.fullname(),
        (SchemaNode::Fixed(w), SchemaNode::Fixed(r)) => {
            w.fullname() == r.fullname() && w.size() == r.size()
        }
        (SchemaNode::Array { .. }, SchemaNode::Array { .. }) => true,
        (SchemaNode::Map { .. }, SchemaNode::Map { .. }) => true,
        _ => false,
    }
}

/// Writer-to-reader primitive promotions
fn promotes(writer: PrimitiveKind, reader: PrimitiveKind) -> bool {
    use PrimitiveKind::{Bytes, Double, Float, Int, Long, String};
    matches!(
        (writer, reader),
        (Int, Long | Float | Double)
            | (Long, Float | Double)
            | (Float, Double)
            | (String, Bytes)
            | (Bytes, String)
    )
}

/// Reader kinds whose comparisons are never cached: the check is a plain
/// kind (or fullname and size) match, cheaper than computing the key
fn uncached(reader: &SchemaNode) -> bool {
    matches!(reader, SchemaNode::Primitive(_) | SchemaNode::Fixed(_))
}

/// A schema node paired with the document whose names it resolves against
#[derive(Clone, Copy)]
struct Scoped<'a> {
    node: &'a SchemaNode,
    doc: &'a Schema,
}

impl<'a> Scoped<'a> {
    fn root(doc: &'a Schema) -> Self {
        Self {
            node: doc.root(),
            doc,
        }
    }

    /// Same document, different node
    fn at(self, node: &'a SchemaNode) -> Self {
        Self { node, ..self }
    }

    /// Follow a named reference to its definition
    fn resolved(self) -> Option<Self> {
        self.doc.resolve(self.node).map(|node| Self { node, ..self })
    }

    fn fingerprint(self) -> Fingerprint {
        Fingerprint::from_json(&self.node.canonical_json(self.doc.names()))
    }
}

/// Resolves writer/reader schema compatibility.
///
/// Owns the persistent comparison cache, so one checker instance amortizes
/// repeated questions about the same schema pairs. The checker is shareable
/// across threads; `can_read` takes `&self` and the cache lock is never
/// held across recursion.
pub struct CompatibilityChecker {
    cache: Mutex<HashMap<PairKey, bool>>,
}

impl CompatibilityChecker {
    pub fn new() -> Self {
        Self {
            cache: Mutex::new(HashMap::new()),
        }
    }

    /// True if data written under `writer` can be read using `reader`
    pub fn can_read(&self, writer: &Schema, reader: &Schema) -> bool {
        let mut in_flight = HashSet::new();
        self.check(Scoped::root(writer), Scoped::root(reader), &mut in_flight)
    }

    /// True if each schema can read data written under the other
    pub fn mutual_read(&self, a: &Schema, b: &Schema) -> bool {
        self.can_read(b, a) && self.can_read(a, b)
    }

    /// Drop all memoized comparison results
    pub fn clear_cache(&self) {
        let mut cache = self.cache.lock().unwrap_or_else(PoisonError::into_inner);
        debug!(entries = cache.len(), "clearing compatibility cache");
        cache.clear();
    }

    /// Number of memoized comparison results
    pub fn cached_comparisons(&self) -> usize {
        self.cache
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// One step of the recursive walk: resolve references, consult the
    /// in-flight set and the cache, then match and memoize.
    fn check(
        &self,
        writer: Scoped<'_>,
        reader: Scoped<'_>,
        in_flight: &mut HashSet<PairKey>,
    ) -> bool {
        let Some(writer) = writer.resolved() else {
            return false;
        };
        let Some(reader) = reader.resolved() else {
            return false;
        };

        let key = if uncached(reader.node) {
            None
        } else {
            Some((writer.fingerprint(), reader.fingerprint()))
        };

        if let Some(key) = &key {
            if in_flight.contains(key) {
                // a pair already being resolved is assumed compatible,
                // which terminates reference cycles
                trace!("assuming in-flight schema pair compatible");
                return true;
            }
            let cache = self.cache.lock().unwrap_or_else(PoisonError::into_inner);
            if let Some(&known) = cache.get(key) {
                return known;
            }
            drop(cache);
            in_flight.insert(key.clone());
        }

        let result = self.match_schemas(writer, reader, in_flight);

        if let Some(key) = key {
            self.cache
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .insert(key, result);
        }
        result
    }

    fn match_schemas(
        &self,
        writer: Scoped<'_>,
        reader: Scoped<'_>,
        in_flight: &mut HashSet<PairKey>,
    ) -> bool {
        if !match_wire_types(writer.node, reader.node) {
            return false;
        }

        // the predicate fully decides primitive and fixed readers, unless a
        // union writer still has to distribute over its branches
        if uncached(reader.node) && !matches!(writer.node, SchemaNode::Union(_)) {
            return true;
        }

        match reader.node {
            SchemaNode::Record(target) => self.match_records(writer, reader, target, in_flight),
            SchemaNode::Map { values: wanted } => match writer.node {
                SchemaNode::Map { values: written } => {
                    self.check(writer.at(written), reader.at(wanted), in_flight)
                }
                _ => false,
            },
            SchemaNode::Array { items: wanted } => match writer.node {
                SchemaNode::Array { items: written } => {
                    self.check(writer.at(written), reader.at(wanted), in_flight)
                }
                _ => false,
            },
            SchemaNode::Union(target) => {
                self.match_union(writer, reader, target.branches(), in_flight)
            }
            SchemaNode::Enum(target) => match writer.node {
                SchemaNode::Enum(written) => written
                    .symbols()
                    .iter()
                    .all(|symbol| target.symbols().contains(symbol)),
                _ => false,
            },
            SchemaNode::Primitive(_) | SchemaNode::Fixed(_) => {
                // only a union writer reaches here; a single branch unwraps
                // and retries, anything wider cannot match a plain reader
                match writer.node {
                    SchemaNode::Union(written) if written.branches().len() == 1 => {
                        self.check(writer.at(&written.branches()[0]), reader, in_flight)
                    }
                    _ => false,
                }
            }
            // references are resolved before matching
            SchemaNode::Ref(_) => false,
        }
    }

    /// Every reader field must either recurse successfully against the
    /// same-named writer field or carry a default. Writer-only fields are
    /// ignored.
    fn match_records(
        &self,
        writer: Scoped<'_>,
        reader: Scoped<'_>,
        target: &RecordSchema,
        in_flight: &mut HashSet<PairKey>,
    ) -> bool {
        for field in target.fields() {
            let written = match writer.node {
                SchemaNode::Record(record) => record.field(field.name()),
                // a union writer has no fields; only reader defaults can match
                _ => None,
            };
            let readable = match written {
                Some(written) => {
                    self.check(writer.at(written.schema()), reader.at(field.schema()), in_flight)
                }
                None => field.has_default(),
            };
            if !readable {
                return false;
            }
        }
        true
    }

    /// A union writer must be readable branch by branch against the whole
    /// reader; any other writer needs just one reader branch that accepts it.
    fn match_union(
        &self,
        writer: Scoped<'_>,
        reader: Scoped<'_>,
        branches: &[SchemaNode],
        in_flight: &mut HashSet<PairKey>,
    ) -> bool {
        match writer.node {
            SchemaNode::Union(written) => written
                .branches()
                .iter()
                .all(|branch| self.check(writer.at(branch), reader, in_flight)),
            _ => branches
                .iter()
                .any(|branch| self.check(writer, reader.at(branch), in_flight)),
        }
    }
}

impl Default for CompatibilityChecker {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn schema(definition: &str) -> Schema {
        Schema::parse(definition).unwrap()
    }

    fn readable(writer: &str, reader: &str) -> bool {
        CompatibilityChecker::new().can_read(&schema(writer), &schema(reader))
    }

    #[test]
    fn test_primitives_read_themselves() {
        for name in [
            r#""null""#,
            r#""boolean""#,
            r#""int""#,
            r#""long""#,
            r#""float""#,
            r#""double""#,
            r#""bytes""#,
            r#""string""#,
        ] {
            assert!(readable(name, name), "{} should read itself", name);
        }
    }

    #[test]
    fn test_promotions() {
        assert!(readable(r#""int""#, r#""long""#));
        assert!(readable(r#""int""#, r#""float""#));
        assert!(readable(r#""int""#, r#""double""#));
        assert!(readable(r#""long""#, r#""float""#));
        assert!(readable(r#""long""#, r#""double""#));
        assert!(readable(r#""float""#, r#""double""#));
        assert!(readable(r#""string""#, r#""bytes""#));
        assert!(readable(r#""bytes""#, r#""string""#));

        // promotion is directional
        assert!(!readable(r#""long""#, r#""int""#));
        assert!(!readable(r#""double""#, r#""float""#));
        assert!(!readable(r#""boolean""#, r#""int""#));
        assert!(!readable(r#""int""#, r#""null""#));
    }

    #[test]
    fn test_fixed_matching() {
        let writer = r#"{"type": "fixed", "name": "Digest", "size": 16}"#;
        assert!(readable(writer, r#"{"type": "fixed", "name": "Digest", "size": 16}"#));
        assert!(!readable(writer, r#"{"type": "fixed", "name": "Digest", "size": 32}"#));
        assert!(!readable(writer, r#"{"type": "fixed", "name": "Other", "size": 16}"#));
        assert!(!readable(
            writer,
            r#"{"type": "fixed", "name": "Digest", "namespace": "ns", "size": 16}"#
        ));
    }

    #[test]
    fn test_enum_symbol_subset() {
        let narrow = r#"{"type": "enum", "name": "Suit", "symbols": ["HEART", "SPADE"]}"#;
        let wide = r#"{"type": "enum", "name": "Suit", "symbols": ["HEART", "SPADE", "CLUB"]}"#;
        assert!(readable(narrow, wide));
        assert!(!readable(wide, narrow));

        let other = r#"{"type": "enum", "name": "Rank", "symbols": ["HEART", "SPADE"]}"#;
        assert!(!readable(narrow, other));
    }

    #[test]
    fn test_record_field_defaults() {
        let writer = r#"{"type": "record", "name": "R", "fields": [
            {"name": "a", "type": "int"}
        ]}"#;
        let with_default = r#"{"type": "record", "name": "R", "fields": [
            {"name": "a", "type": "int"},
            {"name": "b", "type": "string", "default": ""}
        ]}"#;
        let without_default = r#"{"type": "record", "name": "R", "fields": [
            {"name": "a", "type": "int"},
            {"name": "b", "type": "string"}
        ]}"#;
        assert!(readable(writer, with_default));
        assert!(!readable(writer, without_default));
    }

    #[test]
    fn test_record_ignores_writer_only_fields() {
        let writer = r#"{"type": "record", "name": "R", "fields": [
            {"name": "a", "type": "int"},
            {"name": "b", "type": "string"}
        ]}"#;
        let reader = r#"{"type": "record", "name": "R", "fields": [
            {"name": "a", "type": "long"}
        ]}"#;
        assert!(readable(writer, reader));
        // the reverse direction needs a default for the dropped field
        assert!(!readable(reader, writer));
    }

    #[test]
    fn test_record_names_must_match() {
        let writer = r#"{"type": "record", "name": "A", "fields": [{"name": "x", "type": "int"}]}"#;
        let reader = r#"{"type": "record", "name": "B", "fields": [{"name": "x", "type": "int"}]}"#;
        assert!(!readable(writer, reader));

        let in_namespace =
            r#"{"type": "record", "name": "ns.A", "fields": [{"name": "x", "type": "int"}]}"#;
        assert!(!readable(writer, in_namespace));
    }

    #[test]
    fn test_union_reader_accepts_member() {
        assert!(readable(r#""string""#, r#"["int", "string"]"#));
        assert!(readable(r#""int""#, r#"["long", "string"]"#));
        assert!(!readable(r#""boolean""#, r#"["int", "string"]"#));
    }

    #[test]
    fn test_union_writer_distributes() {
        assert!(readable(r#"["int", "string"]"#, r#"["string", "long", "int"]"#));
        assert!(!readable(r#"["int", "boolean"]"#, r#"["int", "string"]"#));
        // every writer branch must be readable by the union as a whole
        assert!(readable(r#"["int"]"#, r#"["double"]"#));
    }

    #[test]
    fn test_single_branch_union_writer_unwraps() {
        assert!(readable(r#"["int"]"#, r#""long""#));
        assert!(!readable(r#"["int", "string"]"#, r#""long""#));
        assert!(readable(
            r#"[{"type": "fixed", "name": "F", "size": 4}]"#,
            r#"{"type": "fixed", "name": "F", "size": 4}"#
        ));
    }

    #[test]
    fn test_union_writer_against_record_reader() {
        let all_defaulted = r#"{"type": "record", "name": "R", "fields": [
            {"name": "a", "type": "int", "default": 0}
        ]}"#;
        let bare = r#"{"type": "record", "name": "R", "fields": [
            {"name": "a", "type": "int"}
        ]}"#;
        // a union writer offers no fields, so only defaults can satisfy the reader
        assert!(readable(r#"["int", "string"]"#, all_defaulted));
        assert!(!readable(r#"["int", "string"]"#, bare));
    }

    #[test]
    fn test_map_and_array_recurse_into_children() {
        assert!(readable(
            r#"{"type": "map", "values": "int"}"#,
            r#"{"type": "map", "values": "long"}"#
        ));
        assert!(!readable(
            r#"{"type": "map", "values": "long"}"#,
            r#"{"type": "map", "values": "int"}"#
        ));
        assert!(readable(
            r#"{"type": "array", "items": "string"}"#,
            r#"{"type": "array", "items": "bytes"}"#
        ));
        assert!(!readable(
            r#"{"type": "array", "items": "int"}"#,
            r#"{"type": "map", "values": "int"}"#
        ));
    }

    #[test]
    fn test_self_referential_schema_terminates() {
        let node = r#"{"type": "record", "name": "Node", "fields": [
            {"name": "next", "type": ["null", "Node"]},
            {"name": "value", "type": "int"}
        ]}"#;
        assert!(readable(node, node));
    }

    #[test]
    fn test_mutually_recursive_schemas_terminate() {
        let doc = r#"{"type": "record", "name": "A", "fields": [
            {"name": "b", "type": {"type": "record", "name": "B", "fields": [
                {"name": "a", "type": ["null", "A"]}
            ]}}
        ]}"#;
        assert!(readable(doc, doc));
    }

    #[test]
    fn test_cache_reuse_and_clear() {
        let writer = schema(
            r#"{"type": "record", "name": "R", "fields": [{"name": "a", "type": "int"}]}"#,
        );
        let reader = schema(
            r#"{"type": "record", "name": "R", "fields": [{"name": "a", "type": "long"}]}"#,
        );
        let checker = CompatibilityChecker::new();

        assert!(checker.can_read(&writer, &reader));
        let cached = checker.cached_comparisons();
        assert!(cached > 0);

        // a second call answers from the cache and adds nothing
        assert!(checker.can_read(&writer, &reader));
        assert_eq!(checker.cached_comparisons(), cached);

        checker.clear_cache();
        assert_eq!(checker.cached_comparisons(), 0);
        assert!(checker.can_read(&writer, &reader));
    }

    #[test]
    fn test_primitive_comparisons_are_not_cached() {
        let checker = CompatibilityChecker::new();
        assert!(checker.can_read(&schema(r#""int""#), &schema(r#""long""#)));
        assert_eq!(checker.cached_comparisons(), 0);
    }

    #[test]
    fn test_mutual_read() {
        let a = schema(r#"{"type": "record", "name": "R", "fields": [
            {"name": "x", "type": "int", "default": 1}
        ]}"#);
        let b = schema(r#"{"type": "record", "name": "R", "fields": [
            {"name": "y", "type": "string", "default": ""}
        ]}"#);
        let checker = CompatibilityChecker::new();
        assert!(checker.mutual_read(&a, &b));

        let c = schema(r#"{"type": "record", "name": "R", "fields": [
            {"name": "z", "type": "bytes"}
        ]}"#);
        assert!(!checker.mutual_read(&a, &c));
    }

    #[test]
    fn test_wire_type_predicate_on_unions_and_refs() {
        let union = schema(r#"["int", "string"]"#);
        let int = schema(r#""int""#);
        assert!(match_wire_types(union.root(), int.root()));
        assert!(match_wire_types(int.root(), union.root()));

        // unresolved references never match; resolution is the caller's job
        let record = schema(r#"{"type": "record", "name": "R", "fields": []}"#);
        assert!(matches!(record.root(), SchemaNode::Ref(_)));
        assert!(!match_wire_types(record.root(), record.root()));
        let resolved = record.resolve(record.root()).unwrap();
        assert!(match_wire_types(resolved, resolved));
    }
}
