//! Schema model for the Tessera definition language
//!
//! Parses JSON schema definitions into an immutable graph of [`SchemaNode`]s.
//! Named types (records, enums, fixeds) are defined once in a per-document
//! [`Names`] registry and appear as [`SchemaNode::Ref`] everywhere they are
//! used, so self-referential and mutually recursive schemas need no back
//! pointers; traversals resolve references through the registry one hop at a
//! time.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::str::FromStr;

use serde_json::{json, Map, Value as Json};
use tracing::debug;

use crate::compatibility::CompatibilityChecker;
use crate::error::{Result, SchemaParseError};
use crate::fingerprint::Fingerprint;

// ========== Kinds and names ==========

/// The eight primitive wire types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PrimitiveKind {
    Null,
    Boolean,
    Int,
    Long,
    Float,
    Double,
    Bytes,
    String,
}

impl PrimitiveKind {
    /// The type name as it appears in definitions
    pub fn as_str(&self) -> &'static str {
        match self {
            PrimitiveKind::Null => "null",
            PrimitiveKind::Boolean => "boolean",
            PrimitiveKind::Int => "int",
            PrimitiveKind::Long => "long",
            PrimitiveKind::Float => "float",
            PrimitiveKind::Double => "double",
            PrimitiveKind::Bytes => "bytes",
            PrimitiveKind::String => "string",
        }
    }

    /// Parse a primitive type name
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "null" => Some(PrimitiveKind::Null),
            "boolean" => Some(PrimitiveKind::Boolean),
            "int" => Some(PrimitiveKind::Int),
            "long" => Some(PrimitiveKind::Long),
            "float" => Some(PrimitiveKind::Float),
            "double" => Some(PrimitiveKind::Double),
            "bytes" => Some(PrimitiveKind::Bytes),
            "string" => Some(PrimitiveKind::String),
            _ => None,
        }
    }
}

impl fmt::Display for PrimitiveKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Namespace-qualified name of a record, enum, or fixed schema.
///
/// A dotted declared name supplies its own namespace and overrides both the
/// `namespace` attribute and the enclosing namespace; an undotted name takes
/// the attribute if present and the enclosing namespace otherwise.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SchemaName {
    name: String,
    namespace: Option<String>,
    fullname: String,
}

impl SchemaName {
    /// Resolve a declared name against its `namespace` attribute and the
    /// enclosing namespace
    pub fn new(declared: &str, namespace: Option<&str>, enclosing: Option<&str>) -> Self {
        let (name, namespace) = match declared.rfind('.') {
            Some(split) => (&declared[split + 1..], Some(&declared[..split])),
            None => (declared, namespace.or(enclosing)),
        };
        let namespace = namespace.filter(|ns| !ns.is_empty()).map(String::from);
        let name = name.to_string();
        let fullname = match &namespace {
            Some(ns) => format!("{}.{}", ns, name),
            None => name.clone(),
        };
        Self {
            name,
            namespace,
            fullname,
        }
    }

    /// Short name without the namespace
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Namespace, if any
    pub fn namespace(&self) -> Option<&str> {
        self.namespace.as_deref()
    }

    /// Namespace-qualified name
    pub fn fullname(&self) -> &str {
        &self.fullname
    }

    /// Qualify a referenced name against a namespace. A dotted name is
    /// already qualified; an undotted one inherits the namespace.
    pub fn make_fullname(name: &str, namespace: Option<&str>) -> String {
        match namespace {
            Some(ns) if !ns.is_empty() && !name.contains('.') => format!("{}.{}", ns, name),
            _ => name.to_string(),
        }
    }
}

impl fmt::Display for SchemaName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.fullname)
    }
}

// ========== Schema nodes ==========

/// A primitive wire type, optionally refined by a logical type annotation
#[derive(Debug, Clone)]
pub struct PrimitiveSchema {
    kind: PrimitiveKind,
    logical_type: Option<String>,
}

impl PrimitiveSchema {
    pub fn kind(&self) -> PrimitiveKind {
        self.kind
    }

    /// Logical type annotation, preserved verbatim even when no codec is
    /// registered for it
    pub fn logical_type(&self) -> Option<&str> {
        self.logical_type.as_deref()
    }
}

/// A single record member: a name, a schema, and an optional default
#[derive(Debug, Clone)]
pub struct Field {
    name: String,
    schema: SchemaNode,
    default: Option<Json>,
}

impl Field {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn schema(&self) -> &SchemaNode {
        &self.schema
    }

    /// Declared default value, if any. An explicit `"default": null` counts
    /// as a declared default.
    pub fn default(&self) -> Option<&Json> {
        self.default.as_ref()
    }

    pub fn has_default(&self) -> bool {
        self.default.is_some()
    }
}

/// A named product type with ordered fields
#[derive(Debug, Clone)]
pub struct RecordSchema {
    name: SchemaName,
    fields: Vec<Field>,
}

impl RecordSchema {
    pub fn name(&self) -> &str {
        self.name.name()
    }

    pub fn namespace(&self) -> Option<&str> {
        self.name.namespace()
    }

    pub fn fullname(&self) -> &str {
        self.name.fullname()
    }

    /// Fields in declaration order
    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    /// Look up a field by name
    pub fn field(&self, name: &str) -> Option<&Field> {
        self.fields.iter().find(|field| field.name == name)
    }
}

/// A named enumeration of string symbols
#[derive(Debug, Clone)]
pub struct EnumSchema {
    name: SchemaName,
    symbols: Vec<String>,
}

impl EnumSchema {
    pub fn name(&self) -> &str {
        self.name.name()
    }

    pub fn namespace(&self) -> Option<&str> {
        self.name.namespace()
    }

    pub fn fullname(&self) -> &str {
        self.name.fullname()
    }

    /// Symbols in declaration order
    pub fn symbols(&self) -> &[String] {
        &self.symbols
    }
}

/// A named byte sequence of fixed length
#[derive(Debug, Clone)]
pub struct FixedSchema {
    name: SchemaName,
    size: u64,
    logical_type: Option<String>,
}

impl FixedSchema {
    pub fn name(&self) -> &str {
        self.name.name()
    }

    pub fn namespace(&self) -> Option<&str> {
        self.name.namespace()
    }

    pub fn fullname(&self) -> &str {
        self.name.fullname()
    }

    /// Length in bytes
    pub fn size(&self) -> u64 {
        self.size
    }

    pub fn logical_type(&self) -> Option<&str> {
        self.logical_type.as_deref()
    }
}

/// An ordered list of alternative schemas
#[derive(Debug, Clone)]
pub struct UnionSchema {
    branches: Vec<SchemaNode>,
}

impl UnionSchema {
    /// Branches in declaration order
    pub fn branches(&self) -> &[SchemaNode] {
        &self.branches
    }
}

/// A single node in a schema graph.
///
/// Named types appear as [`SchemaNode::Ref`] wherever they are used,
/// including their defining occurrence; the definitions themselves live in
/// the document's [`Names`] registry.
#[derive(Debug, Clone)]
pub enum SchemaNode {
    /// A primitive wire type
    Primitive(PrimitiveSchema),
    /// A record with named fields
    Record(RecordSchema),
    /// An enumeration of symbols
    Enum(EnumSchema),
    /// A fixed-size byte sequence
    Fixed(FixedSchema),
    /// One of several alternative schemas
    Union(UnionSchema),
    /// A homogeneous list
    Array { items: Box<SchemaNode> },
    /// A string-keyed map with homogeneous values
    Map { values: Box<SchemaNode> },
    /// A reference to a named type, resolved through [`Names`]
    Ref(String),
}

impl SchemaNode {
    /// Canonical JSON of this node, expanding each named type at its first
    /// occurrence and referencing it by fullname afterwards
    pub fn canonical_json(&self, names: &Names) -> Json {
        render(self, names, &mut HashSet::new())
    }
}

/// Named type definitions of a single document, indexed by fullname
#[derive(Debug, Clone, Default)]
pub struct Names {
    defined: HashMap<String, SchemaNode>,
}

impl Names {
    /// Look up a definition by fullname
    pub fn get(&self, fullname: &str) -> Option<&SchemaNode> {
        self.defined.get(fullname)
    }

    pub fn contains(&self, fullname: &str) -> bool {
        self.defined.contains_key(fullname)
    }

    /// Number of named types in the document
    pub fn len(&self) -> usize {
        self.defined.len()
    }

    pub fn is_empty(&self) -> bool {
        self.defined.is_empty()
    }
}

// ========== Documents ==========

/// A parsed schema document: a root node plus the named types it declares.
///
/// Documents are immutable once parsed. Everything a traversal needs, the
/// root and the [`Names`] registry, travels together here.
#[derive(Debug, Clone)]
pub struct Schema {
    root: SchemaNode,
    names: Names,
}

impl Schema {
    /// Parse a JSON schema definition
    pub fn parse(input: &str) -> Result<Self> {
        let json: Json = serde_json::from_str(input)?;
        let mut ctx = ParseContext::default();
        let root = parse_node(&json, &mut ctx, None)?;
        let names = ctx.finish();
        debug!(named_types = names.len(), "parsed schema definition");
        Ok(Self { root, names })
    }

    /// The root node of the document
    pub fn root(&self) -> &SchemaNode {
        &self.root
    }

    /// The named types declared by the document
    pub fn names(&self) -> &Names {
        &self.names
    }

    /// Follow a named reference to its definition; any other node resolves
    /// to itself
    pub fn resolve<'a>(&'a self, node: &'a SchemaNode) -> Option<&'a SchemaNode> {
        match node {
            SchemaNode::Ref(fullname) => self.names.get(fullname),
            other => Some(other),
        }
    }

    /// Canonical JSON of the whole document
    pub fn canonical_json(&self) -> Json {
        self.root.canonical_json(&self.names)
    }

    /// Content-derived identity: the SHA256 digest of the canonical form
    pub fn fingerprint(&self) -> Fingerprint {
        Fingerprint::from_json(&self.canonical_json())
    }

    /// True if data written under `writer` can be read using this schema
    pub fn reads_from(&self, writer: &Schema) -> bool {
        CompatibilityChecker::new().can_read(writer, self)
    }

    /// True if data written under this schema can be read using `reader`
    pub fn is_read_by(&self, reader: &Schema) -> bool {
        CompatibilityChecker::new().can_read(self, reader)
    }

    /// True if each schema can read data written under the other
    pub fn mutual_read(&self, other: &Schema) -> bool {
        CompatibilityChecker::new().mutual_read(self, other)
    }
}

impl FromStr for Schema {
    type Err = SchemaParseError;

    fn from_str(input: &str) -> Result<Self> {
        Self::parse(input)
    }
}

impl fmt::Display for Schema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = serde_json::to_string(&self.canonical_json()).map_err(|_| fmt::Error)?;
        f.write_str(&text)
    }
}

// ========== Parsing ==========

/// Tracks named types while a definition is being parsed.
///
/// A name is declared before its children parse so self-references resolve,
/// and defined once the node is complete.
#[derive(Default)]
struct ParseContext {
    defined: HashMap<String, SchemaNode>,
    declared: HashSet<String>,
}

impl ParseContext {
    fn declare(&mut self, fullname: &str) -> Result<()> {
        if !self.declared.insert(fullname.to_string()) {
            return Err(SchemaParseError::DuplicateName(fullname.to_string()));
        }
        Ok(())
    }

    fn define(&mut self, fullname: String, node: SchemaNode) {
        self.defined.insert(fullname, node);
    }

    fn known(&self, fullname: &str) -> bool {
        self.declared.contains(fullname)
    }

    fn finish(self) -> Names {
        Names {
            defined: self.defined,
        }
    }
}

fn parse_node(json: &Json, ctx: &mut ParseContext, enclosing: Option<&str>) -> Result<SchemaNode> {
    match json {
        Json::String(name) => parse_type_name(name, ctx, enclosing),
        Json::Array(branches) => parse_union(branches, ctx, enclosing),
        Json::Object(attrs) => parse_object(attrs, ctx, enclosing),
        _ => Err(SchemaParseError::Invalid(
            "a schema definition must be a type name, an object, or a union array".to_string(),
        )),
    }
}

fn parse_type_name(
    name: &str,
    ctx: &mut ParseContext,
    enclosing: Option<&str>,
) -> Result<SchemaNode> {
    if let Some(kind) = PrimitiveKind::from_name(name) {
        return Ok(SchemaNode::Primitive(PrimitiveSchema {
            kind,
            logical_type: None,
        }));
    }
    let fullname = SchemaName::make_fullname(name, enclosing);
    if ctx.known(&fullname) {
        Ok(SchemaNode::Ref(fullname))
    } else {
        Err(SchemaParseError::UnknownType(name.to_string()))
    }
}

fn parse_object(
    attrs: &Map<String, Json>,
    ctx: &mut ParseContext,
    enclosing: Option<&str>,
) -> Result<SchemaNode> {
    let type_attr = attrs.get("type").ok_or(SchemaParseError::MissingAttribute {
        context: "schema object",
        attribute: "type",
    })?;
    let type_name = type_attr.as_str().ok_or_else(|| {
        SchemaParseError::Invalid(format!("unsupported type declaration: {}", type_attr))
    })?;

    if let Some(kind) = PrimitiveKind::from_name(type_name) {
        return Ok(SchemaNode::Primitive(PrimitiveSchema {
            kind,
            logical_type: string_attr(attrs, "logicalType"),
        }));
    }

    match type_name {
        "record" => parse_record(attrs, ctx, enclosing),
        "enum" => parse_enum(attrs, ctx, enclosing),
        "fixed" => parse_fixed(attrs, ctx, enclosing),
        "array" => {
            let items = attrs
                .get("items")
                .ok_or(SchemaParseError::MissingAttribute {
                    context: "array",
                    attribute: "items",
                })?;
            Ok(SchemaNode::Array {
                items: Box::new(parse_node(items, ctx, enclosing)?),
            })
        }
        "map" => {
            let values = attrs
                .get("values")
                .ok_or(SchemaParseError::MissingAttribute {
                    context: "map",
                    attribute: "values",
                })?;
            Ok(SchemaNode::Map {
                values: Box::new(parse_node(values, ctx, enclosing)?),
            })
        }
        other => Err(SchemaParseError::Invalid(format!("unknown type: {}", other))),
    }
}

fn named_schema_name(
    attrs: &Map<String, Json>,
    context: &'static str,
    enclosing: Option<&str>,
) -> Result<SchemaName> {
    let declared = attrs
        .get("name")
        .and_then(Json::as_str)
        .ok_or(SchemaParseError::MissingAttribute {
            context,
            attribute: "name",
        })?;
    let namespace = attrs.get("namespace").and_then(Json::as_str);
    Ok(SchemaName::new(declared, namespace, enclosing))
}

fn parse_record(
    attrs: &Map<String, Json>,
    ctx: &mut ParseContext,
    enclosing: Option<&str>,
) -> Result<SchemaNode> {
    let name = named_schema_name(attrs, "record", enclosing)?;
    ctx.declare(name.fullname())?;

    let mut fields: Vec<Field> = Vec::new();
    match attrs.get("fields") {
        // a record may omit its fields entirely
        None => {}
        Some(Json::Array(field_defs)) => {
            for def in field_defs {
                let field = parse_field(def, ctx, name.namespace())?;
                if fields.iter().any(|existing| existing.name == field.name) {
                    return Err(SchemaParseError::DuplicateField {
                        record: name.fullname().to_string(),
                        field: field.name,
                    });
                }
                fields.push(field);
            }
        }
        Some(_) => {
            return Err(SchemaParseError::Invalid(format!(
                "record {} fields must be an array",
                name.fullname()
            )));
        }
    }

    let fullname = name.fullname().to_string();
    ctx.define(
        fullname.clone(),
        SchemaNode::Record(RecordSchema { name, fields }),
    );
    Ok(SchemaNode::Ref(fullname))
}

fn parse_field(json: &Json, ctx: &mut ParseContext, enclosing: Option<&str>) -> Result<Field> {
    let Json::Object(attrs) = json else {
        return Err(SchemaParseError::Invalid(
            "a record field must be an object".to_string(),
        ));
    };
    let name = attrs
        .get("name")
        .and_then(Json::as_str)
        .ok_or(SchemaParseError::MissingAttribute {
            context: "field",
            attribute: "name",
        })?;
    let type_attr = attrs.get("type").ok_or(SchemaParseError::MissingAttribute {
        context: "field",
        attribute: "type",
    })?;
    let schema = parse_node(type_attr, ctx, enclosing)?;
    Ok(Field {
        name: name.to_string(),
        schema,
        default: attrs.get("default").cloned(),
    })
}

fn parse_enum(
    attrs: &Map<String, Json>,
    ctx: &mut ParseContext,
    enclosing: Option<&str>,
) -> Result<SchemaNode> {
    let name = named_schema_name(attrs, "enum", enclosing)?;
    ctx.declare(name.fullname())?;

    let symbol_defs = match attrs.get("symbols") {
        None => {
            return Err(SchemaParseError::MissingAttribute {
                context: "enum",
                attribute: "symbols",
            });
        }
        Some(Json::Array(defs)) => defs,
        Some(_) => {
            return Err(SchemaParseError::Invalid(format!(
                "enum {} symbols must be an array",
                name.fullname()
            )));
        }
    };
    let mut symbols: Vec<String> = Vec::with_capacity(symbol_defs.len());
    for def in symbol_defs {
        let Some(symbol) = def.as_str() else {
            return Err(SchemaParseError::Invalid(format!(
                "enum {} symbols must be strings",
                name.fullname()
            )));
        };
        if symbols.iter().any(|existing| existing == symbol) {
            return Err(SchemaParseError::DuplicateSymbol {
                name: name.fullname().to_string(),
                symbol: symbol.to_string(),
            });
        }
        symbols.push(symbol.to_string());
    }

    let fullname = name.fullname().to_string();
    ctx.define(
        fullname.clone(),
        SchemaNode::Enum(EnumSchema { name, symbols }),
    );
    Ok(SchemaNode::Ref(fullname))
}

fn parse_fixed(
    attrs: &Map<String, Json>,
    ctx: &mut ParseContext,
    enclosing: Option<&str>,
) -> Result<SchemaNode> {
    let name = named_schema_name(attrs, "fixed", enclosing)?;
    ctx.declare(name.fullname())?;

    let size = match attrs.get("size") {
        None => {
            return Err(SchemaParseError::MissingAttribute {
                context: "fixed",
                attribute: "size",
            });
        }
        Some(value) => value.as_u64().ok_or_else(|| {
            SchemaParseError::Invalid(format!(
                "fixed {} size must be a non-negative integer",
                name.fullname()
            ))
        })?,
    };

    let fullname = name.fullname().to_string();
    ctx.define(
        fullname.clone(),
        SchemaNode::Fixed(FixedSchema {
            name,
            size,
            logical_type: string_attr(attrs, "logicalType"),
        }),
    );
    Ok(SchemaNode::Ref(fullname))
}

fn parse_union(
    branch_defs: &[Json],
    ctx: &mut ParseContext,
    enclosing: Option<&str>,
) -> Result<SchemaNode> {
    let mut branches: Vec<SchemaNode> = Vec::with_capacity(branch_defs.len());
    let mut seen: HashSet<String> = HashSet::new();
    for def in branch_defs {
        let branch = parse_node(def, ctx, enclosing)?;
        let key = match &branch {
            SchemaNode::Union(_) => return Err(SchemaParseError::NestedUnion),
            SchemaNode::Primitive(p) => p.kind.as_str().to_string(),
            SchemaNode::Array { .. } => "array".to_string(),
            SchemaNode::Map { .. } => "map".to_string(),
            SchemaNode::Ref(fullname) => fullname.clone(),
            // named definitions parse to references, but key by fullname
            // all the same
            SchemaNode::Record(r) => r.fullname().to_string(),
            SchemaNode::Enum(e) => e.fullname().to_string(),
            SchemaNode::Fixed(f) => f.fullname().to_string(),
        };
        if !seen.insert(key.clone()) {
            return Err(SchemaParseError::DuplicateUnionBranch(key));
        }
        branches.push(branch);
    }
    Ok(SchemaNode::Union(UnionSchema { branches }))
}

fn string_attr(attrs: &Map<String, Json>, key: &str) -> Option<String> {
    attrs.get(key).and_then(Json::as_str).map(String::from)
}

// ========== Canonical rendering ==========

fn named_attrs(type_name: &str, name: &SchemaName) -> Map<String, Json> {
    let mut attrs = Map::new();
    attrs.insert("type".to_string(), json!(type_name));
    attrs.insert("name".to_string(), json!(name.name()));
    if let Some(ns) = name.namespace() {
        attrs.insert("namespace".to_string(), json!(ns));
    }
    attrs
}

/// Render a node to canonical JSON. `seen` carries the fullnames already
/// expanded in this rendering pass; later occurrences collapse to fullname
/// strings, which also terminates reference cycles.
fn render(node: &SchemaNode, names: &Names, seen: &mut HashSet<String>) -> Json {
    match node {
        SchemaNode::Primitive(p) => match &p.logical_type {
            None => json!(p.kind.as_str()),
            Some(logical) => json!({ "type": p.kind.as_str(), "logicalType": logical }),
        },
        SchemaNode::Record(record) => {
            if !seen.insert(record.fullname().to_string()) {
                return json!(record.fullname());
            }
            let fields: Vec<Json> = record
                .fields
                .iter()
                .map(|field| {
                    let mut rendered = Map::new();
                    rendered.insert("name".to_string(), json!(field.name));
                    rendered.insert("type".to_string(), render(&field.schema, names, seen));
                    if let Some(default) = &field.default {
                        rendered.insert("default".to_string(), default.clone());
                    }
                    Json::Object(rendered)
                })
                .collect();
            let mut attrs = named_attrs("record", &record.name);
            attrs.insert("fields".to_string(), Json::Array(fields));
            Json::Object(attrs)
        }
        SchemaNode::Enum(e) => {
            if !seen.insert(e.fullname().to_string()) {
                return json!(e.fullname());
            }
            let mut attrs = named_attrs("enum", &e.name);
            attrs.insert("symbols".to_string(), json!(e.symbols));
            Json::Object(attrs)
        }
        SchemaNode::Fixed(f) => {
            if !seen.insert(f.fullname().to_string()) {
                return json!(f.fullname());
            }
            let mut attrs = named_attrs("fixed", &f.name);
            attrs.insert("size".to_string(), json!(f.size));
            if let Some(logical) = &f.logical_type {
                attrs.insert("logicalType".to_string(), json!(logical));
            }
            Json::Object(attrs)
        }
        SchemaNode::Union(u) => Json::Array(
            u.branches
                .iter()
                .map(|branch| render(branch, names, seen))
                .collect(),
        ),
        SchemaNode::Array { items } => {
            json!({ "type": "array", "items": render(items, names, seen) })
        }
        SchemaNode::Map { values } => {
            json!({ "type": "map", "values": render(values, names, seen) })
        }
        SchemaNode::Ref(fullname) => {
            if seen.contains(fullname) {
                json!(fullname)
            } else {
                match names.get(fullname) {
                    Some(definition) => render(definition, names, seen),
                    None => json!(fullname),
                }
            }
        }
    }
}
