//! Schema declarations and the validator interface the model depends on.
//!
//! A schema is a flat list of [`FieldDescriptor`]s. Two declaration dialects exist,
//! each with its own adapter behind the [`SchemaValidator`] trait:
//!
//! - [`JsonSchema`](crate::json_schema::JsonSchema) - JSON-Schema-like declarations,
//!   strict about unknown properties, reporting every failure at once
//! - [`FieldMap`](crate::field_map::FieldMap) - the older field map, which strips
//!   unknown properties and stops at the first failure
//!
//! The model only ever talks to the trait.

use bson::{Bson, Document};
use serde::{Deserialize, Serialize};
use std::{fmt, fmt::Debug};

use crate::{error::DocumentStoreResult, oid};

/// The reserved identifier field every document carries.
pub const ID_FIELD: &str = "_id";

/// The type a declared field must hold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldKind {
    /// UTF-8 string.
    String,
    /// Any numeric value (32/64-bit integers, doubles, decimals).
    Number,
    /// 32 or 64-bit integer.
    Integer,
    /// Boolean.
    Boolean,
    /// Document identifier, native or in its 24-hex string form.
    #[serde(rename = "objectid")]
    ObjectId,
    /// Embedded document.
    Object,
    /// Array of anything.
    Array,
    /// No type constraint.
    Any,
}

impl FieldKind {
    /// Parses a type name as written in a schema declaration.
    pub fn parse(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "string" => Some(FieldKind::String),
            "number" => Some(FieldKind::Number),
            "integer" => Some(FieldKind::Integer),
            "boolean" | "bool" => Some(FieldKind::Boolean),
            "objectid" | "oid" => Some(FieldKind::ObjectId),
            "object" => Some(FieldKind::Object),
            "array" => Some(FieldKind::Array),
            "any" => Some(FieldKind::Any),
            _ => None,
        }
    }

    /// Returns `true` if `value` satisfies this kind.
    pub fn matches(&self, value: &Bson) -> bool {
        match self {
            FieldKind::String => matches!(value, Bson::String(_)),
            FieldKind::Number => matches!(
                value,
                Bson::Int32(_) | Bson::Int64(_) | Bson::Double(_) | Bson::Decimal128(_)
            ),
            FieldKind::Integer => matches!(value, Bson::Int32(_) | Bson::Int64(_)),
            FieldKind::Boolean => matches!(value, Bson::Boolean(_)),
            FieldKind::ObjectId => oid::is_object_id(value),
            FieldKind::Object => matches!(value, Bson::Document(_)),
            FieldKind::Array => matches!(value, Bson::Array(_)),
            FieldKind::Any => true,
        }
    }

    /// The name used for this kind in declarations and error messages.
    pub fn name(&self) -> &'static str {
        match self {
            FieldKind::String => "string",
            FieldKind::Number => "number",
            FieldKind::Integer => "integer",
            FieldKind::Boolean => "boolean",
            FieldKind::ObjectId => "objectid",
            FieldKind::Object => "object",
            FieldKind::Array => "array",
            FieldKind::Any => "any",
        }
    }
}

impl fmt::Display for FieldKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// One declared field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldDescriptor {
    /// The field name.
    pub name: String,
    /// The type the field must hold when present.
    pub kind: FieldKind,
    /// Whether the field must be present on full validation.
    pub required: bool,
}

impl FieldDescriptor {
    /// Creates an optional field of the given kind.
    pub fn new(name: impl Into<String>, kind: FieldKind) -> Self {
        Self {
            name: name.into(),
            kind,
            required: false,
        }
    }

    /// Marks this field as required.
    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    /// Returns `true` if this field holds a document identifier.
    pub fn is_object_id(&self) -> bool {
        self.kind == FieldKind::ObjectId
    }
}

/// The normalized shape of a schema declaration, regardless of dialect.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Schema {
    name: Option<String>,
    fields: Vec<FieldDescriptor>,
}

impl Schema {
    /// Creates a schema from field descriptors, keeping declaration order.
    pub fn new(name: Option<String>, fields: Vec<FieldDescriptor>) -> Self {
        Self { name, fields }
    }

    /// The name the schema was declared under, usually the collection name.
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub(crate) fn push(&mut self, field: FieldDescriptor) {
        self.fields.push(field);
    }

    /// All declared fields, in declaration order.
    pub fn fields(&self) -> &[FieldDescriptor] {
        &self.fields
    }

    /// Looks up a declared field by name.
    pub fn field(&self, name: &str) -> Option<&FieldDescriptor> {
        self.fields.iter().find(|field| field.name == name)
    }

    /// Names of all declared fields.
    pub fn field_names(&self) -> Vec<&str> {
        self.fields
            .iter()
            .map(|field| field.name.as_str())
            .collect()
    }

    /// Names of the fields declared as identifiers.
    pub fn object_id_fields(&self) -> Vec<&str> {
        self.fields
            .iter()
            .filter(|field| field.is_object_id())
            .map(|field| field.name.as_str())
            .collect()
    }

    /// Returns `true` if `name` is `_id` or a declared identifier field.
    pub fn is_object_id_field(&self, name: &str) -> bool {
        name == ID_FIELD || self.field(name).is_some_and(FieldDescriptor::is_object_id)
    }

    /// Converts string identifiers in every identifier field of `document` to native form.
    ///
    /// Values that are not convertible are left as they are.
    pub fn strings_to_ids(&self, document: Document) -> Document {
        document
            .into_iter()
            .map(|(key, value)| match self.is_object_id_field(&key) {
                true => (key, oid::string_to_id(value)),
                false => (key, value),
            })
            .collect()
    }

    /// Renders native identifiers in every identifier field of `document` as strings.
    pub fn ids_to_strings(&self, document: Document) -> Document {
        document
            .into_iter()
            .map(|(key, value)| match self.is_object_id_field(&key) {
                true => (key, oid::id_to_string(value)),
                false => (key, value),
            })
            .collect()
    }
}

/// A single validation failure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationError {
    /// The offending property.
    pub property: String,
    /// A human readable description of the failure.
    pub message: String,
}

impl ValidationError {
    pub fn new(property: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            property: property.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.property, self.message)
    }
}

/// Every failure found while validating one document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationErrors {
    errors: Vec<ValidationError>,
}

impl ValidationErrors {
    pub fn new(errors: Vec<ValidationError>) -> Self {
        Self { errors }
    }

    /// The individual failures, in the order they were found.
    pub fn errors(&self) -> &[ValidationError] {
        &self.errors
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    pub(crate) fn push(&mut self, error: ValidationError) {
        self.errors.push(error);
    }

    /// Converts the collected failures into a result.
    pub(crate) fn into_result(self) -> Result<(), ValidationErrors> {
        match self.errors.is_empty() {
            true => Ok(()),
            false => Err(self),
        }
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let rendered = self
            .errors
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>();

        f.write_str(&rendered.join("; "))
    }
}

/// Which declaration dialect a validator was built from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dialect {
    /// JSON-Schema-like declarations.
    JsonSchema,
    /// The older field map.
    FieldMap,
}

/// The validation and identifier-conversion interface the model depends on.
///
/// Implementations are immutable once built and can be shared between models.
pub trait SchemaValidator: Send + Sync + Debug {
    /// The dialect this validator was declared in.
    fn dialect(&self) -> Dialect;

    /// The normalized schema.
    fn schema(&self) -> &Schema;

    /// Validates a complete document.
    fn validate(&self, document: &Document) -> Result<(), ValidationErrors>;

    /// Validates only the fields present in `document`; absent required fields are not reported.
    fn partial_validate(&self, document: &Document) -> Result<(), ValidationErrors>;

    /// Converts identifier fields from string to native form.
    fn strings_to_ids(&self, document: Document) -> DocumentStoreResult<Document>;

    /// Converts identifier fields from native to string form.
    fn ids_to_strings(&self, document: Document) -> Document {
        self.schema().ids_to_strings(document)
    }

    /// Prepares a document for insertion. Dialects that drop unknown fields do so here.
    fn restrict(&self, document: Document) -> Document {
        document
    }
}
