//! The field-map declaration dialect.
//!
//! This is the older of the two dialects. Fields are declared one by one, identifier
//! fields carry the `$special: "oid"` marker when declared from JSON, and documents
//! are trimmed down to the declared fields instead of being rejected for carrying
//! extra ones. Validation walks the declared fields in order and stops at the first
//! failure.

use bson::{Bson, Document};
use serde_json::Value;

use crate::{
    error::{DocumentStoreError, DocumentStoreResult},
    oid,
    schema::{
        Dialect, FieldDescriptor, FieldKind, ID_FIELD, Schema, SchemaValidator, ValidationError,
        ValidationErrors,
    },
};

/// Validator for field-map declarations.
///
/// # Example
///
/// ```ignore
/// use docmodel::{field_map::FieldMap, schema::FieldKind};
///
/// let schema = FieldMap::new()
///     .required("name", FieldKind::String)
///     .object_id("teacherId");
/// ```
#[derive(Debug, Clone, Default)]
pub struct FieldMap {
    schema: Schema,
}

impl FieldMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Names the declaration, usually after the collection it guards.
    pub fn named(self, name: impl Into<String>) -> Self {
        Self {
            schema: Schema::new(Some(name.into()), self.schema.fields().to_vec()),
        }
    }

    /// Declares an optional field.
    pub fn field(mut self, name: impl Into<String>, kind: FieldKind) -> Self {
        self.schema.push(FieldDescriptor::new(name, kind));
        self
    }

    /// Declares a required field.
    pub fn required(mut self, name: impl Into<String>, kind: FieldKind) -> Self {
        self.schema.push(FieldDescriptor::new(name, kind).required());
        self
    }

    /// Declares an optional identifier field.
    pub fn object_id(self, name: impl Into<String>) -> Self {
        self.field(name, FieldKind::ObjectId)
    }

    /// Parses a JSON field map such as
    /// `{"teacherId": {"$special": "oid", "required": true}, "name": {"type": "string"}}`.
    pub fn from_value(declaration: &Value) -> DocumentStoreResult<Self> {
        let properties = declaration
            .as_object()
            .ok_or_else(|| DocumentStoreError::InvalidSchema("field map must be an object".into()))?;

        properties
            .iter()
            .try_fold(Self::new(), |map, (name, descriptor)| {
                let (kind, required) = parse_descriptor(name, descriptor)?;
                Ok(match required {
                    true => map.required(name, kind),
                    false => map.field(name, kind),
                })
            })
    }

    fn check(&self, field: &FieldDescriptor, value: Option<&Bson>) -> Result<(), ValidationErrors> {
        match value {
            None | Some(Bson::Null) if field.required => Err(single(&field.name, format!(
                "`{}` is required",
                field.name
            ))),
            Some(value) if !matches!(value, Bson::Null) && !field.kind.matches(value) => {
                Err(single(&field.name, format!("`{}` must be of type {}", field.name, field.kind)))
            }
            _ => Ok(()),
        }
    }
}

fn single(property: &str, message: String) -> ValidationErrors {
    ValidationErrors::new(vec![ValidationError::new(property, message)])
}

fn parse_descriptor(name: &str, descriptor: &Value) -> DocumentStoreResult<(FieldKind, bool)> {
    let unknown = |type_name: &str| {
        DocumentStoreError::InvalidSchema(format!("unknown type `{type_name}` for `{name}`"))
    };

    match descriptor {
        Value::String(type_name) => Ok((
            FieldKind::parse(type_name).ok_or_else(|| unknown(type_name))?,
            false,
        )),
        Value::Object(options) => {
            let kind = match (options.get("$special"), options.get("type")) {
                (Some(Value::String(special)), _) if special == "oid" => FieldKind::ObjectId,
                (_, Some(Value::String(type_name))) => {
                    FieldKind::parse(type_name).ok_or_else(|| unknown(type_name))?
                }
                _ => FieldKind::Any,
            };

            Ok((kind, options.get("required").and_then(Value::as_bool).unwrap_or(false)))
        }
        _ => Err(DocumentStoreError::InvalidSchema(format!(
            "descriptor for `{name}` must be a type name or an object"
        ))),
    }
}

/// Returns `true` for values the identifier conversion skips: empty, already native, or structured.
fn skip_conversion(value: &Bson) -> bool {
    match value {
        Bson::Null | Bson::Undefined | Bson::Boolean(false) | Bson::ObjectId(_) => true,
        Bson::String(s) => s.is_empty(),
        Bson::Document(_) | Bson::Array(_) => true,
        _ => false,
    }
}

impl SchemaValidator for FieldMap {
    fn dialect(&self) -> Dialect {
        Dialect::FieldMap
    }

    fn schema(&self) -> &Schema {
        &self.schema
    }

    fn validate(&self, document: &Document) -> Result<(), ValidationErrors> {
        self.schema
            .fields()
            .iter()
            .try_for_each(|field| self.check(field, document.get(&field.name)))
    }

    fn partial_validate(&self, document: &Document) -> Result<(), ValidationErrors> {
        document
            .iter()
            .filter_map(|(key, value)| self.schema.field(key).map(|field| (field, value)))
            .try_for_each(|(field, value)| self.check(field, Some(value)))
    }

    fn strings_to_ids(&self, mut document: Document) -> DocumentStoreResult<Document> {
        for name in self.schema.object_id_fields() {
            let Some(value) = document.get(name) else {
                continue;
            };

            if skip_conversion(value) {
                continue;
            }

            let converted = oid::to_object_id(value)
                .ok_or_else(|| DocumentStoreError::InvalidIdField(name.to_string()))?;
            document.insert(name, converted);
        }

        Ok(document)
    }

    fn restrict(&self, document: Document) -> Document {
        document
            .into_iter()
            .filter(|(key, _)| key != ID_FIELD && self.schema.field(key).is_some())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use bson::{doc, oid::ObjectId};
    use serde_json::json;

    use super::*;

    fn students() -> FieldMap {
        FieldMap::new()
            .required("name", FieldKind::String)
            .field("age", FieldKind::Integer)
            .object_id("teacherId")
    }

    #[test]
    fn parses_special_markers() {
        let map = FieldMap::from_value(&json!({
            "teacherId": { "$special": "oid", "required": true },
            "name": { "type": "string" },
            "nickname": "string",
        }))
        .unwrap();

        assert_eq!(map.dialect(), Dialect::FieldMap);
        assert_eq!(map.schema().object_id_fields(), vec!["teacherId"]);
        assert!(map.schema().field("teacherId").unwrap().required);
        assert_eq!(map.schema().field("nickname").unwrap().kind, FieldKind::String);
    }

    #[test]
    fn stops_at_first_failure() {
        let errors = students()
            .validate(&doc! { "age": "old" })
            .unwrap_err();

        assert_eq!(errors.errors().len(), 1);
        assert_eq!(errors.errors()[0].property, "name");
    }

    #[test]
    fn partial_validation_checks_present_fields_only() {
        let map = students();

        assert!(map.partial_validate(&doc! { "age": 3, "unknown": true }).is_ok());

        let errors = map.partial_validate(&doc! { "age": "three" }).unwrap_err();
        assert_eq!(errors.errors()[0].message, "`age` must be of type integer");
    }

    #[test]
    fn restricts_to_declared_fields() {
        let restricted = students().restrict(doc! {
            "_id": ObjectId::new(),
            "name": "class",
            "extra": 1,
        });

        assert_eq!(restricted, doc! { "name": "class" });
    }

    #[test]
    fn converts_identifier_fields() {
        let hex = "52535efb0555c1353a75f54b";
        let converted = students()
            .strings_to_ids(doc! { "teacherId": hex, "name": hex })
            .unwrap();

        assert_eq!(
            converted,
            doc! { "teacherId": ObjectId::parse_str(hex).unwrap(), "name": hex }
        );
    }

    #[test]
    fn names_the_field_that_fails_conversion() {
        let err = students()
            .strings_to_ids(doc! { "teacherId": "not-an-id" })
            .unwrap_err();

        assert_eq!(err.to_string(), "Must provide a valid object id for `teacherId`");
    }
}
