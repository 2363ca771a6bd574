//! The JSON-Schema-like declaration dialect.
//!
//! Declarations are JSON objects mapping field names to descriptors:
//!
//! ```ignore
//! use serde_json::json;
//! use docmodel::json_schema::JsonSchema;
//!
//! let schema = JsonSchema::from_value(Some("students"), &json!({
//!     "firstName": { "type": "string", "required": true },
//!     "lastName": { "type": "string" },
//!     "teacherId": "objectid",
//! }))?;
//! ```
//!
//! Validation reports every failure it finds, rejects properties that were not
//! declared, and treats `_id` as an implicitly declared identifier.

use bson::{Bson, Document};
use serde_json::{Map, Value};

use crate::{
    error::{DocumentStoreError, DocumentStoreResult},
    schema::{
        Dialect, FieldDescriptor, FieldKind, ID_FIELD, Schema, SchemaValidator, ValidationError,
        ValidationErrors,
    },
};

const REQUIRED: &str = "Property is required";
const ADDITIONAL: &str = "Additional properties are not allowed";

/// Validator for JSON-Schema-like declarations.
#[derive(Debug, Clone)]
pub struct JsonSchema {
    schema: Schema,
}

impl JsonSchema {
    /// Builds a validator from already normalized field descriptors.
    pub fn new(name: Option<&str>, fields: Vec<FieldDescriptor>) -> Self {
        Self {
            schema: Schema::new(name.map(str::to_string), fields),
        }
    }

    /// Parses a JSON declaration.
    ///
    /// # Errors
    ///
    /// Returns [`DocumentStoreError::InvalidSchema`] if the declaration is not an
    /// object, or names an unknown type.
    pub fn from_value(name: Option<&str>, declaration: &Value) -> DocumentStoreResult<Self> {
        let properties = declaration
            .as_object()
            .ok_or_else(|| DocumentStoreError::InvalidSchema("declaration must be an object".into()))?;

        Ok(Self::new(
            name,
            properties
                .iter()
                .map(|(field, descriptor)| parse_descriptor(field, descriptor))
                .collect::<DocumentStoreResult<Vec<_>>>()?,
        ))
    }

    fn check_present(&self, document: &Document, errors: &mut ValidationErrors) {
        for (key, value) in document {
            if key == ID_FIELD {
                if !FieldKind::ObjectId.matches(value) {
                    errors.push(type_error(key, FieldKind::ObjectId));
                }
                continue;
            }

            match self.schema.field(key) {
                None => errors.push(ValidationError::new(key, ADDITIONAL)),
                Some(_) if matches!(value, Bson::Null) => {}
                Some(field) if !field.kind.matches(value) => errors.push(type_error(key, field.kind)),
                Some(_) => {}
            }
        }
    }
}

fn type_error(property: &str, kind: FieldKind) -> ValidationError {
    ValidationError::new(property, format!("Invalid type: expected {kind}"))
}

fn parse_descriptor(field: &str, descriptor: &Value) -> DocumentStoreResult<FieldDescriptor> {
    match descriptor {
        Value::String(type_name) => Ok(FieldDescriptor::new(field, parse_kind(field, type_name)?)),
        Value::Object(options) => parse_options(field, options),
        _ => Err(DocumentStoreError::InvalidSchema(format!(
            "descriptor for `{field}` must be a type name or an object"
        ))),
    }
}

fn parse_options(field: &str, options: &Map<String, Value>) -> DocumentStoreResult<FieldDescriptor> {
    let kind = match options.get("type") {
        None => FieldKind::Any,
        Some(Value::String(type_name)) => parse_kind(field, type_name)?,
        Some(_) => {
            return Err(DocumentStoreError::InvalidSchema(format!(
                "`type` of `{field}` must be a string"
            )));
        }
    };

    Ok(FieldDescriptor {
        name: field.to_string(),
        kind,
        required: options
            .get("required")
            .and_then(Value::as_bool)
            .unwrap_or(false),
    })
}

fn parse_kind(field: &str, type_name: &str) -> DocumentStoreResult<FieldKind> {
    FieldKind::parse(type_name).ok_or_else(|| {
        DocumentStoreError::InvalidSchema(format!("unknown type `{type_name}` for `{field}`"))
    })
}

impl SchemaValidator for JsonSchema {
    fn dialect(&self) -> Dialect {
        Dialect::JsonSchema
    }

    fn schema(&self) -> &Schema {
        &self.schema
    }

    fn validate(&self, document: &Document) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::default();

        for field in self.schema.fields().iter().filter(|field| field.required) {
            if matches!(document.get(&field.name), None | Some(Bson::Null)) {
                errors.push(ValidationError::new(&field.name, REQUIRED));
            }
        }

        self.check_present(document, &mut errors);
        errors.into_result()
    }

    fn partial_validate(&self, document: &Document) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::default();

        self.check_present(document, &mut errors);
        errors.into_result()
    }

    fn strings_to_ids(&self, document: Document) -> DocumentStoreResult<Document> {
        Ok(self.schema.strings_to_ids(document))
    }
}

#[cfg(test)]
mod tests {
    use bson::{doc, oid::ObjectId};
    use serde_json::json;

    use super::*;

    fn students() -> JsonSchema {
        JsonSchema::from_value(
            Some("students"),
            &json!({
                "firstName": { "type": "string", "required": true },
                "lastName": { "type": "string" },
                "age": "integer",
                "teacherId": { "type": "objectid" },
            }),
        )
        .unwrap()
    }

    #[test]
    fn parses_declarations() {
        let schema = students();

        assert_eq!(schema.dialect(), Dialect::JsonSchema);
        assert_eq!(schema.schema().name(), Some("students"));
        assert_eq!(schema.schema().object_id_fields(), vec!["teacherId"]);
        assert!(schema.schema().field("firstName").unwrap().required);
        assert!(!schema.schema().field("age").unwrap().required);
    }

    #[test]
    fn rejects_unknown_types() {
        let err = JsonSchema::from_value(None, &json!({ "when": "date" })).unwrap_err();
        assert!(matches!(err, DocumentStoreError::InvalidSchema(_)));

        let err = JsonSchema::from_value(None, &json!(["firstName"])).unwrap_err();
        assert!(matches!(err, DocumentStoreError::InvalidSchema(_)));
    }

    #[test]
    fn requires_required_fields() {
        let errors = students()
            .validate(&doc! { "lastName": "dojo" })
            .unwrap_err();

        assert_eq!(errors.errors()[0], ValidationError::new("firstName", REQUIRED));
    }

    #[test]
    fn reports_every_failure() {
        let errors = students()
            .validate(&doc! { "age": "old", "nonField": 1 })
            .unwrap_err();

        assert_eq!(errors.errors().len(), 3);
        assert_eq!(errors.errors()[1].property, "age");
        assert_eq!(errors.errors()[2].message, ADDITIONAL);
    }

    #[test]
    fn accepts_conforming_documents() {
        let schema = students();

        assert!(schema.validate(&doc! { "firstName": "class", "lastName": "dojo" }).is_ok());
        assert!(schema
            .validate(&doc! { "_id": ObjectId::new(), "firstName": "class", "lastName": null })
            .is_ok());
        assert!(schema
            .validate(&doc! { "firstName": "class", "teacherId": "52535efb0555c1353a75f54b" })
            .is_ok());
    }

    #[test]
    fn partial_validation_ignores_absent_required_fields() {
        let schema = students();

        assert!(schema.partial_validate(&doc! { "lastName": "dodo" }).is_ok());

        let errors = schema
            .partial_validate(&doc! { "nonField": "aValue" })
            .unwrap_err();
        assert_eq!(errors.errors()[0].message, ADDITIONAL);
    }

    #[test]
    fn rejects_malformed_identifier_fields() {
        let errors = students()
            .partial_validate(&doc! { "teacherId": "nope" })
            .unwrap_err();

        assert_eq!(errors.errors()[0].property, "teacherId");
    }
}
