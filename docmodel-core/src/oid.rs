//! Identifier recognition and conversion.
//!
//! Identifiers travel in two interchangeable forms: a native [`ObjectId`] as the
//! store keeps it, and its 24-character hexadecimal rendering as callers usually
//! hold it. The store additionally accepts the raw 12-byte form, either as a
//! 12-byte string or as a 12-byte generic binary.

use bson::{
    Bson,
    oid::ObjectId,
    spec::BinarySubtype,
};

use crate::error::{DocumentStoreError, DocumentStoreResult};

/// Length of the hexadecimal rendering of an [`ObjectId`].
pub const OBJECT_ID_HEX_LEN: usize = 24;

const OBJECT_ID_RAW_LEN: usize = 12;

/// Returns `true` if `value` is a native identifier or can be converted into one.
///
/// Null, undefined and malformed values yield `false` rather than an error.
///
/// ```ignore
/// use bson::Bson;
/// use docmodel::oid::is_object_id;
///
/// assert!(is_object_id(&Bson::from("521fc86d178a92165200001d")));
/// assert!(!is_object_id(&Bson::from("1234123412341234")));
/// assert!(!is_object_id(&Bson::Null));
/// ```
pub fn is_object_id(value: &Bson) -> bool {
    to_object_id(value).is_some()
}

/// Converts `value` into a native identifier, if it has a recognised form.
pub fn to_object_id(value: &Bson) -> Option<ObjectId> {
    match value {
        Bson::ObjectId(oid) => Some(*oid),
        Bson::String(s) if s.len() == OBJECT_ID_HEX_LEN => ObjectId::parse_str(s).ok(),
        Bson::String(s) if s.len() == OBJECT_ID_RAW_LEN => raw_object_id(s.as_bytes()),
        Bson::Binary(binary) if binary.subtype == BinarySubtype::Generic => raw_object_id(&binary.bytes),
        _ => None,
    }
}

/// Converts `value` into a native identifier, failing with
/// [`DocumentStoreError::InvalidId`] tagged with `collection`.
pub fn object_id(value: &Bson, collection: &str) -> DocumentStoreResult<ObjectId> {
    to_object_id(value)
        .ok_or_else(|| DocumentStoreError::InvalidId(describe(value), collection.to_string()))
}

fn raw_object_id(bytes: &[u8]) -> Option<ObjectId> {
    <[u8; OBJECT_ID_RAW_LEN]>::try_from(bytes)
        .ok()
        .map(ObjectId::from_bytes)
}

/// Converts any identifier form [`is_object_id`] accepts into a native identifier,
/// leaving every other value untouched.
///
/// Values that look nothing like an identifier pass through unchanged so that a
/// query for them simply matches nothing.
pub(crate) fn string_to_id(value: Bson) -> Bson {
    match to_object_id(&value) {
        Some(oid) => Bson::ObjectId(oid),
        None => value,
    }
}

/// Renders a native identifier as its hexadecimal string, leaving every other value untouched.
pub(crate) fn id_to_string(value: Bson) -> Bson {
    match value {
        Bson::ObjectId(oid) => Bson::String(oid.to_hex()),
        other => other,
    }
}

/// Renders any value for use in an error message.
pub(crate) fn describe(value: &Bson) -> String {
    match value {
        Bson::String(s) => s.clone(),
        Bson::ObjectId(oid) => oid.to_hex(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use bson::Binary;

    use super::*;

    const HEX: &str = "521fc86d178a92165200001d";

    #[test]
    fn recognises_well_formed_identifiers() {
        let oid = ObjectId::parse_str(HEX).unwrap();

        assert!(is_object_id(&Bson::ObjectId(oid)));
        assert!(is_object_id(&Bson::from(HEX)));
        assert!(is_object_id(&Bson::from("abcdefghijkl")));
        assert!(is_object_id(&Bson::Binary(Binary {
            subtype: BinarySubtype::Generic,
            bytes: oid.bytes().to_vec(),
        })));
    }

    #[test]
    fn rejects_malformed_identifiers() {
        assert!(!is_object_id(&Bson::Null));
        assert!(!is_object_id(&Bson::Undefined));
        assert!(!is_object_id(&Bson::from("")));
        assert!(!is_object_id(&Bson::from("1234123412341234")));
        assert!(!is_object_id(&Bson::from("zz1fc86d178a92165200001d")));
        assert!(!is_object_id(&Bson::from(12)));
        assert!(!is_object_id(&Bson::Boolean(true)));
    }

    #[test]
    fn converts_in_both_directions() {
        let native = string_to_id(Bson::from(HEX));
        assert_eq!(native, Bson::ObjectId(ObjectId::parse_str(HEX).unwrap()));
        assert_eq!(id_to_string(native), Bson::from(HEX));
    }

    #[test]
    fn converts_every_accepted_form() {
        let raw = string_to_id(Bson::from("abcdefghijkl"));
        assert_eq!(raw, Bson::ObjectId(ObjectId::from_bytes(*b"abcdefghijkl")));

        let oid = ObjectId::parse_str(HEX).unwrap();
        let binary = string_to_id(Bson::Binary(Binary {
            subtype: BinarySubtype::Generic,
            bytes: oid.bytes().to_vec(),
        }));
        assert_eq!(binary, Bson::ObjectId(oid));

        for value in [Bson::from(HEX), Bson::from("abcdefghijkl"), Bson::from("dojo")] {
            assert_eq!(
                is_object_id(&value),
                matches!(string_to_id(value), Bson::ObjectId(_))
            );
        }
    }

    #[test]
    fn leaves_non_identifiers_alone() {
        assert_eq!(string_to_id(Bson::from("dojo")), Bson::from("dojo"));
        assert_eq!(id_to_string(Bson::from(3)), Bson::from(3));
    }

    #[test]
    fn construction_failures_name_the_collection() {
        let err = object_id(&Bson::from("nope"), "students").unwrap_err();
        assert_eq!(err.to_string(), "Invalid object id: nope (collection students)");

        let oid = ObjectId::new();
        assert_eq!(object_id(&Bson::ObjectId(oid), "students").unwrap(), oid);
    }

    #[test]
    fn raw_form_round_trips() {
        let oid = to_object_id(&Bson::from("abcdefghijkl")).unwrap();
        assert_eq!(&oid.bytes(), b"abcdefghijkl");
    }
}
