//! Update operators, upsert seeding and projection for in-memory documents.
//!
//! An update document either consists solely of operators (`$set`, `$unset`,
//! `$inc`) or is a replacement document. Replacements keep the stored `_id`.

use bson::{Bson, Document};

use docmodel_core::{
    error::{DocumentStoreError, DocumentStoreResult},
    query::OPERATOR_SIGIL,
    schema::ID_FIELD,
};

use crate::evaluator::truthy;

fn invalid(message: impl Into<String>) -> DocumentStoreError {
    DocumentStoreError::InvalidDocument(message.into())
}

/// Applies `update` to `document` in place. Returns `true` if anything changed.
pub(crate) fn apply_update(document: &mut Document, update: &Document) -> DocumentStoreResult<bool> {
    let operators = update
        .keys()
        .filter(|key| key.starts_with(OPERATOR_SIGIL))
        .count();

    match operators {
        0 => replace(document, update),
        n if n == update.len() => apply_operators(document, update),
        _ => Err(invalid("update document mixes operators and fields")),
    }
}

fn replace(document: &mut Document, replacement: &Document) -> DocumentStoreResult<bool> {
    let id = document.get(ID_FIELD).cloned();

    if let (Some(current), Some(requested)) = (&id, replacement.get(ID_FIELD)) {
        if current != requested {
            return Err(invalid("the `_id` field is immutable"));
        }
    }

    let mut replaced = Document::new();
    if let Some(id) = id {
        replaced.insert(ID_FIELD, id);
    }
    for (key, value) in replacement.iter().filter(|(key, _)| key.as_str() != ID_FIELD) {
        replaced.insert(key.clone(), value.clone());
    }

    let changed = replaced != *document;
    *document = replaced;

    Ok(changed)
}

fn apply_operators(document: &mut Document, update: &Document) -> DocumentStoreResult<bool> {
    let before = document.clone();

    for (operator, fields) in update {
        let Bson::Document(fields) = fields else {
            return Err(invalid(format!("{operator} needs a document")));
        };

        for (path, value) in fields {
            if path == ID_FIELD && operator != "$set" {
                return Err(invalid("the `_id` field is immutable"));
            }

            match operator.as_str() {
                "$set" => {
                    if path == ID_FIELD && document.get(ID_FIELD).is_some_and(|id| id != value) {
                        return Err(invalid("the `_id` field is immutable"));
                    }
                    set_path(document, path, value.clone())?;
                }
                "$unset" => unset_path(document, path),
                "$inc" => {
                    let current = crate::evaluator::lookup(document, path).cloned();
                    set_path(document, path, increment(path, current, value)?)?;
                }
                other => return Err(invalid(format!("unsupported update operator: {other}"))),
            }
        }
    }

    Ok(*document != before)
}

fn increment(path: &str, current: Option<Bson>, by: &Bson) -> DocumentStoreResult<Bson> {
    let not_numeric = || invalid(format!("cannot increment non-numeric field `{path}`"));

    Ok(match (current.unwrap_or(Bson::Int32(0)), by) {
        // 32-bit overflow widens to 64 bits, like the server does.
        (Bson::Int32(a), Bson::Int32(b)) => match a.checked_add(*b) {
            Some(sum) => Bson::Int32(sum),
            None => Bson::Int64(i64::from(a) + i64::from(*b)),
        },
        (Bson::Int32(a), Bson::Int64(b)) => Bson::Int64(add_i64(path, i64::from(a), *b)?),
        (Bson::Int64(a), Bson::Int32(b)) => Bson::Int64(add_i64(path, a, i64::from(*b))?),
        (Bson::Int64(a), Bson::Int64(b)) => Bson::Int64(add_i64(path, a, *b)?),
        (a, b) => Bson::Double(as_f64(&a).ok_or_else(not_numeric)? + as_f64(b).ok_or_else(not_numeric)?),
    })
}

fn add_i64(path: &str, a: i64, b: i64) -> DocumentStoreResult<i64> {
    a.checked_add(b)
        .ok_or_else(|| invalid(format!("incrementing `{path}` would overflow a 64-bit integer")))
}

fn as_f64(value: &Bson) -> Option<f64> {
    match value {
        Bson::Int32(n) => Some(*n as f64),
        Bson::Int64(n) => Some(*n as f64),
        Bson::Double(n) => Some(*n),
        _ => None,
    }
}

fn set_path(document: &mut Document, path: &str, value: Bson) -> DocumentStoreResult<()> {
    match path.split_once('.') {
        None => {
            document.insert(path, value);
            Ok(())
        }
        Some((head, rest)) => {
            if !document.contains_key(head) {
                document.insert(head, Document::new());
            }

            match document.get_mut(head) {
                Some(Bson::Document(inner)) => set_path(inner, rest, value),
                _ => Err(invalid(format!("cannot create field `{rest}` inside `{head}`"))),
            }
        }
    }
}

fn unset_path(document: &mut Document, path: &str) {
    match path.split_once('.') {
        None => {
            document.remove(path);
        }
        Some((head, rest)) => {
            if let Some(Bson::Document(inner)) = document.get_mut(head) {
                unset_path(inner, rest);
            }
        }
    }
}

/// Builds the document an upsert starts from: the selector's top-level equality clauses.
pub(crate) fn upsert_seed(selector: &Document) -> Document {
    selector
        .iter()
        .filter(|(key, _)| !key.starts_with(OPERATOR_SIGIL) && !key.contains('.'))
        .filter_map(|(key, value)| match value {
            Bson::Document(inner) if inner.keys().any(|k| k.starts_with(OPERATOR_SIGIL)) => inner
                .get("$eq")
                .map(|eq| (key.clone(), eq.clone())),
            _ => Some((key.clone(), value.clone())),
        })
        .collect()
}

/// Applies an inclusive (`{field: 1}`) or exclusive (`{field: 0}`) projection.
///
/// `_id` is kept unless explicitly excluded.
pub(crate) fn project(document: Document, projection: &Document) -> Document {
    let inclusive = projection
        .iter()
        .any(|(key, flag)| key != ID_FIELD && truthy(flag));
    let keep_id = projection.get(ID_FIELD).is_none_or(truthy);

    document
        .into_iter()
        .filter(|(key, _)| match key.as_str() {
            ID_FIELD => keep_id,
            field if inclusive => projection.get(field).is_some_and(truthy),
            field => projection.get(field).is_none_or(truthy),
        })
        .collect()
}
