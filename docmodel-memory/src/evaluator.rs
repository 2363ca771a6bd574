//! Selector evaluation for in-memory document filtering.
//!
//! Selectors use the store's native query language. Supported operators are
//! `$eq $ne $gt $gte $lt $lte $in $nin $exists` on fields and `$and $or $nor` at
//! the top level. Field names may be dotted paths into embedded documents, and a
//! plain value matches an array field that contains it.

use std::{cmp::Ordering, collections::HashMap};

use bson::{Bson, Document, datetime::DateTime, oid::ObjectId};

use docmodel_core::{
    error::{DocumentStoreError, DocumentStoreResult},
    query::{OPERATOR_SIGIL, Sort, SortDirection},
};

/// Type-erased, comparable representation of BSON values.
///
/// Numeric types are normalized to `f64` so that `1`, `1i64` and `1.0` compare equal.
#[derive(Debug)]
pub(crate) enum Comparable<'a> {
    Null,
    Bool(bool),
    Number(f64),
    DateTime(DateTime),
    String(&'a str),
    ObjectId(ObjectId),
    Array(Vec<Comparable<'a>>),
    Map(HashMap<&'a str, Comparable<'a>>),
    /// Values with no ordering of their own; compared structurally.
    Other(&'a Bson),
}

impl<'a> From<&'a Bson> for Comparable<'a> {
    fn from(bson: &'a Bson) -> Self {
        match bson {
            Bson::Null | Bson::Undefined => Comparable::Null,
            Bson::Boolean(value) => Comparable::Bool(*value),
            Bson::Int32(value) => Comparable::Number(*value as f64),
            Bson::Int64(value) => Comparable::Number(*value as f64),
            Bson::Double(value) => Comparable::Number(*value),
            Bson::DateTime(value) => Comparable::DateTime(*value),
            Bson::String(value) => Comparable::String(value),
            Bson::ObjectId(value) => Comparable::ObjectId(*value),
            Bson::Array(arr) => Comparable::Array(arr.iter().map(Comparable::from).collect()),
            Bson::Document(doc) => Comparable::Map(
                doc.iter()
                    .map(|(k, v)| (k.as_str(), Comparable::from(v)))
                    .collect(),
            ),
            other => Comparable::Other(other),
        }
    }
}

impl Comparable<'_> {
    /// Position in the store's cross-type sort order.
    fn rank(&self) -> u8 {
        match self {
            Comparable::Null => 0,
            Comparable::Number(_) => 1,
            Comparable::String(_) => 2,
            Comparable::Map(_) => 3,
            Comparable::Array(_) => 4,
            Comparable::ObjectId(_) => 5,
            Comparable::Bool(_) => 6,
            Comparable::DateTime(_) => 7,
            Comparable::Other(_) => 8,
        }
    }

    /// Total order used for sorting, falling back to type rank across types.
    pub(crate) fn sort_cmp(&self, other: &Self) -> Ordering {
        self.partial_cmp(other)
            .unwrap_or_else(|| self.rank().cmp(&other.rank()))
    }
}

impl PartialEq for Comparable<'_> {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Comparable::Null, Comparable::Null) => true,
            (Comparable::Bool(a), Comparable::Bool(b)) => a == b,
            (Comparable::Number(a), Comparable::Number(b)) => a == b,
            (Comparable::DateTime(a), Comparable::DateTime(b)) => a == b,
            (Comparable::String(a), Comparable::String(b)) => a == b,
            (Comparable::ObjectId(a), Comparable::ObjectId(b)) => a == b,
            (Comparable::Array(a), Comparable::Array(b)) => a == b,
            (Comparable::Map(a), Comparable::Map(b)) => a == b,
            (Comparable::Other(a), Comparable::Other(b)) => a == b,
            _ => false,
        }
    }
}

impl PartialOrd for Comparable<'_> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        match (self, other) {
            (Comparable::Null, Comparable::Null) => Some(Ordering::Equal),
            (Comparable::Bool(a), Comparable::Bool(b)) => a.partial_cmp(b),
            (Comparable::Number(a), Comparable::Number(b)) => a.partial_cmp(b),
            (Comparable::DateTime(a), Comparable::DateTime(b)) => a.partial_cmp(b),
            (Comparable::String(a), Comparable::String(b)) => a.partial_cmp(b),
            (Comparable::ObjectId(a), Comparable::ObjectId(b)) => a.bytes().partial_cmp(&b.bytes()),
            _ => None,
        }
    }
}

/// Resolves a possibly dotted path inside `document`.
///
/// Numeric segments index into arrays.
pub(crate) fn lookup<'a>(document: &'a Document, path: &str) -> Option<&'a Bson> {
    let mut segments = path.split('.');
    let mut current = document.get(segments.next()?)?;

    for segment in segments {
        current = match current {
            Bson::Document(inner) => inner.get(segment)?,
            Bson::Array(values) => values.get(segment.parse::<usize>().ok()?)?,
            _ => return None,
        };
    }

    Some(current)
}

fn invalid(message: String) -> DocumentStoreError {
    DocumentStoreError::InvalidDocument(message)
}

fn is_operator_document(value: &Bson) -> bool {
    match value {
        Bson::Document(inner) => inner
            .keys()
            .next()
            .is_some_and(|key| key.starts_with(OPERATOR_SIGIL)),
        _ => false,
    }
}

pub(crate) struct DocumentEvaluator<'a> {
    document: &'a Document,
}

impl<'a> DocumentEvaluator<'a> {
    pub fn new(document: &'a Document) -> Self {
        Self { document }
    }

    /// Returns `true` if the document satisfies every clause of `selector`.
    pub fn matches(&self, selector: &Document) -> DocumentStoreResult<bool> {
        for (key, condition) in selector {
            let matched = match key.as_str() {
                "$and" => self.all(clauses(key, condition)?)?,
                "$or" => self.any(clauses(key, condition)?)?,
                "$nor" => !self.any(clauses(key, condition)?)?,
                operator if operator.starts_with(OPERATOR_SIGIL) => {
                    return Err(invalid(format!("unknown top level operator: {operator}")));
                }
                field => self.field_matches(field, condition)?,
            };

            if !matched {
                return Ok(false);
            }
        }

        Ok(true)
    }

    fn all(&self, selectors: Vec<&Document>) -> DocumentStoreResult<bool> {
        for selector in selectors {
            if !self.matches(selector)? {
                return Ok(false);
            }
        }

        Ok(true)
    }

    fn any(&self, selectors: Vec<&Document>) -> DocumentStoreResult<bool> {
        for selector in selectors {
            if self.matches(selector)? {
                return Ok(true);
            }
        }

        Ok(false)
    }

    fn field_matches(&self, field: &str, condition: &Bson) -> DocumentStoreResult<bool> {
        let value = lookup(self.document, field);

        let Bson::Document(operators) = condition else {
            return Ok(equals(value, condition));
        };

        if !is_operator_document(condition) {
            return Ok(equals(value, condition));
        }

        for (operator, argument) in operators {
            let matched = match operator.as_str() {
                "$eq" => equals(value, argument),
                "$ne" => !equals(value, argument),
                "$gt" => compares(value, argument, |o| o == Ordering::Greater),
                "$gte" => compares(value, argument, |o| o != Ordering::Less),
                "$lt" => compares(value, argument, |o| o == Ordering::Less),
                "$lte" => compares(value, argument, |o| o != Ordering::Greater),
                "$in" => members(operator, argument)?
                    .iter()
                    .any(|candidate| equals(value, candidate)),
                "$nin" => !members(operator, argument)?
                    .iter()
                    .any(|candidate| equals(value, candidate)),
                "$exists" => value.is_some() == truthy(argument),
                other => return Err(invalid(format!("unknown operator: {other}"))),
            };

            if !matched {
                return Ok(false);
            }
        }

        Ok(true)
    }
}

fn clauses<'a>(operator: &str, condition: &'a Bson) -> DocumentStoreResult<Vec<&'a Document>> {
    let Bson::Array(values) = condition else {
        return Err(invalid(format!("{operator} must be an array")));
    };

    values
        .iter()
        .map(|value| match value {
            Bson::Document(selector) => Ok(selector),
            _ => Err(invalid(format!("{operator} entries must be documents"))),
        })
        .collect()
}

fn members<'a>(operator: &str, argument: &'a Bson) -> DocumentStoreResult<&'a Vec<Bson>> {
    match argument {
        Bson::Array(values) => Ok(values),
        _ => Err(invalid(format!("{operator} needs an array"))),
    }
}

/// Equality with array-contains semantics; a null condition matches a missing field.
fn equals(value: Option<&Bson>, condition: &Bson) -> bool {
    let expected = Comparable::from(condition);

    let Some(value) = value else {
        return expected == Comparable::Null;
    };

    Comparable::from(value) == expected
        || match value {
            Bson::Array(items) => items.iter().any(|item| Comparable::from(item) == expected),
            _ => false,
        }
}

fn compares(value: Option<&Bson>, argument: &Bson, accept: impl Fn(Ordering) -> bool) -> bool {
    let bound = Comparable::from(argument);
    let check = |candidate: &Bson| {
        Comparable::from(candidate)
            .partial_cmp(&bound)
            .is_some_and(&accept)
    };

    match value {
        None => false,
        Some(Bson::Array(items)) => items.iter().any(check),
        Some(value) => check(value),
    }
}

pub(crate) fn truthy(value: &Bson) -> bool {
    match value {
        Bson::Boolean(flag) => *flag,
        Bson::Int32(n) => *n != 0,
        Bson::Int64(n) => *n != 0,
        Bson::Double(n) => *n != 0.0,
        Bson::Null | Bson::Undefined => false,
        _ => true,
    }
}

/// Orders two documents by a list of sort keys.
pub(crate) fn compare_documents(left: &Document, right: &Document, sort: &[Sort]) -> Ordering {
    for key in sort {
        let a = lookup(left, &key.field).map(Comparable::from).unwrap_or(Comparable::Null);
        let b = lookup(right, &key.field).map(Comparable::from).unwrap_or(Comparable::Null);

        let ordering = match key.direction {
            SortDirection::Asc => a.sort_cmp(&b),
            SortDirection::Desc => b.sort_cmp(&a),
        };

        if ordering != Ordering::Equal {
            return ordering;
        }
    }

    Ordering::Equal
}
