//! Query evaluation for in-memory record filtering.
//!
//! This module provides the matcher used by [`InMemoryStore`](crate::InMemoryStore): strict
//! equality, range comparison, and the visitor that evaluates a [`Query`] against a record.

use std::{cmp::Ordering, collections::HashMap};

use bson::{Bson, datetime::DateTime};

use memdoc_core::{
    document::{Record, record_id, storage_key},
    error::{DocumentStoreError, DocumentStoreResult},
    query::{FieldPredicate, Predicate, Query, QueryVisitor, identifier_key},
};

/// Borrowed, comparable view of a BSON value.
///
/// Equality is strict: values of different kinds are never equal, except that all numeric
/// widths form one kind. Arrays compare element-wise in order and nested documents compare
/// as key sets. Ordering is only defined between values of the same orderable kind.
#[derive(Debug)]
pub(crate) enum Comparable<'a> {
    Null,
    Bool(bool),
    Int(i64),
    Double(f64),
    DateTime(DateTime),
    String(&'a str),
    Array(Vec<Comparable<'a>>),
    Map(HashMap<&'a str, Comparable<'a>>),
    /// Any other BSON value; equal only to an identical value.
    Other(&'a Bson),
}

impl<'a> From<&'a Bson> for Comparable<'a> {
    fn from(bson: &'a Bson) -> Self {
        match bson {
            Bson::Null => Comparable::Null,
            Bson::Boolean(value) => Comparable::Bool(*value),
            Bson::Int32(value) => Comparable::Int(i64::from(*value)),
            Bson::Int64(value) => Comparable::Int(*value),
            Bson::Double(value) => Comparable::Double(*value),
            Bson::DateTime(value) => Comparable::DateTime(*value),
            Bson::String(value) => Comparable::String(value),
            Bson::Array(items) => Comparable::Array(items.iter().map(Comparable::from).collect()),
            Bson::Document(record) => Comparable::Map(
                record
                    .iter()
                    .map(|(key, value)| (key.as_str(), Comparable::from(value)))
                    .collect(),
            ),
            other => Comparable::Other(other),
        }
    }
}

impl<'a> PartialEq for Comparable<'a> {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Comparable::Null, Comparable::Null) => true,
            (Comparable::Bool(a), Comparable::Bool(b)) => a == b,
            (Comparable::Int(a), Comparable::Int(b)) => a == b,
            (Comparable::Int(a), Comparable::Double(b)) | (Comparable::Double(b), Comparable::Int(a)) => {
                compare_int_double(*a, *b) == Some(Ordering::Equal)
            }
            (Comparable::Double(a), Comparable::Double(b)) => a == b,
            (Comparable::DateTime(a), Comparable::DateTime(b)) => a == b,
            (Comparable::String(a), Comparable::String(b)) => a == b,
            (Comparable::Array(a), Comparable::Array(b)) => a == b,
            (Comparable::Map(a), Comparable::Map(b)) => a == b,
            (Comparable::Other(a), Comparable::Other(b)) => a == b,
            _ => false,
        }
    }
}

impl<'a> PartialOrd for Comparable<'a> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        match (self, other) {
            (Comparable::Bool(a), Comparable::Bool(b)) => a.partial_cmp(b),
            (Comparable::Int(a), Comparable::Int(b)) => a.partial_cmp(b),
            (Comparable::Int(a), Comparable::Double(b)) => compare_int_double(*a, *b),
            (Comparable::Double(a), Comparable::Int(b)) => compare_int_double(*b, *a).map(Ordering::reverse),
            (Comparable::Double(a), Comparable::Double(b)) => a.partial_cmp(b),
            (Comparable::DateTime(a), Comparable::DateTime(b)) => a.partial_cmp(b),
            (Comparable::String(a), Comparable::String(b)) => a.partial_cmp(b),
            _ => None,
        }
    }
}

impl<'a> Comparable<'a> {
    /// Position of this value's kind in the sort order.
    fn rank(&self) -> u8 {
        match self {
            Comparable::Null => 0,
            Comparable::Int(_) | Comparable::Double(_) => 1,
            Comparable::String(_) => 2,
            Comparable::Bool(_) => 3,
            Comparable::DateTime(_) => 4,
            Comparable::Array(_) | Comparable::Map(_) | Comparable::Other(_) => 5,
        }
    }

    fn is_nan(&self) -> bool {
        matches!(self, Comparable::Double(value) if value.is_nan())
    }

    /// Total order used for sorting: kinds by rank, then values within a kind.
    ///
    /// `NaN` is the lowest number. Arrays, documents and other values keep their order.
    fn sort_cmp(&self, other: &Self) -> Ordering {
        self.rank().cmp(&other.rank()).then_with(|| match (self.is_nan(), other.is_nan()) {
            (true, true) => Ordering::Equal,
            (true, false) => Ordering::Less,
            (false, true) => Ordering::Greater,
            (false, false) => self.partial_cmp(other).unwrap_or(Ordering::Equal),
        })
    }
}

/// Compares an integer with a double without rounding the integer.
fn compare_int_double(int: i64, double: f64) -> Option<Ordering> {
    // 2^63, the first double above the i64 range.
    const I64_BOUND: f64 = 9_223_372_036_854_775_808.0;

    if double.is_nan() {
        return None;
    }
    if double >= I64_BOUND {
        return Some(Ordering::Less);
    }
    if double < -I64_BOUND {
        return Some(Ordering::Greater);
    }

    let whole = double.trunc();
    match int.cmp(&(whole as i64)) {
        Ordering::Equal => 0.0_f64.partial_cmp(&(double - whole)),
        ordering => Some(ordering),
    }
}

/// Returns `true` if two values are strictly equal.
pub fn values_equal(left: &Bson, right: &Bson) -> bool {
    Comparable::from(left) == Comparable::from(right)
}

/// Orders two optional field values for sorting.
///
/// Missing values sort first, then null, numbers, strings, booleans, datetimes, and finally
/// every other kind. Values within a kind compare by value; arrays, documents and other
/// values compare as equal, so a stable sort keeps their relative order.
pub(crate) fn compare_fields(left: Option<&Bson>, right: Option<&Bson>) -> Ordering {
    match (left, right) {
        (None, None) => Ordering::Equal,
        (None, Some(_)) => Ordering::Less,
        (Some(_), None) => Ordering::Greater,
        (Some(left), Some(right)) => Comparable::from(left).sort_cmp(&Comparable::from(right)),
    }
}

/// Evaluates queries against a single record.
pub(crate) struct RecordEvaluator<'a> {
    record: &'a Record,
}

impl<'a> RecordEvaluator<'a> {
    pub fn new(record: &'a Record) -> Self {
        Self { record }
    }

    pub fn evaluate(&mut self, query: &Query) -> DocumentStoreResult<bool> {
        self.visit_query(query)
    }

    fn predicate_holds(&self, field: &str, predicate: &Predicate) -> bool {
        let value = self.record.get(field);

        match predicate {
            Predicate::Exists(should_exist) => value.is_some() == *should_exist,
            Predicate::Ne(expected) => !value.is_some_and(|value| values_equal(value, expected)),
            Predicate::Nin(values) => !value.is_some_and(|value| values.iter().any(|v| values_equal(value, v))),
            Predicate::Eq(expected) => value.is_some_and(|value| values_equal(value, expected)),
            Predicate::In(values) => value.is_some_and(|value| values.iter().any(|v| values_equal(value, v))),
            Predicate::Gt(bound) | Predicate::Gte(bound) | Predicate::Lt(bound) | Predicate::Lte(bound) => {
                let Some(value) = value else {
                    return false;
                };

                match Comparable::from(value).partial_cmp(&Comparable::from(bound)) {
                    Some(ordering) => match predicate {
                        Predicate::Gt(_) => ordering == Ordering::Greater,
                        Predicate::Gte(_) => ordering != Ordering::Less,
                        Predicate::Lt(_) => ordering == Ordering::Less,
                        _ => ordering != Ordering::Greater,
                    },
                    None => false,
                }
            }
        }
    }
}

impl<'a> QueryVisitor for RecordEvaluator<'a> {
    type Output = bool;
    type Error = DocumentStoreError;

    fn visit_id(&mut self, id: &Bson) -> Result<Self::Output, Self::Error> {
        let key = identifier_key(id)?;
        let Some(own) = record_id(self.record) else {
            return Ok(false);
        };

        Ok(storage_key(own)? == key)
    }

    fn visit_equality(&mut self, fields: &Record) -> Result<Self::Output, Self::Error> {
        Ok(fields.iter().all(|(field, expected)| {
            self.record
                .get(field)
                .is_some_and(|value| values_equal(value, expected))
        }))
    }

    fn visit_predicates(&mut self, predicates: &[FieldPredicate]) -> Result<Self::Output, Self::Error> {
        Ok(predicates
            .iter()
            .all(|FieldPredicate { field, predicate }| self.predicate_holds(field, predicate)))
    }
}

/// Returns `true` if `record` satisfies `query`.
///
/// # Errors
///
/// Returns [`DocumentStoreError::MalformedQuery`] if an identifier query compares against a
/// value that has no storage key.
pub fn matches(query: &Query, record: &Record) -> DocumentStoreResult<bool> {
    RecordEvaluator::new(record).evaluate(query)
}

#[cfg(test)]
mod tests {
    use bson::doc;
    use chrono::{TimeZone, Utc};
    use proptest::prelude::*;

    use memdoc_core::query::Filter;

    use super::*;

    fn parsed(selector: Record) -> Query {
        Query::from_record(selector).unwrap()
    }

    #[test]
    fn empty_query_matches_everything() {
        assert!(matches(&Query::all(), &doc! { "id": 1 }).unwrap());
        assert!(matches(&Query::all(), &Record::new()).unwrap());
    }

    #[test]
    fn numbers_compare_across_widths() {
        let record = doc! { "n": 3_i64 };

        assert!(matches(&parsed(doc! { "n": 3 }), &record).unwrap());
        assert!(matches(&parsed(doc! { "n": 3.0 }), &record).unwrap());
        assert!(!matches(&parsed(doc! { "n": 3.5 }), &record).unwrap());
    }

    #[test]
    fn strings_never_equal_numbers() {
        let record = doc! { "n": "3" };

        assert!(!matches(&parsed(doc! { "n": 3 }), &record).unwrap());
        assert!(matches(&parsed(doc! { "n": "3" }), &record).unwrap());
    }

    #[test]
    fn arrays_compare_in_order() {
        let record = doc! { "tags": ["a", "b"] };

        assert!(matches(&parsed(doc! { "tags": ["a", "b"] }), &record).unwrap());
        assert!(!matches(&parsed(doc! { "tags": ["b", "a"] }), &record).unwrap());
        assert!(!matches(&parsed(doc! { "tags": "a" }), &record).unwrap());
    }

    #[test]
    fn nested_documents_ignore_key_order() {
        let record = doc! { "address": { "city": "Oslo", "zip": "0150" } };

        assert!(matches(&parsed(doc! { "address": { "zip": "0150", "city": "Oslo" } }), &record).unwrap());
        assert!(!matches(&parsed(doc! { "address": { "city": "Oslo" } }), &record).unwrap());
    }

    #[test]
    fn missing_fields_only_match_negations() {
        let record = doc! { "id": 1 };

        assert!(!matches(&parsed(doc! { "age": Bson::Null }), &record).unwrap());
        assert!(!matches(&Filter::eq("age", 3), &record).unwrap());
        assert!(!matches(&Filter::any_of("age", [1, 2]), &record).unwrap());
        assert!(!matches(&Filter::gt("age", 0), &record).unwrap());

        assert!(matches(&Filter::ne("age", 3), &record).unwrap());
        assert!(matches(&Filter::none_of("age", [1, 2]), &record).unwrap());
        assert!(matches(&Filter::not_exists("age"), &record).unwrap());
        assert!(!matches(&Filter::exists("age"), &record).unwrap());
    }

    #[test]
    fn ranges_compare_within_a_kind() {
        let record = doc! { "age": 30, "name": "mallory", "active": true };

        assert!(matches(&Filter::gte("age", 30), &record).unwrap());
        assert!(!matches(&Filter::gt("age", 30), &record).unwrap());
        assert!(matches(&Filter::lt("age", 30.5), &record).unwrap());
        assert!(matches(&Filter::lte("name", "z"), &record).unwrap());
        assert!(matches(&Filter::gt("active", false), &record).unwrap());

        assert!(!matches(&Filter::gt("age", "1"), &record).unwrap());
        assert!(!matches(&Filter::lt("name", 100), &record).unwrap());
    }

    #[test]
    fn datetime_ranges() {
        let at = |day| DateTime::from_chrono(Utc.with_ymd_and_hms(2024, 1, day, 0, 0, 0).unwrap());
        let record = doc! { "created": at(10) };

        let window = Filter::gte("created", at(1)).and(Filter::lt("created", at(15)));
        assert!(matches(&window, &record).unwrap());
        assert!(!matches(&Filter::gt("created", at(10)), &record).unwrap());
    }

    #[test]
    fn set_membership() {
        let record = doc! { "status": "open" };

        assert!(matches(&Filter::any_of("status", ["open", "pending"]), &record).unwrap());
        assert!(!matches(&Filter::none_of("status", ["open"]), &record).unwrap());
    }

    #[test]
    fn identifier_queries_match_by_key() {
        let record = doc! { "id": 1_i64, "name": "a" };

        assert!(matches(&Query::id(1), &record).unwrap());
        assert!(matches(&Query::id("1"), &record).unwrap());
        assert!(!matches(&Query::id(2), &record).unwrap());
        assert!(!matches(&Query::id(1), &doc! { "name": "a" }).unwrap());
    }

    #[test]
    fn identifier_without_key_is_malformed() {
        let err = matches(&Query::id(Bson::Null), &doc! { "id": 1 }).unwrap_err();
        assert!(matches!(err, DocumentStoreError::MalformedQuery(_)));
    }

    #[test]
    fn compare_fields_puts_missing_first() {
        let one = Bson::Int32(1);
        let text = Bson::String("x".into());

        assert_eq!(compare_fields(None, Some(&one)), Ordering::Less);
        assert_eq!(compare_fields(Some(&one), None), Ordering::Greater);
        assert_eq!(compare_fields(Some(&one), Some(&text)), Ordering::Less);
        assert_eq!(compare_fields(Some(&Bson::Null), Some(&one)), Ordering::Less);
    }

    #[test]
    fn mixed_kinds_sort_by_rank_then_value() {
        let mut values = vec![
            Bson::Int32(2),
            Bson::String("x".into()),
            Bson::Int32(1),
            Bson::Boolean(false),
            Bson::Double(f64::NAN),
            Bson::String("a".into()),
            Bson::Double(1.5),
        ];
        values.sort_by(|a, b| compare_fields(Some(a), Some(b)));

        assert!(matches!(values[0], Bson::Double(v) if v.is_nan()));
        assert_eq!(
            values[1..],
            [
                Bson::Int32(1),
                Bson::Double(1.5),
                Bson::Int32(2),
                Bson::String("a".into()),
                Bson::String("x".into()),
                Bson::Boolean(false),
            ]
        );
    }

    #[test]
    fn large_integers_compare_exactly_with_doubles() {
        let big = 9_007_199_254_740_993_i64; // 2^53 + 1
        let rounded = Bson::Double(9_007_199_254_740_992.0);

        assert!(!values_equal(&Bson::Int64(big), &rounded));
        assert!(values_equal(&Bson::Int64(big - 1), &rounded));
        assert!(matches(&Filter::gt("n", rounded.clone()), &doc! { "n": big }).unwrap());
        assert!(values_equal(&Bson::Int32(0), &Bson::Double(-0.0)));
        assert!(!values_equal(&Bson::Int64(i64::MAX), &Bson::Double(9_223_372_036_854_775_808.0)));
    }

    proptest! {
        #[test]
        fn equality_query_matches_iff_every_field_matches(
            record_values in proptest::collection::btree_map("[a-c]", 0i32..4, 0..4),
            query_values in proptest::collection::btree_map("[a-c]", 0i32..4, 0..4),
        ) {
            let record: Record = record_values
                .iter()
                .map(|(key, value)| (key.clone(), Bson::Int32(*value)))
                .collect();
            let selector: Record = query_values
                .iter()
                .map(|(key, value)| (key.clone(), Bson::Int64(i64::from(*value))))
                .collect();

            let expected = query_values
                .iter()
                .all(|(key, value)| record_values.get(key) == Some(value));

            prop_assert_eq!(matches(&Query::Equality(selector), &record).unwrap(), expected);
        }
    }
}
