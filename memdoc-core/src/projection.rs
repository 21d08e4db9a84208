//! Field projections for read results.

use crate::document::Record;

/// A list of field names that narrows the records returned by a read.
///
/// An empty projection returns whole records. Every projected record is a fresh copy, so a
/// caller can never reach stored data through a returned value.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Projection {
    fields: Vec<String>,
}

impl Projection {
    /// A projection returning whole records.
    pub fn all() -> Self {
        Self::default()
    }

    /// A projection returning only the given fields.
    pub fn fields<I, S>(fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            fields: fields.into_iter().map(Into::into).collect(),
        }
    }

    /// Returns `true` if this projection returns whole records.
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// The requested field names.
    pub fn field_names(&self) -> &[String] {
        &self.fields
    }

    /// Copies the requested fields of `record`, in projection order.
    ///
    /// Requested fields missing from `record` are left out.
    pub fn apply(&self, record: &Record) -> Record {
        if self.fields.is_empty() {
            return record.clone();
        }

        let mut projected = Record::new();
        for field in &self.fields {
            if let Some(value) = record.get(field) {
                projected.insert(field.clone(), value.clone());
            }
        }

        projected
    }
}

impl<S: Into<String>> From<Vec<S>> for Projection {
    fn from(fields: Vec<S>) -> Self {
        Projection::fields(fields)
    }
}

impl<S: Into<String> + Clone> From<&[S]> for Projection {
    fn from(fields: &[S]) -> Self {
        Projection::fields(fields.iter().cloned())
    }
}

impl<S: Into<String>, const N: usize> From<[S; N]> for Projection {
    fn from(fields: [S; N]) -> Self {
        Projection::fields(fields)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use bson::{Bson, doc};
    use proptest::prelude::*;

    use super::*;

    #[test]
    fn empty_projection_copies_the_record() {
        let record = doc! { "id": 1, "name": "a" };
        let mut projected = Projection::all().apply(&record);

        assert_eq!(projected, record);

        projected.insert("name", "changed");
        assert_eq!(record.get_str("name").unwrap(), "a");
    }

    #[test]
    fn projection_keeps_requested_fields_in_order() {
        let record = doc! { "id": 1, "name": "a", "age": 3 };
        let projected = Projection::from(["age", "id"]).apply(&record);

        assert_eq!(projected, doc! { "age": 3, "id": 1 });
        assert_eq!(projected.keys().collect::<Vec<_>>(), vec!["age", "id"]);
    }

    #[test]
    fn missing_fields_are_omitted() {
        let record = doc! { "id": 1 };
        let projected = Projection::fields(["id", "missing"]).apply(&record);

        assert_eq!(projected, doc! { "id": 1 });
    }

    proptest! {
        #[test]
        fn projected_keys_are_the_intersection(
            present in proptest::collection::btree_set("[a-e]", 0..5),
            requested in proptest::collection::vec("[a-g]", 1..6),
        ) {
            let record: Record = present
                .iter()
                .map(|key| (key.clone(), Bson::Int32(1)))
                .collect();
            let projected = Projection::fields(requested.clone()).apply(&record);

            let keys: BTreeSet<String> = projected.keys().cloned().collect();
            let expected: BTreeSet<String> = requested
                .into_iter()
                .filter(|field| present.contains(field))
                .collect();

            prop_assert_eq!(keys, expected);
        }
    }
}
