//! Query construction, parsing, and find options.
//!
//! A [`Query`] is resolved once, at the parser boundary, into one of three shapes:
//!
//! - [`Query::Id`] - identifier lookup, served by a direct key access
//! - [`Query::Equality`] - every listed field must be strictly equal
//! - [`Query::Predicate`] - every listed [`FieldPredicate`] must hold
//!
//! Raw document-database style selectors are parsed with [`Query::parse`]:
//!
//! ```ignore
//! use bson::doc;
//! use memdoc::query::Query;
//!
//! let by_id = Query::parse(&"user-1".into())?;                  // Query::Id
//! let by_name = Query::from_record(doc! { "name": "Alice" })?;   // Query::Equality
//! let adults = Query::from_record(doc! { "age": { "$gte": 18 } })?; // Query::Predicate
//! ```
//!
//! The [`Filter`] struct builds predicate queries without raw documents:
//!
//! - Comparison: `eq`, `ne`, `gt`, `gte`, `lt`, `lte`
//! - Set membership: `any_of`, `none_of`
//! - Existence: `exists`, `not_exists`
//!
//! Queries combine with [`Query::and`].

use bson::{Bson, oid::ObjectId};

use crate::{
    document::{ID_FIELD, Record, storage_key},
    error::{DocumentStoreError, DocumentStoreResult},
};

/// A comparison applied to one field of a candidate record.
#[derive(Debug, Clone, PartialEq)]
pub enum Predicate {
    /// Strictly equal to the value.
    Eq(Bson),
    /// Not strictly equal to the value. Matches a missing field.
    Ne(Bson),
    /// Greater than.
    Gt(Bson),
    /// Greater than or equal to.
    Gte(Bson),
    /// Less than.
    Lt(Bson),
    /// Less than or equal to.
    Lte(Bson),
    /// Strictly equal to any of the values.
    In(Vec<Bson>),
    /// Strictly equal to none of the values. Matches a missing field.
    Nin(Vec<Bson>),
    /// The field is present (`true`) or absent (`false`).
    Exists(bool),
}

/// A [`Predicate`] bound to a field name.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldPredicate {
    /// The field the predicate is evaluated against.
    pub field: String,
    /// The predicate itself.
    pub predicate: Predicate,
}

impl FieldPredicate {
    /// Creates a new field predicate.
    pub fn new(field: impl Into<String>, predicate: Predicate) -> Self {
        Self { field: field.into(), predicate }
    }
}

/// A query selecting records in a collection.
#[derive(Debug, Clone, PartialEq)]
pub enum Query {
    /// Selects the record whose identifier has the same storage key.
    Id(Bson),
    /// Selects records whose fields are strictly equal to every listed field.
    /// An empty record selects everything.
    Equality(Record),
    /// Selects records satisfying every predicate. An empty list selects everything.
    Predicate(Vec<FieldPredicate>),
}

impl Default for Query {
    fn default() -> Self {
        Query::all()
    }
}

impl Query {
    /// A query matching every record.
    pub fn all() -> Self {
        Query::Equality(Record::new())
    }

    /// An identifier query.
    pub fn id(id: impl Into<Bson>) -> Self {
        Query::Id(id.into())
    }

    /// Returns `true` if this query is served by a direct key lookup.
    pub fn is_id(&self) -> bool {
        matches!(self, Query::Id(_))
    }

    /// Short label used in log fields.
    pub fn kind(&self) -> &'static str {
        match self {
            Query::Id(_) => "id",
            Query::Equality(_) => "equality",
            Query::Predicate(_) => "predicate",
        }
    }

    /// Parses a raw selector.
    ///
    /// A document is parsed with [`Query::from_record`]; any other value is an identifier
    /// shorthand.
    ///
    /// # Errors
    ///
    /// Returns [`DocumentStoreError::MalformedQuery`] if the selector has an unsupported shape
    /// or a scalar that cannot be used as an identifier.
    pub fn parse(selector: &Bson) -> DocumentStoreResult<Query> {
        match selector {
            Bson::Document(record) => Query::from_record(record.clone()),
            scalar => {
                identifier_key(scalar)?;
                Ok(Query::Id(scalar.clone()))
            }
        }
    }

    /// Parses a selector document.
    ///
    /// - `{}` selects everything.
    /// - `{ "id": <scalar> }` becomes [`Query::Id`].
    /// - A document without operator values becomes [`Query::Equality`].
    /// - Otherwise each field becomes one or more [`FieldPredicate`]s, with plain values
    ///   compared for equality.
    ///
    /// An operator value is a non-empty nested document whose keys all start with `$`, such as
    /// `{ "$gt": 3 }`. Supported operators are `$eq`, `$ne`, `$gt`, `$gte`, `$lt`, `$lte`, `$in`,
    /// `$nin`, and `$exists`.
    ///
    /// # Errors
    ///
    /// Returns [`DocumentStoreError::MalformedQuery`] for top-level operators, unknown
    /// operators, nested documents mixing operators and plain keys, and operands of the
    /// wrong type.
    pub fn from_record(selector: Record) -> DocumentStoreResult<Query> {
        if let Some(key) = selector.keys().find(|key| key.starts_with('$')) {
            return Err(DocumentStoreError::MalformedQuery(format!(
                "top-level operator {key} is not supported"
            )));
        }

        if selector.len() == 1 {
            if let Some(id) = selector.get(ID_FIELD) {
                if !matches!(id, Bson::Document(_) | Bson::Array(_)) && storage_key(id).is_ok() {
                    return Ok(Query::Id(id.clone()));
                }
            }
        }

        let mut has_operators = false;
        for (field, value) in selector.iter() {
            if is_operator_document(field, value)? {
                has_operators = true;
            }
        }

        if !has_operators {
            return Ok(Query::Equality(selector));
        }

        let mut predicates = Vec::with_capacity(selector.len());
        for (field, value) in selector {
            // Mixed operator documents were rejected above.
            match value {
                Bson::Document(operators) if operators.keys().any(|key| key.starts_with('$')) => {
                    for (operator, operand) in operators {
                        predicates.push(FieldPredicate::new(
                            field.clone(),
                            parse_operator(&field, &operator, operand)?,
                        ));
                    }
                }
                value => predicates.push(FieldPredicate::new(field, Predicate::Eq(value))),
            }
        }

        Ok(Query::Predicate(predicates))
    }

    /// Combines this query with another; the result matches records matching both.
    ///
    /// Combining with an identifier query compares the `id` field strictly rather than by
    /// storage key.
    pub fn and(self, other: Query) -> Query {
        let mut predicates = self.into_predicates();
        predicates.extend(other.into_predicates());
        Query::Predicate(predicates)
    }

    fn into_predicates(self) -> Vec<FieldPredicate> {
        match self {
            Query::Id(id) => vec![FieldPredicate::new(ID_FIELD, Predicate::Eq(id))],
            Query::Equality(fields) => fields
                .into_iter()
                .map(|(field, value)| FieldPredicate::new(field, Predicate::Eq(value)))
                .collect(),
            Query::Predicate(predicates) => predicates,
        }
    }
}

/// Storage key of the identifier in an identifier query.
///
/// # Errors
///
/// Returns [`DocumentStoreError::MalformedQuery`] if the identifier has no storage key, however
/// the query was built.
pub fn identifier_key(id: &Bson) -> DocumentStoreResult<String> {
    storage_key(id)
        .map_err(|e| DocumentStoreError::MalformedQuery(format!("identifier shorthand rejected: {e}")))
}

fn is_operator_document(field: &str, value: &Bson) -> DocumentStoreResult<bool> {
    let Bson::Document(nested) = value else {
        return Ok(false);
    };

    let operators = nested.keys().filter(|key| key.starts_with('$')).count();

    match operators {
        0 => Ok(false),
        n if n == nested.len() => Ok(true),
        _ => Err(DocumentStoreError::MalformedQuery(format!(
            "field {field} mixes operators and plain keys"
        ))),
    }
}

fn parse_operator(field: &str, operator: &str, operand: Bson) -> DocumentStoreResult<Predicate> {
    match operator {
        "$eq" => Ok(Predicate::Eq(operand)),
        "$ne" => Ok(Predicate::Ne(operand)),
        "$gt" => range_operand(field, operator, operand).map(Predicate::Gt),
        "$gte" => range_operand(field, operator, operand).map(Predicate::Gte),
        "$lt" => range_operand(field, operator, operand).map(Predicate::Lt),
        "$lte" => range_operand(field, operator, operand).map(Predicate::Lte),
        "$in" => set_operand(field, operator, operand).map(Predicate::In),
        "$nin" => set_operand(field, operator, operand).map(Predicate::Nin),
        "$exists" => match operand {
            Bson::Boolean(should_exist) => Ok(Predicate::Exists(should_exist)),
            other => Err(DocumentStoreError::MalformedQuery(format!(
                "$exists on {field} requires a boolean, found {:?}",
                other.element_type()
            ))),
        },
        unknown => Err(DocumentStoreError::MalformedQuery(format!(
            "unsupported operator {unknown} on field {field}"
        ))),
    }
}

fn range_operand(field: &str, operator: &str, operand: Bson) -> DocumentStoreResult<Bson> {
    match operand {
        Bson::Int32(_) | Bson::Int64(_) | Bson::Double(_) | Bson::String(_) | Bson::Boolean(_) | Bson::DateTime(_) => {
            Ok(operand)
        }
        other => Err(DocumentStoreError::MalformedQuery(format!(
            "{operator} on {field} requires a number, string, boolean or datetime, found {:?}",
            other.element_type()
        ))),
    }
}

fn set_operand(field: &str, operator: &str, operand: Bson) -> DocumentStoreResult<Vec<Bson>> {
    match operand {
        Bson::Array(values) => Ok(values),
        other => Err(DocumentStoreError::MalformedQuery(format!(
            "{operator} on {field} requires an array, found {:?}",
            other.element_type()
        ))),
    }
}

/// Conversion into a [`Query`], used by every collection operation that takes a selector.
///
/// Strings, integers, and ObjectIds are identifier shorthands; records and BSON values are
/// parsed with [`Query::parse`].
pub trait IntoQuery {
    /// Resolves this selector into a query.
    fn into_query(self) -> DocumentStoreResult<Query>;
}

impl IntoQuery for Query {
    fn into_query(self) -> DocumentStoreResult<Query> {
        Ok(self)
    }
}

impl IntoQuery for Record {
    fn into_query(self) -> DocumentStoreResult<Query> {
        Query::from_record(self)
    }
}

impl IntoQuery for Bson {
    fn into_query(self) -> DocumentStoreResult<Query> {
        Query::parse(&self)
    }
}

impl IntoQuery for &str {
    fn into_query(self) -> DocumentStoreResult<Query> {
        Ok(Query::id(self))
    }
}

impl IntoQuery for String {
    fn into_query(self) -> DocumentStoreResult<Query> {
        Ok(Query::id(self))
    }
}

impl IntoQuery for i32 {
    fn into_query(self) -> DocumentStoreResult<Query> {
        Ok(Query::id(self))
    }
}

impl IntoQuery for i64 {
    fn into_query(self) -> DocumentStoreResult<Query> {
        Ok(Query::id(self))
    }
}

impl IntoQuery for ObjectId {
    fn into_query(self) -> DocumentStoreResult<Query> {
        Ok(Query::id(self))
    }
}

/// Helper struct for constructing predicate queries.
///
/// # Example
///
/// ```ignore
/// use memdoc::query::Filter;
///
/// let query = Filter::eq("status", "active")
///     .and(Filter::gt("age", 18));
/// ```
pub struct Filter;

impl Filter {
    fn single(field: impl Into<String>, predicate: Predicate) -> Query {
        Query::Predicate(vec![FieldPredicate::new(field, predicate)])
    }

    /// Matches records where the field strictly equals the value.
    pub fn eq(field: impl Into<String>, value: impl Into<Bson>) -> Query {
        Self::single(field, Predicate::Eq(value.into()))
    }

    /// Matches records where the field is missing or not strictly equal to the value.
    pub fn ne(field: impl Into<String>, value: impl Into<Bson>) -> Query {
        Self::single(field, Predicate::Ne(value.into()))
    }

    /// Matches records where the field is greater than the value.
    pub fn gt(field: impl Into<String>, value: impl Into<Bson>) -> Query {
        Self::single(field, Predicate::Gt(value.into()))
    }

    /// Matches records where the field is greater than or equal to the value.
    pub fn gte(field: impl Into<String>, value: impl Into<Bson>) -> Query {
        Self::single(field, Predicate::Gte(value.into()))
    }

    /// Matches records where the field is less than the value.
    pub fn lt(field: impl Into<String>, value: impl Into<Bson>) -> Query {
        Self::single(field, Predicate::Lt(value.into()))
    }

    /// Matches records where the field is less than or equal to the value.
    pub fn lte(field: impl Into<String>, value: impl Into<Bson>) -> Query {
        Self::single(field, Predicate::Lte(value.into()))
    }

    /// Matches records where the field equals any of the values.
    pub fn any_of<V: Into<Bson>>(field: impl Into<String>, values: impl IntoIterator<Item = V>) -> Query {
        Self::single(field, Predicate::In(values.into_iter().map(Into::into).collect()))
    }

    /// Matches records where the field is missing or equals none of the values.
    pub fn none_of<V: Into<Bson>>(field: impl Into<String>, values: impl IntoIterator<Item = V>) -> Query {
        Self::single(field, Predicate::Nin(values.into_iter().map(Into::into).collect()))
    }

    /// Matches records that have the field.
    pub fn exists(field: impl Into<String>) -> Query {
        Self::single(field, Predicate::Exists(true))
    }

    /// Matches records that lack the field.
    pub fn not_exists(field: impl Into<String>) -> Query {
        Self::single(field, Predicate::Exists(false))
    }
}

/// Visitor over the three query shapes, implemented by backends that evaluate or translate
/// queries.
pub trait QueryVisitor {
    type Output;
    type Error: Into<DocumentStoreError>;

    fn visit_id(&mut self, id: &Bson) -> Result<Self::Output, Self::Error>;
    fn visit_equality(&mut self, fields: &Record) -> Result<Self::Output, Self::Error>;
    fn visit_predicates(&mut self, predicates: &[FieldPredicate]) -> Result<Self::Output, Self::Error>;

    fn visit_query(&mut self, query: &Query) -> Result<Self::Output, Self::Error> {
        match query {
            Query::Id(id) => self.visit_id(id),
            Query::Equality(fields) => self.visit_equality(fields),
            Query::Predicate(predicates) => self.visit_predicates(predicates),
        }
    }
}

/// Sort direction for query results.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
    /// Ascending order (A to Z, 0 to 9, earliest to latest).
    Asc,
    /// Descending order (Z to A, 9 to 0, latest to earliest).
    Desc,
}

/// Sort specification for query results.
#[derive(Debug, Clone, PartialEq)]
pub struct Sort {
    /// The field name to sort by.
    pub field: String,
    /// The sort direction.
    pub direction: SortDirection,
}

/// Options applied to matched records before projection.
///
/// Options never change which records match. With the default options, results are
/// returned in collection order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FindOptions {
    /// Sort specification for results.
    pub sort: Option<Sort>,
    /// Number of matched records to skip.
    pub skip: Option<usize>,
    /// Maximum number of records to return.
    pub limit: Option<usize>,
}

impl FindOptions {
    /// Options that leave results untouched.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a new builder for fluent construction.
    pub fn builder() -> FindOptionsBuilder {
        FindOptionsBuilder::new()
    }
}

#[derive(Debug, Clone, Default)]
pub struct FindOptionsBuilder {
    options: FindOptions,
}

impl FindOptionsBuilder {
    /// Creates a new options builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the sort specification.
    pub fn sort(mut self, field: impl Into<String>, direction: SortDirection) -> Self {
        self.options.sort = Some(Sort { field: field.into(), direction });
        self
    }

    /// Sets the number of matched records to skip.
    pub fn skip(mut self, skip: usize) -> Self {
        self.options.skip = Some(skip);
        self
    }

    /// Sets the maximum number of records to return.
    pub fn limit(mut self, limit: usize) -> Self {
        self.options.limit = Some(limit);
        self
    }

    /// Builds and returns the final options.
    pub fn build(self) -> FindOptions {
        self.options
    }
}
