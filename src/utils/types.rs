use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::cmp::Ordering;
use std::collections::BTreeSet;

/// A stored document. The default serde_json map is ordered by key, which
/// keeps every descriptor built from one deterministic.
pub type Document = serde_json::Map<String, JsonValue>;

/// Typed operand of a predicate constraint
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum FieldValue {
    String(String),
    Integer(i64),
    Number(f64),
    Boolean(bool),
    Null,
}

impl FieldValue {
    /// Convert a raw JSON scalar into a typed operand. Objects and arrays
    /// are not valid operands and yield `None`.
    pub fn from_json(value: &JsonValue) -> Option<Self> {
        match value {
            JsonValue::String(s) => Some(FieldValue::String(s.clone())),
            JsonValue::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Some(FieldValue::Integer(i))
                } else {
                    n.as_f64().map(FieldValue::Number)
                }
            }
            JsonValue::Bool(b) => Some(FieldValue::Boolean(*b)),
            JsonValue::Null => Some(FieldValue::Null),
            _ => None,
        }
    }

    /// Render the operand back as a JSON value
    pub fn to_json(&self) -> JsonValue {
        match self {
            FieldValue::String(s) => JsonValue::String(s.clone()),
            FieldValue::Integer(i) => JsonValue::from(*i),
            FieldValue::Number(n) => {
                serde_json::Number::from_f64(*n).map(JsonValue::Number).unwrap_or(JsonValue::Null)
            }
            FieldValue::Boolean(b) => JsonValue::Bool(*b),
            FieldValue::Null => JsonValue::Null,
        }
    }
}

/// A single validated constraint on a document field.
///
/// This is the complete operator set the compiler accepts; anything else in
/// a raw spec fails validation before it reaches a store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Constraint {
    Eq(FieldValue),
    Gt(FieldValue),
    Gte(FieldValue),
    Lt(FieldValue),
    Lte(FieldValue),
    In(Vec<FieldValue>),
}

impl Constraint {
    /// Whether this constraint pins the field to specific values
    pub fn is_equality(&self) -> bool {
        matches!(self, Constraint::Eq(_) | Constraint::In(_))
    }

    /// Whether this constraint bounds the field to a range
    pub fn is_range(&self) -> bool {
        matches!(
            self,
            Constraint::Gt(_) | Constraint::Gte(_) | Constraint::Lt(_) | Constraint::Lte(_)
        )
    }

    /// Evaluate the constraint against a document field value.
    /// A missing field never matches.
    pub fn matches(&self, value: Option<&JsonValue>) -> bool {
        let value = match value {
            Some(v) => v,
            None => return false,
        };

        match self {
            Constraint::Eq(operand) => values_equal(value, operand),
            Constraint::Gt(operand) => {
                compare_to_operand(value, operand).map_or(false, |o| o == Ordering::Greater)
            }
            Constraint::Gte(operand) => {
                compare_to_operand(value, operand).map_or(false, |o| o != Ordering::Less)
            }
            Constraint::Lt(operand) => {
                compare_to_operand(value, operand).map_or(false, |o| o == Ordering::Less)
            }
            Constraint::Lte(operand) => {
                compare_to_operand(value, operand).map_or(false, |o| o != Ordering::Greater)
            }
            Constraint::In(operands) => operands.iter().any(|o| values_equal(value, o)),
        }
    }
}

fn values_equal(value: &JsonValue, operand: &FieldValue) -> bool {
    match (value, operand) {
        (JsonValue::String(v), FieldValue::String(o)) => v == o,
        (JsonValue::Number(v), FieldValue::Integer(o)) => v.as_i64() == Some(*o),
        (JsonValue::Number(v), FieldValue::Number(o)) => {
            v.as_f64().map_or(false, |f| (f - o).abs() < f64::EPSILON)
        }
        (JsonValue::Bool(v), FieldValue::Boolean(o)) => v == o,
        (JsonValue::Null, FieldValue::Null) => true,
        _ => false,
    }
}

fn compare_to_operand(value: &JsonValue, operand: &FieldValue) -> Option<Ordering> {
    match (value, operand) {
        (JsonValue::Number(v), FieldValue::Integer(o)) => {
            if let Some(i) = v.as_i64() {
                Some(i.cmp(o))
            } else {
                v.as_f64().and_then(|f| f.partial_cmp(&(*o as f64)))
            }
        }
        (JsonValue::Number(v), FieldValue::Number(o)) => {
            v.as_f64().and_then(|f| f.partial_cmp(o))
        }
        (JsonValue::String(v), FieldValue::String(o)) => Some(v.as_str().cmp(o.as_str())),
        _ => None,
    }
}

/// Every constraint on a single field. Ranges carry two entries
/// (e.g. `$gt` and `$lt` together).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldPredicate {
    pub field: String,
    pub constraints: Vec<Constraint>,
}

impl FieldPredicate {
    pub fn new(field: impl Into<String>, constraints: Vec<Constraint>) -> Self {
        Self { field: field.into(), constraints }
    }

    /// Evaluate all constraints on this field against a document
    pub fn matches(&self, document: &Document) -> bool {
        let value = document.get(&self.field);
        self.constraints.iter().all(|c| c.matches(value))
    }
}

/// Evaluate a full predicate (all fields ANDed) against a document
pub fn predicate_matches(predicate: &[FieldPredicate], document: &Document) -> bool {
    predicate.iter().all(|p| p.matches(document))
}

/// Sort direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SortDirection {
    Ascending,
    Descending,
}

impl SortDirection {
    pub fn reversed(&self) -> Self {
        match self {
            SortDirection::Ascending => SortDirection::Descending,
            SortDirection::Descending => SortDirection::Ascending,
        }
    }
}

/// One component of a requested sort order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SortField {
    pub field: String,
    pub direction: SortDirection,
}

impl SortField {
    pub fn ascending(field: impl Into<String>) -> Self {
        Self { field: field.into(), direction: SortDirection::Ascending }
    }

    pub fn descending(field: impl Into<String>) -> Self {
        Self { field: field.into(), direction: SortDirection::Descending }
    }
}

/// Projection: an include-set of fields plus an explicit, representable
/// exclusion of the `_id` field. An empty include-set means all fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Projection {
    pub fields: BTreeSet<String>,
    pub include_id: bool,
}

impl Projection {
    /// Apply the projection to a document
    pub fn apply(&self, document: &Document) -> Document {
        let mut projected = Document::new();
        for (key, value) in document {
            if key == "_id" {
                if self.include_id {
                    projected.insert(key.clone(), value.clone());
                }
                continue;
            }
            if self.fields.is_empty() || self.fields.contains(key) {
                projected.insert(key.clone(), value.clone());
            }
        }
        projected
    }
}

/// Normalized query description produced by the compiler.
///
/// Immutable once built: all construction goes through
/// `FilterCompiler::compile`, and every field is validated there.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryDescriptor {
    /// Constrained fields, sorted by field name
    pub predicate: Vec<FieldPredicate>,
    /// Requested ordering, outermost first
    pub sort: Vec<SortField>,
    /// Projection, or `None` for whole documents
    pub projection: Option<Projection>,
    /// Documents to skip before returning results
    pub skip: u64,
    /// Maximum documents to return
    pub limit: Option<u64>,
}

impl QueryDescriptor {
    /// An empty descriptor matching every document
    pub fn empty() -> Self {
        Self { predicate: Vec::new(), sort: Vec::new(), projection: None, skip: 0, limit: None }
    }

    /// The set of fields the predicate constrains
    pub fn predicate_fields(&self) -> BTreeSet<&str> {
        self.predicate.iter().map(|p| p.field.as_str()).collect()
    }

    /// The constraints on one field, if any
    pub fn constraints_on(&self, field: &str) -> Option<&FieldPredicate> {
        self.predicate.iter().find(|p| p.field == field)
    }
}

/// One component of an index key
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexField {
    pub field: String,
    pub direction: SortDirection,
}

impl IndexField {
    pub fn ascending(field: impl Into<String>) -> Self {
        Self { field: field.into(), direction: SortDirection::Ascending }
    }

    pub fn descending(field: impl Into<String>) -> Self {
        Self { field: field.into(), direction: SortDirection::Descending }
    }
}

/// A secondary index over an ordered sequence of fields. Usable for any
/// predicate touching a prefix of that sequence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexDescriptor {
    pub name: String,
    pub fields: Vec<IndexField>,
    pub unique: bool,
}

impl IndexDescriptor {
    /// Create an index with a name derived from its key spec
    pub fn new(fields: Vec<IndexField>) -> Self {
        let name = Self::derive_name(&fields);
        Self { name, fields, unique: false }
    }

    /// Create a unique index with a derived name
    pub fn unique(fields: Vec<IndexField>) -> Self {
        let mut index = Self::new(fields);
        index.unique = true;
        index
    }

    /// `author_1_published_year_-1` style name, matching what document
    /// store drivers generate for unnamed indexes
    pub fn derive_name(fields: &[IndexField]) -> String {
        fields
            .iter()
            .map(|f| {
                let dir = match f.direction {
                    SortDirection::Ascending => "1",
                    SortDirection::Descending => "-1",
                };
                format!("{}_{}", f.field, dir)
            })
            .collect::<Vec<_>>()
            .join("_")
    }

    /// The first field of the index key
    pub fn leading_field(&self) -> Option<&str> {
        self.fields.first().map(|f| f.field.as_str())
    }

    /// Two indexes conflict when they share a name or an identical key spec
    pub fn conflicts_with(&self, other: &IndexDescriptor) -> bool {
        self.name == other.name || self.fields == other.fields
    }
}

/// Observed statistics from running (or simulating) a query
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionStats {
    pub docs_examined: u64,
    pub elapsed_millis: f64,
}

impl ExecutionStats {
    pub fn new(docs_examined: u64, elapsed_millis: f64) -> Self {
        Self { docs_examined, elapsed_millis }
    }
}

/// Result of executing a plan: the matching documents plus observed stats
#[derive(Debug, Clone)]
pub struct QueryOutput {
    pub documents: Vec<Document>,
    pub stats: ExecutionStats,
}

impl QueryOutput {
    pub fn row_count(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }
}

/// Accumulator applied to each group of an aggregation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Accumulator {
    /// Count of documents in the group
    Count,
    /// Sum of a numeric field
    Sum(String),
    /// Average of a numeric field
    Avg(String),
    /// Minimum of a field
    Min(String),
    /// Maximum of a field
    Max(String),
    /// Collected values of a field
    Push(String),
}

/// Grouping stage of an aggregation pipeline
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupSpec {
    /// Field whose value keys each group
    pub group_by: String,
    /// Output field name paired with its accumulator
    pub accumulators: Vec<(String, Accumulator)>,
}

/// Compiled aggregation pipeline: optional match, one group stage, optional
/// sort and limit over the grouped output
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregationPipeline {
    pub filter: Vec<FieldPredicate>,
    pub group: GroupSpec,
    pub sort: Vec<SortField>,
    pub limit: Option<u64>,
}

/// Store implementations known to the engine
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum StoreType {
    Memory,
    File,
    PostgreSQL,
    Custom(String),
}

/// Total order over document field values, used for in-store sorting.
/// Nulls sort first, then booleans, numbers, strings; mixed types fall back
/// to a type rank so the order stays total.
pub fn compare_document_values(a: &JsonValue, b: &JsonValue) -> Ordering {
    match (a, b) {
        (JsonValue::Null, JsonValue::Null) => Ordering::Equal,
        (JsonValue::Null, _) => Ordering::Less,
        (_, JsonValue::Null) => Ordering::Greater,
        (JsonValue::Bool(x), JsonValue::Bool(y)) => x.cmp(y),
        (JsonValue::Number(x), JsonValue::Number(y)) => {
            match (x.as_i64(), y.as_i64()) {
                (Some(i), Some(j)) => i.cmp(&j),
                _ => {
                    let fx = x.as_f64().unwrap_or(f64::NAN);
                    let fy = y.as_f64().unwrap_or(f64::NAN);
                    fx.partial_cmp(&fy).unwrap_or(Ordering::Equal)
                }
            }
        }
        (JsonValue::String(x), JsonValue::String(y)) => x.cmp(y),
        _ => type_rank(a).cmp(&type_rank(b)),
    }
}

fn type_rank(value: &JsonValue) -> u8 {
    match value {
        JsonValue::Null => 0,
        JsonValue::Bool(_) => 1,
        JsonValue::Number(_) => 2,
        JsonValue::String(_) => 3,
        JsonValue::Array(_) => 4,
        JsonValue::Object(_) => 5,
    }
}

/// Sort documents in place by a sequence of sort fields
pub fn sort_documents(documents: &mut [Document], sort: &[SortField]) {
    if sort.is_empty() {
        return;
    }
    documents.sort_by(|a, b| {
        for spec in sort {
            let va = a.get(&spec.field).unwrap_or(&JsonValue::Null);
            let vb = b.get(&spec.field).unwrap_or(&JsonValue::Null);
            let ordering = compare_document_values(va, vb);
            let ordering = match spec.direction {
                SortDirection::Ascending => ordering,
                SortDirection::Descending => ordering.reverse(),
            };
            if ordering != Ordering::Equal {
                return ordering;
            }
        }
        Ordering::Equal
    });
}
