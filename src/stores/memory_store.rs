use async_trait::async_trait;
use serde_json::{json, Value as JsonValue};
use std::collections::HashMap;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;

use crate::stores::store_trait::{DocumentStore, StoreCapabilities, StoreInitConfig};
use crate::utils::{
    error::{PlanoResult, StoreError},
    types::{
        compare_document_values, predicate_matches, sort_documents, Accumulator,
        AggregationPipeline, Document, ExecutionStats, FieldPredicate, IndexDescriptor,
        QueryDescriptor, StoreType,
    },
};

/// In-memory document store with deterministic seed data.
///
/// The primary test vehicle for the planner: `explain` reports the number
/// of documents the store actually examined, so index-vs-scan comparisons
/// are observable without a real backend.
pub struct MemoryStore {
    connected: bool,
    collections: RwLock<HashMap<String, MemCollection>>,
    connection_delay_ms: u64,
}

/// Documents plus index catalog for one collection
struct MemCollection {
    documents: Vec<Document>,
    indexes: Vec<IndexDescriptor>,
}

impl MemoryStore {
    /// Create a new memory store seeded with the books collection
    pub fn new() -> Self {
        let mut collections = HashMap::new();
        collections.insert(
            "books".to_string(),
            MemCollection { documents: seed_books(), indexes: Vec::new() },
        );

        Self {
            connected: false,
            collections: RwLock::new(collections),
            connection_delay_ms: 0,
        }
    }

    /// Create an empty memory store with no seed data
    pub fn empty() -> Self {
        Self {
            connected: false,
            collections: RwLock::new(HashMap::new()),
            connection_delay_ms: 0,
        }
    }

    /// Create a memory store that simulates connection latency
    pub fn with_delay(delay_ms: u64) -> Self {
        let mut store = Self::new();
        store.connection_delay_ms = delay_ms;
        store
    }

    /// Replace or create a collection with the given documents. Only usable
    /// while the store is exclusively owned, i.e. before registration.
    pub fn add_collection(&mut self, name: &str, documents: Vec<Document>) {
        self.collections.get_mut().insert(
            name.to_string(),
            MemCollection { documents, indexes: Vec::new() },
        );
    }

    fn ensure_connected(&self) -> PlanoResult<()> {
        if !self.connected {
            return Err(StoreError::Unavailable("memory store is not connected".to_string()).into());
        }
        Ok(())
    }

    /// Resolve a hint against the collection's catalog. Unknown hints are a
    /// query failure, matching driver behavior for bad hints.
    fn resolve_hint<'a>(
        collection: &'a MemCollection,
        hint: &IndexDescriptor,
    ) -> PlanoResult<&'a IndexDescriptor> {
        collection
            .indexes
            .iter()
            .find(|idx| idx.name == hint.name || idx.fields == hint.fields)
            .ok_or_else(|| {
                StoreError::QueryFailed(format!("hint '{}' does not match any index", hint.name))
                    .into()
            })
    }

    /// Documents an index scan would touch: those matching the constrained
    /// prefix of the index key. An unconstrained leading field degrades to
    /// the whole collection.
    fn examined_by_index(
        collection: &MemCollection,
        descriptor: &QueryDescriptor,
        index: &IndexDescriptor,
    ) -> u64 {
        let mut prefix: Vec<FieldPredicate> = Vec::new();
        for index_field in &index.fields {
            match descriptor.constraints_on(&index_field.field) {
                Some(predicate) => prefix.push(predicate.clone()),
                None => break,
            }
        }

        if prefix.is_empty() {
            return collection.documents.len() as u64;
        }

        collection
            .documents
            .iter()
            .filter(|doc| predicate_matches(&prefix, doc))
            .count() as u64
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn connect(&mut self, _config: StoreInitConfig) -> PlanoResult<()> {
        if self.connection_delay_ms > 0 {
            tokio::time::sleep(Duration::from_millis(self.connection_delay_ms)).await;
        }
        self.connected = true;
        Ok(())
    }

    async fn disconnect(&mut self) -> PlanoResult<()> {
        self.connected = false;
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.connected
    }

    async fn count(&self, collection: &str, predicate: &[FieldPredicate]) -> PlanoResult<u64> {
        self.ensure_connected()?;
        let collections = self.collections.read().await;
        let coll = collections
            .get(collection)
            .ok_or_else(|| StoreError::UnknownCollection(collection.to_string()))?;

        Ok(coll
            .documents
            .iter()
            .filter(|doc| predicate_matches(predicate, doc))
            .count() as u64)
    }

    async fn find(
        &self,
        collection: &str,
        descriptor: &QueryDescriptor,
        hint: Option<&IndexDescriptor>,
    ) -> PlanoResult<Vec<Document>> {
        self.ensure_connected()?;
        let collections = self.collections.read().await;
        let coll = collections
            .get(collection)
            .ok_or_else(|| StoreError::UnknownCollection(collection.to_string()))?;

        if let Some(hint) = hint {
            Self::resolve_hint(coll, hint)?;
        }

        let mut matched: Vec<Document> = coll
            .documents
            .iter()
            .filter(|doc| predicate_matches(&descriptor.predicate, doc))
            .cloned()
            .collect();

        sort_documents(&mut matched, &descriptor.sort);

        let skipped = matched.into_iter().skip(descriptor.skip as usize);
        let limited: Vec<Document> = match descriptor.limit {
            Some(limit) => skipped.take(limit as usize).collect(),
            None => skipped.collect(),
        };

        let projected = match &descriptor.projection {
            Some(projection) => limited.iter().map(|doc| projection.apply(doc)).collect(),
            None => limited,
        };

        Ok(projected)
    }

    async fn list_indexes(&self, collection: &str) -> PlanoResult<Vec<IndexDescriptor>> {
        self.ensure_connected()?;
        let collections = self.collections.read().await;
        let coll = collections
            .get(collection)
            .ok_or_else(|| StoreError::UnknownCollection(collection.to_string()))?;

        Ok(coll.indexes.clone())
    }

    async fn create_index(
        &self,
        collection: &str,
        index: IndexDescriptor,
    ) -> PlanoResult<IndexDescriptor> {
        self.ensure_connected()?;
        if index.fields.is_empty() {
            return Err(StoreError::QueryFailed("index must cover at least one field".to_string())
                .into());
        }

        let mut collections = self.collections.write().await;
        let coll = collections
            .get_mut(collection)
            .ok_or_else(|| StoreError::UnknownCollection(collection.to_string()))?;

        if let Some(existing) = coll.indexes.iter().find(|idx| idx.conflicts_with(&index)) {
            return Err(StoreError::IndexConflict(format!(
                "index '{}' conflicts with existing index '{}'",
                index.name, existing.name
            ))
            .into());
        }

        if index.unique {
            let mut seen: HashMap<String, ()> = HashMap::new();
            for doc in &coll.documents {
                let key: Vec<&JsonValue> = index
                    .fields
                    .iter()
                    .map(|f| doc.get(&f.field).unwrap_or(&JsonValue::Null))
                    .collect();
                let key = serde_json::to_string(&key).unwrap_or_default();
                if seen.insert(key, ()).is_some() {
                    return Err(StoreError::IndexConflict(format!(
                        "unique index '{}' violated by existing documents",
                        index.name
                    ))
                    .into());
                }
            }
        }

        coll.indexes.push(index.clone());
        Ok(index)
    }

    async fn explain(
        &self,
        collection: &str,
        descriptor: &QueryDescriptor,
        hint: Option<&IndexDescriptor>,
    ) -> PlanoResult<ExecutionStats> {
        self.ensure_connected()?;
        let start = Instant::now();
        let collections = self.collections.read().await;
        let coll = collections
            .get(collection)
            .ok_or_else(|| StoreError::UnknownCollection(collection.to_string()))?;

        let docs_examined = match hint {
            Some(hint) => {
                let index = Self::resolve_hint(coll, hint)?;
                Self::examined_by_index(coll, descriptor, index)
            }
            None => coll.documents.len() as u64,
        };

        // Walk the examined documents so elapsed time tracks the work an
        // execution would do.
        let _matched = coll
            .documents
            .iter()
            .filter(|doc| predicate_matches(&descriptor.predicate, doc))
            .count();

        let elapsed_millis = start.elapsed().as_secs_f64() * 1000.0;
        Ok(ExecutionStats::new(docs_examined, elapsed_millis))
    }

    async fn aggregate(
        &self,
        collection: &str,
        pipeline: &AggregationPipeline,
    ) -> PlanoResult<Vec<Document>> {
        self.ensure_connected()?;
        let collections = self.collections.read().await;
        let coll = collections
            .get(collection)
            .ok_or_else(|| StoreError::UnknownCollection(collection.to_string()))?;

        let matched: Vec<&Document> = coll
            .documents
            .iter()
            .filter(|doc| predicate_matches(&pipeline.filter, doc))
            .collect();

        // Group by the serialized key value; the original value rides along
        // for the output document.
        let mut groups: HashMap<String, (JsonValue, Vec<&Document>)> = HashMap::new();
        for doc in matched {
            let key_value = doc.get(&pipeline.group.group_by).cloned().unwrap_or(JsonValue::Null);
            let key = serde_json::to_string(&key_value).unwrap_or_default();
            groups.entry(key).or_insert_with(|| (key_value, Vec::new())).1.push(doc);
        }

        let mut results: Vec<Document> = Vec::with_capacity(groups.len());
        for (_, (key_value, docs)) in groups {
            let mut out = Document::new();
            out.insert("_id".to_string(), key_value);
            for (name, accumulator) in &pipeline.group.accumulators {
                out.insert(name.clone(), apply_accumulator(accumulator, &docs));
            }
            results.push(out);
        }

        // Group output order is arbitrary, so settle it by key first; the
        // stable pipeline sort then keeps ties deterministic.
        results.sort_by(|a, b| {
            let ka = a.get("_id").unwrap_or(&JsonValue::Null);
            let kb = b.get("_id").unwrap_or(&JsonValue::Null);
            compare_document_values(ka, kb)
        });
        sort_documents(&mut results, &pipeline.sort);

        if let Some(limit) = pipeline.limit {
            results.truncate(limit as usize);
        }

        Ok(results)
    }

    async fn insert_many(&self, collection: &str, documents: Vec<Document>) -> PlanoResult<u64> {
        self.ensure_connected()?;
        let mut collections = self.collections.write().await;
        let coll = collections
            .entry(collection.to_string())
            .or_insert_with(|| MemCollection { documents: Vec::new(), indexes: Vec::new() });

        let inserted = documents.len() as u64;
        coll.documents.extend(documents);
        Ok(inserted)
    }

    async fn update_one(
        &self,
        collection: &str,
        predicate: &[FieldPredicate],
        set: Document,
    ) -> PlanoResult<u64> {
        self.ensure_connected()?;
        let mut collections = self.collections.write().await;
        let coll = collections
            .get_mut(collection)
            .ok_or_else(|| StoreError::UnknownCollection(collection.to_string()))?;

        for doc in coll.documents.iter_mut() {
            if predicate_matches(predicate, doc) {
                for (key, value) in &set {
                    doc.insert(key.clone(), value.clone());
                }
                return Ok(1);
            }
        }
        Ok(0)
    }

    async fn delete_one(&self, collection: &str, predicate: &[FieldPredicate]) -> PlanoResult<u64> {
        self.ensure_connected()?;
        let mut collections = self.collections.write().await;
        let coll = collections
            .get_mut(collection)
            .ok_or_else(|| StoreError::UnknownCollection(collection.to_string()))?;

        if let Some(position) =
            coll.documents.iter().position(|doc| predicate_matches(predicate, doc))
        {
            coll.documents.remove(position);
            return Ok(1);
        }
        Ok(0)
    }

    fn store_type(&self) -> StoreType {
        StoreType::Memory
    }

    fn capabilities(&self) -> StoreCapabilities {
        StoreCapabilities {
            supports_indexes: true,
            supports_hints: true,
            supports_explain: true,
            supports_aggregation: true,
            read_only: false,
        }
    }
}

fn apply_accumulator(accumulator: &Accumulator, docs: &[&Document]) -> JsonValue {
    match accumulator {
        Accumulator::Count => JsonValue::from(docs.len() as i64),
        Accumulator::Sum(field) => numeric_fold(field, docs, |sum, _count| sum),
        Accumulator::Avg(field) => {
            numeric_fold(field, docs, |sum, count| if count > 0 { sum / count as f64 } else { 0.0 })
        }
        Accumulator::Min(field) => extremum(field, docs, std::cmp::Ordering::Less),
        Accumulator::Max(field) => extremum(field, docs, std::cmp::Ordering::Greater),
        Accumulator::Push(field) => JsonValue::Array(
            docs.iter().filter_map(|doc| doc.get(field.as_str()).cloned()).collect(),
        ),
    }
}

/// Fold numeric field values, ignoring missing and non-numeric entries the
/// way document stores do for $sum/$avg
fn numeric_fold(field: &str, docs: &[&Document], finish: fn(f64, usize) -> f64) -> JsonValue {
    let mut sum = 0.0;
    let mut count = 0usize;
    let mut all_integers = true;

    for doc in docs {
        if let Some(JsonValue::Number(n)) = doc.get(field) {
            if let Some(f) = n.as_f64() {
                sum += f;
                count += 1;
                if n.as_i64().is_none() {
                    all_integers = false;
                }
            }
        }
    }

    let result = finish(sum, count);
    if all_integers && result.fract() == 0.0 && result.abs() < i64::MAX as f64 {
        JsonValue::from(result as i64)
    } else {
        serde_json::Number::from_f64(result).map(JsonValue::Number).unwrap_or(JsonValue::Null)
    }
}

fn extremum(field: &str, docs: &[&Document], keep: std::cmp::Ordering) -> JsonValue {
    let mut best: Option<&JsonValue> = None;
    for doc in docs {
        if let Some(value) = doc.get(field) {
            best = match best {
                None => Some(value),
                Some(current) => {
                    if compare_document_values(value, current) == keep {
                        Some(value)
                    } else {
                        Some(current)
                    }
                }
            };
        }
    }
    best.cloned().unwrap_or(JsonValue::Null)
}

/// Deterministic bookstore seed data
fn seed_books() -> Vec<Document> {
    let raw = vec![
        json!({"_id": 1, "title": "1984", "author": "George Orwell", "genre": "Fiction",
               "published_year": 1949, "price": 10.99, "in_stock": true, "pages": 328}),
        json!({"_id": 2, "title": "Animal Farm", "author": "George Orwell", "genre": "Fiction",
               "published_year": 1945, "price": 8.50, "in_stock": false, "pages": 112}),
        json!({"_id": 3, "title": "Brave New World", "author": "Aldous Huxley", "genre": "Fiction",
               "published_year": 1932, "price": 11.50, "in_stock": false, "pages": 311}),
        json!({"_id": 4, "title": "The Hobbit", "author": "J.R.R. Tolkien", "genre": "Fantasy",
               "published_year": 1937, "price": 14.99, "in_stock": true, "pages": 310}),
        json!({"_id": 5, "title": "The Lord of the Rings", "author": "J.R.R. Tolkien",
               "genre": "Fantasy", "published_year": 1954, "price": 19.99, "in_stock": true,
               "pages": 1178}),
        json!({"_id": 6, "title": "To Kill a Mockingbird", "author": "Harper Lee",
               "genre": "Fiction", "published_year": 1960, "price": 12.99, "in_stock": true,
               "pages": 336}),
        json!({"_id": 7, "title": "The Alchemist", "author": "Paulo Coelho", "genre": "Fiction",
               "published_year": 1988, "price": 13.99, "in_stock": true, "pages": 197}),
        json!({"_id": 8, "title": "Moby Dick", "author": "Herman Melville", "genre": "Adventure",
               "published_year": 1851, "price": 9.99, "in_stock": false, "pages": 635}),
        json!({"_id": 9, "title": "Wuthering Heights", "author": "Emily Bronte", "genre": "Gothic",
               "published_year": 1847, "price": 7.99, "in_stock": true, "pages": 342}),
        json!({"_id": 10, "title": "The Great Gatsby", "author": "F. Scott Fitzgerald",
               "genre": "Fiction", "published_year": 1925, "price": 10.50, "in_stock": true,
               "pages": 180}),
        json!({"_id": 11, "title": "The Silmarillion", "author": "J.R.R. Tolkien",
               "genre": "Fantasy", "published_year": 1977, "price": 16.50, "in_stock": false,
               "pages": 365}),
        json!({"_id": 12, "title": "Homage to Catalonia", "author": "George Orwell",
               "genre": "Memoir", "published_year": 1938, "price": 12.25, "in_stock": true,
               "pages": 232}),
    ];

    raw.into_iter()
        .map(|value| match value {
            JsonValue::Object(map) => map,
            _ => Document::new(),
        })
        .collect()
}
