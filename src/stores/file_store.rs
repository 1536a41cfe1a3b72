use async_trait::async_trait;
use glob::glob;
use serde_json::Value as JsonValue;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use tokio::sync::RwLock;

use crate::stores::store_trait::{DocumentStore, StoreCapabilities, StoreInitConfig};
use crate::utils::{
    error::{PlanoResult, StoreError},
    types::{
        predicate_matches, sort_documents, AggregationPipeline, Document, ExecutionStats,
        FieldPredicate, IndexDescriptor, QueryDescriptor, StoreType,
    },
};

/// Read-only document store over JSON files.
///
/// A collection named `books` maps to `<base_path>/books.json`, holding a
/// JSON array of documents (or a single document). Collection names may
/// also be glob patterns; all matching `.json` files are merged.
///
/// The store carries no index catalog, so every plan against it is a full
/// scan. Mutating operations are rejected.
pub struct FileStore {
    base_path: Option<PathBuf>,
    connected: bool,
    cache: RwLock<HashMap<String, Vec<Document>>>,
}

impl FileStore {
    /// Create a new file store instance
    pub fn new() -> Self {
        Self { base_path: None, connected: false, cache: RwLock::new(HashMap::new()) }
    }

    fn ensure_connected(&self) -> PlanoResult<&Path> {
        if !self.connected {
            return Err(StoreError::Unavailable("file store is not connected".to_string()).into());
        }
        self.base_path
            .as_deref()
            .ok_or_else(|| StoreError::Unavailable("file store has no base path".to_string()).into())
    }

    /// Resolve a collection name to the files backing it
    fn resolve_files(&self, base_path: &Path, collection: &str) -> PlanoResult<Vec<PathBuf>> {
        if collection.contains('*') || collection.contains('?') {
            let pattern = base_path.join(format!("{}.json", collection));
            let pattern = pattern.to_string_lossy().to_string();
            let mut paths = Vec::new();

            let entries = glob(&pattern).map_err(|e| {
                StoreError::QueryFailed(format!("invalid collection pattern: {}", e))
            })?;
            for entry in entries {
                match entry {
                    Ok(path) if path.is_file() => paths.push(path),
                    _ => continue,
                }
            }

            if paths.is_empty() {
                return Err(StoreError::UnknownCollection(collection.to_string()).into());
            }

            paths.sort();
            Ok(paths)
        } else {
            let path = base_path.join(format!("{}.json", collection));
            if !path.is_file() {
                return Err(StoreError::UnknownCollection(collection.to_string()).into());
            }
            Ok(vec![path])
        }
    }

    fn parse_documents(path: &Path) -> PlanoResult<Vec<Document>> {
        let content = fs::read_to_string(path).map_err(|e| {
            StoreError::QueryFailed(format!("failed to read {}: {}", path.display(), e))
        })?;

        let value: JsonValue = serde_json::from_str(&content).map_err(|e| {
            StoreError::QueryFailed(format!("invalid JSON in {}: {}", path.display(), e))
        })?;

        match value {
            JsonValue::Array(items) => {
                let mut documents = Vec::with_capacity(items.len());
                for item in items {
                    match item {
                        JsonValue::Object(map) => documents.push(map),
                        other => {
                            return Err(StoreError::QueryFailed(format!(
                                "expected document object in {}, got {}",
                                path.display(),
                                json_type_name(&other)
                            ))
                            .into())
                        }
                    }
                }
                Ok(documents)
            }
            JsonValue::Object(map) => Ok(vec![map]),
            other => Err(StoreError::QueryFailed(format!(
                "expected array of documents in {}, got {}",
                path.display(),
                json_type_name(&other)
            ))
            .into()),
        }
    }

    /// Load a collection's documents, consulting the cache first
    async fn load_collection(&self, collection: &str) -> PlanoResult<Vec<Document>> {
        {
            let cache = self.cache.read().await;
            if let Some(documents) = cache.get(collection) {
                return Ok(documents.clone());
            }
        }

        let base_path = self.ensure_connected()?;
        let files = self.resolve_files(base_path, collection)?;

        let mut documents = Vec::new();
        for file in &files {
            documents.extend(Self::parse_documents(file)?);
        }

        let mut cache = self.cache.write().await;
        cache.insert(collection.to_string(), documents.clone());
        Ok(documents)
    }

    fn read_only_error(operation: &str) -> StoreError {
        StoreError::UnsupportedOperation(format!("file store is read-only: {}", operation))
    }
}

fn json_type_name(value: &JsonValue) -> &'static str {
    match value {
        JsonValue::Null => "null",
        JsonValue::Bool(_) => "boolean",
        JsonValue::Number(_) => "number",
        JsonValue::String(_) => "string",
        JsonValue::Array(_) => "array",
        JsonValue::Object(_) => "object",
    }
}

impl Default for FileStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DocumentStore for FileStore {
    async fn connect(&mut self, config: StoreInitConfig) -> PlanoResult<()> {
        let base_path = config
            .connection_params
            .get("base_path")
            .ok_or_else(|| StoreError::Unavailable("missing base_path parameter".to_string()))?;

        let path = PathBuf::from(base_path);
        if !path.is_dir() {
            return Err(StoreError::Unavailable(format!(
                "base path is not a directory: {}",
                path.display()
            ))
            .into());
        }

        self.base_path = Some(path);
        self.connected = true;
        Ok(())
    }

    async fn disconnect(&mut self) -> PlanoResult<()> {
        self.connected = false;
        self.base_path = None;
        self.cache.write().await.clear();
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.connected
    }

    async fn count(&self, collection: &str, predicate: &[FieldPredicate]) -> PlanoResult<u64> {
        let documents = self.load_collection(collection).await?;
        Ok(documents.iter().filter(|doc| predicate_matches(predicate, doc)).count() as u64)
    }

    async fn find(
        &self,
        collection: &str,
        descriptor: &QueryDescriptor,
        hint: Option<&IndexDescriptor>,
    ) -> PlanoResult<Vec<Document>> {
        if hint.is_some() {
            return Err(StoreError::UnsupportedOperation(
                "file store does not support index hints".to_string(),
            )
            .into());
        }

        let documents = self.load_collection(collection).await?;

        let mut matched: Vec<Document> = documents
            .into_iter()
            .filter(|doc| predicate_matches(&descriptor.predicate, doc))
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
        // Verifies the collection exists; the catalog itself is always empty
        self.load_collection(collection).await?;
        Ok(Vec::new())
    }

    async fn create_index(
        &self,
        _collection: &str,
        _index: IndexDescriptor,
    ) -> PlanoResult<IndexDescriptor> {
        Err(Self::read_only_error("create_index").into())
    }

    async fn explain(
        &self,
        _collection: &str,
        _descriptor: &QueryDescriptor,
        _hint: Option<&IndexDescriptor>,
    ) -> PlanoResult<ExecutionStats> {
        Err(StoreError::UnsupportedOperation(
            "file store does not report execution statistics".to_string(),
        )
        .into())
    }

    async fn aggregate(
        &self,
        _collection: &str,
        _pipeline: &AggregationPipeline,
    ) -> PlanoResult<Vec<Document>> {
        Err(StoreError::UnsupportedOperation(
            "file store does not support aggregation".to_string(),
        )
        .into())
    }

    async fn insert_many(&self, _collection: &str, _documents: Vec<Document>) -> PlanoResult<u64> {
        Err(Self::read_only_error("insert_many").into())
    }

    async fn update_one(
        &self,
        _collection: &str,
        _predicate: &[FieldPredicate],
        _set: Document,
    ) -> PlanoResult<u64> {
        Err(Self::read_only_error("update_one").into())
    }

    async fn delete_one(
        &self,
        _collection: &str,
        _predicate: &[FieldPredicate],
    ) -> PlanoResult<u64> {
        Err(Self::read_only_error("delete_one").into())
    }

    fn store_type(&self) -> StoreType {
        StoreType::File
    }

    fn capabilities(&self) -> StoreCapabilities {
        StoreCapabilities {
            supports_indexes: false,
            supports_hints: false,
            supports_explain: false,
            supports_aggregation: false,
            read_only: true,
        }
    }
}
