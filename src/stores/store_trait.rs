use async_trait::async_trait;
use std::collections::HashMap;
use crate::utils::{
    error::{PlanoError, PlanoResult},
    types::{
        AggregationPipeline, Document, ExecutionStats, FieldPredicate, IndexDescriptor,
        QueryDescriptor, StoreType,
    },
};

/// Configuration for store initialization
#[derive(Debug, Clone)]
pub struct StoreInitConfig {
    pub connection_params: HashMap<String, String>,
    pub timeout_seconds: Option<u64>,
    pub max_connections: Option<u32>,
}

impl StoreInitConfig {
    /// Create a new store configuration
    pub fn new() -> Self {
        Self {
            connection_params: HashMap::new(),
            timeout_seconds: Some(30),
            max_connections: Some(10),
        }
    }

    /// Add a connection parameter
    pub fn with_param(mut self, key: &str, value: &str) -> Self {
        self.connection_params.insert(key.to_string(), value.to_string());
        self
    }

    /// Set timeout in seconds
    pub fn with_timeout(mut self, seconds: u64) -> Self {
        self.timeout_seconds = Some(seconds);
        self
    }

    /// Set maximum connections
    pub fn with_max_connections(mut self, max: u32) -> Self {
        self.max_connections = Some(max);
        self
    }
}

impl Default for StoreInitConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// Capabilities supported by a store implementation
#[derive(Debug, Clone)]
pub struct StoreCapabilities {
    pub supports_indexes: bool,
    pub supports_hints: bool,
    pub supports_explain: bool,
    pub supports_aggregation: bool,
    pub read_only: bool,
}

impl Default for StoreCapabilities {
    fn default() -> Self {
        Self {
            supports_indexes: true,
            supports_hints: true,
            supports_explain: false,
            supports_aggregation: false,
            read_only: false,
        }
    }
}

/// Contract consumed by the planner: a document store driver.
///
/// The connected instance is the handle — callers bracket its lifetime with
/// `connect`/`disconnect` and every query operation requires a live
/// connection. Index creation is serialized inside the store; the planner
/// only reads the resulting catalog.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Establish the backend connection
    async fn connect(&mut self, config: StoreInitConfig) -> PlanoResult<()>;

    /// Close the connection and release resources
    async fn disconnect(&mut self) -> PlanoResult<()>;

    /// Whether the store is currently connected
    fn is_connected(&self) -> bool;

    /// Count documents matching a predicate
    async fn count(&self, collection: &str, predicate: &[FieldPredicate]) -> PlanoResult<u64>;

    /// Fetch documents for a descriptor, optionally forcing an index
    async fn find(
        &self,
        collection: &str,
        descriptor: &QueryDescriptor,
        hint: Option<&IndexDescriptor>,
    ) -> PlanoResult<Vec<Document>>;

    /// List the collection's index catalog
    async fn list_indexes(&self, collection: &str) -> PlanoResult<Vec<IndexDescriptor>>;

    /// Create an index, failing with an index-conflict error on a duplicate
    /// or incompatible definition
    async fn create_index(
        &self,
        collection: &str,
        index: IndexDescriptor,
    ) -> PlanoResult<IndexDescriptor>;

    /// Report execution statistics for a descriptor without returning
    /// documents
    async fn explain(
        &self,
        collection: &str,
        descriptor: &QueryDescriptor,
        hint: Option<&IndexDescriptor>,
    ) -> PlanoResult<ExecutionStats>;

    /// Run an aggregation pipeline
    async fn aggregate(
        &self,
        collection: &str,
        pipeline: &AggregationPipeline,
    ) -> PlanoResult<Vec<Document>>;

    /// Insert documents, returning the inserted count
    async fn insert_many(&self, collection: &str, documents: Vec<Document>) -> PlanoResult<u64>;

    /// Update the first document matching a predicate with the given field
    /// values, returning the modified count
    async fn update_one(
        &self,
        collection: &str,
        predicate: &[FieldPredicate],
        set: Document,
    ) -> PlanoResult<u64>;

    /// Delete the first document matching a predicate, returning the
    /// deleted count
    async fn delete_one(&self, collection: &str, predicate: &[FieldPredicate]) -> PlanoResult<u64>;

    /// Get the type of this store
    fn store_type(&self) -> StoreType;

    /// Get store-specific capabilities
    fn capabilities(&self) -> StoreCapabilities;
}

/// Registry for managing store instances by name
pub struct StoreRegistry {
    stores: HashMap<String, Box<dyn DocumentStore>>,
}

impl StoreRegistry {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self { stores: HashMap::new() }
    }

    /// Register a store under a given name
    pub fn register(&mut self, name: String, store: Box<dyn DocumentStore>) -> PlanoResult<()> {
        if self.stores.contains_key(&name) {
            return Err(PlanoError::Configuration(format!(
                "Store '{}' is already registered",
                name
            )));
        }

        self.stores.insert(name, store);
        Ok(())
    }

    /// Get a store by name
    pub fn get(&self, name: &str) -> Option<&dyn DocumentStore> {
        self.stores.get(name).map(|s| s.as_ref())
    }

    /// Get a mutable reference to a store by name
    pub fn get_mut(&mut self, name: &str) -> Option<&mut Box<dyn DocumentStore>> {
        self.stores.get_mut(name)
    }

    /// List all registered store names
    pub fn list_stores(&self) -> Vec<String> {
        let mut names: Vec<String> = self.stores.keys().cloned().collect();
        names.sort();
        names
    }

    /// Remove a store from the registry
    pub fn unregister(&mut self, name: &str) -> Option<Box<dyn DocumentStore>> {
        self.stores.remove(name)
    }

    /// Check if a store is registered
    pub fn contains(&self, name: &str) -> bool {
        self.stores.contains_key(name)
    }

    /// Get the number of registered stores
    pub fn len(&self) -> usize {
        self.stores.len()
    }

    /// Check if the registry is empty
    pub fn is_empty(&self) -> bool {
        self.stores.is_empty()
    }
}

impl Default for StoreRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::error::StoreError;

    #[test]
    fn test_store_init_config_creation() {
        let config = StoreInitConfig::new();

        assert!(config.connection_params.is_empty());
        assert_eq!(config.timeout_seconds, Some(30));
        assert_eq!(config.max_connections, Some(10));
    }

    #[test]
    fn test_store_init_config_builder_pattern() {
        let config = StoreInitConfig::new()
            .with_param("base_path", "/var/data")
            .with_param("dbname", "bookstore")
            .with_timeout(60)
            .with_max_connections(20);

        assert_eq!(config.connection_params.get("base_path"), Some(&"/var/data".to_string()));
        assert_eq!(config.connection_params.get("dbname"), Some(&"bookstore".to_string()));
        assert_eq!(config.timeout_seconds, Some(60));
        assert_eq!(config.max_connections, Some(20));
    }

    #[test]
    fn test_store_capabilities_default() {
        let capabilities = StoreCapabilities::default();

        assert!(capabilities.supports_indexes);
        assert!(capabilities.supports_hints);
        assert!(!capabilities.supports_explain);
        assert!(!capabilities.supports_aggregation);
        assert!(!capabilities.read_only);
    }

    #[test]
    fn test_store_registry_creation() {
        let registry = StoreRegistry::new();

        assert!(registry.is_empty());
        assert_eq!(registry.len(), 0);
        assert!(registry.list_stores().is_empty());
    }

    // Minimal store for exercising registry behavior
    struct TestStore {
        connected: bool,
    }

    #[async_trait]
    impl DocumentStore for TestStore {
        async fn connect(&mut self, _config: StoreInitConfig) -> PlanoResult<()> {
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

        async fn count(
            &self,
            _collection: &str,
            _predicate: &[FieldPredicate],
        ) -> PlanoResult<u64> {
            Ok(0)
        }

        async fn find(
            &self,
            _collection: &str,
            _descriptor: &QueryDescriptor,
            _hint: Option<&IndexDescriptor>,
        ) -> PlanoResult<Vec<Document>> {
            Ok(Vec::new())
        }

        async fn list_indexes(&self, _collection: &str) -> PlanoResult<Vec<IndexDescriptor>> {
            Ok(Vec::new())
        }

        async fn create_index(
            &self,
            _collection: &str,
            index: IndexDescriptor,
        ) -> PlanoResult<IndexDescriptor> {
            Ok(index)
        }

        async fn explain(
            &self,
            _collection: &str,
            _descriptor: &QueryDescriptor,
            _hint: Option<&IndexDescriptor>,
        ) -> PlanoResult<ExecutionStats> {
            Ok(ExecutionStats::new(0, 0.0))
        }

        async fn aggregate(
            &self,
            _collection: &str,
            _pipeline: &AggregationPipeline,
        ) -> PlanoResult<Vec<Document>> {
            Err(StoreError::UnsupportedOperation("aggregate".to_string()).into())
        }

        async fn insert_many(
            &self,
            _collection: &str,
            documents: Vec<Document>,
        ) -> PlanoResult<u64> {
            Ok(documents.len() as u64)
        }

        async fn update_one(
            &self,
            _collection: &str,
            _predicate: &[FieldPredicate],
            _set: Document,
        ) -> PlanoResult<u64> {
            Ok(0)
        }

        async fn delete_one(
            &self,
            _collection: &str,
            _predicate: &[FieldPredicate],
        ) -> PlanoResult<u64> {
            Ok(0)
        }

        fn store_type(&self) -> StoreType {
            StoreType::Custom("test".to_string())
        }

        fn capabilities(&self) -> StoreCapabilities {
            StoreCapabilities::default()
        }
    }

    #[test]
    fn test_store_registry_register_and_get() {
        let mut registry = StoreRegistry::new();
        let store = Box::new(TestStore { connected: false });

        let result = registry.register("test_store".to_string(), store);
        assert!(result.is_ok());

        assert!(!registry.is_empty());
        assert_eq!(registry.len(), 1);
        assert!(registry.contains("test_store"));

        let retrieved = registry.get("test_store");
        assert!(retrieved.is_some());
        assert_eq!(
            retrieved.unwrap().store_type(),
            StoreType::Custom("test".to_string())
        );

        let stores = registry.list_stores();
        assert_eq!(stores, vec!["test_store".to_string()]);
    }

    #[test]
    fn test_store_registry_duplicate_registration() {
        let mut registry = StoreRegistry::new();

        registry
            .register("test_store".to_string(), Box::new(TestStore { connected: false }))
            .unwrap();
        let result =
            registry.register("test_store".to_string(), Box::new(TestStore { connected: false }));
        assert!(result.is_err());
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_store_registry_unregister() {
        let mut registry = StoreRegistry::new();
        registry
            .register("test_store".to_string(), Box::new(TestStore { connected: false }))
            .unwrap();

        let removed = registry.unregister("test_store");
        assert!(removed.is_some());
        assert!(registry.is_empty());

        let missing = registry.unregister("test_store");
        assert!(missing.is_none());
    }

    #[tokio::test]
    async fn test_store_connect_lifecycle() {
        let mut store = TestStore { connected: false };
        assert!(!store.is_connected());

        store.connect(StoreInitConfig::new()).await.unwrap();
        assert!(store.is_connected());

        store.disconnect().await.unwrap();
        assert!(!store.is_connected());
    }
}
