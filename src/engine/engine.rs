use serde_json::Value as JsonValue;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::{
    engine::{
        execution_reporter::{AccessPathComparison, DefaultExecutionReporter, ExecutionReporter},
        filter_compiler::{DefaultFilterCompiler, FilterCompiler},
        plan_selector::{DefaultPlanSelector, ExecutionPlan, PlanSelector},
    },
    stores::{DocumentStore, StoreCapabilities, StoreRegistry},
    utils::{
        config::EngineConfig,
        error::{PlanoError, PlanoResult},
        types::{Document, IndexDescriptor, QueryDescriptor, QueryOutput, StoreType},
    },
};

/// Snapshot of a registered store for listings
#[derive(Debug, Clone)]
pub struct StoreInfo {
    pub store_type: StoreType,
    pub connected: bool,
    pub capabilities: StoreCapabilities,
}

/// Everything produced for one query: the compiled descriptor, the chosen
/// plan, and the executed output
#[derive(Debug, Clone)]
pub struct QueryReport {
    pub descriptor: QueryDescriptor,
    pub plan: ExecutionPlan,
    pub output: QueryOutput,
}

/// Plan plus measured index-versus-scan statistics, without returning
/// documents
#[derive(Debug, Clone)]
pub struct ExplainReport {
    pub descriptor: QueryDescriptor,
    pub plan: ExecutionPlan,
    pub comparison: AccessPathComparison,
}

/// Facade wiring the compile → select → execute pipeline over a registry
/// of named stores.
///
/// Each call is stateless between invocations; the only shared state is
/// the store registry, held behind a read-write lock so concurrent queries
/// share read access.
pub struct PlannerEngine {
    config: EngineConfig,
    compiler: Arc<dyn FilterCompiler>,
    selector: Arc<dyn PlanSelector>,
    reporter: Arc<dyn ExecutionReporter>,
    stores: RwLock<StoreRegistry>,
}

impl PlannerEngine {
    /// Create an engine with default components for the given configuration
    pub fn new(config: EngineConfig) -> Self {
        let selector = Arc::new(DefaultPlanSelector::with_config(&config.planner));
        Self {
            compiler: Arc::new(DefaultFilterCompiler::new()),
            selector,
            reporter: Arc::new(DefaultExecutionReporter::new()),
            stores: RwLock::new(StoreRegistry::new()),
            config,
        }
    }

    /// Engine configuration
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Name of the store used when the caller does not pick one
    pub fn default_store(&self) -> &str {
        &self.config.planner.default_store
    }

    /// Register a connected store under a name
    pub async fn register_store(
        &self,
        name: &str,
        store: Box<dyn DocumentStore>,
    ) -> PlanoResult<()> {
        let mut stores = self.stores.write().await;
        stores.register(name.to_string(), store)
    }

    /// Names of all registered stores
    pub async fn list_stores(&self) -> Vec<String> {
        self.stores.read().await.list_stores()
    }

    /// Type, connection state, and capabilities of a registered store
    pub async fn store_info(&self, name: &str) -> PlanoResult<StoreInfo> {
        let stores = self.stores.read().await;
        let store = Self::lookup(&stores, name)?;
        Ok(StoreInfo {
            store_type: store.store_type(),
            connected: store.is_connected(),
            capabilities: store.capabilities(),
        })
    }

    /// Compile, plan, and execute a raw query spec against a collection
    pub async fn run_query(
        &self,
        store_name: &str,
        collection: &str,
        raw_spec: &JsonValue,
    ) -> PlanoResult<QueryReport> {
        let descriptor = self.compiler.compile(raw_spec)?;

        let stores = self.stores.read().await;
        let store = Self::lookup(&stores, store_name)?;

        let plan = self.plan_for(store, collection, &descriptor).await?;
        let output = self.reporter.execute(collection, &plan, &descriptor, store).await?;

        Ok(QueryReport { descriptor, plan, output })
    }

    /// Compile and plan a raw spec, then measure it with and without the
    /// chosen index instead of returning documents
    pub async fn explain_query(
        &self,
        store_name: &str,
        collection: &str,
        raw_spec: &JsonValue,
    ) -> PlanoResult<ExplainReport> {
        let descriptor = self.compiler.compile(raw_spec)?;

        let stores = self.stores.read().await;
        let store = Self::lookup(&stores, store_name)?;

        let plan = self.plan_for(store, collection, &descriptor).await?;
        let comparison =
            self.reporter.compare_access_paths(collection, &plan, &descriptor, store).await?;

        Ok(ExplainReport { descriptor, plan, comparison })
    }

    /// Compile and run a raw aggregation pipeline
    pub async fn run_aggregation(
        &self,
        store_name: &str,
        collection: &str,
        raw_pipeline: &JsonValue,
    ) -> PlanoResult<Vec<Document>> {
        let pipeline = self.compiler.compile_pipeline(raw_pipeline)?;

        let stores = self.stores.read().await;
        let store = Self::lookup(&stores, store_name)?;
        store.aggregate(collection, &pipeline).await
    }

    /// Compile raw index keys and create the index on the store
    pub async fn create_index(
        &self,
        store_name: &str,
        collection: &str,
        raw_keys: &JsonValue,
        unique: bool,
    ) -> PlanoResult<IndexDescriptor> {
        let fields = self.compiler.compile_index_keys(raw_keys)?;
        let index =
            if unique { IndexDescriptor::unique(fields) } else { IndexDescriptor::new(fields) };

        let stores = self.stores.read().await;
        let store = Self::lookup(&stores, store_name)?;
        store.create_index(collection, index).await
    }

    /// List a collection's index catalog
    pub async fn list_indexes(
        &self,
        store_name: &str,
        collection: &str,
    ) -> PlanoResult<Vec<IndexDescriptor>> {
        let stores = self.stores.read().await;
        let store = Self::lookup(&stores, store_name)?;
        store.list_indexes(collection).await
    }

    fn lookup<'a>(stores: &'a StoreRegistry, name: &str) -> PlanoResult<&'a dyn DocumentStore> {
        stores
            .get(name)
            .ok_or_else(|| PlanoError::Configuration(format!("unknown store '{}'", name)))
    }

    /// Read the index catalog and size, then select a plan
    async fn plan_for(
        &self,
        store: &dyn DocumentStore,
        collection: &str,
        descriptor: &QueryDescriptor,
    ) -> PlanoResult<ExecutionPlan> {
        let available_indexes = store.list_indexes(collection).await?;
        let collection_size = store.count(collection, &[]).await?;

        self.selector
            .select_plan(collection, descriptor, &available_indexes, collection_size, store)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::plan_selector::ScanType;
    use crate::stores::{MemoryStore, StoreInitConfig};
    use serde_json::json;

    async fn engine_with_memory_store() -> PlannerEngine {
        let engine = PlannerEngine::new(EngineConfig::default());
        let mut store = MemoryStore::new();
        store.connect(StoreInitConfig::new()).await.unwrap();
        engine.register_store("memory", Box::new(store)).await.unwrap();
        engine
    }

    #[tokio::test]
    async fn test_run_query_without_indexes_full_scans() {
        let engine = engine_with_memory_store().await;

        let report = engine
            .run_query("memory", "books", &json!({"filter": {"genre": "Fiction"}}))
            .await
            .unwrap();

        assert_eq!(report.plan.scan_type, ScanType::FullScan);
        assert_eq!(report.plan.estimated_docs_examined, 12);
        assert_eq!(report.output.row_count(), 6);
    }

    #[tokio::test]
    async fn test_create_index_changes_plan() {
        let engine = engine_with_memory_store().await;

        let created = engine
            .create_index(
                "memory",
                "books",
                &json!([["author", 1], ["published_year", 1]]),
                false,
            )
            .await
            .unwrap();
        assert_eq!(created.name, "author_1_published_year_1");

        let report = engine
            .run_query(
                "memory",
                "books",
                &json!({"filter": {
                    "author": "George Orwell",
                    "published_year": {"$gt": 1950}
                }}),
            )
            .await
            .unwrap();

        assert_eq!(report.plan.scan_type, ScanType::IndexScan);
        assert_eq!(
            report.plan.chosen_index.as_ref().map(|i| i.name.as_str()),
            Some("author_1_published_year_1")
        );
    }

    #[tokio::test]
    async fn test_explain_query_compares_paths() {
        let engine = engine_with_memory_store().await;
        engine.create_index("memory", "books", &json!({"title": 1}), false).await.unwrap();

        let report = engine
            .explain_query("memory", "books", &json!({"filter": {"title": "1984"}}))
            .await
            .unwrap();

        assert_eq!(report.comparison.collection_scan.docs_examined, 12);
        assert_eq!(
            report.comparison.index_scan.as_ref().map(|s| s.docs_examined),
            Some(1)
        );
    }

    #[tokio::test]
    async fn test_run_aggregation() {
        let engine = engine_with_memory_store().await;

        let results = engine
            .run_aggregation(
                "memory",
                "books",
                &json!([
                    {"$group": {"_id": "$author", "bookCount": {"$sum": 1}}},
                    {"$sort": {"bookCount": -1}},
                    {"$limit": 1}
                ]),
            )
            .await
            .unwrap();

        assert_eq!(results.len(), 1);
        // Orwell and Tolkien are tied at three books; the deterministic
        // sort is by count only, so either may surface, but the count is 3
        assert_eq!(results[0].get("bookCount"), Some(&json!(3)));
    }

    #[tokio::test]
    async fn test_unknown_store_is_a_configuration_error() {
        let engine = engine_with_memory_store().await;

        let result = engine.run_query("missing", "books", &json!({})).await;
        assert!(matches!(result.unwrap_err(), PlanoError::Configuration(_)));
    }

    #[tokio::test]
    async fn test_validation_errors_propagate() {
        let engine = engine_with_memory_store().await;

        let result = engine.run_query("memory", "books", &json!({"limit": -1})).await;
        assert!(matches!(result.unwrap_err(), PlanoError::Validation(_)));
    }

    #[tokio::test]
    async fn test_list_stores() {
        let engine = engine_with_memory_store().await;
        assert_eq!(engine.list_stores().await, vec!["memory".to_string()]);
        assert_eq!(engine.default_store(), "memory");
    }
}
