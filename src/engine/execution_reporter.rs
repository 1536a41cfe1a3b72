use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Instant;

use crate::engine::plan_selector::{ExecutionPlan, ScanType};
use crate::stores::DocumentStore;
use crate::utils::{
    error::{PlanoResult, StoreError},
    types::{ExecutionStats, QueryDescriptor, QueryOutput},
};

/// Index-versus-collection-scan measurement for one query
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccessPathComparison {
    /// Stats for a plain collection scan
    pub collection_scan: ExecutionStats,
    /// Stats when the chosen index is forced, when the plan has one
    pub index_scan: Option<ExecutionStats>,
    /// Name of the index used for the hinted run
    pub index_name: Option<String>,
}

/// Trait for executing chosen plans against a store
#[async_trait]
pub trait ExecutionReporter: Send + Sync {
    /// Execute a plan, returning the documents and observed stats.
    /// Idempotent: never mutates stored data, so it may be called
    /// repeatedly.
    async fn execute(
        &self,
        collection: &str,
        plan: &ExecutionPlan,
        descriptor: &QueryDescriptor,
        store: &dyn DocumentStore,
    ) -> PlanoResult<QueryOutput>;

    /// Measure the same descriptor with and without the plan's index,
    /// reproducing the classic explain() comparison
    async fn compare_access_paths(
        &self,
        collection: &str,
        plan: &ExecutionPlan,
        descriptor: &QueryDescriptor,
        store: &dyn DocumentStore,
    ) -> PlanoResult<AccessPathComparison>;
}

/// Default implementation of ExecutionReporter.
///
/// Fetch, sort, skip, limit, and projection are all delegated to the
/// store; this component only times the call, passes the chosen index as a
/// hint where the store accepts one, and assembles stats. Store errors are
/// surfaced unchanged with no retry; retry policy belongs to the caller.
pub struct DefaultExecutionReporter;

impl DefaultExecutionReporter {
    /// Create a new reporter
    pub fn new() -> Self {
        Self
    }

    /// The hint to pass for a plan, honoring store capabilities
    fn hint_for<'a>(
        plan: &'a ExecutionPlan,
        store: &dyn DocumentStore,
    ) -> Option<&'a crate::utils::types::IndexDescriptor> {
        if plan.scan_type == ScanType::IndexScan && store.capabilities().supports_hints {
            plan.chosen_index.as_ref()
        } else {
            None
        }
    }
}

impl Default for DefaultExecutionReporter {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ExecutionReporter for DefaultExecutionReporter {
    async fn execute(
        &self,
        collection: &str,
        plan: &ExecutionPlan,
        descriptor: &QueryDescriptor,
        store: &dyn DocumentStore,
    ) -> PlanoResult<QueryOutput> {
        let hint = Self::hint_for(plan, store);

        let start = Instant::now();
        let documents = store.find(collection, descriptor, hint).await?;
        let elapsed_millis = start.elapsed().as_secs_f64() * 1000.0;

        // Stores with a native explain facility report what was actually
        // examined; otherwise the plan's estimate stands in.
        let docs_examined = if store.capabilities().supports_explain {
            store.explain(collection, descriptor, hint).await?.docs_examined
        } else {
            plan.estimated_docs_examined
        };

        Ok(QueryOutput { documents, stats: ExecutionStats::new(docs_examined, elapsed_millis) })
    }

    async fn compare_access_paths(
        &self,
        collection: &str,
        plan: &ExecutionPlan,
        descriptor: &QueryDescriptor,
        store: &dyn DocumentStore,
    ) -> PlanoResult<AccessPathComparison> {
        if !store.capabilities().supports_explain {
            return Err(StoreError::UnsupportedOperation(
                "store does not report execution statistics".to_string(),
            )
            .into());
        }

        let collection_scan = store.explain(collection, descriptor, None).await?;

        let hint = Self::hint_for(plan, store);
        let index_scan = match hint {
            Some(index) => Some(store.explain(collection, descriptor, Some(index)).await?),
            None => None,
        };

        Ok(AccessPathComparison {
            collection_scan,
            index_scan,
            index_name: hint.map(|index| index.name.clone()),
        })
    }
}
