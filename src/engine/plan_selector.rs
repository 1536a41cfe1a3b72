use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::stores::DocumentStore;
use crate::utils::{
    config::PlannerConfig,
    error::PlanoResult,
    types::{FieldPredicate, IndexDescriptor, QueryDescriptor, SortField},
};

/// Access path chosen for a query
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ScanType {
    /// Examine every document in the collection
    FullScan,
    /// Walk an index over the constrained prefix of its key
    IndexScan,
}

impl ScanType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ScanType::FullScan => "FULL_SCAN",
            ScanType::IndexScan => "INDEX_SCAN",
        }
    }
}

/// Complete execution plan for one query. Produced per query, never
/// persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionPlan {
    /// Index backing the scan, present iff `scan_type` is `IndexScan`
    pub chosen_index: Option<IndexDescriptor>,
    pub scan_type: ScanType,
    /// Predicted documents examined: collection size for a full scan, the
    /// covered-prefix match count for an index scan
    pub estimated_docs_examined: u64,
    /// Whether the plan yields the requested order without an in-memory
    /// sort
    pub satisfies_sort: bool,
}

impl ExecutionPlan {
    /// Plan that scans the whole collection
    pub fn full_scan(collection_size: u64, sort_requested: bool) -> Self {
        Self {
            chosen_index: None,
            scan_type: ScanType::FullScan,
            estimated_docs_examined: collection_size,
            satisfies_sort: !sort_requested,
        }
    }

    /// Plan that walks the given index
    pub fn index_scan(index: IndexDescriptor, estimate: u64, satisfies_sort: bool) -> Self {
        Self {
            chosen_index: Some(index),
            scan_type: ScanType::IndexScan,
            estimated_docs_examined: estimate,
            satisfies_sort,
        }
    }
}

/// Trait for index-aware plan selection
#[async_trait]
pub trait PlanSelector: Send + Sync {
    /// Choose an access path for a descriptor given the collection's index
    /// catalog and size. Async because the index-scan estimate delegates a
    /// count query to the store.
    async fn select_plan(
        &self,
        collection: &str,
        descriptor: &QueryDescriptor,
        available_indexes: &[IndexDescriptor],
        collection_size: u64,
        store: &dyn DocumentStore,
    ) -> PlanoResult<ExecutionPlan>;
}

/// Default implementation of PlanSelector.
///
/// Selection is deterministic: candidates are indexes whose leading field
/// is constrained by the predicate, ranked by covered prefix length, then
/// sort satisfaction, then fewer key fields, then index name.
pub struct DefaultPlanSelector {
    /// Estimate index scans with a count query; fall back to the
    /// collection size when disabled
    count_estimates: bool,
}

struct Candidate<'a> {
    index: &'a IndexDescriptor,
    covered: usize,
    satisfies_sort: bool,
}

impl DefaultPlanSelector {
    /// Create a selector with count-based estimates enabled
    pub fn new() -> Self {
        Self { count_estimates: true }
    }

    /// Create a selector from planner configuration
    pub fn with_config(config: &PlannerConfig) -> Self {
        Self { count_estimates: config.count_estimates }
    }

    /// Number of leading index fields the predicate constrains
    fn covered_prefix_len(descriptor: &QueryDescriptor, index: &IndexDescriptor) -> usize {
        index
            .fields
            .iter()
            .take_while(|f| descriptor.constraints_on(&f.field).is_some())
            .count()
    }

    /// Standard compound-index sort compatibility: the sort fields must be
    /// a prefix of the index key, with directions all matching or all
    /// reversed (forward or backward index walk).
    pub fn sort_satisfied_by(index: &IndexDescriptor, sort: &[SortField]) -> bool {
        if sort.is_empty() {
            return true;
        }
        if sort.len() > index.fields.len() {
            return false;
        }

        let fields_match =
            sort.iter().zip(&index.fields).all(|(s, f)| s.field == f.field);
        if !fields_match {
            return false;
        }

        let forward = sort.iter().zip(&index.fields).all(|(s, f)| s.direction == f.direction);
        let backward = sort
            .iter()
            .zip(&index.fields)
            .all(|(s, f)| s.direction == f.direction.reversed());
        forward || backward
    }

    fn choose_index<'a>(
        descriptor: &QueryDescriptor,
        available_indexes: &'a [IndexDescriptor],
    ) -> Option<Candidate<'a>> {
        let mut best: Option<Candidate<'a>> = None;

        for index in available_indexes {
            let leading_constrained = index
                .leading_field()
                .map_or(false, |field| descriptor.constraints_on(field).is_some());
            if !leading_constrained {
                continue;
            }

            let candidate = Candidate {
                index,
                covered: Self::covered_prefix_len(descriptor, index),
                satisfies_sort: Self::sort_satisfied_by(index, &descriptor.sort),
            };

            best = match best {
                None => Some(candidate),
                Some(current) => {
                    if Self::prefer(&candidate, &current) {
                        Some(candidate)
                    } else {
                        Some(current)
                    }
                }
            };
        }

        best
    }

    /// True when `a` ranks above `b`
    fn prefer(a: &Candidate<'_>, b: &Candidate<'_>) -> bool {
        if a.covered != b.covered {
            return a.covered > b.covered;
        }
        if a.satisfies_sort != b.satisfies_sort {
            return a.satisfies_sort;
        }
        if a.index.fields.len() != b.index.fields.len() {
            return a.index.fields.len() < b.index.fields.len();
        }
        a.index.name < b.index.name
    }

    /// Predicates on the covered prefix of the chosen index, used for the
    /// count-based estimate
    fn prefix_predicates(
        descriptor: &QueryDescriptor,
        index: &IndexDescriptor,
        covered: usize,
    ) -> Vec<FieldPredicate> {
        index
            .fields
            .iter()
            .take(covered)
            .filter_map(|f| descriptor.constraints_on(&f.field).cloned())
            .collect()
    }
}

impl Default for DefaultPlanSelector {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PlanSelector for DefaultPlanSelector {
    async fn select_plan(
        &self,
        collection: &str,
        descriptor: &QueryDescriptor,
        available_indexes: &[IndexDescriptor],
        collection_size: u64,
        store: &dyn DocumentStore,
    ) -> PlanoResult<ExecutionPlan> {
        let candidate = Self::choose_index(descriptor, available_indexes);

        let candidate = match candidate {
            Some(candidate) => candidate,
            None => {
                return Ok(ExecutionPlan::full_scan(
                    collection_size,
                    !descriptor.sort.is_empty(),
                ))
            }
        };

        let estimate = if self.count_estimates {
            let prefix =
                Self::prefix_predicates(descriptor, candidate.index, candidate.covered);
            store.count(collection, &prefix).await?
        } else {
            collection_size
        };

        Ok(ExecutionPlan::index_scan(
            candidate.index.clone(),
            estimate,
            candidate.satisfies_sort,
        ))
    }
}
