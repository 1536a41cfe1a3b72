use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use crate::utils::types::StoreType;

/// Main engine configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct EngineConfig {
    pub stores: HashMap<String, StoreConfig>,
    pub planner: PlannerConfig,
}

/// Configuration for a single registered store
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StoreConfig {
    pub store_type: StoreType,
    pub connection_string: Option<String>,
    pub parameters: HashMap<String, String>,
    pub pool_config: Option<PoolConfig>,
    pub timeout_config: Option<TimeoutConfig>,
}

/// Connection pool configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PoolConfig {
    pub min_connections: u32,
    pub max_connections: u32,
    pub connection_timeout: u64, // seconds
    pub idle_timeout: u64,       // seconds
}

/// Timeout configuration for store calls
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TimeoutConfig {
    pub connect_timeout: u64, // seconds
    pub query_timeout: u64,   // seconds
}

/// Planner behavior configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PlannerConfig {
    /// Store name used when the caller does not name one
    pub default_store: String,
    /// Delegate a count query to the store for IndexScan estimates.
    /// When disabled the planner falls back to the collection size.
    pub count_estimates: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        let mut stores = HashMap::new();
        stores.insert(
            "memory".to_string(),
            StoreConfig {
                store_type: StoreType::Memory,
                connection_string: None,
                parameters: HashMap::new(),
                pool_config: None,
                timeout_config: None,
            },
        );

        Self { stores, planner: PlannerConfig::default() }
    }
}

impl Default for PlannerConfig {
    fn default() -> Self {
        Self { default_store: "memory".to_string(), count_estimates: true }
    }
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            min_connections: 1,
            max_connections: 10,
            connection_timeout: 30,
            idle_timeout: 600,
        }
    }
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self { connect_timeout: 30, query_timeout: 300 }
    }
}
