use clap::Parser;
use serde_json::Value as JsonValue;
use std::fs;

use crate::cli::{CliArgs, Commands, OutputFormat, OutputFormatter};
use crate::engine::PlannerEngine;
use crate::stores::{
    DocumentStore, FileStore, MemoryStore, PostgresStore, StoreInitConfig,
};
use crate::utils::{
    config::{EngineConfig, StoreConfig},
    error::{PlanoError, PlanoResult, ValidationError},
    types::StoreType,
};

/// Main CLI runner that wires stores into an engine and executes commands
pub struct CliRunner {
    engine: PlannerEngine,
}

impl CliRunner {
    /// Create a runner with the default configuration (memory store only)
    pub async fn new() -> PlanoResult<Self> {
        Self::with_config(EngineConfig::default()).await
    }

    /// Create a runner, building and connecting every configured store
    pub async fn with_config(config: EngineConfig) -> PlanoResult<Self> {
        let engine = PlannerEngine::new(config.clone());

        for (name, store_config) in &config.stores {
            let store = Self::build_store(name, store_config).await?;
            engine.register_store(name, store).await?;
        }

        Ok(Self { engine })
    }

    /// Load an engine configuration file, or fall back to the default
    pub fn load_config(path: Option<&str>) -> PlanoResult<EngineConfig> {
        match path {
            Some(path) => {
                let content = fs::read_to_string(path).map_err(|e| {
                    PlanoError::Configuration(format!("failed to read {}: {}", path, e))
                })?;
                serde_json::from_str(&content).map_err(|e| {
                    PlanoError::Configuration(format!("invalid config {}: {}", path, e))
                })
            }
            None => Ok(EngineConfig::default()),
        }
    }

    async fn build_store(
        name: &str,
        store_config: &StoreConfig,
    ) -> PlanoResult<Box<dyn DocumentStore>> {
        let mut init = StoreInitConfig::new();
        for (key, value) in &store_config.parameters {
            init = init.with_param(key, value);
        }
        if let Some(timeouts) = &store_config.timeout_config {
            init = init.with_timeout(timeouts.connect_timeout);
        }
        if let Some(pool) = &store_config.pool_config {
            init = init.with_max_connections(pool.max_connections);
        }

        let mut store: Box<dyn DocumentStore> = match &store_config.store_type {
            StoreType::Memory => Box::new(MemoryStore::new()),
            StoreType::File => Box::new(FileStore::new()),
            StoreType::PostgreSQL => Box::new(PostgresStore::new()),
            StoreType::Custom(kind) => {
                return Err(PlanoError::Configuration(format!(
                    "store '{}' has unknown type '{}'",
                    name, kind
                )))
            }
        };

        store.connect(init).await?;
        Ok(store)
    }

    /// Access to the underlying engine
    pub fn engine(&self) -> &PlannerEngine {
        &self.engine
    }

    fn resolve_store<'a>(&'a self, store: Option<&'a str>) -> &'a str {
        store.unwrap_or_else(|| self.engine.default_store())
    }

    fn parse_json(label: &str, text: &str) -> PlanoResult<JsonValue> {
        serde_json::from_str(text).map_err(|e| {
            ValidationError::InvalidSpec(format!("{} is not valid JSON: {}", label, e)).into()
        })
    }

    /// Execute a query spec and return formatted results
    pub async fn execute_query(
        &self,
        collection: &str,
        spec: &str,
        store: Option<&str>,
        format: &OutputFormat,
        verbose: bool,
    ) -> PlanoResult<String> {
        let store_name = self.resolve_store(store);
        let raw_spec = Self::parse_json("query spec", spec)?;

        if verbose {
            eprintln!(
                "{}",
                OutputFormatter::format_info(&format!(
                    "compiling spec against {}.{}",
                    store_name, collection
                ))
            );
        }

        let report = self.engine.run_query(store_name, collection, &raw_spec).await?;

        if verbose {
            eprintln!(
                "{}",
                OutputFormatter::format_info(&format!(
                    "plan selected: {} ({} documents estimated)",
                    report.plan.scan_type.as_str(),
                    report.plan.estimated_docs_examined
                ))
            );
        }

        let mut output = String::new();
        output.push_str(&OutputFormatter::format_plan(&report.plan));
        output.push('\n');
        output.push_str(&OutputFormatter::format_documents(&report.output.documents, format));
        output.push('\n');
        output.push_str(&format!(
            "{} {} returned, {}\n",
            report.output.row_count(),
            if report.output.row_count() == 1 { "document" } else { "documents" },
            OutputFormatter::format_stats(&report.output.stats)
        ));
        Ok(output)
    }

    /// Explain a query spec: plan plus index-versus-scan measurements
    pub async fn explain_query(
        &self,
        collection: &str,
        spec: &str,
        store: Option<&str>,
    ) -> PlanoResult<String> {
        let store_name = self.resolve_store(store);
        let raw_spec = Self::parse_json("query spec", spec)?;

        let report = self.engine.explain_query(store_name, collection, &raw_spec).await?;

        let mut output = String::new();
        output.push_str(&OutputFormatter::format_plan(&report.plan));
        output.push('\n');
        output.push_str(&OutputFormatter::format_comparison(&report.comparison));
        Ok(output)
    }

    /// Run an aggregation pipeline and return formatted results
    pub async fn run_aggregation(
        &self,
        collection: &str,
        pipeline: &str,
        store: Option<&str>,
        format: &OutputFormat,
    ) -> PlanoResult<String> {
        let store_name = self.resolve_store(store);
        let raw_pipeline = Self::parse_json("pipeline", pipeline)?;

        let results = self.engine.run_aggregation(store_name, collection, &raw_pipeline).await?;
        Ok(OutputFormatter::format_documents(&results, format))
    }

    /// Create an index from raw keys
    pub async fn create_index(
        &self,
        collection: &str,
        keys: &str,
        unique: bool,
        store: Option<&str>,
    ) -> PlanoResult<String> {
        let store_name = self.resolve_store(store);
        let raw_keys = Self::parse_json("index keys", keys)?;

        let index = self.engine.create_index(store_name, collection, &raw_keys, unique).await?;
        Ok(OutputFormatter::format_success(&format!(
            "created index {} on {}.{}",
            index.name, store_name, collection
        )))
    }

    /// List a collection's indexes
    pub async fn list_indexes(
        &self,
        collection: &str,
        store: Option<&str>,
    ) -> PlanoResult<String> {
        let store_name = self.resolve_store(store);
        let indexes = self.engine.list_indexes(store_name, collection).await?;
        Ok(OutputFormatter::format_indexes(&indexes))
    }

    /// List registered stores
    pub async fn list_stores(&self, detailed: bool) -> PlanoResult<String> {
        use colored::*;

        let names = self.engine.list_stores().await;
        if names.is_empty() {
            return Ok(OutputFormatter::format_info("No stores are currently registered."));
        }

        let mut output = String::new();
        output.push_str(&format!("{}\n", "Registered stores:".bold()));

        for name in &names {
            if detailed {
                let info = self.engine.store_info(name).await?;
                output.push_str(&format!("  {} {}\n", "•".green(), name.cyan().bold()));
                output.push_str(&format!("    Type: {:?}\n", info.store_type));
                output.push_str(&format!(
                    "    Connected: {}\n",
                    if info.connected { "Yes".green() } else { "No".red() }
                ));
                output.push_str(&format!(
                    "    Indexes: {}\n",
                    if info.capabilities.supports_indexes { "Yes".green() } else { "No".red() }
                ));
                output.push_str(&format!(
                    "    Explain: {}\n",
                    if info.capabilities.supports_explain { "Yes".green() } else { "No".red() }
                ));
                output.push_str(&format!(
                    "    Aggregation: {}\n",
                    if info.capabilities.supports_aggregation {
                        "Yes".green()
                    } else {
                        "No".red()
                    }
                ));
                output.push_str(&format!(
                    "    Read-only: {}\n",
                    if info.capabilities.read_only { "Yes".yellow() } else { "No".green() }
                ));
            } else {
                output.push_str(&format!("  {} {}\n", "•".green(), name.cyan()));
            }
        }

        Ok(output)
    }
}

/// Parse CLI arguments and run the selected command
pub async fn run_cli() -> anyhow::Result<()> {
    let args = CliArgs::parse();

    let result = match &args.command {
        Commands::Query { collection, spec, store, format, config, verbose } => {
            let runner = runner_for(config.as_deref()).await?;
            runner.execute_query(collection, spec, store.as_deref(), format, *verbose).await
        }
        Commands::Explain { collection, spec, store, config } => {
            let runner = runner_for(config.as_deref()).await?;
            runner.explain_query(collection, spec, store.as_deref()).await
        }
        Commands::Aggregate { collection, pipeline, store, format, config } => {
            let runner = runner_for(config.as_deref()).await?;
            runner.run_aggregation(collection, pipeline, store.as_deref(), format).await
        }
        Commands::CreateIndex { collection, keys, unique, store, config } => {
            let runner = runner_for(config.as_deref()).await?;
            runner.create_index(collection, keys, *unique, store.as_deref()).await
        }
        Commands::Indexes { collection, store, config } => {
            let runner = runner_for(config.as_deref()).await?;
            runner.list_indexes(collection, store.as_deref()).await
        }
        Commands::Stores { detailed, config } => {
            let runner = runner_for(config.as_deref()).await?;
            runner.list_stores(*detailed).await
        }
    };

    match result {
        Ok(output) => {
            println!("{}", output);
            Ok(())
        }
        Err(error) => {
            eprintln!("{}", OutputFormatter::format_error(&error.to_string()));
            Err(error.into())
        }
    }
}

async fn runner_for(config_path: Option<&str>) -> PlanoResult<CliRunner> {
    let config = CliRunner::load_config(config_path)?;
    CliRunner::with_config(config).await
}
