use clap::{Parser, Subcommand, ValueEnum};

/// Plano CLI - index-aware query planning front-end for document stores
#[derive(Parser, Debug)]
#[command(name = "plano")]
#[command(about = "Index-aware query planning and execution front-end for document stores")]
#[command(version = "0.1.0")]
pub struct CliArgs {
    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Compile, plan, and execute a query spec
    Query {
        /// Collection to query
        collection: String,

        /// Raw query spec as JSON, e.g. '{"filter": {"genre": "Fiction"}}'
        #[arg(value_name = "SPEC")]
        spec: String,

        /// Store to run against
        #[arg(short, long)]
        store: Option<String>,

        /// Output format
        #[arg(short, long, default_value = "table")]
        format: OutputFormat,

        /// Engine configuration file
        #[arg(short, long)]
        config: Option<String>,

        /// Enable verbose output
        #[arg(short, long)]
        verbose: bool,
    },

    /// Show the chosen plan and index-versus-scan statistics for a spec
    Explain {
        /// Collection to query
        collection: String,

        /// Raw query spec as JSON
        #[arg(value_name = "SPEC")]
        spec: String,

        /// Store to run against
        #[arg(short, long)]
        store: Option<String>,

        /// Engine configuration file
        #[arg(short, long)]
        config: Option<String>,
    },

    /// Run an aggregation pipeline
    Aggregate {
        /// Collection to aggregate
        collection: String,

        /// Raw pipeline as a JSON stage array
        #[arg(value_name = "PIPELINE")]
        pipeline: String,

        /// Store to run against
        #[arg(short, long)]
        store: Option<String>,

        /// Output format
        #[arg(short, long, default_value = "table")]
        format: OutputFormat,

        /// Engine configuration file
        #[arg(short, long)]
        config: Option<String>,
    },

    /// Create an index on a collection
    CreateIndex {
        /// Collection to index
        collection: String,

        /// Index keys as JSON, e.g. '{"title": 1}' or '[["author", 1], ["published_year", 1]]'
        #[arg(value_name = "KEYS")]
        keys: String,

        /// Enforce uniqueness
        #[arg(long)]
        unique: bool,

        /// Store to run against
        #[arg(short, long)]
        store: Option<String>,

        /// Engine configuration file
        #[arg(short, long)]
        config: Option<String>,
    },

    /// List a collection's indexes
    Indexes {
        /// Collection to inspect
        collection: String,

        /// Store to run against
        #[arg(short, long)]
        store: Option<String>,

        /// Engine configuration file
        #[arg(short, long)]
        config: Option<String>,
    },

    /// List registered stores
    Stores {
        /// Show detailed information
        #[arg(short, long)]
        detailed: bool,

        /// Engine configuration file
        #[arg(short, long)]
        config: Option<String>,
    },
}

/// Output format options
#[derive(ValueEnum, Debug, Clone)]
pub enum OutputFormat {
    /// Formatted table output
    Table,
    /// JSON output
    Json,
    /// CSV output
    Csv,
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OutputFormat::Table => write!(f, "table"),
            OutputFormat::Json => write!(f, "json"),
            OutputFormat::Csv => write!(f, "csv"),
        }
    }
}
