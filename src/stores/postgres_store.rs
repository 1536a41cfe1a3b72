use async_trait::async_trait;
use deadpool_postgres::{Config, Pool, Runtime};
use std::time::Instant;
use tokio_postgres::NoTls;

use crate::stores::store_trait::{DocumentStore, StoreCapabilities, StoreInitConfig};
use crate::utils::{
    error::{PlanoResult, StoreError},
    types::{
        AggregationPipeline, Constraint, Document, ExecutionStats, FieldPredicate, FieldValue,
        IndexDescriptor, IndexField, QueryDescriptor, SortDirection, StoreType,
    },
};

/// PostgreSQL-backed document store using a pooled tokio-postgres client.
///
/// Each collection is a table with a single `doc JSONB` column; predicates
/// and sorts compile to `doc->>` expressions. Postgres chooses its own
/// access path, so index hints are not supported and `explain` reports the
/// count-based estimate instead of native planner output.
pub struct PostgresStore {
    pool: Option<Pool>,
    connected: bool,
}

impl PostgresStore {
    /// Create a new PostgreSQL store
    pub fn new() -> Self {
        Self { pool: None, connected: false }
    }

    fn pool(&self) -> PlanoResult<&Pool> {
        if !self.connected {
            return Err(
                StoreError::Unavailable("postgres store is not connected".to_string()).into()
            );
        }
        self.pool
            .as_ref()
            .ok_or_else(|| StoreError::Unavailable("postgres pool not initialized".to_string()).into())
    }

    async fn client(&self) -> PlanoResult<deadpool_postgres::Object> {
        let pool = self.pool()?;
        pool.get()
            .await
            .map_err(|e| StoreError::Unavailable(format!("failed to get connection: {}", e)).into())
    }

    /// Collection, field, and index names are interpolated into SQL (always
    /// double-quoted), so restrict them to identifier characters. `-` is
    /// allowed for derived index names like `author_1_published_year_-1`.
    fn validate_identifier(name: &str) -> PlanoResult<()> {
        let valid = !name.is_empty()
            && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
            && !name.chars().next().map_or(false, |c| c.is_ascii_digit());
        if valid {
            Ok(())
        } else {
            Err(StoreError::QueryFailed(format!("invalid identifier: {}", name)).into())
        }
    }

    fn escape_literal(value: &str) -> String {
        value.replace('\'', "''")
    }

    /// `doc->>'field'` with a cast appropriate for the operand type
    fn field_expression(field: &str, operand: &FieldValue) -> String {
        match operand {
            FieldValue::Integer(_) | FieldValue::Number(_) => {
                format!("(doc->>'{}')::numeric", field)
            }
            FieldValue::Boolean(_) => format!("(doc->>'{}')::boolean", field),
            _ => format!("doc->>'{}'", field),
        }
    }

    fn render_operand(operand: &FieldValue) -> String {
        match operand {
            FieldValue::String(s) => format!("'{}'", Self::escape_literal(s)),
            FieldValue::Integer(i) => i.to_string(),
            FieldValue::Number(n) => n.to_string(),
            FieldValue::Boolean(b) => b.to_string(),
            FieldValue::Null => "NULL".to_string(),
        }
    }

    fn constraint_sql(field: &str, constraint: &Constraint) -> PlanoResult<String> {
        Self::validate_identifier(field)?;
        let sql = match constraint {
            Constraint::Eq(FieldValue::Null) => format!("doc->>'{}' IS NULL", field),
            Constraint::Eq(operand) => format!(
                "{} = {}",
                Self::field_expression(field, operand),
                Self::render_operand(operand)
            ),
            Constraint::Gt(operand) => format!(
                "{} > {}",
                Self::field_expression(field, operand),
                Self::render_operand(operand)
            ),
            Constraint::Gte(operand) => format!(
                "{} >= {}",
                Self::field_expression(field, operand),
                Self::render_operand(operand)
            ),
            Constraint::Lt(operand) => format!(
                "{} < {}",
                Self::field_expression(field, operand),
                Self::render_operand(operand)
            ),
            Constraint::Lte(operand) => format!(
                "{} <= {}",
                Self::field_expression(field, operand),
                Self::render_operand(operand)
            ),
            Constraint::In(operands) => {
                if operands.is_empty() {
                    return Ok("FALSE".to_string());
                }
                let rendered: Vec<String> = operands.iter().map(Self::render_operand).collect();
                let expression = Self::field_expression(field, &operands[0]);
                format!("{} IN ({})", expression, rendered.join(", "))
            }
        };
        Ok(sql)
    }

    /// Build a WHERE clause for a predicate; `None` when unconstrained
    fn build_where_clause(predicate: &[FieldPredicate]) -> PlanoResult<Option<String>> {
        if predicate.is_empty() {
            return Ok(None);
        }

        let mut parts = Vec::new();
        for field_predicate in predicate {
            for constraint in &field_predicate.constraints {
                parts.push(Self::constraint_sql(&field_predicate.field, constraint)?);
            }
        }
        Ok(Some(parts.join(" AND ")))
    }

    fn build_find_sql(collection: &str, descriptor: &QueryDescriptor) -> PlanoResult<String> {
        Self::validate_identifier(collection)?;
        let mut sql = format!("SELECT doc::text FROM \"{}\"", collection);

        if let Some(where_clause) = Self::build_where_clause(&descriptor.predicate)? {
            sql.push_str(" WHERE ");
            sql.push_str(&where_clause);
        }

        if !descriptor.sort.is_empty() {
            let mut order_parts = Vec::new();
            for sort_field in &descriptor.sort {
                Self::validate_identifier(&sort_field.field)?;
                let direction = match sort_field.direction {
                    SortDirection::Ascending => "ASC",
                    SortDirection::Descending => "DESC",
                };
                order_parts.push(format!("doc->>'{}' {}", sort_field.field, direction));
            }
            sql.push_str(" ORDER BY ");
            sql.push_str(&order_parts.join(", "));
        }

        if descriptor.skip > 0 {
            sql.push_str(&format!(" OFFSET {}", descriptor.skip));
        }
        if let Some(limit) = descriptor.limit {
            sql.push_str(&format!(" LIMIT {}", limit));
        }

        Ok(sql)
    }

    fn build_count_sql(collection: &str, predicate: &[FieldPredicate]) -> PlanoResult<String> {
        Self::validate_identifier(collection)?;
        let mut sql = format!("SELECT COUNT(*) FROM \"{}\"", collection);
        if let Some(where_clause) = Self::build_where_clause(predicate)? {
            sql.push_str(" WHERE ");
            sql.push_str(&where_clause);
        }
        Ok(sql)
    }

    fn build_create_index_sql(collection: &str, index: &IndexDescriptor) -> PlanoResult<String> {
        Self::validate_identifier(collection)?;
        Self::validate_identifier(&index.name)?;

        let mut key_parts = Vec::new();
        for index_field in &index.fields {
            Self::validate_identifier(&index_field.field)?;
            let direction = match index_field.direction {
                SortDirection::Ascending => "",
                SortDirection::Descending => " DESC",
            };
            key_parts.push(format!("((doc->>'{}')){}", index_field.field, direction));
        }

        let unique = if index.unique { "UNIQUE " } else { "" };
        Ok(format!(
            "CREATE {}INDEX \"{}\" ON \"{}\" ({})",
            unique,
            index.name,
            collection,
            key_parts.join(", ")
        ))
    }

    /// Recover an index key spec from a pg_indexes definition string
    fn parse_index_definition(definition: &str) -> Vec<IndexField> {
        let mut fields = Vec::new();
        let mut rest = definition;

        while let Some(start) = rest.find("doc ->> '") {
            let after = &rest[start + "doc ->> '".len()..];
            let Some(end) = after.find('\'') else { break };
            let field = after[..end].to_string();

            let tail = &after[end..];
            let segment_end = tail.find(',').unwrap_or(tail.len());
            let direction = if tail[..segment_end].contains("DESC") {
                SortDirection::Descending
            } else {
                SortDirection::Ascending
            };

            fields.push(IndexField { field, direction });
            rest = &after[end..];
        }

        fields
    }

    fn query_error(error: tokio_postgres::Error) -> StoreError {
        let message = error.to_string();
        if message.contains("already exists") || message.contains("duplicate key") {
            StoreError::IndexConflict(message)
        } else {
            StoreError::QueryFailed(message)
        }
    }

    fn row_to_document(text: &str) -> PlanoResult<Document> {
        let value: serde_json::Value = serde_json::from_str(text)
            .map_err(|e| StoreError::QueryFailed(format!("invalid document JSON: {}", e)))?;
        match value {
            serde_json::Value::Object(map) => Ok(map),
            _ => Err(StoreError::QueryFailed("stored value is not a document".to_string()).into()),
        }
    }

    async fn run_count(&self, sql: &str) -> PlanoResult<u64> {
        let client = self.client().await?;
        let row = client.query_one(sql, &[]).await.map_err(Self::query_error)?;
        let count: i64 = row
            .try_get(0)
            .map_err(|e| StoreError::QueryFailed(format!("failed to read count: {}", e)))?;
        Ok(count.max(0) as u64)
    }
}

impl Default for PostgresStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DocumentStore for PostgresStore {
    async fn connect(&mut self, config: StoreInitConfig) -> PlanoResult<()> {
        let mut pg_config = Config::new();
        pg_config.host = config.connection_params.get("host").cloned();
        pg_config.port = config
            .connection_params
            .get("port")
            .and_then(|p| p.parse::<u16>().ok());
        pg_config.user = config.connection_params.get("user").cloned();
        pg_config.password = config.connection_params.get("password").cloned();
        pg_config.dbname = config.connection_params.get("dbname").cloned();

        let pool = pg_config
            .create_pool(Some(Runtime::Tokio1), NoTls)
            .map_err(|e| StoreError::Unavailable(format!("failed to create pool: {}", e)))?;

        // Verify the backend is actually reachable before reporting success
        pool.get()
            .await
            .map_err(|e| StoreError::Unavailable(format!("connection failed: {}", e)))?;

        self.pool = Some(pool);
        self.connected = true;
        Ok(())
    }

    async fn disconnect(&mut self) -> PlanoResult<()> {
        self.pool = None;
        self.connected = false;
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.connected
    }

    async fn count(&self, collection: &str, predicate: &[FieldPredicate]) -> PlanoResult<u64> {
        let sql = Self::build_count_sql(collection, predicate)?;
        self.run_count(&sql).await
    }

    async fn find(
        &self,
        collection: &str,
        descriptor: &QueryDescriptor,
        _hint: Option<&IndexDescriptor>,
    ) -> PlanoResult<Vec<Document>> {
        let sql = Self::build_find_sql(collection, descriptor)?;
        let client = self.client().await?;
        let rows = client.query(sql.as_str(), &[]).await.map_err(Self::query_error)?;

        let mut documents = Vec::with_capacity(rows.len());
        for row in &rows {
            let text: String = row
                .try_get(0)
                .map_err(|e| StoreError::QueryFailed(format!("failed to read row: {}", e)))?;
            let document = Self::row_to_document(&text)?;
            match &descriptor.projection {
                Some(projection) => documents.push(projection.apply(&document)),
                None => documents.push(document),
            }
        }
        Ok(documents)
    }

    async fn list_indexes(&self, collection: &str) -> PlanoResult<Vec<IndexDescriptor>> {
        Self::validate_identifier(collection)?;
        let client = self.client().await?;
        let rows = client
            .query(
                "SELECT indexname, indexdef FROM pg_indexes WHERE tablename = $1",
                &[&collection],
            )
            .await
            .map_err(Self::query_error)?;

        let mut indexes = Vec::new();
        for row in &rows {
            let name: String = row
                .try_get(0)
                .map_err(|e| StoreError::QueryFailed(format!("failed to read index name: {}", e)))?;
            let definition: String = row
                .try_get(1)
                .map_err(|e| StoreError::QueryFailed(format!("failed to read index def: {}", e)))?;

            let fields = Self::parse_index_definition(&definition);
            if fields.is_empty() {
                // Not a doc-expression index (e.g. a primary key); skip it
                continue;
            }

            indexes.push(IndexDescriptor {
                name,
                fields,
                unique: definition.starts_with("CREATE UNIQUE INDEX"),
            });
        }
        Ok(indexes)
    }

    async fn create_index(
        &self,
        collection: &str,
        index: IndexDescriptor,
    ) -> PlanoResult<IndexDescriptor> {
        if index.fields.is_empty() {
            return Err(StoreError::QueryFailed("index must cover at least one field".to_string())
                .into());
        }

        let sql = Self::build_create_index_sql(collection, &index)?;
        let client = self.client().await?;
        client.execute(sql.as_str(), &[]).await.map_err(Self::query_error)?;
        Ok(index)
    }

    async fn explain(
        &self,
        collection: &str,
        descriptor: &QueryDescriptor,
        hint: Option<&IndexDescriptor>,
    ) -> PlanoResult<ExecutionStats> {
        let start = Instant::now();

        let docs_examined = match hint {
            Some(index) => {
                let mut prefix: Vec<FieldPredicate> = Vec::new();
                for index_field in &index.fields {
                    match descriptor.constraints_on(&index_field.field) {
                        Some(predicate) => prefix.push(predicate.clone()),
                        None => break,
                    }
                }
                if prefix.is_empty() {
                    self.count(collection, &[]).await?
                } else {
                    self.count(collection, &prefix).await?
                }
            }
            None => self.count(collection, &[]).await?,
        };

        let elapsed_millis = start.elapsed().as_secs_f64() * 1000.0;
        Ok(ExecutionStats::new(docs_examined, elapsed_millis))
    }

    async fn aggregate(
        &self,
        _collection: &str,
        _pipeline: &AggregationPipeline,
    ) -> PlanoResult<Vec<Document>> {
        Err(StoreError::UnsupportedOperation(
            "postgres store does not support aggregation pipelines".to_string(),
        )
        .into())
    }

    async fn insert_many(&self, collection: &str, documents: Vec<Document>) -> PlanoResult<u64> {
        Self::validate_identifier(collection)?;
        if documents.is_empty() {
            return Ok(0);
        }

        let client = self.client().await?;
        client
            .execute(
                format!("CREATE TABLE IF NOT EXISTS \"{}\" (doc JSONB NOT NULL)", collection)
                    .as_str(),
                &[],
            )
            .await
            .map_err(Self::query_error)?;

        let mut values = Vec::with_capacity(documents.len());
        for document in &documents {
            let text = serde_json::to_string(document)
                .map_err(|e| StoreError::QueryFailed(format!("failed to serialize: {}", e)))?;
            values.push(format!("('{}'::jsonb)", Self::escape_literal(&text)));
        }

        let sql = format!("INSERT INTO \"{}\" (doc) VALUES {}", collection, values.join(", "));
        let inserted = client.execute(sql.as_str(), &[]).await.map_err(Self::query_error)?;
        Ok(inserted)
    }

    async fn update_one(
        &self,
        collection: &str,
        predicate: &[FieldPredicate],
        set: Document,
    ) -> PlanoResult<u64> {
        Self::validate_identifier(collection)?;
        let set_text = serde_json::to_string(&set)
            .map_err(|e| StoreError::QueryFailed(format!("failed to serialize: {}", e)))?;

        let mut target = format!("SELECT ctid FROM \"{}\"", collection);
        if let Some(where_clause) = Self::build_where_clause(predicate)? {
            target.push_str(" WHERE ");
            target.push_str(&where_clause);
        }
        target.push_str(" LIMIT 1");

        let sql = format!(
            "UPDATE \"{}\" SET doc = doc || '{}'::jsonb WHERE ctid IN ({})",
            collection,
            Self::escape_literal(&set_text),
            target
        );

        let client = self.client().await?;
        let updated = client.execute(sql.as_str(), &[]).await.map_err(Self::query_error)?;
        Ok(updated)
    }

    async fn delete_one(&self, collection: &str, predicate: &[FieldPredicate]) -> PlanoResult<u64> {
        Self::validate_identifier(collection)?;

        let mut target = format!("SELECT ctid FROM \"{}\"", collection);
        if let Some(where_clause) = Self::build_where_clause(predicate)? {
            target.push_str(" WHERE ");
            target.push_str(&where_clause);
        }
        target.push_str(" LIMIT 1");

        let sql = format!("DELETE FROM \"{}\" WHERE ctid IN ({})", collection, target);

        let client = self.client().await?;
        let deleted = client.execute(sql.as_str(), &[]).await.map_err(Self::query_error)?;
        Ok(deleted)
    }

    fn store_type(&self) -> StoreType {
        StoreType::PostgreSQL
    }

    fn capabilities(&self) -> StoreCapabilities {
        StoreCapabilities {
            supports_indexes: true,
            supports_hints: false,
            supports_explain: true,
            supports_aggregation: false,
            read_only: false,
        }
    }
}
