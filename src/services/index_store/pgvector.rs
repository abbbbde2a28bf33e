use async_trait::async_trait;
use pgvector::Vector;
use sqlx::Row;
use sqlx::postgres::{PgPool, PgPoolOptions, PgRow};
use std::time::Duration;
use tokio::sync::OnceCell;

use super::{
    IndexStore, batch_document_ids, check_embeddings, created_at_timestamp, resolve_date_range,
};
use crate::error::IndexStoreError;
use crate::models::{
    ChunkBatch, ClassSchema, DeleteSelector, DocumentChunkMetadata, DocumentChunkWithScore,
    DocumentMetadata, DocumentMetadataFilter, FieldKind, IndexStoreConfig, QueryResult,
    QueryWithEmbedding,
};

const CHUNK_COLUMNS: &str = r#"id, document_id, chunk_index, text, source, source_id, url,
    created_at, author, path, object_name, "type", size"#;

/// A positional parameter of a dynamically built statement.
#[derive(Debug, Clone, PartialEq)]
enum Bind {
    Text(String),
    Int(i64),
}

pub struct PgVectorBackend {
    pool: PgPool,
    config: IndexStoreConfig,
    table_name: String,
    dimension: u64,
    chunk_table_ready: OnceCell<()>,
}

impl PgVectorBackend {
    pub async fn new(config: &IndexStoreConfig, dimension: u64) -> Result<Self, IndexStoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(config.pool_max)
            .acquire_timeout(Duration::from_secs(config.pool_acquire_timeout.into()))
            .connect(&config.url)
            .await
            .map_err(|e| IndexStoreError::ConnectionError(e.to_string()))?;

        let backend = Self {
            pool,
            config: config.clone(),
            table_name: config.qualified_table_name(&config.class_name),
            dimension,
            chunk_table_ready: OnceCell::new(),
        };

        backend.check_pgvector_extension().await?;

        if let Some(ref schema) = config.schema {
            backend.ensure_schema(schema).await?;
        }

        Ok(backend)
    }

    async fn check_pgvector_extension(&self) -> Result<(), IndexStoreError> {
        let result: Option<(String,)> =
            sqlx::query_as("SELECT extname FROM pg_extension WHERE extname = 'vector'")
                .fetch_optional(&self.pool)
                .await
                .map_err(|e| IndexStoreError::PostgresError(e.to_string()))?;

        if result.is_none() {
            return Err(IndexStoreError::PgVectorExtensionError(
                "pgvector extension is not installed. Run: CREATE EXTENSION vector;".to_string(),
            ));
        }

        Ok(())
    }

    async fn ensure_schema(&self, schema: &str) -> Result<(), IndexStoreError> {
        let query = format!("CREATE SCHEMA IF NOT EXISTS {}", schema);
        sqlx::query(&query)
            .execute(&self.pool)
            .await
            .map_err(|e| IndexStoreError::PostgresError(e.to_string()))?;
        Ok(())
    }

    async fn table_exists(&self, name: &str) -> Result<bool, IndexStoreError> {
        let row: Option<(String,)> = sqlx::query_as(
            "SELECT table_name::text FROM information_schema.tables \
             WHERE table_name = $1 AND table_schema = COALESCE($2, current_schema())",
        )
        .bind(name.to_lowercase())
        .bind(&self.config.schema)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| IndexStoreError::PostgresError(e.to_string()))?;

        Ok(row.is_some())
    }

    async fn create_chunk_table(&self) -> Result<(), IndexStoreError> {
        let create_table = format!(
            r#"
            CREATE TABLE IF NOT EXISTS {} (
                id TEXT PRIMARY KEY,
                document_id TEXT NOT NULL,
                chunk_index INTEGER NOT NULL,
                text TEXT NOT NULL,
                embedding vector({}) NOT NULL,
                source TEXT,
                source_id TEXT,
                url TEXT,
                created_at TEXT,
                created_at_ts BIGINT,
                author TEXT,
                path TEXT,
                object_name TEXT,
                "type" TEXT,
                size BIGINT
            )
            "#,
            self.table_name, self.dimension
        );

        sqlx::query(&create_table)
            .execute(&self.pool)
            .await
            .map_err(|e| IndexStoreError::ClassError(e.to_string()))?;

        let class = &self.config.class_name;
        let indices = [
            format!(
                "CREATE INDEX IF NOT EXISTS {}_embedding_idx ON {} USING hnsw (embedding vector_cosine_ops)",
                class, self.table_name
            ),
            format!(
                "CREATE INDEX IF NOT EXISTS {}_document_id_idx ON {} (document_id)",
                class, self.table_name
            ),
            format!(
                "CREATE INDEX IF NOT EXISTS {}_created_at_ts_idx ON {} (created_at_ts)",
                class, self.table_name
            ),
        ];

        for index_sql in &indices {
            sqlx::query(index_sql)
                .execute(&self.pool)
                .await
                .map_err(|e| IndexStoreError::ClassError(e.to_string()))?;
        }

        Ok(())
    }

    async fn ensure_chunk_table(&self) -> Result<(), IndexStoreError> {
        self.chunk_table_ready
            .get_or_try_init(|| self.create_chunk_table())
            .await
            .map(|_| ())
    }

    /// `WHERE` clause for a filter, numbering parameters from `first_param`.
    fn build_where(
        filter: &DocumentMetadataFilter,
        first_param: usize,
    ) -> Result<(String, Vec<Bind>), IndexStoreError> {
        let range = resolve_date_range(filter)?;
        let mut parts = Vec::new();
        let mut binds = Vec::new();

        let equalities = [
            ("document_id", filter.document_id.clone()),
            ("source", filter.source.as_ref().map(ToString::to_string)),
            ("source_id", filter.source_id.clone()),
            ("author", filter.author.clone()),
        ];
        for (column, value) in equalities {
            if let Some(value) = value {
                parts.push(format!("{} = ${}", column, first_param + binds.len()));
                binds.push(Bind::Text(value));
            }
        }
        if let Some(start) = range.start {
            parts.push(format!("created_at_ts >= ${}", first_param + binds.len()));
            binds.push(Bind::Int(start));
        }
        if let Some(end) = range.end {
            parts.push(format!("created_at_ts <= ${}", first_param + binds.len()));
            binds.push(Bind::Int(end));
        }

        if parts.is_empty() {
            Ok((String::new(), binds))
        } else {
            Ok((format!("WHERE {}", parts.join(" AND ")), binds))
        }
    }

    fn chunk_from_row(row: &PgRow) -> DocumentChunkWithScore {
        let source: Option<String> = row.get("source");
        let chunk_index: i32 = row.get("chunk_index");
        let size: Option<i64> = row.get("size");
        let score: f64 = row.get("score");

        DocumentChunkWithScore {
            id: row.get("id"),
            text: row.get("text"),
            metadata: DocumentChunkMetadata {
                document_id: row.get("document_id"),
                chunk_index: chunk_index as u32,
                document: DocumentMetadata {
                    source: source.and_then(|s| s.parse().ok()),
                    source_id: row.get("source_id"),
                    url: row.get("url"),
                    created_at: row.get("created_at"),
                    author: row.get("author"),
                    path: row.get("path"),
                    object_name: row.get("object_name"),
                    object_type: row.get("type"),
                    size: size.map(|n| n as u64),
                },
            },
            score: score as f32,
        }
    }
}

fn column_type(kind: FieldKind) -> &'static str {
    match kind {
        FieldKind::String => "TEXT",
        FieldKind::Int => "BIGINT",
    }
}

#[async_trait]
impl IndexStore for PgVectorBackend {
    async fn health_check(&self) -> Result<bool, IndexStoreError> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map(|_| true)
            .map_err(|e| IndexStoreError::ConnectionError(e.to_string()))
    }

    async fn create_class(&self, schema: &ClassSchema) -> Result<bool, IndexStoreError> {
        if self.table_exists(&schema.name).await? {
            return Ok(false);
        }

        let table = self.config.qualified_table_name(&schema.name);
        let columns: Vec<String> = schema
            .fields
            .iter()
            .map(|f| format!("\"{}\" {}", f.name, column_type(f.kind)))
            .collect();
        let create_table = format!(
            "CREATE TABLE IF NOT EXISTS {} (id TEXT PRIMARY KEY, embedding vector({}), {})",
            table,
            self.dimension,
            columns.join(", ")
        );

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| IndexStoreError::ClassError(e.to_string()))?;

        sqlx::query(&create_table)
            .execute(&mut *tx)
            .await
            .map_err(|e| IndexStoreError::ClassError(e.to_string()))?;

        for field in &schema.fields {
            let comment = format!(
                "COMMENT ON COLUMN {}.\"{}\" IS '{}'",
                table,
                field.name,
                field.description.replace('\'', "''")
            );
            sqlx::query(&comment)
                .execute(&mut *tx)
                .await
                .map_err(|e| IndexStoreError::ClassError(e.to_string()))?;
        }

        tx.commit()
            .await
            .map_err(|e| IndexStoreError::ClassError(e.to_string()))?;

        tracing::info!(table = %table, "created class table");
        Ok(true)
    }

    async fn upsert(&self, batches: Vec<ChunkBatch>) -> Result<Vec<String>, IndexStoreError> {
        check_embeddings(&batches, self.dimension as usize)?;
        let document_ids = batch_document_ids(&batches);
        if document_ids.is_empty() {
            return Ok(document_ids);
        }

        self.ensure_chunk_table().await?;

        let delete = format!("DELETE FROM {} WHERE document_id = ANY($1)", self.table_name);
        let insert = format!(
            r#"
            INSERT INTO {} (id, document_id, chunk_index, text, embedding, source, source_id, url,
                            created_at, created_at_ts, author, path, object_name, "type", size)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15)
            ON CONFLICT (id) DO UPDATE SET
                document_id = EXCLUDED.document_id,
                chunk_index = EXCLUDED.chunk_index,
                text = EXCLUDED.text,
                embedding = EXCLUDED.embedding,
                source = EXCLUDED.source,
                source_id = EXCLUDED.source_id,
                url = EXCLUDED.url,
                created_at = EXCLUDED.created_at,
                created_at_ts = EXCLUDED.created_at_ts,
                author = EXCLUDED.author,
                path = EXCLUDED.path,
                object_name = EXCLUDED.object_name,
                "type" = EXCLUDED."type",
                size = EXCLUDED.size
            "#,
            self.table_name
        );

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| IndexStoreError::UpsertError(e.to_string()))?;

        sqlx::query(&delete)
            .bind(&document_ids)
            .execute(&mut *tx)
            .await
            .map_err(|e| IndexStoreError::UpsertError(e.to_string()))?;

        for chunk in batches.into_iter().flat_map(|b| b.chunks) {
            let timestamp = created_at_timestamp(&chunk.metadata);
            let metadata = &chunk.metadata.document;

            sqlx::query(&insert)
                .bind(&chunk.id)
                .bind(&chunk.metadata.document_id)
                .bind(chunk.metadata.chunk_index as i32)
                .bind(&chunk.text)
                .bind(Vector::from(chunk.embedding.clone()))
                .bind(metadata.source.as_ref().map(ToString::to_string))
                .bind(&metadata.source_id)
                .bind(&metadata.url)
                .bind(&metadata.created_at)
                .bind(timestamp)
                .bind(&metadata.author)
                .bind(&metadata.path)
                .bind(&metadata.object_name)
                .bind(&metadata.object_type)
                .bind(metadata.size.map(|n| n as i64))
                .execute(&mut *tx)
                .await
                .map_err(|e| IndexStoreError::UpsertError(e.to_string()))?;
        }

        tx.commit()
            .await
            .map_err(|e| IndexStoreError::UpsertError(e.to_string()))?;

        tracing::debug!(table = %self.table_name, documents = document_ids.len(), "upserted chunks");
        Ok(document_ids)
    }

    async fn query(
        &self,
        queries: Vec<QueryWithEmbedding>,
    ) -> Result<Vec<QueryResult>, IndexStoreError> {
        self.ensure_chunk_table().await?;
        let mut results = Vec::with_capacity(queries.len());

        for QueryWithEmbedding { query, embedding } in queries {
            let (where_clause, binds) = match &query.filter {
                Some(filter) => Self::build_where(filter, 2)?,
                None => (String::new(), Vec::new()),
            };

            let sql = format!(
                r#"
                SELECT {}, 1 - (embedding <=> $1) AS score
                FROM {}
                {}
                ORDER BY embedding <=> $1
                LIMIT {}
                "#,
                CHUNK_COLUMNS, self.table_name, where_clause, query.top_k
            );

            let mut query_builder = sqlx::query(&sql).bind(Vector::from(embedding));
            for bind in binds {
                query_builder = match bind {
                    Bind::Text(value) => query_builder.bind(value),
                    Bind::Int(value) => query_builder.bind(value),
                };
            }

            let rows = query_builder
                .fetch_all(&self.pool)
                .await
                .map_err(|e| IndexStoreError::QueryError(e.to_string()))?;

            let matches = rows.iter().map(Self::chunk_from_row).collect();
            results.push(QueryResult::new(query.query, matches));
        }

        Ok(results)
    }

    async fn delete(&self, selector: DeleteSelector) -> Result<bool, IndexStoreError> {
        self.ensure_chunk_table().await?;

        match selector {
            DeleteSelector::All => {
                let query = format!("TRUNCATE TABLE {}", self.table_name);
                sqlx::query(&query)
                    .execute(&self.pool)
                    .await
                    .map_err(|e| IndexStoreError::DeleteError(e.to_string()))?;
            }
            DeleteSelector::Filter(filter) => {
                let (where_clause, binds) = Self::build_where(&filter, 1)?;
                if where_clause.is_empty() {
                    return Ok(true);
                }
                let query = format!("DELETE FROM {} {}", self.table_name, where_clause);
                let mut query_builder = sqlx::query(&query);
                for bind in binds {
                    query_builder = match bind {
                        Bind::Text(value) => query_builder.bind(value),
                        Bind::Int(value) => query_builder.bind(value),
                    };
                }
                query_builder
                    .execute(&self.pool)
                    .await
                    .map_err(|e| IndexStoreError::DeleteError(e.to_string()))?;
            }
            DeleteSelector::Ids(ids) => {
                let query = format!(
                    "DELETE FROM {} WHERE document_id = ANY($1)",
                    self.table_name
                );
                sqlx::query(&query)
                    .bind(&ids)
                    .execute(&self.pool)
                    .await
                    .map_err(|e| IndexStoreError::DeleteError(e.to_string()))?;
            }
        }

        Ok(true)
    }

    fn class_name(&self) -> &str {
        &self.config.class_name
    }
}
