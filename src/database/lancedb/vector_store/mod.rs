
use super::{ChunkMetadata, EmbeddingRecord};
use crate::{RagError, Result};
use arrow::array::{
    Array, FixedSizeListArray, Float32Array, RecordBatchIterator, StringArray, UInt32Array,
};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use futures::TryStreamExt;
use lancedb::{
    Connection, DistanceType, Table,
    query::{ExecutableQuery, QueryBase},
};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

const TABLE_NAME: &str = "chunks";

/// Append-only LanceDB table of chunk embeddings
pub struct VectorStore {
    connection: Connection,
    path: PathBuf,
    table_name: String,
    vector_dimension: Option<usize>,
}

/// Nearest-neighbour candidate returned by a vector search
#[derive(Debug, Clone)]
pub struct SearchResult {
    pub chunk_metadata: ChunkMetadata,
    /// Stored embedding, needed to re-rank candidates against each other
    pub vector: Vec<f32>,
    /// Cosine similarity to the query
    pub similarity_score: f32,
    pub distance: f32,
}

impl VectorStore {
    /// Open (or create) the store rooted at `path`
    #[inline]
    pub async fn open(path: &Path) -> Result<Self> {
        debug!("Initializing LanceDB at path: {}", path.display());

        std::fs::create_dir_all(path).map_err(|e| {
            RagError::Database(format!("Failed to create vector database directory: {}", e))
        })?;

        let uri = path.display().to_string();
        let connection = lancedb::connect(&uri)
            .execute()
            .await
            .map_err(|e| RagError::Database(format!("Failed to connect to LanceDB: {}", e)))?;

        let mut store = Self {
            connection,
            path: path.to_path_buf(),
            table_name: TABLE_NAME.to_string(),
            vector_dimension: None,
        };

        if store.table_exists().await? {
            let dimension = store.detect_existing_vector_dimension().await?;
            debug!("Existing chunks table has {} dimensions", dimension);
            store.vector_dimension = Some(dimension);
        }

        info!("Vector store opened at {}", path.display());
        Ok(store)
    }

    #[inline]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Dimension of the stored vectors, `None` until the first insert
    #[inline]
    pub fn vector_dimension(&self) -> Option<usize> {
        self.vector_dimension
    }

    async fn table_exists(&self) -> Result<bool> {
        let table_names = self
            .connection
            .table_names()
            .execute()
            .await
            .map_err(|e| RagError::Database(format!("Failed to list tables: {}", e)))?;
        Ok(table_names.contains(&self.table_name))
    }

    async fn open_table(&self) -> Result<Table> {
        self.connection
            .open_table(&self.table_name)
            .execute()
            .await
            .map_err(|e| RagError::Database(format!("Failed to open table: {}", e)))
    }

    /// Detect vector dimension from existing table schema
    async fn detect_existing_vector_dimension(&self) -> Result<usize> {
        let schema = self
            .open_table()
            .await?
            .schema()
            .await
            .map_err(|e| RagError::Database(format!("Failed to get table schema: {}", e)))?;

        schema
            .fields()
            .iter()
            .find(|field| field.name() == "vector")
            .and_then(|field| match field.data_type() {
                DataType::FixedSizeList(_, size) => usize::try_from(*size).ok(),
                _ => None,
            })
            .ok_or_else(|| {
                RagError::Database("Could not find vector column or determine dimension".to_string())
            })
    }

    /// Create schema with the specified vector dimension
    fn create_schema(vector_dim: usize) -> Result<Arc<Schema>> {
        let list_size = i32::try_from(vector_dim)
            .map_err(|_| RagError::Database(format!("Vector dimension {} too large", vector_dim)))?;

        Ok(Arc::new(Schema::new(vec![
            Field::new("id", DataType::Utf8, false),
            Field::new(
                "vector",
                DataType::FixedSizeList(
                    Arc::new(Field::new("item", DataType::Float32, false)),
                    list_size,
                ),
                false,
            ),
            Field::new("chunk_id", DataType::Utf8, false),
            Field::new("source", DataType::Utf8, false),
            Field::new("page", DataType::UInt32, true),
            Field::new("content_type", DataType::Utf8, false),
            Field::new("content", DataType::Utf8, false),
            Field::new("token_count", DataType::UInt32, false),
            Field::new("chunk_index", DataType::UInt32, false),
            Field::new("extra", DataType::Utf8, false),
            Field::new("created_at", DataType::Utf8, false),
        ])))
    }

    /// Append embeddings, creating the table on first use.
    ///
    /// Every vector must have the dimension of the existing table.
    #[inline]
    pub async fn store_embeddings_batch(&mut self, records: Vec<EmbeddingRecord>) -> Result<()> {
        let Some(first) = records.first() else {
            debug!("No embeddings to store");
            return Ok(());
        };

        let vector_dim = first.vector.len();
        if vector_dim == 0 {
            return Err(RagError::Database("Cannot store empty vectors".to_string()));
        }
        if let Some(bad) = records.iter().find(|r| r.vector.len() != vector_dim) {
            return Err(RagError::Database(format!(
                "Inconsistent vector dimensions in batch: {} vs {}",
                bad.vector.len(),
                vector_dim
            )));
        }

        match self.vector_dimension {
            Some(existing) if existing != vector_dim => {
                return Err(RagError::Database(format!(
                    "Vector dimension {} does not match the store ({}). \
                     Use a new data directory for a different embedding model.",
                    vector_dim, existing
                )));
            }
            Some(_) => {}
            None => {
                info!("Creating chunks table with {} dimensions", vector_dim);
                self.connection
                    .create_empty_table(&self.table_name, Self::create_schema(vector_dim)?)
                    .execute()
                    .await
                    .map_err(|e| RagError::Database(format!("Failed to create table: {}", e)))?;
                self.vector_dimension = Some(vector_dim);
            }
        }

        let record_batch = Self::create_record_batch(&records, vector_dim)?;
        let schema = record_batch.schema();
        let reader = RecordBatchIterator::new(std::iter::once(Ok(record_batch)), schema);

        self.open_table()
            .await?
            .add(reader)
            .execute()
            .await
            .map_err(|e| RagError::Database(format!("Failed to insert embeddings: {}", e)))?;

        debug!("Stored {} embeddings", records.len());
        Ok(())
    }

    /// Create a RecordBatch from embedding records
    fn create_record_batch(records: &[EmbeddingRecord], vector_dim: usize) -> Result<RecordBatch> {
        let len = records.len();
        let schema = Self::create_schema(vector_dim)?;

        let mut flat_values = Vec::with_capacity(len * vector_dim);
        let mut extras = Vec::with_capacity(len);
        for record in records {
            flat_values.extend_from_slice(&record.vector);
            extras.push(
                serde_json::to_string(&record.metadata.extra).map_err(|e| {
                    RagError::Database(format!("Failed to serialize chunk metadata: {}", e))
                })?,
            );
        }

        let field = Arc::new(Field::new("item", DataType::Float32, false));
        let list_size = i32::try_from(vector_dim)
            .map_err(|_| RagError::Database(format!("Vector dimension {} too large", vector_dim)))?;
        let vector_array = FixedSizeListArray::try_new(
            field,
            list_size,
            Arc::new(Float32Array::from(flat_values)),
            None,
        )
        .map_err(|e| RagError::Database(format!("Failed to create vector array: {}", e)))?;

        let arrays: Vec<Arc<dyn Array>> = vec![
            Arc::new(StringArray::from_iter_values(
                records.iter().map(|r| r.id.as_str()),
            )),
            Arc::new(vector_array),
            Arc::new(StringArray::from_iter_values(
                records.iter().map(|r| r.metadata.chunk_id.as_str()),
            )),
            Arc::new(StringArray::from_iter_values(
                records.iter().map(|r| r.metadata.source.as_str()),
            )),
            Arc::new(UInt32Array::from(
                records.iter().map(|r| r.metadata.page).collect::<Vec<_>>(),
            )),
            Arc::new(StringArray::from_iter_values(
                records.iter().map(|r| r.metadata.content_type.as_str()),
            )),
            Arc::new(StringArray::from_iter_values(
                records.iter().map(|r| r.metadata.content.as_str()),
            )),
            Arc::new(UInt32Array::from_iter_values(
                records.iter().map(|r| r.metadata.token_count),
            )),
            Arc::new(UInt32Array::from_iter_values(
                records.iter().map(|r| r.metadata.chunk_index),
            )),
            Arc::new(StringArray::from(extras)),
            Arc::new(StringArray::from_iter_values(
                records.iter().map(|r| r.metadata.created_at.as_str()),
            )),
        ];

        RecordBatch::try_new(schema, arrays)
            .map_err(|e| RagError::Database(format!("Failed to create record batch: {}", e)))
    }

    /// The `limit` nearest chunks to `query_vector` by cosine distance,
    /// closest first, each with its stored vector.
    #[inline]
    pub async fn search_candidates(
        &self,
        query_vector: &[f32],
        limit: usize,
    ) -> Result<Vec<SearchResult>> {
        if self.vector_dimension.is_none() || limit == 0 {
            return Ok(Vec::new());
        }

        debug!("Searching for {} nearest chunks", limit);

        let results = self
            .open_table()
            .await?
            .vector_search(query_vector)
            .map_err(|e| RagError::Database(format!("Failed to create vector search: {}", e)))?
            .column("vector")
            .distance_type(DistanceType::Cosine)
            .limit(limit)
            .execute()
            .await
            .map_err(|e| RagError::Database(format!("Failed to execute search: {}", e)))?;

        let batches: Vec<RecordBatch> = results
            .try_collect()
            .await
            .map_err(|e| RagError::Database(format!("Failed to read result stream: {}", e)))?;

        let mut search_results = Vec::new();
        for batch in &batches {
            search_results.extend(Self::parse_search_batch(batch)?);
        }
        search_results.sort_by(|a, b| a.distance.total_cmp(&b.distance));

        debug!("Parsed {} search results", search_results.len());
        Ok(search_results)
    }

    fn string_column<'a>(batch: &'a RecordBatch, name: &str) -> Result<&'a StringArray> {
        batch
            .column_by_name(name)
            .ok_or_else(|| RagError::Database(format!("Missing {} column", name)))?
            .as_any()
            .downcast_ref::<StringArray>()
            .ok_or_else(|| RagError::Database(format!("Invalid {} column type", name)))
    }

    fn u32_column<'a>(batch: &'a RecordBatch, name: &str) -> Result<&'a UInt32Array> {
        batch
            .column_by_name(name)
            .ok_or_else(|| RagError::Database(format!("Missing {} column", name)))?
            .as_any()
            .downcast_ref::<UInt32Array>()
            .ok_or_else(|| RagError::Database(format!("Invalid {} column type", name)))
    }

    /// Parse a single record batch from search results
    fn parse_search_batch(batch: &RecordBatch) -> Result<Vec<SearchResult>> {
        let chunk_ids = Self::string_column(batch, "chunk_id")?;
        let sources = Self::string_column(batch, "source")?;
        let pages = Self::u32_column(batch, "page")?;
        let content_types = Self::string_column(batch, "content_type")?;
        let contents = Self::string_column(batch, "content")?;
        let token_counts = Self::u32_column(batch, "token_count")?;
        let chunk_indices = Self::u32_column(batch, "chunk_index")?;
        let extras = Self::string_column(batch, "extra")?;
        let created_ats = Self::string_column(batch, "created_at")?;

        let vectors = batch
            .column_by_name("vector")
            .ok_or_else(|| RagError::Database("Missing vector column".to_string()))?
            .as_any()
            .downcast_ref::<FixedSizeListArray>()
            .ok_or_else(|| RagError::Database("Invalid vector column type".to_string()))?;

        let distances = batch
            .column_by_name("_distance")
            .and_then(|col| col.as_any().downcast_ref::<Float32Array>());

        let mut search_results = Vec::with_capacity(batch.num_rows());
        for row in 0..batch.num_rows() {
            let vector = vectors
                .value(row)
                .as_any()
                .downcast_ref::<Float32Array>()
                .map(|values| values.values().to_vec())
                .ok_or_else(|| RagError::Database("Invalid vector item type".to_string()))?;

            let chunk_metadata = ChunkMetadata {
                chunk_id: chunk_ids.value(row).to_string(),
                source: sources.value(row).to_string(),
                page: (!pages.is_null(row)).then(|| pages.value(row)),
                content_type: content_types.value(row).to_string(),
                content: contents.value(row).to_string(),
                token_count: token_counts.value(row),
                chunk_index: chunk_indices.value(row),
                extra: serde_json::from_str(extras.value(row)).unwrap_or_default(),
                created_at: created_ats.value(row).to_string(),
            };

            let distance =
                distances.map_or(0.0, |d| if d.is_null(row) { 0.0 } else { d.value(row) });

            search_results.push(SearchResult {
                chunk_metadata,
                vector,
                similarity_score: 1.0 - distance,
                distance,
            });
        }

        Ok(search_results)
    }

    /// Get the total number of embeddings stored
    #[inline]
    pub async fn count_embeddings(&self) -> Result<u64> {
        if !self.table_exists().await? {
            return Ok(0);
        }

        let count = self
            .open_table()
            .await?
            .count_rows(None)
            .await
            .map_err(|e| RagError::Database(format!("Failed to count rows: {}", e)))?;

        Ok(count as u64)
    }

    /// Compact data files after a large ingestion
    #[inline]
    pub async fn optimize(&self) -> Result<()> {
        if self.vector_dimension.is_none() {
            return Ok(());
        }

        debug!("Optimizing vector database");
        self.open_table()
            .await?
            .optimize(lancedb::table::OptimizeAction::All)
            .await
            .map_err(|e| RagError::Database(format!("Failed to optimize table: {}", e)))?;

        info!("Vector database optimization completed");
        Ok(())
    }
}
