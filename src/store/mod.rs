// Vector store module
// Persists document chunks with their embeddings in a directory-backed
// LanceDB table and answers nearest-neighbor queries


use arrow::array::{
    Array, FixedSizeListArray, Float32Array, RecordBatchIterator, StringArray, UInt32Array,
};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use futures::TryStreamExt;
use lancedb::{
    Connection,
    query::{ExecutableQuery, QueryBase},
};
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info};

use crate::{RagError, Result};

const TABLE_NAME: &str = "chunks";

/// Directory-backed vector store for document chunks.
///
/// Handles are cheap and constructed fresh per request; the on-disk state is
/// the only thing shared between them.
pub struct VectorStore {
    connection: Connection,
}

/// One chunk with its embedding, ready to persist.
#[derive(Debug, Clone)]
pub struct ChunkRecord {
    pub id: String,
    pub vector: Vec<f32>,
    /// Chunk text as produced by the splitter
    pub content: String,
    /// Originating filename, never empty
    pub source_file: String,
    /// Position of this chunk within its document
    pub chunk_index: u32,
    pub created_at: String,
}

/// Search hit from a similarity query.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredChunk {
    pub content: String,
    pub source_file: String,
    pub distance: f32,
}

impl VectorStore {
    /// Open the store backed by the given directory, creating the directory
    /// if needed. The chunks table itself is created lazily on first insert,
    /// when the vector dimension is known from real data.
    #[inline]
    pub async fn open(dir: &Path) -> Result<Self> {
        std::fs::create_dir_all(dir).map_err(|e| {
            RagError::Storage(format!("Failed to create vector store directory: {e}"))
        })?;

        let uri = format!("file://{}", dir.display());
        debug!("Opening vector store at {}", uri);

        let connection = lancedb::connect(&uri)
            .execute()
            .await
            .map_err(|e| RagError::Storage(format!("Failed to connect to vector store: {e}")))?;

        Ok(Self { connection })
    }

    /// Append chunk records. Re-ingesting the same document adds duplicate
    /// records; nothing is ever overwritten or deleted here.
    #[inline]
    pub async fn add_chunks(&self, records: Vec<ChunkRecord>) -> Result<()> {
        if records.is_empty() {
            debug!("No chunks to store");
            return Ok(());
        }

        let vector_dim = records[0].vector.len();
        if vector_dim == 0 {
            return Err(RagError::Storage("Embedding vector is empty".to_string()));
        }
        if let Some(record) = records.iter().find(|r| r.vector.len() != vector_dim) {
            return Err(RagError::Storage(format!(
                "Inconsistent vector dimensions in batch: {} vs {}",
                vector_dim,
                record.vector.len()
            )));
        }

        self.ensure_table(vector_dim).await?;

        let record_batch = create_record_batch(&records, vector_dim)?;
        let schema = record_batch.schema();
        let reader = RecordBatchIterator::new(std::iter::once(Ok(record_batch)), schema);

        let table = self.open_table().await?;
        table
            .add(reader)
            .execute()
            .await
            .map_err(|e| RagError::Storage(format!("Failed to insert chunks: {e}")))?;

        info!("Stored {} chunks", records.len());
        Ok(())
    }

    /// Nearest-neighbor search over stored chunks. An absent table (nothing
    /// ingested yet) yields an empty result, not an error.
    #[inline]
    pub async fn search_similar(
        &self,
        query_vector: &[f32],
        limit: usize,
    ) -> Result<Vec<ScoredChunk>> {
        if !self.table_exists().await? {
            debug!("Chunks table does not exist yet, returning no results");
            return Ok(Vec::new());
        }

        let table = self.open_table().await?;

        let mut results = table
            .vector_search(query_vector)
            .map_err(|e| RagError::Storage(format!("Failed to create vector search: {e}")))?
            .column("vector")
            .limit(limit)
            .execute()
            .await
            .map_err(|e| RagError::Storage(format!("Failed to execute search: {e}")))?;

        let mut hits = Vec::new();
        while let Some(batch) = results
            .try_next()
            .await
            .map_err(|e| RagError::Storage(format!("Failed to read result stream: {e}")))?
        {
            hits.extend(parse_search_batch(&batch)?);
        }

        debug!("Similarity search returned {} hits", hits.len());
        Ok(hits)
    }

    /// Total number of stored chunk records.
    #[inline]
    pub async fn count_chunks(&self) -> Result<u64> {
        if !self.table_exists().await? {
            return Ok(0);
        }

        let table = self.open_table().await?;
        let count = table
            .count_rows(None)
            .await
            .map_err(|e| RagError::Storage(format!("Failed to count chunks: {e}")))?;

        Ok(count as u64)
    }

    async fn table_exists(&self) -> Result<bool> {
        let names = self
            .connection
            .table_names()
            .execute()
            .await
            .map_err(|e| RagError::Storage(format!("Failed to list tables: {e}")))?;
        Ok(names.iter().any(|name| name == TABLE_NAME))
    }

    async fn open_table(&self) -> Result<lancedb::Table> {
        self.connection
            .open_table(TABLE_NAME)
            .execute()
            .await
            .map_err(|e| RagError::Storage(format!("Failed to open chunks table: {e}")))
    }

    /// Create the table on first insert, or verify that an existing table
    /// matches the incoming vector dimension.
    async fn ensure_table(&self, vector_dim: usize) -> Result<()> {
        if !self.table_exists().await? {
            info!("Creating chunks table with {} dimensions", vector_dim);
            self.connection
                .create_empty_table(TABLE_NAME, create_schema(vector_dim))
                .execute()
                .await
                .map_err(|e| RagError::Storage(format!("Failed to create chunks table: {e}")))?;
            return Ok(());
        }

        let existing = self.existing_vector_dimension().await?;
        if existing != vector_dim {
            return Err(RagError::Storage(format!(
                "Vector dimension mismatch: table has {existing}, batch has {vector_dim}"
            )));
        }
        Ok(())
    }

    async fn existing_vector_dimension(&self) -> Result<usize> {
        let table = self.open_table().await?;
        let schema = table
            .schema()
            .await
            .map_err(|e| RagError::Storage(format!("Failed to read table schema: {e}")))?;

        for field in schema.fields() {
            if field.name() == "vector" {
                if let DataType::FixedSizeList(_, size) = field.data_type() {
                    return Ok(*size as usize);
                }
            }
        }

        Err(RagError::Storage(
            "Could not determine vector dimension of chunks table".to_string(),
        ))
    }
}

fn create_schema(vector_dim: usize) -> Arc<Schema> {
    Arc::new(Schema::new(vec![
        Field::new("id", DataType::Utf8, false),
        Field::new(
            "vector",
            DataType::FixedSizeList(
                Arc::new(Field::new("item", DataType::Float32, false)),
                vector_dim as i32,
            ),
            false,
        ),
        Field::new("content", DataType::Utf8, false),
        Field::new("source_file", DataType::Utf8, false),
        Field::new("chunk_index", DataType::UInt32, false),
        Field::new("created_at", DataType::Utf8, false),
    ]))
}

fn create_record_batch(records: &[ChunkRecord], vector_dim: usize) -> Result<RecordBatch> {
    let len = records.len();

    let mut ids = Vec::with_capacity(len);
    let mut contents = Vec::with_capacity(len);
    let mut source_files = Vec::with_capacity(len);
    let mut chunk_indices = Vec::with_capacity(len);
    let mut created_ats = Vec::with_capacity(len);
    let mut flat_values = Vec::with_capacity(len * vector_dim);

    for record in records {
        ids.push(record.id.as_str());
        contents.push(record.content.as_str());
        source_files.push(record.source_file.as_str());
        chunk_indices.push(record.chunk_index);
        created_ats.push(record.created_at.as_str());
        flat_values.extend_from_slice(&record.vector);
    }

    let values_array = Float32Array::from(flat_values);
    let item_field = Arc::new(Field::new("item", DataType::Float32, false));
    let vector_array =
        FixedSizeListArray::try_new(item_field, vector_dim as i32, Arc::new(values_array), None)
            .map_err(|e| RagError::Storage(format!("Failed to create vector array: {e}")))?;

    let arrays: Vec<Arc<dyn Array>> = vec![
        Arc::new(StringArray::from(ids)),
        Arc::new(vector_array),
        Arc::new(StringArray::from(contents)),
        Arc::new(StringArray::from(source_files)),
        Arc::new(UInt32Array::from(chunk_indices)),
        Arc::new(StringArray::from(created_ats)),
    ];

    RecordBatch::try_new(create_schema(vector_dim), arrays)
        .map_err(|e| RagError::Storage(format!("Failed to create record batch: {e}")))
}

fn parse_search_batch(batch: &RecordBatch) -> Result<Vec<ScoredChunk>> {
    let contents = string_column(batch, "content")?;
    let source_files = string_column(batch, "source_file")?;

    let distances = batch
        .column_by_name("_distance")
        .map(|col| col.as_any().downcast_ref::<Float32Array>());

    let mut hits = Vec::with_capacity(batch.num_rows());
    for row in 0..batch.num_rows() {
        let distance = distances
            .flatten()
            .map_or(0.0, |d| if d.is_null(row) { 0.0 } else { d.value(row) });

        hits.push(ScoredChunk {
            content: contents.value(row).to_string(),
            source_file: source_files.value(row).to_string(),
            distance,
        });
    }

    Ok(hits)
}

fn string_column<'a>(batch: &'a RecordBatch, name: &str) -> Result<&'a StringArray> {
    batch
        .column_by_name(name)
        .ok_or_else(|| RagError::Storage(format!("Missing {name} column")))?
        .as_any()
        .downcast_ref::<StringArray>()
        .ok_or_else(|| RagError::Storage(format!("Invalid {name} column type")))
}
