use std::sync::Arc;

use arrow_array::{Array, ArrayRef};
use arrow_schema::{DataType, Field, Schema, SchemaRef};

/// A finished column: per-block typed arrays in block index order, all of
/// one data type.
#[derive(Debug, Clone)]
pub struct ChunkedColumn {
    data_type: DataType,
    chunks: Vec<ArrayRef>,
    length: usize,
}

impl ChunkedColumn {
    pub fn new(data_type: DataType, chunks: Vec<ArrayRef>) -> Self {
        let length = chunks.iter().map(|chunk| chunk.len()).sum();
        Self {
            data_type,
            chunks,
            length,
        }
    }

    pub fn data_type(&self) -> &DataType {
        &self.data_type
    }

    pub fn chunks(&self) -> &[ArrayRef] {
        &self.chunks
    }

    pub fn len(&self) -> usize {
        self.length
    }

    pub fn is_empty(&self) -> bool {
        self.length == 0
    }
}

/// Column-oriented result of one fixed-width read: a schema plus one chunked
/// column per declared field, all with identical total lengths.
#[derive(Debug, Clone)]
pub struct Table {
    schema: SchemaRef,
    columns: Vec<ChunkedColumn>,
    num_rows: usize,
}

impl Table {
    pub(crate) fn new(names: Vec<String>, columns: Vec<ChunkedColumn>) -> Self {
        let fields: Vec<Field> = names
            .iter()
            .zip(columns.iter())
            .map(|(name, column)| Field::new(name, column.data_type().clone(), true))
            .collect();
        let num_rows = columns.first().map(|column| column.len()).unwrap_or(0);
        Self {
            schema: Arc::new(Schema::new(fields)),
            columns,
            num_rows,
        }
    }

    pub fn schema(&self) -> SchemaRef {
        Arc::clone(&self.schema)
    }

    pub fn num_rows(&self) -> usize {
        self.num_rows
    }

    pub fn num_columns(&self) -> usize {
        self.columns.len()
    }

    pub fn column(&self, index: usize) -> &ChunkedColumn {
        &self.columns[index]
    }

    pub fn columns(&self) -> &[ChunkedColumn] {
        &self.columns
    }

    pub fn column_by_name(&self, name: &str) -> Option<&ChunkedColumn> {
        let index = self.schema.index_of(name).ok()?;
        Some(&self.columns[index])
    }
}
