use std::sync::Arc;

use arrow_array::{ArrayRef, Int64Array, StringArray};
use arrow_schema::DataType;

use crate::reader::table::{ChunkedColumn, Table};

fn int_chunk(values: &[i64]) -> ArrayRef {
    Arc::new(Int64Array::from(values.to_vec()))
}

#[test]
fn chunked_column_sums_chunk_lengths() {
    let column = ChunkedColumn::new(
        DataType::Int64,
        vec![int_chunk(&[1, 2]), int_chunk(&[3]), int_chunk(&[])],
    );
    assert_eq!(column.len(), 3);
    assert!(!column.is_empty());
    assert_eq!(column.chunks().len(), 3);
    assert_eq!(column.data_type(), &DataType::Int64);
}

#[test]
fn empty_column() {
    let column = ChunkedColumn::new(DataType::Utf8, Vec::new());
    assert_eq!(column.len(), 0);
    assert!(column.is_empty());
}

#[test]
fn table_zips_names_with_columns() {
    let names = vec!["word".to_string(), "count".to_string()];
    let words: ArrayRef = Arc::new(StringArray::from(vec!["a", "b"]));
    let table = Table::new(
        names,
        vec![
            ChunkedColumn::new(DataType::Utf8, vec![words]),
            ChunkedColumn::new(DataType::Int64, vec![int_chunk(&[1, 2])]),
        ],
    );

    assert_eq!(table.num_rows(), 2);
    assert_eq!(table.num_columns(), 2);

    let schema = table.schema();
    assert_eq!(schema.field(0).name(), "word");
    assert_eq!(schema.field(0).data_type(), &DataType::Utf8);
    assert_eq!(schema.field(1).name(), "count");
    assert_eq!(schema.field(1).data_type(), &DataType::Int64);

    assert_eq!(
        table.column_by_name("count").unwrap().data_type(),
        &DataType::Int64
    );
    assert!(table.column_by_name("missing").is_none());
}
