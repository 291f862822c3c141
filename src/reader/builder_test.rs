use std::sync::Arc;

use arrow_array::{Array, BooleanArray, Int64Array, StringArray};
use arrow_schema::DataType;
use bytes::Bytes;

use crate::reader::builder::{ColumnBuilder, InferKind};
use crate::reader::options::{ConvertOptions, ParseOptions};
use crate::reader::parser::{BlockParser, ParsedBlock};
use crate::reader::task_group::TaskGroup;

fn parse_rows(rows: &[&str], width: u32) -> Arc<ParsedBlock> {
    let mut data = String::new();
    for row in rows {
        data.push_str(row);
        for _ in row.len()..width as usize {
            data.push(' ');
        }
        data.push('\n');
    }
    let parser = BlockParser::new(ParseOptions::new(vec![width]));
    let (parsed, consumed) = parser.parse(Bytes::from(data.clone()));
    assert_eq!(consumed, data.len());
    Arc::new(parsed)
}

fn threaded_group() -> TaskGroup {
    let pool = Arc::new(
        rayon::ThreadPoolBuilder::new()
            .num_threads(4)
            .build()
            .unwrap(),
    );
    TaskGroup::threaded(pool)
}

#[test]
fn infer_kind_lattice_order() {
    let mut kinds = vec![InferKind::Null];
    loop {
        let last = *kinds.last().unwrap();
        match last {
            InferKind::Null => kinds.push(InferKind::Integer),
            InferKind::Integer => kinds.push(InferKind::Boolean),
            InferKind::Boolean => kinds.push(InferKind::Timestamp),
            InferKind::Timestamp => kinds.push(InferKind::Real),
            InferKind::Real => kinds.push(InferKind::Text),
            InferKind::Text => kinds.push(InferKind::Binary),
            InferKind::Binary => break,
        }
    }
    // The enum ordering matches the widening order.
    let mut sorted = kinds.clone();
    sorted.sort();
    assert_eq!(kinds, sorted);
}

#[test]
fn typed_builder_converts_chunks_in_block_order() {
    let group = TaskGroup::serial();
    let builder =
        ColumnBuilder::typed(&DataType::Int64, 0, &ConvertOptions::default(), group.clone())
            .unwrap();

    builder.insert(0, parse_rows(&["1", "2"], 4));
    builder.insert(1, parse_rows(&["3"], 4));
    group.finish().unwrap();

    let column = builder.finish().unwrap();
    assert_eq!(column.data_type(), &DataType::Int64);
    assert_eq!(column.len(), 3);
    assert_eq!(column.chunks().len(), 2);
    let first = column.chunks()[0]
        .as_any()
        .downcast_ref::<Int64Array>()
        .unwrap();
    assert_eq!(&first.values()[..], &[1, 2][..]);
}

#[test]
fn typed_builder_surfaces_conversion_error_with_column_index() {
    let group = TaskGroup::serial();
    let builder =
        ColumnBuilder::typed(&DataType::Int64, 3, &ConvertOptions::default(), group.clone())
            .unwrap();

    builder.insert(0, parse_rows(&["oops"], 4));
    let err = group.finish().unwrap_err();
    assert!(err.to_string().contains("In column #3"), "got: {err}");
}

#[test]
fn typed_builder_rejects_unsupported_type() {
    let group = TaskGroup::serial();
    assert!(ColumnBuilder::typed(&DataType::Date32, 0, &ConvertOptions::default(), group).is_err());
}

#[test]
fn append_uses_the_next_block_index() {
    let group = TaskGroup::serial();
    let builder =
        ColumnBuilder::typed(&DataType::Utf8, 0, &ConvertOptions::default(), group.clone())
            .unwrap();

    builder.append(parse_rows(&["a"], 2));
    builder.append(parse_rows(&["b"], 2));
    group.finish().unwrap();

    let column = builder.finish().unwrap();
    assert_eq!(column.chunks().len(), 2);
    let second = column.chunks()[1]
        .as_any()
        .downcast_ref::<StringArray>()
        .unwrap();
    assert_eq!(second.value(0), "b");
}

#[test]
fn inferring_builder_settles_on_integer() {
    let group = TaskGroup::serial();
    let builder = ColumnBuilder::inferring(0, ConvertOptions::default(), group.clone()).unwrap();

    builder.insert(0, parse_rows(&["12", "34"], 4));
    builder.insert(1, parse_rows(&["56"], 4));
    group.finish().unwrap();

    let column = builder.finish().unwrap();
    assert_eq!(column.data_type(), &DataType::Int64);
    assert_eq!(column.len(), 3);
}

#[test]
fn inferring_builder_widens_and_reconverts_earlier_chunks() {
    let group = TaskGroup::serial();
    let builder = ColumnBuilder::inferring(0, ConvertOptions::default(), group.clone()).unwrap();

    // First chunk converts as Integer, the second forces Text; the first
    // chunk must be reconverted under the widened kind.
    builder.insert(0, parse_rows(&["12"], 5));
    builder.insert(1, parse_rows(&["hello"], 5));
    group.finish().unwrap();

    let column = builder.finish().unwrap();
    assert_eq!(column.data_type(), &DataType::Utf8);
    let first = column.chunks()[0]
        .as_any()
        .downcast_ref::<StringArray>()
        .unwrap();
    assert_eq!(first.value(0), "12");
}

#[test]
fn inferring_builder_prefers_boolean_for_zero_one() {
    let group = TaskGroup::serial();
    let builder = ColumnBuilder::inferring(0, ConvertOptions::default(), group.clone()).unwrap();

    // 0/1 columns parse as integers, but a widening forced by "true" lands
    // on Boolean, where 0 and 1 are recognized spellings.
    builder.insert(0, parse_rows(&["0", "1", "true"], 4));
    group.finish().unwrap();

    let column = builder.finish().unwrap();
    assert_eq!(column.data_type(), &DataType::Boolean);
    let chunk = column.chunks()[0]
        .as_any()
        .downcast_ref::<BooleanArray>()
        .unwrap();
    assert!(!chunk.value(0));
    assert!(chunk.value(1));
    assert!(chunk.value(2));
}

#[test]
fn inferring_builder_all_nulls_stays_null() {
    let group = TaskGroup::serial();
    let builder = ColumnBuilder::inferring(0, ConvertOptions::default(), group.clone()).unwrap();

    builder.insert(0, parse_rows(&["", "NULL"], 4));
    group.finish().unwrap();

    let column = builder.finish().unwrap();
    assert_eq!(column.data_type(), &DataType::Null);
    assert_eq!(column.len(), 2);
}

#[test]
fn inferring_builder_falls_back_to_binary_for_invalid_utf8() {
    let group = TaskGroup::serial();
    let builder = ColumnBuilder::inferring(0, ConvertOptions::default(), group.clone()).unwrap();

    let parser = BlockParser::new(ParseOptions::new(vec![2]));
    let (parsed, _) = parser.parse(Bytes::from_static(b"\xFF\xFE\n"));
    builder.insert(0, Arc::new(parsed));
    group.finish().unwrap();

    let column = builder.finish().unwrap();
    assert_eq!(column.data_type(), &DataType::Binary);
}

#[test]
fn inferring_builder_is_deterministic_under_threads() {
    for _ in 0..8 {
        let group = threaded_group();
        let builder =
            ColumnBuilder::inferring(0, ConvertOptions::default(), group.clone()).unwrap();

        builder.insert(0, parse_rows(&["1", "2"], 19));
        builder.insert(1, parse_rows(&["2020-01-01"], 19));
        builder.insert(2, parse_rows(&["3.14"], 19));
        builder.insert(3, parse_rows(&["hello"], 19));
        group.finish().unwrap();

        let column = builder.finish().unwrap();
        assert_eq!(column.data_type(), &DataType::Utf8);
        assert_eq!(column.len(), 5);
        let last = column.chunks()[3]
            .as_any()
            .downcast_ref::<StringArray>()
            .unwrap();
        assert_eq!(last.value(0), "hello");
    }
}

#[test]
fn finish_fails_when_a_slot_is_empty() {
    // A block inserted while the group is already latched leaves its slot
    // empty; finish must flag it instead of assembling a short column.
    let group = TaskGroup::serial();
    let builder =
        ColumnBuilder::typed(&DataType::Int64, 0, &ConvertOptions::default(), group.clone())
            .unwrap();

    builder.insert(0, parse_rows(&["bad"], 4));
    assert!(group.finish().is_err());
    builder.insert(1, parse_rows(&["1"], 4));

    assert!(builder.finish().is_err());
}
