use std::io::Cursor;

use arrow_array::{Array, Int64Array, StringArray};
use arrow_schema::DataType;
use vlakdata::{ConvertOptions, ParseOptions, ReadOptions, Table, TableReader};

fn read_encoded(
    data: Vec<u8>,
    widths: Vec<u32>,
    encoding: &str,
    block_size: usize,
) -> Result<Table, vlakdata::ReadError> {
    let read_options = ReadOptions {
        use_threads: false,
        encoding: encoding.to_string(),
        block_size,
        ..ReadOptions::default()
    };
    TableReader::new(
        Cursor::new(data),
        read_options,
        ParseOptions::new(widths),
        ConvertOptions::default(),
    )?
    .read()
}

fn strings(table: &Table, col: usize) -> Vec<String> {
    let mut values = Vec::new();
    for chunk in table.column(col).chunks() {
        let chunk = chunk.as_any().downcast_ref::<StringArray>().unwrap();
        for i in 0..chunk.len() {
            values.push(chunk.value(i).to_string());
        }
    }
    values
}

/// windows-1252 high bytes must become multi-byte UTF-8; widths apply to the
/// post-transcode byte counts.
#[test]
fn transcodes_single_byte_codeset_with_utf8_widths() {
    // 'é' is 0xE9 in windows-1252 and two bytes in UTF-8, so the field
    // width is measured after transcoding: "café" fills a 5-byte field.
    let mut data = Vec::new();
    data.extend_from_slice(b"word \n");
    data.extend_from_slice(b"caf\xE9\n");
    data.extend_from_slice(b"neen \n");

    let table = read_encoded(data, vec![5], "windows-1252", 1 << 20).unwrap();
    assert_eq!(table.schema().field(0).name(), "word");
    assert_eq!(strings(&table, 0), vec!["café", "neen"]);
}

#[test]
fn stateful_transcode_survives_tiny_blocks() {
    // UTF-16LE: every code unit spans two bytes, so any odd block size
    // splits characters across reads.
    let text = "nu\n12\n34\n";
    let mut data = Vec::new();
    for unit in text.encode_utf16() {
        data.extend_from_slice(&unit.to_le_bytes());
    }

    for block_size in [1, 3, 5, 64] {
        let table = read_encoded(data.clone(), vec![2], "utf-16le", block_size).unwrap();
        assert_eq!(table.schema().field(0).name(), "nu");
        assert_eq!(table.num_rows(), 2, "block_size {block_size}");
        let chunks = table.column(0).chunks();
        let first = chunks[0].as_any().downcast_ref::<Int64Array>().unwrap();
        assert_eq!(first.value(0), 12);
    }
}

#[test]
fn bom_skipped_once_on_transcoded_input() {
    // UTF-16LE input with its own byte order mark: the decoder consumes the
    // UTF-16 BOM, and the reader must not strip row bytes for it.
    let text = "\u{FEFF}ab\ncd\n";
    let mut data = Vec::new();
    for unit in text.encode_utf16() {
        data.extend_from_slice(&unit.to_le_bytes());
    }

    let table = read_encoded(data, vec![2], "utf-16le", 1 << 20).unwrap();
    assert_eq!(table.schema().field(0).name(), "ab");
    assert_eq!(strings(&table, 0), vec!["cd"]);
}

#[test]
fn crlf_separators_survive_transcoded_block_splits() {
    // With one-byte blocks every CR and LF decodes in its own call, with
    // empty decodes in between; the pair must still count as one separator.
    let mut data = Vec::new();
    for unit in "ab\r\ncd\r\nef\r\n".encode_utf16() {
        data.extend_from_slice(&unit.to_le_bytes());
    }

    for block_size in [1, 2, 3, 64] {
        let table = read_encoded(data.clone(), vec![2], "utf-16le", block_size).unwrap();
        assert_eq!(table.num_rows(), 2, "block_size {block_size}");
        assert_eq!(
            strings(&table, 0),
            vec!["cd", "ef"],
            "block_size {block_size}"
        );
    }
}

#[test]
fn malformed_input_surfaces_encoding_error() {
    // A lone trailing high surrogate cannot complete.
    let mut data = Vec::new();
    for unit in "v\n1\n".encode_utf16() {
        data.extend_from_slice(&unit.to_le_bytes());
    }
    data.extend_from_slice(&[0x00, 0xD8]);

    let err = read_encoded(data, vec![1], "utf-16le", 1 << 20).unwrap_err();
    assert!(
        err.to_string().contains("Encoding") || err.to_string().contains("malformed"),
        "got: {err}"
    );
}

#[test]
fn inference_still_runs_on_transcoded_numbers() {
    let mut data = Vec::new();
    for unit in "n  \n 12\n-34\n".encode_utf16() {
        data.extend_from_slice(&unit.to_le_bytes());
    }

    let table = read_encoded(data, vec![3], "utf-16le", 7).unwrap();
    assert_eq!(table.schema().field(0).data_type(), &DataType::Int64);
    let first = table.column(0).chunks()[0]
        .as_any()
        .downcast_ref::<Int64Array>()
        .unwrap();
    assert_eq!(first.value(0), 12);
}
