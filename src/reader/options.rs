use std::collections::HashMap;

use arrow_schema::DataType;

/// How raw bytes are split into rows and field slices.
#[derive(Debug, Clone)]
pub struct ParseOptions {
    /// Field widths in bytes, in column order. Required, at least one entry.
    pub field_widths: Vec<u32>,
    /// Whether values may contain CR/LF bytes. When false, a newline always
    /// terminates the current row; when true, only the cumulative width
    /// budget delimits rows.
    pub newlines_in_values: bool,
    /// Whether zero-byte rows are elided. When false, an empty line becomes
    /// a row of all-empty fields. Has no effect when `newlines_in_values`
    /// is set, since newlines are then ordinary data bytes.
    pub ignore_empty_lines: bool,
}

impl ParseOptions {
    pub fn new(field_widths: Vec<u32>) -> Self {
        Self {
            field_widths,
            newlines_in_values: false,
            ignore_empty_lines: true,
        }
    }

    /// Total bytes one full row occupies, excluding any separator.
    pub fn row_budget(&self) -> usize {
        self.field_widths.iter().map(|w| *w as usize).sum()
    }
}

/// How field slices are turned into typed values.
#[derive(Debug, Clone)]
pub struct ConvertOptions {
    /// Per-column-name type overrides, disabling inference on those columns.
    pub column_types: HashMap<String, DataType>,
    /// Recognized spellings for null values.
    pub null_values: Vec<String>,
    /// Recognized spellings for boolean values.
    pub true_values: Vec<String>,
    pub false_values: Vec<String>,
    /// Whether string / binary columns honor `null_values`. When false, all
    /// strings are valid string values.
    pub strings_can_be_null: bool,
    /// Whether numeric columns decode a trailing COBOL signed overpunch.
    pub is_cobol: bool,
    /// Overpunch maps: trailing byte to the digit it encodes. A hit in
    /// `neg_values` additionally marks the field negative.
    pub pos_values: HashMap<u8, u8>,
    pub neg_values: HashMap<u8, u8>,
}

impl Default for ConvertOptions {
    fn default() -> Self {
        Self {
            column_types: HashMap::new(),
            null_values: [
                "", "#N/A", "#N/A N/A", "#NA", "-1.#IND", "-1.#QNAN", "-NaN", "-nan", "1.#IND",
                "1.#QNAN", "N/A", "NA", "NULL", "NaN", "n/a", "nan", "null",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
            true_values: ["1", "True", "TRUE", "true"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            false_values: ["0", "False", "FALSE", "false"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            strings_can_be_null: false,
            is_cobol: false,
            pos_values: standard_overpunch_positive(),
            neg_values: standard_overpunch_negative(),
        }
    }
}

/// The standard positive overpunch table: '{' and 'A'..'I' encode 0..9.
fn standard_overpunch_positive() -> HashMap<u8, u8> {
    let mut map = HashMap::new();
    map.insert(b'{', b'0');
    for (i, c) in (b'A'..=b'I').enumerate() {
        map.insert(c, b'1' + i as u8);
    }
    map
}

/// The standard negative overpunch table: '}' and 'J'..'R' encode 0..9.
fn standard_overpunch_negative() -> HashMap<u8, u8> {
    let mut map = HashMap::new();
    map.insert(b'}', b'0');
    for (i, c) in (b'J'..=b'R').enumerate() {
        map.insert(c, b'1' + i as u8);
    }
    map
}

/// How the byte stream is read and decoded.
#[derive(Debug, Clone)]
pub struct ReadOptions {
    /// Source codeset name; empty means the input is already UTF-8.
    pub encoding: String,
    /// Multiplier for the reserved transcode output buffer relative to the
    /// encoded input size.
    pub buffer_safety_factor: f64,
    /// Parallel block conversion vs single-threaded inline execution.
    pub use_threads: bool,
    /// Bytes requested from the input per read.
    pub block_size: usize,
    /// Raw rows discarded before the header.
    pub skip_rows: usize,
    /// Explicit column names; when empty the first surviving row supplies
    /// them.
    pub column_names: Vec<String>,
}

impl Default for ReadOptions {
    fn default() -> Self {
        Self {
            encoding: String::new(),
            buffer_safety_factor: 1.3,
            use_threads: true,
            block_size: 1 << 20,
            skip_rows: 0,
            column_names: Vec::new(),
        }
    }
}
