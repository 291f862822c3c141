use crate::reader::options::ParseOptions;

/// Finds the largest payload prefix that ends on a row boundary, without
/// materializing field positions.
///
/// Must agree with [`BlockParser::parse`](crate::reader::parser::BlockParser)
/// on the consumed size for every payload; the table reader treats any
/// disagreement as a hard error.
pub struct Chunker {
    options: ParseOptions,
}

impl Chunker {
    pub fn new(options: ParseOptions) -> Self {
        Self { options }
    }

    pub fn process(&self, payload: &[u8]) -> usize {
        if !self.options.newlines_in_values {
            // Newlines always terminate rows in this mode, so the last CR or
            // LF bounds the last complete row. For common block and row
            // sizes this touches only the tail of the payload.
            return match payload.iter().rposition(|&b| b == b'\n' || b == b'\r') {
                Some(pos) => pos + 1,
                None => 0,
            };
        }

        // Width-budget walk, mirroring the parser's row machine with field
        // positions discarded. A row ends exactly at its byte budget; CR and
        // LF are data like any other byte.
        let budget = self.options.row_budget();
        let len = payload.len();
        let mut pos = 0;
        while pos + budget <= len {
            pos += budget;
        }
        pos
    }
}
