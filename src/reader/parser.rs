use bytes::Bytes;

use crate::reader::errors::ParseError;
use crate::reader::options::ParseOptions;

/// One field slice: offset and length into the parsed block's buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct FieldEntry {
    offset: u32,
    len: u32,
}

/// Rows and field slices parsed out of one contiguous payload.
///
/// Entries are stored row-major; the backing buffer is refcounted so the
/// block outlives every conversion that still references it.
#[derive(Debug)]
pub struct ParsedBlock {
    data: Bytes,
    num_rows: usize,
    num_cols: usize,
    entries: Vec<FieldEntry>,
}

impl ParsedBlock {
    pub fn num_rows(&self) -> usize {
        self.num_rows
    }

    pub fn num_cols(&self) -> usize {
        self.num_cols
    }

    /// Total payload bytes behind this block, for builder reservations.
    pub fn num_bytes(&self) -> usize {
        self.data.len()
    }

    fn field(&self, row: usize, col: usize) -> &[u8] {
        let entry = self.entries[row * self.num_cols + col];
        &self.data[entry.offset as usize..(entry.offset + entry.len) as usize]
    }

    /// Visits every row's slice of one column, in block order.
    pub fn visit_column<E>(
        &self,
        col_index: usize,
        mut visit: impl FnMut(&[u8]) -> Result<(), E>,
    ) -> Result<(), E> {
        for row in 0..self.num_rows {
            visit(self.field(row, col_index))?;
        }
        Ok(())
    }

    /// Visits each field of the last parsed row, in column order.
    pub fn visit_last_row<E>(
        &self,
        mut visit: impl FnMut(&[u8]) -> Result<(), E>,
    ) -> Result<(), E> {
        if self.num_rows == 0 {
            return Ok(());
        }
        for col in 0..self.num_cols {
            visit(self.field(self.num_rows - 1, col))?;
        }
        Ok(())
    }
}

/// Splits payloads into rows and fixed-width field slices.
///
/// `parse` consumes the largest prefix that ends cleanly on a row boundary
/// and never fails; the trailing partial row is left for the next block.
/// `parse_final` additionally accepts a last row without a trailing newline.
pub struct BlockParser {
    options: ParseOptions,
    max_num_rows: usize,
}

impl BlockParser {
    pub fn new(options: ParseOptions) -> Self {
        Self::with_max_rows(options, usize::MAX)
    }

    pub fn with_max_rows(options: ParseOptions, max_num_rows: usize) -> Self {
        Self {
            options,
            max_num_rows,
        }
    }

    pub fn parse(&self, data: Bytes) -> (ParsedBlock, usize) {
        match self.do_parse(data, false) {
            Ok(parsed) => parsed,
            // Infallible when not final; kept as a match for the shared path.
            Err(_) => unreachable!("non-final parse cannot fail"),
        }
    }

    pub fn parse_final(&self, data: Bytes) -> Result<(ParsedBlock, usize), ParseError> {
        self.do_parse(data, true)
    }

    fn do_parse(&self, data: Bytes, is_final: bool) -> Result<(ParsedBlock, usize), ParseError> {
        let widths = &self.options.field_widths;
        let num_cols = widths.len();
        let len = data.len();
        let bytes = &data[..];

        let mut entries: Vec<FieldEntry> = Vec::new();
        let mut num_rows = 0usize;
        let mut pos = 0usize;

        // Newline-delimited mode only: the position after the last consumed
        // newline. Rows committed past it are rolled back when the payload
        // ends, since their terminator may continue in the next block.
        let mut safe_pos = 0usize;
        let mut safe_rows = 0usize;
        let mut safe_entries = 0usize;

        'rows: while pos < len && num_rows < self.max_num_rows {
            let row_start = pos;

            if !self.options.newlines_in_values {
                // Empty line: a bare newline at the current position.
                if bytes[pos] == b'\n' || bytes[pos] == b'\r' {
                    pos = consume_newline(bytes, pos);
                    if !self.options.ignore_empty_lines {
                        for _ in 0..num_cols {
                            entries.push(FieldEntry {
                                offset: row_start as u32,
                                len: 0,
                            });
                        }
                        num_rows += 1;
                    }
                    safe_pos = pos;
                    safe_rows = num_rows;
                    safe_entries = entries.len();
                    continue;
                }

                let mut newline_seen = false;
                for (col, &width) in widths.iter().enumerate() {
                    if newline_seen {
                        // Short row: remaining columns are empty slices.
                        entries.push(FieldEntry {
                            offset: pos as u32,
                            len: 0,
                        });
                        continue;
                    }
                    let field_start = pos;
                    while pos - field_start < width as usize
                        && pos < len
                        && bytes[pos] != b'\n'
                        && bytes[pos] != b'\r'
                    {
                        pos += 1;
                    }
                    entries.push(FieldEntry {
                        offset: field_start as u32,
                        len: (pos - field_start) as u32,
                    });
                    if pos < len && (bytes[pos] == b'\n' || bytes[pos] == b'\r') {
                        newline_seen = true;
                    } else if pos == len && col + 1 < num_cols {
                        // Mid-row end of payload.
                        if is_final {
                            for _ in col + 1..num_cols {
                                entries.push(FieldEntry {
                                    offset: pos as u32,
                                    len: 0,
                                });
                            }
                            num_rows += 1;
                            continue 'rows;
                        }
                        entries.truncate(safe_entries);
                        num_rows = safe_rows;
                        pos = safe_pos;
                        break 'rows;
                    }
                }

                if newline_seen || pos < len {
                    if pos < len && (bytes[pos] == b'\n' || bytes[pos] == b'\r') {
                        pos = consume_newline(bytes, pos);
                        num_rows += 1;
                        safe_pos = pos;
                        safe_rows = num_rows;
                        safe_entries = entries.len();
                    } else {
                        // Full-budget row followed directly by more data.
                        num_rows += 1;
                    }
                } else {
                    // Full-budget row ending exactly at the payload end: its
                    // separator may continue in the next block.
                    if is_final {
                        num_rows += 1;
                    } else {
                        entries.truncate(safe_entries);
                        num_rows = safe_rows;
                        pos = safe_pos;
                        break 'rows;
                    }
                }
            } else {
                // Width-budget mode: a row ends exactly at its byte budget;
                // CR and LF are data like any other byte.
                if row_start + self.options.row_budget() > len {
                    if is_final {
                        return Err(ParseError::TruncatedRow {
                            remaining: len - row_start,
                        });
                    }
                    break 'rows;
                }
                for &width in widths.iter() {
                    entries.push(FieldEntry {
                        offset: pos as u32,
                        len: width,
                    });
                    pos += width as usize;
                }
                num_rows += 1;
            }
        }

        Ok((
            ParsedBlock {
                data,
                num_rows,
                num_cols,
                entries,
            },
            pos,
        ))
    }
}

/// Consumes a CR, LF, or CRLF at `pos`, returning the following position.
fn consume_newline(bytes: &[u8], pos: usize) -> usize {
    if bytes[pos] == b'\r' {
        if pos + 1 < bytes.len() && bytes[pos + 1] == b'\n' {
            pos + 2
        } else {
            pos + 1
        }
    } else {
        pos + 1
    }
}
