use std::io::Read;
use std::sync::Arc;

use bytes::Bytes;
use tracing::{debug, info};

use crate::reader::block_source::BlockSource;
use crate::reader::bom::skip_utf8_bom;
use crate::reader::builder::ColumnBuilder;
use crate::reader::chunker::Chunker;
use crate::reader::converter::trim;
use crate::reader::errors::ReadError;
use crate::reader::options::{ConvertOptions, ParseOptions, ReadOptions};
use crate::reader::parser::BlockParser;
use crate::reader::table::Table;
use crate::reader::task_group::TaskGroup;
use crate::reader::transcoder::Transcoder;

/// Reads a fixed-width byte stream into a [`Table`].
///
/// One reader performs one read: the source stream, options and block state
/// live for exactly that long.
pub struct TableReader<R> {
    source: BlockSource<R>,
    transcoder: Option<Transcoder>,
    read_options: ReadOptions,
    parse_options: ParseOptions,
    convert_options: ConvertOptions,

    // Unconsumed payload of the current block.
    cur: Bytes,
    // Index of the next chunk inside the data stream.
    block_index: usize,
    // Whether the previous raw payload ended in CR (a CRLF separator may
    // span two blocks).
    trailing_cr: bool,
    eof: bool,

    column_names: Vec<String>,
    builders: Vec<ColumnBuilder>,
    task_group: TaskGroup,
}

impl<R: Read> TableReader<R> {
    pub fn new(
        input: R,
        read_options: ReadOptions,
        parse_options: ParseOptions,
        convert_options: ConvertOptions,
    ) -> Result<Self, ReadError> {
        if parse_options.field_widths.is_empty() {
            return Err(ReadError::Invalid(
                "field_widths must have at least one entry".to_string(),
            ));
        }
        if parse_options.field_widths.contains(&0) {
            return Err(ReadError::Invalid(
                "field widths must be positive".to_string(),
            ));
        }

        let transcoder = if read_options.encoding.is_empty() {
            None
        } else {
            Some(Transcoder::open(
                &read_options.encoding,
                read_options.buffer_safety_factor,
            )?)
        };

        Ok(Self {
            source: BlockSource::new(input, read_options.block_size),
            transcoder,
            read_options,
            parse_options,
            convert_options,
            cur: Bytes::new(),
            block_index: 0,
            trailing_cr: false,
            eof: false,
            column_names: Vec::new(),
            builders: Vec::new(),
            task_group: TaskGroup::serial(),
        })
    }

    /// Reads the whole stream and assembles the result table.
    pub fn read(mut self) -> Result<Table, ReadError> {
        if self.read_options.use_threads {
            let pool = rayon::ThreadPoolBuilder::new()
                .build()
                .map_err(|e| ReadError::Invalid(format!("could not build worker pool: {e}")))?;
            self.task_group = TaskGroup::threaded(Arc::new(pool));
            self.read_parallel()
        } else {
            self.task_group = TaskGroup::serial();
            self.read_serial()
        }
    }

    fn read_serial(mut self) -> Result<Table, ReadError> {
        self.read_first_block()?;
        self.process_header()?;

        let parser = BlockParser::new(self.parse_options.clone());
        while !self.eof {
            let (parsed, consumed) = parser.parse(self.cur.clone());
            if parsed.num_rows() > 0 {
                let parsed = Arc::new(parsed);
                for builder in &self.builders {
                    builder.insert(self.block_index, Arc::clone(&parsed));
                }
                self.block_index += 1;
                self.cur = self.cur.slice(consumed..);
                if !self.task_group.ok() {
                    break;
                }
            } else {
                self.read_next_block()?;
            }
        }

        if self.eof && !self.cur.is_empty() && self.task_group.ok() {
            let (parsed, _) = parser.parse_final(self.cur.clone())?;
            if parsed.num_rows() > 0 {
                let parsed = Arc::new(parsed);
                for builder in &self.builders {
                    builder.insert(self.block_index, Arc::clone(&parsed));
                }
                self.block_index += 1;
            }
        }

        self.task_group.finish()?;
        self.make_table()
    }

    fn read_parallel(mut self) -> Result<Table, ReadError> {
        self.read_first_block()?;
        self.process_header()?;

        let chunker = Chunker::new(self.parse_options.clone());
        while !self.eof && self.task_group.ok() {
            let chunk_size = chunker.process(&self.cur);
            if chunk_size > 0 {
                let chunk = self.cur.slice(..chunk_size);
                let block_index = self.block_index;
                let parse_options = self.parse_options.clone();
                let builders = self.builders.clone();
                debug!(
                    target: "vlakdata::read",
                    block_index,
                    chunk_size,
                    "Dispatching chunk"
                );
                self.task_group.append(move || {
                    let parser = BlockParser::new(parse_options);
                    let (parsed, consumed) = parser.parse(chunk.clone());
                    if consumed != chunk.len() {
                        return Err(ReadError::Invalid(format!(
                            "chunker and parser disagree on block size: {} vs {}",
                            chunk.len(),
                            consumed
                        )));
                    }
                    let parsed = Arc::new(parsed);
                    for builder in &builders {
                        builder.insert(block_index, Arc::clone(&parsed));
                    }
                    Ok(())
                });
                self.block_index += 1;
                self.cur = self.cur.slice(chunk_size..);
            } else {
                self.read_next_block()?;
            }
        }

        self.task_group.finish()?;

        if self.eof && !self.cur.is_empty() {
            // Serial finalization: inferring-builder reconversion may span
            // several reschedules that must all complete before assembly.
            let serial = TaskGroup::serial();
            for builder in &self.builders {
                builder.set_task_group(serial.clone());
            }
            let parser = BlockParser::new(self.parse_options.clone());
            let (parsed, _) = parser.parse_final(self.cur.clone())?;
            if parsed.num_rows() > 0 {
                let parsed = Arc::new(parsed);
                for builder in &self.builders {
                    builder.insert(self.block_index, Arc::clone(&parsed));
                }
                self.block_index += 1;
            }
            serial.finish()?;
        }

        self.make_table()
    }

    fn read_first_block(&mut self) -> Result<(), ReadError> {
        self.read_next_block()?;
        if self.eof && self.cur.is_empty() {
            return Err(ReadError::Invalid("empty fixed-width input".to_string()));
        }
        let skip = skip_utf8_bom(&self.cur)?;
        if skip > 0 {
            self.cur = self.cur.slice(skip..);
        }
        Ok(())
    }

    /// Reads the next block, transcodes it, and stitches it to unconsumed
    /// trailing data.
    fn read_next_block(&mut self) -> Result<(), ReadError> {
        let tail = self.cur.clone();

        if !tail.is_empty() && self.source.left_padding() < tail.len() {
            // Growth heuristic so subsequent reads keep fitting the tail in
            // their padding area.
            self.source.set_left_padding(tail.len() * 3 / 2);
        }

        let Some(block) = self.source.read()? else {
            if let Some(mut transcoder) = self.transcoder.take() {
                let rest = transcoder.finish()?;
                if !rest.is_empty() {
                    let mut joined = Vec::with_capacity(tail.len() + rest.len());
                    joined.extend_from_slice(&tail);
                    joined.extend_from_slice(&rest);
                    self.cur = Bytes::from(joined);
                }
            }
            self.eof = true;
            return Ok(());
        };

        match &mut self.transcoder {
            Some(transcoder) => {
                let mut payload = transcoder.transcode(block.payload(), false)?;
                self.drop_continuation_lf_vec(&mut payload);
                // Transcoded output lives in a fresh buffer; concatenate.
                let mut joined = Vec::with_capacity(tail.len() + payload.len());
                joined.extend_from_slice(&tail);
                joined.extend_from_slice(&payload);
                self.cur = Bytes::from(joined);
            }
            None => {
                let mut block = block;
                let mut payload_start = block.left_padding;
                let mut payload_len = block.payload_len;

                if self.trailing_cr && block.buf[payload_start] == b'\n' {
                    // Skip the LF of a CRLF separator that started at the
                    // end of the previous block.
                    payload_start += 1;
                    payload_len -= 1;
                }
                self.trailing_cr = payload_len > 0
                    && block.buf[payload_start + payload_len - 1] == b'\r';

                if payload_len == 0 {
                    // The whole payload was a continuation LF.
                    self.cur = tail;
                } else if tail.is_empty() {
                    let frozen = Bytes::from(block.buf);
                    self.cur = frozen.slice(payload_start..payload_start + payload_len);
                } else if tail.len() <= payload_start {
                    // The tail fits inside the left padding: slide the
                    // payload start left and copy it in, no allocation.
                    let start = payload_start - tail.len();
                    block.buf[start..payload_start].copy_from_slice(&tail);
                    let frozen = Bytes::from(block.buf);
                    self.cur = frozen.slice(start..payload_start + payload_len);
                } else {
                    let mut joined =
                        Vec::with_capacity(tail.len() + payload_len + block.right_padding);
                    joined.extend_from_slice(&tail);
                    joined.extend_from_slice(
                        &block.buf[payload_start..payload_start + payload_len],
                    );
                    joined.resize(tail.len() + payload_len + block.right_padding, 0);
                    let frozen = Bytes::from(joined);
                    self.cur = frozen.slice(..tail.len() + payload_len);
                }
            }
        }
        Ok(())
    }

    /// CRLF across blocks for the transcoded path.
    fn drop_continuation_lf_vec(&mut self, payload: &mut Vec<u8>) {
        if self.trailing_cr && payload.first() == Some(&b'\n') {
            payload.remove(0);
            self.trailing_cr = false;
        }
        // An empty decode (pending multi-byte state) leaves the flag as-is.
        if !payload.is_empty() {
            self.trailing_cr = payload.last() == Some(&b'\r');
        }
    }

    /// Skips raw rows, reads column names (or adopts the configured ones)
    /// and constructs one builder per column.
    fn process_header(&mut self) -> Result<(), ReadError> {
        if self.read_options.skip_rows > 0 {
            self.skip_raw_rows(self.read_options.skip_rows)?;
        }

        if self.read_options.column_names.is_empty() {
            self.read_column_names()?;
        } else {
            if self.read_options.column_names.len() != self.parse_options.field_widths.len() {
                return Err(ReadError::Invalid(format!(
                    "got {} column names for {} field widths",
                    self.read_options.column_names.len(),
                    self.parse_options.field_widths.len()
                )));
            }
            self.column_names = self.read_options.column_names.clone();
        }

        info!(
            target: "vlakdata::read",
            columns = self.column_names.len(),
            "Resolved header"
        );

        for (col_index, name) in self.column_names.iter().enumerate() {
            let builder = match self.convert_options.column_types.get(name) {
                Some(data_type) => ColumnBuilder::typed(
                    data_type,
                    col_index,
                    &self.convert_options,
                    self.task_group.clone(),
                )?,
                None => ColumnBuilder::inferring(
                    col_index,
                    self.convert_options.clone(),
                    self.task_group.clone(),
                )?,
            };
            self.builders.push(builder);
        }
        Ok(())
    }

    fn skip_raw_rows(&mut self, rows: usize) -> Result<(), ReadError> {
        let mut remaining = rows;
        while remaining > 0 {
            match self.cur.iter().position(|&b| b == b'\n' || b == b'\r') {
                Some(pos) => {
                    let mut end = pos + 1;
                    if self.cur[pos] == b'\r' && self.cur.get(end) == Some(&b'\n') {
                        end += 1;
                    }
                    self.cur = self.cur.slice(end..);
                    remaining -= 1;
                }
                None => {
                    if self.eof {
                        return Err(ReadError::Invalid(format!(
                            "could not skip initial {rows} rows: input ended after {} rows",
                            rows - remaining
                        )));
                    }
                    self.read_next_block()?;
                }
            }
        }
        Ok(())
    }

    /// Parses exactly one row and adopts its trimmed fields as column names.
    fn read_column_names(&mut self) -> Result<(), ReadError> {
        let parser = BlockParser::with_max_rows(self.parse_options.clone(), 1);
        loop {
            let (parsed, consumed) = if self.eof {
                parser.parse_final(self.cur.clone())?
            } else {
                parser.parse(self.cur.clone())
            };
            if parsed.num_rows() == 1 {
                let mut names = Vec::with_capacity(parsed.num_cols());
                parsed.visit_last_row::<ReadError>(|field| {
                    names.push(String::from_utf8_lossy(trim(field)).into_owned());
                    Ok(())
                })?;
                self.column_names = names;
                self.cur = self.cur.slice(consumed..);
                return Ok(());
            }
            if self.eof {
                return Err(ReadError::Invalid(
                    "could not read column names: input is too short".to_string(),
                ));
            }
            self.read_next_block()?;
        }
    }

    fn make_table(&mut self) -> Result<Table, ReadError> {
        let mut columns = Vec::with_capacity(self.builders.len());
        for builder in &self.builders {
            columns.push(builder.finish()?);
        }
        let table = Table::new(std::mem::take(&mut self.column_names), columns);
        info!(
            target: "vlakdata::read",
            rows = table.num_rows(),
            columns = table.num_columns(),
            blocks = self.block_index,
            "Assembled table"
        );
        Ok(table)
    }
}
