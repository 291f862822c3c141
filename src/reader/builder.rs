use std::sync::Arc;

use arrow_array::{Array, ArrayRef};
use arrow_schema::{DataType, TimeUnit};
use parking_lot::Mutex;
use tracing::{debug, trace};

use crate::reader::converter::{Convert, make_converter};
use crate::reader::errors::ReadError;
use crate::reader::options::ConvertOptions;
use crate::reader::parser::ParsedBlock;
use crate::reader::table::ChunkedColumn;
use crate::reader::task_group::TaskGroup;

/// Inferred column kind, ordered by the widening lattice:
///
/// Null → Integer → Boolean → Timestamp → Real → Text → Binary
///
/// Promoting Integer to Boolean before Real lets columns holding only `0`/`1`
/// become boolean; Text precedes Binary so UTF-8-valid data that fails the
/// stricter parses ends up as strings, with raw binary as the last resort.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum InferKind {
    Null,
    Integer,
    Boolean,
    Timestamp,
    Real,
    Text,
    Binary,
}

impl InferKind {
    fn widen(self) -> Option<InferKind> {
        match self {
            InferKind::Null => Some(InferKind::Integer),
            InferKind::Integer => Some(InferKind::Boolean),
            InferKind::Boolean => Some(InferKind::Timestamp),
            InferKind::Timestamp => Some(InferKind::Real),
            InferKind::Real => Some(InferKind::Text),
            InferKind::Text => Some(InferKind::Binary),
            InferKind::Binary => None,
        }
    }

    fn can_loosen(self) -> bool {
        !matches!(self, InferKind::Binary)
    }

    pub fn data_type(self) -> DataType {
        match self {
            InferKind::Null => DataType::Null,
            InferKind::Integer => DataType::Int64,
            InferKind::Boolean => DataType::Boolean,
            InferKind::Timestamp => DataType::Timestamp(TimeUnit::Second, None),
            InferKind::Real => DataType::Float64,
            InferKind::Text => DataType::Utf8,
            InferKind::Binary => DataType::Binary,
        }
    }
}

/// Owns the typed output of one column and drives (re)conversion as parsed
/// blocks arrive.
///
/// `insert` is thread-safe; `append` must stay on the reader thread since it
/// derives the block index from the current chunk count.
#[derive(Clone)]
pub enum ColumnBuilder {
    Typed(Arc<TypedColumnBuilder>),
    Inferring(Arc<InferringColumnBuilder>),
}

impl ColumnBuilder {
    /// Builder for a column with an explicit type.
    pub fn typed(
        data_type: &DataType,
        col_index: usize,
        options: &ConvertOptions,
        task_group: TaskGroup,
    ) -> Result<Self, ReadError> {
        let converter = make_converter(data_type, options)
            .map_err(|source| ReadError::in_column(col_index, source))?;
        Ok(ColumnBuilder::Typed(Arc::new(TypedColumnBuilder {
            col_index,
            data_type: data_type.clone(),
            converter,
            task_group: Mutex::new(task_group),
            chunks: Mutex::new(Vec::new()),
        })))
    }

    /// Builder that infers the column type by widening on failed converts.
    pub fn inferring(
        col_index: usize,
        options: ConvertOptions,
        task_group: TaskGroup,
    ) -> Result<Self, ReadError> {
        let kind = InferKind::Null;
        let converter = make_converter(&kind.data_type(), &options)
            .map_err(|source| ReadError::in_column(col_index, source))?;
        Ok(ColumnBuilder::Inferring(Arc::new(InferringColumnBuilder {
            col_index,
            options,
            task_group: Mutex::new(task_group),
            state: Mutex::new(InferState {
                kind,
                can_loosen: kind.can_loosen(),
                converter,
                chunks: Vec::new(),
                parsers: Vec::new(),
            }),
        })))
    }

    /// Swaps the task group new conversions are scheduled on. Used for the
    /// serial finalization pass after the parallel body drained.
    pub fn set_task_group(&self, task_group: TaskGroup) {
        match self {
            ColumnBuilder::Typed(builder) => *builder.task_group.lock() = task_group,
            ColumnBuilder::Inferring(builder) => *builder.task_group.lock() = task_group,
        }
    }

    /// Inserts at the next block index. Reader-thread only.
    pub fn append(&self, parsed: Arc<ParsedBlock>) {
        let block_index = match self {
            ColumnBuilder::Typed(builder) => builder.chunks.lock().len(),
            ColumnBuilder::Inferring(builder) => builder.state.lock().chunks.len(),
        };
        self.insert(block_index, parsed);
    }

    /// Schedules conversion of one parsed block at the given block index.
    /// Thread-safe.
    pub fn insert(&self, block_index: usize, parsed: Arc<ParsedBlock>) {
        match self {
            ColumnBuilder::Typed(builder) => {
                TypedColumnBuilder::insert(builder, block_index, parsed)
            }
            ColumnBuilder::Inferring(builder) => {
                InferringColumnBuilder::insert(builder, block_index, parsed)
            }
        }
    }

    /// Concatenable per-block arrays, in block index order. Call only after
    /// the task group has drained.
    pub fn finish(&self) -> Result<ChunkedColumn, ReadError> {
        match self {
            ColumnBuilder::Typed(builder) => builder.finish(),
            ColumnBuilder::Inferring(builder) => builder.finish(),
        }
    }
}

pub struct TypedColumnBuilder {
    col_index: usize,
    data_type: DataType,
    converter: Arc<dyn Convert>,
    task_group: Mutex<TaskGroup>,
    chunks: Mutex<Vec<Option<ArrayRef>>>,
}

impl TypedColumnBuilder {
    fn insert(this: &Arc<Self>, block_index: usize, parsed: Arc<ParsedBlock>) {
        {
            let mut chunks = this.chunks.lock();
            if chunks.len() <= block_index {
                chunks.resize(block_index + 1, None);
            }
        }

        let task_group = this.task_group.lock().clone();
        let this = Arc::clone(this);
        task_group.append(move || {
            let array = this
                .converter
                .convert(&parsed, this.col_index)
                .map_err(|source| ReadError::in_column(this.col_index, source))?;
            let mut chunks = this.chunks.lock();
            debug_assert!(chunks[block_index].is_none(), "chunk converted twice");
            chunks[block_index] = Some(array);
            Ok(())
        });
    }

    fn finish(&self) -> Result<ChunkedColumn, ReadError> {
        let mut chunks = self.chunks.lock();
        let mut arrays = Vec::with_capacity(chunks.len());
        for chunk in chunks.drain(..) {
            match chunk {
                Some(array) => arrays.push(array),
                None => {
                    return Err(ReadError::Invalid(
                        "a chunk failed converting for an unknown reason".to_string(),
                    ));
                }
            }
        }
        Ok(ChunkedColumn::new(self.data_type.clone(), arrays))
    }
}

struct InferState {
    kind: InferKind,
    can_loosen: bool,
    converter: Arc<dyn Convert>,
    chunks: Vec<Option<ArrayRef>>,
    // Retained source blocks for potential reconversion; dropped per chunk
    // once a terminal conversion succeeds.
    parsers: Vec<Option<Arc<ParsedBlock>>>,
}

impl InferState {
    fn loosen(&mut self, col_index: usize, options: &ConvertOptions) -> Result<(), ReadError> {
        let next = self.kind.widen().ok_or_else(|| {
            ReadError::Invalid("cannot widen a terminal inferred kind".to_string())
        })?;
        debug!(
            target: "vlakdata::infer",
            col_index,
            from = ?self.kind,
            to = ?next,
            "Widening inferred column kind"
        );
        self.kind = next;
        self.can_loosen = next.can_loosen();
        self.converter = make_converter(&next.data_type(), options)
            .map_err(|source| ReadError::in_column(col_index, source))?;
        Ok(())
    }
}

pub struct InferringColumnBuilder {
    col_index: usize,
    options: ConvertOptions,
    task_group: Mutex<TaskGroup>,
    state: Mutex<InferState>,
}

impl InferringColumnBuilder {
    fn insert(this: &Arc<Self>, block_index: usize, parsed: Arc<ParsedBlock>) {
        {
            let mut state = this.state.lock();
            if state.chunks.len() <= block_index {
                state.chunks.resize(block_index + 1, None);
            }
            if state.parsers.len() <= block_index {
                state.parsers.resize(block_index + 1, None);
            }
            debug_assert!(
                state.parsers[block_index].is_none(),
                "block inserted twice"
            );
            state.parsers[block_index] = Some(parsed);
        }
        Self::schedule_convert_chunk(this, block_index);
    }

    fn schedule_convert_chunk(this: &Arc<Self>, chunk_index: usize) {
        let task_group = this.task_group.lock().clone();
        let this = Arc::clone(this);
        task_group.append(move || Self::try_convert_chunk(&this, chunk_index));
    }

    fn try_convert_chunk(this: &Arc<Self>, chunk_index: usize) -> Result<(), ReadError> {
        let (converter, parsed, kind) = {
            let state = this.state.lock();
            let parsed = match &state.parsers[chunk_index] {
                Some(parsed) => Arc::clone(parsed),
                None => {
                    return Err(ReadError::Invalid(
                        "missing retained block for reconversion".to_string(),
                    ));
                }
            };
            (Arc::clone(&state.converter), parsed, state.kind)
        };

        // Convert with the lock released so other chunks make progress.
        let result = converter.convert(&parsed, this.col_index);

        let mut state = this.state.lock();
        if state.kind != kind {
            // The kind was widened by another task mid-conversion; this
            // result is stale.
            trace!(
                target: "vlakdata::infer",
                col_index = this.col_index,
                chunk_index,
                "Rescheduling stale conversion"
            );
            drop(state);
            Self::schedule_convert_chunk(this, chunk_index);
            return Ok(());
        }

        match result {
            Ok(array) => {
                state.chunks[chunk_index] = Some(array);
                if !state.can_loosen {
                    state.parsers[chunk_index] = None;
                }
                Ok(())
            }
            Err(_) if state.can_loosen => {
                state.loosen(this.col_index, &this.options)?;

                // Every already-converted chunk used the narrower type;
                // invalidate and reconvert them all.
                let stale: Vec<usize> = state
                    .chunks
                    .iter()
                    .enumerate()
                    .filter(|(index, chunk)| *index != chunk_index && chunk.is_some())
                    .map(|(index, _)| index)
                    .collect();
                for &index in &stale {
                    state.chunks[index] = None;
                }
                drop(state);
                for index in stale {
                    Self::schedule_convert_chunk(this, index);
                }
                Self::schedule_convert_chunk(this, chunk_index);
                Ok(())
            }
            Err(source) => Err(ReadError::in_column(this.col_index, source)),
        }
    }

    fn finish(&self) -> Result<ChunkedColumn, ReadError> {
        let mut state = self.state.lock();
        let data_type = state.kind.data_type();
        let chunks = std::mem::take(&mut state.chunks);
        state.parsers.clear();

        let mut arrays = Vec::with_capacity(chunks.len());
        for chunk in chunks {
            match chunk {
                Some(array) => {
                    debug_assert_eq!(
                        array.data_type(),
                        &data_type,
                        "inference did not equalize chunk types"
                    );
                    arrays.push(array);
                }
                None => {
                    return Err(ReadError::Invalid(
                        "a chunk failed converting for an unknown reason".to_string(),
                    ));
                }
            }
        }
        Ok(ChunkedColumn::new(data_type, arrays))
    }
}
