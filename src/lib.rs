pub mod logging;
pub mod reader;
pub mod shared;

pub use reader::{
    ChunkedColumn, ConvertError, ConvertOptions, ParseError, ParseOptions, ReadError, ReadOptions,
    Table, TableReader,
};

#[cfg(test)]
#[path = "../tests/helpers/mod.rs"]
pub mod test_helpers;
