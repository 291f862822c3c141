use std::io::Read;

use tracing::trace;

pub const DEFAULT_LEFT_PADDING: usize = 2048;
pub const DEFAULT_RIGHT_PADDING: usize = 16;

/// Owned byte buffer with reserved, zeroed padding on both ends.
///
/// The payload occupies `[left_padding, left_padding + payload_len)`. The
/// padding lets the consumer prepend trailing data from the previous block
/// and read one byte past the logical end without reallocating.
#[derive(Debug)]
pub struct Block {
    pub buf: Vec<u8>,
    pub left_padding: usize,
    pub payload_len: usize,
    pub right_padding: usize,
}

impl Block {
    pub fn payload(&self) -> &[u8] {
        &self.buf[self.left_padding..self.left_padding + self.payload_len]
    }
}

/// Padded block reads over an input stream.
///
/// Blocks are delivered in stream order and may be shorter than `block_size`
/// near EOF, but always carry at least one payload byte. `set_left_padding`
/// takes effect on the next read.
pub struct BlockSource<R> {
    inner: R,
    block_size: usize,
    left_padding: usize,
    right_padding: usize,
    eof: bool,
}

impl<R: Read> BlockSource<R> {
    pub fn new(inner: R, block_size: usize) -> Self {
        Self {
            inner,
            block_size: block_size.max(1),
            left_padding: DEFAULT_LEFT_PADDING,
            right_padding: DEFAULT_RIGHT_PADDING,
            eof: false,
        }
    }

    pub fn left_padding(&self) -> usize {
        self.left_padding
    }

    pub fn set_left_padding(&mut self, left_padding: usize) {
        self.left_padding = left_padding;
    }

    /// Reads the next padded block, or `None` once the stream is exhausted.
    pub fn read(&mut self) -> std::io::Result<Option<Block>> {
        if self.eof {
            return Ok(None);
        }

        let mut buf = vec![0u8; self.left_padding + self.block_size + self.right_padding];
        let mut filled = 0;
        while filled < self.block_size {
            let dst = &mut buf[self.left_padding + filled..self.left_padding + self.block_size];
            let n = self.inner.read(dst)?;
            if n == 0 {
                self.eof = true;
                break;
            }
            filled += n;
        }

        if filled == 0 {
            return Ok(None);
        }

        trace!(
            target: "vlakdata::read",
            payload_len = filled,
            left_padding = self.left_padding,
            "Read block"
        );

        Ok(Some(Block {
            buf,
            left_padding: self.left_padding,
            payload_len: filled,
            right_padding: self.right_padding,
        }))
    }
}
