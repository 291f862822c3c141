use encoding_rs::{Decoder, DecoderResult, Encoding};
use tracing::debug;

use crate::reader::errors::ReadError;

/// Stateful transcoder from a source codeset to UTF-8.
///
/// The underlying decoder carries partial-sequence state across calls, so
/// multi-byte characters split over block boundaries decode correctly. It
/// must be flushed exactly once when the stream ends.
pub struct Transcoder {
    decoder: Decoder,
    safety_factor: f64,
}

impl Transcoder {
    /// Resolves a codeset label. An ICU-style `,lfnl` suffix is tolerated
    /// and stripped; unknown labels are rejected up front.
    pub fn open(label: &str, safety_factor: f64) -> Result<Self, ReadError> {
        let name = label.split(',').next().unwrap_or(label).trim();
        let encoding = Encoding::for_label(name.as_bytes()).ok_or_else(|| {
            ReadError::Encoding(format!("unknown or unsupported codeset '{label}'"))
        })?;
        debug!(
            target: "vlakdata::read",
            codeset = encoding.name(),
            "Opened transcoder"
        );
        Ok(Self {
            // Removes the codeset's own byte order mark; never switches
            // encodings based on sniffed content.
            decoder: encoding.new_decoder_with_bom_removal(),
            safety_factor: safety_factor.max(1.0),
        })
    }

    /// Decodes one block into freshly reserved output. The reservation is
    /// `len * safety_factor`; decoded data larger than that fails rather
    /// than growing silently.
    pub fn transcode(&mut self, src: &[u8], last: bool) -> Result<Vec<u8>, ReadError> {
        let reserved = (src.len() as f64 * self.safety_factor) as usize + 16;
        let mut dst = vec![0u8; reserved];
        let (result, read, written) =
            self.decoder
                .decode_to_utf8_without_replacement(src, &mut dst, last);
        match result {
            DecoderResult::InputEmpty => {
                dst.truncate(written);
                Ok(dst)
            }
            DecoderResult::OutputFull => Err(ReadError::Encoding(format!(
                "decoded size larger than reserved buffer: {reserved} reserved vs {} encoded bytes",
                src.len()
            ))),
            DecoderResult::Malformed(_, _) => Err(ReadError::Encoding(format!(
                "malformed byte sequence near offset {read}"
            ))),
        }
    }

    /// Flushes decoder state at end of stream.
    pub fn finish(&mut self) -> Result<Vec<u8>, ReadError> {
        self.transcode(&[], true)
    }
}
