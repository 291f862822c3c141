use crate::reader::errors::ReadError;

const UTF8_BOM: [u8; 3] = [0xEF, 0xBB, 0xBF];

/// Strips a leading UTF-8 byte order mark, returning how many bytes to skip.
///
/// Input shorter than the mark but matching its prefix is rejected rather
/// than silently passed through as data.
pub fn skip_utf8_bom(data: &[u8]) -> Result<usize, ReadError> {
    if data.starts_with(&UTF8_BOM) {
        return Ok(UTF8_BOM.len());
    }
    if !data.is_empty() && data.len() < UTF8_BOM.len() && UTF8_BOM.starts_with(data) {
        return Err(ReadError::Invalid(
            "input too short (truncated byte order mark?)".to_string(),
        ));
    }
    Ok(0)
}
