use std::path::{Path, PathBuf};

use thiserror::Error;

/// Inclusive byte range within a file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ByteRange {
    pub start: u64,
    pub end: u64,
}

impl ByteRange {
    /// Number of bytes covered; never zero.
    pub fn length(&self) -> u64 {
        self.end - self.start + 1
    }

    pub fn content_range(&self, size: u64) -> String {
        format!("bytes {}-{}/{}", self.start, self.end, size)
    }
}

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum RangeError {
    #[error("Malformed Range header")]
    Malformed,
    #[error("Invalid Range")]
    Unsatisfiable,
}

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum MediaError {
    #[error("Invalid dataset id")]
    InvalidId,
    #[error("Video not found")]
    NotFound,
}

/// Parse a `bytes=START-[END]` header against a file of `size` bytes.
///
/// A missing end means the last byte. Suffix ranges and multiple ranges are
/// not supported; only the first `bytes=` range is considered.
pub fn parse_range(header: &str, size: u64) -> Result<ByteRange, RangeError> {
    let set = header
        .find("bytes=")
        .map(|idx| &header[idx + "bytes=".len()..])
        .ok_or(RangeError::Malformed)?;

    let start_len = set.bytes().take_while(u8::is_ascii_digit).count();
    if start_len == 0 {
        return Err(RangeError::Malformed);
    }
    let rest = set[start_len..]
        .strip_prefix('-')
        .ok_or(RangeError::Malformed)?;
    let end_len = rest.bytes().take_while(u8::is_ascii_digit).count();

    let start: u64 = set[..start_len]
        .parse()
        .map_err(|_| RangeError::Unsatisfiable)?;
    let end: u64 = if end_len == 0 {
        size.checked_sub(1).ok_or(RangeError::Unsatisfiable)?
    } else {
        rest[..end_len]
            .parse()
            .map_err(|_| RangeError::Unsatisfiable)?
    };

    if start > end || end >= size {
        return Err(RangeError::Unsatisfiable);
    }
    Ok(ByteRange { start, end })
}

/// Dataset identifiers are non-empty strings of ASCII digits.
pub fn validate_item_id(id: &str) -> Result<&str, MediaError> {
    if !id.is_empty() && id.bytes().all(|b| b.is_ascii_digit()) {
        Ok(id)
    } else {
        Err(MediaError::InvalidId)
    }
}

/// `{root}/{id}/{id}.mp4` for a valid identifier.
pub fn video_path(root: &Path, id: &str) -> Result<PathBuf, MediaError> {
    let id = validate_item_id(id)?;
    Ok(root.join(id).join(format!("{id}.mp4")))
}
