//! Stream framing: optional type-name header, optional length prefix
//!
//! A frame is the unit the host's streams carry:
//!
//! ```text
//! [type name: varint length + UTF-8]   if include_type_name
//! [payload length: varint]             if use_length_prefix
//! [payload bytes]
//! ```
//!
//! The type name makes a stream self-describing (the reader learns the root
//! type from the wire); the length prefix makes frames independently
//! skippable so many frames can share one stream. Without a length prefix
//! the payload is the remainder of the stream, which is only valid when the
//! frame is the stream's sole content (the snapshot case).
//!
//! A reader must be configured with the same flags as the writer that
//! produced the stream. Length-prefixed writes buffer the whole payload in
//! memory before the length is emitted, which is why length-prefix framing
//! is reserved for journal-style small entries and avoided for large
//! snapshot graphs.

use std::io::{Read, Write};

use arkiv_core::error::{FramingError, Result};

use crate::wire;

/// One frame read back from a stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// Root type name, when the stream is self-describing.
    pub type_name: Option<String>,
    /// The graph payload.
    pub payload: Vec<u8>,
}

/// Writer/reader of frames with fixed configuration flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamFramer {
    /// Prefix each frame with the root type's fully-qualified key.
    pub include_type_name: bool,
    /// Prefix the payload with its byte count.
    pub use_length_prefix: bool,
}

impl StreamFramer {
    /// Create a framer with the given flags.
    pub fn new(include_type_name: bool, use_length_prefix: bool) -> Self {
        Self {
            include_type_name,
            use_length_prefix,
        }
    }

    /// Write one frame.
    ///
    /// `type_name` is required when `include_type_name` is set and ignored
    /// otherwise.
    pub fn write(
        &self,
        stream: &mut dyn Write,
        type_name: Option<&str>,
        payload: &[u8],
    ) -> Result<()> {
        let mut header = Vec::new();
        if self.include_type_name {
            let name = type_name.ok_or_else(|| {
                FramingError::Corruption(
                    "self-describing framer was given no type name".to_string(),
                )
            })?;
            wire::put_str(&mut header, name);
        }
        if self.use_length_prefix {
            wire::put_uvarint(&mut header, payload.len() as u64);
        }
        stream.write_all(&header)?;
        stream.write_all(payload)?;
        Ok(())
    }

    /// Read one frame.
    ///
    /// Returns `Ok(None)` on a clean end-of-stream before the frame's first
    /// byte; a stream ending anywhere inside a frame is `TruncatedStream`.
    pub fn read(&self, stream: &mut dyn Read) -> Result<Option<Frame>> {
        let mut type_name = None;
        if self.include_type_name {
            let len = match wire::read_uvarint_from(stream)? {
                None => return Ok(None),
                Some(len) => to_len(len)?,
            };
            let bytes = wire::read_exact_from(stream, len)?;
            let name = String::from_utf8(bytes).map_err(|_| {
                FramingError::Corruption("frame type name is not valid UTF-8".to_string())
            })?;
            type_name = Some(name);
        }

        let payload = if self.use_length_prefix {
            let len = match wire::read_uvarint_from(stream)? {
                None if type_name.is_none() => return Ok(None),
                None => {
                    return Err(FramingError::TruncatedStream { needed: 1, have: 0 }.into());
                }
                Some(len) => to_len(len)?,
            };
            wire::read_exact_from(stream, len)?
        } else {
            let mut buf = Vec::new();
            stream.read_to_end(&mut buf)?;
            if buf.is_empty() && type_name.is_none() {
                return Ok(None);
            }
            buf
        };

        Ok(Some(Frame { type_name, payload }))
    }
}

fn to_len(len: u64) -> Result<usize> {
    usize::try_from(len)
        .map_err(|_| FramingError::Corruption(format!("frame length {len} overflows usize")).into())
}
