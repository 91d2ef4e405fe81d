//! Self-describing dataset header.
//!
//! A dataset file is laid out as
//!
//! ```text
//! [UTF-8 JSON header][0x00][binary payload]
//! ```
//!
//! The header content is opaque to this crate; only the framing matters.

use std::io::{self, Read, Write};

use serde_json::Value;

use crate::error::{DatasetError, Result};

/// Byte separating the header text from the payload.
pub const TERMINATOR: u8 = 0;

/// Default read size while searching for the terminator.
pub const DEFAULT_CHUNK_SIZE: usize = 4096;

/// Read the header from the start of `reader`.
///
/// Reads in chunks of `chunk_size` bytes until the terminator is found, so
/// headers of any length are supported. Returns the parsed header and the
/// offset of the first payload byte, counted from where `reader` started.
pub fn read_header<R: Read>(reader: &mut R, chunk_size: usize) -> Result<(Value, u64)> {
    let mut chunk = vec![0u8; chunk_size.max(1)];
    let mut header_bytes = Vec::new();
    let mut consumed: u64 = 0;

    let payload_offset = loop {
        let n = match reader.read(&mut chunk) {
            Ok(0) => return Err(DatasetError::format("no NUL terminator found in file")),
            Ok(n) => n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e.into()),
        };

        let read = &chunk[..n];
        if let Some(pos) = read.iter().position(|&b| b == TERMINATOR) {
            header_bytes.extend_from_slice(&read[..pos]);
            break consumed + pos as u64 + 1;
        }

        header_bytes.extend_from_slice(read);
        consumed += n as u64;
    };

    let text = std::str::from_utf8(&header_bytes)
        .map_err(|e| DatasetError::format(format!("invalid UTF-8 in JSON header: {}", e)))?;
    let header = serde_json::from_str(text)?;

    Ok((header, payload_offset))
}

/// Serialize `header` followed by the terminator.
pub fn encode_header(header: &Value) -> Result<Vec<u8>> {
    let mut bytes = serde_json::to_vec(header)?;
    // serde_json escapes NUL inside strings, so the text never contains one.
    bytes.push(TERMINATOR);
    Ok(bytes)
}

/// Write the framed header to `writer`, returning the payload offset.
pub fn write_header<W: Write>(writer: &mut W, header: &Value) -> Result<u64> {
    let bytes = encode_header(header)?;
    writer.write_all(&bytes)?;
    Ok(bytes.len() as u64)
}
