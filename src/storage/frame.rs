//! Page frame format
//!
//! Every page is appended to the page file inside a frame:
//!
//! ```text
//! +------------------+
//! | Frame Length     | (u32 LE, includes this field and the checksum)
//! +------------------+
//! | Page Tag         | (u8)
//! +------------------+
//! | Page Payload     | (kind-specific)
//! +------------------+
//! | Checksum         | (u32 LE)
//! +------------------+
//! ```
//!
//! Checksum covers all bytes except the checksum itself. The page bytes
//! (tag + payload) are opaque at this layer.

use std::io;

use super::checksum::compute_checksum;

/// Length prefix + at least the tag byte + checksum
pub const MIN_FRAME_SIZE: usize = 4 + 1 + 4;

/// Wraps serialized page bytes in a checksummed frame.
pub fn encode_frame(page_bytes: &[u8]) -> Vec<u8> {
    let frame_length = (4 + page_bytes.len() + 4) as u32;

    let mut frame = Vec::with_capacity(frame_length as usize);
    frame.extend_from_slice(&frame_length.to_le_bytes());
    frame.extend_from_slice(page_bytes);

    let checksum = compute_checksum(&frame);
    frame.extend_from_slice(&checksum.to_le_bytes());

    frame
}

/// Reads the frame length prefix.
pub fn frame_length(prefix: [u8; 4]) -> usize {
    u32::from_le_bytes(prefix) as usize
}

/// Validates a complete frame and returns the page bytes it carries.
///
/// `data` must start at a frame boundary; trailing bytes are ignored.
pub fn decode_frame(data: &[u8]) -> io::Result<&[u8]> {
    if data.len() < MIN_FRAME_SIZE {
        return Err(io::Error::new(io::ErrorKind::UnexpectedEof, "Frame too short"));
    }

    let length = frame_length([data[0], data[1], data[2], data[3]]);

    if length < MIN_FRAME_SIZE {
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            format!("Invalid frame length: {}", length),
        ));
    }

    if data.len() < length {
        return Err(io::Error::new(
            io::ErrorKind::UnexpectedEof,
            format!("Frame truncated: expected {} bytes, got {}", length, data.len()),
        ));
    }

    let checksum_offset = length - 4;
    let stored = u32::from_le_bytes([
        data[checksum_offset],
        data[checksum_offset + 1],
        data[checksum_offset + 2],
        data[checksum_offset + 3],
    ]);
    let computed = compute_checksum(&data[..checksum_offset]);

    if computed != stored {
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            format!(
                "Checksum mismatch: computed {:08x}, stored {:08x}",
                computed, stored
            ),
        ));
    }

    Ok(&data[4..checksum_offset])
}
