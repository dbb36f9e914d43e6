// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2026 manbus contributors

//! Frame layout: 6-byte header, 1..=255 byte payload, CRC-8 trailer.
//!
//! ```text
//! +----------+---------+--------+-------------+--------+----------+---------+-------+
//! | preamble | version | source | destination | length | crc_flag | payload | crc8  |
//! |   0x55   |  0x01   | 1 byte |   1 byte    | 1..255 |   0x01   | L bytes | 1 byte|
//! +----------+---------+--------+-------------+--------+----------+---------+-------+
//! ```
//!
//! The preamble's alternating bits give receivers eight evenly spaced edges
//! to lock on. `crc_flag` is reserved-and-must-be-1. The CRC covers header
//! and payload, never the trailer itself.

use crate::error::{Error, Result};
use crate::wire::crc::crc8;

/// Leading byte of every frame.
pub const PREAMBLE: u8 = 0x55;

/// Supported protocol version.
pub const PROTOCOL_VERSION: u8 = 0x01;

/// Destination accepted by every station.
pub const BROADCAST_ADDR: u8 = 0x00;

/// Reserved trailer-present flag; always written and required as 1.
pub const CRC_PRESENT: u8 = 0x01;

/// Header size in bytes.
pub const HEADER_LEN: usize = 6;

/// Trailer size in bytes.
pub const TRAILER_LEN: usize = 1;

/// Largest payload a single frame can carry.
pub const MAX_PAYLOAD: usize = 255;

/// Largest frame on the wire before line coding.
pub const MAX_FRAME: usize = HEADER_LEN + MAX_PAYLOAD + TRAILER_LEN;

/// Largest frame after Manchester expansion.
pub const MAX_ENCODED: usize = 2 * MAX_FRAME;

const OFF_PREAMBLE: usize = 0;
const OFF_VERSION: usize = 1;
const OFF_SOURCE: usize = 2;
const OFF_DESTINATION: usize = 3;
const OFF_LENGTH: usize = 4;
const OFF_CRC_FLAG: usize = 5;

/// A validated view into a decoded frame buffer.
#[derive(Debug, PartialEq, Eq)]
pub struct Frame<'a> {
    pub source: u8,
    pub destination: u8,
    pub payload: &'a [u8],
}

/// Assemble a frame into `out` and return its total length.
///
/// # Panics
///
/// Panics if `payload` is empty or longer than [`MAX_PAYLOAD`], or if `out`
/// cannot hold the frame. Callers fragment payloads and size staging
/// buffers at [`MAX_FRAME`] before getting here.
pub fn build(out: &mut [u8], source: u8, destination: u8, payload: &[u8]) -> usize {
    assert!(
        !payload.is_empty() && payload.len() <= MAX_PAYLOAD,
        "payload length {} outside 1..=255",
        payload.len()
    );
    out[OFF_PREAMBLE] = PREAMBLE;
    out[OFF_VERSION] = PROTOCOL_VERSION;
    out[OFF_SOURCE] = source;
    out[OFF_DESTINATION] = destination;
    out[OFF_LENGTH] = payload.len() as u8;
    out[OFF_CRC_FLAG] = CRC_PRESENT;
    let body_len = HEADER_LEN + payload.len();
    out[HEADER_LEN..body_len].copy_from_slice(payload);
    out[body_len] = crc8(&out[..body_len]);
    body_len + TRAILER_LEN
}

/// Validate a decoded byte buffer and borrow its payload.
///
/// `bytes` must hold exactly one frame: header sanity (preamble, reserved
/// flag, size consistency) and the CRC reject with
/// [`Error::MalformedMessage`]; a version mismatch reports
/// [`Error::WrongVersion`] so mixed segments are diagnosable.
pub fn parse(bytes: &[u8]) -> Result<Frame<'_>> {
    if bytes.len() < HEADER_LEN + 1 + TRAILER_LEN {
        return Err(Error::MalformedMessage);
    }
    if bytes[OFF_PREAMBLE] != PREAMBLE {
        return Err(Error::MalformedMessage);
    }
    if bytes[OFF_VERSION] != PROTOCOL_VERSION {
        return Err(Error::WrongVersion);
    }
    let length = bytes[OFF_LENGTH] as usize;
    if length == 0 || bytes.len() != HEADER_LEN + length + TRAILER_LEN {
        return Err(Error::MalformedMessage);
    }
    if bytes[OFF_CRC_FLAG] != CRC_PRESENT {
        return Err(Error::MalformedMessage);
    }
    let body_len = HEADER_LEN + length;
    if crc8(&bytes[..body_len]) != bytes[body_len] {
        return Err(Error::MalformedMessage);
    }
    Ok(Frame {
        source: bytes[OFF_SOURCE],
        destination: bytes[OFF_DESTINATION],
        payload: &bytes[HEADER_LEN..body_len],
    })
}
