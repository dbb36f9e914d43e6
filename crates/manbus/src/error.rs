// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2026 manbus contributors

//! Error codes and reporting policy.
//!
//! The bus node distinguishes two severities: non-fatal conditions are
//! reported through [`report_non_fatal`] and execution continues (the
//! offending item is dropped); fatal conditions, meaning initialization
//! failures, propagate to the embedding `main`, which reports and halts. Interrupt
//! entry points never propagate: they log and return.
//!
//! Every variant maps to a stable one-byte code via [`Error::code`]. Code
//! `0x00` is reserved for "no error" and is represented by the absence of an
//! `Err`, not by a variant.

/// Error codes for every fallible operation in the crate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    // ========================================================================
    // General
    // ========================================================================
    /// Unclassified failure.
    Unknown,
    /// A fixed-size buffer or slot ran out of room.
    Memory,

    // ========================================================================
    // Serial console
    // ========================================================================
    /// Console serial port used before initialization.
    UartNotInit,
    /// Console serial port initialized twice.
    UartAlreadyInit,
    /// Console byte exchange timed out.
    UartTimeout,

    // ========================================================================
    // Half-bit timer
    // ========================================================================
    /// Half-bit timer used before initialization.
    HalfBitTimerNotInit,
    /// Half-bit timer initialized twice.
    HalfBitTimerAlreadyInit,
    /// Half-bit timer stopped while not running.
    HalfBitTimerNotRunning,
    /// Half-bit timer started while already running.
    HalfBitTimerAlreadyRunning,

    // ========================================================================
    // Backoff / idle-activity monitor timer
    // ========================================================================
    /// Monitor timer used before initialization.
    BackoffTimerNotInit,
    /// Monitor timer initialized twice.
    BackoffTimerAlreadyInit,
    /// Monitor timer stopped while not running.
    BackoffTimerNotRunning,
    /// Monitor timer started while already running.
    BackoffTimerAlreadyRunning,

    // ========================================================================
    // Indicators
    // ========================================================================
    /// LED driver used before initialization.
    LedsNotInit,
    /// LED driver initialized twice.
    LedsAlreadyInit,

    /// Attempt to enter a state outside {IDLE, BUSY, COLLISION}.
    SetUnknownState,

    // ========================================================================
    // Link
    // ========================================================================
    /// Link used before initialization (builder missing a HAL piece).
    NetworkNotInit,
    /// Link initialized twice.
    NetworkAlreadyInit,
    /// TX ring has no free slot; the frame was not enqueued.
    TxQueueFull,
    /// Pop attempted on an empty ring.
    PopFailure,

    // ========================================================================
    // Framing
    // ========================================================================
    /// A symbol pair decoded to `00` or `11`.
    InvalidManchester,
    /// Preamble, size consistency, reserved flag, or CRC check failed.
    MalformedMessage,
    /// Protocol version byte is not the supported version.
    WrongVersion,
    /// Console input did not parse as a command.
    InvalidUserInput,
}

impl Error {
    /// Stable one-byte code for this error (`0x00` is reserved for success).
    pub fn code(&self) -> u8 {
        match self {
            Error::Unknown => 0x01,
            Error::Memory => 0x02,
            Error::UartNotInit => 0x03,
            Error::UartAlreadyInit => 0x04,
            Error::UartTimeout => 0x05,
            Error::HalfBitTimerNotInit => 0x06,
            Error::HalfBitTimerAlreadyInit => 0x07,
            Error::HalfBitTimerNotRunning => 0x08,
            Error::HalfBitTimerAlreadyRunning => 0x09,
            Error::BackoffTimerNotInit => 0x0A,
            Error::BackoffTimerAlreadyInit => 0x0B,
            Error::BackoffTimerNotRunning => 0x0C,
            Error::BackoffTimerAlreadyRunning => 0x0D,
            Error::LedsNotInit => 0x0E,
            Error::LedsAlreadyInit => 0x0F,
            Error::SetUnknownState => 0x10,
            Error::NetworkNotInit => 0x11,
            Error::NetworkAlreadyInit => 0x12,
            Error::TxQueueFull => 0x13,
            Error::PopFailure => 0x14,
            Error::InvalidManchester => 0x15,
            Error::MalformedMessage => 0x16,
            Error::WrongVersion => 0x17,
            Error::InvalidUserInput => 0x18,
        }
    }
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::Unknown => write!(f, "unknown error"),
            Error::Memory => write!(f, "buffer exhausted"),
            Error::UartNotInit => write!(f, "console not initialized"),
            Error::UartAlreadyInit => write!(f, "console already initialized"),
            Error::UartTimeout => write!(f, "console exchange timed out"),
            Error::HalfBitTimerNotInit => write!(f, "half-bit timer not initialized"),
            Error::HalfBitTimerAlreadyInit => write!(f, "half-bit timer already initialized"),
            Error::HalfBitTimerNotRunning => write!(f, "half-bit timer not running"),
            Error::HalfBitTimerAlreadyRunning => write!(f, "half-bit timer already running"),
            Error::BackoffTimerNotInit => write!(f, "monitor timer not initialized"),
            Error::BackoffTimerAlreadyInit => write!(f, "monitor timer already initialized"),
            Error::BackoffTimerNotRunning => write!(f, "monitor timer not running"),
            Error::BackoffTimerAlreadyRunning => write!(f, "monitor timer already running"),
            Error::LedsNotInit => write!(f, "indicators not initialized"),
            Error::LedsAlreadyInit => write!(f, "indicators already initialized"),
            Error::SetUnknownState => write!(f, "attempt to set an unknown line state"),
            Error::NetworkNotInit => write!(f, "link not initialized"),
            Error::NetworkAlreadyInit => write!(f, "link already initialized"),
            Error::TxQueueFull => write!(f, "TX queue full"),
            Error::PopFailure => write!(f, "pop from empty queue"),
            Error::InvalidManchester => write!(f, "invalid Manchester symbol pair"),
            Error::MalformedMessage => write!(f, "malformed frame"),
            Error::WrongVersion => write!(f, "unsupported protocol version"),
            Error::InvalidUserInput => write!(f, "unrecognized console input"),
        }
    }
}

impl std::error::Error for Error {}

/// Convenient alias for API results using the crate `Error` type.
pub type Result<T> = core::result::Result<T, Error>;

/// Report a recoverable failure and continue.
///
/// `op` names the operation that failed (for the log line); the stable code
/// is included so consoles on different nodes agree on what happened.
pub fn report_non_fatal(op: &str, err: Error) {
    log::warn!("non-fatal: {op}: {err} (code 0x{:02X})", err.code());
}
