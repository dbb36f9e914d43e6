// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2026 manbus contributors

//! Hardware abstraction seams.
//!
//! The link core never touches a peripheral register or an interrupt vector.
//! It drives the bus through these four object-safe traits, and the host
//! wires its own event sources (a GPIO edge interrupt, two timer interrupts
//! and a capture-compare) to the matching [`Link`](crate::link::Link) entry
//! points. Tests and the bundled [`sim`](crate::sim) harness provide pure
//! software implementations and drive the entry points directly.

use crate::error::Result;

/// One of the three state indicators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Led {
    /// Lit while the line is idle.
    Green,
    /// Lit while the line is busy.
    Yellow,
    /// Lit while recovering from a collision.
    Red,
}

/// The single-bit bus line.
///
/// The line is open-drain with a pull-up: driving low always wins, a
/// released line reads high. `set_high` therefore means "release".
pub trait LineIo: Send {
    /// Release the line to the recessive high level.
    fn set_high(&mut self);
    /// Drive the line low.
    fn set_low(&mut self);
    /// Sample the current line level.
    fn is_high(&self) -> bool;
}

/// Periodic timer producing the half-bit transmit tick.
pub trait HalfBitTimer: Send {
    /// Set the tick period in microseconds.
    fn set_period_us(&mut self, us: u32) -> Result<()>;
    /// Start ticking. Starting a running timer is a no-op.
    fn start(&mut self) -> Result<()>;
    /// Stop ticking.
    fn stop(&mut self) -> Result<()>;
    /// Restart the current period from zero.
    fn reset(&mut self) -> Result<()>;
}

/// One-shot timer watching line activity, reused for the collision backoff.
///
/// Its capture-compare fires once per armed window at roughly 7/8 of the
/// period; the host routes that to
/// [`Link::on_monitor_capture`](crate::link::Link::on_monitor_capture).
pub trait MonitorTimer: Send {
    /// Set the period in microseconds. Takes effect against the current
    /// countdown origin; callers reset afterwards when they want a full
    /// window.
    fn set_period_us(&mut self, us: u32) -> Result<()>;
    /// Arm the timer. Fails with `BackoffTimerAlreadyRunning` if armed.
    fn start(&mut self) -> Result<()>;
    /// Disarm the timer. Fails with `BackoffTimerNotRunning` if idle.
    fn stop(&mut self) -> Result<()>;
    /// Restart the countdown (and the capture-compare) from zero.
    fn reset(&mut self) -> Result<()>;
    /// Whether the timer is currently armed.
    fn is_running(&self) -> bool;
}

/// State indicator LEDs.
pub trait Indicators: Send {
    /// Turn every indicator off.
    fn clear(&mut self);
    /// Turn one indicator on or off.
    fn set(&mut self, led: Led, on: bool);
}
