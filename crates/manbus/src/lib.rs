// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2026 manbus contributors

//! # manbus: single-wire broadcast bus link layer
//!
//! A half-duplex, baseband CSMA/CD link for stations sharing one open-drain
//! signal line: listen before transmitting, Manchester-code every bit so
//! steady levels are distinguishable from data, watch the line mid-flight to
//! catch collisions, and recover with randomized backoff. Frames carry a
//! fixed six-byte header, up to 255 payload bytes, and a CRC-8 trailer.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use manbus::sim::SimBus;
//!
//! fn main() -> manbus::Result<()> {
//!     // two stations on a simulated line
//!     let mut bus = SimBus::new();
//!     let alice = bus.add_node(0x52, 1)?;
//!     let bob = bus.add_node(0x08, 2)?;
//!
//!     alice.send(0x08, b"hello")?;
//!     bus.run_until_quiet(1_000_000);
//!
//!     let frame = bob.recv().expect("delivered");
//!     assert_eq!(frame.payload, b"hello");
//!     Ok(())
//! }
//! ```
//!
//! ## Architecture
//!
//! ```text
//! +--------------------------------------------------------------------+
//! |                         Station API                                |
//! |        send / recv / set_local_address / try_start_tx              |
//! +--------------------------------------------------------------------+
//! |                         Link core                                  |
//! |  TX ring -> half-bit engine | line state {IDLE,BUSY,COLLISION}     |
//! |  edge sampler -> RX ring    | idle timeout / randomized backoff    |
//! +--------------------------------------------------------------------+
//! |                         Wire format                                |
//! |    Manchester symbols (1->01, 0->10) | CRC-8 0x107 | frame layout  |
//! +--------------------------------------------------------------------+
//! |                         HAL traits                                 |
//! |    LineIo | HalfBitTimer | MonitorTimer | Indicators               |
//! +--------------------------------------------------------------------+
//! ```
//!
//! The core is interrupt-shaped: the host owns the event sources (a line
//! edge interrupt, a periodic half-bit tick, a one-shot monitor timeout
//! with a capture-compare) and wires them to the [`Link`] entry points.
//! Nothing in the crate names a vector or touches a register; the bundled
//! [`sim`] harness runs whole multi-station scenarios on virtual time.
//!
//! ## Key Types
//!
//! | Type | Description |
//! |------|-------------|
//! | [`Link`] | One station: queues, state machine, TX/RX engines |
//! | [`LinkConfig`] | Timing and backoff parameters |
//! | [`Received`] | A delivered frame: source, destination, payload |
//! | [`sim::SimBus`] | Shared-line simulator implementing the HAL |

/// Link timing and backoff configuration.
pub mod config;
/// Error codes, severities, and non-fatal reporting.
pub mod error;
/// Hardware abstraction traits (line, timers, indicators).
pub mod hal;
/// Link layer: queues, line state machine, TX/RX engines, station API.
pub mod link;
/// Shared-line simulator: the HAL over virtual time.
pub mod sim;
/// On-wire representation: Manchester symbols, CRC-8, frame layout.
pub mod wire;

pub use config::LinkConfig;
pub use error::{report_non_fatal, Error, Result};
pub use hal::{HalfBitTimer, Indicators, Led, LineIo, MonitorTimer};
pub use link::{Link, LinkBuilder, LineState, Received};
pub use wire::frame::BROADCAST_ADDR;

/// Crate version string.
pub const VERSION: &str = "0.4.1";
