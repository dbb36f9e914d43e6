// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2026 manbus contributors

//! Link layer: queues, line state machine, TX/RX engines, station API.
//!
//! One [`Link`] owns everything a station shares between its foreground and
//! its interrupt handlers (both rings, the line state, the bit cursors and
//! the local address) inside a single aggregate behind a
//! `parking_lot::Mutex`. Foreground calls (`send`, `recv`, the address
//! accessors) and the four interrupt entry points all take that lock, which
//! is the host-side rendition of the original critical-section discipline:
//! whoever is mutating the shared indices holds the line against everyone
//! else.
//!
//! The host wires its event sources to the entry points:
//!
//! | Event source                     | Entry point            |
//! |----------------------------------|------------------------|
//! | Line edge interrupt (both edges) | [`Link::on_line_edge`] |
//! | Half-bit timer tick              | [`Link::on_half_bit`]  |
//! | Monitor timer elapsed            | [`Link::on_monitor_elapsed`] |
//! | Monitor capture-compare (≈7/8)   | [`Link::on_monitor_capture`] |
//!
//! Entry points never propagate errors; they report non-fatal and return.

mod rx_queue;
mod state;
mod tx_queue;

pub use state::LineState;

use std::sync::Arc;

use parking_lot::Mutex;

use crate::config::LinkConfig;
use crate::error::{report_non_fatal, Error, Result};
use crate::hal::{HalfBitTimer, Indicators, LineIo, MonitorTimer};
use crate::wire::frame::{
    self, BROADCAST_ADDR, HEADER_LEN, MAX_ENCODED, MAX_FRAME, MAX_PAYLOAD, TRAILER_LEN,
};
use crate::wire::manchester;

use rx_queue::RxQueue;
use tx_queue::TxQueue;

/// A frame delivered to this station.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Received {
    pub source: u8,
    pub destination: u8,
    pub payload: Vec<u8>,
}

/// Handle to one bus station.
///
/// Cheap to clone; all clones share the same station. Built with
/// [`Link::builder`].
#[derive(Clone)]
pub struct Link {
    core: Arc<Mutex<LinkCore>>,
}

/// Assembles a [`Link`] from its HAL pieces.
pub struct LinkBuilder {
    line: Option<Box<dyn LineIo>>,
    half_bit: Option<Box<dyn HalfBitTimer>>,
    monitor: Option<Box<dyn MonitorTimer>>,
    indicators: Option<Box<dyn Indicators>>,
    config: LinkConfig,
    seed: Option<u64>,
}

impl LinkBuilder {
    /// The bus line driver.
    pub fn line(mut self, io: impl LineIo + 'static) -> Self {
        self.line = Some(Box::new(io));
        self
    }

    /// The periodic half-bit transmit timer.
    pub fn half_bit_timer(mut self, timer: impl HalfBitTimer + 'static) -> Self {
        self.half_bit = Some(Box::new(timer));
        self
    }

    /// The one-shot idle/activity and backoff timer.
    pub fn monitor_timer(mut self, timer: impl MonitorTimer + 'static) -> Self {
        self.monitor = Some(Box::new(timer));
        self
    }

    /// The state indicator LEDs.
    pub fn indicators(mut self, leds: impl Indicators + 'static) -> Self {
        self.indicators = Some(Box::new(leds));
        self
    }

    /// Replace the whole timing configuration.
    pub fn config(mut self, config: LinkConfig) -> Self {
        self.config = config;
        self
    }

    /// Boot address for this station (overrides the config default).
    pub fn local_address(mut self, address: u8) -> Self {
        self.config.local_address = address;
        self
    }

    /// Seed the backoff generator, for reproducible runs.
    pub fn rng_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Initialize the station: program the timers, release the line, light
    /// the idle indicator, preload the receive slot.
    ///
    /// # Errors
    ///
    /// `NetworkNotInit` when a HAL piece is missing; timer errors propagate
    /// from the HAL. Failures here are fatal by policy: report and halt.
    pub fn build(self) -> Result<Link> {
        let line = self.line.ok_or(Error::NetworkNotInit)?;
        let half_bit = self.half_bit.ok_or(Error::NetworkNotInit)?;
        let monitor = self.monitor.ok_or(Error::NetworkNotInit)?;
        let indicators = self.indicators.ok_or(Error::NetworkNotInit)?;
        let rng = match self.seed {
            Some(seed) => fastrand::Rng::with_seed(seed),
            None => fastrand::Rng::new(),
        };
        let mut core = LinkCore {
            line,
            half_bit,
            monitor,
            indicators,
            config: self.config,
            rng,
            state: LineState::Idle,
            tx: TxQueue::new(),
            rx: RxQueue::new(),
            tx_byte: 0,
            tx_bit: 0,
            local_address: self.config.local_address,
        };
        core.half_bit.set_period_us(core.config.half_bit_us)?;
        core.monitor.set_period_us(core.config.timeout_us)?;
        core.line.set_high();
        core.set_state(LineState::Idle);
        Ok(Link {
            core: Arc::new(Mutex::new(core)),
        })
    }
}

impl Link {
    /// Start assembling a station.
    pub fn builder() -> LinkBuilder {
        LinkBuilder {
            line: None,
            half_bit: None,
            monitor: None,
            indicators: None,
            config: LinkConfig::default(),
            seed: None,
        }
    }

    /// Queue `payload` for `destination` (0x00 broadcasts).
    ///
    /// Payloads longer than one frame fragment into frames of up to 255
    /// bytes. Never blocks: when the TX ring fills mid-way the already
    /// queued frames stay queued and `TxQueueFull` comes back.
    pub fn send(&self, destination: u8, payload: &[u8]) -> Result<()> {
        if payload.is_empty() {
            return Err(Error::InvalidUserInput);
        }
        let mut core = self.core.lock();
        let mut staged = [0u8; MAX_FRAME];
        let mut symbols = [0u8; MAX_ENCODED];
        let mut outcome = Ok(());
        for chunk in payload.chunks(MAX_PAYLOAD) {
            let len = frame::build(&mut staged, core.local_address, destination, chunk);
            manchester::encode(&staged[..len], &mut symbols);
            if let Err(e) = core.tx.push(&symbols[..2 * len]) {
                outcome = Err(e);
                break;
            }
        }
        core.try_start_tx()?;
        outcome
    }

    /// Pop the next frame addressed to this station (or broadcast).
    ///
    /// Scans the RX ring: frames failing the header sanity checks or the
    /// CRC are reported non-fatal and dropped; frames for other stations
    /// are dropped silently. Never blocks: `None` means nothing valid is
    /// waiting right now.
    pub fn recv(&self) -> Option<Received> {
        let mut core = self.core.lock();
        let mut raw = [0u8; MAX_ENCODED];
        loop {
            let bits = match core.rx.pop(&mut raw) {
                Ok(bits) => bits,
                Err(_) => return None,
            };
            match decode_frame(&raw, bits) {
                Ok(frame)
                    if frame.destination == BROADCAST_ADDR
                        || frame.destination == core.local_address =>
                {
                    return Some(frame);
                }
                Ok(_) => {}
                Err(e) => report_non_fatal("recv", e),
            }
        }
    }

    /// Change this station's address.
    pub fn set_local_address(&self, address: u8) {
        self.core.lock().local_address = address;
    }

    /// This station's current address.
    pub fn local_address(&self) -> u8 {
        self.core.lock().local_address
    }

    /// Current line state.
    pub fn state(&self) -> LineState {
        self.core.lock().state
    }

    /// Frames waiting in the TX ring.
    pub fn pending_tx(&self) -> usize {
        self.core.lock().tx.len()
    }

    /// Completed-but-unread symbol buffers waiting in the RX ring.
    pub fn pending_rx(&self) -> usize {
        self.core.lock().rx.len()
    }

    /// Kick the transmitter: if frames are queued and the line is idle,
    /// restart the half-bit tick from zero.
    pub fn try_start_tx(&self) -> Result<()> {
        self.core.lock().try_start_tx()
    }

    /// Entry point for the line edge interrupt (both edge polarities).
    pub fn on_line_edge(&self) {
        if let Err(e) = self.core.lock().edge() {
            report_non_fatal("line edge", e);
        }
    }

    /// Entry point for the half-bit timer tick.
    pub fn on_half_bit(&self) {
        if let Err(e) = self.core.lock().tick() {
            report_non_fatal("half-bit tick", e);
        }
    }

    /// Entry point for the monitor timer's elapsed interrupt.
    pub fn on_monitor_elapsed(&self) {
        if let Err(e) = self.core.lock().monitor_elapsed() {
            report_non_fatal("monitor timeout", e);
        }
    }

    /// Entry point for the monitor timer's capture-compare interrupt.
    pub fn on_monitor_capture(&self) {
        if let Err(e) = self.core.lock().capture() {
            report_non_fatal("monitor capture", e);
        }
    }
}

struct LinkCore {
    line: Box<dyn LineIo>,
    half_bit: Box<dyn HalfBitTimer>,
    monitor: Box<dyn MonitorTimer>,
    indicators: Box<dyn Indicators>,
    config: LinkConfig,
    rng: fastrand::Rng,
    state: LineState,
    tx: TxQueue,
    rx: RxQueue,
    tx_byte: usize,
    tx_bit: u8,
    local_address: u8,
}

impl LinkCore {
    fn set_state(&mut self, next: LineState) {
        if self.state != next {
            log::debug!("line state {} -> {}", self.state, next);
        }
        self.state = next;
        self.indicators.clear();
        self.indicators.set(next.indicator(), true);
    }

    fn try_start_tx(&mut self) -> Result<()> {
        if self.state == LineState::Idle && !self.tx.is_empty() {
            self.half_bit.reset()?;
            self.half_bit.start()?;
        }
        Ok(())
    }

    /// Line edge: keep the activity window open, sample one bit, and mark
    /// the channel busy on a falling edge.
    fn edge(&mut self) -> Result<()> {
        let high = self.line.is_high();
        if !self.monitor.is_running() {
            self.monitor.set_period_us(self.config.timeout_us)?;
            self.monitor.start()?;
        }
        self.monitor.reset()?;
        if !high && self.state != LineState::Busy {
            if self.state == LineState::Collision {
                // traffic preempts the pending backoff: watch it instead,
                // and capture it from a clean slot (the release edge after
                // the abort leaves stray samples behind)
                self.monitor.set_period_us(self.config.timeout_us)?;
                self.rx.discard();
            }
            self.set_state(LineState::Busy);
        }
        self.rx.push_bit(high)?;
        Ok(())
    }

    /// Half-bit tick: emit the next symbol of the head frame.
    fn tick(&mut self) -> Result<()> {
        if self.state == LineState::Collision {
            // abort in flight; the backoff will retry this frame from (0,0)
            self.half_bit.stop()?;
            self.tx_byte = 0;
            self.tx_bit = 0;
            self.line.set_high();
            return Ok(());
        }
        let Some(head) = self.tx.head() else {
            self.half_bit.stop()?;
            return Ok(());
        };
        if self.tx_byte >= head.len() {
            // frame complete: release the line, reclaim the slot; the next
            // Idle transition restarts us if more frames are queued
            self.half_bit.stop()?;
            self.line.set_high();
            self.tx_byte = 0;
            self.tx_bit = 0;
            self.tx.pop()?;
            return Ok(());
        }
        let bit = (head[self.tx_byte] >> (7 - self.tx_bit)) & 1;
        if bit == 1 {
            self.line.set_high();
        } else {
            self.line.set_low();
        }
        self.tx_bit += 1;
        if self.tx_bit == 8 {
            self.tx_bit = 0;
            self.tx_byte += 1;
        }
        Ok(())
    }

    /// Monitor elapsed: quiet line. High means the traffic ended cleanly,
    /// low means somebody is still holding the line, a collision. While in
    /// Collision the same timer carries the backoff instead.
    fn monitor_elapsed(&mut self) -> Result<()> {
        if self.state == LineState::Collision {
            if self.line.is_high() {
                self.monitor.stop()?;
                // anything sampled since the collision is release noise
                self.rx.discard();
                self.set_state(LineState::Idle);
                self.try_start_tx()?;
            } else {
                // still jammed at expiry: redraw and keep waiting
                let period = self.draw_backoff_us();
                self.monitor.set_period_us(period)?;
                self.monitor.reset()?;
            }
            return Ok(());
        }
        self.monitor.stop()?;
        if self.line.is_high() {
            self.set_state(LineState::Idle);
            match self.rx.finalize() {
                Ok(()) => {}
                // a window with less than a header of bits is line noise,
                // not a frame; the slot was reset in place
                Err(Error::MalformedMessage) => {}
                // RX ring full: the frame is gone, but TX must not stall
                Err(e) => report_non_fatal("rx finalize", e),
            }
            self.try_start_tx()?;
        } else {
            log::warn!("collision detected, backing off");
            self.set_state(LineState::Collision);
            self.rx.discard();
            let period = self.draw_backoff_us();
            self.monitor.set_period_us(period)?;
            self.monitor.reset()?;
            self.monitor.start()?;
        }
        Ok(())
    }

    /// Capture-compare: an edge-free bit time inside the activity window.
    /// Replaying the last sample keeps one sample per bit across steady
    /// runs of identical symbols.
    fn capture(&mut self) -> Result<()> {
        if self.state != LineState::Busy {
            return Ok(());
        }
        let bit = self.rx.last_bit();
        self.rx.push_bit(bit)
    }

    fn draw_backoff_us(&mut self) -> u32 {
        let slot = self.rng.u32(0..self.config.backoff_slots);
        (self.config.backoff_floor_ms + slot * self.config.backoff_slot_ms) * 1000
    }
}

/// Decode and validate one popped symbol buffer.
///
/// Whole decodable bytes are `bits / 16`; releasing the line after a frame
/// can append one rising-edge sample (plus one capture replay), so sub-byte
/// stragglers are expected and ignored. The byte count must then match the
/// header's own accounting, and the CRC has the final word.
fn decode_frame(raw: &[u8], bits: usize) -> Result<Received> {
    let decoded_len = bits / (2 * 8);
    if decoded_len < HEADER_LEN + 1 + TRAILER_LEN {
        return Err(Error::MalformedMessage);
    }
    let mut decoded = [0u8; MAX_FRAME];
    manchester::decode(&raw[..2 * decoded_len], decoded_len, &mut decoded[..decoded_len])?;
    let frame = frame::parse(&decoded[..decoded_len])?;
    Ok(Received {
        source: frame.source,
        destination: frame.destination,
        payload: frame.payload.to_vec(),
    })
}
