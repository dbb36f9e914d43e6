// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2026 manbus contributors

//! Station-to-station delivery over the simulated line.

use manbus::sim::SimBus;
use manbus::wire::frame::{self, MAX_FRAME};
use manbus::wire::manchester;
use manbus::BROADCAST_ADDR;

#[test]
fn test_loopback_single_byte() {
    let mut bus = SimBus::new();
    let alice = bus.add_node(0x52, 1).expect("station 0x52");
    let bob = bus.add_node(0x08, 2).expect("station 0x08");

    alice.send(0x08, b"A").expect("send A");
    assert!(bus.run_until_quiet(1_000_000), "bus must go quiet");

    assert_eq!(bob.pending_rx(), 1);
    let got = bob.recv().expect("frame addressed to 0x08");
    assert_eq!(got.source, 0x52);
    assert_eq!(got.destination, 0x08);
    assert_eq!(got.payload, b"A");
    assert!(bob.recv().is_none());
    // the unicast copy a station hears of its own frame is filtered
    assert!(alice.recv().is_none());
}

#[test]
fn test_broadcast_reaches_every_listener() {
    let mut bus = SimBus::new();
    let a = bus.add_node(0x10, 1).expect("station 0x10");
    let b = bus.add_node(0x20, 2).expect("station 0x20");
    let c = bus.add_node(0x30, 3).expect("station 0x30");

    a.send(BROADCAST_ADDR, b"HI").expect("broadcast");
    assert!(bus.run_until_quiet(1_000_000));

    for (name, node) in [("b", &b), ("c", &c)] {
        let got = node.recv().unwrap_or_else(|| panic!("{name} missed the broadcast"));
        assert_eq!(got.source, 0x10);
        assert_eq!(got.destination, BROADCAST_ADDR);
        assert_eq!(got.payload, b"HI");
    }
    // broadcast is address 0: the sender hears its own frame too
    let own = a.recv().expect("sender's own broadcast copy");
    assert_eq!(own.payload, b"HI");
}

#[test]
fn test_fragmentation_at_255() {
    let mut bus = SimBus::new();
    let a = bus.add_node(0x52, 1).expect("sender");
    let b = bus.add_node(0x08, 2).expect("receiver");

    let payload = [0xAB; 260];
    a.send(0x08, &payload).expect("send 260 bytes");
    assert_eq!(a.pending_tx(), 2, "260 bytes must fragment into two frames");
    assert!(bus.run_until_quiet(10_000_000));

    let first = b.recv().expect("first fragment");
    assert_eq!(first.payload.len(), 255);
    assert!(first.payload.iter().all(|&byte| byte == 0xAB));
    let second = b.recv().expect("second fragment");
    assert_eq!(second.payload.len(), 5);
    assert!(second.payload.iter().all(|&byte| byte == 0xAB));
    assert!(b.recv().is_none());
}

#[test]
fn test_corrupted_crc_is_dropped_next_frame_passes() {
    let mut bus = SimBus::new();
    let rx = bus.add_node(0x08, 1).expect("receiver");

    let mut staged = [0u8; MAX_FRAME];
    let len = frame::build(&mut staged, 0x52, 0x08, b"BAD");
    // flip one payload bit after the CRC was computed
    staged[6] ^= 0x01;
    bus.inject_frame(&staged[..len]);
    assert!(bus.run_until_quiet(1_000_000));
    assert!(rx.recv().is_none(), "corrupt frame must not be delivered");

    let len = frame::build(&mut staged, 0x52, 0x08, b"GOOD");
    bus.inject_frame(&staged[..len]);
    assert!(bus.run_until_quiet(1_000_000));
    let got = rx.recv().expect("clean frame after the corrupt one");
    assert_eq!(got.payload, b"GOOD");
}

#[test]
fn test_invalid_symbol_stream_is_dropped() {
    let mut bus = SimBus::new();
    let rx = bus.add_node(0x08, 1).expect("receiver");

    let mut staged = [0u8; MAX_FRAME];
    let len = frame::build(&mut staged, 0x52, 0x08, b"A");
    let mut symbols = vec![0u8; 2 * len];
    manchester::encode(&staged[..len], &mut symbols);
    // mangle the source byte's first nibble into a 11 pair
    assert_eq!(symbols[4], 0x99);
    symbols[4] = 0xC9;
    bus.inject_symbols(&symbols);
    assert!(bus.run_until_quiet(10_000_000));
    assert!(rx.recv().is_none(), "unframeable stream must not be delivered");

    bus.inject_frame(&staged[..len]);
    assert!(bus.run_until_quiet(1_000_000));
    assert_eq!(rx.recv().expect("clean frame").payload, b"A");
}

#[test]
fn test_wrong_version_is_dropped() {
    let mut bus = SimBus::new();
    let rx = bus.add_node(0x08, 1).expect("receiver");

    let mut staged = [0u8; MAX_FRAME];
    let len = frame::build(&mut staged, 0x52, 0x08, b"A");
    staged[1] = 0x02;
    let body = 6 + 1;
    staged[body] = manbus::wire::crc8(&staged[..body]);
    bus.inject_frame(&staged[..len]);
    assert!(bus.run_until_quiet(1_000_000));
    assert!(rx.recv().is_none(), "foreign protocol version must be dropped");
}
