// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2026 manbus contributors

//! manbus-term: line-oriented console for a bus station.
//!
//! Runs two stations on a simulated segment (one driven from stdin, one
//! peer that prints whatever reaches it) and pumps the virtual clock at
//! roughly wall speed. Type `0xAA message` to unicast, `0x00 message` to
//! broadcast, `/setaddr 0xAA` to re-address the interactive station,
//! `.zeros` / `.ones` as message bodies for worst-case symbol runs, and
//! `/quit` to leave.

mod command;
mod hexdump;
mod logger;

use std::io::{self, BufRead, Write};
use std::thread;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use crossbeam::channel;
use manbus::error::{report_non_fatal, Error};
use manbus::sim::SimBus;
use manbus::Link;

use command::Command;

const LOCAL_DEFAULT: u8 = 0x52;
const PEER_DEFAULT: u8 = 0x08;

/// Virtual time advanced per pump iteration, matched to the sleep below so
/// the simulated segment runs at roughly wall speed.
const PUMP_SLICE_US: u64 = 5_000;

fn main() {
    let args: Vec<String> = std::env::args().collect();
    let verbose = args.iter().any(|a| a == "-v" || a == "--verbose");
    logger::init(if verbose {
        log::LevelFilter::Debug
    } else {
        log::LevelFilter::Info
    });

    let local = hex_arg(&args, 1).unwrap_or(LOCAL_DEFAULT);
    let peer = hex_arg(&args, 2).unwrap_or(PEER_DEFAULT);

    println!("/* ---------- DEVICE RESET ---------- */");
    println!();
    println!(
        "manbus-term {}: station 0x{local:02X} with peer 0x{peer:02X} on a simulated segment",
        manbus::VERSION
    );
    println!("commands: '0xAA message', '0x00 message' (broadcast), '/setaddr 0xAA', '/quit'");
    println!("          message bodies '.zeros' and '.ones' send eight 0x00 / 0xFF bytes");
    println!();

    let seed = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos() as u64)
        .unwrap_or(1);

    let mut bus = SimBus::new();
    let station = bus
        .add_node(local, seed)
        .unwrap_or_else(|e| fatal("station init", e));
    let peer_station = bus
        .add_node(peer, seed ^ 0x9E37_79B9_7F4A_7C15)
        .unwrap_or_else(|e| fatal("peer init", e));

    let (line_tx, line_rx) = channel::unbounded::<String>();
    thread::spawn(move || {
        let stdin = io::stdin();
        for line in stdin.lock().lines() {
            match line {
                Ok(line) => {
                    if line_tx.send(line).is_err() {
                        break;
                    }
                }
                Err(_) => {
                    report_non_fatal("console read", Error::UartTimeout);
                    break;
                }
            }
        }
    });

    loop {
        while let Ok(line) = line_rx.try_recv() {
            if line.trim() == "/quit" {
                return;
            }
            match command::parse(&line) {
                Ok(Command::SetAddr(addr)) => {
                    station.set_local_address(addr);
                    println!("local address is now 0x{addr:02X}");
                }
                Ok(Command::Send { destination, body }) => {
                    if let Err(e) = station.send(destination, &body) {
                        report_non_fatal("send", e);
                    }
                }
                Err(e) => report_non_fatal("console input", e),
            }
        }

        bus.run_for(PUMP_SLICE_US);
        drain(&station, "you");
        drain(&peer_station, "peer");
        thread::sleep(Duration::from_millis(5));
    }
}

fn drain(link: &Link, who: &str) {
    while let Some(frame) = link.recv() {
        println!(
            "[{who} 0x{:02X}] {} byte(s) from 0x{:02X} to 0x{:02X}",
            link.local_address(),
            frame.payload.len(),
            frame.source,
            frame.destination,
        );
        print!("{}", hexdump::format(&frame.payload));
        let _ = io::stdout().flush();
    }
}

fn hex_arg(args: &[String], idx: usize) -> Option<u8> {
    args.get(idx).and_then(|a| command::parse_addr(a).ok())
}

fn fatal(op: &str, err: Error) -> ! {
    log::error!("fatal: {op}: {err} (code 0x{:02X})", err.code());
    println!("SYSTEM HALTED.");
    std::process::exit(1);
}
