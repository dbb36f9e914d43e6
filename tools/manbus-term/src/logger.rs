// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2026 manbus contributors

//! Minimal console logger behind the `log` facade.

use log::{Level, LevelFilter, Log, Metadata, Record};

struct ConsoleLogger;

impl Log for ConsoleLogger {
    fn enabled(&self, _metadata: &Metadata) -> bool {
        true
    }

    fn log(&self, record: &Record) {
        let tag = match record.level() {
            Level::Error => "ERROR",
            Level::Warn => "WARN ",
            Level::Info => "INFO ",
            Level::Debug => "DEBUG",
            Level::Trace => "TRACE",
        };
        println!("[{tag}] {}", record.args());
    }

    fn flush(&self) {}
}

/// Install the console logger. Safe to call once per process.
pub fn init(level: LevelFilter) {
    if log::set_boxed_logger(Box::new(ConsoleLogger)).is_ok() {
        log::set_max_level(level);
    }
}
