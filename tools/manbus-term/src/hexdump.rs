// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2026 manbus contributors

//! 16-bytes-per-row hex+ASCII dump for received payloads.

use std::fmt::Write;

pub fn format(bytes: &[u8]) -> String {
    let mut out = String::new();
    for (row, chunk) in bytes.chunks(16).enumerate() {
        let _ = write!(out, "  {:04X} ", row * 16);
        for &byte in chunk {
            let _ = write!(out, " {byte:02x}");
        }
        for _ in chunk.len()..16 {
            out.push_str("   ");
        }
        out.push_str("  ");
        for &byte in chunk {
            out.push(if (0x20..=0x7e).contains(&byte) {
                byte as char
            } else {
                '.'
            });
        }
        out.push('\n');
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_short_row() {
        let expected = format!("  0000  41 42{}  AB\n", "   ".repeat(14));
        assert_eq!(format(b"AB"), expected);
    }

    #[test]
    fn test_nonprintable_dots() {
        let dump = format(&[0x00, 0x41, 0xFF]);
        assert!(dump.ends_with(".A.\n"));
    }

    #[test]
    fn test_two_rows() {
        let dump = format(&[0x41; 17]);
        assert_eq!(dump.lines().count(), 2);
        assert!(dump.lines().nth(1).unwrap().starts_with("  0010  41"));
    }
}
