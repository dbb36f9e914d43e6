// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2026 manbus contributors

//! Console command grammar.
//!
//! A line is either `/setaddr 0xAA`, or `0xAA message...`: a hex destination
//! followed by one space and the message body. Destination `0x00`
//! broadcasts. The bodies `.zeros` and `.ones` expand to eight `0x00` /
//! `0xFF` bytes, which is the quickest way to put worst-case symbol runs on
//! a scope.

use manbus::error::{Error, Result};

#[derive(Debug, PartialEq, Eq)]
pub enum Command {
    Send { destination: u8, body: Vec<u8> },
    SetAddr(u8),
}

pub fn parse(line: &str) -> Result<Command> {
    let line = line.trim();
    if line.is_empty() {
        return Err(Error::InvalidUserInput);
    }
    if let Some(rest) = line.strip_prefix("/setaddr") {
        return Ok(Command::SetAddr(parse_addr(rest.trim())?));
    }
    if line.starts_with('/') {
        return Err(Error::InvalidUserInput);
    }
    let (addr, body) = line.split_once(' ').ok_or(Error::InvalidUserInput)?;
    let destination = parse_addr(addr)?;
    let body = expand_body(body.trim());
    if body.is_empty() {
        return Err(Error::InvalidUserInput);
    }
    Ok(Command::Send { destination, body })
}

pub fn parse_addr(token: &str) -> Result<u8> {
    let digits = token
        .strip_prefix("0x")
        .or_else(|| token.strip_prefix("0X"))
        .ok_or(Error::InvalidUserInput)?;
    u8::from_str_radix(digits, 16).map_err(|_| Error::InvalidUserInput)
}

fn expand_body(body: &str) -> Vec<u8> {
    match body {
        ".zeros" => vec![0x00; 8],
        ".ones" => vec![0xFF; 8],
        text => text.as_bytes().to_vec(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unicast_send() {
        assert_eq!(
            parse("0xAA hello there"),
            Ok(Command::Send {
                destination: 0xAA,
                body: b"hello there".to_vec()
            })
        );
    }

    #[test]
    fn test_broadcast_send() {
        assert_eq!(
            parse("0x00 all stations"),
            Ok(Command::Send {
                destination: 0x00,
                body: b"all stations".to_vec()
            })
        );
    }

    #[test]
    fn test_setaddr() {
        assert_eq!(parse("/setaddr 0xAA"), Ok(Command::SetAddr(0xAA)));
        assert_eq!(parse("  /setaddr 0x08  "), Ok(Command::SetAddr(0x08)));
    }

    #[test]
    fn test_zeros_and_ones_bodies() {
        assert_eq!(
            parse("0x08 .zeros"),
            Ok(Command::Send {
                destination: 0x08,
                body: vec![0x00; 8]
            })
        );
        assert_eq!(
            parse("0x08 .ones"),
            Ok(Command::Send {
                destination: 0x08,
                body: vec![0xFF; 8]
            })
        );
    }

    #[test]
    fn test_rejects_garbage() {
        assert_eq!(parse(""), Err(Error::InvalidUserInput));
        assert_eq!(parse("hello"), Err(Error::InvalidUserInput));
        assert_eq!(parse("0xZZ hi"), Err(Error::InvalidUserInput));
        assert_eq!(parse("0x1234 hi"), Err(Error::InvalidUserInput));
        assert_eq!(parse("0x12"), Err(Error::InvalidUserInput));
        assert_eq!(parse("0x12 "), Err(Error::InvalidUserInput));
        assert_eq!(parse("/setaddr"), Err(Error::InvalidUserInput));
        assert_eq!(parse("/unknown 0x12"), Err(Error::InvalidUserInput));
    }
}
