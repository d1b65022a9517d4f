// SPDX-License-Identifier: MIT
// Copyright (c) 2026 ADNT Sarl <info@adnt.io>

//! SLCAN (Lawicel ASCII) transport for a serial CAN adapter.
//!
//! Standard-ID frames only: `tiiiLdd..` terminated by CR. The adapter is
//! opened, set to the requested bitrate and the channel opened before any
//! traffic flows; the channel is closed again on drop.

use std::collections::VecDeque;
use std::io::Read;
use std::io::Write;
use std::time::{Duration, Instant};

use anyhow::{bail, Context, Result};
use serialport::SerialPort;

use canboot_core::bus::{Clock, FrameBus};
use canboot_core::frame::CanFrame;

/// Read timeout for one poll of the adapter. Short enough that the
/// protocol loops stay responsive.
const POLL_TIMEOUT_MS: u64 = 2;

/// SLCAN bitrate setting codes, `S0` through `S8`.
pub const BITRATE_CODES: [(&str, u8); 5] = [
    ("125k", 4),
    ("250k", 5),
    ("500k", 6),
    ("800k", 7),
    ("1M", 8),
];

pub fn bitrate_code(name: &str) -> Result<u8> {
    for (n, code) in BITRATE_CODES {
        if n.eq_ignore_ascii_case(name) {
            return Ok(code);
        }
    }
    bail!(
        "Unknown bitrate {:?}; expected one of {}",
        name,
        BITRATE_CODES.map(|(n, _)| n).join(", ")
    )
}

/// A serial CAN adapter speaking the SLCAN ASCII protocol.
pub struct SlcanTransport {
    port: Box<dyn SerialPort>,
    line: Vec<u8>,
    parsed: VecDeque<CanFrame>,
}

impl SlcanTransport {
    /// Open the adapter, configure the bitrate and open the CAN channel.
    pub fn open(port_name: &str, bitrate: u8) -> Result<Self> {
        let port = serialport::new(port_name, 115_200)
            .timeout(Duration::from_millis(POLL_TIMEOUT_MS))
            .open()
            .with_context(|| format!("Failed to open serial port {}", port_name))?;

        let mut transport = Self {
            port,
            line: Vec::with_capacity(32),
            parsed: VecDeque::new(),
        };

        // Close first in case the channel was left open by a crashed run
        transport.command(b"C\r")?;
        transport.command(format!("S{}\r", bitrate).as_bytes())?;
        transport.command(b"O\r")?;
        Ok(transport)
    }

    fn command(&mut self, cmd: &[u8]) -> Result<()> {
        self.port
            .write_all(cmd)
            .context("Failed to write to adapter")?;
        self.port.flush()?;
        Ok(())
    }

    /// Read whatever the adapter has buffered and queue up any complete
    /// frames found in it.
    fn pump(&mut self) {
        let mut buf = [0u8; 64];
        let n = match self.port.read(&mut buf) {
            Ok(n) => n,
            Err(ref e) if e.kind() == std::io::ErrorKind::TimedOut => 0,
            Err(_) => 0,
        };

        for &byte in &buf[..n] {
            match byte {
                b'\r' => {
                    if let Some(frame) = parse_frame(&self.line) {
                        self.parsed.push_back(frame);
                    }
                    self.line.clear();
                }
                // BEL is the adapter's error response to a command
                0x07 => self.line.clear(),
                _ => self.line.push(byte),
            }
        }
    }
}

impl Drop for SlcanTransport {
    fn drop(&mut self) {
        let _ = self.command(b"C\r");
    }
}

impl FrameBus for SlcanTransport {
    fn try_recv(&mut self) -> Option<CanFrame> {
        if self.parsed.is_empty() {
            self.pump();
        }
        self.parsed.pop_front()
    }

    fn send(&mut self, frame: &CanFrame) {
        let mut line = format!("t{:03X}{:X}", frame.id, frame.len);
        for byte in frame.payload() {
            line.push_str(&format!("{:02X}", byte));
        }
        line.push('\r');
        // A failed write is indistinguishable from a frame lost on the
        // bus; the protocol's reply timeouts surface it either way.
        let _ = self.command(line.as_bytes());
    }
}

/// Parse one CR-stripped SLCAN record. Anything but a standard data
/// frame (`t`) is ignored.
fn parse_frame(line: &[u8]) -> Option<CanFrame> {
    let (&first, rest) = line.split_first()?;
    if first != b't' || rest.len() < 4 {
        return None;
    }

    let id = hex_u16(&rest[0..3])?;
    let len = hex_nibble(rest[3])? as usize;
    if len > 8 || rest.len() < 4 + 2 * len {
        return None;
    }

    let mut data = [0u8; 8];
    for (i, byte) in data.iter_mut().take(len).enumerate() {
        let hi = hex_nibble(rest[4 + 2 * i])?;
        let lo = hex_nibble(rest[5 + 2 * i])?;
        *byte = hi << 4 | lo;
    }

    Some(CanFrame {
        id,
        len: len as u8,
        data,
    })
}

fn hex_nibble(b: u8) -> Option<u8> {
    (b as char).to_digit(16).map(|d| d as u8)
}

fn hex_u16(digits: &[u8]) -> Option<u16> {
    let mut value = 0u16;
    for &d in digits {
        value = value << 4 | hex_nibble(d)? as u16;
    }
    Some(value)
}

/// Wall-clock milliseconds since construction.
pub struct StdClock {
    start: Instant,
}

impl StdClock {
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
        }
    }
}

impl Clock for StdClock {
    fn now_ms(&self) -> u64 {
        self.start.elapsed().as_millis() as u64
    }
}
