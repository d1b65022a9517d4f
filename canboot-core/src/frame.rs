// SPDX-License-Identifier: MIT
// Copyright (c) 2026 ADNT Sarl <info@adnt.io>

//! Wire protocol: raw CAN frames and the bootloader message catalogue.
//!
//! Every message fits in a single classic CAN frame (11-bit identifier,
//! up to 8 data bytes). The identifiers are stable within one deployment
//! but carry no meaning outside this system. Node serials travel
//! little-endian; the integrity digest travels big-endian.

/// A raw classic CAN frame as seen by the transport.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CanFrame {
    pub id: u16,
    pub len: u8,
    pub data: [u8; 8],
}

impl CanFrame {
    pub fn new(id: u16, payload: &[u8]) -> Self {
        let mut data = [0u8; 8];
        data[..payload.len()].copy_from_slice(payload);
        Self {
            id,
            len: payload.len() as u8,
            data,
        }
    }

    /// The payload bytes actually carried by the frame.
    pub fn payload(&self) -> &[u8] {
        &self.data[..self.len as usize]
    }
}

// Frame identifiers. One contiguous assignment; the historical programmer
// and bootloader sources disagreed on 0x102-0x107.
pub const ID_ENTER_BOOTLOADER: u16 = 0x100;
pub const ID_IDENTIFY_REQUEST: u16 = 0x101;
pub const ID_IDENTIFY_RESPONSE: u16 = 0x102;
pub const ID_SELECT_NODE: u16 = 0x103;
pub const ID_BEGIN_BLOCK: u16 = 0x104;
pub const ID_DATA_CHUNK: u16 = 0x105;
pub const ID_INTEGRITY_CHECK: u16 = 0x106;
pub const ID_BLOCK_OUTCOME: u16 = 0x107;
pub const ID_RESET_NODE: u16 = 0x108;

/// Result bits carried by a [`Message::BlockOutcome`] status byte.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub struct OutcomeFlags {
    /// The received digest matched the computed digest.
    pub integrity_ok: bool,
    /// The block was committed to flash and compared clean.
    pub flash_ok: bool,
    /// The session lost frame sync and was reset (see error handling).
    pub desync: bool,
}

impl OutcomeFlags {
    pub fn success() -> Self {
        Self {
            integrity_ok: true,
            flash_ok: true,
            desync: false,
        }
    }

    /// Both the integrity and the flash bit are set.
    pub fn is_success(&self) -> bool {
        self.integrity_ok && self.flash_ok
    }

    fn to_byte(self) -> u8 {
        (self.integrity_ok as u8) | (self.flash_ok as u8) << 1 | (self.desync as u8) << 2
    }

    fn from_byte(b: u8) -> Self {
        Self {
            integrity_ok: b & 0x01 != 0,
            flash_ok: b & 0x02 != 0,
            desync: b & 0x04 != 0,
        }
    }
}

/// The message catalogue of the update protocol.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Message {
    /// programmer -> all: force any listening application into update mode.
    EnterBootloader,
    /// programmer -> all: ask every bootloader to announce itself.
    IdentifyRequest,
    /// node -> programmer: announce this node's serial.
    IdentifyResponse { serial: u32 },
    /// programmer -> target: select one node for programming.
    SelectNode { serial: u32 },
    /// programmer -> selected: the logical sector the next block targets.
    BeginBlock { sector: u8 },
    /// programmer -> selected: eight payload bytes, in order.
    DataChunk { data: [u8; 8] },
    /// programmer -> selected: the digest of the preceding 4096 bytes.
    IntegrityCheck { digest: u32 },
    /// node -> programmer: the result of one block attempt.
    BlockOutcome { serial: u32, flags: OutcomeFlags },
    /// programmer -> all: leave the bootloader via a controlled reset.
    ResetNode,
}

impl Message {
    /// Encode this message into a CAN frame.
    pub fn encode(&self) -> CanFrame {
        match *self {
            Message::EnterBootloader => CanFrame::new(ID_ENTER_BOOTLOADER, &[]),
            Message::IdentifyRequest => CanFrame::new(ID_IDENTIFY_REQUEST, &[]),
            Message::IdentifyResponse { serial } => {
                CanFrame::new(ID_IDENTIFY_RESPONSE, &serial.to_le_bytes())
            }
            Message::SelectNode { serial } => CanFrame::new(ID_SELECT_NODE, &serial.to_le_bytes()),
            Message::BeginBlock { sector } => CanFrame::new(ID_BEGIN_BLOCK, &[sector]),
            Message::DataChunk { data } => CanFrame::new(ID_DATA_CHUNK, &data),
            Message::IntegrityCheck { digest } => {
                CanFrame::new(ID_INTEGRITY_CHECK, &digest.to_be_bytes())
            }
            Message::BlockOutcome { serial, flags } => {
                let s = serial.to_le_bytes();
                CanFrame::new(
                    ID_BLOCK_OUTCOME,
                    &[s[0], s[1], s[2], s[3], flags.to_byte()],
                )
            }
            Message::ResetNode => CanFrame::new(ID_RESET_NODE, &[]),
        }
    }

    /// Decode a received frame. Unknown identifiers and truncated payloads
    /// yield `None`; the caller drops such frames silently.
    pub fn decode(frame: &CanFrame) -> Option<Message> {
        let p = frame.payload();
        match frame.id {
            ID_ENTER_BOOTLOADER => Some(Message::EnterBootloader),
            ID_IDENTIFY_REQUEST => Some(Message::IdentifyRequest),
            ID_IDENTIFY_RESPONSE => Some(Message::IdentifyResponse {
                serial: read_serial(p)?,
            }),
            ID_SELECT_NODE => Some(Message::SelectNode {
                serial: read_serial(p)?,
            }),
            ID_BEGIN_BLOCK => {
                if p.is_empty() {
                    return None;
                }
                Some(Message::BeginBlock { sector: p[0] })
            }
            ID_DATA_CHUNK => {
                if p.len() < 8 {
                    return None;
                }
                Some(Message::DataChunk { data: frame.data })
            }
            ID_INTEGRITY_CHECK => {
                if p.len() < 4 {
                    return None;
                }
                Some(Message::IntegrityCheck {
                    digest: u32::from_be_bytes([p[0], p[1], p[2], p[3]]),
                })
            }
            ID_BLOCK_OUTCOME => {
                if p.len() < 5 {
                    return None;
                }
                Some(Message::BlockOutcome {
                    serial: read_serial(p)?,
                    flags: OutcomeFlags::from_byte(p[4]),
                })
            }
            ID_RESET_NODE => Some(Message::ResetNode),
            _ => None,
        }
    }
}

fn read_serial(payload: &[u8]) -> Option<u32> {
    if payload.len() < 4 {
        return None;
    }
    Some(u32::from_le_bytes([
        payload[0], payload[1], payload[2], payload[3],
    ]))
}
