//
// Copyright (c) The Holo Core Contributors
//
// SPDX-License-Identifier: MIT
//

use bytes::{Buf, BufMut, BytesMut};
use lwotg_utils::mac_addr::MacAddr;
use lwotg_utils::mpls::Label;

// Type aliases.
pub type DecodeResult<T> = Result<T, DecodeError>;

//
// Ethernet header.
//
// Encoding format:
//
//  0                   1                   2                   3
//  0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1
// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
// |                  Destination MAC (6 octets)                   |
// +                               +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
// |                               |                               |
// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+                               +
// |                    Source MAC (6 octets)                      |
// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
// |           EtherType           |
// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct EthernetHdr {
    pub dst_mac: MacAddr,
    pub src_mac: MacAddr,
    pub ethertype: u16,
}

//
// MPLS label stack entry (RFC 3032).
//
// Encoding format:
//
//  0                   1                   2                   3
//  0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1
// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
// |                Label                  | TC  |S|      TTL      |
// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct MplsHdr {
    pub label: Label,
    pub traffic_class: u8,
    pub bottom_of_stack: bool,
    pub ttl: u8,
}

/// Frame made of an optional Ethernet header followed by an MPLS label
/// stack.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct Packet {
    pub ethernet: Option<EthernetHdr>,
    pub mpls: Vec<MplsHdr>,
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum DecodeError {
    IncompletePacket,
    MissingBottomOfStack,
}

// ===== impl EthernetHdr =====

impl EthernetHdr {
    pub const LENGTH: usize = 14;
    pub const MIN_FRAME_LENGTH: usize = 60;
    pub const ETHERTYPE_MPLS_UNICAST: u16 = 0x8847;
    pub const ETHERTYPE_MPLS_MULTICAST: u16 = 0x8848;

    fn encode(&self, buf: &mut BytesMut) {
        buf.put_slice(&self.dst_mac.as_bytes());
        buf.put_slice(&self.src_mac.as_bytes());
        buf.put_u16(self.ethertype);
    }

    fn decode(buf: &mut &[u8]) -> DecodeResult<Self> {
        if buf.remaining() < Self::LENGTH {
            return Err(DecodeError::IncompletePacket);
        }

        let mut dst_mac = [0; MacAddr::LENGTH];
        buf.copy_to_slice(&mut dst_mac);
        let mut src_mac = [0; MacAddr::LENGTH];
        buf.copy_to_slice(&mut src_mac);
        let ethertype = buf.get_u16();

        Ok(EthernetHdr {
            dst_mac: dst_mac.into(),
            src_mac: src_mac.into(),
            ethertype,
        })
    }

    fn carries_mpls(&self) -> bool {
        self.ethertype == Self::ETHERTYPE_MPLS_UNICAST
            || self.ethertype == Self::ETHERTYPE_MPLS_MULTICAST
    }
}

// ===== impl MplsHdr =====

impl MplsHdr {
    pub const LENGTH: usize = 4;
    pub const TC_MASK: u8 = 0x07;

    fn encode(&self, buf: &mut BytesMut) {
        let mut entry = self.label.get() << 12;
        entry |= ((self.traffic_class & Self::TC_MASK) as u32) << 9;
        if self.bottom_of_stack {
            entry |= 1 << 8;
        }
        entry |= self.ttl as u32;
        buf.put_u32(entry);
    }

    fn decode(buf: &mut &[u8]) -> DecodeResult<Self> {
        if buf.remaining() < Self::LENGTH {
            return Err(DecodeError::IncompletePacket);
        }

        let entry = buf.get_u32();
        // The shifted value always fits in 20 bits.
        let label = Label::new(entry >> 12)
            .ok_or(DecodeError::IncompletePacket)?;

        Ok(MplsHdr {
            label,
            traffic_class: ((entry >> 9) as u8) & Self::TC_MASK,
            bottom_of_stack: entry & (1 << 8) != 0,
            ttl: entry as u8,
        })
    }
}

// ===== impl Packet =====

impl Packet {
    /// Serializes the headers outermost first, zero-padding frames that
    /// carry an Ethernet header to the minimum Ethernet frame length.
    pub fn encode(&self) -> BytesMut {
        let mut buf = BytesMut::with_capacity(EthernetHdr::MIN_FRAME_LENGTH);

        if let Some(ethernet) = &self.ethernet {
            ethernet.encode(&mut buf);
        }
        for mpls in &self.mpls {
            mpls.encode(&mut buf);
        }
        if self.ethernet.is_some()
            && buf.len() < EthernetHdr::MIN_FRAME_LENGTH
        {
            buf.resize(EthernetHdr::MIN_FRAME_LENGTH, 0);
        }

        buf
    }

    /// Decodes a captured Ethernet frame. The label stack is only decoded
    /// when the EtherType announces MPLS; trailing bytes are ignored.
    pub fn decode(data: &[u8]) -> DecodeResult<Self> {
        let mut buf = data;

        let ethernet = EthernetHdr::decode(&mut buf)?;
        let mut mpls = vec![];
        if ethernet.carries_mpls() {
            loop {
                if buf.remaining() < MplsHdr::LENGTH {
                    return Err(DecodeError::MissingBottomOfStack);
                }
                let hdr = MplsHdr::decode(&mut buf)?;
                let bottom_of_stack = hdr.bottom_of_stack;
                mpls.push(hdr);
                if bottom_of_stack {
                    break;
                }
            }
        }

        Ok(Packet {
            ethernet: Some(ethernet),
            mpls,
        })
    }

    pub fn is_mpls(&self) -> bool {
        !self.mpls.is_empty()
    }
}

// ===== impl DecodeError =====

impl std::fmt::Display for DecodeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DecodeError::IncompletePacket => {
                write!(f, "incomplete packet")
            }
            DecodeError::MissingBottomOfStack => {
                write!(f, "label stack ends without bottom-of-stack entry")
            }
        }
    }
}

impl std::error::Error for DecodeError {}
