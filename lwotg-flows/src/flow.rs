//
// Copyright (c) The Holo Core Contributors
//
// SPDX-License-Identifier: MIT
//

use lwotg_utils::mac_addr::MacAddr;

/// Abstract description of a packet stream.
#[derive(Clone, Debug, PartialEq)]
pub struct Flow {
    pub name: String,
    pub tx_rx: TxRx,
    // Header layers, outermost first.
    pub packet: Vec<Header>,
    pub rate: Option<Rate>,
}

/// Where a flow is sent from and received on.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum TxRx {
    Port { tx: String, rx: Option<String> },
    Device { tx: Vec<String>, rx: Vec<String> },
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Header {
    Ethernet(EthernetSpec),
    Mpls(MplsSpec),
    // Any header kind without a generator, named after its kind.
    Other(&'static str),
}

#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct EthernetSpec {
    pub dst: Pattern<MacAddr>,
    pub src: Pattern<MacAddr>,
}

#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct MplsSpec {
    pub label: Pattern<u32>,
    pub traffic_class: Pattern<u32>,
    pub bottom_of_stack: Pattern<u32>,
    pub ttl: Pattern<u32>,
}

/// Value selection for a single header field.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub enum Pattern<T> {
    #[default]
    Unset,
    Value(T),
    // Increments, decrements, value lists and the like, by name.
    Other(&'static str),
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Rate {
    Pps(u64),
    Bps(u64),
    Kbps(u64),
    Mbps(u64),
    Gbps(u32),
    Percentage(f32),
}

// ===== impl Header =====

impl Header {
    pub fn kind(&self) -> &'static str {
        match self {
            Header::Ethernet(..) => "ethernet",
            Header::Mpls(..) => "mpls",
            Header::Other(kind) => kind,
        }
    }
}

// ===== impl Rate =====

impl Rate {
    pub fn unit(&self) -> &'static str {
        match self {
            Rate::Pps(..) => "pps",
            Rate::Bps(..) => "bps",
            Rate::Kbps(..) => "kbps",
            Rate::Mbps(..) => "mbps",
            Rate::Gbps(..) => "gbps",
            Rate::Percentage(..) => "percentage",
        }
    }
}
