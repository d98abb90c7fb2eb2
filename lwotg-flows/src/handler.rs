//
// Copyright (c) The Holo Core Contributors
//
// SPDX-License-Identifier: MIT
//

use std::collections::HashMap;

use bytes::Bytes;
use lwotg_utils::mac_addr::MacAddr;
use lwotg_utils::mpls::Label;
use lwotg_utils::task::Task;
use tracing::debug;

use crate::error::{Error, Result};
use crate::flow::{EthernetSpec, Flow, Header, MplsSpec, Pattern, Rate, TxRx};
use crate::io;
use crate::listener::FlowListener;
use crate::packet::{EthernetHdr, MplsHdr, Packet};

/// Logical OTG port name to operating-system interface name.
pub type PortMap = HashMap<String, String>;

/// Compiles a flow it knows how to generate. Returns `Ok(None)` when the
/// flow is of a kind the handler does not generate, so that another handler
/// may claim it.
pub type FlowHandler = fn(&Flow, &PortMap) -> Result<Option<CompiledFlow>>;

pub const DEFAULT_PPS: u64 = 1000;
pub const DEFAULT_TTL: u8 = 64;

/// A flow ready to be put on the wire.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct CompiledFlow {
    pub name: String,
    pub packet: Packet,
    pub frame: Bytes,
    pub pps: u64,
    pub tx_ifname: String,
    pub rx_ifname: String,
}

/// Handles to the two directions of a started flow.
#[derive(Debug)]
pub struct FlowTasks {
    pub tx: Task<()>,
    pub rx: Task<()>,
}

// ===== impl CompiledFlow =====

impl CompiledFlow {
    /// Starts one blocking task per direction. Each task runs until its
    /// listener is stopped or an I/O error occurs.
    pub fn start(&self, tx: FlowListener, rx: FlowListener) -> FlowTasks {
        let name = self.name.clone();
        let ifname = self.tx_ifname.clone();
        let frame = self.frame.clone();
        let pps = self.pps;
        let tx = Task::spawn_blocking(move || {
            io::run_tx(&name, &ifname, &frame, pps, tx)
        });

        let name = self.name.clone();
        let ifname = self.rx_ifname.clone();
        let rx = Task::spawn_blocking(move || io::run_rx(&name, &ifname, rx));

        FlowTasks { tx, rx }
    }
}

// ===== global functions =====

/// Handler for flows made of an Ethernet header followed by one or more MPLS
/// label stack entries, sent between two ports at a packets-per-second rate.
pub fn simple_mpls_flow_handler(
    flow: &Flow,
    port_map: &PortMap,
) -> Result<Option<CompiledFlow>> {
    ethernet_layout(flow)?;
    if !flow
        .packet
        .iter()
        .any(|header| matches!(header, Header::Mpls(..)))
    {
        return Ok(None);
    }

    let packet = headers(flow)?;
    let pps = rate(flow)?;
    let (tx_ifname, rx_ifname) = ports(flow, port_map)?;

    debug!(name = %flow.name, %tx_ifname, %rx_ifname, %pps, "flow compiled");
    let frame = packet.encode().freeze();
    Ok(Some(CompiledFlow {
        name: flow.name.clone(),
        packet,
        frame,
        pps,
        tx_ifname,
        rx_ifname,
    }))
}

/// Builds the concrete headers of the flow's packet.
pub fn headers(flow: &Flow) -> Result<Packet> {
    ethernet_layout(flow)?;

    let mut packet = Packet::default();
    for header in &flow.packet {
        match header {
            Header::Ethernet(spec) => {
                packet.ethernet = Some(ethernet_hdr(spec)?);
            }
            Header::Mpls(spec) => {
                packet.mpls.push(mpls_hdr(spec)?);
            }
            Header::Other(kind) => {
                return Err(Error::UnsupportedHeader(kind));
            }
        }
    }

    Ok(packet)
}

/// Resolves the flow's rate to packets per second.
pub fn rate(flow: &Flow) -> Result<u64> {
    match flow.rate {
        None | Some(Rate::Pps(0)) => Ok(DEFAULT_PPS),
        Some(Rate::Pps(pps)) => Ok(pps),
        Some(rate) => Err(Error::UnsupportedRate(rate.unit())),
    }
}

/// Resolves the flow's endpoints to transmit and receive interface names.
pub fn ports(flow: &Flow, port_map: &PortMap) -> Result<(String, String)> {
    match &flow.tx_rx {
        TxRx::Port { tx, rx } => {
            let rx = rx.as_ref().ok_or(Error::MissingRxPort)?;
            let lookup = |name: &String| {
                port_map
                    .get(name)
                    .cloned()
                    .ok_or_else(|| Error::UnknownPort(name.clone()))
            };
            Ok((lookup(tx)?, lookup(rx)?))
        }
        TxRx::Device { .. } => Err(Error::UnsupportedEndpoint("device")),
    }
}

// ===== helper functions =====

// At most one Ethernet layer, and only as the outermost header.
fn ethernet_layout(flow: &Flow) -> Result<()> {
    let mut seen = false;
    for (idx, header) in flow.packet.iter().enumerate() {
        if let Header::Ethernet(..) = header {
            if seen {
                return Err(Error::MultipleEthernet);
            }
            if idx != 0 {
                return Err(Error::EthernetNotFirst);
            }
            seen = true;
        }
    }
    Ok(())
}

fn ethernet_hdr(spec: &EthernetSpec) -> Result<EthernetHdr> {
    Ok(EthernetHdr {
        dst_mac: mac_value(&spec.dst, "dst")?,
        src_mac: mac_value(&spec.src, "src")?,
        ethertype: EthernetHdr::ETHERTYPE_MPLS_UNICAST,
    })
}

fn mac_value(
    pattern: &Pattern<MacAddr>,
    field: &'static str,
) -> Result<MacAddr> {
    match pattern {
        Pattern::Value(mac) => Ok(*mac),
        Pattern::Unset => Err(Error::UnsupportedField {
            header: "ethernet",
            field,
            kind: "auto",
        }),
        Pattern::Other(kind) => Err(Error::UnsupportedField {
            header: "ethernet",
            field,
            kind,
        }),
    }
}

fn mpls_hdr(spec: &MplsSpec) -> Result<MplsHdr> {
    let label = mpls_value(&spec.label, "label", None)?;
    let label = Label::new(label).ok_or(Error::InvalidField {
        header: "mpls",
        field: "label",
        value: label as u64,
    })?;
    let tc = mpls_value(&spec.traffic_class, "traffic_class", Some(0))?;
    let tc = bounded(tc, MplsHdr::TC_MASK as u32, "traffic_class")?;
    let bos = mpls_value(&spec.bottom_of_stack, "bottom_of_stack", None)?;
    let bos = bounded(bos, 1, "bottom_of_stack")?;
    let ttl = mpls_value(&spec.ttl, "ttl", Some(DEFAULT_TTL as u32))?;
    let ttl = bounded(ttl, u8::MAX as u32, "ttl")?;

    Ok(MplsHdr {
        label,
        traffic_class: tc as u8,
        bottom_of_stack: bos == 1,
        ttl: ttl as u8,
    })
}

fn mpls_value(
    pattern: &Pattern<u32>,
    field: &'static str,
    default: Option<u32>,
) -> Result<u32> {
    match (pattern, default) {
        (Pattern::Value(value), _) => Ok(*value),
        (Pattern::Unset, Some(default)) => Ok(default),
        (Pattern::Unset, None) => Err(Error::MissingField {
            header: "mpls",
            field,
        }),
        (Pattern::Other(kind), _) => Err(Error::UnsupportedField {
            header: "mpls",
            field,
            kind,
        }),
    }
}

fn bounded(value: u32, max: u32, field: &'static str) -> Result<u32> {
    if value > max {
        return Err(Error::InvalidField {
            header: "mpls",
            field,
            value: value as u64,
        });
    }
    Ok(value)
}

// ===== unit tests =====
