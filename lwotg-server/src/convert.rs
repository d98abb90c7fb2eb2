//
// Copyright (c) The Holo Core Contributors
//
// SPDX-License-Identifier: MIT
//

use lwotg_flows::flow::{
    EthernetSpec, Flow, Header, MplsSpec, Pattern, Rate, TxRx,
};
use lwotg_utils::mac_addr::MacAddr;

use crate::error::{Error, Result};
use crate::proto;
use crate::proto::{
    flow_header, flow_rate, flow_tx_rx, pattern_mac, pattern_u32,
};

// ===== global functions =====

// Converts a flow as received over the wire into its abstract form.
//
// Only structural problems are reported here; whether the flow can actually
// be generated is up to the flow handlers.
pub(crate) fn flow(flow: &proto::Flow) -> Result<Flow> {
    let name = flow.name.clone();

    let tx_rx = match flow.tx_rx.as_ref().and_then(|t| t.choice.as_ref()) {
        Some(flow_tx_rx::Choice::Port(port)) => TxRx::Port {
            tx: port.tx_name.clone(),
            rx: port.rx_name.clone(),
        },
        Some(flow_tx_rx::Choice::Device(device)) => TxRx::Device {
            tx: device.tx_names.clone(),
            rx: device.rx_names.clone(),
        },
        None => return Err(Error::InvalidFlow(name, "missing tx_rx")),
    };

    let packet = flow
        .packet
        .iter()
        .map(|header| self::header(&name, header))
        .collect::<Result<Vec<_>>>()?;

    let rate = flow
        .rate
        .as_ref()
        .and_then(|rate| rate.choice.as_ref())
        .map(self::rate);

    Ok(Flow {
        name,
        tx_rx,
        packet,
        rate,
    })
}

// ===== helper functions =====

fn header(name: &str, header: &proto::FlowHeader) -> Result<Header> {
    let header = match &header.choice {
        Some(flow_header::Choice::Ethernet(ethernet)) => {
            Header::Ethernet(EthernetSpec {
                dst: mac_pattern(name, ethernet.dst.as_ref())?,
                src: mac_pattern(name, ethernet.src.as_ref())?,
            })
        }
        Some(flow_header::Choice::Mpls(mpls)) => Header::Mpls(MplsSpec {
            label: u32_pattern(mpls.label.as_ref()),
            traffic_class: u32_pattern(mpls.traffic_class.as_ref()),
            bottom_of_stack: u32_pattern(mpls.bottom_of_stack.as_ref()),
            ttl: u32_pattern(mpls.time_to_live.as_ref()),
        }),
        Some(flow_header::Choice::Vlan(..)) => Header::Other("vlan"),
        Some(flow_header::Choice::Ipv4(..)) => Header::Other("ipv4"),
        Some(flow_header::Choice::Ipv6(..)) => Header::Other("ipv6"),
        Some(flow_header::Choice::Udp(..)) => Header::Other("udp"),
        Some(flow_header::Choice::Tcp(..)) => Header::Other("tcp"),
        Some(flow_header::Choice::Custom(..)) => Header::Other("custom"),
        None => {
            return Err(Error::InvalidFlow(
                name.to_owned(),
                "header without type",
            ));
        }
    };

    Ok(header)
}

fn mac_pattern(
    name: &str,
    pattern: Option<&proto::PatternMac>,
) -> Result<Pattern<MacAddr>> {
    let pattern = match pattern.and_then(|p| p.choice.as_ref()) {
        Some(pattern_mac::Choice::Value(value)) => {
            let mac = value.parse().map_err(|_| {
                Error::InvalidMac(name.to_owned(), value.clone())
            })?;
            Pattern::Value(mac)
        }
        Some(pattern_mac::Choice::Values(..)) => Pattern::Other("values"),
        Some(pattern_mac::Choice::Increment(..)) => Pattern::Other("increment"),
        Some(pattern_mac::Choice::Decrement(..)) => Pattern::Other("decrement"),
        None => Pattern::Unset,
    };

    Ok(pattern)
}

fn u32_pattern(pattern: Option<&proto::PatternU32>) -> Pattern<u32> {
    match pattern.and_then(|p| p.choice.as_ref()) {
        Some(pattern_u32::Choice::Value(value)) => Pattern::Value(*value),
        Some(pattern_u32::Choice::Values(..)) => Pattern::Other("values"),
        Some(pattern_u32::Choice::Increment(..)) => Pattern::Other("increment"),
        Some(pattern_u32::Choice::Decrement(..)) => Pattern::Other("decrement"),
        None => Pattern::Unset,
    }
}

fn rate(rate: &flow_rate::Choice) -> Rate {
    match *rate {
        flow_rate::Choice::Pps(pps) => Rate::Pps(pps),
        flow_rate::Choice::Bps(bps) => Rate::Bps(bps),
        flow_rate::Choice::Kbps(kbps) => Rate::Kbps(kbps),
        flow_rate::Choice::Mbps(mbps) => Rate::Mbps(mbps),
        flow_rate::Choice::Gbps(gbps) => Rate::Gbps(gbps),
        flow_rate::Choice::Percentage(pct) => Rate::Percentage(pct),
    }
}

// ===== unit tests =====

#[cfg(test)]
mod tests {
    use super::*;

    fn u32_value(value: u32) -> Option<proto::PatternU32> {
        Some(proto::PatternU32 {
            choice: Some(pattern_u32::Choice::Value(value)),
        })
    }

    fn mac_value(value: &str) -> Option<proto::PatternMac> {
        Some(proto::PatternMac {
            choice: Some(pattern_mac::Choice::Value(value.to_owned())),
        })
    }

    fn port_flow(packet: Vec<flow_header::Choice>) -> proto::Flow {
        proto::Flow {
            name: "f1".to_owned(),
            tx_rx: Some(proto::FlowTxRx {
                choice: Some(flow_tx_rx::Choice::Port(proto::FlowPort {
                    tx_name: "port1".to_owned(),
                    rx_name: Some("port2".to_owned()),
                })),
            }),
            packet: packet
                .into_iter()
                .map(|choice| proto::FlowHeader {
                    choice: Some(choice),
                })
                .collect(),
            rate: Some(proto::FlowRate {
                choice: Some(flow_rate::Choice::Pps(10)),
            }),
        }
    }

    #[test]
    fn ethernet_mpls_flow() {
        let flow = flow(&port_flow(vec![
            flow_header::Choice::Ethernet(proto::FlowEthernet {
                dst: mac_value("02:00:00:00:00:02"),
                src: Some(proto::PatternMac {
                    choice: Some(pattern_mac::Choice::Increment(
                        proto::MacCounter::default(),
                    )),
                }),
            }),
            flow_header::Choice::Mpls(proto::FlowMpls {
                label: u32_value(100),
                traffic_class: None,
                bottom_of_stack: u32_value(1),
                time_to_live: u32_value(32),
            }),
            flow_header::Choice::Ipv4(proto::FlowIpv4::default()),
        ]))
        .unwrap();

        assert_eq!(
            flow.tx_rx,
            TxRx::Port {
                tx: "port1".to_owned(),
                rx: Some("port2".to_owned()),
            }
        );
        assert_eq!(
            flow.packet,
            vec![
                Header::Ethernet(EthernetSpec {
                    dst: Pattern::Value(
                        MacAddr::from([0x02, 0, 0, 0, 0, 0x02])
                    ),
                    src: Pattern::Other("increment"),
                }),
                Header::Mpls(MplsSpec {
                    label: Pattern::Value(100),
                    traffic_class: Pattern::Unset,
                    bottom_of_stack: Pattern::Value(1),
                    ttl: Pattern::Value(32),
                }),
                Header::Other("ipv4"),
            ]
        );
        assert_eq!(flow.rate, Some(Rate::Pps(10)));
    }

    #[test]
    fn malformed_flows() {
        let mut missing_tx_rx = port_flow(vec![]);
        missing_tx_rx.tx_rx = None;
        assert!(matches!(
            flow(&missing_tx_rx),
            Err(Error::InvalidFlow(name, _)) if name == "f1"
        ));

        let mut empty_header = port_flow(vec![]);
        empty_header.packet.push(proto::FlowHeader { choice: None });
        assert!(matches!(
            flow(&empty_header),
            Err(Error::InvalidFlow(..))
        ));

        let bad_mac = port_flow(vec![flow_header::Choice::Ethernet(
            proto::FlowEthernet {
                dst: mac_value("02:00:00:00:00"),
                src: None,
            },
        )]);
        assert!(matches!(
            flow(&bad_mac),
            Err(Error::InvalidMac(_, mac)) if mac == "02:00:00:00:00"
        ));
    }
}
