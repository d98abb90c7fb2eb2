//
// Copyright (c) The Holo Core Contributors
//
// SPDX-License-Identifier: MIT
//

use std::sync::LazyLock as Lazy;

use lwotg_utils::mac_addr::MacAddr;
use lwotg_utils::mpls::Label;

use super::*;

fn ethernet() -> EthernetHdr {
    EthernetHdr {
        dst_mac: MacAddr::from([0x02, 0x00, 0x00, 0x00, 0x00, 0x02]),
        src_mac: MacAddr::from([0x02, 0x00, 0x00, 0x00, 0x00, 0x01]),
        ethertype: EthernetHdr::ETHERTYPE_MPLS_UNICAST,
    }
}

//
// Single label: 100, TC 0, S 1, TTL 64. Padded to 60 bytes.
//
static SINGLE_LABEL: Lazy<(Vec<u8>, Packet)> = Lazy::new(|| {
    let mut bytes = vec![
        0x02, 0x00, 0x00, 0x00, 0x00, 0x02, 0x02, 0x00, 0x00, 0x00, 0x00, 0x01,
        0x88, 0x47, 0x00, 0x06, 0x41, 0x40,
    ];
    bytes.resize(60, 0);
    (
        bytes,
        Packet {
            ethernet: Some(ethernet()),
            mpls: vec![MplsHdr {
                label: Label::new(100).unwrap(),
                traffic_class: 0,
                bottom_of_stack: true,
                ttl: 64,
            }],
        },
    )
});

//
// Two labels: 16/TC 5/S 0/TTL 255 then 1048575/TC 0/S 1/TTL 1.
//
static LABEL_STACK: Lazy<(Vec<u8>, Packet)> = Lazy::new(|| {
    let mut bytes = vec![
        0x02, 0x00, 0x00, 0x00, 0x00, 0x02, 0x02, 0x00, 0x00, 0x00, 0x00, 0x01,
        0x88, 0x47, 0x00, 0x01, 0x0a, 0xff, 0xff, 0xff, 0xf1, 0x01,
    ];
    bytes.resize(60, 0);
    (
        bytes,
        Packet {
            ethernet: Some(ethernet()),
            mpls: vec![
                MplsHdr {
                    label: Label::new(16).unwrap(),
                    traffic_class: 5,
                    bottom_of_stack: false,
                    ttl: 255,
                },
                MplsHdr {
                    label: Label::new(1048575).unwrap(),
                    traffic_class: 0,
                    bottom_of_stack: true,
                    ttl: 1,
                },
            ],
        },
    )
});

#[test]
fn test_encode_single_label() {
    let (ref bytes, ref packet) = *SINGLE_LABEL;
    test_encode_packet(bytes, packet);
}

#[test]
fn test_decode_single_label() {
    let (ref bytes, ref packet) = *SINGLE_LABEL;
    test_decode_packet(bytes, packet);
}

#[test]
fn test_encode_label_stack() {
    let (ref bytes, ref packet) = *LABEL_STACK;
    test_encode_packet(bytes, packet);
}

#[test]
fn test_decode_label_stack() {
    let (ref bytes, ref packet) = *LABEL_STACK;
    test_decode_packet(bytes, packet);
}

#[test]
fn test_decode_non_mpls() {
    let mut bytes = SINGLE_LABEL.0.clone();
    bytes[12] = 0x08;
    bytes[13] = 0x00;

    let packet = Packet::decode(&bytes).unwrap();
    assert!(!packet.is_mpls());
    assert_eq!(packet.ethernet.unwrap().ethertype, 0x0800);
}

#[test]
fn test_decode_truncated() {
    let bytes = &SINGLE_LABEL.0;
    assert_eq!(
        Packet::decode(&bytes[..10]),
        Err(DecodeError::IncompletePacket)
    );

    // Stack cut off before the bottom-of-stack entry.
    let bytes = &LABEL_STACK.0[..18];
    assert_eq!(
        Packet::decode(bytes),
        Err(DecodeError::MissingBottomOfStack)
    );
}

#[test]
fn test_encode_large_frame_unpadded() {
    let mut packet = LABEL_STACK.1.clone();
    let entry = packet.mpls[0].clone();
    packet.mpls = std::iter::repeat_n(entry, 12).collect();
    packet.mpls.last_mut().unwrap().bottom_of_stack = true;

    let bytes = packet.encode();
    assert_eq!(bytes.len(), EthernetHdr::LENGTH + 12 * MplsHdr::LENGTH);
    assert_eq!(Packet::decode(&bytes).unwrap(), packet);
}
