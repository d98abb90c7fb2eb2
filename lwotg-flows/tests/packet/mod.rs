//
// Copyright (c) The Holo Core Contributors
//
// SPDX-License-Identifier: MIT
//

mod mpls;

use lwotg_flows::packet::*;
use lwotg_utils::assert_eq_hex;

//
// Helper functions.
//

fn test_encode_packet(bytes_expected: &[u8], packet: &Packet) {
    let bytes_actual = packet.encode();
    assert_eq_hex!(bytes_expected, bytes_actual);
}

fn test_decode_packet(bytes: &[u8], packet_expected: &Packet) {
    let packet_actual = Packet::decode(bytes).unwrap();
    assert_eq!(*packet_expected, packet_actual);
}
