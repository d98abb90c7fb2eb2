//
// Copyright (c) The Holo Core Contributors
//
// SPDX-License-Identifier: MIT
//

// MPLS label.
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct Label(u32);

impl Label {
    pub const VALUE_MASK: u32 = 0x000FFFFF;

    // Well-known MPLS labels.
    pub const IPV4_EXPLICIT_NULL: u32 = 0;
    pub const ROUTER_ALERT: u32 = 1;
    pub const IPV6_EXPLICIT_NULL: u32 = 2;
    pub const IMPLICIT_NULL: u32 = 3;

    /// Builds a label from a value taken off the wire or from a client
    /// request. Returns `None` if the value does not fit in 20 bits.
    pub fn new(label: u32) -> Option<Label> {
        (label <= Self::VALUE_MASK).then_some(Label(label))
    }

    pub fn get(&self) -> u32 {
        self.0
    }
}

// ===== impl Label =====

impl std::fmt::Display for Label {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.0 {
            Label::IPV4_EXPLICIT_NULL => write!(f, "ipv4-explicit-null"),
            Label::ROUTER_ALERT => write!(f, "router-alert"),
            Label::IPV6_EXPLICIT_NULL => write!(f, "ipv6-explicit-null"),
            Label::IMPLICIT_NULL => write!(f, "implicit-null"),
            _ => write!(f, "{}", self.0),
        }
    }
}

// ===== unit tests =====
