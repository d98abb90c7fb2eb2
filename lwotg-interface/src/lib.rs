//
// Copyright (c) The Holo Core Contributors
//
// SPDX-License-Identifier: MIT
//

//! Operations on the host's network interfaces.
//!
//! Everything the OTG emulation needs from the kernel goes through the
//! [`InterfaceOps`] trait: link lookup, IPv4 address programming, hardware
//! address retrieval, and the link and neighbor tables together with their
//! change events. [`Netlink`] is the rtnetlink-backed implementation used by
//! the daemon; tests substitute in-memory fakes.

mod arp;
pub mod error;
mod netlink;

use std::net::Ipv4Addr;

use async_trait::async_trait;
use futures::stream::BoxStream;
use ipnetwork::Ipv4Network;
use lwotg_utils::mac_addr::MacAddr;

pub use crate::arp::await_arp;
pub use crate::error::{Error, Result};
pub use crate::netlink::Netlink;

/// Stream of kernel change events. Dropping the stream tears down the
/// underlying netlink subscription.
pub type EventStream<T> = BoxStream<'static, T>;

/// Operational state of a link, as far as the emulation cares about it.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum OperState {
    Unknown,
    Up,
    Down,
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Link {
    pub ifindex: u32,
    pub name: String,
    pub mac: Option<MacAddr>,
    pub oper_state: OperState,
}

/// A resolved entry of the kernel's IPv4 neighbor (ARP) table.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Neighbor {
    pub ifindex: u32,
    // Only known when the entry comes from a table dump.
    pub ifname: Option<String>,
    pub addr: Ipv4Addr,
    pub mac: MacAddr,
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum LinkEvent {
    Update(Link),
    Remove(Link),
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum NeighborEvent {
    New(Neighbor),
    Remove(Neighbor),
}

#[async_trait]
pub trait InterfaceOps: Send + Sync {
    /// Returns whether a link with the given name currently exists. Lookup
    /// failures of any kind are reported as `false`.
    async fn valid_interface(&self, ifname: &str) -> bool;

    /// Adds an IPv4 address to the named link.
    ///
    /// Adding an address that is already present fails; callers are expected
    /// to track what they configured.
    async fn add_ip(&self, ifname: &str, addr: Ipv4Network) -> Result<()>;

    /// Removes an IPv4 address from the named link.
    async fn del_ip(&self, ifname: &str, addr: Ipv4Network) -> Result<()>;

    /// Returns the hardware address of the named link.
    async fn get_mac(&self, ifname: &str) -> Result<MacAddr>;

    /// Dumps the kernel's link table.
    async fn links(&self) -> Result<Vec<Link>>;

    /// Dumps the resolved entries of the kernel's IPv4 neighbor table.
    async fn neighbors(&self) -> Result<Vec<Neighbor>>;

    /// Subscribes to link additions, changes and removals.
    async fn link_events(&self) -> Result<EventStream<LinkEvent>>;

    /// Subscribes to IPv4 neighbor table changes.
    async fn neighbor_events(&self) -> Result<EventStream<NeighborEvent>>;
}
