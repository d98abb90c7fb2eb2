//
// Copyright (c) The Holo Core Contributors
//
// SPDX-License-Identifier: MIT
//

use std::net::Ipv4Addr;

use ipnetwork::Ipv4Network;
use tracing::warn;

pub type Result<T> = std::result::Result<T, Error>;

// Interface adapter errors.
#[derive(Debug)]
pub enum Error {
    NetlinkConnection(std::io::Error),
    InterfaceNotFound(String),
    InterfaceLookup(String, rtnetlink::Error),
    AddressAdd(String, Ipv4Network, rtnetlink::Error),
    AddressDel(String, Ipv4Network, rtnetlink::Error),
    TableDump(&'static str, rtnetlink::Error),
    MissingHwAddr(String),
    ArpTimeout(Ipv4Addr),
    SubscriptionClosed,
}

// ===== impl Error =====

impl Error {
    pub fn log(&self) {
        match self {
            Error::NetlinkConnection(error) => {
                warn!(error = %with_source(error), "{}", self);
            }
            Error::InterfaceNotFound(ifname)
            | Error::MissingHwAddr(ifname) => {
                warn!(%ifname, "{}", self);
            }
            Error::InterfaceLookup(ifname, error) => {
                warn!(%ifname, error = %with_source(error), "{}", self);
            }
            Error::AddressAdd(ifname, addr, error)
            | Error::AddressDel(ifname, addr, error) => {
                warn!(%ifname, %addr, error = %with_source(error), "{}", self);
            }
            Error::TableDump(_, error) => {
                warn!(error = %with_source(error), "{}", self);
            }
            Error::ArpTimeout(addr) => {
                warn!(%addr, "{}", self);
            }
            Error::SubscriptionClosed => {
                warn!("{}", self);
            }
        }
    }
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::NetlinkConnection(..) => {
                write!(f, "failed to create netlink socket")
            }
            Error::InterfaceNotFound(ifname) => {
                write!(f, "interface {ifname} not found")
            }
            Error::InterfaceLookup(ifname, ..) => {
                write!(f, "failed to look up interface {ifname}")
            }
            Error::AddressAdd(ifname, addr, ..) => {
                write!(f, "failed to add address {addr} to interface {ifname}")
            }
            Error::AddressDel(ifname, addr, ..) => {
                write!(
                    f,
                    "failed to remove address {addr} from interface {ifname}"
                )
            }
            Error::TableDump(table, ..) => {
                write!(f, "failed to dump {table} table")
            }
            Error::MissingHwAddr(ifname) => {
                write!(f, "interface {ifname} has no hardware address")
            }
            Error::ArpTimeout(addr) => {
                write!(f, "timed out waiting for ARP resolution of {addr}")
            }
            Error::SubscriptionClosed => {
                write!(f, "netlink subscription closed")
            }
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::NetlinkConnection(error) => Some(error),
            Error::InterfaceLookup(_, error)
            | Error::AddressAdd(_, _, error)
            | Error::AddressDel(_, _, error)
            | Error::TableDump(_, error) => Some(error),
            _ => None,
        }
    }
}

// ===== helper functions =====

fn with_source<E: std::error::Error>(error: E) -> String {
    if let Some(source) = error.source() {
        format!("{} ({})", error, with_source(source))
    } else {
        error.to_string()
    }
}
