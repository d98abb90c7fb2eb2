//
// Copyright (c) The Holo Core Contributors
//
// SPDX-License-Identifier: MIT
//

//! Translation of OTG ports and devices into per-interface configuration.

use std::collections::BTreeMap;

use crate::error::{Error, Result};
use crate::proto;

/// Configuration to apply to the host, keyed by OS interface name.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct LinuxIntfConfig {
    // Logical port name to OS interface name.
    pub ports: BTreeMap<String, String>,
    pub intfs: BTreeMap<String, LinuxIntf>,
}

#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct LinuxIntf {
    pub ipv4: Vec<Ipv4Entry>,
}

/// An IPv4 address as configured, not yet parsed.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Ipv4Entry {
    pub address: String,
    pub prefix: u32,
    pub gateway: String,
}

// ===== global functions =====

/// Maps ports to their OS interfaces and collects the IPv4 addresses of
/// every device Ethernet under the interface of the port it is attached to.
///
/// Every port is given an entry, even without addresses, so that its
/// interface gets validated.
pub fn ports_to_linux(config: &proto::Config) -> Result<LinuxIntfConfig> {
    let mut linux = LinuxIntfConfig::default();

    for port in &config.ports {
        let location = port
            .location
            .as_deref()
            .filter(|location| !location.is_empty())
            .ok_or_else(|| Error::MissingLocation(port.name.clone()))?;
        linux.ports.insert(port.name.clone(), location.to_owned());
        linux.intfs.entry(location.to_owned()).or_default();
    }

    for device in &config.devices {
        for ethernet in &device.ethernets {
            let port_name = ethernet
                .port_name
                .as_deref()
                .filter(|name| !name.is_empty())
                .ok_or_else(|| Error::MissingPortName(ethernet.name.clone()))?;
            let ifname = linux.ports.get(port_name).ok_or_else(|| {
                Error::UnknownPort(ethernet.name.clone(), port_name.to_owned())
            })?;

            let mut entries = vec![];
            for ipv4 in &ethernet.ipv4_addresses {
                let prefix = ipv4
                    .prefix
                    .filter(|prefix| *prefix != 0)
                    .ok_or_else(|| {
                        Error::MissingPrefix(
                            ethernet.name.clone(),
                            ipv4.address.clone(),
                        )
                    })?;
                entries.push(Ipv4Entry {
                    address: ipv4.address.clone(),
                    prefix,
                    gateway: ipv4.gateway.clone(),
                });
            }
            let ifname = ifname.clone();
            linux.intfs.entry(ifname).or_default().ipv4.extend(entries);
        }
    }

    Ok(linux)
}

// ===== unit tests =====
