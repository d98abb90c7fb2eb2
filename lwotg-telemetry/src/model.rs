//
// Copyright (c) The Holo Core Contributors
//
// SPDX-License-Identifier: MIT
//

//! Typed view of the emulated device state.
//!
//! Tasks fill in only the parts of the tree they observe. Conversion to gNMI
//! updates emits one update per populated leaf.

use std::net::Ipv4Addr;

use lwotg_interface::OperState;
use lwotg_utils::mac_addr::MacAddr;

use crate::proto::{Path, PathElem, TypedValue, Update, typed_value};

#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct Device {
    pub ports: Vec<Port>,
    pub interfaces: Vec<Interface>,
    pub system: Option<System>,
    pub flows: Vec<Flow>,
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Port {
    pub name: String,
    pub link: PortLink,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum PortLink {
    Unset,
    Up,
    Down,
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Interface {
    pub name: String,
    pub ipv4_neighbors: Vec<Ipv4Neighbor>,
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Ipv4Neighbor {
    pub ipv4_address: Ipv4Addr,
    pub link_layer_address: MacAddr,
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct System {
    pub current_datetime: String,
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Flow {
    pub name: String,
    pub out_pkts: Option<u64>,
    pub in_pkts: Option<u64>,
}

// ===== impl Device =====

impl Device {
    pub fn updates(&self) -> Vec<Update> {
        let mut updates = vec![];

        for port in &self.ports {
            if let Some(link) = port.link.as_str() {
                let path =
                    Port::path(&port.name).join(&leaf_path("state/link"));
                updates.push(update(path, string_val(link)));
            }
        }
        for iface in &self.interfaces {
            for nbr in &iface.ipv4_neighbors {
                let path =
                    Interface::neighbor_path(&iface.name, nbr.ipv4_address)
                        .join(&leaf_path("state/link-layer-address"));
                let mac = nbr.link_layer_address.to_string();
                updates.push(update(path, string_val(&mac)));
            }
        }
        if let Some(system) = &self.system {
            let path = leaf_path("system/state/current-datetime");
            updates.push(update(path, string_val(&system.current_datetime)));
        }
        for flow in &self.flows {
            let counters =
                [("out-pkts", flow.out_pkts), ("in-pkts", flow.in_pkts)];
            for (leaf, value) in counters {
                let Some(value) = value else {
                    continue;
                };
                let path = Flow::path(&flow.name)
                    .join(&leaf_path("state/counters"))
                    .join(&leaf_path(leaf));
                updates.push(update(path, uint_val(value)));
            }
        }

        updates
    }
}

// ===== impl Port =====

impl Port {
    pub fn path(name: &str) -> Path {
        Path {
            elem: vec![elem("ports"), keyed_elem("port", "name", name)],
            ..Default::default()
        }
    }
}

// ===== impl PortLink =====

impl PortLink {
    fn as_str(&self) -> Option<&'static str> {
        match self {
            PortLink::Unset => None,
            PortLink::Up => Some("UP"),
            PortLink::Down => Some("DOWN"),
        }
    }
}

impl From<OperState> for PortLink {
    fn from(state: OperState) -> PortLink {
        match state {
            OperState::Unknown => PortLink::Unset,
            OperState::Up => PortLink::Up,
            OperState::Down => PortLink::Down,
        }
    }
}

// ===== impl Interface =====

impl Interface {
    pub fn neighbor_path(name: &str, addr: Ipv4Addr) -> Path {
        Path {
            elem: vec![
                elem("interfaces"),
                keyed_elem("interface", "name", name),
                elem("ipv4-neighbors"),
                keyed_elem("ipv4-neighbor", "ipv4-address", &addr.to_string()),
            ],
            ..Default::default()
        }
    }
}

// ===== impl Flow =====

impl Flow {
    pub fn path(name: &str) -> Path {
        Path {
            elem: vec![elem("flows"), keyed_elem("flow", "name", name)],
            ..Default::default()
        }
    }
}

// ===== helper functions =====

fn elem(name: &str) -> PathElem {
    PathElem {
        name: name.to_owned(),
        key: Default::default(),
    }
}

fn keyed_elem(name: &str, key: &str, value: &str) -> PathElem {
    PathElem {
        name: name.to_owned(),
        key: [(key.to_owned(), value.to_owned())].into(),
    }
}

fn leaf_path(path: &str) -> Path {
    Path {
        elem: path.split('/').map(elem).collect(),
        ..Default::default()
    }
}

fn update(path: Path, val: TypedValue) -> Update {
    Update {
        path: Some(path),
        val: Some(val),
        duplicates: 0,
    }
}

fn string_val(value: &str) -> TypedValue {
    TypedValue {
        value: Some(typed_value::Value::StringVal(value.to_owned())),
    }
}

fn uint_val(value: u64) -> TypedValue {
    TypedValue {
        value: Some(typed_value::Value::UintVal(value)),
    }
}

// ===== unit tests =====
