//
// Copyright (c) The Holo Core Contributors
//
// SPDX-License-Identifier: MIT
//

use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use futures::StreamExt;
use ipnetwork::Ipv4Network;
use lwotg_interface::{
    Error, EventStream, InterfaceOps, Link, LinkEvent, Neighbor,
    NeighborEvent, Result,
};
use lwotg_utils::mac_addr::MacAddr;

// Interface adapter that records address operations instead of performing
// them.
#[derive(Debug, Default)]
pub(crate) struct CountingOps {
    pub(crate) interfaces: Vec<String>,
    pub(crate) fail_add: Option<Ipv4Network>,
    pub(crate) neighbors: Mutex<Vec<Neighbor>>,
    pub(crate) lookups: AtomicUsize,
    pub(crate) added: Mutex<Vec<(String, Ipv4Network)>>,
    pub(crate) deleted: Mutex<Vec<(String, Ipv4Network)>>,
}

impl CountingOps {
    pub(crate) fn new(interfaces: &[&str]) -> CountingOps {
        CountingOps {
            interfaces: interfaces.iter().map(|s| s.to_string()).collect(),
            ..Default::default()
        }
    }

    pub(crate) fn lookups(&self) -> usize {
        self.lookups.load(Ordering::SeqCst)
    }

    pub(crate) fn added(&self) -> Vec<(String, Ipv4Network)> {
        self.added.lock().unwrap().clone()
    }

    pub(crate) fn deleted(&self) -> Vec<(String, Ipv4Network)> {
        self.deleted.lock().unwrap().clone()
    }
}

#[async_trait]
impl InterfaceOps for CountingOps {
    async fn valid_interface(&self, ifname: &str) -> bool {
        self.lookups.fetch_add(1, Ordering::SeqCst);
        self.interfaces.iter().any(|name| name == ifname)
    }

    async fn add_ip(&self, ifname: &str, addr: Ipv4Network) -> Result<()> {
        if self.fail_add == Some(addr) {
            return Err(Error::InterfaceNotFound(ifname.to_owned()));
        }
        self.added.lock().unwrap().push((ifname.to_owned(), addr));
        Ok(())
    }

    async fn del_ip(&self, ifname: &str, addr: Ipv4Network) -> Result<()> {
        self.deleted.lock().unwrap().push((ifname.to_owned(), addr));
        Ok(())
    }

    async fn get_mac(&self, ifname: &str) -> Result<MacAddr> {
        Err(Error::MissingHwAddr(ifname.to_owned()))
    }

    async fn links(&self) -> Result<Vec<Link>> {
        Ok(vec![])
    }

    async fn neighbors(&self) -> Result<Vec<Neighbor>> {
        Ok(self.neighbors.lock().unwrap().clone())
    }

    async fn link_events(&self) -> Result<EventStream<LinkEvent>> {
        Ok(futures::stream::pending().boxed())
    }

    async fn neighbor_events(&self) -> Result<EventStream<NeighborEvent>> {
        Ok(futures::stream::pending().boxed())
    }
}
