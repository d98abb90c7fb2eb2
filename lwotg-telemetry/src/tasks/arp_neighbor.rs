//
// Copyright (c) The Holo Core Contributors
//
// SPDX-License-Identifier: MIT
//

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use futures::StreamExt;
use lwotg_interface::{InterfaceOps, Link, Neighbor, NeighborEvent};
use lwotg_utils::hint::{self, Hints};
use tracing::debug;

use crate::collector::{TaskContext, TelemetryTask};
use crate::error::{Error, Result};
use crate::model::{Device, Interface, Ipv4Neighbor};

/// Publishes the IPv4 neighbor table under the logical interface names
/// learned from the `interface_map` hints.
///
/// Entries on links without a mapping are skipped. Every neighbor event
/// triggers a full re-scan of the table.
pub struct ArpNeighborTask {
    ops: Arc<dyn InterfaceOps>,
    hints: Hints,
}

// ===== impl ArpNeighborTask =====

impl ArpNeighborTask {
    pub fn new(ops: Arc<dyn InterfaceOps>, hints: Hints) -> ArpNeighborTask {
        ArpNeighborTask { ops, hints }
    }

    async fn publish_all(
        &self,
        ctx: &TaskContext,
        changed: Option<Neighbor>,
    ) -> Result<()> {
        let links = self.ops.links().await?;
        let mut neighbors = self.ops.neighbors().await?;
        neighbors.extend(changed);

        let mut interfaces = BTreeMap::<String, Vec<Ipv4Neighbor>>::new();
        for nbr in neighbors {
            let Some(name) = self.logical_name(&links, &nbr) else {
                continue;
            };
            interfaces.entry(name).or_default().push(Ipv4Neighbor {
                ipv4_address: nbr.addr,
                link_layer_address: nbr.mac,
            });
        }

        ctx.sink.update(&Device {
            interfaces: interfaces
                .into_iter()
                .map(|(name, ipv4_neighbors)| Interface {
                    name,
                    ipv4_neighbors,
                })
                .collect(),
            ..Default::default()
        })
    }

    async fn publish_removal(
        &self,
        ctx: &TaskContext,
        nbr: Neighbor,
    ) -> Result<()> {
        let links = self.ops.links().await?;
        if let Some(name) = self.logical_name(&links, &nbr) {
            debug!(%name, addr = %nbr.addr, "neighbor removed");
            ctx.sink
                .delete(vec![Interface::neighbor_path(&name, nbr.addr)])?;
        }
        self.publish_all(ctx, None).await
    }

    // Event entries only carry the ifindex.
    fn logical_name(&self, links: &[Link], nbr: &Neighbor) -> Option<String> {
        let ifname = match &nbr.ifname {
            Some(ifname) => ifname.clone(),
            None => links
                .iter()
                .find(|link| link.ifindex == nbr.ifindex)
                .map(|link| link.name.clone())?,
        };
        self.hints.get(hint::INTERFACE_MAP, &ifname)
    }
}

#[async_trait]
impl TelemetryTask for ArpNeighborTask {
    fn name(&self) -> &str {
        "arp-neighbor"
    }

    async fn run(&self, ctx: &TaskContext) -> Result<()> {
        let mut events = self.ops.neighbor_events().await?;
        self.publish_all(ctx, None).await?;

        loop {
            tokio::select! {
                _ = ctx.stopped() => return Ok(()),
                event = events.next() => match event {
                    Some(NeighborEvent::New(nbr)) => {
                        self.publish_all(ctx, Some(nbr)).await?;
                    }
                    Some(NeighborEvent::Remove(nbr)) => {
                        self.publish_removal(ctx, nbr).await?;
                    }
                    None => {
                        return Err(Error::Interface(
                            lwotg_interface::Error::SubscriptionClosed,
                        ));
                    }
                },
            }
        }
    }
}

// ===== unit tests =====

#[cfg(test)]
mod tests {
    use std::net::Ipv4Addr;

    use const_addrs::ip4;
    use lwotg_interface::OperState;
    use lwotg_utils::mac_addr::MacAddr;

    use super::*;
    use crate::collector::{Collector, SupervisorConfig};
    use crate::proto::Path;
    use crate::tasks::fake::{FakeOps, settle};

    fn neighbor(ifname: Option<&str>, addr: Ipv4Addr, last: u8) -> Neighbor {
        Neighbor {
            ifindex: 2,
            ifname: ifname.map(str::to_owned),
            addr,
            mac: MacAddr::from([0x02, 0, 0, 0, 0, last]),
        }
    }

    fn neighbor_paths(collector: &Collector) -> Vec<String> {
        collector
            .cache()
            .snapshot(&[Path::parse("/interfaces")])
            .into_iter()
            .map(|n| n.update[0].path.as_ref().unwrap().to_string())
            .collect()
    }

    #[tokio::test(start_paused = true)]
    async fn translates_names_through_hints() {
        let (ops, _link_tx, nbr_tx) = FakeOps::new();
        *ops.links.lock().unwrap() = vec![
            Link {
                ifindex: 2,
                name: "eth1".to_owned(),
                mac: None,
                oper_state: OperState::Up,
            },
            Link {
                ifindex: 3,
                name: "eth9".to_owned(),
                mac: None,
                oper_state: OperState::Up,
            },
        ];
        *ops.neighbors.lock().unwrap() = vec![
            neighbor(Some("eth1"), ip4!("192.0.2.2"), 1),
            neighbor(Some("eth9"), ip4!("198.51.100.2"), 2),
        ];
        let hints = Hints::default();
        hints.set(hint::INTERFACE_MAP, "eth1", "port1");

        let collector = Collector::new("ate", SupervisorConfig::default());
        let task = ArpNeighborTask::new(ops.clone(), hints.clone());
        collector.add_task(Arc::new(task)).unwrap();
        settle().await;

        // Unmapped eth9 is skipped.
        assert_eq!(
            neighbor_paths(&collector),
            vec![
                "/interfaces/interface[name=port1]/ipv4-neighbors/\
                 ipv4-neighbor[ipv4-address=192.0.2.2]/state/\
                 link-layer-address"
                    .to_owned()
            ]
        );

        // A new entry from an event, resolved through its ifindex.
        nbr_tx
            .send(NeighborEvent::New(neighbor(None, ip4!("192.0.2.3"), 3)))
            .unwrap();
        settle().await;
        assert_eq!(neighbor_paths(&collector).len(), 2);

        // Removal deletes the entry.
        ops.neighbors.lock().unwrap().remove(0);
        nbr_tx
            .send(NeighborEvent::Remove(neighbor(None, ip4!("192.0.2.2"), 1)))
            .unwrap();
        settle().await;
        let paths = neighbor_paths(&collector);
        assert_eq!(paths.len(), 1);
        assert!(paths[0].contains("192.0.2.3"));

        collector.shutdown().await;
    }
}
