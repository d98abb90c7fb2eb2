//
// Copyright (c) The Holo Core Contributors
//
// SPDX-License-Identifier: MIT
//

use std::net::Ipv4Addr;
use std::time::Duration;

use futures::StreamExt;
use lwotg_utils::mac_addr::MacAddr;
use tracing::debug;

use crate::error::{Error, Result};
use crate::{InterfaceOps, NeighborEvent};

// ===== helper functions =====

async fn lookup<I>(ops: &I, addr: Ipv4Addr) -> Result<Option<MacAddr>>
where
    I: InterfaceOps + ?Sized,
{
    let neighbors = ops.neighbors().await?;
    Ok(neighbors
        .into_iter()
        .find(|nbr| nbr.addr == addr)
        .map(|nbr| nbr.mac))
}

async fn resolve<I>(ops: &I, addr: Ipv4Addr) -> Result<MacAddr>
where
    I: InterfaceOps + ?Sized,
{
    if let Some(mac) = lookup(ops, addr).await? {
        return Ok(mac);
    }

    // Not resolved yet: wait for the kernel to announce the entry. The table
    // is scanned again once subscribed, so an entry resolved in between is
    // not missed.
    debug!(%addr, "waiting for ARP resolution");
    let mut events = ops.neighbor_events().await?;
    if let Some(mac) = lookup(ops, addr).await? {
        return Ok(mac);
    }
    while let Some(event) = events.next().await {
        match event {
            NeighborEvent::New(nbr) if nbr.addr == addr => return Ok(nbr.mac),
            _ => (),
        }
    }

    Err(Error::SubscriptionClosed)
}

// ===== global functions =====

/// Waits until the kernel has resolved the hardware address of `addr`.
///
/// Returns right away when the neighbor table already holds a resolved entry;
/// only otherwise is a netlink subscription opened. Fails with
/// [`Error::ArpTimeout`] once `timeout` elapses.
pub async fn await_arp<I>(
    ops: &I,
    addr: Ipv4Addr,
    timeout: Duration,
) -> Result<MacAddr>
where
    I: InterfaceOps + ?Sized,
{
    tokio::time::timeout(timeout, resolve(ops, addr))
        .await
        .map_err(|_| Error::ArpTimeout(addr))?
}

// ===== unit tests =====

#[cfg(test)]
mod tests {
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;
    use const_addrs::ip4;
    use futures::channel::mpsc;
    use ipnetwork::Ipv4Network;

    use super::*;
    use crate::{EventStream, Link, LinkEvent, Neighbor};

    const MAC: [u8; 6] = [0x02, 0x00, 0x00, 0x00, 0x00, 0x02];

    #[derive(Default)]
    struct FakeOps {
        // Successive neighbor table dumps; the last one repeats.
        dumps: Mutex<Vec<Vec<Neighbor>>>,
        dump_count: AtomicUsize,
        subscriptions: AtomicUsize,
        events: Mutex<Option<mpsc::UnboundedReceiver<NeighborEvent>>>,
    }

    fn neighbor(addr: Ipv4Addr) -> Neighbor {
        Neighbor {
            ifindex: 2,
            ifname: Some("eth0".to_owned()),
            addr,
            mac: MacAddr::from(MAC),
        }
    }

    #[async_trait]
    impl InterfaceOps for FakeOps {
        async fn valid_interface(&self, _ifname: &str) -> bool {
            true
        }

        async fn add_ip(&self, _: &str, _: Ipv4Network) -> Result<()> {
            Ok(())
        }

        async fn del_ip(&self, _: &str, _: Ipv4Network) -> Result<()> {
            Ok(())
        }

        async fn get_mac(&self, _ifname: &str) -> Result<MacAddr> {
            Ok(MacAddr::from(MAC))
        }

        async fn links(&self) -> Result<Vec<Link>> {
            Ok(vec![])
        }

        async fn neighbors(&self) -> Result<Vec<Neighbor>> {
            let n = self.dump_count.fetch_add(1, Ordering::SeqCst);
            let dumps = self.dumps.lock().unwrap();
            Ok(dumps
                .get(n)
                .or_else(|| dumps.last())
                .cloned()
                .unwrap_or_default())
        }

        async fn link_events(&self) -> Result<EventStream<LinkEvent>> {
            Ok(futures::stream::pending().boxed())
        }

        async fn neighbor_events(
            &self,
        ) -> Result<EventStream<NeighborEvent>> {
            self.subscriptions.fetch_add(1, Ordering::SeqCst);
            match self.events.lock().unwrap().take() {
                Some(events) => Ok(events.boxed()),
                None => Ok(futures::stream::pending().boxed()),
            }
        }
    }

    #[tokio::test]
    async fn already_resolved() {
        let ops = FakeOps::default();
        *ops.dumps.lock().unwrap() = vec![vec![neighbor(ip4!("192.0.2.2"))]];

        let mac = await_arp(&ops, ip4!("192.0.2.2"), Duration::from_secs(5))
            .await
            .unwrap();
        assert_eq!(mac, MacAddr::from(MAC));
        assert_eq!(ops.subscriptions.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn resolved_by_event() {
        let (events_tx, events_rx) = mpsc::unbounded();
        let ops = FakeOps::default();
        *ops.events.lock().unwrap() = Some(events_rx);
        events_tx
            .unbounded_send(NeighborEvent::New(neighbor(ip4!("192.0.2.9"))))
            .unwrap();
        events_tx
            .unbounded_send(NeighborEvent::New(neighbor(ip4!("192.0.2.2"))))
            .unwrap();

        let mac = await_arp(&ops, ip4!("192.0.2.2"), Duration::from_secs(5))
            .await
            .unwrap();
        assert_eq!(mac, MacAddr::from(MAC));
        assert_eq!(ops.subscriptions.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn resolved_while_subscribing() {
        let ops = FakeOps::default();
        *ops.dumps.lock().unwrap() =
            vec![vec![], vec![neighbor(ip4!("192.0.2.2"))]];

        let mac = await_arp(&ops, ip4!("192.0.2.2"), Duration::from_secs(5))
            .await
            .unwrap();
        assert_eq!(mac, MacAddr::from(MAC));
        assert_eq!(ops.subscriptions.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn timeout() {
        let ops = FakeOps::default();
        let result =
            await_arp(&ops, ip4!("192.0.2.2"), Duration::from_secs(2)).await;
        assert!(matches!(
            result,
            Err(Error::ArpTimeout(addr)) if addr == ip4!("192.0.2.2")
        ));
    }

    #[tokio::test]
    async fn subscription_closed() {
        let (events_tx, events_rx) = mpsc::unbounded();
        let ops = FakeOps::default();
        *ops.events.lock().unwrap() = Some(events_rx);
        drop(events_tx);

        let result =
            await_arp(&ops, ip4!("192.0.2.2"), Duration::from_secs(5)).await;
        assert!(matches!(result, Err(Error::SubscriptionClosed)));
    }
}
