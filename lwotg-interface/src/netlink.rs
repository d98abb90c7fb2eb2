//
// Copyright (c) The Holo Core Contributors
//
// SPDX-License-Identifier: MIT
//

use std::collections::HashMap;
use std::net::IpAddr;
use std::pin::Pin;
use std::task::{Context, Poll, ready};

use async_trait::async_trait;
use futures::channel::mpsc::UnboundedReceiver;
use futures::{Stream, StreamExt, TryStreamExt};
use ipnetwork::Ipv4Network;
use lwotg_utils::mac_addr::MacAddr;
use lwotg_utils::task::Task;
use netlink_packet_core::{NetlinkMessage, NetlinkPayload};
use netlink_packet_route::RouteNetlinkMessage;
use netlink_packet_route::link::{LinkAttribute, LinkMessage, State};
use netlink_packet_route::neighbour::{
    NeighbourAddress, NeighbourAttribute, NeighbourMessage, NeighbourState,
};
use netlink_sys::{AsyncSocket, SocketAddr};
use rtnetlink::{Handle, new_connection};
use tracing::{debug, trace};

use crate::error::{Error, Result};
use crate::{
    EventStream, InterfaceOps, Link, LinkEvent, Neighbor, NeighborEvent,
    OperState,
};

type NetlinkMonitor =
    UnboundedReceiver<(NetlinkMessage<RouteNetlinkMessage>, SocketAddr)>;

/// rtnetlink-backed [`InterfaceOps`].
///
/// Requests share one netlink connection; every event subscription opens its
/// own multicast socket that lives as long as the returned stream.
pub struct Netlink {
    handle: Handle,
    _conn: Task<()>,
}

// Event stream over a dedicated multicast netlink socket.
struct Subscription<E> {
    _conn: Task<()>,
    monitor: NetlinkMonitor,
    parse: fn(NetlinkMessage<RouteNetlinkMessage>) -> Option<E>,
}

// ===== impl Netlink =====

impl Netlink {
    /// Opens the request connection. Must be called from within a tokio
    /// runtime.
    pub fn new() -> Result<Netlink> {
        let (conn, handle, _) =
            new_connection().map_err(Error::NetlinkConnection)?;
        Ok(Netlink {
            handle,
            _conn: Task::spawn(conn),
        })
    }

    async fn link_by_name(&self, ifname: &str) -> Result<LinkMessage> {
        let mut links = self
            .handle
            .link()
            .get()
            .match_name(ifname.to_owned())
            .execute();
        match links.try_next().await {
            Ok(Some(msg)) => Ok(msg),
            Ok(None) => Err(Error::InterfaceNotFound(ifname.to_owned())),
            Err(error) => Err(Error::InterfaceLookup(ifname.to_owned(), error)),
        }
    }

    fn subscribe<E>(
        group: u32,
        parse: fn(NetlinkMessage<RouteNetlinkMessage>) -> Option<E>,
    ) -> Result<EventStream<E>>
    where
        E: Send + 'static,
    {
        let (mut conn, _, monitor) =
            new_connection().map_err(Error::NetlinkConnection)?;
        let addr = SocketAddr::new(0, 1 << (group - 1));
        conn.socket_mut()
            .socket_mut()
            .bind(&addr)
            .map_err(Error::NetlinkConnection)?;
        debug!(%group, "netlink subscription opened");

        Ok(Subscription {
            _conn: Task::spawn(conn),
            monitor,
            parse,
        }
        .boxed())
    }
}

#[async_trait]
impl InterfaceOps for Netlink {
    async fn valid_interface(&self, ifname: &str) -> bool {
        self.link_by_name(ifname).await.is_ok()
    }

    async fn add_ip(&self, ifname: &str, addr: Ipv4Network) -> Result<()> {
        let link = self.link_by_name(ifname).await?;
        debug!(%ifname, %addr, "adding address");
        self.handle
            .address()
            .add(link.header.index, IpAddr::V4(addr.ip()), addr.prefix())
            .execute()
            .await
            .map_err(|error| Error::AddressAdd(ifname.to_owned(), addr, error))
    }

    async fn del_ip(&self, ifname: &str, addr: Ipv4Network) -> Result<()> {
        let link = self.link_by_name(ifname).await?;
        debug!(%ifname, %addr, "removing address");
        let mut addresses = self
            .handle
            .address()
            .get()
            .set_link_index_filter(link.header.index)
            .set_address_filter(IpAddr::V4(addr.ip()))
            .set_prefix_length_filter(addr.prefix())
            .execute();
        while let Some(msg) = addresses
            .try_next()
            .await
            .map_err(|error| Error::AddressDel(ifname.to_owned(), addr, error))?
        {
            self.handle.address().del(msg).execute().await.map_err(
                |error| Error::AddressDel(ifname.to_owned(), addr, error),
            )?;
        }
        Ok(())
    }

    async fn get_mac(&self, ifname: &str) -> Result<MacAddr> {
        let msg = self.link_by_name(ifname).await?;
        parse_link(msg)
            .and_then(|link| link.mac)
            .ok_or_else(|| Error::MissingHwAddr(ifname.to_owned()))
    }

    async fn links(&self) -> Result<Vec<Link>> {
        let msgs: Vec<LinkMessage> = self
            .handle
            .link()
            .get()
            .execute()
            .try_collect()
            .await
            .map_err(|error| Error::TableDump("link", error))?;
        Ok(msgs.into_iter().filter_map(parse_link).collect())
    }

    async fn neighbors(&self) -> Result<Vec<Neighbor>> {
        let names = self
            .links()
            .await?
            .into_iter()
            .map(|link| (link.ifindex, link.name))
            .collect::<HashMap<_, _>>();
        let msgs: Vec<NeighbourMessage> = self
            .handle
            .neighbours()
            .get()
            .execute()
            .try_collect()
            .await
            .map_err(|error| Error::TableDump("neighbor", error))?;
        Ok(msgs
            .into_iter()
            .filter_map(|msg| parse_neighbor(msg, true))
            .map(|mut nbr| {
                nbr.ifname = names.get(&nbr.ifindex).cloned();
                nbr
            })
            .collect())
    }

    async fn link_events(&self) -> Result<EventStream<LinkEvent>> {
        Netlink::subscribe(libc::RTNLGRP_LINK, parse_link_event)
    }

    async fn neighbor_events(&self) -> Result<EventStream<NeighborEvent>> {
        Netlink::subscribe(libc::RTNLGRP_NEIGH, parse_neighbor_event)
    }
}

// ===== impl Subscription =====

impl<E> Stream for Subscription<E> {
    type Item = E;

    fn poll_next(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Option<E>> {
        loop {
            match ready!(self.monitor.poll_next_unpin(cx)) {
                Some((msg, _)) => {
                    trace!(?msg, "received netlink message");
                    if let Some(event) = (self.parse)(msg) {
                        return Poll::Ready(Some(event));
                    }
                }
                None => return Poll::Ready(None),
            }
        }
    }
}

// ===== helper functions =====

fn oper_state(state: State) -> OperState {
    match state {
        State::Up => OperState::Up,
        State::Down | State::LowerLayerDown | State::NotPresent => {
            OperState::Down
        }
        _ => OperState::Unknown,
    }
}

fn parse_link(msg: LinkMessage) -> Option<Link> {
    let ifindex = msg.header.index;
    let mut name = None;
    let mut mac = None;
    let mut state = OperState::Unknown;
    for attr in msg.attributes {
        match attr {
            LinkAttribute::IfName(attr) => name = Some(attr),
            LinkAttribute::Address(attr) => {
                mac = MacAddr::try_from(attr.as_slice()).ok()
            }
            LinkAttribute::OperState(attr) => state = oper_state(attr),
            _ => (),
        }
    }

    Some(Link {
        ifindex,
        name: name?,
        mac,
        oper_state: state,
    })
}

// Incomplete and failed entries carry no usable hardware address and are
// skipped when only resolved entries are wanted.
fn parse_neighbor(msg: NeighbourMessage, resolved: bool) -> Option<Neighbor> {
    if resolved
        && matches!(
            msg.header.state,
            NeighbourState::Incomplete | NeighbourState::Failed
        )
    {
        return None;
    }

    let ifindex = msg.header.ifindex;
    let mut addr = None;
    let mut mac = None;
    for attr in msg.attributes {
        match attr {
            NeighbourAttribute::Destination(NeighbourAddress::Inet(attr)) => {
                addr = Some(attr)
            }
            NeighbourAttribute::LinkLocalAddress(attr) => {
                mac = MacAddr::try_from(attr.as_slice()).ok()
            }
            _ => (),
        }
    }
    let mac = match mac {
        Some(mac) => mac,
        None if !resolved => MacAddr::default(),
        None => return None,
    };

    Some(Neighbor {
        ifindex,
        ifname: None,
        addr: addr?,
        mac,
    })
}

fn parse_link_event(
    msg: NetlinkMessage<RouteNetlinkMessage>,
) -> Option<LinkEvent> {
    let NetlinkPayload::InnerMessage(msg) = msg.payload else {
        return None;
    };
    match msg {
        RouteNetlinkMessage::NewLink(msg)
        | RouteNetlinkMessage::SetLink(msg) => {
            parse_link(msg).map(LinkEvent::Update)
        }
        RouteNetlinkMessage::DelLink(msg) => {
            parse_link(msg).map(LinkEvent::Remove)
        }
        _ => None,
    }
}

fn parse_neighbor_event(
    msg: NetlinkMessage<RouteNetlinkMessage>,
) -> Option<NeighborEvent> {
    let NetlinkPayload::InnerMessage(msg) = msg.payload else {
        return None;
    };
    match msg {
        RouteNetlinkMessage::NewNeighbour(msg) => {
            parse_neighbor(msg, true).map(NeighborEvent::New)
        }
        RouteNetlinkMessage::DelNeighbour(msg) => {
            parse_neighbor(msg, false).map(NeighborEvent::Remove)
        }
        _ => None,
    }
}

// ===== unit tests =====
