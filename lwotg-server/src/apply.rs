//
// Copyright (c) The Holo Core Contributors
//
// SPDX-License-Identifier: MIT
//

//! Two-phase application of interface configuration.
//!
//! [`plan`] validates everything and computes the address additions still
//! missing without touching the host. [`commit`] performs them and, should
//! one fail, removes the addresses it already added before reporting the
//! error, so that a request is applied completely or not at all.

use std::collections::{BTreeMap, BTreeSet};

use ipnetwork::Ipv4Network;
use lwotg_interface::InterfaceOps;
use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::translate::LinuxIntfConfig;

/// Addresses known to be configured, per OS interface.
pub(crate) type Applied = BTreeMap<String, BTreeSet<Ipv4Network>>;

#[derive(Debug, Default, Eq, PartialEq)]
pub(crate) struct Plan {
    pub(crate) additions: Vec<(String, Ipv4Network)>,
}

// ===== global functions =====

pub(crate) async fn plan(
    ops: &dyn InterfaceOps,
    linux: &LinuxIntfConfig,
    applied: &Applied,
) -> Result<Plan> {
    let mut plan = Plan::default();

    for (ifname, intf) in &linux.intfs {
        if !ops.valid_interface(ifname).await {
            return Err(Error::InvalidInterface(ifname.clone()));
        }

        let configured = applied.get(ifname);
        for entry in &intf.ipv4 {
            let cidr = format!("{}/{}", entry.address, entry.prefix);
            let addr = cidr
                .parse::<Ipv4Network>()
                .map_err(|error| Error::InvalidAddress(cidr.clone(), error))?;

            if configured.is_some_and(|configured| configured.contains(&addr))
            {
                debug!(%ifname, %addr, "address already configured");
                continue;
            }
            let addition = (ifname.clone(), addr);
            if !plan.additions.contains(&addition) {
                plan.additions.push(addition);
            }
        }
    }

    Ok(plan)
}

pub(crate) async fn commit(
    ops: &dyn InterfaceOps,
    plan: Plan,
    applied: &mut Applied,
) -> Result<()> {
    let mut done = vec![];

    for (ifname, addr) in plan.additions {
        debug!(%ifname, %addr, "adding address");
        if let Err(error) = ops.add_ip(&ifname, addr).await {
            rollback(ops, done).await;
            return Err(Error::Interface(error));
        }
        done.push((ifname, addr));
    }

    for (ifname, addr) in done {
        applied.entry(ifname).or_default().insert(addr);
    }

    Ok(())
}

// ===== helper functions =====

async fn rollback(ops: &dyn InterfaceOps, done: Vec<(String, Ipv4Network)>) {
    for (ifname, addr) in done.into_iter().rev() {
        warn!(%ifname, %addr, "rolling back address");
        if let Err(error) = ops.del_ip(&ifname, addr).await {
            error.log();
        }
    }
}

// ===== unit tests =====

#[cfg(test)]
mod tests {
    use const_addrs::net4;
    use maplit::{btreemap, btreeset};

    use super::*;
    use crate::testing::CountingOps;
    use crate::translate::{Ipv4Entry, LinuxIntf};

    fn entry(address: &str, prefix: u32) -> Ipv4Entry {
        Ipv4Entry {
            address: address.to_owned(),
            prefix,
            gateway: String::new(),
        }
    }

    fn linux(intfs: &[(&str, Vec<Ipv4Entry>)]) -> LinuxIntfConfig {
        LinuxIntfConfig {
            ports: Default::default(),
            intfs: intfs
                .iter()
                .map(|(ifname, ipv4)| {
                    (ifname.to_string(), LinuxIntf { ipv4: ipv4.clone() })
                })
                .collect(),
        }
    }

    #[tokio::test]
    async fn plan_skips_configured_addresses() {
        let ops = CountingOps::new(&["eth0", "eth1"]);
        let linux = linux(&[
            ("eth0", vec![entry("192.0.2.1", 24), entry("192.0.2.1", 24)]),
            ("eth1", vec![entry("198.51.100.1", 32)]),
        ]);
        let applied = btreemap! {
            "eth1".to_owned() => btreeset! { net4!("198.51.100.1/32") },
        };

        let plan = plan(&ops, &linux, &applied).await.unwrap();
        assert_eq!(
            plan.additions,
            vec![("eth0".to_owned(), net4!("192.0.2.1/24"))]
        );
        assert!(ops.added().is_empty());
    }

    #[tokio::test]
    async fn plan_rejects_invalid_input() {
        let ops = CountingOps::new(&["eth0"]);

        let unknown = linux(&[("eth9", vec![])]);
        assert!(matches!(
            plan(&ops, &unknown, &Applied::new()).await,
            Err(Error::InvalidInterface(ifname)) if ifname == "eth9"
        ));

        let malformed = linux(&[("eth0", vec![entry("192.0.2.300", 24)])]);
        assert!(matches!(
            plan(&ops, &malformed, &Applied::new()).await,
            Err(Error::InvalidAddress(..))
        ));

        let too_long = linux(&[("eth0", vec![entry("192.0.2.1", 33)])]);
        assert!(matches!(
            plan(&ops, &too_long, &Applied::new()).await,
            Err(Error::InvalidAddress(..))
        ));
    }

    #[tokio::test]
    async fn commit_records_applied() {
        let ops = CountingOps::new(&["eth0"]);
        let mut applied = Applied::new();
        let plan = Plan {
            additions: vec![("eth0".to_owned(), net4!("192.0.2.1/24"))],
        };

        commit(&ops, plan, &mut applied).await.unwrap();
        assert_eq!(ops.added().len(), 1);
        assert!(applied["eth0"].contains(&net4!("192.0.2.1/24")));
    }

    #[tokio::test]
    async fn commit_rolls_back_on_failure() {
        let mut ops = CountingOps::new(&["eth0", "eth1"]);
        ops.fail_add = Some(net4!("203.0.113.1/24"));
        let mut applied = Applied::new();
        let plan = Plan {
            additions: vec![
                ("eth0".to_owned(), net4!("192.0.2.1/24")),
                ("eth0".to_owned(), net4!("192.0.2.2/24")),
                ("eth1".to_owned(), net4!("203.0.113.1/24")),
            ],
        };

        let result = commit(&ops, plan, &mut applied).await;
        assert!(matches!(result, Err(Error::Interface(..))));
        assert_eq!(ops.added().len(), 2);
        assert_eq!(
            ops.deleted(),
            vec![
                ("eth0".to_owned(), net4!("192.0.2.2/24")),
                ("eth0".to_owned(), net4!("192.0.2.1/24")),
            ]
        );
        assert!(applied.is_empty());
    }
}
