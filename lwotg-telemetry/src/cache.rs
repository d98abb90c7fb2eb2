//
// Copyright (c) The Holo Core Contributors
//
// SPDX-License-Identifier: MIT
//

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use tokio::sync::broadcast;

use crate::error::{Error, Result};
use crate::proto::{Notification, Path, Update};

// Live notifications buffered per subscriber before it starts lagging.
const CHANNEL_CAPACITY: usize = 1024;

/// Latest value of every telemetry leaf, plus a fan-out channel carrying
/// each notification as it is applied.
#[derive(Debug)]
pub struct Cache {
    leaves: Mutex<BTreeMap<String, Leaf>>,
    updates: broadcast::Sender<Arc<Notification>>,
    closed: AtomicBool,
}

#[derive(Clone, Debug)]
struct Leaf {
    timestamp: i64,
    prefix: Option<Path>,
    update: Update,
}

// ===== impl Cache =====

impl Cache {
    pub fn new() -> Cache {
        let (updates, _) = broadcast::channel(CHANNEL_CAPACITY);
        Cache {
            leaves: Default::default(),
            updates,
            closed: AtomicBool::new(false),
        }
    }

    /// Records a notification and forwards it to live subscribers.
    ///
    /// Deletes are applied before updates. A deleted path removes every leaf
    /// underneath it.
    pub fn apply(&self, notification: Notification) -> Result<()> {
        if self.closed.load(Ordering::Relaxed) {
            return Err(Error::SinkClosed);
        }

        {
            let mut leaves = self.leaves.lock().unwrap();
            for deleted in &notification.delete {
                leaves.retain(|_, leaf| {
                    !leaf
                        .update
                        .path
                        .as_ref()
                        .is_some_and(|path| deleted.covers(path))
                });
            }
            for update in &notification.update {
                let Some(path) = &update.path else {
                    continue;
                };
                let leaf = Leaf {
                    timestamp: notification.timestamp,
                    prefix: notification.prefix.clone(),
                    update: update.clone(),
                };
                leaves.insert(path.to_string(), leaf);
            }
        }

        // Sending only fails when nobody is subscribed.
        let _ = self.updates.send(Arc::new(notification));

        Ok(())
    }

    /// Returns one notification per cached leaf under any of `paths`, or
    /// every cached leaf when `paths` is empty.
    pub fn snapshot(&self, paths: &[Path]) -> Vec<Notification> {
        let leaves = self.leaves.lock().unwrap();
        leaves
            .values()
            .filter(|leaf| {
                paths.is_empty()
                    || leaf.update.path.as_ref().is_some_and(|leaf_path| {
                        paths.iter().any(|path| path.covers(leaf_path))
                    })
            })
            .map(|leaf| Notification {
                timestamp: leaf.timestamp,
                prefix: leaf.prefix.clone(),
                update: vec![leaf.update.clone()],
                delete: vec![],
                atomic: false,
            })
            .collect()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Arc<Notification>> {
        self.updates.subscribe()
    }

    /// Rejects all further notifications.
    pub fn close(&self) {
        self.closed.store(true, Ordering::Relaxed);
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Relaxed)
    }
}

impl Default for Cache {
    fn default() -> Cache {
        Cache::new()
    }
}

// ===== global functions =====

/// Restricts a notification to the parts relevant to `paths`. Returns `None`
/// when nothing is left.
pub fn filter_notification(
    notification: &Notification,
    paths: &[Path],
) -> Option<Notification> {
    if paths.is_empty() {
        return Some(notification.clone());
    }

    let update = notification
        .update
        .iter()
        .filter(|update| {
            update.path.as_ref().is_some_and(|update_path| {
                paths.iter().any(|path| path.covers(update_path))
            })
        })
        .cloned()
        .collect::<Vec<_>>();
    // A delete matters if it removes subscribed leaves or anything above
    // them.
    let delete = notification
        .delete
        .iter()
        .filter(|deleted| {
            paths
                .iter()
                .any(|path| path.covers(deleted) || deleted.covers(path))
        })
        .cloned()
        .collect::<Vec<_>>();

    if update.is_empty() && delete.is_empty() {
        return None;
    }

    Some(Notification {
        timestamp: notification.timestamp,
        prefix: notification.prefix.clone(),
        update,
        delete,
        atomic: notification.atomic,
    })
}

// ===== unit tests =====

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Device, Port, PortLink};

    fn ports(links: &[(&str, PortLink)]) -> Notification {
        let device = Device {
            ports: links
                .iter()
                .map(|(name, link)| Port {
                    name: name.to_string(),
                    link: *link,
                })
                .collect(),
            ..Default::default()
        };
        Notification {
            timestamp: 1,
            update: device.updates(),
            ..Default::default()
        }
    }

    #[test]
    fn latest_value_wins() {
        let cache = Cache::new();
        cache.apply(ports(&[("eth1", PortLink::Up)])).unwrap();
        cache.apply(ports(&[("eth1", PortLink::Down)])).unwrap();

        let snapshot = cache.snapshot(&[]);
        assert_eq!(snapshot.len(), 1);
        assert_eq!(
            snapshot[0].update,
            ports(&[("eth1", PortLink::Down)]).update
        );
    }

    #[test]
    fn delete_removes_subtree() {
        let cache = Cache::new();
        cache
            .apply(ports(&[("eth1", PortLink::Up), ("eth2", PortLink::Up)]))
            .unwrap();
        cache
            .apply(Notification {
                delete: vec![Port::path("eth1")],
                ..Default::default()
            })
            .unwrap();

        let snapshot = cache.snapshot(&[Path::parse("/ports")]);
        assert_eq!(snapshot.len(), 1);
        let path = snapshot[0].update[0].path.as_ref().unwrap();
        assert_eq!(path.to_string(), "/ports/port[name=eth2]/state/link");
    }

    #[test]
    fn snapshot_filters_paths() {
        let cache = Cache::new();
        cache
            .apply(ports(&[("eth1", PortLink::Up), ("eth2", PortLink::Up)]))
            .unwrap();

        assert_eq!(cache.snapshot(&[Path::parse("/ports")]).len(), 2);
        assert_eq!(cache.snapshot(&[Port::path("eth2")]).len(), 1);
        assert!(cache.snapshot(&[Path::parse("/system")]).is_empty());
    }

    #[test]
    fn closed_cache_rejects() {
        let cache = Cache::new();
        cache.close();
        assert!(matches!(
            cache.apply(ports(&[("eth1", PortLink::Up)])),
            Err(Error::SinkClosed)
        ));
    }

    #[tokio::test]
    async fn subscribers_see_notifications() {
        let cache = Cache::new();
        let mut rx = cache.subscribe();
        cache.apply(ports(&[("eth1", PortLink::Up)])).unwrap();

        let notification = rx.recv().await.unwrap();
        assert_eq!(notification.update.len(), 1);
    }

    #[test]
    fn filter() {
        let notification =
            ports(&[("eth1", PortLink::Up), ("eth2", PortLink::Down)]);

        let filtered =
            filter_notification(&notification, &[Port::path("eth2")]).unwrap();
        assert_eq!(filtered.update.len(), 1);
        assert!(
            filter_notification(&notification, &[Path::parse("/system")])
                .is_none()
        );

        let delete = Notification {
            delete: vec![Port::path("eth1")],
            ..Default::default()
        };
        let leaf = Path::parse("/ports/port[name=eth1]/state/link");
        assert!(filter_notification(&delete, &[leaf]).is_some());
    }
}
