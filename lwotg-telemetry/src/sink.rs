//
// Copyright (c) The Holo Core Contributors
//
// SPDX-License-Identifier: MIT
//

use std::sync::Arc;
use std::time::SystemTime;

use crate::cache::Cache;
use crate::error::Result;
use crate::model::Device;
use crate::proto::{Notification, Path};

/// Entry point for telemetry produced by tasks.
///
/// Every notification is stamped with the serving target, the
/// [`ORIGIN`](crate::ORIGIN) tag and the current time before it reaches the
/// cache.
#[derive(Clone, Debug)]
pub struct UpdateSink {
    target: String,
    cache: Arc<Cache>,
}

// ===== impl UpdateSink =====

impl UpdateSink {
    pub fn new(target: impl Into<String>, cache: Arc<Cache>) -> UpdateSink {
        UpdateSink {
            target: target.into(),
            cache,
        }
    }

    pub fn target(&self) -> &str {
        &self.target
    }

    /// Publishes every populated leaf of `device`.
    pub fn update(&self, device: &Device) -> Result<()> {
        let update = device.updates();
        if update.is_empty() {
            return Ok(());
        }

        self.cache.apply(Notification {
            timestamp: timestamp(),
            prefix: Some(self.prefix()),
            update,
            delete: vec![],
            atomic: false,
        })
    }

    /// Publishes the removal of the given subtrees.
    pub fn delete(&self, paths: Vec<Path>) -> Result<()> {
        self.cache.apply(Notification {
            timestamp: timestamp(),
            prefix: Some(self.prefix()),
            update: vec![],
            delete: paths,
            atomic: false,
        })
    }

    fn prefix(&self) -> Path {
        Path {
            origin: crate::ORIGIN.to_owned(),
            target: self.target.clone(),
            elem: vec![],
        }
    }
}

// ===== global functions =====

/// Nanoseconds since the Unix epoch.
pub fn timestamp() -> i64 {
    SystemTime::now()
        .duration_since(SystemTime::UNIX_EPOCH)
        .map(|elapsed| elapsed.as_nanos() as i64)
        .unwrap_or_default()
}

// ===== unit tests =====
