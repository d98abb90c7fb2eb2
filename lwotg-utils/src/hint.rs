//
// Copyright (c) The Holo Core Contributors
//
// SPDX-License-Identifier: MIT
//

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use derive_new::new;
use tokio::sync::mpsc;
use tracing::trace;

use crate::task::Task;
use crate::{UnboundedReceiver, UnboundedSender};

/// Hint group mapping OS interface names to logical OTG port names.
pub const INTERFACE_MAP: &str = "interface_map";
/// Hint group mapping IPv4 gateway addresses to their resolved MAC address.
pub const GATEWAY_MAC: &str = "gateway_mac";

pub type HintSender = UnboundedSender<Hint>;
pub type HintReceiver = UnboundedReceiver<Hint>;

/// A single out-of-band fact.
#[derive(Clone, Debug, Eq, new, PartialEq)]
pub struct Hint {
    pub group: String,
    pub key: String,
    pub value: String,
}

/// Thread-safe store of hints, shared by reference between the components
/// that produce them and the ones that consume them.
///
/// Writes are last-write-wins per `(group, key)`.
#[derive(Clone, Debug, Default)]
pub struct Hints {
    inner: Arc<Mutex<HashMap<String, HashMap<String, String>>>>,
}

// ===== impl Hints =====

impl Hints {
    pub fn set(&self, group: &str, key: &str, value: &str) {
        trace!(%group, %key, %value, "setting hint");
        let mut inner = self.inner.lock().unwrap();
        inner
            .entry(group.to_owned())
            .or_default()
            .insert(key.to_owned(), value.to_owned());
    }

    pub fn get(&self, group: &str, key: &str) -> Option<String> {
        let inner = self.inner.lock().unwrap();
        inner.get(group).and_then(|hints| hints.get(key)).cloned()
    }

    /// Creates a channel through which other components can push hints
    /// without holding a reference to the store.
    ///
    /// The returned task applies incoming hints until every sender is
    /// dropped.
    pub fn channel(&self) -> (HintSender, Task<()>) {
        let (hint_tx, hint_rx) = mpsc::unbounded_channel();
        let task = self.spawn_receiver(hint_rx);
        (hint_tx, task)
    }

    fn spawn_receiver(&self, mut hint_rx: HintReceiver) -> Task<()> {
        let hints = self.clone();
        Task::spawn(async move {
            while let Some(hint) = hint_rx.recv().await {
                hints.set(&hint.group, &hint.key, &hint.value);
            }
        })
    }
}

// ===== unit tests =====
