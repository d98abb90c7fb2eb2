//
// Copyright (c) The Holo Core Contributors
//
// SPDX-License-Identifier: MIT
//

use std::sync::Arc;

use async_trait::async_trait;
use futures::StreamExt;
use lwotg_interface::{InterfaceOps, Link, LinkEvent};
use tracing::debug;

use crate::collector::{TaskContext, TelemetryTask};
use crate::error::{Error, Result};
use crate::model::{Device, Port};

/// Publishes the operational state of every OS link, keyed by link name.
pub struct InterfaceStateTask {
    ops: Arc<dyn InterfaceOps>,
}

// ===== impl InterfaceStateTask =====

impl InterfaceStateTask {
    pub fn new(ops: Arc<dyn InterfaceOps>) -> InterfaceStateTask {
        InterfaceStateTask { ops }
    }
}

#[async_trait]
impl TelemetryTask for InterfaceStateTask {
    fn name(&self) -> &str {
        "interface-state"
    }

    async fn run(&self, ctx: &TaskContext) -> Result<()> {
        // Subscribe before the dump so no change falls in between.
        let mut events = self.ops.link_events().await?;

        let links = self.ops.links().await?;
        ctx.sink.update(&Device {
            ports: links.into_iter().map(port).collect(),
            ..Default::default()
        })?;

        loop {
            tokio::select! {
                _ = ctx.stopped() => return Ok(()),
                event = events.next() => match event {
                    Some(LinkEvent::Update(link)) => {
                        ctx.sink.update(&Device {
                            ports: vec![port(link)],
                            ..Default::default()
                        })?;
                    }
                    Some(LinkEvent::Remove(link)) => {
                        debug!(name = %link.name, "link removed");
                        ctx.sink.delete(vec![Port::path(&link.name)])?;
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

// ===== helper functions =====

fn port(link: Link) -> Port {
    Port {
        name: link.name,
        link: link.oper_state.into(),
    }
}

// ===== unit tests =====
