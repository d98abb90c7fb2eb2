//
// Copyright (c) The Holo Core Contributors
//
// SPDX-License-Identifier: MIT
//

use std::time::Duration;

use async_trait::async_trait;
use chrono::{SecondsFormat, Utc};

use crate::collector::{TaskContext, TelemetryTask};
use crate::error::Result;
use crate::model::{Device, System};

const INTERVAL: Duration = Duration::from_secs(1);

/// Publishes the current system time once per second.
#[derive(Debug, Default)]
pub struct DateTimeTask;

#[async_trait]
impl TelemetryTask for DateTimeTask {
    fn name(&self) -> &str {
        "date-time"
    }

    async fn run(&self, ctx: &TaskContext) -> Result<()> {
        let mut interval = tokio::time::interval(INTERVAL);

        loop {
            tokio::select! {
                _ = ctx.stopped() => return Ok(()),
                _ = interval.tick() => {
                    let now =
                        Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true);
                    ctx.sink.update(&Device {
                        system: Some(System {
                            current_datetime: now,
                        }),
                        ..Default::default()
                    })?;
                }
            }
        }
    }
}

// ===== unit tests =====
