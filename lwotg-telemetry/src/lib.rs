//
// Copyright (c) The Holo Core Contributors
//
// SPDX-License-Identifier: MIT
//

//! Telemetry task runtime.
//!
//! Telemetry is produced by supervised [`TelemetryTask`]s. Each task
//! observes some part of the system, describes what it saw as a typed
//! [`model::Device`] tree and pushes it through an [`UpdateSink`], which
//! turns it into gNMI notifications, records them in the [`Cache`] and fans
//! them out to live subscribers of the gNMI service.

pub mod cache;
pub mod collector;
pub mod error;
pub mod gnmi;
pub mod model;
pub mod path;
pub mod sink;
pub mod tasks;

pub mod proto {
    #![allow(clippy::all)]
    tonic::include_proto!("gnmi");
    pub use g_nmi_server::{GNmi, GNmiServer};
}

pub use crate::cache::Cache;
pub use crate::collector::{
    Collector, SupervisorConfig, TaskContext, TaskState, TelemetryTask,
};
pub use crate::error::{Error, Result};
pub use crate::sink::UpdateSink;

/// Origin tag of every notification.
pub const ORIGIN: &str = "openconfig";
