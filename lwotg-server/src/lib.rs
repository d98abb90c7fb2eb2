//
// Copyright (c) The Holo Core Contributors
//
// SPDX-License-Identifier: MIT
//

//! OTG configuration service and server composition.
//!
//! [`Server`] ties the pieces together: the OTG gRPC service translating
//! configuration into interface operations and compiled flows, the
//! telemetry collector with its default tasks, and the hints store shared
//! between the two.

mod apply;
mod convert;
pub mod error;
mod flows;
mod server;
mod service;
pub mod state;
#[cfg(test)]
mod testing;
pub mod translate;

pub mod proto {
    #![allow(clippy::all)]
    tonic::include_proto!("otg");
    pub use openapi_server::{Openapi, OpenapiServer};
}

pub use crate::error::{Error, Result};
pub use crate::flows::FlowStarter;
pub use crate::server::{Server, ServerConfig};
pub use crate::service::OtgService;
