//
// Copyright (c) The Holo Core Contributors
//
// SPDX-License-Identifier: MIT
//

//! Packet generation and capture for emulated OTG flows.
//!
//! A [`Flow`] describes what to send; a [`FlowHandler`] checks whether it
//! can generate that flow and, if so, compiles it into a [`CompiledFlow`]
//! that knows the exact frame to put on the wire, the send rate and the
//! physical interfaces involved. Starting a compiled flow spawns one blocking
//! task per direction, each controlled through a [`FlowListener`].

pub mod error;
pub mod flow;
pub mod handler;
pub mod io;
pub mod listener;
pub mod packet;

pub use crate::error::{Error, Result};
pub use crate::flow::Flow;
pub use crate::handler::{
    CompiledFlow, FlowHandler, FlowTasks, PortMap, simple_mpls_flow_handler,
};
pub use crate::listener::{FlowControl, FlowListener, FlowUpdate};
