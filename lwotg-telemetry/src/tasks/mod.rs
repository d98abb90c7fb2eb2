//
// Copyright (c) The Holo Core Contributors
//
// SPDX-License-Identifier: MIT
//

//! Default telemetry tasks.

mod arp_neighbor;
mod date_time;
mod interface_state;

pub use arp_neighbor::ArpNeighborTask;
pub use date_time::DateTimeTask;
pub use interface_state::InterfaceStateTask;

// ===== unit tests =====
