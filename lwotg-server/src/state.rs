//
// Copyright (c) The Holo Core Contributors
//
// SPDX-License-Identifier: MIT
//

//! Control state requested through the OTG service.

use crate::error::{Error, Result};
use crate::proto::{protocol_state, transmit_state};

/// Control-plane protocol state.
///
/// No control-plane protocol is emulated yet. A requested state is recorded
/// as [`ProtocolState::NotEnforced`] so that clients are told it had no
/// effect.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum ProtocolState {
    #[default]
    Idle,
    NotEnforced(Protocol),
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Protocol {
    Start,
    Stop,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Transmit {
    Start,
    Stop,
}

// ===== impl ProtocolState =====

impl ProtocolState {
    pub fn warning(&self) -> Option<String> {
        match self {
            ProtocolState::Idle => None,
            ProtocolState::NotEnforced(protocol) => Some(format!(
                "protocol state {} recorded but not enforced",
                protocol.as_str()
            )),
        }
    }
}

// ===== impl Protocol =====

impl Protocol {
    pub fn from_proto(state: i32) -> Result<Protocol> {
        match protocol_state::State::try_from(state) {
            Ok(protocol_state::State::Start) => Ok(Protocol::Start),
            Ok(protocol_state::State::Stop) => Ok(Protocol::Stop),
            Ok(protocol_state::State::Unspecified) | Err(_) => {
                Err(Error::InvalidState("protocol"))
            }
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Protocol::Start => "start",
            Protocol::Stop => "stop",
        }
    }
}

// ===== impl Transmit =====

impl Transmit {
    pub fn from_proto(state: i32) -> Result<Transmit> {
        match transmit_state::State::try_from(state) {
            Ok(transmit_state::State::Start) => Ok(Transmit::Start),
            Ok(transmit_state::State::Stop) => Ok(Transmit::Stop),
            Ok(transmit_state::State::Pause) => {
                Err(Error::UnsupportedState("pause"))
            }
            Ok(transmit_state::State::Unspecified) | Err(_) => {
                Err(Error::InvalidState("transmit"))
            }
        }
    }
}

// ===== unit tests =====
