//
// Copyright (c) The Holo Core Contributors
//
// SPDX-License-Identifier: MIT
//

use std::time::Duration;

use crossbeam_channel::{RecvTimeoutError, TryRecvError};
use lwotg_utils::{UnboundedReceiver, UnboundedSender};
use tokio::sync::mpsc;

use crate::error::Error;

/// Progress report emitted by a running flow direction. Packet counts are
/// cumulative since the direction was started.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum FlowUpdate {
    Tx { packets: u64 },
    Rx { packets: u64 },
}

/// Runtime side of a flow direction.
///
/// Held by the blocking loop that sends or receives packets. The loop
/// polls for a stop request and reports progress and errors back to the
/// owning [`FlowControl`].
#[derive(Debug)]
pub struct FlowListener {
    stop: crossbeam_channel::Receiver<()>,
    updates: UnboundedSender<FlowUpdate>,
    errors: UnboundedSender<Error>,
}

/// Owner side of a flow direction.
#[derive(Debug)]
pub struct FlowControl {
    stop: Option<crossbeam_channel::Sender<()>>,
    pub updates: UnboundedReceiver<FlowUpdate>,
    pub errors: UnboundedReceiver<Error>,
}

// ===== impl FlowListener =====

impl FlowListener {
    /// Returns whether the owner asked the flow to stop, or went away.
    pub fn stopped(&self) -> bool {
        !matches!(self.stop.try_recv(), Err(TryRecvError::Empty))
    }

    /// Blocks for up to `timeout`, returning early with `true` if the flow
    /// is stopped in the meantime.
    pub fn wait(&self, timeout: Duration) -> bool {
        !matches!(
            self.stop.recv_timeout(timeout),
            Err(RecvTimeoutError::Timeout)
        )
    }

    pub fn update(&self, update: FlowUpdate) {
        let _ = self.updates.send(update);
    }

    pub fn error(&self, error: Error) {
        let _ = self.errors.send(error);
    }
}

// ===== impl FlowControl =====

impl FlowControl {
    /// Asks the flow direction to stop. Idempotent.
    pub fn stop(&mut self) {
        if let Some(stop) = self.stop.take() {
            let _ = stop.send(());
        }
    }

    pub fn is_stopped(&self) -> bool {
        self.stop.is_none()
    }
}

impl Drop for FlowControl {
    fn drop(&mut self) {
        self.stop();
    }
}

// ===== global functions =====

/// Creates a connected listener/control pair.
pub fn channel() -> (FlowListener, FlowControl) {
    let (stop_tx, stop_rx) = crossbeam_channel::bounded(1);
    let (updates_tx, updates_rx) = mpsc::unbounded_channel();
    let (errors_tx, errors_rx) = mpsc::unbounded_channel();

    let listener = FlowListener {
        stop: stop_rx,
        updates: updates_tx,
        errors: errors_tx,
    };
    let control = FlowControl {
        stop: Some(stop_tx),
        updates: updates_rx,
        errors: errors_rx,
    };

    (listener, control)
}

// ===== unit tests =====
