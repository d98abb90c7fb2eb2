//
// Copyright (c) The Holo Core Contributors
//
// SPDX-License-Identifier: MIT
//

use std::time::{Duration, Instant};

use pcap::{Active, Capture};
use tracing::{debug, debug_span};

use crate::error::{Error, Result};
use crate::listener::{FlowListener, FlowUpdate};
use crate::packet::Packet;

// Capture parameters used for both directions.
pub const SNAPLEN: i32 = 9000;
pub const READ_TIMEOUT: Duration = Duration::from_secs(30);

// Interval between send bursts and between receive reports.
pub const REPORT_INTERVAL: Duration = Duration::from_secs(1);

// Idle wait when no frame is pending on a non-blocking handle.
const RX_IDLE: Duration = Duration::from_millis(1);

pub trait PacketWriter {
    fn write(&mut self, data: &[u8]) -> Result<()>;
}

pub trait PacketReader {
    /// Returns the next pending frame, or `None` if none is available yet.
    fn read(&mut self) -> Result<Option<Vec<u8>>>;
}

// ===== impl Capture =====

impl PacketWriter for Capture<Active> {
    fn write(&mut self, data: &[u8]) -> Result<()> {
        self.sendpacket(data).map_err(Error::Send)
    }
}

impl PacketReader for Capture<Active> {
    fn read(&mut self) -> Result<Option<Vec<u8>>> {
        match self.next_packet() {
            Ok(packet) => Ok(Some(packet.data.to_vec())),
            Err(pcap::Error::TimeoutExpired) => Ok(None),
            Err(error) => Err(Error::Receive(error)),
        }
    }
}

// ===== global functions =====

/// Opens a promiscuous, non-blocking live capture handle on `ifname`.
pub fn open_live(ifname: &str) -> Result<Capture<Active>> {
    let map_err = |error| Error::CaptureOpen(ifname.to_owned(), error);

    let capture = Capture::from_device(ifname)
        .map_err(map_err)?
        .promisc(true)
        .snaplen(SNAPLEN)
        .timeout(READ_TIMEOUT.as_millis() as i32)
        .open()
        .map_err(map_err)?
        .setnonblock()
        .map_err(map_err)?;

    Ok(capture)
}

/// Sends `pps` copies of `frame` once per [`REPORT_INTERVAL`] until the
/// listener is stopped, reporting the cumulative count after each burst.
/// A stop request interrupts the current burst, and the frames sent so far
/// are reported before returning.
pub fn tx_loop<W: PacketWriter>(
    writer: &mut W,
    frame: &[u8],
    pps: u64,
    listener: &FlowListener,
) -> Result<()> {
    let mut sent = 0;
    let mut reported = 0;

    'bursts: loop {
        let start = Instant::now();
        for _ in 0..pps {
            if listener.stopped() {
                break 'bursts;
            }
            writer.write(frame)?;
            sent += 1;
        }
        listener.update(FlowUpdate::Tx { packets: sent });
        reported = sent;

        let elapsed = start.elapsed();
        if listener.wait(REPORT_INTERVAL.saturating_sub(elapsed)) {
            break;
        }
    }

    if sent != reported {
        listener.update(FlowUpdate::Tx { packets: sent });
    }

    Ok(())
}

/// Counts received MPLS frames until the listener is stopped. Reports are
/// throttled to one per [`REPORT_INTERVAL`], with a final report on stop.
pub fn rx_loop<R: PacketReader>(
    reader: &mut R,
    listener: &FlowListener,
) -> Result<()> {
    let mut received = 0;
    let mut reported = 0;
    let mut last_report = Instant::now();

    loop {
        if listener.stopped() {
            break;
        }

        match reader.read()? {
            Some(data) => match Packet::decode(&data) {
                Ok(packet) if packet.is_mpls() => received += 1,
                Ok(_) => (),
                Err(error) => {
                    debug!(%error, "ignoring undecodable frame");
                }
            },
            None => {
                if listener.wait(RX_IDLE) {
                    break;
                }
            }
        }

        if received != reported && last_report.elapsed() >= REPORT_INTERVAL {
            listener.update(FlowUpdate::Rx { packets: received });
            reported = received;
            last_report = Instant::now();
        }
    }

    if received != reported {
        listener.update(FlowUpdate::Rx { packets: received });
    }

    Ok(())
}

/// Runs [`tx_loop`] over a live capture handle, forwarding any failure to
/// the listener.
pub(crate) fn run_tx(
    name: &str,
    ifname: &str,
    frame: &[u8],
    pps: u64,
    listener: FlowListener,
) {
    let span = debug_span!("flow", %name, direction = "tx", %ifname);
    let _span_guard = span.enter();

    debug!(%pps, "starting");
    let result = open_live(ifname)
        .and_then(|mut capture| tx_loop(&mut capture, frame, pps, &listener));
    finish(result, listener);
}

/// Runs [`rx_loop`] over a live capture handle, forwarding any failure to
/// the listener.
pub(crate) fn run_rx(name: &str, ifname: &str, listener: FlowListener) {
    let span = debug_span!("flow", %name, direction = "rx", %ifname);
    let _span_guard = span.enter();

    debug!("starting");
    let result = open_live(ifname)
        .and_then(|mut capture| rx_loop(&mut capture, &listener));
    finish(result, listener);
}

// ===== helper functions =====

fn finish(result: Result<()>, listener: FlowListener) {
    match result {
        Ok(()) => debug!("stopped"),
        Err(error) => {
            error.log();
            listener.error(error);
        }
    }
}

// ===== unit tests =====
