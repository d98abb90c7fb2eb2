//
// Copyright (c) The Holo Core Contributors
//
// SPDX-License-Identifier: MIT
//

use tracing::warn;

pub type Result<T> = std::result::Result<T, Error>;

// Flow errors.
#[derive(Debug)]
pub enum Error {
    // Structural errors.
    MultipleEthernet,
    EthernetNotFirst,
    MissingField {
        header: &'static str,
        field: &'static str,
    },
    InvalidField {
        header: &'static str,
        field: &'static str,
        value: u64,
    },
    UnknownPort(String),
    MissingRxPort,

    // Valid OTG input without a generator.
    UnsupportedHeader(&'static str),
    UnsupportedField {
        header: &'static str,
        field: &'static str,
        kind: &'static str,
    },
    UnsupportedRate(&'static str),
    UnsupportedEndpoint(&'static str),

    // Runtime errors.
    CaptureOpen(String, pcap::Error),
    Send(pcap::Error),
    Receive(pcap::Error),
}

// ===== impl Error =====

impl Error {
    pub fn log(&self) {
        match self {
            Error::CaptureOpen(ifname, error) => {
                warn!(%ifname, error = %with_source(error), "{}", self);
            }
            Error::Send(error) | Error::Receive(error) => {
                warn!(error = %with_source(error), "{}", self);
            }
            _ => {
                warn!("{}", self);
            }
        }
    }

    /// Returns whether the error describes valid input this engine cannot
    /// generate, as opposed to malformed input.
    pub fn is_unsupported(&self) -> bool {
        matches!(
            self,
            Error::UnsupportedHeader(..)
                | Error::UnsupportedField { .. }
                | Error::UnsupportedRate(..)
                | Error::UnsupportedEndpoint(..)
        )
    }
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::MultipleEthernet => {
                write!(f, "flow has more than one ethernet header")
            }
            Error::EthernetNotFirst => {
                write!(f, "ethernet header must be the outermost header")
            }
            Error::MissingField { header, field } => {
                write!(f, "{header} header requires an explicit {field}")
            }
            Error::InvalidField {
                header,
                field,
                value,
            } => {
                write!(f, "invalid {header} {field}: {value}")
            }
            Error::UnknownPort(name) => {
                write!(f, "unknown port {name}")
            }
            Error::MissingRxPort => {
                write!(f, "flow has no receive port")
            }
            Error::UnsupportedHeader(kind) => {
                write!(f, "unsupported header: {kind}")
            }
            Error::UnsupportedField {
                header,
                field,
                kind,
            } => {
                write!(f, "unsupported {header} {field} pattern: {kind}")
            }
            Error::UnsupportedRate(unit) => {
                write!(f, "unsupported rate unit: {unit}")
            }
            Error::UnsupportedEndpoint(kind) => {
                write!(f, "unsupported flow endpoint: {kind}")
            }
            Error::CaptureOpen(ifname, ..) => {
                write!(f, "failed to open capture handle on {ifname}")
            }
            Error::Send(..) => {
                write!(f, "failed to send packet")
            }
            Error::Receive(..) => {
                write!(f, "failed to receive packet")
            }
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::CaptureOpen(_, error)
            | Error::Send(error)
            | Error::Receive(error) => Some(error),
            _ => None,
        }
    }
}

// ===== helper functions =====

fn with_source<E: std::error::Error>(error: E) -> String {
    if let Some(source) = error.source() {
        format!("{} ({})", error, with_source(source))
    } else {
        error.to_string()
    }
}
