//
// Copyright (c) The Holo Core Contributors
//
// SPDX-License-Identifier: MIT
//

use tonic::Status;
use tracing::warn;

pub type Result<T> = std::result::Result<T, Error>;

// OTG service errors.
#[derive(Debug)]
pub enum Error {
    // Request validation.
    MissingConfig,
    UnsupportedConfig(&'static str),
    MissingLocation(String),
    MissingPortName(String),
    UnknownPort(String, String),
    MissingPrefix(String, String),
    InvalidAddress(String, ipnetwork::IpNetworkError),
    InvalidFlow(String, &'static str),
    InvalidMac(String, String),
    Flow(String, lwotg_flows::Error),
    NoFlowHandler(String),
    UnknownFlow(String),
    InvalidState(&'static str),
    UnsupportedState(&'static str),

    // Environment.
    InvalidInterface(String),
    Interface(lwotg_interface::Error),
    Telemetry(lwotg_telemetry::Error),
}

// ===== impl Error =====

impl Error {
    pub fn log(&self) {
        match self {
            Error::Interface(error) => {
                error.log();
            }
            Error::Telemetry(error) => {
                error.log();
            }
            Error::Flow(name, error) => {
                warn!(%name, %error, "{}", self);
            }
            Error::InvalidAddress(_, error) => {
                warn!(%error, "{}", self);
            }
            _ => {
                warn!("{}", self);
            }
        }
    }
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::MissingConfig => {
                write!(f, "missing configuration")
            }
            Error::UnsupportedConfig(what) => {
                write!(f, "{what} are not supported")
            }
            Error::MissingLocation(port) => {
                write!(f, "port {port} has no location")
            }
            Error::MissingPortName(ethernet) => {
                write!(f, "ethernet {ethernet} has no port name")
            }
            Error::UnknownPort(ethernet, port) => {
                write!(f, "ethernet {ethernet} refers to unknown port {port}")
            }
            Error::MissingPrefix(ethernet, address) => {
                write!(
                    f,
                    "address {address} on ethernet {ethernet} has no prefix \
                     length"
                )
            }
            Error::InvalidAddress(address, ..) => {
                write!(f, "invalid address {address}")
            }
            Error::InvalidFlow(name, reason) => {
                write!(f, "invalid flow {name}: {reason}")
            }
            Error::InvalidMac(name, mac) => {
                write!(f, "invalid MAC address {mac} in flow {name}")
            }
            Error::Flow(name, error) => {
                write!(f, "flow {name}: {error}")
            }
            Error::NoFlowHandler(name) => {
                write!(f, "no handler supports flow {name}")
            }
            Error::UnknownFlow(name) => {
                write!(f, "unknown flow {name}")
            }
            Error::InvalidState(what) => {
                write!(f, "invalid {what} state")
            }
            Error::UnsupportedState(state) => {
                write!(f, "unsupported state: {state}")
            }
            Error::InvalidInterface(ifname) => {
                write!(f, "interface {ifname} does not exist")
            }
            Error::Interface(error) => error.fmt(f),
            Error::Telemetry(error) => error.fmt(f),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::InvalidAddress(_, error) => Some(error),
            Error::Flow(_, error) => Some(error),
            Error::Interface(error) => error.source(),
            Error::Telemetry(error) => error.source(),
            _ => None,
        }
    }
}

impl From<lwotg_interface::Error> for Error {
    fn from(error: lwotg_interface::Error) -> Error {
        Error::Interface(error)
    }
}

impl From<lwotg_telemetry::Error> for Error {
    fn from(error: lwotg_telemetry::Error) -> Error {
        Error::Telemetry(error)
    }
}

impl From<Error> for Status {
    fn from(error: Error) -> Status {
        match &error {
            Error::UnsupportedConfig(..)
            | Error::NoFlowHandler(..)
            | Error::UnsupportedState(..) => {
                Status::unimplemented(error.to_string())
            }
            Error::Flow(_, flow_error) if flow_error.is_unsupported() => {
                Status::unimplemented(error.to_string())
            }
            Error::MissingConfig
            | Error::MissingLocation(..)
            | Error::MissingPortName(..)
            | Error::UnknownPort(..)
            | Error::MissingPrefix(..)
            | Error::InvalidAddress(..)
            | Error::InvalidFlow(..)
            | Error::InvalidMac(..)
            | Error::Flow(..)
            | Error::UnknownFlow(..)
            | Error::InvalidState(..) => {
                Status::invalid_argument(error.to_string())
            }
            Error::InvalidInterface(..)
            | Error::Interface(..)
            | Error::Telemetry(..) => Status::internal(error.to_string()),
        }
    }
}

// ===== unit tests =====

#[cfg(test)]
mod tests {
    use tonic::Code;

    use super::*;

    #[test]
    fn status_codes() {
        let code = |error: Error| Status::from(error).code();

        assert_eq!(code(Error::UnsupportedConfig("lags")), Code::Unimplemented);
        assert_eq!(
            code(Error::MissingLocation("port1".to_owned())),
            Code::InvalidArgument
        );
        assert_eq!(
            code(Error::InvalidInterface("eth0".to_owned())),
            Code::Internal
        );
        assert_eq!(
            code(Error::Flow(
                "f1".to_owned(),
                lwotg_flows::Error::UnsupportedRate("bps")
            )),
            Code::Unimplemented
        );
        assert_eq!(
            code(Error::Flow(
                "f1".to_owned(),
                lwotg_flows::Error::MultipleEthernet
            )),
            Code::InvalidArgument
        );
    }
}
