//
// Copyright (c) The Holo Core Contributors
//
// SPDX-License-Identifier: MIT
//

use tracing::warn;

pub type Result<T> = std::result::Result<T, Error>;

// Telemetry errors.
#[derive(Debug)]
pub enum Error {
    SinkClosed,
    Interface(lwotg_interface::Error),
    UnknownTask(String),
    DuplicateTask(String),
}

// ===== impl Error =====

impl Error {
    pub fn log(&self) {
        match self {
            Error::Interface(error) => {
                error.log();
            }
            Error::UnknownTask(name) | Error::DuplicateTask(name) => {
                warn!(%name, "{}", self);
            }
            Error::SinkClosed => {
                warn!("{}", self);
            }
        }
    }
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::SinkClosed => {
                write!(f, "telemetry sink closed")
            }
            Error::Interface(error) => error.fmt(f),
            Error::UnknownTask(..) => {
                write!(f, "unknown telemetry task")
            }
            Error::DuplicateTask(..) => {
                write!(f, "telemetry task already running")
            }
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Interface(error) => error.source(),
            _ => None,
        }
    }
}

impl From<lwotg_interface::Error> for Error {
    fn from(error: lwotg_interface::Error) -> Error {
        Error::Interface(error)
    }
}
