//
// Copyright (c) The Holo Core Contributors
//
// SPDX-License-Identifier: MIT
//

#![allow(clippy::derivable_impls)]

use std::time::Duration;

use lwotg_server::ServerConfig;
use lwotg_telemetry::SupervisorConfig;
use serde::Deserialize;

#[derive(Debug, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub target: String,
    pub logging: Logging,
    pub otg: Otg,
    pub gnmi: Gnmi,
    pub arp: Arp,
    pub telemetry: Telemetry,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Logging {
    pub journald: LoggingJournald,
    pub file: LoggingFile,
    pub stdout: LoggingStdout,
}

#[derive(Debug, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LoggingJournald {
    pub enabled: bool,
}

#[derive(Debug, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LoggingFile {
    pub enabled: bool,
    pub dir: String,
    pub name: String,
    pub rotation: LoggingFileRotation,
    #[serde(flatten)]
    pub fmt: LoggingFmt,
}

#[derive(Debug, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LoggingStdout {
    pub enabled: bool,
    #[serde(flatten)]
    pub fmt: LoggingFmt,
}

#[derive(Debug, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LoggingFmt {
    pub style: LoggingFmtStyle,
    pub colors: bool,
    pub show_thread_id: bool,
    pub show_source: bool,
}

#[derive(Debug, Default, Deserialize, Eq, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum LoggingFileRotation {
    #[default]
    Never,
    Hourly,
    Daily,
}

#[derive(Debug, Deserialize, Eq, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum LoggingFmtStyle {
    Compact,
    Full,
    Json,
    Pretty,
}

#[derive(Debug, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Otg {
    pub enabled: bool,
    pub address: String,
    pub tls: Tls,
}

#[derive(Debug, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Gnmi {
    pub enabled: bool,
    pub address: String,
    pub tls: Tls,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Tls {
    pub enabled: bool,
    pub certificate: String,
    pub key: String,
}

#[derive(Debug, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Arp {
    // Seconds to wait for a configured gateway to resolve.
    pub gateway_timeout: u64,
}

#[derive(Debug, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Telemetry {
    pub restart_failed_tasks: bool,
    pub max_restarts: u32,
}

// ===== impl Config =====

impl Config {
    const DFLT_FILEPATH: &'static str = "/etc/lwotgd.toml";

    pub(crate) fn load(config_file: Option<&str>) -> Config {
        let config_file = config_file.unwrap_or(Config::DFLT_FILEPATH);

        match std::fs::read_to_string(config_file) {
            Ok(config_str) => match toml::from_str(&config_str) {
                Ok(config) => config,
                Err(err) => {
                    eprintln!("Failed to parse configuration file: {err}");
                    std::process::exit(1);
                }
            },
            Err(err) => {
                eprintln!("Failed to load configuration file: {err}");
                eprintln!("Falling back to default configuration...");
                Config::default()
            }
        }
    }

    pub(crate) fn server(&self) -> ServerConfig {
        ServerConfig {
            target: self.target.clone(),
            gateway_timeout: Duration::from_secs(self.arp.gateway_timeout),
            supervisor: SupervisorConfig {
                restart_failed_tasks: self.telemetry.restart_failed_tasks,
                max_restarts: self.telemetry.max_restarts,
            },
        }
    }
}

impl Default for Config {
    fn default() -> Config {
        Config {
            target: "ate".to_owned(),
            logging: Default::default(),
            otg: Default::default(),
            gnmi: Default::default(),
            arp: Default::default(),
            telemetry: Default::default(),
        }
    }
}

// ===== impl LoggingJournald =====

impl Default for LoggingJournald {
    fn default() -> LoggingJournald {
        LoggingJournald { enabled: false }
    }
}

// ===== impl LoggingFile =====

impl Default for LoggingFile {
    fn default() -> LoggingFile {
        LoggingFile {
            enabled: false,
            dir: "/var/log".to_owned(),
            name: "lwotgd.log".to_owned(),
            rotation: Default::default(),
            fmt: Default::default(),
        }
    }
}

// ===== impl LoggingStdout =====

impl Default for LoggingStdout {
    fn default() -> LoggingStdout {
        LoggingStdout {
            enabled: true,
            fmt: Default::default(),
        }
    }
}

// ===== impl LoggingFmt =====

impl Default for LoggingFmt {
    fn default() -> LoggingFmt {
        LoggingFmt {
            style: LoggingFmtStyle::Full,
            colors: false,
            show_thread_id: false,
            show_source: false,
        }
    }
}

// ===== impl Otg =====

impl Default for Otg {
    fn default() -> Otg {
        Otg {
            enabled: true,
            address: "[::]:40051".to_owned(),
            tls: Default::default(),
        }
    }
}

// ===== impl Gnmi =====

impl Default for Gnmi {
    fn default() -> Gnmi {
        Gnmi {
            enabled: true,
            address: "[::]:50051".to_owned(),
            tls: Default::default(),
        }
    }
}

// ===== impl Tls =====

impl Default for Tls {
    fn default() -> Tls {
        Tls {
            enabled: false,
            certificate: "/etc/ssl/certs/lwotg.pem".to_owned(),
            key: "/etc/ssl/private/lwotg.key".to_owned(),
        }
    }
}

// ===== impl Arp =====

impl Default for Arp {
    fn default() -> Arp {
        Arp {
            gateway_timeout: 30,
        }
    }
}

// ===== impl Telemetry =====

impl Default for Telemetry {
    fn default() -> Telemetry {
        let supervisor = SupervisorConfig::default();
        Telemetry {
            restart_failed_tasks: supervisor.restart_failed_tasks,
            max_restarts: supervisor.max_restarts,
        }
    }
}

// ===== unit tests =====

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_config() {
        let config: Config = toml::from_str(
            r#"
            target = "otg"

            [logging.stdout]
            style = "json"

            [gnmi]
            address = "127.0.0.1:9339"
            tls = { enabled = true, certificate = "c.pem", key = "k.pem" }

            [arp]
            gateway_timeout = 5
            "#,
        )
        .unwrap();

        assert_eq!(config.target, "otg");
        assert_eq!(config.logging.stdout.fmt.style, LoggingFmtStyle::Json);
        assert!(config.otg.enabled);
        assert_eq!(config.otg.address, "[::]:40051");
        assert_eq!(config.gnmi.address, "127.0.0.1:9339");
        assert!(config.gnmi.tls.enabled);

        let server = config.server();
        assert_eq!(server.target, "otg");
        assert_eq!(server.gateway_timeout, Duration::from_secs(5));
        assert_eq!(server.supervisor.max_restarts, 5);
    }

    #[test]
    fn unknown_fields_rejected() {
        assert!(toml::from_str::<Config>("[otg]\nport = 1\n").is_err());
        assert!(toml::from_str::<Config>("database_path = \"x\"\n").is_err());
    }
}
