//
// Copyright (c) The Holo Core Contributors
//
// SPDX-License-Identifier: MIT
//

mod config;

use std::net::SocketAddr;
use std::sync::Arc;

use clap::{App, Arg};
use config::{Config, LoggingFileRotation, LoggingFmtStyle};
use lwotg_interface::Netlink;
use lwotg_server::Server;
use lwotg_utils::task::Task;
use nix::unistd::Uid;
use tokio::signal::unix::{SignalKind, signal};
use tokio::sync::mpsc;
use tonic::transport::{Identity, ServerTlsConfig};
use tracing::level_filters::LevelFilter;
use tracing::{error, info};
use tracing_appender::rolling;
use tracing_subscriber::Layer;
use tracing_subscriber::prelude::*;

fn init_tracing(config: &config::Logging) {
    // Enable logging to journald.
    let journald = config.journald.enabled.then(|| {
        tracing_journald::layer()
            .inspect_err(|error| {
                eprintln!("couldn't connect to journald: {error}");
            })
            .ok()
    });

    // Enable logging to a file.
    let file = config.file.enabled.then(|| {
        let file_appender = match config.file.rotation {
            LoggingFileRotation::Never => {
                rolling::never(&config.file.dir, &config.file.name)
            }
            LoggingFileRotation::Hourly => {
                rolling::hourly(&config.file.dir, &config.file.name)
            }
            LoggingFileRotation::Daily => {
                rolling::daily(&config.file.dir, &config.file.name)
            }
        };

        let log_level_filter = LevelFilter::from_level(tracing::Level::TRACE);
        let layer = tracing_subscriber::fmt::layer()
            .with_writer(file_appender)
            .with_target(false)
            .with_thread_ids(config.file.fmt.show_thread_id)
            .with_file(config.file.fmt.show_source)
            .with_line_number(config.file.fmt.show_source)
            .with_ansi(config.file.fmt.colors);
        let layer = match config.file.fmt.style {
            LoggingFmtStyle::Compact => layer.compact().boxed(),
            LoggingFmtStyle::Full => layer.boxed(),
            LoggingFmtStyle::Json => layer.json().boxed(),
            LoggingFmtStyle::Pretty => layer.pretty().boxed(),
        };
        layer.with_filter(log_level_filter)
    });

    // Enable logging to stdout.
    let stdout = config.stdout.enabled.then(|| {
        let log_level_filter = LevelFilter::from_level(tracing::Level::TRACE);
        let layer = tracing_subscriber::fmt::layer()
            .with_target(false)
            .with_thread_ids(config.stdout.fmt.show_thread_id)
            .with_file(config.stdout.fmt.show_source)
            .with_line_number(config.stdout.fmt.show_source)
            .with_ansi(config.stdout.fmt.colors);
        let layer = match config.stdout.fmt.style {
            LoggingFmtStyle::Compact => layer.compact().boxed(),
            LoggingFmtStyle::Full => layer.boxed(),
            LoggingFmtStyle::Json => layer.json().boxed(),
            LoggingFmtStyle::Pretty => layer.pretty().boxed(),
        };
        layer.with_filter(log_level_filter)
    });

    let env_filter = tracing_subscriber::EnvFilter::builder()
        .with_default_directive("lwotg=debug".parse().unwrap())
        .from_env_lossy();
    tracing_subscriber::registry()
        .with(env_filter)
        .with(journald.flatten())
        .with(file)
        .with(stdout)
        .init();
}

fn signal_listener() -> mpsc::Receiver<()> {
    let (signal_tx, signal_rx) = mpsc::channel(1);

    tokio::task::spawn(async move {
        let (mut sigint, mut sigterm) = match (
            signal(SignalKind::interrupt()),
            signal(SignalKind::terminate()),
        ) {
            (Ok(sigint), Ok(sigterm)) => (sigint, sigterm),
            (Err(error), _) | (_, Err(error)) => {
                error!(%error, "failed to install signal handlers");
                let _ = signal_tx.send(()).await;
                return;
            }
        };

        tokio::select! {
            _ = sigint.recv() => {
                info!("received SIGINT");
                let _ = signal_tx.send(()).await;
            },
            _ = sigterm.recv() => {
                info!("received SIGTERM");
                let _ = signal_tx.send(()).await;
            }
        }
    });

    signal_rx
}

fn build_version() -> String {
    const VERSION: &str = env!("CARGO_PKG_VERSION");
    match rustc_tools_util::get_version_info!().commit_hash {
        Some(hash) => format!("{VERSION} ({hash})"),
        None => VERSION.to_owned(),
    }
}

// Returns a gRPC server builder with TLS set up as configured.
fn grpc_builder(
    name: &str,
    tls: &config::Tls,
) -> Option<tonic::transport::Server> {
    let server = tonic::transport::Server::builder();
    if !tls.enabled {
        return Some(server);
    }

    let cert = match std::fs::read(&tls.certificate) {
        Ok(value) => value,
        Err(error) => {
            error!(%name, %error, "failed to read TLS certificate");
            return None;
        }
    };
    let key = match std::fs::read(&tls.key) {
        Ok(value) => value,
        Err(error) => {
            error!(%name, %error, "failed to read TLS key");
            return None;
        }
    };

    let identity = Identity::from_pem(cert, key);
    match server.tls_config(ServerTlsConfig::new().identity(identity)) {
        Ok(server) => Some(server),
        Err(error) => {
            error!(%name, %error, "failed to setup TLS");
            None
        }
    }
}

fn parse_address(name: &str, address: &str) -> Option<SocketAddr> {
    match address.parse() {
        Ok(address) => Some(address),
        Err(error) => {
            error!(%name, %address, %error, "invalid listening address");
            None
        }
    }
}

fn start_otg(config: &config::Otg, server: &Server) -> Option<Task<()>> {
    let address = parse_address("otg", &config.address)?;
    let mut builder = grpc_builder("otg", &config.tls)?;
    let service = server.otg_service();

    info!(%address, "starting OTG service");
    Some(Task::spawn(async move {
        if let Err(error) =
            builder.add_service(service).serve(address).await
        {
            error!(%error, "OTG service failed");
        }
    }))
}

fn start_gnmi(config: &config::Gnmi, server: &Server) -> Option<Task<()>> {
    let address = parse_address("gnmi", &config.address)?;
    let mut builder = grpc_builder("gnmi", &config.tls)?;
    let service = server.gnmi_service();

    info!(%address, "starting gNMI service");
    Some(Task::spawn(async move {
        if let Err(error) =
            builder.add_service(service).serve(address).await
        {
            error!(%error, "gNMI service failed");
        }
    }))
}

async fn run(config: Config) {
    // Spawn signal listener.
    let mut signal_rx = signal_listener();

    let ops = match Netlink::new() {
        Ok(ops) => Arc::new(ops),
        Err(error) => {
            error.log();
            return;
        }
    };
    let server = match Server::new(ops, config.server()) {
        Ok(server) => server,
        Err(error) => {
            error.log();
            return;
        }
    };

    let mut services = vec![];
    if config.otg.enabled {
        services.extend(start_otg(&config.otg, &server));
    }
    if config.gnmi.enabled {
        services.extend(start_gnmi(&config.gnmi, &server));
    }
    if services.is_empty() {
        error!("no service to run");
        server.shutdown().await;
        return;
    }

    let _ = signal_rx.recv().await;
    info!("shutting down");
    server.shutdown().await;
}

// ===== main =====

fn main() {
    // Parse command-line parameters.
    let matches = App::new("Lightweight OTG daemon")
        .version(build_version().as_str())
        .arg(
            Arg::with_name("config")
                .short("c")
                .long("config")
                .value_name("file")
                .help("Specify an alternative configuration file."),
        )
        .get_matches();

    // Read configuration file.
    let config_file = matches.value_of("config");
    let config = Config::load(config_file);

    // Interfaces are reconfigured and raw sockets opened.
    if !Uid::effective().is_root() {
        eprintln!("need privileged user");
        std::process::exit(1);
    }

    // Initialize tracing.
    init_tracing(&config.logging);

    // We're ready to go!
    info!("starting up");

    match tokio::runtime::Builder::new_multi_thread().enable_all().build() {
        Ok(runtime) => runtime.block_on(run(config)),
        Err(error) => {
            error!(%error, "failed to create async runtime");
            std::process::exit(1);
        }
    }

    info!("exiting");
}
