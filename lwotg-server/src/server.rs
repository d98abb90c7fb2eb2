//
// Copyright (c) The Holo Core Contributors
//
// SPDX-License-Identifier: MIT
//

use std::sync::Arc;
use std::time::Duration;

use lwotg_interface::InterfaceOps;
use lwotg_telemetry::gnmi::GNmiService;
use lwotg_telemetry::tasks::{
    ArpNeighborTask, DateTimeTask, InterfaceStateTask,
};
use lwotg_telemetry::{Collector, SupervisorConfig, TelemetryTask};
use lwotg_utils::hint::Hints;
use lwotg_utils::task::Task;
use tracing::debug;

use crate::error::Result;
use crate::flows::FlowStarter;
use crate::proto;
use crate::service::OtgService;

#[derive(Clone, Debug)]
pub struct ServerConfig {
    // Telemetry target name.
    pub target: String,
    // How long to wait for configured gateways to resolve.
    pub gateway_timeout: Duration,
    pub supervisor: SupervisorConfig,
}

/// The OTG emulation: configuration service, telemetry collector and the
/// hints shared between them.
pub struct Server {
    otg: OtgService,
    collector: Arc<Collector>,
    hints: Hints,
    _hint_task: Task<()>,
}

// ===== impl ServerConfig =====

impl Default for ServerConfig {
    fn default() -> ServerConfig {
        ServerConfig {
            target: "ate".to_owned(),
            gateway_timeout: Duration::from_secs(30),
            supervisor: SupervisorConfig::default(),
        }
    }
}

// ===== impl Server =====

impl Server {
    /// Creates the server and starts the default telemetry tasks.
    ///
    /// Must be called from within a tokio runtime.
    pub fn new(
        ops: Arc<dyn InterfaceOps>,
        config: ServerConfig,
    ) -> Result<Server> {
        Server::with_flow_starter(ops, config, None)
    }

    pub(crate) fn with_flow_starter(
        ops: Arc<dyn InterfaceOps>,
        config: ServerConfig,
        starter: Option<FlowStarter>,
    ) -> Result<Server> {
        let hints = Hints::default();
        let (hint_tx, hint_task) = hints.channel();

        let collector =
            Arc::new(Collector::new(config.target, config.supervisor));
        let tasks: [Arc<dyn TelemetryTask>; 3] = [
            Arc::new(DateTimeTask),
            Arc::new(InterfaceStateTask::new(ops.clone())),
            Arc::new(ArpNeighborTask::new(ops.clone(), hints.clone())),
        ];
        for task in tasks {
            debug!(task = %task.name(), "adding default telemetry task");
            collector.add_task(task)?;
        }

        let otg = match starter {
            Some(starter) => OtgService::with_flow_starter(
                ops,
                hint_tx,
                collector.clone(),
                config.gateway_timeout,
                starter,
            ),
            None => OtgService::new(
                ops,
                hint_tx,
                collector.clone(),
                config.gateway_timeout,
            ),
        };

        Ok(Server {
            otg,
            collector,
            hints,
            _hint_task: hint_task,
        })
    }

    pub fn otg_service(&self) -> proto::OpenapiServer<OtgService> {
        self.otg.clone().into_server()
    }

    pub fn gnmi_service(
        &self,
    ) -> lwotg_telemetry::proto::GNmiServer<GNmiService> {
        GNmiService::new(self.collector.cache().clone()).into_server()
    }

    pub fn hints(&self) -> &Hints {
        &self.hints
    }

    pub fn collector(&self) -> &Arc<Collector> {
        &self.collector
    }

    /// Stops all flows and telemetry tasks.
    pub async fn shutdown(&self) {
        self.otg.stop_flows().await;
        self.collector.shutdown().await;
    }
}

// ===== unit tests =====
