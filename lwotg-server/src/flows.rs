//
// Copyright (c) The Holo Core Contributors
//
// SPDX-License-Identifier: MIT
//

use async_trait::async_trait;
use lwotg_flows::listener;
use lwotg_flows::{
    CompiledFlow, Flow, FlowControl, FlowHandler, FlowListener, FlowTasks,
    FlowUpdate, PortMap,
};
use lwotg_telemetry::model::{self, Device};
use lwotg_telemetry::{TaskContext, TelemetryTask};
use tokio::sync::Mutex;
use tracing::debug;

use crate::error::{Error, Result};

/// Starts both directions of a compiled flow.
pub type FlowStarter =
    fn(&CompiledFlow, FlowListener, FlowListener) -> FlowTasks;

/// Telemetry task owning a started flow.
///
/// The flow runs for as long as the task does: its packet counters are
/// published while it runs, and stopping the task stops both directions.
#[derive(Debug)]
pub(crate) struct FlowCounterTask {
    task_name: String,
    flow_name: String,
    run: Mutex<FlowRun>,
}

#[derive(Debug)]
struct FlowRun {
    tx: FlowControl,
    rx: FlowControl,
    tasks: Option<FlowTasks>,
}

// ===== impl FlowCounterTask =====

impl FlowCounterTask {
    pub(crate) fn start(
        flow: &CompiledFlow,
        starter: FlowStarter,
    ) -> FlowCounterTask {
        let (tx_listener, tx) = listener::channel();
        let (rx_listener, rx) = listener::channel();
        let tasks = starter(flow, tx_listener, rx_listener);

        FlowCounterTask {
            task_name: task_name(&flow.name),
            flow_name: flow.name.clone(),
            run: Mutex::new(FlowRun {
                tx,
                rx,
                tasks: Some(tasks),
            }),
        }
    }

    fn publish(
        &self,
        ctx: &TaskContext,
        (out_pkts, in_pkts): (u64, u64),
    ) -> lwotg_telemetry::Result<()> {
        ctx.sink.update(&Device {
            flows: vec![model::Flow {
                name: self.flow_name.clone(),
                out_pkts: Some(out_pkts),
                in_pkts: Some(in_pkts),
            }],
            ..Default::default()
        })
    }
}

#[async_trait]
impl TelemetryTask for FlowCounterTask {
    fn name(&self) -> &str {
        &self.task_name
    }

    async fn run(&self, ctx: &TaskContext) -> lwotg_telemetry::Result<()> {
        let mut run = self.run.lock().await;
        let run = &mut *run;
        let mut counters = (0, 0);

        self.publish(ctx, counters)?;
        loop {
            tokio::select! {
                _ = ctx.stopped() => return Ok(()),
                Some(update) = run.tx.updates.recv() => {
                    if let FlowUpdate::Tx { packets } = update {
                        counters.0 = packets;
                    }
                    self.publish(ctx, counters)?;
                }
                Some(update) = run.rx.updates.recv() => {
                    if let FlowUpdate::Rx { packets } = update {
                        counters.1 = packets;
                    }
                    self.publish(ctx, counters)?;
                }
                Some(error) = run.tx.errors.recv() => {
                    error.log();
                }
                Some(error) = run.rx.errors.recv() => {
                    error.log();
                }
            }
        }
    }

    async fn cleanup(&self) {
        let mut run = self.run.lock().await;
        run.tx.stop();
        run.rx.stop();

        // Wait for both directions to notice.
        if let Some(tasks) = run.tasks.take() {
            let _ = tasks.tx.await;
            let _ = tasks.rx.await;
            debug!(flow = %self.flow_name, "flow stopped");
        }
    }
}

// ===== global functions =====

pub(crate) fn task_name(flow_name: &str) -> String {
    format!("flow-{flow_name}")
}

/// Compiles a flow with the first handler that claims it.
pub(crate) fn compile(
    handlers: &[FlowHandler],
    flow: &Flow,
    port_map: &PortMap,
) -> Result<CompiledFlow> {
    for handler in handlers {
        match handler(flow, port_map) {
            Ok(Some(compiled)) => return Ok(compiled),
            Ok(None) => continue,
            Err(error) => return Err(Error::Flow(flow.name.clone(), error)),
        }
    }

    Err(Error::NoFlowHandler(flow.name.clone()))
}

// ===== unit tests =====

#[cfg(test)]
pub(crate) mod tests {
    use std::collections::HashMap;
    use std::sync::Arc;
    use std::time::Duration;

    use bytes::Bytes;
    use lwotg_flows::flow::TxRx;
    use lwotg_flows::packet::Packet;
    use lwotg_telemetry::proto::{Path, typed_value};
    use lwotg_telemetry::{Collector, SupervisorConfig, TaskState};
    use lwotg_utils::task::Task;

    use super::*;

    // Starts directions that report a single packet each and then wait to be
    // stopped.
    pub(crate) fn fake_starter(
        _flow: &CompiledFlow,
        tx: FlowListener,
        rx: FlowListener,
    ) -> FlowTasks {
        let tx = Task::spawn_blocking(move || {
            tx.update(FlowUpdate::Tx { packets: 1 });
            while !tx.wait(Duration::from_millis(10)) {}
        });
        let rx = Task::spawn_blocking(move || {
            rx.update(FlowUpdate::Rx { packets: 1 });
            while !rx.wait(Duration::from_millis(10)) {}
        });
        FlowTasks { tx, rx }
    }

    pub(crate) fn compiled(name: &str) -> CompiledFlow {
        CompiledFlow {
            name: name.to_owned(),
            packet: Packet::default(),
            frame: Bytes::new(),
            pps: 1,
            tx_ifname: "eth0".to_owned(),
            rx_ifname: "eth1".to_owned(),
        }
    }

    fn flow(name: &str) -> Flow {
        Flow {
            name: name.to_owned(),
            tx_rx: TxRx::Port {
                tx: "port1".to_owned(),
                rx: Some("port2".to_owned()),
            },
            packet: vec![],
            rate: None,
        }
    }

    fn decline(
        _: &Flow,
        _: &PortMap,
    ) -> lwotg_flows::Result<Option<CompiledFlow>> {
        Ok(None)
    }

    fn accept(
        flow: &Flow,
        _: &PortMap,
    ) -> lwotg_flows::Result<Option<CompiledFlow>> {
        Ok(Some(compiled(&flow.name)))
    }

    fn reject(
        _: &Flow,
        _: &PortMap,
    ) -> lwotg_flows::Result<Option<CompiledFlow>> {
        Err(lwotg_flows::Error::MissingRxPort)
    }

    #[test]
    fn handler_selection() {
        let ports = HashMap::new();

        let compiled = compile(&[decline, accept], &flow("f1"), &ports);
        assert_eq!(compiled.unwrap().name, "f1");

        assert!(matches!(
            compile(&[decline], &flow("f1"), &ports),
            Err(Error::NoFlowHandler(name)) if name == "f1"
        ));
        assert!(matches!(
            compile(&[reject, accept], &flow("f1"), &ports),
            Err(Error::Flow(..))
        ));
    }

    #[tokio::test]
    async fn counters_published_until_stopped() {
        let collector = Collector::new("ate", SupervisorConfig::default());
        let task = FlowCounterTask::start(&compiled("f1"), fake_starter);
        collector.add_task(Arc::new(task)).unwrap();

        let path = model::Flow::path("f1")
            .join(&Path::parse("state/counters/in-pkts"));
        let mut in_pkts = None;
        for _ in 0..100 {
            in_pkts = collector
                .cache()
                .snapshot(&[path.clone()])
                .first()
                .and_then(|n| n.update.first().cloned())
                .and_then(|u| u.val)
                .and_then(|v| v.value);
            if in_pkts == Some(typed_value::Value::UintVal(1)) {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert_eq!(in_pkts, Some(typed_value::Value::UintVal(1)));

        collector.stop_task("flow-f1").await.unwrap();
        assert_eq!(collector.task_states()["flow-f1"], TaskState::Stopped);
    }
}
