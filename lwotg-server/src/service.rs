//
// Copyright (c) The Holo Core Contributors
//
// SPDX-License-Identifier: MIT
//

use std::collections::{BTreeMap, BTreeSet};
use std::net::Ipv4Addr;
use std::sync::Arc;
use std::time::Duration;

use lwotg_flows::{
    CompiledFlow, FlowHandler, PortMap, simple_mpls_flow_handler,
};
use lwotg_interface::InterfaceOps;
use lwotg_telemetry::Collector;
use lwotg_telemetry::model;
use lwotg_utils::hint::{self, Hint, HintSender};
use lwotg_utils::task::Task;
use tokio::sync::Mutex;
use tonic::{Request, Response, Status};
use tracing::{Instrument, debug, debug_span, info, trace};

use crate::apply::{self, Applied};
use crate::error::Error;
use crate::flows::{self, FlowCounterTask, FlowStarter};
use crate::state::{Protocol, ProtocolState, Transmit};
use crate::translate::{self, LinuxIntfConfig};
use crate::{convert, proto};

/// Implementation of the OTG configuration API.
#[derive(Clone)]
pub struct OtgService {
    inner: Arc<ServiceInner>,
}

struct ServiceInner {
    ops: Arc<dyn InterfaceOps>,
    hint_tx: HintSender,
    collector: Arc<Collector>,
    gateway_timeout: Duration,
    handlers: Vec<FlowHandler>,
    starter: FlowStarter,
    state: Mutex<OtgState>,
}

#[derive(Debug, Default)]
struct OtgState {
    applied: Applied,
    config: Option<proto::Config>,
    flows: BTreeMap<String, CompiledFlow>,
    running: BTreeSet<String>,
    protocol: ProtocolState,
    // Background resolution of the configured gateways.
    gateways: Vec<Task<()>>,
}

// ===== impl OtgService =====

impl OtgService {
    pub fn new(
        ops: Arc<dyn InterfaceOps>,
        hint_tx: HintSender,
        collector: Arc<Collector>,
        gateway_timeout: Duration,
    ) -> OtgService {
        OtgService::with_flow_starter(
            ops,
            hint_tx,
            collector,
            gateway_timeout,
            CompiledFlow::start,
        )
    }

    /// Same as [`OtgService::new`], with a custom way of starting flows.
    pub fn with_flow_starter(
        ops: Arc<dyn InterfaceOps>,
        hint_tx: HintSender,
        collector: Arc<Collector>,
        gateway_timeout: Duration,
        starter: FlowStarter,
    ) -> OtgService {
        OtgService {
            inner: Arc::new(ServiceInner {
                ops,
                hint_tx,
                collector,
                gateway_timeout,
                handlers: vec![simple_mpls_flow_handler as FlowHandler],
                starter,
                state: Default::default(),
            }),
        }
    }

    pub fn into_server(self) -> proto::OpenapiServer<OtgService> {
        proto::OpenapiServer::new(self)
    }

    /// Stops every running flow.
    pub async fn stop_flows(&self) {
        let mut state = self.inner.state.lock().await;
        let running = std::mem::take(&mut state.running);
        self.inner.stop(running).await;
    }
}

#[tonic::async_trait]
impl proto::Openapi for OtgService {
    async fn set_config(
        &self,
        grpc_request: Request<proto::SetConfigRequest>,
    ) -> Result<Response<proto::SetConfigResponse>, Status> {
        let grpc_request = grpc_request.into_inner();
        log_request("SetConfig", &grpc_request);

        self.inner
            .set_config(grpc_request.config)
            .instrument(debug_span!("otg"))
            .await
            .inspect_err(|error| error.log())?;

        let grpc_response = proto::SetConfigResponse {
            warning: Some(proto::Warning::default()),
        };
        Ok(Response::new(grpc_response))
    }

    async fn get_config(
        &self,
        grpc_request: Request<proto::GetConfigRequest>,
    ) -> Result<Response<proto::GetConfigResponse>, Status> {
        let grpc_request = grpc_request.into_inner();
        log_request("GetConfig", &grpc_request);

        let state = self.inner.state.lock().await;
        let grpc_response = proto::GetConfigResponse {
            config: state.config.clone(),
        };
        Ok(Response::new(grpc_response))
    }

    async fn set_protocol_state(
        &self,
        grpc_request: Request<proto::SetProtocolStateRequest>,
    ) -> Result<Response<proto::SetProtocolStateResponse>, Status> {
        let grpc_request = grpc_request.into_inner();
        log_request("SetProtocolState", &grpc_request);

        let protocol = grpc_request
            .protocol_state
            .ok_or(Error::InvalidState("protocol"))
            .and_then(|state| Protocol::from_proto(state.state))
            .inspect_err(|error| error.log())?;

        let mut state = self.inner.state.lock().await;
        state.protocol = ProtocolState::NotEnforced(protocol);
        let grpc_response = proto::SetProtocolStateResponse {
            warning: Some(proto::Warning {
                warnings: state.protocol.warning().into_iter().collect(),
            }),
        };
        Ok(Response::new(grpc_response))
    }

    async fn set_transmit_state(
        &self,
        grpc_request: Request<proto::SetTransmitStateRequest>,
    ) -> Result<Response<proto::SetTransmitStateResponse>, Status> {
        let grpc_request = grpc_request.into_inner();
        log_request("SetTransmitState", &grpc_request);

        let transmit_state = grpc_request
            .transmit_state
            .ok_or(Error::InvalidState("transmit"))
            .inspect_err(|error| error.log())?;
        self.inner
            .set_transmit_state(transmit_state)
            .instrument(debug_span!("otg"))
            .await
            .inspect_err(|error| error.log())?;

        let grpc_response = proto::SetTransmitStateResponse {
            warning: Some(proto::Warning::default()),
        };
        Ok(Response::new(grpc_response))
    }
}

// ===== impl ServiceInner =====

impl ServiceInner {
    async fn set_config(
        &self,
        config: Option<proto::Config>,
    ) -> Result<(), Error> {
        let config = config.ok_or(Error::MissingConfig)?;

        // Validate everything before touching the host.
        check_supported(&config)?;
        let linux = translate::ports_to_linux(&config)?;
        let port_map: PortMap = linux
            .ports
            .iter()
            .map(|(port, ifname)| (port.clone(), ifname.clone()))
            .collect();
        let mut compiled = BTreeMap::new();
        for flow in &config.flows {
            let flow = convert::flow(flow)?;
            if compiled.contains_key(&flow.name) {
                return Err(Error::InvalidFlow(flow.name, "duplicate name"));
            }
            let flow_compiled =
                flows::compile(&self.handlers, &flow, &port_map)?;
            compiled.insert(flow.name, flow_compiled);
        }

        let mut state = self.state.lock().await;
        let plan = apply::plan(&*self.ops, &linux, &state.applied).await?;
        debug!(additions = %plan.additions.len(), "applying configuration");
        apply::commit(&*self.ops, plan, &mut state.applied).await?;

        // Replace the configured flows.
        let running = std::mem::take(&mut state.running);
        self.stop(running).await;
        let removed = state
            .flows
            .keys()
            .filter(|name| !compiled.contains_key(*name))
            .map(|name| model::Flow::path(name))
            .collect::<Vec<_>>();
        if !removed.is_empty() {
            self.collector.sink().delete(removed)?;
        }
        state.flows = compiled;
        state.config = Some(config);

        for (port, ifname) in &linux.ports {
            let hint = Hint::new(
                hint::INTERFACE_MAP.to_owned(),
                ifname.clone(),
                port.clone(),
            );
            let _ = self.hint_tx.send(hint);
        }
        state.gateways = self.resolve_gateways(&linux);

        info!("configuration applied");
        Ok(())
    }

    async fn set_transmit_state(
        &self,
        transmit_state: proto::TransmitState,
    ) -> Result<(), Error> {
        let transmit = Transmit::from_proto(transmit_state.state)?;

        let mut state = self.state.lock().await;
        let names = if transmit_state.flow_names.is_empty() {
            state.flows.keys().cloned().collect::<BTreeSet<_>>()
        } else {
            let names = BTreeSet::from_iter(transmit_state.flow_names);
            if let Some(name) =
                names.iter().find(|name| !state.flows.contains_key(*name))
            {
                return Err(Error::UnknownFlow(name.clone()));
            }
            names
        };

        match transmit {
            Transmit::Start => {
                for name in names {
                    if state.running.contains(&name) {
                        continue;
                    }
                    let flow = &state.flows[&name];
                    let task = FlowCounterTask::start(flow, self.starter);
                    self.collector.add_task(Arc::new(task))?;
                    debug!(flow = %name, "flow started");
                    state.running.insert(name);
                }
            }
            Transmit::Stop => {
                let stopping = names
                    .into_iter()
                    .filter(|name| state.running.remove(name))
                    .collect();
                self.stop(stopping).await;
            }
        }

        Ok(())
    }

    async fn stop(&self, flows: BTreeSet<String>) {
        for name in flows {
            if let Err(error) =
                self.collector.stop_task(&flows::task_name(&name)).await
            {
                error.log();
            }
            debug!(flow = %name, "flow stopped");
        }
    }

    fn resolve_gateways(&self, linux: &LinuxIntfConfig) -> Vec<Task<()>> {
        let gateways = linux
            .intfs
            .values()
            .flat_map(|intf| intf.ipv4.iter())
            .filter(|entry| !entry.gateway.is_empty())
            .filter_map(|entry| match entry.gateway.parse::<Ipv4Addr>() {
                Ok(gateway) => Some(gateway),
                Err(_) => {
                    debug!(gateway = %entry.gateway, "ignoring gateway");
                    None
                }
            })
            .collect::<BTreeSet<_>>();

        gateways
            .into_iter()
            .map(|gateway| {
                let ops = self.ops.clone();
                let hint_tx = self.hint_tx.clone();
                let timeout = self.gateway_timeout;
                let span = debug_span!("arp", %gateway);
                Task::spawn(
                    async move {
                        match lwotg_interface::await_arp(
                            &*ops, gateway, timeout,
                        )
                        .await
                        {
                            Ok(mac) => {
                                info!(%mac, "gateway resolved");
                                let _ = hint_tx.send(Hint::new(
                                    hint::GATEWAY_MAC.to_owned(),
                                    gateway.to_string(),
                                    mac.to_string(),
                                ));
                            }
                            Err(error) => error.log(),
                        }
                    }
                    .instrument(span),
                )
            })
            .collect()
    }
}

// ===== helper functions =====

fn log_request<T: std::fmt::Debug>(name: &str, request: &T) {
    debug_span!("otg").in_scope(|| {
        debug_span!("client", name = "grpc").in_scope(|| {
            debug!("received {}() request", name);
            trace!("{:?}", request);
        });
    });
}

fn check_supported(config: &proto::Config) -> Result<(), Error> {
    if !config.lags.is_empty() {
        return Err(Error::UnsupportedConfig("lags"));
    }
    if !config.layer1.is_empty() {
        return Err(Error::UnsupportedConfig("layer1 settings"));
    }
    if !config.captures.is_empty() {
        return Err(Error::UnsupportedConfig("captures"));
    }
    if config.options.is_some() {
        return Err(Error::UnsupportedConfig("options"));
    }

    Ok(())
}

// ===== unit tests =====
