//
// Copyright (c) The Holo Core Contributors
//
// SPDX-License-Identifier: MIT
//

use std::sync::Arc;

use tokio::sync::{broadcast, mpsc};
use tokio_stream::StreamExt;
use tokio_stream::wrappers::ReceiverStream;
use tonic::{Request, Response, Status, Streaming};
use tracing::{debug, debug_span, trace, warn};

use crate::cache::{Cache, filter_notification};
use crate::proto;

const GNMI_VERSION: &str = "0.8.0";

// Subscribe responses buffered per client.
const SUBSCRIBE_CHANNEL_SIZE: usize = 64;

// Models the published paths belong to.
const SUPPORTED_MODELS: [&str; 4] = [
    "openconfig-interfaces",
    "openconfig-system",
    "open-traffic-generator-port",
    "open-traffic-generator-flow",
];

/// gNMI view of the telemetry cache.
#[derive(Clone, Debug)]
pub struct GNmiService {
    cache: Arc<Cache>,
}

// ===== impl GNmiService =====

impl GNmiService {
    pub fn new(cache: Arc<Cache>) -> GNmiService {
        GNmiService { cache }
    }

    pub fn into_server(self) -> proto::GNmiServer<GNmiService> {
        proto::GNmiServer::new(self)
    }
}

#[tonic::async_trait]
impl proto::GNmi for GNmiService {
    type SubscribeStream =
        ReceiverStream<Result<proto::SubscribeResponse, Status>>;

    async fn capabilities(
        &self,
        grpc_request: Request<proto::CapabilityRequest>,
    ) -> Result<Response<proto::CapabilityResponse>, Status> {
        let grpc_request = grpc_request.into_inner();
        debug_span!("telemetry").in_scope(|| {
            debug_span!("client", name = "gnmi").in_scope(|| {
                debug!("received Capabilities() request");
                trace!("{:?}", grpc_request);
            });
        });

        let supported_models = SUPPORTED_MODELS
            .iter()
            .map(|name| proto::ModelData {
                name: name.to_string(),
                organization: Default::default(),
                version: Default::default(),
            })
            .collect();

        let reply = proto::CapabilityResponse {
            supported_models,
            supported_encodings: vec![proto::Encoding::Proto as i32],
            g_nmi_version: GNMI_VERSION.to_owned(),
        };

        Ok(Response::new(reply))
    }

    async fn get(
        &self,
        grpc_request: Request<proto::GetRequest>,
    ) -> Result<Response<proto::GetResponse>, Status> {
        let grpc_request = grpc_request.into_inner();
        debug_span!("telemetry").in_scope(|| {
            debug_span!("client", name = "gnmi").in_scope(|| {
                debug!("received Get() request");
                trace!("{:?}", grpc_request);
            });
        });

        // Only state data is kept.
        let notification =
            match proto::get_request::DataType::try_from(grpc_request.r#type) {
                Ok(proto::get_request::DataType::Config) => vec![],
                Ok(
                    proto::get_request::DataType::All
                    | proto::get_request::DataType::State
                    | proto::get_request::DataType::Operational,
                ) => {
                    check_encoding(grpc_request.encoding)?;
                    let paths = full_paths(
                        grpc_request.prefix.as_ref(),
                        &grpc_request.path,
                    );
                    self.cache.snapshot(&paths)
                }
                Err(_) => {
                    return Err(Status::invalid_argument("Invalid data type"));
                }
            };

        #[allow(deprecated)]
        let grpc_response = proto::GetResponse {
            notification,
            error: None,
        };
        Ok(Response::new(grpc_response))
    }

    async fn set(
        &self,
        _grpc_request: Request<proto::SetRequest>,
    ) -> Result<Response<proto::SetResponse>, Status> {
        Err(Status::unimplemented("telemetry is read-only"))
    }

    async fn subscribe(
        &self,
        grpc_request: Request<Streaming<proto::SubscribeRequest>>,
    ) -> Result<Response<Self::SubscribeStream>, Status> {
        let mut requests = grpc_request.into_inner();

        let Some(request) = requests.next().await else {
            return Err(Status::invalid_argument("missing subscription"));
        };
        let request = request?;
        debug_span!("telemetry").in_scope(|| {
            debug_span!("client", name = "gnmi").in_scope(|| {
                debug!("received Subscribe() request");
                trace!("{:?}", request);
            });
        });

        let Some(proto::subscribe_request::Request::Subscribe(list)) =
            request.request
        else {
            return Err(Status::invalid_argument(
                "first request must carry a subscription list",
            ));
        };
        check_encoding(list.encoding)?;
        let mode = proto::subscription_list::Mode::try_from(list.mode)
            .map_err(|_| Status::invalid_argument("Invalid mode"))?;
        let sub_paths = list
            .subscription
            .iter()
            .filter_map(|sub| sub.path.clone())
            .collect::<Vec<_>>();
        let paths = full_paths(list.prefix.as_ref(), &sub_paths);

        let (tx, rx) = mpsc::channel(SUBSCRIBE_CHANNEL_SIZE);
        match mode {
            proto::subscription_list::Mode::Once => {
                let snapshot = self.cache.snapshot(&paths);
                tokio::spawn(async move {
                    let _ = send_snapshot(&tx, snapshot, list.updates_only)
                        .await;
                });
            }
            proto::subscription_list::Mode::Stream => {
                // Subscribe first so nothing is missed between the snapshot
                // and the live stream.
                let live = self.cache.subscribe();
                let snapshot = self.cache.snapshot(&paths);
                tokio::spawn(async move {
                    if send_snapshot(&tx, snapshot, list.updates_only)
                        .await
                        .is_ok()
                    {
                        stream_updates(&tx, live, &paths).await;
                    }
                    debug!("subscription ended");
                });
            }
            proto::subscription_list::Mode::Poll => {
                return Err(Status::unimplemented("POLL mode"));
            }
        }

        Ok(Response::new(ReceiverStream::new(rx)))
    }
}

// ===== helper functions =====

fn check_encoding(encoding: i32) -> Result<(), Status> {
    match proto::Encoding::try_from(encoding) {
        // JSON is the proto3 default and is accepted as "unspecified".
        Ok(proto::Encoding::Proto | proto::Encoding::Json) => Ok(()),
        _ => Err(Status::invalid_argument("Invalid data encoding")),
    }
}

fn full_paths(
    prefix: Option<&proto::Path>,
    paths: &[proto::Path],
) -> Vec<proto::Path> {
    match prefix {
        Some(prefix) if paths.is_empty() => vec![prefix.clone()],
        Some(prefix) => paths.iter().map(|path| prefix.join(path)).collect(),
        None => paths.to_vec(),
    }
}

type ResponseSender = mpsc::Sender<Result<proto::SubscribeResponse, Status>>;

async fn send_snapshot(
    tx: &ResponseSender,
    snapshot: Vec<proto::Notification>,
    updates_only: bool,
) -> Result<(), ()> {
    if !updates_only {
        for notification in snapshot {
            send(tx, proto::subscribe_response::Response::Update(notification))
                .await?;
        }
    }
    send(tx, proto::subscribe_response::Response::SyncResponse(true)).await
}

async fn stream_updates(
    tx: &ResponseSender,
    mut live: broadcast::Receiver<Arc<proto::Notification>>,
    paths: &[proto::Path],
) {
    loop {
        match live.recv().await {
            Ok(notification) => {
                let Some(notification) =
                    filter_notification(&notification, paths)
                else {
                    continue;
                };
                let response =
                    proto::subscribe_response::Response::Update(notification);
                if send(tx, response).await.is_err() {
                    return;
                }
            }
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                warn!(%skipped, "subscriber lagging, notifications dropped");
            }
            Err(broadcast::error::RecvError::Closed) => return,
        }
    }
}

async fn send(
    tx: &ResponseSender,
    response: proto::subscribe_response::Response,
) -> Result<(), ()> {
    let response = proto::SubscribeResponse {
        response: Some(response),
    };
    tx.send(Ok(response)).await.map_err(|_| ())
}

// ===== unit tests =====
