//! Admission service implementation.

use std::sync::Arc;
use tonic::{Request, Response, Status};
use tracing::{debug, instrument, Span};

use super::proto::doorman::admission::v1::{
    admission_service_server::AdmissionService, CheckRequest, CheckResponse,
};
use crate::admission::{AdmissionGate, BlockReason, Outcome};
use crate::clock::Clock;
use crate::events::{DecisionEvent, DecisionSink};

/// Metadata key carrying the original client address.
pub const FORWARDED_FOR: &str = "x-forwarded-for";
/// Client id used when neither the header nor the peer address is known.
pub const UNKNOWN_CLIENT: &str = "unknown";

const DEFAULT_PATH: &str = "/";

/// Implementation of the AdmissionService gRPC interface.
pub struct AdmissionServiceImpl {
    gate: Arc<AdmissionGate>,
    clock: Arc<dyn Clock>,
    sink: Arc<dyn DecisionSink>,
}

impl AdmissionServiceImpl {
    pub fn new(gate: Arc<AdmissionGate>, clock: Arc<dyn Clock>, sink: Arc<dyn DecisionSink>) -> Self {
        Self { gate, clock, sink }
    }
}

/// Work out which client sent `request`.
///
/// Uses the first address in `x-forwarded-for`, then the connection's peer
/// IP, then [`UNKNOWN_CLIENT`].
pub fn client_id_from_request<T>(request: &Request<T>) -> String {
    request
        .metadata()
        .get(FORWARDED_FOR)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.split(',').next())
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
        .or_else(|| request.remote_addr().map(|addr| addr.ip().to_string()))
        .unwrap_or_else(|| UNKNOWN_CLIENT.to_string())
}

#[tonic::async_trait]
impl AdmissionService for AdmissionServiceImpl {
    /// Decide whether the calling client may proceed.
    #[instrument(
        skip(self, request),
        fields(path = %request.get_ref().path, client_id = tracing::field::Empty)
    )]
    async fn check(
        &self,
        request: Request<CheckRequest>,
    ) -> Result<Response<CheckResponse>, Status> {
        let client_id = client_id_from_request(&request);
        Span::current().record("client_id", client_id.as_str());

        let req = request.into_inner();
        let path = if req.path.is_empty() {
            DEFAULT_PATH
        } else {
            req.path.as_str()
        };

        let decision = self.gate.decide(&client_id, self.clock.now());
        self.sink.record(&DecisionEvent::new(&decision, path));

        debug!(outcome = %decision.outcome(), "Admission check complete");

        match decision.outcome() {
            Outcome::Allowed => Ok(Response::new(CheckResponse {
                message: "OK".to_string(),
                client_id,
            })),
            Outcome::RateLimited => Err(Status::resource_exhausted("Too many requests")),
            Outcome::Blocked(BlockReason::RateLimitEscalation) => {
                Err(Status::permission_denied("Blacklisted"))
            }
            Outcome::Blocked(BlockReason::AlreadyBlacklisted) => {
                Err(Status::permission_denied("Blocked"))
            }
        }
    }
}
