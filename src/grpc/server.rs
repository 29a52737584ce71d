//! gRPC server implementation.

use std::net::SocketAddr;
use std::sync::Arc;
use tonic::transport::Server;
use tracing::{error, info};

use super::proto::doorman::admission::v1::admission_service_server::AdmissionServiceServer;
use super::service::AdmissionServiceImpl;
use crate::admission::AdmissionGate;
use crate::clock::Clock;
use crate::error::{DoormanError, Result};
use crate::events::DecisionSink;

/// gRPC server exposing the admission service.
pub struct AdmissionServer {
    /// Address to bind to
    addr: SocketAddr,
    /// The service handling each check
    service: AdmissionServiceImpl,
}

impl AdmissionServer {
    /// Create a new gRPC server around a gate.
    pub fn new(
        addr: SocketAddr,
        gate: Arc<AdmissionGate>,
        clock: Arc<dyn Clock>,
        sink: Arc<dyn DecisionSink>,
    ) -> Self {
        Self {
            addr,
            service: AdmissionServiceImpl::new(gate, clock, sink),
        }
    }

    /// The address the server binds to.
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Start the gRPC server.
    ///
    /// This method will block until the server is shut down.
    pub async fn serve(self) -> Result<()> {
        info!(addr = %self.addr, "Starting gRPC server for AdmissionService");

        Server::builder()
            .add_service(AdmissionServiceServer::new(self.service))
            .serve(self.addr)
            .await
            .map_err(|e| {
                error!(error = %e, "gRPC server failed");
                DoormanError::Grpc(e)
            })
    }

    /// Start the gRPC server with graceful shutdown.
    ///
    /// The server will shut down when the provided signal resolves.
    pub async fn serve_with_shutdown<F>(self, signal: F) -> Result<()>
    where
        F: std::future::Future<Output = ()> + Send,
    {
        info!(
            addr = %self.addr,
            "Starting gRPC server for AdmissionService with graceful shutdown"
        );

        Server::builder()
            .add_service(AdmissionServiceServer::new(self.service))
            .serve_with_shutdown(self.addr, signal)
            .await
            .map_err(|e| {
                error!(error = %e, "gRPC server failed");
                DoormanError::Grpc(e)
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::SystemClock;
    use crate::events::TracingSink;

    #[test]
    fn test_server_creation() {
        let addr: SocketAddr = "127.0.0.1:5050".parse().unwrap();
        let server = AdmissionServer::new(
            addr,
            Arc::new(AdmissionGate::default()),
            Arc::new(SystemClock::new()),
            Arc::new(TracingSink::new()),
        );
        assert_eq!(server.addr(), addr);
    }

    #[tokio::test]
    async fn test_server_stops_on_signal() {
        let addr: SocketAddr = "127.0.0.1:0".parse().unwrap();
        let server = AdmissionServer::new(
            addr,
            Arc::new(AdmissionGate::default()),
            Arc::new(SystemClock::new()),
            Arc::new(TracingSink::new()),
        );

        let result = server.serve_with_shutdown(async {}).await;
        assert!(result.is_ok());
    }
}
