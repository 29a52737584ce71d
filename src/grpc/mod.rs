//! gRPC adapter in front of the admission gate.

mod server;
mod service;

pub use server::AdmissionServer;
pub use service::{client_id_from_request, AdmissionServiceImpl, FORWARDED_FOR, UNKNOWN_CLIENT};

// Include the generated protobuf code
pub mod proto {
    pub mod doorman {
        pub mod admission {
            pub mod v1 {
                tonic::include_proto!("doorman.admission.v1");
            }
        }
    }
}

// Re-export commonly used types
pub use proto::doorman::admission::v1::{
    admission_service_server::AdmissionServiceServer, CheckRequest, CheckResponse,
};
