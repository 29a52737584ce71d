//! Doorman - Admission Control Gate
//!
//! This crate implements an in-process admission gate that rate limits
//! clients over a sliding time window and escalates repeat offenders to a
//! temporary blacklist. A thin gRPC adapter exposes the gate to callers and
//! forwards every decision to pluggable observers.

pub mod admission;
pub mod clock;
pub mod config;
pub mod error;
pub mod events;
pub mod grpc;
