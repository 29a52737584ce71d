//! Admission control: sliding-window rate limiting with escalation to a
//! temporary blacklist.

mod decision;
mod gate;
mod sweep;
mod window;

pub use decision::{BlockReason, Decision, Outcome};
pub use gate::{
    AdmissionConfig, AdmissionGate, DEFAULT_BLACKLIST_AFTER, DEFAULT_BLACKLIST_DURATION,
    DEFAULT_MAX_REQUESTS, DEFAULT_TIME_WINDOW,
};
pub use sweep::spawn_sweeper;
pub use window::{RequestWindow, SlidingWindowCounter};
