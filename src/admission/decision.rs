//! Admission decision types.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Instant;

/// Why a request was blocked outright.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BlockReason {
    /// This request pushed the client over the escalation threshold and
    /// placed it on the blacklist.
    RateLimitEscalation,
    /// The client was already on the blacklist when the request arrived.
    AlreadyBlacklisted,
}

impl BlockReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            BlockReason::RateLimitEscalation => "rate_limit_escalation",
            BlockReason::AlreadyBlacklisted => "already_blacklisted",
        }
    }
}

impl fmt::Display for BlockReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Classification of a single admission check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    /// The request is admitted.
    Allowed,
    /// The client is over its rate limit but not yet blacklisted.
    RateLimited,
    /// The client is denied outright.
    Blocked(BlockReason),
}

impl Outcome {
    /// HTTP-style status code used when reporting this outcome.
    pub fn status_code(&self) -> u16 {
        match self {
            Outcome::Allowed => 200,
            Outcome::RateLimited => 429,
            Outcome::Blocked(_) => 403,
        }
    }

    /// Short human-readable note recorded alongside the status code.
    pub fn note(&self) -> &'static str {
        match self {
            Outcome::Allowed => "Allowed",
            Outcome::RateLimited => "Rate Limit",
            Outcome::Blocked(BlockReason::RateLimitEscalation) => "Auto Blacklist",
            Outcome::Blocked(BlockReason::AlreadyBlacklisted) => "Firewall Block",
        }
    }

    pub fn is_allowed(&self) -> bool {
        matches!(self, Outcome::Allowed)
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Outcome::Allowed => f.write_str("allowed"),
            Outcome::RateLimited => f.write_str("rate_limited"),
            Outcome::Blocked(reason) => write!(f, "blocked({})", reason),
        }
    }
}

/// The immutable result of one call to [`AdmissionGate::decide`].
///
/// [`AdmissionGate::decide`]: super::AdmissionGate::decide
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Decision {
    client_id: String,
    at: Instant,
    outcome: Outcome,
}

impl Decision {
    pub fn new(client_id: impl Into<String>, at: Instant, outcome: Outcome) -> Self {
        Self {
            client_id: client_id.into(),
            at,
            outcome,
        }
    }

    /// The client the decision was made for.
    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    /// The instant the decision was evaluated at.
    pub fn at(&self) -> Instant {
        self.at
    }

    pub fn outcome(&self) -> Outcome {
        self.outcome
    }

    pub fn is_allowed(&self) -> bool {
        self.outcome.is_allowed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes() {
        assert_eq!(Outcome::Allowed.status_code(), 200);
        assert_eq!(Outcome::RateLimited.status_code(), 429);
        assert_eq!(
            Outcome::Blocked(BlockReason::RateLimitEscalation).status_code(),
            403
        );
        assert_eq!(
            Outcome::Blocked(BlockReason::AlreadyBlacklisted).status_code(),
            403
        );
    }

    #[test]
    fn test_notes_distinguish_block_reasons() {
        assert_eq!(
            Outcome::Blocked(BlockReason::RateLimitEscalation).note(),
            "Auto Blacklist"
        );
        assert_eq!(
            Outcome::Blocked(BlockReason::AlreadyBlacklisted).note(),
            "Firewall Block"
        );
    }

    #[test]
    fn test_display() {
        assert_eq!(Outcome::RateLimited.to_string(), "rate_limited");
        assert_eq!(
            Outcome::Blocked(BlockReason::AlreadyBlacklisted).to_string(),
            "blocked(already_blacklisted)"
        );
    }

    #[test]
    fn test_decision_accessors() {
        let now = Instant::now();
        let decision = Decision::new("10.0.0.1", now, Outcome::Allowed);

        assert_eq!(decision.client_id(), "10.0.0.1");
        assert_eq!(decision.at(), now);
        assert!(decision.is_allowed());
    }
}
