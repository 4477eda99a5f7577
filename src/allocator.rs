//! Identity allocation against the central server.
//!
//! Identities are allocated exclusively by the server; this module asks for
//! the last assigned number and claims the next one. Retries are bounded and
//! a dead link fails fast. Exhaustion is its own error variant — no integer
//! value doubles as a failure signal, so an allocation of 1 is always a
//! genuine first-ever identity.

use crate::gateway::{ApiError, ServerApi};
use std::time::Duration;

/// Maximum identity requests per allocation.
const MAX_ATTEMPTS: u32 = 5;

/// Fixed delay between attempts.
const RETRY_DELAY: Duration = Duration::from_secs(2);

/// Allocates the next fleet-unique identity.
pub struct IdentityAllocator<'a> {
    api: &'a dyn ServerApi,
    max_attempts: u32,
    retry_delay: Duration,
}

impl<'a> IdentityAllocator<'a> {
    /// Create an allocator with the default retry budget.
    pub fn new(api: &'a dyn ServerApi) -> Self {
        Self::with_retry(api, MAX_ATTEMPTS, RETRY_DELAY)
    }

    /// Create an allocator with an explicit retry budget.
    pub fn with_retry(api: &'a dyn ServerApi, max_attempts: u32, retry_delay: Duration) -> Self {
        Self {
            api,
            max_attempts,
            retry_delay,
        }
    }

    /// Request the next identity.
    ///
    /// Issues at most `max_attempts` requests. Server errors and malformed
    /// bodies are retried after a fixed delay; a dead link is not retried.
    pub fn next_identity(&self) -> Result<u16, AllocError> {
        for attempt in 1..=self.max_attempts {
            match self.api.last_identity() {
                Ok(last) => return Ok(last + 1),
                Err(ApiError::LinkDown) => return Err(AllocError::LinkDown),
                Err(e) => {
                    tracing::warn!(attempt, error = %e, "Identity request failed");
                    if attempt < self.max_attempts {
                        std::thread::sleep(self.retry_delay);
                    }
                }
            }
        }
        Err(AllocError::Exhausted {
            attempts: self.max_attempts,
        })
    }
}

/// Identity allocation error types.
#[derive(Debug, PartialEq, Eq)]
pub enum AllocError {
    /// The network link is down; no retries were attempted
    LinkDown,
    /// Every attempt failed against a reachable server
    Exhausted { attempts: u32 },
}

impl std::fmt::Display for AllocError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AllocError::LinkDown => write!(f, "Network link is down"),
            AllocError::Exhausted { attempts } => {
                write!(f, "Identity allocation failed after {attempts} attempts")
            }
        }
    }
}

impl std::error::Error for AllocError {}
