//! Size-constrained encode loop.
//!
//! ```text
//! Encoding(crf) ──size ok──────────────────────────▶ Accepted
//!      │
//!      ├──too big, retries left──▶ Encoding(min(crf + step, max_crf))
//!      │
//!      └──too big, no retries────────────────────────▶ Accepted (last result)
//! ```
//!
//! The loop always terminates with some output: on exhaustion it favors
//! availability over strict size compliance and reports the overshoot.
//! Engine failures are not retried; they abort the loop.

use serde::{Deserialize, Serialize};

use clipgrid_common::config::EncodingDefaults;
use clipgrid_common::error::MediaResult;

/// CRF escalation parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CrfPolicy {
    /// First (best quality) CRF tried.
    pub initial_crf: u32,
    /// Increment applied after each oversized result.
    pub step: u32,
    /// Escalation stops here.
    pub max_crf: u32,
    /// Hard cap on engine invocations.
    pub max_attempts: u32,
}

impl Default for CrfPolicy {
    fn default() -> Self {
        Self {
            initial_crf: 18,
            step: 5,
            max_crf: 28,
            max_attempts: 3,
        }
    }
}

/// Upper bound on attempts per size-constrained encode.
pub const MAX_ENCODE_ATTEMPTS: u32 = 3;

/// Highest CRF the x264/x265/vp9 encoders accept.
pub const ENGINE_MAX_CRF: u32 = 51;

impl From<&EncodingDefaults> for CrfPolicy {
    fn from(defaults: &EncodingDefaults) -> Self {
        let max_attempts = defaults.max_attempts.clamp(1, MAX_ENCODE_ATTEMPTS);
        if max_attempts != defaults.max_attempts {
            tracing::warn!(
                configured = defaults.max_attempts,
                using = max_attempts,
                "encoding.max_attempts out of range, clamping"
            );
        }

        let initial_crf = defaults.min_crf.min(ENGINE_MAX_CRF);
        let max_crf = defaults.max_crf.clamp(initial_crf, ENGINE_MAX_CRF);
        if initial_crf != defaults.min_crf || max_crf != defaults.max_crf {
            tracing::warn!(
                min_crf = defaults.min_crf,
                max_crf = defaults.max_crf,
                using_min = initial_crf,
                using_max = max_crf,
                "encoding CRF range out of bounds, clamping"
            );
        }

        Self {
            initial_crf,
            step: defaults.crf_step,
            max_crf,
            max_attempts,
        }
    }
}

impl CrfPolicy {
    /// CRF for the attempt after `crf`, clamped to `max_crf`.
    pub fn next_crf(&self, crf: u32) -> u32 {
        crf.saturating_add(self.step).min(self.max_crf)
    }

    /// CRF used by the one-shot global tightening pass.
    pub fn tightened_crf(&self) -> u32 {
        self.next_crf(self.initial_crf)
    }
}

/// One engine invocation inside the loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncodeAttempt {
    /// 1-based attempt number.
    pub attempt: u32,
    pub crf: u32,
    pub size_bytes: u64,
    pub accepted: bool,
}

/// Final state of a loop run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoopOutcome {
    pub history: Vec<EncodeAttempt>,
    pub ceiling_bytes: u64,
}

impl LoopOutcome {
    /// The accepted (always last) attempt.
    pub fn accepted(&self) -> Option<&EncodeAttempt> {
        self.history.last()
    }

    pub fn final_crf(&self) -> Option<u32> {
        self.accepted().map(|a| a.crf)
    }

    /// Whether the accepted output honors the ceiling.
    pub fn within_ceiling(&self) -> bool {
        self.accepted()
            .is_some_and(|a| a.size_bytes <= self.ceiling_bytes)
    }
}

#[derive(Debug, Clone, Copy)]
enum LoopState {
    Encoding { attempt: u32, crf: u32 },
    Accepted,
}

/// Drives CRF escalation against a byte ceiling.
#[derive(Debug, Clone, Copy, Default)]
pub struct SizeConstrainedLoop {
    policy: CrfPolicy,
}

impl SizeConstrainedLoop {
    pub fn new(policy: CrfPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> &CrfPolicy {
        &self.policy
    }

    /// Run the loop. `encode` performs one encode at the given CRF and
    /// returns the resulting file size in bytes.
    pub fn run<F>(&self, ceiling_bytes: u64, mut encode: F) -> MediaResult<LoopOutcome>
    where
        F: FnMut(u32) -> MediaResult<u64>,
    {
        let max_attempts = self.policy.max_attempts.clamp(1, MAX_ENCODE_ATTEMPTS);
        let mut history = Vec::with_capacity(max_attempts as usize);
        let mut state = LoopState::Encoding {
            attempt: 1,
            crf: self.policy.initial_crf.min(self.policy.max_crf),
        };

        loop {
            match state {
                LoopState::Encoding { attempt, crf } => {
                    let size_bytes = encode(crf)?;
                    let within = size_bytes <= ceiling_bytes;
                    let retries_left = attempt < max_attempts && crf < self.policy.max_crf;

                    history.push(EncodeAttempt {
                        attempt,
                        crf,
                        size_bytes,
                        accepted: within || !retries_left,
                    });

                    state = if within {
                        tracing::debug!(
                            attempt,
                            crf,
                            size_bytes,
                            ceiling_bytes,
                            "Output within ceiling"
                        );
                        LoopState::Accepted
                    } else if retries_left {
                        let next = self.policy.next_crf(crf);
                        tracing::info!(
                            attempt,
                            size_bytes,
                            ceiling_bytes,
                            next_crf = next,
                            "Output too large, escalating compression"
                        );
                        LoopState::Encoding {
                            attempt: attempt + 1,
                            crf: next,
                        }
                    } else {
                        tracing::warn!(
                            attempt,
                            crf,
                            size_bytes,
                            ceiling_bytes,
                            "Compression budget exhausted, accepting oversized output"
                        );
                        LoopState::Accepted
                    };
                }
                LoopState::Accepted => {
                    return Ok(LoopOutcome {
                        history,
                        ceiling_bytes,
                    });
                }
            }
        }
    }
}
