//! Ordered fallback chains.
//!
//! Each strategy is attempted in turn: a cheap path first, then costlier
//! ones only when the cheaper one fails its check. A strategy either fails
//! outright (an error), or produces an output that [`Strategy::verify`]
//! accepts or rejects.
//!
//! Used for the splitter's stream-copy then re-encode tiers and for the
//! composed artifact's as-is then tightened tiers.

use clipgrid_common::error::{MediaError, MediaResult};

/// Result of checking one strategy's output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    Accept,
    /// Output exists but does not satisfy the chain; the reason is logged.
    Reject(String),
}

/// One tier of a fallback chain.
pub trait Strategy {
    type Output;

    /// Short name used in logs and outcomes.
    fn name(&self) -> &str;

    /// Produce an output.
    fn attempt(&mut self) -> MediaResult<Self::Output>;

    /// Check an output of [`Strategy::attempt`].
    fn verify(&self, _output: &Self::Output) -> Verdict {
        Verdict::Accept
    }

    /// Whether an error from this tier moves on to the next one instead of
    /// aborting the chain.
    fn escalate_on_error(&self) -> bool {
        false
    }
}

/// Closure-backed [`Strategy`].
pub struct FnStrategy<'a, T> {
    name: String,
    attempt: Box<dyn FnMut() -> MediaResult<T> + 'a>,
    verify: Option<Box<dyn Fn(&T) -> Verdict + 'a>>,
    escalate_on_error: bool,
}

impl<'a, T> FnStrategy<'a, T> {
    pub fn new(name: impl Into<String>, attempt: impl FnMut() -> MediaResult<T> + 'a) -> Self {
        Self {
            name: name.into(),
            attempt: Box::new(attempt),
            verify: None,
            escalate_on_error: false,
        }
    }

    pub fn with_verify(mut self, verify: impl Fn(&T) -> Verdict + 'a) -> Self {
        self.verify = Some(Box::new(verify));
        self
    }

    /// Let errors from this tier fall through to the next one.
    pub fn escalating_on_error(mut self) -> Self {
        self.escalate_on_error = true;
        self
    }
}

impl<T> Strategy for FnStrategy<'_, T> {
    type Output = T;

    fn name(&self) -> &str {
        &self.name
    }

    fn attempt(&mut self) -> MediaResult<T> {
        (self.attempt)()
    }

    fn verify(&self, output: &T) -> Verdict {
        match &self.verify {
            Some(verify) => verify(output),
            None => Verdict::Accept,
        }
    }

    fn escalate_on_error(&self) -> bool {
        self.escalate_on_error
    }
}

/// What a chain run produced.
#[derive(Debug, Clone, PartialEq)]
pub struct ChainOutcome<T> {
    pub output: T,
    /// Name of the tier that produced `output`.
    pub strategy: String,
    /// False when the last tier's output was rejected and kept anyway.
    pub satisfied: bool,
    /// Tiers attempted, including the final one.
    pub attempts: usize,
}

/// An ordered list of strategies with a shared output type.
pub struct FallbackChain<'a, T> {
    strategies: Vec<Box<dyn Strategy<Output = T> + 'a>>,
}

impl<T> Default for FallbackChain<'_, T> {
    fn default() -> Self {
        Self {
            strategies: Vec::new(),
        }
    }
}

impl<'a, T> FallbackChain<'a, T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a tier.
    pub fn then(mut self, strategy: impl Strategy<Output = T> + 'a) -> Self {
        self.strategies.push(Box::new(strategy));
        self
    }

    pub fn len(&self) -> usize {
        self.strategies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.strategies.is_empty()
    }

    /// Run tiers in order until one is accepted.
    ///
    /// The last tier's output is returned unsatisfied when every tier was
    /// rejected; callers decide whether that is fatal. Errors abort the
    /// chain unless the failing tier escalates on error and is not last.
    pub fn run(mut self) -> MediaResult<ChainOutcome<T>> {
        let total = self.strategies.len();
        if total == 0 {
            return Err(MediaError::invalid_argument("fallback chain has no strategies"));
        }

        for (index, strategy) in self.strategies.iter_mut().enumerate() {
            let is_last = index + 1 == total;
            let output = match strategy.attempt() {
                Ok(output) => output,
                Err(e) if strategy.escalate_on_error() && !is_last => {
                    tracing::warn!(
                        strategy = strategy.name(),
                        error = %e,
                        "Strategy failed, escalating"
                    );
                    continue;
                }
                Err(e) => return Err(e),
            };

            match strategy.verify(&output) {
                Verdict::Accept => {
                    tracing::debug!(
                        strategy = strategy.name(),
                        attempts = index + 1,
                        "Strategy accepted"
                    );
                    return Ok(ChainOutcome {
                        output,
                        strategy: strategy.name().to_string(),
                        satisfied: true,
                        attempts: index + 1,
                    });
                }
                Verdict::Reject(reason) if is_last => {
                    tracing::warn!(
                        strategy = strategy.name(),
                        reason = %reason,
                        "Last strategy rejected, keeping its output"
                    );
                    return Ok(ChainOutcome {
                        output,
                        strategy: strategy.name().to_string(),
                        satisfied: false,
                        attempts: total,
                    });
                }
                Verdict::Reject(reason) => {
                    tracing::info!(
                        strategy = strategy.name(),
                        reason = %reason,
                        "Strategy rejected, escalating"
                    );
                }
            }
        }

        // Every path through the last tier returns above.
        Err(MediaError::invalid_argument("fallback chain ended without an outcome"))
    }
}
