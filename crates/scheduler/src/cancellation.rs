//! Cancellation token honored by the kernel's ready-set loop (spec §5).

/// Checked at the top of each ready-set iteration; the `max_iterations`
/// cap (spec §4.5) is a hard upper bound independent of this token.
pub trait CancellationToken: Send + Sync {
    fn is_cancelled(&self) -> bool;
}

/// A token that never cancels, for callers that don't need one.
#[derive(Debug, Clone, Copy, Default)]
pub struct NeverCancelled;

impl CancellationToken for NeverCancelled {
    fn is_cancelled(&self) -> bool {
        false
    }
}
