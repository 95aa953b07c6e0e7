use super::error::GenerationError;
use super::event::Invalidation;

/// Work a reduction asks the controller to carry out. Reductions stay pure;
/// timers, channels and logging live in the driver.
#[derive(Debug, Clone, PartialEq)]
pub enum SideEffect {
    StartPolling,
    /// Cancel the session token and release the poll timer.
    StopPolling,
    Invalidate(Invalidation),
    TransientError(GenerationError),
}
