/// Per-source run state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RunPhase {
    #[default]
    LoadCheckpoint,
    Discover,
    Process,
    Aggregate,
    Dispatch,
    AdvanceCheckpoint,
    /// Absorbs failures from processing, dispatch or checkpoint advance.
    /// Leaves only once the error has been reported.
    Error,
    Done,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PhaseEvent {
    CheckpointLoaded,
    Discovered { count: usize },
    ProcessingFinished,
    /// The worker pool itself failed; whatever completed is still aggregated.
    ProcessingAborted,
    Aggregated { successes: usize },
    DispatchSucceeded,
    DispatchFailed,
    CheckpointAdvanced,
    CheckpointFailed,
    ErrorReported,
}

/// Pure transition function: applies an event to a phase.
///
/// Events that do not apply to the current phase leave it unchanged.
pub fn transition(phase: RunPhase, event: PhaseEvent) -> RunPhase {
    use PhaseEvent as E;
    use RunPhase as P;

    match (phase, event) {
        (P::LoadCheckpoint, E::CheckpointLoaded) => P::Discover,
        (P::Discover, E::Discovered { count: 0 }) => P::Done,
        (P::Discover, E::Discovered { .. }) => P::Process,
        (P::Process, E::ProcessingFinished | E::ProcessingAborted) => P::Aggregate,
        (P::Aggregate, E::Aggregated { successes: 0 }) => P::Done,
        (P::Aggregate, E::Aggregated { .. }) => P::Dispatch,
        (P::Dispatch, E::DispatchSucceeded) => P::AdvanceCheckpoint,
        (P::Dispatch, E::DispatchFailed) => P::Error,
        (P::AdvanceCheckpoint, E::CheckpointAdvanced) => P::Done,
        (P::AdvanceCheckpoint, E::CheckpointFailed) => P::Error,
        (P::Error, E::ErrorReported) => P::Done,
        (phase, _) => phase,
    }
}
