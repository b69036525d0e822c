//! Harvester core: pure domain types and run bookkeeping, free of IO.
mod chunk;
mod item;
mod phase;
mod report;
mod scan;
mod tally;

pub use chunk::ChunkPlan;
pub use item::{ItemId, ItemIdError, Source};
pub use phase::{transition, PhaseEvent, RunPhase};
pub use report::{Completion, DiscoveryStatus, DispatchOutcome, RunReport};
pub use scan::{DeltaScan, PassOutcome};
pub use tally::{ItemFailure, RunTally};
