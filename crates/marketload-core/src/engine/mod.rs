pub mod aggregator;
pub mod coordinator;
pub mod session;

pub use aggregator::aggregate;
pub use coordinator::{RunCoordinator, RunEvent};
pub use session::{run_session, Sampler, SessionPhase, ThreadRngSampler};
