//! Refresh engine: staleness gate, snapshot differ, batch-job poller, and
//! the background refresh coordinator that ties them together.

pub mod coordinator;
pub mod diff;
pub mod poller;
pub mod staleness;

pub use coordinator::RefreshCoordinator;
pub use diff::{diff, DiffOutcome};
pub use poller::{JobPoller, PollerConfig};
pub use staleness::{is_stale, should_trigger_refresh};
