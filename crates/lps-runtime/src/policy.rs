use std::time::Duration;

use lps_schemas::ExecutionBudget;

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(15);
pub const DEFAULT_WRITE_DEADLINE: Duration = Duration::from_secs(8 * 60);
pub const DEFAULT_BOOTSTRAP_DEADLINE: Duration = Duration::from_secs(48 * 60);
pub const DEFAULT_READ_DEPTH: u32 = 1000;

/// Per-run knobs for the orchestrator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunPolicy {
    pub budget: ExecutionBudget,
    /// Wait between confirmation reads (and between comparison retries).
    pub poll_interval: Duration,
    /// Confirmation deadline for one item write, measured from its submit.
    /// Also bounds comparison retries.
    pub write_deadline: Duration,
    /// Deadline for prerequisite (namespace) creation, which gates every
    /// dependent write.
    pub bootstrap_deadline: Duration,
    /// Blocks inspected by read-only queries.
    pub read_depth: u32,
    /// Non-zero exit when any item is not current or confirmed.
    pub strict: bool,
    /// Items processed at once. 1 = sequential.
    pub max_concurrency: usize,
}

impl Default for RunPolicy {
    fn default() -> Self {
        Self {
            budget: ExecutionBudget::default(),
            poll_interval: DEFAULT_POLL_INTERVAL,
            write_deadline: DEFAULT_WRITE_DEADLINE,
            bootstrap_deadline: DEFAULT_BOOTSTRAP_DEADLINE,
            read_depth: DEFAULT_READ_DEPTH,
            strict: false,
            max_concurrency: 1,
        }
    }
}
