//! Space-shared policy.

use crate::core::cloudlet_execution::CloudletExecution;
use crate::core::cloudlet_scheduler::CloudletSchedulingPolicy;

/// Admits a cloudlet only when enough PEs are free, admitted cloudlets run to completion.
///
/// Waiting cloudlets are considered in arrival order, a smaller cloudlet may pass a larger one which does not fit.
#[derive(Clone, Default)]
pub struct SpaceSharedPolicy;

impl SpaceSharedPolicy {
    pub fn new() -> Self {
        Self {}
    }
}

impl CloudletSchedulingPolicy for SpaceSharedPolicy {
    fn name(&self) -> &str {
        "SpaceShared"
    }

    fn can_execute(&self, pes: u64, free_pes: u64) -> bool {
        pes <= free_pes
    }

    fn sort_waiting(&self, waiting: &mut [CloudletExecution]) {
        waiting.sort_by(|a, b| a.arrival_time.total_cmp(&b.arrival_time).then(a.id.cmp(&b.id)));
    }
}
