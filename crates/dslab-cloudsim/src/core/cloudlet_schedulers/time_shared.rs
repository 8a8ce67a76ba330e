//! Time-shared policy.

use crate::core::cloudlet_scheduler::CloudletSchedulingPolicy;

/// Admits every cloudlet immediately, the VM PEs are divided among all executing cloudlets.
#[derive(Clone, Default)]
pub struct TimeSharedPolicy;

impl TimeSharedPolicy {
    pub fn new() -> Self {
        Self {}
    }
}

impl CloudletSchedulingPolicy for TimeSharedPolicy {
    fn name(&self) -> &str {
        "TimeShared"
    }

    fn can_execute(&self, _pes: u64, _free_pes: u64) -> bool {
        true
    }
}
