//! Scheduler-side execution record of a cloudlet.

use serde::Serialize;

use crate::core::cloudlet::{CloudletId, CloudletRef, CloudletStatus};
use crate::core::contention::OversubscriptionDelay;

/// Execution state of one cloudlet admitted to a [`CloudletScheduler`](crate::core::cloudlet_scheduler::CloudletScheduler).
///
/// Records are owned by the scheduler, the cloudlet itself is shared with the broker.
#[derive(Clone, Serialize)]
pub struct CloudletExecution {
    #[serde(skip)]
    cloudlet: CloudletRef,
    pub id: CloudletId,
    pub pes: u64,
    pub priority: i32,
    pub arrival_time: f64,
    pub file_transfer_time: f64,
    /// Time from which the next processing step is counted.
    pub last_processing_time: f64,
    /// MIPS allocated to each PE during the last processing step.
    pub allocated_mips: f64,
    pub allocated_ram: u64,
    pub allocated_bw: u64,
    pub last_delay: OversubscriptionDelay,
    pub virtual_runtime: f64,
    pub time_slice: f64,
    /// Number of times the cloudlet was preempted.
    pub rounds: u32,
}

impl CloudletExecution {
    pub fn new(cloudlet: CloudletRef, file_transfer_time: f64, time: f64) -> Self {
        let (id, pes, priority) = {
            let c = cloudlet.borrow();
            (c.id, c.pes, c.priority)
        };
        Self {
            cloudlet,
            id,
            pes,
            priority,
            arrival_time: time,
            file_transfer_time,
            last_processing_time: time,
            allocated_mips: 0.,
            allocated_ram: 0,
            allocated_bw: 0,
            last_delay: OversubscriptionDelay::None,
            virtual_runtime: 0.,
            time_slice: 0.,
            rounds: 0,
        }
    }

    pub fn cloudlet(&self) -> &CloudletRef {
        &self.cloudlet
    }

    pub fn status(&self) -> CloudletStatus {
        self.cloudlet.borrow().status()
    }

    pub(crate) fn set_status(&self, status: CloudletStatus) -> bool {
        self.cloudlet.borrow_mut().set_status(status)
    }

    pub fn remaining_length(&self) -> f64 {
        self.cloudlet.borrow().remaining_length()
    }

    pub fn is_finished(&self) -> bool {
        self.cloudlet.borrow().is_finished()
    }

    /// Estimated time to finish the cloudlet at the last allocated MIPS.
    pub fn estimated_time_to_finish(&self) -> f64 {
        let remaining = self.remaining_length();
        if remaining.is_infinite() || self.allocated_mips <= 0. {
            return f64::INFINITY;
        }
        remaining / self.allocated_mips
    }
}
