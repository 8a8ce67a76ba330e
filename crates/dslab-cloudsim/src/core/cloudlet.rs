//! Cloudlet (computational task) and its status.

use std::cell::RefCell;
use std::fmt::{Display, Formatter};
use std::rc::Rc;

use dslab_core::component::Id;
use serde::Serialize;

use crate::core::utilization::{ConstantUtilization, FullUtilization, UtilizationModel};
use crate::core::vm::VmId;

pub type CloudletId = u64;

pub type CloudletRef = Rc<RefCell<Cloudlet>>;

/// Status of a cloudlet.
///
/// ```text
/// FROZEN -> READY -> QUEUED <-> INEXEC -> SUCCESS
///             |        |          |
///             +--------+--> PAUSED +--> QUEUED | INEXEC
/// ```
/// Any non-terminal status may also become `Canceled` or `Failed`. A queued cloudlet which was preempted
/// becomes `Success` when its lifetime expires while waiting.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
pub enum CloudletStatus {
    /// Waits for an explicit ready signal before it may be scheduled.
    Frozen,
    Ready,
    Queued,
    InExec,
    Paused,
    Success,
    Failed,
    Canceled,
}

impl CloudletStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Success | Self::Failed | Self::Canceled)
    }

    /// Whether the scheduler may admit a cloudlet in this status to execution.
    pub fn is_admissible(&self) -> bool {
        matches!(self, Self::Ready | Self::Queued | Self::InExec)
    }

    pub fn can_transition_to(&self, next: CloudletStatus) -> bool {
        use CloudletStatus::*;
        if *self == next {
            return !self.is_terminal();
        }
        match (self, next) {
            (s, Canceled | Failed) => !s.is_terminal(),
            (Frozen, Ready) => true,
            (Ready, Queued | InExec | Paused | Success) => true,
            (Queued, InExec | Paused | Success) => true,
            (InExec, Paused | Queued | Success) => true,
            (Paused, Queued | InExec) => true,
            _ => false,
        }
    }
}

impl Display for CloudletStatus {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        match self {
            CloudletStatus::Frozen => write!(f, "frozen"),
            CloudletStatus::Ready => write!(f, "ready"),
            CloudletStatus::Queued => write!(f, "queued"),
            CloudletStatus::InExec => write!(f, "in_exec"),
            CloudletStatus::Paused => write!(f, "paused"),
            CloudletStatus::Success => write!(f, "success"),
            CloudletStatus::Failed => write!(f, "failed"),
            CloudletStatus::Canceled => write!(f, "canceled"),
        }
    }
}

/// Length of a cloudlet in MI (million instructions) to be executed on each of its PEs.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub enum CloudletLength {
    Finite(u64),
    /// Runs until canceled, failed or its lifetime expires.
    Indefinite,
}

impl CloudletLength {
    pub fn as_f64(&self) -> f64 {
        match self {
            CloudletLength::Finite(length) => *length as f64,
            CloudletLength::Indefinite => f64::INFINITY,
        }
    }
}

/// Represents a cloudlet: a unit of computation requiring some PEs for some number of instructions.
///
/// The status can only be changed by the crate, following [`CloudletStatus::can_transition_to`].
#[derive(Clone)]
pub struct Cloudlet {
    pub id: CloudletId,
    pub job_id: u64,
    pub pes: u64,
    pub length: CloudletLength,
    /// Input file size in MB, read from the VM storage before execution starts.
    pub file_size: u64,
    pub output_size: u64,
    pub priority: i32,
    /// Maximum execution time counted from the first admission.
    pub lifetime: Option<f64>,
    /// Delay applied by the broker when dispatching the cloudlet to its VM.
    pub submission_delay: f64,
    /// CPU utilization, the whole allocated MIPS by default.
    pub utilization_cpu: Box<dyn UtilizationModel>,
    /// RAM and bandwidth utilization, none by default.
    pub utilization_ram: Box<dyn UtilizationModel>,
    pub utilization_bw: Box<dyn UtilizationModel>,
    status: CloudletStatus,
    vm: Option<VmId>,
    broker: Option<Id>,
    datacenter: Option<Id>,
    arrival_time: Option<f64>,
    exec_start_time: Option<f64>,
    finish_time: Option<f64>,
    finished_length: f64,
    oversubscription_delay: f64,
}

impl Cloudlet {
    pub fn new(id: CloudletId, length: CloudletLength, pes: u64) -> Self {
        Self {
            id,
            job_id: 0,
            pes: pes.max(1),
            length,
            file_size: 0,
            output_size: 0,
            priority: 0,
            lifetime: None,
            submission_delay: 0.,
            utilization_cpu: Box::new(FullUtilization),
            utilization_ram: Box::new(ConstantUtilization::new(0.)),
            utilization_bw: Box::new(ConstantUtilization::new(0.)),
            status: CloudletStatus::Ready,
            vm: None,
            broker: None,
            datacenter: None,
            arrival_time: None,
            exec_start_time: None,
            finish_time: None,
            finished_length: 0.,
            oversubscription_delay: 0.,
        }
    }

    /// Creates a cloudlet that waits for [`ready`](crate::core::cloudlet_scheduler::CloudletScheduler::ready)
    /// before it may be scheduled.
    pub fn frozen(id: CloudletId, length: CloudletLength, pes: u64) -> Self {
        let mut cloudlet = Self::new(id, length, pes);
        cloudlet.status = CloudletStatus::Frozen;
        cloudlet
    }

    pub fn with_job(mut self, job_id: u64) -> Self {
        self.job_id = job_id;
        self
    }

    pub fn with_files(mut self, file_size: u64, output_size: u64) -> Self {
        self.file_size = file_size;
        self.output_size = output_size;
        self
    }

    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_lifetime(mut self, lifetime: f64) -> Self {
        self.lifetime = Some(lifetime);
        self
    }

    pub fn with_submission_delay(mut self, delay: f64) -> Self {
        self.submission_delay = delay.max(0.);
        self
    }

    pub fn with_cpu_utilization(mut self, model: Box<dyn UtilizationModel>) -> Self {
        self.utilization_cpu = model;
        self
    }

    pub fn with_ram_utilization(mut self, model: Box<dyn UtilizationModel>) -> Self {
        self.utilization_ram = model;
        self
    }

    pub fn with_bw_utilization(mut self, model: Box<dyn UtilizationModel>) -> Self {
        self.utilization_bw = model;
        self
    }

    /// Binds the cloudlet to a VM, so the broker dispatches it only there.
    pub fn with_vm(mut self, vm_id: VmId) -> Self {
        self.vm = Some(vm_id);
        self
    }

    pub fn status(&self) -> CloudletStatus {
        self.status
    }

    /// Changes the status if the transition is allowed, returns whether it was applied.
    pub(crate) fn set_status(&mut self, status: CloudletStatus) -> bool {
        if !self.status.can_transition_to(status) {
            log::debug!(
                "cloudlet {}: ignored status change {} -> {}",
                self.id,
                self.status,
                status
            );
            return false;
        }
        self.status = status;
        true
    }

    pub fn vm(&self) -> Option<VmId> {
        self.vm
    }

    pub(crate) fn set_vm(&mut self, vm_id: Option<VmId>) {
        self.vm = vm_id;
    }

    pub fn broker(&self) -> Option<Id> {
        self.broker
    }

    pub(crate) fn set_broker(&mut self, broker: Id) {
        self.broker = Some(broker);
    }

    /// Datacenter the cloudlet was last dispatched to.
    pub fn datacenter(&self) -> Option<Id> {
        self.datacenter
    }

    pub(crate) fn set_datacenter(&mut self, datacenter: Id) {
        self.datacenter = Some(datacenter);
    }

    /// Time when the cloudlet arrived at the VM scheduler.
    pub fn arrival_time(&self) -> Option<f64> {
        self.arrival_time
    }

    pub(crate) fn set_arrival_time(&mut self, time: f64) {
        self.arrival_time = Some(time);
    }

    /// Time of the first admission to execution.
    pub fn exec_start_time(&self) -> Option<f64> {
        self.exec_start_time
    }

    pub(crate) fn mark_started(&mut self, time: f64) {
        if self.exec_start_time.is_none() {
            self.exec_start_time = Some(time);
        }
    }

    pub fn finish_time(&self) -> Option<f64> {
        self.finish_time
    }

    pub(crate) fn set_finish_time(&mut self, time: f64) {
        self.finish_time = Some(time);
    }

    /// Executed instructions per PE in MI.
    pub fn finished_length(&self) -> f64 {
        self.finished_length
    }

    pub(crate) fn add_finished_length(&mut self, length: f64) {
        self.finished_length += length;
    }

    pub fn remaining_length(&self) -> f64 {
        (self.length.as_f64() - self.finished_length).max(0.)
    }

    pub fn is_finished(&self) -> bool {
        match self.length {
            CloudletLength::Finite(_) => self.remaining_length() < 1e-6,
            CloudletLength::Indefinite => false,
        }
    }

    /// Total time the cloudlet was delayed by RAM or bandwidth oversubscription.
    pub fn oversubscription_delay(&self) -> f64 {
        self.oversubscription_delay
    }

    pub(crate) fn add_oversubscription_delay(&mut self, delay: f64) {
        self.oversubscription_delay += delay;
    }

    pub fn wait_time(&self) -> Option<f64> {
        Some(self.exec_start_time? - self.arrival_time?)
    }

    pub fn lifetime_expired(&self, time: f64) -> bool {
        match (self.lifetime, self.exec_start_time) {
            (Some(lifetime), Some(start)) => time >= start + lifetime - 1e-9,
            _ => false,
        }
    }
}
