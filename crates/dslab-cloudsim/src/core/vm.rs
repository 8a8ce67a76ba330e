//! Representations of virtual machine, its resources and status.

use std::cell::RefCell;
use std::fmt::{Display, Formatter};
use std::rc::Rc;

use dslab_core::component::Id;
use serde::Serialize;

use crate::core::cloudlet::CloudletRef;
use crate::core::cloudlet_scheduler::CloudletScheduler;
use crate::core::error::ConfigError;
use crate::core::resource::{ResourceContainer, ResourceKind, Storage};

pub type VmId = u32;

pub type VmRef = Rc<RefCell<Vm>>;

/// Status of virtual machine.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum VmStatus {
    /// Submitted to a broker and waiting for placement.
    Waiting,
    Created,
    FailedToCreate,
    Destroyed,
}

impl Display for VmStatus {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        match self {
            VmStatus::Waiting => write!(f, "waiting"),
            VmStatus::Created => write!(f, "created"),
            VmStatus::FailedToCreate => write!(f, "failed_to_create"),
            VmStatus::Destroyed => write!(f, "destroyed"),
        }
    }
}

/// RAM (MB), bandwidth (Mbps) and storage of a VM, mutated only by the VM cloudlet scheduler.
#[derive(Clone, Debug, Serialize)]
pub struct VmResources {
    pub ram: ResourceContainer,
    pub bw: ResourceContainer,
    pub storage: Storage,
}

impl VmResources {
    pub fn new(ram: u64, bw: u64, storage: Storage) -> Self {
        Self {
            ram: ResourceContainer::new(ResourceKind::Ram, ram),
            bw: ResourceContainer::new(ResourceKind::Bandwidth, bw),
            storage,
        }
    }
}

/// Represents virtual machine (VM).
///
/// VM is characterized by its PEs with equal MIPS capacity, RAM, bandwidth and storage.
/// Each VM owns exactly one cloudlet scheduler.
pub struct Vm {
    pub id: VmId,
    pub pes: u64,
    pub mips: f64,
    /// Delay before the broker sends the first placement request.
    pub submission_delay: f64,
    /// VM is destroyed once idle after this time from its start.
    pub lifetime: Option<f64>,
    /// Time needed to boot the VM after placement, cloudlets sent to a booting VM are delayed.
    pub startup_delay: f64,
    /// Used by the closest-datacenter mapper.
    pub time_zone: f64,
    resources: VmResources,
    scheduler: CloudletScheduler,
    status: VmStatus,
    broker: Option<Id>,
    datacenter: Option<Id>,
    host: Option<u32>,
    group: Option<u32>,
    start_time: Option<f64>,
    stop_time: Option<f64>,
    idle_since: Option<f64>,
    expected_free_pes: u64,
    tried_datacenters: Vec<Id>,
    creation_attempts: u32,
}

impl Vm {
    pub fn new(
        id: VmId,
        pes: u64,
        mips: f64,
        resources: VmResources,
        mut scheduler: CloudletScheduler,
    ) -> Result<Self, ConfigError> {
        if pes == 0 {
            return Err(ConfigError::invalid("vm pes", "VM must have at least one PE"));
        }
        if mips < 0. {
            return Err(ConfigError::negative("vm mips", mips));
        }
        scheduler.bind(id, pes, mips)?;
        Ok(Self {
            id,
            pes,
            mips,
            submission_delay: 0.,
            lifetime: None,
            startup_delay: 0.,
            time_zone: 0.,
            resources,
            scheduler,
            status: VmStatus::Waiting,
            broker: None,
            datacenter: None,
            host: None,
            group: None,
            start_time: None,
            stop_time: None,
            idle_since: None,
            expected_free_pes: pes,
            tried_datacenters: Vec::new(),
            creation_attempts: 0,
        })
    }

    pub fn with_submission_delay(mut self, delay: f64) -> Self {
        self.submission_delay = delay.max(0.);
        self
    }

    pub fn with_lifetime(mut self, lifetime: f64) -> Self {
        self.lifetime = Some(lifetime);
        self
    }

    pub fn with_startup_delay(mut self, delay: f64) -> Self {
        self.startup_delay = delay.max(0.);
        self
    }

    pub fn with_time_zone(mut self, time_zone: f64) -> Self {
        self.time_zone = time_zone;
        self
    }

    pub fn total_mips(&self) -> f64 {
        self.mips * self.pes as f64
    }

    pub fn ram(&self) -> u64 {
        self.resources.ram.capacity()
    }

    pub fn bw(&self) -> u64 {
        self.resources.bw.capacity()
    }

    pub fn storage_size(&self) -> u64 {
        self.resources.storage.capacity()
    }

    pub fn resources(&self) -> &VmResources {
        &self.resources
    }

    pub fn scheduler(&self) -> &CloudletScheduler {
        &self.scheduler
    }

    pub fn scheduler_mut(&mut self) -> &mut CloudletScheduler {
        &mut self.scheduler
    }

    pub fn status(&self) -> VmStatus {
        self.status
    }

    pub fn is_created(&self) -> bool {
        self.status == VmStatus::Created
    }

    pub fn broker(&self) -> Option<Id> {
        self.broker
    }

    pub fn datacenter(&self) -> Option<Id> {
        self.datacenter
    }

    pub fn host(&self) -> Option<u32> {
        self.host
    }

    pub fn group(&self) -> Option<u32> {
        self.group
    }

    pub fn start_time(&self) -> Option<f64> {
        self.start_time
    }

    pub fn stop_time(&self) -> Option<f64> {
        self.stop_time
    }

    pub fn idle_since(&self) -> Option<f64> {
        self.idle_since
    }

    pub fn expected_free_pes(&self) -> u64 {
        self.expected_free_pes
    }

    pub fn tried_datacenters(&self) -> &[Id] {
        &self.tried_datacenters
    }

    pub fn creation_attempts(&self) -> u32 {
        self.creation_attempts
    }

    /// Remaining boot time of a VM placed on a host.
    pub fn boot_remaining(&self, time: f64) -> f64 {
        match self.start_time {
            Some(start) => (start + self.startup_delay - time).max(0.),
            None => self.startup_delay,
        }
    }

    pub fn lifetime_elapsed(&self, time: f64) -> bool {
        match (self.lifetime, self.start_time) {
            (Some(lifetime), Some(start)) => time >= start + lifetime - 1e-9,
            _ => false,
        }
    }

    /// Submits a cloudlet to the VM scheduler, the input file is read from the VM storage first.
    pub fn submit_cloudlet(&mut self, cloudlet: CloudletRef, time: f64) -> f64 {
        let file_size = cloudlet.borrow().file_size;
        let file_transfer_time = self.resources.storage.transfer_time(file_size);
        self.idle_since = None;
        self.scheduler.submit(cloudlet, file_transfer_time, time)
    }

    /// Updates processing of VM cloudlets, see [`CloudletScheduler::update_processing`].
    pub fn update_processing(&mut self, time: f64, mips_share: &[f64]) -> Option<f64> {
        let next = self.scheduler.update_processing(time, mips_share, &mut self.resources);
        if self.scheduler.is_empty() && self.idle_since.is_none() {
            self.idle_since = Some(time);
        }
        next
    }

    pub(crate) fn set_broker(&mut self, broker: Id) {
        self.broker = Some(broker);
    }

    pub(crate) fn set_group(&mut self, group: u32) {
        self.group = Some(group);
    }

    pub(crate) fn set_failed(&mut self) {
        self.status = VmStatus::FailedToCreate;
    }

    pub(crate) fn set_created(&mut self, datacenter: Id, host: u32, time: f64) {
        self.status = VmStatus::Created;
        self.datacenter = Some(datacenter);
        self.host = Some(host);
        self.start_time = Some(time);
        self.idle_since = Some(time);
        self.expected_free_pes = self.pes;
    }

    pub(crate) fn set_destroyed(&mut self, time: f64) {
        self.status = VmStatus::Destroyed;
        self.stop_time = Some(time);
        self.scheduler.cancel_all(time);
    }

    pub(crate) fn record_attempt(&mut self, datacenter: Id) {
        self.tried_datacenters.push(datacenter);
        self.creation_attempts += 1;
    }

    pub(crate) fn reset_tried_datacenters(&mut self) {
        self.tried_datacenters.clear();
    }

    pub(crate) fn reserve_pes(&mut self, pes: u64) {
        self.expected_free_pes = self.expected_free_pes.saturating_sub(pes);
    }

    pub(crate) fn release_pes(&mut self, pes: u64) {
        self.expected_free_pes = (self.expected_free_pes + pes).min(self.pes);
    }
}

/// VMs which must be placed together into the same datacenter.
pub struct VmGroup {
    pub id: u32,
    vms: Vec<VmRef>,
}

impl VmGroup {
    pub fn new(id: u32, vms: Vec<VmRef>) -> Result<Self, ConfigError> {
        if vms.is_empty() {
            return Err(ConfigError::EmptyVmGroup(id));
        }
        for vm in &vms {
            vm.borrow_mut().set_group(id);
        }
        Ok(Self { id, vms })
    }

    pub fn vms(&self) -> &[VmRef] {
        &self.vms
    }

    pub fn into_vms(self) -> Vec<VmRef> {
        self.vms
    }

    pub fn total_pes(&self) -> u64 {
        self.vms.iter().map(|vm| vm.borrow().pes).sum()
    }
}
