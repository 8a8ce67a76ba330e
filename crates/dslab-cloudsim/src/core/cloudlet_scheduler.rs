//! Cloudlet scheduler: admission, execution bookkeeping and resource contention for one VM.

use std::collections::HashSet;
use std::rc::Rc;

use serde::Serialize;

use crate::core::cloudlet::{CloudletId, CloudletRef, CloudletStatus};
use crate::core::cloudlet_execution::CloudletExecution;
use crate::core::cloudlet_schedulers::completely_fair::CompletelyFairPolicy;
use crate::core::cloudlet_schedulers::space_shared::SpaceSharedPolicy;
use crate::core::cloudlet_schedulers::time_shared::TimeSharedPolicy;
use crate::core::config::options::{parse_config_value, parse_option_or, parse_options};
use crate::core::config::sim_config::SimulationConfig;
use crate::core::contention::{bandwidth_delay, memory_delay, mips_per_pe};
use crate::core::error::ConfigError;
use crate::core::listener::Listeners;
use crate::core::resource::ResourceKind;
use crate::core::vm::{VmId, VmResources};

/// Trait for implementation of cloudlet scheduling policies.
///
/// A policy decides whether a cloudlet can be admitted to execution, in which order waiting cloudlets
/// are considered and, for preemptive policies, when an executing cloudlet must give its PEs away.
/// Execution bookkeeping and resource contention are done by [`CloudletScheduler`].
pub trait CloudletSchedulingPolicy {
    fn name(&self) -> &str;

    fn can_execute(&self, pes: u64, free_pes: u64) -> bool;

    fn is_preemptive(&self) -> bool {
        false
    }

    /// Called once when the cloudlet is submitted to the scheduler.
    fn on_submit(&self, _rec: &mut CloudletExecution) {}

    /// Called each time the cloudlet is admitted to execution.
    fn on_admit(&self, _rec: &mut CloudletExecution) {}

    /// Called after the cloudlet was processed for `span` seconds.
    fn on_processed(&self, _rec: &mut CloudletExecution, _span: f64) {}

    /// Called when an expired cloudlet is moved back to the waiting list.
    fn on_preempt(&self, _rec: &mut CloudletExecution) {}

    fn sort_waiting(&self, _waiting: &mut [CloudletExecution]) {}

    fn update_time_slices(&self, _exec: &mut [CloudletExecution], _waiting: &[CloudletExecution]) {}

    fn is_expired(&self, _rec: &CloudletExecution) -> bool {
        false
    }

    /// Time left until the cloudlet exhausts its time slice.
    fn time_slice_remaining(&self, _rec: &CloudletExecution) -> Option<f64> {
        None
    }
}

/// Resolves scheduler from config string, e.g. `TimeShared`, `SpaceShared` or `CompletelyFair[latency=3]`.
///
/// Completely fair scheduler options default to `cfs_latency` and `cfs_min_granularity` from config.
pub fn scheduler_resolver(config_str: &str, config: &SimulationConfig) -> Result<CloudletScheduler, ConfigError> {
    let (name, options) = parse_config_value(config_str);
    let policy: Box<dyn CloudletSchedulingPolicy> = match name.as_str() {
        "TimeShared" => Box::new(TimeSharedPolicy::new()),
        "SpaceShared" => Box::new(SpaceSharedPolicy::new()),
        "CompletelyFair" => {
            let options = parse_options(&options.unwrap_or_default());
            let latency = parse_option_or(&options, "latency", config.cfs_latency)?;
            let min_granularity = parse_option_or(&options, "min_granularity", config.cfs_min_granularity)?;
            Box::new(CompletelyFairPolicy::new(latency, min_granularity)?)
        }
        _ => {
            return Err(ConfigError::UnknownPolicy {
                kind: "cloudlet scheduler",
                name: config_str.to_string(),
            })
        }
    };
    Ok(CloudletScheduler::new(policy).with_min_time_between_events(config.min_time_between_events))
}

/// Reported when a cloudlet gets less RAM or bandwidth than it requests.
#[derive(Clone, Debug, Serialize)]
pub struct ResourceShortage {
    pub kind: ResourceKind,
    pub cloudlet_id: CloudletId,
    pub vm_id: Option<VmId>,
    pub requested: u64,
    pub available: u64,
    pub time: f64,
}

#[derive(Clone, Copy, PartialEq)]
enum ListKind {
    Exec,
    Paused,
    Waiting,
    Finished,
    Failed,
}

/// Schedules cloudlets of a single VM using a pluggable [`CloudletSchedulingPolicy`].
///
/// All operations take the current simulation time explicitly. The scheduler keeps cloudlets in five
/// disjoint lists: executing, paused, waiting, finished (including canceled) and failed.
pub struct CloudletScheduler {
    policy: Box<dyn CloudletSchedulingPolicy>,
    vm_id: Option<VmId>,
    current_share: Vec<f64>,
    min_time_between_events: f64,
    previous_time: f64,
    exec: Vec<CloudletExecution>,
    paused: Vec<CloudletExecution>,
    waiting: Vec<CloudletExecution>,
    finished: Vec<CloudletExecution>,
    failed: Vec<CloudletExecution>,
    returned: Vec<CloudletRef>,
    released_ram: u64,
    released_bw: u64,
    shortage_listeners: Rc<Listeners<ResourceShortage>>,
    // shortages already reported at `shortage_time`
    reported_shortages: HashSet<(ResourceKind, CloudletId)>,
    shortage_time: f64,
}

impl CloudletScheduler {
    pub fn new(policy: Box<dyn CloudletSchedulingPolicy>) -> Self {
        Self {
            policy,
            vm_id: None,
            current_share: Vec::new(),
            min_time_between_events: 0.1,
            previous_time: 0.,
            exec: Vec::new(),
            paused: Vec::new(),
            waiting: Vec::new(),
            finished: Vec::new(),
            failed: Vec::new(),
            returned: Vec::new(),
            released_ram: 0,
            released_bw: 0,
            shortage_listeners: Rc::new(Listeners::new()),
            reported_shortages: HashSet::new(),
            shortage_time: f64::NEG_INFINITY,
        }
    }

    pub fn time_shared() -> Self {
        Self::new(Box::new(TimeSharedPolicy::new()))
    }

    pub fn space_shared() -> Self {
        Self::new(Box::new(SpaceSharedPolicy::new()))
    }

    pub fn completely_fair() -> Self {
        Self::new(Box::new(CompletelyFairPolicy::default()))
    }

    pub fn with_min_time_between_events(mut self, min_time: f64) -> Self {
        self.min_time_between_events = min_time;
        self
    }

    pub fn policy_name(&self) -> &str {
        self.policy.name()
    }

    /// Attaches the scheduler to a VM. A scheduler serves exactly one VM.
    pub fn bind(&mut self, vm_id: VmId, pes: u64, mips: f64) -> Result<(), ConfigError> {
        if let Some(bound) = self.vm_id {
            if bound != vm_id {
                return Err(ConfigError::SchedulerAlreadyBound {
                    bound,
                    requested: vm_id,
                });
            }
        }
        self.vm_id = Some(vm_id);
        self.current_share = vec![mips; pes as usize];
        Ok(())
    }

    pub fn vm_id(&self) -> Option<VmId> {
        self.vm_id
    }

    /// Listeners notified about every RAM or bandwidth shortage detected while processing cloudlets.
    pub fn shortage_listeners(&self) -> Rc<Listeners<ResourceShortage>> {
        self.shortage_listeners.clone()
    }

    pub fn previous_time(&self) -> f64 {
        self.previous_time
    }

    // Queries -------------------------------------------------------------------------------------

    pub fn total_pes(&self) -> u64 {
        self.current_share.len() as u64
    }

    fn capacity_per_pe(&self) -> f64 {
        if self.current_share.is_empty() {
            return 0.;
        }
        self.current_share.iter().sum::<f64>() / self.current_share.len() as f64
    }

    fn requested_pes(&self) -> u64 {
        self.exec.iter().map(|rec| rec.pes).sum()
    }

    pub fn used_pes(&self) -> u64 {
        self.requested_pes().min(self.total_pes())
    }

    pub fn free_pes(&self) -> u64 {
        self.total_pes() - self.used_pes()
    }

    /// Whether the scheduler has no executing, paused or waiting cloudlets.
    pub fn is_empty(&self) -> bool {
        self.exec.is_empty() && self.paused.is_empty() && self.waiting.is_empty()
    }

    /// Share of VM CPU capacity allocated to executing cloudlets at `time`.
    pub fn allocated_cpu_percent(&self, time: f64) -> f64 {
        let total_pes = self.total_pes();
        if total_pes == 0 {
            return 0.;
        }
        let capacity = self.capacity_per_pe();
        let mips = mips_per_pe(capacity, self.requested_pes(), total_pes);
        let allocated: f64 = self
            .exec
            .iter()
            .map(|rec| rec.pes as f64 * mips * rec.cloudlet().borrow().utilization_cpu.fraction(time, capacity))
            .sum();
        (allocated / (capacity * total_pes as f64)).min(1.)
    }

    /// Share of VM CPU capacity requested by executing cloudlets at `time`, may exceed 1.
    pub fn requested_cpu_percent(&self, time: f64) -> f64 {
        let total_pes = self.total_pes();
        if total_pes == 0 {
            return 0.;
        }
        let capacity = self.capacity_per_pe();
        let requested: f64 = self
            .exec
            .iter()
            .map(|rec| rec.pes as f64 * rec.cloudlet().borrow().utilization_cpu.fraction(time, capacity))
            .sum();
        requested / total_pes as f64
    }

    pub fn exec_list(&self) -> &[CloudletExecution] {
        &self.exec
    }

    pub fn paused_list(&self) -> &[CloudletExecution] {
        &self.paused
    }

    pub fn waiting_list(&self) -> &[CloudletExecution] {
        &self.waiting
    }

    pub fn finished_list(&self) -> &[CloudletExecution] {
        &self.finished
    }

    pub fn failed_list(&self) -> &[CloudletExecution] {
        &self.failed
    }

    /// Drains cloudlets which reached a terminal status since the previous call.
    pub fn take_returned(&mut self) -> Vec<CloudletRef> {
        std::mem::take(&mut self.returned)
    }

    // Submission and processing -------------------------------------------------------------------

    /// Submits a cloudlet, returns the expected time to finish it or 0 if it has to wait.
    pub fn submit(&mut self, cloudlet: CloudletRef, file_transfer_time: f64, time: f64) -> f64 {
        cloudlet.borrow_mut().set_arrival_time(time);
        let mut rec = CloudletExecution::new(cloudlet, file_transfer_time, time);
        self.policy.on_submit(&mut rec);
        let status = rec.status();
        if status == CloudletStatus::Frozen {
            log::debug!("[{:.3} vm-{}] cloudlet {} is frozen", time, self.vm_label(), rec.id);
            self.waiting.push(rec);
            self.policy.sort_waiting(&mut self.waiting);
            return 0.;
        }
        let expected = if self.policy.can_execute(rec.pes, self.free_pes()) {
            self.admit(rec, time)
        } else {
            rec.set_status(CloudletStatus::Queued);
            log::debug!(
                "[{:.3} vm-{}] cloudlet {} is queued, {} free PEs",
                time,
                self.vm_label(),
                rec.id,
                self.free_pes()
            );
            self.waiting.push(rec);
            self.policy.sort_waiting(&mut self.waiting);
            0.
        };
        if self.policy.is_preemptive() {
            self.policy.update_time_slices(&mut self.exec, &self.waiting);
        }
        expected
    }

    fn admit(&mut self, mut rec: CloudletExecution, time: f64) -> f64 {
        let first_admission = {
            let mut cloudlet = rec.cloudlet().borrow_mut();
            let first = cloudlet.exec_start_time().is_none();
            cloudlet.set_status(CloudletStatus::InExec);
            cloudlet.mark_started(time);
            first
        };
        let transfer = if first_admission { rec.file_transfer_time } else { 0. };
        rec.last_processing_time = time + transfer;
        self.policy.on_admit(&mut rec);
        let mips = mips_per_pe(self.capacity_per_pe(), self.requested_pes() + rec.pes, self.total_pes());
        rec.allocated_mips = mips;
        let mut expected = transfer + rec.estimated_time_to_finish();
        if let Some(remaining) = self.lifetime_remaining(&rec, time) {
            expected = expected.min(remaining);
        }
        log::debug!(
            "[{:.3} vm-{}] cloudlet {} admitted to execution",
            time,
            self.vm_label(),
            rec.id
        );
        self.exec.push(rec);
        expected
    }

    fn lifetime_remaining(&self, rec: &CloudletExecution, time: f64) -> Option<f64> {
        let cloudlet = rec.cloudlet().borrow();
        let lifetime = cloudlet.lifetime?;
        let start = cloudlet.exec_start_time()?;
        Some((start + lifetime - time).max(0.))
    }

    /// Advances execution of all admitted cloudlets up to `time`.
    ///
    /// `mips_share` is the MIPS capacity given to each VM PE by the host, an empty slice keeps the previous share.
    /// Returns the delay until some cloudlet needs re-evaluation, or `None` if nothing is executing.
    pub fn update_processing(&mut self, time: f64, mips_share: &[f64], resources: &mut VmResources) -> Option<f64> {
        if !mips_share.is_empty() {
            self.current_share = mips_share.to_vec();
        }
        resources.ram.deallocate(std::mem::take(&mut self.released_ram));
        resources.bw.deallocate(std::mem::take(&mut self.released_bw));
        for rec in self.exec.iter_mut() {
            resources.ram.deallocate(rec.allocated_ram);
            resources.bw.deallocate(rec.allocated_bw);
            rec.allocated_ram = 0;
            rec.allocated_bw = 0;
        }

        let capacity = self.capacity_per_pe();
        let base_mips = mips_per_pe(capacity, self.requested_pes(), self.total_pes());
        let mut shortages = Vec::new();
        for rec in self.exec.iter_mut() {
            let (cpu_fraction, ram_requested, bw_requested) = {
                let cloudlet = rec.cloudlet().borrow();
                (
                    cloudlet.utilization_cpu.fraction(time, capacity),
                    cloudlet.utilization_ram.requested_amount(time, resources.ram.capacity()),
                    cloudlet.utilization_bw.requested_amount(time, resources.bw.capacity()),
                )
            };
            rec.allocated_mips = base_mips * cpu_fraction;

            let ram_available = resources.ram.available();
            let ram_delay = memory_delay(ram_requested, ram_available, resources.ram.capacity(), &resources.storage);
            rec.allocated_ram = resources.ram.allocate_up_to(ram_requested);
            if ram_requested > ram_available {
                shortages.push((ResourceKind::Ram, rec.id, ram_requested, ram_available));
            }

            let bw_available = resources.bw.available();
            let bw_delay = bandwidth_delay(bw_requested, bw_available, resources.bw.capacity());
            rec.allocated_bw = resources.bw.allocate_up_to(bw_requested);
            if bw_requested > bw_available {
                shortages.push((ResourceKind::Bandwidth, rec.id, bw_requested, bw_available));
            }

            rec.last_delay = ram_delay.max(bw_delay);
            let span = time - rec.last_processing_time;
            if span > 0. {
                let effective = rec.last_delay.effective_span(span);
                let mut cloudlet = rec.cloudlet().borrow_mut();
                let progress = (rec.allocated_mips * effective).min(cloudlet.remaining_length());
                cloudlet.add_finished_length(progress);
                cloudlet.add_oversubscription_delay(span - effective);
                drop(cloudlet);
                self.policy.on_processed(rec, span);
                rec.last_processing_time = time;
            }
        }
        if time != self.shortage_time {
            self.reported_shortages.clear();
            self.shortage_time = time;
        }
        for (kind, cloudlet_id, requested, available) in shortages {
            if !self.reported_shortages.insert((kind, cloudlet_id)) {
                continue;
            }
            log::warn!(
                "[{:.3} vm-{}] cloudlet {} requested {} {} but only {} is available",
                time,
                self.vm_label(),
                cloudlet_id,
                requested,
                kind,
                available
            );
            self.shortage_listeners.notify(&ResourceShortage {
                kind,
                cloudlet_id,
                vm_id: self.vm_id,
                requested,
                available,
                time,
            });
        }

        self.finish_expired_waiting(time);
        let mut i = 0;
        while i < self.exec.len() {
            let done = {
                let cloudlet = self.exec[i].cloudlet().borrow();
                cloudlet.is_finished() || cloudlet.lifetime_expired(time)
            };
            if done {
                let rec = self.exec.remove(i);
                self.finish(rec, time);
            } else {
                i += 1;
            }
        }

        let preempted = self.preempt_expired(time);
        self.admit_waiting(time);
        if !preempted.is_empty() {
            self.waiting.extend(preempted);
            self.admit_waiting(time);
        }
        resources.ram.deallocate(std::mem::take(&mut self.released_ram));
        resources.bw.deallocate(std::mem::take(&mut self.released_bw));
        self.refresh_allocated_mips(time);
        self.previous_time = time;
        self.next_event_delay(time)
    }

    /// Preempted cloudlets keep their lifetime deadline while waiting for PEs.
    fn finish_expired_waiting(&mut self, time: f64) {
        let mut i = 0;
        while i < self.waiting.len() {
            let expired = {
                let cloudlet = self.waiting[i].cloudlet().borrow();
                cloudlet.status() == CloudletStatus::Queued && cloudlet.lifetime_expired(time)
            };
            if expired {
                let rec = self.waiting.remove(i);
                self.finish(rec, time);
            } else {
                i += 1;
            }
        }
    }

    fn has_runnable_waiting(&self) -> bool {
        self.waiting.iter().any(|rec| rec.status().is_admissible())
    }

    fn preempt_expired(&mut self, time: f64) -> Vec<CloudletExecution> {
        if !self.policy.is_preemptive() {
            return Vec::new();
        }
        self.policy.update_time_slices(&mut self.exec, &self.waiting);
        let runnable_waiting = self.has_runnable_waiting();
        let mut preempted = Vec::new();
        let mut i = 0;
        while i < self.exec.len() {
            if !self.policy.is_expired(&self.exec[i]) {
                i += 1;
                continue;
            }
            if !runnable_waiting {
                // nobody to yield to, start a new slice
                self.exec[i].virtual_runtime = 0.;
                i += 1;
                continue;
            }
            let mut rec = self.exec.remove(i);
            self.release(&mut rec);
            rec.set_status(CloudletStatus::Queued);
            self.policy.on_preempt(&mut rec);
            log::debug!(
                "[{:.3} vm-{}] cloudlet {} preempted after its time slice {:.3}",
                time,
                self.vm_label(),
                rec.id,
                rec.time_slice
            );
            preempted.push(rec);
        }
        preempted
    }

    fn admit_waiting(&mut self, time: f64) {
        self.policy.sort_waiting(&mut self.waiting);
        let mut i = 0;
        while i < self.waiting.len() {
            let rec = &self.waiting[i];
            if rec.status().is_admissible() && self.policy.can_execute(rec.pes, self.free_pes()) {
                let rec = self.waiting.remove(i);
                self.admit(rec, time);
            } else {
                i += 1;
            }
        }
        if self.policy.is_preemptive() {
            self.policy.update_time_slices(&mut self.exec, &self.waiting);
        }
    }

    fn refresh_allocated_mips(&mut self, time: f64) {
        let capacity = self.capacity_per_pe();
        let base_mips = mips_per_pe(capacity, self.requested_pes(), self.total_pes());
        for rec in self.exec.iter_mut() {
            let fraction = rec.cloudlet().borrow().utilization_cpu.fraction(time, capacity);
            rec.allocated_mips = base_mips * fraction;
        }
    }

    fn next_event_delay(&self, time: f64) -> Option<f64> {
        if self.exec.is_empty() {
            return None;
        }
        let slices_matter = self.policy.is_preemptive() && self.has_runnable_waiting();
        let mut next = f64::INFINITY;
        for rec in &self.exec {
            let pending_transfer = (rec.last_processing_time - time).max(0.);
            next = next.min(pending_transfer + rec.estimated_time_to_finish());
            if let Some(remaining) = self.lifetime_remaining(rec, time) {
                next = next.min(remaining);
            }
            if slices_matter {
                if let Some(remaining) = self.policy.time_slice_remaining(rec) {
                    next = next.min(pending_transfer + remaining);
                }
            }
        }
        if next.is_finite() {
            Some(next.max(self.min_time_between_events))
        } else {
            None
        }
    }

    fn release(&mut self, rec: &mut CloudletExecution) {
        self.released_ram += rec.allocated_ram;
        self.released_bw += rec.allocated_bw;
        rec.allocated_ram = 0;
        rec.allocated_bw = 0;
        rec.allocated_mips = 0.;
    }

    fn finish(&mut self, mut rec: CloudletExecution, time: f64) {
        self.release(&mut rec);
        {
            let mut cloudlet = rec.cloudlet().borrow_mut();
            cloudlet.set_status(CloudletStatus::Success);
            cloudlet.set_finish_time(time);
        }
        log::debug!("[{:.3} vm-{}] cloudlet {} finished", time, self.vm_label(), rec.id);
        self.returned.push(rec.cloudlet().clone());
        self.finished.push(rec);
    }

    fn terminate(&mut self, mut rec: CloudletExecution, status: CloudletStatus, time: f64) {
        self.release(&mut rec);
        {
            let mut cloudlet = rec.cloudlet().borrow_mut();
            cloudlet.set_status(status);
            cloudlet.set_finish_time(time);
        }
        log::debug!("[{:.3} vm-{}] cloudlet {} is {}", time, self.vm_label(), rec.id, status);
        self.returned.push(rec.cloudlet().clone());
        if status == CloudletStatus::Failed {
            self.failed.push(rec);
        } else {
            self.finished.push(rec);
        }
    }

    // Status transitions --------------------------------------------------------------------------

    fn locate(&self, id: CloudletId) -> Option<(ListKind, usize)> {
        [
            (ListKind::Exec, &self.exec),
            (ListKind::Paused, &self.paused),
            (ListKind::Waiting, &self.waiting),
            (ListKind::Finished, &self.finished),
            (ListKind::Failed, &self.failed),
        ]
        .into_iter()
        .find_map(|(kind, list)| list.iter().position(|rec| rec.id == id).map(|pos| (kind, pos)))
    }

    fn take(&mut self, kind: ListKind, pos: usize) -> CloudletExecution {
        match kind {
            ListKind::Exec => self.exec.remove(pos),
            ListKind::Paused => self.paused.remove(pos),
            ListKind::Waiting => self.waiting.remove(pos),
            ListKind::Finished => self.finished.remove(pos),
            ListKind::Failed => self.failed.remove(pos),
        }
    }

    /// Finalizes a cloudlet which has nothing left to execute.
    fn finish_if_done(&mut self, rec: CloudletExecution, time: f64) -> Option<CloudletExecution> {
        let status = rec.status();
        if matches!(status, CloudletStatus::InExec | CloudletStatus::Ready) && rec.is_finished() {
            self.finish(rec, time);
            return None;
        }
        Some(rec)
    }

    /// Pauses an executing or waiting cloudlet, returns whether the cloudlet was found.
    pub fn pause(&mut self, id: CloudletId, time: f64) -> bool {
        let Some((kind, pos)) = self.locate(id) else {
            return false;
        };
        if !matches!(kind, ListKind::Exec | ListKind::Waiting) {
            return true;
        }
        let mut rec = self.take(kind, pos);
        if kind == ListKind::Exec {
            self.release(&mut rec);
        }
        let Some(rec) = self.finish_if_done(rec, time) else {
            return true;
        };
        if rec.set_status(CloudletStatus::Paused) {
            log::debug!("[{:.3} vm-{}] cloudlet {} paused", time, self.vm_label(), id);
            self.paused.push(rec);
        } else {
            // frozen cloudlets stay in the waiting list
            self.waiting.insert(pos.min(self.waiting.len()), rec);
        }
        true
    }

    /// Resumes a paused cloudlet, returns whether the cloudlet was found.
    pub fn resume(&mut self, id: CloudletId, time: f64) -> bool {
        let Some((kind, pos)) = self.locate(id) else {
            return false;
        };
        if kind != ListKind::Paused {
            return true;
        }
        let rec = self.take(kind, pos);
        if self.policy.can_execute(rec.pes, self.free_pes()) {
            self.admit(rec, time);
        } else {
            rec.set_status(CloudletStatus::Queued);
            self.waiting.push(rec);
            self.policy.sort_waiting(&mut self.waiting);
        }
        log::debug!("[{:.3} vm-{}] cloudlet {} resumed", time, self.vm_label(), id);
        true
    }

    /// Cancels a cloudlet, returns whether the cloudlet was found.
    pub fn cancel(&mut self, id: CloudletId, time: f64) -> bool {
        self.terminate_by_id(id, CloudletStatus::Canceled, time)
    }

    /// Marks a cloudlet as failed, returns whether the cloudlet was found.
    pub fn fail(&mut self, id: CloudletId, time: f64) -> bool {
        self.terminate_by_id(id, CloudletStatus::Failed, time)
    }

    fn terminate_by_id(&mut self, id: CloudletId, status: CloudletStatus, time: f64) -> bool {
        let Some((kind, pos)) = self.locate(id) else {
            return false;
        };
        if matches!(kind, ListKind::Finished | ListKind::Failed) {
            return true;
        }
        let rec = self.take(kind, pos);
        if let Some(rec) = self.finish_if_done(rec, time) {
            self.terminate(rec, status, time);
        }
        true
    }

    /// Marks a frozen cloudlet as ready to be scheduled, returns whether the cloudlet was found.
    pub fn ready(&mut self, id: CloudletId, time: f64) -> bool {
        let Some((kind, pos)) = self.locate(id) else {
            return false;
        };
        if kind == ListKind::Waiting && self.waiting[pos].set_status(CloudletStatus::Ready) {
            log::debug!("[{:.3} vm-{}] cloudlet {} is ready", time, self.vm_label(), id);
        }
        true
    }

    /// Cancels all unfinished cloudlets, used when the VM is destroyed.
    pub fn cancel_all(&mut self, time: f64) {
        let ids: Vec<CloudletId> = self
            .exec
            .iter()
            .chain(self.paused.iter())
            .chain(self.waiting.iter())
            .map(|rec| rec.id)
            .collect();
        for id in ids {
            self.cancel(id, time);
        }
    }

    fn vm_label(&self) -> String {
        self.vm_id.map_or_else(|| "?".to_string(), |id| id.to_string())
    }
}
