//! Broker: acts on behalf of a cloud customer, places its VMs and dispatches its cloudlets.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use indexmap::{IndexMap, IndexSet};
use serde::Serialize;
use sugars::{rc, refcell};

use dslab_core::cast;
use dslab_core::component::Id;
use dslab_core::context::SimulationContext;
use dslab_core::event::{Event, EventId};
use dslab_core::handler::EventHandler;
use dslab_core::{log_debug, log_info, log_warn};

use crate::core::cloudlet::{Cloudlet, CloudletId, CloudletRef, CloudletStatus};
use crate::core::config::sim_config::SimulationConfig;
use crate::core::datacenter_mapper::{
    ClosestDatacenterMapper, DatacenterInfo, DatacenterMapper, RoundRobinDatacenterMapper,
};
use crate::core::error::ConfigError;
use crate::core::events::broker::{
    BrokerStart, DispatchCloudlets, RetryVmCreation, SimulationEnd, VmIdleCheck, VmLifetimeCheck,
};
use crate::core::events::cloudlet::{
    CloudletCancel, CloudletPause, CloudletReady, CloudletResume, CloudletReturn, CloudletSubmit,
};
use crate::core::events::datacenter::DatacenterTick;
use crate::core::events::vm::{VmCreateAck, VmCreateRequest, VmDestroyAck, VmDestroyRequest};
use crate::core::listener::Listeners;
use crate::core::registry::Registry;
use crate::core::vm::{Vm, VmGroup, VmId, VmRef};
use crate::core::vm_mapper::{vm_mapper_resolver, VmMapper};

/// Passed to VM creation listeners.
#[derive(Clone, Debug, Serialize)]
pub struct VmCreated {
    pub vm_id: VmId,
    pub datacenter: Id,
    pub host: u32,
    pub time: f64,
}

/// Passed to VM creation failure listeners for every rejected placement attempt.
#[derive(Clone, Debug, Serialize)]
pub struct VmCreationFailure {
    pub vm_id: VmId,
    pub datacenter: Id,
    /// Number of placement requests sent for the VM so far.
    pub attempt: u32,
    pub time: f64,
    /// Whether the VM was moved to the failed list, i.e. it will not be retried anymore.
    pub is_final: bool,
}

/// Passed to cloudlet listeners when a cloudlet reaches a terminal status.
#[derive(Clone, Debug, Serialize)]
pub struct CloudletFinished {
    pub cloudlet_id: CloudletId,
    pub vm_id: Option<VmId>,
    pub status: CloudletStatus,
    pub time: f64,
}

/// Idle time after which a VM is destroyed. Negative values keep the VM until broker shutdown.
pub type VmDestructionDelayFn = Rc<dyn Fn(&Vm) -> f64>;

/// Broker of a single cloud customer.
///
/// Keeps VMs in waiting, executing and failed lists and cloudlets in waiting, created and finished lists.
/// An entity is present in at most one of these lists at a time. The `created` VM list and
/// the `submitted` cloudlet list keep the history of all VMs ever created and cloudlets ever dispatched.
pub struct Broker {
    pub id: Id,
    datacenters: Vec<DatacenterInfo>,
    vm_mapper: Box<dyn VmMapper>,
    datacenter_mapper: Box<dyn DatacenterMapper>,
    destruction_delay_fn: Option<VmDestructionDelayFn>,

    vm_waiting: IndexSet<VmId>,
    vm_exec: IndexSet<VmId>,
    vm_created: IndexSet<VmId>,
    vm_failed: IndexSet<VmId>,
    cloudlet_waiting: IndexSet<CloudletId>,
    cloudlet_created: IndexSet<CloudletId>,
    cloudlet_submitted: IndexSet<CloudletId>,
    cloudlet_finished: IndexSet<CloudletId>,

    requests_in_flight: IndexSet<VmId>,
    pending_failures: Vec<VmCreationFailure>,
    retries: u32,
    last_selected_dc: Option<Id>,
    idle_checks: HashMap<VmId, EventId>,
    started: bool,
    shutdown: bool,

    vm_created_listeners: Rc<Listeners<VmCreated>>,
    vm_failure_listeners: Rc<Listeners<VmCreationFailure>>,
    cloudlet_listeners: Rc<Listeners<CloudletFinished>>,

    registry: Rc<RefCell<Registry>>,
    ctx: SimulationContext,
    sim_config: Rc<SimulationConfig>,
}

impl Broker {
    pub fn new(
        registry: Rc<RefCell<Registry>>,
        ctx: SimulationContext,
        sim_config: Rc<SimulationConfig>,
    ) -> Result<Self, ConfigError> {
        let vm_mapper = vm_mapper_resolver(&sim_config.vm_mapper)?;
        let datacenter_mapper: Box<dyn DatacenterMapper> = if sim_config.select_closest_datacenter {
            Box::new(ClosestDatacenterMapper::new())
        } else {
            Box::new(RoundRobinDatacenterMapper::new())
        };
        Ok(Self {
            id: ctx.id(),
            datacenters: Vec::new(),
            vm_mapper,
            datacenter_mapper,
            destruction_delay_fn: None,
            vm_waiting: IndexSet::new(),
            vm_exec: IndexSet::new(),
            vm_created: IndexSet::new(),
            vm_failed: IndexSet::new(),
            cloudlet_waiting: IndexSet::new(),
            cloudlet_created: IndexSet::new(),
            cloudlet_submitted: IndexSet::new(),
            cloudlet_finished: IndexSet::new(),
            requests_in_flight: IndexSet::new(),
            pending_failures: Vec::new(),
            retries: 0,
            last_selected_dc: None,
            idle_checks: HashMap::new(),
            started: false,
            shutdown: false,
            vm_created_listeners: rc!(Listeners::new()),
            vm_failure_listeners: rc!(Listeners::new()),
            cloudlet_listeners: rc!(Listeners::new()),
            registry,
            ctx,
            sim_config,
        })
    }

    // Configuration ///////////////////////////////////////////////////////////////////////////////

    pub fn add_datacenter(&mut self, datacenter: DatacenterInfo) {
        if !self.datacenters.iter().any(|dc| dc.id == datacenter.id) {
            self.datacenters.push(datacenter);
        }
    }

    pub fn set_vm_mapper(&mut self, vm_mapper: Box<dyn VmMapper>) {
        self.vm_mapper = vm_mapper;
    }

    pub fn set_datacenter_mapper(&mut self, datacenter_mapper: Box<dyn DatacenterMapper>) {
        self.datacenter_mapper = datacenter_mapper;
    }

    /// Overrides the global `vm_destruction_delay` with a per-VM function.
    pub fn set_vm_destruction_delay_fn(&mut self, delay_fn: VmDestructionDelayFn) {
        self.destruction_delay_fn = Some(delay_fn);
    }

    pub fn vm_created_listeners(&self) -> Rc<Listeners<VmCreated>> {
        self.vm_created_listeners.clone()
    }

    pub fn vm_failure_listeners(&self) -> Rc<Listeners<VmCreationFailure>> {
        self.vm_failure_listeners.clone()
    }

    pub fn cloudlet_listeners(&self) -> Rc<Listeners<CloudletFinished>> {
        self.cloudlet_listeners.clone()
    }

    // Submission //////////////////////////////////////////////////////////////////////////////////

    /// Starts the broker at the current simulation time.
    pub fn start(&self) {
        self.ctx.emit_self_now(BrokerStart {});
    }

    pub fn submit_vm(&mut self, vm: Vm) -> VmRef {
        let vm = rc!(refcell!(vm));
        self.register_vm(vm.clone());
        if self.started {
            self.request_creation_of_waiting_vms();
        }
        vm
    }

    pub fn submit_vms(&mut self, vms: Vec<Vm>) -> Vec<VmRef> {
        let vms: Vec<VmRef> = vms.into_iter().map(|vm| rc!(refcell!(vm))).collect();
        for vm in &vms {
            self.register_vm(vm.clone());
        }
        if self.started {
            self.request_creation_of_waiting_vms();
        }
        vms
    }

    /// Submits VMs which must be placed together into one datacenter.
    pub fn submit_vm_group(&mut self, group: VmGroup) {
        for vm in group.into_vms() {
            self.register_vm(vm);
        }
        if self.started {
            self.request_creation_of_waiting_vms();
        }
    }

    fn register_vm(&mut self, vm: VmRef) {
        let vm_id = {
            let mut vm = vm.borrow_mut();
            vm.set_broker(self.id);
            vm.id
        };
        self.registry.borrow_mut().add_vm(vm);
        self.vm_waiting.insert(vm_id);
    }

    pub fn submit_cloudlet(&mut self, cloudlet: Cloudlet) -> CloudletRef {
        let cloudlet = rc!(refcell!(cloudlet));
        self.register_cloudlet(cloudlet.clone());
        self.schedule_dispatch();
        cloudlet
    }

    pub fn submit_cloudlets(&mut self, cloudlets: Vec<Cloudlet>) -> Vec<CloudletRef> {
        let cloudlets: Vec<CloudletRef> = cloudlets.into_iter().map(|c| rc!(refcell!(c))).collect();
        for cloudlet in &cloudlets {
            self.register_cloudlet(cloudlet.clone());
        }
        self.schedule_dispatch();
        cloudlets
    }

    fn register_cloudlet(&mut self, cloudlet: CloudletRef) {
        let cloudlet_id = {
            let mut cloudlet = cloudlet.borrow_mut();
            cloudlet.set_broker(self.id);
            cloudlet.id
        };
        self.registry.borrow_mut().add_cloudlet(cloudlet);
        self.cloudlet_waiting.insert(cloudlet_id);
    }

    fn schedule_dispatch(&self) {
        if self.started && !self.shutdown && self.initial_placement_done() {
            self.ctx.emit_self_now(DispatchCloudlets {});
        }
    }

    // Cloudlet status requests ////////////////////////////////////////////////////////////////////

    pub fn pause_cloudlet(&mut self, cloudlet_id: CloudletId) {
        self.forward_cloudlet_request(cloudlet_id, |dc, ctx, delay| {
            ctx.emit(CloudletPause { cloudlet_id }, dc, delay);
        });
    }

    pub fn resume_cloudlet(&mut self, cloudlet_id: CloudletId) {
        self.forward_cloudlet_request(cloudlet_id, |dc, ctx, delay| {
            ctx.emit(CloudletResume { cloudlet_id }, dc, delay);
        });
    }

    /// Cancels a cloudlet. A cloudlet which was not dispatched yet is canceled right away.
    pub fn cancel_cloudlet(&mut self, cloudlet_id: CloudletId) {
        if self.cloudlet_waiting.contains(&cloudlet_id) {
            let Some(cloudlet) = self.registry.borrow().cloudlet(cloudlet_id) else {
                return;
            };
            let time = self.ctx.time();
            let vm_id = {
                let mut cloudlet = cloudlet.borrow_mut();
                cloudlet.set_status(CloudletStatus::Canceled);
                cloudlet.set_finish_time(time);
                cloudlet.vm()
            };
            self.cloudlet_waiting.shift_remove(&cloudlet_id);
            self.cloudlet_finished.insert(cloudlet_id);
            log_debug!(self.ctx, "cloudlet #{} canceled before dispatch", cloudlet_id);
            self.cloudlet_listeners.notify(&CloudletFinished {
                cloudlet_id,
                vm_id,
                status: CloudletStatus::Canceled,
                time,
            });
            self.try_shutdown();
            return;
        }
        self.forward_cloudlet_request(cloudlet_id, |dc, ctx, delay| {
            ctx.emit(CloudletCancel { cloudlet_id }, dc, delay);
        });
    }

    /// Marks a frozen cloudlet as ready. A cloudlet which was not dispatched yet is changed right away.
    pub fn ready_cloudlet(&mut self, cloudlet_id: CloudletId) {
        if self.cloudlet_waiting.contains(&cloudlet_id) {
            if let Some(cloudlet) = self.registry.borrow().cloudlet(cloudlet_id) {
                cloudlet.borrow_mut().set_status(CloudletStatus::Ready);
            }
            return;
        }
        self.forward_cloudlet_request(cloudlet_id, |dc, ctx, delay| {
            ctx.emit(CloudletReady { cloudlet_id }, dc, delay);
        });
    }

    fn forward_cloudlet_request<F>(&self, cloudlet_id: CloudletId, send: F)
    where
        F: FnOnce(Id, &SimulationContext, f64),
    {
        if !self.cloudlet_created.contains(&cloudlet_id) {
            log_warn!(self.ctx, "cloudlet #{} is not running, request ignored", cloudlet_id);
            return;
        }
        let datacenter = {
            let registry = self.registry.borrow();
            let vm_id = registry.cloudlet(cloudlet_id).and_then(|cloudlet| cloudlet.borrow().vm());
            vm_id.and_then(|vm_id| registry.vm(vm_id)).and_then(|vm| vm.borrow().datacenter())
        };
        match datacenter {
            Some(dc) => send(dc, &self.ctx, self.sim_config.message_delay),
            None => log_warn!(self.ctx, "datacenter of cloudlet #{} is unknown", cloudlet_id),
        }
    }

    // Lists ///////////////////////////////////////////////////////////////////////////////////////

    pub fn vm_waiting_list(&self) -> Vec<VmId> {
        self.vm_waiting.iter().copied().collect()
    }

    pub fn vm_exec_list(&self) -> Vec<VmId> {
        self.vm_exec.iter().copied().collect()
    }

    pub fn vm_created_list(&self) -> Vec<VmId> {
        self.vm_created.iter().copied().collect()
    }

    pub fn vm_failed_list(&self) -> Vec<VmId> {
        self.vm_failed.iter().copied().collect()
    }

    pub fn cloudlet_waiting_list(&self) -> Vec<CloudletId> {
        self.cloudlet_waiting.iter().copied().collect()
    }

    pub fn cloudlet_created_list(&self) -> Vec<CloudletId> {
        self.cloudlet_created.iter().copied().collect()
    }

    pub fn cloudlet_submitted_list(&self) -> Vec<CloudletId> {
        self.cloudlet_submitted.iter().copied().collect()
    }

    pub fn cloudlet_finished_list(&self) -> Vec<CloudletId> {
        self.cloudlet_finished.iter().copied().collect()
    }

    pub fn is_started(&self) -> bool {
        self.started
    }

    pub fn is_shutdown(&self) -> bool {
        self.shutdown
    }

    pub fn retries(&self) -> u32 {
        self.retries
    }

    // VM placement ////////////////////////////////////////////////////////////////////////////////

    fn on_start(&mut self) {
        if self.started {
            return;
        }
        self.started = true;
        log_info!(
            self.ctx,
            "started with {} VMs and {} cloudlets",
            self.vm_waiting.len(),
            self.cloudlet_waiting.len()
        );
        self.request_creation_of_waiting_vms();
        if self.initial_placement_done() {
            self.dispatch_cloudlets();
        }
        self.try_shutdown();
    }

    fn vm(&self, vm_id: VmId) -> Option<VmRef> {
        self.registry.borrow().vm(vm_id)
    }

    /// Whether all waiting VMs without submission delay got a placement response.
    fn initial_placement_done(&self) -> bool {
        !self
            .vm_waiting
            .iter()
            .filter_map(|id| self.vm(*id))
            .any(|vm| vm.borrow().submission_delay <= 0.)
    }

    /// Sends placement requests for waiting VMs which are not being placed already.
    fn request_creation_of_waiting_vms(&mut self) {
        if self.shutdown {
            return;
        }
        let pending: Vec<VmRef> = self
            .vm_waiting
            .iter()
            .filter(|id| !self.requests_in_flight.contains(*id))
            .filter_map(|id| self.vm(*id))
            .collect();
        if pending.is_empty() {
            return;
        }

        let mut requests: IndexMap<(Id, u64, Option<u32>, Option<VmId>), Vec<VmId>> = IndexMap::new();
        let mut group_datacenters: HashMap<u32, Id> = HashMap::new();
        let mut exhausted = Vec::new();
        for vm in pending {
            let (vm_id, group) = {
                let vm = vm.borrow();
                (vm.id, vm.group())
            };
            let selected = match group.and_then(|g| group_datacenters.get(&g).copied()) {
                Some(dc) => Some(dc),
                None => {
                    self.datacenter_mapper
                        .select_datacenter(self.last_selected_dc, &vm.borrow(), &self.datacenters)
                }
            };
            let Some(dc) = selected else {
                exhausted.push(vm_id);
                continue;
            };
            if let Some(group) = group {
                group_datacenters.insert(group, dc);
            }
            self.last_selected_dc = Some(dc);
            let delay = {
                let mut vm = vm.borrow_mut();
                let delay = if vm.creation_attempts() == 0 { vm.submission_delay } else { 0. };
                vm.record_attempt(dc);
                delay
            };
            let single = if self.sim_config.batch_vm_creation || group.is_some() {
                None
            } else {
                Some(vm_id)
            };
            requests
                .entry((dc, delay.to_bits(), group, single))
                .or_default()
                .push(vm_id);
        }

        for ((dc, delay_bits, group, _), vm_ids) in requests {
            let delay = f64::from_bits(delay_bits);
            log_debug!(
                self.ctx,
                "requesting creation of VMs {:?} in {} after {:.3}",
                vm_ids,
                self.ctx.lookup_name(dc),
                delay
            );
            self.requests_in_flight.extend(vm_ids.iter().copied());
            self.ctx.emit(
                VmCreateRequest { vm_ids, group },
                dc,
                delay + self.sim_config.message_delay,
            );
        }

        if !exhausted.is_empty() && self.requests_in_flight.is_empty() {
            self.handle_exhausted();
        }
    }

    /// Handles waiting VMs which were tried in every datacenter.
    fn handle_exhausted(&mut self) {
        let retry_enabled = self.sim_config.vm_creation_retry_enabled();
        if retry_enabled && self.retries < self.sim_config.max_vm_creation_retries {
            self.retries += 1;
            for vm in self.vm_waiting.iter().filter_map(|id| self.vm(*id)) {
                vm.borrow_mut().reset_tried_datacenters();
            }
            log_warn!(
                self.ctx,
                "none of the datacenters can place {} waiting VMs, retry #{} in {:.3}",
                self.vm_waiting.len(),
                self.retries,
                self.sim_config.vm_creation_retry_delay
            );
            self.ctx
                .emit_self(RetryVmCreation {}, self.sim_config.vm_creation_retry_delay);
            if !self.vm_exec.is_empty() {
                self.dispatch_cloudlets();
            }
            return;
        }

        log_warn!(
            self.ctx,
            "none of the datacenters can place {} waiting VMs",
            self.vm_waiting.len()
        );
        let waiting: Vec<VmId> = self.vm_waiting.drain(..).collect();
        for vm_id in waiting {
            if let Some(vm) = self.vm(vm_id) {
                vm.borrow_mut().set_failed();
            }
            self.vm_failed.insert(vm_id);
        }
        if self.vm_exec.is_empty() {
            self.shutdown();
        } else {
            self.dispatch_cloudlets();
        }
    }

    fn on_retry_vm_creation(&mut self) {
        self.last_selected_dc = None;
        self.request_creation_of_waiting_vms();
    }

    fn on_vm_create_ack(&mut self, datacenter: Id, vm_id: VmId, host: Option<u32>) {
        self.requests_in_flight.shift_remove(&vm_id);
        let Some(vm) = self.vm(vm_id) else {
            return;
        };
        let time = self.ctx.time();
        match host {
            Some(host) => {
                self.vm_waiting.shift_remove(&vm_id);
                self.vm_exec.insert(vm_id);
                self.vm_created.insert(vm_id);
                log_debug!(self.ctx, "vm #{} created in {}", vm_id, self.ctx.lookup_name(datacenter));
                self.vm_created_listeners.notify(&VmCreated {
                    vm_id,
                    datacenter,
                    host,
                    time,
                });
                if let Some(lifetime) = vm.borrow().lifetime {
                    self.ctx.emit_self(VmLifetimeCheck { vm_id }, lifetime);
                }
                if self.shutdown {
                    self.destroy_vm(vm_id);
                }
            }
            None => {
                let attempt = vm.borrow().creation_attempts();
                log_debug!(
                    self.ctx,
                    "vm #{} was not created in {}",
                    vm_id,
                    self.ctx.lookup_name(datacenter)
                );
                if !self.sim_config.vm_creation_retry_enabled() {
                    self.vm_waiting.shift_remove(&vm_id);
                    self.vm_failed.insert(vm_id);
                    vm.borrow_mut().set_failed();
                }
                self.pending_failures.push(VmCreationFailure {
                    vm_id,
                    datacenter,
                    attempt,
                    time,
                    is_final: false,
                });
            }
        }

        // rejected VMs are resubmitted once all pending placement requests are answered
        if self.requests_in_flight.is_empty() {
            if !self.vm_waiting.is_empty() {
                self.last_selected_dc = None;
                self.request_creation_of_waiting_vms();
            }
            for mut failure in std::mem::take(&mut self.pending_failures) {
                failure.is_final = self.vm_failed.contains(&failure.vm_id);
                self.vm_failure_listeners.notify(&failure);
            }
        }
        if self.shutdown {
            return;
        }
        if self.requests_in_flight.is_empty()
            && self.vm_waiting.is_empty()
            && self.vm_exec.is_empty()
            && !self.vm_failed.is_empty()
        {
            log_warn!(self.ctx, "all VMs failed to be created");
            self.shutdown();
            return;
        }
        if self.initial_placement_done() {
            self.dispatch_cloudlets();
        }
        if host.is_some() {
            // a VM which got no cloudlets is idle since its creation
            self.request_idle_destruction(vm_id);
        }
        self.try_shutdown();
    }

    // Cloudlet dispatch ///////////////////////////////////////////////////////////////////////////

    fn dispatch_cloudlets(&mut self) {
        if self.shutdown || self.cloudlet_waiting.is_empty() {
            return;
        }
        let vms: Vec<VmRef> = self.vm_exec.iter().filter_map(|id| self.vm(*id)).collect();
        let waiting: Vec<CloudletId> = self.cloudlet_waiting.iter().copied().collect();
        let time = self.ctx.time();
        for cloudlet_id in waiting {
            let Some(cloudlet) = self.registry.borrow().cloudlet(cloudlet_id) else {
                continue;
            };
            let bound = cloudlet.borrow().vm();
            let vm_id = match bound {
                Some(vm_id) => Some(vm_id),
                None => self.vm_mapper.select_vm(&cloudlet.borrow(), &vms),
            };
            let Some(vm) = vm_id.and_then(|id| self.vm(id)) else {
                log_debug!(self.ctx, "no suitable VM for cloudlet #{}, postponed", cloudlet_id);
                continue;
            };
            let mut vm = vm.borrow_mut();
            if !vm.is_created() {
                log_warn!(
                    self.ctx,
                    "cloudlet #{} is postponed: vm #{} is {}, expected creation in {:.3}",
                    cloudlet_id,
                    vm.id,
                    vm.status(),
                    vm.submission_delay
                );
                continue;
            }
            let Some(datacenter) = vm.datacenter() else {
                continue;
            };
            let (pes, submission_delay) = {
                let mut cloudlet = cloudlet.borrow_mut();
                cloudlet.set_vm(Some(vm.id));
                (cloudlet.pes, cloudlet.submission_delay)
            };
            vm.reserve_pes(pes);
            let delay = submission_delay + vm.boot_remaining(time) + self.sim_config.message_delay;
            log_debug!(
                self.ctx,
                "cloudlet #{} dispatched to vm #{} with delay {:.3}",
                cloudlet_id,
                vm.id,
                delay
            );
            self.ctx.emit(CloudletSubmit { cloudlet_id }, datacenter, delay);
            self.cloudlet_waiting.shift_remove(&cloudlet_id);
            self.cloudlet_created.insert(cloudlet_id);
            self.cloudlet_submitted.insert(cloudlet_id);
        }
    }

    fn on_cloudlet_return(&mut self, cloudlet_id: CloudletId, vm_id: VmId, status: CloudletStatus) {
        if !self.cloudlet_created.shift_remove(&cloudlet_id) {
            log_warn!(self.ctx, "unexpected return of cloudlet #{}", cloudlet_id);
            return;
        }
        self.cloudlet_finished.insert(cloudlet_id);
        let pes = self
            .registry
            .borrow()
            .cloudlet(cloudlet_id)
            .map_or(0, |cloudlet| cloudlet.borrow().pes);
        if let Some(vm) = self.vm(vm_id) {
            vm.borrow_mut().release_pes(pes);
        }
        log_debug!(self.ctx, "cloudlet #{} returned from vm #{}: {}", cloudlet_id, vm_id, status);
        self.cloudlet_listeners.notify(&CloudletFinished {
            cloudlet_id,
            vm_id: Some(vm_id),
            status,
            time: self.ctx.time(),
        });
        self.dispatch_cloudlets();
        self.request_idle_destruction(vm_id);
        self.try_shutdown();
    }

    // VM destruction //////////////////////////////////////////////////////////////////////////////

    fn destruction_delay(&self, vm: &Vm) -> f64 {
        match &self.destruction_delay_fn {
            Some(delay_fn) => delay_fn(vm),
            None => self.sim_config.vm_destruction_delay,
        }
    }

    fn is_vm_idle(&self, vm: &Vm) -> bool {
        vm.scheduler().is_empty()
            && !self.cloudlet_created.iter().any(|id| {
                self.registry
                    .borrow()
                    .cloudlet(*id)
                    .is_some_and(|cloudlet| cloudlet.borrow().vm() == Some(vm.id))
            })
    }

    /// Destroys the VM if it is idle and either its lifetime elapsed or it was idle long enough,
    /// otherwise schedules the next idle check when needed.
    fn request_idle_destruction(&mut self, vm_id: VmId) {
        if !self.vm_exec.contains(&vm_id) {
            return;
        }
        let Some(vm) = self.vm(vm_id) else {
            return;
        };
        let time = self.ctx.time();
        let (idle, lifetime_elapsed, delay, idle_since) = {
            let vm = vm.borrow();
            (
                self.is_vm_idle(&vm),
                vm.lifetime_elapsed(time),
                self.destruction_delay(&vm),
                vm.idle_since().unwrap_or(time),
            )
        };
        if !idle {
            return;
        }
        if lifetime_elapsed {
            log_debug!(self.ctx, "vm #{} lifetime elapsed", vm_id);
            self.destroy_vm(vm_id);
            return;
        }
        if delay < 0. {
            return;
        }
        let idle_time = time - idle_since;
        if idle_time >= delay - 1e-9 {
            log_debug!(self.ctx, "vm #{} was idle for {:.3}", vm_id, idle_time);
            self.destroy_vm(vm_id);
            return;
        }
        let interval = self.sim_config.scheduling_interval;
        if interval > 0. {
            let ticks = delay / interval;
            if (ticks - ticks.round()).abs() < 1e-9 {
                // checked on the next datacenter tick
                return;
            }
        }
        if let Some(event_id) = self.idle_checks.remove(&vm_id) {
            self.ctx.cancel_event(event_id);
        }
        let event_id = self.ctx.emit_self(VmIdleCheck { vm_id }, delay - idle_time);
        self.idle_checks.insert(vm_id, event_id);
    }

    fn destroy_vm(&mut self, vm_id: VmId) {
        if !self.vm_exec.shift_remove(&vm_id) {
            return;
        }
        if let Some(event_id) = self.idle_checks.remove(&vm_id) {
            self.ctx.cancel_event(event_id);
        }
        let datacenter = self.vm(vm_id).and_then(|vm| vm.borrow().datacenter());
        match datacenter {
            Some(dc) => {
                log_debug!(self.ctx, "destroying vm #{}", vm_id);
                self.ctx
                    .emit(VmDestroyRequest { vm_id }, dc, self.sim_config.message_delay);
            }
            None => log_warn!(self.ctx, "vm #{} has no datacenter", vm_id),
        }
    }

    fn on_datacenter_tick(&mut self) {
        let vms: Vec<VmId> = self.vm_exec.iter().copied().collect();
        for vm_id in vms {
            self.request_idle_destruction(vm_id);
        }
        self.try_shutdown();
    }

    fn on_vm_idle_check(&mut self, vm_id: VmId) {
        self.idle_checks.remove(&vm_id);
        self.request_idle_destruction(vm_id);
        self.try_shutdown();
    }

    // Shutdown ////////////////////////////////////////////////////////////////////////////////////

    fn try_shutdown(&mut self) {
        if self.sim_config.shutdown_when_idle
            && self.started
            && !self.shutdown
            && self.cloudlet_waiting.is_empty()
            && self.cloudlet_created.is_empty()
            && self.vm_waiting.is_empty()
            && self.requests_in_flight.is_empty()
        {
            self.shutdown();
        }
    }

    /// Destroys all executing VMs and stops processing of new requests.
    pub fn shutdown(&mut self) {
        if self.shutdown {
            return;
        }
        self.shutdown = true;
        log_info!(
            self.ctx,
            "shutting down: {} cloudlets finished, {} waiting, {} VMs failed",
            self.cloudlet_finished.len(),
            self.cloudlet_waiting.len(),
            self.vm_failed.len()
        );
        let vms: Vec<VmId> = self.vm_exec.iter().copied().collect();
        for vm_id in vms {
            self.destroy_vm(vm_id);
        }
    }
}

impl EventHandler for Broker {
    fn on(&mut self, event: Event) {
        let src = event.src;
        cast!(match event.data {
            BrokerStart {} => {
                self.on_start();
            }
            VmCreateAck { vm_id, host } => {
                self.on_vm_create_ack(src, vm_id, host);
            }
            VmDestroyAck { vm_id } => {
                log_debug!(self.ctx, "vm #{} destroyed", vm_id);
            }
            RetryVmCreation {} => {
                self.on_retry_vm_creation();
            }
            DispatchCloudlets {} => {
                self.dispatch_cloudlets();
            }
            CloudletReturn {
                cloudlet_id,
                vm_id,
                status,
            } => {
                self.on_cloudlet_return(cloudlet_id, vm_id, status);
            }
            VmIdleCheck { vm_id } => {
                self.on_vm_idle_check(vm_id);
            }
            VmLifetimeCheck { vm_id } => {
                self.request_idle_destruction(vm_id);
                self.try_shutdown();
            }
            DatacenterTick {} => {
                self.on_datacenter_tick();
            }
            SimulationEnd {} => {
                self.shutdown();
            }
        })
    }
}
