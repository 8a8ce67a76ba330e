//! Datacenter: places VMs on hosts and drives processing of their cloudlets.

use std::cell::RefCell;
use std::rc::Rc;

use indexmap::IndexSet;

use dslab_core::cast;
use dslab_core::component::Id;
use dslab_core::context::SimulationContext;
use dslab_core::event::{Event, EventId};
use dslab_core::handler::EventHandler;
use dslab_core::{log_debug, log_trace, log_warn};

use crate::core::cloudlet::{CloudletId, CloudletRef, CloudletStatus};
use crate::core::cloudlet_scheduler::CloudletScheduler;
use crate::core::config::sim_config::{DatacenterConfig, SimulationConfig};
use crate::core::datacenter_mapper::DatacenterInfo;
use crate::core::events::cloudlet::{
    CloudletCancel, CloudletPause, CloudletReady, CloudletResume, CloudletReturn, CloudletSubmit,
};
use crate::core::events::datacenter::{DatacenterTick, UpdateProcessing};
use crate::core::events::vm::{VmCreateAck, VmCreateRequest, VmDestroyAck, VmDestroyRequest};
use crate::core::host::Host;
use crate::core::registry::Registry;
use crate::core::vm::{VmId, VmRef};

/// Set of hosts with a single entry point for brokers.
///
/// VMs are placed on the first host with enough free resources. After every change the datacenter
/// advances processing of all its VMs and schedules the next update at the earliest time some cloudlet
/// needs re-evaluation, or at the next multiple of the scheduling interval if the interval is set.
pub struct Datacenter {
    pub id: Id,
    pub time_zone: f64,
    hosts: Vec<Host>,
    vms: IndexSet<VmId>,
    brokers: IndexSet<Id>,
    pending_update: Option<(EventId, f64)>,
    registry: Rc<RefCell<Registry>>,
    ctx: SimulationContext,
    sim_config: Rc<SimulationConfig>,
}

impl Datacenter {
    pub fn new(
        hosts: Vec<Host>,
        time_zone: f64,
        registry: Rc<RefCell<Registry>>,
        ctx: SimulationContext,
        sim_config: Rc<SimulationConfig>,
    ) -> Self {
        Self {
            id: ctx.id(),
            time_zone,
            hosts,
            vms: IndexSet::new(),
            brokers: IndexSet::new(),
            pending_update: None,
            registry,
            ctx,
            sim_config,
        }
    }

    /// Creates datacenter with hosts described in config, `count` identical hosts per entry.
    pub fn from_config(
        config: &DatacenterConfig,
        registry: Rc<RefCell<Registry>>,
        ctx: SimulationContext,
        sim_config: Rc<SimulationConfig>,
    ) -> Self {
        let mut hosts = Vec::new();
        for host_config in &config.hosts {
            for _ in 0..host_config.count.unwrap_or(1) {
                hosts.push(Host::from_config(hosts.len() as u32, host_config));
            }
        }
        Self::new(hosts, config.time_zone, registry, ctx, sim_config)
    }

    pub fn name(&self) -> &str {
        self.ctx.name()
    }

    pub fn info(&self) -> DatacenterInfo {
        DatacenterInfo {
            id: self.id,
            name: self.ctx.name().to_string(),
            time_zone: self.time_zone,
        }
    }

    pub fn hosts(&self) -> &[Host] {
        &self.hosts
    }

    /// Ids of VMs currently placed in the datacenter.
    pub fn vms(&self) -> Vec<VmId> {
        self.vms.iter().copied().collect()
    }

    fn find_host(hosts: &[Host], vm: &VmRef) -> Option<usize> {
        let vm = vm.borrow();
        hosts.iter().position(|host| host.is_suitable(&vm))
    }

    fn on_vm_create_request(&mut self, broker: Id, vm_ids: Vec<VmId>, group: Option<u32>) {
        self.brokers.insert(broker);
        self.update_processing();
        let vms: Vec<VmRef> = {
            let registry = self.registry.borrow();
            vm_ids.iter().filter_map(|id| registry.vm(*id)).collect()
        };
        let placements = if group.is_some() {
            self.place_group(&vms)
        } else {
            vms.iter()
                .map(|vm| {
                    let host = Self::find_host(&self.hosts, vm)?;
                    self.hosts[host].allocate(&vm.borrow());
                    Some(host)
                })
                .collect()
        };

        let time = self.ctx.time();
        for (vm, placement) in vms.iter().zip(placements) {
            let vm_id = vm.borrow().id;
            match placement {
                Some(host) => {
                    let host_id = self.hosts[host].id;
                    vm.borrow_mut().set_created(self.id, host_id, time);
                    self.vms.insert(vm_id);
                    log_debug!(self.ctx, "vm #{} created on host #{}", vm_id, host_id);
                    self.ctx.emit(
                        VmCreateAck {
                            vm_id,
                            host: Some(host_id),
                        },
                        broker,
                        self.sim_config.message_delay,
                    );
                }
                None => {
                    log_debug!(self.ctx, "not enough resources for vm #{}", vm_id);
                    self.ctx
                        .emit(VmCreateAck { vm_id, host: None }, broker, self.sim_config.message_delay);
                }
            }
        }
        self.update_processing();
    }

    /// Places all VMs of a group or none of them.
    fn place_group(&mut self, vms: &[VmRef]) -> Vec<Option<usize>> {
        let mut hosts = self.hosts.clone();
        let mut placements = Vec::with_capacity(vms.len());
        for vm in vms {
            match Self::find_host(&hosts, vm) {
                Some(host) => {
                    hosts[host].allocate(&vm.borrow());
                    placements.push(Some(host));
                }
                None => return vec![None; vms.len()],
            }
        }
        self.hosts = hosts;
        placements
    }

    fn on_vm_destroy_request(&mut self, broker: Id, vm_id: VmId) {
        if !self.vms.contains(&vm_id) {
            log_warn!(self.ctx, "destroy request for unknown vm #{}", vm_id);
            return;
        }
        self.update_processing();
        let Some(vm) = self.registry.borrow().vm(vm_id) else {
            return;
        };
        let returned = {
            let mut vm = vm.borrow_mut();
            vm.set_destroyed(self.ctx.time());
            if let Some(host) = vm.host().and_then(|host| self.hosts.iter_mut().find(|h| h.id == host)) {
                host.deallocate(&vm);
            }
            vm.scheduler_mut().take_returned()
        };
        self.vms.shift_remove(&vm_id);
        for cloudlet in returned {
            self.return_cloudlet(cloudlet, vm_id);
        }
        log_debug!(self.ctx, "vm #{} destroyed", vm_id);
        self.ctx
            .emit(VmDestroyAck { vm_id }, broker, self.sim_config.message_delay);
        self.update_processing();
    }

    fn on_cloudlet_submit(&mut self, cloudlet_id: CloudletId) {
        let Some(cloudlet) = self.registry.borrow().cloudlet(cloudlet_id) else {
            log_warn!(self.ctx, "unknown cloudlet #{}", cloudlet_id);
            return;
        };
        let vm_id = cloudlet.borrow().vm();
        let vm = vm_id
            .filter(|id| self.vms.contains(id))
            .and_then(|id| self.registry.borrow().vm(id));
        let Some(vm) = vm.filter(|vm| vm.borrow().is_created()) else {
            log_warn!(
                self.ctx,
                "cloudlet #{} is sent to vm {:?} which is not running here",
                cloudlet_id,
                vm_id
            );
            cloudlet.borrow_mut().set_status(CloudletStatus::Failed);
            cloudlet.borrow_mut().set_finish_time(self.ctx.time());
            self.return_cloudlet(cloudlet, vm_id.unwrap_or_default());
            return;
        };
        cloudlet.borrow_mut().set_datacenter(self.id);
        self.update_processing();
        let expected = vm.borrow_mut().submit_cloudlet(cloudlet, self.ctx.time());
        log_debug!(
            self.ctx,
            "cloudlet #{} submitted to vm #{}, expected to finish in {:.3}",
            cloudlet_id,
            vm.borrow().id,
            expected
        );
        self.update_processing();
    }

    /// Applies a status operation to a cloudlet running in this datacenter.
    fn on_cloudlet_operation<F>(&mut self, cloudlet_id: CloudletId, operation: &str, apply: F)
    where
        F: FnOnce(&mut CloudletScheduler, CloudletId, f64) -> bool,
    {
        let vm = {
            let registry = self.registry.borrow();
            let vm_id = registry.cloudlet(cloudlet_id).and_then(|cloudlet| cloudlet.borrow().vm());
            vm_id.filter(|vm_id| self.vms.contains(vm_id)).and_then(|vm_id| registry.vm(vm_id))
        };
        let Some(vm) = vm else {
            log_warn!(self.ctx, "can't {} cloudlet #{}: it is not running here", operation, cloudlet_id);
            return;
        };
        self.update_processing();
        let found = apply(vm.borrow_mut().scheduler_mut(), cloudlet_id, self.ctx.time());
        if !found {
            log_warn!(self.ctx, "can't {} cloudlet #{}: not found in vm scheduler", operation, cloudlet_id);
        }
        self.update_processing();
    }

    fn on_update_processing(&mut self) {
        self.pending_update = None;
        self.update_processing();
        let interval = self.sim_config.scheduling_interval;
        if interval > 0. {
            let ticks = self.ctx.time() / interval;
            if (ticks - ticks.round()).abs() < 1e-9 {
                for broker in self.brokers.iter() {
                    self.ctx.emit_now(DatacenterTick {}, *broker);
                }
            }
        }
    }

    /// Advances processing of all VMs, returns finished cloudlets to brokers and schedules the next update.
    fn update_processing(&mut self) {
        let time = self.ctx.time();
        let mut next = f64::INFINITY;
        let mut returned = Vec::new();
        for vm_id in self.vms.iter() {
            let Some(vm) = self.registry.borrow().vm(*vm_id) else {
                continue;
            };
            let mut vm = vm.borrow_mut();
            let share = vm
                .host()
                .and_then(|host| self.hosts.iter().find(|h| h.id == host))
                .map(|host| host.mips_share(&vm))
                .unwrap_or_default();
            if let Some(delay) = vm.update_processing(time, &share) {
                next = next.min(delay);
            }
            returned.extend(vm.scheduler_mut().take_returned().into_iter().map(|c| (c, *vm_id)));
        }
        for (cloudlet, vm_id) in returned {
            self.return_cloudlet(cloudlet, vm_id);
        }
        self.schedule_update(next);
    }

    fn schedule_update(&mut self, next: f64) {
        let time = self.ctx.time();
        let mut delay = next;
        let interval = self.sim_config.scheduling_interval;
        if interval > 0. && !self.vms.is_empty() {
            let next_tick = ((time / interval + 1e-9).floor() + 1.) * interval - time;
            delay = delay.min(next_tick);
        }
        if !delay.is_finite() {
            return;
        }
        let at = time + delay;
        if let Some((event_id, pending_at)) = self.pending_update {
            if pending_at <= at {
                return;
            }
            self.ctx.cancel_event(event_id);
        }
        log_trace!(self.ctx, "next update at {:.3}", at);
        let event_id = self.ctx.emit_self(UpdateProcessing {}, delay);
        self.pending_update = Some((event_id, at));
    }

    fn return_cloudlet(&self, cloudlet: CloudletRef, vm_id: VmId) {
        let (cloudlet_id, status, broker) = {
            let cloudlet = cloudlet.borrow();
            (cloudlet.id, cloudlet.status(), cloudlet.broker())
        };
        log_debug!(self.ctx, "cloudlet #{} on vm #{} is {}", cloudlet_id, vm_id, status);
        match broker {
            Some(broker) => {
                self.ctx.emit(
                    CloudletReturn {
                        cloudlet_id,
                        vm_id,
                        status,
                    },
                    broker,
                    self.sim_config.message_delay,
                );
            }
            None => log_warn!(self.ctx, "cloudlet #{} has no broker to return to", cloudlet_id),
        }
    }
}

impl EventHandler for Datacenter {
    fn on(&mut self, event: Event) {
        let src = event.src;
        cast!(match event.data {
            VmCreateRequest { vm_ids, group } => {
                self.on_vm_create_request(src, vm_ids, group);
            }
            VmDestroyRequest { vm_id } => {
                self.on_vm_destroy_request(src, vm_id);
            }
            CloudletSubmit { cloudlet_id } => {
                self.on_cloudlet_submit(cloudlet_id);
            }
            CloudletPause { cloudlet_id } => {
                self.on_cloudlet_operation(cloudlet_id, "pause", |scheduler, id, time| scheduler.pause(id, time));
            }
            CloudletResume { cloudlet_id } => {
                self.on_cloudlet_operation(cloudlet_id, "resume", |scheduler, id, time| scheduler.resume(id, time));
            }
            CloudletCancel { cloudlet_id } => {
                self.on_cloudlet_operation(cloudlet_id, "cancel", |scheduler, id, time| scheduler.cancel(id, time));
            }
            CloudletReady { cloudlet_id } => {
                self.on_cloudlet_operation(cloudlet_id, "ready", |scheduler, id, time| scheduler.ready(id, time));
            }
            UpdateProcessing {} => {
                self.on_update_processing();
            }
        })
    }
}
