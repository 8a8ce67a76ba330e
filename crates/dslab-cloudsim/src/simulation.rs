//! Main entry point for configuring and running cloud simulations.

use std::cell::RefCell;
use std::rc::Rc;

use indexmap::IndexMap;
use sugars::{rc, refcell};

use dslab_core::component::Id;
use dslab_core::context::SimulationContext;
use dslab_core::simulation::Simulation;

use crate::core::broker::Broker;
use crate::core::cloudlet_scheduler::{scheduler_resolver, CloudletScheduler};
use crate::core::config::sim_config::SimulationConfig;
use crate::core::datacenter::Datacenter;
use crate::core::error::ConfigError;
use crate::core::events::broker::SimulationEnd;
use crate::core::host::Host;
use crate::core::registry::Registry;
use crate::core::resource::Storage;
use crate::core::results::CloudletRecord;
use crate::core::vm::{Vm, VmId, VmResources};

/// Wires datacenters, brokers and the shared entity registry into one simulation.
pub struct CloudSimulation {
    datacenters: IndexMap<Id, Rc<RefCell<Datacenter>>>,
    brokers: IndexMap<Id, Rc<RefCell<Broker>>>,
    registry: Rc<RefCell<Registry>>,
    sim: Simulation,
    ctx: SimulationContext,
    sim_config: Rc<SimulationConfig>,
}

impl CloudSimulation {
    /// Creates simulation with datacenters described in config.
    pub fn new(mut sim: Simulation, sim_config: SimulationConfig) -> Self {
        let ctx = sim.create_context("simulation");
        let mut cloud_sim = Self {
            datacenters: IndexMap::new(),
            brokers: IndexMap::new(),
            registry: rc!(refcell!(Registry::new())),
            sim,
            ctx,
            sim_config: rc!(sim_config),
        };
        let datacenters = cloud_sim.sim_config.datacenters.clone();
        for config in &datacenters {
            let name = config.name.clone();
            let datacenter = Datacenter::from_config(
                config,
                cloud_sim.registry.clone(),
                cloud_sim.sim.create_context(&name),
                cloud_sim.sim_config.clone(),
            );
            cloud_sim.register_datacenter(&name, datacenter);
        }
        cloud_sim
    }

    pub fn add_datacenter(&mut self, name: &str, hosts: Vec<Host>, time_zone: f64) -> Id {
        let datacenter = Datacenter::new(
            hosts,
            time_zone,
            self.registry.clone(),
            self.sim.create_context(name),
            self.sim_config.clone(),
        );
        self.register_datacenter(name, datacenter)
    }

    fn register_datacenter(&mut self, name: &str, datacenter: Datacenter) -> Id {
        let info = datacenter.info();
        let datacenter = rc!(refcell!(datacenter));
        let id = self.sim.add_handler(name, datacenter.clone());
        self.datacenters.insert(id, datacenter);
        for broker in self.brokers.values() {
            broker.borrow_mut().add_datacenter(info.clone());
        }
        id
    }

    /// Creates a broker which knows all datacenters and starts at the current time.
    ///
    /// If `termination_time` is configured, the broker is shut down at that time.
    pub fn add_broker(&mut self, name: &str) -> Result<Id, ConfigError> {
        let mut broker = Broker::new(
            self.registry.clone(),
            self.sim.create_context(name),
            self.sim_config.clone(),
        )?;
        for datacenter in self.datacenters.values() {
            broker.add_datacenter(datacenter.borrow().info());
        }
        let broker = rc!(refcell!(broker));
        let id = self.sim.add_handler(name, broker.clone());
        broker.borrow().start();
        if let Some(termination_time) = self.sim_config.termination_time {
            let delay = (termination_time - self.ctx.time()).max(0.);
            self.ctx.emit(SimulationEnd {}, id, delay);
        }
        self.brokers.insert(id, broker);
        Ok(id)
    }

    pub fn broker(&self, id: Id) -> Option<Rc<RefCell<Broker>>> {
        self.brokers.get(&id).cloned()
    }

    pub fn datacenter(&self, id: Id) -> Option<Rc<RefCell<Datacenter>>> {
        self.datacenters.get(&id).cloned()
    }

    /// Ids of all datacenters in order of creation.
    pub fn datacenter_ids(&self) -> Vec<Id> {
        self.datacenters.keys().copied().collect()
    }

    pub fn registry(&self) -> Rc<RefCell<Registry>> {
        self.registry.clone()
    }

    pub fn sim_config(&self) -> Rc<SimulationConfig> {
        self.sim_config.clone()
    }

    /// Returns a new cloudlet scheduler of the kind set by `cloudlet_scheduler` in config.
    pub fn cloudlet_scheduler(&self) -> Result<CloudletScheduler, ConfigError> {
        scheduler_resolver(&self.sim_config.cloudlet_scheduler, &self.sim_config)
    }

    /// Creates VM with the configured cloudlet scheduler and boot time.
    pub fn create_vm(
        &self,
        id: VmId,
        pes: u64,
        mips: f64,
        ram: u64,
        bw: u64,
        storage: Storage,
    ) -> Result<Vm, ConfigError> {
        let vm = Vm::new(id, pes, mips, VmResources::new(ram, bw, storage), self.cloudlet_scheduler()?)?;
        Ok(vm.with_startup_delay(self.sim_config.vm_startup_delay))
    }

    /// Report rows for all cloudlets submitted to brokers, ordered by cloudlet id.
    pub fn cloudlet_records(&self) -> Vec<CloudletRecord> {
        self.registry
            .borrow()
            .cloudlets()
            .map(|cloudlet| CloudletRecord::from_cloudlet(&cloudlet.borrow()))
            .collect()
    }

    pub fn current_time(&self) -> f64 {
        self.sim.time()
    }

    /// Performs a single step through the simulation.
    pub fn step(&mut self) -> bool {
        self.sim.step()
    }

    pub fn steps(&mut self, step_count: u64) -> bool {
        self.sim.steps(step_count)
    }

    /// Runs the simulation until there are no pending events.
    pub fn step_until_no_events(&mut self) {
        self.sim.step_until_no_events();
    }

    pub fn step_for_duration(&mut self, duration: f64) -> bool {
        self.sim.step_for_duration(duration)
    }

    pub fn step_until_time(&mut self, time: f64) -> bool {
        self.sim.step_until_time(time)
    }

    pub fn event_count(&self) -> u64 {
        self.sim.event_count()
    }
}
