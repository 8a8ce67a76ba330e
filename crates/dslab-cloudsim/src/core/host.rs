//! Physical host of a datacenter.

use serde::Serialize;

use crate::core::config::sim_config::HostConfig;
use crate::core::resource::{ResourceContainer, ResourceKind};
use crate::core::vm::{Vm, VmId};

/// Physical machine hosting VMs. Every VM placed on the host gets the full MIPS it requests.
#[derive(Clone, Debug, Serialize)]
pub struct Host {
    pub id: u32,
    pub mips: f64,
    cpu: ResourceContainer,
    ram: ResourceContainer,
    bw: ResourceContainer,
    storage: ResourceContainer,
    vms: Vec<VmId>,
}

impl Host {
    pub fn new(id: u32, pes: u64, mips: f64, ram: u64, bw: u64, storage: u64) -> Self {
        Self {
            id,
            mips,
            cpu: ResourceContainer::new(ResourceKind::Cpu, pes),
            ram: ResourceContainer::new(ResourceKind::Ram, ram),
            bw: ResourceContainer::new(ResourceKind::Bandwidth, bw),
            storage: ResourceContainer::new(ResourceKind::Storage, storage),
            vms: Vec::new(),
        }
    }

    pub fn from_config(id: u32, config: &HostConfig) -> Self {
        Self::new(id, config.pes, config.mips, config.ram, config.bw, config.storage)
    }

    pub fn pes(&self) -> u64 {
        self.cpu.capacity()
    }

    pub fn free_pes(&self) -> u64 {
        self.cpu.available()
    }

    pub fn vms(&self) -> &[VmId] {
        &self.vms
    }

    pub fn is_suitable(&self, vm: &Vm) -> bool {
        vm.mips <= self.mips
            && vm.pes <= self.cpu.available()
            && vm.ram() <= self.ram.available()
            && vm.bw() <= self.bw.available()
            && vm.storage_size() <= self.storage.available()
    }

    pub fn allocate(&mut self, vm: &Vm) -> bool {
        if !self.is_suitable(vm) {
            return false;
        }
        self.cpu.allocate(vm.pes);
        self.ram.allocate(vm.ram());
        self.bw.allocate(vm.bw());
        self.storage.allocate(vm.storage_size());
        self.vms.push(vm.id);
        true
    }

    pub fn deallocate(&mut self, vm: &Vm) {
        if let Some(pos) = self.vms.iter().position(|id| *id == vm.id) {
            self.vms.remove(pos);
            self.cpu.deallocate(vm.pes);
            self.ram.deallocate(vm.ram());
            self.bw.deallocate(vm.bw());
            self.storage.deallocate(vm.storage_size());
        }
    }

    /// MIPS given to each PE of a VM placed on the host.
    pub fn mips_share(&self, vm: &Vm) -> Vec<f64> {
        vec![vm.mips.min(self.mips); vm.pes as usize]
    }
}
