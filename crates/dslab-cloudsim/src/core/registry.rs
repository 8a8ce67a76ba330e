//! Lookup of shared VMs and cloudlets by id.

use std::collections::BTreeMap;

use crate::core::cloudlet::{CloudletId, CloudletRef};
use crate::core::vm::{VmId, VmRef};

/// Shared table of simulated entities.
///
/// Events carry only ids, components resolve them here.
#[derive(Default)]
pub struct Registry {
    vms: BTreeMap<VmId, VmRef>,
    cloudlets: BTreeMap<CloudletId, CloudletRef>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_vm(&mut self, vm: VmRef) {
        let id = vm.borrow().id;
        self.vms.insert(id, vm);
    }

    pub fn add_cloudlet(&mut self, cloudlet: CloudletRef) {
        let id = cloudlet.borrow().id;
        self.cloudlets.insert(id, cloudlet);
    }

    pub fn vm(&self, id: VmId) -> Option<VmRef> {
        self.vms.get(&id).cloned()
    }

    pub fn cloudlet(&self, id: CloudletId) -> Option<CloudletRef> {
        self.cloudlets.get(&id).cloned()
    }

    pub fn vms(&self) -> impl Iterator<Item = &VmRef> {
        self.vms.values()
    }

    pub fn cloudlets(&self) -> impl Iterator<Item = &CloudletRef> {
        self.cloudlets.values()
    }

    pub fn vm_count(&self) -> usize {
        self.vms.len()
    }

    pub fn cloudlet_count(&self) -> usize {
        self.cloudlets.len()
    }
}
