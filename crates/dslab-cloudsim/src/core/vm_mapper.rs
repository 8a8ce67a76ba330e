//! Cloudlet-to-VM mapping policies used by brokers.

use crate::core::cloudlet::Cloudlet;
use crate::core::config::options::parse_config_value;
use crate::core::error::ConfigError;
use crate::core::vm::{VmId, VmRef};

/// Trait for implementation of cloudlet-to-VM mapping policies.
///
/// The policy is a function of a cloudlet and the list of VMs currently executing in the broker,
/// which returns the id of selected VM or `None` if there is no suitable VM yet.
/// Brokers use the expected free PEs of VMs, which account for cloudlets already dispatched.
pub trait VmMapper {
    fn select_vm(&mut self, cloudlet: &Cloudlet, vms: &[VmRef]) -> Option<VmId>;
}

pub fn vm_mapper_resolver(config_str: &str) -> Result<Box<dyn VmMapper>, ConfigError> {
    let (name, _options) = parse_config_value(config_str);
    match name.as_str() {
        "RoundRobin" => Ok(Box::new(RoundRobinVmMapper::new())),
        "FirstFit" => Ok(Box::new(FirstFitVmMapper::new())),
        "BestFit" => Ok(Box::new(BestFitVmMapper::new())),
        _ => Err(ConfigError::UnknownPolicy {
            kind: "vm mapper",
            name: config_str.to_string(),
        }),
    }
}

////////////////////////////////////////////////////////////////////////////////

/// Cycles over executing VMs regardless of their load.
#[derive(Default)]
pub struct RoundRobinVmMapper {
    last_index: Option<usize>,
}

impl RoundRobinVmMapper {
    pub fn new() -> Self {
        Self::default()
    }
}

impl VmMapper for RoundRobinVmMapper {
    fn select_vm(&mut self, _cloudlet: &Cloudlet, vms: &[VmRef]) -> Option<VmId> {
        if vms.is_empty() {
            return None;
        }
        let index = self.last_index.map_or(0, |last| (last + 1) % vms.len());
        self.last_index = Some(index);
        Some(vms[index].borrow().id)
    }
}

////////////////////////////////////////////////////////////////////////////////

/// Selects the first VM with enough expected free PEs.
#[derive(Default)]
pub struct FirstFitVmMapper;

impl FirstFitVmMapper {
    pub fn new() -> Self {
        Self {}
    }
}

impl VmMapper for FirstFitVmMapper {
    fn select_vm(&mut self, cloudlet: &Cloudlet, vms: &[VmRef]) -> Option<VmId> {
        vms.iter()
            .map(|vm| vm.borrow())
            .find(|vm| vm.expected_free_pes() >= cloudlet.pes)
            .map(|vm| vm.id)
    }
}

////////////////////////////////////////////////////////////////////////////////

/// Selects the VM with the fewest expected free PEs which still fits the cloudlet.
#[derive(Default)]
pub struct BestFitVmMapper;

impl BestFitVmMapper {
    pub fn new() -> Self {
        Self {}
    }
}

impl VmMapper for BestFitVmMapper {
    fn select_vm(&mut self, cloudlet: &Cloudlet, vms: &[VmRef]) -> Option<VmId> {
        let mut best: Option<(u64, VmId)> = None;
        for vm in vms {
            let vm = vm.borrow();
            let free = vm.expected_free_pes();
            if free < cloudlet.pes {
                continue;
            }
            if best.map_or(true, |(best_free, _)| free < best_free) {
                best = Some((free, vm.id));
            }
        }
        best.map(|(_, id)| id)
    }
}
