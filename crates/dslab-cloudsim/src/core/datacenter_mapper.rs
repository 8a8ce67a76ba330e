//! Datacenter selection policies used by brokers for VM placement requests.

use dslab_core::component::Id;
use serde::Serialize;

use crate::core::vm::Vm;

/// Datacenter as seen by brokers.
#[derive(Clone, Debug, Serialize)]
pub struct DatacenterInfo {
    pub id: Id,
    pub name: String,
    pub time_zone: f64,
}

/// Trait for implementation of datacenter selection policies.
///
/// Receives the datacenter selected for the previous request (if any) and the VM to place,
/// returns the datacenter to try next or `None` if every datacenter was already tried for this VM.
pub trait DatacenterMapper {
    fn select_datacenter(&mut self, last: Option<Id>, vm: &Vm, datacenters: &[DatacenterInfo]) -> Option<Id>;
}

////////////////////////////////////////////////////////////////////////////////

/// Keeps using the last selected datacenter while the VM was not tried there, then advances to the next one.
#[derive(Default)]
pub struct RoundRobinDatacenterMapper;

impl RoundRobinDatacenterMapper {
    pub fn new() -> Self {
        Self {}
    }
}

impl DatacenterMapper for RoundRobinDatacenterMapper {
    fn select_datacenter(&mut self, last: Option<Id>, vm: &Vm, datacenters: &[DatacenterInfo]) -> Option<Id> {
        let tried = vm.tried_datacenters();
        if let Some(last) = last {
            if !tried.contains(&last) && datacenters.iter().any(|dc| dc.id == last) {
                return Some(last);
            }
        }
        let start = last
            .and_then(|last| datacenters.iter().position(|dc| dc.id == last))
            .map_or(0, |pos| pos + 1);
        (0..datacenters.len())
            .map(|offset| &datacenters[(start + offset) % datacenters.len()])
            .find(|dc| !tried.contains(&dc.id))
            .map(|dc| dc.id)
    }
}

////////////////////////////////////////////////////////////////////////////////

/// Selects the untried datacenter with the time zone closest to the VM time zone.
#[derive(Default)]
pub struct ClosestDatacenterMapper;

impl ClosestDatacenterMapper {
    pub fn new() -> Self {
        Self {}
    }
}

impl DatacenterMapper for ClosestDatacenterMapper {
    fn select_datacenter(&mut self, _last: Option<Id>, vm: &Vm, datacenters: &[DatacenterInfo]) -> Option<Id> {
        let tried = vm.tried_datacenters();
        datacenters
            .iter()
            .filter(|dc| !tried.contains(&dc.id))
            .min_by(|a, b| {
                let da = (a.time_zone - vm.time_zone).abs();
                let db = (b.time_zone - vm.time_zone).abs();
                da.total_cmp(&db)
            })
            .map(|dc| dc.id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::cloudlet_scheduler::CloudletScheduler;
    use crate::core::resource::Storage;
    use crate::core::vm::VmResources;

    fn datacenters() -> Vec<DatacenterInfo> {
        [(10, -5.), (11, 0.), (12, 3.)]
            .into_iter()
            .map(|(id, time_zone)| DatacenterInfo {
                id,
                name: format!("dc{}", id),
                time_zone,
            })
            .collect()
    }

    fn vm() -> Vm {
        let resources = VmResources::new(1024, 1000, Storage::new(1000, 100., 0.));
        Vm::new(0, 1, 1000., resources, CloudletScheduler::time_shared()).unwrap()
    }

    #[test]
    fn round_robin_sticks_to_last_until_tried() {
        let dcs = datacenters();
        let mut mapper = RoundRobinDatacenterMapper::new();
        let mut vm = vm();
        assert_eq!(mapper.select_datacenter(None, &vm, &dcs), Some(10));
        assert_eq!(mapper.select_datacenter(Some(11), &vm, &dcs), Some(11));
        vm.record_attempt(11);
        assert_eq!(mapper.select_datacenter(Some(11), &vm, &dcs), Some(12));
        vm.record_attempt(12);
        vm.record_attempt(10);
        assert_eq!(mapper.select_datacenter(Some(12), &vm, &dcs), None);
    }

    #[test]
    fn closest_prefers_nearest_time_zone() {
        let dcs = datacenters();
        let mut mapper = ClosestDatacenterMapper::new();
        let mut vm = vm().with_time_zone(2.);
        assert_eq!(mapper.select_datacenter(None, &vm, &dcs), Some(12));
        vm.record_attempt(12);
        assert_eq!(mapper.select_datacenter(None, &vm, &dcs), Some(11));
    }
}
