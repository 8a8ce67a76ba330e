//! Resource ledger: capacity counters for CPU, RAM, bandwidth and storage.

use std::fmt::{Display, Formatter};

use serde::Serialize;

/// Kind of a resource tracked by a [`ResourceContainer`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
pub enum ResourceKind {
    Cpu,
    Ram,
    Bandwidth,
    Storage,
}

impl Display for ResourceKind {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        match self {
            ResourceKind::Cpu => write!(f, "cpu"),
            ResourceKind::Ram => write!(f, "ram"),
            ResourceKind::Bandwidth => write!(f, "bw"),
            ResourceKind::Storage => write!(f, "storage"),
        }
    }
}

/// Counter of some resource with fixed capacity.
///
/// Allocations never exceed the capacity: `allocate` fails as a whole while `allocate_up_to`
/// grants as much as is available.
#[derive(Clone, Debug, Serialize)]
pub struct ResourceContainer {
    kind: ResourceKind,
    capacity: u64,
    allocated: u64,
}

impl ResourceContainer {
    pub fn new(kind: ResourceKind, capacity: u64) -> Self {
        Self {
            kind,
            capacity,
            allocated: 0,
        }
    }

    pub fn kind(&self) -> ResourceKind {
        self.kind
    }

    pub fn capacity(&self) -> u64 {
        self.capacity
    }

    pub fn allocated(&self) -> u64 {
        self.allocated
    }

    pub fn available(&self) -> u64 {
        self.capacity - self.allocated
    }

    /// Returns share of allocated capacity in range [0, 1].
    pub fn utilization(&self) -> f64 {
        if self.capacity == 0 {
            return 0.;
        }
        self.allocated as f64 / self.capacity as f64
    }

    /// Allocates the whole amount or nothing, returns whether the allocation succeeded.
    pub fn allocate(&mut self, amount: u64) -> bool {
        if amount > self.available() {
            return false;
        }
        self.allocated += amount;
        true
    }

    /// Allocates `min(amount, available)` and returns the granted amount.
    pub fn allocate_up_to(&mut self, amount: u64) -> u64 {
        let granted = amount.min(self.available());
        self.allocated += granted;
        granted
    }

    pub fn deallocate(&mut self, amount: u64) {
        self.allocated = self.allocated.saturating_sub(amount);
    }

    pub fn deallocate_all(&mut self) {
        self.allocated = 0;
    }
}

/// Storage device with a capacity (in MB), a read rate (in MB/s) and an access latency (in seconds).
///
/// Besides keeping files, the VM storage backs RAM pages swapped out when RAM is oversubscribed.
#[derive(Clone, Debug, Serialize)]
pub struct Storage {
    space: ResourceContainer,
    read_rate: f64,
    latency: f64,
}

impl Storage {
    pub fn new(capacity: u64, read_rate: f64, latency: f64) -> Self {
        Self {
            space: ResourceContainer::new(ResourceKind::Storage, capacity),
            read_rate,
            latency,
        }
    }

    pub fn capacity(&self) -> u64 {
        self.space.capacity()
    }

    pub fn available(&self) -> u64 {
        self.space.available()
    }

    pub fn space(&self) -> &ResourceContainer {
        &self.space
    }

    pub fn space_mut(&mut self) -> &mut ResourceContainer {
        &mut self.space
    }

    pub fn read_rate(&self) -> f64 {
        self.read_rate
    }

    /// Time in seconds needed to read `size` MB from the device.
    pub fn transfer_time(&self, size: u64) -> f64 {
        if size == 0 {
            return 0.;
        }
        if self.read_rate <= 0. {
            return f64::INFINITY;
        }
        self.latency + size as f64 / self.read_rate
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allocate_respects_capacity() {
        let mut ram = ResourceContainer::new(ResourceKind::Ram, 100);
        assert!(ram.allocate(60));
        assert!(!ram.allocate(50));
        assert_eq!(ram.allocate_up_to(50), 40);
        assert_eq!(ram.available(), 0);
        ram.deallocate(30);
        assert_eq!(ram.allocated(), 70);
        ram.deallocate(1000);
        assert_eq!(ram.allocated(), 0);
    }

    #[test]
    fn transfer_time_includes_latency() {
        let storage = Storage::new(1000, 100., 0.5);
        assert_eq!(storage.transfer_time(0), 0.);
        assert_eq!(storage.transfer_time(200), 2.5);
    }
}
