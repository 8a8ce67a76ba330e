//! Resource contention math: CPU share division and delays caused by RAM or bandwidth oversubscription.

use serde::Serialize;

use crate::core::resource::Storage;

/// Delay caused by oversubscription of a resource during one processing step.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub enum OversubscriptionDelay {
    None,
    Delay(f64),
    /// The request exceeds the resource capacity, the cloudlet can't progress at all.
    Unsatisfiable,
}

impl OversubscriptionDelay {
    pub fn seconds(&self) -> f64 {
        match self {
            Self::None => 0.,
            Self::Delay(d) => *d,
            Self::Unsatisfiable => f64::INFINITY,
        }
    }

    pub fn is_unsatisfiable(&self) -> bool {
        matches!(self, Self::Unsatisfiable)
    }

    /// RAM and bandwidth delays are assumed to overlap, so the larger one is applied.
    pub fn max(self, other: Self) -> Self {
        if other.seconds() > self.seconds() {
            other
        } else {
            self
        }
    }

    /// Processing time left from `span` after applying the delay.
    pub fn effective_span(&self, span: f64) -> f64 {
        (span - self.seconds()).max(0.)
    }
}

/// MIPS available to each PE of a cloudlet when the VM PEs are shared by all executing cloudlets.
///
/// PEs are split proportionally only when the executing cloudlets request more PEs than the VM has.
pub fn mips_per_pe(capacity_per_pe: f64, requested_pes: u64, total_pes: u64) -> f64 {
    if total_pes == 0 {
        return 0.;
    }
    let oversubscription = (requested_pes as f64 / total_pes as f64).max(1.);
    capacity_per_pe / oversubscription
}

/// Delay of transferring data when only a part of the requested bandwidth is available.
///
/// With `shortfall = requested - available` the transfer is `requested / (requested - shortfall)` times slower.
pub fn bandwidth_delay(requested: u64, available: u64, capacity: u64) -> OversubscriptionDelay {
    if requested <= available {
        return OversubscriptionDelay::None;
    }
    if requested > capacity || available == 0 {
        return OversubscriptionDelay::Unsatisfiable;
    }
    let shortfall = requested - available;
    OversubscriptionDelay::Delay(requested as f64 / (requested - shortfall) as f64 - 1.)
}

/// Delay of swapping the RAM shortfall from the VM storage.
pub fn memory_delay(requested: u64, available: u64, capacity: u64, storage: &Storage) -> OversubscriptionDelay {
    if requested <= available {
        return OversubscriptionDelay::None;
    }
    if requested > capacity {
        return OversubscriptionDelay::Unsatisfiable;
    }
    let shortfall = requested - available;
    if shortfall > storage.available() {
        return OversubscriptionDelay::Unsatisfiable;
    }
    OversubscriptionDelay::Delay(storage.transfer_time(shortfall))
}
