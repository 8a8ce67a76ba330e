//! Completely fair policy, modelled after the Linux CFS.

use crate::core::cloudlet_execution::CloudletExecution;
use crate::core::cloudlet_scheduler::CloudletSchedulingPolicy;
use crate::core::error::ConfigError;

const NICE_0_WEIGHT: f64 = 1024.;

/// Admits a cloudlet when enough PEs are free and preempts it once it exhausts its time slice.
///
/// Each executing cloudlet accumulates virtual runtime (VRT), reset to zero on admission.
/// The time slice is the cloudlet's weighted share of the scheduling latency, but not less than the minimum
/// granularity. Weights are computed as `1024 / 1.25^(-priority)`, so a greater priority value means a larger slice.
///
/// Waiting cloudlets are ordered by the number of slices already received, then by VRT, priority and id.
/// Preempted cloudlets get their initial VRT back, so among cloudlets of the same round lower ids start first.
#[derive(Clone)]
pub struct CompletelyFairPolicy {
    latency: f64,
    min_granularity: f64,
}

impl Default for CompletelyFairPolicy {
    fn default() -> Self {
        Self {
            latency: 3.,
            min_granularity: 0.9,
        }
    }
}

impl CompletelyFairPolicy {
    pub fn new(latency: f64, min_granularity: f64) -> Result<Self, ConfigError> {
        if latency <= 0. {
            return Err(ConfigError::invalid("cfs latency", format!("must be positive, got {}", latency)));
        }
        if min_granularity <= 0. {
            return Err(ConfigError::invalid(
                "cfs min granularity",
                format!("must be positive, got {}", min_granularity),
            ));
        }
        Ok(Self {
            latency,
            min_granularity,
        })
    }

    pub fn latency(&self) -> f64 {
        self.latency
    }

    pub fn min_granularity(&self) -> f64 {
        self.min_granularity
    }

    pub fn weight(priority: i32) -> f64 {
        NICE_0_WEIGHT / 1.25f64.powi(-priority)
    }

    pub fn initial_virtual_runtime(id: u64, priority: i32) -> f64 {
        -(priority as f64 + i32::MAX as f64 / (id as f64 + 1.))
    }
}

impl CloudletSchedulingPolicy for CompletelyFairPolicy {
    fn name(&self) -> &str {
        "CompletelyFair"
    }

    fn can_execute(&self, pes: u64, free_pes: u64) -> bool {
        pes <= free_pes
    }

    fn is_preemptive(&self) -> bool {
        true
    }

    fn on_submit(&self, rec: &mut CloudletExecution) {
        rec.virtual_runtime = Self::initial_virtual_runtime(rec.id, rec.priority);
    }

    fn on_admit(&self, rec: &mut CloudletExecution) {
        rec.virtual_runtime = 0.;
    }

    fn on_processed(&self, rec: &mut CloudletExecution, span: f64) {
        rec.virtual_runtime += span;
    }

    fn on_preempt(&self, rec: &mut CloudletExecution) {
        rec.virtual_runtime = Self::initial_virtual_runtime(rec.id, rec.priority);
        rec.rounds += 1;
    }

    fn sort_waiting(&self, waiting: &mut [CloudletExecution]) {
        waiting.sort_by(|a, b| {
            a.rounds
                .cmp(&b.rounds)
                .then(a.virtual_runtime.total_cmp(&b.virtual_runtime))
                .then(a.priority.cmp(&b.priority))
                .then(a.id.cmp(&b.id))
        });
    }

    fn update_time_slices(&self, exec: &mut [CloudletExecution], waiting: &[CloudletExecution]) {
        let total_weight: f64 = exec
            .iter()
            .map(|rec| Self::weight(rec.priority))
            .chain(
                waiting
                    .iter()
                    .filter(|rec| rec.status().is_admissible())
                    .map(|rec| Self::weight(rec.priority)),
            )
            .sum();
        for rec in exec.iter_mut() {
            let share = Self::weight(rec.priority) / total_weight;
            rec.time_slice = (self.latency * share).max(self.min_granularity);
        }
    }

    fn is_expired(&self, rec: &CloudletExecution) -> bool {
        rec.virtual_runtime >= rec.time_slice - 1e-9
    }

    fn time_slice_remaining(&self, rec: &CloudletExecution) -> Option<f64> {
        Some((rec.time_slice - rec.virtual_runtime).max(0.))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn weights_grow_with_priority() {
        assert_eq!(CompletelyFairPolicy::weight(0), 1024.);
        assert_eq!(CompletelyFairPolicy::weight(1), 1280.);
        assert!(CompletelyFairPolicy::weight(-1) < 1024.);
    }

    #[test]
    fn lower_ids_start_first() {
        let a = CompletelyFairPolicy::initial_virtual_runtime(0, 0);
        let b = CompletelyFairPolicy::initial_virtual_runtime(1, 0);
        assert!(a < b);
        assert_eq!(a, -(i32::MAX as f64));
    }

    #[test]
    fn rejects_non_positive_parameters() {
        assert!(CompletelyFairPolicy::new(0., 0.9).is_err());
        assert!(CompletelyFairPolicy::new(3., -1.).is_err());
        assert!(CompletelyFairPolicy::new(3., 0.9).is_ok());
    }
}
