//! Resource utilization models of cloudlets.

use std::rc::Rc;

use dyn_clone::{clone_trait_object, DynClone};
use rand::prelude::*;
use rand_pcg::Pcg64;
use serde::Serialize;

/// Unit of values returned by a utilization model.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum UtilizationUnit {
    /// Fraction of the VM capacity in range [0, 1].
    Percentage,
    /// Absolute amount: MIPS for CPU, MB for RAM, Mbps for bandwidth.
    Absolute,
}

/// A utilization model is a function of simulation time, which defines how much of some resource
/// a cloudlet uses at the moment.
pub trait UtilizationModel: DynClone {
    fn utilization(&self, time: f64) -> f64;

    fn unit(&self) -> UtilizationUnit {
        UtilizationUnit::Percentage
    }

    /// Converts the utilization at `time` into an absolute amount of a resource with specified capacity.
    fn requested_amount(&self, time: f64, capacity: u64) -> u64 {
        let value = self.utilization(time).max(0.);
        match self.unit() {
            UtilizationUnit::Percentage => (value.min(1.) * capacity as f64).round() as u64,
            UtilizationUnit::Absolute => value.round() as u64,
        }
    }

    /// Converts the utilization at `time` into a fraction of a resource with specified capacity.
    fn fraction(&self, time: f64, capacity: f64) -> f64 {
        let value = self.utilization(time).max(0.);
        match self.unit() {
            UtilizationUnit::Percentage => value.min(1.),
            UtilizationUnit::Absolute if capacity > 0. => (value / capacity).min(1.),
            UtilizationUnit::Absolute => 0.,
        }
    }
}

clone_trait_object!(UtilizationModel);

/// Uses the whole resource all the time.
#[derive(Clone, Default)]
pub struct FullUtilization;

impl UtilizationModel for FullUtilization {
    fn utilization(&self, _time: f64) -> f64 {
        1.
    }
}

/// Uses a constant amount of resource.
#[derive(Clone)]
pub struct ConstantUtilization {
    value: f64,
    unit: UtilizationUnit,
}

impl ConstantUtilization {
    pub fn new(fraction: f64) -> Self {
        Self {
            value: fraction,
            unit: UtilizationUnit::Percentage,
        }
    }

    pub fn absolute(amount: f64) -> Self {
        Self {
            value: amount,
            unit: UtilizationUnit::Absolute,
        }
    }
}

impl UtilizationModel for ConstantUtilization {
    fn utilization(&self, _time: f64) -> f64 {
        self.value
    }

    fn unit(&self) -> UtilizationUnit {
        self.unit
    }
}

/// Uses a pseudo-random fraction of resource in range [min, max).
///
/// The value depends only on the seed and the time, so repeated queries at the same time agree.
#[derive(Clone)]
pub struct RandomUtilization {
    seed: u64,
    min: f64,
    max: f64,
}

impl RandomUtilization {
    pub fn new(seed: u64, min: f64, max: f64) -> Self {
        Self { seed, min, max }
    }
}

impl UtilizationModel for RandomUtilization {
    fn utilization(&self, time: f64) -> f64 {
        if self.max <= self.min {
            return self.min;
        }
        let mut rng = Pcg64::seed_from_u64(self.seed ^ time.to_bits());
        rng.gen_range(self.min..self.max)
    }
}

/// Computes utilization with a user-provided function of time.
#[derive(Clone)]
pub struct DynamicUtilization {
    func: Rc<dyn Fn(f64) -> f64>,
    unit: UtilizationUnit,
}

impl DynamicUtilization {
    pub fn new<F: Fn(f64) -> f64 + 'static>(func: F) -> Self {
        Self {
            func: Rc::new(func),
            unit: UtilizationUnit::Percentage,
        }
    }

    pub fn absolute<F: Fn(f64) -> f64 + 'static>(func: F) -> Self {
        Self {
            func: Rc::new(func),
            unit: UtilizationUnit::Absolute,
        }
    }
}

impl UtilizationModel for DynamicUtilization {
    fn utilization(&self, time: f64) -> f64 {
        (self.func)(time)
    }

    fn unit(&self) -> UtilizationUnit {
        self.unit
    }
}
