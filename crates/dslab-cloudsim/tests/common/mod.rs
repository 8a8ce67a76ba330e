#![allow(dead_code)]

use std::io::Write;

use env_logger::Builder;

use dslab_cloudsim::core::cloudlet::{Cloudlet, CloudletLength, CloudletRef};
use dslab_cloudsim::core::cloudlet_scheduler::CloudletScheduler;
use dslab_cloudsim::core::resource::Storage;
use dslab_cloudsim::core::vm::VmResources;
use sugars::{rc, refcell};

/// Enables simulation logs in tests, the level is set with `RUST_LOG`.
pub fn init_logger() {
    let _ = Builder::from_default_env()
        .format(|buf, record| writeln!(buf, "{}", record.args()))
        .is_test(true)
        .try_init();
}

pub fn assert_float_eq(x: f64, y: f64, eps: f64) {
    assert!((x - y).abs() < eps, "Values do not match: {:.15} vs {:.15}", x, y);
}

pub fn name_wrapper(file_name: &str) -> String {
    format!("test-configs/{}", file_name)
}

pub fn cloudlet(id: u64, length: u64, pes: u64) -> CloudletRef {
    rc!(refcell!(Cloudlet::new(id, CloudletLength::Finite(length), pes)))
}

pub fn vm_resources(ram: u64, bw: u64) -> VmResources {
    VmResources::new(ram, bw, Storage::new(100000, 100., 0.))
}

/// Runs scheduler updates until nothing is executing, returns the time of the last update.
pub fn run_to_completion(
    scheduler: &mut CloudletScheduler,
    resources: &mut VmResources,
    share: &[f64],
    start: f64,
) -> f64 {
    let mut time = start;
    let mut next = scheduler.update_processing(time, share, resources);
    let mut steps = 0;
    while let Some(delay) = next {
        time += delay;
        next = scheduler.update_processing(time, share, resources);
        steps += 1;
        assert!(steps < 100000, "scheduler does not converge");
    }
    time
}
