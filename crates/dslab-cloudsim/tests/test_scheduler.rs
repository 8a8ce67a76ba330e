mod common;

use sugars::{rc, refcell};

use dslab_cloudsim::core::cloudlet::{Cloudlet, CloudletLength, CloudletRef, CloudletStatus};
use dslab_cloudsim::core::cloudlet_scheduler::{scheduler_resolver, CloudletScheduler};
use dslab_cloudsim::core::config::sim_config::SimulationConfig;
use dslab_cloudsim::core::error::ConfigError;
use dslab_cloudsim::core::resource::Storage;
use dslab_cloudsim::core::utilization::ConstantUtilization;
use dslab_cloudsim::core::vm::{Vm, VmResources};

use common::{assert_float_eq, cloudlet, run_to_completion, vm_resources};

#[test]
// 1 VM with 2 PEs, 3 cloudlets requiring 2 PEs each, 1000 MI at 1000 MIPS.
// Cloudlets are executed one after another and finish at 1, 2 and 3.
fn test_space_shared_saturation() {
    let mut scheduler = CloudletScheduler::space_shared();
    scheduler.bind(0, 2, 1000.).unwrap();
    let mut resources = vm_resources(1024, 1000);
    let share = vec![1000.; 2];

    let cloudlets: Vec<_> = (0..3).map(|id| cloudlet(id, 1000, 2)).collect();
    assert_eq!(scheduler.submit(cloudlets[0].clone(), 0., 0.), 1.);
    assert_eq!(scheduler.submit(cloudlets[1].clone(), 0., 0.), 0.);
    assert_eq!(scheduler.submit(cloudlets[2].clone(), 0., 0.), 0.);
    assert_eq!(scheduler.exec_list().len(), 1);
    assert_eq!(scheduler.waiting_list().len(), 2);
    assert_eq!(cloudlets[1].borrow().status(), CloudletStatus::Queued);
    assert_eq!(scheduler.free_pes(), 0);

    let end = run_to_completion(&mut scheduler, &mut resources, &share, 0.);
    assert_float_eq(end, 3., 1e-9);
    for (i, cloudlet) in cloudlets.iter().enumerate() {
        let cloudlet = cloudlet.borrow();
        assert_eq!(cloudlet.status(), CloudletStatus::Success);
        assert_float_eq(cloudlet.finish_time().unwrap(), (i + 1) as f64, 1e-9);
        assert_float_eq(cloudlet.exec_start_time().unwrap(), i as f64, 1e-9);
    }
    assert!(scheduler.is_empty());
    assert_eq!(scheduler.finished_list().len(), 3);
    assert_eq!(scheduler.take_returned().len(), 3);
    assert!(scheduler.take_returned().is_empty());
}

#[test]
// Two 1-PE cloudlets on a 1-PE VM share its capacity and finish together.
fn test_time_shared_splits_capacity() {
    let mut scheduler = CloudletScheduler::time_shared();
    scheduler.bind(0, 1, 1000.).unwrap();
    let mut resources = vm_resources(1024, 1000);
    let share = vec![1000.];

    let a = cloudlet(0, 1000, 1);
    let b = cloudlet(1, 1000, 1);
    scheduler.submit(a.clone(), 0., 0.);
    assert_eq!(scheduler.submit(b.clone(), 0., 0.), 2.);
    assert_eq!(scheduler.exec_list().len(), 2);
    assert_eq!(scheduler.used_pes(), 1);
    assert_eq!(scheduler.free_pes(), 0);
    assert_float_eq(scheduler.requested_cpu_percent(0.), 2., 1e-9);
    assert_float_eq(scheduler.allocated_cpu_percent(0.), 1., 1e-9);

    let end = run_to_completion(&mut scheduler, &mut resources, &share, 0.);
    assert_float_eq(end, 2., 1e-9);
    assert_float_eq(a.borrow().finish_time().unwrap(), 2., 1e-9);
    assert_float_eq(b.borrow().finish_time().unwrap(), 2., 1e-9);
}

#[test]
// A cloudlet using half of the CPU gets half of the PE MIPS and takes twice as long.
fn test_partial_cpu_utilization() {
    let mut scheduler = CloudletScheduler::time_shared();
    scheduler.bind(0, 1, 1000.).unwrap();
    let mut resources = vm_resources(1024, 1000);
    let share = vec![1000.];

    let half = rc!(refcell!(Cloudlet::new(0, CloudletLength::Finite(1000), 1)
        .with_cpu_utilization(Box::new(ConstantUtilization::new(0.5)))));
    scheduler.submit(half.clone(), 0., 0.);
    let next = scheduler.update_processing(0., &share, &mut resources);
    assert_float_eq(next.unwrap(), 2., 1e-9);
    assert_float_eq(scheduler.exec_list()[0].allocated_mips, 500., 1e-9);

    let end = run_to_completion(&mut scheduler, &mut resources, &share, 1.);
    assert_float_eq(end, 2., 1e-9);
    assert_float_eq(half.borrow().finish_time().unwrap(), 2., 1e-9);
}

#[test]
// Equal cloudlets on a 1-PE VM under CFS: each gets its first slice within one latency window.
fn test_completely_fair_first_admission() {
    let mut scheduler = CloudletScheduler::completely_fair();
    scheduler.bind(0, 1, 1000.).unwrap();
    let mut resources = vm_resources(1024, 1000);
    let share = vec![1000.];

    let cloudlets: Vec<_> = (0..3).map(|id| cloudlet(id, 10000, 1)).collect();
    for c in &cloudlets {
        scheduler.submit(c.clone(), 0., 0.);
    }
    assert_eq!(scheduler.exec_list().len(), 1);
    assert_float_eq(scheduler.exec_list()[0].time_slice, 1., 1e-9);

    let end = run_to_completion(&mut scheduler, &mut resources, &share, 0.);
    let starts: Vec<f64> = cloudlets
        .iter()
        .map(|c| c.borrow().exec_start_time().unwrap())
        .collect();
    let first = starts.iter().cloned().fold(f64::INFINITY, f64::min);
    let last = starts.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
    assert!(last - first <= 3. + 1e-9, "first admissions {:?}", starts);
    assert_float_eq(starts[1], 1., 1e-9);
    assert_float_eq(starts[2], 2., 1e-9);

    // the VM is never idle, so all the work is done by 30 seconds
    assert_float_eq(end, 30., 1e-6);
    for c in &cloudlets {
        assert_eq!(c.borrow().status(), CloudletStatus::Success);
        assert_float_eq(c.borrow().finished_length(), 10000., 1e-6);
    }
}

#[test]
// A higher priority gets a longer time slice.
fn test_completely_fair_priorities() {
    let config = SimulationConfig::new();
    let mut scheduler = scheduler_resolver("CompletelyFair[latency=4,min_granularity=0.5]", &config).unwrap();
    scheduler.bind(0, 2, 1000.).unwrap();
    let high = rc!(refcell!(Cloudlet::new(0, CloudletLength::Finite(10000), 1).with_priority(3)));
    let low = cloudlet(1, 10000, 1);
    scheduler.submit(high, 0., 0.);
    scheduler.submit(low, 0., 0.);
    let slices: Vec<f64> = scheduler.exec_list().iter().map(|rec| rec.time_slice).collect();
    assert!(slices[0] > slices[1]);
    assert_float_eq(slices[0] + slices[1], 4., 1e-9);
}

#[test]
// Sum of PEs of executing cloudlets never exceeds VM PEs for space-shared and CFS schedulers.
fn test_pe_conservation() {
    for mut scheduler in [CloudletScheduler::space_shared(), CloudletScheduler::completely_fair()] {
        scheduler.bind(0, 4, 1000.).unwrap();
        let mut resources = vm_resources(1024, 1000);
        let share = vec![1000.; 4];
        let pes = [3, 2, 1, 4, 2, 1, 3];
        let mut time = 0.;
        for (id, pes) in pes.iter().enumerate() {
            scheduler.submit(cloudlet(id as u64, 500 * (id as u64 + 1), *pes), 0., time);
            let exec_pes: u64 = scheduler.exec_list().iter().map(|rec| rec.pes).sum();
            assert!(exec_pes <= scheduler.total_pes());
            time += 0.3;
            scheduler.update_processing(time, &share, &mut resources);
        }
        let mut next = scheduler.update_processing(time, &share, &mut resources);
        while let Some(delay) = next {
            time += delay;
            next = scheduler.update_processing(time, &share, &mut resources);
            let exec_pes: u64 = scheduler.exec_list().iter().map(|rec| rec.pes).sum();
            assert!(exec_pes <= scheduler.free_pes() + scheduler.used_pes());
            assert!(exec_pes <= 4);
        }
        assert_eq!(scheduler.finished_list().len(), pes.len());
    }
}

#[test]
// Cloudlet lifetime is a hard deadline: the cloudlet is finished at the reached length.
fn test_lifetime_deadline() {
    let mut scheduler = CloudletScheduler::time_shared();
    scheduler.bind(0, 1, 1000.).unwrap();
    let mut resources = vm_resources(1024, 1000);
    let c = rc!(refcell!(Cloudlet::new(0, CloudletLength::Finite(10000), 1).with_lifetime(2.)));
    assert_eq!(scheduler.submit(c.clone(), 0., 0.), 2.);
    let end = run_to_completion(&mut scheduler, &mut resources, &[1000.], 0.);
    assert_float_eq(end, 2., 1e-9);
    assert_eq!(c.borrow().status(), CloudletStatus::Success);
    assert_float_eq(c.borrow().finished_length(), 2000., 1e-6);
}

#[test]
// Indefinite cloudlets run until their lifetime elapses.
fn test_indefinite_cloudlet() {
    let mut scheduler = CloudletScheduler::space_shared();
    scheduler.bind(0, 1, 500.).unwrap();
    let mut resources = vm_resources(1024, 1000);
    let c = rc!(refcell!(Cloudlet::new(0, CloudletLength::Indefinite, 1).with_lifetime(5.)));
    scheduler.submit(c.clone(), 0., 0.);
    let end = run_to_completion(&mut scheduler, &mut resources, &[500.], 0.);
    assert_float_eq(end, 5., 1e-9);
    assert_float_eq(c.borrow().finished_length(), 2500., 1e-6);
    assert_eq!(c.borrow().status(), CloudletStatus::Success);
}

#[test]
// The input file is read from VM storage before execution starts.
fn test_file_transfer_time() {
    let scheduler = CloudletScheduler::space_shared();
    let resources = VmResources::new(1024, 1000, Storage::new(10000, 100., 0.));
    let mut vm = Vm::new(0, 1, 1000., resources, scheduler).unwrap();
    let c = rc!(refcell!(Cloudlet::new(0, CloudletLength::Finite(1000), 1).with_files(200, 0)));
    assert_eq!(vm.submit_cloudlet(c.clone(), 0.), 3.);
    assert_eq!(vm.update_processing(0., &[1000.]), Some(3.));
    assert_eq!(vm.update_processing(3., &[1000.]), None);
    assert_eq!(c.borrow().status(), CloudletStatus::Success);
    assert_float_eq(c.borrow().finish_time().unwrap(), 3., 1e-9);
    assert_eq!(vm.idle_since(), Some(3.));
}

#[test]
// Binding a scheduler to a second VM is rejected.
fn test_scheduler_bound_twice() {
    let mut scheduler = CloudletScheduler::time_shared();
    scheduler.bind(7, 1, 1000.).unwrap();
    let result = Vm::new(8, 1, 1000., vm_resources(1024, 1000), scheduler);
    assert!(matches!(
        result,
        Err(ConfigError::SchedulerAlreadyBound { bound: 7, requested: 8 })
    ));
}

#[test]
// A cloudlet with nothing left to execute is finalized even if a pause is requested.
fn test_pause_finished_cloudlet() {
    let mut scheduler = CloudletScheduler::time_shared();
    scheduler.bind(0, 1, 1000.).unwrap();
    let c = cloudlet(0, 0, 1);
    scheduler.submit(c.clone(), 0., 0.);
    assert_eq!(c.borrow().status(), CloudletStatus::InExec);
    assert!(scheduler.pause(0, 0.));
    assert_eq!(c.borrow().status(), CloudletStatus::Success);
    assert!(scheduler.paused_list().is_empty());
    assert_eq!(scheduler.finished_list().len(), 1);
}

#[test]
// Frozen cloudlets are skipped until they are marked ready.
fn test_frozen_cloudlet() {
    let mut scheduler = CloudletScheduler::space_shared();
    scheduler.bind(0, 1, 1000.).unwrap();
    let mut resources = vm_resources(1024, 1000);
    let c = rc!(refcell!(Cloudlet::frozen(0, CloudletLength::Finite(1000), 1)));
    assert_eq!(scheduler.submit(c.clone(), 0., 0.), 0.);
    assert_eq!(scheduler.update_processing(0., &[1000.], &mut resources), None);
    assert_eq!(c.borrow().status(), CloudletStatus::Frozen);

    assert!(scheduler.ready(0, 1.));
    assert_eq!(c.borrow().status(), CloudletStatus::Ready);
    let end = run_to_completion(&mut scheduler, &mut resources, &[1000.], 1.);
    assert_float_eq(end, 2., 1e-9);
    assert_eq!(c.borrow().status(), CloudletStatus::Success);
}

#[test]
// Pause and resume keep the progress of a cloudlet.
fn test_pause_resume() {
    let mut scheduler = CloudletScheduler::space_shared();
    scheduler.bind(0, 1, 1000.).unwrap();
    let mut resources = vm_resources(1024, 1000);
    let c = cloudlet(0, 2000, 1);
    scheduler.submit(c.clone(), 0., 0.);
    scheduler.update_processing(0., &[1000.], &mut resources);
    scheduler.update_processing(0.5, &[1000.], &mut resources);
    assert!(scheduler.pause(0, 0.5));
    assert_eq!(c.borrow().status(), CloudletStatus::Paused);
    assert_eq!(scheduler.update_processing(0.5, &[1000.], &mut resources), None);

    assert!(scheduler.resume(0, 10.));
    assert_eq!(c.borrow().status(), CloudletStatus::InExec);
    let end = run_to_completion(&mut scheduler, &mut resources, &[1000.], 10.);
    assert_float_eq(end, 11.5, 1e-9);
}

#[test]
// Every status operation applied to every reachable status either does nothing
// or performs an allowed transition.
fn test_status_transition_closure() {
    type Operation = fn(&mut CloudletScheduler, u64, f64) -> bool;
    let operations: [(&str, Operation); 5] = [
        ("pause", |s, id, t| s.pause(id, t)),
        ("resume", |s, id, t| s.resume(id, t)),
        ("cancel", |s, id, t| s.cancel(id, t)),
        ("fail", |s, id, t| s.fail(id, t)),
        ("ready", |s, id, t| s.ready(id, t)),
    ];
    let states = [
        CloudletStatus::InExec,
        CloudletStatus::Queued,
        CloudletStatus::Frozen,
        CloudletStatus::Paused,
        CloudletStatus::Success,
        CloudletStatus::Canceled,
        CloudletStatus::Failed,
    ];

    for state in states {
        for (name, operation) in operations.iter() {
            let mut scheduler = CloudletScheduler::space_shared();
            scheduler.bind(0, 1, 1000.).unwrap();
            let mut resources = vm_resources(1024, 1000);
            let target = prepare_status(&mut scheduler, &mut resources, state);
            let before = target.borrow().status();
            assert_eq!(before, state);

            let target_id = target.borrow().id;
            assert!(operation(&mut scheduler, target_id, 1.), "{} not found", name);
            let after = target.borrow().status();
            assert!(
                after == before || before.can_transition_to(after),
                "{} moved cloudlet from {} to {}",
                name,
                before,
                after
            );
            assert!(!operation(&mut scheduler, 100, 1.));
        }
    }
}

fn prepare_status(
    scheduler: &mut CloudletScheduler,
    resources: &mut VmResources,
    state: CloudletStatus,
) -> CloudletRef {
    let first = cloudlet(0, 1000, 1);
    match state {
        CloudletStatus::Frozen => {
            let c = rc!(refcell!(Cloudlet::frozen(1, CloudletLength::Finite(1000), 1)));
            scheduler.submit(c.clone(), 0., 0.);
            c
        }
        CloudletStatus::Queued => {
            scheduler.submit(first, 0., 0.);
            let c = cloudlet(1, 1000, 1);
            scheduler.submit(c.clone(), 0., 0.);
            c
        }
        CloudletStatus::Success => {
            let c = cloudlet(1, 0, 1);
            scheduler.submit(c.clone(), 0., 0.);
            scheduler.update_processing(0., &[1000.], resources);
            c
        }
        _ => {
            scheduler.submit(first.clone(), 0., 0.);
            match state {
                CloudletStatus::Paused => {
                    scheduler.pause(0, 0.);
                }
                CloudletStatus::Canceled => {
                    scheduler.cancel(0, 0.);
                }
                CloudletStatus::Failed => {
                    scheduler.fail(0, 0.);
                }
                _ => {}
            }
            first
        }
    }
}
