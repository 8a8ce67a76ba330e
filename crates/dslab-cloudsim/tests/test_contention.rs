mod common;

use std::cell::RefCell;
use std::rc::Rc;

use sugars::{rc, refcell};

use dslab_cloudsim::core::cloudlet::{Cloudlet, CloudletLength, CloudletRef, CloudletStatus};
use dslab_cloudsim::core::cloudlet_scheduler::{CloudletScheduler, ResourceShortage};
use dslab_cloudsim::core::contention::OversubscriptionDelay;
use dslab_cloudsim::core::resource::ResourceKind;
use dslab_cloudsim::core::utilization::{ConstantUtilization, DynamicUtilization};

use common::{assert_float_eq, init_logger, run_to_completion, vm_resources};

fn bw_cloudlet(id: u64, length: u64, bw: f64) -> CloudletRef {
    rc!(refcell!(Cloudlet::new(id, CloudletLength::Finite(length), 1)
        .with_bw_utilization(Box::new(ConstantUtilization::absolute(bw)))))
}

fn ram_cloudlet(id: u64, length: u64, ram: f64) -> CloudletRef {
    rc!(refcell!(Cloudlet::new(id, CloudletLength::Finite(length), 1)
        .with_ram_utilization(Box::new(ConstantUtilization::absolute(ram)))))
}

fn collect_shortages(scheduler: &CloudletScheduler) -> Rc<RefCell<Vec<ResourceShortage>>> {
    init_logger();
    let shortages = rc!(refcell!(Vec::new()));
    let shortages_clone = shortages.clone();
    scheduler
        .shortage_listeners()
        .add(move |shortage: &ResourceShortage| shortages_clone.borrow_mut().push(shortage.clone()));
    shortages
}

#[test]
// Two cloudlets request 800 Mbps each from 1000 Mbps VM bandwidth.
// The second one gets 200 Mbps, which makes its processing 3 times longer than the step.
fn test_bandwidth_oversubscription() {
    let mut scheduler = CloudletScheduler::time_shared();
    scheduler.bind(0, 2, 1000.).unwrap();
    let shortages = collect_shortages(&scheduler);
    let mut resources = vm_resources(1024, 1000);
    let share = vec![1000.; 2];

    let first = bw_cloudlet(0, 1000, 800.);
    let second = bw_cloudlet(1, 1000, 800.);
    scheduler.submit(first.clone(), 0., 0.);
    scheduler.submit(second.clone(), 0., 0.);

    assert_eq!(scheduler.update_processing(0., &share, &mut resources), Some(1.));
    let exec = scheduler.exec_list();
    assert_eq!(exec[0].last_delay, OversubscriptionDelay::None);
    assert_eq!(exec[1].last_delay, OversubscriptionDelay::Delay(3.));
    assert_eq!(exec[0].allocated_bw, 800);
    assert_eq!(exec[1].allocated_bw, 200);
    let allocated: u64 = exec.iter().map(|rec| rec.allocated_bw).sum();
    assert!(allocated <= resources.bw.capacity());
    assert_eq!(resources.bw.allocated(), 1000);

    {
        let shortages = shortages.borrow();
        assert_eq!(shortages.len(), 1);
        assert_eq!(shortages[0].kind, ResourceKind::Bandwidth);
        assert_eq!(shortages[0].cloudlet_id, 1);
        assert_eq!(shortages[0].vm_id, Some(0));
        assert_eq!(shortages[0].requested, 800);
        assert_eq!(shortages[0].available, 200);
        assert_eq!(shortages[0].requested - shortages[0].available, 600);
    }

    // the second cloudlet is stalled while the first one holds the bandwidth
    let end = run_to_completion(&mut scheduler, &mut resources, &share, 0.);
    assert_float_eq(end, 2., 1e-9);
    assert_float_eq(first.borrow().finish_time().unwrap(), 1., 1e-9);
    assert_float_eq(second.borrow().finish_time().unwrap(), 2., 1e-9);
    assert_float_eq(first.borrow().oversubscription_delay(), 0., 1e-9);
    assert_float_eq(second.borrow().oversubscription_delay(), 1., 1e-9);
    assert_eq!(resources.bw.allocated(), 0);
}

#[test]
// Request above the whole VM bandwidth can never be satisfied, the cloudlet makes no progress.
fn test_unsatisfiable_request() {
    let mut scheduler = CloudletScheduler::time_shared();
    scheduler.bind(0, 1, 1000.).unwrap();
    let shortages = collect_shortages(&scheduler);
    let mut resources = vm_resources(1024, 1000);

    let c = bw_cloudlet(0, 1000, 1500.);
    scheduler.submit(c.clone(), 0., 0.);
    for time in [0., 1., 5.] {
        assert!(scheduler.update_processing(time, &[1000.], &mut resources).is_some());
        assert!(scheduler.exec_list()[0].last_delay.is_unsatisfiable());
    }
    assert_eq!(c.borrow().status(), CloudletStatus::InExec);
    assert_float_eq(c.borrow().finished_length(), 0., 1e-9);
    assert_float_eq(c.borrow().oversubscription_delay(), 5., 1e-9);
    assert!(resources.bw.allocated() <= resources.bw.capacity());
    assert_eq!(shortages.borrow().len(), 3);
    assert_eq!(shortages.borrow()[0].available, 1000);

    assert!(scheduler.cancel(0, 5.));
    assert_eq!(c.borrow().status(), CloudletStatus::Canceled);
    assert_eq!(scheduler.update_processing(5., &[1000.], &mut resources), None);
    assert_eq!(resources.bw.allocated(), 0);
}

#[test]
// RAM shortfall is swapped from the VM storage at 100 MB/s.
fn test_ram_oversubscription() {
    let mut scheduler = CloudletScheduler::time_shared();
    scheduler.bind(0, 2, 1000.).unwrap();
    let shortages = collect_shortages(&scheduler);
    let mut resources = vm_resources(1024, 1000);

    scheduler.submit(ram_cloudlet(0, 1000, 600.), 0., 0.);
    scheduler.submit(ram_cloudlet(1, 1000, 600.), 0., 0.);
    scheduler.update_processing(0., &[1000.; 2], &mut resources);

    let exec = scheduler.exec_list();
    assert_eq!(exec[0].last_delay, OversubscriptionDelay::None);
    match exec[1].last_delay {
        OversubscriptionDelay::Delay(delay) => assert_float_eq(delay, 1.76, 1e-9),
        other => panic!("unexpected delay {:?}", other),
    }
    assert_eq!(resources.ram.allocated(), 1024);
    assert_eq!(shortages.borrow()[0].kind, ResourceKind::Ram);
    assert_eq!(shortages.borrow()[0].available, 424);
}

#[test]
// A larger RAM request never gets a smaller delay.
fn test_ram_delay_monotonicity() {
    let mut previous = 0.;
    for request in [500., 600., 700., 800., 900., 1000.] {
        let mut scheduler = CloudletScheduler::time_shared();
        scheduler.bind(0, 2, 1000.).unwrap();
        let mut resources = vm_resources(1024, 1000);
        scheduler.submit(ram_cloudlet(0, 1000, 512.), 0., 0.);
        scheduler.submit(ram_cloudlet(1, 1000, request), 0., 0.);
        scheduler.update_processing(0., &[1000.; 2], &mut resources);

        let delay = scheduler.exec_list()[1].last_delay;
        assert!(!delay.is_unsatisfiable());
        assert!(delay.seconds() >= previous);
        previous = delay.seconds();
    }
    assert!(previous > 0.);
}

#[test]
// Utilization changing in time is reevaluated on each update.
fn test_dynamic_bandwidth_utilization() {
    let mut scheduler = CloudletScheduler::time_shared();
    scheduler.bind(0, 2, 1000.).unwrap();
    let mut resources = vm_resources(1024, 1000);

    let steady = bw_cloudlet(0, 10000, 500.);
    let growing = rc!(refcell!(Cloudlet::new(1, CloudletLength::Finite(10000), 1)
        .with_bw_utilization(Box::new(DynamicUtilization::new(|time| 0.1 * time)))));
    scheduler.submit(steady, 0., 0.);
    scheduler.submit(growing, 0., 0.);

    scheduler.update_processing(0., &[1000.; 2], &mut resources);
    assert_eq!(scheduler.exec_list()[1].allocated_bw, 0);
    scheduler.update_processing(4., &[1000.; 2], &mut resources);
    assert_eq!(scheduler.exec_list()[1].allocated_bw, 400);
    assert_eq!(scheduler.exec_list()[1].last_delay, OversubscriptionDelay::None);
    scheduler.update_processing(8., &[1000.; 2], &mut resources);
    assert_eq!(scheduler.exec_list()[1].allocated_bw, 500);
    assert_float_eq(scheduler.exec_list()[1].last_delay.seconds(), 0.6, 1e-9);
    assert_eq!(resources.bw.allocated(), 1000);
}

#[test]
// Repeated updates at the same time report each shortage once.
fn test_shortage_reported_once_per_time() {
    let mut scheduler = CloudletScheduler::time_shared();
    scheduler.bind(0, 2, 1000.).unwrap();
    let shortages = collect_shortages(&scheduler);
    let mut resources = vm_resources(1024, 1000);

    scheduler.submit(bw_cloudlet(0, 10000, 800.), 0., 0.);
    scheduler.submit(bw_cloudlet(1, 10000, 800.), 0., 0.);
    for _ in 0..3 {
        scheduler.update_processing(0., &[1000.; 2], &mut resources);
    }
    assert_eq!(shortages.borrow().len(), 1);
    assert_eq!(resources.bw.allocated(), 1000);

    scheduler.update_processing(1., &[1000.; 2], &mut resources);
    scheduler.update_processing(1., &[1000.; 2], &mut resources);
    assert_eq!(shortages.borrow().len(), 2);
    assert_eq!(shortages.borrow()[1].time, 1.);
}
