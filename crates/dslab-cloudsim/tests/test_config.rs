mod common;

use dslab_core::simulation::Simulation;

use dslab_cloudsim::core::cloudlet_scheduler::scheduler_resolver;
use dslab_cloudsim::core::config::sim_config::SimulationConfig;
use dslab_cloudsim::core::error::ConfigError;
use dslab_cloudsim::core::vm_mapper::vm_mapper_resolver;
use dslab_cloudsim::simulation::CloudSimulation;

use common::name_wrapper;

#[test]
// Parameters absent in the file keep their default values.
fn test_defaults() {
    let config = SimulationConfig::from_file(&name_wrapper("config.yaml")).unwrap();
    assert_eq!(config.cloudlet_scheduler, "SpaceShared");
    assert_eq!(config.min_time_between_events, 0.1);
    assert_eq!(config.scheduling_interval, 0.);
    assert_eq!(config.max_vm_creation_retries, 3);
    assert_eq!(config.vm_destruction_delay, -1.);
    assert_eq!(config.termination_time, None);
    assert!(config.shutdown_when_idle);
    assert!(!config.vm_creation_retry_enabled());
    assert!(config.datacenters.is_empty());
    assert_eq!(SimulationConfig::from_yaml("{}").unwrap(), SimulationConfig::new());
}

#[test]
// Every parameter is read from the file, datacenters are created on simulation start.
fn test_full_config() {
    let config = SimulationConfig::from_file(&name_wrapper("full.yaml")).unwrap();
    assert_eq!(config.min_time_between_events, 0.05);
    assert_eq!(config.scheduling_interval, 1.);
    assert_eq!(config.vm_startup_delay, 0.5);
    assert_eq!(config.message_delay, 0.01);
    assert_eq!(config.termination_time, Some(100.));
    assert_eq!(config.max_vm_creation_retries, 4);
    assert!(config.vm_creation_retry_enabled());
    assert!(config.batch_vm_creation);
    assert!(config.select_closest_datacenter);
    assert!(!config.shutdown_when_idle);
    assert_eq!(config.cfs_latency, 6.);
    assert_eq!(config.vm_mapper, "BestFit");
    assert_eq!(config.datacenters.len(), 2);
    assert_eq!(config.datacenters[0].time_zone, -5.);
    assert_eq!(config.datacenters[1].time_zone, 0.);
    assert_eq!(config.datacenters[0].hosts[0].count, Some(3));

    let cloud_sim = CloudSimulation::new(Simulation::new(), config);
    let ids = cloud_sim.datacenter_ids();
    assert_eq!(ids.len(), 2);
    let east = cloud_sim.datacenter(ids[0]).unwrap();
    assert_eq!(east.borrow().name(), "dc-east");
    assert_eq!(east.borrow().hosts().len(), 4);
    assert_eq!(east.borrow().hosts()[3].pes(), 4);
    let host_ids: Vec<u32> = east.borrow().hosts().iter().map(|h| h.id).collect();
    assert_eq!(host_ids, vec![0, 1, 2, 3]);
    let west = cloud_sim.datacenter(ids[1]).unwrap();
    assert_eq!(west.borrow().hosts().len(), 1);

    // scheduler options override the config defaults
    let scheduler = cloud_sim.cloudlet_scheduler().unwrap();
    assert_eq!(scheduler.policy_name(), "CompletelyFair");
}

#[test]
// Negative number of retries is rejected.
fn test_negative_retries() {
    let result = SimulationConfig::from_file(&name_wrapper("negative_retries.yaml"));
    assert!(matches!(result, Err(ConfigError::NegativeValue { ref name, .. }) if name == "max_vm_creation_retries"));
}

#[test]
// Misspelled parameter is reported instead of being silently ignored.
fn test_unknown_key() {
    let result = SimulationConfig::from_file(&name_wrapper("unknown_key.yaml"));
    assert!(matches!(result, Err(ConfigError::Yaml(_))));
    let result = SimulationConfig::from_file(&name_wrapper("missing.yaml"));
    assert!(matches!(result, Err(ConfigError::Io(_))));
}

#[test]
// Invalid parameter values are rejected.
fn test_validation() {
    let result = SimulationConfig::from_file(&name_wrapper("empty_datacenter.yaml"));
    assert!(matches!(result, Err(ConfigError::InvalidValue { .. })));
    assert!(matches!(
        SimulationConfig::from_yaml("message_delay: -1.0"),
        Err(ConfigError::NegativeValue { .. })
    ));
    assert!(matches!(
        SimulationConfig::from_yaml("cfs_latency: 0.0"),
        Err(ConfigError::InvalidValue { .. })
    ));
    assert!(matches!(
        SimulationConfig::from_yaml("termination_time: -5.0"),
        Err(ConfigError::NegativeValue { .. })
    ));
}

#[test]
// Policies are resolved by name, unknown names are errors.
fn test_resolvers() {
    let config = SimulationConfig::new();
    for name in ["TimeShared", "SpaceShared", "CompletelyFair", "CompletelyFair[latency=2, min_granularity=0.5]"] {
        assert!(scheduler_resolver(name, &config).is_ok(), "{}", name);
    }
    assert!(matches!(
        scheduler_resolver("RoundRobin", &config),
        Err(ConfigError::UnknownPolicy { .. })
    ));
    assert!(matches!(
        scheduler_resolver("CompletelyFair[latency=abc]", &config),
        Err(ConfigError::InvalidValue { .. })
    ));
    assert!(scheduler_resolver("CompletelyFair[latency=-1]", &config).is_err());

    for name in ["RoundRobin", "FirstFit", "BestFit"] {
        assert!(vm_mapper_resolver(name).is_ok(), "{}", name);
    }
    assert!(vm_mapper_resolver("WorstFit").is_err());

    let config = SimulationConfig {
        vm_mapper: "Random".to_string(),
        ..SimulationConfig::new()
    };
    let mut cloud_sim = CloudSimulation::new(Simulation::new(), config);
    assert!(matches!(
        cloud_sim.add_broker("broker"),
        Err(ConfigError::UnknownPolicy { kind: "vm mapper", .. })
    ));
}
