//! Simulation configuration.

use serde::{Deserialize, Serialize};

use crate::core::error::ConfigError;

/// Holds raw simulation config parsed from YAML file.
#[derive(Debug, PartialEq, Serialize, Deserialize, Clone, Default)]
#[serde(deny_unknown_fields)]
struct RawSimulationConfig {
    pub min_time_between_events: Option<f64>,
    pub scheduling_interval: Option<f64>,
    pub vm_startup_delay: Option<f64>,
    pub message_delay: Option<f64>,
    pub termination_time: Option<f64>,
    pub vm_creation_retry_delay: Option<f64>,
    pub max_vm_creation_retries: Option<i64>,
    pub vm_destruction_delay: Option<f64>,
    pub batch_vm_creation: Option<bool>,
    pub select_closest_datacenter: Option<bool>,
    pub shutdown_when_idle: Option<bool>,
    pub cfs_latency: Option<f64>,
    pub cfs_min_granularity: Option<f64>,
    pub vm_mapper: Option<String>,
    pub cloudlet_scheduler: Option<String>,
    pub datacenters: Option<Vec<DatacenterConfig>>,
}

/// Holds configuration of a single physical host or a set of identical hosts.
#[derive(Debug, PartialEq, Serialize, Deserialize, Clone)]
pub struct HostConfig {
    pub pes: u64,
    /// MIPS capacity of each PE.
    pub mips: f64,
    /// RAM in MB.
    pub ram: u64,
    /// Bandwidth in Mbps.
    pub bw: u64,
    /// Storage in MB.
    pub storage: u64,
    /// Number of such hosts.
    pub count: Option<u32>,
}

/// Holds configuration of a datacenter.
#[derive(Debug, PartialEq, Serialize, Deserialize, Clone)]
pub struct DatacenterConfig {
    pub name: String,
    #[serde(default)]
    pub time_zone: f64,
    pub hosts: Vec<HostConfig>,
}

/// Represents simulation configuration.
#[derive(Debug, PartialEq, Serialize, Deserialize, Clone)]
pub struct SimulationConfig {
    /// Lower bound in seconds for delays between cloudlet processing updates.
    pub min_time_between_events: f64,
    /// Period in seconds of regular datacenter processing updates, 0 disables them.
    pub scheduling_interval: f64,
    /// Default VM boot time in seconds.
    pub vm_startup_delay: f64,
    /// Message delay in seconds for communications between brokers and datacenters.
    pub message_delay: f64,
    /// Time at which brokers are notified that the simulation ends.
    pub termination_time: Option<f64>,
    /// Delay in seconds before retrying placement of VMs which were not placed anywhere, 0 or less disables retries.
    pub vm_creation_retry_delay: f64,
    pub max_vm_creation_retries: u32,
    /// Idle time in seconds after which a VM is destroyed, a negative value keeps idle VMs until broker shutdown.
    pub vm_destruction_delay: f64,
    /// Whether to send all waiting VMs destined to the same datacenter in one request.
    pub batch_vm_creation: bool,
    /// Whether brokers select the datacenter with the closest time zone.
    pub select_closest_datacenter: bool,
    /// Whether brokers shut down when they have nothing left to do.
    pub shutdown_when_idle: bool,
    pub cfs_latency: f64,
    pub cfs_min_granularity: f64,
    /// Cloudlet-to-VM mapping policy of brokers.
    pub vm_mapper: String,
    /// Default cloudlet scheduler of VMs created via [`CloudSimulation`](crate::simulation::CloudSimulation).
    pub cloudlet_scheduler: String,
    /// Datacenters created on simulation start.
    pub datacenters: Vec<DatacenterConfig>,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            min_time_between_events: 0.1,
            scheduling_interval: 0.,
            vm_startup_delay: 0.,
            message_delay: 0.,
            termination_time: None,
            vm_creation_retry_delay: 0.,
            max_vm_creation_retries: 3,
            vm_destruction_delay: -1.,
            batch_vm_creation: false,
            select_closest_datacenter: false,
            shutdown_when_idle: true,
            cfs_latency: 3.,
            cfs_min_granularity: 0.9,
            vm_mapper: "RoundRobin".to_string(),
            cloudlet_scheduler: "TimeShared".to_string(),
            datacenters: Vec::new(),
        }
    }
}

impl SimulationConfig {
    /// Creates simulation config with default parameter values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates simulation config by reading parameter values from YAML file
    /// (uses default values if some parameters are absent).
    pub fn from_file(file_name: &str) -> Result<Self, ConfigError> {
        Self::from_yaml(&std::fs::read_to_string(file_name)?)
    }

    pub fn from_yaml(yaml: &str) -> Result<Self, ConfigError> {
        let raw: RawSimulationConfig = serde_yaml::from_str(yaml)?;
        let default = Self::default();
        let max_retries = raw.max_vm_creation_retries.unwrap_or(default.max_vm_creation_retries as i64);
        if max_retries < 0 {
            return Err(ConfigError::negative("max_vm_creation_retries", max_retries as f64));
        }
        let config = Self {
            min_time_between_events: raw.min_time_between_events.unwrap_or(default.min_time_between_events),
            scheduling_interval: raw.scheduling_interval.unwrap_or(default.scheduling_interval),
            vm_startup_delay: raw.vm_startup_delay.unwrap_or(default.vm_startup_delay),
            message_delay: raw.message_delay.unwrap_or(default.message_delay),
            termination_time: raw.termination_time,
            vm_creation_retry_delay: raw.vm_creation_retry_delay.unwrap_or(default.vm_creation_retry_delay),
            max_vm_creation_retries: max_retries.min(u32::MAX as i64) as u32,
            vm_destruction_delay: raw.vm_destruction_delay.unwrap_or(default.vm_destruction_delay),
            batch_vm_creation: raw.batch_vm_creation.unwrap_or(default.batch_vm_creation),
            select_closest_datacenter: raw.select_closest_datacenter.unwrap_or(default.select_closest_datacenter),
            shutdown_when_idle: raw.shutdown_when_idle.unwrap_or(default.shutdown_when_idle),
            cfs_latency: raw.cfs_latency.unwrap_or(default.cfs_latency),
            cfs_min_granularity: raw.cfs_min_granularity.unwrap_or(default.cfs_min_granularity),
            vm_mapper: raw.vm_mapper.unwrap_or(default.vm_mapper),
            cloudlet_scheduler: raw.cloudlet_scheduler.unwrap_or(default.cloudlet_scheduler),
            datacenters: raw.datacenters.unwrap_or_default(),
        };
        config.validate()?;
        Ok(config)
    }

    /// Checks that parameter values are consistent.
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (name, value) in [
            ("scheduling_interval", self.scheduling_interval),
            ("vm_startup_delay", self.vm_startup_delay),
            ("message_delay", self.message_delay),
        ] {
            if value < 0. {
                return Err(ConfigError::negative(name, value));
            }
        }
        for (name, value) in [
            ("min_time_between_events", self.min_time_between_events),
            ("cfs_latency", self.cfs_latency),
            ("cfs_min_granularity", self.cfs_min_granularity),
        ] {
            if value <= 0. {
                return Err(ConfigError::invalid(name, format!("must be positive, got {}", value)));
            }
        }
        if let Some(time) = self.termination_time {
            if time < 0. {
                return Err(ConfigError::negative("termination_time", time));
            }
        }
        for dc in &self.datacenters {
            if dc.hosts.is_empty() {
                return Err(ConfigError::invalid(
                    "datacenters",
                    format!("datacenter {} has no hosts", dc.name),
                ));
            }
            for host in &dc.hosts {
                if host.mips < 0. {
                    return Err(ConfigError::negative("host mips", host.mips));
                }
            }
        }
        Ok(())
    }

    /// Whether failed VM placements are retried after a delay.
    pub fn vm_creation_retry_enabled(&self) -> bool {
        self.vm_creation_retry_delay > 0.
    }
}
