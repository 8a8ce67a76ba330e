pub mod broker;
pub mod cloudlet;
pub mod cloudlet_execution;
pub mod cloudlet_scheduler;
pub mod cloudlet_schedulers;
pub mod config;
pub mod contention;
pub mod datacenter;
pub mod datacenter_mapper;
pub mod error;
pub mod events;
pub mod host;
pub mod listener;
pub mod registry;
pub mod resource;
pub mod results;
pub mod utilization;
pub mod vm;
pub mod vm_mapper;
