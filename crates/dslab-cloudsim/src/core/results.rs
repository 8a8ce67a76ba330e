//! Per-cloudlet simulation results.

use std::fs::File;

use serde::Serialize;

use crate::core::cloudlet::{Cloudlet, CloudletStatus};

/// One row of the cloudlet report.
#[derive(Clone, Debug, Serialize)]
pub struct CloudletRecord {
    pub cloudlet_id: u64,
    pub job_id: u64,
    pub status: CloudletStatus,
    pub vm_id: Option<u32>,
    pub pes: u64,
    pub length: f64,
    pub finished_length: f64,
    pub arrival_time: Option<f64>,
    pub exec_start_time: Option<f64>,
    pub finish_time: Option<f64>,
    pub wait_time: Option<f64>,
    pub exec_time: Option<f64>,
    pub oversubscription_delay: f64,
}

impl CloudletRecord {
    pub fn from_cloudlet(cloudlet: &Cloudlet) -> Self {
        let exec_time = match (cloudlet.exec_start_time(), cloudlet.finish_time()) {
            (Some(start), Some(finish)) => Some(finish - start),
            _ => None,
        };
        Self {
            cloudlet_id: cloudlet.id,
            job_id: cloudlet.job_id,
            status: cloudlet.status(),
            vm_id: cloudlet.vm(),
            pes: cloudlet.pes,
            length: cloudlet.length.as_f64(),
            finished_length: cloudlet.finished_length(),
            arrival_time: cloudlet.arrival_time(),
            exec_start_time: cloudlet.exec_start_time(),
            finish_time: cloudlet.finish_time(),
            wait_time: cloudlet.wait_time(),
            exec_time,
            oversubscription_delay: cloudlet.oversubscription_delay(),
        }
    }
}

/// Writes records to a CSV file with a header row.
pub fn save_cloudlets_csv(path: &str, records: &[CloudletRecord]) -> Result<(), csv::Error> {
    let file = File::create(path)?;
    let mut wtr = csv::Writer::from_writer(file);
    for record in records {
        wtr.serialize(record)?;
    }
    wtr.flush()?;
    Ok(())
}
