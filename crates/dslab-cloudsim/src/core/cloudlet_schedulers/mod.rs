//! Cloudlet scheduling policies.

pub mod completely_fair;
pub mod space_shared;
pub mod time_shared;
