//! Standard simulation events.

// VM PLACEMENT EVENTS /////////////////////////////////////////////////////////////////////////////

pub mod vm {
    use serde::Serialize;

    /// Asks a datacenter to place VMs. Grouped VMs are placed all together or not at all.
    #[derive(Serialize)]
    pub struct VmCreateRequest {
        pub vm_ids: Vec<u32>,
        pub group: Option<u32>,
    }

    /// Result of placing one VM, `host` is `None` if the VM was not placed.
    #[derive(Serialize)]
    pub struct VmCreateAck {
        pub vm_id: u32,
        pub host: Option<u32>,
    }

    #[derive(Serialize)]
    pub struct VmDestroyRequest {
        pub vm_id: u32,
    }

    #[derive(Serialize)]
    pub struct VmDestroyAck {
        pub vm_id: u32,
    }
}

// CLOUDLET EVENTS /////////////////////////////////////////////////////////////////////////////////

pub mod cloudlet {
    use serde::Serialize;

    use crate::core::cloudlet::CloudletStatus;

    #[derive(Serialize)]
    pub struct CloudletSubmit {
        pub cloudlet_id: u64,
    }

    /// Sent to the broker when a cloudlet reaches a terminal status.
    #[derive(Serialize)]
    pub struct CloudletReturn {
        pub cloudlet_id: u64,
        pub vm_id: u32,
        pub status: CloudletStatus,
    }

    #[derive(Serialize)]
    pub struct CloudletPause {
        pub cloudlet_id: u64,
    }

    #[derive(Serialize)]
    pub struct CloudletResume {
        pub cloudlet_id: u64,
    }

    #[derive(Serialize)]
    pub struct CloudletCancel {
        pub cloudlet_id: u64,
    }

    #[derive(Serialize)]
    pub struct CloudletReady {
        pub cloudlet_id: u64,
    }
}

// BROKER EVENTS ///////////////////////////////////////////////////////////////////////////////////

pub mod broker {
    use serde::Serialize;

    #[derive(Serialize)]
    pub struct BrokerStart {}

    #[derive(Serialize)]
    pub struct RetryVmCreation {}

    #[derive(Serialize)]
    pub struct DispatchCloudlets {}

    #[derive(Serialize)]
    pub struct VmIdleCheck {
        pub vm_id: u32,
    }

    #[derive(Serialize)]
    pub struct VmLifetimeCheck {
        pub vm_id: u32,
    }

    /// Termination time is reached: idle VMs are destroyed and the broker shuts down.
    #[derive(Serialize)]
    pub struct SimulationEnd {}
}

// DATACENTER EVENTS ///////////////////////////////////////////////////////////////////////////////

pub mod datacenter {
    use serde::Serialize;

    #[derive(Serialize)]
    pub struct UpdateProcessing {}

    /// Sent to brokers on every update aligned with the scheduling interval.
    #[derive(Serialize)]
    pub struct DatacenterTick {}
}
