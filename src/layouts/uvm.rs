//! Records submitted by the UVM probes, one struct per layout version.
//!
//! These mirror the C structs the probes pass to `bpf_ringbuf_output`, in
//! the producer's native byte order.

use super::wire::Pad;
use super::wire::record_layout;

record_layout!(
    #[layout("migration:full")]
    pub struct MigrationFull {
        src: u32,
        dst: u32,
        address: u64,
        length: u64,
        mode: u32,
        cause: u32,
    }
);

record_layout!(
    #[layout("migration:reduced")]
    pub struct MigrationReduced {
        length: u64,
        mode: u32,
        cause: u32,
    }
);

// Submitted on entry to the migrate ioctl.
record_layout!(
    #[layout("migration:request")]
    pub struct MigrationRequest {
        base: u64,
        length: u64,
        ts: u64,
        pid: u32,
        _pad: Pad<4>,
    }
);

record_layout!(
    #[layout("gpu_fault:basic")]
    pub struct GpuFaultBasic {
        pid: u32,
    }
);

record_layout!(
    #[layout("gpu_fault:extended")]
    pub struct GpuFaultExtended {
        fault_va: u64,
        pid: u32,
        is_duplicated: u8,
        is_filtered: u8,
        _pad: Pad<2>,
    }
);

record_layout!(
    #[layout("cpu_fault")]
    pub struct CpuFault {
        fault_va: u64,
        pc: u64,
        pid: u32,
        is_write: u32,
    }
);

record_layout!(
    #[layout("registration")]
    pub struct Registration {
        rm_ctrl_fd: i32,
        h_client: u32,
        h_smc_part_ref: u32,
    }
);
