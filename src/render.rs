//! Fixed column text lines for decoded events.

use crate::events::CpuFaultEvent;
use crate::events::Event;
use crate::events::GpuFaultEvent;
use crate::events::MigrationEvent;
use crate::events::RegistrationEvent;
use compact_str::CompactString;
use compact_str::format_compact;

/// Render one event. `time` is the trace relative time in seconds, given for
/// events whose layout carries a timestamp; it becomes the first column.
pub fn render(event: &Event, time: Option<f64>) -> CompactString {
    let body = match event {
        Event::Migration(migration) => render_migration(migration),
        Event::GpuFault(fault) => render_gpu_fault(fault),
        Event::CpuFault(fault) => render_cpu_fault(fault),
        Event::Registration(registration) => render_registration(registration),
    };
    match time {
        Some(secs) => format_compact!("{secs:<18.9} {body}"),
        None => body,
    }
}

fn render_migration(migration: &MigrationEvent) -> CompactString {
    match *migration {
        MigrationEvent::Full {
            src,
            dst,
            address,
            length,
            mode,
            cause,
        } => format_compact!(
            "MIGRATE   {mode:<7} {cause:<18} src={src:<4} dst={dst:<4} addr={address:<#18x} \
             bytes={length}"
        ),
        MigrationEvent::Reduced {
            length,
            mode,
            cause,
        } => format_compact!("MIGRATE   {mode:<7} {cause:<18} bytes={length}"),
        MigrationEvent::Request {
            pid, base, length, ..
        } => format_compact!("MIGRATE   pid={pid:<6} base={base:<#18x} length={length}"),
    }
}

/// Faults the producer flagged as duplicated or filtered are still shown,
/// but annotated so they can be told apart from first occurrences.
fn render_gpu_fault(fault: &GpuFaultEvent) -> CompactString {
    let Some(detail) = fault.detail else {
        return format_compact!("GPU_FAULT pid={}", fault.pid);
    };
    let line = format_compact!("GPU_FAULT pid={:<6} va={:#x}", fault.pid, detail.fault_va);
    if fault.is_duplicate() {
        format_compact!("{line} [duplicated]")
    } else {
        line
    }
}

fn render_cpu_fault(fault: &CpuFaultEvent) -> CompactString {
    format_compact!(
        "CPU_FAULT pid={:<6} write={:<5} va={:<#18x} pc={:#x}",
        fault.pid,
        fault.is_write,
        fault.fault_va,
        fault.pc
    )
}

fn render_registration(registration: &RegistrationEvent) -> CompactString {
    format_compact!(
        "REGISTER  rm_ctrl_fd={:<6} h_client={:<#10x} h_smc_part_ref={:#x}",
        registration.rm_ctrl_fd,
        registration.h_client,
        registration.h_smc_part_ref
    )
}
