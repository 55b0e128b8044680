use crate::channel::Channel;
use crate::classify::FaultCause;
use crate::classify::TransferMode;
use crate::layouts::DecodeError;
use crate::layouts::RecordLayout;
use crate::layouts::uvm;
use crate::schema::GpuFaultSchema;
use crate::schema::MigrationSchema;
use crate::schema::Schema;
use byteorder::BigEndian;
use byteorder::ByteOrder;
use byteorder::LittleEndian;
use linux_perf_data::Endianness;
use linux_perf_data::linux_perf_event_reader::RawData;

/// Byte order of records produced on this host.
pub fn host_endianness() -> Endianness {
    if cfg!(target_endian = "big") {
        Endianness::BigEndian
    } else {
        Endianness::LittleEndian
    }
}

/// Pages moved between processors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MigrationEvent {
    Full {
        src: u32,
        dst: u32,
        address: u64,
        length: u64,
        mode: TransferMode,
        cause: FaultCause,
    },
    /// Where the pages went is not known.
    Reduced {
        length: u64,
        mode: TransferMode,
        cause: FaultCause,
    },
    /// A process asked for a range to be migrated.
    Request {
        timestamp: u64,
        pid: u32,
        base: u64,
        length: u64,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GpuFaultEvent {
    pub pid: u32,
    /// Only present with [`GpuFaultSchema::Extended`].
    pub detail: Option<GpuFaultDetail>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GpuFaultDetail {
    pub fault_va: u64,
    pub is_duplicated: bool,
    pub is_filtered: bool,
}

impl GpuFaultEvent {
    /// Whether the producer flagged this fault as a repeat or filtered one.
    pub fn is_duplicate(&self) -> bool {
        self.detail
            .is_some_and(|detail| detail.is_duplicated || detail.is_filtered)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CpuFaultEvent {
    pub pid: u32,
    pub fault_va: u64,
    pub pc: u64,
    pub is_write: bool,
}

/// A GPU registered with a UVM file descriptor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegistrationEvent {
    pub rm_ctrl_fd: i32,
    pub h_client: u32,
    pub h_smc_part_ref: u32,
}

/// A decoded record turns into an `Event`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    Migration(MigrationEvent),
    GpuFault(GpuFaultEvent),
    CpuFault(CpuFaultEvent),
    Registration(RegistrationEvent),
}

impl Event {
    pub fn decode(
        schema: Schema,
        data: RawData<'_>,
        endian: Endianness,
    ) -> Result<Self, DecodeError> {
        match endian {
            Endianness::LittleEndian => Self::decode_impl::<LittleEndian>(schema, &data),
            Endianness::BigEndian => Self::decode_impl::<BigEndian>(schema, &data),
        }
    }

    pub fn decode_impl<O: ByteOrder>(
        schema: Schema,
        data: &RawData<'_>,
    ) -> Result<Self, DecodeError> {
        match schema {
            Schema::Migration(MigrationSchema::Full) => {
                let parsed = uvm::MigrationFull::parse::<O>(data)?;
                Ok(Self::Migration(MigrationEvent::Full {
                    src: parsed.src,
                    dst: parsed.dst,
                    address: parsed.address,
                    length: parsed.length,
                    mode: TransferMode::from_code(parsed.mode),
                    cause: FaultCause::from_code(parsed.cause),
                }))
            }
            Schema::Migration(MigrationSchema::Reduced) => {
                let parsed = uvm::MigrationReduced::parse::<O>(data)?;
                Ok(Self::Migration(MigrationEvent::Reduced {
                    length: parsed.length,
                    mode: TransferMode::from_code(parsed.mode),
                    cause: FaultCause::from_code(parsed.cause),
                }))
            }
            Schema::Migration(MigrationSchema::Request) => {
                let parsed = uvm::MigrationRequest::parse::<O>(data)?;
                Ok(Self::Migration(MigrationEvent::Request {
                    timestamp: parsed.ts,
                    pid: parsed.pid,
                    base: parsed.base,
                    length: parsed.length,
                }))
            }
            Schema::GpuFault(GpuFaultSchema::Basic) => {
                let parsed = uvm::GpuFaultBasic::parse::<O>(data)?;
                Ok(Self::GpuFault(GpuFaultEvent {
                    pid: parsed.pid,
                    detail: None,
                }))
            }
            Schema::GpuFault(GpuFaultSchema::Extended) => {
                let parsed = uvm::GpuFaultExtended::parse::<O>(data)?;
                Ok(Self::GpuFault(GpuFaultEvent {
                    pid: parsed.pid,
                    detail: Some(GpuFaultDetail {
                        fault_va: parsed.fault_va,
                        is_duplicated: parsed.is_duplicated != 0,
                        is_filtered: parsed.is_filtered != 0,
                    }),
                }))
            }
            Schema::CpuFault => {
                let parsed = uvm::CpuFault::parse::<O>(data)?;
                Ok(Self::CpuFault(CpuFaultEvent {
                    pid: parsed.pid,
                    fault_va: parsed.fault_va,
                    pc: parsed.pc,
                    is_write: parsed.is_write != 0,
                }))
            }
            Schema::Registration => {
                let parsed = uvm::Registration::parse::<O>(data)?;
                Ok(Self::Registration(RegistrationEvent {
                    rm_ctrl_fd: parsed.rm_ctrl_fd,
                    h_client: parsed.h_client,
                    h_smc_part_ref: parsed.h_smc_part_ref,
                }))
            }
        }
    }

    pub fn channel(&self) -> Channel {
        match self {
            Self::Migration(_) => Channel::Migration,
            Self::GpuFault(_) => Channel::GpuFault,
            Self::CpuFault(_) => Channel::CpuFault,
            Self::Registration(_) => Channel::Registration,
        }
    }

    /// Absolute producer timestamp, for layouts that carry one.
    pub fn timestamp(&self) -> Option<u64> {
        match self {
            Self::Migration(MigrationEvent::Request { timestamp, .. }) => Some(*timestamp),
            _ => None,
        }
    }
}
