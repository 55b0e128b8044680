//! Selection of the record layout active on each channel.
//!
//! Records carry no version tag, and two layouts can have the same size, so
//! the layout is chosen up front from configuration and never guessed from
//! the data.

use crate::channel::Channel;
use crate::layouts::RecordLayout;
use crate::layouts::uvm;

/// Layout of records on the migration channel.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, clap_derive::ValueEnum)]
pub enum MigrationSchema {
    /// Source, destination, address, length, mode and cause.
    #[default]
    Full,
    /// Length, mode and cause only.
    Reduced,
    /// Timestamped migrate requests: pid, base and length.
    Request,
}

/// Layout of records on the GPU fault channel.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, clap_derive::ValueEnum)]
pub enum GpuFaultSchema {
    /// Process id only.
    Basic,
    /// Process id, faulting address and duplicate/filtered flags.
    #[default]
    Extended,
}

/// The layout a channel's records are decoded with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Schema {
    Migration(MigrationSchema),
    GpuFault(GpuFaultSchema),
    CpuFault,
    Registration,
}

impl Schema {
    pub fn channel(self) -> Channel {
        match self {
            Self::Migration(_) => Channel::Migration,
            Self::GpuFault(_) => Channel::GpuFault,
            Self::CpuFault => Channel::CpuFault,
            Self::Registration => Channel::Registration,
        }
    }

    /// Exact size of one record in this layout.
    pub fn record_size(self) -> usize {
        match self {
            Self::Migration(MigrationSchema::Full) => uvm::MigrationFull::SIZE,
            Self::Migration(MigrationSchema::Reduced) => uvm::MigrationReduced::SIZE,
            Self::Migration(MigrationSchema::Request) => uvm::MigrationRequest::SIZE,
            Self::GpuFault(GpuFaultSchema::Basic) => uvm::GpuFaultBasic::SIZE,
            Self::GpuFault(GpuFaultSchema::Extended) => uvm::GpuFaultExtended::SIZE,
            Self::CpuFault => uvm::CpuFault::SIZE,
            Self::Registration => uvm::Registration::SIZE,
        }
    }

    pub fn layout_name(self) -> &'static str {
        match self {
            Self::Migration(MigrationSchema::Full) => uvm::MigrationFull::LAYOUT_NAME,
            Self::Migration(MigrationSchema::Reduced) => uvm::MigrationReduced::LAYOUT_NAME,
            Self::Migration(MigrationSchema::Request) => uvm::MigrationRequest::LAYOUT_NAME,
            Self::GpuFault(GpuFaultSchema::Basic) => uvm::GpuFaultBasic::LAYOUT_NAME,
            Self::GpuFault(GpuFaultSchema::Extended) => uvm::GpuFaultExtended::LAYOUT_NAME,
            Self::CpuFault => uvm::CpuFault::LAYOUT_NAME,
            Self::Registration => uvm::Registration::LAYOUT_NAME,
        }
    }
}

/// Layout versions chosen for the channels that have more than one.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SchemaConfig {
    pub migration: MigrationSchema,
    pub gpu_fault: GpuFaultSchema,
}

impl SchemaConfig {
    pub fn schema_for(&self, channel: Channel) -> Schema {
        match channel {
            Channel::Migration => Schema::Migration(self.migration),
            Channel::GpuFault => Schema::GpuFault(self.gpu_fault),
            Channel::CpuFault => Schema::CpuFault,
            Channel::Registration => Schema::Registration,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_schema_for_channel() {
        let config = SchemaConfig {
            migration: MigrationSchema::Reduced,
            gpu_fault: GpuFaultSchema::Basic,
        };
        for channel in Channel::ALL {
            assert_eq!(config.schema_for(channel).channel(), channel);
        }
        let schema = config.schema_for(Channel::Migration);
        assert_eq!(schema, Schema::Migration(MigrationSchema::Reduced));
        assert_eq!(schema.record_size(), 16);
        assert_eq!(schema.layout_name(), "migration:reduced");
    }

    #[test]
    fn test_defaults() {
        let config = SchemaConfig::default();
        assert_eq!(
            config.schema_for(Channel::Migration),
            Schema::Migration(MigrationSchema::Full)
        );
        assert_eq!(
            config.schema_for(Channel::GpuFault),
            Schema::GpuFault(GpuFaultSchema::Extended)
        );
        assert_eq!(config.schema_for(Channel::Registration).record_size(), 12);
    }
}
