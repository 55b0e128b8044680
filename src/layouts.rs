//! Fixed binary layouts of the records submitted by the UVM probes.

use linux_perf_data::linux_perf_event_reader::RawData;

pub mod uvm;
pub mod wire;

/// Error when a raw record does not match the layout it is decoded as.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DecodeError {
    /// The record length differs from the declared layout size.
    #[error("Malformed {layout} record: expected {expected} bytes, got {actual}")]
    MalformedRecord {
        layout: &'static str,
        expected: usize,
        actual: usize,
    },
}

/// Trait for structs mirroring a record layout byte for byte.
pub trait RecordLayout {
    /// Name of the layout, e.g. "`migration:full`".
    const LAYOUT_NAME: &'static str;

    /// Size of one record in bytes, declared padding included.
    const SIZE: usize;

    /// Parse raw data using this struct.
    ///
    /// The record must be exactly [`Self::SIZE`] bytes long. Anything else is
    /// rejected without reading any field.
    fn parse<O: byteorder::ByteOrder>(record: &RawData<'_>) -> Result<Self, DecodeError>
    where
        Self: Sized;
}
