//! Channels exposed by the producer and the sources reading them.

use compact_str::CompactString;
use compact_str::format_compact;
use std::fmt;
use std::io::ErrorKind;
use std::io::Read;
use std::path::Path;

#[cfg(feature = "bpf")]
pub mod bpf;

/// A named stream of fixed size records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, clap_derive::ValueEnum)]
pub enum Channel {
    Migration,
    GpuFault,
    CpuFault,
    Registration,
}

impl Channel {
    pub const ALL: [Self; 4] = [
        Self::Migration,
        Self::GpuFault,
        Self::CpuFault,
        Self::Registration,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Self::Migration => "migration",
            Self::GpuFault => "gpu-fault",
            Self::CpuFault => "cpu-fault",
            Self::Registration => "registration",
        }
    }

    /// Name the producer pins this channel's ring buffer under.
    #[cfg_attr(not(feature = "bpf"), allow(dead_code))]
    pub fn map_name(self) -> &'static str {
        match self {
            Self::Migration => "migrations",
            Self::GpuFault => "gpu_faults",
            Self::CpuFault => "cpu_faults",
            Self::Registration => "registrations",
        }
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.name())
    }
}

/// Errors reading from a channel.
#[derive(Debug, thiserror::Error)]
pub enum ChannelError {
    /// The channel could not be opened or attached.
    #[error("Channel {channel} is unavailable: {source}")]
    Unavailable {
        channel: Channel,
        source: std::io::Error,
    },
    /// The producer went away while the channel was being read.
    #[error("Producer of channel {channel} detached: {reason}")]
    ProducerDetached {
        channel: Channel,
        reason: CompactString,
    },
    /// Rendered events could not be written out.
    #[error("Failed to write rendered event: {0}")]
    Output(#[source] std::io::Error),
}

/// The producer side of a channel, read one record at a time.
pub trait RecordSource {
    /// Fetch the next record.
    ///
    /// Returns `Ok(None)` when nothing is available right now, which is not an
    /// error. Implementations may block for a short while before doing so.
    fn next_record(&mut self) -> Result<Option<&[u8]>, ChannelError>;
}

impl<S: RecordSource + ?Sized> RecordSource for Box<S> {
    fn next_record(&mut self) -> Result<Option<&[u8]>, ChannelError> {
        (**self).next_record()
    }
}

/// Reads a capture of back to back records of one layout.
///
/// A short trailing record is delivered as is, so it can be reported as
/// malformed. The end of the capture detaches the producer.
#[derive(Debug)]
pub struct ReplaySource<R> {
    channel: Channel,
    reader: R,
    buf: Vec<u8>,
    exhausted: bool,
}

impl<R: Read> ReplaySource<R> {
    pub fn new(channel: Channel, reader: R, record_size: usize) -> Self {
        Self {
            channel,
            reader,
            buf: vec![0; record_size],
            exhausted: false,
        }
    }

    fn detached(&self, reason: CompactString) -> ChannelError {
        ChannelError::ProducerDetached {
            channel: self.channel,
            reason,
        }
    }
}

impl ReplaySource<std::io::BufReader<std::fs::File>> {
    pub fn open(channel: Channel, path: &Path, record_size: usize) -> Result<Self, ChannelError> {
        let file = std::fs::File::open(path)
            .map_err(|source| ChannelError::Unavailable { channel, source })?;
        Ok(Self::new(
            channel,
            std::io::BufReader::new(file),
            record_size,
        ))
    }
}

impl<R: Read> RecordSource for ReplaySource<R> {
    fn next_record(&mut self) -> Result<Option<&[u8]>, ChannelError> {
        if self.exhausted {
            return Err(self.detached("end of capture".into()));
        }
        let mut filled = 0;
        while filled < self.buf.len() {
            match self.reader.read(&mut self.buf[filled..]) {
                Ok(0) => break,
                Ok(n) => filled += n,
                Err(err) if err.kind() == ErrorKind::Interrupted => {}
                Err(err) => return Err(self.detached(format_compact!("{err}"))),
            }
        }
        if filled < self.buf.len() {
            self.exhausted = true;
        }
        if filled == 0 {
            return Err(self.detached("end of capture".into()));
        }
        Ok(Some(&self.buf[..filled]))
    }
}

/// Open the source for `channel`: the replay file if one is given, otherwise
/// the producer's ring buffer pinned under `pin_dir`.
pub fn open(
    channel: Channel,
    record_size: usize,
    replay: Option<&Path>,
    pin_dir: &Path,
) -> Result<Box<dyn RecordSource>, ChannelError> {
    if let Some(path) = replay {
        log::debug!("Replaying {channel} records from {}", path.display());
        return Ok(Box::new(ReplaySource::open(channel, path, record_size)?));
    }
    attach(channel, pin_dir)
}

#[cfg(feature = "bpf")]
fn attach(channel: Channel, pin_dir: &Path) -> Result<Box<dyn RecordSource>, ChannelError> {
    Ok(Box::new(bpf::PinnedRingBuffer::open(channel, pin_dir)?))
}

#[cfg(not(feature = "bpf"))]
fn attach(channel: Channel, pin_dir: &Path) -> Result<Box<dyn RecordSource>, ChannelError> {
    log::debug!(
        "Not attaching to {}: built without BPF support",
        pin_dir.display()
    );
    Err(ChannelError::Unavailable {
        channel,
        source: std::io::Error::new(
            ErrorKind::Unsupported,
            "built without the `bpf` feature, use --replay",
        ),
    })
}
