//! Ring buffers pinned in bpffs by the UVM probes.
//!
//! Loading the probes is left to the producer. It is expected to pin one
//! `BPF_MAP_TYPE_RINGBUF` map per channel under a common directory, named
//! after [`Channel::map_name`].

use super::Channel;
use super::ChannelError;
use super::RecordSource;
use compact_str::format_compact;
use libbpf_rs::MapHandle;
use libbpf_rs::RingBuffer;
use libbpf_rs::RingBufferBuilder;
use std::cell::RefCell;
use std::collections::VecDeque;
use std::path::Path;
use std::rc::Rc;
use std::time::Duration;

/// How long a poll waits for data before handing back control, so that
/// cancellation is noticed.
const POLL_TIMEOUT: Duration = Duration::from_millis(100);

/// Pull based reader over a pinned ring buffer.
pub struct PinnedRingBuffer {
    channel: Channel,
    ring: RingBuffer<'static>,
    // Samples copied out by the callback during the last poll.
    pending: Rc<RefCell<VecDeque<Vec<u8>>>>,
    current: Vec<u8>,
    // Keeps the map fd open for as long as the ring buffer is in use.
    _map: MapHandle,
}

impl PinnedRingBuffer {
    pub fn open(channel: Channel, pin_dir: &Path) -> Result<Self, ChannelError> {
        let path = pin_dir.join(channel.map_name());
        let unavailable = |err: libbpf_rs::Error| ChannelError::Unavailable {
            channel,
            source: std::io::Error::other(format!("{}: {err}", path.display())),
        };
        let map = MapHandle::from_pinned_path(&path).map_err(unavailable)?;

        let pending = Rc::new(RefCell::new(VecDeque::new()));
        let sink = pending.clone();
        let mut builder = RingBufferBuilder::new();
        builder
            .add(&map, move |data: &[u8]| -> i32 {
                sink.borrow_mut().push_back(data.to_vec());
                0
            })
            .map_err(unavailable)?;
        let ring = builder.build().map_err(unavailable)?;
        log::debug!("Opened ring buffer {}", path.display());

        Ok(Self {
            channel,
            ring,
            pending,
            current: Vec::new(),
            _map: map,
        })
    }
}

impl RecordSource for PinnedRingBuffer {
    fn next_record(&mut self) -> Result<Option<&[u8]>, ChannelError> {
        if self.pending.borrow().is_empty() {
            self.ring
                .poll(POLL_TIMEOUT)
                .map_err(|err| ChannelError::ProducerDetached {
                    channel: self.channel,
                    reason: format_compact!("{err}"),
                })?;
        }
        let next = self.pending.borrow_mut().pop_front();
        match next {
            Some(record) => {
                self.current = record;
                Ok(Some(&self.current))
            }
            None => Ok(None),
        }
    }
}
