//! Per channel loop pulling records from a source and writing out lines.

use crate::channel::ChannelError;
use crate::channel::RecordSource;
use crate::clock::ClockNormalizer;
use crate::events::Event;
use crate::render::render;
use crate::schema::Schema;
use compact_str::CompactString;
use linux_perf_data::Endianness;
use linux_perf_data::linux_perf_event_reader::RawData;
use std::io::Write;
use std::sync::atomic::AtomicBool;
use std::sync::atomic::Ordering;

/// Counters kept by a [`Consumer`].
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ConsumerStats {
    pub rendered: u64,
    pub malformed: u64,
}

/// Decodes and renders the records of one channel, one at a time.
///
/// Consumers of different channels share nothing but the clock.
pub struct Consumer<'clock, S> {
    schema: Schema,
    source: S,
    clock: &'clock ClockNormalizer,
    endian: Endianness,
    stats: ConsumerStats,
}

impl<'clock, S: RecordSource> Consumer<'clock, S> {
    pub fn new(
        schema: Schema,
        source: S,
        clock: &'clock ClockNormalizer,
        endian: Endianness,
    ) -> Self {
        Self {
            schema,
            source,
            clock,
            endian,
            stats: ConsumerStats::default(),
        }
    }

    pub fn stats(&self) -> ConsumerStats {
        self.stats
    }

    /// Pull one record and render it.
    ///
    /// Returns `Ok(None)` if the channel had nothing to offer or the record
    /// was malformed. Malformed records are reported and skipped.
    pub fn step(&mut self) -> Result<Option<CompactString>, ChannelError> {
        let Some(record) = self.source.next_record()? else {
            return Ok(None);
        };
        match Event::decode(self.schema, RawData::Single(record), self.endian) {
            Ok(event) => {
                debug_assert_eq!(event.channel(), self.schema.channel());
                let time = event
                    .timestamp()
                    .map(|timestamp| self.clock.relative_seconds(timestamp));
                self.stats.rendered += 1;
                Ok(Some(render(&event, time)))
            }
            Err(err) => {
                self.stats.malformed += 1;
                log::warn!("Skipping record on {} channel: {err}", self.schema.channel());
                Ok(None)
            }
        }
    }

    /// Render records to `out` until `stop` is raised or the producer goes
    /// away.
    pub fn run<W: Write>(&mut self, mut out: W, stop: &AtomicBool) -> Result<(), ChannelError> {
        while !stop.load(Ordering::Relaxed) {
            if let Some(line) = self.step()? {
                writeln!(out, "{line}").map_err(ChannelError::Output)?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::Channel;
    use crate::channel::ReplaySource;
    use crate::events::tests::cpu_fault;
    use crate::events::tests::gpu_fault;
    use crate::events::tests::migration_full;
    use crate::events::tests::migration_request;
    use crate::schema::GpuFaultSchema;
    use crate::schema::MigrationSchema;
    use std::io::Cursor;

    fn replay(schema: Schema, records: &[Vec<u8>]) -> ReplaySource<Cursor<Vec<u8>>> {
        ReplaySource::new(
            schema.channel(),
            Cursor::new(records.concat()),
            schema.record_size(),
        )
    }

    /// Run a consumer over the records until the replay runs dry.
    fn run(schema: Schema, records: &[Vec<u8>], clock: &ClockNormalizer) -> (String, ConsumerStats) {
        let mut consumer = Consumer::new(
            schema,
            replay(schema, records),
            clock,
            Endianness::LittleEndian,
        );
        let mut out = Vec::new();
        let err = consumer.run(&mut out, &AtomicBool::new(false)).unwrap_err();
        assert!(matches!(err, ChannelError::ProducerDetached { .. }));
        (String::from_utf8(out).unwrap(), consumer.stats())
    }

    #[test]
    fn test_migration_lines() {
        let clock = ClockNormalizer::new();
        let (out, stats) = run(
            Schema::Migration(MigrationSchema::Full),
            &[
                migration_full(3, 7, 0x1000, 4096, 1, 6),
                migration_full(0, 1, 0x20_0000, 8192, 99, 3),
            ],
            &clock,
        );
        assert_eq!(
            out,
            indoc::indoc! {"
                MIGRATE   Move    ApiMigrate         src=3    dst=7    addr=0x1000             bytes=4096
                MIGRATE   Unknown Prefetch           src=0    dst=1    addr=0x200000           bytes=8192
            "}
        );
        assert_eq!(
            stats,
            ConsumerStats {
                rendered: 2,
                malformed: 0,
            }
        );
        // No timestamps on this layout, so the clock is left alone.
        assert_eq!(clock.origin(), None);
    }

    #[test]
    fn test_cpu_fault_line() {
        let clock = ClockNormalizer::new();
        let (out, _) = run(Schema::CpuFault, &[cpu_fault(42, 0xabcd, 0x1000, 1)], &clock);
        assert_eq!(
            out,
            "CPU_FAULT pid=42     write=true  va=0xabcd             pc=0x1000\n"
        );
    }

    #[test]
    fn test_gpu_fault_duplicate_line() {
        let clock = ClockNormalizer::new();
        let (out, _) = run(
            Schema::GpuFault(GpuFaultSchema::Extended),
            &[gpu_fault(9, 0x2000, 1, 0), gpu_fault(9, 0x3000, 0, 0)],
            &clock,
        );
        assert_eq!(
            out,
            indoc::indoc! {"
                GPU_FAULT pid=9      va=0x2000 [duplicated]
                GPU_FAULT pid=9      va=0x3000
            "}
        );
    }

    #[test]
    fn test_truncated_record_is_skipped() {
        let clock = ClockNormalizer::new();
        let mut truncated = cpu_fault(7, 0xdead_0000, 0x4000, 0);
        truncated.truncate(truncated.len() - 4);
        let mut consumer = Consumer::new(
            Schema::CpuFault,
            replay(Schema::CpuFault, &[cpu_fault(42, 0xabcd, 0x1000, 1), truncated]),
            &clock,
            Endianness::LittleEndian,
        );
        assert!(consumer.step().unwrap().is_some());
        assert_eq!(consumer.step().unwrap(), None);
        assert!(consumer.step().is_err());
        assert_eq!(
            consumer.stats(),
            ConsumerStats {
                rendered: 1,
                malformed: 1,
            }
        );
    }

    #[test]
    fn test_malformed_record_does_not_stop_consumer() {
        // A source that hands out one record at a time from a list, so a bad
        // record can sit in the middle of good ones.
        struct Records(Vec<Vec<u8>>, usize);

        impl RecordSource for Records {
            fn next_record(&mut self) -> Result<Option<&[u8]>, ChannelError> {
                let index = self.1;
                self.1 += 1;
                match self.0.get(index) {
                    Some(record) => Ok(Some(record.as_slice())),
                    None => Err(ChannelError::ProducerDetached {
                        channel: Channel::Registration,
                        reason: "done".into(),
                    }),
                }
            }
        }

        let clock = ClockNormalizer::new();
        let good = [1u8, 0, 0, 0, 2, 0, 0, 0, 3, 0, 0, 0].to_vec();
        let source = Records(vec![good.clone(), good[..8].to_vec(), good], 0);
        let mut consumer = Consumer::new(
            Schema::Registration,
            source,
            &clock,
            Endianness::LittleEndian,
        );
        let mut out = Vec::new();
        assert!(consumer.run(&mut out, &AtomicBool::new(false)).is_err());
        assert_eq!(
            String::from_utf8(out).unwrap(),
            indoc::indoc! {"
                REGISTER  rm_ctrl_fd=1      h_client=0x2        h_smc_part_ref=0x3
                REGISTER  rm_ctrl_fd=1      h_client=0x2        h_smc_part_ref=0x3
            "}
        );
        assert_eq!(consumer.stats().malformed, 1);
    }

    #[test]
    fn test_time_relative_to_first_event() {
        let clock = ClockNormalizer::new();
        let (out, _) = run(
            Schema::Migration(MigrationSchema::Request),
            &[
                migration_request(2_000_000_000, 10, 0x1000, 4096),
                migration_request(2_250_000_000, 10, 0x2000, 4096),
            ],
            &clock,
        );
        assert_eq!(
            out,
            indoc::indoc! {"
                0.000000000        MIGRATE   pid=10     base=0x1000             length=4096
                0.250000000        MIGRATE   pid=10     base=0x2000             length=4096
            "}
        );
        assert_eq!(clock.origin(), Some(2_000_000_000));
    }

    #[test]
    fn test_stop_flag() {
        let clock = ClockNormalizer::new();
        let schema = Schema::CpuFault;
        let mut consumer = Consumer::new(
            schema,
            replay(schema, &[cpu_fault(1, 0x1000, 0x2000, 0)]),
            &clock,
            Endianness::LittleEndian,
        );
        let mut out = Vec::new();
        consumer.run(&mut out, &AtomicBool::new(true)).unwrap();
        assert!(out.is_empty());
        assert_eq!(consumer.stats(), ConsumerStats::default());
    }
}
