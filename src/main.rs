mod channel;
mod classify;
mod clock;
mod consumer;
mod events;
mod layouts;
mod render;
mod schema;

use crate::channel::Channel;
use crate::channel::ChannelError;
use crate::clock::ClockNormalizer;
use crate::consumer::Consumer;
use crate::schema::Schema;
use crate::schema::SchemaConfig;
use clap::Parser;
use eyre::Context;
use eyre::eyre;
use linux_perf_data::Endianness;
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::AtomicBool;
use std::sync::atomic::Ordering;

mod cli {
    use crate::channel::Channel;
    use crate::schema::GpuFaultSchema;
    use crate::schema::MigrationSchema;
    use clap::ValueEnum;
    use std::path::PathBuf;

    #[derive(clap_derive::Parser)]
    #[command(version, about)]
    /// Trace page faults, migrations and GPU registrations of the unified
    /// virtual memory driver
    pub struct Cli {
        #[clap(short, long)]
        pub verbose: bool,
        /// Layout of records on the migration channel
        #[clap(long, value_enum, default_value_t)]
        pub migration_schema: MigrationSchema,
        /// Layout of records on the GPU fault channel
        #[clap(long, value_enum, default_value_t)]
        pub gpu_fault_schema: GpuFaultSchema,
        /// Channels to trace (all of them if not given)
        #[clap(long, value_enum, value_delimiter = ',')]
        pub channels: Vec<Channel>,
        /// Directory the producer pinned its ring buffers in
        #[clap(long, default_value = "/sys/fs/bpf/uvm")]
        pub pin_dir: PathBuf,
        /// Read a channel from a capture file instead: <CHANNEL>=<PATH>
        #[clap(long, value_parser = parse_replay)]
        pub replay: Vec<Replay>,
    }

    #[derive(Debug, Clone)]
    pub struct Replay {
        pub channel: Channel,
        pub path: PathBuf,
    }

    fn parse_replay(arg: &str) -> Result<Replay, String> {
        let (channel, path) = arg
            .split_once('=')
            .ok_or_else(|| format!("expected <CHANNEL>=<PATH>, got \"{arg}\""))?;
        Ok(Replay {
            channel: Channel::from_str(channel, true)?,
            path: PathBuf::from(path),
        })
    }
}

fn main() -> eyre::Result<()> {
    color_eyre::install()?;
    let cli = cli::Cli::parse();
    let default_filter = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter))
        .init();

    let schemas = SchemaConfig {
        migration: cli.migration_schema,
        gpu_fault: cli.gpu_fault_schema,
    };
    let channels: Vec<Channel> = Channel::ALL
        .into_iter()
        .filter(|channel| cli.channels.is_empty() || cli.channels.contains(channel))
        .collect();

    let stop = Arc::new(AtomicBool::new(false));
    {
        let stop = stop.clone();
        ctrlc::set_handler(move || stop.store(true, Ordering::Relaxed))
            .wrap_err("Failed to install Ctrl-C handler")?;
    }

    let clock = ClockNormalizer::new();
    let endian = events::host_endianness();

    log::info!("Tracing... Hit Ctrl-C to end.");
    let attached = std::thread::scope(|scope| -> eyre::Result<usize> {
        let mut handles = Vec::with_capacity(channels.len());
        for &channel in &channels {
            let schema = schemas.schema_for(channel);
            let replay = cli
                .replay
                .iter()
                .find(|replay| replay.channel == channel)
                .map(|replay| replay.path.as_path());
            let pin_dir = cli.pin_dir.as_path();
            let clock = &clock;
            let stop = &*stop;
            let handle = std::thread::Builder::new()
                .name(format!("{channel}"))
                .spawn_scoped(scope, move || {
                    trace_channel(schema, replay, pin_dir, clock, endian, stop)
                })
                .wrap_err_with(|| format!("Failed to start consumer for {channel}"))?;
            handles.push(handle);
        }
        let mut attached = 0;
        for handle in handles {
            if handle
                .join()
                .map_err(|_| eyre!("A channel consumer panicked"))?
            {
                attached += 1;
            }
        }
        Ok(attached)
    })?;

    if let Some(origin) = clock.origin() {
        log::debug!("Trace origin was {origin} ns");
    }
    if attached == 0 {
        return Err(eyre!("Could not attach to any channel"));
    }
    Ok(())
}

/// Consume one channel until cancelled or detached. Returns whether the
/// channel could be attached at all.
fn trace_channel(
    schema: Schema,
    replay: Option<&Path>,
    pin_dir: &Path,
    clock: &ClockNormalizer,
    endian: Endianness,
    stop: &AtomicBool,
) -> bool {
    let channel = schema.channel();
    let source = match channel::open(channel, schema.record_size(), replay, pin_dir) {
        Ok(source) => source,
        Err(err) => {
            log::error!("{err}");
            return false;
        }
    };
    log::info!(
        "Attached to {channel} channel ({} records, {} bytes)",
        schema.layout_name(),
        schema.record_size()
    );

    let mut consumer = Consumer::new(schema, source, clock, endian);
    match consumer.run(std::io::stdout(), stop) {
        Ok(()) => log::debug!("Stopped tracing {channel}"),
        Err(err @ ChannelError::ProducerDetached { .. }) => log::warn!("{err}"),
        Err(err) => log::error!("{err}"),
    }
    let stats = consumer.stats();
    log::info!(
        "{channel}: {} events, {} malformed records skipped",
        stats.rendered,
        stats.malformed
    );
    true
}
