use std::io;
use std::path::PathBuf;
use std::process::ExitCode;
use std::thread;
use std::time::Duration;

use avmux::sink::{FramedSink, InterleavingSink, LogSink};
use avmux::store::FileStore;
use avmux::{
    CancelToken, ContainerSink, MuxConfig, Muxer, SchedulerConfig, StreamKind, StreamSpec,
    Timebase,
};
use clap::Parser;

#[derive(Parser)]
#[command(
    name = "avmux",
    about = "Mux pre-encoded H.264/AAC access units into a framed container"
)]
struct Args {
    /// Output file
    output: PathBuf,

    /// Directory holding avc_raw/ and aac_raw/
    #[arg(long, short, default_value = ".")]
    input: PathBuf,

    /// Pause between scheduler ticks, in milliseconds
    #[arg(long, default_value_t = 1)]
    pacing_ms: u64,

    /// Largest access unit accepted, in bytes
    #[arg(long, default_value_t = avmux::scheduler::DEFAULT_BUFFER_CAPACITY)]
    buffer_capacity: usize,

    /// Video stream timebase (NUM/DEN)
    #[arg(long, default_value = "1/1000000")]
    video_timebase: Timebase,

    /// Audio stream timebase (NUM/DEN)
    #[arg(long, default_value = "1/1000000")]
    audio_timebase: Timebase,

    /// Reorder packets by dts across streams before writing
    #[arg(long)]
    interleave: bool,

    /// Log packets instead of writing the output file
    #[arg(long)]
    dry_run: bool,
}

fn main() -> ExitCode {
    tracing_subscriber::fmt::init();

    let args = Args::parse();

    let config = MuxConfig {
        scheduler: SchedulerConfig {
            pacing: Duration::from_millis(args.pacing_ms),
            buffer_capacity: args.buffer_capacity,
        },
        streams: vec![
            StreamSpec::new(StreamKind::Video, args.video_timebase),
            StreamSpec::new(StreamKind::Audio, args.audio_timebase),
        ],
    };

    let sink: Box<dyn ContainerSink> = if args.dry_run {
        Box::new(LogSink::new())
    } else {
        match FramedSink::create(&args.output) {
            Ok(sink) => Box::new(sink),
            Err(e) => {
                eprintln!("Could not open '{}': {}", args.output.display(), e);
                return ExitCode::FAILURE;
            }
        }
    };
    let mut sink: Box<dyn ContainerSink> = if args.interleave {
        Box::new(InterleavingSink::new(sink))
    } else {
        sink
    };

    let cancel = CancelToken::new();
    let stop = cancel.clone();
    thread::spawn(move || {
        let mut input = String::new();
        if matches!(io::stdin().read_line(&mut input), Ok(n) if n > 0) {
            tracing::info!("stop requested");
            stop.cancel();
        }
    });

    let target = if args.dry_run {
        "log (dry run)".to_string()
    } else {
        args.output.display().to_string()
    };
    println!(
        "muxing {} -> {} (press Enter to stop)",
        args.input.display(),
        target
    );

    let store = FileStore::new(&args.input);
    match Muxer::new(config).run(&store, &mut sink, &cancel) {
        Ok(report) => {
            for s in &report.streams {
                println!(
                    "stream {} ({}): {} packets, {} keyframes",
                    s.index, s.kind, s.packets, s.keyframes
                );
            }
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("Muxing failed: {}", e);
            ExitCode::FAILURE
        }
    }
}
