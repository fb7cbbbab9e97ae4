use std::path::PathBuf;

use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::Shell;
use colored::Colorize;
use ffmpeg_next::{Rational, frame::Video as VideoFrame};
use indicatif::{ProgressBar, ProgressStyle};
use log::LevelFilter;
use serde_json::json;
use vidfilter::{
    DEFAULT_FILTER_DESCRIPTION, FfmpegLogLevel, FilterOptions, FrameConsumer, FrameCounter,
    ImageSequenceWriter, LibraryVersion, OutputPixelFormat, VideoFilter, VidfilterError,
};

const CLI_AFTER_HELP: &str = "Examples:\n  vidfilter run input.mp4\n  vidfilter run input.mp4 --filter 'scale=320:-1,hflip' --pixel-format rgb24 --save-frames frames --flush\n  vidfilter run input.mp4 --json\n  vidfilter completions zsh > _vidfilter";

#[derive(Debug, Parser)]
#[command(
    name = "vidfilter",
    version,
    about = "Decode a video stream and run it through an FFmpeg filter graph",
    after_help = CLI_AFTER_HELP
)]
struct Cli {
    #[command(flatten)]
    global: GlobalOptions,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Parser, Clone, Default)]
struct GlobalOptions {
    /// Show debug logging output.
    #[arg(long, global = true)]
    verbose: bool,

    /// FFmpeg log level (quiet, panic, fatal, error, warning, info, verbose, debug, trace).
    #[arg(long, global = true)]
    log_level: Option<String>,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Filter every frame of the best video stream.
    #[command(
        about = "Run a filter graph over a video",
        after_help = "Examples:\n  vidfilter run input.mp4\n  vidfilter run input.mp4 --filter 'scale=160:90,edgedetect' --save-frames out --progress"
    )]
    Run {
        /// Input media path.
        input: PathBuf,

        /// Filtergraph description between the `in` source and the `out` sink.
        #[arg(long, default_value = DEFAULT_FILTER_DESCRIPTION)]
        filter: String,

        /// Pixel format accepted at the sink (gray, rgb24, rgba, yuv420p). Repeatable.
        #[arg(long = "pixel-format")]
        pixel_formats: Vec<String>,

        /// Leave the sink pixel format unconstrained.
        #[arg(long, conflicts_with = "pixel_formats")]
        any_pixel_format: bool,

        /// Flush the decoder and the filter graph at end of stream.
        #[arg(long)]
        flush: bool,

        /// Write every filtered frame as a PNG into this directory.
        #[arg(long)]
        save_frames: Option<PathBuf>,

        /// Show a progress spinner.
        #[arg(long)]
        progress: bool,

        /// Print the run summary as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Print the linked libavcodec version.
    Version,

    /// Generate shell completion scripts.
    Completions {
        /// Target shell.
        shell: Shell,
    },
}

fn parse_log_level(value: &str) -> Option<FfmpegLogLevel> {
    value.parse().ok()
}

fn parse_pixel_formats(
    values: &[String],
    any_pixel_format: bool,
) -> Result<Vec<OutputPixelFormat>, VidfilterError> {
    if any_pixel_format {
        return Ok(Vec::new());
    }
    if values.is_empty() {
        return Ok(vec![OutputPixelFormat::Gray8]);
    }
    values.iter().map(|value| value.parse()).collect()
}

fn init_logging(verbose: bool) -> Result<(), log::SetLoggerError> {
    let mut builder = pretty_env_logger::formatted_builder();
    match std::env::var("RUST_LOG") {
        Ok(filters) => {
            builder.parse_filters(&filters);
        }
        Err(_) => {
            builder.filter_level(LevelFilter::Warn);
        }
    }
    if verbose {
        builder.filter_module("vidfilter", LevelFilter::Debug);
    }
    builder.try_init()
}

fn apply_global_options(global: &GlobalOptions) -> Result<(), Box<dyn std::error::Error>> {
    if let Err(error) = init_logging(global.verbose) {
        log::debug!("Keeping the existing logger: {error}");
    }

    if let Some(level) = &global.log_level {
        let parsed = parse_log_level(level).ok_or(format!("unsupported --log-level: {level}"))?;
        vidfilter::set_ffmpeg_log_level(parsed);
    }

    Ok(())
}

fn progress_spinner() -> Result<ProgressBar, Box<dyn std::error::Error>> {
    let spinner = ProgressBar::new_spinner();
    spinner.set_style(ProgressStyle::with_template(
        "{spinner:.green} {pos} frames {msg}",
    )?);
    Ok(spinner)
}

fn run() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    apply_global_options(&cli.global)?;

    match cli.command {
        Commands::Run {
            input,
            filter,
            pixel_formats,
            any_pixel_format,
            flush,
            save_frames,
            progress,
            json,
        } => {
            let version = LibraryVersion::avcodec();
            if !json {
                println!("avcodec version {version}");
            }

            let formats = parse_pixel_formats(&pixel_formats, any_pixel_format)?;
            if save_frames.is_some()
                && formats.iter().any(|format| *format == OutputPixelFormat::Yuv420p)
            {
                eprintln!(
                    "{} {}",
                    "warning:".yellow().bold(),
                    "yuv420p frames cannot be saved as PNG; saving will fail if the sink picks it"
                        .yellow()
                );
            }

            let options = FilterOptions::new()
                .with_filter_description(filter.clone())
                .with_output_pixel_formats(formats.iter().copied())
                .with_drain_at_end_of_stream(flush);

            let mut writer = save_frames.as_ref().map(ImageSequenceWriter::new).transpose()?;
            let spinner = if progress { Some(progress_spinner()?) } else { None };
            let mut counter = FrameCounter::new();

            let mut consumer = |frame: &VideoFrame, time_base: Rational| -> Result<(), VidfilterError> {
                counter.consume(frame, time_base)?;
                if let Some(writer) = writer.as_mut() {
                    writer.consume(frame, time_base)?;
                }
                if let Some(spinner) = &spinner {
                    spinner.inc(1);
                }
                Ok(())
            };

            let result = VideoFilter::new(options).run(&input, &mut consumer);
            if let Some(spinner) = &spinner {
                spinner.finish_and_clear();
            }
            let stats = result?;

            if json {
                let payload = json!({
                    "input": input.display().to_string(),
                    "avcodec_version": version.to_string(),
                    "filter": filter,
                    "pixel_formats": formats.iter().map(|format| format.name()).collect::<Vec<_>>(),
                    "packets_read": stats.packets_read,
                    "packets_skipped": stats.packets_skipped,
                    "frames_decoded": stats.frames_decoded,
                    "frames_filtered": stats.frames_filtered,
                    "last_frame": counter.dimensions().map(|(width, height)| json!({
                        "width": width,
                        "height": height,
                        "format": counter.format().map(|format| format!("{format:?}")),
                        "pts": counter.last_pts(),
                        "time_seconds": counter
                            .last_pts()
                            .zip(counter.last_time_base())
                            .and_then(|(pts, time_base)| vidfilter::pts_to_duration(pts, time_base))
                            .map(|time| time.as_secs_f64()),
                    })),
                    "frames_saved": writer.as_ref().map(ImageSequenceWriter::written),
                });
                println!("{}", serde_json::to_string_pretty(&payload)?);
            } else {
                println!(
                    "Packets: {} read, {} skipped",
                    stats.packets_read, stats.packets_skipped
                );
                println!(
                    "Frames: {} decoded, {} filtered",
                    stats.frames_decoded, stats.frames_filtered
                );
                if let Some((width, height)) = counter.dimensions() {
                    println!(
                        "Output: {width}x{height} {:?}",
                        counter.format().unwrap_or(ffmpeg_next::format::Pixel::None)
                    );
                }
                if let (Some(writer), Some(directory)) = (&writer, &save_frames) {
                    println!("Saved {} frames to {}", writer.written(), directory.display());
                }
            }
        }
        Commands::Version => {
            println!("avcodec version {}", LibraryVersion::avcodec());
        }
        Commands::Completions { shell } => {
            let mut command = Cli::command();
            clap_complete::generate(shell, &mut command, "vidfilter", &mut std::io::stdout());
        }
    }

    Ok(())
}

fn main() {
    if let Err(error) = run() {
        eprintln!("error: {error}");
        std::process::exit(1);
    }
}
