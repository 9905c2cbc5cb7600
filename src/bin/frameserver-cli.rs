use std::{
    fs,
    path::{Path, PathBuf},
    sync::Arc,
    time::Instant,
};

use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::Shell;
use colored::Colorize;
use frameserver::{
    DecodingMode, FfmpegDecoder, FfmpegLogLevel, ImportOptions, PixelFormat, ProgressCallback,
    ProgressInfo, ReaderOptions, VideoReader, WorkingZone,
};
use indicatif::{ProgressBar, ProgressStyle};
use serde_json::json;

type Reader = VideoReader<FfmpegDecoder>;

const CLI_AFTER_HELP: &str = "Examples:\n  frameserver info input.mp4 --json\n  frameserver summary input.mp4 --out thumbs --count 8\n  frameserver cache input.mp4 --start 2 --end 6 --progress\n  frameserver play input.mp4 --frames 500 --skip 1 --verbose\n  frameserver completions zsh > _frameserver";

#[derive(Debug, Parser)]
#[command(
    name = "frameserver",
    version,
    about = "Inspect, cache and play back video through the frame server",
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
    #[arg(long)]
    verbose: bool,

    /// Show a progress bar where supported.
    #[arg(long)]
    progress: bool,

    /// FFmpeg log level (quiet, panic, fatal, error, warning, info, verbose, debug, trace).
    #[arg(long)]
    log_level: Option<String>,

    /// Decoded pixel format (bgra8, rgb8, rgba8, gray8).
    #[arg(long)]
    pixel_format: Option<String>,

    /// Blend interlaced fields.
    #[arg(long)]
    deinterlace: bool,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Print the facts the frame server derives at open time.
    #[command(
        about = "Print media facts",
        visible_alias = "probe",
        after_help = "Examples:\n  frameserver info input.mp4\n  frameserver info input.mp4 --json"
    )]
    Info {
        /// Input media path.
        input: PathBuf,

        /// Output as machine-readable JSON.
        #[arg(long)]
        json: bool,
    },

    /// Save a strip of evenly spaced thumbnails.
    #[command(about = "Extract a thumbnail summary")]
    Summary {
        input: PathBuf,
        /// Output directory.
        #[arg(long)]
        out: PathBuf,
        #[arg(long, default_value_t = 6)]
        count: u32,
        #[arg(long, default_value_t = 160)]
        max_width: u32,
    },

    /// Cache a working zone in memory and report what was held.
    #[command(
        about = "Cache a working zone",
        after_help = "Examples:\n  frameserver cache input.mp4 --start 0 --end 4 --progress"
    )]
    Cache {
        input: PathBuf,
        /// Zone start in seconds.
        #[arg(long, default_value_t = 0.0)]
        start: f64,
        /// Zone end in seconds; defaults to the end of the media.
        #[arg(long)]
        end: Option<f64>,
        /// Longest zone, in seconds, allowed in the cache.
        #[arg(long, default_value_t = 12)]
        max_seconds: u32,
        /// Memory budget for the cache in megabytes.
        #[arg(long, default_value_t = 512)]
        max_memory: u32,
    },

    /// Step through the media with look-ahead buffering.
    #[command(about = "Play back with look-ahead buffering")]
    Play {
        input: PathBuf,
        /// Number of advances.
        #[arg(long, default_value_t = 250)]
        frames: u32,
        /// Frames skipped per advance.
        #[arg(long, default_value_t = 0)]
        skip: usize,
        /// Look-ahead window capacity.
        #[arg(long, default_value_t = 10)]
        capacity: usize,
    },

    /// Generate shell completion scripts.
    #[command(about = "Generate shell completions")]
    Completions {
        #[arg(value_enum)]
        shell: Shell,
    },
}

fn parse_pixel_format(value: &str) -> Option<PixelFormat> {
    match value.to_ascii_lowercase().as_str() {
        "bgra8" | "bgra" => Some(PixelFormat::Bgra8),
        "rgb8" | "rgb" => Some(PixelFormat::Rgb8),
        "rgba8" | "rgba" => Some(PixelFormat::Rgba8),
        "gray8" | "gray" | "greyscale" | "grayscale" => Some(PixelFormat::Gray8),
        _ => None,
    }
}

fn parse_log_level(value: &str) -> Option<FfmpegLogLevel> {
    match value.to_ascii_lowercase().as_str() {
        "warn" => Some(FfmpegLogLevel::Warning),
        other => FfmpegLogLevel::from_name(other),
    }
}

fn init_logging(verbose: bool) {
    let filter = if verbose { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(filter))
        .format_timestamp_millis()
        .init();
}

fn apply_global_options(global: &GlobalOptions) -> Result<ReaderOptions, Box<dyn std::error::Error>> {
    init_logging(global.verbose);

    if let Some(level) = &global.log_level {
        let parsed = parse_log_level(level).ok_or(format!("unsupported --log-level: {level}"))?;
        frameserver::set_ffmpeg_log_level(parsed);
    }

    let mut options = ReaderOptions::new().with_deinterlace(global.deinterlace);
    if let Some(value) = &global.pixel_format {
        let format =
            parse_pixel_format(value).ok_or(format!("unsupported --pixel-format: {value}"))?;
        options = options.with_pixel_format(format);
    }
    Ok(options)
}

fn seconds_to_timestamp(reader: &Reader, seconds: f64) -> i64 {
    let info = reader.info();
    info.first_timestamp + (seconds.max(0.0) * info.timestamps_per_second).round() as i64
}

fn ensure_directory(path: &Path) -> Result<(), Box<dyn std::error::Error>> {
    if path.exists() && !path.is_dir() {
        return Err(format!("not a directory: {}", path.display()).into());
    }
    fs::create_dir_all(path)?;
    Ok(())
}

/// Progress bar fed by cache imports.
struct BarProgress {
    bar: ProgressBar,
}

impl BarProgress {
    fn new() -> Result<Self, Box<dyn std::error::Error>> {
        let bar = ProgressBar::new(0);
        let style =
            ProgressStyle::with_template("{spinner:.green} {bar:40.cyan/blue} {pos}/{len} {msg}")?;
        bar.set_style(style.progress_chars("##-"));
        Ok(Self { bar })
    }
}

impl ProgressCallback for BarProgress {
    fn on_progress(&self, info: &ProgressInfo) {
        if let Some(total) = info.total {
            self.bar.set_length(total);
        }
        self.bar.set_position(info.current);
        if let Some(timestamp) = info.current_timestamp {
            self.bar.set_message(format!("[{timestamp}]"));
        }
    }
}

fn run() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let reader_options = apply_global_options(&cli.global)?;

    match cli.command {
        Commands::Info { input, json } => {
            let reader = Reader::open(&input, reader_options)?;
            let info = reader.info();
            let capabilities = reader.capabilities();
            if json {
                let payload = json!({
                    "path": info.path.display().to_string(),
                    "format": info.format,
                    "codec": info.codec,
                    "width": info.width,
                    "height": info.height,
                    "pixel_aspect_ratio": info.pixel_aspect_ratio,
                    "fps": info.frames_per_second,
                    "fps_source": format!("{:?}", info.frame_rate_source),
                    "timestamps_per_second": info.timestamps_per_second,
                    "timestamps_per_frame": info.timestamps_per_frame,
                    "duration": info.duration,
                    "first_timestamp": info.first_timestamp,
                    "estimated_frames": info.estimated_frame_count(),
                    "very_short": reader.is_very_short(),
                    "mode": format!("{:?}", reader.mode()),
                    "capabilities": {
                        "decode_on_demand": capabilities.decode_on_demand,
                        "pre_buffer": capabilities.pre_buffer,
                        "cache": capabilities.cache,
                    },
                });
                println!("{}", serde_json::to_string_pretty(&payload)?);
            } else {
                println!("{} {}", "File:".bold(), info.path.display());
                println!("Container: {}  Codec: {}", info.format, info.codec);
                println!(
                    "Size: {}x{} (pixel aspect {:.3}, display {:?})",
                    info.width,
                    info.height,
                    info.pixel_aspect_ratio,
                    reader.aspect_ratio_size()
                );
                println!(
                    "Frame rate: {:.3} fps ({:?}), {} timestamps per frame",
                    info.frames_per_second, info.frame_rate_source, info.timestamps_per_frame
                );
                println!(
                    "Duration: {} timestamps from [{}], ~{} frames",
                    info.duration,
                    info.first_timestamp,
                    info.estimated_frame_count()
                );
                println!("Mode: {:?}  Very short: {}", reader.mode(), reader.is_very_short());
            }
        }
        Commands::Summary {
            input,
            out,
            count,
            max_width,
        } => {
            ensure_directory(&out)?;
            let summary = Reader::extract_summary(&input, count, max_width)?;
            for (index, thumbnail) in summary.thumbnails.iter().enumerate() {
                let path = out.join(format!("thumb_{index:03}.png"));
                thumbnail.save(&path)?;
                if cli.global.verbose {
                    eprintln!("saved {}", path.display());
                }
            }
            println!(
                "{} {} thumbnail(s) to {} ({:.2} s, {:.3} fps{})",
                "saved".green().bold(),
                summary.thumbnails.len(),
                out.display(),
                summary.duration.as_secs_f64(),
                summary.frames_per_second,
                if summary.is_image { ", still image" } else { "" }
            );
        }
        Commands::Cache {
            input,
            start,
            end,
            max_seconds,
            max_memory,
        } => {
            let options = reader_options
                .with_max_working_zone_seconds(max_seconds)
                .with_max_working_zone_memory_mb(max_memory);
            let mut reader = Reader::open(&input, options)?;

            let zone_start = seconds_to_timestamp(&reader, start);
            let zone_end = match end {
                Some(end) => seconds_to_timestamp(&reader, end),
                None => reader.working_zone().end,
            };
            let zone = WorkingZone::new(zone_start, zone_end);
            if zone.is_empty() {
                return Err("--start must be <= --end".into());
            }

            let progress = if cli.global.progress {
                Some(Arc::new(BarProgress::new()?))
            } else {
                None
            };
            let mut import_options = ImportOptions::new();
            if let Some(progress) = &progress {
                import_options = import_options.with_progress(progress.clone());
            }

            let started = Instant::now();
            let update = reader.update_working_zone(zone, true, &import_options)?;
            if let Some(progress) = &progress {
                progress.bar.finish_and_clear();
            }

            if update.mode == DecodingMode::Caching {
                println!(
                    "{} {} frames in {} ({:.1} MB) in {:.2?}",
                    "cached".green().bold(),
                    reader.held_frames(),
                    update.realized,
                    reader.cache_memory_bytes() as f64 / 1_048_576.0,
                    started.elapsed()
                );
            } else {
                eprintln!(
                    "{} {}",
                    "warning:".yellow().bold(),
                    format!("zone {zone} not cached, fell back to {:?}", update.mode).yellow()
                );
            }
        }
        Commands::Play {
            input,
            frames,
            skip,
            capacity,
        } => {
            let mut reader = Reader::open(&input, reader_options.with_lookahead_capacity(capacity))?;
            reader.post_load()?;
            reader.before_playloop()?;
            reader.reset_drops();

            let started = Instant::now();
            let mut moved = 0_u32;
            for _ in 0..frames {
                if reader.advance(skip, true) {
                    moved += 1;
                }
                if cli.global.verbose {
                    if let Some(timestamp) = reader.current_timestamp() {
                        eprintln!("[{timestamp}]");
                    }
                }
            }
            let elapsed = started.elapsed();

            println!(
                "{} {moved}/{frames} advances in {elapsed:.2?} ({:.1} per second), {} dropped",
                "played".green().bold(),
                moved as f64 / elapsed.as_secs_f64().max(f64::EPSILON),
                reader.drops()
            );
            reader.close();
        }
        Commands::Completions { shell } => {
            let mut command = Cli::command();
            clap_complete::generate(shell, &mut command, "frameserver", &mut std::io::stdout());
        }
    }

    Ok(())
}

fn main() {
    if let Err(error) = run() {
        eprintln!("{} {error}", "error:".red().bold());
        std::process::exit(1);
    }
}

#[cfg(test)]
mod tests {
    use super::{parse_log_level, parse_pixel_format};
    use frameserver::{FfmpegLogLevel, PixelFormat};

    #[test]
    fn parse_pixel_format_aliases() {
        assert_eq!(parse_pixel_format("bgra"), Some(PixelFormat::Bgra8));
        assert_eq!(parse_pixel_format("RGB8"), Some(PixelFormat::Rgb8));
        assert_eq!(parse_pixel_format("grayscale"), Some(PixelFormat::Gray8));
        assert!(parse_pixel_format("yuv420p").is_none());
    }

    #[test]
    fn parse_log_level_aliases() {
        assert_eq!(parse_log_level("warn"), Some(FfmpegLogLevel::Warning));
        assert_eq!(parse_log_level("Quiet"), Some(FfmpegLogLevel::Quiet));
        assert!(parse_log_level("loud").is_none());
    }
}
