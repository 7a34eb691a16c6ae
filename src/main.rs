use clap::{Parser, Subcommand};
use glam::Vec3;
use log::{error, info, warn};
use std::path::PathBuf;
use std::process::ExitCode;

use dicom_vis::{
    Actor, ActorMotion, HeadlessDelegate, Interpolation, LoadOptions, Mesh, Orientation,
    PointCloudBuffer, PointCloudFeed, RenderMode, ScanPolicy, SliceSelection, SortBy,
    TimerDriven, TissuePreset, ViewerConfig, ViewerContext, VolumeLoader,
};

#[derive(Parser)]
#[command(name = "dicom-vis")]
#[command(about = "Prepare DICOM series, point clouds and STL scenes for rendering", version)]
struct Cli {
    /// Path to YAML config file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Increase verbosity
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Load a DICOM series and hand it to the renderer
    View {
        /// Series directory (scanned recursively)
        directory: Option<PathBuf>,
        #[arg(short, long, value_enum)]
        mode: Option<RenderMode>,
        #[arg(short, long, value_enum)]
        preset: Option<TissuePreset>,
        #[arg(long, value_enum)]
        sort_by: Option<SortBy>,
        /// Fail on the first file that is not a readable slice
        #[arg(long)]
        strict: bool,
        /// Save the slice view to this PNG
        #[arg(short, long)]
        output: Option<PathBuf>,
        #[arg(long, value_enum)]
        orientation: Option<Orientation>,
        /// Plane index (defaults to the center)
        #[arg(long)]
        index: Option<usize>,
        #[arg(long, value_enum)]
        interpolation: Option<Interpolation>,
        /// Key presses to replay after presenting, e.g. "sb"
        #[arg(long, default_value = "")]
        keys: String,
    },

    /// Grow a random point cloud for a number of timer ticks
    PointCloud {
        #[arg(long, default_value_t = 10)]
        ticks: u64,
        #[arg(long)]
        capacity: Option<usize>,
        #[arg(long)]
        batch: Option<usize>,
        #[arg(long)]
        seed: Option<u64>,
    },

    /// Load STL models, rest them on a floor and animate the first one
    Mesh {
        /// Model files, the first one is moved on every tick
        #[arg(required = true)]
        models: Vec<PathBuf>,
        #[arg(long)]
        floor: Option<PathBuf>,
        #[arg(long, default_value_t = 0)]
        ticks: u64,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    env_logger::Builder::new()
        .filter_level(match cli.verbose {
            0 => log::LevelFilter::Warn,
            1 => log::LevelFilter::Info,
            _ => log::LevelFilter::Debug,
        })
        .format_timestamp_secs()
        .init();

    let config = match &cli.config {
        Some(path) => match ViewerConfig::from_yaml(path) {
            Ok(cfg) => {
                info!("Loaded config from: {}", path.display());
                cfg
            }
            Err(e) => {
                warn!("Failed to load config from {}: {}, using defaults", path.display(), e);
                ViewerConfig::default()
            }
        },
        None => ViewerConfig::default(),
    };

    let result = match cli.command {
        Commands::View {
            directory,
            mode,
            preset,
            sort_by,
            strict,
            output,
            orientation,
            index,
            interpolation,
            keys,
        } => {
            let mut series = config.series;
            series.directory = directory.or(series.directory);
            series.mode = mode.unwrap_or(series.mode);
            series.preset = preset.unwrap_or(series.preset);
            series.sort_by = sort_by.unwrap_or(series.sort_by);
            series.orientation = orientation.unwrap_or(series.orientation);
            series.interpolation = interpolation.unwrap_or(series.interpolation);
            if strict {
                series.scan_policy = ScanPolicy::Strict;
            }
            cmd_view(series, index, output, &keys)
        }
        Commands::PointCloud {
            ticks,
            capacity,
            batch,
            seed,
        } => {
            let mut point_cloud = config.point_cloud;
            point_cloud.capacity = capacity.unwrap_or(point_cloud.capacity);
            point_cloud.batch_size = batch.unwrap_or(point_cloud.batch_size);
            cmd_point_cloud(&point_cloud, ticks, seed)
        }
        Commands::Mesh {
            models,
            floor,
            ticks,
        } => cmd_mesh(&models, floor, ticks, &config.motion),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{e}");
            ExitCode::FAILURE
        }
    }
}

type CmdResult = Result<(), Box<dyn std::error::Error>>;

fn cmd_view(
    series: dicom_vis::SeriesConfig,
    index: Option<usize>,
    output: Option<PathBuf>,
    keys: &str,
) -> CmdResult {
    let directory = series
        .directory
        .ok_or("no series directory given on the command line or in the config")?;
    if !directory.is_dir() {
        return Err(format!("{} is not a directory", directory.display()).into());
    }

    let options = LoadOptions {
        sort_by: series.sort_by,
        scan_policy: series.scan_policy,
    };
    let loaded = VolumeLoader::load_from_directory(&directory, options)?;

    let mut context = ViewerContext::new(loaded.volume, series.mode, series.preset)
        .with_slice_selection(SliceSelection {
            orientation: series.orientation,
            index,
            interpolation: series.interpolation,
        });
    let mut delegate = HeadlessDelegate::new(output);
    context.present(&mut delegate)?;
    info!("{:?} mode, {:?} preset", context.mode(), context.preset());

    for key in keys.chars() {
        context.handle_key(&key.to_string(), &mut delegate)?;
    }
    Ok(())
}

fn cmd_point_cloud(
    config: &dicom_vis::PointCloudConfig,
    ticks: u64,
    seed: Option<u64>,
) -> CmdResult {
    if config.capacity == 0 {
        return Err("point cloud capacity must be positive".into());
    }
    if !(config.extent.is_finite() && config.extent > 0.0) {
        return Err("point cloud extent must be positive".into());
    }
    let buffer = match seed {
        Some(seed) => PointCloudBuffer::seeded(config.capacity, seed),
        None => PointCloudBuffer::new(config.capacity),
    };
    let mut feed =
        PointCloudFeed::new(buffer, config.batch_size, config.extent, config.interval());
    for _ in 0..ticks {
        feed.on_tick();
    }
    info!(
        "{} ticks every {:?}: {} of {} points, generation {}",
        feed.ticks(),
        feed.interval(),
        feed.buffer().len(),
        feed.buffer().capacity(),
        feed.buffer().generation()
    );
    Ok(())
}

fn cmd_mesh(
    models: &[PathBuf],
    floor: Option<PathBuf>,
    ticks: u64,
    motion: &dicom_vis::MotionConfig,
) -> CmdResult {
    let floor = floor.map(|path| Mesh::open(path).map(Actor::new)).transpose()?;
    let mut actors = models
        .iter()
        .map(|path| Mesh::open(path).map(Actor::new))
        .collect::<Result<Vec<_>, _>>()?;

    if let Some(floor) = &floor {
        for actor in &mut actors {
            actor.place_on(floor);
        }
    }
    for actor in &actors {
        let bounds = actor.bounds();
        info!(
            "{}: {} triangles at {:?}, bounds {:?} .. {:?}",
            actor.mesh.name,
            actor.mesh.triangles.len(),
            actor.position,
            bounds.min,
            bounds.max
        );
    }

    if ticks > 0 {
        let actor = actors.remove(0);
        let mut moving = ActorMotion {
            actor,
            step: Vec3::from_array(motion.step),
            interval: motion.interval(),
        };
        for _ in 0..ticks {
            moving.on_tick();
        }
        info!("{} moved to {:?}", moving.actor.mesh.name, moving.actor.position);
    }
    Ok(())
}
