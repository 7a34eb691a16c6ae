//! # DICOM-vis library
//!
//! This crate prepares DICOM series and STL meshes for an external 3D
//! renderer.
//!
//! A series directory is scanned recursively and every file that decodes as
//! an image slice is kept; anything else is skipped (or rejected with
//! [`ScanPolicy::Strict`]). Slices are ordered along the scan axis, stacked
//! into a [`VolumeGrid`] with their rescale slope/intercept applied, and
//! given physical voxel spacing. The volume is then classified with one of
//! two transfer function presets:
//!  - Bone: only dense tissue above ~300 HU is visible
//!  - Soft tissue: a broad translucent grey ramp
//!
//! Switching presets swaps the transfer function held by the
//! [`ViewerContext`]; the volume itself never changes. Ray casting, surface
//! extraction and interaction are left to a [`RenderDelegate`].
//!
//! The crate also carries the smaller pieces of the viewer scene: a
//! fixed-memory [`PointCloudBuffer`] for live point data and STL [`Mesh`]
//! loading with floor alignment.
//!
//! DICOM files are assumed to have the following attributes:
//!  - Images from the same series, with identical rows and columns
//!  - No multiframe (always the first frame is used)
//!  - Single sample per pixel
//!
//! # Examples
//!
//! ## Reading a series and showing it
//!
//! ```no_run
//! # use dicom_vis::{VolumeLoader, LoadOptions, ViewerContext, HeadlessDelegate, RenderMode, TissuePreset};
//! let series = VolumeLoader::load_from_directory("dicom", LoadOptions::default())
//!     .expect("should have loaded slices from directory");
//! let mut context = ViewerContext::new(series.volume, RenderMode::Volume, TissuePreset::Bone);
//! let mut delegate = HeadlessDelegate::default();
//! context.present(&mut delegate).expect("should have shown the volume");
//! context.handle_key("s", &mut delegate).expect("should have switched to soft tissue");
//! ```

pub mod assembler;
pub mod config;
pub mod enums;
pub mod geometry;
mod interpolator;
pub mod mesh;
pub mod point_cloud;
pub mod scene;
pub mod slice;
pub mod sorter;
pub mod transfer_function;
pub mod volume;
pub mod volume_loader;

pub use config::{ConfigError, MotionConfig, PointCloudConfig, SeriesConfig, ViewerConfig};
pub use enums::{Interpolation, Orientation, RenderMode, ScanPolicy, SortBy, TissuePreset};
pub use geometry::{Geometry, GeometryNotice};
pub use mesh::{Actor, ActorMotion, Mesh, MeshError};
pub use point_cloud::{PointCloudBuffer, PointCloudFeed};
pub use scene::{HeadlessDelegate, RenderDelegate, SliceSelection, TimerDriven, ViewerContext};
pub use slice::SliceRecord;
pub use sorter::SortOutcome;
pub use transfer_function::TransferFunction;
pub use volume::{VolumeGrid, WindowLevel};
pub use volume_loader::{LoadOptions, LoadedSeries, VolumeLoader, VolumeLoaderError};
