use crate::{
    assembler::{self, AssemblyError},
    enums::{ScanPolicy, SortBy},
    geometry::{self, GeometryNotice},
    slice::{SliceError, SliceRecord},
    sorter::{self, SortOutcome},
    volume::VolumeGrid,
};

use dicom::object::{FileDicomObject, InMemDicomObject};
use log::{debug, info, warn};
use rayon::prelude::*;
use std::{
    fs,
    path::{Path, PathBuf},
};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum VolumeLoaderError {
    #[error("No valid slices found")]
    NoValidImages,

    #[error("Inconsistent image dimensions: slice {index} is {found:?}, expected {expected:?}")]
    InconsistentDimensions {
        index: usize,
        expected: (usize, usize),
        found: (usize, usize),
    },

    #[error("Unreadable slice {path}: {source}")]
    UnreadableFile { path: PathBuf, source: SliceError },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<AssemblyError> for VolumeLoaderError {
    fn from(error: AssemblyError) -> Self {
        match error {
            AssemblyError::Empty => Self::NoValidImages,
            AssemblyError::InconsistentDimensions {
                index,
                expected,
                found,
            } => Self::InconsistentDimensions {
                index,
                expected,
                found,
            },
        }
    }
}

#[derive(Clone, Copy, Debug, Default)]
pub struct LoadOptions {
    pub sort_by: SortBy,
    pub scan_policy: ScanPolicy,
}

/// A volume together with everything that was recovered while building it.
#[derive(Debug)]
pub struct LoadedSeries {
    pub volume: VolumeGrid,
    pub sort: SortOutcome,
    pub geometry_notices: Vec<GeometryNotice>,
    /// Slices assembled with slope 1 and intercept 0 because rescale metadata
    /// was absent.
    pub default_rescale: usize,
    /// Candidate files that were not valid slices.
    pub skipped: usize,
}

pub struct VolumeLoader;

impl VolumeLoader {
    /// Load a volume from every readable slice below `path`.
    ///
    /// The directory is walked recursively; any file may be a slice, there is
    /// no extension filter. Unreadable files are skipped unless
    /// `options.scan_policy` is [`ScanPolicy::Strict`].
    ///
    /// # Errors
    ///
    /// Returns error if no valid slice was found, if slices differ in size, or
    /// (strict policy) on the first unreadable file.
    pub fn load_from_directory(
        path: impl AsRef<Path>,
        options: LoadOptions,
    ) -> Result<LoadedSeries, VolumeLoaderError> {
        let paths = Self::discover_files(path.as_ref())?;
        debug!("found {} candidate files in {}", paths.len(), path.as_ref().display());
        Self::load_from_file_paths(&paths, options)
    }

    /// Load a volume from file paths, in the given discovery order.
    pub fn load_from_file_paths(
        paths: &[impl AsRef<Path> + Sync],
        options: LoadOptions,
    ) -> Result<LoadedSeries, VolumeLoaderError> {
        let (slices, skipped) = Self::read_slices(paths, options.scan_policy)?;
        Self::build(slices, skipped, options.sort_by)
    }

    /// Load a volume from already opened DICOM objects.
    pub fn load_from_dicom_objects(
        dicom_objects: &[FileDicomObject<InMemDicomObject>],
        sort_by: SortBy,
    ) -> Result<LoadedSeries, VolumeLoaderError> {
        let results: Vec<_> = dicom_objects.iter().map(SliceRecord::from_dicom).collect();
        let total = results.len();
        let slices: Vec<_> = results
            .into_iter()
            .enumerate()
            .filter_map(|(i, result)| {
                result
                    .map_err(|e| debug!("skipping object {i}: {e}"))
                    .ok()
            })
            .collect();
        let skipped = total - slices.len();
        Self::build(slices, skipped, sort_by)
    }

    /// Sort, assemble and measure a set of slices.
    pub fn build(
        mut slices: Vec<SliceRecord>,
        skipped: usize,
        sort_by: SortBy,
    ) -> Result<LoadedSeries, VolumeLoaderError> {
        if slices.is_empty() {
            return Err(VolumeLoaderError::NoValidImages);
        }

        let sort = sorter::sort_slices(&mut slices, sort_by);
        let assembly = assembler::assemble(&slices)?;
        let geometry = geometry::resolve(&slices);
        let (dx, dy, dz) = geometry.spacing;

        info!(
            "loaded {} slices ({} skipped), {} x {} pixels, spacing {dx} x {dy} x {dz}, range {:?}",
            slices.len(),
            skipped,
            assembly.data.dim().1,
            assembly.data.dim().2,
            assembly.range
        );

        let default_rescale = assembly.default_rescale;
        Ok(LoadedSeries {
            volume: VolumeGrid::from_assembly(assembly, geometry.spacing),
            sort,
            geometry_notices: geometry.notices,
            default_rescale,
            skipped,
        })
    }

    /// Every regular file below `root`, sorted by path within each directory.
    ///
    /// Symlinked directories are not descended into; symlinks to files are
    /// kept. Sub directories that cannot be listed are skipped with a warning.
    pub fn discover_files(root: &Path) -> Result<Vec<PathBuf>, VolumeLoaderError> {
        let mut files = Vec::new();
        Self::walk(fs::read_dir(root)?, &mut files);
        Ok(files)
    }

    fn walk(dir: fs::ReadDir, files: &mut Vec<PathBuf>) {
        let mut entries: Vec<fs::DirEntry> = dir.filter_map(Result::ok).collect();
        entries.sort_by_key(fs::DirEntry::path);

        for entry in entries {
            let path = entry.path();
            let Ok(file_type) = entry.file_type() else {
                continue;
            };
            if file_type.is_dir() {
                match fs::read_dir(&path) {
                    Ok(sub) => Self::walk(sub, files),
                    Err(e) => warn!("skipping directory {}: {e}", path.display()),
                }
            } else if file_type.is_file() || (file_type.is_symlink() && path.is_file()) {
                files.push(path);
            } else if file_type.is_symlink() {
                debug!("not following symlink {}", path.display());
            }
        }
    }

    fn read_slices(
        paths: &[impl AsRef<Path> + Sync],
        scan_policy: ScanPolicy,
    ) -> Result<(Vec<SliceRecord>, usize), VolumeLoaderError> {
        let results: Vec<_> = paths
            .par_iter()
            .map(|path| SliceRecord::open(path.as_ref()))
            .collect();

        let mut slices = Vec::with_capacity(results.len());
        let mut skipped = 0;
        for (path, result) in paths.iter().zip(results) {
            match result {
                Ok(slice) => slices.push(slice),
                Err(source) if matches!(scan_policy, ScanPolicy::Strict) => {
                    return Err(VolumeLoaderError::UnreadableFile {
                        path: path.as_ref().to_path_buf(),
                        source,
                    });
                }
                Err(e) => {
                    debug!("skipping {}: {e}", path.as_ref().display());
                    skipped += 1;
                }
            }
        }
        Ok((slices, skipped))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{Array2, s};

    fn slice(z: f64, value: i32) -> SliceRecord {
        SliceRecord::new(Array2::from_elem((2, 3), value))
            .with_position([0.0, 0.0, z])
            .with_pixel_spacing([0.5, 0.5])
            .with_rescale(1.0, -1024.0)
    }

    #[test]
    fn build_sorts_then_stacks() {
        let slices = vec![slice(6.0, 1300), slice(0.0, 1100), slice(3.0, 1200)];
        let series = VolumeLoader::build(slices, 2, SortBy::ImagePositionPatient).unwrap();

        assert_eq!(series.volume.dim(), (3, 2, 3));
        assert_eq!(series.volume.spacing(), (0.5, 0.5, 3.0));
        assert_eq!(series.volume.range(), (76, 276));
        assert_eq!(series.volume.data()[[0, 1, 2]], 76);
        assert_eq!(series.volume.data().slice(s![2, .., ..]).sum(), 276 * 6);
        assert_eq!(series.sort, SortOutcome::Sorted(SortBy::ImagePositionPatient));
        assert!(series.geometry_notices.is_empty());
        assert_eq!(series.default_rescale, 0);
        assert_eq!(series.skipped, 2);
    }

    #[test]
    fn missing_rescale_is_reported_to_the_caller() {
        let slices = vec![
            slice(0.0, 1100),
            SliceRecord::new(Array2::from_elem((2, 3), 40)).with_position([0.0, 0.0, 3.0]),
        ];
        let series = VolumeLoader::build(slices, 0, SortBy::ImagePositionPatient).unwrap();
        assert_eq!(series.default_rescale, 1);
        assert_eq!(series.volume.data()[[1, 0, 0]], 40);
    }

    #[test]
    fn empty_series_stops_the_pipeline() {
        let err = VolumeLoader::build(vec![], 5, SortBy::default()).unwrap_err();
        assert!(matches!(err, VolumeLoaderError::NoValidImages));
        assert_eq!(err.to_string(), "No valid slices found");
    }

    #[test]
    fn mismatched_slices_are_rejected() {
        let slices = vec![slice(0.0, 1), SliceRecord::new(Array2::zeros((4, 4)))];
        let err = VolumeLoader::build(slices, 0, SortBy::None).unwrap_err();
        assert!(matches!(
            err,
            VolumeLoaderError::InconsistentDimensions { index: 1, .. }
        ));
    }
}
