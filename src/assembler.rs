use crate::slice::{Rescale, SliceRecord};

use log::{debug, warn};
use ndarray::{Array2, Array3, s};
use rayon::prelude::*;
use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum AssemblyError {
    #[error("No slices to assemble")]
    Empty,

    #[error("Inconsistent image dimensions: slice {index} is {found:?}, expected {expected:?}")]
    InconsistentDimensions {
        index: usize,
        expected: (usize, usize),
        found: (usize, usize),
    },
}

/// Stacked, rescaled scalar data for one series.
#[derive(Debug)]
pub struct Assembly {
    /// (slices, rows, cols)
    pub data: Array3<i16>,
    pub range: (i16, i16),
    /// Voxels whose rescaled value fell outside the `i16` range.
    pub clamped: usize,
    /// Slices assembled with the identity rescale because metadata was absent.
    pub default_rescale: usize,
}

/// Stack `slices` (already sorted) into one grid, applying each slice's
/// rescale.
pub fn assemble(slices: &[SliceRecord]) -> Result<Assembly, AssemblyError> {
    let first = slices.first().ok_or(AssemblyError::Empty)?;
    let (rows, cols) = first.dim();
    if let Some((index, slice)) = slices
        .iter()
        .enumerate()
        .find(|(_, slice)| slice.dim() != (rows, cols))
    {
        return Err(AssemblyError::InconsistentDimensions {
            index,
            expected: (rows, cols),
            found: slice.dim(),
        });
    }

    let layers: Vec<(Array2<i16>, usize)> = slices.par_iter().map(rescale_layer).collect();

    let mut data = Array3::<i16>::zeros((slices.len(), rows, cols));
    let mut clamped = 0;
    for (i, (layer, layer_clamped)) in layers.iter().enumerate() {
        data.slice_mut(s![i, .., ..]).assign(layer);
        clamped += layer_clamped;
    }

    let default_rescale = slices.iter().filter(|s| s.rescale().is_none()).count();
    if default_rescale > 0 {
        warn!("{default_rescale} slices without rescale metadata, using slope 1 intercept 0");
    }
    if clamped > 0 {
        warn!("{clamped} voxels exceeded the 16 bit range after rescale and were clamped");
    }

    let range = intensity_range(&data);
    debug!(
        "assembled {} x {} x {} grid, range {:?}",
        rows,
        cols,
        slices.len(),
        range
    );

    Ok(Assembly {
        data,
        range,
        clamped,
        default_rescale,
    })
}

fn rescale_layer(slice: &SliceRecord) -> (Array2<i16>, usize) {
    let rescale = slice.rescale().unwrap_or_default();
    let mut clamped = 0;
    let layer = slice.pixels().map(|&raw| {
        let (value, was_clamped) = to_i16(rescale, raw);
        clamped += usize::from(was_clamped);
        value
    });
    (layer, clamped)
}

#[inline]
fn to_i16(rescale: Rescale, raw: i32) -> (i16, bool) {
    let value = rescale.apply(raw).round();
    let min = f64::from(i16::MIN);
    let max = f64::from(i16::MAX);
    if value < min || value > max {
        (value.clamp(min, max) as i16, true)
    } else {
        (value as i16, false)
    }
}

/// Minimum and maximum stored value.
pub fn intensity_range(data: &Array3<i16>) -> (i16, i16) {
    if data.is_empty() {
        return (0, 0);
    }
    data.iter()
        .fold((i16::MAX, i16::MIN), |(lo, hi), &v| (lo.min(v), hi.max(v)))
}
