use crate::slice::SliceRecord;

use log::warn;

/// Relative deviation from the first slice gap above which a series is
/// reported as irregularly spaced.
pub const SPACING_TOLERANCE: f64 = 0.01;

/// A recovered problem with the spatial metadata of a series.
#[derive(Clone, Debug, PartialEq)]
pub enum GeometryNotice {
    /// First slice has no Pixel Spacing; in-plane spacing defaults to 1.
    MissingPixelSpacing,
    /// Through-plane spacing could not be derived; defaults to 1.
    MissingSliceSpacing(SliceSpacingCause),
    /// Gap between slices `index - 1` and `index` differs from the first gap.
    IrregularSliceSpacing {
        index: usize,
        expected: f64,
        found: f64,
    },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SliceSpacingCause {
    SingleSlice,
    MissingPosition,
    CoincidentSlices,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Geometry {
    /// (dx, dy, dz)
    pub spacing: (f64, f64, f64),
    pub notices: Vec<GeometryNotice>,
}

/// Resolve voxel spacing from a sorted series.
///
/// In-plane spacing comes from the first slice. Through-plane spacing is the
/// distance between the first two slices; every other gap is compared to it
/// and reported when it deviates.
pub fn resolve(slices: &[SliceRecord]) -> Geometry {
    let mut notices = Vec::new();

    let (dx, dy) = match slices.first().and_then(SliceRecord::pixel_spacing) {
        Some([dx, dy]) if dx > 0.0 && dy > 0.0 => (dx, dy),
        _ => {
            warn!("no pixel spacing found, using 1.0");
            notices.push(GeometryNotice::MissingPixelSpacing);
            (1.0, 1.0)
        }
    };

    let dz = match slice_spacing(slices) {
        Ok(dz) => {
            notices.extend(irregular_gaps(slices, dz));
            dz
        }
        Err(cause) => {
            warn!("cannot compute slice spacing ({cause:?}), using 1.0");
            notices.push(GeometryNotice::MissingSliceSpacing(cause));
            1.0
        }
    };

    Geometry {
        spacing: (dx, dy, dz),
        notices,
    }
}

fn slice_spacing(slices: &[SliceRecord]) -> Result<f64, SliceSpacingCause> {
    let [first, second, ..] = slices else {
        return Err(SliceSpacingCause::SingleSlice);
    };
    let (Some(z0), Some(z1)) = (first.through_axis(), second.through_axis()) else {
        return Err(SliceSpacingCause::MissingPosition);
    };
    let dz = (z1 - z0).abs();
    if dz > 0.0 && dz.is_finite() {
        Ok(dz)
    } else {
        Err(SliceSpacingCause::CoincidentSlices)
    }
}

fn irregular_gaps(slices: &[SliceRecord], dz: f64) -> Vec<GeometryNotice> {
    let positions: Vec<Option<f64>> = slices.iter().map(SliceRecord::through_axis).collect();
    positions
        .windows(2)
        .enumerate()
        .skip(1)
        .filter_map(|(i, pair)| {
            let gap = (pair[1]? - pair[0]?).abs();
            ((gap - dz).abs() > dz * SPACING_TOLERANCE).then(|| {
                warn!("irregular slice spacing at slice {}: {gap} instead of {dz}", i + 1);
                GeometryNotice::IrregularSliceSpacing {
                    index: i + 1,
                    expected: dz,
                    found: gap,
                }
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array2;

    fn at(z: f64) -> SliceRecord {
        SliceRecord::new(Array2::zeros((1, 1))).with_position([0.0, 0.0, z])
    }

    #[test]
    fn spacing_from_metadata() {
        let slices = vec![
            at(10.0).with_pixel_spacing([0.7, 0.8]),
            at(12.5),
            at(15.0),
        ];
        let geometry = resolve(&slices);
        assert_eq!(geometry.spacing, (0.7, 0.8, 2.5));
        assert!(geometry.notices.is_empty());
    }

    #[test]
    fn missing_metadata_defaults_once_per_category() {
        let slices = vec![
            SliceRecord::new(Array2::zeros((1, 1))),
            SliceRecord::new(Array2::zeros((1, 1))),
            SliceRecord::new(Array2::zeros((1, 1))),
        ];
        let geometry = resolve(&slices);
        assert_eq!(geometry.spacing, (1.0, 1.0, 1.0));
        assert_eq!(
            geometry.notices,
            vec![
                GeometryNotice::MissingPixelSpacing,
                GeometryNotice::MissingSliceSpacing(SliceSpacingCause::MissingPosition),
            ]
        );
    }

    #[test]
    fn single_slice_falls_back_without_error() {
        let geometry = resolve(&[at(3.0).with_pixel_spacing([0.5, 0.5])]);
        assert_eq!(geometry.spacing, (0.5, 0.5, 1.0));
        assert_eq!(
            geometry.notices,
            vec![GeometryNotice::MissingSliceSpacing(SliceSpacingCause::SingleSlice)]
        );
    }

    #[test]
    fn reports_irregular_gaps() {
        let slices = vec![
            at(0.0).with_pixel_spacing([1.0, 1.0]),
            at(1.0),
            at(2.0),
            at(4.0),
        ];
        let geometry = resolve(&slices);
        assert_eq!(geometry.spacing.2, 1.0);
        assert_eq!(
            geometry.notices,
            vec![GeometryNotice::IrregularSliceSpacing {
                index: 3,
                expected: 1.0,
                found: 2.0,
            }]
        );
    }

    #[test]
    fn coincident_slices_fall_back() {
        let geometry = resolve(&[at(1.0).with_pixel_spacing([1.0, 1.0]), at(1.0)]);
        assert_eq!(geometry.spacing.2, 1.0);
        assert_eq!(
            geometry.notices,
            vec![GeometryNotice::MissingSliceSpacing(
                SliceSpacingCause::CoincidentSlices
            )]
        );
    }
}
