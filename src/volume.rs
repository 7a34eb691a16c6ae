use crate::assembler::{Assembly, intensity_range};
use crate::enums::{Interpolation, Orientation};
use crate::interpolator::Interpolator;

use image::{GrayImage, ImageBuffer};
use ndarray::{Array3, ArrayView2, s};
use rayon::prelude::*;

/// Render-ready scalar volume.
///
/// Data is laid out `(slices, rows, cols)`, slices ascending along the scan
/// axis. The grid is immutable once built; renderers only ever borrow it.
#[derive(Clone, Debug, PartialEq)]
pub struct VolumeGrid {
    data: Array3<i16>,
    spacing: (f64, f64, f64),
    range: (i16, i16),
    interpolated_dim: (u32, u32, u32),
}

/// Linear grey mapping centered on `level` and `window` wide.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct WindowLevel {
    pub window: f64,
    pub level: f64,
}

impl WindowLevel {
    /// Window spanning the full intensity range.
    pub fn from_range((min, max): (i16, i16)) -> Self {
        let (min, max) = (f64::from(min), f64::from(max));
        Self {
            window: max - min,
            level: (max + min) / 2.0,
        }
    }

    #[inline]
    pub fn map_to_u8(&self, value: f32) -> u8 {
        let window = if self.window > 0.0 { self.window } else { 1.0 };
        let lower = self.level - window / 2.0;
        (((f64::from(value) - lower) / window) * 255.0)
            .round()
            .clamp(0.0, 255.0) as u8
    }
}

impl VolumeGrid {
    pub fn new(data: Array3<i16>, spacing: (f64, f64, f64)) -> Self {
        let range = intensity_range(&data);
        let original_dim = data.dim();
        Self {
            data,
            spacing,
            range,
            interpolated_dim: Interpolator::get_isotropic_dimensions(spacing, original_dim),
        }
    }

    pub(crate) fn from_assembly(assembly: Assembly, spacing: (f64, f64, f64)) -> Self {
        let original_dim = assembly.data.dim();
        Self {
            data: assembly.data,
            spacing,
            range: assembly.range,
            interpolated_dim: Interpolator::get_isotropic_dimensions(spacing, original_dim),
        }
    }

    /// Get the dimensions of the volume (slices, rows, cols)
    pub fn dim(&self) -> (usize, usize, usize) {
        self.data.dim()
    }

    pub fn rows(&self) -> usize {
        self.data.dim().1
    }

    pub fn cols(&self) -> usize {
        self.data.dim().2
    }

    pub fn slice_count(&self) -> usize {
        self.data.dim().0
    }

    /// Get a reference to the underlying data
    pub fn data(&self) -> &Array3<i16> {
        &self.data
    }

    /// Voxel spacing (dx, dy, dz)
    pub fn spacing(&self) -> (f64, f64, f64) {
        self.spacing
    }

    /// Smallest and largest stored intensity.
    pub fn range(&self) -> (i16, i16) {
        self.range
    }

    pub fn default_window(&self) -> WindowLevel {
        WindowLevel::from_range(self.range)
    }

    pub fn get_slice_from_axis(
        &self,
        index: usize,
        orientation: Orientation,
    ) -> Option<ArrayView2<'_, i16>> {
        if !self.is_valid_index(index, orientation) {
            return None;
        }
        let plane = match orientation {
            Orientation::Axial => self.data.slice(s![index, .., ..]),
            Orientation::Coronal => self.data.slice(s![.., index, ..]),
            Orientation::Sagittal => self.data.slice(s![.., .., index]),
        };
        Some(plane)
    }

    /// Index of the middle plane for `orientation`.
    pub fn center_index(&self, orientation: Orientation) -> usize {
        let dim = self.data.dim();
        match orientation {
            Orientation::Axial => dim.0 / 2,
            Orientation::Coronal => dim.1 / 2,
            Orientation::Sagittal => dim.2 / 2,
        }
    }

    fn get_output_dimensions(&self, orientation: Orientation) -> (u32, u32) {
        // Always (width, height)
        match orientation {
            Orientation::Axial => (self.interpolated_dim.2, self.interpolated_dim.1),
            Orientation::Coronal => (self.interpolated_dim.2, self.interpolated_dim.0),
            Orientation::Sagittal => (self.interpolated_dim.1, self.interpolated_dim.0),
        }
    }

    /// Render one plane through `window` into an 8 bit image.
    ///
    /// With [`Interpolation::Bilinear`] coronal and sagittal planes are
    /// resampled so that a pixel covers the same physical distance on both
    /// image axes. Axial planes are returned at native resolution.
    pub fn get_image_from_axis(
        &self,
        index: usize,
        orientation: Orientation,
        interpolation: Interpolation,
        window: WindowLevel,
    ) -> Option<GrayImage> {
        let plane = self.get_slice_from_axis(index, orientation)?;

        match interpolation {
            Interpolation::Bilinear if !matches!(orientation, Orientation::Axial) => {
                let (width, height) = self.get_output_dimensions(orientation);
                Self::interpolate_plane(&plane, width, height, window)
            }
            _ => Self::plane_to_image(&plane, window),
        }
    }

    fn plane_to_image(plane: &ArrayView2<'_, i16>, window: WindowLevel) -> Option<GrayImage> {
        let (height, width) = plane.dim();
        let pixel_data: Vec<u8> = plane
            .iter()
            .map(|&v| window.map_to_u8(f32::from(v)))
            .collect();
        ImageBuffer::from_raw(width as u32, height as u32, pixel_data)
    }

    fn interpolate_plane(
        plane: &ArrayView2<'_, i16>,
        width: u32,
        height: u32,
        window: WindowLevel,
    ) -> Option<GrayImage> {
        let (plane_height, plane_width) = plane.dim();

        let pixel_data: Vec<u8> = (0..height)
            .into_par_iter()
            .flat_map_iter(|y| {
                (0..width).map(move |x| {
                    // Pixel centers in normalized coordinates
                    let norm_x = (x as f32 + 0.5) / width as f32;
                    let norm_y = (y as f32 + 0.5) / height as f32;

                    let src_x = (norm_x * plane_width as f32 - 0.5)
                        .clamp(0.0, (plane_width - 1) as f32);
                    let src_y = (norm_y * plane_height as f32 - 0.5)
                        .clamp(0.0, (plane_height - 1) as f32);

                    let value = Interpolator::bilinear_interpolate(plane, src_y, src_x);
                    window.map_to_u8(value)
                })
            })
            .collect();

        ImageBuffer::from_raw(width, height, pixel_data)
    }

    fn is_valid_index(&self, index: usize, orientation: Orientation) -> bool {
        let dim = self.data.dim();
        let max_index = match orientation {
            Orientation::Axial => dim.0,
            Orientation::Coronal => dim.1,
            Orientation::Sagittal => dim.2,
        };
        index < max_index
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ramp() -> VolumeGrid {
        let data = Array3::from_shape_fn((4, 3, 2), |(z, y, x)| (z * 100 + y * 10 + x) as i16);
        VolumeGrid::new(data, (0.5, 0.5, 2.0))
    }

    #[test]
    fn range_is_recomputed_from_data() {
        let volume = ramp();
        assert_eq!(volume.range(), (0, 321));
        assert_eq!(volume.dim(), (4, 3, 2));
        assert_eq!((volume.rows(), volume.cols(), volume.slice_count()), (3, 2, 4));
    }

    #[test]
    fn planes_follow_orientation() {
        let volume = ramp();
        let coronal = volume.get_slice_from_axis(1, Orientation::Coronal).unwrap();
        assert_eq!(coronal.dim(), (4, 2));
        assert_eq!(coronal[[3, 1]], 311);
        assert!(volume.get_slice_from_axis(2, Orientation::Sagittal).is_none());
    }

    #[test]
    fn default_window_spans_range() {
        let window = ramp().default_window();
        assert_eq!(window.window, 321.0);
        assert_eq!(window.level, 160.5);
        assert_eq!(window.map_to_u8(0.0), 0);
        assert_eq!(window.map_to_u8(321.0), 255);
        assert_eq!(window.map_to_u8(-500.0), 0);
    }

    #[test]
    fn flat_window_does_not_divide_by_zero() {
        let window = WindowLevel::from_range((40, 40));
        assert_eq!(window.map_to_u8(40.0), 128);
    }

    #[test]
    fn images_keep_native_or_isotropic_size() {
        let volume = ramp();
        let window = volume.default_window();

        let axial = volume
            .get_image_from_axis(0, Orientation::Axial, Interpolation::Bilinear, window)
            .unwrap();
        assert_eq!(axial.dimensions(), (2, 3));

        let sagittal = volume
            .get_image_from_axis(0, Orientation::Sagittal, Interpolation::Bilinear, window)
            .unwrap();
        // 4 slices at 2.0mm become 16 rows at 0.5mm
        assert_eq!(sagittal.dimensions(), (3, 16));

        let native = volume
            .get_image_from_axis(0, Orientation::Sagittal, Interpolation::None, window)
            .unwrap();
        assert_eq!(native.dimensions(), (3, 4));
    }
}
