use ndarray::ArrayView2;

pub(crate) struct Interpolator;

impl Interpolator {
    /// Output size (depth, height, width) that gives every axis the finest
    /// spacing of the volume.
    pub(crate) fn get_isotropic_dimensions(
        spacing: (f64, f64, f64),
        original_dim: (usize, usize, usize),
    ) -> (u32, u32, u32) {
        let (x_spacing, y_spacing, z_spacing) = spacing;
        let min_spacing = x_spacing.min(y_spacing).min(z_spacing);
        let inv_min_spacing = 1.0 / min_spacing;

        // original_dim is (depth, height, width) corresponding to (z, y, x)
        let scaled = |len: usize, spacing: f64| {
            ((len as f64 * spacing * inv_min_spacing).round() as u32).max(1)
        };

        (
            scaled(original_dim.0, z_spacing),
            scaled(original_dim.1, y_spacing),
            scaled(original_dim.2, x_spacing),
        )
    }

    #[inline]
    pub(crate) fn bilinear_interpolate(plane: &ArrayView2<i16>, y: f32, x: f32) -> f32 {
        let (height, width) = plane.dim();

        let y0 = y.floor() as usize;
        let x0 = x.floor() as usize;
        let y1 = (y0 + 1).min(height - 1);
        let x1 = (x0 + 1).min(width - 1);

        let dy = y - y0 as f32;
        let dx = x - x0 as f32;
        let one_minus_dx = 1.0 - dx;
        let one_minus_dy = 1.0 - dy;

        let v00 = f32::from(plane[[y0, x0]]);
        let v01 = f32::from(plane[[y0, x1]]);
        let v10 = f32::from(plane[[y1, x0]]);
        let v11 = f32::from(plane[[y1, x1]]);

        let v0 = v00.mul_add(one_minus_dx, v01 * dx);
        let v1 = v10.mul_add(one_minus_dx, v11 * dx);

        v0.mul_add(one_minus_dy, v1 * dy)
    }
}
