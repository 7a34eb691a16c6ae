//! Intensity classification for volume rendering.
//!
//! A [`TransferFunction`] maps scalar intensity (HU for CT) to color and
//! opacity through two sets of control points. The renderer interpolates
//! linearly between points; [`TransferFunction::color_at`] and
//! [`TransferFunction::opacity_at`] do the same on the CPU so presets can be
//! inspected and tested.

use crate::enums::TissuePreset;

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum TransferFunctionError {
    #[error("{0} control points are empty")]
    Empty(&'static str),

    #[error("{kind} control points are not strictly increasing at intensity {intensity}")]
    NotMonotonic { kind: &'static str, intensity: f64 },

    #[error("Value {value} at intensity {intensity} is outside [0, 1]")]
    OutOfUnitRange { intensity: f64, value: f64 },
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct ColorPoint {
    pub intensity: f64,
    pub rgb: [f64; 3],
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct OpacityPoint {
    pub intensity: f64,
    pub opacity: f64,
}

/// Lighting applied together with the transfer function.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Shading {
    pub shade: bool,
    pub linear_interpolation: bool,
    pub ambient: f64,
    pub diffuse: f64,
    pub specular: f64,
}

impl Default for Shading {
    fn default() -> Self {
        Self {
            shade: true,
            linear_interpolation: true,
            ambient: 0.4,
            diffuse: 0.6,
            specular: 0.2,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TransferFunction {
    colors: Vec<ColorPoint>,
    opacities: Vec<OpacityPoint>,
    shading: Shading,
}

impl TransferFunction {
    pub fn new(
        colors: Vec<ColorPoint>,
        opacities: Vec<OpacityPoint>,
        shading: Shading,
    ) -> Result<Self, TransferFunctionError> {
        check_increasing("color", colors.iter().map(|p| p.intensity))?;
        check_increasing("opacity", opacities.iter().map(|p| p.intensity))?;
        for point in &colors {
            for value in point.rgb {
                check_unit(point.intensity, value)?;
            }
        }
        for point in &opacities {
            check_unit(point.intensity, point.opacity)?;
        }
        Ok(Self {
            colors,
            opacities,
            shading,
        })
    }

    pub fn preset(preset: TissuePreset) -> Self {
        match preset {
            TissuePreset::Bone => Self::bone(),
            TissuePreset::SoftTissue => Self::soft_tissue(),
        }
    }

    /// Air and soft tissue fully transparent, bone (above ~300 HU) opaque and
    /// near white.
    pub fn bone() -> Self {
        Self {
            colors: vec![
                color(-1000.0, [0.0, 0.0, 0.0]),
                color(0.0, [0.0, 0.0, 0.0]),
                color(300.0, [1.0, 1.0, 0.9]),
                color(1500.0, [1.0, 1.0, 1.0]),
            ],
            opacities: vec![
                opacity(-1000.0, 0.0),
                opacity(0.0, 0.0),
                opacity(200.0, 0.0),
                opacity(300.0, 0.9),
                opacity(1500.0, 1.0),
            ],
            shading: Shading::default(),
        }
    }

    /// Broad grey ramp from fat through muscle, mostly translucent.
    pub fn soft_tissue() -> Self {
        Self {
            colors: vec![
                color(-1000.0, [0.0, 0.0, 0.0]),
                color(-500.0, [0.3, 0.3, 0.3]),
                color(0.0, [0.7, 0.7, 0.7]),
                color(300.0, [1.0, 1.0, 1.0]),
            ],
            opacities: vec![
                opacity(-1000.0, 0.0),
                opacity(-500.0, 0.0),
                opacity(0.0, 0.2),
                opacity(300.0, 0.7),
                opacity(1000.0, 0.9),
            ],
            shading: Shading::default(),
        }
    }

    pub fn colors(&self) -> &[ColorPoint] {
        &self.colors
    }

    pub fn opacities(&self) -> &[OpacityPoint] {
        &self.opacities
    }

    pub fn shading(&self) -> Shading {
        self.shading
    }

    pub fn color_at(&self, intensity: f64) -> [f64; 3] {
        let mut rgb = [0.0; 3];
        for (channel, value) in rgb.iter_mut().enumerate() {
            *value = piecewise_linear(&self.colors, intensity, |p| (p.intensity, p.rgb[channel]));
        }
        rgb
    }

    pub fn opacity_at(&self, intensity: f64) -> f64 {
        piecewise_linear(&self.opacities, intensity, |p| (p.intensity, p.opacity))
    }
}

fn color(intensity: f64, rgb: [f64; 3]) -> ColorPoint {
    ColorPoint { intensity, rgb }
}

fn opacity(intensity: f64, opacity: f64) -> OpacityPoint {
    OpacityPoint { intensity, opacity }
}

fn check_increasing(
    kind: &'static str,
    intensities: impl Iterator<Item = f64>,
) -> Result<(), TransferFunctionError> {
    let mut previous: Option<f64> = None;
    for intensity in intensities {
        if !intensity.is_finite() || previous.is_some_and(|p| intensity <= p) {
            return Err(TransferFunctionError::NotMonotonic { kind, intensity });
        }
        previous = Some(intensity);
    }
    previous
        .map(|_| ())
        .ok_or(TransferFunctionError::Empty(kind))
}

fn check_unit(intensity: f64, value: f64) -> Result<(), TransferFunctionError> {
    if (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(TransferFunctionError::OutOfUnitRange { intensity, value })
    }
}

/// Linear interpolation between control points, clamped to the end values.
fn piecewise_linear<P>(points: &[P], x: f64, get: impl Fn(&P) -> (f64, f64)) -> f64 {
    let Some(first) = points.first() else {
        return 0.0;
    };
    let (x0, y0) = get(first);
    if x <= x0 {
        return y0;
    }
    for pair in points.windows(2) {
        let (xa, ya) = get(&pair[0]);
        let (xb, yb) = get(&pair[1]);
        if x <= xb {
            let t = (x - xa) / (xb - xa);
            return t.mul_add(yb - ya, ya);
        }
    }
    points.last().map_or(y0, |p| get(p).1)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn bone_hides_soft_tissue() {
        let tf = TransferFunction::bone();
        assert_eq!(tf.opacity_at(-2000.0), 0.0);
        assert_eq!(tf.opacity_at(150.0), 0.0);
        assert!(close(tf.opacity_at(250.0), 0.45));
        assert!(close(tf.opacity_at(300.0), 0.9));
        assert_eq!(tf.opacity_at(3000.0), 1.0);
        assert_eq!(tf.color_at(-10.0), [0.0, 0.0, 0.0]);
        assert_eq!(tf.color_at(1500.0), [1.0, 1.0, 1.0]);
    }

    #[test]
    fn soft_tissue_ramps_gently() {
        let tf = TransferFunction::soft_tissue();
        assert_eq!(tf.opacity_at(-600.0), 0.0);
        assert!(close(tf.opacity_at(0.0), 0.2));
        assert!(close(tf.opacity_at(150.0), 0.45));
        assert!(close(tf.opacity_at(1000.0), 0.9));
        let grey = tf.color_at(-250.0);
        assert!(close(grey[0], 0.5) && grey[0] == grey[1] && grey[1] == grey[2]);
    }

    #[test]
    fn presets_pass_validation() {
        for preset in [TissuePreset::Bone, TissuePreset::SoftTissue] {
            let tf = TransferFunction::preset(preset);
            let rebuilt = TransferFunction::new(
                tf.colors().to_vec(),
                tf.opacities().to_vec(),
                tf.shading(),
            );
            assert_eq!(rebuilt, Ok(tf));
        }
    }

    #[test]
    fn rejects_unordered_points() {
        let err = TransferFunction::new(
            vec![color(0.0, [0.0; 3])],
            vec![opacity(100.0, 0.1), opacity(100.0, 0.5)],
            Shading::default(),
        )
        .unwrap_err();
        assert_eq!(
            err,
            TransferFunctionError::NotMonotonic {
                kind: "opacity",
                intensity: 100.0
            }
        );
    }

    #[test]
    fn rejects_empty_and_out_of_range() {
        assert_eq!(
            TransferFunction::new(vec![], vec![opacity(0.0, 0.0)], Shading::default()),
            Err(TransferFunctionError::Empty("color"))
        );
        assert_eq!(
            TransferFunction::new(
                vec![color(0.0, [0.0; 3])],
                vec![opacity(0.0, 1.5)],
                Shading::default()
            ),
            Err(TransferFunctionError::OutOfUnitRange {
                intensity: 0.0,
                value: 1.5
            })
        );
    }
}
