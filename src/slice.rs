use dicom::core::Tag;
use dicom::object::{FileDicomObject, InMemDicomObject};
use dicom::pixeldata::{ConvertOptions, ModalityLutOption, PixelDecoder};
use dicom_dictionary_std::tags;
use ndarray::{Array2, s};
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SliceError {
    #[error("Pixel data could not be decoded: {0}")]
    PixelData(#[from] dicom::pixeldata::Error),

    #[error("Unsupported pixel layout {0:?}, expected a single-sample image")]
    UnsupportedLayout(Vec<usize>),

    #[error("DICOM error: {0}")]
    Dicom(#[from] dicom::object::ReadError),
}

/// Rescale pair converting stored values into modality units (HU for CT).
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Rescale {
    pub slope: f64,
    pub intercept: f64,
}

impl Default for Rescale {
    fn default() -> Self {
        Self {
            slope: 1.0,
            intercept: 0.0,
        }
    }
}

impl Rescale {
    #[inline]
    pub fn apply(&self, raw: i32) -> f64 {
        f64::from(raw).mul_add(self.slope, self.intercept)
    }
}

/// One decoded image slice of a series.
///
/// Raw stored values are kept as `i32` so that both signed and unsigned
/// 16 bit sensor data fit without loss. Metadata that was missing or
/// unparseable in the source file is `None`; defaults are applied later by
/// the assembler and the geometry resolver, which also report them.
#[derive(Clone, Debug)]
pub struct SliceRecord {
    pixels: Array2<i32>,
    position: Option<[f64; 3]>,
    pixel_spacing: Option<[f64; 2]>,
    rescale: Option<Rescale>,
    slice_location: Option<f64>,
    instance_number: Option<i32>,
    source: Option<PathBuf>,
}

impl SliceRecord {
    pub fn new(pixels: Array2<i32>) -> Self {
        Self {
            pixels,
            position: None,
            pixel_spacing: None,
            rescale: None,
            slice_location: None,
            instance_number: None,
            source: None,
        }
    }

    pub fn with_position(mut self, position: [f64; 3]) -> Self {
        self.position = Some(position);
        self
    }

    pub fn with_pixel_spacing(mut self, spacing: [f64; 2]) -> Self {
        self.pixel_spacing = Some(spacing);
        self
    }

    pub fn with_rescale(mut self, slope: f64, intercept: f64) -> Self {
        self.rescale = Some(Rescale { slope, intercept });
        self
    }

    pub fn with_slice_location(mut self, location: f64) -> Self {
        self.slice_location = Some(location);
        self
    }

    pub fn with_instance_number(mut self, number: i32) -> Self {
        self.instance_number = Some(number);
        self
    }

    pub fn with_source(mut self, path: impl Into<PathBuf>) -> Self {
        self.source = Some(path.into());
        self
    }

    /// Build a slice from an opened DICOM file.
    ///
    /// Only the first frame and the first sample are used. Stored values are
    /// read without the modality LUT so the rescale can be applied (and
    /// reported) by the assembler.
    pub fn from_dicom(
        dicom_object: &FileDicomObject<InMemDicomObject>,
    ) -> Result<Self, SliceError> {
        let pixel_data = dicom_object.decode_pixel_data()?;
        let options = ConvertOptions::new().with_modality_lut(ModalityLutOption::None);
        let frames = pixel_data.to_ndarray_with_options::<i32>(&options)?;
        if frames.shape()[3] != 1 {
            return Err(SliceError::UnsupportedLayout(frames.shape().to_vec()));
        }
        let pixels = frames.slice_move(s![0, .., .., 0]);

        let position = read_multi_f64(dicom_object, tags::IMAGE_POSITION_PATIENT)
            .and_then(|v| <[f64; 3]>::try_from(v.get(..3)?).ok());
        let pixel_spacing = read_multi_f64(dicom_object, tags::PIXEL_SPACING)
            .and_then(|v| <[f64; 2]>::try_from(v.get(..2)?).ok());
        let rescale = match (
            read_f64(dicom_object, tags::RESCALE_SLOPE),
            read_f64(dicom_object, tags::RESCALE_INTERCEPT),
        ) {
            (Some(slope), Some(intercept)) => Some(Rescale { slope, intercept }),
            (None, None) => None,
            (slope, intercept) => Some(Rescale {
                slope: slope.unwrap_or(1.0),
                intercept: intercept.unwrap_or(0.0),
            }),
        };
        let instance_number = dicom_object
            .element(tags::INSTANCE_NUMBER)
            .ok()
            .and_then(|e| e.to_int::<i32>().ok());

        Ok(Self {
            pixels,
            position,
            pixel_spacing,
            rescale,
            slice_location: read_f64(dicom_object, tags::SLICE_LOCATION),
            instance_number,
            source: None,
        })
    }

    /// Open and decode a slice from a file on disk.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, SliceError> {
        let path = path.as_ref();
        let dicom_object = dicom::object::open_file(path)?;
        Ok(Self::from_dicom(&dicom_object)?.with_source(path))
    }

    /// (rows, cols)
    pub fn dim(&self) -> (usize, usize) {
        self.pixels.dim()
    }

    pub fn pixels(&self) -> &Array2<i32> {
        &self.pixels
    }

    pub fn position(&self) -> Option<[f64; 3]> {
        self.position
    }

    /// Coordinate along the stacking axis.
    pub fn through_axis(&self) -> Option<f64> {
        self.position.map(|p| p[2])
    }

    pub fn pixel_spacing(&self) -> Option<[f64; 2]> {
        self.pixel_spacing
    }

    pub fn rescale(&self) -> Option<Rescale> {
        self.rescale
    }

    pub fn slice_location(&self) -> Option<f64> {
        self.slice_location
    }

    pub fn instance_number(&self) -> Option<i32> {
        self.instance_number
    }

    pub fn source(&self) -> Option<&Path> {
        self.source.as_deref()
    }
}

/// Non-finite values count as absent.
fn read_f64(dicom_object: &FileDicomObject<InMemDicomObject>, tag: Tag) -> Option<f64> {
    dicom_object
        .element(tag)
        .ok()?
        .to_float64()
        .ok()
        .filter(|v| v.is_finite())
}

fn read_multi_f64(
    dicom_object: &FileDicomObject<InMemDicomObject>,
    tag: Tag,
) -> Option<Vec<f64>> {
    dicom_object
        .element(tag)
        .ok()?
        .to_multi_float64()
        .ok()
        .filter(|v| v.iter().all(|x| x.is_finite()))
}
