use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum Orientation {
    #[default]
    Axial,
    Coronal,
    Sagittal,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum Interpolation {
    Bilinear,
    #[default]
    None,
}

/// Key used to order slices along the scan axis.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum SortBy {
    /// z component of Image Position (Patient)
    #[default]
    ImagePositionPatient,
    SliceLocation,
    InstanceNumber,
    /// Keep discovery order
    None,
}

/// What to do with files in a series directory that cannot be read as slices.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum ScanPolicy {
    /// Skip the file and keep scanning
    #[default]
    Permissive,
    /// Abort the load on the first unreadable file
    Strict,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum RenderMode {
    /// Ray-cast volume rendering with the active transfer function
    #[default]
    Volume,
    /// Single reslice plane with default window/level
    Slice,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum TissuePreset {
    #[default]
    Bone,
    SoftTissue,
}

impl TissuePreset {
    /// Key binding that activates the preset in the interactive view.
    pub fn from_key(key: &str) -> Option<Self> {
        match key {
            "b" => Some(Self::Bone),
            "s" => Some(Self::SoftTissue),
            _ => None,
        }
    }
}
