//! Owned viewer state and the seam to the external renderer.
//!
//! Rendering, picking and the event loop live behind [`RenderDelegate`].
//! [`ViewerContext`] holds what the delegate is shown: one immutable
//! [`VolumeGrid`], the active [`TransferFunction`] and the render mode.
//! Periodic work implements [`TimerDriven`] and is ticked by whoever owns the
//! event loop.

use crate::enums::{Interpolation, Orientation, RenderMode, TissuePreset};
use crate::transfer_function::TransferFunction;
use crate::volume::{VolumeGrid, WindowLevel};

use image::GrayImage;
use log::{info, warn};
use std::path::PathBuf;
use std::time::Duration;

/// Plane shown in [`RenderMode::Slice`].
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct SliceSelection {
    pub orientation: Orientation,
    /// Plane index, `None` for the center of the volume
    pub index: Option<usize>,
    pub interpolation: Interpolation,
}

/// What the external renderer must support.
pub trait RenderDelegate {
    type Error: std::error::Error;

    fn show_volume(
        &mut self,
        volume: &VolumeGrid,
        transfer_function: &TransferFunction,
    ) -> Result<(), Self::Error>;

    fn show_slice(&mut self, image: &GrayImage, window: WindowLevel) -> Result<(), Self::Error>;

    /// Replace the transfer function of the volume already on screen.
    fn update_transfer_function(
        &mut self,
        transfer_function: &TransferFunction,
    ) -> Result<(), Self::Error>;
}

/// Work fired by a repeating timer of the event loop.
pub trait TimerDriven {
    fn interval(&self) -> Duration;

    fn on_tick(&mut self);
}

pub struct ViewerContext {
    volume: VolumeGrid,
    mode: RenderMode,
    preset: TissuePreset,
    transfer_function: TransferFunction,
    selection: SliceSelection,
}

impl ViewerContext {
    pub fn new(volume: VolumeGrid, mode: RenderMode, preset: TissuePreset) -> Self {
        Self {
            volume,
            mode,
            preset,
            transfer_function: TransferFunction::preset(preset),
            selection: SliceSelection::default(),
        }
    }

    pub fn with_slice_selection(mut self, selection: SliceSelection) -> Self {
        self.selection = selection;
        self
    }

    pub fn volume(&self) -> &VolumeGrid {
        &self.volume
    }

    pub fn mode(&self) -> RenderMode {
        self.mode
    }

    pub fn preset(&self) -> TissuePreset {
        self.preset
    }

    pub fn transfer_function(&self) -> &TransferFunction {
        &self.transfer_function
    }

    /// Swap the active transfer function. The volume is left untouched.
    pub fn set_preset(&mut self, preset: TissuePreset) -> &TransferFunction {
        if preset != self.preset {
            info!("switching to {preset:?} transfer function");
            self.preset = preset;
            self.transfer_function = TransferFunction::preset(preset);
        }
        &self.transfer_function
    }

    /// Grey image of the selected plane with the default window.
    pub fn slice_image(&self) -> Option<(GrayImage, WindowLevel)> {
        let SliceSelection {
            orientation,
            index,
            interpolation,
        } = self.selection;
        let index = index.unwrap_or_else(|| self.volume.center_index(orientation));
        let window = self.volume.default_window();
        let image = self
            .volume
            .get_image_from_axis(index, orientation, interpolation, window)?;
        Some((image, window))
    }

    /// Hand the scene to `delegate`.
    ///
    /// In volume mode a delegate failure falls back to the slice view, which
    /// then becomes the active mode.
    pub fn present<D: RenderDelegate>(
        &mut self,
        delegate: &mut D,
    ) -> Result<(), PresentError<D::Error>> {
        if matches!(self.mode, RenderMode::Volume) {
            match delegate.show_volume(&self.volume, &self.transfer_function) {
                Ok(()) => return Ok(()),
                Err(e) => {
                    warn!("volume rendering failed ({e}), switching to slice view");
                    self.mode = RenderMode::Slice;
                }
            }
        }
        let (image, window) = self.slice_image().ok_or(PresentError::InvalidSlice)?;
        delegate
            .show_slice(&image, window)
            .map_err(PresentError::Delegate)
    }

    /// React to a key press. Returns whether the key changed the scene.
    pub fn handle_key<D: RenderDelegate>(
        &mut self,
        key: &str,
        delegate: &mut D,
    ) -> Result<bool, D::Error> {
        let Some(preset) = TissuePreset::from_key(key) else {
            return Ok(false);
        };
        if preset == self.preset {
            return Ok(false);
        }
        self.set_preset(preset);
        if matches!(self.mode, RenderMode::Volume) {
            delegate.update_transfer_function(&self.transfer_function)?;
        }
        Ok(true)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum PresentError<E: std::error::Error> {
    #[error("Selected slice is outside the volume")]
    InvalidSlice,

    #[error("Render delegate error: {0}")]
    Delegate(E),
}

/// Delegate without a window: logs what it is shown and optionally saves
/// slice images.
#[derive(Debug, Default)]
pub struct HeadlessDelegate {
    pub output: Option<PathBuf>,
    pub volumes_shown: usize,
    pub slices_shown: usize,
    pub transfer_function_updates: usize,
}

impl HeadlessDelegate {
    pub fn new(output: Option<PathBuf>) -> Self {
        Self {
            output,
            ..Self::default()
        }
    }
}

impl RenderDelegate for HeadlessDelegate {
    type Error = image::ImageError;

    fn show_volume(
        &mut self,
        volume: &VolumeGrid,
        transfer_function: &TransferFunction,
    ) -> Result<(), Self::Error> {
        let (slices, rows, cols) = volume.dim();
        info!(
            "volume {cols} x {rows} x {slices}, spacing {:?}, range {:?}, {} color / {} opacity points",
            volume.spacing(),
            volume.range(),
            transfer_function.colors().len(),
            transfer_function.opacities().len()
        );
        self.volumes_shown += 1;
        Ok(())
    }

    fn show_slice(&mut self, image: &GrayImage, window: WindowLevel) -> Result<(), Self::Error> {
        info!(
            "slice {} x {}, window {} level {}",
            image.width(),
            image.height(),
            window.window,
            window.level
        );
        if let Some(path) = &self.output {
            image.save(path)?;
            info!("saved slice to {}", path.display());
        }
        self.slices_shown += 1;
        Ok(())
    }

    fn update_transfer_function(
        &mut self,
        transfer_function: &TransferFunction,
    ) -> Result<(), Self::Error> {
        info!(
            "transfer function updated, opacity at 300: {:.2}",
            transfer_function.opacity_at(300.0)
        );
        self.transfer_function_updates += 1;
        Ok(())
    }
}
