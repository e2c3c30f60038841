//! Primitive image operations.
//!
//! The editor never touches pixels geometrically itself: it computes
//! matrices, sizes and seeds, then calls into an [`ImageOps`] backend.
//! [`CpuOps`] is the bundled backend; others can restrict or replace
//! individual kernels and report what they support through
//! [`ImageOps::capabilities`].

mod cpu;
mod cut;

pub use cpu::CpuOps;

use image::{GrayImage, RgbImage, RgbaImage};

use crate::error::Result;
use crate::geometry::{Affine, Homography, Rect};
use crate::segmentation::CutModels;

/// Which optional kernels a backend provides.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Capabilities {
    pub energy_cut: bool,
    pub morphology: bool,
}

impl Default for Capabilities {
    fn default() -> Self {
        Self {
            energy_cut: true,
            morphology: true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlipAxis {
    /// Mirror left/right
    Horizontal,
    /// Mirror top/bottom
    Vertical,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MorphOp {
    /// Dilate then erode: fills small holes
    Close,
    /// Erode then dilate: removes small specks
    Open,
}

/// How an energy cut pass is seeded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CutInit {
    /// Outside the rectangle is background, inside is probably foreground.
    /// Any existing models are discarded.
    Rect(Rect),
    /// Use the labels already in the mask and the models passed in.
    Mask,
}

pub trait ImageOps {
    fn capabilities(&self) -> Capabilities;

    /// Warp with a forward affine matrix into a canvas of `size`.
    /// Pixels that map outside the source are transparent.
    fn warp_affine(&self, src: &RgbaImage, transform: &Affine, size: (u32, u32)) -> Result<RgbaImage>;

    /// Warp with a forward projective matrix into a canvas of `size`.
    fn warp_perspective(
        &self,
        src: &RgbaImage,
        transform: &Homography,
        size: (u32, u32),
    ) -> Result<RgbaImage>;

    fn flip(&self, image: &mut RgbaImage, axis: FlipAxis);

    fn resize(&self, src: &RgbaImage, width: u32, height: u32) -> RgbaImage;

    fn resize_mask(&self, mask: &GrayImage, width: u32, height: u32) -> GrayImage;

    fn gaussian_blur(&self, mask: &GrayImage, sigma: f32) -> GrayImage;

    /// Fails with `Unavailable` when the backend lacks morphology.
    fn morphology(&self, mask: &GrayImage, op: MorphOp, kernel: u32) -> Result<GrayImage>;

    /// Run `iterations` passes of foreground/background energy minimization,
    /// updating the label mask and both colour models in place.
    /// Fails with `Unavailable` when the backend lacks the cut.
    fn energy_cut(
        &self,
        image: &RgbImage,
        mask: &mut GrayImage,
        init: CutInit,
        models: &mut CutModels,
        iterations: u32,
    ) -> Result<()>;

    /// Bounding rectangle of the dominant edges, if any were found.
    fn detect_bounds(&self, image: &RgbaImage) -> Option<Rect>;
}
