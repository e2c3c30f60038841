/// Tuning knobs for the editor and its segmentation engines.
///
/// Defaults follow the values the interactive editor ships with: an 800 px
/// working resolution for the coarse cut, a 3% inset for the initial
/// foreground rectangle and brush sizes between 5 and 100 px.
#[derive(Debug, Clone, PartialEq)]
pub struct EditorConfig {
    /// Longest edge of the coarse cut working resolution
    pub max_working_dimension: u32,
    /// Margin of the initial foreground rectangle, as a fraction of each side
    pub inset_fraction: f64,
    /// Iterations of the rectangle-seeded cut pass
    pub rect_iterations: u32,
    /// Iterations of the mask-seeded pass that follows it
    pub mask_iterations: u32,
    /// Iterations used when refining with user strokes
    pub refine_iterations: u32,
    /// Side of the elliptical structuring element used for speckle cleanup
    pub morphology_kernel: u32,
    /// Side of the Gaussian kernel used to feather mask edges
    pub blur_kernel: u32,
    pub brush_min: u32,
    pub brush_max: u32,
}

impl Default for EditorConfig {
    fn default() -> Self {
        Self {
            max_working_dimension: 800,
            inset_fraction: 0.03,
            rect_iterations: 5,
            mask_iterations: 3,
            refine_iterations: 3,
            morphology_kernel: 5,
            blur_kernel: 5,
            brush_min: 5,
            brush_max: 100,
        }
    }
}

impl EditorConfig {
    pub fn with_max_working_dimension(mut self, dim: u32) -> Self {
        self.max_working_dimension = dim.max(1);
        self
    }

    pub fn with_inset_fraction(mut self, fraction: f64) -> Self {
        self.inset_fraction = fraction.clamp(0.0, 0.49);
        self
    }

    pub fn with_iterations(mut self, rect: u32, mask: u32, refine: u32) -> Self {
        self.rect_iterations = rect;
        self.mask_iterations = mask;
        self.refine_iterations = refine;
        self
    }

    pub fn with_brush_range(mut self, min: u32, max: u32) -> Self {
        self.brush_min = min.max(1);
        self.brush_max = max.max(self.brush_min);
        self
    }

    /// Clamp a brush size into the configured range.
    pub fn clamp_brush(&self, size: u32) -> u32 {
        size.clamp(self.brush_min, self.brush_max)
    }

    /// Gaussian sigma for the feathering kernel, derived from the kernel size
    /// the same way separable Gaussian filters do when sigma is left at zero.
    pub fn blur_sigma(&self) -> f32 {
        let k = self.blur_kernel.max(1) as f32;
        0.3 * ((k - 1.0) * 0.5 - 1.0) + 0.8
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn brush_sizes_are_clamped() {
        let config = EditorConfig::default();
        assert_eq!(config.clamp_brush(1), 5);
        assert_eq!(config.clamp_brush(40), 40);
        assert_eq!(config.clamp_brush(500), 100);
    }

    #[test]
    fn default_blur_sigma_matches_five_tap_kernel() {
        let sigma = EditorConfig::default().blur_sigma();
        assert!((sigma - 1.1).abs() < 1e-6);
    }
}
