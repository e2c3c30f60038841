use crate::geometry::{ImagePoint, ViewPoint};

/// Per-pixel label of a cut mask. Definite labels are never changed by the
/// cut; probable labels are what it solves for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Label {
    Background = 0,
    Foreground = 1,
    ProbableBackground = 2,
    ProbableForeground = 3,
}

impl Label {
    pub fn from_u8(value: u8) -> Self {
        match value {
            0 => Label::Background,
            1 => Label::Foreground,
            2 => Label::ProbableBackground,
            _ => Label::ProbableForeground,
        }
    }

    pub fn is_foreground(self) -> bool {
        matches!(self, Label::Foreground | Label::ProbableForeground)
    }

    pub fn is_definite(self) -> bool {
        matches!(self, Label::Foreground | Label::Background)
    }
}

/// Whether a stroke paints foreground or background.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BrushMode {
    Foreground,
    Background,
}

/// A brush stroke in full-resolution image space.
#[derive(Debug, Clone, PartialEq)]
pub struct BrushStroke {
    pub points: Vec<ImagePoint>,
    pub mode: BrushMode,
    pub radius: u32,
}

impl BrushStroke {
    pub fn new(mode: BrushMode, radius: u32, points: Vec<ImagePoint>) -> Self {
        Self { points, mode, radius }
    }
}

/// A stroke as drawn in the preview, with the brush *size* (diameter) the
/// user picked.
#[derive(Debug, Clone, PartialEq)]
pub struct ViewStroke {
    pub points: Vec<ViewPoint>,
    pub mode: BrushMode,
    pub size: u32,
}

impl ViewStroke {
    pub fn new(mode: BrushMode, size: u32, points: Vec<ViewPoint>) -> Self {
        Self { points, mode, size }
    }

    /// Convert to image space. `ratio` is preview size divided by image size.
    pub fn to_image(&self, ratio: f64) -> BrushStroke {
        let radius = ((self.size as f64 / 2.0 / ratio).round() as u32).max(1);
        BrushStroke {
            points: self.points.iter().map(|p| p.to_image(ratio)).collect(),
            mode: self.mode,
            radius,
        }
    }
}

/// One diagonal-covariance Gaussian of a [`ColorModel`].
#[derive(Debug, Clone, PartialEq)]
struct Component {
    weight: f64,
    mean: [f64; 3],
    var: [f64; 3],
}

/// Gaussian mixture over RGB colour, the statistical model an energy cut
/// learns for each side of the boundary.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ColorModel {
    components: Vec<Component>,
}

/// Background and foreground models, carried between cut passes.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CutModels {
    pub background: ColorModel,
    pub foreground: ColorModel,
}

impl CutModels {
    pub fn is_empty(&self) -> bool {
        self.background.is_empty() || self.foreground.is_empty()
    }
}

const VARIANCE_FLOOR: f64 = 4.0;
const MAX_FIT_SAMPLES: usize = 20_000;
const FIT_ROUNDS: usize = 4;
const LN_2PI: f64 = 1.837_877_066_409_345_3;

impl ColorModel {
    pub fn is_empty(&self) -> bool {
        self.components.is_empty()
    }

    pub fn component_count(&self) -> usize {
        self.components.len()
    }

    /// Fit up to `k` components with a few rounds of k-means.
    ///
    /// Seeding is deterministic (luminance quantiles of a strided sample)
    /// so two fits over the same pixels always agree.
    pub fn fit(samples: &[[f64; 3]], k: usize) -> Self {
        if samples.is_empty() || k == 0 {
            return Self::default();
        }
        let stride = samples.len().div_ceil(MAX_FIT_SAMPLES).max(1);
        let picked: Vec<[f64; 3]> = samples.iter().step_by(stride).copied().collect();

        let luma = |c: &[f64; 3]| 0.299 * c[0] + 0.587 * c[1] + 0.114 * c[2];
        let mut order: Vec<usize> = (0..picked.len()).collect();
        order.sort_by(|&a, &b| luma(&picked[a]).total_cmp(&luma(&picked[b])));

        let k = k.min(picked.len());
        let mut means: Vec<[f64; 3]> = (0..k)
            .map(|i| picked[order[(2 * i + 1) * picked.len() / (2 * k)]])
            .collect();

        let mut assignment = vec![0usize; picked.len()];
        for _ in 0..FIT_ROUNDS {
            for (slot, c) in assignment.iter_mut().zip(&picked) {
                *slot = nearest(&means, c);
            }
            let mut sums = vec![[0.0f64; 3]; means.len()];
            let mut counts = vec![0usize; means.len()];
            for (&a, c) in assignment.iter().zip(&picked) {
                counts[a] += 1;
                for ch in 0..3 {
                    sums[a][ch] += c[ch];
                }
            }
            for (i, mean) in means.iter_mut().enumerate() {
                if counts[i] > 0 {
                    for ch in 0..3 {
                        mean[ch] = sums[i][ch] / counts[i] as f64;
                    }
                }
            }
        }

        let mut counts = vec![0usize; means.len()];
        let mut sq = vec![[0.0f64; 3]; means.len()];
        for (&a, c) in assignment.iter().zip(&picked) {
            counts[a] += 1;
            for ch in 0..3 {
                sq[a][ch] += (c[ch] - means[a][ch]).powi(2);
            }
        }
        let total = picked.len() as f64;
        let components = means
            .iter()
            .enumerate()
            .filter(|(i, _)| counts[*i] > 0)
            .map(|(i, mean)| Component {
                weight: counts[i] as f64 / total,
                mean: *mean,
                var: [0usize, 1, 2].map(|ch| sq[i][ch] / counts[i] as f64 + VARIANCE_FLOOR),
            })
            .collect();
        Self { components }
    }

    /// Log density of `color` under the mixture.
    pub fn log_likelihood(&self, color: [f64; 3]) -> f64 {
        if self.components.is_empty() {
            return f64::MIN / 4.0;
        }
        let terms: Vec<f64> = self
            .components
            .iter()
            .map(|c| {
                let mut log_p = c.weight.ln();
                for ch in 0..3 {
                    let d = color[ch] - c.mean[ch];
                    log_p -= 0.5 * (LN_2PI + c.var[ch].ln() + d * d / c.var[ch]);
                }
                log_p
            })
            .collect();
        let max = terms.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        max + terms.iter().map(|t| (t - max).exp()).sum::<f64>().ln()
    }
}

fn nearest(means: &[[f64; 3]], c: &[f64; 3]) -> usize {
    let mut best = 0;
    let mut best_d = f64::INFINITY;
    for (i, m) in means.iter().enumerate() {
        let d = (0..3).map(|ch| (c[ch] - m[ch]).powi(2)).sum::<f64>();
        if d < best_d {
            best_d = d;
            best = i;
        }
    }
    best
}
