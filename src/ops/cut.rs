//! Colour-model energy cut used by [`CpuOps`](super::CpuOps).
//!
//! Each pass labels the undecided pixels by their data term (negative
//! log-likelihood under the foreground and background mixtures), then
//! smooths that labelling with a contrast-sensitive 4-neighbour term swept
//! in raster order (iterated conditional modes). The mixtures are then
//! re-estimated from the new labelling. Definite labels are never touched.

use image::{GrayImage, RgbImage};

use super::CutInit;
use crate::segmentation::{ColorModel, CutModels, Label};

const COMPONENTS: usize = 5;
const SMOOTHNESS: f64 = 6.0;
const SWEEPS: usize = 2;

pub(super) fn run(
    image: &RgbImage,
    mask: &mut GrayImage,
    init: CutInit,
    models: &mut CutModels,
    iterations: u32,
) {
    let (w, h) = image.dimensions();
    if let CutInit::Rect(rect) = init {
        for (x, y, p) in mask.enumerate_pixels_mut() {
            let label = if rect.contains(x, y) {
                Label::ProbableForeground
            } else {
                Label::Background
            };
            p[0] = label as u8;
        }
        *models = CutModels::default();
    }

    let colors: Vec<[f64; 3]> = image
        .pixels()
        .map(|p| [p[0] as f64, p[1] as f64, p[2] as f64])
        .collect();
    if models.is_empty() {
        update_models(models, &colors, mask);
    }
    let beta = contrast_beta(&colors, w as usize, h as usize);

    for _ in 0..iterations {
        relabel(&colors, mask, models, beta, w as usize, h as usize);
        update_models(models, &colors, mask);
    }
}

/// Re-estimate both mixtures; a side with no pixels keeps its old model.
fn update_models(models: &mut CutModels, colors: &[[f64; 3]], mask: &GrayImage) {
    let mut fg = Vec::new();
    let mut bg = Vec::new();
    for (c, label) in colors.iter().zip(mask.as_raw()) {
        if Label::from_u8(*label).is_foreground() {
            fg.push(*c);
        } else {
            bg.push(*c);
        }
    }
    let foreground = ColorModel::fit(&fg, COMPONENTS);
    let background = ColorModel::fit(&bg, COMPONENTS);
    if !foreground.is_empty() {
        models.foreground = foreground;
    }
    if !background.is_empty() {
        models.background = background;
    }
}

fn contrast_beta(colors: &[[f64; 3]], w: usize, h: usize) -> f64 {
    let mut total = 0.0;
    let mut count = 0usize;
    for y in 0..h {
        for x in 0..w {
            let i = y * w + x;
            if x + 1 < w {
                total += dist2(&colors[i], &colors[i + 1]);
                count += 1;
            }
            if y + 1 < h {
                total += dist2(&colors[i], &colors[i + w]);
                count += 1;
            }
        }
    }
    if count == 0 || total <= 0.0 {
        0.0
    } else {
        1.0 / (2.0 * total / count as f64)
    }
}

fn relabel(colors: &[[f64; 3]], mask: &mut GrayImage, models: &CutModels, beta: f64, w: usize, h: usize) {
    let labels: &mut [u8] = mask;
    let data: Vec<(f64, f64)> = colors
        .iter()
        .map(|c| {
            (
                -models.foreground.log_likelihood(*c),
                -models.background.log_likelihood(*c),
            )
        })
        .collect();

    // Start from the maximum-likelihood labelling, then smooth it.
    for (label, (fg, bg)) in labels.iter_mut().zip(&data) {
        if !Label::from_u8(*label).is_definite() {
            *label = probable(fg <= bg);
        }
    }

    for _ in 0..SWEEPS {
        for y in 0..h {
            for x in 0..w {
                let i = y * w + x;
                if Label::from_u8(labels[i]).is_definite() {
                    continue;
                }
                let c = colors[i];
                let (mut cost_fg, mut cost_bg) = data[i];

                let mut neighbour = |j: usize| {
                    let weight = SMOOTHNESS * (-beta * dist2(&c, &colors[j])).exp();
                    if Label::from_u8(labels[j]).is_foreground() {
                        cost_bg += weight;
                    } else {
                        cost_fg += weight;
                    }
                };
                if x > 0 {
                    neighbour(i - 1);
                }
                if x + 1 < w {
                    neighbour(i + 1);
                }
                if y > 0 {
                    neighbour(i - w);
                }
                if y + 1 < h {
                    neighbour(i + w);
                }

                labels[i] = probable(cost_fg <= cost_bg);
            }
        }
    }
}

fn probable(foreground: bool) -> u8 {
    if foreground {
        Label::ProbableForeground as u8
    } else {
        Label::ProbableBackground as u8
    }
}

fn dist2(a: &[f64; 3], b: &[f64; 3]) -> f64 {
    (0..3).map(|ch| (a[ch] - b[ch]).powi(2)).sum()
}
