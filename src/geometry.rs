//! Points, quads and the 2D transforms the editor builds before handing
//! pixels to the primitive operations.
//!
//! Two point types exist on purpose: [`ViewPoint`] lives in the scaled
//! preview the user drags handles on, [`ImagePoint`] in the full-resolution
//! raster. The only way between them is an explicit conversion with the
//! resize ratio that was in effect when the gesture was committed.

use crate::error::{EditorError, Result};

/// A point in preview (on-screen) space.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ViewPoint {
    pub x: f64,
    pub y: f64,
}

/// A point in original-resolution image space.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ImagePoint {
    pub x: f64,
    pub y: f64,
}

impl ViewPoint {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Map into image space. `ratio` is preview size divided by image size.
    pub fn to_image(self, ratio: f64) -> ImagePoint {
        ImagePoint {
            x: self.x / ratio,
            y: self.y / ratio,
        }
    }
}

impl ImagePoint {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// Crop region as dragged in the preview.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ViewQuad {
    pub top_left: ViewPoint,
    pub top_right: ViewPoint,
    pub bottom_right: ViewPoint,
    pub bottom_left: ViewPoint,
}

impl ViewQuad {
    pub fn to_image(&self, ratio: f64) -> Result<Quad> {
        if !(ratio.is_finite() && ratio > 0.0) {
            return Err(EditorError::InvalidGeometry(format!(
                "resize ratio must be positive, got {ratio}"
            )));
        }
        Ok(Quad {
            top_left: self.top_left.to_image(ratio),
            top_right: self.top_right.to_image(ratio),
            bottom_right: self.bottom_right.to_image(ratio),
            bottom_left: self.bottom_left.to_image(ratio),
        })
    }
}

/// Crop region in image space. This is what the history records.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Quad {
    pub top_left: ImagePoint,
    pub top_right: ImagePoint,
    pub bottom_right: ImagePoint,
    pub bottom_left: ImagePoint,
}

impl Quad {
    /// Axis-aligned quad covering `rect`.
    pub fn from_rect(rect: Rect) -> Self {
        let l = rect.x as f64;
        let t = rect.y as f64;
        let r = (rect.x + rect.width) as f64;
        let b = (rect.y + rect.height) as f64;
        Self {
            top_left: ImagePoint::new(l, t),
            top_right: ImagePoint::new(r, t),
            bottom_right: ImagePoint::new(r, b),
            bottom_left: ImagePoint::new(l, b),
        }
    }

    /// Corners in clockwise order starting at top-left.
    pub fn corners(&self) -> [ImagePoint; 4] {
        [self.top_left, self.top_right, self.bottom_right, self.bottom_left]
    }

    /// Scale into preview space, the inverse of [`ViewQuad::to_image`].
    pub fn to_view(&self, ratio: f64) -> ViewQuad {
        let v = |p: ImagePoint| ViewPoint::new(p.x * ratio, p.y * ratio);
        ViewQuad {
            top_left: v(self.top_left),
            top_right: v(self.top_right),
            bottom_right: v(self.bottom_right),
            bottom_left: v(self.bottom_left),
        }
    }
}

/// Integer axis-aligned rectangle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl Rect {
    pub fn new(x: u32, y: u32, width: u32, height: u32) -> Self {
        Self { x, y, width, height }
    }

    pub fn contains(&self, x: u32, y: u32) -> bool {
        x >= self.x && y >= self.y && x < self.x + self.width && y < self.y + self.height
    }
}

/// 2×3 affine matrix mapping source pixels to destination pixels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Affine(pub [[f64; 3]; 2]);

impl Affine {
    pub fn translation(dx: f64, dy: f64) -> Self {
        Affine([[1.0, 0.0, dx], [0.0, 1.0, dy]])
    }

    /// Rotation by `angle_deg` (counter-clockwise, y axis pointing down)
    /// around `center`.
    pub fn rotation(center: (f64, f64), angle_deg: f64) -> Self {
        let (sin, cos) = angle_deg.to_radians().sin_cos();
        let (cx, cy) = center;
        Affine([
            [cos, sin, (1.0 - cos) * cx - sin * cy],
            [-sin, cos, sin * cx + (1.0 - cos) * cy],
        ])
    }

    pub fn apply(&self, x: f64, y: f64) -> (f64, f64) {
        let m = &self.0;
        (
            m[0][0] * x + m[0][1] * y + m[0][2],
            m[1][0] * x + m[1][1] * y + m[1][2],
        )
    }

    pub fn inverse(&self) -> Option<Self> {
        let [[a, b, c], [d, e, f]] = self.0;
        let det = a * e - b * d;
        if det.abs() < 1e-12 {
            return None;
        }
        let inv = 1.0 / det;
        let ia = e * inv;
        let ib = -b * inv;
        let id = -d * inv;
        let ie = a * inv;
        Some(Affine([
            [ia, ib, -(ia * c + ib * f)],
            [id, ie, -(id * c + ie * f)],
        ]))
    }
}

/// Rotation that grows the canvas to the bounding box of the rotated frame.
///
/// Returns the matrix and the expanded output size. The matrix is the plain
/// rotation about the old center with its translation shifted so the image
/// lands in the middle of the new canvas.
pub fn rotate_bound(width: u32, height: u32, angle_deg: f64) -> (Affine, (u32, u32)) {
    let center = (width as f64 / 2.0, height as f64 / 2.0);
    let mut m = Affine::rotation(center, angle_deg);
    let cos = m.0[0][0].abs();
    let sin = m.0[1][0].abs();

    let (w, h) = (width as f64, height as f64);
    let new_width = (h * sin + w * cos).round();
    let new_height = (h * cos + w * sin).round();

    m.0[0][2] += new_width / 2.0 - center.0;
    m.0[1][2] += new_height / 2.0 - center.1;

    (m, (new_width as u32, new_height as u32))
}

/// 3×3 projective matrix mapping source pixels to destination pixels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Homography(pub [[f64; 3]; 3]);

impl Homography {
    /// Solve for the homography taking each `src[i]` to `dst[i]`.
    pub fn from_points(src: [(f64, f64); 4], dst: [(f64, f64); 4]) -> Option<Self> {
        // Eight unknowns h00..h21, h22 fixed to 1.
        let mut a = [[0.0f64; 9]; 8];
        for i in 0..4 {
            let (x, y) = src[i];
            let (u, v) = dst[i];
            a[2 * i] = [x, y, 1.0, 0.0, 0.0, 0.0, -u * x, -u * y, u];
            a[2 * i + 1] = [0.0, 0.0, 0.0, x, y, 1.0, -v * x, -v * y, v];
        }
        let h = solve_8x8(a)?;
        Some(Homography([
            [h[0], h[1], h[2]],
            [h[3], h[4], h[5]],
            [h[6], h[7], 1.0],
        ]))
    }

    pub fn apply(&self, x: f64, y: f64) -> Option<(f64, f64)> {
        let m = &self.0;
        let w = m[2][0] * x + m[2][1] * y + m[2][2];
        if w.abs() < 1e-12 {
            return None;
        }
        Some((
            (m[0][0] * x + m[0][1] * y + m[0][2]) / w,
            (m[1][0] * x + m[1][1] * y + m[1][2]) / w,
        ))
    }

    pub fn inverse(&self) -> Option<Self> {
        let [[a, b, c], [d, e, f], [g, h, i]] = self.0;
        let det = a * (e * i - f * h) - b * (d * i - f * g) + c * (d * h - e * g);
        if det.abs() < 1e-12 {
            return None;
        }
        let inv = 1.0 / det;
        Some(Homography([
            [(e * i - f * h) * inv, (c * h - b * i) * inv, (b * f - c * e) * inv],
            [(f * g - d * i) * inv, (a * i - c * g) * inv, (c * d - a * f) * inv],
            [(d * h - e * g) * inv, (b * g - a * h) * inv, (a * e - b * d) * inv],
        ]))
    }
}

/// Gaussian elimination with partial pivoting on an augmented 8×9 system.
fn solve_8x8(mut a: [[f64; 9]; 8]) -> Option<[f64; 8]> {
    for col in 0..8 {
        let pivot = (col..8).max_by(|&r1, &r2| a[r1][col].abs().total_cmp(&a[r2][col].abs()))?;
        if a[pivot][col].abs() < 1e-12 {
            return None;
        }
        a.swap(col, pivot);
        for row in 0..8 {
            if row == col {
                continue;
            }
            let factor = a[row][col] / a[col][col];
            if factor == 0.0 {
                continue;
            }
            for k in col..9 {
                a[row][k] -= factor * a[col][k];
            }
        }
    }
    let mut out = [0.0; 8];
    for (i, value) in out.iter_mut().enumerate() {
        *value = a[i][8] / a[i][i];
    }
    Some(out)
}
