//! HCL color space conversions
//!
//! Hue, chroma and luminance are all in `[0, 1]`; hue wraps around. RGB is
//! linear in `[0, 1]` per channel.

use std::f32::consts::PI;

use crate::math::Vec3;

const GAMMA: f32 = 3.0;
const Y0: f32 = 100.0;
/// `exp(GAMMA / Y0) - 0.5`
const MAX_L: f32 = 0.530_454_5;

fn frac(x: f32) -> f32 {
    x - x.floor()
}

/// Convert `[hue, chroma, luminance]` to linear RGB
pub fn hcl_to_rgb(hcl: Vec3) -> Vec3 {
    let [h, c, l] = hcl;
    if l == 0.0 {
        return [0.0, 0.0, 0.0];
    }

    let l = l * MAX_L;
    let q = ((1.0 - c / (2.0 * l)) * (GAMMA / Y0)).exp();
    let u = (2.0 * l - c) / (2.0 * q - 1.0);
    let v = c / q;
    let t = ((h + (frac(2.0 * h) / 4.0).min(frac(-2.0 * h) / 8.0)) * PI * 2.0).tan();

    let h = h * 6.0;
    let rgb = if h <= 1.0 {
        [1.0, t / (1.0 + t), 0.0]
    } else if h <= 2.0 {
        [(1.0 + t) / t, 1.0, 0.0]
    } else if h <= 3.0 {
        [0.0, 1.0, 1.0 + t]
    } else if h <= 4.0 {
        [0.0, 1.0 / (1.0 + t), 1.0]
    } else if h <= 5.0 {
        [-1.0 / t, 0.0, 1.0]
    } else {
        [1.0, 0.0, -t]
    };

    [rgb[0] * v + u, rgb[1] * v + u, rgb[2] * v + u]
}

/// Convert linear RGB to `[hue, chroma, luminance]`
pub fn rgb_to_hcl(rgb: Vec3) -> Vec3 {
    let [r, g, b] = rgb;
    let u = r.min(g).min(b);
    let v = r.max(g).max(b);
    let mut q = GAMMA / Y0;
    let mut chroma = v - u;
    let mut h = 0.0;
    if chroma != 0.0 {
        h = (g - b).atan2(r - g) / PI;
        q *= u / v;
    }
    let q = q.exp();
    let hue = frac(h / 2.0 - frac(h).min(frac(-h)) / 6.0);
    chroma *= q;
    let luminance = (-u + (v + u) * q) / (MAX_L * 2.0);
    [hue, chroma, luminance]
}
