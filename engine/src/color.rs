//! Host mirrors of the kernel coloring functions.

use std::f32::consts::{LN_2, TAU};

use crate::grid::Extent;

/// Opaque black, written for cells that have not escaped.
pub const INTERIOR: [f32; 4] = [0.0, 0.0, 0.0, 1.0];

/// Cyclic spectral palette over a normalized value.
pub fn colorize(t: f32) -> [f32; 4] {
    let channel = |phase: f32| 0.5 + 0.5 * (TAU * (t + phase)).cos();
    [channel(0.0), channel(0.33), channel(0.67), 1.0]
}

/// Smoothed escape value: `(i − ln(ln(|z|²)/2) + ln 2) / global_max`.
pub fn escape_value(modulus_sq: f32, iteration: u32, global_max: u32) -> f32 {
    (iteration as f32 - (modulus_sq.ln() / 2.0).ln() + LN_2) / global_max.max(1) as f32
}

/// Color of an escape-mode cell.
pub fn escape_color(modulus_sq: f32, iteration: u32, global_max: u32, threshold: f32) -> [f32; 4] {
    if modulus_sq < threshold {
        return INTERIOR;
    }
    colorize(escape_value(modulus_sq, iteration, global_max))
}

/// Orbit color keyed on the seed cell; faint alpha so overlapping orbits read as density.
pub fn location_color(loc: [u32; 3], extent: Extent) -> [f32; 4] {
    let [w, h, d] = extent.axes().map(|v| v as f32);
    let [x, y, z] = loc.map(|v| v as f32);
    [x / w, z / d, y / h, 8.0 / (w * w + h * h + d * d).sqrt()]
}

/// Quantize like an `rgba8unorm` store.
pub fn to_rgba8(color: [f32; 4]) -> [u8; 4] {
    color.map(|c| (c.clamp(0.0, 1.0) * 255.0).round() as u8)
}
