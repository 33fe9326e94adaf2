// Copyright 2025 the Scopegraph Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Label colors.

/// A distinct, deterministic color for label `id`.
///
/// Hue, saturation and value come from the fractional parts of irrational
/// multiples of `id`, so neighbouring ids land far apart. Label 0 is black.
pub fn label_rgb(id: u64) -> [f64; 3] {
    #[allow(
        clippy::cast_precision_loss,
        reason = "Ids above 2^53 only need to map to some color."
    )]
    let n = id as f64;
    let h = (0.467_105_725_645_120_2 * n).fract();
    let s = 0.25 + 0.75 * (0.626_228_633_705_905_9 * n).fract();
    let v = if id == 0 {
        0.0
    } else {
        0.5 + 0.5 * (0.942_437_327_769_227_7 * n).fract()
    };
    hsv_to_rgb(h, s, v)
}

/// [`label_rgb`] as 8-bit channels.
pub fn label_color(id: u64) -> [u8; 3] {
    label_rgb(id).map(unit_to_byte)
}

/// Convert hue, saturation and value in `0..=1` to RGB in `0..=1`.
pub fn hsv_to_rgb(h: f64, s: f64, v: f64) -> [f64; 3] {
    let h6 = h.rem_euclid(1.0) * 6.0;
    let f = h6 - h6.floor();
    let p = v * (1.0 - s);
    let q = v * (1.0 - s * f);
    let t = v * (1.0 - s * (1.0 - f));
    #[allow(
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss,
        reason = "h6 lies in 0..6."
    )]
    let sector = h6 as u8;
    match sector {
        0 => [v, t, p],
        1 => [q, v, p],
        2 => [p, v, t],
        3 => [p, q, v],
        4 => [t, p, v],
        _ => [v, p, q],
    }
}

/// Map `0..=1` to `0..=255`, clamping.
pub fn unit_to_byte(c: f64) -> u8 {
    #[allow(
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss,
        reason = "The value is clamped to the u8 range first."
    )]
    let byte = (c * 255.0).round().clamp(0.0, 255.0) as u8;
    byte
}
