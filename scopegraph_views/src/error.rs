// Copyright 2025 the Scopegraph Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

/// Invalid view configuration.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ViewError {
    /// Zooming needs a finite step greater than one.
    #[error("zoom step must be finite and greater than 1, got {0}")]
    ZoomStep(f64),
    /// Scales must be finite and positive.
    #[error("scale must be finite and positive, got {0}")]
    Scale(f64),
    /// The clipping planes must satisfy `0 < near < z2d < far`.
    #[error("clipping planes near {near}, z2d {z2d}, far {far} are not ordered")]
    ClipPlanes {
        /// Near plane.
        near: f64,
        /// Viewing plane.
        z2d: f64,
        /// Far plane.
        far: f64,
    },
    /// An extraction pool needs at least one worker.
    #[error("an extraction pool needs at least one worker")]
    NoWorkers,
    /// Grid data does not match the declared shape.
    #[error("{len} values do not fill a {width}x{height}x{depth} grid")]
    Shape {
        /// Width.
        width: u32,
        /// Height.
        height: u32,
        /// Depth (1 for images).
        depth: u32,
        /// Number of values supplied.
        len: usize,
    },
}

/// Malformed transform text, as typed into a zoom view.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseError {
    /// A number was expected.
    #[error("expected a number, found `{0}`")]
    Number(String),
    /// A delimiter was expected.
    #[error("expected `{expected}`, found {}", describe(.found))]
    Expected {
        /// The missing delimiter.
        expected: char,
        /// What was there instead.
        found: Option<char>,
    },
    /// Input continued after the closing parenthesis.
    #[error("unexpected trailing input `{0}`")]
    Trailing(String),
    /// The zoom factor must be positive.
    #[error("zoom must be finite and positive, got {0}")]
    Scale(String),
}

fn describe(found: &Option<char>) -> String {
    match found {
        Some(c) => format!("`{c}`"),
        None => "end of input".to_owned(),
    }
}
