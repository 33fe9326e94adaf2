// Copyright 2025 the Scopegraph Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Draw and size-query signals.
//!
//! Drawing happens in two passes: [`DrawOpaque`] with depth writes enabled,
//! then [`DrawTranslucent`] with blending enabled and depth writes disabled.
//! Both embed a [`DrawBase`], so a view transform that filters `DrawBase`
//! applies to both passes.

use kurbo::{Rect, Vec2};
use scopegraph::signal;
use vek::{Aabb, Vec3};

use crate::backend::Canvas;

/// Fields shared by both draw passes.
#[derive(Clone, Debug)]
pub struct DrawBase {
    /// Visible region, in the receiving node's coordinates.
    pub roi: Rect,
    /// Pixels per unit along each axis.
    pub resolution: Vec2,
    /// Set by any view that wants another frame, e.g. while content loads.
    pub needs_redraw: bool,
    canvas: Canvas,
}

impl DrawBase {
    /// A draw request for `roi` on `canvas`.
    pub fn new(roi: Rect, resolution: Vec2, canvas: Canvas) -> Self {
        Self {
            roi,
            resolution,
            needs_redraw: false,
            canvas,
        }
    }

    /// Where to draw.
    pub fn canvas(&self) -> &Canvas {
        &self.canvas
    }

    /// Ask the window for another frame after this one.
    pub fn request_redraw(&mut self) {
        self.needs_redraw = true;
    }
}

/// The opaque pass.
#[derive(Clone, Debug)]
pub struct DrawOpaque {
    /// Shared draw fields.
    pub base: DrawBase,
}

/// The translucent pass.
#[derive(Clone, Debug)]
pub struct DrawTranslucent {
    /// Shared draw fields.
    pub base: DrawBase,
}

signal!(DrawBase);
signal!(DrawOpaque: DrawBase = base);
signal!(DrawTranslucent: DrawBase = base);

impl DrawOpaque {
    /// An opaque pass over `roi`.
    pub fn new(roi: Rect, resolution: Vec2, canvas: Canvas) -> Self {
        Self {
            base: DrawBase::new(roi, resolution, canvas),
        }
    }
}

impl DrawTranslucent {
    /// A translucent pass over `roi`.
    pub fn new(roi: Rect, resolution: Vec2, canvas: Canvas) -> Self {
        Self {
            base: DrawBase::new(roi, resolution, canvas),
        }
    }
}

/// Collects the bounding box of everything below the sender.
///
/// Each view with content calls [`QuerySize::set_size`] or
/// [`QuerySize::fit`]; the result is the union, whatever the visiting order.
#[derive(Copy, Clone, Debug, Default, PartialEq)]
pub struct QuerySize {
    size: Option<Aabb<f64>>,
}

signal!(QuerySize);

impl QuerySize {
    /// An empty query.
    pub fn new() -> Self {
        Self::default()
    }

    /// Grow the result to include `bounds`.
    pub fn set_size(&mut self, bounds: Aabb<f64>) {
        self.size = Some(match self.size {
            Some(size) => size.union(bounds),
            None => bounds,
        });
    }

    /// Grow the result to include `rect` in the z = 0 plane.
    pub fn fit(&mut self, rect: Rect) {
        self.set_size(rect_bounds(rect));
    }

    /// The collected box, or `None` if nothing reported a size.
    pub fn size(&self) -> Option<Aabb<f64>> {
        self.size
    }

    /// The collected box projected onto the z = 0 plane.
    pub fn rect(&self) -> Option<Rect> {
        self.size.map(bounds_rect)
    }

    /// Remove and return the collected box.
    pub fn take(&mut self) -> Option<Aabb<f64>> {
        self.size.take()
    }
}

/// `rect` as a flat box in the z = 0 plane.
pub fn rect_bounds(rect: Rect) -> Aabb<f64> {
    let rect = rect.abs();
    Aabb {
        min: Vec3::new(rect.x0, rect.y0, 0.0),
        max: Vec3::new(rect.x1, rect.y1, 0.0),
    }
}

/// The xy extent of `bounds`.
pub fn bounds_rect(bounds: Aabb<f64>) -> Rect {
    Rect::new(bounds.min.x, bounds.min.y, bounds.max.x, bounds.max.y)
}
