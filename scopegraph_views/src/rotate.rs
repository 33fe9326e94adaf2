// Copyright 2025 the Scopegraph Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Trackball rotation of 3D content.

use core::f64::consts::PI;

use kurbo::{Point, Rect, Vec2};
use scopegraph::{
    Accepts, AcceptsInner, AgentAdded, Capabilities, Context, FiltersDown, Node, NodeKind,
};
use scopegraph_gui::{
    Button, Command, ContentChanged, DrawBase, Modifiers, MouseDown, MouseMove, MouseUp,
    QuerySize, Transform, bounds_rect,
};
use tracing::{trace, warn};
use vek::{Aabb, Quaternion, Vec3};

use crate::notify_changed;

/// Drags shorter than this (in content widths) do not rotate.
const MIN_DRAG: f64 = 0.0001;

/// A scope that rotates its content about the content center.
///
/// Dragging with the left button, starting inside the content, rotates about
/// an axis in the view plane perpendicular to the drag. Dragging across the
/// whole content turns it by half a revolution. A frame marks the content
/// bounds and lights up while the pointer hovers over it.
#[derive(Debug)]
pub struct RotateView {
    rotation: Quaternion<f64>,
    // Rotation when the current drag started.
    prev: Quaternion<f64>,
    content: Option<Aabb<f64>>,
    button_down: Point,
    dragging: bool,
    highlight: bool,
    // Sizes collected outside this view, set aside while the subtree answers.
    outer: Vec<Option<Aabb<f64>>>,
}

impl Default for RotateView {
    fn default() -> Self {
        Self::new()
    }
}

impl RotateView {
    /// An unrotated view.
    pub fn new() -> Self {
        Self {
            rotation: Quaternion::identity(),
            prev: Quaternion::identity(),
            content: None,
            button_down: Point::ZERO,
            dragging: false,
            highlight: false,
            outer: Vec::new(),
        }
    }

    /// The current rotation.
    pub fn rotation(&self) -> Quaternion<f64> {
        self.rotation
    }

    /// Set the rotation.
    pub fn set_rotation(&mut self, rotation: Quaternion<f64>) {
        self.rotation = rotation.normalized();
    }

    /// Whether the pointer hovers over the content.
    pub fn is_highlighted(&self) -> bool {
        self.highlight
    }

    /// Rotate relative to the rotation at the start of the drag.
    ///
    /// `moved` is the drag vector in content widths and heights.
    pub fn rotate_by(&mut self, moved: Vec2) {
        let norm = moved.hypot();
        if norm <= MIN_DRAG {
            return;
        }
        let axis = Vec3::new(moved.y / norm, -moved.x / norm, 0.0);
        let delta = Quaternion::rotation_3d(norm * PI, axis);
        self.rotation = (delta * self.prev).normalized();
        trace!(rotation = ?self.rotation, "rotated");
    }

    fn update_content(&mut self, cx: &mut Context<'_>) {
        let mut query = QuerySize::new();
        if let Err(err) = cx.send_inner(&mut query) {
            warn!(%err, "could not query content size");
        }
        self.content = query.size();
    }

    fn content_rect(&self) -> Option<Rect> {
        self.content.map(bounds_rect)
    }

    fn contains(&self, p: Point) -> bool {
        self.content_rect().is_some_and(|rect| rect.contains(p))
    }

    fn center(&self) -> Vec3<f64> {
        self.content_rect().map_or(Vec3::zero(), |rect| {
            let c = rect.center();
            Vec3::new(c.x, c.y, 0.0)
        })
    }

    /// The box around `bounds` after rotation.
    fn rotated(&self, bounds: Aabb<f64>) -> Aabb<f64> {
        let center = self.center();
        let (lo, hi) = (bounds.min, bounds.max);
        let mut corners = (0..8u8).map(|i| {
            let corner = Vec3::new(
                if i & 1 == 0 { lo.x } else { hi.x },
                if i & 2 == 0 { lo.y } else { hi.y },
                if i & 4 == 0 { lo.z } else { hi.z },
            );
            center + self.rotation * (corner - center)
        });
        let first = corners.next().unwrap_or(center);
        corners.fold(Aabb::new_empty(first), |mut rotated, p| {
            rotated.expand_to_contain_point(p);
            rotated
        })
    }

    fn draw_frame(&self, draw: &DrawBase) {
        let Some(rect) = self.content_rect() else {
            return;
        };
        let canvas = draw.canvas();
        let (ul, ur, lr, ll) = (
            Vec3::new(rect.x0, rect.y0, 0.0),
            Vec3::new(rect.x1, rect.y0, 0.0),
            Vec3::new(rect.x1, rect.y1, 0.0),
            Vec3::new(rect.x0, rect.y1, 0.0),
        );
        let red = if self.highlight { 0.88 } else { 0.1 };
        canvas.submit(Command::Color([red, 0.2, 0.05, 0.5]));
        canvas.submit(Command::Lines(vec![ul, ur, ur, lr, lr, ll, ll, ul]));
        canvas.submit(Command::Quad([ul, ur, lr, ll]));
    }
}

impl FiltersDown<DrawBase> for RotateView {
    fn filter_down(&mut self, draw: &mut DrawBase, cx: &mut Context<'_>) -> bool {
        if self.content.is_none() {
            self.update_content(cx);
        }
        draw.canvas().push(Transform::Rotate {
            center: self.center(),
            rotation: self.rotation,
        });
        self.draw_frame(draw);
        true
    }

    fn unfilter_down(&mut self, draw: &mut DrawBase, _: &mut Context<'_>) {
        draw.canvas().pop();
    }
}

impl FiltersDown<QuerySize> for RotateView {
    fn filter_down(&mut self, query: &mut QuerySize, _: &mut Context<'_>) -> bool {
        self.outer.push(query.take());
        true
    }

    fn unfilter_down(&mut self, query: &mut QuerySize, _: &mut Context<'_>) {
        let inner = query.take();
        if let Some(outer) = self.outer.pop().flatten() {
            query.set_size(outer);
        }
        if let Some(inner) = inner {
            // Rotate about the center of what the subtree reports now.
            self.content = Some(inner);
            query.set_size(self.rotated(inner));
        }
    }
}

impl Accepts<MouseDown> for RotateView {
    fn on_signal(&mut self, down: &mut MouseDown, _: &mut Context<'_>) {
        if down.button == Button::Left && self.contains(down.position) {
            trace!(position = ?down.position, "start rotating");
            self.dragging = true;
            self.button_down = down.position;
            self.prev = self.rotation;
        }
    }
}

impl Accepts<MouseMove> for RotateView {
    fn on_signal(&mut self, moved: &mut MouseMove, cx: &mut Context<'_>) {
        let held = moved.modifiers.contains(Modifiers::LEFT_DOWN);
        if !held {
            let was = self.highlight;
            self.highlight = self.contains(moved.position);
            if was != self.highlight {
                notify_changed(cx);
            }
        }
        if !self.dragging {
            return;
        }
        if !held {
            trace!("left button released, stop rotating");
            self.dragging = false;
            return;
        }
        let Some(rect) = self.content_rect() else {
            return;
        };
        let delta = moved.position - self.button_down;
        let scaled = Vec2::new(delta.x / rect.width(), delta.y / rect.height());
        if scaled.is_finite() {
            self.rotate_by(scaled);
            notify_changed(cx);
        }
    }
}

impl Accepts<MouseUp> for RotateView {
    fn on_signal(&mut self, up: &mut MouseUp, _: &mut Context<'_>) {
        if up.button == Button::Left {
            self.dragging = false;
        }
    }
}

impl AcceptsInner<ContentChanged> for RotateView {
    fn on_inner_signal(&mut self, _: &mut ContentChanged, _: &mut Context<'_>) {
        self.content = None;
    }
}

impl AcceptsInner<AgentAdded> for RotateView {
    fn on_inner_signal(&mut self, _: &mut AgentAdded, _: &mut Context<'_>) {
        self.content = None;
    }
}

impl Node for RotateView {
    const KIND: NodeKind = NodeKind::Scope;

    fn declare(caps: &mut Capabilities<Self>) {
        caps.filters_down::<DrawBase>()
            .filters_down::<QuerySize>()
            .accepts::<MouseDown>()
            .accepts::<MouseMove>()
            .accepts::<MouseUp>()
            .accepts_inner::<ContentChanged>()
            .accepts_inner::<AgentAdded>()
            .passes_up::<ContentChanged>()
            .passes_up::<AgentAdded>()
            .provides::<ContentChanged>()
            .provides_inner::<QuerySize>();
    }
}
