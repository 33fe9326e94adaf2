// Copyright 2025 the Scopegraph Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Zooming and panning.
//!
//! A [`ZoomView`] maps its content to the screen with a uniform scale and a
//! shift: `screen = content * scale + shift`. The effective transform is the
//! user transform (wheel zoom, drags) composed with an optional automatic fit
//! of the content into the region given by the last [`Resize`].
//!
//! Content is drawn through a perspective frustum whose `z = 0` plane maps to
//! the zoomed region of interest, so flat content looks flat and 3D content
//! gets a 90° field of view at the default zoom.

use core::fmt;
use core::str::FromStr;

use kurbo::{Point, Rect, TranslateScale, Vec2};
use scopegraph::{
    Accepts, AcceptsInner, AgentAdded, Capabilities, Context, FiltersDown, Node, NodeKind,
};
use scopegraph_gui::{
    Button, ContentChanged, DrawBase, Key, KeyDown, Modifiers, PointerDown, PointerMove,
    PointerSignal, QuerySize, Resize, Transform, bounds_rect,
};
use tracing::{debug, error, info, trace, warn};
use vek::{Aabb, Vec3};

use crate::error::{ParseError, ViewError};
use crate::notify_changed;

/// Configuration of a [`ZoomView`].
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct ZoomOptions {
    /// Factor applied per wheel step. Doubled while Shift is held.
    pub step: f64,
    /// Initial user scale.
    pub user_scale: f64,
    /// Initial user shift.
    pub user_shift: Vec2,
    /// Distance of the eye from the `z = 0` plane.
    pub z2d: f64,
    /// Near clipping plane.
    pub near: f64,
    /// Far clipping plane.
    pub far: f64,
    /// Fit the content into the region of the last [`Resize`].
    pub autoscale: bool,
}

impl Default for ZoomOptions {
    fn default() -> Self {
        Self {
            step: 1.1,
            user_scale: 1.0,
            user_shift: Vec2::ZERO,
            z2d: 1000.0,
            near: 1.0,
            far: 2000.0,
            autoscale: false,
        }
    }
}

impl ZoomOptions {
    /// Set the zoom factor per wheel step.
    pub fn with_step(mut self, step: f64) -> Self {
        self.step = step;
        self
    }

    /// Start from the given user transform.
    pub fn with_user_transform(mut self, scale: f64, shift: Vec2) -> Self {
        self.user_scale = scale;
        self.user_shift = shift;
        self
    }

    /// Set the initial clipping planes.
    pub fn with_clip_planes(mut self, near: f64, z2d: f64, far: f64) -> Self {
        self.near = near;
        self.z2d = z2d;
        self.far = far;
        self
    }

    /// Fit content into the requested region.
    pub fn with_autoscale(mut self, autoscale: bool) -> Self {
        self.autoscale = autoscale;
        self
    }

    fn validate(&self) -> Result<(), ViewError> {
        if !(self.step.is_finite() && self.step > 1.0) {
            return Err(ViewError::ZoomStep(self.step));
        }
        if !(self.user_scale.is_finite() && self.user_scale > 0.0) {
            return Err(ViewError::Scale(self.user_scale));
        }
        if !(self.near > 0.0 && self.near < self.z2d && self.z2d < self.far) {
            return Err(ViewError::ClipPlanes {
                near: self.near,
                z2d: self.z2d,
                far: self.far,
            });
        }
        Ok(())
    }
}

/// A user zoom transform, written as `"<zoom> (<shift_x>, <shift_y>)"`.
///
/// ```
/// use scopegraph_views::ZoomTransform;
///
/// let t: ZoomTransform = "2.5 (10, -4)".parse().unwrap();
/// assert_eq!(t.scale, 2.5);
/// assert_eq!(t.to_string(), "2.5 (10, -4)");
/// assert!("2.5 10, -4)".parse::<ZoomTransform>().is_err());
/// ```
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct ZoomTransform {
    /// Zoom factor.
    pub scale: f64,
    /// Shift in screen units.
    pub shift: Vec2,
}

impl fmt::Display for ZoomTransform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({}, {})", self.scale, self.shift.x, self.shift.y)
    }
}

impl FromStr for ZoomTransform {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut rest = s;
        let scale = number(&mut rest)?;
        expect(&mut rest, '(')?;
        let x = number(&mut rest)?;
        expect(&mut rest, ',')?;
        let y = number(&mut rest)?;
        expect(&mut rest, ')')?;
        let rest = rest.trim();
        if !rest.is_empty() {
            return Err(ParseError::Trailing(rest.to_owned()));
        }
        if !(scale.is_finite() && scale > 0.0) {
            return Err(ParseError::Scale(scale.to_string()));
        }
        Ok(Self {
            scale,
            shift: Vec2::new(x, y),
        })
    }
}

fn number(rest: &mut &str) -> Result<f64, ParseError> {
    let s = rest.trim_start();
    let end = s
        .find(|c: char| !(c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '+')))
        .unwrap_or(s.len());
    let (token, tail) = s.split_at(end);
    let value = token.parse::<f64>().map_err(|_| {
        let shown = if token.is_empty() {
            s.chars().next().map(String::from).unwrap_or_default()
        } else {
            token.to_owned()
        };
        ParseError::Number(shown)
    })?;
    *rest = tail;
    Ok(value)
}

fn expect(rest: &mut &str, expected: char) -> Result<(), ParseError> {
    let mut chars = rest.trim_start().chars();
    match chars.next() {
        Some(c) if c == expected => {
            *rest = chars.as_str();
            Ok(())
        }
        found => Err(ParseError::Expected { expected, found }),
    }
}

/// Source of transform text for Shift+T, e.g. a console prompt.
pub type Prompt = Box<dyn FnMut() -> Option<String>>;

/// A scope that zooms and pans its content.
///
/// - Ctrl + wheel zooms about the pointer (Shift doubles the step).
/// - Ctrl + left drag pans (Shift amplifies the motion tenfold).
/// - `R` resets the user transform, `T` logs it, Shift+`T` reads a new one
///   from the [prompt](ZoomView::with_prompt).
pub struct ZoomView {
    step: f64,
    autoscale: bool,

    user_scale: f64,
    user_shift: Vec2,
    auto_scale: f64,
    auto_shift: Vec2,
    scale: f64,
    shift: Vec2,

    desired: Rect,
    content: Option<Aabb<f64>>,
    zoomed_roi: Rect,

    z2d: f64,
    near: f64,
    far: f64,

    button_down: Point,
    dragging: bool,
    // Inside a draw pass, content that reports a change may still be drawing
    // and cannot answer a size query until the next pass.
    drawing: bool,
    requery: bool,
    // Ray directions replaced by the pointer filter, restored on unfilter.
    directions: Vec<Vec3<f64>>,
    prompt: Option<Prompt>,
}

impl fmt::Debug for ZoomView {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ZoomView")
            .field("scale", &self.scale)
            .field("shift", &self.shift)
            .field("user", &self.user_transform())
            .field("desired", &self.desired)
            .field("content", &self.content)
            .field("dragging", &self.dragging)
            .finish_non_exhaustive()
    }
}

impl ZoomView {
    /// A zoom view with the given options.
    pub fn new(options: ZoomOptions) -> Result<Self, ViewError> {
        options.validate()?;
        let mut view = Self {
            step: options.step,
            autoscale: options.autoscale,
            user_scale: options.user_scale,
            user_shift: options.user_shift,
            auto_scale: 1.0,
            auto_shift: Vec2::ZERO,
            scale: 1.0,
            shift: Vec2::ZERO,
            desired: Rect::new(0.0, 0.0, 1.0, 1.0),
            content: None,
            zoomed_roi: Rect::new(0.0, 0.0, 1.0, 1.0),
            z2d: options.z2d,
            near: options.near,
            far: options.far,
            button_down: Point::ZERO,
            dragging: false,
            drawing: false,
            requery: false,
            directions: Vec::new(),
            prompt: None,
        };
        view.update_scale_and_shift();
        Ok(view)
    }

    /// Read Shift+T transforms from `prompt`.
    pub fn with_prompt(mut self, prompt: impl FnMut() -> Option<String> + 'static) -> Self {
        self.prompt = Some(Box::new(prompt));
        self
    }

    /// The effective map from content to screen coordinates.
    pub fn transform(&self) -> TranslateScale {
        TranslateScale::new(self.shift, self.scale)
    }

    /// The user part of the transform.
    pub fn user_transform(&self) -> ZoomTransform {
        ZoomTransform {
            scale: self.user_scale,
            shift: self.user_shift,
        }
    }

    /// Replace the user part of the transform.
    ///
    /// The caller is responsible for requesting a redraw.
    pub fn set_user_transform(&mut self, transform: ZoomTransform) {
        self.user_scale = transform.scale;
        self.user_shift = transform.shift;
        self.update_scale_and_shift();
    }

    /// Parse `text` as a [`ZoomTransform`] and apply it.
    ///
    /// On error the current transform is kept.
    pub fn apply_transform_text(&mut self, text: &str) -> Result<(), ParseError> {
        let transform = text.parse::<ZoomTransform>()?;
        self.set_user_transform(transform);
        Ok(())
    }

    /// The content bounds seen at the last content change.
    pub fn content_size(&self) -> Option<Aabb<f64>> {
        self.content
    }

    /// Current `(near, z2d, far)` planes.
    pub fn clip_planes(&self) -> (f64, f64, f64) {
        (self.near, self.z2d, self.far)
    }

    /// Multiply the user scale by `change`, keeping `anchor` (screen
    /// coordinates) over the same content point.
    fn zoom(&mut self, change: f64, anchor: Point) {
        let anchor = anchor.to_vec2();
        let shift = self.auto_shift + self.user_shift * self.auto_scale;
        self.user_scale *= change;
        self.user_shift = (anchor - (anchor - shift) * change - self.auto_shift) / self.auto_scale;
        self.update_scale_and_shift();
        trace!(scale = self.scale, shift = ?self.shift, "zoomed");
    }

    fn drag(&mut self, direction: Vec2) {
        self.user_shift += direction / self.auto_scale;
        self.update_scale_and_shift();
    }

    fn update_content_size(&mut self, cx: &mut Context<'_>) {
        let mut query = QuerySize::new();
        if let Err(err) = cx.send_inner(&mut query) {
            warn!(%err, "could not query content size");
        }
        self.content = query.size();
    }

    fn update_scale_and_shift(&mut self) {
        self.auto_scale = 1.0;
        self.auto_shift = Vec2::ZERO;

        let desired = self.desired;
        if self.autoscale
            && let Some(content) = self.content.map(bounds_rect)
            && content.width() > 0.0
            && content.height() > 0.0
            && desired.width() > 0.0
            && desired.height() > 0.0
        {
            let fit_height =
                content.width() / content.height() < desired.width() / desired.height();
            self.auto_scale = if fit_height {
                desired.height() / content.height()
            } else {
                desired.width() / content.width()
            };
            // Center along the axis that does not fill the region.
            let center = if fit_height {
                Vec2::new(0.5 * (desired.width() - content.width() * self.auto_scale), 0.0)
            } else {
                Vec2::new(0.0, 0.5 * (desired.height() - content.height() * self.auto_scale))
            };
            self.auto_shift =
                desired.origin().to_vec2() - content.origin().to_vec2() * self.auto_scale + center;
        }

        self.shift = self.user_shift * self.auto_scale + self.auto_shift;
        self.scale = self.user_scale * self.auto_scale;
        self.zoomed_roi = self.transform().inverse() * self.desired;
    }

    fn update_clip_planes(&mut self) {
        let Some(content) = self.content else {
            return;
        };
        let extent = content.size().w.max(content.size().h) / 2.0;
        if !(extent.is_finite() && extent > 0.0) {
            return;
        }
        // A 90° field of view at the unzoomed scale.
        self.near = 2.0 * extent;
        self.far = self.near + (2.0 * content.max.z + 1.0).max(10.0);
        self.z2d = (self.near + self.far) / 2.0;
        debug!(near = self.near, z2d = self.z2d, far = self.far, "clip planes updated");
    }

    fn content_updated(&mut self, cx: &mut Context<'_>) {
        if self.drawing {
            trace!("content changed while drawing, querying on the next pass");
            self.requery = true;
            return;
        }
        self.requery = false;
        self.update_content_size(cx);
        self.update_scale_and_shift();
        self.update_clip_planes();
    }

    fn on_transform_key(&mut self, modifiers: Modifiers, cx: &mut Context<'_>) {
        if !modifiers.shift() {
            info!(transform = %self.user_transform(), "zoom transformation");
            return;
        }
        let Some(prompt) = self.prompt.as_mut() else {
            warn!("no prompt to read a zoom transformation from");
            return;
        };
        info!("enter zoom and shift values as \"<zoom> (<shift_x>, <shift_y>)\"");
        let Some(text) = prompt() else {
            return;
        };
        match self.apply_transform_text(&text) {
            Ok(()) => notify_changed(cx),
            Err(err) => error!(%err, input = text.trim(), "ignoring zoom transformation"),
        }
    }
}

impl FiltersDown<DrawBase> for ZoomView {
    fn filter_down(&mut self, draw: &mut DrawBase, cx: &mut Context<'_>) -> bool {
        if self.requery {
            self.content_updated(cx);
        }
        self.drawing = true;
        self.zoomed_roi = self.transform().inverse() * draw.roi;
        draw.canvas().push(Transform::Frustum {
            roi: self.zoomed_roi,
            near: self.near,
            far: self.far,
            z2d: self.z2d,
        });
        draw.roi = self.zoomed_roi;
        draw.resolution = draw.resolution * self.scale;
        true
    }

    fn unfilter_down(&mut self, draw: &mut DrawBase, _: &mut Context<'_>) {
        self.drawing = false;
        draw.roi = self.transform() * draw.roi;
        draw.resolution = draw.resolution / self.scale;
        draw.canvas().pop();
    }
}

impl FiltersDown<PointerSignal> for ZoomView {
    fn filter_down(&mut self, signal: &mut PointerSignal, _: &mut Context<'_>) -> bool {
        let shift = Vec3::new(self.shift.x, self.shift.y, 0.0);
        signal.position = self.transform().inverse() * signal.position;
        signal.ray.origin = (signal.ray.origin - shift) / self.scale;

        // From the eye, through the point on the viewing plane.
        let center = self.zoomed_roi.center();
        let through = Vec3::new(
            signal.ray.origin.x - center.x,
            signal.ray.origin.y - center.y,
            self.z2d,
        );
        self.directions.push(signal.ray.direction);
        signal.ray.direction = through.normalized();
        true
    }

    fn unfilter_down(&mut self, signal: &mut PointerSignal, _: &mut Context<'_>) {
        let shift = Vec3::new(self.shift.x, self.shift.y, 0.0);
        signal.position = self.transform() * signal.position;
        signal.ray.origin = signal.ray.origin * self.scale + shift;
        if let Some(direction) = self.directions.pop() {
            signal.ray.direction = direction;
        }
    }
}

impl FiltersDown<Resize> for ZoomView {
    fn filter_down(&mut self, resize: &mut Resize, cx: &mut Context<'_>) -> bool {
        self.desired = resize.region;
        self.update_scale_and_shift();
        notify_changed(cx);
        // Children live in content coordinates; the region means nothing to them.
        false
    }
}

impl Accepts<PointerDown> for ZoomView {
    fn on_signal(&mut self, down: &mut PointerDown, cx: &mut Context<'_>) {
        if !down.modifiers.control() {
            return;
        }
        down.processed = true;
        let position = down.position;

        let step = if down.modifiers.shift() {
            self.step * 2.0
        } else {
            self.step
        };
        match down.button {
            Button::Left => {
                trace!(?position, "start dragging");
                self.dragging = true;
                self.button_down = position;
                return;
            }
            Button::WheelUp => self.zoom(step, position),
            Button::WheelDown => self.zoom(1.0 / step, position),
            _ => {}
        }
        notify_changed(cx);
    }
}

impl Accepts<PointerMove> for ZoomView {
    fn on_signal(&mut self, moved: &mut PointerMove, cx: &mut Context<'_>) {
        if !moved.modifiers.control() || !self.dragging {
            return;
        }
        moved.processed = true;

        if !moved.modifiers.contains(Modifiers::LEFT_DOWN) {
            trace!("left button released, stop dragging");
            self.dragging = false;
            return;
        }
        let amp = if moved.modifiers.shift() { 10.0 } else { 1.0 };
        let delta = moved.position - self.button_down;
        self.drag(delta * amp);
        self.button_down = moved.position;
        notify_changed(cx);
    }
}

impl Accepts<KeyDown> for ZoomView {
    fn on_signal(&mut self, key: &mut KeyDown, cx: &mut Context<'_>) {
        match key.key {
            Key::R => {
                self.set_user_transform(ZoomTransform {
                    scale: 1.0,
                    shift: Vec2::ZERO,
                });
                notify_changed(cx);
            }
            Key::T => self.on_transform_key(key.modifiers, cx),
            _ => {}
        }
    }
}

impl AcceptsInner<ContentChanged> for ZoomView {
    fn on_inner_signal(&mut self, _: &mut ContentChanged, cx: &mut Context<'_>) {
        self.content_updated(cx);
    }
}

impl AcceptsInner<AgentAdded> for ZoomView {
    fn on_inner_signal(&mut self, _: &mut AgentAdded, cx: &mut Context<'_>) {
        self.content_updated(cx);
    }
}

impl Node for ZoomView {
    const KIND: NodeKind = NodeKind::Scope;

    fn declare(caps: &mut Capabilities<Self>) {
        caps.filters_down::<DrawBase>()
            .filters_down::<PointerSignal>()
            .filters_down::<Resize>()
            .accepts::<PointerDown>()
            .accepts::<PointerMove>()
            .accepts::<KeyDown>()
            .accepts_inner::<ContentChanged>()
            .accepts_inner::<AgentAdded>()
            .passes_up::<ContentChanged>()
            .passes_up::<AgentAdded>()
            .provides::<ContentChanged>()
            .provides_inner::<QuerySize>();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use scopegraph::NodeId;
    use scopegraph_gui::{
        Command, ContextSettings, MouseDown, MouseMove, Recorder, Window, WindowMode,
    };
    use std::rc::Rc;

    /// Records where pointer events land in content coordinates.
    #[derive(Debug, Default)]
    struct Content {
        bounds: Rect,
        seen: Option<Point>,
        direction: Option<Vec3<f64>>,
        roi: Option<Rect>,
    }

    impl Accepts<PointerSignal> for Content {
        fn on_signal(&mut self, signal: &mut PointerSignal, _: &mut Context<'_>) {
            self.seen = Some(signal.position);
            self.direction = Some(signal.ray.direction);
        }
    }

    impl Accepts<DrawBase> for Content {
        fn on_signal(&mut self, draw: &mut DrawBase, _: &mut Context<'_>) {
            self.roi = Some(draw.roi);
        }
    }

    impl Accepts<QuerySize> for Content {
        fn on_signal(&mut self, query: &mut QuerySize, _: &mut Context<'_>) {
            query.fit(self.bounds);
        }
    }

    impl Node for Content {
        fn declare(caps: &mut Capabilities<Self>) {
            caps.accepts::<PointerSignal>()
                .accepts::<DrawBase>()
                .accepts::<QuerySize>();
        }
    }

    fn setup(options: ZoomOptions, bounds: Rect) -> (Window, Rc<Recorder>, NodeId, NodeId) {
        let recorder = Rc::new(Recorder::new());
        let mut window = Window::new(
            WindowMode::default().with_size(200, 100),
            &ContextSettings::default(),
            recorder.clone(),
        )
        .unwrap();
        let zoom = window.add(ZoomView::new(options).unwrap()).unwrap();
        let content = window
            .graph_mut()
            .insert(
                Some(zoom),
                Content {
                    bounds,
                    ..Content::default()
                },
            )
            .unwrap();
        window.validate().unwrap();
        (window, recorder, zoom, content)
    }

    fn zoom_view(window: &Window, id: NodeId) -> &ZoomView {
        window.graph().get::<ZoomView>(id).unwrap()
    }

    #[test]
    fn invalid_options_are_rejected() {
        assert_eq!(
            ZoomView::new(ZoomOptions::default().with_step(1.0)).unwrap_err(),
            ViewError::ZoomStep(1.0)
        );
        assert!(matches!(
            ZoomView::new(ZoomOptions::default().with_clip_planes(10.0, 5.0, 20.0)),
            Err(ViewError::ClipPlanes { .. })
        ));
        assert_eq!(
            ZoomView::new(ZoomOptions::default().with_user_transform(0.0, Vec2::ZERO))
                .unwrap_err(),
            ViewError::Scale(0.0)
        );
    }

    #[test]
    fn pointer_filter_round_trips() {
        let options = ZoomOptions::default().with_user_transform(2.5, Vec2::new(13.0, -7.0));
        let (mut window, _recorder, _zoom, content) =
            setup(options, Rect::new(0.0, 0.0, 50.0, 50.0));

        let start = Point::new(42.0, 17.0);
        let mut moved = MouseMove::new(start, Modifiers::empty());
        let original = moved.ray;
        window.broadcast(&mut moved).unwrap();

        let seen = window.graph().get::<Content>(content).unwrap().seen.unwrap();
        assert!((seen - Point::new((42.0 - 13.0) / 2.5, (17.0 + 7.0) / 2.5)).hypot() < 1e-9);
        assert!(moved.position.distance(start) < 1e-5);
        assert!((moved.ray.origin - original.origin).magnitude() < 1e-5);
        assert!((moved.ray.direction - original.direction).magnitude() < 1e-5);

        let direction = window.graph().get::<Content>(content).unwrap().direction.unwrap();
        assert!((direction.magnitude() - 1.0).abs() < 1e-9);
        assert!(direction.z > 0.0);
    }

    #[test]
    fn wheel_zoom_keeps_the_anchor_fixed() {
        let (mut window, _recorder, zoom, _content) =
            setup(ZoomOptions::default(), Rect::new(0.0, 0.0, 50.0, 50.0));
        let anchor = Point::new(30.0, 20.0);
        let before = zoom_view(&window, zoom).transform().inverse() * anchor;

        assert!(
            window
                .process_mouse_down(anchor, Button::WheelUp, Modifiers::CONTROL_DOWN)
                .unwrap()
        );
        let view = zoom_view(&window, zoom);
        assert!((view.user_transform().scale - 1.1).abs() < 1e-12);
        assert!(((view.transform().inverse() * anchor) - before).hypot() < 1e-9);

        assert!(
            window
                .process_mouse_down(
                    anchor,
                    Button::WheelDown,
                    Modifiers::CONTROL_DOWN | Modifiers::SHIFT_DOWN
                )
                .unwrap()
        );
        assert!((zoom_view(&window, zoom).user_transform().scale - 1.1 / 2.2).abs() < 1e-12);
    }

    #[test]
    fn input_without_control_is_left_alone() {
        let (mut window, _recorder, zoom, _content) =
            setup(ZoomOptions::default(), Rect::new(0.0, 0.0, 50.0, 50.0));
        assert!(
            !window
                .process_mouse_down(Point::ZERO, Button::WheelUp, Modifiers::empty())
                .unwrap()
        );
        assert_eq!(zoom_view(&window, zoom).user_transform().scale, 1.0);
    }

    #[test]
    fn control_drag_pans() {
        let (mut window, _recorder, zoom, _content) =
            setup(ZoomOptions::default(), Rect::new(0.0, 0.0, 50.0, 50.0));
        let held = Modifiers::CONTROL_DOWN | Modifiers::LEFT_DOWN;
        window
            .process_mouse_down(Point::new(10.0, 10.0), Button::Left, held)
            .unwrap();
        window
            .process_mouse_move(Point::new(15.0, 8.0), held)
            .unwrap();
        assert_eq!(
            zoom_view(&window, zoom).user_transform().shift,
            Vec2::new(5.0, -2.0)
        );

        window
            .process_mouse_move(Point::new(16.0, 8.0), held | Modifiers::SHIFT_DOWN)
            .unwrap();
        assert_eq!(
            zoom_view(&window, zoom).user_transform().shift,
            Vec2::new(15.0, -2.0)
        );

        // Releasing the button ends the drag.
        window
            .process_mouse_move(Point::new(50.0, 50.0), Modifiers::CONTROL_DOWN)
            .unwrap();
        window
            .process_mouse_move(Point::new(60.0, 60.0), held)
            .unwrap();
        assert_eq!(
            zoom_view(&window, zoom).user_transform().shift,
            Vec2::new(15.0, -2.0)
        );
    }

    #[test]
    fn reset_and_typed_transforms() {
        let (mut window, _recorder, zoom, _content) =
            setup(ZoomOptions::default(), Rect::new(0.0, 0.0, 50.0, 50.0));
        let typed = ["3 (1, 2)", "3 [1, 2)"];
        let mut lines = typed.into_iter().map(String::from);
        let view = window.graph_mut().get_mut::<ZoomView>(zoom).unwrap();
        view.prompt = Some(Box::new(move || lines.next()));

        window.process_key_down(Key::T, Modifiers::SHIFT_DOWN).unwrap();
        let expected = ZoomTransform {
            scale: 3.0,
            shift: Vec2::new(1.0, 2.0),
        };
        assert_eq!(zoom_view(&window, zoom).user_transform(), expected);

        window.process_key_down(Key::T, Modifiers::SHIFT_DOWN).unwrap();
        assert_eq!(
            zoom_view(&window, zoom).user_transform(),
            expected,
            "a malformed transform keeps the previous one"
        );

        window.process_key_down(Key::R, Modifiers::empty()).unwrap();
        assert_eq!(zoom_view(&window, zoom).user_transform().scale, 1.0);
        assert_eq!(zoom_view(&window, zoom).user_transform().shift, Vec2::ZERO);
    }

    #[test]
    fn parse_errors_name_the_problem() {
        assert_eq!(
            "x (1, 2)".parse::<ZoomTransform>(),
            Err(ParseError::Number("x".into()))
        );
        assert_eq!(
            "2 (1 2)".parse::<ZoomTransform>(),
            Err(ParseError::Expected {
                expected: ',',
                found: Some('2')
            })
        );
        assert_eq!(
            "2 (1, 2".parse::<ZoomTransform>(),
            Err(ParseError::Expected {
                expected: ')',
                found: None
            })
        );
        assert_eq!(
            "2 (1, 2) more".parse::<ZoomTransform>(),
            Err(ParseError::Trailing("more".into()))
        );
        assert!(matches!(
            "-1 (0, 0)".parse::<ZoomTransform>(),
            Err(ParseError::Scale(_))
        ));
    }

    #[test]
    fn autoscale_fits_content_into_the_region() {
        let options = ZoomOptions::default().with_autoscale(true);
        let (window, _recorder, zoom, _content) =
            setup(options, Rect::new(10.0, 10.0, 60.0, 35.0));
        let view = zoom_view(&window, zoom);
        // 50x25 content into 200x100: scale 4 fills both axes.
        assert!((view.scale - 4.0).abs() < 1e-12);
        let mapped = view.transform() * Point::new(10.0, 10.0);
        assert!(mapped.distance(Point::ZERO) < 1e-9);

        let (near, z2d, far) = view.clip_planes();
        assert_eq!(near, 50.0);
        assert_eq!(far, 60.0);
        assert_eq!(z2d, 55.0);
    }

    #[test]
    fn autoscale_centers_the_short_axis() {
        let options = ZoomOptions::default().with_autoscale(true);
        let (window, _recorder, zoom, _content) =
            setup(options, Rect::new(0.0, 0.0, 10.0, 10.0));
        let view = zoom_view(&window, zoom);
        // Square content in a 200x100 window: height decides, x is centered.
        assert!((view.scale - 10.0).abs() < 1e-12);
        let mapped = view.transform() * Rect::new(0.0, 0.0, 10.0, 10.0);
        assert!(mapped.origin().distance(Point::new(50.0, 0.0)) < 1e-9);
        assert!((mapped.width() - 100.0).abs() < 1e-9);
        assert!((mapped.height() - 100.0).abs() < 1e-9);
    }

    #[test]
    fn draws_through_a_frustum() {
        let options = ZoomOptions::default().with_user_transform(2.0, Vec2::new(20.0, 0.0));
        let (mut window, recorder, _zoom, content) =
            setup(options, Rect::new(0.0, 0.0, 50.0, 50.0));
        window.redraw().unwrap();
        let commands = recorder.take_commands();
        let frustums = commands
            .iter()
            .filter(|c| matches!(c, Command::PushTransform(Transform::Frustum { .. })))
            .count();
        let pops = commands
            .iter()
            .filter(|c| matches!(c, Command::PopTransform))
            .count();
        assert_eq!(frustums, 2, "one per pass");
        assert_eq!(pops, 3, "both frustums and the window projection");
        assert_eq!(
            window.graph().get::<Content>(content).unwrap().roi,
            Some(Rect::new(-10.0, 0.0, 90.0, 50.0))
        );
    }

    #[test]
    fn unzoomed_positions_pass_through() {
        let (mut window, _recorder, _zoom, content) =
            setup(ZoomOptions::default(), Rect::new(0.0, 0.0, 50.0, 50.0));
        let mut down = MouseDown::new(Point::new(4.0, 4.0), Button::Left, Modifiers::empty());
        window.broadcast(&mut down).unwrap();
        assert_eq!(
            window.graph().get::<Content>(content).unwrap().seen,
            Some(Point::new(4.0, 4.0))
        );
    }
}
