// Copyright 2025 the Scopegraph Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The window: root scope, input normalization, and the two-pass redraw.

use std::rc::Rc;
use std::time::Instant;

use kurbo::{Point, Rect, Vec2};
use scopegraph::{AcceptsInner, Capabilities, Context, Graph, Node, NodeId, NodeKind, Signal};
use tracing::{debug, error, trace};

use crate::Error;
use crate::backend::{Backend, Canvas, Command, ContextSettings, Transform};
use crate::draw::{DrawBase, DrawOpaque, DrawTranslucent, QuerySize};
use crate::input::{Button, Key, Modifiers};
use crate::signals::{
    ChangeAlpha, ContentChanged, FingerDown, FingerMove, FingerUp, InputSignal, KeyDown, KeyUp,
    MouseDown, MouseMove, MouseUp, PenAway, PenDown, PenIn, PenMove, PenOut, PenUp,
    PointerDown, PointerMove, PointerSignal, PointerUp, Resize, SizeChanged, WindowFullscreen,
    WindowIconify,
};

/// Size and style of a window.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct WindowMode {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
    /// Color depth in bits.
    pub depth: u8,
    /// Whether the window covers the screen.
    pub fullscreen: bool,
}

impl Default for WindowMode {
    fn default() -> Self {
        Self {
            width: 320,
            height: 240,
            depth: 32,
            fullscreen: false,
        }
    }
}

impl WindowMode {
    /// A windowed mode of the given size.
    pub fn with_size(mut self, width: u32, height: u32) -> Self {
        self.width = width;
        self.height = height;
        self
    }

    /// Start in fullscreen.
    pub fn with_fullscreen(mut self, fullscreen: bool) -> Self {
        self.fullscreen = fullscreen;
        self
    }

    fn region(&self) -> Rect {
        Rect::new(0.0, 0.0, f64::from(self.width), f64::from(self.height))
    }
}

/// Root scope of a window's tree.
///
/// Collects the notifications that affect the window itself and offers the
/// window-level signals to its subtree.
#[derive(Debug, Default)]
pub struct WindowRoot {
    dirty: bool,
    fullscreen: Option<bool>,
    iconify: bool,
}

impl AcceptsInner<ContentChanged> for WindowRoot {
    fn on_inner_signal(&mut self, _: &mut ContentChanged, _: &mut Context<'_>) {
        self.dirty = true;
    }
}

impl AcceptsInner<SizeChanged> for WindowRoot {
    fn on_inner_signal(&mut self, _: &mut SizeChanged, _: &mut Context<'_>) {
        self.dirty = true;
    }
}

impl AcceptsInner<WindowFullscreen> for WindowRoot {
    fn on_inner_signal(&mut self, signal: &mut WindowFullscreen, _: &mut Context<'_>) {
        self.fullscreen = Some(signal.enable);
        self.dirty = true;
    }
}

impl AcceptsInner<WindowIconify> for WindowRoot {
    fn on_inner_signal(&mut self, _: &mut WindowIconify, _: &mut Context<'_>) {
        self.iconify = true;
    }
}

impl Node for WindowRoot {
    const KIND: NodeKind = NodeKind::Scope;

    fn declare(caps: &mut Capabilities<Self>) {
        caps.accepts_inner::<ContentChanged>()
            .accepts_inner::<SizeChanged>()
            .accepts_inner::<WindowFullscreen>()
            .accepts_inner::<WindowIconify>()
            .provides_inner::<InputSignal>()
            .provides_inner::<DrawBase>()
            .provides_inner::<QuerySize>()
            .provides_inner::<Resize>()
            .provides_inner::<ChangeAlpha>();
    }
}

/// A window: a signal tree rooted at a [`WindowRoot`], a rendering backend,
/// and the translation of raw platform input into signals.
///
/// Platform glue owns the event loop and calls the `process_*` methods; each
/// returns whether some view marked the event as processed.
///
/// ```
/// use std::rc::Rc;
/// use scopegraph_gui::{ContextSettings, Recorder, Window, WindowMode};
///
/// let recorder = Rc::new(Recorder::new());
/// let mut window =
///     Window::new(WindowMode::default(), &ContextSettings::default(), recorder.clone()).unwrap();
/// assert!(window.is_dirty());
/// assert!(window.redraw().unwrap());
/// assert!(!window.redraw().unwrap(), "nothing changed since the last frame");
/// ```
pub struct Window {
    graph: Graph,
    root: NodeId,
    canvas: Canvas,
    mode: WindowMode,
    region: Rect,
    started: Instant,
}

impl core::fmt::Debug for Window {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Window")
            .field("root", &self.root)
            .field("mode", &self.mode)
            .field("region", &self.region)
            .field("nodes", &self.graph.len())
            .finish_non_exhaustive()
    }
}

impl Window {
    /// Activate `backend` with `settings` and create an empty window.
    ///
    /// Fails, leaving nothing behind, if the context cannot be activated.
    pub fn new(
        mode: WindowMode,
        settings: &ContextSettings,
        backend: Rc<dyn Backend>,
    ) -> Result<Self, Error> {
        if let Err(err) = backend.activate(settings) {
            error!(%err, ?settings, "could not activate rendering context");
            return Err(err.into());
        }
        let mut graph = Graph::new();
        let root = graph.insert(
            None,
            WindowRoot {
                dirty: true,
                ..WindowRoot::default()
            },
        )?;
        debug!(?mode, "window created");
        Ok(Self {
            graph,
            root,
            canvas: Canvas::new(backend),
            mode,
            region: mode.region(),
            started: Instant::now(),
        })
    }

    /// The root scope.
    pub fn root(&self) -> NodeId {
        self.root
    }

    /// The signal tree.
    pub fn graph(&self) -> &Graph {
        &self.graph
    }

    /// The signal tree, for building and editing it.
    pub fn graph_mut(&mut self) -> &mut Graph {
        &mut self.graph
    }

    /// The canvas views draw on.
    pub fn canvas(&self) -> &Canvas {
        &self.canvas
    }

    /// The current mode.
    pub fn mode(&self) -> WindowMode {
        self.mode
    }

    /// The visible region in window coordinates.
    pub fn region(&self) -> Rect {
        self.region
    }

    /// Insert `node` directly below the root, then tell it the window size.
    pub fn add<N: Node>(&mut self, node: N) -> Result<NodeId, Error> {
        let id = self.graph.insert(Some(self.root), node)?;
        self.graph.send_down(
            id,
            &mut Resize {
                region: self.region,
            },
        )?;
        self.set_dirty();
        Ok(id)
    }

    /// Check that every signal provided in the tree can be handled.
    pub fn validate(&self) -> Result<(), Error> {
        Ok(self.graph.validate()?)
    }

    /// Whether the next [`Window::redraw`] will draw.
    pub fn is_dirty(&self) -> bool {
        self.root_state().is_some_and(|root| root.dirty)
    }

    /// Force a redraw on the next frame.
    pub fn set_dirty(&mut self) {
        if let Some(root) = self.graph.get_mut::<WindowRoot>(self.root) {
            root.dirty = true;
        }
    }

    /// A pending fullscreen request from the tree, if any.
    pub fn take_fullscreen_request(&mut self) -> Option<bool> {
        let requested = self
            .graph
            .get_mut::<WindowRoot>(self.root)
            .and_then(|root| root.fullscreen.take());
        if let Some(enable) = requested {
            self.mode.fullscreen = enable;
        }
        requested
    }

    /// Whether the tree asked to minimize the window since the last call.
    pub fn take_iconify_request(&mut self) -> bool {
        self.graph
            .get_mut::<WindowRoot>(self.root)
            .is_some_and(|root| core::mem::take(&mut root.iconify))
    }

    /// Deliver `signal` to the whole tree.
    pub fn broadcast<S: Signal>(&mut self, signal: &mut S) -> Result<(), Error> {
        Ok(self.graph.send_down(self.root, signal)?)
    }

    /// Query the bounds of everything in the window.
    pub fn content_size(&mut self) -> Result<QuerySize, Error> {
        let mut query = QuerySize::new();
        self.broadcast(&mut query)?;
        Ok(query)
    }

    /// Ask every view to render with opacity `alpha`.
    pub fn set_alpha(&mut self, alpha: f64) -> Result<(), Error> {
        self.broadcast(&mut ChangeAlpha { alpha })
    }

    /// The window was resized to `width` x `height` pixels.
    ///
    /// Returns `false`, without sending anything, if the size did not change.
    pub fn process_resize(&mut self, width: u32, height: u32) -> Result<bool, Error> {
        if width == self.mode.width && height == self.mode.height {
            return Ok(false);
        }
        self.mode.width = width;
        self.mode.height = height;
        self.region = self.mode.region();
        debug!(width, height, "window resized");
        self.broadcast(&mut Resize {
            region: self.region,
        })?;
        self.set_dirty();
        Ok(true)
    }

    fn timestamp(&self) -> u64 {
        u64::try_from(self.started.elapsed().as_millis()).unwrap_or(u64::MAX)
    }

    fn pointer(&self, position: Point, modifiers: Modifiers) -> PointerSignal {
        let mut pointer = PointerSignal::at(position, modifiers);
        pointer.input.timestamp = self.timestamp();
        pointer
    }

    /// A mouse button was pressed or the wheel turned.
    pub fn process_mouse_down(
        &mut self,
        position: Point,
        button: Button,
        modifiers: Modifiers,
    ) -> Result<bool, Error> {
        let mut down = MouseDown {
            down: PointerDown {
                pointer: self.pointer(position, modifiers),
                button,
            },
        };
        self.broadcast(&mut down)?;
        Ok(down.processed)
    }

    /// The mouse moved.
    pub fn process_mouse_move(
        &mut self,
        position: Point,
        modifiers: Modifiers,
    ) -> Result<bool, Error> {
        let mut moved = MouseMove {
            moved: PointerMove {
                pointer: self.pointer(position, modifiers),
            },
        };
        self.broadcast(&mut moved)?;
        Ok(moved.processed)
    }

    /// A mouse button was released.
    pub fn process_mouse_up(
        &mut self,
        position: Point,
        button: Button,
        modifiers: Modifiers,
    ) -> Result<bool, Error> {
        let mut up = MouseUp {
            up: PointerUp {
                pointer: self.pointer(position, modifiers),
                button,
            },
        };
        self.broadcast(&mut up)?;
        Ok(up.processed)
    }

    /// The pen touched the surface.
    pub fn process_pen_down(
        &mut self,
        position: Point,
        pressure: f64,
        modifiers: Modifiers,
    ) -> Result<bool, Error> {
        let mut down = PenDown {
            down: PointerDown {
                pointer: self.pointer(position, modifiers),
                button: Button::Left,
            },
            pressure,
        };
        self.broadcast(&mut down)?;
        Ok(down.processed)
    }

    /// The pen moved.
    pub fn process_pen_move(
        &mut self,
        position: Point,
        pressure: f64,
        modifiers: Modifiers,
    ) -> Result<bool, Error> {
        let mut moved = PenMove {
            moved: PointerMove {
                pointer: self.pointer(position, modifiers),
            },
            pressure,
        };
        self.broadcast(&mut moved)?;
        Ok(moved.processed)
    }

    /// The pen left the surface.
    pub fn process_pen_up(
        &mut self,
        position: Point,
        pressure: f64,
        modifiers: Modifiers,
    ) -> Result<bool, Error> {
        let mut up = PenUp {
            up: PointerUp {
                pointer: self.pointer(position, modifiers),
                button: Button::Left,
            },
            pressure,
        };
        self.broadcast(&mut up)?;
        Ok(up.processed)
    }

    /// The pen came into range.
    pub fn process_pen_in(&mut self, position: Point) -> Result<bool, Error> {
        let pointer = self.pointer(position, Modifiers::empty());
        let mut in_range = PenIn { pointer };
        self.broadcast(&mut in_range)?;
        Ok(in_range.processed)
    }

    /// The pen left the window while in range.
    pub fn process_pen_out(&mut self, position: Point) -> Result<bool, Error> {
        let pointer = self.pointer(position, Modifiers::empty());
        let mut out = PenOut { pointer };
        self.broadcast(&mut out)?;
        Ok(out.processed)
    }

    /// The pen left detection range.
    pub fn process_pen_away(&mut self, position: Point) -> Result<bool, Error> {
        let pointer = self.pointer(position, Modifiers::empty());
        let mut away = PenAway { pointer };
        self.broadcast(&mut away)?;
        Ok(away.processed)
    }

    /// Finger `id` touched the surface.
    pub fn process_finger_down(
        &mut self,
        id: u32,
        position: Point,
        modifiers: Modifiers,
    ) -> Result<bool, Error> {
        let mut down = FingerDown {
            down: PointerDown {
                pointer: self.pointer(position, modifiers),
                button: Button::Left,
            },
            id,
        };
        self.broadcast(&mut down)?;
        Ok(down.processed)
    }

    /// Finger `id` moved.
    pub fn process_finger_move(
        &mut self,
        id: u32,
        position: Point,
        modifiers: Modifiers,
    ) -> Result<bool, Error> {
        let mut moved = FingerMove {
            moved: PointerMove {
                pointer: self.pointer(position, modifiers),
            },
            id,
        };
        self.broadcast(&mut moved)?;
        Ok(moved.processed)
    }

    /// Finger `id` left the surface.
    pub fn process_finger_up(
        &mut self,
        id: u32,
        position: Point,
        modifiers: Modifiers,
    ) -> Result<bool, Error> {
        let mut up = FingerUp {
            up: PointerUp {
                pointer: self.pointer(position, modifiers),
                button: Button::Left,
            },
            id,
        };
        self.broadcast(&mut up)?;
        Ok(up.processed)
    }

    /// A key was pressed.
    pub fn process_key_down(&mut self, key: Key, modifiers: Modifiers) -> Result<bool, Error> {
        let mut down = KeyDown::new(key, modifiers);
        down.event.input.timestamp = self.timestamp();
        self.broadcast(&mut down)?;
        Ok(down.processed)
    }

    /// A key was released.
    pub fn process_key_up(&mut self, key: Key, modifiers: Modifiers) -> Result<bool, Error> {
        let mut up = KeyUp::new(key, modifiers);
        up.event.input.timestamp = self.timestamp();
        self.broadcast(&mut up)?;
        Ok(up.processed)
    }

    /// Draw a frame if anything changed.
    ///
    /// Clears, draws the opaque pass with depth writes, then the translucent
    /// pass with blending. Returns whether a frame was drawn. If a view set
    /// `needs_redraw`, the window stays dirty for the next frame.
    pub fn redraw(&mut self) -> Result<bool, Error> {
        if !self.is_dirty() {
            return Ok(false);
        }
        if let Some(root) = self.graph.get_mut::<WindowRoot>(self.root) {
            root.dirty = false;
        }

        let resolution = Vec2::new(1.0, 1.0);
        self.canvas.submit(Command::Clear);
        self.canvas.push(Transform::Ortho {
            region: self.region,
        });

        self.canvas.submit(Command::Blend(false));
        self.canvas.submit(Command::DepthWrite(true));
        let mut opaque = DrawOpaque::new(self.region, resolution, self.canvas.clone());
        self.graph.send_down(self.root, &mut opaque)?;

        self.canvas.submit(Command::Blend(true));
        self.canvas.submit(Command::DepthWrite(false));
        let mut translucent = DrawTranslucent::new(self.region, resolution, self.canvas.clone());
        self.graph.send_down(self.root, &mut translucent)?;

        self.canvas.submit(Command::DepthWrite(true));
        self.canvas.pop();

        if opaque.base.needs_redraw || translucent.base.needs_redraw {
            trace!("a view requested another frame");
            self.set_dirty();
        }
        Ok(true)
    }

    fn root_state(&self) -> Option<&WindowRoot> {
        self.graph.get::<WindowRoot>(self.root)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::BackendError;
    use crate::recorder::Recorder;
    use scopegraph::{Accepts, Delivery};

    #[derive(Debug, Default)]
    struct Spy {
        draws: u32,
        animate: bool,
        region: Option<Rect>,
    }

    impl Accepts<DrawBase> for Spy {
        fn on_signal(&mut self, draw: &mut DrawBase, _: &mut Context<'_>) {
            self.draws += 1;
            if self.animate {
                draw.request_redraw();
            }
        }
    }

    impl Accepts<MouseDown> for Spy {
        fn on_signal(&mut self, down: &mut MouseDown, _: &mut Context<'_>) {
            down.processed = down.button == Button::Left;
        }
    }

    impl Accepts<Resize> for Spy {
        fn on_signal(&mut self, resize: &mut Resize, _: &mut Context<'_>) {
            self.region = Some(resize.region);
        }
    }

    impl Accepts<QuerySize> for Spy {
        fn on_signal(&mut self, query: &mut QuerySize, _: &mut Context<'_>) {
            query.fit(Rect::new(1.0, 2.0, 3.0, 4.0));
        }
    }

    impl Node for Spy {
        fn declare(caps: &mut Capabilities<Self>) {
            caps.accepts::<DrawBase>()
                .accepts::<MouseDown>()
                .accepts::<Resize>()
                .accepts::<QuerySize>()
                .provides::<ContentChanged>()
                .provides::<WindowFullscreen>();
        }
    }

    fn window() -> (Window, Rc<Recorder>, NodeId) {
        let recorder = Rc::new(Recorder::new());
        let mut window = Window::new(
            WindowMode::default(),
            &ContextSettings::default(),
            recorder.clone(),
        )
        .unwrap();
        let spy = window.add(Spy::default()).unwrap();
        (window, recorder, spy)
    }

    #[test]
    fn failed_activation_aborts_construction() {
        let recorder = Rc::new(Recorder::new().with_max_version(2, 1));
        let err = Window::new(
            WindowMode::default(),
            &ContextSettings::default(),
            recorder,
        )
        .unwrap_err();
        assert!(matches!(
            err,
            Error::Backend(BackendError::UnsupportedVersion { .. })
        ));
    }

    #[test]
    fn redraw_runs_opaque_then_translucent() {
        let (mut window, recorder, spy) = window();
        window.validate().unwrap();
        assert!(window.redraw().unwrap());
        assert_eq!(
            recorder.take_commands(),
            vec![
                Command::Clear,
                Command::PushTransform(Transform::Ortho {
                    region: Rect::new(0.0, 0.0, 320.0, 240.0)
                }),
                Command::Blend(false),
                Command::DepthWrite(true),
                Command::Blend(true),
                Command::DepthWrite(false),
                Command::DepthWrite(true),
                Command::PopTransform,
            ]
        );
        assert_eq!(window.graph().get::<Spy>(spy).unwrap().draws, 2);
        assert!(!window.redraw().unwrap());
        assert!(recorder.take_commands().is_empty());
    }

    #[test]
    fn needs_redraw_keeps_the_window_dirty() {
        let (mut window, _recorder, spy) = window();
        window.graph_mut().get_mut::<Spy>(spy).unwrap().animate = true;
        assert!(window.redraw().unwrap());
        assert!(window.is_dirty());
        window.graph_mut().get_mut::<Spy>(spy).unwrap().animate = false;
        assert!(window.redraw().unwrap());
        assert!(!window.is_dirty());
    }

    #[test]
    fn content_changes_mark_the_window_dirty() {
        let (mut window, _recorder, spy) = window();
        window.redraw().unwrap();
        let delivery = window
            .graph_mut()
            .send(spy, &mut ContentChanged)
            .unwrap();
        assert_eq!(delivery, Delivery::Absorbed(window.root()));
        assert!(window.is_dirty());
    }

    #[test]
    fn input_reports_whether_it_was_processed() {
        let (mut window, _recorder, _spy) = window();
        let p = Point::new(5.0, 5.0);
        assert!(
            window
                .process_mouse_down(p, Button::Left, Modifiers::LEFT_DOWN)
                .unwrap()
        );
        assert!(
            !window
                .process_mouse_down(p, Button::Right, Modifiers::RIGHT_DOWN)
                .unwrap()
        );
        assert!(!window.process_key_down(Key::R, Modifiers::empty()).unwrap());
        assert!(!window.process_pen_in(p).unwrap());
    }

    #[test]
    fn resize_only_reports_changes() {
        let (mut window, _recorder, spy) = window();
        assert_eq!(
            window.graph().get::<Spy>(spy).unwrap().region,
            Some(Rect::new(0.0, 0.0, 320.0, 240.0)),
            "added nodes learn the current size"
        );
        assert!(!window.process_resize(320, 240).unwrap());
        assert!(window.process_resize(640, 480).unwrap());
        assert_eq!(
            window.graph().get::<Spy>(spy).unwrap().region,
            Some(Rect::new(0.0, 0.0, 640.0, 480.0))
        );
        assert_eq!(window.mode().width, 640);
    }

    #[test]
    fn content_size_collects_views() {
        let (mut window, _recorder, _spy) = window();
        let size = window.content_size().unwrap();
        assert_eq!(size.rect(), Some(Rect::new(1.0, 2.0, 3.0, 4.0)));
    }

    #[derive(Debug)]
    struct Patch(Rect);

    impl Accepts<QuerySize> for Patch {
        fn on_signal(&mut self, query: &mut QuerySize, _: &mut Context<'_>) {
            query.fit(self.0);
        }
    }

    impl Node for Patch {
        fn declare(caps: &mut Capabilities<Self>) {
            caps.accepts::<QuerySize>();
        }
    }

    #[test]
    fn content_size_is_the_union_in_any_insertion_order() {
        let patches = [
            Rect::new(0.0, 0.0, 10.0, 10.0),
            Rect::new(5.0, 5.0, 20.0, 20.0),
            Rect::new(100.0, 100.0, 110.0, 110.0),
        ];
        for order in [[0, 1, 2], [2, 0, 1]] {
            let mut window = Window::new(
                WindowMode::default(),
                &ContextSettings::default(),
                Rc::new(Recorder::new()),
            )
            .unwrap();
            for i in order {
                window.add(Patch(patches[i])).unwrap();
            }
            let size = window.content_size().unwrap();
            assert_eq!(size.rect(), Some(Rect::new(0.0, 0.0, 110.0, 110.0)), "{order:?}");
        }
    }

    #[test]
    fn fullscreen_requests_are_taken_once() {
        let (mut window, _recorder, spy) = window();
        window
            .graph_mut()
            .send(spy, &mut WindowFullscreen { enable: true })
            .unwrap();
        assert_eq!(window.take_fullscreen_request(), Some(true));
        assert!(window.mode().fullscreen);
        assert_eq!(window.take_fullscreen_request(), None);
        assert!(!window.take_iconify_request());
    }
}
