// Copyright 2025 the Scopegraph Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Input and window signals.
//!
//! Categories nest by embedding:
//!
//! ```text
//! InputSignal
//! ├── PointerSignal
//! │   ├── PointerDown ── MouseDown, PenDown, FingerDown
//! │   ├── PointerMove ── MouseMove, PenMove, FingerMove
//! │   ├── PointerUp   ── MouseUp,   PenUp,   FingerUp
//! │   └── PenIn, PenOut, PenAway
//! └── KeySignal ── KeyDown, KeyUp
//! ```
//!
//! Every derived signal dereferences to its base, so `mouse_down.position`
//! and `mouse_down.processed` read through the chain.

use kurbo::{Point, Rect};
use scopegraph::signal;
use vek::Vec3;

use crate::input::{Button, Key, Modifiers};

/// Fields shared by all input events.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct InputSignal {
    /// Set by the first handler that acted on the event.
    pub processed: bool,
    /// Milliseconds since the window was created.
    pub timestamp: u64,
}

/// A ray through the scene, used to pick in perspective views.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Ray {
    /// Start of the ray.
    pub origin: Vec3<f64>,
    /// Unit direction.
    pub direction: Vec3<f64>,
}

impl Ray {
    /// Ray through the 2D point `p`, looking into the screen.
    pub fn orthographic(p: Point) -> Self {
        Self {
            origin: Vec3::new(p.x, p.y, 0.0),
            direction: Vec3::new(0.0, 0.0, 1.0),
        }
    }

    /// The point at parameter `t`.
    pub fn at(&self, t: f64) -> Vec3<f64> {
        self.origin + self.direction * t
    }
}

impl Default for Ray {
    fn default() -> Self {
        Self::orthographic(Point::ORIGIN)
    }
}

/// Fields shared by pointer events (mouse, pen, touch).
#[derive(Clone, Debug, Default, PartialEq)]
pub struct PointerSignal {
    /// Common input fields.
    pub input: InputSignal,
    /// Position in the receiving node's 2D coordinates.
    pub position: Point,
    /// Pick ray in the receiving node's 3D coordinates.
    pub ray: Ray,
    /// Button and key state.
    pub modifiers: Modifiers,
}

impl PointerSignal {
    /// A pointer event at `position` with an orthographic pick ray.
    pub fn at(position: Point, modifiers: Modifiers) -> Self {
        Self {
            input: InputSignal::default(),
            position,
            ray: Ray::orthographic(position),
            modifiers,
        }
    }
}

/// A pointer button was pressed (or the wheel turned).
#[derive(Clone, Debug, Default, PartialEq)]
pub struct PointerDown {
    /// Pointer fields.
    pub pointer: PointerSignal,
    /// The button.
    pub button: Button,
}

/// The pointer moved.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct PointerMove {
    /// Pointer fields.
    pub pointer: PointerSignal,
}

/// A pointer button was released.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct PointerUp {
    /// Pointer fields.
    pub pointer: PointerSignal,
    /// The button.
    pub button: Button,
}

/// Mouse button press.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct MouseDown {
    /// Generic press fields.
    pub down: PointerDown,
}

/// Mouse motion.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct MouseMove {
    /// Generic motion fields.
    pub moved: PointerMove,
}

/// Mouse button release.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct MouseUp {
    /// Generic release fields.
    pub up: PointerUp,
}

/// Pen touched the surface.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct PenDown {
    /// Generic press fields.
    pub down: PointerDown,
    /// Pressure in `0..=1`.
    pub pressure: f64,
}

/// Pen moved.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct PenMove {
    /// Generic motion fields.
    pub moved: PointerMove,
    /// Pressure in `0..=1`.
    pub pressure: f64,
}

/// Pen left the surface.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct PenUp {
    /// Generic release fields.
    pub up: PointerUp,
    /// Pressure in `0..=1`.
    pub pressure: f64,
}

/// Pen came into detection range over the window.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct PenIn {
    /// Pointer fields.
    pub pointer: PointerSignal,
}

/// Pen moved out of the window while in range.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct PenOut {
    /// Pointer fields.
    pub pointer: PointerSignal,
}

/// Pen left detection range.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct PenAway {
    /// Pointer fields.
    pub pointer: PointerSignal,
}

/// A finger touched the surface.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct FingerDown {
    /// Generic press fields.
    pub down: PointerDown,
    /// Platform finger id, stable while the finger stays down.
    pub id: u32,
}

/// A finger moved.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct FingerMove {
    /// Generic motion fields.
    pub moved: PointerMove,
    /// Platform finger id.
    pub id: u32,
}

/// A finger left the surface.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct FingerUp {
    /// Generic release fields.
    pub up: PointerUp,
    /// Platform finger id.
    pub id: u32,
}

/// Fields shared by keyboard events.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct KeySignal {
    /// Common input fields.
    pub input: InputSignal,
    /// The key.
    pub key: Key,
    /// Button and key state.
    pub modifiers: Modifiers,
}

/// A key was pressed.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct KeyDown {
    /// Keyboard fields.
    pub event: KeySignal,
}

/// A key was released.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct KeyUp {
    /// Keyboard fields.
    pub event: KeySignal,
}

signal!(InputSignal);
signal!(PointerSignal: InputSignal = input);
signal!(PointerDown: PointerSignal = pointer);
signal!(PointerMove: PointerSignal = pointer);
signal!(PointerUp: PointerSignal = pointer);
signal!(MouseDown: PointerDown = down);
signal!(MouseMove: PointerMove = moved);
signal!(MouseUp: PointerUp = up);
signal!(PenDown: PointerDown = down);
signal!(PenMove: PointerMove = moved);
signal!(PenUp: PointerUp = up);
signal!(PenIn: PointerSignal = pointer);
signal!(PenOut: PointerSignal = pointer);
signal!(PenAway: PointerSignal = pointer);
signal!(FingerDown: PointerDown = down);
signal!(FingerMove: PointerMove = moved);
signal!(FingerUp: PointerUp = up);
signal!(KeySignal: InputSignal = input);
signal!(KeyDown: KeySignal = event);
signal!(KeyUp: KeySignal = event);

impl PointerDown {
    /// Press of `button` at `position`.
    pub fn new(position: Point, button: Button, modifiers: Modifiers) -> Self {
        Self {
            pointer: PointerSignal::at(position, modifiers),
            button,
        }
    }
}

impl PointerMove {
    /// Motion to `position`.
    pub fn new(position: Point, modifiers: Modifiers) -> Self {
        Self {
            pointer: PointerSignal::at(position, modifiers),
        }
    }
}

impl PointerUp {
    /// Release of `button` at `position`.
    pub fn new(position: Point, button: Button, modifiers: Modifiers) -> Self {
        Self {
            pointer: PointerSignal::at(position, modifiers),
            button,
        }
    }
}

impl MouseDown {
    /// Mouse press of `button` at `position`.
    pub fn new(position: Point, button: Button, modifiers: Modifiers) -> Self {
        Self {
            down: PointerDown::new(position, button, modifiers),
        }
    }
}

impl MouseMove {
    /// Mouse motion to `position`.
    pub fn new(position: Point, modifiers: Modifiers) -> Self {
        Self {
            moved: PointerMove::new(position, modifiers),
        }
    }
}

impl MouseUp {
    /// Mouse release of `button` at `position`.
    pub fn new(position: Point, button: Button, modifiers: Modifiers) -> Self {
        Self {
            up: PointerUp::new(position, button, modifiers),
        }
    }
}

impl KeyDown {
    /// Press of `key`.
    pub fn new(key: Key, modifiers: Modifiers) -> Self {
        Self {
            event: KeySignal {
                key,
                modifiers,
                ..KeySignal::default()
            },
        }
    }
}

impl KeyUp {
    /// Release of `key`.
    pub fn new(key: Key, modifiers: Modifiers) -> Self {
        Self {
            event: KeySignal {
                key,
                modifiers,
                ..KeySignal::default()
            },
        }
    }
}

/// Content below the sender changed and needs to be redrawn.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct ContentChanged;

/// The extent of content below the sender changed.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct SizeChanged;

/// The region available to the receiver changed.
#[derive(Copy, Clone, Debug, Default, PartialEq)]
pub struct Resize {
    /// The new region, in the receiver's coordinates.
    pub region: Rect,
}

/// Ask views to render with a new opacity.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct ChangeAlpha {
    /// Opacity in `0..=1`.
    pub alpha: f64,
}

/// Ask the window to enter or leave fullscreen mode.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct WindowFullscreen {
    /// Whether fullscreen is requested.
    pub enable: bool,
}

/// Ask the window to minimize itself.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct WindowIconify;

signal!(ContentChanged);
signal!(SizeChanged);
signal!(Resize);
signal!(ChangeAlpha);
signal!(WindowFullscreen);
signal!(WindowIconify);

#[cfg(test)]
mod tests {
    use super::*;
    use scopegraph::{Signal, SignalKey};

    #[test]
    fn fields_read_through_the_category_chain() {
        let mut down = MouseDown::new(
            Point::new(3.0, 4.0),
            Button::Left,
            Modifiers::CONTROL_DOWN,
        );
        down.timestamp = 42;
        down.processed = true;

        assert_eq!(down.position, Point::new(3.0, 4.0));
        assert_eq!(down.button, Button::Left);
        assert_eq!(down.down.pointer.input.timestamp, 42);
        assert!(down.modifiers.control());
        assert_eq!(down.ray.origin, Vec3::new(3.0, 4.0, 0.0));
    }

    #[test]
    fn pen_and_mouse_share_pointer_categories() {
        let pen = PenDown::default();
        let mouse = MouseDown::default();
        let pen_keys = pen.lineage();
        let mouse_keys = mouse.lineage();
        assert_eq!(pen_keys[1..], mouse_keys[1..]);
        assert_eq!(pen_keys[1], SignalKey::of::<PointerDown>());
        assert_eq!(pen_keys.last(), Some(&SignalKey::of::<InputSignal>()));
    }

    #[test]
    fn rays_march_along_direction() {
        let ray = Ray::orthographic(Point::new(1.0, 2.0));
        assert_eq!(ray.at(5.0), Vec3::new(1.0, 2.0, 5.0));
    }
}
