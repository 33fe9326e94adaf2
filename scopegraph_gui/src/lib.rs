// Copyright 2025 the Scopegraph Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

// After you edit the crate's doc comment, run this command, then check README.md for any missing links
// cargo rdme --workspace-project=scopegraph_gui --heading-base-level=0

//! Scopegraph GUI: the signal vocabulary and window plumbing for scopegraph trees.
//!
//! This crate turns a [`scopegraph::Graph`] into a window's view tree:
//!
//! - [`signals`]: input events (mouse, pen, touch, keyboard) as a hierarchy of
//!   signal categories, plus the notifications views send upward
//!   ([`ContentChanged`], [`SizeChanged`], ...).
//! - [`DrawOpaque`] / [`DrawTranslucent`]: the two passes of a frame, sharing
//!   [`DrawBase`] so view transforms apply to both.
//! - [`QuerySize`]: a downward query that collects the union of content bounds.
//! - [`Backend`]: the seam to a graphics API. Views emit [`Command`]s through a
//!   [`Canvas`] and own GPU resources through dropping guards. [`Recorder`] is a
//!   headless backend for tests and demos.
//! - [`Window`]: owns the tree and the backend, normalizes raw input, and runs
//!   the two-pass redraw when something changed.
//!
//! ## Coordinates
//!
//! Window coordinates have the origin at the top left and one unit per pixel.
//! Views that transform their content (zooming, rotating) filter the draw and
//! pointer signals on their way down, so every handler sees positions in its
//! own coordinates.

mod backend;
mod color;
mod draw;
mod error;
pub mod input;
mod recorder;
pub mod signals;
mod window;

pub use backend::{
    Backend, BackendError, Canvas, Command, ContextSettings, DisplayList, ListId, Texture,
    TextureId, Transform,
};
pub use color::{hsv_to_rgb, label_color, label_rgb, unit_to_byte};
pub use draw::{DrawBase, DrawOpaque, DrawTranslucent, QuerySize, bounds_rect, rect_bounds};
pub use error::Error;
pub use input::{Button, Key, Modifiers};
pub use recorder::Recorder;
pub use signals::{
    ChangeAlpha, ContentChanged, InputSignal, KeyDown, KeySignal, KeyUp, MouseDown, MouseMove,
    MouseUp, PointerDown, PointerMove, PointerSignal, PointerUp, Ray, Resize, SizeChanged,
    WindowFullscreen, WindowIconify,
};
pub use window::{Window, WindowMode, WindowRoot};
