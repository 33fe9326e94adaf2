// Copyright 2025 the Scopegraph Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Rendering backend seam.
//!
//! Views never talk to a graphics API directly. They describe what to draw as
//! [`Command`]s and hand them to a [`Canvas`], a cheap shared handle to the
//! [`Backend`] that owns the current context. GPU-side resources come back as
//! guards ([`Texture`], [`DisplayList`]) that release their handle when
//! dropped, so a view that goes away cannot leak them.

use std::fmt;
use std::rc::Rc;

use kurbo::Rect;
use vek::{Quaternion, Vec3};

/// Handle of a texture owned by a backend.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct TextureId(pub u32);

/// Handle of a compiled command list owned by a backend.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct ListId(pub u32);

/// A coordinate transform pushed onto the backend's matrix stack.
#[derive(Copy, Clone, Debug, PartialEq)]
pub enum Transform {
    /// Orthographic projection mapping `region` onto the viewport.
    Ortho {
        /// Visible region, in the pushing node's coordinates.
        region: Rect,
    },
    /// Perspective projection looking at `roi` from distance `z2d`.
    Frustum {
        /// Region that appears at the z = 0 plane.
        roi: Rect,
        /// Near clipping distance.
        near: f64,
        /// Far clipping distance.
        far: f64,
        /// Distance of the eye from the z = 0 plane.
        z2d: f64,
    },
    /// Rotation of everything drawn afterward about `center`.
    Rotate {
        /// Fixed point of the rotation.
        center: Vec3<f64>,
        /// The rotation.
        rotation: Quaternion<f64>,
    },
}

/// One drawing instruction.
#[derive(Clone, Debug, PartialEq)]
pub enum Command {
    /// Clear color and depth buffers.
    Clear,
    /// Enable or disable alpha blending.
    Blend(bool),
    /// Enable or disable depth buffer writes.
    DepthWrite(bool),
    /// Push a transform.
    PushTransform(Transform),
    /// Pop the most recent transform.
    PopTransform,
    /// Set the current RGBA color.
    Color([f32; 4]),
    /// Line segments, two points each.
    Lines(Vec<Vec3<f64>>),
    /// A flat quad with corners in winding order.
    Quad([Vec3<f64>; 4]),
    /// A quad in the z = 0 plane showing a whole texture.
    TexturedQuad {
        /// The texture.
        texture: TextureId,
        /// Where it goes.
        rect: Rect,
    },
    /// Triangles, three positions each, with per-vertex normals.
    Triangles {
        /// Vertex positions.
        positions: Vec<Vec3<f32>>,
        /// Vertex normals, parallel to `positions`.
        normals: Vec<Vec3<f32>>,
    },
    /// Replay a compiled list.
    CallList(ListId),
}

/// Failures reported by a [`Backend`].
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum BackendError {
    /// The backend cannot provide the requested API version.
    #[error("context version {requested:?} requested, at most {available:?} is available")]
    UnsupportedVersion {
        /// Requested `(major, minor)`.
        requested: (u8, u8),
        /// Highest supported `(major, minor)`.
        available: (u8, u8),
    },
    /// No context was activated before resources were requested.
    #[error("no active context")]
    NoContext,
    /// A resource could not be allocated.
    #[error("could not allocate {0}")]
    OutOfResources(&'static str),
    /// Pixel data does not match the texture dimensions.
    #[error("texture data of {len} bytes does not match {width}x{height} RGBA")]
    TextureSize {
        /// Texture width.
        width: u32,
        /// Texture height.
        height: u32,
        /// Supplied byte count.
        len: usize,
    },
}

/// Requested properties of the rendering context.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct ContextSettings {
    /// Depth buffer bits.
    pub depth_bits: u8,
    /// Stencil buffer bits.
    pub stencil_bits: u8,
    /// Multisampling level, 0 to disable.
    pub antialiasing: u8,
    /// Major API version.
    pub major_version: u8,
    /// Minor API version.
    pub minor_version: u8,
    /// Synchronize buffer swaps with the display refresh.
    pub vsync: bool,
}

impl Default for ContextSettings {
    fn default() -> Self {
        Self {
            depth_bits: 0,
            stencil_bits: 0,
            antialiasing: 0,
            major_version: 2,
            minor_version: 9,
            vsync: true,
        }
    }
}

impl ContextSettings {
    /// Request a depth buffer with `bits` bits.
    pub fn with_depth_bits(mut self, bits: u8) -> Self {
        self.depth_bits = bits;
        self
    }

    /// Request a stencil buffer with `bits` bits.
    pub fn with_stencil_bits(mut self, bits: u8) -> Self {
        self.stencil_bits = bits;
        self
    }

    /// Request multisampling.
    pub fn with_antialiasing(mut self, level: u8) -> Self {
        self.antialiasing = level;
        self
    }

    /// Request an API version.
    pub fn with_version(mut self, major: u8, minor: u8) -> Self {
        self.major_version = major;
        self.minor_version = minor;
        self
    }

    /// Enable or disable vsync.
    pub fn with_vsync(mut self, vsync: bool) -> Self {
        self.vsync = vsync;
        self
    }
}

/// A rendering context.
///
/// Methods take `&self`: a backend is shared by every view of a window
/// through [`Canvas`], and implementations use interior mutability.
pub trait Backend {
    /// Make the context current with `settings`.
    ///
    /// Called once, before anything else. An error aborts window creation.
    fn activate(&self, settings: &ContextSettings) -> Result<(), BackendError>;

    /// Allocate an empty texture.
    fn create_texture(&self) -> Result<TextureId, BackendError>;

    /// Replace the pixels of `texture` with tightly packed RGBA rows.
    fn upload_texture(
        &self,
        texture: TextureId,
        width: u32,
        height: u32,
        rgba: &[u8],
    ) -> Result<(), BackendError>;

    /// Release a texture. Unknown handles are ignored.
    fn release_texture(&self, texture: TextureId);

    /// Compile `commands` into a list that can be replayed with [`Command::CallList`].
    fn compile_list(&self, commands: Vec<Command>) -> Result<ListId, BackendError>;

    /// Release a compiled list. Unknown handles are ignored.
    fn release_list(&self, list: ListId);

    /// Execute one command immediately.
    fn submit(&self, command: Command);
}

/// Shared handle to the window's backend, carried by draw signals.
#[derive(Clone)]
pub struct Canvas {
    backend: Rc<dyn Backend>,
}

impl fmt::Debug for Canvas {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Canvas").finish_non_exhaustive()
    }
}

impl Canvas {
    /// Wrap a backend.
    pub fn new(backend: Rc<dyn Backend>) -> Self {
        Self { backend }
    }

    /// The wrapped backend.
    pub fn backend(&self) -> &Rc<dyn Backend> {
        &self.backend
    }

    /// Execute one command immediately.
    pub fn submit(&self, command: Command) {
        self.backend.submit(command);
    }

    /// Push `transform`.
    pub fn push(&self, transform: Transform) {
        self.submit(Command::PushTransform(transform));
    }

    /// Pop the most recent transform.
    pub fn pop(&self) {
        self.submit(Command::PopTransform);
    }

    /// Allocate a texture owned by the returned guard.
    pub fn create_texture(&self) -> Result<Texture, BackendError> {
        let id = self.backend.create_texture()?;
        Ok(Texture {
            id,
            backend: Rc::clone(&self.backend),
        })
    }

    /// Compile `commands` into a list owned by the returned guard.
    pub fn compile(&self, commands: Vec<Command>) -> Result<DisplayList, BackendError> {
        let id = self.backend.compile_list(commands)?;
        Ok(DisplayList {
            id,
            backend: Rc::clone(&self.backend),
        })
    }
}

/// A texture that is released when the guard is dropped.
pub struct Texture {
    id: TextureId,
    backend: Rc<dyn Backend>,
}

impl fmt::Debug for Texture {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Texture")
            .field("id", &self.id)
            .finish_non_exhaustive()
    }
}

impl Texture {
    /// The backend handle.
    pub fn id(&self) -> TextureId {
        self.id
    }

    /// Replace the pixels with tightly packed RGBA rows.
    pub fn upload(&self, width: u32, height: u32, rgba: &[u8]) -> Result<(), BackendError> {
        self.backend.upload_texture(self.id, width, height, rgba)
    }
}

impl Drop for Texture {
    fn drop(&mut self) {
        self.backend.release_texture(self.id);
    }
}

/// A compiled command list that is released when the guard is dropped.
pub struct DisplayList {
    id: ListId,
    backend: Rc<dyn Backend>,
}

impl fmt::Debug for DisplayList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DisplayList")
            .field("id", &self.id)
            .finish_non_exhaustive()
    }
}

impl DisplayList {
    /// The backend handle.
    pub fn id(&self) -> ListId {
        self.id
    }

    /// Replay the list on its backend.
    pub fn call(&self) {
        self.backend.submit(Command::CallList(self.id));
    }
}

impl Drop for DisplayList {
    fn drop(&mut self) {
        self.backend.release_list(self.id);
    }
}
