// Copyright 2025 the Scopegraph Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

// After you edit the crate's doc comment, run this command, then check README.md for any missing links
// cargo rdme --workspace-project=scopegraph_views --heading-base-level=0

//! Scopegraph Views: reusable views for scopegraph window trees.
//!
//! Scopes transform what is below them:
//!
//! - [`ZoomView`]: wheel zoom and drag panning with an optional fit of the
//!   content into the window. Content is drawn through a perspective frustum.
//! - [`RotateView`]: trackball rotation of 3D content by dragging.
//! - [`VolumeView`]: shows one slice of an [`ExplicitVolume`] through a child
//!   [`ImageView`] and steps through slices with the wheel.
//!
//! Agents draw content:
//!
//! - [`ImageView`]: an intensity or label [`Image`] as a texture.
//! - [`MeshView`]: labelled [`Mesh`]es, either given directly or extracted in
//!   the background by an [`ExtractionPool`].
//!
//! ## Background extraction
//!
//! An [`ExtractionPool`] runs a [`MeshExtractor`] on a bounded set of worker
//! threads. Dispatch never blocks on it: a [`MeshView`] picks up finished
//! meshes on its next draw, reports them as changed content, and keeps
//! requesting redraws while work is pending. A [`ZoomView`] that hears about
//! the change mid-frame measures its content again on the next pass.
//!
//! ```
//! use std::sync::Arc;
//! use scopegraph_views::{ExplicitVolume, ExtractionOptions, ExtractionPool, VolumeExtractor};
//!
//! let volume = ExplicitVolume::new(2, 1, 1, vec![3.0, 0.0]).unwrap();
//! let pool = ExtractionPool::new(
//!     ExtractionOptions::default().with_workers(1),
//!     VolumeExtractor::new(Arc::new(volume)),
//! )
//! .unwrap();
//! pool.submit(3);
//! pool.drain();
//! assert_eq!(pool.mesh(3).map(|m| m.num_triangles()), Some(12));
//! ```

mod error;
mod extract;
mod image;
mod mesh;
mod mesh_view;
mod rotate;
mod volume;
mod zoom;

pub use error::{ParseError, ViewError};
pub use extract::{ExtractionOptions, ExtractionPool, HidePolicy, MeshCache, MeshExtractor};
pub use image::{Image, ImageView, SetImage};
pub use mesh::{Mesh, Meshes};
pub use mesh_view::{HideSegment, MeshView, SegmentSignal, SetMeshes, ShowSegment};
pub use rotate::RotateView;
pub use volume::{ExplicitVolume, SetVolume, VolumeExtractor, VolumePointSelected, VolumeView};
pub use zoom::{Prompt, ZoomOptions, ZoomTransform, ZoomView};

use scopegraph::Context;
use scopegraph_gui::ContentChanged;

/// Tell the ancestors that this node's content changed.
pub(crate) fn notify_changed(cx: &mut Context<'_>) {
    if let Err(err) = cx.send(&mut ContentChanged) {
        tracing::warn!(%err, "could not report changed content");
    }
}
