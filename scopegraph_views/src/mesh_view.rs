// Copyright 2025 the Scopegraph Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! A view of labelled meshes, optionally backed by background extraction.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use scopegraph::{Accepts, Capabilities, Context, Node, signal};
use scopegraph_gui::{
    BackendError, ChangeAlpha, Command, ContentChanged, DisplayList, DrawBase, DrawOpaque,
    DrawTranslucent, QuerySize, label_rgb,
};
use tracing::{debug, error, warn};
use vek::Aabb;

use crate::extract::ExtractionPool;
use crate::mesh::{Mesh, Meshes};
use crate::notify_changed;

/// Replace the explicit meshes of a [`MeshView`].
#[derive(Clone, Debug, Default)]
pub struct SetMeshes {
    /// The new meshes. Taken by the receiving view.
    pub meshes: Meshes,
}

/// Category of signals naming one segment.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct SegmentSignal {
    /// Segment (label) id.
    pub id: u64,
}

/// Show a segment, extracting its mesh in the background.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct ShowSegment {
    /// The segment.
    pub segment: SegmentSignal,
}

/// Stop showing a segment.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct HideSegment {
    /// The segment.
    pub segment: SegmentSignal,
}

signal!(SetMeshes);
signal!(SegmentSignal);
signal!(ShowSegment: SegmentSignal = segment);
signal!(HideSegment: SegmentSignal = segment);

impl ShowSegment {
    /// Show segment `id`.
    pub fn new(id: u64) -> Self {
        Self {
            segment: SegmentSignal { id },
        }
    }
}

impl HideSegment {
    /// Hide segment `id`.
    pub fn new(id: u64) -> Self {
        Self {
            segment: SegmentSignal { id },
        }
    }
}

/// Draws meshes colored by label.
///
/// Meshes come from two sources: an explicit collection set with
/// [`SetMeshes`], and segments shown with [`ShowSegment`], whose meshes are
/// extracted by the view's [`ExtractionPool`]. The meshes are recorded into a
/// display list that is recompiled only when something changed.
///
/// With alpha 1 the view draws in the opaque pass, with alpha in `(0, 1)` in
/// the translucent pass, and with alpha 0 not at all.
#[derive(Debug)]
pub struct MeshView {
    meshes: Meshes,
    pool: Option<ExtractionPool>,
    visible: BTreeSet<u64>,
    alpha: f64,
    list: Option<DisplayList>,
    dirty: bool,
}

impl Default for MeshView {
    fn default() -> Self {
        Self::new()
    }
}

impl MeshView {
    /// An empty, opaque view without background extraction.
    pub fn new() -> Self {
        Self {
            meshes: Meshes::new(),
            pool: None,
            visible: BTreeSet::new(),
            alpha: 1.0,
            list: None,
            dirty: true,
        }
    }

    /// Extract shown segments with `pool`.
    pub fn with_extraction(mut self, pool: ExtractionPool) -> Self {
        self.pool = Some(pool);
        self
    }

    /// The extraction pool, if any.
    pub fn pool(&self) -> Option<&ExtractionPool> {
        self.pool.as_ref()
    }

    /// Current opacity.
    pub fn alpha(&self) -> f64 {
        self.alpha
    }

    /// Ids of the shown segments.
    pub fn visible(&self) -> impl Iterator<Item = u64> + '_ {
        self.visible.iter().copied()
    }

    /// Wait for pending extractions, then collect everything the view shows.
    pub fn export_meshes(&self) -> Meshes {
        if let Some(pool) = &self.pool {
            pool.drain();
        }
        let mut meshes = Meshes::new();
        for (id, mesh) in self.shown() {
            meshes.add(id, mesh);
        }
        meshes
    }

    /// Explicit meshes, then extracted meshes of visible segments, by id.
    fn shown(&self) -> BTreeMap<u64, Arc<Mesh>> {
        let mut shown: BTreeMap<u64, Arc<Mesh>> = self
            .meshes
            .iter()
            .map(|(id, mesh)| (id, Arc::clone(mesh)))
            .collect();
        if let Some(pool) = &self.pool {
            for &id in &self.visible {
                if let Some(mesh) = pool.mesh(id) {
                    shown.entry(id).or_insert(mesh);
                }
            }
        }
        shown
    }

    fn record(&self) -> Vec<Command> {
        #[allow(
            clippy::cast_possible_truncation,
            reason = "Colors are single precision."
        )]
        let alpha = self.alpha as f32;
        let mut commands = Vec::new();
        for (id, mesh) in self.shown() {
            #[allow(
                clippy::cast_possible_truncation,
                reason = "Colors are single precision."
            )]
            let [r, g, b] = label_rgb(id).map(|c| c as f32);
            let (positions, normals) = mesh.triangle_soup();
            commands.push(Command::Color([r, g, b, alpha]));
            commands.push(Command::Triangles { positions, normals });
        }
        commands
    }

    fn update_recording(&mut self, draw: &DrawBase) -> Result<(), BackendError> {
        let commands = self.record();
        self.dirty = false;
        self.list = None;
        if commands.is_empty() {
            return Ok(());
        }
        let meshes = commands.len() / 2;
        self.list = Some(draw.canvas().compile(commands)?);
        debug!(meshes, alpha = self.alpha, "mesh recording updated");
        Ok(())
    }

    fn draw(&mut self, draw: &mut DrawBase, cx: &mut Context<'_>) {
        if let Some(pool) = &self.pool {
            // Checked before taking results so a completion in between still
            // triggers another frame.
            if pool.pending() > 0 {
                draw.request_redraw();
            }
            if pool.take_fresh() {
                debug!("extracted meshes arrived");
                self.changed(cx);
            }
        }
        if self.dirty
            && let Err(err) = self.update_recording(draw)
        {
            error!(%err, "could not record meshes");
            return;
        }
        if let Some(list) = &self.list {
            list.call();
        }
    }

    fn changed(&mut self, cx: &mut Context<'_>) {
        self.dirty = true;
        notify_changed(cx);
    }
}

impl Accepts<DrawOpaque> for MeshView {
    fn on_signal(&mut self, draw: &mut DrawOpaque, cx: &mut Context<'_>) {
        if self.alpha >= 1.0 {
            self.draw(&mut draw.base, cx);
        }
    }
}

impl Accepts<DrawTranslucent> for MeshView {
    fn on_signal(&mut self, draw: &mut DrawTranslucent, cx: &mut Context<'_>) {
        if self.alpha > 0.0 && self.alpha < 1.0 {
            self.draw(&mut draw.base, cx);
        }
    }
}

impl Accepts<QuerySize> for MeshView {
    fn on_signal(&mut self, query: &mut QuerySize, _: &mut Context<'_>) {
        if let Some(bounds) = self
            .shown()
            .values()
            .filter_map(|mesh| mesh.bounding_box())
            .reduce(Aabb::union)
        {
            query.set_size(bounds);
        }
    }
}

impl Accepts<ChangeAlpha> for MeshView {
    fn on_signal(&mut self, signal: &mut ChangeAlpha, cx: &mut Context<'_>) {
        self.alpha = signal.alpha.clamp(0.0, 1.0);
        self.changed(cx);
    }
}

impl Accepts<SetMeshes> for MeshView {
    fn on_signal(&mut self, signal: &mut SetMeshes, cx: &mut Context<'_>) {
        self.meshes = core::mem::take(&mut signal.meshes);
        self.changed(cx);
    }
}

impl Accepts<ShowSegment> for MeshView {
    fn on_signal(&mut self, signal: &mut ShowSegment, cx: &mut Context<'_>) {
        let id = signal.id;
        let Some(pool) = &self.pool else {
            warn!(id, "mesh view has no extraction pool, ignoring segment");
            return;
        };
        self.visible.insert(id);
        pool.submit(id);
        self.changed(cx);
    }
}

impl Accepts<HideSegment> for MeshView {
    fn on_signal(&mut self, signal: &mut HideSegment, cx: &mut Context<'_>) {
        let id = signal.id;
        if !self.visible.remove(&id) {
            return;
        }
        if let Some(pool) = &self.pool {
            pool.hide(id);
        }
        self.changed(cx);
    }
}

impl Node for MeshView {
    fn declare(caps: &mut Capabilities<Self>) {
        caps.accepts::<DrawOpaque>()
            .accepts::<DrawTranslucent>()
            .accepts::<QuerySize>()
            .accepts::<ChangeAlpha>()
            .accepts::<SetMeshes>()
            .accepts::<ShowSegment>()
            .accepts::<HideSegment>()
            .provides::<ContentChanged>();
    }
}
