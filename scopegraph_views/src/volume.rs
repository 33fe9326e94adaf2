// Copyright 2025 the Scopegraph Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Dense labelled volumes and a slice viewer over them.

use std::collections::BTreeSet;
use std::sync::Arc;

use scopegraph::{Accepts, AgentAdded, Capabilities, Context, Graph, Node, NodeId, NodeKind, signal};
use scopegraph_gui::{Button, ContentChanged, PointerDown, QuerySize};
use tracing::{debug, trace, warn};
use vek::{Aabb, Vec3};

use crate::error::ViewError;
use crate::extract::MeshExtractor;
use crate::image::{Image, ImageView, SetImage};
use crate::mesh::Mesh;

/// A `width × height × depth` grid of values, x fastest, then y, then z.
#[derive(Clone, Debug, PartialEq)]
pub struct ExplicitVolume {
    width: u32,
    height: u32,
    depth: u32,
    data: Vec<f32>,
}

impl ExplicitVolume {
    /// A volume over `data`, which must hold `width * height * depth` values.
    pub fn new(width: u32, height: u32, depth: u32, data: Vec<f32>) -> Result<Self, ViewError> {
        let expected = u64::from(width)
            .checked_mul(u64::from(height))
            .and_then(|n| n.checked_mul(u64::from(depth)))
            .and_then(|n| usize::try_from(n).ok());
        if expected != Some(data.len()) {
            return Err(ViewError::Shape {
                width,
                height,
                depth,
                len: data.len(),
            });
        }
        Ok(Self {
            width,
            height,
            depth,
            data,
        })
    }

    /// Width in voxels.
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Height in voxels.
    pub fn height(&self) -> u32 {
        self.height
    }

    /// Number of slices.
    pub fn depth(&self) -> u32 {
        self.depth
    }

    fn index(&self, x: u32, y: u32, z: u32) -> Option<usize> {
        if x >= self.width || y >= self.height || z >= self.depth {
            return None;
        }
        let (w, h) = (u64::from(self.width), u64::from(self.height));
        usize::try_from((u64::from(z) * h + u64::from(y)) * w + u64::from(x)).ok()
    }

    /// The value at `(x, y, z)`.
    pub fn get(&self, x: u32, y: u32, z: u32) -> Option<f32> {
        self.data.get(self.index(x, y, z)?).copied()
    }

    /// The `z`th slice as an image.
    pub fn slice(&self, z: u32) -> Option<Image> {
        let start = self.index(0, 0, z)?;
        let len = usize::try_from(u64::from(self.width) * u64::from(self.height)).ok()?;
        let values = self.data.get(start..start + len)?;
        Image::new(self.width, self.height, values.to_vec()).ok()
    }

    /// The box covered by the volume, one unit per voxel.
    pub fn bounding_box(&self) -> Aabb<f64> {
        Aabb {
            min: Vec3::zero(),
            max: Vec3::new(
                f64::from(self.width),
                f64::from(self.height),
                f64::from(self.depth),
            ),
        }
    }

    /// Ids of all labels, i.e. distinct values of one and above.
    pub fn labels(&self) -> BTreeSet<u64> {
        self.data
            .iter()
            .filter(|&&v| v >= 1.0)
            .map(|&v| label_id(v))
            .collect()
    }

    /// The box covered by the voxels of label `id`.
    pub fn label_bounds(&self, id: u64) -> Option<Aabb<f64>> {
        let mut bounds: Option<Aabb<f64>> = None;
        for z in 0..self.depth {
            for y in 0..self.height {
                for x in 0..self.width {
                    let Some(v) = self.get(x, y, z) else {
                        continue;
                    };
                    if v < 1.0 || label_id(v) != id {
                        continue;
                    }
                    let lo = Vec3::new(f64::from(x), f64::from(y), f64::from(z));
                    let voxel = Aabb {
                        min: lo,
                        max: lo + Vec3::one(),
                    };
                    bounds = Some(bounds.map_or(voxel, |b| b.union(voxel)));
                }
            }
        }
        bounds
    }
}

fn label_id(value: f32) -> u64 {
    #[allow(
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss,
        reason = "Label ids are stored as whole, positive floats."
    )]
    let id = value as u64;
    id
}

/// Extracts each label of a volume as the box around its voxels.
#[derive(Clone, Debug)]
pub struct VolumeExtractor {
    volume: Arc<ExplicitVolume>,
}

impl VolumeExtractor {
    /// Extract labels of `volume`.
    pub fn new(volume: Arc<ExplicitVolume>) -> Self {
        Self { volume }
    }
}

impl MeshExtractor for VolumeExtractor {
    fn extract(&self, id: u64) -> Option<Mesh> {
        self.volume.label_bounds(id).map(Mesh::cuboid)
    }
}

/// Replace the volume of a [`VolumeView`].
#[derive(Clone, Debug)]
pub struct SetVolume {
    /// The new volume.
    pub volume: Arc<ExplicitVolume>,
}

/// Sent upward when the user clicks into a [`VolumeView`].
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct VolumePointSelected {
    /// The clicked voxel position; `z` is the shown slice.
    pub point: Vec3<f64>,
}

signal!(SetVolume);
signal!(VolumePointSelected);

/// Shows one slice of a volume through a child [`ImageView`].
///
/// The wheel steps through the slices. A left click reports the clicked
/// position as a [`VolumePointSelected`].
#[derive(Debug, Default)]
pub struct VolumeView {
    volume: Option<Arc<ExplicitVolume>>,
    index: u32,
}

impl VolumeView {
    /// An empty view. Use [`VolumeView::attach`] to get one with its image child.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a volume view showing `volume` below `parent`, with its image view.
    pub fn attach(
        graph: &mut Graph,
        parent: Option<NodeId>,
        volume: Arc<ExplicitVolume>,
    ) -> Result<NodeId, scopegraph::Error> {
        let id = graph.insert(parent, Self::new())?;
        graph.insert(Some(id), ImageView::default())?;
        graph.send_down(id, &mut SetVolume { volume })?;
        Ok(id)
    }

    /// The shown slice.
    pub fn index(&self) -> u32 {
        self.index
    }

    /// The shown volume.
    pub fn volume(&self) -> Option<&Arc<ExplicitVolume>> {
        self.volume.as_ref()
    }

    fn update_image(&self, cx: &mut Context<'_>) {
        let Some(image) = self.volume.as_ref().and_then(|v| v.slice(self.index)) else {
            return;
        };
        trace!(index = self.index, "showing slice");
        if let Err(err) = cx.send_inner(&mut SetImage { image }) {
            warn!(%err, "could not update the slice image");
        }
    }
}

impl Accepts<PointerDown> for VolumeView {
    fn on_signal(&mut self, down: &mut PointerDown, cx: &mut Context<'_>) {
        if down.processed {
            return;
        }
        let Some(volume) = &self.volume else {
            return;
        };
        let last = volume.depth().saturating_sub(1);
        match down.button {
            Button::WheelUp => self.index = (self.index + 1).min(last),
            Button::WheelDown => self.index = self.index.saturating_sub(1),
            Button::Left => {
                let point = Vec3::new(down.position.x, down.position.y, f64::from(self.index));
                if !volume.bounding_box().contains_point(point) {
                    return;
                }
                down.processed = true;
                debug!(?point, "volume point selected");
                if let Err(err) = cx.send(&mut VolumePointSelected { point }) {
                    warn!(%err, "could not report selected point");
                }
                return;
            }
            _ => return,
        }
        down.processed = true;
        self.update_image(cx);
    }
}

impl Accepts<QuerySize> for VolumeView {
    fn on_signal(&mut self, query: &mut QuerySize, _: &mut Context<'_>) {
        if let Some(volume) = &self.volume {
            query.set_size(volume.bounding_box());
        }
    }
}

impl Accepts<SetVolume> for VolumeView {
    fn on_signal(&mut self, signal: &mut SetVolume, cx: &mut Context<'_>) {
        let volume = Arc::clone(&signal.volume);
        self.index = self.index.min(volume.depth().saturating_sub(1));
        self.volume = Some(volume);
        self.update_image(cx);
    }
}

impl Node for VolumeView {
    const KIND: NodeKind = NodeKind::Scope;

    fn declare(caps: &mut Capabilities<Self>) {
        caps.accepts::<PointerDown>()
            .accepts::<QuerySize>()
            .accepts::<SetVolume>()
            .provides::<VolumePointSelected>()
            .provides_inner::<SetImage>()
            .passes_up::<ContentChanged>()
            .passes_up::<AgentAdded>();
    }
}
