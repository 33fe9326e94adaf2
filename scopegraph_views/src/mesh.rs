// Copyright 2025 the Scopegraph Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Triangle meshes and labelled mesh collections.

use std::collections::BTreeMap;
use std::sync::Arc;

use vek::{Aabb, Vec3};

/// An indexed triangle mesh with per-vertex normals.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Mesh {
    vertices: Vec<Vec3<f32>>,
    normals: Vec<Vec3<f32>>,
    triangles: Vec<[u32; 3]>,
}

impl Mesh {
    /// An empty mesh.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a vertex and return its index.
    pub fn add_vertex(&mut self, position: Vec3<f32>, normal: Vec3<f32>) -> u32 {
        self.vertices.push(position);
        self.normals.push(normal);
        #[allow(
            clippy::cast_possible_truncation,
            reason = "Triangle indices are 32-bit."
        )]
        let index = (self.vertices.len() - 1) as u32;
        index
    }

    /// Append a triangle over three existing vertices.
    pub fn add_triangle(&mut self, a: u32, b: u32, c: u32) {
        self.triangles.push([a, b, c]);
    }

    /// Number of vertices. Used as the resolution of the mesh.
    pub fn num_vertices(&self) -> usize {
        self.vertices.len()
    }

    /// Number of triangles.
    pub fn num_triangles(&self) -> usize {
        self.triangles.len()
    }

    /// Vertex positions.
    pub fn vertices(&self) -> &[Vec3<f32>] {
        &self.vertices
    }

    /// Vertex normals, parallel to [`Mesh::vertices`].
    pub fn normals(&self) -> &[Vec3<f32>] {
        &self.normals
    }

    /// Vertex index triples.
    pub fn triangles(&self) -> &[[u32; 3]] {
        &self.triangles
    }

    /// The box around all vertices, or `None` for an empty mesh.
    pub fn bounding_box(&self) -> Option<Aabb<f64>> {
        let mut points = self.vertices.iter().map(|v| v.map(f64::from));
        let first = points.next()?;
        Some(points.fold(Aabb::new_empty(first), |mut bounds, p| {
            bounds.expand_to_contain_point(p);
            bounds
        }))
    }

    /// Positions and normals of every triangle corner, three per triangle.
    ///
    /// Triangles referring to missing vertices are skipped.
    pub fn triangle_soup(&self) -> (Vec<Vec3<f32>>, Vec<Vec3<f32>>) {
        let mut positions = Vec::with_capacity(self.triangles.len() * 3);
        let mut normals = Vec::with_capacity(self.triangles.len() * 3);
        for triangle in &self.triangles {
            let corners: Option<Vec<usize>> = triangle
                .iter()
                .map(|&i| usize::try_from(i).ok().filter(|&i| i < self.vertices.len()))
                .collect();
            let Some(corners) = corners else {
                continue;
            };
            for i in corners {
                positions.push(self.vertices[i]);
                normals.push(self.normals[i]);
            }
        }
        (positions, normals)
    }

    /// A closed box mesh with flat-shaded faces.
    pub fn cuboid(bounds: Aabb<f64>) -> Self {
        #[allow(
            clippy::cast_possible_truncation,
            reason = "Mesh vertices are stored in single precision."
        )]
        let (lo, hi) = (bounds.min.map(|c| c as f32), bounds.max.map(|c| c as f32));
        let corner = |x: bool, y: bool, z: bool| {
            Vec3::new(
                if x { hi.x } else { lo.x },
                if y { hi.y } else { lo.y },
                if z { hi.z } else { lo.z },
            )
        };
        // Each face: normal, then corners counter-clockwise seen from outside.
        let faces = [
            (Vec3::new(-1.0, 0.0, 0.0), [(false, false, false), (false, false, true), (false, true, true), (false, true, false)]),
            (Vec3::new(1.0, 0.0, 0.0), [(true, false, false), (true, true, false), (true, true, true), (true, false, true)]),
            (Vec3::new(0.0, -1.0, 0.0), [(false, false, false), (true, false, false), (true, false, true), (false, false, true)]),
            (Vec3::new(0.0, 1.0, 0.0), [(false, true, false), (false, true, true), (true, true, true), (true, true, false)]),
            (Vec3::new(0.0, 0.0, -1.0), [(false, false, false), (false, true, false), (true, true, false), (true, false, false)]),
            (Vec3::new(0.0, 0.0, 1.0), [(false, false, true), (true, false, true), (true, true, true), (false, true, true)]),
        ];
        let mut mesh = Self::new();
        for (normal, quad) in faces {
            let [a, b, c, d] = quad.map(|(x, y, z)| mesh.add_vertex(corner(x, y, z), normal));
            mesh.add_triangle(a, b, c);
            mesh.add_triangle(a, c, d);
        }
        mesh
    }
}

/// Meshes keyed by label id, iterated in id order.
#[derive(Clone, Debug, Default)]
pub struct Meshes {
    meshes: BTreeMap<u64, Arc<Mesh>>,
}

impl Meshes {
    /// An empty collection.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace the mesh of label `id`.
    pub fn add(&mut self, id: u64, mesh: impl Into<Arc<Mesh>>) {
        self.meshes.insert(id, mesh.into());
    }

    /// The mesh of label `id`.
    pub fn get(&self, id: u64) -> Option<&Arc<Mesh>> {
        self.meshes.get(&id)
    }

    /// Remove the mesh of label `id`.
    pub fn remove(&mut self, id: u64) -> Option<Arc<Mesh>> {
        self.meshes.remove(&id)
    }

    /// Label ids, ascending.
    pub fn ids(&self) -> impl Iterator<Item = u64> + '_ {
        self.meshes.keys().copied()
    }

    /// `(id, mesh)` pairs, ascending by id.
    pub fn iter(&self) -> impl Iterator<Item = (u64, &Arc<Mesh>)> + '_ {
        self.meshes.iter().map(|(id, mesh)| (*id, mesh))
    }

    /// Number of meshes.
    pub fn len(&self) -> usize {
        self.meshes.len()
    }

    /// Whether there are no meshes.
    pub fn is_empty(&self) -> bool {
        self.meshes.is_empty()
    }

    /// The box around all meshes.
    pub fn bounding_box(&self) -> Option<Aabb<f64>> {
        self.meshes
            .values()
            .filter_map(|mesh| mesh.bounding_box())
            .reduce(Aabb::union)
    }
}

impl FromIterator<(u64, Mesh)> for Meshes {
    fn from_iter<I: IntoIterator<Item = (u64, Mesh)>>(iter: I) -> Self {
        Self {
            meshes: iter
                .into_iter()
                .map(|(id, mesh)| (id, Arc::new(mesh)))
                .collect(),
        }
    }
}
