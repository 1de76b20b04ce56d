// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Planar wall-centerline graph
//!
//! Vertices and edges live in flat arenas addressed by integer ids. A graph
//! is immutable once built; rescaling produces a new graph. Ids are
//! canonical (vertices in raster order of position, edges by endpoint pair),
//! so the same geometry always yields the same ids.

use crate::error::{Error, Result};
use nalgebra::{Point2, Vector2};
use rustc_hash::FxHashSet;
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

/// Vertex identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct VertexId(pub u32);

/// Edge identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EdgeId(pub u32);

impl VertexId {
    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl EdgeId {
    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Unit of the graph's coordinates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CoordinateSpace {
    /// Image pixels, y pointing down
    Pixel,
    /// Meters, same axes as the image
    Metric,
}

/// Undirected wall segment between two distinct vertices
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WallEdge {
    pub a: VertexId,
    pub b: VertexId,
    /// Length of the traced skeleton path this edge replaces
    pub path_length: f64,
}

impl WallEdge {
    /// The endpoint opposite `v`
    #[inline]
    pub fn other(&self, v: VertexId) -> VertexId {
        if self.a == v {
            self.b
        } else {
            self.a
        }
    }
}

/// Summary numbers reported for a graph
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GraphSummary {
    pub vertex_count: usize,
    pub edge_count: usize,
    pub total_edge_length: f64,
}

#[derive(Debug, Clone)]
pub struct WallGraph {
    vertices: Vec<Point2<f64>>,
    edges: Vec<WallEdge>,
    adjacency: Vec<SmallVec<[EdgeId; 4]>>,
    space: CoordinateSpace,
}

impl WallGraph {
    /// Build a graph from raw parts, checking its invariants.
    ///
    /// Edges must join two distinct existing vertices and appear once.
    /// Vertices no edge touches are dropped, and ids are renumbered into
    /// canonical order.
    pub fn from_parts(
        vertices: Vec<Point2<f64>>,
        edges: Vec<(u32, u32, f64)>,
        space: CoordinateSpace,
    ) -> Result<Self> {
        let n = vertices.len() as u32;
        let mut seen = FxHashSet::default();
        let mut used = vec![false; vertices.len()];
        for &(a, b, _) in &edges {
            if a >= n || b >= n {
                return Err(Error::InvalidInput(format!(
                    "edge ({}, {}) references a missing vertex ({} vertices)",
                    a, b, n
                )));
            }
            if a == b {
                return Err(Error::InvalidInput(format!("edge ({}, {}) is a self-loop", a, b)));
            }
            if !seen.insert((a.min(b), a.max(b))) {
                return Err(Error::InvalidInput(format!("duplicate edge ({}, {})", a, b)));
            }
            used[a as usize] = true;
            used[b as usize] = true;
        }

        // Canonical vertex order: by y, then x
        let mut order: Vec<u32> = (0..n).filter(|&i| used[i as usize]).collect();
        order.sort_by(|&i, &j| {
            let (p, q) = (&vertices[i as usize], &vertices[j as usize]);
            p.y.total_cmp(&q.y).then(p.x.total_cmp(&q.x)).then(i.cmp(&j))
        });
        let mut remap = vec![u32::MAX; vertices.len()];
        for (new, &old) in order.iter().enumerate() {
            remap[old as usize] = new as u32;
        }
        let canonical_vertices: Vec<Point2<f64>> =
            order.iter().map(|&i| vertices[i as usize]).collect();

        let mut canonical_edges: Vec<WallEdge> = edges
            .into_iter()
            .map(|(a, b, path_length)| {
                let (a, b) = (remap[a as usize], remap[b as usize]);
                WallEdge {
                    a: VertexId(a.min(b)),
                    b: VertexId(a.max(b)),
                    path_length,
                }
            })
            .collect();
        canonical_edges.sort_by_key(|e| (e.a, e.b));

        let mut adjacency = vec![SmallVec::new(); canonical_vertices.len()];
        for (i, e) in canonical_edges.iter().enumerate() {
            adjacency[e.a.index()].push(EdgeId(i as u32));
            adjacency[e.b.index()].push(EdgeId(i as u32));
        }

        Ok(Self {
            vertices: canonical_vertices,
            edges: canonical_edges,
            adjacency,
            space,
        })
    }

    #[inline]
    pub fn space(&self) -> CoordinateSpace {
        self.space
    }

    #[inline]
    pub fn vertex(&self, id: VertexId) -> Point2<f64> {
        self.vertices[id.index()]
    }

    #[inline]
    pub fn edge(&self, id: EdgeId) -> &WallEdge {
        &self.edges[id.index()]
    }

    #[inline]
    pub fn vertices(&self) -> &[Point2<f64>] {
        &self.vertices
    }

    #[inline]
    pub fn edges(&self) -> &[WallEdge] {
        &self.edges
    }

    pub fn vertex_ids(&self) -> impl Iterator<Item = VertexId> {
        (0..self.vertices.len() as u32).map(VertexId)
    }

    pub fn edge_ids(&self) -> impl Iterator<Item = EdgeId> {
        (0..self.edges.len() as u32).map(EdgeId)
    }

    #[inline]
    pub fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    #[inline]
    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    #[inline]
    pub fn degree(&self, v: VertexId) -> usize {
        self.adjacency[v.index()].len()
    }

    #[inline]
    pub fn incident_edges(&self, v: VertexId) -> &[EdgeId] {
        &self.adjacency[v.index()]
    }

    /// Coordinates of an edge's endpoints, in (a, b) order
    #[inline]
    pub fn edge_endpoints(&self, id: EdgeId) -> (Point2<f64>, Point2<f64>) {
        let e = self.edge(id);
        (self.vertex(e.a), self.vertex(e.b))
    }

    /// Euclidean length between the edge's endpoints
    #[inline]
    pub fn edge_length(&self, id: EdgeId) -> f64 {
        let (a, b) = self.edge_endpoints(id);
        (b - a).norm()
    }

    /// Unit direction of the edge leaving `from`
    pub fn direction_from(&self, id: EdgeId, from: VertexId) -> Option<Vector2<f64>> {
        let e = self.edge(id);
        let p = self.vertex(from);
        let q = self.vertex(e.other(from));
        (q - p).try_normalize(1e-12)
    }

    pub fn total_length(&self) -> f64 {
        self.edge_ids().map(|e| self.edge_length(e)).sum()
    }

    /// Sum of the traced path lengths
    pub fn total_path_length(&self) -> f64 {
        self.edges.iter().map(|e| e.path_length).sum()
    }

    /// Axis-aligned bounds of all vertices
    pub fn bounds(&self) -> Option<(Point2<f64>, Point2<f64>)> {
        let first = *self.vertices.first()?;
        Some(self.vertices.iter().fold((first, first), |(lo, hi), p| {
            (
                Point2::new(lo.x.min(p.x), lo.y.min(p.y)),
                Point2::new(hi.x.max(p.x), hi.y.max(p.y)),
            )
        }))
    }

    pub fn summary(&self) -> GraphSummary {
        GraphSummary {
            vertex_count: self.vertex_count(),
            edge_count: self.edge_count(),
            total_edge_length: self.total_length(),
        }
    }

    /// New graph with every coordinate and path length multiplied by `factor`
    pub fn scaled(&self, factor: f64, space: CoordinateSpace) -> WallGraph {
        WallGraph {
            vertices: self.vertices.iter().map(|p| Point2::from(p.coords * factor)).collect(),
            edges: self
                .edges
                .iter()
                .map(|e| WallEdge {
                    path_length: e.path_length * factor,
                    ..*e
                })
                .collect(),
            adjacency: self.adjacency.clone(),
            space,
        }
    }
}
