// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Wall topology extraction
//!
//! Two decoupled passes turn the refined wall mask into a [`WallGraph`]:
//!
//! 1. **Thinning** - Zhang-Suen reduces the mask to a connected 1-pixel
//!    skeleton, followed by a cleanup that removes redundant staircase pixels.
//! 2. **Classification** - skeleton pixels with one neighbour (endpoints)
//!    or three or more (junctions) become vertices; chains of two-neighbour
//!    pixels between them become edges, simplified with Douglas-Peucker so
//!    wall corners turn into vertices too.
//!
//! Short spurs and collinear vertices are then folded away.

use crate::config::TopologyConfig;
use crate::error::{Error, Result};
use crate::masks::{self, MaskSet};
use crate::wall_graph::{CoordinateSpace, VertexId, WallGraph};
use image::GrayImage;
use nalgebra::{Point2, Vector2};
use rayon::prelude::*;
use rustc_hash::FxHashSet;
use smallvec::SmallVec;

const NONE: u32 = u32::MAX;

/// Neighbour offsets P2..P9: N, NE, E, SE, S, SW, W, NW
const RING: [(i64, i64); 8] = [
    (0, -1),
    (1, -1),
    (1, 0),
    (1, 1),
    (0, 1),
    (-1, 1),
    (-1, 0),
    (-1, -1),
];

/// Binary raster addressed by `y * width + x`
#[derive(Debug, Clone)]
pub struct Skeleton {
    pub width: usize,
    pub height: usize,
    pub pixels: Vec<bool>,
}

impl Skeleton {
    fn from_mask(mask: &GrayImage) -> Self {
        Self {
            width: mask.width() as usize,
            height: mask.height() as usize,
            pixels: mask.pixels().map(|p| p.0[0] > 0).collect(),
        }
    }

    #[inline]
    fn get(&self, x: i64, y: i64) -> bool {
        x >= 0
            && y >= 0
            && (x as usize) < self.width
            && (y as usize) < self.height
            && self.pixels[y as usize * self.width + x as usize]
    }

    #[inline]
    fn ring(&self, idx: usize) -> [bool; 8] {
        let (x, y) = ((idx % self.width) as i64, (idx / self.width) as i64);
        RING.map(|(dx, dy)| self.get(x + dx, y + dy))
    }

    /// Indices of the set 8-neighbours of `idx`, in ring order
    fn neighbours(&self, idx: usize) -> SmallVec<[usize; 8]> {
        let (x, y) = ((idx % self.width) as i64, (idx / self.width) as i64);
        RING.iter()
            .filter(|(dx, dy)| self.get(x + dx, y + dy))
            .map(|(dx, dy)| (y + dy) as usize * self.width + (x + dx) as usize)
            .collect()
    }

    #[inline]
    fn point(&self, idx: usize) -> Point2<f64> {
        Point2::new((idx % self.width) as f64, (idx / self.width) as f64)
    }

    pub fn count(&self) -> usize {
        self.pixels.iter().filter(|&&p| p).count()
    }
}

/// Zhang-Suen test for one sub-iteration
fn removable(ring: &[bool; 8], step: usize) -> bool {
    let b = ring.iter().filter(|&&p| p).count();
    if !(2..=6).contains(&b) {
        return false;
    }
    let transitions = (0..8).filter(|&i| !ring[i] && ring[(i + 1) % 8]).count();
    if transitions != 1 {
        return false;
    }
    let [p2, _, p4, _, p6, _, p8, _] = *ring;
    if step == 0 {
        !(p2 && p4 && p6) && !(p4 && p6 && p8)
    } else {
        !(p2 && p4 && p8) && !(p2 && p6 && p8)
    }
}

/// Reduce a mask to a connected 1-pixel-wide skeleton
pub fn thin(mask: &GrayImage) -> Skeleton {
    let mut skeleton = Skeleton::from_mask(mask);

    loop {
        let mut changed = false;
        for step in 0..2 {
            // Marks come from a snapshot, so scan order cannot matter
            let marks: Vec<usize> = {
                let snapshot = &skeleton;
                (0..snapshot.height)
                    .into_par_iter()
                    .flat_map_iter(|y| {
                        (0..snapshot.width).filter_map(move |x| {
                            let idx = y * snapshot.width + x;
                            (snapshot.pixels[idx] && removable(&snapshot.ring(idx), step))
                                .then_some(idx)
                        })
                    })
                    .collect()
            };
            if !marks.is_empty() {
                changed = true;
                for idx in marks {
                    skeleton.pixels[idx] = false;
                }
            }
        }
        if !changed {
            break;
        }
    }

    remove_staircase_pixels(&mut skeleton);
    skeleton
}

/// Number of 8-connected groups among the set neighbours of a ring
fn ring_groups(ring: &[bool; 8]) -> usize {
    let set: SmallVec<[usize; 8]> = (0..8).filter(|&i| ring[i]).collect();
    let mut group = [usize::MAX; 8];
    let mut groups = 0;
    for &start in &set {
        if group[start] != usize::MAX {
            continue;
        }
        group[start] = groups;
        let mut stack: SmallVec<[usize; 8]> = SmallVec::new();
        stack.push(start);
        while let Some(i) = stack.pop() {
            let (xi, yi) = RING[i];
            for &j in &set {
                let (xj, yj) = RING[j];
                if group[j] == usize::MAX && (xi - xj).abs() <= 1 && (yi - yj).abs() <= 1 {
                    group[j] = groups;
                    stack.push(j);
                }
            }
        }
        groups += 1;
    }
    groups
}

/// Drop pixels whose neighbours stay connected without them. Leaves a
/// skeleton where every pixel on a plain run has exactly two neighbours.
fn remove_staircase_pixels(skeleton: &mut Skeleton) {
    for idx in 0..skeleton.pixels.len() {
        if !skeleton.pixels[idx] {
            continue;
        }
        let ring = skeleton.ring(idx);
        let count = ring.iter().filter(|&&p| p).count();
        if count >= 2 && count < 8 && ring_groups(&ring) == 1 {
            skeleton.pixels[idx] = false;
        }
    }
}

/// Mutable graph with tombstones, used while edges are added and folded away
#[derive(Debug, Default)]
pub(crate) struct GraphBuilder {
    points: Vec<Point2<f64>>,
    edges: Vec<Option<(u32, u32, f64)>>,
    adjacency: Vec<SmallVec<[u32; 4]>>,
    pairs: FxHashSet<(u32, u32)>,
}

impl GraphBuilder {
    pub(crate) fn from_graph(graph: &WallGraph) -> Self {
        let mut builder = Self::default();
        for p in graph.vertices() {
            builder.add_vertex(*p);
        }
        for e in graph.edges() {
            builder.add_edge(e.a.0, e.b.0, e.path_length);
        }
        builder
    }

    pub(crate) fn add_vertex(&mut self, p: Point2<f64>) -> u32 {
        self.points.push(p);
        self.adjacency.push(SmallVec::new());
        (self.points.len() - 1) as u32
    }

    /// Add an edge unless it is a self-loop or already present
    pub(crate) fn add_edge(&mut self, a: u32, b: u32, path_length: f64) -> bool {
        if a == b || !self.pairs.insert((a.min(b), a.max(b))) {
            return false;
        }
        let id = self.edges.len() as u32;
        self.edges.push(Some((a, b, path_length)));
        self.adjacency[a as usize].push(id);
        self.adjacency[b as usize].push(id);
        true
    }

    fn remove_edge(&mut self, id: u32) -> Option<(u32, u32, f64)> {
        let (a, b, len) = self.edges[id as usize].take()?;
        self.pairs.remove(&(a.min(b), a.max(b)));
        self.adjacency[a as usize].retain(|e| *e != id);
        self.adjacency[b as usize].retain(|e| *e != id);
        Some((a, b, len))
    }

    fn other(&self, edge: u32, v: u32) -> Option<(u32, f64)> {
        let (a, b, len) = self.edges[edge as usize]?;
        Some((if a == v { b } else { a }, len))
    }

    pub(crate) fn edge_count(&self) -> usize {
        self.edges.iter().flatten().count()
    }

    /// Remove dead-end edges shorter than `min_length` hanging off a junction
    fn prune_spurs(&mut self, min_length: f64) -> bool {
        let mut changed = false;
        for v in 0..self.points.len() as u32 {
            if self.adjacency[v as usize].len() != 1 {
                continue;
            }
            let edge = self.adjacency[v as usize][0];
            let Some((other, len)) = self.other(edge, v) else {
                continue;
            };
            if self.adjacency[other as usize].len() >= 3 && len < min_length {
                self.remove_edge(edge);
                changed = true;
            }
        }
        changed
    }

    /// Fold degree-2 vertices whose edges turn less than `tolerance`
    pub(crate) fn dissolve_collinear(&mut self, tolerance: f64) -> bool {
        let mut changed = false;
        for v in 0..self.points.len() as u32 {
            if self.adjacency[v as usize].len() != 2 {
                continue;
            }
            let (e1, e2) = (self.adjacency[v as usize][0], self.adjacency[v as usize][1]);
            let (Some((o1, l1)), Some((o2, l2))) = (self.other(e1, v), self.other(e2, v)) else {
                continue;
            };
            if o1 == o2 || self.pairs.contains(&(o1.min(o2), o1.max(o2))) {
                continue;
            }
            let p = self.points[v as usize];
            let d1 = p - self.points[o1 as usize];
            let d2 = self.points[o2 as usize] - p;
            let turn = (d1.x * d2.y - d1.y * d2.x).atan2(d1.dot(&d2)).abs();
            if turn < tolerance {
                self.remove_edge(e1);
                self.remove_edge(e2);
                self.add_edge(o1, o2, l1 + l2);
                changed = true;
            }
        }
        changed
    }

    /// Merge the ends of edges shorter than `min_length` between two degree-2
    /// vertices. Thinning cuts some diagonal corners into two vertices joined
    /// by a short flat edge; this folds them back into one.
    fn collapse_short_links(&mut self, min_length: f64) -> bool {
        let mut changed = false;
        for id in 0..self.edges.len() as u32 {
            let Some((a, b, len)) = self.edges[id as usize] else {
                continue;
            };
            if self.adjacency[a as usize].len() != 2 || self.adjacency[b as usize].len() != 2 {
                continue;
            }
            if (self.points[b as usize] - self.points[a as usize]).norm() >= min_length {
                continue;
            }
            let Some(&next) = self.adjacency[b as usize].iter().find(|&&e| e != id) else {
                continue;
            };
            let Some((c, l2)) = self.other(next, b) else {
                continue;
            };
            if c == a || self.pairs.contains(&(a.min(c), a.max(c))) {
                continue;
            }
            self.remove_edge(id);
            self.remove_edge(next);
            let (pa, pb) = (self.points[a as usize], self.points[b as usize]);
            self.points[a as usize] = Point2::from((pa.coords + pb.coords) / 2.0);
            self.add_edge(a, c, l2 + len);
            changed = true;
        }
        changed
    }

    pub(crate) fn build(self, space: CoordinateSpace) -> Result<WallGraph> {
        WallGraph::from_parts(self.points, self.edges.into_iter().flatten().collect(), space)
    }
}

/// Douglas-Peucker simplification, returning the indices of kept points
fn douglas_peucker(points: &[Point2<f64>], epsilon: f64) -> Vec<usize> {
    if points.len() < 3 {
        return (0..points.len()).collect();
    }
    let mut keep = vec![false; points.len()];
    keep[0] = true;
    keep[points.len() - 1] = true;

    // Explicit stack instead of recursion: chains can be thousands of pixels
    let mut stack = vec![(0usize, points.len() - 1)];
    while let Some((first, last)) = stack.pop() {
        let mut max_dist = 0.0;
        let mut max_idx = first;
        for i in first + 1..last {
            let dist = perpendicular_distance(&points[i], &points[first], &points[last]);
            if dist > max_dist {
                max_dist = dist;
                max_idx = i;
            }
        }
        if max_dist > epsilon {
            keep[max_idx] = true;
            stack.push((first, max_idx));
            stack.push((max_idx, last));
        }
    }

    (0..points.len()).filter(|&i| keep[i]).collect()
}

/// Perpendicular distance from point to line (to the start point when the
/// line is degenerate, as for closed loops)
fn perpendicular_distance(point: &Point2<f64>, start: &Point2<f64>, end: &Point2<f64>) -> f64 {
    let d = end - start;
    let length_sq = d.norm_squared();
    if length_sq < 1e-10 {
        return (point - start).norm();
    }
    ((point.x - start.x) * d.y - (point.y - start.y) * d.x).abs() / length_sq.sqrt()
}

/// Traced pixel chain between two vertex clusters (equal for closed loops)
struct Chain {
    from: u32,
    to: u32,
    interior: Vec<usize>,
}

/// Extract the wall-centerline graph from a refined wall mask.
///
/// An empty skeleton, or one that yields no edges, is an error so callers
/// can fail fast instead of carrying an empty graph forward.
pub fn extract_topology(mask: &GrayImage, config: &TopologyConfig) -> Result<WallGraph> {
    let skeleton = thin(mask);
    let skeleton_pixels = skeleton.count();
    if skeleton_pixels == 0 {
        return Err(Error::EmptySkeleton("wall mask has no pixels".to_string()));
    }

    let degree: Vec<u8> = (0..skeleton.pixels.len())
        .map(|i| {
            if skeleton.pixels[i] {
                skeleton.ring(i).iter().filter(|&&p| p).count() as u8
            } else {
                0
            }
        })
        .collect();
    let is_node = |i: usize| skeleton.pixels[i] && degree[i] != 2 && degree[i] != 0;

    // Cluster adjacent endpoint/junction pixels into single vertices
    let mut cluster = vec![NONE; skeleton.pixels.len()];
    let mut members: Vec<Vec<usize>> = Vec::new();
    for start in 0..skeleton.pixels.len() {
        if !is_node(start) || cluster[start] != NONE {
            continue;
        }
        let id = members.len() as u32;
        cluster[start] = id;
        let mut group = vec![start];
        let mut stack = vec![start];
        while let Some(i) = stack.pop() {
            for n in skeleton.neighbours(i) {
                if is_node(n) && cluster[n] == NONE {
                    cluster[n] = id;
                    group.push(n);
                    stack.push(n);
                }
            }
        }
        group.sort_unstable();
        members.push(group);
    }

    let mut builder = GraphBuilder::default();
    for group in &members {
        let sum = group
            .iter()
            .fold(Vector2::zeros(), |acc, &i| acc + skeleton.point(i).coords);
        builder.add_vertex(Point2::from(sum / group.len() as f64));
    }

    let mut visited = vec![false; skeleton.pixels.len()];
    let mut chains: Vec<Chain> = Vec::new();

    for (id, group) in members.iter().enumerate() {
        let id = id as u32;
        for &start in group {
            for n in skeleton.neighbours(start) {
                if cluster[n] != NONE {
                    if cluster[n] > id {
                        chains.push(Chain {
                            from: id,
                            to: cluster[n],
                            interior: Vec::new(),
                        });
                    }
                    continue;
                }
                if visited[n] {
                    continue;
                }
                // Run of degree-2 pixels: exactly one way forward at each step
                visited[n] = true;
                let mut interior = vec![n];
                let (mut prev, mut cur) = (start, n);
                let end = loop {
                    let Some(next) = skeleton.neighbours(cur).into_iter().find(|&q| q != prev)
                    else {
                        break None;
                    };
                    if cluster[next] != NONE {
                        break Some(cluster[next]);
                    }
                    if visited[next] {
                        break None;
                    }
                    visited[next] = true;
                    interior.push(next);
                    prev = cur;
                    cur = next;
                };
                if let Some(to) = end {
                    chains.push(Chain {
                        from: id,
                        to,
                        interior,
                    });
                }
            }
        }
    }

    // Closed loops without any endpoint or junction, anchored at their
    // raster-first pixel
    for start in 0..skeleton.pixels.len() {
        if !skeleton.pixels[start] || degree[start] != 2 || visited[start] || cluster[start] != NONE
        {
            continue;
        }
        visited[start] = true;
        let anchor = builder.add_vertex(skeleton.point(start));
        let mut interior = Vec::new();
        let (mut prev, mut cur) = (NONE as usize, start);
        let closed = loop {
            let next = skeleton
                .neighbours(cur)
                .into_iter()
                .find(|&q| q != prev && (q == start || !visited[q]));
            match next {
                Some(q) if q == start && !interior.is_empty() => break true,
                Some(q) if q != start => {
                    visited[q] = true;
                    interior.push(q);
                    prev = cur;
                    cur = q;
                }
                _ => break false,
            }
        };
        if closed {
            chains.push(Chain {
                from: anchor,
                to: anchor,
                interior,
            });
        }
    }

    for chain in &chains {
        add_chain(&mut builder, &skeleton, chain, config.simplify_epsilon);
    }

    loop {
        let pruned = builder.prune_spurs(config.min_spur_length);
        let collapsed = builder.collapse_short_links(config.min_spur_length);
        let dissolved = builder.dissolve_collinear(config.collinear_tolerance);
        if !pruned && !collapsed && !dissolved {
            break;
        }
    }

    if builder.edge_count() == 0 {
        return Err(Error::EmptySkeleton(format!(
            "{} skeleton pixels produced no wall edges",
            skeleton_pixels
        )));
    }

    let graph = builder.build(CoordinateSpace::Pixel)?;
    tracing::info!(
        skeleton_pixels,
        vertices = graph.vertex_count(),
        edges = graph.edge_count(),
        total_length = graph.total_length(),
        "Extracted wall topology"
    );
    Ok(graph)
}

/// Simplify a chain and add its pieces as edges, creating corner vertices
fn add_chain(builder: &mut GraphBuilder, skeleton: &Skeleton, chain: &Chain, epsilon: f64) {
    let mut points = Vec::with_capacity(chain.interior.len() + 2);
    points.push(builder.points[chain.from as usize]);
    points.extend(chain.interior.iter().map(|&i| skeleton.point(i)));
    points.push(builder.points[chain.to as usize]);

    let keep = douglas_peucker(&points, epsilon);
    let last = points.len() - 1;
    let ids: Vec<u32> = keep
        .iter()
        .map(|&k| match k {
            0 => chain.from,
            k if k == last => chain.to,
            k => builder.add_vertex(points[k]),
        })
        .collect();

    for (w, pair) in keep.windows(2).zip(ids.windows(2)) {
        let length: f64 = (w[0]..w[1]).map(|i| (points[i + 1] - points[i]).norm()).sum();
        builder.add_edge(pair[0], pair[1], length);
    }
}

/// Reconnect wall ends interrupted by a door or window.
///
/// Two endpoints are joined when each is the other's nearest candidate, the
/// gap continues both walls' directions, and most of the gap lies on the
/// (dilated) door/window mask. Collinear vertices are folded afterwards, so
/// a wall with a door in it becomes a single edge again.
pub fn bridge_opening_gaps(
    graph: &WallGraph,
    masks: &MaskSet,
    config: &TopologyConfig,
) -> Result<WallGraph> {
    if graph.space() != CoordinateSpace::Pixel {
        return Err(Error::InvalidInput(
            "gap bridging works on pixel-space graphs".to_string(),
        ));
    }
    if !config.bridge_gaps {
        return Ok(graph.clone());
    }

    let openings = masks.openings();
    let openings = if config.bridge_dilation > 0 {
        masks::dilate(&openings, config.bridge_dilation)
    } else {
        openings
    };

    // (vertex, position, outward direction)
    let ends: Vec<(VertexId, Point2<f64>, Vector2<f64>)> = graph
        .vertex_ids()
        .filter(|&v| graph.degree(v) == 1)
        .filter_map(|v| {
            let e = graph.incident_edges(v)[0];
            let inward = graph.direction_from(e, v)?;
            Some((v, graph.vertex(v), -inward))
        })
        .collect();

    let cos_tol = config.bridge_angle_tolerance.cos();
    let mut best: Vec<Option<(usize, f64)>> = vec![None; ends.len()];
    for i in 0..ends.len() {
        for j in 0..ends.len() {
            if i == j {
                continue;
            }
            let (_, pi, ui) = &ends[i];
            let (_, pj, uj) = &ends[j];
            let gap = pj - pi;
            let dist = gap.norm();
            if dist < 1e-9 || dist > config.max_bridge_gap {
                continue;
            }
            let dir = gap / dist;
            if ui.dot(&dir) < cos_tol || uj.dot(&-dir) < cos_tol {
                continue;
            }
            if coverage(&openings, pi, pj) < config.bridge_min_coverage {
                continue;
            }
            if best[i].map_or(true, |(_, d)| dist < d) {
                best[i] = Some((j, dist));
            }
        }
    }

    let mut builder = GraphBuilder::from_graph(graph);
    let mut bridged = 0usize;
    for (i, candidate) in best.iter().enumerate() {
        let Some((j, dist)) = *candidate else { continue };
        let mutual = matches!(best[j], Some((k, _)) if k == i);
        let (from, to) = (ends[i].0, ends[j].0);
        if mutual && i < j && builder.add_edge(from.0, to.0, dist) {
            tracing::debug!(from = from.0, to = to.0, gap = dist, "Bridged opening gap");
            bridged += 1;
        }
    }

    if bridged == 0 {
        return Ok(graph.clone());
    }
    while builder.dissolve_collinear(config.collinear_tolerance) {}

    let result = builder.build(CoordinateSpace::Pixel)?;
    tracing::info!(
        bridged,
        vertices = result.vertex_count(),
        edges = result.edge_count(),
        "Bridged wall gaps at openings"
    );
    Ok(result)
}

/// Fraction of unit-spaced samples along `a..b` that land on set pixels
fn coverage(mask: &GrayImage, a: &Point2<f64>, b: &Point2<f64>) -> f64 {
    let steps = (b - a).norm().ceil().max(1.0) as usize;
    let hits = (0..=steps)
        .filter(|&k| {
            let p = a + (b - a) * (k as f64 / steps as f64);
            let (x, y) = (p.x.round(), p.y.round());
            x >= 0.0
                && y >= 0.0
                && (x as u32) < mask.width()
                && (y as u32) < mask.height()
                && masks::is_set(mask, x as u32, y as u32)
        })
        .count();
    hits as f64 / (steps + 1) as f64
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use image::Luma;

    fn fill(img: &mut GrayImage, x0: u32, x1: u32, y0: u32, y1: u32) {
        for y in y0..y1 {
            for x in x0..x1 {
                img.put_pixel(x, y, Luma([255]));
            }
        }
    }

    fn rectangle_mask() -> GrayImage {
        let mut img = GrayImage::new(100, 100);
        fill(&mut img, 10, 90, 10, 15);
        fill(&mut img, 10, 90, 85, 90);
        fill(&mut img, 10, 15, 10, 90);
        fill(&mut img, 85, 90, 10, 90);
        img
    }

    #[test]
    fn test_thin_bar_is_one_pixel_wide() {
        let mut img = GrayImage::new(60, 20);
        fill(&mut img, 5, 55, 8, 13);
        let skeleton = thin(&img);
        assert!(skeleton.count() > 30);
        for x in 10..50 {
            let column = (0..20).filter(|&y| skeleton.pixels[y * 60 + x]).count();
            assert_eq!(column, 1, "column {} not thin", x);
        }
    }

    #[test]
    fn test_rectangle_yields_four_vertices_and_edges() {
        let graph = extract_topology(&rectangle_mask(), &TopologyConfig::default()).unwrap();
        assert_eq!(graph.vertex_count(), 4);
        assert_eq!(graph.edge_count(), 4);
        assert!(graph.vertex_ids().all(|v| graph.degree(v) == 2));

        let perimeter = 4.0 * 75.0;
        let total = graph.total_length();
        assert!((total - perimeter).abs() / perimeter < 0.05, "total {}", total);
    }

    #[test]
    fn test_extraction_is_deterministic() {
        let a = extract_topology(&rectangle_mask(), &TopologyConfig::default()).unwrap();
        let b = extract_topology(&rectangle_mask(), &TopologyConfig::default()).unwrap();
        assert_eq!(a.vertices(), b.vertices());
        assert_eq!(a.edges(), b.edges());
    }

    #[test]
    fn test_interior_walls_make_junctions() {
        let mut img = GrayImage::new(200, 150);
        fill(&mut img, 10, 190, 10, 15);
        fill(&mut img, 10, 190, 135, 140);
        fill(&mut img, 10, 15, 10, 140);
        fill(&mut img, 185, 190, 10, 140);
        fill(&mut img, 98, 103, 15, 135);
        fill(&mut img, 15, 98, 73, 78);

        let graph = extract_topology(&img, &TopologyConfig::default()).unwrap();
        assert_eq!(graph.vertex_count(), 8);
        assert_eq!(graph.edge_count(), 10);
        let junctions = graph.vertex_ids().filter(|&v| graph.degree(v) == 3).count();
        assert_eq!(junctions, 4);
    }

    #[test]
    fn test_empty_mask_fails() {
        let img = GrayImage::new(30, 30);
        assert!(matches!(
            extract_topology(&img, &TopologyConfig::default()),
            Err(Error::EmptySkeleton(_))
        ));
    }

    #[test]
    fn test_douglas_peucker_keeps_corner() {
        let mut points: Vec<_> = (0..10).map(|i| Point2::new(i as f64, 0.0)).collect();
        points.extend((1..10).map(|i| Point2::new(9.0, i as f64)));
        let keep = douglas_peucker(&points, 1.0);
        assert_eq!(keep, vec![0, 9, 18]);
    }

    #[test]
    fn test_short_flat_corner_collapses() {
        // diamond whose top corner came out of thinning as two vertices
        let mut builder = GraphBuilder::default();
        let top_left = builder.add_vertex(Point2::new(50.0, 10.0));
        let top_right = builder.add_vertex(Point2::new(54.0, 10.0));
        let right = builder.add_vertex(Point2::new(92.0, 50.0));
        let bottom = builder.add_vertex(Point2::new(52.0, 90.0));
        let left = builder.add_vertex(Point2::new(12.0, 50.0));
        builder.add_edge(top_left, top_right, 4.0);
        builder.add_edge(top_right, right, 55.0);
        builder.add_edge(right, bottom, 56.0);
        builder.add_edge(bottom, left, 56.0);
        builder.add_edge(left, top_left, 55.0);

        assert!(builder.collapse_short_links(8.0));
        assert!(!builder.collapse_short_links(8.0));
        let graph = builder.build(CoordinateSpace::Pixel).unwrap();
        assert_eq!(graph.vertex_count(), 4);
        assert_eq!(graph.edge_count(), 4);
        // top corner sits on the axis of symmetry, like the bottom one
        let top = graph.vertices().iter().min_by(|p, q| p.y.total_cmp(&q.y)).unwrap();
        assert_relative_eq!(top.x, 52.0);
        assert_relative_eq!(top.y, 10.0);
        assert_relative_eq!(graph.total_path_length(), 4.0 + 55.0 + 56.0 + 56.0 + 55.0);
    }

    #[test]
    fn test_short_edge_at_junction_is_kept() {
        let mut builder = GraphBuilder::default();
        let hub = builder.add_vertex(Point2::new(0.0, 0.0));
        let near = builder.add_vertex(Point2::new(3.0, 0.0));
        let far = builder.add_vertex(Point2::new(3.0, 40.0));
        let a = builder.add_vertex(Point2::new(-40.0, 0.0));
        let b = builder.add_vertex(Point2::new(0.0, -40.0));
        builder.add_edge(hub, near, 3.0);
        builder.add_edge(near, far, 40.0);
        builder.add_edge(hub, a, 40.0);
        builder.add_edge(hub, b, 40.0);

        assert!(!builder.collapse_short_links(8.0));
        assert_eq!(builder.edge_count(), 4);
    }

    #[test]
    fn test_bridge_door_gap() {
        let mut wall = rectangle_mask();
        let mut door = GrayImage::new(100, 100);
        for y in 10..15 {
            for x in 40..56 {
                wall.put_pixel(x, y, Luma([0]));
                door.put_pixel(x, y, Luma([255]));
            }
        }
        let masks = MaskSet::new(wall, door, GrayImage::new(100, 100)).unwrap();
        let config = TopologyConfig::default();

        let open = extract_topology(&masks.wall, &config).unwrap();
        assert_eq!(open.vertex_ids().filter(|&v| open.degree(v) == 1).count(), 2);

        let closed = bridge_opening_gaps(&open, &masks, &config).unwrap();
        assert_eq!(closed.vertex_count(), 4);
        assert_eq!(closed.edge_count(), 4);
        assert_relative_eq!(closed.total_length(), 300.0, max_relative = 0.05);
    }

    #[test]
    fn test_no_bridge_without_opening() {
        let mut wall = rectangle_mask();
        for y in 10..15 {
            for x in 40..56 {
                wall.put_pixel(x, y, Luma([0]));
            }
        }
        let masks =
            MaskSet::new(wall, GrayImage::new(100, 100), GrayImage::new(100, 100)).unwrap();
        let config = TopologyConfig::default();
        let open = extract_topology(&masks.wall, &config).unwrap();
        let after = bridge_opening_gaps(&open, &masks, &config).unwrap();
        assert_eq!(after.edge_count(), open.edge_count());
    }
}
