// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Cutaway model construction
//!
//! Each wall-graph edge becomes a wall prism of fixed thickness, truncated
//! at `wall_height` with no roof. Corners are mitered: at every vertex the
//! face lines of angularly adjacent walls are intersected, so neighbouring
//! prisms meet without gaps. Vertices where mitering is not possible, and
//! every junction of three or more walls, get a hub prism filling the
//! remaining space. A floor slab spans the building footprint.
//!
//! Walls are kept as [`WallSpan`]s: a footprint plus a list of solid
//! intervals along the wall. Openings shrink the solid intervals and the
//! wall is re-emitted, no mesh booleans involved.

use crate::config::CutawayConfig;
use crate::error::{Error, Result};
use crate::normalizer::NormalizationContext;
use crate::room_detector::RoomSet;
use crate::wall_graph::{CoordinateSpace, EdgeId, VertexId, WallGraph};
use cutaway_geometry::{
    convex_hull, extrude_prism, line_intersection, offset_convex_polygon, signed_area, Element,
    Mesh,
};
use nalgebra::{Point2, Vector2};
use rustc_hash::FxHashSet;
use smallvec::SmallVec;

const EPS: f64 = 1e-9;

/// Closed interval along a wall, in meters from its start vertex
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Interval {
    pub start: f64,
    pub end: f64,
}

impl Interval {
    pub fn new(start: f64, end: f64) -> Self {
        Self { start, end }
    }

    #[inline]
    pub fn length(&self) -> f64 {
        self.end - self.start
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.length() <= EPS
    }

    pub fn overlaps(&self, other: &Interval) -> bool {
        self.start < other.end && other.start < self.end
    }
}

/// Void cut through a wall: its extent along the wall and its vertical range
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WallVoid {
    pub span: Interval,
    pub sill: f64,
    pub head: f64,
}

/// One wall prism, described along its centerline
#[derive(Debug, Clone)]
pub struct WallSpan {
    pub edge: EdgeId,
    pub start: Point2<f64>,
    pub end: Point2<f64>,
    /// Footprint corners: start-right, end-right, end-left, start-left
    pub corners: [Point2<f64>; 4],
    pub length: f64,
    pub thickness: f64,
    pub height: f64,
    /// Full-height solid parts, ascending and disjoint
    pub solid: Vec<Interval>,
    pub voids: Vec<WallVoid>,
}

impl WallSpan {
    /// Unit direction from start to end
    #[inline]
    pub fn direction(&self) -> Vector2<f64> {
        (self.end - self.start) / self.length
    }

    /// Unit normal pointing to the wall's left
    #[inline]
    pub fn normal(&self) -> Vector2<f64> {
        let d = self.direction();
        Vector2::new(-d.y, d.x)
    }

    /// Distance of the projection of `p` along the wall from its start
    #[inline]
    pub fn station(&self, p: &Point2<f64>) -> f64 {
        (p - self.start).dot(&self.direction())
    }

    /// Right and left footprint points of the cut at distance `s`
    pub fn cross_section(&self, s: f64) -> (Point2<f64>, Point2<f64>) {
        let center = self.start + self.direction() * s;
        let offset = self.normal() * (self.thickness / 2.0);
        (center - offset, center + offset)
    }

    /// The stretch of the wall whose cross-section is a full rectangle,
    /// clear of the mitered corners at either end
    pub fn usable_range(&self) -> Interval {
        let [sr, er, el, sl] = self.corners;
        let start = self.station(&sr).max(self.station(&sl)).max(0.0);
        let end = self.station(&er).min(self.station(&el)).min(self.length);
        Interval::new(start, end.max(start))
    }

    fn footprint(&self, span: &Interval) -> [Point2<f64>; 4] {
        let (sr, sl) = if span.start <= EPS {
            (self.corners[0], self.corners[3])
        } else {
            self.cross_section(span.start)
        };
        let (er, el) = if span.end >= self.length - EPS {
            (self.corners[1], self.corners[2])
        } else {
            self.cross_section(span.end)
        };
        [sr, er, el, sl]
    }

    /// Remove `span` from the solid intervals and record a void over it
    pub fn cut(&mut self, span: Interval, sill: f64, head: f64) {
        let mut solid = Vec::with_capacity(self.solid.len() + 1);
        for part in &self.solid {
            if !part.overlaps(&span) {
                solid.push(*part);
                continue;
            }
            let before = Interval::new(part.start, span.start);
            let after = Interval::new(span.end, part.end);
            if !before.is_empty() {
                solid.push(before);
            }
            if !after.is_empty() {
                solid.push(after);
            }
        }
        self.solid = solid;
        self.voids.push(WallVoid { span, sill, head });
    }

    /// Append the wall's prisms to `mesh`
    pub fn emit(&self, mesh: &mut Mesh) -> Result<()> {
        let element = Element::Wall(self.edge.0);
        for part in self.solid.iter().filter(|p| !p.is_empty()) {
            extrude_prism(mesh, &self.footprint(part), 0.0, self.height, element)?;
        }
        for void in &self.voids {
            let footprint = self.footprint(&void.span);
            if void.sill > EPS {
                extrude_prism(mesh, &footprint, 0.0, void.sill, element)?;
            }
            if void.head < self.height - EPS {
                extrude_prism(mesh, &footprint, void.head, self.height, element)?;
            }
        }
        Ok(())
    }
}

/// Cutaway mesh plus the wall spans it was built from
#[derive(Debug, Clone)]
pub struct CutawayModel {
    pub mesh: Mesh,
    pub walls: Vec<WallSpan>,
    pub junction_count: usize,
    /// Graph edges that produced no wall
    pub skipped_walls: Vec<EdgeId>,
}

impl CutawayModel {
    pub fn wall(&self, edge: EdgeId) -> Option<&WallSpan> {
        self.walls.iter().find(|w| w.edge == edge)
    }

    pub fn wall_mut(&mut self, edge: EdgeId) -> Option<&mut WallSpan> {
        self.walls.iter_mut().find(|w| w.edge == edge)
    }

    /// Replace a wall's faces with a fresh emission of its span. The mesh
    /// is left as it was if the span cannot be emitted.
    pub fn rebuild_wall(&mut self, edge: EdgeId) -> Result<()> {
        let span = self
            .wall(edge)
            .ok_or_else(|| Error::InvalidInput(format!("no wall for edge {}", edge.0)))?;
        let mut scratch = Mesh::new(self.mesh.name.clone());
        span.emit(&mut scratch)?;
        self.mesh.remove_element(Element::Wall(edge.0));
        self.mesh.merge(&scratch);
        Ok(())
    }
}

/// Left and right face corners of every wall end at one vertex
struct VertexCorners {
    /// (edge, left corner, right corner), relative to the edge leaving the vertex
    ends: SmallVec<[(EdgeId, Point2<f64>, Point2<f64>); 4]>,
    needs_hub: bool,
}

impl VertexCorners {
    fn get(&self, edge: EdgeId) -> Option<(Point2<f64>, Point2<f64>)> {
        self.ends
            .iter()
            .find(|(e, _, _)| *e == edge)
            .map(|(_, l, r)| (*l, *r))
    }
}

#[inline]
fn left_normal(d: &Vector2<f64>) -> Vector2<f64> {
    Vector2::new(-d.y, d.x)
}

fn miter_vertex(graph: &WallGraph, v: VertexId, half: f64, miter_limit: f64) -> VertexCorners {
    let p = graph.vertex(v);
    let mut spokes: SmallVec<[(f64, EdgeId, Vector2<f64>); 4]> = graph
        .incident_edges(v)
        .iter()
        .filter_map(|&e| graph.direction_from(e, v).map(|d| (d.y.atan2(d.x), e, d)))
        .collect();
    spokes.sort_by(|a, b| a.0.total_cmp(&b.0).then(a.1.cmp(&b.1)));

    let k = spokes.len();
    let mut left = vec![p; k];
    let mut right = vec![p; k];
    let mut needs_hub = k >= 3;

    for i in 0..k {
        let j = (i + 1) % k;
        let (di, dj) = (spokes[i].2, spokes[j].2);
        let on_left = p + left_normal(&di) * half;
        let on_right = p - left_normal(&dj) * half;
        let corner = if k > 1 {
            line_intersection(&on_left, &di, &on_right, &dj)
                .filter(|c| (c - p).norm() <= miter_limit * half)
        } else {
            None
        };
        match corner {
            Some(c) => {
                left[i] = c;
                right[j] = c;
            }
            None => {
                left[i] = on_left;
                right[j] = on_right;
                if k > 1 && (on_left - on_right).norm() > EPS {
                    needs_hub = true;
                }
            }
        }
    }

    VertexCorners {
        ends: (0..k).map(|i| (spokes[i].1, left[i], right[i])).collect(),
        needs_hub,
    }
}

fn hub_footprint(
    graph: &WallGraph,
    v: VertexId,
    corners: &VertexCorners,
    half: f64,
) -> Vec<Point2<f64>> {
    let p = graph.vertex(v);
    let mut points = vec![p];
    for &(e, l, r) in &corners.ends {
        points.push(l);
        points.push(r);
        if let Some(d) = graph.direction_from(e, v) {
            let n = left_normal(&d) * half;
            points.push(p + n);
            points.push(p - n);
        }
    }
    convex_hull(&points)
}

/// Extrude a metric wall graph and footprint into an open-top cutaway mesh.
///
/// Fails with [`Error::DegenerateWallGraph`] when fewer than three edges
/// remain, since no enclosed footprint can be formed.
pub fn build_cutaway(
    graph: &WallGraph,
    rooms: &RoomSet,
    context: &NormalizationContext,
    config: &CutawayConfig,
) -> Result<CutawayModel> {
    if graph.space() != CoordinateSpace::Metric || rooms.space != CoordinateSpace::Metric {
        return Err(Error::InvalidInput(
            "cutaway build expects metric input".to_string(),
        ));
    }
    if graph.edge_count() < 3 {
        return Err(Error::DegenerateWallGraph {
            edges: graph.edge_count(),
        });
    }

    let half = config.wall_thickness / 2.0;
    let height = config.wall_height;
    // Sub-pixel walls carry no information from the plan
    let min_length = context.to_meters(1.0);

    let mut corners: Vec<VertexCorners> = graph
        .vertex_ids()
        .map(|v| miter_vertex(graph, v, half, config.miter_limit))
        .collect();

    let mut walls = Vec::with_capacity(graph.edge_count());
    let mut skipped_walls = Vec::new();
    let mut square_ends: FxHashSet<VertexId> = FxHashSet::default();
    for e in graph.edge_ids() {
        let edge = *graph.edge(e);
        let (start, end) = graph.edge_endpoints(e);
        let length = (end - start).norm();
        if length < min_length {
            tracing::warn!(edge = e.0, length, "Skipping wall shorter than one pixel");
            skipped_walls.push(e);
            continue;
        }
        let (Some((left_a, right_a)), Some((left_b, right_b))) =
            (corners[edge.a.index()].get(e), corners[edge.b.index()].get(e))
        else {
            tracing::warn!(edge = e.0, "Skipping wall without corner points");
            skipped_walls.push(e);
            continue;
        };

        let mut span = WallSpan {
            edge: e,
            start,
            end,
            // At the far vertex the edge points backwards, so sides swap
            corners: [right_a, left_b, right_b, left_a],
            length,
            thickness: config.wall_thickness,
            height,
            solid: vec![Interval::new(0.0, length)],
            voids: Vec::new(),
        };

        // Corners from both ends crossing over: the wall is too short for
        // its miters, so square it off and let hubs close the joints
        let [sr, er, el, sl] = span.corners;
        if span.station(&sr) >= span.station(&er) - EPS
            || span.station(&sl) >= span.station(&el) - EPS
        {
            let (r0, l0) = span.cross_section(0.0);
            let (r1, l1) = span.cross_section(length);
            span.corners = [r0, r1, l1, l0];
            square_ends.insert(edge.a);
            square_ends.insert(edge.b);
        }
        walls.push(span);
    }
    for v in &square_ends {
        corners[v.index()].needs_hub = true;
    }

    let mut mesh = Mesh::new(config.mesh_name.clone());
    for span in &walls {
        span.emit(&mut mesh)?;
    }

    let mut junction_count = 0;
    for v in graph.vertex_ids() {
        let vc = &corners[v.index()];
        if !vc.needs_hub {
            continue;
        }
        let hub = hub_footprint(graph, v, vc, half);
        if hub.len() < 3 || signed_area(&hub).abs() < EPS {
            continue;
        }
        extrude_prism(&mut mesh, &hub, 0.0, height, Element::Junction(v.0))?;
        junction_count += 1;
    }

    let footprint = if rooms.boundary.len() >= 3 {
        rooms.boundary.clone()
    } else {
        convex_hull(graph.vertices())
    };
    let slab = offset_convex_polygon(&footprint, half);
    extrude_prism(&mut mesh, &slab, -config.slab_thickness, 0.0, Element::Slab)?;

    tracing::info!(
        walls = walls.len(),
        skipped_walls = skipped_walls.len(),
        junctions = junction_count,
        vertices = mesh.vertex_count(),
        faces = mesh.face_count(),
        "Built cutaway mesh"
    );

    Ok(CutawayModel {
        mesh,
        walls,
        junction_count,
        skipped_walls,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::NormalizeConfig;
    use crate::normalizer::normalize;
    use crate::room_detector::Room;
    use approx::assert_relative_eq;

    /// Pixel graph and rooms scaled so the rectangle is `w` by `h` meters
    fn metric_fixture(
        vertices: Vec<Point2<f64>>,
        edges: Vec<(u32, u32, f64)>,
        width_m: f64,
    ) -> (WallGraph, RoomSet, NormalizationContext) {
        let graph = WallGraph::from_parts(vertices, edges, CoordinateSpace::Pixel).unwrap();
        let rooms = RoomSet {
            rooms: vec![Room {
                id: 0,
                pixels: vec![(1, 1)],
                centroid: Point2::new(1.0, 1.0),
                area: 1.0,
                perimeter: 1.0,
                bbox: (Point2::new(1.0, 1.0), Point2::new(1.0, 1.0)),
            }],
            boundary: convex_hull(graph.vertices()),
            image_size: (1000, 1000),
            space: CoordinateSpace::Pixel,
        };
        let config = NormalizeConfig {
            target_width_m: width_m,
        };
        let n = normalize((1000, 1000), &graph, &rooms, &config).unwrap();
        (n.graph, n.rooms, n.context)
    }

    fn rectangle() -> (WallGraph, RoomSet, NormalizationContext) {
        metric_fixture(
            vec![
                Point2::new(0.0, 0.0),
                Point2::new(100.0, 0.0),
                Point2::new(100.0, 80.0),
                Point2::new(0.0, 80.0),
            ],
            vec![(0, 1, 100.0), (1, 2, 80.0), (2, 3, 100.0), (3, 0, 80.0)],
            10.0,
        )
    }

    #[test]
    fn test_rectangle_cutaway() {
        let (graph, rooms, context) = rectangle();
        let model = build_cutaway(&graph, &rooms, &context, &CutawayConfig::default()).unwrap();
        assert!(model.skipped_walls.is_empty());

        // 4 walls + slab, all boxes, no hubs at right-angle corners
        assert_eq!(model.walls.len(), 4);
        assert_eq!(model.junction_count, 0);
        assert_eq!(model.mesh.vertex_count(), 5 * 8);
        assert_eq!(model.mesh.face_count(), 5 * 6);
        let n = model.mesh.vertex_count() as u32;
        assert!(model
            .mesh
            .faces
            .iter()
            .all(|f| f.indices.iter().all(|&i| i < n)));

        let bounds = model.mesh.bounds().unwrap();
        assert_relative_eq!(bounds.min.x, -0.11, epsilon = 1e-9);
        assert_relative_eq!(bounds.max.x, 10.11, epsilon = 1e-9);
        assert_relative_eq!(bounds.max.z, 8.11, epsilon = 1e-9);
        assert_relative_eq!(bounds.max.y, 1.4, epsilon = 1e-12);
        assert_relative_eq!(bounds.min.y, -0.135, epsilon = 1e-12);
    }

    #[test]
    fn test_sub_pixel_wall_is_recorded() {
        // left wall split half a pixel above the top-left corner
        let (graph, rooms, context) = metric_fixture(
            vec![
                Point2::new(0.0, 0.0),
                Point2::new(100.0, 0.0),
                Point2::new(100.0, 80.0),
                Point2::new(0.0, 80.0),
                Point2::new(0.0, 0.5),
            ],
            vec![
                (0, 1, 100.0),
                (1, 2, 80.0),
                (2, 3, 100.0),
                (3, 4, 79.5),
                (4, 0, 0.5),
            ],
            10.0,
        );
        let model = build_cutaway(&graph, &rooms, &context, &CutawayConfig::default()).unwrap();
        assert_eq!(model.walls.len(), 4);
        assert_eq!(model.skipped_walls.len(), 1);
        let skipped = model.skipped_walls[0];
        assert!(graph.edge_length(skipped) < context.to_meters(1.0));
        assert!(model.wall(skipped).is_none());
        assert!(!model.mesh.elements().contains(&Element::Wall(skipped.0)));
    }

    #[test]
    fn test_mitered_corner_points() {
        let (graph, rooms, context) = rectangle();
        let model = build_cutaway(&graph, &rooms, &context, &CutawayConfig::default()).unwrap();
        let top = model.wall(EdgeId(0)).unwrap();
        assert_relative_eq!(top.length, 10.0, epsilon = 1e-9);
        let usable = top.usable_range();
        assert_relative_eq!(usable.start, 0.11, epsilon = 1e-9);
        assert_relative_eq!(usable.end, 9.89, epsilon = 1e-9);

        // every wall corner sits exactly half a thickness off the centerline
        for wall in &model.walls {
            for c in &wall.corners {
                let offset = (c - wall.start).dot(&wall.normal()).abs();
                assert_relative_eq!(offset, 0.11, epsilon = 1e-9);
            }
        }
    }

    #[test]
    fn test_faces_point_outward() {
        let (graph, rooms, context) = rectangle();
        let model = build_cutaway(&graph, &rooms, &context, &CutawayConfig::default()).unwrap();
        let mesh = &model.mesh;
        for element in mesh.elements() {
            let faces: Vec<_> = mesh.faces.iter().filter(|f| f.element == element).collect();
            let points: Vec<_> = faces.iter().flat_map(|f| mesh.face_points(f)).collect();
            let center = points.iter().fold(nalgebra::Vector3::zeros(), |acc, p| acc + p.coords)
                / points.len() as f64;
            for face in faces {
                let p = mesh.face_points(face)[0];
                assert!(mesh.face_normal(face).dot(&(p.coords - center)) > 0.0);
            }
        }
    }

    #[test]
    fn test_junction_gets_hub() {
        let (graph, rooms, context) = metric_fixture(
            vec![
                Point2::new(0.0, 0.0),
                Point2::new(50.0, 0.0),
                Point2::new(100.0, 0.0),
                Point2::new(100.0, 80.0),
                Point2::new(50.0, 80.0),
                Point2::new(0.0, 80.0),
            ],
            vec![
                (0, 1, 50.0),
                (1, 2, 50.0),
                (2, 3, 80.0),
                (3, 4, 50.0),
                (4, 5, 50.0),
                (5, 0, 80.0),
                (1, 4, 80.0),
            ],
            10.0,
        );
        let model = build_cutaway(&graph, &rooms, &context, &CutawayConfig::default()).unwrap();
        assert_eq!(model.walls.len(), 7);
        assert_eq!(model.junction_count, 2);
        assert!(model.mesh.elements().contains(&Element::Junction(1)));
    }

    #[test]
    fn test_too_few_edges() {
        let (graph, rooms, context) = metric_fixture(
            vec![Point2::new(0.0, 0.0), Point2::new(100.0, 0.0), Point2::new(50.0, 60.0)],
            vec![(0, 1, 100.0), (1, 2, 78.0)],
            10.0,
        );
        assert!(matches!(
            build_cutaway(&graph, &rooms, &context, &CutawayConfig::default()),
            Err(Error::DegenerateWallGraph { edges: 2 })
        ));
    }

    #[test]
    fn test_cut_splits_solid() {
        let (graph, rooms, context) = rectangle();
        let mut model =
            build_cutaway(&graph, &rooms, &context, &CutawayConfig::default()).unwrap();
        let before = model.mesh.face_count();
        model
            .wall_mut(EdgeId(0))
            .unwrap()
            .cut(Interval::new(4.0, 5.0), 0.7, 1.2);
        model.rebuild_wall(EdgeId(0)).unwrap();

        let wall = model.wall(EdgeId(0)).unwrap();
        assert_eq!(wall.solid, vec![Interval::new(0.0, 4.0), Interval::new(5.0, 10.0)]);
        // one box became four: two solid parts, below sill, above head
        assert_eq!(model.mesh.face_count(), before + 18);
    }
}
