// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Metric normalization
//!
//! A floor plan image carries no scale, so the footprint is assumed to be
//! `target_width_m` wide and every pixel-space quantity is multiplied by the
//! resulting meters-per-pixel factor.

use crate::config::NormalizeConfig;
use crate::error::{Error, Result};
use crate::room_detector::RoomSet;
use crate::wall_graph::{CoordinateSpace, WallGraph};
use nalgebra::Point2;
use serde::Serialize;

/// Pixel to meter conversion shared read-only by the later stages
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct NormalizationContext {
    scale_factor: f64,
    pixels_per_meter: f64,
    target_width_m: f64,
    footprint_width_px: f64,
    image_size: (u32, u32),
}

impl NormalizationContext {
    /// Meters per pixel; the multiplier applied to every coordinate
    #[inline]
    pub fn scale_factor(&self) -> f64 {
        self.scale_factor
    }

    #[inline]
    pub fn pixels_per_meter(&self) -> f64 {
        self.pixels_per_meter
    }

    #[inline]
    pub fn target_width_m(&self) -> f64 {
        self.target_width_m
    }

    #[inline]
    pub fn footprint_width_px(&self) -> f64 {
        self.footprint_width_px
    }

    /// Source image (height, width)
    #[inline]
    pub fn image_size(&self) -> (u32, u32) {
        self.image_size
    }

    #[inline]
    pub fn to_meters(&self, pixels: f64) -> f64 {
        pixels * self.scale_factor
    }

    #[inline]
    pub fn to_pixels(&self, meters: f64) -> f64 {
        meters * self.pixels_per_meter
    }

    #[inline]
    pub fn point_to_meters(&self, p: &Point2<f64>) -> Point2<f64> {
        Point2::from(p.coords * self.scale_factor)
    }

    #[inline]
    pub fn point_to_pixels(&self, p: &Point2<f64>) -> Point2<f64> {
        Point2::from(p.coords * self.pixels_per_meter)
    }
}

/// Rescaled geometry plus the context that produced it
#[derive(Debug, Clone)]
pub struct Normalized {
    pub context: NormalizationContext,
    pub graph: WallGraph,
    pub rooms: RoomSet,
}

fn x_extent(points: &[Point2<f64>]) -> Option<f64> {
    let first = points.first()?;
    let (lo, hi) = points
        .iter()
        .fold((first.x, first.x), |(lo, hi), p| (lo.min(p.x), hi.max(p.x)));
    Some(hi - lo)
}

/// Rescale a pixel-space wall graph and room set to meters.
///
/// The footprint width is the x-extent of the room boundary, or of the wall
/// graph when the boundary is empty. Topology and room membership are left
/// untouched; inputs are never modified.
pub fn normalize(
    image_size: (u32, u32),
    graph: &WallGraph,
    rooms: &RoomSet,
    config: &NormalizeConfig,
) -> Result<Normalized> {
    if graph.space() != CoordinateSpace::Pixel || rooms.space != CoordinateSpace::Pixel {
        return Err(Error::InvalidInput(
            "normalization expects pixel-space input".to_string(),
        ));
    }
    if !(config.target_width_m.is_finite() && config.target_width_m > 0.0) {
        return Err(Error::InvalidConfig(format!(
            "target width must be positive (got {})",
            config.target_width_m
        )));
    }

    let footprint_width_px = x_extent(&rooms.boundary)
        .or_else(|| graph.bounds().map(|(lo, hi)| hi.x - lo.x))
        .ok_or_else(|| {
            Error::UndetectableFootprint("no boundary polygon and no wall vertices".to_string())
        })?;
    if !(footprint_width_px.is_finite() && footprint_width_px > 0.0) {
        return Err(Error::UndetectableFootprint(format!(
            "footprint width is {} px",
            footprint_width_px
        )));
    }

    let scale_factor = config.target_width_m / footprint_width_px;
    let context = NormalizationContext {
        scale_factor,
        pixels_per_meter: footprint_width_px / config.target_width_m,
        target_width_m: config.target_width_m,
        footprint_width_px,
        image_size,
    };

    let graph = graph.scaled(scale_factor, CoordinateSpace::Metric);
    let rooms = rooms.scaled(scale_factor, CoordinateSpace::Metric);

    tracing::info!(
        footprint_width_px,
        target_width_m = config.target_width_m,
        scale_factor,
        "Normalized to meters"
    );

    Ok(Normalized {
        context,
        graph,
        rooms,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::room_detector::Room;
    use approx::assert_relative_eq;

    fn fixture() -> (WallGraph, RoomSet) {
        let graph = WallGraph::from_parts(
            vec![
                Point2::new(10.0, 10.0),
                Point2::new(210.0, 10.0),
                Point2::new(210.0, 170.0),
                Point2::new(10.0, 170.0),
            ],
            vec![(0, 1, 200.0), (1, 2, 160.0), (2, 3, 200.0), (3, 0, 160.0)],
            CoordinateSpace::Pixel,
        )
        .unwrap();
        let rooms = RoomSet {
            rooms: vec![Room {
                id: 0,
                pixels: vec![(20, 20), (21, 20)],
                centroid: Point2::new(110.0, 90.0),
                area: 2.0,
                perimeter: 2.0,
                bbox: (Point2::new(20.0, 20.0), Point2::new(200.0, 160.0)),
            }],
            boundary: vec![
                Point2::new(10.0, 10.0),
                Point2::new(210.0, 10.0),
                Point2::new(210.0, 170.0),
                Point2::new(10.0, 170.0),
            ],
            image_size: (200, 240),
            space: CoordinateSpace::Pixel,
        };
        (graph, rooms)
    }

    #[test]
    fn test_scale_factor() {
        let (graph, rooms) = fixture();
        let n = normalize((200, 240), &graph, &rooms, &NormalizeConfig::default()).unwrap();
        assert_relative_eq!(n.context.scale_factor(), 0.05);
        assert_relative_eq!(n.context.pixels_per_meter(), 20.0);
        assert_relative_eq!(n.context.to_pixels(n.context.to_meters(37.0)), 37.0);
        assert_eq!(n.graph.space(), CoordinateSpace::Metric);
        assert_relative_eq!(n.graph.total_length(), 36.0, epsilon = 1e-9);
        assert_relative_eq!(n.rooms.rooms[0].area, 2.0 * 0.0025, epsilon = 1e-12);
    }

    #[test]
    fn test_round_trip_and_topology() {
        let (graph, rooms) = fixture();
        let n = normalize((200, 240), &graph, &rooms, &NormalizeConfig::default()).unwrap();
        assert_eq!(n.graph.vertex_count(), graph.vertex_count());
        assert_eq!(n.rooms.room_count(), rooms.room_count());
        for (m, p) in n.graph.vertices().iter().zip(graph.vertices()) {
            let back = n.context.point_to_pixels(m);
            assert_relative_eq!(back.x, p.x, epsilon = 1e-9);
            assert_relative_eq!(back.y, p.y, epsilon = 1e-9);
        }
        for (a, b) in n.graph.edges().iter().zip(graph.edges()) {
            assert_eq!((a.a, a.b), (b.a, b.b));
        }
        // inputs untouched
        assert_eq!(graph.space(), CoordinateSpace::Pixel);
        assert_relative_eq!(rooms.rooms[0].centroid.x, 110.0);
    }

    #[test]
    fn test_falls_back_to_graph_bounds() {
        let (graph, mut rooms) = fixture();
        rooms.boundary.clear();
        let n = normalize((200, 240), &graph, &rooms, &NormalizeConfig::default()).unwrap();
        assert_relative_eq!(n.context.footprint_width_px(), 200.0);
    }

    #[test]
    fn test_degenerate_footprint() {
        let (graph, mut rooms) = fixture();
        rooms.boundary = vec![Point2::new(5.0, 0.0), Point2::new(5.0, 10.0)];
        assert!(matches!(
            normalize((200, 240), &graph, &rooms, &NormalizeConfig::default()),
            Err(Error::UndetectableFootprint(_))
        ));
    }

    #[test]
    fn test_rejects_metric_input() {
        let (graph, rooms) = fixture();
        let metric = graph.scaled(0.1, CoordinateSpace::Metric);
        assert!(matches!(
            normalize((200, 240), &metric, &rooms, &NormalizeConfig::default()),
            Err(Error::InvalidInput(_))
        ));
    }
}
