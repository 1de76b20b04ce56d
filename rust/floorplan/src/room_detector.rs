// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Room detection via connected components of free space
//!
//! Every pixel not blocked by a wall, door or window is a free pixel. Free
//! pixels are joined with their 4-neighbours in a union-find; components
//! touching the image border are the outside, everything else is a room.

use crate::config::RoomConfig;
use crate::error::{Error, Result};
use crate::masks;
use crate::union_find::UnionFind;
use crate::wall_graph::{CoordinateSpace, WallGraph};
use cutaway_geometry::convex_hull;
use image::GrayImage;
use nalgebra::Point2;
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

/// An enclosed interior region
#[derive(Debug, Clone)]
pub struct Room {
    pub id: u32,
    /// Member pixels `(x, y)` in raster order. Membership never changes,
    /// even after the room is rescaled.
    pub pixels: Vec<(u32, u32)>,
    pub centroid: Point2<f64>,
    /// Pixel count in pixel space, square meters once normalized
    pub area: f64,
    /// Count of member pixels with a 4-neighbour outside the room
    pub perimeter: f64,
    /// Axis-aligned extent (min, max)
    pub bbox: (Point2<f64>, Point2<f64>),
}

impl Room {
    /// True when `p` lies inside the room's bounding box
    pub fn bbox_contains(&self, p: &Point2<f64>) -> bool {
        let (lo, hi) = &self.bbox;
        p.x >= lo.x && p.x <= hi.x && p.y >= lo.y && p.y <= hi.y
    }
}

/// Summary numbers reported for a room set
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RoomSummary {
    pub room_count: usize,
    pub total_room_area: f64,
    pub avg_room_area: f64,
}

/// Rooms of one floor plan and the building footprint around them
#[derive(Debug, Clone)]
pub struct RoomSet {
    pub rooms: Vec<Room>,
    /// Counter-clockwise footprint polygon
    pub boundary: Vec<Point2<f64>>,
    /// Source image (height, width) in pixels
    pub image_size: (u32, u32),
    pub space: CoordinateSpace,
}

impl RoomSet {
    #[inline]
    pub fn room_count(&self) -> usize {
        self.rooms.len()
    }

    pub fn total_area(&self) -> f64 {
        self.rooms.iter().map(|r| r.area).sum()
    }

    pub fn summary(&self) -> RoomSummary {
        let total = self.total_area();
        RoomSummary {
            room_count: self.room_count(),
            total_room_area: total,
            avg_room_area: if self.rooms.is_empty() {
                0.0
            } else {
                total / self.rooms.len() as f64
            },
        }
    }

    /// New room set with lengths scaled by `factor` and areas by its square
    pub fn scaled(&self, factor: f64, space: CoordinateSpace) -> RoomSet {
        let scale = |p: &Point2<f64>| Point2::from(p.coords * factor);
        RoomSet {
            rooms: self
                .rooms
                .iter()
                .map(|r| Room {
                    id: r.id,
                    pixels: r.pixels.clone(),
                    centroid: scale(&r.centroid),
                    area: r.area * factor * factor,
                    perimeter: r.perimeter * factor,
                    bbox: (scale(&r.bbox.0), scale(&r.bbox.1)),
                })
                .collect(),
            boundary: self.boundary.iter().map(scale).collect(),
            image_size: self.image_size,
            space,
        }
    }
}

struct Component {
    pixels: Vec<(u32, u32)>,
    touches_border: bool,
}

/// Pixel count of a mask, which must fit the u32 labels of the union-find
fn pixel_count(width: u32, height: u32) -> Result<usize> {
    let count = width as usize * height as usize;
    if count > u32::MAX as usize {
        return Err(Error::InvalidInput(format!(
            "{}x{} mask has too many pixels for room labelling",
            width, height
        )));
    }
    Ok(count)
}

/// Find enclosed rooms in a barrier mask (walls plus openings).
///
/// Rooms are ordered, and numbered, by their first pixel in raster order.
/// Fails with [`Error::NoRooms`] when nothing enclosed survives the area
/// threshold.
pub fn detect_rooms(barrier: &GrayImage, graph: &WallGraph, config: &RoomConfig) -> Result<RoomSet> {
    if graph.space() != CoordinateSpace::Pixel {
        return Err(Error::InvalidInput(
            "room detection needs a pixel-space wall graph".to_string(),
        ));
    }

    let (width, height) = barrier.dimensions();
    let count = pixel_count(width, height)?;
    let idx = |x: u32, y: u32| y * width + x;
    let free = |x: u32, y: u32| !masks::is_set(barrier, x, y);

    let mut uf = UnionFind::new(count);
    for y in 0..height {
        for x in 0..width {
            if !free(x, y) {
                continue;
            }
            if x + 1 < width && free(x + 1, y) {
                uf.union(idx(x, y), idx(x + 1, y));
            }
            if y + 1 < height && free(x, y + 1) {
                uf.union(idx(x, y), idx(x, y + 1));
            }
        }
    }

    // Gather components in order of first appearance
    let mut slots: FxHashMap<u32, usize> = FxHashMap::default();
    let mut components: Vec<Component> = Vec::new();
    let mut roots = vec![u32::MAX; count];
    for y in 0..height {
        for x in 0..width {
            if !free(x, y) {
                continue;
            }
            let root = uf.find(idx(x, y));
            roots[idx(x, y) as usize] = root;
            let slot = *slots.entry(root).or_insert_with(|| {
                components.push(Component {
                    pixels: Vec::new(),
                    touches_border: false,
                });
                components.len() - 1
            });
            let component = &mut components[slot];
            component.pixels.push((x, y));
            if x == 0 || y == 0 || x + 1 == width || y + 1 == height {
                component.touches_border = true;
            }
        }
    }

    let exterior = components.iter().filter(|c| c.touches_border).count();
    let mut noise = 0usize;
    let mut rooms = Vec::new();
    let mut hull_points: Vec<Point2<f64>> = Vec::new();

    for component in components {
        if component.touches_border {
            continue;
        }
        if (component.pixels.len() as u64) < config.min_room_area as u64 {
            noise += 1;
            continue;
        }
        let (x0, y0) = component.pixels[0];
        let root = roots[idx(x0, y0) as usize];
        let same = |x: i64, y: i64| {
            x >= 0
                && y >= 0
                && (x as u32) < width
                && (y as u32) < height
                && roots[idx(x as u32, y as u32) as usize] == root
        };

        let (mut sx, mut sy) = (0.0, 0.0);
        let (mut lo, mut hi) = ((u32::MAX, u32::MAX), (0u32, 0u32));
        let mut perimeter = 0usize;
        for &(x, y) in &component.pixels {
            sx += x as f64;
            sy += y as f64;
            lo = (lo.0.min(x), lo.1.min(y));
            hi = (hi.0.max(x), hi.1.max(y));
            let (xi, yi) = (x as i64, y as i64);
            if !(same(xi - 1, yi) && same(xi + 1, yi) && same(xi, yi - 1) && same(xi, yi + 1)) {
                perimeter += 1;
                // Boundary pixels span the same hull as the whole region
                hull_points.push(Point2::new(x as f64, y as f64));
            }
        }

        let n = component.pixels.len() as f64;
        rooms.push(Room {
            id: rooms.len() as u32,
            centroid: Point2::new(sx / n, sy / n),
            area: n,
            perimeter: perimeter as f64,
            bbox: (
                Point2::new(lo.0 as f64, lo.1 as f64),
                Point2::new(hi.0 as f64, hi.1 as f64),
            ),
            pixels: component.pixels,
        });
    }

    if rooms.is_empty() {
        return Err(Error::NoRooms {
            min_area: config.min_room_area,
        });
    }

    hull_points.extend_from_slice(graph.vertices());
    let boundary = convex_hull(&hull_points);

    let set = RoomSet {
        rooms,
        boundary,
        image_size: (height, width),
        space: CoordinateSpace::Pixel,
    };
    tracing::info!(
        rooms = set.room_count(),
        exterior_regions = exterior,
        noise_regions = noise,
        total_area_px = set.total_area(),
        "Detected rooms"
    );
    Ok(set)
}
