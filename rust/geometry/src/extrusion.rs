// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Extrusion operations - converting plan footprints to closed prisms
//!
//! Plan coordinates `(x, y)` map to mesh coordinates `(X = x, Z = y)`; the
//! prism rises along +Y.

use crate::error::{Error, Result};
use crate::mesh::{Element, Mesh};
use crate::polygon::signed_area;
use nalgebra::{Point2, Point3, Vector3};

const MIN_FOOTPRINT_AREA: f64 = 1e-10;

/// Lift a plan point to a mesh vertex at height `y`
#[inline]
pub fn plan_to_world(p: &Point2<f64>, y: f64) -> Point3<f64> {
    Point3::new(p.x, y, p.y)
}

/// Extrude a simple polygon footprint into a closed prism between `y_bottom`
/// and `y_top`, appending it to `mesh` with every face oriented outward.
///
/// Emits one bottom cap, one top cap and a quad per footprint edge. All
/// faces share the prism's `2n` vertices, so the prism is closed on its own.
pub fn extrude_prism(
    mesh: &mut Mesh,
    footprint: &[Point2<f64>],
    y_bottom: f64,
    y_top: f64,
    element: Element,
) -> Result<()> {
    if y_top - y_bottom <= 0.0 {
        return Err(Error::InvalidExtrusion(format!(
            "Prism height must be positive (got {:.4})",
            y_top - y_bottom
        )));
    }

    let mut ring: Vec<Point2<f64>> = Vec::with_capacity(footprint.len());
    for p in footprint {
        if ring.last().map_or(true, |q: &Point2<f64>| (p - q).norm() > 1e-9) {
            ring.push(*p);
        }
    }
    while ring.len() > 1 && (ring[0] - ring[ring.len() - 1]).norm() <= 1e-9 {
        ring.pop();
    }

    if ring.len() < 3 {
        return Err(Error::InvalidProfile(format!(
            "Footprint needs at least 3 distinct points, got {}",
            ring.len()
        )));
    }

    let area = signed_area(&ring);
    if area.abs() < MIN_FOOTPRINT_AREA {
        return Err(Error::InvalidProfile("Footprint has zero area".to_string()));
    }
    // Orientation of the plan ring decides which side of an edge is outside
    let side = if area > 0.0 { 1.0 } else { -1.0 };

    let n = ring.len() as u32;
    let base = mesh.vertex_count() as u32;
    for p in &ring {
        mesh.add_vertex(plan_to_world(p, y_bottom));
    }
    for p in &ring {
        mesh.add_vertex(plan_to_world(p, y_top));
    }

    create_caps(mesh, base, n, element);
    create_side_walls(mesh, &ring, base, side, element);

    Ok(())
}

fn create_caps(mesh: &mut Mesh, base: u32, n: u32, element: Element) {
    mesh.add_face_facing(base..base + n, element, &-Vector3::y());
    mesh.add_face_facing(base + n..base + 2 * n, element, &Vector3::y());
}

fn create_side_walls(
    mesh: &mut Mesh,
    ring: &[Point2<f64>],
    base: u32,
    side: f64,
    element: Element,
) {
    let n = ring.len() as u32;
    for i in 0..n {
        let j = (i + 1) % n;
        let d = ring[j as usize] - ring[i as usize];
        let outward = Vector3::new(d.y, 0.0, -d.x) * side;
        mesh.add_face_facing(
            [base + i, base + j, base + n + j, base + n + i],
            element,
            &outward,
        );
    }
}
