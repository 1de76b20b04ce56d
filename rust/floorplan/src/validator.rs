// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Geometric and architectural conformance checks
//!
//! Every check runs, in a fixed order, whatever the earlier ones found.
//! The mesh is only read.

use crate::config::{DimensionLimits, Range, ValidationConfig};
use crate::error::Result;
use crate::room_detector::RoomSet;
use crate::wall_graph::{EdgeId, WallGraph};
use cutaway_geometry::{Element, Mesh};
use nalgebra::{Point2, Vector2};
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

/// Outcome of one named check
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckResult {
    pub name: String,
    pub passed: bool,
    pub message: String,
}

impl CheckResult {
    fn new(name: &str, passed: bool, message: impl Into<String>) -> Self {
        Self {
            name: name.to_string(),
            passed,
            message: message.into(),
        }
    }
}

/// Ordered check list plus non-fatal warnings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationResult {
    /// True when every check passed
    pub passed: bool,
    pub checks: Vec<CheckResult>,
    pub warnings: Vec<String>,
}

impl ValidationResult {
    pub fn failed_checks(&self) -> Vec<&CheckResult> {
        self.checks.iter().filter(|c| !c.passed).collect()
    }

    pub fn check(&self, name: &str) -> Option<&CheckResult> {
        self.checks.iter().find(|c| c.name == name)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

/// Run all checks against a finished cutaway mesh.
///
/// `expected_wall_count` is the number of walls the mesh should contain;
/// the pipeline passes the wall graph's edge count.
pub fn validate(
    mesh: &Mesh,
    graph: &WallGraph,
    rooms: &RoomSet,
    expected_wall_count: usize,
    limits: &DimensionLimits,
    config: &ValidationConfig,
) -> ValidationResult {
    let mut warnings = Vec::new();
    let checks = vec![
        check_indices(mesh),
        check_degenerate_faces(mesh, config),
        check_manifold(mesh, config),
        check_wall_thickness(mesh, graph, limits, config, &mut warnings),
        check_wall_height(mesh, limits, config, &mut warnings),
        check_slab_thickness(mesh, limits, config, &mut warnings),
        check_room_count(rooms),
        check_wall_count(mesh, graph, expected_wall_count),
    ];

    let result = ValidationResult {
        passed: checks.iter().all(|c| c.passed),
        checks,
        warnings,
    };
    for check in result.failed_checks() {
        tracing::debug!(check = %check.name, message = %check.message, "Validation check failed");
    }
    tracing::info!(
        passed = result.passed,
        failed = result.failed_checks().len(),
        warnings = result.warnings.len(),
        "Validated mesh"
    );
    result
}

fn check_indices(mesh: &Mesh) -> CheckResult {
    let n = mesh.vertex_count() as u32;
    let bad = mesh
        .faces
        .iter()
        .filter(|f| f.indices.iter().any(|&i| i >= n))
        .count();
    if bad == 0 {
        CheckResult::new(
            "index_validity",
            true,
            format!("{} faces reference {} vertices", mesh.face_count(), n),
        )
    } else {
        CheckResult::new(
            "index_validity",
            false,
            format!("{} faces reference vertices beyond {}", bad, n),
        )
    }
}

fn check_degenerate_faces(mesh: &Mesh, config: &ValidationConfig) -> CheckResult {
    let degenerate = mesh
        .faces
        .iter()
        .filter(|f| f.distinct_count() < 3 || mesh.face_area(f) < config.min_face_area)
        .count();
    CheckResult::new(
        "degenerate_faces",
        degenerate == 0,
        if degenerate == 0 {
            "no degenerate faces".to_string()
        } else {
            format!("{} faces have fewer than 3 distinct vertices or no area", degenerate)
        },
    )
}

fn check_manifold(mesh: &Mesh, config: &ValidationConfig) -> CheckResult {
    let n = mesh.vertex_count() as u32;
    let mut uses: FxHashMap<(u32, u32), u32> = FxHashMap::default();
    for face in &mesh.faces {
        let k = face.indices.len();
        for i in 0..k {
            let (a, b) = (face.indices[i], face.indices[(i + 1) % k]);
            if a == b || a >= n || b >= n {
                continue;
            }
            *uses.entry((a.min(b), a.max(b))).or_default() += 1;
        }
    }

    // Wall tops are the intentional open boundary
    let top = mesh.bounds_where(|e| e.is_wall()).map(|b| b.max.y);
    let on_top = |i: u32| {
        top.map_or(false, |y| {
            (mesh.vertices[i as usize].y - y).abs() <= config.open_top_tolerance
        })
    };

    let mut open = 0usize;
    let mut overused = 0usize;
    for (&(a, b), &count) in &uses {
        if count > 2 {
            overused += 1;
        } else if count == 1 && !(on_top(a) && on_top(b)) {
            open += 1;
        }
    }

    let passed = open == 0 && overused == 0;
    CheckResult::new(
        "manifold",
        passed,
        if passed {
            format!("{} edges, all closed or on the open top", uses.len())
        } else {
            format!(
                "{} boundary edges below the open top, {} edges shared by more than two faces",
                open, overused
            )
        },
    )
}

/// Measure one value per item against a range. Values within the warning
/// margin of a bound, on either side, add a warning instead of failing.
fn check_range(
    name: &str,
    unit_name: &str,
    measured: &[(String, f64)],
    range: &Range,
    config: &ValidationConfig,
    warnings: &mut Vec<String>,
) -> CheckResult {
    if measured.is_empty() {
        return CheckResult::new(name, false, format!("no {} found in the mesh", unit_name));
    }
    let failing: Vec<String> = measured
        .iter()
        .filter(|(_, v)| !range.tolerates(*v, config.warning_margin))
        .map(|(label, v)| format!("{} {:.4} m", label, v))
        .collect();
    for (label, v) in measured {
        if range.near_bound(*v, config.warning_margin) {
            warnings.push(format!(
                "{}: {} {:.4} m is {} the {:.3}-{:.3} m limits, within {:.0}% of a bound",
                name,
                label,
                v,
                if range.contains(*v) { "inside" } else { "outside" },
                range.min,
                range.max,
                config.warning_margin * 100.0
            ));
        }
    }

    let (lo, hi) = measured
        .iter()
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), (_, v)| {
            (lo.min(*v), hi.max(*v))
        });
    if failing.is_empty() {
        CheckResult::new(
            name,
            true,
            format!(
                "{} {} measure {:.4}-{:.4} m, accepted against {:.3}-{:.3} m",
                measured.len(),
                unit_name,
                lo,
                hi,
                range.min,
                range.max
            ),
        )
    } else {
        CheckResult::new(
            name,
            false,
            format!(
                "outside {:.3}-{:.3} m: {}",
                range.min,
                range.max,
                failing.join(", ")
            ),
        )
    }
}

/// Vertex indices used by each wall element, keyed by edge id
fn wall_vertices(mesh: &Mesh) -> Vec<(u32, Vec<u32>)> {
    let mut by_wall: FxHashMap<u32, Vec<u32>> = FxHashMap::default();
    for face in &mesh.faces {
        if let Element::Wall(e) = face.element {
            by_wall.entry(e).or_default().extend(face.indices.iter().copied());
        }
    }
    let mut walls: Vec<(u32, Vec<u32>)> = by_wall.into_iter().collect();
    walls.sort_by_key(|(e, _)| *e);
    for (_, indices) in &mut walls {
        indices.sort_unstable();
        indices.dedup();
        indices.retain(|&i| (i as usize) < mesh.vertices.len());
    }
    walls
}

fn check_wall_thickness(
    mesh: &Mesh,
    graph: &WallGraph,
    limits: &DimensionLimits,
    config: &ValidationConfig,
    warnings: &mut Vec<String>,
) -> CheckResult {
    let mut measured = Vec::new();
    let mut unknown = Vec::new();
    for (e, indices) in wall_vertices(mesh) {
        if e as usize >= graph.edge_count() {
            unknown.push(e);
            continue;
        }
        let (a, b) = graph.edge_endpoints(EdgeId(e));
        let Some(d) = (b - a).try_normalize(1e-12) else {
            unknown.push(e);
            continue;
        };
        let n = Vector2::new(-d.y, d.x);
        let (lo, hi) = indices.iter().fold(
            (f64::INFINITY, f64::NEG_INFINITY),
            |(lo, hi), &i| {
                let p = mesh.vertices[i as usize];
                let offset = (Point2::new(p.x, p.z) - a).dot(&n);
                (lo.min(offset), hi.max(offset))
            },
        );
        measured.push((format!("wall {}", e), hi - lo));
    }

    if !unknown.is_empty() {
        return CheckResult::new(
            "wall_thickness",
            false,
            format!("walls {:?} have no matching wall graph edge", unknown),
        );
    }
    check_range(
        "wall_thickness",
        "walls",
        &measured,
        &limits.wall_thickness,
        config,
        warnings,
    )
}

fn check_wall_height(
    mesh: &Mesh,
    limits: &DimensionLimits,
    config: &ValidationConfig,
    warnings: &mut Vec<String>,
) -> CheckResult {
    let measured: Vec<(String, f64)> = wall_vertices(mesh)
        .into_iter()
        .filter_map(|(e, indices)| {
            let (lo, hi) = indices.iter().fold(
                (f64::INFINITY, f64::NEG_INFINITY),
                |(lo, hi), &i| {
                    let y = mesh.vertices[i as usize].y;
                    (lo.min(y), hi.max(y))
                },
            );
            (hi >= lo).then(|| (format!("wall {}", e), hi - lo))
        })
        .collect();
    check_range(
        "wall_height",
        "walls",
        &measured,
        &limits.wall_height,
        config,
        warnings,
    )
}

fn check_slab_thickness(
    mesh: &Mesh,
    limits: &DimensionLimits,
    config: &ValidationConfig,
    warnings: &mut Vec<String>,
) -> CheckResult {
    let measured: Vec<(String, f64)> = mesh
        .bounds_where(|e| e == Element::Slab)
        .map(|b| ("slab".to_string(), b.size().y))
        .into_iter()
        .collect();
    check_range(
        "slab_thickness",
        "floor slab",
        &measured,
        &limits.slab_thickness,
        config,
        warnings,
    )
}

fn check_room_count(rooms: &RoomSet) -> CheckResult {
    let count = rooms.room_count();
    CheckResult::new("room_count", count > 0, format!("{} rooms", count))
}

fn check_wall_count(mesh: &Mesh, graph: &WallGraph, expected: usize) -> CheckResult {
    let in_mesh = mesh.elements().iter().filter(|e| e.is_wall()).count();
    let passed = in_mesh == expected && graph.edge_count() == expected;
    CheckResult::new(
        "wall_count",
        passed,
        format!(
            "{} walls in mesh, {} wall graph edges, {} expected",
            in_mesh,
            graph.edge_count(),
            expected
        ),
    )
}
