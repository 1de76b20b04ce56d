// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Door and window openings
//!
//! Detection works on the raw pixel masks but moves every blob into meters
//! right away, so hosting and cutting happen entirely in model space.
//! Cutting never touches the mesh directly: it shrinks a wall's solid
//! intervals and re-emits that wall.

use crate::config::{CutawayConfig, OpeningConfig};
use crate::cutaway::{CutawayModel, Interval};
use crate::masks::{BlobMap, MaskSet};
use crate::normalizer::NormalizationContext;
use crate::wall_graph::{CoordinateSpace, EdgeId, WallGraph};
use cutaway_geometry::{point_segment_distance, project_onto_segment};
use serde::Serialize;
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OpeningKind {
    Door,
    Window,
}

/// A door or window placed on a wall
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct OpeningSpec {
    pub kind: OpeningKind,
    /// Host wall
    pub edge: EdgeId,
    /// Center along the edge, 0 at its first vertex and 1 at its second
    pub position: f64,
    pub width: f64,
    pub height: f64,
    /// Height of the opening's bottom above the floor (0 for doors)
    pub sill_height: f64,
}

impl OpeningSpec {
    #[inline]
    pub fn head_height(&self) -> f64 {
        self.sill_height + self.height
    }
}

/// Outcome of cutting openings into a model
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct OpeningReport {
    pub applied: usize,
    pub skipped: usize,
    pub walls_modified: usize,
}

/// Locate doors and windows and host each on its nearest wall.
///
/// Blobs below `min_blob_area`, or farther than `max_host_distance_m` from
/// every wall, are left out. Finding nothing is a valid result.
pub fn detect_openings(
    masks: &MaskSet,
    context: &NormalizationContext,
    graph: &WallGraph,
    cutaway: &CutawayConfig,
    config: &OpeningConfig,
) -> Vec<OpeningSpec> {
    if graph.space() != CoordinateSpace::Metric {
        tracing::warn!("Opening detection needs a metric wall graph; no openings placed");
        return Vec::new();
    }

    let sources = [
        (OpeningKind::Door, &masks.door),
        (OpeningKind::Window, &masks.window),
    ];

    let mut openings = Vec::new();
    for (kind, mask) in sources {
        let (width, height, sill_height) = match kind {
            OpeningKind::Door => (config.door_width, cutaway.wall_height, 0.0),
            OpeningKind::Window => (config.window_width, config.window_height, config.window_sill),
        };

        for blob in BlobMap::new(mask).blobs {
            if blob.area < config.min_blob_area {
                continue;
            }
            let center = context.point_to_meters(&blob.centroid);

            let nearest = graph
                .edge_ids()
                .map(|e| {
                    let (a, b) = graph.edge_endpoints(e);
                    (e, point_segment_distance(&center, &a, &b))
                })
                .min_by(|x, y| x.1.total_cmp(&y.1));
            let Some((edge, distance)) = nearest else {
                continue;
            };
            if distance > config.max_host_distance_m {
                tracing::warn!(
                    ?kind,
                    x = center.x,
                    y = center.y,
                    distance,
                    "No wall close enough to host opening"
                );
                continue;
            }

            let (a, b) = graph.edge_endpoints(edge);
            let (position, _) = project_onto_segment(&center, &a, &b);
            tracing::debug!(?kind, edge = edge.0, position, "Hosted opening");
            openings.push(OpeningSpec {
                kind,
                edge,
                position,
                width,
                height,
                sill_height,
            });
        }
    }

    tracing::info!(
        doors = openings.iter().filter(|o| o.kind == OpeningKind::Door).count(),
        windows = openings.iter().filter(|o| o.kind == OpeningKind::Window).count(),
        "Detected openings"
    );
    openings
}

/// Cut openings into the model's walls.
///
/// Each opening is clamped to its wall's usable range (clear of the corner
/// miters); overlapping openings on one wall merge into one void. Walls
/// without openings are untouched. Problems with individual openings are
/// logged and counted as skipped; they never fail the model.
pub fn apply_openings(
    model: &mut CutawayModel,
    openings: &[OpeningSpec],
    config: &OpeningConfig,
) -> OpeningReport {
    let mut report = OpeningReport::default();

    let mut per_wall: BTreeMap<EdgeId, Vec<&OpeningSpec>> = BTreeMap::new();
    for opening in openings {
        per_wall.entry(opening.edge).or_default().push(opening);
    }

    for (edge, specs) in per_wall {
        let Some(span) = model.wall(edge) else {
            tracing::warn!(edge = edge.0, "Opening references a wall that was not built");
            report.skipped += specs.len();
            continue;
        };
        let usable = span.usable_range();

        // (interval, sill, head, openings merged into it)
        let mut voids: Vec<(Interval, f64, f64, usize)> = Vec::new();
        for spec in &specs {
            let center = spec.position * span.length;
            let start = (center - spec.width / 2.0).max(usable.start);
            let end = (center + spec.width / 2.0).min(usable.end);
            if end - start < config.min_opening_width {
                tracing::warn!(
                    kind = ?spec.kind,
                    edge = edge.0,
                    width = end - start,
                    "Opening too narrow after clamping to the wall"
                );
                report.skipped += 1;
                continue;
            }
            let head = spec.head_height().min(span.height);
            voids.push((Interval::new(start, end), spec.sill_height, head, 1));
        }
        if voids.is_empty() {
            continue;
        }

        voids.sort_by(|a, b| a.0.start.total_cmp(&b.0.start));
        let mut merged: Vec<(Interval, f64, f64, usize)> = Vec::with_capacity(voids.len());
        for void in voids {
            match merged.last_mut() {
                Some(last) if void.0.start <= last.0.end => {
                    last.0.end = last.0.end.max(void.0.end);
                    last.1 = last.1.min(void.1);
                    last.2 = last.2.max(void.2);
                    last.3 += void.3;
                }
                _ => merged.push(void),
            }
        }

        let original = span.clone();
        let count: usize = merged.iter().map(|v| v.3).sum();
        if let Some(wall) = model.wall_mut(edge) {
            for (interval, sill, head, _) in &merged {
                wall.cut(*interval, *sill, *head);
            }
        }
        match model.rebuild_wall(edge) {
            Ok(()) => {
                report.applied += count;
                report.walls_modified += 1;
            }
            Err(err) => {
                tracing::warn!(edge = edge.0, error = %err, "Could not cut openings into wall");
                if let Some(wall) = model.wall_mut(edge) {
                    *wall = original;
                }
                report.skipped += count;
            }
        }
    }

    tracing::info!(
        applied = report.applied,
        skipped = report.skipped,
        walls = report.walls_modified,
        "Applied openings"
    );
    report
}
