// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Stage driver
//!
//! Runs stages 2 to 8 strictly in order on one mask set. Each stage consumes
//! only its predecessor's output; the first failure aborts the run and is
//! reported with the stage that raised it. Export (stage 9) is a separate
//! step on the finished [`Reconstruction`].

use crate::config::PipelineConfig;
use crate::cutaway::{build_cutaway, CutawayModel};
use crate::error::{Error, Result, Stage, StageContext, StageFailure};
use crate::glb::{GlbExporter, Metadata};
use crate::masks::MaskSet;
use crate::normalizer::{normalize, NormalizationContext, Normalized};
use crate::openings::{apply_openings, detect_openings, OpeningReport, OpeningSpec};
use crate::room_detector::{detect_rooms, RoomSet, RoomSummary};
use crate::topology::{bridge_opening_gaps, extract_topology};
use crate::validator::{validate, ValidationResult};
use crate::wall_graph::{GraphSummary, WallGraph};
use crate::wall_refiner::{barrier_mask, refine_walls};
use image::GrayImage;
use serde::Serialize;
use serde_json::json;
use std::path::Path;

/// Configured reconstruction pipeline
#[derive(Debug, Clone)]
pub struct Pipeline {
    config: PipelineConfig,
}

impl Pipeline {
    /// Create a pipeline, rejecting invalid configuration up front
    pub fn new(config: PipelineConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Run stages 2 to 8 on one floor plan
    pub fn run(&self, masks: &MaskSet) -> std::result::Result<Reconstruction, StageFailure> {
        let config = &self.config;
        let (height, width) = masks.dimensions();
        tracing::info!(width, height, "Reconstructing floor plan");

        let refined = refine_walls(masks, &config.refine).stage(Stage::Refine)?;

        let graph = extract_topology(&refined, &config.topology)
            .and_then(|graph| bridge_opening_gaps(&graph, masks, &config.topology))
            .stage(Stage::Topology)?;

        let barrier = barrier_mask(&refined, masks);
        let rooms = detect_rooms(&barrier, &graph, &config.rooms).stage(Stage::Rooms)?;

        let normalized =
            normalize(masks.dimensions(), &graph, &rooms, &config.normalize).stage(Stage::Normalize)?;

        let mut model = build_cutaway(
            &normalized.graph,
            &normalized.rooms,
            &normalized.context,
            &config.cutaway,
        )
        .stage(Stage::Cutaway)?;

        let openings = detect_openings(
            masks,
            &normalized.context,
            &normalized.graph,
            &config.cutaway,
            &config.openings,
        );
        let opening_report = apply_openings(&mut model, &openings, &config.openings);

        let mut validation = validate(
            &model.mesh,
            &normalized.graph,
            &normalized.rooms,
            normalized.graph.edge_count(),
            &config.limits,
            &config.validation,
        );
        if !model.skipped_walls.is_empty() {
            let edges: Vec<u32> = model.skipped_walls.iter().map(|e| e.0).collect();
            validation.warnings.push(format!(
                "cutaway: {} wall graph edges produced no wall: {:?}",
                edges.len(),
                edges
            ));
        }

        Ok(Reconstruction {
            refined,
            graph,
            rooms,
            normalized,
            openings,
            opening_report,
            model,
            validation,
            require_valid_export: config.require_valid_export,
        })
    }
}

/// Everything one pipeline run produced
#[derive(Debug, Clone)]
pub struct Reconstruction {
    pub refined: GrayImage,
    /// Pixel-space wall graph
    pub graph: WallGraph,
    /// Pixel-space rooms
    pub rooms: RoomSet,
    pub normalized: Normalized,
    pub openings: Vec<OpeningSpec>,
    pub opening_report: OpeningReport,
    pub model: CutawayModel,
    pub validation: ValidationResult,
    require_valid_export: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct MeshSummary {
    pub vertex_count: usize,
    pub face_count: usize,
    pub wall_count: usize,
    pub skipped_wall_count: usize,
    pub junction_count: usize,
}

/// Serializable summary of a run
#[derive(Debug, Clone, Serialize)]
pub struct PipelineReport {
    pub graph: GraphSummary,
    pub rooms: RoomSummary,
    pub normalization: NormalizationContext,
    pub openings_detected: usize,
    pub openings: OpeningReport,
    pub mesh: MeshSummary,
    pub validation: ValidationResult,
}

impl Reconstruction {
    pub fn context(&self) -> &NormalizationContext {
        &self.normalized.context
    }

    /// Key numbers of the run, embedded in the exported file
    pub fn metadata(&self) -> Metadata {
        let context = &self.normalized.context;
        let mut metadata = Metadata::new();
        metadata.insert("scale_factor".into(), json!(context.scale_factor()));
        metadata.insert("pixels_per_meter".into(), json!(context.pixels_per_meter()));
        metadata.insert("target_width_m".into(), json!(context.target_width_m()));
        metadata.insert("room_count".into(), json!(self.rooms.room_count()));
        metadata.insert("wall_count".into(), json!(self.model.walls.len()));
        metadata.insert("openings_applied".into(), json!(self.opening_report.applied));
        metadata.insert("validation_passed".into(), json!(self.validation.passed));
        metadata
    }

    pub fn report(&self) -> PipelineReport {
        PipelineReport {
            graph: self.graph.summary(),
            rooms: self.rooms.summary(),
            normalization: self.normalized.context,
            openings_detected: self.openings.len(),
            openings: self.opening_report,
            mesh: MeshSummary {
                vertex_count: self.model.mesh.vertex_count(),
                face_count: self.model.mesh.face_count(),
                wall_count: self.model.walls.len(),
                skipped_wall_count: self.model.skipped_walls.len(),
                junction_count: self.model.junction_count,
            },
            validation: self.validation.clone(),
        }
    }

    /// Stage 9: write the mesh as GLB.
    ///
    /// A mesh that failed validation is refused unless the pipeline was
    /// configured with `require_valid_export = false`.
    pub fn export(&self, path: impl AsRef<Path>) -> std::result::Result<u64, StageFailure> {
        if self.require_valid_export && !self.validation.passed {
            let failed: Vec<&str> = self
                .validation
                .failed_checks()
                .iter()
                .map(|c| c.name.as_str())
                .collect();
            return Err(StageFailure::new(
                Stage::Export,
                Error::InvalidInput(format!(
                    "mesh failed validation ({}); export of invalid meshes is disabled",
                    failed.join(", ")
                )),
            ));
        }
        GlbExporter::new(&self.model.mesh)
            .with_metadata(self.metadata())
            .export(path)
            .stage(Stage::Export)
    }
}
