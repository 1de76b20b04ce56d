// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! End-to-end tests on synthetic floor plans

use approx::assert_relative_eq;
use cutaway_floorplan::{
    build_cutaway, detect_rooms, export_glb, extract_topology, normalize, parse_glb, validate,
    CoordinateSpace, CutawayConfig, DimensionLimits, Element, Mesh, Metadata, NormalizeConfig,
    Pipeline, PipelineConfig, Room, RoomConfig, RoomSet, TopologyConfig, ValidationConfig,
    WallGraph,
};
use cutaway_geometry::{extrude_prism, Point2, Point3, Vector2};
use image::{GrayImage, Luma};

fn fill(img: &mut GrayImage, x0: u32, x1: u32, y0: u32, y1: u32) {
    for y in y0..y1 {
        for x in x0..x1 {
            img.put_pixel(x, y, Luma([255]));
        }
    }
}

/// 80 x 80 px closed rectangle of 5 px walls
fn rectangle_walls() -> GrayImage {
    let mut img = GrayImage::new(100, 100);
    fill(&mut img, 10, 90, 10, 15);
    fill(&mut img, 10, 90, 85, 90);
    fill(&mut img, 10, 15, 10, 90);
    fill(&mut img, 85, 90, 10, 90);
    img
}

fn temp_path(name: &str) -> std::path::PathBuf {
    std::env::temp_dir().join(format!("cutaway-{}-{}", std::process::id(), name))
}

#[test]
fn test_rectangle_topology() {
    let graph = extract_topology(&rectangle_walls(), &TopologyConfig::default()).unwrap();
    assert_eq!(graph.vertex_count(), 4);
    assert_eq!(graph.edge_count(), 4);
    // skeleton runs along the wall centerlines, 75 px apart
    assert_relative_eq!(graph.total_length(), 300.0, max_relative = 0.05);
}

#[test]
fn test_single_room_area_and_centroid() {
    let walls = rectangle_walls();
    let graph = extract_topology(&walls, &TopologyConfig::default()).unwrap();
    let rooms = detect_rooms(&walls, &graph, &RoomConfig::default()).unwrap();

    assert_eq!(rooms.room_count(), 1);
    let room = &rooms.rooms[0];
    assert_eq!(room.pixels.len(), 70 * 70);
    assert_relative_eq!(room.area, 4900.0);
    assert!(room.centroid.x >= 15.0 && room.centroid.x < 85.0);
    assert!(room.centroid.y >= 15.0 && room.centroid.y < 85.0);
    assert!(room.bbox_contains(&room.centroid));
}

#[test]
fn test_normalization_round_trip() {
    let walls = rectangle_walls();
    let graph = extract_topology(&walls, &TopologyConfig::default()).unwrap();
    let rooms = detect_rooms(&walls, &graph, &RoomConfig::default()).unwrap();
    let config = NormalizeConfig {
        target_width_m: 7.5,
    };
    let n = normalize((100, 100), &graph, &rooms, &config).unwrap();

    let s = n.context.scale_factor();
    assert!(s > 0.0);
    assert_eq!(n.graph.vertex_count(), graph.vertex_count());
    for (a, b) in n.graph.edges().iter().zip(graph.edges()) {
        assert_eq!((a.a, a.b), (b.a, b.b));
        assert_relative_eq!(a.path_length / s, b.path_length, epsilon = 1e-9);
    }
    assert_eq!(n.rooms.room_count(), rooms.room_count());
    for (m, p) in n.graph.vertices().iter().zip(graph.vertices()) {
        assert_relative_eq!(m.x / s, p.x, epsilon = 1e-9);
        assert_relative_eq!(m.y / s, p.y, epsilon = 1e-9);
    }
}

#[test]
fn test_ten_by_eight_cutaway() {
    // 200 x 160 px rectangle at 0.05 m/px
    let corners = vec![
        Point2::new(20.0, 20.0),
        Point2::new(220.0, 20.0),
        Point2::new(220.0, 180.0),
        Point2::new(20.0, 180.0),
    ];
    let graph = WallGraph::from_parts(
        corners.clone(),
        vec![(0, 1, 200.0), (1, 2, 160.0), (2, 3, 200.0), (3, 0, 160.0)],
        CoordinateSpace::Pixel,
    )
    .unwrap();
    let rooms = RoomSet {
        rooms: vec![Room {
            id: 0,
            pixels: vec![(120, 100)],
            centroid: Point2::new(120.0, 100.0),
            area: 1.0,
            perimeter: 4.0,
            bbox: (Point2::new(25.0, 25.0), Point2::new(215.0, 175.0)),
        }],
        boundary: corners,
        image_size: (200, 240),
        space: CoordinateSpace::Pixel,
    };
    let n = normalize((200, 240), &graph, &rooms, &NormalizeConfig::default()).unwrap();
    assert_relative_eq!(n.context.scale_factor(), 0.05);

    let model = build_cutaway(&n.graph, &n.rooms, &n.context, &CutawayConfig::default()).unwrap();
    let mesh = &model.mesh;
    assert!(mesh.vertex_count() > 0);
    assert!(mesh.face_count() > 0);
    let count = mesh.vertex_count() as u32;
    assert!(mesh.faces.iter().all(|f| f.indices.iter().all(|&i| i < count)));

    let size = mesh.bounds().unwrap().size();
    assert_relative_eq!(size.x, 10.22, epsilon = 1e-9);
    assert_relative_eq!(size.z, 8.22, epsilon = 1e-9);
}

/// Four 4 m walls of the given thickness, 1.4 m tall, on a 0.135 m slab
fn box_house(thickness: f64) -> (Mesh, WallGraph, RoomSet) {
    let graph = WallGraph::from_parts(
        vec![
            Point2::new(0.0, 0.0),
            Point2::new(4.0, 0.0),
            Point2::new(4.0, 4.0),
            Point2::new(0.0, 4.0),
        ],
        vec![(0, 1, 4.0), (1, 2, 4.0), (2, 3, 4.0), (3, 0, 4.0)],
        CoordinateSpace::Metric,
    )
    .unwrap();

    let h = thickness / 2.0;
    let mut mesh = Mesh::new("box");
    for e in graph.edge_ids() {
        let (a, b) = graph.edge_endpoints(e);
        let d = (b - a).normalize();
        let n = Vector2::new(-d.y, d.x) * h;
        extrude_prism(&mut mesh, &[a - n, b - n, b + n, a + n], 0.0, 1.4, Element::Wall(e.0))
            .unwrap();
    }
    let slab = [
        Point2::new(-h, -h),
        Point2::new(4.0 + h, -h),
        Point2::new(4.0 + h, 4.0 + h),
        Point2::new(-h, 4.0 + h),
    ];
    extrude_prism(&mut mesh, &slab, -0.135, 0.0, Element::Slab).unwrap();

    let rooms = RoomSet {
        rooms: vec![Room {
            id: 0,
            pixels: vec![(2, 2)],
            centroid: Point2::new(2.0, 2.0),
            area: 13.0,
            perimeter: 14.0,
            bbox: (Point2::new(0.2, 0.2), Point2::new(3.8, 3.8)),
        }],
        boundary: Vec::new(),
        image_size: (4, 4),
        space: CoordinateSpace::Metric,
    };
    (mesh, graph, rooms)
}

#[test]
fn test_validator_box_passes() {
    let (mesh, graph, rooms) = box_house(0.22);
    let result = validate(
        &mesh,
        &graph,
        &rooms,
        4,
        &DimensionLimits::default(),
        &ValidationConfig::default(),
    );
    assert!(result.passed, "failed: {:?}", result.failed_checks());
    assert!(result.failed_checks().is_empty());
}

#[test]
fn test_validator_flags_degenerate_face() {
    let (mut mesh, graph, rooms) = box_house(0.22);
    mesh.add_face([0, 0, 1], Element::Slab);
    let result = validate(
        &mesh,
        &graph,
        &rooms,
        4,
        &DimensionLimits::default(),
        &ValidationConfig::default(),
    );
    assert!(!result.passed);
    assert!(!result.check("degenerate_faces").unwrap().passed);
    assert!(result.check("index_validity").unwrap().passed);
}

#[test]
fn test_glb_file_round_trip() {
    let mut mesh = Mesh::new("quad");
    let positions = [
        [0.0f32, 0.0, 0.0],
        [1.5, 0.0, 0.0],
        [1.5, 0.0, 2.25],
        [0.0, 0.5, 2.25],
    ];
    for p in &positions {
        mesh.add_vertex(Point3::new(p[0] as f64, p[1] as f64, p[2] as f64));
    }
    mesh.add_face([0, 1, 2], Element::Slab);
    mesh.add_face([0, 2, 3], Element::Slab);

    let mut metadata = Metadata::new();
    metadata.insert("source".into(), "synthetic".into());

    let path = temp_path("quad.glb");
    let written = export_glb(&mesh, &metadata, &path).unwrap();
    let bytes = std::fs::read(&path).unwrap();
    std::fs::remove_file(&path).ok();

    assert_eq!(written as usize, bytes.len());
    let parsed = parse_glb(&bytes).unwrap();
    assert_eq!(parsed.declared_length as usize, bytes.len());
    assert_eq!(parsed.positions, positions.to_vec());
    assert_eq!(parsed.indices, vec![0, 1, 2, 0, 2, 3]);
    assert_eq!(parsed.document.extras["source"], "synthetic");
}

/// Two rooms split by an interior wall, with a door in the top wall
fn two_room_plan() -> cutaway_floorplan::MaskSet {
    let mut wall = GrayImage::new(200, 150);
    fill(&mut wall, 10, 190, 10, 15);
    fill(&mut wall, 10, 190, 135, 140);
    fill(&mut wall, 10, 15, 10, 140);
    fill(&mut wall, 185, 190, 10, 140);
    fill(&mut wall, 98, 103, 15, 135);
    let mut door = GrayImage::new(200, 150);
    fill(&mut door, 40, 60, 10, 15);
    cutaway_floorplan::MaskSet::new(wall, door, GrayImage::new(200, 150)).unwrap()
}

#[test]
fn test_full_run_with_interior_wall_and_door() {
    let pipeline = Pipeline::new(PipelineConfig::default()).unwrap();
    let result = pipeline.run(&two_room_plan()).unwrap();

    // the door gap is bridged, leaving two T junctions
    assert_eq!(result.graph.vertex_count(), 6);
    assert_eq!(result.graph.edge_count(), 7);
    let t_junctions = result
        .graph
        .vertex_ids()
        .filter(|&v| result.graph.degree(v) == 3)
        .count();
    assert_eq!(t_junctions, 2);

    assert_eq!(result.rooms.room_count(), 2);
    assert_eq!(result.openings.len(), 1);
    assert_eq!(result.opening_report.applied, 1);
    assert_eq!(result.model.walls.len(), 7);
    assert_eq!(result.model.junction_count, 2);
    assert!(
        result.validation.passed,
        "failed: {:?}",
        result.validation.failed_checks()
    );

    let dir = temp_path("two-room");
    std::fs::create_dir_all(&dir).unwrap();
    let path = dir.join("model.glb");
    let written = result.export(&path).unwrap();
    let bytes = std::fs::read(&path).unwrap();
    std::fs::remove_dir_all(&dir).ok();

    assert_eq!(written as usize, bytes.len());
    let parsed = parse_glb(&bytes).unwrap();
    assert_eq!(parsed.positions.len(), result.model.mesh.vertex_count());
    assert_eq!(parsed.indices.len() % 3, 0);
    assert_eq!(parsed.document.extras["room_count"], 2);
    assert_eq!(parsed.document.extras["openings_applied"], 1);
}
