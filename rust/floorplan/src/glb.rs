// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Binary glTF 2.0 (GLB) export
//!
//! Layout: a 12-byte header (`glTF`, version 2, total length), a JSON chunk
//! padded with spaces and a BIN chunk padded with zeros. The mesh becomes a
//! single indexed triangle primitive; metadata goes into the root `extras`.

use crate::error::{Error, Result};
use cutaway_geometry::{triangulate_face, Mesh};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

pub const GLB_MAGIC: u32 = 0x4654_6C67; // "glTF"
pub const GLB_VERSION: u32 = 2;
const CHUNK_JSON: u32 = 0x4E4F_534A; // "JSON"
const CHUNK_BIN: u32 = 0x004E_4942; // "BIN\0"
const HEADER_LEN: usize = 12;
const CHUNK_HEADER_LEN: usize = 8;

const COMPONENT_FLOAT: u32 = 5126;
const COMPONENT_UNSIGNED_INT: u32 = 5125;
const TARGET_ARRAY_BUFFER: u32 = 34962;
const TARGET_ELEMENT_ARRAY_BUFFER: u32 = 34963;
const MODE_TRIANGLES: u32 = 4;

/// Free-form key/value metadata stored in the file's `extras`
pub type Metadata = serde_json::Map<String, serde_json::Value>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Asset {
    pub version: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub generator: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Scene {
    pub nodes: Vec<u32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    pub mesh: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Primitive {
    pub attributes: BTreeMap<String, u32>,
    pub indices: u32,
    pub mode: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MeshDef {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub primitives: Vec<Primitive>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Accessor {
    pub buffer_view: u32,
    #[serde(default)]
    pub byte_offset: u32,
    pub component_type: u32,
    pub count: u32,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min: Option<Vec<f32>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max: Option<Vec<f32>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BufferView {
    pub buffer: u32,
    pub byte_offset: u32,
    pub byte_length: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Buffer {
    pub byte_length: u32,
}

/// The glTF JSON chunk
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Document {
    pub asset: Asset,
    pub scene: u32,
    pub scenes: Vec<Scene>,
    pub nodes: Vec<Node>,
    pub meshes: Vec<MeshDef>,
    pub accessors: Vec<Accessor>,
    pub buffer_views: Vec<BufferView>,
    pub buffers: Vec<Buffer>,
    #[serde(default, skip_serializing_if = "Metadata::is_empty")]
    pub extras: Metadata,
}

/// Flatten the mesh into f32 positions and triangle indices
fn triangle_buffers(mesh: &Mesh) -> Result<(Vec<[f32; 3]>, Vec<u32>)> {
    if mesh.is_empty() || mesh.faces.is_empty() {
        return Err(cutaway_geometry::Error::EmptyMesh(format!(
            "mesh '{}' has {} vertices and {} faces",
            mesh.name,
            mesh.vertex_count(),
            mesh.face_count()
        ))
        .into());
    }
    let n = mesh.vertex_count() as u32;
    if let Some(face) = mesh.faces.iter().find(|f| f.indices.iter().any(|&i| i >= n)) {
        return Err(Error::InvalidInput(format!(
            "face {:?} references a vertex beyond {}",
            face.indices.as_slice(),
            n
        )));
    }

    let positions = mesh
        .vertices
        .iter()
        .map(|p| [p.x as f32, p.y as f32, p.z as f32])
        .collect();
    let mut indices = Vec::with_capacity(mesh.face_count() * 6);
    for face in &mesh.faces {
        for tri in triangulate_face(mesh, face)? {
            indices.extend_from_slice(&tri);
        }
    }
    Ok((positions, indices))
}

fn bounds(positions: &[[f32; 3]]) -> (Vec<f32>, Vec<f32>) {
    let mut min = [f32::INFINITY; 3];
    let mut max = [f32::NEG_INFINITY; 3];
    for p in positions {
        for k in 0..3 {
            min[k] = min[k].min(p[k]);
            max[k] = max[k].max(p[k]);
        }
    }
    (min.to_vec(), max.to_vec())
}

#[inline]
fn padded(len: usize) -> usize {
    (len + 3) & !3
}

/// Encode a mesh and its metadata as a GLB container
pub fn encode_glb(mesh: &Mesh, metadata: &Metadata) -> Result<Vec<u8>> {
    let (positions, indices) = triangle_buffers(mesh)?;
    tracing::debug!(
        vertices = positions.len(),
        triangles = indices.len() / 3,
        "Triangulated mesh for GLB"
    );

    let mut bin: Vec<u8> = Vec::with_capacity(positions.len() * 12 + indices.len() * 4);
    for p in &positions {
        for c in p {
            bin.extend_from_slice(&c.to_le_bytes());
        }
    }
    let positions_len = bin.len();
    for i in &indices {
        bin.extend_from_slice(&i.to_le_bytes());
    }
    let indices_len = bin.len() - positions_len;

    let (min, max) = bounds(&positions);
    let name = (!mesh.name.is_empty()).then(|| mesh.name.clone());
    let document = Document {
        asset: Asset {
            version: "2.0".to_string(),
            generator: Some(concat!("cutaway-floorplan ", env!("CARGO_PKG_VERSION")).to_string()),
        },
        scene: 0,
        scenes: vec![Scene { nodes: vec![0] }],
        nodes: vec![Node {
            mesh: 0,
            name: name.clone(),
        }],
        meshes: vec![MeshDef {
            name,
            primitives: vec![Primitive {
                attributes: BTreeMap::from([("POSITION".to_string(), 0)]),
                indices: 1,
                mode: MODE_TRIANGLES,
            }],
        }],
        accessors: vec![
            Accessor {
                buffer_view: 0,
                byte_offset: 0,
                component_type: COMPONENT_FLOAT,
                count: positions.len() as u32,
                kind: "VEC3".to_string(),
                min: Some(min),
                max: Some(max),
            },
            Accessor {
                buffer_view: 1,
                byte_offset: 0,
                component_type: COMPONENT_UNSIGNED_INT,
                count: indices.len() as u32,
                kind: "SCALAR".to_string(),
                min: None,
                max: None,
            },
        ],
        buffer_views: vec![
            BufferView {
                buffer: 0,
                byte_offset: 0,
                byte_length: positions_len as u32,
                target: Some(TARGET_ARRAY_BUFFER),
            },
            BufferView {
                buffer: 0,
                byte_offset: positions_len as u32,
                byte_length: indices_len as u32,
                target: Some(TARGET_ELEMENT_ARRAY_BUFFER),
            },
        ],
        buffers: vec![Buffer {
            byte_length: bin.len() as u32,
        }],
        extras: metadata.clone(),
    };

    let mut json = serde_json::to_vec(&document)?;
    json.resize(padded(json.len()), b' ');
    let bin_chunk_len = padded(bin.len());
    bin.resize(bin_chunk_len, 0);

    let total = HEADER_LEN + CHUNK_HEADER_LEN + json.len() + CHUNK_HEADER_LEN + bin.len();
    let total_u32 = u32::try_from(total)
        .map_err(|_| Error::InvalidInput(format!("GLB of {} bytes exceeds 4 GiB", total)))?;

    let mut out = Vec::with_capacity(total);
    out.extend_from_slice(&GLB_MAGIC.to_le_bytes());
    out.extend_from_slice(&GLB_VERSION.to_le_bytes());
    out.extend_from_slice(&total_u32.to_le_bytes());
    out.extend_from_slice(&(json.len() as u32).to_le_bytes());
    out.extend_from_slice(&CHUNK_JSON.to_le_bytes());
    out.extend_from_slice(&json);
    out.extend_from_slice(&(bin.len() as u32).to_le_bytes());
    out.extend_from_slice(&CHUNK_BIN.to_le_bytes());
    out.extend_from_slice(&bin);
    Ok(out)
}

/// Write a GLB file, returning its size in bytes
pub fn export_glb(mesh: &Mesh, metadata: &Metadata, path: impl AsRef<Path>) -> Result<u64> {
    let bytes = encode_glb(mesh, metadata)?;
    std::fs::write(path.as_ref(), &bytes)?;
    tracing::info!(
        path = %path.as_ref().display(),
        bytes = bytes.len(),
        faces = mesh.face_count(),
        "Exported GLB"
    );
    Ok(bytes.len() as u64)
}

/// A mesh paired with the metadata to embed alongside it
#[derive(Debug, Clone)]
pub struct GlbExporter<'a> {
    pub mesh: &'a Mesh,
    pub metadata: Metadata,
}

impl<'a> GlbExporter<'a> {
    pub fn new(mesh: &'a Mesh) -> Self {
        Self {
            mesh,
            metadata: Metadata::new(),
        }
    }

    pub fn with_metadata(mut self, metadata: Metadata) -> Self {
        self.metadata = metadata;
        self
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) {
        self.metadata.insert(key.into(), value.into());
    }

    pub fn encode(&self) -> Result<Vec<u8>> {
        encode_glb(self.mesh, &self.metadata)
    }

    pub fn export(&self, path: impl AsRef<Path>) -> Result<u64> {
        export_glb(self.mesh, &self.metadata, path)
    }
}

/// Contents of a GLB container read back from bytes
#[derive(Debug, Clone)]
pub struct ParsedGlb {
    /// Length recorded in the header
    pub declared_length: u32,
    pub document: Document,
    pub positions: Vec<[f32; 3]>,
    pub indices: Vec<u32>,
}

fn read_u32(bytes: &[u8], offset: usize) -> Result<u32> {
    bytes
        .get(offset..offset + 4)
        .and_then(|b| b.try_into().ok())
        .map(u32::from_le_bytes)
        .ok_or_else(|| Error::InvalidContainer(format!("truncated at byte {}", offset)))
}

fn read_chunk(bytes: &[u8], offset: usize, expected: u32) -> Result<(&[u8], usize)> {
    let len = read_u32(bytes, offset)? as usize;
    let kind = read_u32(bytes, offset + 4)?;
    if kind != expected {
        return Err(Error::InvalidContainer(format!(
            "expected chunk type {:#010x}, found {:#010x}",
            expected, kind
        )));
    }
    let start = offset + CHUNK_HEADER_LEN;
    let data = bytes
        .get(start..start + len)
        .ok_or_else(|| Error::InvalidContainer(format!("chunk of {} bytes overruns file", len)))?;
    Ok((data, start + len))
}

fn accessor_bytes<'b>(document: &Document, bin: &'b [u8], accessor: u32, stride: usize) -> Result<&'b [u8]> {
    let acc = document
        .accessors
        .get(accessor as usize)
        .ok_or_else(|| Error::InvalidContainer(format!("missing accessor {}", accessor)))?;
    let view = document
        .buffer_views
        .get(acc.buffer_view as usize)
        .ok_or_else(|| Error::InvalidContainer(format!("missing buffer view {}", acc.buffer_view)))?;
    let start = view.byte_offset as usize + acc.byte_offset as usize;
    let len = acc.count as usize * stride;
    bin.get(start..start + len)
        .ok_or_else(|| Error::InvalidContainer(format!("accessor {} overruns the BIN chunk", accessor)))
}

/// Read back a container produced by [`encode_glb`]
pub fn parse_glb(bytes: &[u8]) -> Result<ParsedGlb> {
    if read_u32(bytes, 0)? != GLB_MAGIC {
        return Err(Error::InvalidContainer("bad magic".to_string()));
    }
    let version = read_u32(bytes, 4)?;
    if version != GLB_VERSION {
        return Err(Error::InvalidContainer(format!("unsupported version {}", version)));
    }
    let declared_length = read_u32(bytes, 8)?;
    if declared_length as usize != bytes.len() {
        return Err(Error::InvalidContainer(format!(
            "header declares {} bytes, file has {}",
            declared_length,
            bytes.len()
        )));
    }

    let (json, next) = read_chunk(bytes, HEADER_LEN, CHUNK_JSON)?;
    let (bin, _) = read_chunk(bytes, next, CHUNK_BIN)?;
    let document: Document = serde_json::from_slice(json)?;

    let primitive = document
        .meshes
        .first()
        .and_then(|m| m.primitives.first())
        .ok_or_else(|| Error::InvalidContainer("no mesh primitive".to_string()))?;
    let position_accessor = *primitive
        .attributes
        .get("POSITION")
        .ok_or_else(|| Error::InvalidContainer("primitive has no POSITION".to_string()))?;

    let positions = accessor_bytes(&document, bin, position_accessor, 12)?
        .chunks_exact(12)
        .map(|c| {
            let f = |k: usize| f32::from_le_bytes([c[k], c[k + 1], c[k + 2], c[k + 3]]);
            [f(0), f(4), f(8)]
        })
        .collect();
    let indices = accessor_bytes(&document, bin, primitive.indices, 4)?
        .chunks_exact(4)
        .map(|c| u32::from_le_bytes([c[0], c[1], c[2], c[3]]))
        .collect();

    Ok(ParsedGlb {
        declared_length,
        document,
        positions,
        indices,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use cutaway_geometry::{Element, Point3};
    use serde_json::json;

    fn quad_mesh() -> Mesh {
        let mut mesh = Mesh::new("quad");
        mesh.add_vertex(Point3::new(0.0, 0.0, 0.0));
        mesh.add_vertex(Point3::new(1.0, 0.0, 0.0));
        mesh.add_vertex(Point3::new(1.0, 0.0, 1.0));
        mesh.add_vertex(Point3::new(0.0, 0.0, 1.0));
        mesh.add_face([0, 1, 2], Element::Slab);
        mesh.add_face([0, 2, 3], Element::Slab);
        mesh
    }

    #[test]
    fn test_round_trip() {
        let mesh = quad_mesh();
        let mut metadata = Metadata::new();
        metadata.insert("scale_factor".into(), json!(0.05));
        metadata.insert("rooms".into(), json!(3));

        let bytes = encode_glb(&mesh, &metadata).unwrap();
        assert_eq!(bytes.len() % 4, 0);
        assert_eq!(&bytes[0..4], b"glTF");

        let parsed = parse_glb(&bytes).unwrap();
        assert_eq!(parsed.declared_length as usize, bytes.len());
        assert_eq!(parsed.indices, vec![0, 1, 2, 0, 2, 3]);
        assert_eq!(parsed.positions.len(), 4);
        assert_eq!(parsed.positions[2], [1.0, 0.0, 1.0]);
        assert_eq!(parsed.document.extras["rooms"], json!(3));
        assert_eq!(parsed.document.accessors[0].min, Some(vec![0.0, 0.0, 0.0]));
        assert_eq!(parsed.document.buffer_views[1].target, Some(34963));
    }

    #[test]
    fn test_polygon_faces_are_triangulated() {
        let mut mesh = Mesh::new("square");
        for (x, z) in [(0.0, 0.0), (2.0, 0.0), (2.0, 2.0), (0.0, 2.0)] {
            mesh.add_vertex(Point3::new(x, 0.0, z));
        }
        mesh.add_face([0, 1, 2, 3], Element::Slab);
        let parsed = parse_glb(&encode_glb(&mesh, &Metadata::new()).unwrap()).unwrap();
        // one polygon face, two triangles
        assert_eq!(mesh.face_count(), 1);
        assert_eq!(parsed.indices.len() / 3, 2);
        assert!(parsed.indices.iter().all(|&i| i < 4));
        assert!(parsed.document.extras.is_empty());
    }

    #[test]
    fn test_empty_mesh_rejected() {
        let result = encode_glb(&Mesh::new("empty"), &Metadata::new());
        assert!(matches!(
            result,
            Err(Error::Geometry(cutaway_geometry::Error::EmptyMesh(_)))
        ));
    }

    #[test]
    fn test_corrupt_containers_rejected() {
        let bytes = encode_glb(&quad_mesh(), &Metadata::new()).unwrap();

        let mut bad_magic = bytes.clone();
        bad_magic[0] = b'x';
        assert!(matches!(parse_glb(&bad_magic), Err(Error::InvalidContainer(_))));

        let truncated = &bytes[..bytes.len() - 4];
        assert!(matches!(parse_glb(truncated), Err(Error::InvalidContainer(_))));

        let mut bad_version = bytes.clone();
        bad_version[4] = 1;
        assert!(matches!(parse_glb(&bad_version), Err(Error::InvalidContainer(_))));
    }

    #[test]
    fn test_exporter_writes_file() {
        let mesh = quad_mesh();
        let mut exporter = GlbExporter::new(&mesh);
        exporter.insert("valid", true);
        let path = std::env::temp_dir().join(format!("cutaway-glb-{}.glb", std::process::id()));
        let written = exporter.export(&path).unwrap();
        let bytes = std::fs::read(&path).unwrap();
        std::fs::remove_file(&path).ok();
        assert_eq!(written as usize, bytes.len());
        assert_eq!(parse_glb(&bytes).unwrap().declared_length as usize, bytes.len());
    }
}
