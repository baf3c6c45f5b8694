//! Reader/Writer traits for graph input and layout output
//!
//! Readers produce [`GraphData`] from a file; writers serialize a laid-out
//! [`GraphScene`].

use std::fs;
use std::path::Path;

use serde::Serialize;
use thiserror::Error;

use crate::bundling::{MeshRange, PerGroup, RenderGroup};
use crate::graph::GraphData;
use crate::math::{Vec2, Vec3};
use crate::scene::GraphScene;

/// Errors that can occur during reading or writing
#[derive(Error, Debug)]
pub enum IoError {
    /// The file format is not supported
    #[error("unsupported format: {0}")]
    UnsupportedFormat(String),

    /// An I/O error occurred
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A parsing error occurred
    #[error("parse error: {0}")]
    Parse(String),

    /// A serialization error occurred
    #[error("write error: {0}")]
    Write(String),
}

/// Result type for reader/writer operations
pub type IoResult<T> = Result<T, IoError>;

/// A reader parses an input file into graph data
pub trait Reader {
    fn read(&self, input: &Path) -> IoResult<GraphData>;

    /// File extensions this reader can handle (e.g., ["json"])
    fn supported_extensions(&self) -> &[&str];

    /// Check if this reader can handle the given file extension
    fn supports_extension(&self, ext: &str) -> bool {
        self.supported_extensions()
            .iter()
            .any(|e| e.eq_ignore_ascii_case(ext))
    }
}

/// A writer outputs a laid-out scene
pub trait Writer {
    fn write(&self, scene: &GraphScene, output: &Path) -> IoResult<()>;

    /// Identifier for this output format
    fn format_id(&self) -> &str;
}

/// Reader for the node-link JSON format (`nodes`, `links`, `clusters`)
pub struct JsonGraphReader;

impl JsonGraphReader {
    pub fn new() -> Self {
        Self
    }
}

impl Default for JsonGraphReader {
    fn default() -> Self {
        Self::new()
    }
}

impl Reader for JsonGraphReader {
    fn read(&self, input: &Path) -> IoResult<GraphData> {
        if let Some(ext) = input.extension().and_then(|e| e.to_str()) {
            if !self.supports_extension(ext) {
                return Err(IoError::UnsupportedFormat(ext.to_string()));
            }
        }
        let content = fs::read_to_string(input)?;
        serde_json::from_str(&content).map_err(|e| IoError::Parse(e.to_string()))
    }

    fn supported_extensions(&self) -> &[&str] {
        &["json"]
    }
}

#[derive(Debug, Serialize)]
pub struct NodeLayout {
    pub idx: usize,
    pub label: String,
    pub pos_2d: Vec2,
    pub pos_3d: Vec3,
    pub color: Vec3,
}

#[derive(Debug, Serialize)]
pub struct ClusterLayout {
    pub idx: usize,
    pub height: u32,
    pub pos_2d: Vec2,
    pub pos_3d: Vec3,
}

#[derive(Debug, Serialize)]
pub struct EdgeLayout {
    pub source: usize,
    pub target: usize,
    pub lca: usize,
    pub path: Vec<usize>,
    pub render_group: RenderGroup,
    pub mesh: PerGroup<MeshRange>,
}

#[derive(Debug, Serialize)]
pub struct BatchSummary {
    pub group: RenderGroup,
    pub splines: usize,
    pub control_points: usize,
    pub segments: usize,
    pub vertices: u32,
    pub indices: u32,
}

/// Everything a renderer needs to place nodes and size edge buffers
#[derive(Debug, Serialize)]
pub struct LayoutReport {
    pub nodes: Vec<NodeLayout>,
    pub clusters: Vec<ClusterLayout>,
    pub edges: Vec<EdgeLayout>,
    pub batches: Vec<BatchSummary>,
}

impl LayoutReport {
    pub fn from_scene(scene: &GraphScene) -> Self {
        let nodes = scene
            .nodes()
            .iter()
            .map(|node| NodeLayout {
                idx: node.index,
                label: node.label.clone(),
                pos_2d: node.pos_2d,
                pos_3d: node.pos_3d,
                color: node.color,
            })
            .collect();
        let clusters = scene
            .hierarchy()
            .clusters()
            .iter()
            .map(|cluster| ClusterLayout {
                idx: cluster.index,
                height: cluster.height,
                pos_2d: cluster.pos_2d,
                pos_3d: cluster.pos_3d,
            })
            .collect();
        let edges = scene
            .edges()
            .iter()
            .map(|edge| EdgeLayout {
                source: edge.source,
                target: edge.target,
                lca: edge.lca,
                path: edge.path.clone(),
                render_group: edge.render_group,
                mesh: edge.mesh_data,
            })
            .collect();
        let batches = RenderGroup::ALL
            .into_iter()
            .map(|group| {
                let batch = scene.batch(group);
                BatchSummary {
                    group,
                    splines: batch.splines.len(),
                    control_points: batch.control_points.len(),
                    segments: batch.segments.len(),
                    vertices: batch.num_vertices,
                    indices: batch.num_indices(),
                }
            })
            .collect();
        Self {
            nodes,
            clusters,
            edges,
            batches,
        }
    }
}

/// Writes a [`LayoutReport`] as pretty-printed JSON
pub struct LayoutJsonWriter;

impl LayoutJsonWriter {
    pub fn new() -> Self {
        Self
    }
}

impl Default for LayoutJsonWriter {
    fn default() -> Self {
        Self::new()
    }
}

impl Writer for LayoutJsonWriter {
    fn write(&self, scene: &GraphScene, output: &Path) -> IoResult<()> {
        let report = LayoutReport::from_scene(scene);
        let json =
            serde_json::to_string_pretty(&report).map_err(|e| IoError::Write(e.to_string()))?;
        if let Some(parent) = output.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        fs::write(output, json)?;
        Ok(())
    }

    fn format_id(&self) -> &str {
        "json"
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use super::*;
    use crate::config::VisConfig;
    use crate::test_graphs;

    fn fixture_path() -> PathBuf {
        PathBuf::from("tests/fixtures/clustered_graph.json")
    }

    #[test]
    fn json_reader_supports_json_extension() {
        let reader = JsonGraphReader::new();
        assert!(reader.supports_extension("json"));
        assert!(reader.supports_extension("JSON"));
        assert!(!reader.supports_extension("yaml"));
    }

    #[test]
    fn json_reader_parses_fixture() {
        let graph = JsonGraphReader::new().read(&fixture_path()).unwrap();
        assert_eq!(graph, test_graphs::clustered_graph());
    }

    #[test]
    fn json_reader_rejects_other_extensions() {
        let err = JsonGraphReader::new()
            .read(Path::new("graph.ttl"))
            .unwrap_err();
        assert!(matches!(err, IoError::UnsupportedFormat(ext) if ext == "ttl"));
    }

    #[test]
    fn json_reader_reports_parse_errors() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.json");
        fs::write(&path, "{\"nodes\": [").unwrap();
        let err = JsonGraphReader::new().read(&path).unwrap_err();
        assert!(matches!(err, IoError::Parse(_)));
    }

    #[test]
    fn layout_writer_creates_report() {
        let config = VisConfig {
            layout_seed: Some(3),
            ..VisConfig::default()
        };
        let mut scene = GraphScene::new(test_graphs::clustered_graph(), config).unwrap();
        scene.update_treemap_layout();
        scene.setup_edge_meshes();

        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("out").join("layout.json");
        LayoutJsonWriter::new().write(&scene, &output).unwrap();

        let value: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(&output).unwrap()).unwrap();
        assert_eq!(value["nodes"].as_array().unwrap().len(), 8);
        assert_eq!(value["clusters"].as_array().unwrap().len(), 14);
        assert_eq!(value["edges"].as_array().unwrap().len(), 9);
        assert_eq!(value["batches"][0]["group"], "default");
        assert_eq!(value["batches"][0]["splines"], 9);
        assert_eq!(value["edges"][0]["render_group"], "default");
    }
}
