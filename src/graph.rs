//! Graph input records, graph nodes, and structural errors
//!
//! The input format is the node-link JSON produced by the clustering
//! preprocessor: `nodes`, `links` and a flat `clusters` list whose parent
//! links describe the hierarchy. Missing indices may be omitted or given as
//! negative numbers.

use serde::{Deserialize, Deserializer, Serialize};
use thiserror::Error;

use crate::cluster::ClusterId;
use crate::highlight::{NodeHighlight, Timeline};
use crate::math::{Vec2, Vec3};

/// Index of a node in the scene's node arena
pub type NodeId = usize;

/// Index of an edge in the scene's edge arena
pub type EdgeId = usize;

/// Structural problems in the input graph.
///
/// These mean the graph data is malformed; setup stops at the first one.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GraphError {
    #[error("cluster hierarchy has no root")]
    MissingRoot,

    #[error("cluster hierarchy has more than one root (clusters {0} and {1})")]
    MultipleRoots(usize, usize),

    #[error("cluster record at position {position} declares index {index}")]
    MisplacedCluster { position: usize, index: usize },

    #[error("cluster {cluster} references cluster {index}, but there are only {len} clusters")]
    ClusterIndexOutOfRange {
        cluster: usize,
        index: usize,
        len: usize,
    },

    #[error("{context} references node {index}, but there are only {len} nodes")]
    NodeIndexOutOfRange {
        context: String,
        index: usize,
        len: usize,
    },

    #[error("node record at position {position} declares index {index}")]
    MisplacedNode { position: usize, index: usize },

    #[error("node {node} lists ancestor cluster {index}, but there are only {len} clusters")]
    AncestorOutOfRange {
        node: usize,
        index: usize,
        len: usize,
    },

    #[error("node {node} lists ancestors {found:?}, but its leaf cluster's ancestors are {expected:?}")]
    AncestorMismatch {
        node: usize,
        expected: Vec<usize>,
        found: Vec<usize>,
    },

    #[error("cluster {0} is not reachable from the root")]
    UnreachableCluster(usize),

    #[error("cluster {0} has neither children nor a node")]
    LeafWithoutNode(usize),

    #[error("cluster {0} is bound to a node but also has children")]
    NodeClusterWithChildren(usize),

    #[error("node {0} is not bound to any leaf cluster")]
    UnboundNode(usize),

    #[error(
        "edge {source_node}-{target_node}: ancestor chains differ in length ({source_len} vs {target_len})"
    )]
    AncestorDepthMismatch {
        source_node: usize,
        target_node: usize,
        source_len: usize,
        target_len: usize,
    },
}

/// A node as stored in the graph file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeRecord {
    pub idx: usize,

    #[serde(default)]
    pub label: String,

    /// Ancestor clusters, nearest first, root excluded
    #[serde(rename = "ancIdxs", default, skip_serializing_if = "Option::is_none")]
    pub ancestors: Option<Vec<usize>>,
}

/// An edge as stored in the graph file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EdgeRecord {
    #[serde(rename = "sourceIdx")]
    pub source: usize,

    #[serde(rename = "targetIdx")]
    pub target: usize,
}

/// A cluster as stored in the graph file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClusterRecord {
    pub idx: usize,

    /// Bound node for leaf clusters
    #[serde(
        rename = "nodeIdx",
        default,
        deserialize_with = "optional_index",
        skip_serializing_if = "Option::is_none"
    )]
    pub node: Option<usize>,

    /// Parent cluster, absent for the root
    #[serde(
        rename = "parentIdx",
        default,
        deserialize_with = "optional_index",
        skip_serializing_if = "Option::is_none"
    )]
    pub parent: Option<usize>,

    /// Levels above the deepest leaf below this cluster; derived from the
    /// parent links when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub height: Option<u32>,
}

/// Complete graph file contents
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GraphData {
    pub nodes: Vec<NodeRecord>,

    #[serde(rename = "links")]
    pub edges: Vec<EdgeRecord>,

    pub clusters: Vec<ClusterRecord>,
}

fn optional_index<'de, D>(deserializer: D) -> Result<Option<usize>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<i64>::deserialize(deserializer)?;
    Ok(value.and_then(|v| usize::try_from(v).ok()))
}

/// A graph node placed in the scene
#[derive(Debug, Clone)]
pub struct Node {
    pub index: NodeId,
    pub label: String,
    pub pos_2d: Vec2,
    /// Position on the unit sphere
    pub pos_3d: Vec3,
    /// Ancestor clusters, nearest first, root excluded
    pub ancestors: Vec<ClusterId>,
    /// Linear RGB
    pub color: Vec3,
    pub edges: Vec<EdgeId>,
    pub neighbors: Vec<NodeId>,
    pub highlight: NodeHighlight,
    pub timeline: Timeline,
}

impl Node {
    pub fn new(index: NodeId, label: impl Into<String>, default_level_scale: f32) -> Self {
        Self {
            index,
            label: label.into(),
            pos_2d: [0.0, 0.0],
            pos_3d: [0.0, 0.0, 0.0],
            ancestors: Vec::new(),
            color: [1.0, 1.0, 1.0],
            edges: Vec::new(),
            neighbors: Vec::new(),
            highlight: NodeHighlight::new(default_level_scale),
            timeline: Timeline::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_node_link_format() {
        let json = r#"{
            "nodes": [
                {"idx": 0, "label": "Valjean", "ancIdxs": [3]},
                {"idx": 1, "label": "Javert", "ancIdxs": [3]}
            ],
            "links": [{"sourceIdx": 0, "targetIdx": 1}],
            "clusters": [
                {"idx": 0, "nodeIdx": 0, "parentIdx": 2, "height": 0},
                {"idx": 1, "nodeIdx": 1, "parentIdx": 2, "height": 0},
                {"idx": 2, "height": 1}
            ]
        }"#;

        let graph: GraphData = serde_json::from_str(json).unwrap();
        assert_eq!(graph.nodes.len(), 2);
        assert_eq!(graph.nodes[0].label, "Valjean");
        assert_eq!(graph.nodes[0].ancestors, Some(vec![3]));
        assert_eq!(graph.edges[0], EdgeRecord { source: 0, target: 1 });
        assert_eq!(graph.clusters[2].parent, None);
        assert_eq!(graph.clusters[2].node, None);
        assert_eq!(graph.clusters[0].parent, Some(2));
    }

    #[test]
    fn negative_indices_mean_absent() {
        let json = r#"{"idx": 4, "nodeIdx": -1, "parentIdx": -1, "height": 2}"#;
        let cluster: ClusterRecord = serde_json::from_str(json).unwrap();
        assert_eq!(cluster.node, None);
        assert_eq!(cluster.parent, None);
        assert_eq!(cluster.height, Some(2));
    }

    #[test]
    fn missing_height_parses_as_none() {
        let cluster: ClusterRecord = serde_json::from_str(r#"{"idx": 1, "parentIdx": 0}"#).unwrap();
        assert_eq!(cluster.height, None);
    }

    #[test]
    fn missing_ancestors_parse_as_none() {
        let node: NodeRecord = serde_json::from_str(r#"{"idx": 7}"#).unwrap();
        assert_eq!(node.ancestors, None);
        assert!(node.label.is_empty());
    }

    #[test]
    fn depth_mismatch_message_names_both_nodes() {
        let err = GraphError::AncestorDepthMismatch {
            source_node: 3,
            target_node: 9,
            source_len: 2,
            target_len: 3,
        };
        assert_eq!(
            err.to_string(),
            "edge 3-9: ancestor chains differ in length (2 vs 3)"
        );
    }
}
