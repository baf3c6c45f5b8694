//! Small hand-built graphs shared by unit tests

use crate::graph::{ClusterRecord, EdgeRecord, GraphData, NodeRecord};

fn cluster(idx: usize, node: Option<usize>, parent: Option<usize>, height: u32) -> ClusterRecord {
    ClusterRecord {
        idx,
        node,
        parent,
        height: Some(height),
    }
}

fn node(idx: usize, ancestors: &[usize]) -> NodeRecord {
    NodeRecord {
        idx,
        label: format!("n{idx}"),
        ancestors: Some(ancestors.to_vec()),
    }
}

fn edge(source: usize, target: usize) -> EdgeRecord {
    EdgeRecord { source, target }
}

/// Eight nodes under a three-level hierarchy.
///
/// ```text
///                13 (root, h3)
///          11 (h2)          12 (h2)
///      8 (h1)   9 (h1)      10 (h1)
///     0 1 2     3 4        5 6 7      leaf clusters bound to nodes 0..7
/// ```
pub fn clustered_graph() -> GraphData {
    let mut clusters: Vec<ClusterRecord> = (0..8)
        .map(|i| {
            let parent = match i {
                0..=2 => 8,
                3..=4 => 9,
                _ => 10,
            };
            cluster(i, Some(i), Some(parent), 0)
        })
        .collect();
    clusters.extend([
        cluster(8, None, Some(11), 1),
        cluster(9, None, Some(11), 1),
        cluster(10, None, Some(12), 1),
        cluster(11, None, Some(13), 2),
        cluster(12, None, Some(13), 2),
        cluster(13, None, None, 3),
    ]);

    let nodes = (0..8)
        .map(|i| match i {
            0..=2 => node(i, &[8, 11]),
            3..=4 => node(i, &[9, 11]),
            _ => node(i, &[10, 12]),
        })
        .collect();

    let edges = vec![
        edge(0, 1),
        edge(1, 2),
        edge(0, 3),
        edge(2, 4),
        edge(3, 4),
        edge(4, 5),
        edge(5, 6),
        edge(6, 7),
        edge(0, 7),
    ];

    GraphData {
        nodes,
        edges,
        clusters,
    }
}

/// Two sibling leaves below a non-root parent: root 3 -> 2 -> {0, 1}
pub fn sibling_graph() -> GraphData {
    GraphData {
        nodes: vec![node(0, &[2]), node(1, &[2])],
        edges: vec![edge(0, 1)],
        clusters: vec![
            cluster(0, Some(0), Some(2), 0),
            cluster(1, Some(1), Some(2), 0),
            cluster(2, None, Some(3), 1),
            cluster(3, None, None, 2),
        ],
    }
}

/// Four leaves in two top-level clusters: root 6 -> {4 -> {0, 1}, 5 -> {2, 3}}
pub fn two_level_graph() -> GraphData {
    GraphData {
        nodes: vec![node(0, &[4]), node(1, &[4]), node(2, &[5]), node(3, &[5])],
        edges: vec![edge(0, 1), edge(1, 2)],
        clusters: vec![
            cluster(0, Some(0), Some(4), 0),
            cluster(1, Some(1), Some(4), 0),
            cluster(2, Some(2), Some(5), 0),
            cluster(3, Some(3), Some(5), 0),
            cluster(4, None, Some(6), 1),
            cluster(5, None, Some(6), 1),
            cluster(6, None, None, 2),
        ],
    }
}
