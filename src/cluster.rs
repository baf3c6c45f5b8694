//! Cluster hierarchy over graph nodes
//!
//! Clusters live in an arena addressed by [`ClusterId`]; parent and child
//! relations are stored as indices. Aggregates (descendant counts, 3D
//! centroids) are computed with post-order passes so every child is final
//! before its parent reads it.

use tracing::{debug, warn};

use crate::graph::{ClusterRecord, GraphError, NodeId};
use crate::math::{self, Vec2, Vec3, ZERO3};
use crate::traversal;

/// Index of a cluster in the hierarchy arena
pub type ClusterId = usize;

/// Parameters of the default cluster level curve
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LevelParams {
    pub scale: f32,
    pub exponent: f32,
    pub offset: f32,
}

impl Default for LevelParams {
    fn default() -> Self {
        Self {
            scale: 1.0,
            exponent: 2.0,
            offset: 0.1,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Cluster {
    pub index: ClusterId,
    /// Bound graph node; present exactly for leaf clusters
    pub node: Option<NodeId>,
    pub parent: Option<ClusterId>,
    pub children: Vec<ClusterId>,
    /// Distance from the nearest leaf (leaves are 0)
    pub height: u32,
    pub pos_2d: Vec2,
    pub pos_3d: Vec3,
    pub num_descendant_nodes: usize,
}

impl Cluster {
    pub fn is_root(&self) -> bool {
        self.parent.is_none()
    }

    pub fn is_leaf(&self) -> bool {
        self.node.is_some()
    }
}

/// Rooted tree of clusters, built once per graph load
#[derive(Debug, Clone)]
pub struct ClusterHierarchy {
    clusters: Vec<Cluster>,
    root: ClusterId,
    node_clusters: Vec<ClusterId>,
}

impl ClusterHierarchy {
    /// Build and validate the hierarchy from flat cluster records.
    ///
    /// Records must be stored at the position matching their index. Every
    /// graph node in `0..num_nodes` must be bound to exactly one leaf.
    pub fn from_records(records: &[ClusterRecord], num_nodes: usize) -> Result<Self, GraphError> {
        let len = records.len();
        let mut root = None;
        let mut node_clusters = vec![None; num_nodes];

        for (position, record) in records.iter().enumerate() {
            if record.idx != position {
                return Err(GraphError::MisplacedCluster {
                    position,
                    index: record.idx,
                });
            }
            match record.parent {
                Some(parent) if parent >= len => {
                    return Err(GraphError::ClusterIndexOutOfRange {
                        cluster: position,
                        index: parent,
                        len,
                    });
                }
                Some(_) => {}
                None => match root {
                    Some(existing) => return Err(GraphError::MultipleRoots(existing, position)),
                    None => root = Some(position),
                },
            }
            if let Some(node) = record.node {
                if node >= num_nodes {
                    return Err(GraphError::NodeIndexOutOfRange {
                        context: format!("cluster {position}"),
                        index: node,
                        len: num_nodes,
                    });
                }
                node_clusters[node] = Some(position);
            }
        }

        let root = root.ok_or(GraphError::MissingRoot)?;

        let mut clusters: Vec<Cluster> = records
            .iter()
            .map(|record| Cluster {
                index: record.idx,
                node: record.node,
                parent: record.parent,
                children: Vec::new(),
                height: 0,
                pos_2d: [0.0, 0.0],
                pos_3d: ZERO3,
                num_descendant_nodes: 0,
            })
            .collect();

        for record in records {
            if let Some(parent) = record.parent {
                clusters[parent].children.push(record.idx);
            }
        }

        for cluster in &clusters {
            match (cluster.node, cluster.children.is_empty()) {
                (Some(_), false) => return Err(GraphError::NodeClusterWithChildren(cluster.index)),
                (None, true) => return Err(GraphError::LeafWithoutNode(cluster.index)),
                _ => {}
            }
        }

        let mut reached = vec![false; len];
        for id in traversal::pre_order(root, |id| clusters[id].children.as_slice()) {
            reached[id] = true;
        }
        if let Some(unreached) = reached.iter().position(|&r| !r) {
            return Err(GraphError::UnreachableCluster(unreached));
        }

        let mut mismatched = 0usize;
        let order = traversal::post_order(root, |id| clusters[id].children.as_slice());
        for id in order {
            let derived = clusters[id]
                .children
                .iter()
                .map(|&child| clusters[child].height + 1)
                .max()
                .unwrap_or(0);
            clusters[id].height = match records[id].height {
                Some(height) => {
                    if height != derived {
                        debug!(cluster = id, height, derived, "Height disagrees with children");
                        mismatched += 1;
                    }
                    height
                }
                None => derived,
            };
        }
        if mismatched > 0 {
            warn!(mismatched, "Cluster heights differ from the hierarchy depth");
        }

        let node_clusters = node_clusters
            .into_iter()
            .enumerate()
            .map(|(node, cluster)| cluster.ok_or(GraphError::UnboundNode(node)))
            .collect::<Result<Vec<_>, _>>()?;

        debug!(clusters = len, root, "Built cluster hierarchy");

        Ok(Self {
            clusters,
            root,
            node_clusters,
        })
    }

    pub fn len(&self) -> usize {
        self.clusters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clusters.is_empty()
    }

    pub fn root(&self) -> ClusterId {
        self.root
    }

    pub fn get(&self, id: ClusterId) -> &Cluster {
        &self.clusters[id]
    }

    pub fn clusters(&self) -> &[Cluster] {
        &self.clusters
    }

    pub fn is_root(&self, id: ClusterId) -> bool {
        self.clusters[id].is_root()
    }

    pub fn is_leaf(&self, id: ClusterId) -> bool {
        self.clusters[id].is_leaf()
    }

    /// Leaf cluster bound to a graph node
    pub fn cluster_of_node(&self, node: NodeId) -> ClusterId {
        self.node_clusters[node]
    }

    pub fn pre_order(&self) -> Vec<ClusterId> {
        let clusters = &self.clusters;
        traversal::pre_order(self.root, move |id| clusters[id].children.as_slice())
    }

    pub fn post_order(&self) -> Vec<ClusterId> {
        let clusters = &self.clusters;
        traversal::post_order(self.root, move |id| clusters[id].children.as_slice())
    }

    /// Ancestors of a cluster, nearest first, root excluded
    pub fn ancestor_chain(&self, id: ClusterId) -> Vec<ClusterId> {
        let mut chain = Vec::new();
        let mut current = self.clusters[id].parent;
        while let Some(parent) = current {
            if self.clusters[parent].is_root() {
                break;
            }
            chain.push(parent);
            current = self.clusters[parent].parent;
        }
        chain
    }

    pub fn set_pos_2d(&mut self, id: ClusterId, pos: Vec2) {
        self.clusters[id].pos_2d = pos;
    }

    /// Leaves count 1, internal clusters sum their children
    pub fn compute_descendant_counts(&mut self) {
        for id in self.post_order() {
            let count = if self.clusters[id].is_leaf() {
                1
            } else {
                self.clusters[id]
                    .children
                    .iter()
                    .map(|&child| self.clusters[child].num_descendant_nodes)
                    .sum()
            };
            self.clusters[id].num_descendant_nodes = count;
        }
    }

    /// Set leaf positions from their nodes and internal positions to the
    /// normalized, count-weighted centroid of their children.
    ///
    /// A cluster whose weighted sum is zero keeps the zero vector, which
    /// callers treat as unset. Requires descendant counts to be current.
    pub fn compute_aggregate_positions(&mut self, node_positions: &[Vec3]) {
        let mut unset = 0usize;
        for id in self.post_order() {
            let pos = match self.clusters[id].node {
                Some(node) => node_positions[node],
                None => {
                    let sum = self.clusters[id].children.iter().fold(ZERO3, |acc, &child| {
                        let child = &self.clusters[child];
                        math::add(acc, math::scale(child.pos_3d, child.num_descendant_nodes as f32))
                    });
                    let pos = math::normalize_or_zero(sum);
                    if pos == ZERO3 {
                        unset += 1;
                    }
                    pos
                }
            };
            self.clusters[id].pos_3d = pos;
        }
        if unset > 0 {
            warn!(unset, "Clusters with a zero aggregate position");
        }
    }

    /// `(1 + offset) + scale * (height - 1)^exponent`, with `height - 1`
    /// floored at 0.
    ///
    /// Only internal clusters have a default level.
    pub fn default_level(&self, id: ClusterId, params: LevelParams) -> f32 {
        let cluster = &self.clusters[id];
        debug_assert!(!cluster.is_leaf(), "leaf cluster {id} has no default level");
        let steps = cluster.height.saturating_sub(1) as f32;
        (1.0 + params.offset) + params.scale * steps.powf(params.exponent)
    }
}
