//! Hierarchical edge bundling
//!
//! An edge is routed through the clusters between its endpoints and their
//! lowest common ancestor (LCA). Each cluster on that path contributes one
//! spline control point at the cluster's aggregate position, pulled towards
//! the sphere center by a per-cluster level. Levels are animated when nodes
//! are highlighted.

use std::ops::{Index, IndexMut};

use serde::Serialize;
use tracing::debug;

use crate::cluster::{ClusterHierarchy, ClusterId, LevelParams};
use crate::graph::{EdgeId, GraphError, Node, NodeId};
use crate::highlight::{Interpolate, LevelScales, NodeHighlight, TransitionState};
use crate::math::{self, Vec3};

/// Spline control point before padding
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ControlPoint {
    /// Unit-sphere position
    pub position: Vec3,
    /// Radial scale applied to the position
    pub level: f32,
    /// Parametric position along the edge in `[0, 1]`
    pub knot: f32,
}

/// Visibility partition of edges
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RenderGroup {
    #[default]
    Default = 0,
    Highlighted = 1,
    Remained = 2,
}

impl RenderGroup {
    pub const ALL: [RenderGroup; 3] = [
        RenderGroup::Default,
        RenderGroup::Highlighted,
        RenderGroup::Remained,
    ];

    pub fn index(self) -> usize {
        self as usize
    }

    /// Highlighted wins over Default; anything else is Remained.
    pub fn classify(source: &NodeHighlight, target: &NodeHighlight, in_transition: bool) -> Self {
        let any_highlighted = source.highlighted || target.highlighted;
        let both_highlighted = source.highlighted && target.highlighted;
        let any_neighbor =
            source.has_highlighted_neighbor() || target.has_highlighted_neighbor();

        if both_highlighted || (any_highlighted && any_neighbor) {
            RenderGroup::Highlighted
        } else if !(in_transition || any_highlighted || any_neighbor) {
            RenderGroup::Default
        } else {
            RenderGroup::Remained
        }
    }
}

/// One value per render group
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct PerGroup<T>(pub [T; 3]);

impl<T> PerGroup<T> {
    pub fn iter(&self) -> impl Iterator<Item = (RenderGroup, &T)> {
        RenderGroup::ALL.into_iter().zip(self.0.iter())
    }
}

impl<T> Index<RenderGroup> for PerGroup<T> {
    type Output = T;

    fn index(&self, group: RenderGroup) -> &T {
        &self.0[group.index()]
    }
}

impl<T> IndexMut<RenderGroup> for PerGroup<T> {
    fn index_mut(&mut self, group: RenderGroup) -> &mut T {
        &mut self.0[group.index()]
    }
}

/// Where an edge's tube sits inside one group's shared buffers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct MeshRange {
    pub vertex_offset: u32,
    pub num_vertices: u32,
    pub index_offset: u32,
    pub num_indices: u32,
}

pub type EdgeMeshData = PerGroup<MeshRange>;

/// Level parameters used when computing transition targets
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct BundlingParams {
    pub levels: LevelParams,
    pub scales: LevelScales,
}

/// Position and level scale of an edge endpoint
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Endpoint {
    pub position: Vec3,
    pub level_scale: f32,
}

#[derive(Debug, Clone)]
pub struct Edge {
    pub index: EdgeId,
    pub source: NodeId,
    pub target: NodeId,
    pub lca: ClusterId,
    /// Source-side ancestors below the LCA, the LCA, then the target side
    /// mirrored
    pub path: Vec<ClusterId>,
    pub lca_index: usize,
    pub levels: Vec<f32>,
    pub default_levels: Vec<f32>,
    pub levels_before: Vec<f32>,
    pub levels_after: Vec<f32>,
    /// Control points from the current levels
    pub control_points: Vec<ControlPoint>,
    /// Control points from the default levels
    pub default_control_points: Vec<ControlPoint>,
    pub bundling_strength: f32,
    pub render_group: RenderGroup,
    pub transition: TransitionState,
    pub mesh_update_required: bool,
    pub mesh_data: EdgeMeshData,
}

impl Edge {
    /// Route an edge through the hierarchy.
    ///
    /// Both ancestor chains (nearest first, root excluded) must have the same
    /// length. The LCA is the first depth at which the chains agree, or the
    /// root when they never do.
    pub fn new(
        index: EdgeId,
        source: &Node,
        target: &Node,
        hierarchy: &ClusterHierarchy,
        levels: LevelParams,
        bundling_strength: f32,
    ) -> Result<Self, GraphError> {
        let source_chain = &source.ancestors;
        let target_chain = &target.ancestors;
        if source_chain.len() != target_chain.len() {
            return Err(GraphError::AncestorDepthMismatch {
                source_node: source.index,
                target_node: target.index,
                source_len: source_chain.len(),
                target_len: target_chain.len(),
            });
        }

        let depth = source_chain
            .iter()
            .zip(target_chain)
            .position(|(s, t)| s == t)
            .unwrap_or(source_chain.len());
        let lca = source_chain.get(depth).copied().unwrap_or(hierarchy.root());

        let mut path = Vec::with_capacity(2 * depth + 1);
        path.extend_from_slice(&source_chain[..depth]);
        path.push(lca);
        path.extend(target_chain[..depth].iter().rev());

        debug!(
            edge = index,
            source = source.index,
            target = target.index,
            lca,
            ?path,
            "Routed edge"
        );

        let mut edge = Self {
            index,
            source: source.index,
            target: target.index,
            lca,
            path,
            lca_index: depth,
            levels: Vec::new(),
            default_levels: Vec::new(),
            levels_before: Vec::new(),
            levels_after: Vec::new(),
            control_points: Vec::new(),
            default_control_points: Vec::new(),
            bundling_strength,
            render_group: RenderGroup::Default,
            transition: TransitionState::Default,
            mesh_update_required: false,
            mesh_data: EdgeMeshData::default(),
        };
        edge.update_default_levels(hierarchy, levels);
        edge.levels = edge.default_levels.clone();
        edge.levels_before = edge.default_levels.clone();
        edge.levels_after = edge.default_levels.clone();
        Ok(edge)
    }

    pub fn in_transition(&self) -> bool {
        self.transition == TransitionState::Transitioning
    }

    pub fn bundling_strength(&self) -> f32 {
        self.bundling_strength
    }

    /// Recompute the default level of every path cluster
    pub fn update_default_levels(&mut self, hierarchy: &ClusterHierarchy, levels: LevelParams) {
        self.default_levels = self.fresh_default_levels(hierarchy, levels);
    }

    fn fresh_default_levels(&self, hierarchy: &ClusterHierarchy, levels: LevelParams) -> Vec<f32> {
        self.path
            .iter()
            .map(|&cluster| hierarchy.default_level(cluster, levels))
            .collect()
    }

    /// Source endpoint at knot 0, one point per non-root path cluster at
    /// knot `(i + 1) / (len + 1)`, target endpoint at knot 1
    pub fn derive_control_points(
        &self,
        hierarchy: &ClusterHierarchy,
        levels: &[f32],
        source: Endpoint,
        target: Endpoint,
    ) -> Vec<ControlPoint> {
        let num_path = self.path.len();
        let mut points = Vec::with_capacity(num_path + 2);
        points.push(ControlPoint {
            position: source.position,
            level: source.level_scale,
            knot: 0.0,
        });
        for (i, (&cluster, &level)) in self.path.iter().zip(levels).enumerate() {
            if hierarchy.is_root(cluster) {
                continue;
            }
            points.push(ControlPoint {
                position: hierarchy.get(cluster).pos_3d,
                level,
                knot: (i + 1) as f32 / (num_path + 1) as f32,
            });
        }
        points.push(ControlPoint {
            position: target.position,
            level: target.level_scale,
            knot: 1.0,
        });
        points
    }

    /// Control points from the current levels and node level scales
    pub fn update_control_points(&mut self, hierarchy: &ClusterHierarchy, nodes: &[Node]) {
        let source = &nodes[self.source];
        let target = &nodes[self.target];
        self.control_points = self.derive_control_points(
            hierarchy,
            &self.levels,
            Endpoint {
                position: source.pos_3d,
                level_scale: source.highlight.level_scale,
            },
            Endpoint {
                position: target.pos_3d,
                level_scale: target.highlight.level_scale,
            },
        );
    }

    /// Control points from fresh default levels at the default level scale
    pub fn update_default_control_points(
        &mut self,
        hierarchy: &ClusterHierarchy,
        nodes: &[Node],
        levels: LevelParams,
        default_level_scale: f32,
    ) {
        self.update_default_levels(hierarchy, levels);
        self.default_control_points = self.derive_control_points(
            hierarchy,
            &self.default_levels,
            Endpoint {
                position: nodes[self.source].pos_3d,
                level_scale: default_level_scale,
            },
            Endpoint {
                position: nodes[self.target].pos_3d,
                level_scale: default_level_scale,
            },
        );
    }

    pub fn update_render_group(&mut self, nodes: &[Node]) {
        self.render_group = RenderGroup::classify(
            &nodes[self.source].highlight,
            &nodes[self.target].highlight,
            self.in_transition(),
        );
    }

    /// Snapshot the current levels and compute the transition targets.
    ///
    /// With no highlighted endpoint and no highlighted neighbor the targets
    /// are the default levels. Otherwise they ramp linearly from each
    /// endpoint's target scale to a peak at the LCA: the highlighted scale
    /// when both endpoints are highlighted, else the default scale plus the
    /// cluster level offset.
    pub fn begin_transition(
        &mut self,
        hierarchy: &ClusterHierarchy,
        nodes: &[Node],
        params: &BundlingParams,
    ) {
        self.levels_before = self.levels.clone();

        let source = &nodes[self.source].highlight;
        let target = &nodes[self.target].highlight;
        let any_highlighted = source.highlighted || target.highlighted;
        let any_neighbor = source.has_highlighted_neighbor() || target.has_highlighted_neighbor();

        if !(any_highlighted || any_neighbor) {
            self.levels_after = self.fresh_default_levels(hierarchy, params.levels);
            return;
        }

        let peak = if source.highlighted && target.highlighted {
            params.scales.highlighted
        } else {
            params.scales.default + params.levels.offset
        };
        let lca = self.lca_index;
        let num = self.path.len();

        self.levels_after = (0..num)
            .map(|i| {
                if i < lca {
                    math::lerp(
                        source.level_scale_after,
                        peak,
                        (i + 1) as f32 / (lca + 1) as f32,
                    )
                } else if i == lca {
                    peak
                } else {
                    math::lerp(
                        peak,
                        target.level_scale_after,
                        (i - lca) as f32 / (num - lca) as f32,
                    )
                }
            })
            .collect();
    }
}

impl Interpolate for Edge {
    fn start(&mut self) {
        self.transition = TransitionState::Transitioning;
    }

    fn update(&mut self, alpha: f32) {
        self.transition = TransitionState::Transitioning;
        self.mesh_update_required = true;
        for ((level, &before), &after) in self
            .levels
            .iter_mut()
            .zip(&self.levels_before)
            .zip(&self.levels_after)
        {
            *level = math::lerp(before, after, alpha);
        }
    }

    fn finish(&mut self) {
        self.levels.clone_from(&self.levels_after);
        self.transition = TransitionState::Default;
        // the render group changes once the edge leaves the transition
        self.mesh_update_required = true;
    }
}
