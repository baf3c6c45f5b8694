//! The graph scene: owner of nodes, edges, hierarchy and mesh batches
//!
//! Typical use:
//!
//! ```rust,ignore
//! let mut scene = GraphScene::new(graph, VisConfig::default())?;
//! scene.initialize_layout();
//! scene.begin_highlight(0);
//! while scene.is_animating() {
//!     scene.tick(1.0 / 60.0);
//! }
//! let vertices = scene.compute_vertices(RenderGroup::Highlighted, &CpuKernel::new());
//! ```

use rand::SeedableRng;
use rand::rngs::StdRng;
use rayon::prelude::*;
use tracing::{debug, info, warn};

use crate::bundling::{Edge, PerGroup, RenderGroup};
use crate::cluster::ClusterHierarchy;
use crate::color;
use crate::config::VisConfig;
use crate::graph::{GraphData, GraphError, Node, NodeId};
use crate::highlight::{Interpolate, Timeline, TimelineStep};
use crate::math::{self, Vec2};
use crate::mesh::{MeshBatch, MeshGeometryBuilder, MeshKernel, MeshVertex, SplineUniforms};
use crate::treemap::{LeafWeights, Rect, TreemapLayout};

pub struct GraphScene {
    config: VisConfig,
    nodes: Vec<Node>,
    edges: Vec<Edge>,
    hierarchy: ClusterHierarchy,
    builder: MeshGeometryBuilder,
    batches: PerGroup<MeshBatch>,
    leaf_weights: LeafWeights,
    /// Default control points and the Default batch are stale
    default_mesh_dirty: bool,
    planar_extent: Vec2,
    rng: StdRng,
}

impl GraphScene {
    /// Validate the graph and route every edge through the hierarchy.
    ///
    /// Ancestor chains come from the parent links; a supplied `ancIdxs`
    /// must match them exactly. Nothing
    /// is laid out yet; see [`GraphScene::initialize_layout`].
    pub fn new(data: GraphData, config: VisConfig) -> Result<Self, GraphError> {
        let num_nodes = data.nodes.len();
        let mut hierarchy = ClusterHierarchy::from_records(&data.clusters, num_nodes)?;
        hierarchy.compute_descendant_counts();

        let scales = config.level_scales();
        let mut nodes = Vec::with_capacity(num_nodes);
        for (position, record) in data.nodes.into_iter().enumerate() {
            if record.idx != position {
                return Err(GraphError::MisplacedNode {
                    position,
                    index: record.idx,
                });
            }
            let ancestors = hierarchy.ancestor_chain(hierarchy.cluster_of_node(position));
            if let Some(found) = record.ancestors {
                if let Some(&index) = found.iter().find(|&&a| a >= hierarchy.len()) {
                    return Err(GraphError::AncestorOutOfRange {
                        node: position,
                        index,
                        len: hierarchy.len(),
                    });
                }
                if found != ancestors {
                    return Err(GraphError::AncestorMismatch {
                        node: position,
                        expected: ancestors,
                        found,
                    });
                }
            }
            let mut node = Node::new(position, record.label, scales.default);
            node.ancestors = ancestors;
            node.timeline = Timeline::new(config.transition_duration);
            nodes.push(node);
        }

        let levels = config.level_params();
        let mut edges = Vec::with_capacity(data.edges.len());
        for (i, record) in data.edges.iter().enumerate() {
            for index in [record.source, record.target] {
                if index >= num_nodes {
                    return Err(GraphError::NodeIndexOutOfRange {
                        context: format!("edge {i}"),
                        index,
                        len: num_nodes,
                    });
                }
            }
            let edge = Edge::new(
                i,
                &nodes[record.source],
                &nodes[record.target],
                &hierarchy,
                levels,
                config.edge_bundling_strength,
            )?;
            edges.push(edge);

            let (source, target) = (record.source, record.target);
            nodes[source].edges.push(i);
            if source != target {
                nodes[target].edges.push(i);
                if !nodes[source].neighbors.contains(&target) {
                    nodes[source].neighbors.push(target);
                    nodes[target].neighbors.push(source);
                }
            }
        }

        let rng = match config.layout_seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };

        info!(
            nodes = nodes.len(),
            edges = edges.len(),
            clusters = hierarchy.len(),
            "Loaded graph"
        );

        Ok(Self {
            builder: MeshGeometryBuilder::new(config.edge_num_sides, config.edge_spline_resolution),
            batches: PerGroup(RenderGroup::ALL.map(|group| MeshBatch {
                group,
                ..MeshBatch::default()
            })),
            leaf_weights: LeafWeights::Random,
            default_mesh_dirty: true,
            planar_extent: config.planar_extent(),
            config,
            nodes,
            edges,
            hierarchy,
            rng,
        })
    }

    pub fn config(&self) -> &VisConfig {
        &self.config
    }

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    pub fn node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id)
    }

    pub fn edges(&self) -> &[Edge] {
        &self.edges
    }

    pub fn hierarchy(&self) -> &ClusterHierarchy {
        &self.hierarchy
    }

    pub fn builder(&self) -> &MeshGeometryBuilder {
        &self.builder
    }

    pub fn batch(&self, group: RenderGroup) -> &MeshBatch {
        &self.batches[group]
    }

    pub fn planar_extent(&self) -> Vec2 {
        self.planar_extent
    }

    pub fn is_default_mesh_dirty(&self) -> bool {
        self.default_mesh_dirty
    }

    /// Leaf weights used by the next treemap layout
    pub fn set_leaf_weights(&mut self, weights: LeafWeights) {
        self.leaf_weights = weights;
    }

    /// Colors, treemap layout and all three edge batches
    pub fn initialize_layout(&mut self) {
        self.update_colors();
        self.update_treemap_layout();
        self.setup_edge_meshes();
    }

    // =========================================================================
    // Layout
    // =========================================================================

    /// Re-read the field of view and re-project the current layout
    pub fn update_planar_extent(&mut self) {
        self.planar_extent = self.config.planar_extent();
        self.normalize_node_positions();
    }

    /// Map node 2D bounds onto the planar extent, project to the sphere and
    /// refresh cluster aggregate positions.
    ///
    /// An axis with zero extent maps every node to 0 on that axis.
    pub fn normalize_node_positions(&mut self) {
        let Some(first) = self.nodes.first().map(|n| n.pos_2d) else {
            return;
        };
        let (min, max) = self.nodes.iter().fold((first, first), |(min, max), node| {
            let p = node.pos_2d;
            (
                [min[0].min(p[0]), min[1].min(p[1])],
                [max[0].max(p[0]), max[1].max(p[1])],
            )
        });
        let center = [(min[0] + max[0]) / 2.0, (min[1] + max[1]) / 2.0];
        let extent = [(max[0] - min[0]) / 2.0, (max[1] - min[1]) / 2.0];
        let projection = self.config.projection;
        let planar = self.planar_extent;

        for node in &mut self.nodes {
            let p: Vec2 = std::array::from_fn(|axis| {
                if extent[axis] > 0.0 {
                    (node.pos_2d[axis] - center[axis]) / extent[axis] * planar[axis]
                } else {
                    0.0
                }
            });
            node.pos_3d = projection.project(p);
        }

        let positions: Vec<_> = self.nodes.iter().map(|n| n.pos_3d).collect();
        self.hierarchy.compute_aggregate_positions(&positions);
        self.default_mesh_dirty = true;
        debug!(?projection, ?planar, "Projected node positions");
    }

    /// Lay the hierarchy out as a treemap over the planar extent and project
    /// the result
    pub fn update_treemap_layout(&mut self) {
        self.planar_extent = self.config.planar_extent();

        let mut layout = TreemapLayout::new(&self.hierarchy);
        layout.assign_weights(&self.leaf_weights, &mut self.rng);
        let positions = layout.compute(
            Rect::centered(self.planar_extent),
            self.config.treemap_nesting,
            &mut self.rng,
        );

        for (id, pos) in positions.into_iter().enumerate() {
            self.hierarchy.set_pos_2d(id, pos);
            if let Some(node) = self.hierarchy.get(id).node {
                self.nodes[node].pos_2d = pos;
            }
        }
        self.normalize_node_positions();
        info!(clusters = self.hierarchy.len(), "Updated treemap layout");
    }

    /// Spread hues over the leaves in hierarchy pre-order so siblings get
    /// similar colors
    pub fn update_colors(&mut self) {
        let num_nodes = self.nodes.len().max(1) as f32;
        let config = &self.config;
        let mut i = 0usize;
        for id in self.hierarchy.pre_order() {
            let Some(node) = self.hierarchy.get(id).node else {
                continue;
            };
            let hue = math::lerp(config.hue_min, config.hue_max, i as f32 / num_nodes);
            self.nodes[node].color =
                color::hcl_to_rgb([hue / 360.0, config.chroma, config.luminance]);
            i += 1;
        }
        self.default_mesh_dirty = true;
    }

    // =========================================================================
    // Edge meshes
    // =========================================================================

    /// Derive all control points and build every batch from scratch
    pub fn setup_edge_meshes(&mut self) {
        let (hierarchy, nodes) = (&self.hierarchy, &self.nodes);
        let levels = self.config.level_params();
        let default_scale = self.config.default_level_scale;

        self.edges.par_iter_mut().for_each(|edge| {
            edge.update_default_control_points(hierarchy, nodes, levels, default_scale);
            edge.update_control_points(hierarchy, nodes);
            edge.update_render_group(nodes);
            edge.mesh_update_required = false;
        });

        for group in RenderGroup::ALL {
            self.batches[group] = self.builder.build(group, &mut self.edges, &self.nodes);
        }
        self.default_mesh_dirty = false;

        info!(
            edges = self.edges.len(),
            vertices = self.batches[RenderGroup::Default].num_vertices,
            "Built edge meshes"
        );
    }

    /// Rebuild whatever went stale since the last call.
    ///
    /// A dirty default rebuilds all three batches. Otherwise only flagged
    /// edges are re-derived, and the Highlighted and Remained batches are
    /// rebuilt when any edge was flagged. Returns whether a batch changed.
    pub fn update_edge_meshes(&mut self) -> bool {
        let (hierarchy, nodes) = (&self.hierarchy, &self.nodes);

        if self.default_mesh_dirty {
            let levels = self.config.level_params();
            let default_scale = self.config.default_level_scale;
            self.edges.par_iter_mut().for_each(|edge| {
                edge.update_default_control_points(hierarchy, nodes, levels, default_scale);
            });
            self.batches[RenderGroup::Default] =
                self.builder
                    .build(RenderGroup::Default, &mut self.edges, &self.nodes);

            let nodes = &self.nodes;
            self.edges.par_iter_mut().for_each(|edge| {
                edge.update_render_group(nodes);
                edge.update_control_points(hierarchy, nodes);
                edge.mesh_update_required = false;
            });
            self.rebuild_highlight_batches();
            self.default_mesh_dirty = false;
            return true;
        }

        let updated = self
            .edges
            .par_iter_mut()
            .filter(|edge| edge.mesh_update_required)
            .map(|edge| {
                edge.update_render_group(nodes);
                edge.update_control_points(hierarchy, nodes);
                edge.mesh_update_required = false;
            })
            .count();

        if updated == 0 {
            return false;
        }
        debug!(updated, "Re-derived flagged edges");
        self.rebuild_highlight_batches();
        true
    }

    fn rebuild_highlight_batches(&mut self) {
        for group in [RenderGroup::Highlighted, RenderGroup::Remained] {
            self.batches[group] = self.builder.build(group, &mut self.edges, &self.nodes);
        }
    }

    pub fn uniforms(&self) -> SplineUniforms {
        self.config
            .spline_uniforms(self.builder.num_sides(), self.builder.num_samples())
    }

    /// Tessellate one batch. `None` when the kernel dropped the request.
    pub fn compute_vertices(
        &self,
        group: RenderGroup,
        kernel: &dyn MeshKernel,
    ) -> Option<Vec<MeshVertex>> {
        kernel.compute(&self.batches[group], &self.uniforms())
    }

    // =========================================================================
    // Highlighting
    // =========================================================================

    /// Highlight a node and mark its neighbors. Returns false when the node
    /// doesn't exist or is already highlighted.
    pub fn begin_highlight(&mut self, id: NodeId) -> bool {
        match self.nodes.get(id) {
            None => {
                warn!(node = id, "Cannot highlight unknown node");
                return false;
            }
            Some(node) if node.highlight.highlighted => return false,
            Some(_) => {}
        }

        let scales = self.config.level_scales();
        self.nodes[id].highlight.begin_highlighted(&scales);
        self.begin_transition(id);
        for neighbor in self.nodes[id].neighbors.clone() {
            self.begin_neighbor_highlight(neighbor);
        }
        debug!(node = id, "Highlighted node");
        true
    }

    /// Returns false when the node doesn't exist or isn't highlighted
    pub fn end_highlight(&mut self, id: NodeId) -> bool {
        if !self.nodes.get(id).is_some_and(|n| n.highlight.highlighted) {
            return false;
        }

        let scales = self.config.level_scales();
        self.nodes[id].highlight.end_highlighted(&scales);
        self.begin_transition(id);
        for neighbor in self.nodes[id].neighbors.clone() {
            self.end_neighbor_highlight(neighbor);
        }
        debug!(node = id, "Cleared node highlight");
        true
    }

    pub fn toggle_highlight(&mut self, id: NodeId) -> bool {
        if self.nodes.get(id).is_some_and(|n| n.highlight.highlighted) {
            self.end_highlight(id)
        } else {
            self.begin_highlight(id)
        }
    }

    /// Count a highlighted neighbor; transitions only when the node leaves
    /// the plain state
    pub fn begin_neighbor_highlight(&mut self, id: NodeId) {
        let scales = self.config.level_scales();
        if self.nodes[id].highlight.begin_neighbor_highlighted(&scales) {
            self.begin_transition(id);
        }
    }

    /// Release a highlighted neighbor; transitions only when the node
    /// returns to the plain state
    pub fn end_neighbor_highlight(&mut self, id: NodeId) {
        let scales = self.config.level_scales();
        if self.nodes[id].highlight.end_neighbor_highlighted(&scales) {
            self.begin_transition(id);
        }
    }

    /// Snapshot the node and its edges and restart the node timeline
    pub fn begin_transition(&mut self, id: NodeId) {
        let params = self.config.bundling_params();
        let node = &mut self.nodes[id];
        node.highlight.begin_transition();
        node.highlight.start();
        node.timeline.play_from_start();

        let node = &self.nodes[id];
        for &edge in &node.edges {
            let edge = &mut self.edges[edge];
            edge.begin_transition(&self.hierarchy, &self.nodes, &params);
            edge.mesh_update_required = true;
        }
    }

    pub fn is_animating(&self) -> bool {
        self.nodes.iter().any(|node| node.timeline.is_playing())
    }

    /// Advance every node timeline by `dt` seconds, forward each step to
    /// the node and its edges, then refresh meshes. Returns whether a batch
    /// changed.
    pub fn tick(&mut self, dt: f32) -> bool {
        for node in &mut self.nodes {
            let step = node.timeline.advance(dt);
            if step == TimelineStep::Idle {
                continue;
            }
            step.apply(&mut node.highlight);
            for &edge in &node.edges {
                step.apply(&mut self.edges[edge]);
            }
        }
        self.update_edge_meshes()
    }

    /// Drive a node's transition with an external alpha instead of its
    /// timeline
    pub fn apply_transition_alpha(&mut self, id: NodeId, alpha: f32) {
        self.apply_step(id, TimelineStep::Update(alpha.clamp(0.0, 1.0)));
    }

    /// Jump a node's transition to its end state
    pub fn finish_transition(&mut self, id: NodeId) {
        self.nodes[id].timeline.stop();
        self.apply_step(id, TimelineStep::Finished);
    }

    fn apply_step(&mut self, id: NodeId, step: TimelineStep) {
        let node = &mut self.nodes[id];
        step.apply(&mut node.highlight);
        for &edge in &node.edges {
            step.apply(&mut self.edges[edge]);
        }
    }
}
