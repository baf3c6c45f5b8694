//! Batched tube-mesh geometry for bundled edges
//!
//! Every render group gets one [`MeshBatch`]: the padded control points,
//! segment and spline descriptors, and the triangle indices of all member
//! edges, concatenated. Vertex positions are left to a [`MeshKernel`].
//!
//! Building runs in two phases. A sequential pass prefix-sums the buffer
//! sizes of every member edge and records its offsets; a rayon fork-join
//! pass then fills the control-point and index buffers, each task writing
//! only the disjoint range assigned to it.
//!
//! # Padding
//!
//! A uniform cubic B-spline evaluated over `n` raw points padded with two
//! extra copies of each endpoint passes through both endpoints:
//!
//! ```text
//! raw:     P0 P1 P2
//! padded:  P0 P0 P0 P1 P2 P2 P2          (n + 4 entries)
//! windows: [P0 P0 P0 P1] [P0 P0 P1 P2]
//!          [P0 P1 P2 P2] [P1 P2 P2 P2]   (n + 1 segments)
//! ```

mod kernel;
mod types;

pub use kernel::{CpuKernel, DispatchGate, DispatchPermit, MeshKernel};
pub use types::{
    DEFAULT_NUM_SAMPLES, DEFAULT_NUM_SIDES, MAX_NUM_SAMPLES, MAX_NUM_SIDES, MIN_NUM_SAMPLES,
    MIN_NUM_SIDES, MeshVertex, SplineControlPoint, SplineData, SplineSegment, SplineUniforms,
};

use bytemuck::Zeroable;
use rayon::prelude::*;
use tracing::debug;

use crate::bundling::{ControlPoint, Edge, MeshRange, RenderGroup};
use crate::color;
use crate::graph::Node;

/// Shared buffers of one render group
#[derive(Debug, Clone, Default)]
pub struct MeshBatch {
    pub group: RenderGroup,
    pub control_points: Vec<SplineControlPoint>,
    pub segments: Vec<SplineSegment>,
    pub splines: Vec<SplineData>,
    pub indices: Vec<u32>,
    pub num_vertices: u32,
}

impl MeshBatch {
    pub fn is_empty(&self) -> bool {
        self.splines.is_empty()
    }

    pub fn num_indices(&self) -> u32 {
        self.indices.len() as u32
    }

    /// Whether `uniforms` describe the ring layout this batch was built with.
    ///
    /// Kernels size their output from `num_vertices`, so a mismatch would
    /// write past it.
    pub fn matches_uniforms(&self, uniforms: &SplineUniforms) -> bool {
        let per_segment = uniforms.num_sides as usize * uniforms.num_samples as usize;
        per_segment * self.segments.len() == self.num_vertices as usize
    }
}

/// Vertex of ring `along`, side `around`; sides wrap around the tube
pub fn vertex_index(num_sides: u32, along: u32, around: u32) -> u32 {
    along * num_sides + around % num_sides
}

/// Triangulate the rings of one segment into `out`, which must hold
/// `(num_samples - 1) * num_sides * 6` indices.
pub fn triangulate_segment(out: &mut [u32], vertex_offset: u32, num_sides: u32, num_samples: u32) {
    let mut quads = out.chunks_exact_mut(6);
    for along in 0..num_samples.saturating_sub(1) {
        for around in 0..num_sides {
            let top_left = vertex_offset + vertex_index(num_sides, along, around);
            let bottom_left = vertex_offset + vertex_index(num_sides, along, around + 1);
            let top_right = vertex_offset + vertex_index(num_sides, along + 1, around);
            let bottom_right = vertex_offset + vertex_index(num_sides, along + 1, around + 1);
            if let Some(quad) = quads.next() {
                quad.copy_from_slice(&[
                    top_left,
                    bottom_left,
                    top_right,
                    top_right,
                    bottom_left,
                    bottom_right,
                ]);
            }
        }
    }
}

/// Copy raw control points into a padded range of `points.len() + 4`
pub fn pad_control_points(points: &[ControlPoint], out: &mut [SplineControlPoint]) {
    let (Some(&first), Some(&last)) = (points.first(), points.last()) else {
        return;
    };
    debug_assert_eq!(out.len(), points.len() + 4);
    let end = out.len() - 1;
    out[0] = first.into();
    out[1] = first.into();
    for (dst, &src) in out[2..].iter_mut().zip(points) {
        *dst = src.into();
    }
    out[end - 1] = last.into();
    out[end] = last.into();
}

/// Split `buffer` into consecutive sub-slices of the given lengths
fn split_ranges<'a, T>(mut buffer: &'a mut [T], lengths: &[usize]) -> Vec<&'a mut [T]> {
    let mut parts = Vec::with_capacity(lengths.len());
    for &len in lengths {
        let (head, tail) = buffer.split_at_mut(len);
        parts.push(head);
        buffer = tail;
    }
    parts
}

/// Builds per-group batches from edge control points
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MeshGeometryBuilder {
    num_sides: u32,
    num_samples: u32,
}

impl Default for MeshGeometryBuilder {
    fn default() -> Self {
        Self::new(DEFAULT_NUM_SIDES, DEFAULT_NUM_SAMPLES)
    }
}

impl MeshGeometryBuilder {
    /// Sides are clamped to `[MIN_NUM_SIDES, MAX_NUM_SIDES]`, samples to
    /// `[MIN_NUM_SAMPLES, MAX_NUM_SAMPLES]`.
    pub fn new(num_sides: u32, num_samples: u32) -> Self {
        Self {
            num_sides: num_sides.clamp(MIN_NUM_SIDES, MAX_NUM_SIDES),
            num_samples: num_samples.clamp(MIN_NUM_SAMPLES, MAX_NUM_SAMPLES),
        }
    }

    pub fn num_sides(&self) -> u32 {
        self.num_sides
    }

    pub fn num_samples(&self) -> u32 {
        self.num_samples
    }

    pub fn vertices_per_segment(&self) -> u32 {
        self.num_sides * self.num_samples
    }

    pub fn indices_per_segment(&self) -> u32 {
        (self.num_samples - 1) * self.num_sides * 6
    }

    /// Whether an edge goes into the batch of `group`. The Default batch
    /// holds every edge.
    pub fn is_member(group: RenderGroup, edge: &Edge) -> bool {
        group == RenderGroup::Default || edge.render_group == group
    }

    /// Control points an edge contributes to the batch of `group`
    fn edge_points(group: RenderGroup, edge: &Edge) -> &[ControlPoint] {
        match group {
            RenderGroup::Default => &edge.default_control_points,
            _ => &edge.control_points,
        }
    }

    /// Build the batch of `group` and record every edge's range in it.
    ///
    /// Non-member edges get an empty range for this group. Offsets grow
    /// monotonically in edge order.
    pub fn build(&self, group: RenderGroup, edges: &mut [Edge], nodes: &[Node]) -> MeshBatch {
        let vertices_per_segment = self.vertices_per_segment();
        let indices_per_segment = self.indices_per_segment();

        let mut batch = MeshBatch {
            group,
            ..MeshBatch::default()
        };
        let mut members = Vec::new();
        let mut padded_lengths = Vec::new();
        let mut num_control_points = 0u32;
        let mut num_indices = 0u32;

        for (i, edge) in edges.iter_mut().enumerate() {
            let num_points = Self::edge_points(group, edge).len() as u32;
            if !Self::is_member(group, edge) || num_points == 0 {
                edge.mesh_data[group] = MeshRange::default();
                continue;
            }

            let spline_idx = batch.splines.len() as u32;
            let begin_control_point_idx = num_control_points;
            let edge_vertex_offset = batch.num_vertices;
            let edge_index_offset = num_indices;

            for segment in 0..num_points + 1 {
                batch.segments.push(SplineSegment {
                    spline_idx,
                    begin_control_point_idx: begin_control_point_idx + segment,
                    num_samples: self.num_samples,
                    mesh_vertex_buffer_offset: batch.num_vertices,
                    mesh_index_buffer_offset: num_indices,
                });
                batch.num_vertices += vertices_per_segment;
                num_indices += indices_per_segment;
            }

            let source = &nodes[edge.source];
            let target = &nodes[edge.target];
            batch.splines.push(SplineData {
                start_position: source.pos_3d,
                bundling_strength: edge.bundling_strength(),
                end_position: target.pos_3d,
                begin_control_point_idx,
                start_color: color::rgb_to_hcl(source.color),
                num_control_points: num_points + 4,
                end_color: color::rgb_to_hcl(target.color),
                mesh_vertex_buffer_offset: edge_vertex_offset,
            });

            edge.mesh_data[group] = MeshRange {
                vertex_offset: edge_vertex_offset,
                num_vertices: batch.num_vertices - edge_vertex_offset,
                index_offset: edge_index_offset,
                num_indices: num_indices - edge_index_offset,
            };

            num_control_points += num_points + 4;
            members.push(i);
            padded_lengths.push((num_points + 4) as usize);
        }

        let mut control_points = vec![SplineControlPoint::zeroed(); num_control_points as usize];
        let mut indices = vec![0u32; num_indices as usize];
        let sources: Vec<&[ControlPoint]> = members
            .iter()
            .map(|&i| Self::edge_points(group, &edges[i]))
            .collect();
        let segments = &batch.segments;
        let (num_sides, num_samples) = (self.num_sides, self.num_samples);

        rayon::join(
            || {
                split_ranges(&mut control_points, &padded_lengths)
                    .into_par_iter()
                    .zip(sources.par_iter())
                    .for_each(|(out, points)| pad_control_points(points, out));
            },
            || {
                indices
                    .par_chunks_mut(indices_per_segment as usize)
                    .zip(segments.par_iter())
                    .for_each(|(out, segment)| {
                        triangulate_segment(
                            out,
                            segment.mesh_vertex_buffer_offset,
                            num_sides,
                            num_samples,
                        )
                    });
            },
        );

        batch.control_points = control_points;
        batch.indices = indices;

        debug!(
            ?group,
            splines = batch.splines.len(),
            segments = batch.segments.len(),
            vertices = batch.num_vertices,
            indices = batch.indices.len(),
            "Built edge mesh batch"
        );

        batch
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cluster::{ClusterHierarchy, LevelParams};
    use crate::highlight::LevelScales;
    use crate::projection::Projection;
    use crate::test_graphs;

    fn sample_edges() -> (Vec<Edge>, Vec<Node>) {
        let graph = test_graphs::clustered_graph();
        let mut hierarchy =
            ClusterHierarchy::from_records(&graph.clusters, graph.nodes.len()).unwrap();
        let mut nodes: Vec<Node> = graph
            .nodes
            .iter()
            .map(|record| {
                let mut node = Node::new(record.idx, record.label.clone(), 1.0);
                node.ancestors = record.ancestors.clone().unwrap();
                node.pos_3d = Projection::Stereographic.project([record.idx as f32 * 0.1, 0.2]);
                node
            })
            .collect();
        let positions: Vec<_> = nodes.iter().map(|n| n.pos_3d).collect();
        hierarchy.compute_descendant_counts();
        hierarchy.compute_aggregate_positions(&positions);

        let mut edges: Vec<Edge> = graph
            .edges
            .iter()
            .enumerate()
            .map(|(i, e)| {
                Edge::new(
                    i,
                    &nodes[e.source],
                    &nodes[e.target],
                    &hierarchy,
                    LevelParams::default(),
                    0.9,
                )
                .unwrap()
            })
            .collect();
        for edge in &mut edges {
            edge.update_default_control_points(&hierarchy, &nodes, LevelParams::default(), 1.0);
            edge.update_control_points(&hierarchy, &nodes);
        }
        (edges, nodes)
    }

    #[test]
    fn one_segment_has_expected_index_count_and_bounds() {
        let builder = MeshGeometryBuilder::new(4, 3);
        assert_eq!(builder.indices_per_segment(), 48);

        let mut indices = vec![u32::MAX; 48];
        triangulate_segment(&mut indices, 0, 4, 3);
        assert!(indices.iter().all(|&i| i < 4 * 3));
    }

    #[test]
    fn ribbon_triangulation_winding() {
        let mut indices = vec![0; 12];
        triangulate_segment(&mut indices, 0, 2, 2);
        let triangles: Vec<String> = indices
            .chunks(3)
            .map(|t| format!("{} {} {}", t[0], t[1], t[2]))
            .collect();
        insta::assert_snapshot!(triangles.join("\n"), @r"
        0 1 2
        2 1 3
        1 0 3
        3 0 2
        ");
    }

    #[test]
    fn vertex_index_wraps_around_ring() {
        assert_eq!(vertex_index(4, 2, 4), 8);
        assert_eq!(vertex_index(4, 2, 5), 9);
    }

    #[test]
    fn builder_clamps_sides_and_samples() {
        let builder = MeshGeometryBuilder::new(1, 500);
        assert_eq!(builder.num_sides(), MIN_NUM_SIDES);
        assert_eq!(builder.num_samples(), MAX_NUM_SAMPLES);
        let builder = MeshGeometryBuilder::new(99, 0);
        assert_eq!(builder.num_sides(), MAX_NUM_SIDES);
        assert_eq!(builder.num_samples(), MIN_NUM_SAMPLES);
    }

    #[test]
    fn padding_repeats_endpoints() {
        let point = |x: f32, knot: f32| ControlPoint {
            position: [x, 0.0, 0.0],
            level: 1.0,
            knot,
        };
        let raw = [point(1.0, 0.0), point(2.0, 0.5), point(3.0, 1.0)];
        let mut out = vec![SplineControlPoint::zeroed(); raw.len() + 4];
        pad_control_points(&raw, &mut out);

        let xs: Vec<f32> = out.iter().map(|p| p.position[0]).collect();
        assert_eq!(xs, vec![1.0, 1.0, 1.0, 2.0, 3.0, 3.0, 3.0]);
    }

    #[test]
    fn default_batch_holds_every_edge_with_monotonic_offsets() {
        let (mut edges, nodes) = sample_edges();
        let builder = MeshGeometryBuilder::new(4, 8);
        let batch = builder.build(RenderGroup::Default, &mut edges, &nodes);

        assert_eq!(batch.splines.len(), edges.len());
        let mut expected_vertex = 0;
        let mut expected_index = 0;
        for edge in &edges {
            let range = edge.mesh_data[RenderGroup::Default];
            assert_eq!(range.vertex_offset, expected_vertex);
            assert_eq!(range.index_offset, expected_index);
            let segments = edge.default_control_points.len() as u32 + 1;
            assert_eq!(range.num_vertices, segments * builder.vertices_per_segment());
            assert_eq!(range.num_indices, segments * builder.indices_per_segment());
            expected_vertex += range.num_vertices;
            expected_index += range.num_indices;
        }
        assert_eq!(batch.num_vertices, expected_vertex);
        assert_eq!(batch.num_indices(), expected_index);
        assert!(batch.indices.iter().all(|&i| i < batch.num_vertices));
    }

    #[test]
    fn segments_point_at_their_spline_ranges() {
        let (mut edges, nodes) = sample_edges();
        let batch = MeshGeometryBuilder::new(3, 4).build(RenderGroup::Default, &mut edges, &nodes);

        for segment in &batch.segments {
            let spline = &batch.splines[segment.spline_idx as usize];
            let first = spline.begin_control_point_idx;
            let last = first + spline.num_control_points - 1;
            assert!(segment.begin_control_point_idx >= first);
            assert!(segment.begin_control_point_idx + 3 <= last);
        }
        for (spline, edge) in batch.splines.iter().zip(&edges) {
            let begin = spline.begin_control_point_idx as usize;
            let padded = &batch.control_points[begin..begin + spline.num_control_points as usize];
            assert_eq!(padded[0].position, edge.default_control_points[0].position);
            assert_eq!(padded[2].position, edge.default_control_points[0].position);
            assert_eq!(
                padded.last().unwrap().position,
                edge.default_control_points.last().unwrap().position
            );
        }
    }

    fn batch_bytes(batch: &MeshBatch) -> Vec<u8> {
        let mut bytes = Vec::new();
        bytes.extend_from_slice(bytemuck::cast_slice(&batch.control_points));
        bytes.extend_from_slice(bytemuck::cast_slice(&batch.segments));
        bytes.extend_from_slice(bytemuck::cast_slice(&batch.splines));
        bytes.extend_from_slice(bytemuck::cast_slice(&batch.indices));
        bytes
    }

    #[test]
    fn parallel_fill_matches_sequential_fill() {
        let (mut edges, nodes) = sample_edges();
        let builder = MeshGeometryBuilder::new(5, 6);
        let batch = builder.build(RenderGroup::Default, &mut edges, &nodes);

        let mut control_points = Vec::new();
        for edge in &edges {
            let points = &edge.default_control_points;
            let mut padded = vec![SplineControlPoint::zeroed(); points.len() + 4];
            pad_control_points(points, &mut padded);
            control_points.extend(padded);
        }
        let mut indices = vec![0u32; batch.indices.len()];
        let per_segment = builder.indices_per_segment() as usize;
        for (out, segment) in indices.chunks_mut(per_segment).zip(&batch.segments) {
            triangulate_segment(
                out,
                segment.mesh_vertex_buffer_offset,
                builder.num_sides(),
                builder.num_samples(),
            );
        }

        assert_eq!(
            bytemuck::cast_slice::<_, u8>(&batch.control_points),
            bytemuck::cast_slice::<_, u8>(&control_points)
        );
        assert_eq!(batch.indices, indices);
    }

    #[test]
    fn repeated_builds_are_byte_identical() {
        let (mut edges, nodes) = sample_edges();
        let builder = MeshGeometryBuilder::new(6, 5);
        let expected = batch_bytes(&builder.build(RenderGroup::Default, &mut edges, &nodes));

        let single = rayon::ThreadPoolBuilder::new()
            .num_threads(1)
            .build()
            .unwrap();
        let serial = single.install(|| builder.build(RenderGroup::Default, &mut edges, &nodes));
        assert_eq!(batch_bytes(&serial), expected);

        for _ in 0..8 {
            let batch = builder.build(RenderGroup::Default, &mut edges, &nodes);
            assert_eq!(batch_bytes(&batch), expected);
        }
    }

    #[test]
    fn uniforms_must_match_batch_layout() {
        let (mut edges, nodes) = sample_edges();
        let builder = MeshGeometryBuilder::new(4, 8);
        let batch = builder.build(RenderGroup::Default, &mut edges, &nodes);

        let uniforms = |num_sides, num_samples| SplineUniforms {
            num_sides,
            num_samples,
            ..SplineUniforms::default()
        };
        assert!(batch.matches_uniforms(&uniforms(4, 8)));
        assert!(!batch.matches_uniforms(&uniforms(4, 9)));
        assert!(!batch.matches_uniforms(&uniforms(5, 8)));
        assert!(MeshBatch::default().matches_uniforms(&uniforms(4, 9)));
    }

    #[test]
    fn group_batches_only_hold_classified_edges() {
        let (mut edges, mut nodes) = sample_edges();
        let scales = LevelScales::default();
        nodes[0].highlight.begin_highlighted(&scales);
        nodes[1].highlight.begin_highlighted(&scales);
        for edge in &mut edges {
            edge.update_render_group(&nodes);
        }

        let builder = MeshGeometryBuilder::default();
        let highlighted = builder.build(RenderGroup::Highlighted, &mut edges, &nodes);
        let remained = builder.build(RenderGroup::Remained, &mut edges, &nodes);

        let count = |group| edges.iter().filter(|e| e.render_group == group).count();
        assert_eq!(highlighted.splines.len(), count(RenderGroup::Highlighted));
        assert_eq!(remained.splines.len(), count(RenderGroup::Remained));
        assert!(!highlighted.is_empty());

        for edge in &edges {
            if edge.render_group != RenderGroup::Highlighted {
                assert_eq!(edge.mesh_data[RenderGroup::Highlighted], MeshRange::default());
            }
        }
    }
}
