//! Spline tessellation kernels
//!
//! A kernel turns a [`MeshBatch`] into tube vertices: one ring of
//! `num_sides` vertices per sample, `num_samples` rings per segment. Every
//! segment writes only its own vertex range, so segments run in parallel.

use std::f32::consts::TAU;
use std::sync::atomic::{AtomicBool, Ordering};

use bytemuck::Zeroable;
use rayon::prelude::*;
use tracing::{debug, warn};

use super::MeshBatch;
use super::types::{MeshVertex, SplineControlPoint, SplineSegment, SplineUniforms};
use crate::color;
use crate::math::{self, Vec3};

/// Computes tube vertices for a batch.
///
/// Returns `None` when the request was dropped (kernel busy or shut down,
/// or the uniforms don't match the batch). Callers keep their previous
/// vertices in that case.
pub trait MeshKernel {
    fn compute(&self, batch: &MeshBatch, uniforms: &SplineUniforms) -> Option<Vec<MeshVertex>>;
}

/// At most one dispatch in flight, none after shutdown
#[derive(Debug, Default)]
pub struct DispatchGate {
    executing: AtomicBool,
    unloading: AtomicBool,
}

/// Held for the duration of one dispatch
#[derive(Debug)]
pub struct DispatchPermit<'a> {
    gate: &'a DispatchGate,
}

impl Drop for DispatchPermit<'_> {
    fn drop(&mut self) {
        self.gate.executing.store(false, Ordering::Release);
    }
}

impl DispatchGate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim the gate unless a dispatch is running or shutdown began
    pub fn try_acquire(&self) -> Option<DispatchPermit<'_>> {
        if self.unloading.load(Ordering::Acquire) {
            return None;
        }
        self.executing
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| DispatchPermit { gate: self })
    }

    /// Refuse all further dispatches
    pub fn shut_down(&self) {
        self.unloading.store(true, Ordering::Release);
    }

    pub fn is_busy(&self) -> bool {
        self.executing.load(Ordering::Acquire)
    }

    pub fn is_shut_down(&self) -> bool {
        self.unloading.load(Ordering::Acquire)
    }
}

/// Uniform cubic B-spline basis at `t`
fn basis(t: f32) -> [f32; 4] {
    let s = 1.0 - t;
    let t2 = t * t;
    let t3 = t2 * t;
    [
        s * s * s / 6.0,
        (3.0 * t3 - 6.0 * t2 + 4.0) / 6.0,
        (-3.0 * t3 + 3.0 * t2 + 3.0 * t + 1.0) / 6.0,
        t3 / 6.0,
    ]
}

/// Derivative of [`basis`]
fn basis_derivative(t: f32) -> [f32; 4] {
    let s = 1.0 - t;
    [
        -s * s / 2.0,
        (3.0 * t * t - 4.0 * t) / 2.0,
        (-3.0 * t * t + 2.0 * t + 1.0) / 2.0,
        t * t / 2.0,
    ]
}

fn blend(points: &[Vec3; 4], weights: [f32; 4]) -> Vec3 {
    points
        .iter()
        .zip(weights)
        .fold(math::ZERO3, |acc, (&p, w)| math::add(acc, math::scale(p, w)))
}

/// Unit axis least aligned with `v`
fn least_aligned_axis(v: Vec3) -> Vec3 {
    let [x, y, z] = [v[0].abs(), v[1].abs(), v[2].abs()];
    if x <= y && x <= z {
        [1.0, 0.0, 0.0]
    } else if y <= z {
        [0.0, 1.0, 0.0]
    } else {
        [0.0, 0.0, 1.0]
    }
}

/// Orthonormal ring basis around `tangent`, oriented by the radial
/// direction where possible
fn ring_frame(tangent: Vec3, radial: Vec3) -> (Vec3, Vec3) {
    let tangent = math::normalize_or_zero(tangent);
    let tangent = if tangent == math::ZERO3 {
        math::normalize_or_zero(math::cross(radial, least_aligned_axis(radial)))
    } else {
        tangent
    };
    let mut normal = math::normalize_or_zero(math::cross(tangent, radial));
    if normal == math::ZERO3 {
        normal = math::normalize_or_zero(math::cross(tangent, least_aligned_axis(tangent)));
    }
    let binormal = math::normalize_or_zero(math::cross(normal, tangent));
    (normal, binormal)
}

/// Tessellate one segment into `out` (`num_sides * num_samples` vertices)
pub(crate) fn tessellate_segment(
    out: &mut [MeshVertex],
    batch: &MeshBatch,
    segment: &SplineSegment,
    uniforms: &SplineUniforms,
) {
    let spline = &batch.splines[segment.spline_idx as usize];
    let first_idx = spline.begin_control_point_idx as usize;
    let last_idx = first_idx + spline.num_control_points as usize - 1;
    let straight_from = world_point(&batch.control_points[first_idx]);
    let straight_to = world_point(&batch.control_points[last_idx]);

    let begin = segment.begin_control_point_idx as usize;
    let window: [Vec3; 4] = std::array::from_fn(|i| {
        let point = &batch.control_points[begin + i];
        let straight = math::lerp3(straight_from, straight_to, point.knot);
        let bundled = math::lerp3(straight, world_point(point), spline.bundling_strength);
        math::scale(bundled, uniforms.world_size)
    });

    let num_sides = uniforms.num_sides.max(1);
    let num_samples = uniforms.num_samples.max(2);
    let local_segment = (segment.begin_control_point_idx - spline.begin_control_point_idx) as f32;
    let num_segments = spline.num_segments().max(1) as f32;

    for (ring, vertices) in out.chunks_exact_mut(num_sides as usize).enumerate() {
        let t = ring as f32 / (num_samples - 1) as f32;
        let center = blend(&window, basis(t));
        let mut tangent = blend(&window, basis_derivative(t));
        if math::length(tangent) <= f32::EPSILON {
            // repeated endpoints flatten the curve at the spline ends
            tangent = math::sub(window[3], window[0]);
        }
        let (normal, binormal) = ring_frame(tangent, math::normalize_or_zero(center));

        let along = (local_segment + t) / num_segments;
        let hcl = math::lerp3(spline.start_color, spline.end_color, along);
        let [r, g, b] = color::hcl_to_rgb(hcl);

        for (side, vertex) in vertices.iter_mut().enumerate() {
            let theta = TAU * side as f32 / num_sides as f32;
            let offset = math::add(
                math::scale(normal, theta.cos()),
                math::scale(binormal, theta.sin()),
            );
            *vertex = MeshVertex {
                position: math::add(center, math::scale(offset, uniforms.half_width)),
                along,
                normal: offset,
                around: side as f32 / num_sides as f32,
                color: [r, g, b, 1.0],
            };
        }
    }
}

fn world_point(point: &SplineControlPoint) -> Vec3 {
    math::scale(point.position, point.level)
}

/// Tessellates on the rayon thread pool
#[derive(Debug, Default)]
pub struct CpuKernel {
    gate: DispatchGate,
}

impl CpuKernel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn gate(&self) -> &DispatchGate {
        &self.gate
    }
}

impl MeshKernel for CpuKernel {
    fn compute(&self, batch: &MeshBatch, uniforms: &SplineUniforms) -> Option<Vec<MeshVertex>> {
        let Some(_permit) = self.gate.try_acquire() else {
            debug!(group = ?batch.group, "Kernel busy or shut down, request dropped");
            return None;
        };

        if !batch.matches_uniforms(uniforms) {
            warn!(
                group = ?batch.group,
                num_sides = uniforms.num_sides,
                num_samples = uniforms.num_samples,
                num_vertices = batch.num_vertices,
                "Uniforms don't match batch layout"
            );
            return None;
        }

        let vertices_per_segment = (uniforms.num_sides * uniforms.num_samples) as usize;
        let mut vertices = vec![MeshVertex::zeroed(); batch.num_vertices as usize];
        if vertices_per_segment == 0 {
            return Some(vertices);
        }
        vertices
            .par_chunks_mut(vertices_per_segment)
            .zip(batch.segments.par_iter())
            .for_each(|(out, segment)| tessellate_segment(out, batch, segment, uniforms));

        Some(vertices)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bundling::{ControlPoint, RenderGroup};
    use crate::mesh::{SplineData, pad_control_points};

    /// Single-edge batch laid out the way the geometry builder does it
    fn single_spline_batch(raw: &[ControlPoint], strength: f32, uniforms: &SplineUniforms) -> MeshBatch {
        let mut control_points = vec![SplineControlPoint::zeroed(); raw.len() + 4];
        pad_control_points(raw, &mut control_points);

        let vertices_per_segment = uniforms.num_sides * uniforms.num_samples;
        let segments: Vec<SplineSegment> = (0..raw.len() as u32 + 1)
            .map(|s| SplineSegment {
                spline_idx: 0,
                begin_control_point_idx: s,
                num_samples: uniforms.num_samples,
                mesh_vertex_buffer_offset: s * vertices_per_segment,
                mesh_index_buffer_offset: 0,
            })
            .collect();
        let num_vertices = segments.len() as u32 * vertices_per_segment;

        MeshBatch {
            group: RenderGroup::Default,
            control_points,
            segments,
            splines: vec![SplineData {
                start_position: raw[0].position,
                bundling_strength: strength,
                end_position: raw[raw.len() - 1].position,
                begin_control_point_idx: 0,
                start_color: [0.0, 0.5, 0.5],
                num_control_points: raw.len() as u32 + 4,
                end_color: [0.5, 0.5, 0.5],
                mesh_vertex_buffer_offset: 0,
            }],
            indices: Vec::new(),
            num_vertices,
        }
    }

    fn arc() -> Vec<ControlPoint> {
        vec![
            ControlPoint { position: [1.0, 0.0, 0.0], level: 1.0, knot: 0.0 },
            ControlPoint { position: [0.6, 0.8, 0.0], level: 0.5, knot: 0.5 },
            ControlPoint { position: [0.0, 1.0, 0.0], level: 1.0, knot: 1.0 },
        ]
    }

    fn ring_center(ring: &[MeshVertex]) -> Vec3 {
        let sum = ring
            .iter()
            .fold(math::ZERO3, |acc, v| math::add(acc, v.position));
        math::scale(sum, 1.0 / ring.len() as f32)
    }

    #[test]
    fn basis_is_a_partition_of_unity() {
        for t in [0.0, 0.25, 0.5, 0.8, 1.0] {
            let sum: f32 = basis(t).iter().sum();
            assert!((sum - 1.0).abs() < 1e-6);
            let slope: f32 = basis_derivative(t).iter().sum();
            assert!(slope.abs() < 1e-6);
        }
    }

    #[test]
    fn tube_starts_and_ends_at_endpoints() {
        let uniforms = SplineUniforms {
            world_size: 100.0,
            half_width: 2.0,
            num_sides: 4,
            num_samples: 5,
        };
        let batch = single_spline_batch(&arc(), 0.9, &uniforms);
        let vertices = CpuKernel::new().compute(&batch, &uniforms).unwrap();
        assert_eq!(vertices.len(), batch.num_vertices as usize);

        let start = ring_center(&vertices[..4]);
        let end = ring_center(&vertices[vertices.len() - 4..]);
        for axis in 0..3 {
            assert!((start[axis] - [100.0, 0.0, 0.0][axis]).abs() < 1e-3, "{start:?}");
            assert!((end[axis] - [0.0, 100.0, 0.0][axis]).abs() < 1e-3, "{end:?}");
        }
        assert_eq!(vertices[0].along, 0.0);
        assert!((vertices[vertices.len() - 1].along - 1.0).abs() < 1e-6);
    }

    #[test]
    fn ring_radius_is_half_width() {
        let uniforms = SplineUniforms {
            world_size: 10.0,
            half_width: 0.5,
            num_sides: 6,
            num_samples: 4,
        };
        let batch = single_spline_batch(&arc(), 1.0, &uniforms);
        let vertices = CpuKernel::new().compute(&batch, &uniforms).unwrap();

        for ring in vertices.chunks(6) {
            let center = ring_center(ring);
            for vertex in ring {
                let radius = math::length(math::sub(vertex.position, center));
                assert!((radius - 0.5).abs() < 1e-4, "radius {radius}");
                assert!((math::length(vertex.normal) - 1.0).abs() < 1e-4);
            }
        }
    }

    #[test]
    fn zero_bundling_strength_is_a_straight_tube() {
        let uniforms = SplineUniforms {
            world_size: 1.0,
            half_width: 0.01,
            num_sides: 4,
            num_samples: 6,
        };
        let batch = single_spline_batch(&arc(), 0.0, &uniforms);
        let vertices = CpuKernel::new().compute(&batch, &uniforms).unwrap();

        // every ring center lies on the chord x + y = 1, z = 0
        for ring in vertices.chunks(4) {
            let [x, y, z] = ring_center(ring);
            assert!((x + y - 1.0).abs() < 1e-4, "({x}, {y})");
            assert!(z.abs() < 1e-4);
        }
    }

    #[test]
    fn mismatched_uniforms_are_rejected() {
        let uniforms = SplineUniforms::default();
        let batch = single_spline_batch(&arc(), 1.0, &uniforms);
        let other = SplineUniforms {
            num_sides: uniforms.num_sides + 1,
            ..uniforms
        };
        assert!(CpuKernel::new().compute(&batch, &other).is_none());
    }

    #[test]
    fn empty_batch_yields_no_vertices() {
        let vertices = CpuKernel::new()
            .compute(&MeshBatch::default(), &SplineUniforms::default())
            .unwrap();
        assert!(vertices.is_empty());
    }

    #[test]
    fn gate_drops_requests_while_busy() {
        let kernel = CpuKernel::new();
        let uniforms = SplineUniforms::default();
        let batch = single_spline_batch(&arc(), 1.0, &uniforms);

        let permit = kernel.gate().try_acquire().unwrap();
        assert!(kernel.gate().is_busy());
        assert!(kernel.compute(&batch, &uniforms).is_none());
        drop(permit);

        assert!(!kernel.gate().is_busy());
        assert!(kernel.compute(&batch, &uniforms).is_some());
    }

    #[test]
    fn gate_refuses_after_shutdown() {
        let kernel = CpuKernel::new();
        kernel.gate().shut_down();
        assert!(kernel.gate().is_shut_down());
        assert!(kernel.gate().try_acquire().is_none());
        assert!(
            kernel
                .compute(&MeshBatch::default(), &SplineUniforms::default())
                .is_none()
        );
    }
}
