//! Buffer types shared with the spline compute kernel
//!
//! These types are uploaded directly to GPU storage buffers. All are
//! repr(C) with explicit padding so the Rust layout matches the WGSL structs
//! in `gpu::shaders`.

use bytemuck::{Pod, Zeroable};

use crate::bundling::ControlPoint;

// =============================================================================
// Default Constants
// =============================================================================

/// Default number of tessellation rings per spline segment
pub const DEFAULT_NUM_SAMPLES: u32 = 24;

/// Maximum rings per segment the kernel supports
pub const MAX_NUM_SAMPLES: u32 = 64;

/// Minimum rings per segment (one quad strip)
pub const MIN_NUM_SAMPLES: u32 = 2;

/// Default number of vertices around a tube ring
pub const DEFAULT_NUM_SIDES: u32 = 4;

/// Maximum vertices around a tube ring
pub const MAX_NUM_SIDES: u32 = 32;

/// Minimum vertices around a tube ring (a flat ribbon)
pub const MIN_NUM_SIDES: u32 = 2;

/// A padded spline control point.
///
/// Layout matches WGSL struct for direct buffer upload.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct SplineControlPoint {
    /// Unit-sphere position
    pub position: [f32; 3],
    /// Radial scale applied to the position
    pub level: f32,
    /// Parametric position along the edge
    pub knot: f32,
    /// Padding for 16-byte alignment
    pub _padding: [f32; 3],
}

impl From<ControlPoint> for SplineControlPoint {
    fn from(point: ControlPoint) -> Self {
        Self {
            position: point.position,
            level: point.level,
            knot: point.knot,
            _padding: [0.0; 3],
        }
    }
}

/// One cubic segment of a spline: four consecutive padded control points
/// starting at `begin_control_point_idx`.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Pod, Zeroable)]
pub struct SplineSegment {
    /// Index into the batch's spline buffer
    pub spline_idx: u32,
    /// First of the four control points this segment blends
    pub begin_control_point_idx: u32,
    /// Rings tessellated along the segment
    pub num_samples: u32,
    /// First vertex of the segment in the batch vertex buffer
    pub mesh_vertex_buffer_offset: u32,
    /// First index of the segment in the batch index buffer
    pub mesh_index_buffer_offset: u32,
}

/// Per-edge spline metadata.
///
/// Scalars fill the tail of each vec3 so the struct packs into 64 bytes.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct SplineData {
    /// Source node position on the unit sphere
    pub start_position: [f32; 3],
    /// Blend between the straight line (0) and the bundled curve (1)
    pub bundling_strength: f32,
    /// Target node position on the unit sphere
    pub end_position: [f32; 3],
    /// First padded control point of the spline
    pub begin_control_point_idx: u32,
    /// Source color (hue, chroma, luminance)
    pub start_color: [f32; 3],
    /// Number of padded control points
    pub num_control_points: u32,
    /// Target color (hue, chroma, luminance)
    pub end_color: [f32; 3],
    /// First vertex of the spline in the batch vertex buffer
    pub mesh_vertex_buffer_offset: u32,
}

impl SplineData {
    /// Segments of the spline (padded points minus the cubic window)
    pub fn num_segments(&self) -> u32 {
        self.num_control_points.saturating_sub(3)
    }
}

/// Dispatch parameters passed to the kernel as uniforms
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct SplineUniforms {
    /// Sphere radius in world units
    pub world_size: f32,
    /// Tube radius in world units
    pub half_width: f32,
    /// Vertices around each ring
    pub num_sides: u32,
    /// Rings per segment
    pub num_samples: u32,
}

impl Default for SplineUniforms {
    fn default() -> Self {
        Self {
            world_size: 1000.0,
            half_width: 4.0,
            num_sides: DEFAULT_NUM_SIDES,
            num_samples: DEFAULT_NUM_SAMPLES,
        }
    }
}

/// A tube vertex produced by the kernel.
///
/// Layout matches WGSL struct for vertex buffer upload.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct MeshVertex {
    /// World-space position
    pub position: [f32; 3],
    /// Parametric position along the whole edge
    pub along: f32,
    /// Outward normal of the tube surface
    pub normal: [f32; 3],
    /// Fraction of the way around the ring
    pub around: f32,
    /// Linear RGBA
    pub color: [f32; 4],
}
