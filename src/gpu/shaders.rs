//! WGSL compute shader for spline tube tessellation
//!
//! Mirrors `mesh::CpuKernel`: one invocation per ring, each writing
//! `num_sides` vertices into the range of its segment.

/// Buffer layouts, matching `mesh::types`
pub const TYPES: &str = r#"
struct ControlPoint {
    position: vec3<f32>,
    level: f32,
    knot: f32,
    _pad0: f32,
    _pad1: f32,
    _pad2: f32,
}

struct Segment {
    spline_idx: u32,
    begin_control_point_idx: u32,
    num_samples: u32,
    mesh_vertex_buffer_offset: u32,
    mesh_index_buffer_offset: u32,
}

struct Spline {
    start_position: vec3<f32>,
    bundling_strength: f32,
    end_position: vec3<f32>,
    begin_control_point_idx: u32,
    start_color: vec3<f32>,
    num_control_points: u32,
    end_color: vec3<f32>,
    mesh_vertex_buffer_offset: u32,
}

struct Vertex {
    position: vec3<f32>,
    along: f32,
    normal: vec3<f32>,
    around: f32,
    color: vec4<f32>,
}

struct Uniforms {
    world_size: f32,
    half_width: f32,
    num_sides: u32,
    num_samples: u32,
}

@group(0) @binding(0) var<storage, read> control_points: array<ControlPoint>;
@group(0) @binding(1) var<storage, read> segments: array<Segment>;
@group(0) @binding(2) var<storage, read> splines: array<Spline>;
@group(0) @binding(3) var<storage, read_write> vertices: array<Vertex>;
@group(0) @binding(4) var<uniform> uniforms: Uniforms;
"#;

/// HCL to linear RGB, same constants as `color::hcl_to_rgb`
pub const HCL: &str = r#"
const PI: f32 = 3.14159265;
const HCL_GAMMA: f32 = 3.0;
const HCL_Y0: f32 = 100.0;
const HCL_MAX_L: f32 = 0.5304545;

fn hcl_to_rgb(hcl: vec3<f32>) -> vec3<f32> {
    let h = hcl.x;
    let c = hcl.y;
    if (hcl.z == 0.0) {
        return vec3<f32>(0.0);
    }
    let l = hcl.z * HCL_MAX_L;
    let q = exp((1.0 - c / (2.0 * l)) * (HCL_GAMMA / HCL_Y0));
    let u = (2.0 * l - c) / (2.0 * q - 1.0);
    let v = c / q;
    let t = tan((h + min(fract(2.0 * h) / 4.0, fract(-2.0 * h) / 8.0)) * PI * 2.0);

    let h6 = h * 6.0;
    var rgb: vec3<f32>;
    if (h6 <= 1.0) {
        rgb = vec3<f32>(1.0, t / (1.0 + t), 0.0);
    } else if (h6 <= 2.0) {
        rgb = vec3<f32>((1.0 + t) / t, 1.0, 0.0);
    } else if (h6 <= 3.0) {
        rgb = vec3<f32>(0.0, 1.0, 1.0 + t);
    } else if (h6 <= 4.0) {
        rgb = vec3<f32>(0.0, 1.0 / (1.0 + t), 1.0);
    } else if (h6 <= 5.0) {
        rgb = vec3<f32>(-1.0 / t, 0.0, 1.0);
    } else {
        rgb = vec3<f32>(1.0, 0.0, -t);
    }
    return rgb * v + vec3<f32>(u);
}
"#;

/// Ring tessellation entry point
pub const SPLINE_MESH: &str = r#"
fn basis(t: f32) -> vec4<f32> {
    let s = 1.0 - t;
    let t2 = t * t;
    let t3 = t2 * t;
    return vec4<f32>(
        s * s * s,
        3.0 * t3 - 6.0 * t2 + 4.0,
        -3.0 * t3 + 3.0 * t2 + 3.0 * t + 1.0,
        t3,
    ) / 6.0;
}

fn basis_derivative(t: f32) -> vec4<f32> {
    let s = 1.0 - t;
    return vec4<f32>(
        -s * s,
        3.0 * t * t - 4.0 * t,
        -3.0 * t * t + 2.0 * t + 1.0,
        t * t,
    ) / 2.0;
}

fn safe_normalize(v: vec3<f32>) -> vec3<f32> {
    let len = length(v);
    if (len > 0.0) {
        return v / len;
    }
    return vec3<f32>(0.0);
}

fn least_aligned_axis(v: vec3<f32>) -> vec3<f32> {
    let a = abs(v);
    if (a.x <= a.y && a.x <= a.z) {
        return vec3<f32>(1.0, 0.0, 0.0);
    }
    if (a.y <= a.z) {
        return vec3<f32>(0.0, 1.0, 0.0);
    }
    return vec3<f32>(0.0, 0.0, 1.0);
}

@compute @workgroup_size(64)
fn main(@builtin(global_invocation_id) global_id: vec3<u32>) {
    let num_samples = max(uniforms.num_samples, 2u);
    let num_sides = max(uniforms.num_sides, 1u);
    let segment_idx = global_id.x / num_samples;
    if (segment_idx >= arrayLength(&segments)) {
        return;
    }
    let ring = global_id.x % num_samples;

    let segment = segments[segment_idx];
    let spline = splines[segment.spline_idx];
    let first = control_points[spline.begin_control_point_idx];
    let last = control_points[spline.begin_control_point_idx + spline.num_control_points - 1u];
    let straight_from = first.position * first.level;
    let straight_to = last.position * last.level;

    var window: array<vec3<f32>, 4>;
    for (var i = 0u; i < 4u; i++) {
        let point = control_points[segment.begin_control_point_idx + i];
        let straight = mix(straight_from, straight_to, point.knot);
        let bundled = mix(straight, point.position * point.level, spline.bundling_strength);
        window[i] = bundled * uniforms.world_size;
    }

    let t = f32(ring) / f32(num_samples - 1u);
    let b = basis(t);
    let d = basis_derivative(t);
    let center = window[0] * b.x + window[1] * b.y + window[2] * b.z + window[3] * b.w;
    var tangent = window[0] * d.x + window[1] * d.y + window[2] * d.z + window[3] * d.w;
    if (length(tangent) <= 1.1920929e-7) {
        tangent = window[3] - window[0];
    }

    let radial = safe_normalize(center);
    tangent = safe_normalize(tangent);
    if (all(tangent == vec3<f32>(0.0))) {
        tangent = safe_normalize(cross(radial, least_aligned_axis(radial)));
    }
    var normal = safe_normalize(cross(tangent, radial));
    if (all(normal == vec3<f32>(0.0))) {
        normal = safe_normalize(cross(tangent, least_aligned_axis(tangent)));
    }
    let binormal = safe_normalize(cross(normal, tangent));

    let local_segment = f32(segment.begin_control_point_idx - spline.begin_control_point_idx);
    let num_segments = f32(max(spline.num_control_points, 4u) - 3u);
    let along = (local_segment + t) / num_segments;
    let rgb = hcl_to_rgb(mix(spline.start_color, spline.end_color, along));

    let base = segment.mesh_vertex_buffer_offset + ring * num_sides;
    for (var side = 0u; side < num_sides; side++) {
        let theta = 2.0 * PI * f32(side) / f32(num_sides);
        let offset = normal * cos(theta) + binormal * sin(theta);
        var out_vertex: Vertex;
        out_vertex.position = center + offset * uniforms.half_width;
        out_vertex.along = along;
        out_vertex.normal = offset;
        out_vertex.around = f32(side) / f32(num_sides);
        out_vertex.color = vec4<f32>(rgb, 1.0);
        vertices[base + side] = out_vertex;
    }
}
"#;

/// Full shader module source
pub fn spline_mesh_shader() -> String {
    format!("{}\n{}\n{}", TYPES, HCL, SPLINE_MESH)
}
