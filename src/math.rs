//! Small vector helpers over plain `f32` arrays
//!
//! Positions are stored as `[f32; 2]` / `[f32; 3]` so they can be copied
//! straight into GPU buffers.

/// 2D vector
pub type Vec2 = [f32; 2];

/// 3D vector
pub type Vec3 = [f32; 3];

pub const ZERO3: Vec3 = [0.0, 0.0, 0.0];

pub fn add(a: Vec3, b: Vec3) -> Vec3 {
    [a[0] + b[0], a[1] + b[1], a[2] + b[2]]
}

pub fn sub(a: Vec3, b: Vec3) -> Vec3 {
    [a[0] - b[0], a[1] - b[1], a[2] - b[2]]
}

pub fn scale(v: Vec3, s: f32) -> Vec3 {
    [v[0] * s, v[1] * s, v[2] * s]
}

pub fn dot(a: Vec3, b: Vec3) -> f32 {
    a[0] * b[0] + a[1] * b[1] + a[2] * b[2]
}

pub fn cross(a: Vec3, b: Vec3) -> Vec3 {
    [
        a[1] * b[2] - a[2] * b[1],
        a[2] * b[0] - a[0] * b[2],
        a[0] * b[1] - a[1] * b[0],
    ]
}

pub fn length(v: Vec3) -> f32 {
    dot(v, v).sqrt()
}

/// Normalize a 3D vector, returning the zero vector for (near) zero input
pub fn normalize_or_zero(v: Vec3) -> Vec3 {
    let len = length(v);
    if len > 1e-8 { scale(v, 1.0 / len) } else { ZERO3 }
}

pub fn lerp(a: f32, b: f32, t: f32) -> f32 {
    a + (b - a) * t
}

pub fn lerp3(a: Vec3, b: Vec3, t: f32) -> Vec3 {
    [lerp(a[0], b[0], t), lerp(a[1], b[1], t), lerp(a[2], b[2], t)]
}

pub fn length2(v: Vec2) -> f32 {
    (v[0] * v[0] + v[1] * v[1]).sqrt()
}

/// Normalize a 2D vector, returning zero for (near) zero input
pub fn normalize2_or_zero(v: Vec2) -> Vec2 {
    let len = length2(v);
    if len > 1e-8 {
        [v[0] / len, v[1] / len]
    } else {
        [0.0, 0.0]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_zero_vector_stays_zero() {
        assert_eq!(normalize_or_zero(ZERO3), ZERO3);
        assert_eq!(normalize2_or_zero([0.0, 0.0]), [0.0, 0.0]);
    }

    #[test]
    fn normalize_produces_unit_length() {
        let v = normalize_or_zero([3.0, 4.0, 12.0]);
        assert!((length(v) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn cross_of_axes() {
        assert_eq!(cross([1.0, 0.0, 0.0], [0.0, 1.0, 0.0]), [0.0, 0.0, 1.0]);
    }
}
