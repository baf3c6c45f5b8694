//! Planar to spherical projections
//!
//! The layout works in a plane whose coordinates are angles (radians); a
//! projection maps a planar point to a point on the unit sphere. The view
//! direction is +x, planar x maps towards +y and planar y towards +z.

use std::f32::consts::{FRAC_PI_2, PI};

use serde::{Deserialize, Serialize};

use crate::math::{self, Vec2, Vec3};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Projection {
    SphericalCoordinates,
    Gnomonic,
    GnomonicRadialWarping,
    GnomonicIndependentWarping,
    Stereographic,
    #[default]
    StereographicRadialWarping,
    StereographicIndependentWarping,
}

impl Projection {
    pub const ALL: [Projection; 7] = [
        Projection::SphericalCoordinates,
        Projection::Gnomonic,
        Projection::GnomonicRadialWarping,
        Projection::GnomonicIndependentWarping,
        Projection::Stereographic,
        Projection::StereographicRadialWarping,
        Projection::StereographicIndependentWarping,
    ];

    /// Map a planar point to the unit sphere
    pub fn project(self, p: Vec2) -> Vec3 {
        match self {
            Projection::SphericalCoordinates => {
                let theta = (-p[1] + FRAC_PI_2).clamp(0.0, PI);
                spherical_to_unit_cartesian(theta, p[0])
            }
            Projection::Gnomonic => math::normalize_or_zero(to_3d(p, 1.0)),
            Projection::GnomonicRadialWarping => {
                let n = math::normalize2_or_zero(p);
                let s = math::length2(p);
                let t = s.tan();
                let v = math::normalize_or_zero(to_3d([n[0] * t, n[1] * t], 1.0));
                if s < FRAC_PI_2 { v } else { math::scale(v, -1.0) }
            }
            Projection::GnomonicIndependentWarping => {
                math::normalize_or_zero(to_3d([p[0].tan(), p[1].tan()], 1.0))
            }
            Projection::Stereographic => stereographic(math::length2(p) * 0.5, p[1].atan2(p[0])),
            Projection::StereographicRadialWarping => {
                stereographic((math::length2(p) * 0.5).tan(), p[1].atan2(p[0]))
            }
            Projection::StereographicIndependentWarping => {
                let q = [(p[0] * 0.5).tan(), (p[1] * 0.5).tan()];
                stereographic(math::length2(q), q[1].atan2(q[0]))
            }
        }
    }
}

fn to_3d(p: Vec2, x: f32) -> Vec3 {
    [x, p[0], p[1]]
}

fn spherical_to_unit_cartesian(theta: f32, phi: f32) -> Vec3 {
    let (sin_theta, cos_theta) = theta.sin_cos();
    let (sin_phi, cos_phi) = phi.sin_cos();
    [sin_theta * cos_phi, sin_theta * sin_phi, cos_theta]
}

/// Inverse stereographic projection from the pole opposite the view
/// direction; `r = 0` maps to +x.
fn stereographic(r: f32, phi: f32) -> Vec3 {
    let v = spherical_to_unit_cartesian(2.0 * (1.0 / r).atan(), phi);
    [-v[2], v[0], v[1]]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_close(a: Vec3, b: Vec3) {
        for axis in 0..3 {
            assert!((a[axis] - b[axis]).abs() < 1e-5, "{a:?} != {b:?}");
        }
    }

    #[test]
    fn origin_maps_to_view_direction() {
        for projection in Projection::ALL {
            assert_close(projection.project([0.0, 0.0]), [1.0, 0.0, 0.0]);
        }
    }

    #[test]
    fn projections_land_on_unit_sphere() {
        let points = [[0.3, -0.2], [-0.7, 0.4], [1.2, 0.1], [0.05, 0.6]];
        for projection in Projection::ALL {
            for p in points {
                let v = projection.project(p);
                assert!(
                    (math::length(v) - 1.0).abs() < 1e-5,
                    "{projection:?} {p:?} -> {v:?}"
                );
            }
        }
    }

    #[test]
    fn radial_warping_preserves_angle_from_view_direction() {
        // a planar distance of s radians sits s radians away from +x
        for s in [0.2f32, 0.6, 1.0] {
            let p = [s * 0.6, s * 0.8];
            for projection in [
                Projection::GnomonicRadialWarping,
                Projection::StereographicRadialWarping,
            ] {
                let v = projection.project(p);
                assert!((v[0].acos() - s).abs() < 1e-4, "{projection:?} at {s}");
            }
        }
    }

    #[test]
    fn planar_axes_map_to_sphere_axes() {
        let right = Projection::StereographicRadialWarping.project([0.5, 0.0]);
        assert!(right[1] > 0.0 && right[2].abs() < 1e-6);
        let up = Projection::StereographicRadialWarping.project([0.0, 0.5]);
        assert!(up[2] > 0.0 && up[1].abs() < 1e-6);
    }

    #[test]
    fn parses_snake_case_names() {
        let projection: Projection = serde_yaml::from_str("gnomonic_radial_warping").unwrap();
        assert_eq!(projection, Projection::GnomonicRadialWarping);
    }
}
