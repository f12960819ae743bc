//! §4.3 BoundsBuilder — turns the current contact list into oriented
//! bounding half-spaces, de-duplicated and ordered blocking-before-slope.
//!
//! Blocking planes go to the front of the list so the `SimplexSolver`
//! resolves them first: they only produce lateral corrections and are safe
//! to apply before ground planes, which produce vertical corrections that
//! must not pull the character into a later-discovered wall.

use crate::math::Vec3;
use crate::types::{Bound, CcContact};

/// Appends planes derived from `contacts` into `bounds`, skipping any plane
/// that is numerically a duplicate of one already present.
pub fn build_bounds(
    bounds: &mut Vec<Bound>,
    contacts: &[CcContact],
    position: Vec3,
    up_vector: Vec3,
    cos_slope_limit: f32,
    eps: f32,
) {
    for contact in contacts {
        let n = contact.normal_toward_cc;
        let point = position + n * contact.penetration_depth;
        let plane = Bound::through_point(n, point);

        if bounds.iter().any(|existing| existing.nearly_equal(&plane, eps)) {
            continue;
        }

        if n.dot(&up_vector) >= cos_slope_limit {
            bounds.push(plane);
        } else {
            bounds.insert(0, plane);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blocking_plane_is_inserted_before_slope_planes() {
        let up = Vec3::new(0.0, 1.0, 0.0);
        let mut bounds = Vec::new();
        let contacts = [
            CcContact {
                position_local: Vec3::new(0.0, -0.9, 0.0),
                normal_toward_cc: up,
                penetration_depth: 0.0,
            },
            CcContact {
                position_local: Vec3::new(0.5, 0.0, 0.0),
                normal_toward_cc: Vec3::new(-1.0, 0.0, 0.0),
                penetration_depth: 0.0,
            },
        ];
        build_bounds(&mut bounds, &contacts, Vec3::zeros(), up, 0.7, 1.0e-5);
        assert_eq!(bounds.len(), 2);
        assert!(bounds[0].normal.dot(&up) < 0.7, "blocking plane must come first");
    }

    #[test]
    fn duplicate_planes_are_skipped() {
        let up = Vec3::new(0.0, 1.0, 0.0);
        let mut bounds = Vec::new();
        let contacts = [
            CcContact {
                position_local: Vec3::new(0.0, -0.9, 0.0),
                normal_toward_cc: up,
                penetration_depth: 0.0,
            },
            CcContact {
                position_local: Vec3::new(0.1, -0.9, 0.1),
                normal_toward_cc: up,
                penetration_depth: 0.0,
            },
        ];
        build_bounds(&mut bounds, &contacts, Vec3::zeros(), up, 0.7, 1.0e-5);
        assert_eq!(bounds.len(), 1);
    }
}
