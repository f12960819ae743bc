//! §4.4 SimplexSolver — iterative relaxation that keeps a test position
//! inside the intersection of the current bounding half-spaces, with a
//! pluggable per-plane correction direction.
//!
//! This never returns a `Result`: non-convergence is `ConvergenceFailure`,
//! which per §7 is interpreted by the caller (a `SlidePhases` phase), not
//! surfaced further. The returned [`SolveOutcome::converged`] flag lets the
//! caller decide whether to retry with a different policy or roll back.

use crate::math::{Vec3, EPS};
use crate::types::Bound;

/// The correction direction used when a plane is violated. Each variant
/// matches one row of the spec's §4.4 policy table.
#[derive(Clone, Copy, Debug)]
pub enum CorrectionPolicy {
    /// Penetration resolution / Fly / Slide-along-ground: push out along the
    /// plane normal.
    PlaneNormal,
    /// Blocked-stop: reverse along the (constant) desired movement direction.
    ReverseDesired,
    /// No-slide: the horizontal projection of the desired movement direction.
    HorizontalDesired,
    /// Lateral-only: the horizontal component of the plane's own normal.
    LateralNormal,
    /// Step-down (vertical only): always `up_vector`.
    Up,
}

impl CorrectionPolicy {
    /// Computes the raw (not necessarily unit) correction direction for this
    /// policy against `plane_normal`, given the solver's constant inputs.
    fn raw_direction(self, plane_normal: Vec3, desired_dir: Vec3, up_vector: Vec3) -> Vec3 {
        match self {
            CorrectionPolicy::PlaneNormal => plane_normal,
            CorrectionPolicy::ReverseDesired => -desired_dir,
            CorrectionPolicy::HorizontalDesired => {
                desired_dir - up_vector * desired_dir.dot(&up_vector)
            }
            CorrectionPolicy::LateralNormal => plane_normal - up_vector * plane_normal.dot(&up_vector),
            CorrectionPolicy::Up => up_vector,
        }
    }
}

/// Result of one `solve` call.
#[derive(Clone, Copy, Debug)]
pub struct SolveOutcome {
    pub movement: Vec3,
    /// `false` means the iteration cap was hit with at least one plane still
    /// violated (a `ConvergenceFailure`, absorbed by the caller).
    pub converged: bool,
}

/// Refines `movement` (starting from `start`) so that, for every plane in
/// `bounds`, the test position `start + movement` lies within
/// `allowed_penetration` of the plane's inside half-space.
///
/// `policy_for` selects the correction policy per-plane (different
/// `SlidePhases` use different policies for blocking vs. ground planes).
/// `desired_dir` is the (unit, or zero) direction of the *original* desired
/// movement, used by `ReverseDesired`/`HorizontalDesired` and by the
/// "clamp correction to desired magnitude" tie-break that applies to all
/// slide policies.
#[allow(clippy::too_many_arguments)]
pub fn solve(
    start: Vec3,
    mut movement: Vec3,
    bounds: &[Bound],
    policy_for: impl Fn(&Bound) -> CorrectionPolicy,
    desired_dir: Vec3,
    desired_len: f32,
    up_vector: Vec3,
    allowed_penetration: f32,
    max_iterations: u32,
) -> SolveOutcome {
    for _ in 0..max_iterations.max(1) {
        let mut converged = true;

        for plane in bounds {
            if plane.normal.dot(&movement) >= 0.0 {
                continue;
            }

            let dist = plane.signed_distance(start + movement) + allowed_penetration;
            if dist >= 0.0 {
                continue;
            }

            let policy = policy_for(plane);
            let raw_dir = policy.raw_direction(plane.normal, desired_dir, up_vector);
            let dir = raw_dir.try_normalize(EPS).unwrap_or(plane.normal);

            let denom = dir.dot(&plane.normal);
            let (dir, denom) = if denom.abs() < EPS {
                (plane.normal, 1.0)
            } else {
                (dir, denom)
            };

            let mut correction = dir * (-dist / denom);
            if desired_len > EPS && correction.norm() > desired_len {
                correction = dir * desired_len;
            }

            movement += correction;
            converged = false;
        }

        if converged {
            return SolveOutcome {
                movement,
                converged: true,
            };
        }
    }

    log::debug!("solve: hit iteration cap ({max_iterations}) without converging");
    SolveOutcome {
        movement,
        converged: false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Bound;

    #[test]
    fn no_violated_planes_converges_immediately() {
        let bounds: Vec<Bound> = vec![];
        let out = solve(
            Vec3::zeros(),
            Vec3::new(1.0, 0.0, 0.0),
            &bounds,
            |_| CorrectionPolicy::PlaneNormal,
            Vec3::new(1.0, 0.0, 0.0),
            1.0,
            Vec3::new(0.0, 1.0, 0.0),
            0.01,
            4,
        );
        assert!(out.converged);
        assert!((out.movement.x - 1.0).abs() < 1.0e-5);
    }

    #[test]
    fn wall_blocks_forward_motion_with_plane_normal_policy() {
        let wall = Bound::through_point(Vec3::new(-1.0, 0.0, 0.0), Vec3::new(0.5, 0.0, 0.0));
        let out = solve(
            Vec3::zeros(),
            Vec3::new(10.0, 0.0, 0.0),
            &[wall],
            |_| CorrectionPolicy::PlaneNormal,
            Vec3::new(1.0, 0.0, 0.0),
            10.0,
            Vec3::new(0.0, 1.0, 0.0),
            0.01,
            4,
        );
        assert!(out.converged);
        assert!(out.movement.x < 0.6);
    }

    #[test]
    fn lateral_only_removes_vertical_component_of_correction() {
        // A wall whose normal has a slight upward tilt; lateral-only must
        // not let the correction add height.
        let wall = Bound::through_point(
            Vec3::new(-0.9, 0.2, 0.0).try_normalize(1.0e-5).unwrap(),
            Vec3::new(0.5, 0.0, 0.0),
        );
        let out = solve(
            Vec3::zeros(),
            Vec3::new(10.0, 0.0, 0.0),
            &[wall],
            |_| CorrectionPolicy::LateralNormal,
            Vec3::new(1.0, 0.0, 0.0),
            10.0,
            Vec3::new(0.0, 1.0, 0.0),
            0.01,
            4,
        );
        assert!((out.movement.y).abs() < 1.0e-5);
    }
}
