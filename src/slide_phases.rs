//! §4.5 SlidePhases — the five sliding algorithms. Each drives
//! `BoundsBuilder` + `SimplexSolver` inside an outer "slide iteration" loop
//! and commits or rolls back, sharing the skeleton:
//!
//! ```text
//! backup position and contact cache
//! outer loop up to number_of_slide_iterations:
//!    build bounds at current test position
//!    run SimplexSolver to refine current_movement
//!    if solver failed or made no progress: break / try alternate policy
//!    commit trial position; refresh contacts
//!    if forbidden contacts remain: continue outer loop
//!    else: success
//! if not succeeded: rollback
//! ```

use crate::bounds::build_bounds;
use crate::contact_cache::ContactCache;
use crate::math::{Vec3, EPS};
use crate::simplex_solver::{self, CorrectionPolicy};
use crate::sim::CollisionWorld;
use crate::types::{Capsule, CcContact, Pose, Quat};

/// Shared, borrowed state every phase needs: the collision world, the
/// contact cache, the CC's collision-world handle and its fixed orientation,
/// and the tunables that bound iteration counts and tolerance.
pub struct PhaseContext<'a, W: CollisionWorld> {
    pub world: &'a mut W,
    pub cache: &'a mut ContactCache<W>,
    pub cc_object: W::ObjectHandle,
    pub orientation: Quat,
    pub capsule: Capsule,
    pub up_vector: Vec3,
    pub cos_slope_limit: f32,
    pub allowed_penetration: f32,
    pub number_of_slide_iterations: u32,
    pub number_of_solver_iterations: u32,
}

impl<'a, W: CollisionWorld> PhaseContext<'a, W> {
    /// Moves the CC collision object to `position` (keeping the fixed
    /// orientation) and refreshes its contacts at that pose.
    fn commit(&mut self, position: Vec3) {
        self.world
            .set_object_pose(self.cc_object, Pose::new(position, self.orientation));
        self.cache.update_contacts(self.world);
    }

    /// Moves the CC collision object back to `position` and restores the
    /// contact cache snapshotted by the most recent `backup()`.
    fn rollback_to(&mut self, position: Vec3) {
        self.world
            .set_object_pose(self.cc_object, Pose::new(position, self.orientation));
        self.cache.rollback();
    }

    fn epsilon(&self) -> f32 {
        self.world.collision_epsilon()
    }

    /// Rebuilds the bounds list from the current contact cache at `at`, and
    /// returns a snapshot usable by the solver (the solver needs a plain
    /// slice while bounds is still owned by the cache).
    fn rebuild_bounds_at(&mut self, at: Vec3) -> Vec<crate::types::Bound> {
        self.cache.clear_bounds();
        let contacts: Vec<CcContact> = self.cache.cc_contacts().to_vec();
        let up = self.up_vector;
        let cos = self.cos_slope_limit;
        let eps = self.epsilon();
        build_bounds(self.cache.bounds_mut(), &contacts, at, up, cos, eps);
        self.cache.bounds().to_vec()
    }
}

fn has_forbidden_contact(contacts: &[CcContact], allowed_penetration: f32) -> bool {
    contacts
        .iter()
        .any(|c| c.penetration_depth > allowed_penetration)
}

/// Target position = current position (no desired movement). Used for
/// teleport-land validation.
pub fn resolve_penetrations<W: CollisionWorld>(ctx: &mut PhaseContext<W>, start: Vec3) -> (Vec3, bool) {
    ctx.cache.backup();

    let mut movement = Vec3::zeros();
    let mut succeeded = false;

    for _ in 0..ctx.number_of_slide_iterations.max(1) {
        let bounds = ctx.rebuild_bounds_at(start + movement);
        let out = simplex_solver::solve(
            start,
            movement,
            &bounds,
            |_plane| CorrectionPolicy::PlaneNormal,
            Vec3::zeros(),
            0.0,
            ctx.up_vector,
            ctx.allowed_penetration,
            ctx.number_of_solver_iterations,
        );
        movement = out.movement;

        let trial = start + movement;
        ctx.commit(trial);

        if !has_forbidden_contact(ctx.cache.cc_contacts(), ctx.allowed_penetration) {
            succeeded = true;
            break;
        }
    }

    if succeeded {
        (start + movement, true)
    } else {
        ctx.rollback_to(start);
        (start, false)
    }
}

/// Used when `gravity == 0` or as a generic motion primitive: no ground
/// bias, the character can move in any direction.
pub fn fly<W: CollisionWorld>(
    ctx: &mut PhaseContext<W>,
    start: Vec3,
    desired_movement: Vec3,
) -> (Vec3, bool) {
    ctx.cache.backup();

    let desired_len = desired_movement.norm();
    let desired_dir = desired_movement.try_normalize(EPS).unwrap_or(Vec3::zeros());

    let mut movement = Vec3::zeros();
    let mut succeeded = false;

    for _ in 0..ctx.number_of_slide_iterations.max(1) {
        let bounds = ctx.rebuild_bounds_at(start + movement);
        let out = simplex_solver::solve(
            start,
            movement,
            &bounds,
            |_plane| CorrectionPolicy::PlaneNormal,
            desired_dir,
            desired_len,
            ctx.up_vector,
            ctx.allowed_penetration,
            ctx.number_of_solver_iterations,
        );
        movement = out.movement;

        if desired_len > EPS && movement.dot(&desired_dir) < -ctx.allowed_penetration {
            log::debug!("fly: refined movement points against desired direction, aborting");
            break;
        }

        let trial = start + movement;
        ctx.commit(trial);

        if !has_forbidden_contact(ctx.cache.cc_contacts(), ctx.allowed_penetration) {
            succeeded = true;
            break;
        }
    }

    if succeeded {
        (start + movement, true)
    } else {
        ctx.rollback_to(start);
        (start, false)
    }
}

/// The workhorse for walking. `stop_at_obstacle` selects whether blocking
/// planes halt the character (true, grounded walking) or are slid along
/// (false, used as the orchestrator's fallback after a failed `StepUp`).
///
/// Returns `true` if the full desired motion was completed, `false` if the
/// slide was blocked (the orchestrator may then try `StepUp`).
pub fn slide<W: CollisionWorld>(
    ctx: &mut PhaseContext<W>,
    start: Vec3,
    desired_movement: Vec3,
    stop_at_obstacle: bool,
    started_grounded: bool,
) -> (Vec3, bool) {
    ctx.cache.backup();

    let desired_len = desired_movement.norm();
    let desired_dir = desired_movement.try_normalize(EPS).unwrap_or(Vec3::zeros());
    let desired_horizontal = desired_movement - ctx.up_vector * desired_movement.dot(&ctx.up_vector);
    let desired_is_purely_vertical = desired_horizontal.norm() <= ctx.allowed_penetration;

    let up = ctx.up_vector;
    let cos_slope_limit = ctx.cos_slope_limit;

    let mut movement = Vec3::zeros();
    let mut succeeded = false;
    let mut blocked = false;

    'outer: for _ in 0..ctx.number_of_slide_iterations.max(1) {
        let bounds = ctx.rebuild_bounds_at(start + movement);

        // Policy ladder: the natural per-plane dispatch, then progressively
        // more restrictive fallbacks if the solver fails to converge.
        let dispatch = |plane: &crate::types::Bound| -> CorrectionPolicy {
            let slope = plane.normal.dot(&up);
            if slope >= cos_slope_limit {
                CorrectionPolicy::PlaneNormal
            } else if stop_at_obstacle {
                CorrectionPolicy::ReverseDesired
            } else if desired_is_purely_vertical {
                CorrectionPolicy::PlaneNormal
            } else if slope > 0.0 {
                CorrectionPolicy::HorizontalDesired
            } else {
                CorrectionPolicy::LateralNormal
            }
        };

        let mut out = simplex_solver::solve(
            start,
            movement,
            &bounds,
            dispatch,
            desired_dir,
            desired_len,
            up,
            ctx.allowed_penetration,
            ctx.number_of_solver_iterations,
        );

        if !out.converged {
            log::debug!("slide: primary policy did not converge, retrying lateral-only");
            out = simplex_solver::solve(
                start,
                movement,
                &bounds,
                |plane| {
                    if plane.normal.dot(&up) >= cos_slope_limit {
                        CorrectionPolicy::PlaneNormal
                    } else {
                        CorrectionPolicy::LateralNormal
                    }
                },
                desired_dir,
                desired_len,
                up,
                ctx.allowed_penetration,
                ctx.number_of_solver_iterations,
            );
        }

        if !out.converged {
            log::debug!("slide: lateral-only did not converge, retrying no-slide");
            out = simplex_solver::solve(
                start,
                movement,
                &bounds,
                |plane| {
                    if plane.normal.dot(&up) >= cos_slope_limit {
                        CorrectionPolicy::PlaneNormal
                    } else {
                        CorrectionPolicy::HorizontalDesired
                    }
                },
                desired_dir,
                desired_len,
                up,
                ctx.allowed_penetration,
                ctx.number_of_solver_iterations,
            );
        }

        if !out.converged {
            if desired_is_purely_vertical && desired_movement.dot(&up) < 0.0 {
                log::debug!("slide: accepting unconverged purely-downward motion, marking grounded");
                movement = out.movement;
                ctx.cache.set_cached_ground_contact(true);
                succeeded = true;
                break 'outer;
            }
            blocked = true;
            break 'outer;
        }

        movement = out.movement;
        let trial = start + movement;
        ctx.commit(trial);

        if started_grounded && desired_horizontal.norm() > EPS {
            let committed_horizontal = movement - up * movement.dot(&up);
            let desired_horizontal_dir = desired_horizontal.try_normalize(EPS).unwrap_or(Vec3::zeros());
            if committed_horizontal.dot(&desired_horizontal_dir) < -ctx.allowed_penetration {
                log::debug!("slide: committed movement reverses desired horizontal direction, blocked");
                blocked = true;
                break 'outer;
            }
        }

        if !has_forbidden_contact(ctx.cache.cc_contacts(), ctx.allowed_penetration) {
            succeeded = true;
            break 'outer;
        }
    }

    if succeeded {
        (start + movement, true)
    } else {
        ctx.rollback_to(start);
        let _ = blocked;
        (start, false)
    }
}

/// 1. Compute a forward direction from `desired_movement`.
/// 2. Tentatively move up `step_height` and forward by `radius - 2*allowed_penetration`.
/// 3. Refresh contacts; fail if any are forbidden.
/// 4. Delegate to `step_down(only_onto_allowed_slopes = true)`.
pub fn step_up<W: CollisionWorld>(
    ctx: &mut PhaseContext<W>,
    start: Vec3,
    desired_movement: Vec3,
    step_height: f32,
) -> (Vec3, bool) {
    let up = ctx.up_vector;
    let horizontal = desired_movement - up * desired_movement.dot(&up);
    let forward = match horizontal.try_normalize(EPS) {
        Some(f) => f,
        None => return (start, false),
    };

    ctx.cache.backup();

    let forward_distance = (ctx.capsule.radius - 2.0 * ctx.allowed_penetration).max(0.0);
    let tentative = start + up * step_height + forward * forward_distance;
    ctx.commit(tentative);

    if has_forbidden_contact(ctx.cache.cc_contacts(), ctx.allowed_penetration) {
        ctx.rollback_to(start);
        return (start, false);
    }

    let (stepped_position, grounded) = step_down(ctx, tentative, step_height, true);
    if grounded {
        (stepped_position, true)
    } else {
        ctx.rollback_to(start);
        (start, false)
    }
}

/// Moves downward by at most `step_height`, bisecting between the last known
/// safe downward movement (initially zero) and the full desired downward
/// movement, stopping at the first valid ground contact.
pub fn step_down<W: CollisionWorld>(
    ctx: &mut PhaseContext<W>,
    start: Vec3,
    step_height: f32,
    only_onto_allowed_slopes: bool,
) -> (Vec3, bool) {
    ctx.cache.backup();

    let up = ctx.up_vector;
    let desired_movement = -up * step_height;

    let mut safe_movement = Vec3::zeros();
    let mut current_movement = desired_movement;
    let mut final_position = start;
    let mut bottom_contact = false;
    let mut found_allowed_slope = false;

    for _ in 0..ctx.number_of_slide_iterations.max(1) {
        let bounds = ctx.rebuild_bounds_at(start + current_movement);

        let out = simplex_solver::solve(
            start,
            current_movement,
            &bounds,
            |_plane| CorrectionPolicy::Up,
            -up,
            step_height,
            up,
            ctx.allowed_penetration,
            ctx.number_of_solver_iterations,
        );

        let trial = start + out.movement;
        ctx.commit(trial);

        bottom_contact = false;
        found_allowed_slope = false;
        for plane in &bounds {
            if plane.signed_distance(trial) < ctx.allowed_penetration {
                bottom_contact = true;
                if plane.normal.dot(&up) >= ctx.cos_slope_limit {
                    found_allowed_slope = true;
                }
            }
        }

        let made_progress = (trial - start).norm() > EPS;
        let unallowed = has_forbidden_contact(ctx.cache.cc_contacts(), ctx.allowed_penetration);

        if !out.converged || !made_progress || unallowed {
            current_movement = (safe_movement + current_movement) * 0.5;
            if (current_movement - safe_movement).norm() < EPS {
                break;
            }
            continue;
        }

        safe_movement = out.movement;
        final_position = trial;

        if (safe_movement - desired_movement).norm() < EPS {
            break;
        }
        current_movement = (safe_movement + desired_movement) * 0.5;
    }

    if bottom_contact && (!only_onto_allowed_slopes || found_allowed_slope) {
        (final_position, true)
    } else {
        ctx.rollback_to(start);
        (start, false)
    }
}
