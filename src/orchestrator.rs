//! §4.6 MoveOrchestrator — the per-frame `Move` entry point. Integrates
//! gravity/jump with exact equations of motion, chooses flying vs. walking,
//! sequences the slide phases, and clamps the realized movement.
//!
//! Works entirely in the capsule's center-of-body frame (the same frame
//! `ContactCache`/`GroundClassifier`/`BoundsBuilder` use); `controller`
//! converts to/from the bottom-point `position` exposed on the public
//! surface.

use crate::contact_cache::ContactCache;
use crate::ground_classifier;
use crate::math::{max as vec_max, Vec3, EPS};
use crate::slide_phases::{self, PhaseContext};
use crate::sim::{CollisionWorld, RigidBody, Simulation};
use crate::types::{Capsule, Pose, Quat};

/// Per-instance state carried between `Move` calls (§3 "KCC state").
#[derive(Clone, Copy, Debug)]
pub struct OrchestratorState {
    pub gravity_velocity: Vec3,
    pub jump_velocity: Vec3,
    pub had_ground_contact: bool,
    pub is_stepping_up: bool,
    pub is_stepping_down: bool,
    pub velocity: Vec3,
    pub last_desired_velocity: Vec3,
}

impl Default for OrchestratorState {
    fn default() -> Self {
        Self {
            gravity_velocity: Vec3::zeros(),
            jump_velocity: Vec3::zeros(),
            had_ground_contact: false,
            is_stepping_up: false,
            is_stepping_down: false,
            velocity: Vec3::zeros(),
            last_desired_velocity: Vec3::zeros(),
        }
    }
}

/// The tunables `Move` needs, copied out of the controller's properties each
/// call (all `Copy`, so this is cheap to build on the stack).
#[derive(Clone, Copy, Debug)]
pub struct MoveConfig {
    pub up_vector: Vec3,
    pub capsule: Capsule,
    pub cos_slope_limit: f32,
    pub step_height: f32,
    pub max_velocity: f32,
    pub gravity: f32,
    pub jump_maneuverability: f32,
    pub is_climbing: bool,
    pub number_of_slide_iterations: u32,
    pub number_of_solver_iterations: u32,
}

fn lerp(a: Vec3, b: Vec3, t: f32) -> Vec3 {
    a + (b - a) * t
}

fn clamp_len(v: Vec3, max_len: f32) -> Vec3 {
    let len = v.norm();
    if len > max_len && len > EPS {
        v * (max_len / len)
    } else {
        v
    }
}

/// `Move(desired_velocity, jump_velocity, dt)`. Returns the new body-center
/// position; `state` is updated in place.
#[allow(clippy::too_many_arguments)]
pub fn move_character<E: CollisionWorld + Simulation>(
    env: &mut E,
    cache: &mut ContactCache<E>,
    cc_object: E::ObjectHandle,
    body_handle: E::BodyHandle,
    orientation: Quat,
    cfg: &MoveConfig,
    state: &mut OrchestratorState,
    enabled: bool,
    desired_velocity: Vec3,
    jump_velocity_input: f32,
    dt: f32,
) -> Vec3 {
    let old_position = env.body(body_handle).pose().position;

    if !enabled || dt <= 0.0 {
        return old_position;
    }

    // Platform traction (`CharacterForceEffect::on_apply`, run by the host's
    // `Simulation::step` between `Move` calls) is realized by integrating the
    // CC's body position directly from its averaged ground velocity as part
    // of that step, not here — by the time `Move` runs, `old_position` above
    // already reflects it. `Move` always starts this frame's own sweep from
    // a zeroed body velocity.
    env.body_mut(body_handle).set_linear_velocity(Vec3::zeros());

    let up = cfg.up_vector;
    let mut desired_movement = desired_velocity * dt;
    let mut is_stepping_up = false;

    if cfg.gravity == 0.0 {
        state.gravity_velocity = Vec3::zeros();
        state.jump_velocity = Vec3::zeros();
        desired_movement += up * (jump_velocity_input * dt);
        desired_movement = clamp_len(desired_movement, cfg.max_velocity * dt);

        let cc_aabb = env.object_aabb(cc_object);
        let radius = desired_movement.norm();
        cache.collect_obstacles(env, cc_object, cc_aabb, true, radius);
        cache.update_contacts(env);

        let allowed_penetration = env.allowed_penetration();
        let mut ctx = PhaseContext {
            world: env,
            cache,
            cc_object,
            orientation,
            capsule: cfg.capsule,
            up_vector: up,
            cos_slope_limit: cfg.cos_slope_limit,
            allowed_penetration,
            number_of_slide_iterations: cfg.number_of_slide_iterations,
            number_of_solver_iterations: cfg.number_of_solver_iterations,
        };
        let (new_position, _) = slide_phases::fly(&mut ctx, old_position, desired_movement);
        let env = ctx.world;
        let cache = ctx.cache;

        finish_move(
            env,
            body_handle,
            cc_object,
            orientation,
            cache,
            cfg,
            state,
            old_position,
            new_position,
            desired_movement,
            dt,
            false,
        );
        return new_position;
    }

    log::trace!("move_character: walking branch");

    let grounded_policy = state.had_ground_contact
        || (cfg.is_climbing && (state.jump_velocity + state.gravity_velocity).dot(&up) <= 0.0)
        || state.is_stepping_up;

    if grounded_policy {
        state.jump_velocity = up * jump_velocity_input;
        state.gravity_velocity = Vec3::zeros();
        desired_movement += state.jump_velocity * dt;
    } else {
        let last_velocity_move = state.velocity * dt;
        let last_horizontal = last_velocity_move - up * last_velocity_move.dot(&up);
        let new_horizontal = desired_movement - up * desired_movement.dot(&up);
        desired_movement = lerp(last_horizontal, new_horizontal, cfg.jump_maneuverability);

        state.jump_velocity = vec_max(state.jump_velocity, up * jump_velocity_input);
        desired_movement += state.jump_velocity * dt;

        if jump_velocity_input <= 0.0 {
            let v_old = state.gravity_velocity;
            let mut v_new = v_old - up * (cfg.gravity * dt);
            v_new = clamp_len(v_new, cfg.max_velocity);
            desired_movement += (v_new + v_old) * 0.5 * dt;
            state.gravity_velocity = v_new;
        }
    }

    desired_movement = clamp_len(desired_movement, cfg.max_velocity * dt);

    let radius = desired_movement.norm().max(cfg.step_height);
    let cc_aabb = env.object_aabb(cc_object);
    cache.collect_obstacles(env, cc_object, cc_aabb, true, radius);
    cache.update_contacts(env);

    let allowed_penetration = env.allowed_penetration();
    let mut ctx = PhaseContext {
        world: env,
        cache,
        cc_object,
        orientation,
        capsule: cfg.capsule,
        up_vector: up,
        cos_slope_limit: cfg.cos_slope_limit,
        allowed_penetration,
        number_of_slide_iterations: cfg.number_of_slide_iterations,
        number_of_solver_iterations: cfg.number_of_solver_iterations,
    };

    let stop_at_obstacle = state.had_ground_contact || state.is_stepping_up;
    let (mut new_position, completed) = slide_phases::slide(
        &mut ctx,
        old_position,
        desired_movement,
        stop_at_obstacle,
        state.had_ground_contact,
    );

    if !completed {
        log::debug!("move_character: slide blocked, trying step-up");
        let (step_position, stepped) =
            slide_phases::step_up(&mut ctx, old_position, desired_movement, cfg.step_height);
        if stepped {
            new_position = step_position;
            is_stepping_up = true;
        } else {
            let (fallback_position, _) =
                slide_phases::slide(&mut ctx, old_position, desired_movement, false, state.had_ground_contact);
            new_position = fallback_position;
        }
    }
    state.is_stepping_up = is_stepping_up;

    let mut stepped_down_this_frame = false;
    if !is_stepping_up && !cfg.is_climbing && state.jump_velocity.norm() <= EPS {
        let only_allowed = !state.is_stepping_down;
        let (down_position, grounded) =
            slide_phases::step_down(&mut ctx, new_position, cfg.step_height, only_allowed);
        if grounded {
            new_position = down_position;
            stepped_down_this_frame = true;
        }
        state.is_stepping_down = grounded;
    } else {
        state.is_stepping_down = false;
    }

    let realized = new_position - old_position;
    let desired_len = desired_movement.norm();
    if stepped_down_this_frame {
        new_position = old_position + clamp_len(realized, cfg.max_velocity * dt);
    } else if realized.norm() > desired_len {
        new_position = old_position + clamp_len(realized, desired_len);
    }

    let env = ctx.world;
    let cache = ctx.cache;
    finish_move(
        env,
        body_handle,
        cc_object,
        orientation,
        cache,
        cfg,
        state,
        old_position,
        new_position,
        desired_movement,
        dt,
        true,
    );

    new_position
}

#[allow(clippy::too_many_arguments)]
fn finish_move<E: CollisionWorld + Simulation>(
    env: &mut E,
    body_handle: E::BodyHandle,
    cc_object: E::ObjectHandle,
    orientation: Quat,
    cache: &mut ContactCache<E>,
    cfg: &MoveConfig,
    state: &mut OrchestratorState,
    old_position: Vec3,
    new_position: Vec3,
    desired_movement: Vec3,
    dt: f32,
    update_ground_contact: bool,
) {
    env.set_object_pose(cc_object, Pose::new(new_position, orientation));
    env.body_mut(body_handle).set_pose(Pose::new(new_position, orientation));
    cache.update_contacts(env);

    if update_ground_contact {
        let grounded = ground_classifier::classify(
            cache.cc_contacts(),
            cfg.capsule,
            cfg.up_vector,
            cfg.cos_slope_limit,
        );
        state.had_ground_contact = grounded;
        cache.set_cached_ground_contact(grounded);

        let realized = new_position - old_position;
        if state.jump_velocity.norm() <= EPS && realized.dot(&cfg.up_vector) > EPS {
            state.gravity_velocity = Vec3::zeros();
        }
    }

    state.last_desired_velocity = if dt > 0.0 { desired_movement / dt } else { Vec3::zeros() };
    state.velocity = if dt > 0.0 {
        (new_position - old_position) / dt
    } else {
        Vec3::zeros()
    };

    env.body_mut(body_handle).set_linear_velocity(Vec3::zeros());
}
